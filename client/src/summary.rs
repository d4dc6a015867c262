use leptos::prelude::*;

use outbreak_shared::{Metric, SummaryCard};

use crate::app::{DashboardState, select_metric};
use crate::colors::rgba_css;

/// Three metric cards for the selected scope.
#[component]
pub fn SummaryPanel() -> impl IntoView {
    let DashboardState(dashboard) = expect_context();
    let cards = Memo::new(move |_| dashboard.with(|d| d.summary_cards()));

    view! {
        <div style="display: flex; gap: 12px;">
            {Metric::ALL
                .into_iter()
                .enumerate()
                .map(|(index, metric)| {
                    let card = Memo::new(move |_| cards.with(|c| c[index].clone()));
                    view! {
                        <InfoBox
                            card=card
                            on_select=move || select_metric(dashboard, metric)
                        />
                    }
                })
                .collect_view()}
        </div>
    }
}

#[component]
fn InfoBox(card: Memo<SummaryCard>, on_select: impl Fn() + 'static) -> impl IntoView {
    let accent = move || card.with(|c| accent_rgb(c.is_red));
    let border_top = move || {
        card.with(|c| {
            if c.is_active {
                let (r, g, b) = accent_rgb(c.is_red);
                format!("10px solid {}", rgba_css(r, g, b, 1.0))
            } else {
                "10px solid transparent".to_string()
            }
        })
    };

    view! {
        <div
            style="flex: 1; cursor: pointer; background: #ffffff; border-radius: 8px; padding: 14px 16px; box-shadow: 0 0 8px -4px rgba(0,0,0,0.5);"
            style:border-top=border_top
            on:click=move |_| on_select()
        >
            <div style="font-size: 0.85rem; color: #6c757d;">{move || card.with(|c| c.title)}</div>
            <h2
                style="margin: 8px 0; font-size: 1.75rem; font-weight: 600;"
                style:color=move || {
                    let (r, g, b) = accent();
                    rgba_css(r, g, b, 1.0)
                }
            >
                {move || card.with(|c| c.delta.clone())}
            </h2>
            <div style="font-size: 0.8rem; font-weight: 700; color: #6c757d;">
                {move || card.with(|c| format!("{} Total", c.total))}
            </div>
        </div>
    }
}

/// Red for cases and deaths, green for recovered.
fn accent_rgb(is_red: bool) -> (u8, u8, u8) {
    if is_red {
        Metric::Cases.color_rgb()
    } else {
        Metric::Recovered.color_rgb()
    }
}
