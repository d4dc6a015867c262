use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use outbreak_shared::{Dashboard, Metric, Scope, SelectionError, StatsSource, Surfaces};

use crate::api::HttpStatsSource;
use crate::chart::TrendChart;
use crate::map::BubbleMap;
use crate::summary::SummaryPanel;
use crate::table::CasesTable;

/// Shared dashboard state. Every surface reads it through its own memo.
#[derive(Clone, Copy)]
pub(crate) struct DashboardState(pub RwSignal<Dashboard>);

/// Switch the metric. Synchronous; no fetch involved.
pub(crate) fn select_metric(dashboard: RwSignal<Dashboard>, metric: Metric) {
    dashboard.maybe_update(|d| d.select_metric(metric).any());
}

/// Begin a scope change and commit the fetched snapshot if no newer request
/// was issued in the meantime.
pub(crate) fn select_scope(dashboard: RwSignal<Dashboard>, scope: Scope) {
    // The generation bump alone changes nothing any surface renders.
    let Some(request) = dashboard.try_update_untracked(|d| d.begin_scope_change(scope)) else {
        return;
    };

    spawn_local(async move {
        let fetched = HttpStatsSource.scope_snapshot(request.scope()).await;
        let outcome = dashboard.try_maybe_update(|d| {
            let result = d.complete_scope_change(&request, fetched);
            (result.as_ref().is_ok_and(|s| s.any()), result)
        });
        report_failure("Scope fetch", outcome);
    });
}

/// Fetch the country list for the selector, map and table.
pub(crate) fn load_regions(dashboard: RwSignal<Dashboard>) {
    let Some(request) = dashboard.try_update_untracked(|d| d.begin_regions_load()) else {
        return;
    };

    spawn_local(async move {
        let fetched = HttpStatsSource.countries().await;
        let outcome = dashboard.try_maybe_update(|d| {
            let result = d.complete_regions_load(request, fetched);
            (result.is_ok(), result)
        });
        report_failure("Country list fetch", outcome);
    });
}

fn report_failure(what: &str, outcome: Option<Result<Surfaces, SelectionError>>) {
    match outcome {
        // Superseded by a newer request; nothing to report.
        Some(Ok(_)) | Some(Err(SelectionError::Stale { .. })) | None => {}
        Some(Err(e)) => {
            web_sys::console::warn_1(&format!("{what} failed: {e}").into());
        }
    }
}

#[component]
pub fn App() -> impl IntoView {
    let dashboard: RwSignal<Dashboard> = RwSignal::new(Dashboard::new());
    provide_context(DashboardState(dashboard));

    // Worldwide goes through the scope path so a quick country pick wins over it.
    select_scope(dashboard, Scope::Worldwide);
    load_regions(dashboard);

    let chart_title = Memo::new(move |_| {
        let metric = dashboard.with(|d| d.chart_view().metric);
        format!("Worldwide new {metric}")
    });

    view! {
        <div style="display: flex; gap: 20px; padding: 20px; min-height: 100vh; box-sizing: border-box; background: #f5f6fa; font-family: 'Inter', system-ui, sans-serif; color: #1f2330;">
            <div style="flex: 0.9; display: flex; flex-direction: column; gap: 20px; min-width: 0;">
                <Header />
                <SummaryPanel />
                <div style="height: 500px; background: #ffffff; border-radius: 20px; box-shadow: 0 0 8px -4px rgba(0,0,0,0.5); overflow: hidden;">
                    <BubbleMap />
                </div>
            </div>
            <div style="flex: 0.35; min-width: 280px; background: #ffffff; border-radius: 12px; padding: 16px 20px; box-shadow: 0 0 8px -4px rgba(0,0,0,0.5); display: flex; flex-direction: column; gap: 12px;">
                <h3 style="margin: 0;">"Live Cases by Country"</h3>
                <CasesTable />
                <h3 style="margin: 12px 0 0 0;">{move || chart_title.get()}</h3>
                <TrendChart />
            </div>
        </div>
    }
}

/// Title plus the scope selector.
#[component]
fn Header() -> impl IntoView {
    let DashboardState(dashboard) = expect_context();

    let options = Memo::new(move |_| {
        dashboard.with(|d| {
            d.catalog()
                .iter()
                .filter(|option| option.is_selectable())
                .cloned()
                .collect::<Vec<_>>()
        })
    });
    let scope_key = Memo::new(move |_| dashboard.with(|d| d.selection().scope.key().to_string()));
    let updated = Memo::new(move |_| dashboard.with(|d| d.updated_label()));

    let on_change = move |e: web_sys::Event| {
        let value = event_target_value(&e);
        let Some(scope) = Scope::parse(&value) else {
            return;
        };
        if !dashboard.with_untracked(|d| d.needs_scope_change(&scope)) {
            return;
        }
        select_scope(dashboard, scope);
    };

    view! {
        <div style="display: flex; justify-content: space-between; align-items: center;">
            <div>
                <h1 style="margin: 0; color: #fc3c3c; font-size: 1.6rem;">"COVID-19 TRACKER"</h1>
                <div style="color: #8a8f9c; font-size: 0.75rem;">{move || updated.get()}</div>
            </div>
            <select
                style="padding: 6px 10px; border-radius: 6px; border: 1px solid #d0d3dc; background: #ffffff; font-size: 0.9rem;"
                prop:value=move || scope_key.get()
                on:change=on_change
            >
                <option value=outbreak_shared::selection::WORLDWIDE_KEY>"Worldwide"</option>
                // Catalog entries may repeat, so key by position.
                <For
                    each=move || options.get().into_iter().enumerate()
                    key=|(index, _)| *index
                    children=|(_, option)| {
                        let value = option.code.clone().unwrap_or_default();
                        view! { <option value=value>{option.name}</option> }
                    }
                />
            </select>
        </div>
    }
}
