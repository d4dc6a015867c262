use leptos::prelude::*;

use outbreak_shared::format::format_count;

use crate::app::DashboardState;

/// Country list ranked by cumulative cases. Never filtered by scope.
#[component]
pub fn CasesTable() -> impl IntoView {
    let DashboardState(dashboard) = expect_context();
    let rows = Memo::new(move |_| {
        dashboard.with(|d| {
            d.table_rows()
                .iter()
                .map(|record| (record.name.clone(), format_count(record.cumulative.cases)))
                .collect::<Vec<_>>()
        })
    });

    view! {
        <div style="height: 400px; overflow-y: auto; font-size: 0.85rem; color: #6a5d5d;">
            <table style="width: 100%; border-collapse: collapse;">
                <tbody>
                    <For
                        each=move || rows.get().into_iter().enumerate()
                        key=|(index, row)| (*index, row.clone())
                        children=|(index, (name, cases))| {
                            let background = if index % 2 == 1 { "#f3f2f8" } else { "transparent" };
                            view! {
                                <tr style:background=background>
                                    <td style="padding: 6px 8px;">{name}</td>
                                    <td style="padding: 6px 8px; text-align: right; font-variant-numeric: tabular-nums;">
                                        <strong>{cases}</strong>
                                    </td>
                                </tr>
                            }
                        }
                    />
                </tbody>
            </table>
        </div>
    }
}
