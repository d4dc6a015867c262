use tracing::{debug, warn};

use crate::catalog::{RegionOption, region_catalog};
use crate::format::{compact_total, pretty_delta};
use crate::metric::Metric;
use crate::rank::rank_by_cases;
use crate::selection::{Scope, ScopeRequest, SelectionError, SelectionState, SelectionStore};
use crate::snapshot::{LatLng, RawSnapshot, StatRecord, normalize_all};
use crate::source::{FetchError, StatsSource};

/// Which display surfaces saw their inputs change in one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Surfaces {
    pub summary: bool,
    pub map: bool,
    pub table: bool,
    pub chart: bool,
    pub selector: bool,
}

impl Surfaces {
    pub const NONE: Self = Self {
        summary: false,
        map: false,
        table: false,
        chart: false,
        selector: false,
    };

    pub fn any(self) -> bool {
        self.summary || self.map || self.table || self.chart || self.selector
    }
}

/// Ticket for an in-flight country-list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RegionsRequest {
    generation: u64,
}

/// One summary card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryCard {
    pub metric: Metric,
    pub title: &'static str,
    pub delta: String,
    pub total: String,
    pub is_active: bool,
    pub is_red: bool,
}

/// Map input: every ranked region plus the active metric and viewport.
#[derive(Debug, Clone, PartialEq)]
pub struct MapView<'a> {
    pub regions: &'a [StatRecord],
    pub metric: Metric,
    pub center: LatLng,
    pub zoom: f64,
    pub selected: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapMarker {
    pub name: String,
    pub code: Option<String>,
    pub position: LatLng,
    pub value: i64,
    pub radius_m: f64,
    pub color: (u8, u8, u8),
    pub fill: (u8, u8, u8),
    pub selected: bool,
    pub flag: Option<String>,
    pub details: Vec<(&'static str, String)>,
}

impl MapView<'_> {
    /// One bubble per region with coordinates, in ranked order.
    /// Regions without coordinates are skipped.
    pub fn markers(&self) -> Vec<MapMarker> {
        let color = self.metric.color_rgb();
        let fill = self.metric.fill_rgb();
        self.regions
            .iter()
            .filter_map(|record| {
                let position = record.location?;
                let value = record.cumulative.get(self.metric);
                Some(MapMarker {
                    name: record.name.clone(),
                    code: record.code.clone(),
                    position,
                    value,
                    radius_m: self.metric.bubble_radius_m(value),
                    color,
                    fill,
                    selected: self.selected.is_some() && record.code.as_deref() == self.selected,
                    flag: record.flag.clone(),
                    details: record.details(),
                })
            })
            .collect()
    }
}

/// The chart only needs the metric; it fetches its own series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartView {
    pub metric: Metric,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView<'a> {
    pub summary: [SummaryCard; 3],
    pub map: MapView<'a>,
    pub table: &'a [StatRecord],
    pub chart: ChartView,
}

/// Owns the selection and the normalized collections; derives what each
/// surface renders.
///
/// Every mutation commits fully before returning, so derivations never see a
/// half-applied change.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    selection: SelectionStore,
    current: Option<StatRecord>,
    regions: Vec<StatRecord>,
    ranked: Vec<StatRecord>,
    catalog: Vec<RegionOption>,
    regions_generation: u64,
    revision: u64,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    /// Snapshot of the selected scope, once one has landed.
    pub fn current(&self) -> Option<&StatRecord> {
        self.current.as_ref()
    }

    /// Countries in fetch order.
    pub fn regions(&self) -> &[StatRecord] {
        &self.regions
    }

    pub fn ranked(&self) -> &[StatRecord] {
        &self.ranked
    }

    pub fn catalog(&self) -> &[RegionOption] {
        &self.catalog
    }

    /// Bumped once per committed mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn select_metric(&mut self, metric: Metric) -> Surfaces {
        if !self.selection.select_metric(metric) {
            return Surfaces::NONE;
        }
        self.revision += 1;
        Surfaces {
            summary: true,
            map: true,
            chart: true,
            ..Surfaces::NONE
        }
    }

    pub fn begin_scope_change(&mut self, scope: Scope) -> ScopeRequest {
        self.selection.begin_scope_change(scope)
    }

    pub fn is_current(&self, request: &ScopeRequest) -> bool {
        self.selection.is_current(request)
    }

    /// Whether picking `scope` needs a new request. Compares against the
    /// newest in-flight request, not only the committed scope.
    pub fn needs_scope_change(&self, scope: &Scope) -> bool {
        self.selection.target_scope() != scope
    }

    pub fn complete_scope_change(
        &mut self,
        request: &ScopeRequest,
        fetched: Result<RawSnapshot, FetchError>,
    ) -> Result<Surfaces, SelectionError> {
        let record = self.selection.complete_scope_change(request, fetched)?;
        self.current = Some(record);
        self.revision += 1;
        Ok(Surfaces {
            summary: true,
            map: true,
            selector: true,
            ..Surfaces::NONE
        })
    }

    pub fn begin_regions_load(&mut self) -> RegionsRequest {
        self.regions_generation = self.regions_generation.wrapping_add(1);
        RegionsRequest {
            generation: self.regions_generation,
        }
    }

    /// Commit a country list: keeps fetch order for the selector, ranks for the
    /// table and map. Stale or failed loads leave the previous lists in place.
    pub fn complete_regions_load(
        &mut self,
        request: RegionsRequest,
        fetched: Result<Vec<RawSnapshot>, FetchError>,
    ) -> Result<Surfaces, SelectionError> {
        if request.generation != self.regions_generation {
            debug!(
                generation = request.generation,
                latest = self.regions_generation,
                "discarding stale country list"
            );
            return Err(SelectionError::Stale {
                generation: request.generation,
                latest: self.regions_generation,
            });
        }
        let raw = fetched.inspect_err(|e| {
            warn!(error = %e, "country list fetch failed; keeping previous list");
        })?;

        self.catalog = region_catalog(&raw);
        self.regions = normalize_all(&raw);
        self.ranked = rank_by_cases(&self.regions);
        self.revision += 1;
        debug!(regions = self.regions.len(), "country list committed");
        Ok(Surfaces {
            map: true,
            table: true,
            selector: true,
            ..Surfaces::NONE
        })
    }

    /// Fetch and commit a scope in one call. Requests issued through other
    /// handles in the meantime still win.
    pub async fn select_scope<S: StatsSource>(
        &mut self,
        source: &S,
        scope: Scope,
    ) -> Result<Surfaces, SelectionError> {
        let request = self.begin_scope_change(scope);
        let fetched = source.scope_snapshot(request.scope()).await;
        self.complete_scope_change(&request, fetched)
    }

    pub async fn load_regions<S: StatsSource>(
        &mut self,
        source: &S,
    ) -> Result<Surfaces, SelectionError> {
        let request = self.begin_regions_load();
        let fetched = source.countries().await;
        self.complete_regions_load(request, fetched)
    }

    pub fn summary_cards(&self) -> [SummaryCard; 3] {
        let active = self.selection().metric;
        let current = self.current.as_ref();
        Metric::ALL.map(|metric| SummaryCard {
            metric,
            title: metric.title(),
            delta: pretty_delta(current.map(|r| r.today.get(metric))),
            total: compact_total(current.map(|r| r.cumulative.get(metric))),
            is_active: metric == active,
            is_red: metric.is_red(),
        })
    }

    pub fn map_view(&self) -> MapView<'_> {
        let selection = self.selection();
        MapView {
            regions: &self.ranked,
            metric: selection.metric,
            center: selection.viewport.center,
            zoom: selection.viewport.zoom,
            selected: selection.scope.country_code(),
        }
    }

    /// "Updated ..." line for the current scope's snapshot, if it carried a
    /// timestamp.
    pub fn updated_label(&self) -> Option<String> {
        let updated = self.current.as_ref()?.updated?;
        Some(format!("Updated {}", updated.format("%b %-d, %Y %H:%M UTC")))
    }

    /// Ranked rows, never filtered by scope.
    pub fn table_rows(&self) -> &[StatRecord] {
        &self.ranked
    }

    pub fn chart_view(&self) -> ChartView {
        ChartView {
            metric: self.selection().metric,
        }
    }

    pub fn derive(&self) -> DashboardView<'_> {
        DashboardView {
            summary: self.summary_cards(),
            map: self.map_view(),
            table: self.table_rows(),
            chart: self.chart_view(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use futures::executor::block_on;

    use super::{Dashboard, Surfaces};
    use crate::format::NOT_A_NUMBER;
    use crate::metric::Metric;
    use crate::selection::{COUNTRY_ZOOM, Scope, SelectionError, Viewport};
    use crate::snapshot::{LatLng, RawSnapshot};
    use crate::source::{FetchError, StatsSource};
    use crate::timeline::HistoricalTimeline;

    fn countries_payload() -> Vec<RawSnapshot> {
        serde_json::from_str(
            r#"[
                {"country": "USA", "countryInfo": {"iso2": "US", "lat": 38.0, "long": -97.0, "flag": "https://disease.sh/assets/img/flags/us.png"},
                 "active": 90, "critical": 3, "population": 331000000,
                 "cases": 1000, "todayCases": 50, "recovered": 900, "todayRecovered": 20, "deaths": 10, "todayDeaths": 1},
                {"country": "Italy", "countryInfo": {"iso2": "IT", "lat": 42.8333, "long": 12.8333},
                 "cases": 2000, "todayCases": 10, "recovered": 1500, "todayRecovered": 4, "deaths": 70, "todayDeaths": 2},
                {"country": "MS Zaandam", "countryInfo": {"iso2": null, "lat": null, "long": null},
                 "cases": 9, "deaths": 2}
            ]"#,
        )
        .expect("countries payload")
    }

    fn global_payload() -> RawSnapshot {
        serde_json::from_str(
            r#"{"updated": 1700000000000, "cases": 1234567, "todayCases": 1234, "recovered": 999999, "todayRecovered": 0, "deaths": 950}"#,
        )
        .expect("global payload")
    }

    /// Replays queued responses in call order.
    #[derive(Default)]
    struct ScriptedSource {
        global: RefCell<VecDeque<Result<RawSnapshot, FetchError>>>,
        countries: RefCell<VecDeque<Result<Vec<RawSnapshot>, FetchError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl StatsSource for ScriptedSource {
        async fn global(&self) -> Result<RawSnapshot, FetchError> {
            self.calls.borrow_mut().push("/all".into());
            self.global
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(FetchError::Transport("no scripted response".into())))
        }

        async fn countries(&self) -> Result<Vec<RawSnapshot>, FetchError> {
            self.calls.borrow_mut().push("/countries".into());
            self.countries
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(FetchError::Transport("no scripted response".into())))
        }

        async fn country(&self, code: &str) -> Result<RawSnapshot, FetchError> {
            self.calls.borrow_mut().push(format!("/countries/{code}"));
            countries_payload()
                .into_iter()
                .find(|raw| {
                    raw.country_info
                        .as_ref()
                        .and_then(|info| info.iso2.as_deref())
                        == Some(code)
                })
                .ok_or(FetchError::Status(404))
        }

        async fn historical(&self, _last_days: u32) -> Result<HistoricalTimeline, FetchError> {
            Ok(HistoricalTimeline::default())
        }
    }

    fn loaded_dashboard() -> Dashboard {
        let mut dashboard = Dashboard::new();
        let request = dashboard.begin_regions_load();
        dashboard
            .complete_regions_load(request, Ok(countries_payload()))
            .expect("regions commit");
        let request = dashboard.begin_scope_change(Scope::Worldwide);
        dashboard
            .complete_scope_change(&request, Ok(global_payload()))
            .expect("worldwide commit");
        dashboard
    }

    #[test]
    fn table_ranks_italy_above_usa() {
        let dashboard = loaded_dashboard();
        let names: Vec<_> = dashboard
            .table_rows()
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["Italy", "USA", "MS Zaandam"]);
    }

    #[test]
    fn selector_keeps_fetch_order() {
        let dashboard = loaded_dashboard();
        let names: Vec<_> = dashboard.catalog().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["USA", "Italy", "MS Zaandam"]);
        assert_eq!(dashboard.regions()[0].name, "USA");
    }

    #[test]
    fn summary_cards_format_current_scope() {
        let dashboard = loaded_dashboard();
        let [cases, recovered, deaths] = dashboard.summary_cards();

        assert_eq!(cases.title, "Coronavirus Cases");
        assert_eq!(cases.delta, "+1,234");
        assert_eq!(cases.total, "1.2m");
        assert!(cases.is_active);
        assert!(cases.is_red);

        assert_eq!(recovered.delta, "0");
        assert_eq!(recovered.total, "1.0m");
        assert!(!recovered.is_active);
        assert!(!recovered.is_red);

        assert_eq!(deaths.delta, "0");
        assert_eq!(deaths.total, "950");
    }

    #[test]
    fn summary_before_first_snapshot_uses_fallbacks() {
        let dashboard = Dashboard::new();
        for card in dashboard.summary_cards() {
            assert_eq!(card.delta, "0");
            assert_eq!(card.total, NOT_A_NUMBER);
        }
    }

    #[test]
    fn metric_change_rerenders_everything_but_the_table() {
        let mut dashboard = loaded_dashboard();
        let table_before = dashboard.table_rows().to_vec();
        let revision = dashboard.revision();

        let surfaces = dashboard.select_metric(Metric::Deaths);
        assert_eq!(
            surfaces,
            Surfaces {
                summary: true,
                map: true,
                table: false,
                chart: true,
                selector: false,
            }
        );
        assert_eq!(dashboard.revision(), revision + 1);
        assert_eq!(dashboard.table_rows(), table_before.as_slice());
        assert_eq!(dashboard.chart_view().metric, Metric::Deaths);
        assert_eq!(dashboard.map_view().metric, Metric::Deaths);
        assert!(dashboard.summary_cards()[2].is_active);

        assert_eq!(dashboard.select_metric(Metric::Deaths), Surfaces::NONE);
        assert_eq!(dashboard.revision(), revision + 1);
    }

    #[test]
    fn map_markers_skip_regions_without_coordinates() {
        let dashboard = loaded_dashboard();
        let view = dashboard.map_view();
        assert_eq!(view.regions.len(), 3);
        let markers = view.markers();
        let names: Vec<_> = markers.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Italy", "USA"]);
        assert!(markers[0].radius_m > markers[1].radius_m);
        assert_eq!(markers[0].color, Metric::Cases.color_rgb());
        assert!(markers.iter().all(|m| !m.selected));

        let usa = &markers[1];
        assert_eq!(usa.flag.as_deref(), Some("https://disease.sh/assets/img/flags/us.png"));
        assert_eq!(
            usa.details,
            [
                ("Active", "90".to_string()),
                ("Critical", "3".to_string()),
                ("Population", "331,000,000".to_string()),
            ]
        );
        assert!(markers[0].flag.is_none());
        assert!(markers[0].details.is_empty());
    }

    #[test]
    fn updated_label_follows_current_snapshot() {
        assert_eq!(Dashboard::new().updated_label(), None);
        let dashboard = loaded_dashboard();
        assert_eq!(
            dashboard.updated_label().as_deref(),
            Some("Updated Nov 14, 2023 22:13 UTC")
        );
    }

    #[test]
    fn country_scope_recenters_map_and_keeps_table_unfiltered() {
        let mut dashboard = loaded_dashboard();
        let source = ScriptedSource::default();

        let surfaces = block_on(dashboard.select_scope(&source, Scope::Country("US".into())))
            .expect("country selection");
        assert!(surfaces.summary && surfaces.map);
        assert!(!surfaces.table);

        let view = dashboard.map_view();
        assert_eq!(view.center, LatLng::new(38.0, -97.0));
        assert_eq!(view.zoom, COUNTRY_ZOOM);
        assert_eq!(view.selected, Some("US"));
        assert!(view.markers().iter().any(|m| m.selected && m.name == "USA"));

        assert_eq!(dashboard.table_rows().len(), 3);
        assert_eq!(dashboard.summary_cards()[0].delta, "+50");
        assert_eq!(source.calls.borrow().as_slice(), ["/countries/US"]);
    }

    #[test]
    fn worldwide_scope_goes_to_global_endpoint() {
        let mut dashboard = loaded_dashboard();
        let source = ScriptedSource::default();
        source.global.borrow_mut().push_back(Ok(global_payload()));

        block_on(dashboard.select_scope(&source, Scope::Worldwide)).expect("worldwide");
        assert_eq!(source.calls.borrow().as_slice(), ["/all"]);
        assert_eq!(dashboard.selection().viewport, Viewport::default());
    }

    #[test]
    fn failed_scope_fetch_keeps_previous_state_and_snapshot() {
        let mut dashboard = loaded_dashboard();
        let before_selection = dashboard.selection().clone();
        let before_current = dashboard.current().cloned();
        let revision = dashboard.revision();
        let source = ScriptedSource::default();

        let err = block_on(dashboard.select_scope(&source, Scope::Country("ZZ".into())))
            .expect_err("unknown country");
        assert_eq!(err, SelectionError::Fetch(FetchError::Status(404)));
        assert_eq!(dashboard.selection(), &before_selection);
        assert_eq!(dashboard.current().cloned(), before_current);
        assert_eq!(dashboard.revision(), revision);
    }

    #[test]
    fn stale_worldwide_after_usa_is_discarded() {
        let mut dashboard = loaded_dashboard();
        let worldwide = dashboard.begin_scope_change(Scope::Worldwide);
        let usa = dashboard.begin_scope_change(Scope::Country("US".into()));
        assert!(!dashboard.is_current(&worldwide));

        let usa_payload = countries_payload().swap_remove(0);
        dashboard
            .complete_scope_change(&usa, Ok(usa_payload))
            .expect("usa commits");
        let stale = dashboard.complete_scope_change(&worldwide, Ok(global_payload()));
        assert!(matches!(stale, Err(SelectionError::Stale { .. })));

        assert_eq!(dashboard.selection().scope, Scope::Country("US".into()));
        assert_eq!(dashboard.current().map(|r| r.name.as_str()), Some("USA"));
    }

    #[test]
    fn repick_of_committed_scope_while_country_is_in_flight_wins() {
        let mut dashboard = loaded_dashboard();
        assert!(!dashboard.needs_scope_change(&Scope::Worldwide));

        let us = Scope::Country("US".into());
        assert!(dashboard.needs_scope_change(&us));
        let usa = dashboard.begin_scope_change(us.clone());
        assert!(!dashboard.needs_scope_change(&us));

        // Worldwide is still committed, but the store is heading to US.
        assert!(dashboard.needs_scope_change(&Scope::Worldwide));
        let worldwide = dashboard.begin_scope_change(Scope::Worldwide);

        let usa_payload = countries_payload().swap_remove(0);
        let late = dashboard.complete_scope_change(&usa, Ok(usa_payload));
        assert!(matches!(late, Err(SelectionError::Stale { .. })));
        dashboard
            .complete_scope_change(&worldwide, Ok(global_payload()))
            .expect("worldwide commits");

        assert_eq!(dashboard.selection().scope, Scope::Worldwide);
        assert_eq!(dashboard.current().map(|r| r.name.as_str()), Some("Worldwide"));
    }

    #[test]
    fn stale_country_list_is_discarded() {
        let mut dashboard = Dashboard::new();
        let first = dashboard.begin_regions_load();
        let second = dashboard.begin_regions_load();

        dashboard
            .complete_regions_load(second, Ok(countries_payload()))
            .expect("latest list commits");
        let stale = dashboard.complete_regions_load(first, Ok(Vec::new()));
        assert!(matches!(stale, Err(SelectionError::Stale { .. })));
        assert_eq!(dashboard.ranked().len(), 3);
    }

    #[test]
    fn failed_country_list_keeps_previous_list() {
        let mut dashboard = loaded_dashboard();
        let source = ScriptedSource::default();
        source
            .countries
            .borrow_mut()
            .push_back(Err(FetchError::Decode("truncated".into())));

        let err = block_on(dashboard.load_regions(&source)).expect_err("decode failure");
        assert_eq!(
            err,
            SelectionError::Fetch(FetchError::Decode("truncated".into()))
        );
        assert_eq!(dashboard.catalog().len(), 3);
    }

    #[test]
    fn derive_bundles_all_surfaces_consistently() {
        let mut dashboard = loaded_dashboard();
        dashboard.select_metric(Metric::Recovered);
        let view = dashboard.derive();
        assert_eq!(view.chart.metric, Metric::Recovered);
        assert_eq!(view.map.metric, Metric::Recovered);
        assert!(view.summary[1].is_active);
        assert_eq!(view.table.first().map(|r| r.name.as_str()), Some("Italy"));
    }
}
