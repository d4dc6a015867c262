pub mod catalog;
pub mod colors;
pub mod format;
pub mod metric;
pub mod rank;
pub mod selection;
pub mod snapshot;
pub mod source;
pub mod timeline;
pub mod view;

pub use catalog::{RegionOption, region_catalog};
pub use format::{compact_total, pretty_delta};
pub use metric::Metric;
pub use rank::rank_by_cases;
pub use selection::{Scope, ScopeRequest, SelectionError, SelectionState, SelectionStore, Viewport};
pub use snapshot::{Counters, LatLng, RawCountryInfo, RawSnapshot, StatRecord, normalize};
pub use source::{FetchError, StatsSource};
pub use timeline::{ChartPoint, HistoricalTimeline, daily_new_series};
pub use view::{Dashboard, MapMarker, MapView, Surfaces, SummaryCard};
