use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::metric::Metric;

/// Date format of the historical payload keys, e.g. `"3/14/21"`.
const DATE_KEY_FORMAT: &str = "%m/%d/%y";

/// `/historical/all` payload: cumulative counters keyed by date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalTimeline {
    pub cases: BTreeMap<String, i64>,
    pub deaths: BTreeMap<String, i64>,
    pub recovered: BTreeMap<String, i64>,
}

impl HistoricalTimeline {
    pub fn series(&self, metric: Metric) -> &BTreeMap<String, i64> {
        match metric {
            Metric::Cases => &self.cases,
            Metric::Recovered => &self.recovered,
            Metric::Deaths => &self.deaths,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub value: i64,
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key.trim(), DATE_KEY_FORMAT).ok()
}

/// Day-over-day differences of a cumulative series, in date order.
///
/// The first day has no predecessor and produces no point. Keys that are not
/// dates are skipped. Negative differences are kept as-is.
pub fn daily_new_series(timeline: &HistoricalTimeline, metric: Metric) -> Vec<ChartPoint> {
    let mut dated: Vec<(NaiveDate, i64)> = timeline
        .series(metric)
        .iter()
        .filter_map(|(key, &value)| parse_date_key(key).map(|date| (date, value)))
        .collect();
    // BTreeMap order is lexical ("10/1/20" < "9/30/20"), not chronological.
    dated.sort_by_key(|&(date, _)| date);

    dated
        .windows(2)
        .map(|pair| ChartPoint {
            date: pair[1].0,
            value: pair[1].1 - pair[0].1,
        })
        .collect()
}

/// Min/max of the series values, `None` when empty.
pub fn value_range(points: &[ChartPoint]) -> Option<(i64, i64)> {
    let min = points.iter().map(|p| p.value).min()?;
    let max = points.iter().map(|p| p.value).max()?;
    Some((min, max))
}
