use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_count;
use crate::metric::Metric;

pub const WORLDWIDE_NAME: &str = "Worldwide";

/// Payload as returned by `/all`, `/countries` and `/countries/{code}`.
///
/// Every field is optional: the global and per-country shapes differ, and the
/// upstream occasionally drops counters for small territories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSnapshot {
    pub updated: Option<i64>,
    pub country: Option<String>,
    pub country_info: Option<RawCountryInfo>,
    pub cases: Option<i64>,
    pub today_cases: Option<i64>,
    pub deaths: Option<i64>,
    pub today_deaths: Option<i64>,
    pub recovered: Option<i64>,
    pub today_recovered: Option<i64>,
    pub active: Option<i64>,
    pub critical: Option<i64>,
    pub population: Option<i64>,
}

/// Nested identity block of a per-country payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCountryInfo {
    #[serde(rename = "_id")]
    pub id: Option<i64>,
    pub iso2: Option<String>,
    pub iso3: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub flag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Cases / recovered / deaths triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Counters {
    pub cases: i64,
    pub recovered: i64,
    pub deaths: i64,
}

impl Counters {
    pub fn get(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Cases => self.cases,
            Metric::Recovered => self.recovered,
            Metric::Deaths => self.deaths,
        }
    }
}

/// Normalized per-scope statistics.
///
/// `today` is not required to be `<=` `cumulative`; the upstream does not
/// guarantee it and nothing here corrects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
    pub cumulative: Counters,
    pub today: Counters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<i64>,
}

impl StatRecord {
    /// Labelled extras for hover text, only those the upstream reported.
    pub fn details(&self) -> Vec<(&'static str, String)> {
        [
            ("Active", self.active),
            ("Critical", self.critical),
            ("Population", self.population),
        ]
        .into_iter()
        .filter_map(|(label, value)| Some((label, format_count(value?))))
        .collect()
    }
}

impl From<&RawSnapshot> for StatRecord {
    fn from(raw: &RawSnapshot) -> Self {
        normalize(raw)
    }
}

/// Convert one raw payload into a [`StatRecord`].
///
/// Missing counters become `0`; present counters are copied verbatim, negative
/// ones included. Location is only set when the identity block carries both
/// coordinates.
pub fn normalize(raw: &RawSnapshot) -> StatRecord {
    let info = raw.country_info.as_ref();
    let location = info.and_then(|info| match (info.lat, info.long) {
        (Some(lat), Some(lng)) => Some(LatLng { lat, lng }),
        _ => None,
    });

    StatRecord {
        name: raw
            .country
            .clone()
            .unwrap_or_else(|| WORLDWIDE_NAME.to_string()),
        code: info.and_then(|info| info.iso2.clone()),
        location,
        cumulative: Counters {
            cases: raw.cases.unwrap_or(0),
            recovered: raw.recovered.unwrap_or(0),
            deaths: raw.deaths.unwrap_or(0),
        },
        today: Counters {
            cases: raw.today_cases.unwrap_or(0),
            recovered: raw.today_recovered.unwrap_or(0),
            deaths: raw.today_deaths.unwrap_or(0),
        },
        flag: info.and_then(|info| info.flag.clone()),
        updated: raw.updated.and_then(DateTime::from_timestamp_millis),
        population: raw.population,
        active: raw.active,
        critical: raw.critical,
    }
}

/// Normalize a whole country list, preserving fetch order.
pub fn normalize_all(raw: &[RawSnapshot]) -> Vec<StatRecord> {
    raw.iter().map(normalize).collect()
}
