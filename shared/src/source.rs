use crate::selection::Scope;
use crate::snapshot::RawSnapshot;
use crate::timeline::HistoricalTimeline;

pub const GLOBAL_PATH: &str = "/all";
pub const COUNTRIES_PATH: &str = "/countries";
pub const HISTORICAL_PATH: &str = "/historical/all";
pub const DEFAULT_HISTORY_DAYS: u32 = 120;
pub const MAX_HISTORY_DAYS: u32 = 366;

pub fn country_path(code: &str) -> String {
    format!("{COUNTRIES_PATH}/{code}")
}

pub fn historical_path(last_days: u32) -> String {
    format!("{HISTORICAL_PATH}?lastdays={last_days}")
}

/// Clamp a requested history window into `1..=MAX_HISTORY_DAYS`.
pub fn clamp_history_days(last_days: Option<u32>) -> u32 {
    last_days
        .unwrap_or(DEFAULT_HISTORY_DAYS)
        .clamp(1, MAX_HISTORY_DAYS)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network failure before a response arrived.
    #[error("fetch error: {0}")]
    Transport(String),
    /// Non-2xx response.
    #[error("HTTP {0}")]
    Status(u16),
    /// Body did not decode into the expected payload.
    #[error("parse error: {0}")]
    Decode(String),
}

/// Read-only access to the statistics API.
///
/// The browser client implements this over same-origin `/api` requests; tests
/// implement it with scripted responses.
#[allow(async_fn_in_trait)]
pub trait StatsSource {
    async fn global(&self) -> Result<RawSnapshot, FetchError>;

    async fn countries(&self) -> Result<Vec<RawSnapshot>, FetchError>;

    async fn country(&self, code: &str) -> Result<RawSnapshot, FetchError>;

    async fn historical(&self, last_days: u32) -> Result<HistoricalTimeline, FetchError>;

    /// Snapshot for a scope: `/all` for worldwide, `/countries/{code}` otherwise.
    async fn scope_snapshot(&self, scope: &Scope) -> Result<RawSnapshot, FetchError> {
        match scope {
            Scope::Worldwide => self.global().await,
            Scope::Country(code) => self.country(code).await,
        }
    }
}
