use outbreak_shared::source::{
    COUNTRIES_PATH, GLOBAL_PATH, country_path, historical_path,
};
use outbreak_shared::{FetchError, HistoricalTimeline, RawSnapshot, StatsSource};
use serde::de::DeserializeOwned;

/// Same-origin gateway prefix.
pub const API_BASE: &str = "/api";

/// [`StatsSource`] over the server's `/api` routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpStatsSource;

async fn get_json<T: DeserializeOwned>(path: &str) -> Result<T, FetchError> {
    let url = format!("{API_BASE}{path}");
    let resp = gloo_net::http::Request::get(&url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

    if !resp.ok() {
        return Err(FetchError::Status(resp.status()));
    }

    resp.json::<T>()
        .await
        .map_err(|e| FetchError::Decode(e.to_string()))
}

impl StatsSource for HttpStatsSource {
    async fn global(&self) -> Result<RawSnapshot, FetchError> {
        get_json(GLOBAL_PATH).await
    }

    async fn countries(&self) -> Result<Vec<RawSnapshot>, FetchError> {
        get_json(COUNTRIES_PATH).await
    }

    async fn country(&self, code: &str) -> Result<RawSnapshot, FetchError> {
        let encoded = String::from(js_sys::encode_uri_component(code));
        get_json(&country_path(&encoded)).await
    }

    async fn historical(&self, last_days: u32) -> Result<HistoricalTimeline, FetchError> {
        get_json(&historical_path(last_days)).await
    }
}
