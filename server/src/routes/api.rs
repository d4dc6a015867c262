use std::fmt::Write as _;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use outbreak_shared::source::{COUNTRIES_PATH, GLOBAL_PATH, HISTORICAL_PATH, MAX_HISTORY_DAYS};
use outbreak_shared::{HistoricalTimeline, RawSnapshot};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::state::{AppState, ObservabilitySnapshot};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const MAX_COUNTRY_CODE_LEN: usize = 64;
const SNAPSHOT_CACHE_CONTROL: &str = "public, max-age=60";
const HISTORICAL_CACHE_CONTROL: &str = "public, max-age=600";

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "upstream": &*state.upstream_base,
        "observability": {
            "upstream_requests_total": observability.upstream_requests_total,
            "upstream_errors_total": observability.upstream_errors_total,
            "rejected_requests_total": observability.rejected_requests_total,
        }
    }))
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = render_prometheus_metrics(state.observability.snapshot());

    (
        [
            (header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-store"),
        ],
        body,
    )
}

fn render_prometheus_metrics(observability: ObservabilitySnapshot) -> String {
    let mut body = String::new();
    let counters = [
        (
            "outbreak_upstream_requests_total",
            "Total requests forwarded to the statistics upstream.",
            observability.upstream_requests_total,
        ),
        (
            "outbreak_upstream_errors_total",
            "Upstream requests that failed, returned an error status, or did not decode.",
            observability.upstream_errors_total,
        ),
        (
            "outbreak_rejected_requests_total",
            "Requests rejected before reaching the upstream.",
            observability.rejected_requests_total,
        ),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(body, "# HELP {name} {help}");
        let _ = writeln!(body, "# TYPE {name} counter");
        let _ = writeln!(body, "{name} {value}");
    }
    body
}

pub async fn get_all(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let url = upstream_url(&state, GLOBAL_PATH)?;
    proxy_json::<RawSnapshot>(&state, url, SNAPSHOT_CACHE_CONTROL).await
}

pub async fn get_countries(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let url = upstream_url(&state, COUNTRIES_PATH)?;
    proxy_json::<Vec<RawSnapshot>>(&state, url, SNAPSHOT_CACHE_CONTROL).await
}

pub async fn get_country(
    State(state): State<AppState>,
    Path(raw_code): Path<String>,
) -> Result<Response, StatusCode> {
    let code = normalize_country_code(&raw_code).inspect_err(|_| {
        state.observability.record_rejected_request();
        debug!(code = %raw_code.escape_debug(), "rejected country code");
    })?;
    let url = country_url(&state, code)?;
    proxy_json::<RawSnapshot>(&state, url, SNAPSHOT_CACHE_CONTROL).await
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoricalQuery {
    #[serde(default)]
    pub lastdays: Option<u32>,
}

pub async fn get_historical(
    State(state): State<AppState>,
    Query(query): Query<HistoricalQuery>,
) -> Result<Response, StatusCode> {
    let last_days = query
        .lastdays
        .unwrap_or(state.historical_default_lastdays)
        .clamp(1, MAX_HISTORY_DAYS);
    let mut url = upstream_url(&state, HISTORICAL_PATH)?;
    url.query_pairs_mut()
        .append_pair("lastdays", &last_days.to_string());
    proxy_json::<HistoricalTimeline>(&state, url, HISTORICAL_CACHE_CONTROL).await
}

/// Fetch `url` and relay the body unchanged once it has been checked to
/// decode as `T`.
///
/// Transport failures, 5xx statuses and undecodable bodies become 502. Upstream
/// 4xx statuses are relayed so the client can tell an unknown country apart
/// from an outage.
async fn proxy_json<T: DeserializeOwned>(
    state: &AppState,
    url: reqwest::Url,
    cache_control: &'static str,
) -> Result<Response, StatusCode> {
    state.observability.record_upstream_request();

    let resp = state.http_client.get(url.clone()).send().await.map_err(|e| {
        state.observability.record_upstream_error();
        warn!(error = %e, %url, "upstream request failed");
        StatusCode::BAD_GATEWAY
    })?;

    let status = resp.status();
    if !status.is_success() {
        state.observability.record_upstream_error();
        warn!(status = status.as_u16(), %url, "upstream returned error status");
        return Err(relayed_status(status.as_u16()));
    }

    let body = resp.bytes().await.map_err(|e| {
        state.observability.record_upstream_error();
        warn!(error = %e, %url, "failed to read upstream body");
        StatusCode::BAD_GATEWAY
    })?;

    if let Err(e) = serde_json::from_slice::<T>(&body) {
        state.observability.record_upstream_error();
        warn!(error = %e, %url, "upstream body did not match expected shape");
        return Err(StatusCode::BAD_GATEWAY);
    }

    Ok(json_bytes_response(body, cache_control))
}

fn relayed_status(upstream: u16) -> StatusCode {
    match StatusCode::from_u16(upstream) {
        Ok(status) if status.is_client_error() => status,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn normalize_country_code(code: &str) -> Result<&str, StatusCode> {
    let trimmed = code.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_COUNTRY_CODE_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    if trimmed
        .chars()
        .any(|ch| ch.is_control() || matches!(ch, '/' | '\\' | '?' | '#'))
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    Ok(trimmed)
}

fn upstream_url(state: &AppState, path: &str) -> Result<reqwest::Url, StatusCode> {
    reqwest::Url::parse(&state.upstream_url(path)).map_err(|e| {
        warn!(error = %e, base = %state.upstream_base, "invalid upstream base URL");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

fn country_url(state: &AppState, code: &str) -> Result<reqwest::Url, StatusCode> {
    let mut url = upstream_url(state, COUNTRIES_PATH)?;
    let Ok(mut path_segments) = url.path_segments_mut() else {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };
    path_segments.push(code);
    drop(path_segments);
    Ok(url)
}

fn json_bytes_response(body: Bytes, cache_control: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    response
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::extract::{Path, Query};
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use outbreak_shared::source::DEFAULT_HISTORY_DAYS;
    use outbreak_shared::{HistoricalTimeline, RawSnapshot};
    use tower::ServiceExt;

    use super::{country_url, normalize_country_code, relayed_status, render_prometheus_metrics};
    use crate::state::{AppState, ObservabilitySnapshot};

    async fn spawn_mock_upstream() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        async fn country(Path(code): Path<String>) -> Result<String, StatusCode> {
            match code.as_str() {
                "IT" => Ok(r#"{"country":"Italy","countryInfo":{"iso2":"IT","lat":42.8333,"long":12.8333},"cases":2000,"todayCases":10}"#.to_string()),
                "XX" => Ok("<html>maintenance</html>".to_string()),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }

        async fn historical(
            Query(params): Query<std::collections::HashMap<String, String>>,
        ) -> String {
            let days = params.get("lastdays").cloned().unwrap_or_default();
            format!(r#"{{"cases":{{"1/1/21":{days}}},"deaths":{{}},"recovered":{{}}}}"#)
        }

        let upstream = Router::new()
            .route("/all", get(|| async { r#"{"cases":1234567,"todayCases":1234}"# }))
            .route(
                "/countries",
                get(|| async {
                    r#"[{"country":"USA","countryInfo":{"iso2":"US"},"cases":1000},{"country":"Italy","countryInfo":{"iso2":"IT"},"cases":2000}]"#
                }),
            )
            .route("/countries/{code}", get(country))
            .route("/historical/all", get(historical));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, upstream)
                .await
                .expect("serve mock upstream");
        });
        (addr, handle)
    }

    async fn gateway() -> (Router, AppState, tokio::task::JoinHandle<()>) {
        let (addr, handle) = spawn_mock_upstream().await;
        let mut state = AppState::with_upstream(format!("http://{addr}"));
        // Config tests may be overriding the env var concurrently.
        state.historical_default_lastdays = DEFAULT_HISTORY_DAYS;
        let app = crate::app::build_app(state.clone(), std::env::temp_dir());
        (app, state, handle)
    }

    async fn call(app: &Router, uri: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let cache_control = response
            .headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        (status, body, cache_control)
    }

    #[test]
    fn metrics_output_contains_prometheus_help_type_and_values() {
        let metrics = render_prometheus_metrics(ObservabilitySnapshot {
            upstream_requests_total: 12,
            upstream_errors_total: 3,
            rejected_requests_total: 7,
        });

        assert!(metrics.contains("# HELP outbreak_upstream_requests_total"));
        assert!(metrics.contains("# TYPE outbreak_upstream_errors_total counter"));
        assert!(metrics.contains("outbreak_upstream_requests_total 12"));
        assert!(metrics.contains("outbreak_upstream_errors_total 3"));
        assert!(metrics.contains("outbreak_rejected_requests_total 7"));
    }

    #[test]
    fn normalize_country_code_rejects_invalid_inputs() {
        assert_eq!(normalize_country_code(""), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("   "), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("U/S"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("US?x=1"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("US#"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("U\\S"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(normalize_country_code("U\u{7}S"), Err(StatusCode::BAD_REQUEST));
        assert_eq!(
            normalize_country_code(&"A".repeat(65)),
            Err(StatusCode::BAD_REQUEST)
        );
        assert_eq!(normalize_country_code(" US "), Ok("US"));
        assert_eq!(normalize_country_code("Côte d'Ivoire"), Ok("Côte d'Ivoire"));
    }

    #[test]
    fn country_url_percent_encodes_path_segment() {
        let state = AppState::with_upstream("https://disease.sh/v3/covid-19");
        let url = country_url(&state, "South Korea").expect("country URL");
        assert_eq!(
            url.as_str(),
            "https://disease.sh/v3/covid-19/countries/South%20Korea"
        );
    }

    #[test]
    fn only_client_errors_are_relayed() {
        assert_eq!(relayed_status(404), StatusCode::NOT_FOUND);
        assert_eq!(relayed_status(500), StatusCode::BAD_GATEWAY);
        assert_eq!(relayed_status(503), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn global_and_country_list_are_passed_through() {
        let (app, state, upstream) = gateway().await;

        let (status, body, cache_control) = call(&app, "/api/all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache_control.as_deref(), Some("public, max-age=60"));
        let global: RawSnapshot = serde_json::from_slice(&body).expect("global body");
        assert_eq!(global.cases, Some(1_234_567));

        let (status, body, _) = call(&app, "/api/countries").await;
        assert_eq!(status, StatusCode::OK);
        let countries: Vec<RawSnapshot> = serde_json::from_slice(&body).expect("countries body");
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0].country.as_deref(), Some("USA"));

        assert_eq!(state.observability.snapshot().upstream_requests_total, 2);
        upstream.abort();
    }

    #[tokio::test]
    async fn country_lookup_relays_not_found_and_rejects_bad_bodies() {
        let (app, state, upstream) = gateway().await;

        let (status, body, _) = call(&app, "/api/countries/IT").await;
        assert_eq!(status, StatusCode::OK);
        let italy: RawSnapshot = serde_json::from_slice(&body).expect("country body");
        assert_eq!(italy.country.as_deref(), Some("Italy"));

        let (status, _, _) = call(&app, "/api/countries/ZZ").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _, _) = call(&app, "/api/countries/XX").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, _, _) = call(&app, "/api/countries/U%3FS").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let observability = state.observability.snapshot();
        assert_eq!(observability.upstream_requests_total, 3);
        assert_eq!(observability.upstream_errors_total, 2);
        assert_eq!(observability.rejected_requests_total, 1);
        upstream.abort();
    }

    #[tokio::test]
    async fn historical_window_is_defaulted_and_clamped() {
        let (app, _state, upstream) = gateway().await;

        for (uri, expected) in [
            ("/api/historical/all", 120),
            ("/api/historical/all?lastdays=30", 30),
            ("/api/historical/all?lastdays=0", 1),
            ("/api/historical/all?lastdays=5000", 366),
        ] {
            let (status, body, cache_control) = call(&app, uri).await;
            assert_eq!(status, StatusCode::OK, "{uri}");
            assert_eq!(cache_control.as_deref(), Some("public, max-age=600"));
            let timeline: HistoricalTimeline =
                serde_json::from_slice(&body).expect("timeline body");
            assert_eq!(timeline.cases.get("1/1/21"), Some(&expected), "{uri}");
        }

        let (status, _, _) = call(&app, "/api/historical/all?lastdays=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        upstream.abort();
    }

    #[tokio::test]
    async fn unreachable_upstream_maps_to_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind probe");
        let addr = listener.local_addr().expect("probe address");
        drop(listener);

        let state = AppState::with_upstream(format!("http://{addr}"));
        let app = crate::app::build_app(state.clone(), std::env::temp_dir());
        let (status, _, _) = call(&app, "/api/all").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(state.observability.snapshot().upstream_errors_total, 1);
    }

    #[tokio::test]
    async fn health_and_metrics_expose_expected_contract() {
        let (app, _state, upstream) = gateway().await;
        let _ = call(&app, "/api/all").await;

        let (status, body, _) = call(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_slice(&body).expect("health json");
        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(
            health
                .get("observability")
                .and_then(|v| v.get("upstream_requests_total"))
                .and_then(|v| v.as_u64()),
            Some(1)
        );

        let (status, body, cache_control) = call(&app, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache_control.as_deref(), Some("no-store"));
        let metrics = String::from_utf8(body).expect("metrics text");
        assert!(metrics.contains("outbreak_upstream_requests_total 1"));
        upstream.abort();
    }
}
