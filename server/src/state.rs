use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::config::{
    historical_default_lastdays, upstream_base_url, upstream_connect_timeout,
    upstream_http_timeout,
};

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    /// Upstream API root without a trailing slash, e.g. `https://disease.sh/v3/covid-19`.
    pub upstream_base: Arc<str>,
    pub historical_default_lastdays: u32,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    upstream_requests_total: AtomicU64,
    upstream_errors_total: AtomicU64,
    rejected_requests_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObservabilitySnapshot {
    pub upstream_requests_total: u64,
    pub upstream_errors_total: u64,
    pub rejected_requests_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            upstream_requests_total: self.upstream_requests_total.load(Ordering::Relaxed),
            upstream_errors_total: self.upstream_errors_total.load(Ordering::Relaxed),
            rejected_requests_total: self.rejected_requests_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_upstream_request(&self) {
        self.upstream_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_request(&self) {
        self.rejected_requests_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::with_upstream(upstream_base_url())
    }

    pub fn with_upstream(upstream_base: impl Into<String>) -> Self {
        let request_timeout = upstream_http_timeout();
        let connect_timeout = upstream_connect_timeout();
        let http_client = reqwest::Client::builder()
            .user_agent("outbreak-map/0.1")
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(request_timeout)
                    .connect_timeout(connect_timeout)
                    .build()
            })
            .unwrap_or_else(|e| {
                panic!("failed to build timeout-configured HTTP client: {e}");
            });
        let upstream_base: String = upstream_base.into();
        Self {
            http_client,
            upstream_base: Arc::from(upstream_base.trim_end_matches('/')),
            historical_default_lastdays: historical_default_lastdays(),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    /// Absolute upstream URL for an API path such as `/countries/US`.
    pub fn upstream_url(&self, path: &str) -> String {
        format!("{}{path}", self.upstream_base)
    }
}
