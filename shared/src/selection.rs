use std::fmt;

use tracing::{debug, warn};

use crate::metric::Metric;
use crate::snapshot::{LatLng, RawSnapshot, StatRecord, normalize};
use crate::source::FetchError;

pub const WORLDWIDE_KEY: &str = "worldwide";
pub const DEFAULT_CENTER: LatLng = LatLng::new(34.80746, -40.4796);
pub const DEFAULT_ZOOM: f64 = 3.0;
pub const COUNTRY_ZOOM: f64 = 4.0;

/// Geographic selection: everything, or one country by its selection key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    #[default]
    Worldwide,
    Country(String),
}

impl Scope {
    /// Parse a selector value. `"worldwide"` (any case) is the global scope,
    /// anything else non-empty is a country code.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if key.eq_ignore_ascii_case(WORLDWIDE_KEY) {
            Some(Self::Worldwide)
        } else {
            Some(Self::Country(key.to_string()))
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Worldwide => WORLDWIDE_KEY,
            Self::Country(code) => code,
        }
    }

    pub fn country_code(&self) -> Option<&str> {
        match self {
            Self::Worldwide => None,
            Self::Country(code) => Some(code),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// The one selection shared by every display surface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionState {
    pub scope: Scope,
    pub metric: Metric,
    pub viewport: Viewport,
}

/// Ticket for an in-flight scope fetch. Only the latest ticket may commit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct ScopeRequest {
    generation: u64,
    scope: Scope,
}

impl ScopeRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SelectionError {
    /// A newer request was issued after this one; its result was dropped.
    #[error("stale response discarded (generation {generation}, latest {latest})")]
    Stale { generation: u64, latest: u64 },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Country payload without coordinates; the map cannot be re-centred.
    #[error("snapshot for {code} has no coordinates")]
    MissingLocation { code: String },
}

/// Owner of [`SelectionState`] and the only place it is mutated.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    state: SelectionState,
    generation: u64,
    pending: Option<Scope>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Generation of the most recently issued scope request.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Scope the user will end up with: the newest in-flight request if any,
    /// otherwise the committed scope.
    pub fn target_scope(&self) -> &Scope {
        self.pending.as_ref().unwrap_or(&self.state.scope)
    }

    /// Overwrite the metric and nothing else. Returns whether it changed.
    pub fn select_metric(&mut self, metric: Metric) -> bool {
        if self.state.metric == metric {
            return false;
        }
        self.state.metric = metric;
        true
    }

    /// Issue a scope request. Any earlier request still in flight becomes stale.
    pub fn begin_scope_change(&mut self, scope: Scope) -> ScopeRequest {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(scope.clone());
        ScopeRequest {
            generation: self.generation,
            scope,
        }
    }

    pub fn is_current(&self, request: &ScopeRequest) -> bool {
        request.generation == self.generation
    }

    /// Commit the fetch result for `request`.
    ///
    /// On success the scope and (for countries) the viewport centre and zoom
    /// are replaced in one assignment and the normalized snapshot is returned.
    /// Stale requests, fetch failures and country payloads without coordinates
    /// leave the state untouched.
    pub fn complete_scope_change(
        &mut self,
        request: &ScopeRequest,
        fetched: Result<RawSnapshot, FetchError>,
    ) -> Result<StatRecord, SelectionError> {
        if !self.is_current(request) {
            debug!(
                scope = %request.scope,
                generation = request.generation,
                latest = self.generation,
                "discarding stale scope response"
            );
            return Err(SelectionError::Stale {
                generation: request.generation,
                latest: self.generation,
            });
        }
        self.pending = None;

        let raw = fetched.inspect_err(|e| {
            warn!(scope = %request.scope, error = %e, "scope fetch failed; keeping previous selection");
        })?;
        let record = normalize(&raw);

        let viewport = match &request.scope {
            Scope::Worldwide => self.state.viewport,
            Scope::Country(code) => {
                let Some(center) = record.location else {
                    warn!(scope = %request.scope, "country snapshot has no coordinates");
                    return Err(SelectionError::MissingLocation { code: code.clone() });
                };
                Viewport {
                    center,
                    zoom: COUNTRY_ZOOM,
                }
            }
        };

        self.state = SelectionState {
            scope: request.scope.clone(),
            metric: self.state.metric,
            viewport,
        };
        Ok(record)
    }
}
