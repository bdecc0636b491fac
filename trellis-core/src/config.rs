// Dispatcher configuration

use crate::content_negotiation::TieBreak;
use crate::pagination::{DEFAULT_MAX_RESULTS, MAX_RESULTS_CAP};
use serde::{Deserialize, Serialize};

/// Tunables of a [`Dispatcher`](crate::dispatcher::Dispatcher).
///
/// Every field has a default, so partial configuration files deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Page size when a request does not send `max-results`.
    pub default_max_results: usize,
    /// Largest page size a client may request.
    pub max_results_cap: usize,
    /// Choice between equally weighted `Accept` entries.
    pub tie_break: TieBreak,
    /// Path the root resource is mounted at.
    pub base_path: String,
    /// Prefix for every emitted href, e.g. `https://api.example.com`.
    pub site_url: String,
    /// Include `uri_templates` in the root resource payload.
    pub expose_uri_templates: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_max_results: DEFAULT_MAX_RESULTS,
            max_results_cap: MAX_RESULTS_CAP,
            tie_break: TieBreak::HeaderOrder,
            base_path: "/".to_string(),
            site_url: String::new(),
            expose_uri_templates: true,
        }
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_max_results(mut self, value: usize) -> Self {
        self.default_max_results = value;
        self
    }

    pub fn with_max_results_cap(mut self, value: usize) -> Self {
        self.max_results_cap = value;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = site_url.into();
        self
    }

    pub fn with_uri_templates(mut self, expose: bool) -> Self {
        self.expose_uri_templates = expose;
        self
    }
}
