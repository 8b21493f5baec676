//! Layered configuration for the Pathfinder client.
//!
//! Values resolve in increasing precedence from built-in defaults, an
//! optional `.pathfinder.toml` file, `PATHFINDER_*` environment variables and
//! command-line flags. Applications that do not want the layering can build a
//! [`Config`] directly; every field has a sensible default.

mod defaults;
mod endpoint;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ENDPOINT, DEFAULT_LOG_FILTER, default_endpoint, default_endpoint_string,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use endpoint::{Endpoint, EndpointError};
pub use logging::{LogFormat, LogFormatParseError};

/// Client configuration shared by applications embedding the library.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "PATHFINDER")]
pub struct Config {
    /// WebSocket URL of the routing service.
    #[serde(default = "defaults::default_endpoint_string")]
    #[ortho_config(default = defaults::default_endpoint_string())]
    pub endpoint: String,
    /// Application identifier used to look up the default cluster.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Milliseconds after which an unanswered call fails with a timeout.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "defaults::default_log_format")]
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint_string(),
            application_id: None,
            request_timeout_ms: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Raw endpoint text as configured.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// Parses and validates the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] when the endpoint is not a `ws`/`wss` URL.
    pub fn endpoint_url(&self) -> Result<Endpoint, EndpointError> {
        self.endpoint.parse()
    }

    /// Application identifier, when configured.
    #[must_use]
    pub fn application_id(&self) -> Option<&str> {
        self.application_id.as_deref()
    }

    /// Per-call timeout, when configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
