use crate::logging::LogFormat;

/// Public endpoint of the hosted routing service.
pub const DEFAULT_ENDPOINT: &str = "wss://api.thepathfinder.xyz/socket";

/// Default log filter expression used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default service endpoint.
#[must_use]
pub const fn default_endpoint() -> &'static str {
    DEFAULT_ENDPOINT
}

/// Owned endpoint value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_endpoint_string() -> String {
    String::from(DEFAULT_ENDPOINT)
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    String::from(DEFAULT_LOG_FILTER)
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
