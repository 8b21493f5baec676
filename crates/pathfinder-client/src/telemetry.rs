//! Tracing setup for applications embedding the client.
//!
//! The client only emits `tracing` events (targets
//! `pathfinder_client::client` and `pathfinder_client::dispatch`).
//! Applications without their own subscriber can call [`initialise`] to get
//! formatted output on stderr driven by [`Config`].

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use pathfinder_config::{Config, LogFormat};
use thiserror::Error;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::UtcTime;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Boxed subscriber built from configuration.
pub type BoxedSubscriber = Box<dyn Subscriber + Send + Sync>;

/// Proof that the global subscriber is in place.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryHandle;

/// Errors raised while configuring tracing output.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Filter expression as configured.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another subscriber was already installed globally.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Builds a subscriber for `config` without installing it.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` is not a valid
/// `EnvFilter` expression.
pub fn subscriber(config: &Config) -> Result<BoxedSubscriber, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter()).map_err(|error| {
        TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        }
    })?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339());
    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}

/// Installs the global subscriber on first use.
///
/// Later calls return a handle without touching global state, even when
/// given a different configuration.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a different
/// global subscriber is already installed.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            tracing::subscriber::set_global_default(subscriber(config)?)
                .map_err(TelemetryError::from)
        })
        .map(|_| TelemetryHandle)
}
