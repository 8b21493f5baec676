//! Validation for the service endpoint URL.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Schemes accepted for the persistent connection.
const SUPPORTED_SCHEMES: &[&str] = &["ws", "wss"];

/// A validated WebSocket endpoint for the routing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Returns the underlying URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }

    /// Returns `true` when the endpoint uses TLS (`wss`).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "wss"
    }

    /// Returns the host component.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let url = Url::parse(trimmed).map_err(|source| EndpointError::InvalidUrl {
            input: trimmed.to_owned(),
            source,
        })?;

        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(EndpointError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            });
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(EndpointError::MissingHost {
                input: trimmed.to_owned(),
            });
        }

        Ok(Self(url))
    }
}

/// Errors raised while validating the configured endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The endpoint is not a URL.
    #[error("endpoint '{input}' is not a valid URL: {source}")]
    InvalidUrl {
        /// Text that failed to parse.
        input: String,
        /// Parser failure.
        #[source]
        source: url::ParseError,
    },
    /// The endpoint does not use a WebSocket scheme.
    #[error("endpoint scheme '{scheme}' is not supported; use ws or wss")]
    UnsupportedScheme {
        /// Scheme found in the URL.
        scheme: String,
    },
    /// The endpoint has no host component.
    #[error("endpoint '{input}' does not name a host")]
    MissingHost {
        /// Text that failed validation.
        input: String,
    },
}
