//! Error types surfaced by the client.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionState;
use crate::kind::{EntityKind, MessageKind};
use crate::registry::CallKey;

/// Failures returned by client operations, either synchronously or through a
/// [`Reply`](crate::Reply).
#[derive(Debug, Error)]
pub enum ClientError {
    /// An identical id-keyed call is still awaiting its reply.
    #[error("a request for {key} is already pending")]
    AlreadyPending {
        /// Key of the outstanding call.
        key: CallKey,
    },

    /// The connection is closing or closed, so nothing can be sent.
    #[error("transport is {state}; request not sent")]
    TransportUnavailable {
        /// Connection state observed at call time.
        state: ConnectionState,
    },

    /// The connection closed before a reply arrived.
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,

    /// No reply arrived within the configured timeout.
    #[error("no reply within {}ms", after.as_millis())]
    Timeout {
        /// Configured timeout.
        after: Duration,
    },

    /// The service reported a failure for this call.
    #[error("service reported an error: {message}")]
    Protocol {
        /// Message supplied by the service.
        message: String,
    },

    /// The connection refused the outgoing message.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Codec(#[from] serde_json::Error),

    /// The reply carried an entity that could not be decoded.
    #[error("malformed {kind} payload in reply: {source}")]
    MalformedPayload {
        /// Kind of entity being decoded.
        kind: EntityKind,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },

    /// The default-cluster lookup needs an application identifier.
    #[error("no application id configured for the default-cluster lookup")]
    MissingApplicationId,

    /// A waiter was resolved with a value of the wrong shape.
    #[error("reply did not carry the expected {expected}")]
    UnexpectedReply {
        /// Description of the expected value.
        expected: &'static str,
    },
}

impl ClientError {
    /// Returns `true` when the call can never complete because the connection
    /// is gone, as opposed to a call that failed on its own merits.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::TransportUnavailable { .. }
        )
    }
}

/// Problems observed while handling one inbound message.
///
/// These never stop the client; they are logged and returned so callers can
/// count or surface them.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message was not valid JSON or did not match its declared kind.
    #[error("malformed message: {source}")]
    Malformed {
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },

    /// The message declared no kind, or a kind this client does not know.
    #[error("unknown message kind '{}'", kind.as_deref().unwrap_or("<missing>"))]
    UnknownMessage {
        /// Declared kind, if any.
        kind: Option<String>,
    },

    /// No pending call or subscription matched the message.
    #[error("no pending call or subscription for {kind} {subject}")]
    UnmatchedResponse {
        /// Kind of the unmatched message.
        kind: MessageKind,
        /// Entity or application the message referred to.
        subject: String,
    },

    /// The service reported an error.
    #[error("service error: {message}")]
    Server {
        /// Message supplied by the service.
        message: String,
        /// Whether the error was routed to a specific pending call.
        correlated: bool,
    },

    /// A message carried an entity value that could not be decoded.
    #[error("invalid {kind} in {message}: {source}")]
    InvalidEntity {
        /// Kind of the message carrying the entity.
        message: MessageKind,
        /// Entity kind being decoded.
        kind: EntityKind,
        /// Decoder failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Failures reported by a [`Connection`](crate::Connection) implementation.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection could not deliver the message.
    #[error("failed to send message: {message}")]
    Send {
        /// Description supplied by the connection.
        message: String,
    },

    /// I/O error underneath the connection.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Builds a send failure from a description.
    #[must_use]
    pub fn send(message: impl Into<String>) -> Self {
        Self::Send {
            message: message.into(),
        }
    }
}
