//! The persistent connection the client writes requests to.
//!
//! The client never reads from the connection itself. Whatever drives the
//! connection (a WebSocket task, a test harness) pushes inbound events into
//! [`Client::handle_open`](crate::Client::handle_open),
//! [`Client::handle_message`](crate::Client::handle_message) and
//! [`Client::handle_close`](crate::Client::handle_close).

use std::fmt;

use crate::error::ConnectionError;

/// Lifecycle of the connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// The connection is being established; requests are queued.
    Connecting,
    /// The connection is open; requests are sent immediately.
    Open,
    /// The connection is shutting down; requests are rejected.
    Closing,
    /// The connection is gone; requests are rejected.
    Closed,
}

impl ConnectionState {
    /// Returns `true` when new requests must be rejected.
    #[must_use]
    pub const fn rejects_requests(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Returns the later of two states, so transitions never move backward.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        self.max(next)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        formatter.write_str(label)
    }
}

/// Outbound half of a message-oriented connection.
///
/// Implementations deliver each `send` as one complete text message. They
/// must not call back into the [`Client`](crate::Client) from `send` or
/// `close`; the client holds its internal lock while calling them.
pub trait Connection: Send {
    /// Current state as seen by the connection.
    fn state(&self) -> ConnectionState;

    /// Sends one serialized message.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the message could not be handed to the
    /// connection.
    fn send(&mut self, text: &str) -> Result<(), ConnectionError>;

    /// Starts closing the connection.
    fn close(&mut self);
}
