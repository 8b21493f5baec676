//! Recording connection used in tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::connection::{Connection, ConnectionState};
use crate::error::ConnectionError;

#[derive(Debug)]
struct RecordingState {
    state: ConnectionState,
    sent: Vec<String>,
    closes: usize,
    refuse_sends: Option<String>,
}

/// Test double that records every message the client writes.
#[derive(Debug, Clone)]
pub struct RecordingConnection {
    shared: Arc<Mutex<RecordingState>>,
}

impl RecordingConnection {
    /// Creates a connection reporting `state`.
    pub fn new(state: ConnectionState) -> Self {
        Self {
            shared: Arc::new(Mutex::new(RecordingState {
                state,
                sent: Vec::new(),
                closes: 0,
                refuse_sends: None,
            })),
        }
    }

    /// Returns a handle for steering the connection and asserting on it.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn with<R>(&self, action: impl FnOnce(&mut RecordingState) -> R) -> R {
        action(&mut self.shared.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Connection for RecordingConnection {
    fn state(&self) -> ConnectionState {
        self.with(|recorded| recorded.state)
    }

    fn send(&mut self, text: &str) -> Result<(), ConnectionError> {
        self.with(|recorded| {
            if let Some(reason) = &recorded.refuse_sends {
                return Err(ConnectionError::send(reason.clone()));
            }
            recorded.sent.push(text.to_owned());
            Ok(())
        })
    }

    fn close(&mut self) {
        self.with(|recorded| {
            recorded.closes += 1;
            recorded.state = ConnectionState::Closed;
        });
    }
}

/// Shared view of a [`RecordingConnection`] kept by the test.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    shared: Arc<Mutex<RecordingState>>,
}

impl ConnectionHandle {
    fn with<R>(&self, action: impl FnOnce(&mut RecordingState) -> R) -> R {
        action(&mut self.shared.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Changes the state the connection reports.
    pub fn set_state(&self, state: ConnectionState) {
        self.with(|recorded| recorded.state = state);
    }

    /// Makes every later send fail with `reason`.
    pub fn refuse_sends(&self, reason: &str) {
        self.with(|recorded| recorded.refuse_sends = Some(reason.to_owned()));
    }

    /// Lets later sends through again.
    pub fn accept_sends(&self) {
        self.with(|recorded| recorded.refuse_sends = None);
    }

    /// Messages written so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.with(|recorded| recorded.sent.clone())
    }

    /// Messages written so far, decoded as JSON.
    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|text| serde_json::from_str(text).expect("client wrote invalid JSON"))
            .collect()
    }

    /// Number of written messages with the given `operation` field.
    pub fn sent_operations(&self, operation: &str) -> usize {
        self.sent_json()
            .iter()
            .filter(|message| {
                message.get("operation").and_then(serde_json::Value::as_str) == Some(operation)
            })
            .count()
    }

    /// `operation entityKind` of each written message, in order.
    pub fn sent_requests(&self) -> Vec<String> {
        self.sent_json()
            .iter()
            .map(|message| {
                let field = |name: &str| {
                    message
                        .get(name)
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or_default()
                        .to_owned()
                };
                format!("{} {}", field("operation"), field("entityKind"))
            })
            .collect()
    }

    /// Number of times the client closed the connection.
    pub fn closes(&self) -> usize {
        self.with(|recorded| recorded.closes)
    }
}
