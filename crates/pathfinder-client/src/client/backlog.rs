//! Messages written before the connection opened.

use crate::registry::CallToken;

/// A serialized request together with the registration awaiting its reply.
#[derive(Debug)]
pub(crate) struct QueuedRequest {
    pub(crate) token: CallToken,
    pub(crate) text: String,
}

/// Requests awaiting the open signal, in call order.
#[derive(Debug, Default)]
pub(crate) struct Backlog {
    requests: Vec<QueuedRequest>,
}

impl Backlog {
    pub(crate) fn push(&mut self, token: CallToken, text: String) {
        self.requests.push(QueuedRequest { token, text });
    }

    /// Empties the backlog, returning its requests in call order.
    pub(crate) fn take(&mut self) -> Vec<QueuedRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Drops every queued request, returning how many were discarded.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.requests.len();
        self.requests.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.requests.len()
    }
}
