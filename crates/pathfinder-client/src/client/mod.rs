//! The client façade.
//!
//! A [`Client`] owns one connection, one pending-call registry, one
//! subscription registry and the backlog of requests written before the
//! connection opened. All of it sits behind a single mutex; inbound messages
//! are handled one at a time, and subscription callbacks run after the lock
//! is released so they may call back into the client.

mod backlog;
mod operations;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Instant;

use pathfinder_config::Config;
use tracing::{debug, info, warn};

use self::backlog::{Backlog, QueuedRequest};
use crate::connection::{Connection, ConnectionState};
use crate::dispatch::{Delivery, Dispatcher};
use crate::entity::{EntityId, Route};
use crate::error::{ClientError, DispatchError};
use crate::kind::EntityKind;
use crate::protocol::Request;
use crate::registry::{CallToken, PendingCallRegistry, SubscriptionRegistry};
use crate::reply::{Convert, Reply, reply_channel};

/// Tracing target for outbound traffic and lifecycle changes.
pub(crate) const CLIENT_TARGET: &str = "pathfinder_client::client";

/// Result of a subscribe call.
#[derive(Debug)]
#[must_use = "a requested subscription carries the acknowledgement reply"]
pub enum SubscribeOutcome {
    /// A subscribe request was sent; the reply resolves on acknowledgement.
    Requested(Reply<EntityId>),
    /// A subscription already existed or was in flight; only the callback
    /// was replaced and nothing was sent.
    Reused,
}

impl SubscribeOutcome {
    /// Returns the acknowledgement reply, if a request was sent.
    #[must_use]
    pub fn into_reply(self) -> Option<Reply<EntityId>> {
        match self {
            Self::Requested(reply) => Some(reply),
            Self::Reused => None,
        }
    }

    /// Returns `true` when no request was sent.
    #[must_use]
    pub const fn is_reused(&self) -> bool {
        matches!(self, Self::Reused)
    }
}

struct ClientState {
    connection: Box<dyn Connection>,
    lifecycle: ConnectionState,
    backlog: Backlog,
    pending: PendingCallRegistry,
    subscriptions: SubscriptionRegistry,
    application_id: Option<String>,
}

impl ClientState {
    /// Lifecycle as seen by callers. A connection that reports closing or
    /// closed wins over the client's own view.
    fn effective_state(&self) -> ConnectionState {
        let observed = self.connection.state();
        if observed.rejects_requests() {
            self.lifecycle.advance(observed)
        } else {
            self.lifecycle
        }
    }

    fn ensure_accepting(&self) -> Result<(), ClientError> {
        let state = self.effective_state();
        if state.rejects_requests() {
            return Err(ClientError::TransportUnavailable { state });
        }
        Ok(())
    }

    /// Registers a waiter for `request` and writes `text`, or queues it while
    /// the connection is still opening.
    fn submit<T>(
        &mut self,
        request: &Request,
        text: String,
        convert: Convert<T>,
    ) -> Result<Reply<T>, ClientError> {
        self.ensure_accepting()?;
        let (waiter, reply) = reply_channel(convert);
        let token = self
            .pending
            .register(request.slot(), waiter, Instant::now())?;
        if let Err(failure) = self.transmit(&token, text) {
            self.pending.withdraw(&token);
            warn!(
                target: CLIENT_TARGET,
                operation = %request.operation(),
                slot = %request.slot(),
                error = %failure,
                "request not sent"
            );
            return Err(failure);
        }
        debug!(
            target: CLIENT_TARGET,
            operation = %request.operation(),
            slot = %request.slot(),
            state = %self.lifecycle,
            "request accepted"
        );
        Ok(reply)
    }

    fn transmit(&mut self, token: &CallToken, text: String) -> Result<(), ClientError> {
        if self.lifecycle == ConnectionState::Connecting {
            self.backlog.push(token.clone(), text);
            return Ok(());
        }
        self.connection.send(&text)?;
        Ok(())
    }

    /// Writes one backlogged request. On failure its waiter is failed with
    /// the connection error and any subscription it started is dropped.
    fn flush(&mut self, request: &QueuedRequest) -> bool {
        let Err(failure) = self.connection.send(&request.text) else {
            return true;
        };
        let slot = request.token.slot();
        warn!(
            target: CLIENT_TARGET,
            slot = %slot,
            error = %failure,
            "failed to flush queued request"
        );
        if let Some(waiter) = self.pending.withdraw(&request.token) {
            waiter.fail(ClientError::Connection(failure));
        }
        self.subscriptions.abandon(slot);
        false
    }

    /// Moves to `Closed`, failing every waiter. Returns the number of calls
    /// failed, or `None` when already closed.
    fn shut_down(&mut self, close_connection: bool) -> Option<usize> {
        if self.lifecycle == ConnectionState::Closed {
            return None;
        }
        if close_connection {
            self.lifecycle = self.lifecycle.advance(ConnectionState::Closing);
            self.connection.close();
        }
        self.lifecycle = ConnectionState::Closed;
        let dropped = self.backlog.clear();
        self.subscriptions.clear();
        let failed = self.pending.fail_all(|| ClientError::ConnectionClosed);
        info!(
            target: CLIENT_TARGET,
            failed,
            dropped,
            "client closed"
        );
        Some(failed)
    }
}

/// Client for the routing service.
///
/// Cloning is cheap; clones share the same connection and registries.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Mutex<ClientState>>,
}

impl fmt::Debug for Client {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Client")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds a client writing to `connection`.
    ///
    /// The application identifier and per-call timeout are taken from
    /// `config`. When the connection already reports itself open the client
    /// starts open; otherwise requests queue until [`Client::handle_open`].
    pub fn new(connection: impl Connection + 'static, config: &Config) -> Self {
        let state = ClientState {
            lifecycle: connection.state(),
            connection: Box::new(connection),
            backlog: Backlog::default(),
            pending: PendingCallRegistry::new(config.request_timeout()),
            subscriptions: SubscriptionRegistry::default(),
            application_id: config.application_id().map(str::to_owned),
        };
        Self {
            shared: Arc::new(Mutex::new(state)),
        }
    }

    fn with_state<R>(&self, action: impl FnOnce(&mut ClientState) -> R) -> R {
        let mut guard = self
            .shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        action(&mut guard)
    }

    pub(crate) fn downgrade(&self) -> WeakClient {
        WeakClient {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.with_state(|state| state.effective_state())
    }

    /// Number of calls awaiting a reply.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.with_state(|state| state.pending.len())
    }

    /// Number of active entity and route subscriptions.
    #[must_use]
    pub fn subscriptions(&self) -> usize {
        self.with_state(|state| state.subscriptions.len())
    }

    /// Number of requests waiting for the connection to open.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.with_state(|state| state.backlog.len())
    }

    /// Latest route delivered to the route subscription for an entity.
    #[must_use]
    pub fn latest_route(&self, kind: EntityKind, id: EntityId) -> Option<Route> {
        self.with_state(|state| state.subscriptions.latest_route(kind, id).cloned())
    }

    /// Signals that the connection has opened.
    ///
    /// Flushes the backlog in call order. Only the first signal flushes; later
    /// ones are ignored.
    pub fn handle_open(&self) {
        self.with_state(|state| {
            if state.lifecycle != ConnectionState::Connecting {
                debug!(
                    target: CLIENT_TARGET,
                    state = %state.lifecycle,
                    "ignoring open signal"
                );
                return;
            }
            state.lifecycle = ConnectionState::Open;
            let queued = state.backlog.take();
            let count = queued.len();
            let failed = queued
                .into_iter()
                .filter(|request| !state.flush(request))
                .count();
            info!(target: CLIENT_TARGET, flushed = count, failed, "connection open");
        });
    }

    /// Handles one inbound text message.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the message is malformed, of an
    /// unknown kind, matched nothing, or reports a service error. These are
    /// informational; the client keeps working.
    pub fn handle_message(&self, text: &str) -> Result<Delivery, DispatchError> {
        let weak = self.downgrade();
        let dispatched = self.with_state(|state| {
            Dispatcher::new(&mut state.pending, &mut state.subscriptions, &weak).dispatch(text)
        })?;
        Ok(dispatched.deliver())
    }

    /// Signals that the connection has closed.
    ///
    /// Fails every pending call with [`ClientError::ConnectionClosed`].
    pub fn handle_close(&self) {
        self.with_state(|state| state.shut_down(false));
    }

    /// Closes the connection and fails every pending call with
    /// [`ClientError::ConnectionClosed`].
    ///
    /// Returns the number of calls failed; closing again returns zero.
    pub fn close(&self) -> usize {
        self.with_state(|state| state.shut_down(true))
            .unwrap_or_default()
    }

    /// Fails calls whose timeout has elapsed. Returns how many expired.
    ///
    /// A subscription whose acknowledgement timed out is dropped, so the
    /// caller may subscribe again.
    ///
    /// Does nothing unless a request timeout is configured. Applications call
    /// this from their own timer.
    pub fn expire_overdue(&self) -> usize {
        self.expire_overdue_at(Instant::now())
    }

    /// Like [`Client::expire_overdue`], measured against `now`.
    pub fn expire_overdue_at(&self, now: Instant) -> usize {
        let expired = self.with_state(|state| {
            let slots = state.pending.expire(now);
            for slot in &slots {
                state.subscriptions.abandon(slot);
            }
            slots.len()
        });
        if expired > 0 {
            warn!(target: CLIENT_TARGET, expired, "pending calls timed out");
        }
        expired
    }
}

/// Non-owning reference from entity handles back to their client.
#[derive(Clone, Default)]
pub(crate) struct WeakClient {
    shared: Weak<Mutex<ClientState>>,
}

impl WeakClient {
    /// A reference that never upgrades.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::default()
    }

    pub(crate) fn upgrade(&self) -> Result<Client, ClientError> {
        self.shared
            .upgrade()
            .map(|shared| Client { shared })
            .ok_or(ClientError::ConnectionClosed)
    }
}

impl fmt::Debug for WeakClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WeakClient")
            .field("live", &(self.shared.strong_count() > 0))
            .finish()
    }
}
