//! Bookkeeping for requests awaiting a reply.
//!
//! Calls that carry an id at request time are keyed by operation, entity kind
//! and id; at most one may be outstanding per key. `Create` calls have no id
//! until the service assigns one, so they wait in a FIFO queue per operation
//! and entity kind and are matched to replies in send order.
//!
//! A queued call that times out leaves a tombstone behind. The service still
//! replies to it, and the tombstone absorbs that reply so later calls in the
//! queue stay matched to their own replies.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use crate::entity::EntityId;
use crate::error::ClientError;
use crate::kind::{EntityKind, OperationKind};
use crate::reply::{Resolution, Waiter};

/// Identity of an id-keyed pending call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKey {
    /// A call about one entity.
    Entity {
        /// Requested operation.
        operation: OperationKind,
        /// Kind of the entity.
        kind: EntityKind,
        /// Identifier of the entity.
        id: EntityId,
    },
    /// The default-cluster lookup for an application.
    ApplicationCluster {
        /// Application identifier.
        application: String,
    },
}

impl fmt::Display for CallKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity {
                operation,
                kind,
                id,
            } => write!(formatter, "{operation} {kind} {id}"),
            Self::ApplicationCluster { application } => {
                write!(formatter, "default cluster of application '{application}'")
            }
        }
    }
}

/// Identity of a FIFO queue of unkeyed calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct QueueKey {
    pub(crate) operation: OperationKind,
    pub(crate) kind: EntityKind,
}

/// Where a call waits for its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CallSlot {
    Keyed(CallKey),
    Queued(QueueKey),
}

impl CallSlot {
    /// Slot for a call about one entity. Keyed operations need `id`; queued
    /// ones ignore it.
    pub(crate) fn for_entity(
        operation: OperationKind,
        kind: EntityKind,
        id: Option<EntityId>,
    ) -> Option<Self> {
        if !operation.is_keyed() {
            return Some(Self::Queued(QueueKey { operation, kind }));
        }
        id.map(|subject| {
            Self::Keyed(CallKey::Entity {
                operation,
                kind,
                id: subject,
            })
        })
    }
}

impl fmt::Display for CallSlot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyed(key) => key.fmt(formatter),
            Self::Queued(queue) => write!(formatter, "{} {}", queue.operation, queue.kind),
        }
    }
}

/// Receipt for a registration, used to withdraw it if the send fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CallToken {
    slot: CallSlot,
    sequence: u64,
}

impl CallToken {
    pub(crate) const fn slot(&self) -> &CallSlot {
        &self.slot
    }
}

/// Result of offering a reply to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolved {
    /// A live waiter received the reply.
    Delivered,
    /// The reply belonged to a call that had already timed out.
    Expired,
    /// No call was waiting in the slot.
    Unmatched,
}

/// What [`PendingCallRegistry::claim`] found in a slot.
#[derive(Debug)]
pub(crate) enum Claim {
    Live(Waiter),
    Expired,
    Vacant,
}

#[derive(Debug)]
struct PendingCall {
    waiter: Option<Waiter>,
    deadline: Option<Instant>,
    sequence: u64,
}

impl PendingCall {
    fn is_overdue(&self, now: Instant) -> bool {
        self.waiter.is_some() && self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

#[derive(Debug, Default)]
pub(crate) struct PendingCallRegistry {
    keyed: HashMap<CallKey, PendingCall>,
    queued: HashMap<QueueKey, VecDeque<PendingCall>>,
    timeout: Option<Duration>,
    next_sequence: u64,
}

impl PendingCallRegistry {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Records `waiter` under `slot`.
    ///
    /// Keyed slots reject a second registration while the first is live.
    pub(crate) fn register(
        &mut self,
        slot: &CallSlot,
        waiter: Waiter,
        now: Instant,
    ) -> Result<CallToken, ClientError> {
        let sequence = self.next_sequence;
        let call = PendingCall {
            waiter: Some(waiter),
            deadline: self.timeout.and_then(|timeout| now.checked_add(timeout)),
            sequence,
        };
        match slot {
            CallSlot::Keyed(key) => {
                if self.keyed.contains_key(key) {
                    return Err(ClientError::AlreadyPending { key: key.clone() });
                }
                self.keyed.insert(key.clone(), call);
            }
            CallSlot::Queued(queue) => self.queued.entry(*queue).or_default().push_back(call),
        }
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(CallToken {
            slot: slot.clone(),
            sequence,
        })
    }

    /// Removes a registration whose request never left the client.
    pub(crate) fn withdraw(&mut self, token: &CallToken) -> Option<Waiter> {
        match &token.slot {
            CallSlot::Keyed(key) => {
                let matches = self
                    .keyed
                    .get(key)
                    .is_some_and(|call| call.sequence == token.sequence);
                if matches {
                    self.keyed.remove(key).and_then(|call| call.waiter)
                } else {
                    None
                }
            }
            CallSlot::Queued(queue) => {
                let calls = self.queued.get_mut(queue)?;
                let position = calls
                    .iter()
                    .position(|call| call.sequence == token.sequence)?;
                let waiter = calls.remove(position).and_then(|call| call.waiter);
                if calls.is_empty() {
                    self.queued.remove(queue);
                }
                waiter
            }
        }
    }

    /// Removes whatever waits in `slot`.
    pub(crate) fn claim(&mut self, slot: &CallSlot) -> Claim {
        let call = match slot {
            CallSlot::Keyed(key) => self.keyed.remove(key),
            CallSlot::Queued(queue) => self.pop_front(*queue),
        };
        match call.map(|call| call.waiter) {
            Some(Some(waiter)) => Claim::Live(waiter),
            Some(None) => Claim::Expired,
            None => Claim::Vacant,
        }
    }

    /// Completes the call waiting in `slot`, if any.
    pub(crate) fn resolve(
        &mut self,
        slot: &CallSlot,
        outcome: Result<Resolution, ClientError>,
    ) -> Resolved {
        match self.claim(slot) {
            Claim::Live(waiter) => {
                waiter.complete(outcome);
                Resolved::Delivered
            }
            Claim::Expired => Resolved::Expired,
            Claim::Vacant => Resolved::Unmatched,
        }
    }

    fn pop_front(&mut self, queue: QueueKey) -> Option<PendingCall> {
        let calls = self.queued.get_mut(&queue)?;
        let call = calls.pop_front();
        if calls.is_empty() {
            self.queued.remove(&queue);
        }
        call
    }

    /// Returns `true` when a live call waits in `slot`.
    pub(crate) fn is_pending(&self, slot: &CallSlot) -> bool {
        match slot {
            CallSlot::Keyed(key) => self.keyed.contains_key(key),
            CallSlot::Queued(queue) => self
                .queued
                .get(queue)
                .is_some_and(|calls| calls.iter().any(|call| call.waiter.is_some())),
        }
    }

    /// Fails every outstanding call with an error built by `reason`.
    pub(crate) fn fail_all(&mut self, reason: impl Fn() -> ClientError) -> usize {
        let keyed = self.keyed.drain().map(|(_, call)| call);
        let queued = self.queued.drain().flat_map(|(_, calls)| calls);
        let mut failed = 0;
        for waiter in keyed.chain(queued).filter_map(|call| call.waiter) {
            waiter.fail(reason());
            failed += 1;
        }
        failed
    }

    /// Fails every call whose deadline has passed, returning their slots.
    ///
    /// Keyed calls are removed so the key can be reused. Queued calls become
    /// tombstones that absorb their eventual reply.
    pub(crate) fn expire(&mut self, now: Instant) -> Vec<CallSlot> {
        let Some(after) = self.timeout else {
            return Vec::new();
        };
        let overdue: Vec<CallKey> = self
            .keyed
            .iter()
            .filter(|(_, call)| call.is_overdue(now))
            .map(|(key, _)| key.clone())
            .collect();
        let mut expired = Vec::new();
        for key in overdue {
            if let Some(waiter) = self.keyed.remove(&key).and_then(|call| call.waiter) {
                waiter.fail(ClientError::Timeout { after });
                expired.push(CallSlot::Keyed(key));
            }
        }
        for (queue, calls) in &mut self.queued {
            for call in calls.iter_mut().filter(|call| call.is_overdue(now)) {
                if let Some(waiter) = call.waiter.take() {
                    waiter.fail(ClientError::Timeout { after });
                    expired.push(CallSlot::Queued(*queue));
                }
            }
        }
        expired
    }

    /// Number of calls still awaiting a reply, excluding tombstones.
    pub(crate) fn len(&self) -> usize {
        let queued = self
            .queued
            .values()
            .flatten()
            .filter(|call| call.waiter.is_some())
            .count();
        self.keyed.len() + queued
    }
}
