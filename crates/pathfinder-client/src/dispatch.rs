//! Routing of inbound messages to pending calls and subscriptions.
//!
//! One message may complete a pending call and notify a subscription at the
//! same time; the two are independent consumers. Waiters are completed while
//! the client lock is held, subscription callbacks are returned as
//! [`Notification`]s and run after the lock is released.

use tracing::{debug, error, warn};

use crate::client::WeakClient;
use crate::entity::{Entity, EntityId, Route};
use crate::error::{ClientError, DispatchError};
use crate::kind::{EntityKind, MessageKind, OperationKind};
use crate::protocol::{EntityPayload, ServerMessage};
use crate::registry::{
    CallKey, CallSlot, Claim, Notification, PendingCallRegistry, Resolved, SubscriptionRegistry,
};
use crate::reply::Resolution;

/// Tracing target for inbound message handling.
pub(crate) const DISPATCH_TARGET: &str = "pathfinder_client::dispatch";

/// Summary of what one inbound message did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    resolved: bool,
    notified: usize,
}

impl Delivery {
    /// Returns `true` when the message completed (or was absorbed by) a
    /// pending call.
    #[must_use]
    pub const fn resolved_call(&self) -> bool {
        self.resolved
    }

    /// Number of subscription callbacks invoked.
    #[must_use]
    pub const fn notified(&self) -> usize {
        self.notified
    }
}

/// Effects of one message, applied once the client lock is released.
pub(crate) struct Dispatched {
    resolved: bool,
    notifications: Vec<Notification>,
}

impl Dispatched {
    fn new(resolved: bool, notification: Option<Notification>) -> Self {
        Self {
            resolved,
            notifications: notification.into_iter().collect(),
        }
    }

    /// Runs the subscription callbacks.
    pub(crate) fn deliver(self) -> Delivery {
        let notified = self.notifications.len();
        for notification in self.notifications {
            notification.deliver();
        }
        Delivery {
            resolved: self.resolved,
            notified,
        }
    }
}

pub(crate) struct Dispatcher<'state> {
    pending: &'state mut PendingCallRegistry,
    subscriptions: &'state mut SubscriptionRegistry,
    client: &'state WeakClient,
}

impl<'state> Dispatcher<'state> {
    pub(crate) const fn new(
        pending: &'state mut PendingCallRegistry,
        subscriptions: &'state mut SubscriptionRegistry,
        client: &'state WeakClient,
    ) -> Self {
        Self {
            pending,
            subscriptions,
            client,
        }
    }

    /// Classifies one message and routes it.
    pub(crate) fn dispatch(&mut self, text: &str) -> Result<Dispatched, DispatchError> {
        let result = ServerMessage::parse(text).and_then(|message| self.route_message(message));
        if let Err(failure) = &result {
            report(failure);
        }
        result
    }

    fn route_message(&mut self, message: ServerMessage) -> Result<Dispatched, DispatchError> {
        let kind = message.kind();
        debug!(target: DISPATCH_TARGET, %kind, "dispatching inbound message");
        match message {
            ServerMessage::Created(payload) => {
                self.entity_message(kind, OperationKind::Create, payload)
            }
            ServerMessage::Read(payload) => self.entity_message(kind, OperationKind::Read, payload),
            ServerMessage::Updated(payload) => {
                self.entity_message(kind, OperationKind::Update, payload)
            }
            ServerMessage::Deleted(payload) => {
                self.entity_message(kind, OperationKind::Delete, payload)
            }
            ServerMessage::Routed(payload) => {
                let route = Route::new(payload.entity_kind, payload.id, payload.route);
                self.routed(route)
            }
            ServerMessage::Subscribed(ack) => {
                let slot = entity_slot(OperationKind::Subscribe, ack.entity_kind, ack.id);
                self.acknowledged(kind, &slot, Resolution::Id(ack.id))
            }
            ServerMessage::RouteSubscribed(ack) => {
                let slot = entity_slot(OperationKind::RouteSubscribe, ack.entity_kind, ack.id);
                self.acknowledged(kind, &slot, Resolution::Id(ack.id))
            }
            ServerMessage::ApplicationCluster(payload) => {
                let slot = CallSlot::Keyed(CallKey::ApplicationCluster {
                    application: payload.id,
                });
                self.acknowledged(kind, &slot, Resolution::Id(payload.value))
            }
            ServerMessage::Error(payload) => {
                let reason = ClientError::Protocol {
                    message: payload.message.clone(),
                };
                let slot = payload
                    .operation
                    .zip(payload.entity_kind)
                    .and_then(|(operation, entity_kind)| {
                        CallSlot::for_entity(operation, entity_kind, payload.id)
                    });
                let correlated = slot.is_some_and(|target| {
                    let delivered =
                        self.pending.resolve(&target, Err(reason)) == Resolved::Delivered;
                    if delivered && self.subscriptions.abandon(&target) {
                        debug!(
                            target: DISPATCH_TARGET,
                            slot = %target,
                            "dropped subscription the service refused"
                        );
                    }
                    delivered
                });
                Err(DispatchError::Server {
                    message: payload.message,
                    correlated,
                })
            }
        }
    }

    fn entity_message(
        &mut self,
        kind: MessageKind,
        operation: OperationKind,
        payload: EntityPayload,
    ) -> Result<Dispatched, DispatchError> {
        let entity_kind = payload.entity_kind;
        let subject = payload.subject_id();
        let slot = CallSlot::for_entity(operation, entity_kind, subject);
        let decoded = Entity::decode(entity_kind, payload.value, self.client);
        let claim = slot
            .as_ref()
            .map_or(Claim::Vacant, |target| self.pending.claim(target));

        let entity = match decoded {
            Ok(entity) => entity,
            Err(source) => {
                return if let Claim::Live(waiter) = claim {
                    warn!(
                        target: DISPATCH_TARGET,
                        %kind,
                        entity_kind = %entity_kind,
                        error = %source,
                        "failing call with undecodable payload"
                    );
                    waiter.fail(ClientError::MalformedPayload {
                        kind: entity_kind,
                        source,
                    });
                    Ok(Dispatched::new(true, None))
                } else {
                    Err(DispatchError::InvalidEntity {
                        message: kind,
                        kind: entity_kind,
                        source,
                    })
                };
            }
        };

        let notification = if operation.is_keyed() {
            self.subscriptions.notify_entity(&entity)
        } else {
            None
        };
        let id = entity.id();
        let resolved = match claim {
            Claim::Live(waiter) => {
                waiter.resolve(Resolution::Entity(entity));
                true
            }
            Claim::Expired => {
                debug!(
                    target: DISPATCH_TARGET,
                    %kind,
                    entity_kind = %entity_kind,
                    id = %id,
                    "reply absorbed by expired call"
                );
                true
            }
            Claim::Vacant => false,
        };
        if !resolved && notification.is_none() {
            return Err(DispatchError::UnmatchedResponse {
                kind,
                subject: format!("{entity_kind} {id}"),
            });
        }
        debug!(
            target: DISPATCH_TARGET,
            %kind,
            entity_kind = %entity_kind,
            id = %id,
            resolved,
            notified = notification.is_some(),
            "entity message delivered"
        );
        Ok(Dispatched::new(resolved, notification))
    }

    fn routed(&mut self, route: Route) -> Result<Dispatched, DispatchError> {
        let slot = entity_slot(OperationKind::Route, route.kind(), route.id());
        let subject = format!("{} {}", route.kind(), route.id());
        let notification = self.subscriptions.notify_route(&route);
        let resolved = self.pending.resolve(&slot, Ok(Resolution::Route(route)));
        if resolved == Resolved::Unmatched && notification.is_none() {
            return Err(DispatchError::UnmatchedResponse {
                kind: MessageKind::Routed,
                subject,
            });
        }
        Ok(Dispatched::new(
            resolved != Resolved::Unmatched,
            notification,
        ))
    }

    fn acknowledged(
        &mut self,
        kind: MessageKind,
        slot: &CallSlot,
        resolution: Resolution,
    ) -> Result<Dispatched, DispatchError> {
        match self.pending.resolve(slot, Ok(resolution)) {
            Resolved::Unmatched => Err(DispatchError::UnmatchedResponse {
                kind,
                subject: slot.to_string(),
            }),
            Resolved::Delivered | Resolved::Expired => Ok(Dispatched::new(true, None)),
        }
    }
}

fn entity_slot(operation: OperationKind, kind: EntityKind, id: EntityId) -> CallSlot {
    CallSlot::Keyed(CallKey::Entity {
        operation,
        kind,
        id,
    })
}

fn report(failure: &DispatchError) {
    match failure {
        DispatchError::Server {
            message,
            correlated,
        } => error!(
            target: DISPATCH_TARGET,
            %message,
            correlated = *correlated,
            "service reported an error"
        ),
        DispatchError::UnmatchedResponse { kind, subject } => warn!(
            target: DISPATCH_TARGET,
            %kind,
            %subject,
            "no pending call or subscription matched"
        ),
        other => warn!(
            target: DISPATCH_TARGET,
            error = %other,
            "dropping inbound message"
        ),
    }
}
