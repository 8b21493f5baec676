//! Local subscription table.
//!
//! Each entity has at most one entity subscription and one route
//! subscription. Subscribing again swaps the callback in place. The table
//! only ever holds the latest snapshot, so a callback sees the previous and
//! current state without the client keeping a history.

use std::collections::HashMap;

use super::pending::{CallKey, CallSlot};
use crate::entity::{Entity, EntityCallback, EntityId, Route, RouteCallback};
use crate::kind::{EntityKind, OperationKind};

/// Which of an entity's two subscriptions is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SubscriptionTarget {
    Entity,
    Route,
}

impl SubscriptionTarget {
    /// Subscription that a call of `operation` asks the service to start.
    const fn started_by(operation: OperationKind) -> Option<Self> {
        match operation {
            OperationKind::Subscribe => Some(Self::Entity),
            OperationKind::RouteSubscribe => Some(Self::Route),
            _ => None,
        }
    }
}

/// Outcome of registering a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Created,
    Replaced,
}

type SubscriptionKey = (EntityKind, EntityId);

struct EntitySubscription {
    snapshot: Entity,
    callback: EntityCallback,
}

struct RouteSubscription {
    subject: Entity,
    latest: Option<Route>,
    callback: RouteCallback,
}

/// A callback ready to run once the client lock is released.
pub(crate) enum Notification {
    Entity {
        callback: EntityCallback,
        previous: Entity,
        current: Entity,
    },
    Route {
        callback: RouteCallback,
        subject: Entity,
        route: Route,
    },
}

impl Notification {
    pub(crate) fn deliver(self) {
        match self {
            Self::Entity {
                callback,
                previous,
                current,
            } => callback(&previous, &current),
            Self::Route {
                callback,
                subject,
                route,
            } => callback(&subject, &route),
        }
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entities: HashMap<SubscriptionKey, EntitySubscription>,
    routes: HashMap<SubscriptionKey, RouteSubscription>,
}

impl SubscriptionRegistry {
    pub(crate) fn upsert_entity(&mut self, snapshot: Entity, callback: EntityCallback) -> Upsert {
        let key = (snapshot.kind(), snapshot.id());
        if let Some(existing) = self.entities.get_mut(&key) {
            existing.callback = callback;
            return Upsert::Replaced;
        }
        self.entities
            .insert(key, EntitySubscription { snapshot, callback });
        Upsert::Created
    }

    pub(crate) fn upsert_route(&mut self, subject: Entity, callback: RouteCallback) -> Upsert {
        let key = (subject.kind(), subject.id());
        if let Some(existing) = self.routes.get_mut(&key) {
            existing.callback = callback;
            return Upsert::Replaced;
        }
        self.routes.insert(
            key,
            RouteSubscription {
                subject,
                latest: None,
                callback,
            },
        );
        Upsert::Created
    }

    /// Drops a subscription. Removing an absent one is a no-op.
    pub(crate) fn remove(
        &mut self,
        target: SubscriptionTarget,
        kind: EntityKind,
        id: EntityId,
    ) -> bool {
        let key = (kind, id);
        match target {
            SubscriptionTarget::Entity => self.entities.remove(&key).is_some(),
            SubscriptionTarget::Route => self.routes.remove(&key).is_some(),
        }
    }

    /// Drops the subscription whose acknowledgement was due in `slot`.
    ///
    /// Called when that acknowledgement will never arrive, so a later
    /// subscribe sends a fresh request instead of reusing a subscription the
    /// service never started. Other slots are ignored.
    pub(crate) fn abandon(&mut self, slot: &CallSlot) -> bool {
        let CallSlot::Keyed(CallKey::Entity {
            operation,
            kind,
            id,
        }) = slot
        else {
            return false;
        };
        SubscriptionTarget::started_by(*operation)
            .is_some_and(|target| self.remove(target, *kind, *id))
    }

    pub(crate) fn contains(
        &self,
        target: SubscriptionTarget,
        kind: EntityKind,
        id: EntityId,
    ) -> bool {
        let key = (kind, id);
        match target {
            SubscriptionTarget::Entity => self.entities.contains_key(&key),
            SubscriptionTarget::Route => self.routes.contains_key(&key),
        }
    }

    /// Stores `current` as the new snapshot and prepares the callback.
    pub(crate) fn notify_entity(&mut self, current: &Entity) -> Option<Notification> {
        let subscription = self.entities.get_mut(&(current.kind(), current.id()))?;
        let previous = std::mem::replace(&mut subscription.snapshot, current.clone());
        Some(Notification::Entity {
            callback: subscription.callback.clone(),
            previous,
            current: current.clone(),
        })
    }

    /// Stores `route` as the latest route and prepares the callback.
    pub(crate) fn notify_route(&mut self, route: &Route) -> Option<Notification> {
        let subscription = self.routes.get_mut(&(route.kind(), route.id()))?;
        subscription.latest = Some(route.clone());
        Some(Notification::Route {
            callback: subscription.callback.clone(),
            subject: subscription.subject.clone(),
            route: route.clone(),
        })
    }

    /// Latest route delivered to a route subscription.
    pub(crate) fn latest_route(&self, kind: EntityKind, id: EntityId) -> Option<&Route> {
        self.routes
            .get(&(kind, id))
            .and_then(|subscription| subscription.latest.as_ref())
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len() + self.routes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entities.clear();
        self.routes.clear();
    }
}
