//! Immutable entity snapshots and the handles wrapping them.
//!
//! Every handle pairs a decoded record with a weak reference to the
//! [`Client`](crate::Client) that produced it, so it can issue follow-up
//! calls (subscribe, route, update, delete) scoped to its own id. A fresh
//! handle is built for every message; handles are never mutated.

mod cluster;
mod commodity;
mod route;
mod transport;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use cluster::{Cluster, ClusterRecord, NewCluster};
pub use commodity::{Commodity, CommodityRecord, CommodityUpdate, NewCommodity};
pub use route::Route;
pub use transport::{NewTransport, Transport, TransportRecord, TransportUpdate};

use crate::client::{SubscribeOutcome, WeakClient};
use crate::error::ClientError;
use crate::kind::EntityKind;

/// Identifier assigned by the service to every entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntityId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinate {
    /// Builds a coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Any entity handle, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// A cluster handle.
    Cluster(Cluster),
    /// A commodity handle.
    Commodity(Commodity),
    /// A transport handle.
    Transport(Transport),
}

impl Entity {
    /// Kind of the wrapped handle.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Cluster(_) => EntityKind::Cluster,
            Self::Commodity(_) => EntityKind::Commodity,
            Self::Transport(_) => EntityKind::Transport,
        }
    }

    /// Identifier of the wrapped handle.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        match self {
            Self::Cluster(cluster) => cluster.id(),
            Self::Commodity(commodity) => commodity.id(),
            Self::Transport(transport) => transport.id(),
        }
    }

    /// Decodes a wire value of the given kind into a handle bound to `client`.
    pub(crate) fn decode(
        kind: EntityKind,
        value: Value,
        client: &WeakClient,
    ) -> Result<Self, serde_json::Error> {
        constructor(kind)(value, client)
    }
}

/// Builds an [`Entity`] from a wire value.
type Constructor = fn(Value, &WeakClient) -> Result<Entity, serde_json::Error>;

/// Lookup table from entity kind to its constructor.
const fn constructor(kind: EntityKind) -> Constructor {
    match kind {
        EntityKind::Cluster => Cluster::construct,
        EntityKind::Commodity => Commodity::construct,
        EntityKind::Transport => Transport::construct,
    }
}

/// Callback invoked with the previous and current snapshot of an entity.
pub type EntityCallback = Arc<dyn Fn(&Entity, &Entity) + Send + Sync>;

/// Callback invoked with a subscribed entity and its newest route.
pub type RouteCallback = Arc<dyn Fn(&Entity, &Route) + Send + Sync>;

/// Behaviour shared by the three concrete handle types.
pub(crate) trait EntityHandle: Clone + Send + Sync + 'static {
    fn handle_id(&self) -> EntityId;

    fn client(&self) -> &WeakClient;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: &Entity) -> Option<&Self>;
}

pub(crate) fn subscribe_handle<H, F>(
    handle: &H,
    on_update: F,
) -> Result<SubscribeOutcome, ClientError>
where
    H: EntityHandle,
    F: Fn(&H, &H) + Send + Sync + 'static,
{
    let client = handle.client().upgrade()?;
    let callback: EntityCallback = Arc::new(move |old: &Entity, new: &Entity| {
        if let (Some(previous), Some(current)) = (H::from_entity(old), H::from_entity(new)) {
            on_update(previous, current);
        }
    });
    client.subscribe(handle.clone().into_entity(), callback)
}

pub(crate) fn route_subscribe_handle<H, F>(
    handle: &H,
    on_route: F,
) -> Result<SubscribeOutcome, ClientError>
where
    H: EntityHandle,
    F: Fn(&H, &Route) + Send + Sync + 'static,
{
    let client = handle.client().upgrade()?;
    let callback: RouteCallback = Arc::new(move |entity: &Entity, route: &Route| {
        if let Some(subject) = H::from_entity(entity) {
            on_route(subject, route);
        }
    });
    client.route_subscribe(handle.clone().into_entity(), callback)
}

pub(crate) fn unsubscribe_handle<H: EntityHandle>(handle: &H, kind: EntityKind) {
    if let Ok(client) = handle.client().upgrade() {
        client.unsubscribe(kind, handle.handle_id());
    }
}

pub(crate) fn route_unsubscribe_handle<H: EntityHandle>(handle: &H, kind: EntityKind) {
    if let Ok(client) = handle.client().upgrade() {
        client.route_unsubscribe(kind, handle.handle_id());
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(EntityKind::Cluster, json!({"id": 7, "commodityIds": [], "transportIds": []}))]
    #[case(
        EntityKind::Commodity,
        json!({"id": 8, "startLatitude": 1.0, "startLongitude": 2.0,
               "endLatitude": 3.0, "endLongitude": 4.0, "status": "Waiting"})
    )]
    #[case(
        EntityKind::Transport,
        json!({"id": 9, "latitude": 1.0, "longitude": 2.0, "status": "Online"})
    )]
    fn constructs_every_kind_from_the_table(#[case] kind: EntityKind, #[case] value: Value) {
        let entity = Entity::decode(kind, value, &WeakClient::detached())
            .unwrap_or_else(|error| panic!("{kind} should decode: {error}"));
        assert_eq!(entity.kind(), kind);
    }

    #[rstest]
    fn rejects_values_without_an_id() {
        let result = Entity::decode(
            EntityKind::Transport,
            json!({"latitude": 1.0, "longitude": 2.0}),
            &WeakClient::detached(),
        );
        assert!(result.is_err());
    }

    #[rstest]
    fn entity_id_is_transparent_on_the_wire() {
        let id: EntityId = serde_json::from_value(json!(42)).expect("id should decode");
        assert_eq!(id, EntityId::new(42));
        assert_eq!(serde_json::to_value(id).ok(), Some(json!(42)));
    }
}
