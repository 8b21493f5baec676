//! Cluster records and handles.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    Entity, EntityHandle, EntityId, Route, route_subscribe_handle, route_unsubscribe_handle,
    subscribe_handle, unsubscribe_handle,
};
use crate::client::{SubscribeOutcome, WeakClient};
use crate::error::ClientError;
use crate::kind::EntityKind;
use crate::reply::Reply;

/// Wire representation of a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    /// Service-assigned identifier.
    pub id: EntityId,
    /// Enclosing cluster, absent for a top-level cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    /// Commodities routed within this cluster.
    #[serde(default)]
    pub commodity_ids: Vec<EntityId>,
    /// Transports available within this cluster.
    #[serde(default)]
    pub transport_ids: Vec<EntityId>,
    /// Nested clusters.
    #[serde(default)]
    pub sub_cluster_ids: Vec<EntityId>,
}

/// Handle to one snapshot of a cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    record: ClusterRecord,
    client: WeakClient,
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Cluster {
    pub(super) fn construct(
        value: Value,
        client: &WeakClient,
    ) -> Result<Entity, serde_json::Error> {
        let record = serde_json::from_value(value)?;
        Ok(Entity::Cluster(Self {
            record,
            client: client.clone(),
        }))
    }

    /// Service-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.record.id
    }

    /// Enclosing cluster, if any.
    #[must_use]
    pub const fn parent_id(&self) -> Option<EntityId> {
        self.record.parent_id
    }

    /// Commodities routed within this cluster.
    #[must_use]
    pub fn commodity_ids(&self) -> &[EntityId] {
        &self.record.commodity_ids
    }

    /// Transports available within this cluster.
    #[must_use]
    pub fn transport_ids(&self) -> &[EntityId] {
        &self.record.transport_ids
    }

    /// Nested clusters.
    #[must_use]
    pub fn sub_cluster_ids(&self) -> &[EntityId] {
        &self.record.sub_cluster_ids
    }

    /// The decoded wire record.
    #[must_use]
    pub const fn record(&self) -> &ClusterRecord {
        &self.record
    }

    /// Registers `on_update` for changes to this cluster.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn subscribe<F>(&self, on_update: F) -> Result<SubscribeOutcome, ClientError>
    where
        F: Fn(&Self, &Self) + Send + Sync + 'static,
    {
        subscribe_handle(self, on_update)
    }

    /// Stops local delivery of updates for this cluster.
    pub fn unsubscribe(&self) {
        unsubscribe_handle(self, EntityKind::Cluster);
    }

    /// Registers `on_route` for route changes within this cluster.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn route_subscribe<F>(&self, on_route: F) -> Result<SubscribeOutcome, ClientError>
    where
        F: Fn(&Self, &Route) + Send + Sync + 'static,
    {
        route_subscribe_handle(self, on_route)
    }

    /// Stops local delivery of route updates for this cluster.
    pub fn route_unsubscribe(&self) {
        route_unsubscribe_handle(self, EntityKind::Cluster);
    }

    /// Requests the current routes of this cluster.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn route(&self) -> Result<Reply<Route>, ClientError> {
        self.client.upgrade()?.route_cluster(self.id())
    }

    /// Deletes this cluster.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn delete(&self) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.delete_cluster(self.id())
    }

    /// Fetches a fresh snapshot of this cluster.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn refresh(&self) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.get_cluster(self.id())
    }
}

impl EntityHandle for Cluster {
    fn handle_id(&self) -> EntityId {
        self.id()
    }

    fn client(&self) -> &WeakClient {
        &self.client
    }

    fn into_entity(self) -> Entity {
        Entity::Cluster(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Cluster(cluster) => Some(cluster),
            _ => None,
        }
    }
}

/// Request body for creating a cluster.
///
/// `path` names the new cluster's position beneath the application's
/// top-level cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCluster {
    /// Slash-separated cluster path.
    pub path: String,
}

impl NewCluster {
    /// Builds a creation request for `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}
