//! Transport (vehicle) records, handles and request bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    Coordinate, Entity, EntityHandle, EntityId, Route, route_subscribe_handle,
    route_unsubscribe_handle, subscribe_handle, unsubscribe_handle,
};
use crate::client::{SubscribeOutcome, WeakClient};
use crate::error::ClientError;
use crate::kind::EntityKind;
use crate::reply::Reply;

/// Wire representation of a transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportRecord {
    /// Service-assigned identifier.
    pub id: EntityId,
    /// Current latitude.
    pub latitude: f64,
    /// Current longitude.
    pub longitude: f64,
    /// Opaque status label.
    #[serde(default)]
    pub status: String,
    /// Routing metadata such as capacity.
    #[serde(default, alias = "capacity")]
    pub metadata: Value,
    /// Owning cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<EntityId>,
}

/// Handle to one snapshot of a transport.
#[derive(Debug, Clone)]
pub struct Transport {
    record: TransportRecord,
    client: WeakClient,
}

impl PartialEq for Transport {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Transport {
    pub(super) fn construct(
        value: Value,
        client: &WeakClient,
    ) -> Result<Entity, serde_json::Error> {
        let record = serde_json::from_value(value)?;
        Ok(Entity::Transport(Self {
            record,
            client: client.clone(),
        }))
    }

    /// Service-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.record.id
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Coordinate {
        Coordinate::new(self.record.latitude, self.record.longitude)
    }

    /// Status label.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.record.status
    }

    /// Routing metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Value {
        &self.record.metadata
    }

    /// Owning cluster, when the service reports it.
    #[must_use]
    pub const fn cluster_id(&self) -> Option<EntityId> {
        self.record.cluster_id
    }

    /// The decoded wire record.
    #[must_use]
    pub const fn record(&self) -> &TransportRecord {
        &self.record
    }

    /// Registers `on_update` for changes to this transport.
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

    /// Stops local delivery of updates for this transport.
    pub fn unsubscribe(&self) {
        unsubscribe_handle(self, EntityKind::Transport);
    }

    /// Registers `on_route` for changes to this transport's route.
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

    /// Stops local delivery of route updates for this transport.
    pub fn route_unsubscribe(&self) {
        route_unsubscribe_handle(self, EntityKind::Transport);
    }

    /// Requests the current route of this transport.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn route(&self) -> Result<Reply<Route>, ClientError> {
        self.client.upgrade()?.route_transport(self.id())
    }

    /// Applies `update` to this transport.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn update(&self, update: &TransportUpdate) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.update_transport(self.id(), update)
    }

    /// Deletes this transport.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn delete(&self) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.delete_transport(self.id())
    }
}

impl EntityHandle for Transport {
    fn handle_id(&self) -> EntityId {
        self.id()
    }

    fn client(&self) -> &WeakClient {
        &self.client
    }

    fn into_entity(self) -> Entity {
        Entity::Transport(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Transport(transport) => Some(transport),
            _ => None,
        }
    }
}

/// Request body for creating a transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransport {
    latitude: f64,
    longitude: f64,
    metadata: Value,
    status: String,
    cluster_id: EntityId,
}

impl NewTransport {
    /// Status given to new transports unless overridden.
    pub const DEFAULT_STATUS: &'static str = "Online";

    /// Builds a transport positioned at `position` within `cluster`.
    #[must_use]
    pub fn new(position: Coordinate, cluster: EntityId) -> Self {
        Self {
            latitude: position.latitude,
            longitude: position.longitude,
            metadata: Value::Null,
            status: Self::DEFAULT_STATUS.to_owned(),
            cluster_id: cluster,
        }
    }

    /// Sets the routing metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the status label.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }
}

/// Partial update for a transport. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransportUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl TransportUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the transport.
    #[must_use]
    pub const fn position(mut self, position: Coordinate) -> Self {
        self.latitude = Some(position.latitude);
        self.longitude = Some(position.longitude);
        self
    }

    /// Changes the status label.
    #[must_use]
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Replaces the routing metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns `true` when no field would change.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.status.is_none()
            && self.metadata.is_none()
    }
}
