//! Commodity records, handles and request bodies.

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

/// Wire representation of a commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityRecord {
    /// Service-assigned identifier.
    pub id: EntityId,
    /// Pickup latitude.
    #[serde(alias = "startLat")]
    pub start_latitude: f64,
    /// Pickup longitude.
    #[serde(alias = "startLong")]
    pub start_longitude: f64,
    /// Drop-off latitude.
    #[serde(alias = "endLat")]
    pub end_latitude: f64,
    /// Drop-off longitude.
    #[serde(alias = "endLong")]
    pub end_longitude: f64,
    /// Opaque status label.
    #[serde(default)]
    pub status: String,
    /// Routing metadata such as the capacity the commodity occupies.
    #[serde(default, alias = "capacity")]
    pub metadata: Value,
    /// Owning cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<EntityId>,
}

/// Handle to one snapshot of a commodity.
#[derive(Debug, Clone)]
pub struct Commodity {
    record: CommodityRecord,
    client: WeakClient,
}

impl PartialEq for Commodity {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Commodity {
    pub(super) fn construct(
        value: Value,
        client: &WeakClient,
    ) -> Result<Entity, serde_json::Error> {
        let record = serde_json::from_value(value)?;
        Ok(Entity::Commodity(Self {
            record,
            client: client.clone(),
        }))
    }

    /// Service-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.record.id
    }

    /// Pickup position.
    #[must_use]
    pub const fn start(&self) -> Coordinate {
        Coordinate::new(self.record.start_latitude, self.record.start_longitude)
    }

    /// Drop-off position.
    #[must_use]
    pub const fn end(&self) -> Coordinate {
        Coordinate::new(self.record.end_latitude, self.record.end_longitude)
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
    pub const fn record(&self) -> &CommodityRecord {
        &self.record
    }

    /// Registers `on_update` for changes to this commodity.
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

    /// Stops local delivery of updates for this commodity.
    pub fn unsubscribe(&self) {
        unsubscribe_handle(self, EntityKind::Commodity);
    }

    /// Registers `on_route` for changes to this commodity's route.
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

    /// Stops local delivery of route updates for this commodity.
    pub fn route_unsubscribe(&self) {
        route_unsubscribe_handle(self, EntityKind::Commodity);
    }

    /// Requests the current route of this commodity.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn route(&self) -> Result<Reply<Route>, ClientError> {
        self.client.upgrade()?.route_commodity(self.id())
    }

    /// Applies `update` to this commodity.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn update(&self, update: &CommodityUpdate) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.update_commodity(self.id(), update)
    }

    /// Deletes this commodity.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the client is gone or cannot send.
    pub fn delete(&self) -> Result<Reply<Self>, ClientError> {
        self.client.upgrade()?.delete_commodity(self.id())
    }
}

impl EntityHandle for Commodity {
    fn handle_id(&self) -> EntityId {
        self.id()
    }

    fn client(&self) -> &WeakClient {
        &self.client
    }

    fn into_entity(self) -> Entity {
        Entity::Commodity(self)
    }

    fn from_entity(entity: &Entity) -> Option<&Self> {
        match entity {
            Entity::Commodity(commodity) => Some(commodity),
            _ => None,
        }
    }
}

/// Request body for creating a commodity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommodity {
    start_latitude: f64,
    start_longitude: f64,
    end_latitude: f64,
    end_longitude: f64,
    metadata: Value,
    status: String,
    cluster_id: EntityId,
}

impl NewCommodity {
    /// Status given to new commodities unless overridden.
    pub const DEFAULT_STATUS: &'static str = "Waiting";

    /// Builds a commodity travelling from `start` to `end` within `cluster`.
    #[must_use]
    pub fn new(start: Coordinate, end: Coordinate, cluster: EntityId) -> Self {
        Self {
            start_latitude: start.latitude,
            start_longitude: start.longitude,
            end_latitude: end.latitude,
            end_longitude: end.longitude,
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

/// Partial update for a commodity. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    start_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Value>,
}

impl CommodityUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the pickup point.
    #[must_use]
    pub const fn start(mut self, start: Coordinate) -> Self {
        self.start_latitude = Some(start.latitude);
        self.start_longitude = Some(start.longitude);
        self
    }

    /// Moves the drop-off point.
    #[must_use]
    pub const fn end(mut self, end: Coordinate) -> Self {
        self.end_latitude = Some(end.latitude);
        self.end_longitude = Some(end.longitude);
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
        self.start_latitude.is_none()
            && self.start_longitude.is_none()
            && self.end_latitude.is_none()
            && self.end_longitude.is_none()
            && self.status.is_none()
            && self.metadata.is_none()
    }
}
