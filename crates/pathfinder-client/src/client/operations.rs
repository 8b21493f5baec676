//! Public operations. Every typed call is a thin specialisation of one of
//! the generic helpers.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{CLIENT_TARGET, Client, SubscribeOutcome};
use crate::entity::{
    Cluster, Commodity, CommodityUpdate, Entity, EntityCallback, EntityId, NewCluster,
    NewCommodity, NewTransport, Route, RouteCallback, Transport, TransportUpdate,
};
use crate::error::ClientError;
use crate::kind::EntityKind;
use crate::protocol::Request;
use crate::registry::{SubscriptionRegistry, SubscriptionTarget};
use crate::reply::{Convert, Reply, Resolution};

impl Client {
    fn request<T>(&self, request: &Request, convert: Convert<T>) -> Result<Reply<T>, ClientError> {
        let text = request.encode()?;
        self.with_state(|state| state.submit(request, text, convert))
    }

    fn subscribe_with(
        &self,
        request: &Request,
        target: SubscriptionTarget,
        subject: (EntityKind, EntityId),
        upsert: impl FnOnce(&mut SubscriptionRegistry),
    ) -> Result<SubscribeOutcome, ClientError> {
        let text = request.encode()?;
        let (kind, id) = subject;
        self.with_state(|state| {
            state.ensure_accepting()?;
            let in_place = state.subscriptions.contains(target, kind, id)
                || state.pending.is_pending(request.slot());
            upsert(&mut state.subscriptions);
            if in_place {
                debug!(
                    target: CLIENT_TARGET,
                    entity_kind = %kind,
                    id = %id,
                    ?target,
                    "subscription reused"
                );
                return Ok(SubscribeOutcome::Reused);
            }
            match state.submit(request, text, Resolution::into_id) {
                Ok(reply) => Ok(SubscribeOutcome::Requested(reply)),
                Err(failure) => {
                    state.subscriptions.remove(target, kind, id);
                    Err(failure)
                }
            }
        })
    }

    /// Reads any entity by kind and id.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the connection is closing or closed, the same
    /// read is already pending, or the connection refuses the message.
    pub fn read(&self, kind: EntityKind, id: EntityId) -> Result<Reply<Entity>, ClientError> {
        self.request(&Request::read(kind, id), Resolution::into_entity)
    }

    /// Creates an entity from a raw wire value.
    ///
    /// Replies to creates are matched in call order per entity kind.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the connection is closing or closed or
    /// refuses the message.
    pub fn create(&self, kind: EntityKind, value: Value) -> Result<Reply<Entity>, ClientError> {
        self.request(&Request::create(kind, value), Resolution::into_entity)
    }

    /// Updates an entity from a raw wire value holding only the changed fields.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn update(
        &self,
        kind: EntityKind,
        id: EntityId,
        value: Value,
    ) -> Result<Reply<Entity>, ClientError> {
        self.request(&Request::update(kind, id, value), Resolution::into_entity)
    }

    /// Deletes an entity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn delete(&self, kind: EntityKind, id: EntityId) -> Result<Reply<Entity>, ClientError> {
        self.request(&Request::delete(kind, id), Resolution::into_entity)
    }

    /// Requests the current route of an entity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn route(&self, kind: EntityKind, id: EntityId) -> Result<Reply<Route>, ClientError> {
        self.request(&Request::route(kind, id), Resolution::into_route)
    }

    /// Subscribes `callback` to updates of `entity`.
    ///
    /// The local subscription is created immediately, seeded with `entity`
    /// as the first snapshot. Subscribing again replaces the callback
    /// without sending another request.
    ///
    /// # Errors
    ///
    /// Fails synchronously when the connection is closing or closed or
    /// refuses the message; no subscription is left behind.
    pub fn subscribe(
        &self,
        entity: Entity,
        callback: EntityCallback,
    ) -> Result<SubscribeOutcome, ClientError> {
        let subject = (entity.kind(), entity.id());
        let request = Request::subscribe(subject.0, subject.1);
        self.subscribe_with(&request, SubscriptionTarget::Entity, subject, |registry| {
            registry.upsert_entity(entity, callback);
        })
    }

    /// Subscribes `callback` to route updates for `entity`.
    ///
    /// # Errors
    ///
    /// As for [`Client::subscribe`].
    pub fn route_subscribe(
        &self,
        entity: Entity,
        callback: RouteCallback,
    ) -> Result<SubscribeOutcome, ClientError> {
        let subject = (entity.kind(), entity.id());
        let request = Request::route_subscribe(subject.0, subject.1);
        self.subscribe_with(&request, SubscriptionTarget::Route, subject, |registry| {
            registry.upsert_route(entity, callback);
        })
    }

    /// Drops the local update subscription for an entity.
    ///
    /// The service is not told; late updates are discarded.
    pub fn unsubscribe(&self, kind: EntityKind, id: EntityId) {
        let removed = self.with_state(|state| {
            state
                .subscriptions
                .remove(SubscriptionTarget::Entity, kind, id)
        });
        debug!(target: CLIENT_TARGET, entity_kind = %kind, id = %id, removed, "unsubscribed");
    }

    /// Drops the local route subscription for an entity.
    pub fn route_unsubscribe(&self, kind: EntityKind, id: EntityId) {
        let removed = self.with_state(|state| {
            state
                .subscriptions
                .remove(SubscriptionTarget::Route, kind, id)
        });
        debug!(
            target: CLIENT_TARGET,
            entity_kind = %kind,
            id = %id,
            removed,
            "route unsubscribed"
        );
    }

    /// Fetches a cluster.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn get_cluster(&self, id: EntityId) -> Result<Reply<Cluster>, ClientError> {
        self.request(&Request::read(EntityKind::Cluster, id), Resolution::into_cluster)
    }

    /// Fetches a commodity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn get_commodity(&self, id: EntityId) -> Result<Reply<Commodity>, ClientError> {
        self.request(
            &Request::read(EntityKind::Commodity, id),
            Resolution::into_commodity,
        )
    }

    /// Fetches a transport.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn get_transport(&self, id: EntityId) -> Result<Reply<Transport>, ClientError> {
        self.request(
            &Request::read(EntityKind::Transport, id),
            Resolution::into_transport,
        )
    }

    /// Creates a cluster.
    ///
    /// # Errors
    ///
    /// As for [`Client::create`].
    pub fn create_cluster(&self, cluster: &NewCluster) -> Result<Reply<Cluster>, ClientError> {
        let request = Request::create(EntityKind::Cluster, encode(cluster)?);
        self.request(&request, Resolution::into_cluster)
    }

    /// Creates a commodity.
    ///
    /// # Errors
    ///
    /// As for [`Client::create`].
    pub fn create_commodity(
        &self,
        commodity: &NewCommodity,
    ) -> Result<Reply<Commodity>, ClientError> {
        let request = Request::create(EntityKind::Commodity, encode(commodity)?);
        self.request(&request, Resolution::into_commodity)
    }

    /// Creates a transport.
    ///
    /// # Errors
    ///
    /// As for [`Client::create`].
    pub fn create_transport(
        &self,
        transport: &NewTransport,
    ) -> Result<Reply<Transport>, ClientError> {
        let request = Request::create(EntityKind::Transport, encode(transport)?);
        self.request(&request, Resolution::into_transport)
    }

    /// Applies a partial update to a commodity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn update_commodity(
        &self,
        id: EntityId,
        update: &CommodityUpdate,
    ) -> Result<Reply<Commodity>, ClientError> {
        let request = Request::update(EntityKind::Commodity, id, encode(update)?);
        self.request(&request, Resolution::into_commodity)
    }

    /// Applies a partial update to a transport.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn update_transport(
        &self,
        id: EntityId,
        update: &TransportUpdate,
    ) -> Result<Reply<Transport>, ClientError> {
        let request = Request::update(EntityKind::Transport, id, encode(update)?);
        self.request(&request, Resolution::into_transport)
    }

    /// Deletes a cluster.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn delete_cluster(&self, id: EntityId) -> Result<Reply<Cluster>, ClientError> {
        self.request(
            &Request::delete(EntityKind::Cluster, id),
            Resolution::into_cluster,
        )
    }

    /// Deletes a commodity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn delete_commodity(&self, id: EntityId) -> Result<Reply<Commodity>, ClientError> {
        self.request(
            &Request::delete(EntityKind::Commodity, id),
            Resolution::into_commodity,
        )
    }

    /// Deletes a transport.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn delete_transport(&self, id: EntityId) -> Result<Reply<Transport>, ClientError> {
        self.request(
            &Request::delete(EntityKind::Transport, id),
            Resolution::into_transport,
        )
    }

    /// Requests the routes within a cluster.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn route_cluster(&self, id: EntityId) -> Result<Reply<Route>, ClientError> {
        self.route(EntityKind::Cluster, id)
    }

    /// Requests the route of a commodity.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn route_commodity(&self, id: EntityId) -> Result<Reply<Route>, ClientError> {
        self.route(EntityKind::Commodity, id)
    }

    /// Requests the route of a transport.
    ///
    /// # Errors
    ///
    /// As for [`Client::read`].
    pub fn route_transport(&self, id: EntityId) -> Result<Reply<Route>, ClientError> {
        self.route(EntityKind::Transport, id)
    }

    /// Looks up the id of the configured application's top-level cluster.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::MissingApplicationId`] when no application id is
    /// configured, otherwise as for [`Client::read`].
    pub fn default_cluster_id(&self) -> Result<Reply<EntityId>, ClientError> {
        let application = self
            .with_state(|state| state.application_id.clone())
            .ok_or(ClientError::MissingApplicationId)?;
        self.request(&Request::application_cluster(application), Resolution::into_id)
    }

    /// Fetches the configured application's top-level cluster.
    ///
    /// The lookup request is sent immediately; the cluster read follows once
    /// the lookup resolves, so the returned future must be polled to make
    /// progress past the first step.
    ///
    /// # Errors
    ///
    /// As for [`Client::default_cluster_id`]. Failures of either step are
    /// reported through the returned future.
    pub fn get_default_cluster(
        &self,
    ) -> Result<impl Future<Output = Result<Cluster, ClientError>> + Send + 'static, ClientError>
    {
        let lookup = self.default_cluster_id()?;
        let client = self.downgrade();
        Ok(async move {
            let id = lookup.await?;
            client.upgrade()?.get_cluster(id)?.await
        })
    }
}

fn encode(value: &impl Serialize) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(value)?)
}
