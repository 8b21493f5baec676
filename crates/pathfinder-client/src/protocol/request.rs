//! Outbound request envelopes.

use serde::Serialize;
use serde_json::Value;

use crate::entity::EntityId;
use crate::kind::{EntityKind, ModelKind, OperationKind};
use crate::registry::{CallKey, CallSlot, QueueKey};

/// Identifier carried by a request: an entity id, or an application id for
/// the default-cluster lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub(crate) enum RequestId {
    Entity(EntityId),
    Application(String),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Request {
    operation: OperationKind,
    entity_kind: ModelKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(skip)]
    slot: CallSlot,
}

impl Request {
    fn keyed(operation: OperationKind, kind: EntityKind, id: EntityId) -> Self {
        Self {
            operation,
            entity_kind: kind.into(),
            id: Some(RequestId::Entity(id)),
            value: None,
            slot: CallSlot::Keyed(CallKey::Entity {
                operation,
                kind,
                id,
            }),
        }
    }

    pub(crate) fn read(kind: EntityKind, id: EntityId) -> Self {
        Self::keyed(OperationKind::Read, kind, id)
    }

    pub(crate) fn create(kind: EntityKind, value: Value) -> Self {
        Self {
            operation: OperationKind::Create,
            entity_kind: kind.into(),
            id: None,
            value: Some(value),
            slot: CallSlot::Queued(QueueKey {
                operation: OperationKind::Create,
                kind,
            }),
        }
    }

    pub(crate) fn update(kind: EntityKind, id: EntityId, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::keyed(OperationKind::Update, kind, id)
        }
    }

    pub(crate) fn delete(kind: EntityKind, id: EntityId) -> Self {
        Self::keyed(OperationKind::Delete, kind, id)
    }

    pub(crate) fn route(kind: EntityKind, id: EntityId) -> Self {
        Self::keyed(OperationKind::Route, kind, id)
    }

    pub(crate) fn subscribe(kind: EntityKind, id: EntityId) -> Self {
        Self::keyed(OperationKind::Subscribe, kind, id)
    }

    pub(crate) fn route_subscribe(kind: EntityKind, id: EntityId) -> Self {
        Self::keyed(OperationKind::RouteSubscribe, kind, id)
    }

    pub(crate) fn application_cluster(application: String) -> Self {
        Self {
            operation: OperationKind::Read,
            entity_kind: ModelKind::ApplicationCluster,
            id: Some(RequestId::Application(application.clone())),
            value: None,
            slot: CallSlot::Keyed(CallKey::ApplicationCluster { application }),
        }
    }

    pub(crate) const fn operation(&self) -> OperationKind {
        self.operation
    }

    /// Pending-call slot the reply to this request will resolve.
    pub(crate) const fn slot(&self) -> &CallSlot {
        &self.slot
    }

    /// Serialises the envelope to its wire text.
    pub(crate) fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
