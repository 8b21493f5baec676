//! Inbound message decoding.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::entity::EntityId;
use crate::error::DispatchError;
use crate::kind::{EntityKind, MessageKind, OperationKind};

/// Entity-bearing payload of `Created`, `Read`, `Updated` and `Deleted`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntityPayload {
    pub(crate) entity_kind: EntityKind,
    #[serde(default)]
    pub(crate) id: Option<EntityId>,
    pub(crate) value: Value,
}

impl EntityPayload {
    /// Id of the subject: the envelope id, falling back to `value.id`.
    pub(crate) fn subject_id(&self) -> Option<EntityId> {
        self.id.or_else(|| {
            self.value
                .get("id")
                .and_then(Value::as_i64)
                .map(EntityId::new)
        })
    }
}

/// Payload of a `Routed` message.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoutePayload {
    pub(crate) entity_kind: EntityKind,
    pub(crate) id: EntityId,
    #[serde(default, alias = "value")]
    pub(crate) route: Value,
}

/// Payload of `Subscribed` and `RouteSubscribed` acknowledgements.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Acknowledgement {
    pub(crate) entity_kind: EntityKind,
    pub(crate) id: EntityId,
}

/// Payload of an `ApplicationCluster` reply.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApplicationClusterPayload {
    pub(crate) id: String,
    pub(crate) value: EntityId,
}

/// Payload of an `Error` message. Correlation fields are optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerErrorPayload {
    #[serde(default, alias = "error")]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) operation: Option<OperationKind>,
    #[serde(default)]
    pub(crate) entity_kind: Option<EntityKind>,
    #[serde(default)]
    pub(crate) id: Option<EntityId>,
}

/// A decoded inbound message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind")]
pub(crate) enum ServerMessage {
    Created(EntityPayload),
    #[serde(alias = "Model")]
    Read(EntityPayload),
    Updated(EntityPayload),
    Deleted(EntityPayload),
    Routed(RoutePayload),
    Subscribed(Acknowledgement),
    RouteSubscribed(Acknowledgement),
    ApplicationCluster(ApplicationClusterPayload),
    Error(ServerErrorPayload),
}

impl ServerMessage {
    /// Decodes one inbound text message.
    ///
    /// The `kind` discriminator is checked first so that unknown kinds are
    /// reported separately from malformed bodies.
    pub(crate) fn parse(text: &str) -> Result<Self, DispatchError> {
        let value: Value =
            serde_json::from_str(text).map_err(|source| DispatchError::Malformed { source })?;
        let declared = value.get("kind").and_then(Value::as_str);
        if declared.and_then(|kind| MessageKind::from_str(kind).ok()).is_none() {
            return Err(DispatchError::UnknownMessage {
                kind: declared.map(str::to_owned),
            });
        }
        serde_json::from_value(value).map_err(|source| DispatchError::Malformed { source })
    }

    pub(crate) const fn kind(&self) -> MessageKind {
        match self {
            Self::Created(_) => MessageKind::Created,
            Self::Read(_) => MessageKind::Read,
            Self::Updated(_) => MessageKind::Updated,
            Self::Deleted(_) => MessageKind::Deleted,
            Self::Routed(_) => MessageKind::Routed,
            Self::Subscribed(_) => MessageKind::Subscribed,
            Self::RouteSubscribed(_) => MessageKind::RouteSubscribed,
            Self::ApplicationCluster(_) => MessageKind::ApplicationCluster,
            Self::Error(_) => MessageKind::Error,
        }
    }
}
