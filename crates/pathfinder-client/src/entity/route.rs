//! Route payloads.

use serde_json::Value;

use super::EntityId;
use crate::kind::EntityKind;

/// A computed route for one entity.
///
/// The payload is kept as raw JSON; its shape is defined by the routing
/// service and differs between clusters, commodities and transports.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    kind: EntityKind,
    id: EntityId,
    payload: Value,
}

impl Route {
    pub(crate) const fn new(kind: EntityKind, id: EntityId, payload: Value) -> Self {
        Self { kind, id, payload }
    }

    /// Kind of the routed entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Identifier of the routed entity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Raw route payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consumes the route, returning its payload.
    #[must_use]
    pub fn into_payload(self) -> Value {
        self.payload
    }
}
