//! Shared fixtures and helpers for client tests.

mod recording_connection;
mod world;

use rstest::fixture;
use serde_json::{Value, json};

use crate::kind::{EntityKind, MessageKind};
use crate::{Client, Config, ConnectionState};

pub use recording_connection::{ConnectionHandle, RecordingConnection};
pub use world::TestWorld;

/// Application identifier used by the default-cluster tests.
pub const APPLICATION_ID: &str = "fleet";

/// Configuration with an application id and no timeout.
#[fixture]
pub fn config() -> Config {
    Config {
        application_id: Some(APPLICATION_ID.to_owned()),
        ..Config::default()
    }
}

/// A client over a connection that is already open.
#[fixture]
pub fn open_client(config: Config) -> (Client, ConnectionHandle) {
    client_in_state(ConnectionState::Open, &config)
}

/// Builds a client over a recording connection reporting `state`.
pub fn client_in_state(state: ConnectionState, config: &Config) -> (Client, ConnectionHandle) {
    let connection = RecordingConnection::new(state);
    let handle = connection.handle();
    (Client::new(connection, config), handle)
}

/// Minimal wire value for an entity of `kind`.
#[must_use]
pub fn entity_value(kind: EntityKind, id: i64) -> Value {
    match kind {
        EntityKind::Cluster => json!({
            "id": id,
            "commodityIds": [],
            "transportIds": [],
            "subClusterIds": [],
        }),
        EntityKind::Commodity => json!({
            "id": id,
            "startLatitude": 51.5,
            "startLongitude": -0.12,
            "endLatitude": 51.45,
            "endLongitude": -0.97,
            "status": "Waiting",
        }),
        EntityKind::Transport => json!({
            "id": id,
            "latitude": 51.5,
            "longitude": -0.12,
            "status": "Online",
        }),
    }
}

/// An entity-bearing inbound message.
#[must_use]
pub fn entity_message(message: MessageKind, kind: EntityKind, id: i64) -> String {
    json!({
        "kind": message.to_string(),
        "entityKind": kind.as_str(),
        "value": entity_value(kind, id),
    })
    .to_string()
}

/// An `Updated` message for a transport carrying `status`.
#[must_use]
pub fn transport_update(id: i64, status: &str) -> String {
    let mut value = entity_value(EntityKind::Transport, id);
    if let Some(fields) = value.as_object_mut() {
        fields.insert("status".to_owned(), Value::from(status));
    }
    json!({"kind": "Updated", "entityKind": "Transport", "id": id, "value": value}).to_string()
}

/// An acknowledgement of a subscribe or route-subscribe request.
#[must_use]
pub fn acknowledgement(message: MessageKind, kind: EntityKind, id: i64) -> String {
    json!({"kind": message.to_string(), "entityKind": kind.as_str(), "id": id}).to_string()
}

/// A `Routed` message.
#[must_use]
pub fn routed(kind: EntityKind, id: i64, route: &Value) -> String {
    json!({"kind": "Routed", "entityKind": kind.as_str(), "id": id, "route": route}).to_string()
}
