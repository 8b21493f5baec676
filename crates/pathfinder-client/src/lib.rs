//! Client for a real-time routing service.
#![deny(missing_docs)]
//!
//! The service tracks clusters, commodities and transports and pushes route
//! updates over one persistent, message-oriented connection. This crate turns
//! that bidirectional stream into awaitable request/response calls plus
//! per-entity update subscriptions.
//!
//! The client does not own any I/O. It writes through the [`Connection`]
//! trait, and whatever drives the socket reports inbound events through
//! [`Client::handle_open`], [`Client::handle_message`] and
//! [`Client::handle_close`]. Every call returns a [`Reply`] future that
//! resolves when the matching response arrives.
//!
//! Id-keyed calls (reads, updates, deletes, routes, subscribes) are matched
//! by operation, entity kind and id; a second identical call while one is in
//! flight is rejected. Creates carry no id, so their replies are matched in
//! call order per entity kind.

mod client;
mod connection;
mod dispatch;
mod entity;
mod error;
mod kind;
mod protocol;
mod registry;
mod reply;
pub mod telemetry;

pub use client::{Client, SubscribeOutcome};
pub use connection::{Connection, ConnectionState};
pub use dispatch::Delivery;
pub use entity::{
    Cluster, ClusterRecord, Commodity, CommodityRecord, CommodityUpdate, Coordinate, Entity,
    EntityCallback, EntityId, NewCluster, NewCommodity, NewTransport, Route, RouteCallback,
    Transport, TransportRecord, TransportUpdate,
};
pub use error::{ClientError, ConnectionError, DispatchError};
pub use kind::{EntityKind, EntityKindParseError, MessageKind, ModelKind, OperationKind};
pub use pathfinder_config::Config;
pub use registry::CallKey;
pub use reply::Reply;

#[cfg(test)]
mod tests;
