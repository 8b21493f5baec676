//! JSON envelopes exchanged with the routing service.
//!
//! Requests carry `operation`, `entityKind` and, where applicable, `id` and
//! `value`. Inbound messages are discriminated by their `kind` field.

mod message;
mod request;

pub(crate) use message::{EntityPayload, ServerMessage};
pub(crate) use request::Request;
