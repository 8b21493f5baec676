//! Crate-level tests driving the client through its public surface.

mod support;
mod unit;
