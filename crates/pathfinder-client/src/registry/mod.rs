//! Tables correlating inbound messages with outstanding work.

mod pending;
mod subscriptions;

pub use pending::CallKey;
pub(crate) use pending::{
    CallSlot, CallToken, Claim, PendingCallRegistry, QueueKey, Resolved,
};
pub(crate) use subscriptions::{Notification, SubscriptionRegistry, SubscriptionTarget};
