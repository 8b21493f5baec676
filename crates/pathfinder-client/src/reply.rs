//! Futures resolved by inbound messages.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::debug;

use crate::entity::{Cluster, Commodity, Entity, EntityId, Route, Transport};
use crate::error::ClientError;

/// Value a pending call is completed with.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Entity(Entity),
    Route(Route),
    Id(EntityId),
}

impl Resolution {
    pub(crate) fn into_entity(self) -> Result<Entity, ClientError> {
        match self {
            Self::Entity(entity) => Ok(entity),
            _ => Err(ClientError::UnexpectedReply { expected: "entity" }),
        }
    }

    pub(crate) fn into_cluster(self) -> Result<Cluster, ClientError> {
        match self {
            Self::Entity(Entity::Cluster(cluster)) => Ok(cluster),
            _ => Err(ClientError::UnexpectedReply { expected: "cluster" }),
        }
    }

    pub(crate) fn into_commodity(self) -> Result<Commodity, ClientError> {
        match self {
            Self::Entity(Entity::Commodity(commodity)) => Ok(commodity),
            _ => Err(ClientError::UnexpectedReply {
                expected: "commodity",
            }),
        }
    }

    pub(crate) fn into_transport(self) -> Result<Transport, ClientError> {
        match self {
            Self::Entity(Entity::Transport(transport)) => Ok(transport),
            _ => Err(ClientError::UnexpectedReply {
                expected: "transport",
            }),
        }
    }

    pub(crate) fn into_route(self) -> Result<Route, ClientError> {
        match self {
            Self::Route(route) => Ok(route),
            _ => Err(ClientError::UnexpectedReply { expected: "route" }),
        }
    }

    pub(crate) fn into_id(self) -> Result<EntityId, ClientError> {
        match self {
            Self::Id(id) => Ok(id),
            Self::Entity(entity) => Ok(entity.id()),
            Self::Route(_) => Err(ClientError::UnexpectedReply {
                expected: "identifier",
            }),
        }
    }
}

type Outcome = Result<Resolution, ClientError>;

/// Converts the untyped resolution into the caller's type.
pub(crate) type Convert<T> = fn(Resolution) -> Result<T, ClientError>;

/// Sending half of a pending call. Completing it consumes it, so a call
/// resolves at most once.
pub(crate) struct Waiter {
    sender: oneshot::Sender<Outcome>,
}

impl Waiter {
    pub(crate) fn resolve(self, resolution: Resolution) {
        self.complete(Ok(resolution));
    }

    pub(crate) fn fail(self, error: ClientError) {
        self.complete(Err(error));
    }

    pub(crate) fn complete(self, outcome: Outcome) {
        if self.sender.send(outcome).is_err() {
            debug!("reply dropped before completion");
        }
    }
}

impl fmt::Debug for Waiter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Waiter")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

/// Creates a linked waiter and reply.
pub(crate) fn reply_channel<T>(convert: Convert<T>) -> (Waiter, Reply<T>) {
    let (sender, receiver) = oneshot::channel();
    (Waiter { sender }, Reply { receiver, convert })
}

/// Eventual result of a request.
///
/// Resolves once the matching reply arrives, the call times out, or the
/// connection closes. Dropping a `Reply` does not cancel the request; the
/// reply is simply discarded when it arrives.
#[must_use = "a reply does nothing unless awaited or polled"]
pub struct Reply<T> {
    receiver: oneshot::Receiver<Outcome>,
    convert: Convert<T>,
}

impl<T> Reply<T> {
    /// Returns the result if it has already arrived, without waiting.
    ///
    /// Returns `None` while the call is still pending.
    pub fn try_take(&mut self) -> Option<Result<T, ClientError>> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome.and_then(self.convert)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(ClientError::ConnectionClosed)),
        }
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Reply").finish_non_exhaustive()
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.and_then(this.convert)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::ConnectionClosed)),
        }
    }
}
