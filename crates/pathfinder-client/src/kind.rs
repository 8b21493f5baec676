//! Enumerations naming entity kinds, operations and inbound message kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The three routable entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// A routing domain holding transports, commodities and sub-clusters.
    Cluster,
    /// A transportation request from an origin to a destination.
    Commodity,
    /// A vehicle able to carry commodities.
    #[serde(alias = "Vehicle")]
    Transport,
}

impl EntityKind {
    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "Cluster",
            Self::Commodity => "Commodity",
            Self::Transport => "Transport",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error raised when an entity kind cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown entity kind '{0}'")]
pub struct EntityKindParseError(String);

impl EntityKindParseError {
    /// Returns the input that failed to parse.
    #[must_use]
    pub fn input(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for EntityKind {
    type Err = EntityKindParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "commodity" => Ok(Self::Commodity),
            "transport" | "vehicle" => Ok(Self::Transport),
            other => Err(EntityKindParseError(other.to_owned())),
        }
    }
}

/// Model names accepted in the `entityKind` field of a request.
///
/// `ApplicationCluster` is a pseudo-kind used only by the default-cluster
/// lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    /// [`EntityKind::Cluster`].
    Cluster,
    /// [`EntityKind::Commodity`].
    Commodity,
    /// [`EntityKind::Transport`].
    Transport,
    /// Mapping from an application identifier to its top-level cluster.
    ApplicationCluster,
}

impl From<EntityKind> for ModelKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Cluster => Self::Cluster,
            EntityKind::Commodity => Self::Commodity,
            EntityKind::Transport => Self::Transport,
        }
    }
}

/// Operations a request envelope can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Fetch one entity by id.
    Read,
    /// Create an entity; the service assigns the id.
    Create,
    /// Change fields of an existing entity.
    Update,
    /// Remove an entity.
    Delete,
    /// Fetch the current route for an entity.
    Route,
    /// Register interest in entity updates.
    Subscribe,
    /// Register interest in route updates.
    RouteSubscribe,
}

impl OperationKind {
    /// Returns the wire name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Route => "Route",
            Self::Subscribe => "Subscribe",
            Self::RouteSubscribe => "RouteSubscribe",
        }
    }

    /// Returns `true` when pending calls for this operation are keyed by id.
    ///
    /// Only `Create` lacks an id at request time.
    #[must_use]
    pub const fn is_keyed(self) -> bool {
        !matches!(self, Self::Create)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Discriminator carried in the `kind` field of every inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
pub enum MessageKind {
    /// Reply to a `Create` request.
    Created,
    /// Reply to a `Read` request, or a pushed snapshot.
    #[strum(to_string = "Read", serialize = "Model")]
    Read,
    /// Reply to an `Update` request, or a pushed update.
    Updated,
    /// Reply to a `Delete` request, or a pushed deletion.
    Deleted,
    /// Route payload for an entity.
    Routed,
    /// Acknowledgement of a `Subscribe` request.
    Subscribed,
    /// Acknowledgement of a `RouteSubscribe` request.
    RouteSubscribed,
    /// Reply to the default-cluster lookup.
    ApplicationCluster,
    /// Server-reported failure.
    Error,
}
