//! Error types for the node-pool provider
//!
//! Variants mirror the failure classes the autoscaler has to tell apart:
//! missing objects, optimistic-concurrency conflicts, out-of-bounds size
//! requests, and opaque transport failures passed through from kube-rs.

use thiserror::Error;

/// Main error type for node-pool provider operations
#[derive(Debug, Error)]
pub enum Error {
    /// The named object does not exist in the API server
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (e.g., "NodePool")
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// Optimistic-concurrency failure on a read-modify-write
    #[error("conflict writing {kind} {name}: {message}")]
    Conflict {
        /// Resource kind that changed underneath the write
        kind: String,
        /// Name of the contended object
        name: String,
        /// Message returned by the API server
        message: String,
    },

    /// A requested size change would break the group's bounds
    #[error("invalid argument for node group {group}: {message}")]
    InvalidArgument {
        /// Node group the request was made against
        group: String,
        /// Description of what's invalid
        message: String,
    },

    /// Kubernetes API error (network, server-side, or unclassified status)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error for {kind}: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized
        kind: String,
    },

    /// Capability the provider deliberately does not offer
    #[error("{capability} is not supported by the {} provider", crate::PROVIDER_NAME)]
    NotImplemented {
        /// The unsupported capability (e.g., "pricing")
        capability: String,
    },

    /// A sequential delete batch stopped at its first hard error
    #[error(
        "node group {group}: deleting node {node} failed after {} node(s) were requested: {source}",
        .deleted.len()
    )]
    PartialDeletion {
        /// Node group the batch belonged to
        group: String,
        /// Node whose deletion request failed
        node: String,
        /// Nodes whose deletion was requested (or found already gone) before the failure
        deleted: Vec<String>,
        /// The failure that stopped the batch
        source: Box<Error>,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl Error {
    /// Create a not-found error for the given kind and name
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error for the given kind and name
    pub fn conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an invalid-argument error for a node group
    pub fn invalid_argument(group: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            group: group.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: kind.into(),
        }
    }

    /// Create an error for a capability this provider does not offer
    pub fn not_implemented(capability: impl Into<String>) -> Self {
        Self::NotImplemented {
            capability: capability.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Classify a kube-rs error for a named object
    ///
    /// HTTP 404 becomes [`Error::NotFound`] and 409 becomes [`Error::Conflict`];
    /// everything else passes through untouched as [`Error::Kube`].
    pub fn from_kube(kind: &str, name: &str, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::not_found(kind, name),
            kube::Error::Api(ae) if ae.code == 409 => Self::conflict(kind, name, ae.message),
            source => Self::Kube { source },
        }
    }

    /// Whether the named object was missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether a read-modify-write lost a race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Check if this error is retryable by the caller
    ///
    /// The provider itself never retries. Conflicts clear up once the caller
    /// refreshes and recomputes; bad arguments and unsupported capabilities
    /// never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::NotFound { .. } => false,
            Error::Conflict { .. } => true,
            Error::InvalidArgument { .. } => false,
            Error::Serialization { .. } => false,
            Error::NotImplemented { .. } => false,
            Error::PartialDeletion { source, .. } => source.is_retryable(),
            Error::Internal { .. } => true,
        }
    }

    /// Get the node group name if this error is tied to one
    pub fn group(&self) -> Option<&str> {
        match self {
            Error::InvalidArgument { group, .. } => Some(group),
            Error::PartialDeletion { group, .. } => Some(group),
            _ => None,
        }
    }
}
