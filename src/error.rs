//! Error types for the ResourceModifier operator.

use std::time::Duration;

use thiserror::Error;

use crate::target::TargetKind;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for resource resolution and directive execution
#[derive(Debug, Error)]
pub enum Error {
    /// Resource type string did not match any supported kind
    #[error("no matches found for specified resource: {0}")]
    UnsupportedResourceType(String),

    /// Label-based selection is reserved and must not partially match
    #[error("selection by labels is not implemented")]
    SelectorNotImplemented,

    /// Neither name nor labels were given; namespace-wide selection is ambiguous
    #[error("resource selection requires a name")]
    MissingSelector,

    /// Target object absent from the cluster store
    #[error("target object not found: {kind}/{name}")]
    NotFound { kind: TargetKind, name: String },

    /// Directive argument failed validation
    #[error("invalid argument in directive {raw:?}: {reason}")]
    InvalidArgument { raw: String, reason: String },

    /// Scale directive applied to a kind without a replica count
    #[error("resource kind {0} is not scalable")]
    NotScalable(TargetKind),

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Bounded remote call did not complete in time
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Transport-class failures propagate to the scheduling loop for retry;
    /// everything else surfaces only through the status condition map.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Kube(_) | Error::Timeout(_))
    }
}
