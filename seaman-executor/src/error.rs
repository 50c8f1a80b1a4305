//! Error types for the executor crate.

use std::time::Duration;

use seaman_core::{Action, CoreError, Discrepancy, Identifier, ReleaseName};

/// Errors that can occur while talking to the cluster or running a plan.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutorError {
    /// The object to create already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// No API resource serves the object's group/version/kind.
    #[error("no API resource for {0}")]
    UnknownResource(Identifier),

    /// The release lock was not released before the deadline.
    #[error("timed out after {waited:?} waiting for lock on release '{release}'")]
    LockTimeout { release: ReleaseName, waited: Duration },

    /// A plan step failed and every completed step was undone.
    #[error("{action} of {identifier} failed, changes rolled back: {source}")]
    RolledBack {
        action: Action,
        identifier: Identifier,
        #[source]
        source: Box<ExecutorError>,
    },

    /// A plan step failed and undoing the completed steps failed too.
    #[error("{action} of {identifier} failed ({cause}); rollback also failed: {rollback}")]
    RollbackFailed {
        action: Action,
        identifier: Identifier,
        cause: Box<ExecutorError>,
        rollback: Box<ExecutorError>,
    },

    /// A release object would overwrite the release's own state or lock.
    #[error("{0} collides with a ConfigMap reserved for release bookkeeping")]
    ReservedName(Identifier),

    /// The release has never been deployed.
    #[error("release '{0}' is not deployed")]
    NoDeployedRelease(ReleaseName),

    /// The release has no earlier revision to roll back to.
    #[error("release '{0}' has no previous revision")]
    NoPreviousRevision(ReleaseName),

    /// The cluster does not match the deployed revision.
    #[error("verification failed: {0}")]
    Verification(Box<Discrepancy>),

    /// A backend failure that is not a Kubernetes API error.
    #[error("backend error: {0}")]
    Backend(String),

    /// An error from the domain layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Loading the kubeconfig or in-cluster configuration failed.
    #[error(transparent)]
    Config(#[from] kube::config::InferConfigError),

    /// A Kubernetes API call failed.
    #[error(transparent)]
    Kube(#[from] kube::Error),
}
