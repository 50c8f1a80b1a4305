use std::path::PathBuf;

use crate::id::Identifier;

/// Errors produced by the `seaman-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A release name failed validation.
    #[error("invalid release name '{name}': {reason}")]
    InvalidReleaseName { name: String, reason: &'static str },

    /// A manifest document has no `metadata.name`.
    #[error("object of kind '{kind}' has no metadata.name")]
    ObjectWithoutName { kind: String },

    /// A manifest document has no `apiVersion`/`kind`.
    #[error("object '{name}' has no apiVersion/kind")]
    MissingTypeMeta { name: String },

    /// Two manifest documents resolve to the same identifier.
    #[error("duplicate object {0}")]
    DuplicateObject(Identifier),

    /// A manifest path does not exist.
    #[error("manifest path not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A release-state ConfigMap is missing or has an undecodable payload.
    #[error("corrupt release state in ConfigMap '{name}': {reason}")]
    CorruptReleaseState { name: String, reason: String },

    /// A manifest could not be parsed as YAML.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
