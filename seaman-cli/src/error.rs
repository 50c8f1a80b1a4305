//! Error types for the command-line interface.

use seaman_core::CoreError;
use seaman_executor::ExecutorError;

/// Errors a command can end with.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CliError {
    /// Reading or validating manifests failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A cluster operation failed.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// The release could not be encoded as JSON.
    #[error("failed to encode release: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
