//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use seaman_core::ReleaseName;
use seaman_executor::{ManagerConfig, NamespaceMode};

/// Deploy sets of Kubernetes objects as versioned releases.
#[derive(Parser, Debug)]
#[command(name = "able-seaman", version)]
pub struct Cli {
    /// Namespace to deploy into. Overrides `ABLE_SEAMAN_NAMESPACE`; without
    /// either, the current kubeconfig context decides.
    #[arg(long, global = true, value_name = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Seconds to wait for another deployer to release the lock. Overrides
    /// `ABLE_SEAMAN_LOCK_TIMEOUT_SECS`.
    #[arg(long, global = true, value_name = "SECS")]
    pub lock_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the release built from the given manifests as JSON.
    Package(ManifestArgs),
    /// Show what deploying the manifests would change.
    Plan(ManifestArgs),
    /// Install or upgrade a release.
    Deploy(ManifestArgs),
    /// Redeploy the previous revision of a release.
    Rollback(ReleaseArgs),
    /// Remove every object of a release and its stored state.
    Delete(ReleaseArgs),
    /// Check that the cluster still matches the deployed revision.
    Verify(ReleaseArgs),
    /// Show the deployed revision and its history.
    Status(ReleaseArgs),
}

/// A release built from manifest files.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Release name.
    pub release: ReleaseName,

    /// Manifest files or directories, read recursively.
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

/// An already deployed release.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Release name.
    pub release: ReleaseName,
}

impl Cli {
    /// Manager settings: environment defaults overridden by flags.
    #[must_use]
    pub fn manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::from_env();
        if let Some(namespace) = &self.namespace {
            config = config.with_namespace(NamespaceMode::Specific(namespace.clone()));
        }
        if let Some(secs) = self.lock_timeout {
            config = config.with_lock_timeout(Duration::from_secs(secs));
        }
        config
    }
}
