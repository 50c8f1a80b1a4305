//! Cluster-facing side of the able-seaman release manager.
//!
//! Talks to the Kubernetes API (or an in-memory stand-in), serialises
//! deployers through a per-release lock, runs release plans with rollback,
//! and keeps the release state ConfigMap up to date.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod config;
pub mod error;
pub mod kube_backend;
pub mod lock;
pub mod manager;
pub mod memory;
pub mod runner;

pub use backend::ClusterBackend;
pub use config::{ManagerConfig, NamespaceMode};
pub use error::ExecutorError;
pub use kube_backend::KubeBackend;
pub use lock::ReleaseLock;
pub use manager::{DeployOutcome, Manager, RollbackOutcome};
pub use memory::MemoryBackend;
pub use runner::PlanRunner;
