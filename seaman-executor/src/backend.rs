//! Cluster backend abstraction trait.
//!
//! Allows swapping the live Kubernetes API for an in-memory cluster
//! without changing the deployment logic.

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::DynamicObject;
use seaman_core::{Labels, Objects};

use crate::ExecutorError;

/// Namespaced access to the objects of a cluster.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Create a new object.
    ///
    /// # Errors
    /// Returns [`ExecutorError::AlreadyExists`] if an object with the same
    /// identifier exists.
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError>;

    /// Server-side apply an object, taking ownership of conflicting fields.
    ///
    /// # Errors
    /// Returns [`ExecutorError::UnknownResource`] if no API serves the kind.
    async fn apply(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError>;

    /// Delete an object. Deleting an absent object succeeds.
    ///
    /// # Errors
    /// Propagates API failures other than "not found".
    async fn delete(&self, object: &DynamicObject) -> Result<(), ExecutorError>;

    /// List every object in the namespace carrying all of `labels`.
    ///
    /// # Errors
    /// Propagates discovery and list failures.
    async fn list_labelled(&self, labels: &Labels) -> Result<Objects, ExecutorError>;

    /// Fetch a ConfigMap by name.
    ///
    /// # Errors
    /// Propagates API failures other than "not found".
    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ExecutorError>;

    /// Create a ConfigMap.
    ///
    /// # Errors
    /// Returns [`ExecutorError::AlreadyExists`] if the name is taken.
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError>;

    /// Server-side apply a ConfigMap.
    ///
    /// # Errors
    /// Propagates API failures.
    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError>;

    /// Delete a ConfigMap by name. Deleting an absent ConfigMap succeeds.
    ///
    /// # Errors
    /// Propagates API failures other than "not found".
    async fn delete_config_map(&self, name: &str) -> Result<(), ExecutorError>;

    /// Wait up to `timeout` for the named ConfigMap to disappear.
    ///
    /// Returns `true` if it is gone, `false` if it still exists when the
    /// wait ends.
    ///
    /// # Errors
    /// Propagates API failures.
    async fn wait_config_map_deleted(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ExecutorError>;
}
