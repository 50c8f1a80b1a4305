//! In-process cluster used for tests and dry runs.
//!
//! Objects are kept in ordered maps. Individual operations can be made to
//! fail so that rollback paths can be exercised without a real cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::core::DynamicObject;
use kube::ResourceExt;
use seaman_core::{Action, Identifier, Labels, Objects};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::backend::ClusterBackend;
use crate::ExecutorError;

#[derive(Debug, Default)]
struct Cluster {
    objects: Objects,
    config_maps: BTreeMap<String, ConfigMap>,
    failures: BTreeSet<(Action, Identifier)>,
    fail_state_writes: bool,
    log: Vec<(Action, Identifier)>,
}

/// A namespaced cluster held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    cluster: Mutex<Cluster>,
    config_map_deleted: Notify,
}

impl MemoryBackend {
    /// Create an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `action` on `identifier` fail, once.
    pub async fn fail_on(&self, action: Action, identifier: Identifier) {
        self.cluster.lock().await.failures.insert((action, identifier));
    }

    /// Make every release-state write fail until reset.
    pub async fn fail_state_writes(&self, fail: bool) {
        self.cluster.lock().await.fail_state_writes = fail;
    }

    /// Snapshot of the objects currently stored.
    pub async fn objects(&self) -> Objects {
        self.cluster.lock().await.objects.clone()
    }

    /// Names of the ConfigMaps currently stored.
    pub async fn config_map_names(&self) -> Vec<String> {
        self.cluster.lock().await.config_maps.keys().cloned().collect()
    }

    /// Every successful object operation, in order.
    pub async fn operations(&self) -> Vec<(Action, Identifier)> {
        self.cluster.lock().await.log.clone()
    }

    /// Insert or replace an object directly, bypassing the log.
    ///
    /// # Errors
    /// Fails if the object has no name or type information.
    pub async fn put(&self, object: DynamicObject) -> Result<(), ExecutorError> {
        let identifier = Identifier::from_object(&object)?;
        self.cluster.lock().await.objects.insert(identifier, object);
        Ok(())
    }

    /// Insert or replace a ConfigMap directly.
    pub async fn put_config_map(&self, config_map: ConfigMap) {
        let name = config_map.name_any();
        self.cluster.lock().await.config_maps.insert(name, config_map);
    }
}

impl Cluster {
    fn take_failure(
        &mut self,
        action: Action,
        identifier: &Identifier,
    ) -> Result<(), ExecutorError> {
        if self.failures.remove(&(action, identifier.clone())) {
            return Err(ExecutorError::Backend(format!(
                "injected {action} failure for {identifier}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterBackend for MemoryBackend {
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError> {
        let identifier = Identifier::from_object(object)?;
        let mut cluster = self.cluster.lock().await;
        cluster.take_failure(Action::Create, &identifier)?;
        if cluster.objects.contains_key(&identifier) {
            return Err(ExecutorError::AlreadyExists(identifier.to_string()));
        }
        cluster.objects.insert(identifier.clone(), object.clone());
        cluster.log.push((Action::Create, identifier));
        Ok(object.clone())
    }

    async fn apply(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError> {
        let identifier = Identifier::from_object(object)?;
        let mut cluster = self.cluster.lock().await;
        cluster.take_failure(Action::Upgrade, &identifier)?;
        cluster.objects.insert(identifier.clone(), object.clone());
        cluster.log.push((Action::Upgrade, identifier));
        Ok(object.clone())
    }

    async fn delete(&self, object: &DynamicObject) -> Result<(), ExecutorError> {
        let identifier = Identifier::from_object(object)?;
        let mut cluster = self.cluster.lock().await;
        cluster.take_failure(Action::Delete, &identifier)?;
        cluster.objects.remove(&identifier);
        cluster.log.push((Action::Delete, identifier));
        Ok(())
    }

    async fn list_labelled(&self, labels: &Labels) -> Result<Objects, ExecutorError> {
        let cluster = self.cluster.lock().await;
        Ok(cluster
            .objects
            .iter()
            .filter(|(_, object)| labels.matches(object.labels()))
            .map(|(id, object)| (id.clone(), object.clone()))
            .collect())
    }

    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ExecutorError> {
        Ok(self.cluster.lock().await.config_maps.get(name).cloned())
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError> {
        let name = config_map.name_any();
        let mut cluster = self.cluster.lock().await;
        if cluster.config_maps.contains_key(&name) {
            return Err(ExecutorError::AlreadyExists(name));
        }
        cluster.config_maps.insert(name, config_map.clone());
        Ok(())
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError> {
        let name = config_map.name_any();
        let mut cluster = self.cluster.lock().await;
        if cluster.fail_state_writes {
            return Err(ExecutorError::Backend(format!(
                "injected write failure for ConfigMap {name}"
            )));
        }
        cluster.config_maps.insert(name, config_map.clone());
        Ok(())
    }

    async fn delete_config_map(&self, name: &str) -> Result<(), ExecutorError> {
        let removed = self.cluster.lock().await.config_maps.remove(name).is_some();
        if removed {
            self.config_map_deleted.notify_waiters();
        }
        Ok(())
    }

    async fn wait_config_map_deleted(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ExecutorError> {
        let deadline = Instant::now() + timeout;
        loop {
            let deleted = self.config_map_deleted.notified();
            if !self.cluster.lock().await.config_maps.contains_key(name) {
                return Ok(true);
            }
            if tokio::time::timeout_at(deadline, deleted).await.is_err() {
                return Ok(!self.cluster.lock().await.config_maps.contains_key(name));
            }
        }
    }
}
