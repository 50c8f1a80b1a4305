//! Kubernetes API backend implementation.
//!
//! Talks to the cluster through `kube`. Object kinds are resolved with API
//! discovery and cached, so each group/version/kind is looked up once.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{
    Api, DeleteParams, ListParams, Patch, PatchParams, PostParams, WatchEvent, WatchParams,
};
use kube::core::{ApiResource, DynamicObject, TypeMeta};
use kube::discovery::{self, verbs, Discovery, Scope};
use kube::Client;
use seaman_core::{Identifier, Labels, Objects};
use tokio::sync::Mutex;

use crate::backend::ClusterBackend;
use crate::config::{ManagerConfig, NamespaceMode};
use crate::ExecutorError;

/// Longest single watch request; the API server rejects anything above 295s.
const MAX_WATCH_SECS: u32 = 290;

type GvkKey = (String, String, String);

#[derive(Debug, Clone)]
struct ResolvedKind {
    resource: ApiResource,
    namespaced: bool,
}

/// Cluster backend speaking to a live API server.
pub struct KubeBackend {
    client: Client,
    namespace: String,
    field_manager: String,
    kinds: Mutex<HashMap<GvkKey, ResolvedKind>>,
}

impl KubeBackend {
    /// Create a backend from an existing client.
    #[must_use]
    pub fn new(client: Client, namespace: String, field_manager: String) -> Self {
        Self {
            client,
            namespace,
            field_manager,
            kinds: Mutex::new(HashMap::new()),
        }
    }

    /// Infer the cluster configuration (kubeconfig or in-cluster) and connect.
    ///
    /// # Errors
    /// Returns [`ExecutorError::Config`] if no configuration can be found and
    /// [`ExecutorError::Kube`] if the client cannot be built.
    pub async fn connect(config: &ManagerConfig) -> Result<Self, ExecutorError> {
        let mut kube_config = kube::Config::infer().await?;
        if let NamespaceMode::Specific(namespace) = &config.namespace {
            kube_config.default_namespace.clone_from(namespace);
        }
        let client = Client::try_from(kube_config)?;
        let namespace = client.default_namespace().to_owned();
        Ok(Self::new(client, namespace, config.field_manager.clone()))
    }

    /// The namespace this backend operates in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn config_maps(&self) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager).force()
    }

    async fn resolve(&self, identifier: &Identifier) -> Result<ResolvedKind, ExecutorError> {
        let key = (
            identifier.group.clone(),
            identifier.version.clone(),
            identifier.kind.clone(),
        );
        if let Some(kind) = self.kinds.lock().await.get(&key) {
            return Ok(kind.clone());
        }

        let (resource, capabilities) = discovery::pinned_kind(&self.client, &identifier.gvk())
            .await
            .map_err(|e| {
                tracing::debug!(%identifier, error = %e, "kind discovery failed");
                ExecutorError::UnknownResource(identifier.clone())
            })?;
        let kind = ResolvedKind {
            resource,
            namespaced: matches!(capabilities.scope, Scope::Namespaced),
        };
        self.kinds.lock().await.insert(key, kind.clone());
        Ok(kind)
    }

    async fn api_for(
        &self,
        object: &DynamicObject,
    ) -> Result<(Identifier, Api<DynamicObject>), ExecutorError> {
        let identifier = Identifier::from_object(object)?;
        let kind = self.resolve(&identifier).await?;
        Ok((identifier, self.api_with(&kind)))
    }

    fn api_with(&self, kind: &ResolvedKind) -> Api<DynamicObject> {
        if kind.namespaced {
            Api::namespaced_with(self.client.clone(), &self.namespace, &kind.resource)
        } else {
            Api::all_with(self.client.clone(), &kind.resource)
        }
    }
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError> {
        let (identifier, api) = self.api_for(object).await?;
        match api.create(&PostParams::default(), object).await {
            Err(e) if is_status(&e, 409) => {
                Err(ExecutorError::AlreadyExists(identifier.to_string()))
            }
            result => Ok(result?),
        }
    }

    async fn apply(&self, object: &DynamicObject) -> Result<DynamicObject, ExecutorError> {
        let (identifier, api) = self.api_for(object).await?;
        let patched = api
            .patch(&identifier.name, &self.patch_params(), &Patch::Apply(object))
            .await?;
        Ok(patched)
    }

    async fn delete(&self, object: &DynamicObject) -> Result<(), ExecutorError> {
        let (identifier, api) = self.api_for(object).await?;
        match api.delete(&identifier.name, &DeleteParams::default()).await {
            Err(e) if is_status(&e, 404) => Ok(()),
            result => result.map(|_| ()).map_err(ExecutorError::from),
        }
    }

    async fn list_labelled(&self, labels: &Labels) -> Result<Objects, ExecutorError> {
        let discovery = Discovery::new(self.client.clone()).run().await?;
        let params = ListParams::default().labels(&labels.selector());
        let mut found = Objects::new();

        for group in discovery.groups() {
            for (resource, capabilities) in group.recommended_resources() {
                if !capabilities.supports_operation(verbs::LIST) {
                    continue;
                }
                let kind = ResolvedKind {
                    namespaced: matches!(capabilities.scope, Scope::Namespaced),
                    resource,
                };
                let items = match self.api_with(&kind).list(&params).await {
                    Ok(list) => list.items,
                    Err(e) if [403, 404, 405].iter().any(|code| is_status(&e, *code)) => {
                        tracing::debug!(
                            kind = %kind.resource.kind,
                            error = %e,
                            "skipping unlistable resource"
                        );
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                for mut item in items {
                    // List responses omit per-item apiVersion/kind.
                    item.types = Some(TypeMeta {
                        api_version: kind.resource.api_version.clone(),
                        kind: kind.resource.kind.clone(),
                    });
                    let identifier = Identifier::from_object(&item)?;
                    found.insert(identifier, item);
                }
            }
        }

        Ok(found)
    }

    async fn get_config_map(&self, name: &str) -> Result<Option<ConfigMap>, ExecutorError> {
        Ok(self.config_maps().get_opt(name).await?)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError> {
        match self.config_maps().create(&PostParams::default(), config_map).await {
            Err(e) if is_status(&e, 409) => Err(ExecutorError::AlreadyExists(
                config_map.metadata.name.clone().unwrap_or_default(),
            )),
            result => result.map(|_| ()).map_err(ExecutorError::from),
        }
    }

    async fn apply_config_map(&self, config_map: &ConfigMap) -> Result<(), ExecutorError> {
        let name = config_map
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| ExecutorError::Backend("ConfigMap without a name".to_owned()))?;
        self.config_maps()
            .patch(name, &self.patch_params(), &Patch::Apply(config_map))
            .await?;
        Ok(())
    }

    async fn delete_config_map(&self, name: &str) -> Result<(), ExecutorError> {
        match self.config_maps().delete(name, &DeleteParams::default()).await {
            Err(e) if is_status(&e, 404) => Ok(()),
            result => result.map(|_| ()).map_err(ExecutorError::from),
        }
    }

    async fn wait_config_map_deleted(
        &self,
        name: &str,
        timeout: Duration,
    ) -> Result<bool, ExecutorError> {
        let api = self.config_maps();
        let Some(existing) = api.get_opt(name).await? else {
            return Ok(true);
        };
        let version = existing.metadata.resource_version.unwrap_or_else(|| "0".to_owned());

        let secs = u32::try_from(timeout.as_secs())
            .unwrap_or(MAX_WATCH_SECS)
            .clamp(1, MAX_WATCH_SECS);
        let params = WatchParams::default()
            .fields(&format!("metadata.name={name}"))
            .timeout(secs);

        let watch = async {
            let mut stream = api.watch(&params, &version).await?.boxed();
            while let Some(event) = stream.try_next().await? {
                match event {
                    WatchEvent::Deleted(_) => return Ok::<bool, ExecutorError>(true),
                    WatchEvent::Error(response) => {
                        // 410 Gone: our resource version is stale, re-check directly.
                        if response.code == 410 {
                            break;
                        }
                        return Err(kube::Error::Api(response).into());
                    }
                    _ => {}
                }
            }
            Ok(false)
        };

        match tokio::time::timeout(timeout, watch).await {
            Ok(Ok(true)) => Ok(true),
            Ok(Err(e)) => Err(e),
            Ok(Ok(false)) | Err(_) => Ok(api.get_opt(name).await?.is_none()),
        }
    }
}
