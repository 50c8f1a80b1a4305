//! High-level release manager wrapping a [`ClusterBackend`].
//!
//! Every mutating operation runs under the release lock and records the
//! outcome in the release-state ConfigMap.

use std::future::Future;

use chrono::Utc;
use kube::ResourceExt;
use seaman_core::verify::verify_objects;
use seaman_core::{
    CoreError, Identifier, Labels, ObjectType, Objects, Release, ReleaseName, ReleasePlan,
    ReleaseState,
};

use crate::backend::ClusterBackend;
use crate::config::ManagerConfig;
use crate::kube_backend::KubeBackend;
use crate::lock::ReleaseLock;
use crate::runner::PlanRunner;
use crate::ExecutorError;

/// Result of [`Manager::deploy`].
#[derive(Debug, Clone)]
pub enum DeployOutcome {
    /// The deployed revision already has the same content.
    Unchanged { revision: u64 },
    /// The release was installed for the first time.
    Installed { revision: u64, plan: ReleasePlan },
    /// An existing release was upgraded.
    Upgraded { revision: u64, plan: ReleasePlan },
}

/// Result of [`Manager::rollback`].
#[derive(Debug, Clone)]
pub struct RollbackOutcome {
    /// The historical revision whose objects were restored.
    pub restored: u64,
    /// The new revision number recording the rollback.
    pub revision: u64,
    /// The steps that were applied.
    pub plan: ReleasePlan,
}

/// Deploys, inspects and removes releases.
pub struct Manager<B: ClusterBackend> {
    backend: B,
    config: ManagerConfig,
}

impl Manager<KubeBackend> {
    /// Connect to the cluster described by the ambient kubeconfig.
    ///
    /// # Errors
    /// Propagates errors from [`KubeBackend::connect`].
    pub async fn connect(config: ManagerConfig) -> Result<Self, ExecutorError> {
        let backend = KubeBackend::connect(&config).await?;
        tracing::debug!(namespace = backend.namespace(), "connected to cluster");
        Ok(Self::new(backend, config))
    }
}

impl<B: ClusterBackend> Manager<B> {
    /// Create a manager over `backend`.
    #[must_use]
    pub fn new(backend: B, config: ManagerConfig) -> Self {
        Self { backend, config }
    }

    /// The underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The manager configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Install `release`, or upgrade it if it is already deployed.
    ///
    /// # Errors
    /// Returns [`ExecutorError::LockTimeout`] if another deployer holds the
    /// lock, [`ExecutorError::RolledBack`] / [`ExecutorError::RollbackFailed`]
    /// if a plan step fails, or the state write error (after undoing the
    /// plan) if the new state cannot be stored.
    pub async fn deploy(&self, release: &Release) -> Result<DeployOutcome, ExecutorError> {
        check_reserved_names(release)?;
        self.locked(&release.name, self.deploy_locked(release)).await
    }

    async fn deploy_locked(&self, release: &Release) -> Result<DeployOutcome, ExecutorError> {
        let name = &release.name;
        let now = Utc::now();

        match self.load_state(name).await? {
            None => {
                let plan = ReleasePlan::new(name, &release.objects, &Objects::new());
                let state = ReleaseState::initial(release, now);
                self.apply_and_record(name, &plan, &state).await?;

                tracing::info!(
                    release = %name,
                    revision = 1,
                    steps = plan.len(),
                    "release installed"
                );
                Ok(DeployOutcome::Installed { revision: 1, plan })
            }

            Some(mut state) => {
                if state.current.digest == release.digest() {
                    let revision = state.current.number;
                    tracing::info!(release = %name, revision, "release unchanged");
                    return Ok(DeployOutcome::Unchanged { revision });
                }

                let plan = ReleasePlan::new(name, &release.objects, &state.current.objects);
                state.advance(release, now, self.config.history_limit)?;
                self.apply_and_record(name, &plan, &state).await?;

                let revision = state.current.number;
                tracing::info!(release = %name, revision, steps = plan.len(), "release upgraded");
                Ok(DeployOutcome::Upgraded { revision, plan })
            }
        }
    }

    /// Compute what [`Manager::deploy`] would do, without changing anything.
    ///
    /// The plan is empty when the deployed revision has the same digest.
    ///
    /// # Errors
    /// Propagates state lookup errors.
    pub async fn plan(&self, release: &Release) -> Result<ReleasePlan, ExecutorError> {
        let current = match self.load_state(&release.name).await? {
            Some(state) if state.current.digest == release.digest() => {
                return Ok(ReleasePlan::default());
            }
            Some(state) => state.current.objects,
            None => Objects::new(),
        };
        Ok(ReleasePlan::new(&release.name, &release.objects, &current))
    }

    /// The stored state of release `name`, if it is deployed.
    ///
    /// # Errors
    /// Returns [`CoreError::CorruptReleaseState`] if the state cannot be read.
    pub async fn status(&self, name: &ReleaseName) -> Result<Option<ReleaseState>, ExecutorError> {
        self.load_state(name).await
    }

    /// Redeploy the most recent historical revision of `name`.
    ///
    /// The rollback is recorded as a new revision.
    ///
    /// # Errors
    /// Returns [`ExecutorError::NoDeployedRelease`] or
    /// [`ExecutorError::NoPreviousRevision`] if there is nothing to roll back
    /// to, plus the errors of [`Manager::deploy`].
    pub async fn rollback(&self, name: &ReleaseName) -> Result<RollbackOutcome, ExecutorError> {
        self.locked(name, self.rollback_locked(name)).await
    }

    async fn rollback_locked(&self, name: &ReleaseName) -> Result<RollbackOutcome, ExecutorError> {
        let mut state = self
            .load_state(name)
            .await?
            .ok_or_else(|| ExecutorError::NoDeployedRelease(name.clone()))?;
        let target = state
            .rollback_target()
            .cloned()
            .ok_or_else(|| ExecutorError::NoPreviousRevision(name.clone()))?;

        let release = target.to_release(name.clone());
        let plan = ReleasePlan::new(name, &release.objects, &state.current.objects);
        state.advance(&release, Utc::now(), self.config.history_limit)?;
        self.apply_and_record(name, &plan, &state).await?;

        tracing::info!(
            release = %name,
            restored = target.number,
            revision = state.current.number,
            "release rolled back"
        );
        Ok(RollbackOutcome {
            restored: target.number,
            revision: state.current.number,
            plan,
        })
    }

    /// Uninstall release `name` and forget its state.
    ///
    /// Returns `None` if the release is not deployed.
    ///
    /// # Errors
    /// Returns the plan execution error if any object cannot be deleted;
    /// the state is kept in that case.
    pub async fn delete(&self, name: &ReleaseName) -> Result<Option<ReleasePlan>, ExecutorError> {
        self.locked(name, self.delete_locked(name)).await
    }

    async fn delete_locked(
        &self,
        name: &ReleaseName,
    ) -> Result<Option<ReleasePlan>, ExecutorError> {
        let Some(state) = self.load_state(name).await? else {
            tracing::info!(release = %name, "release not deployed, nothing to delete");
            return Ok(None);
        };

        let plan = ReleasePlan::new(name, &Objects::new(), &state.current.objects);
        PlanRunner::new(&self.backend).execute(&plan).await?;
        self.backend.delete_config_map(name.as_str()).await?;

        tracing::info!(release = %name, steps = plan.len(), "release deleted");
        Ok(Some(plan))
    }

    /// Check that the cluster still matches the deployed revision of `name`.
    ///
    /// # Errors
    /// Returns [`ExecutorError::NoDeployedRelease`] if there is no state and
    /// [`ExecutorError::Verification`] describing the first drift found.
    pub async fn verify(&self, name: &ReleaseName) -> Result<(), ExecutorError> {
        let state = self
            .load_state(name)
            .await?
            .ok_or_else(|| ExecutorError::NoDeployedRelease(name.clone()))?;
        let actual = self.backend.list_labelled(&Labels::managed_by(name)).await?;

        verify_objects(name, &state.current.objects, &actual)
            .map_err(|discrepancy| ExecutorError::Verification(Box::new(discrepancy)))?;

        tracing::info!(release = %name, objects = state.current.objects.len(), "release verified");
        Ok(())
    }

    async fn load_state(&self, name: &ReleaseName) -> Result<Option<ReleaseState>, ExecutorError> {
        let Some(config_map) = self.backend.get_config_map(name.as_str()).await? else {
            return Ok(None);
        };

        let expected = ObjectType::ReleaseState.to_string();
        if config_map.labels().get(seaman_core::tags::TYPE_KEY) != Some(&expected) {
            return Err(CoreError::CorruptReleaseState {
                name: name.to_string(),
                reason: "ConfigMap is not an able-seaman release state".to_owned(),
            }
            .into());
        }

        Ok(Some(ReleaseState::from_config_map(&config_map)?))
    }

    /// Run `plan`, then store `state`. If storing fails the plan is undone
    /// so that the cluster keeps matching the previously stored state.
    async fn apply_and_record(
        &self,
        name: &ReleaseName,
        plan: &ReleasePlan,
        state: &ReleaseState,
    ) -> Result<(), ExecutorError> {
        let config_map = state.to_config_map(name)?;
        let runner = PlanRunner::new(&self.backend);
        runner.execute(plan).await?;

        if let Err(cause) = self.backend.apply_config_map(&config_map).await {
            tracing::warn!(
                release = %name,
                error = %cause,
                "storing release state failed, undoing plan"
            );
            if let Err(undo) = runner.execute(&plan.undo()).await {
                tracing::error!(
                    release = %name,
                    error = %undo,
                    "undoing plan failed; cluster no longer matches stored state"
                );
            }
            return Err(cause);
        }
        Ok(())
    }

    /// Run `operation` while holding the lock on `name`.
    ///
    /// The lock is released whether or not the operation succeeds. A failed
    /// release is logged; the operation's own result is returned.
    async fn locked<T>(
        &self,
        name: &ReleaseName,
        operation: impl Future<Output = Result<T, ExecutorError>>,
    ) -> Result<T, ExecutorError> {
        let lock = ReleaseLock::acquire(&self.backend, name, self.config.lock_timeout).await?;
        let result = operation.await;
        if let Err(e) = lock.release().await {
            tracing::error!(release = %name, error = %e, "failed to release lock");
        }
        result
    }
}

/// Reject objects that would overwrite the release's own bookkeeping.
fn check_reserved_names(release: &Release) -> Result<(), ExecutorError> {
    for reserved in [release.name.to_string(), release.name.lock_name()] {
        let identifier = Identifier::new("", "v1", "ConfigMap", reserved);
        if release.objects.contains_key(&identifier) {
            return Err(ExecutorError::ReservedName(identifier));
        }
    }
    Ok(())
}
