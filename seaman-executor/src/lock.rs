//! Per-release mutual exclusion backed by a ConfigMap.
//!
//! Creating `<release>.lock` is atomic on the API server, so whoever
//! creates it holds the lock. Competing deployers wait for the ConfigMap
//! to be deleted and try again.

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use seaman_core::tags::{Annotations, CrateVersion, WithAnnotations, WithLabels};
use seaman_core::{ObjectType, ReleaseName};
use tokio::time::Instant;
use uuid::Uuid;

use crate::backend::ClusterBackend;
use crate::ExecutorError;

/// Annotation identifying the lock holder.
pub const HOLDER_KEY: &str = "able-seaman/lock-holder";

/// Annotation recording when the lock was taken.
pub const ACQUIRED_AT_KEY: &str = "able-seaman/acquired-at";

/// A held release lock.
///
/// Call [`ReleaseLock::release`] to free it. Dropping the lock without
/// releasing it leaves the ConfigMap in place; a warning is logged.
#[must_use = "the lock stays held until `release` is awaited"]
pub struct ReleaseLock<'a, B: ClusterBackend + ?Sized> {
    backend: &'a B,
    release: ReleaseName,
    holder: Uuid,
    released: bool,
}

impl<'a, B: ClusterBackend + ?Sized> ReleaseLock<'a, B> {
    /// Take the lock for `release`, waiting up to `timeout` for a current
    /// holder to let go.
    ///
    /// # Errors
    /// Returns [`ExecutorError::LockTimeout`] if the lock is still held when
    /// the timeout expires, or any backend error.
    pub async fn acquire(
        backend: &'a B,
        release: &ReleaseName,
        timeout: Duration,
    ) -> Result<Self, ExecutorError> {
        let holder = Uuid::new_v4();
        let name = release.lock_name();
        let annotations = Annotations::new()
            .add(&(HOLDER_KEY, holder))
            .add(&(ACQUIRED_AT_KEY, Utc::now().to_rfc3339()))
            .add(&CrateVersion);
        let mut lock = ConfigMap::default()
            .with_label(&ObjectType::Lock)
            .with_label(release)
            .with_annotations(&annotations);
        lock.metadata.name = Some(name.clone());

        let started = Instant::now();
        let deadline = started + timeout;

        loop {
            match backend.create_config_map(&lock).await {
                Ok(()) => {
                    tracing::debug!(%release, %holder, "lock acquired");
                    return Ok(Self {
                        backend,
                        release: release.clone(),
                        holder,
                        released: false,
                    });
                }
                Err(ExecutorError::AlreadyExists(_)) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ExecutorError::LockTimeout {
                            release: release.clone(),
                            waited: started.elapsed(),
                        });
                    }
                    tracing::info!(%release, lock = %name, "release is locked, waiting");
                    backend.wait_config_map_deleted(&name, remaining).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Identifier of this lock holder.
    #[must_use]
    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// Free the lock.
    ///
    /// If the ConfigMap now belongs to another holder (the lock was broken
    /// by hand and re-taken), it is left alone.
    ///
    /// # Errors
    /// Propagates backend errors.
    pub async fn release(mut self) -> Result<(), ExecutorError> {
        self.released = true;
        let name = self.release.lock_name();

        let Some(current) = self.backend.get_config_map(&name).await? else {
            tracing::warn!(release = %self.release, "lock vanished before release");
            return Ok(());
        };
        let holder = self.holder.to_string();
        if current.annotations().get(HOLDER_KEY) != Some(&holder) {
            tracing::warn!(
                release = %self.release,
                "lock taken over by another holder, not deleting"
            );
            return Ok(());
        }

        self.backend.delete_config_map(&name).await?;
        tracing::debug!(release = %self.release, holder = %self.holder, "lock released");
        Ok(())
    }
}

impl<B: ClusterBackend + ?Sized> Drop for ReleaseLock<'_, B> {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                release = %self.release,
                lock = %self.release.lock_name(),
                "lock dropped without release; delete the ConfigMap to unblock deployers"
            );
        }
    }
}
