//! Persisted release state: the deployed revision and its predecessors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::ConfigMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ReleaseDigest, ReleaseName};
use crate::objects::{self, Objects};
use crate::release::Release;
use crate::tags::{CrateVersion, ObjectType, WithAnnotations, WithLabels};

/// ConfigMap data key holding the serialized state.
pub const STATE_KEY: &str = "release_state";

/// Number of past revisions kept by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One deployed version of a release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Monotonic revision number, starting at 1.
    pub number: u64,
    /// When this revision was deployed.
    pub deployed_at: DateTime<Utc>,
    /// Digest of the release content.
    pub digest: ReleaseDigest,
    /// The objects deployed in this revision.
    #[serde(with = "objects::as_list")]
    pub objects: Objects,
}

impl Revision {
    /// Rebuilds the release this revision deployed.
    #[must_use]
    pub fn to_release(&self, name: ReleaseName) -> Release {
        Release::from_objects(name, self.objects.clone())
    }
}

/// The deployed revision of a release plus its history, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseState {
    pub current: Revision,
    pub history: Vec<Revision>,
}

impl ReleaseState {
    /// State after the first install of `release`.
    #[must_use]
    pub fn initial(release: &Release, now: DateTime<Utc>) -> Self {
        Self {
            current: Revision {
                number: 1,
                deployed_at: now,
                digest: release.digest(),
                objects: release.objects.clone(),
            },
            history: Vec::new(),
        }
    }

    /// Records `release` as the new current revision.
    ///
    /// The previous revision moves to the front of the history, which is
    /// truncated to `history_limit` entries.
    ///
    /// # Errors
    /// Returns [`CoreError::CorruptReleaseState`] if the revision counter is
    /// exhausted. The state is left unchanged in that case.
    pub fn advance(
        &mut self,
        release: &Release,
        now: DateTime<Utc>,
        history_limit: usize,
    ) -> Result<(), CoreError> {
        let number = self.current.number.checked_add(1).ok_or_else(|| {
            CoreError::CorruptReleaseState {
                name: release.name.to_string(),
                reason: format!("revision number {} cannot be advanced", self.current.number),
            }
        })?;
        let next = Revision {
            number,
            deployed_at: now,
            digest: release.digest(),
            objects: release.objects.clone(),
        };
        let previous = std::mem::replace(&mut self.current, next);
        self.history.insert(0, previous);
        self.history.truncate(history_limit);
        Ok(())
    }

    /// The most recent past revision, if any.
    #[must_use]
    pub fn rollback_target(&self) -> Option<&Revision> {
        self.history.first()
    }

    /// Encodes the state as a ConfigMap named `name`.
    ///
    /// # Errors
    /// Returns [`CoreError::Json`] if the state cannot be serialized.
    pub fn to_config_map(&self, name: &ReleaseName) -> Result<ConfigMap, CoreError> {
        let mut config_map = ConfigMap::default()
            .with_label(&ObjectType::ReleaseState)
            .with_label(name)
            .with_annotation(&CrateVersion);
        config_map.metadata.name = Some(name.to_string());
        config_map.data = Some(BTreeMap::from([(
            STATE_KEY.to_owned(),
            serde_json::to_string(self)?,
        )]));
        Ok(config_map)
    }

    /// Decodes the state stored in a ConfigMap.
    ///
    /// # Errors
    /// Returns [`CoreError::CorruptReleaseState`] if the payload is missing
    /// or cannot be decoded.
    pub fn from_config_map(config_map: &ConfigMap) -> Result<Self, CoreError> {
        let name = config_map.metadata.name.clone().unwrap_or_default();
        let payload = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(STATE_KEY))
            .ok_or_else(|| CoreError::CorruptReleaseState {
                name: name.clone(),
                reason: format!("missing data key '{STATE_KEY}'"),
            })?;
        serde_json::from_str(payload).map_err(|e| CoreError::CorruptReleaseState {
            name,
            reason: e.to_string(),
        })
    }
}
