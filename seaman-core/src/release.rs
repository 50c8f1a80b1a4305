use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;
use crate::id::{ReleaseDigest, ReleaseName};
use crate::objects::{self, Objects};

/// A named set of Kubernetes objects deployed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    /// Name of the release.
    pub name: ReleaseName,
    /// The objects making up the release.
    #[serde(with = "objects::as_list")]
    pub objects: Objects,
}

impl Release {
    /// Creates an empty release.
    #[must_use]
    pub fn new(name: ReleaseName) -> Self {
        Self::from_objects(name, Objects::new())
    }

    /// Creates a release from an existing object collection.
    #[must_use]
    pub fn from_objects(name: ReleaseName, objects: Objects) -> Self {
        Self { name, objects }
    }

    /// Adds the documents of a YAML stream to the release.
    ///
    /// # Errors
    /// See [`objects::ingest`].
    pub fn ingest_objects<R: Read>(&mut self, input: R) -> Result<(), CoreError> {
        objects::ingest(&mut self.objects, input)
    }

    /// Adds every manifest found at `path` to the release.
    ///
    /// # Errors
    /// See [`objects::ingest_path`].
    pub fn ingest_path(&mut self, path: &Path) -> Result<(), CoreError> {
        objects::ingest_path(&mut self.objects, path)
    }

    /// Computes the content digest of the release.
    ///
    /// `D = SHA-256(name || (identifier || json(object))*)`, objects in
    /// identifier order. Each field is length-prefixed so that adjacent
    /// fields cannot run into each other.
    #[must_use]
    pub fn digest(&self) -> ReleaseDigest {
        let mut hasher = Sha256::new();
        update_field(&mut hasher, self.name.as_str().as_bytes());
        for (identifier, object) in &self.objects {
            update_field(&mut hasher, identifier.to_string().as_bytes());
            // DynamicObject serialization cannot fail: all keys are strings.
            let json = serde_json::to_vec(object).unwrap_or_default();
            update_field(&mut hasher, &json);
        }
        ReleaseDigest::new(hasher.finalize().into())
    }
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
