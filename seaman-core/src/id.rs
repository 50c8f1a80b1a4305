use std::fmt;
use std::str::FromStr;

use kube::core::{DynamicObject, GroupVersionKind};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Longest release name accepted. Release names are used as label values,
/// which Kubernetes caps at 63 characters.
pub const MAX_RELEASE_NAME_LEN: usize = 63;

/// Validated name of a release.
///
/// Lowercase ASCII alphanumerics and `-`, starting and ending with an
/// alphanumeric, at most [`MAX_RELEASE_NAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReleaseName(String);

impl ReleaseName {
    /// Validates and wraps a release name.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidReleaseName`] if the name breaks the
    /// naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let invalid = |reason| CoreError::InvalidReleaseName { name: name.clone(), reason };

        if name.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if name.len() > MAX_RELEASE_NAME_LEN {
            return Err(invalid("must be at most 63 characters"));
        }
        if !name.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
            return Err(invalid("may only contain lowercase alphanumerics and '-'"));
        }
        if name.starts_with('-') || name.ends_with('-') {
            return Err(invalid("must start and end with an alphanumeric"));
        }

        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the ConfigMap used to lock this release.
    ///
    /// Release names cannot contain `.`, so no release stores its state
    /// under another release's lock name.
    #[must_use]
    pub fn lock_name(&self) -> String {
        format!("{}.lock", self.0)
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReleaseName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ReleaseName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReleaseName> for String {
    fn from(name: ReleaseName) -> Self {
        name.0
    }
}

/// Identifies one object of a release: its group, version, kind and name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// API group, empty for the core group.
    pub group: String,
    /// API version within the group.
    pub version: String,
    /// Object kind, e.g. `Deployment`.
    pub kind: String,
    /// `metadata.name` of the object.
    pub name: String,
}

impl Identifier {
    /// Creates an identifier from its parts.
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Derives the identifier of a dynamic object.
    ///
    /// # Errors
    /// Returns [`CoreError::ObjectWithoutName`] if `metadata.name` is unset
    /// and [`CoreError::MissingTypeMeta`] if `apiVersion`/`kind` are absent.
    pub fn from_object(object: &DynamicObject) -> Result<Self, CoreError> {
        let types = object.types.as_ref();
        let Some(name) = object.metadata.name.clone() else {
            return Err(CoreError::ObjectWithoutName {
                kind: types.map(|t| t.kind.clone()).unwrap_or_default(),
            });
        };
        let types = match types {
            Some(types) if !types.kind.is_empty() && !types.api_version.is_empty() => types,
            _ => return Err(CoreError::MissingTypeMeta { name }),
        };
        let (group, version) = split_api_version(&types.api_version);
        Ok(Self::new(group, version, types.kind.clone(), name))
    }

    /// The `apiVersion` string, `group/version` or just `version` for core.
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The group/version/kind triple of this object.
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}/{}", self.kind, self.version, self.name)
        } else {
            write!(f, "{}.{}/{}/{}", self.kind, self.group, self.version, self.name)
        }
    }
}

/// Splits an `apiVersion` into `(group, version)`.
#[must_use]
pub fn split_api_version(api_version: &str) -> (&str, &str) {
    api_version.split_once('/').unwrap_or(("", api_version))
}

/// A SHA-256 digest over the content of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseDigest(pub [u8; 32]);

impl ReleaseDigest {
    /// Creates a `ReleaseDigest` from a raw 32-byte array.
    #[must_use]
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ReleaseDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
