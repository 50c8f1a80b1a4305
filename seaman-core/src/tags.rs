//! Labels and annotations that mark objects owned by able-seaman.
//!
//! Every key lives under the [`CRATE_NAME`] prefix. Managed objects carry
//! a type label, the release they belong to, and the version of the tool
//! that wrote them.

use std::collections::BTreeMap;
use std::fmt;

use kube::ResourceExt;
use serde::{Deserialize, Serialize};

use crate::id::ReleaseName;

/// Prefix for every label and annotation key.
pub const CRATE_NAME: &str = "able-seaman";

/// Version stamped on every object written.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Label holding the [`ObjectType`].
pub const TYPE_KEY: &str = "able-seaman/type";

/// Label holding the owning release name.
pub const RELEASE_KEY: &str = "able-seaman/release";

/// Annotation holding [`CRATE_VERSION`].
pub const VERSION_KEY: &str = "able-seaman/version";

/// Role of an object written to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    /// A release lock ConfigMap.
    Lock,
    /// A release-state ConfigMap.
    ReleaseState,
    /// An object deployed as part of a release.
    Managed,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectType::Lock => "lock",
            ObjectType::ReleaseState => "release-state",
            ObjectType::Managed => "managed",
        })
    }
}

/// Something that renders as a single label.
pub trait ToLabel {
    /// Returns the `(key, value)` pair.
    fn to_label(&self) -> (&'static str, String);
}

/// Something that renders as a single annotation.
pub trait ToAnnotation {
    /// Returns the `(key, value)` pair.
    fn to_annotation(&self) -> (&'static str, String);
}

impl ToLabel for ObjectType {
    fn to_label(&self) -> (&'static str, String) {
        (TYPE_KEY, self.to_string())
    }
}

impl ToLabel for ReleaseName {
    fn to_label(&self) -> (&'static str, String) {
        (RELEASE_KEY, self.to_string())
    }
}

impl<S: ToString> ToLabel for (&'static str, S) {
    fn to_label(&self) -> (&'static str, String) {
        (self.0, self.1.to_string())
    }
}

/// The tool version annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrateVersion;

impl ToAnnotation for CrateVersion {
    fn to_annotation(&self) -> (&'static str, String) {
        (VERSION_KEY, CRATE_VERSION.to_owned())
    }
}

impl<S: ToString> ToAnnotation for (&'static str, S) {
    fn to_annotation(&self) -> (&'static str, String) {
        (self.0, self.1.to_string())
    }
}

/// An ordered set of labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    labels: BTreeMap<&'static str, String>,
}

impl Labels {
    /// Creates an empty label set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label, replacing any previous value for the key.
    #[must_use]
    pub fn add<L: ToLabel>(mut self, label: &L) -> Self {
        let (key, value) = label.to_label();
        self.labels.insert(key, value);
        self
    }

    /// Renders the set as a label selector, e.g. `a=1,b=2`.
    #[must_use]
    pub fn selector(&self) -> String {
        self.labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Returns `true` if every label in the set is present on `labels`.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(key, value)| labels.get(*key) == Some(value))
    }

    /// Labels selecting the managed objects of `release`.
    #[must_use]
    pub fn managed_by(release: &ReleaseName) -> Self {
        Self::new().add(&ObjectType::Managed).add(release)
    }

    fn apply_to<R: ResourceExt>(&self, subject: &mut R) {
        subject
            .labels_mut()
            .extend(self.labels.iter().map(|(key, value)| ((*key).to_owned(), value.clone())));
    }
}

/// An ordered set of annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    annotations: BTreeMap<&'static str, String>,
}

impl Annotations {
    /// Creates an empty annotation set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an annotation, replacing any previous value for the key.
    #[must_use]
    pub fn add<A: ToAnnotation>(mut self, annotation: &A) -> Self {
        let (key, value) = annotation.to_annotation();
        self.annotations.insert(key, value);
        self
    }

    fn apply_to<R: ResourceExt>(&self, subject: &mut R) {
        subject.annotations_mut().extend(
            self.annotations
                .iter()
                .map(|(key, value)| ((*key).to_owned(), value.clone())),
        );
    }
}

/// Builder-style label helpers for any Kubernetes resource.
pub trait WithLabels: Sized {
    /// Adds every label in `labels`.
    #[must_use]
    fn with_labels(self, labels: &Labels) -> Self;

    /// Adds a single label.
    #[must_use]
    fn with_label<L: ToLabel>(self, label: &L) -> Self;
}

impl<R: ResourceExt> WithLabels for R {
    fn with_labels(mut self, labels: &Labels) -> Self {
        labels.apply_to(&mut self);
        self
    }

    fn with_label<L: ToLabel>(mut self, label: &L) -> Self {
        let (key, value) = label.to_label();
        self.labels_mut().insert(key.to_owned(), value);
        self
    }
}

/// Builder-style annotation helpers for any Kubernetes resource.
pub trait WithAnnotations: Sized {
    /// Adds every annotation in `annotations`.
    #[must_use]
    fn with_annotations(self, annotations: &Annotations) -> Self;

    /// Adds a single annotation.
    #[must_use]
    fn with_annotation<A: ToAnnotation>(self, annotation: &A) -> Self;
}

impl<R: ResourceExt> WithAnnotations for R {
    fn with_annotations(mut self, annotations: &Annotations) -> Self {
        annotations.apply_to(&mut self);
        self
    }

    fn with_annotation<A: ToAnnotation>(mut self, annotation: &A) -> Self {
        let (key, value) = annotation.to_annotation();
        self.annotations_mut().insert(key.to_owned(), value);
        self
    }
}

/// Returns a copy of `object` tagged as a managed object of `release`.
#[must_use]
pub fn tag_managed<R: ResourceExt + Clone>(release: &ReleaseName, object: &R) -> R {
    object
        .clone()
        .with_labels(&Labels::managed_by(release))
        .with_annotation(&CrateVersion)
}

#[cfg(test)]
mod tests {
    use kube::core::{ApiResource, DynamicObject, GroupVersionKind};

    use super::*;

    fn config_map(name: &str) -> DynamicObject {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"));
        DynamicObject::new(name, &resource)
    }

    fn release(name: &str) -> ReleaseName {
        match ReleaseName::new(name) {
            Ok(n) => n,
            Err(e) => panic!("invalid test release name: {e}"),
        }
    }

    #[test]
    fn selector_is_sorted_and_comma_separated() {
        let labels = Labels::managed_by(&release("web"));
        assert_eq!(labels.selector(), "able-seaman/release=web,able-seaman/type=managed");
    }

    #[test]
    fn tag_managed_sets_labels_and_version() {
        let tagged = tag_managed(&release("web"), &config_map("settings"));
        let labels = tagged.labels();
        assert_eq!(labels.get(TYPE_KEY).map(String::as_str), Some("managed"));
        assert_eq!(labels.get(RELEASE_KEY).map(String::as_str), Some("web"));
        assert_eq!(
            tagged.annotations().get(VERSION_KEY).map(String::as_str),
            Some(CRATE_VERSION)
        );
    }

    #[test]
    fn tag_managed_keeps_existing_labels() {
        let object = config_map("settings").with_label(&("app", "frontend"));
        let tagged = tag_managed(&release("web"), &object);
        assert_eq!(tagged.labels().get("app").map(String::as_str), Some("frontend"));
        assert_eq!(tagged.labels().len(), 3);
    }

    #[test]
    fn labels_match_requires_every_key() {
        let selector = Labels::managed_by(&release("web"));
        let tagged = tag_managed(&release("web"), &config_map("a"));
        let other = tag_managed(&release("api"), &config_map("a"));
        assert!(selector.matches(tagged.labels()));
        assert!(!selector.matches(other.labels()), "release label must match");
        assert!(!selector.matches(&BTreeMap::new()));
    }

    #[test]
    fn object_type_display_is_kebab_case() {
        assert_eq!(ObjectType::ReleaseState.to_string(), "release-state");
        assert_eq!(ObjectType::Lock.to_string(), "lock");
    }
}
