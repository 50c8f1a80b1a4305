//! Comparing deployed objects against the desired release content.
//!
//! Comparison is a subset check: everything declared in the manifest must
//! be present with the same value, but the cluster may add fields of its
//! own (status, defaults, `managedFields`, ...).

use std::collections::BTreeMap;
use std::fmt;

use kube::ResourceExt;
use serde_json::Value;

use crate::id::{Identifier, ReleaseName};
use crate::objects::Objects;
use crate::tags::tag_managed;

/// The first difference found between a release and the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Discrepancy {
    /// A desired object does not exist.
    MissingObject(Identifier),
    /// A desired label is absent or differs.
    MismatchingLabels {
        identifier: Identifier,
        desired: BTreeMap<String, String>,
        actual: BTreeMap<String, String>,
    },
    /// A desired annotation is absent or differs.
    MismatchingAnnotations {
        identifier: Identifier,
        desired: BTreeMap<String, String>,
        actual: BTreeMap<String, String>,
    },
    /// The object body differs at `path`.
    MismatchingData { identifier: Identifier, path: Vec<String> },
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::MissingObject(id) => write!(f, "{id} is missing"),
            Discrepancy::MismatchingLabels { identifier, .. } => {
                write!(f, "{identifier} has mismatching labels")
            }
            Discrepancy::MismatchingAnnotations { identifier, .. } => {
                write!(f, "{identifier} has mismatching annotations")
            }
            Discrepancy::MismatchingData { identifier, path } => {
                write!(f, "{identifier} differs at /{}", path.join("/"))
            }
        }
    }
}

/// Returns `true` if every entry of `desired` appears in `actual`.
#[must_use]
pub fn check_mapping(
    desired: &BTreeMap<String, String>,
    actual: &BTreeMap<String, String>,
) -> bool {
    desired.iter().all(|(key, value)| actual.get(key) == Some(value))
}

/// Checks that `actual` contains everything in `desired`.
///
/// Objects are compared key by key, ignoring extra keys in `actual`.
/// Arrays must have equal length and matching elements.
///
/// # Errors
/// Returns the JSON path of the first mismatch.
pub fn check_value(desired: &Value, actual: &Value) -> Result<(), Vec<String>> {
    let mut path = Vec::new();
    if check_value_at(desired, actual, &mut path) {
        Ok(())
    } else {
        Err(path)
    }
}

fn check_value_at(desired: &Value, actual: &Value, path: &mut Vec<String>) -> bool {
    match (desired, actual) {
        (Value::Object(desired), Value::Object(actual)) => {
            for (key, desired_value) in desired {
                path.push(key.clone());
                let Some(actual_value) = actual.get(key) else {
                    return false;
                };
                if !check_value_at(desired_value, actual_value, path) {
                    return false;
                }
                path.pop();
            }
            true
        }
        (Value::Array(desired), Value::Array(actual)) if desired.len() == actual.len() => {
            for (index, (d, a)) in desired.iter().zip(actual).enumerate() {
                path.push(index.to_string());
                if !check_value_at(d, a, path) {
                    return false;
                }
                path.pop();
            }
            true
        }
        (Value::Array(_), _) | (Value::Object(_), _) => false,
        (desired, actual) => desired == actual,
    }
}

/// Compares every desired object of `release` against `actual`.
///
/// Desired objects are tagged as managed before comparison, so the
/// release labels are verified too.
///
/// # Errors
/// Returns the first [`Discrepancy`] found, in identifier order.
pub fn verify_objects(
    release: &ReleaseName,
    desired: &Objects,
    actual: &Objects,
) -> Result<(), Discrepancy> {
    for (identifier, object) in desired {
        let desired = tag_managed(release, object);
        let actual = actual
            .get(identifier)
            .ok_or_else(|| Discrepancy::MissingObject(identifier.clone()))?;

        if !check_mapping(desired.labels(), actual.labels()) {
            return Err(Discrepancy::MismatchingLabels {
                identifier: identifier.clone(),
                desired: desired.labels().clone(),
                actual: actual.labels().clone(),
            });
        }

        if !check_mapping(desired.annotations(), actual.annotations()) {
            return Err(Discrepancy::MismatchingAnnotations {
                identifier: identifier.clone(),
                desired: desired.annotations().clone(),
                actual: actual.annotations().clone(),
            });
        }

        check_value(&desired.data, &actual.data).map_err(|path| Discrepancy::MismatchingData {
            identifier: identifier.clone(),
            path,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::objects::insert_unique;
    use crate::tags::WithLabels;

    fn release() -> ReleaseName {
        match ReleaseName::new("web") {
            Ok(n) => n,
            Err(e) => panic!("{e}"),
        }
    }

    fn objects(values: Vec<Value>) -> Objects {
        let mut objects = Objects::new();
        for value in values {
            let object = match serde_json::from_value(value) {
                Ok(o) => o,
                Err(e) => panic!("bad object: {e}"),
            };
            if let Err(e) = insert_unique(&mut objects, object) {
                panic!("{e}");
            }
        }
        objects
    }

    fn settings(mode: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "settings"},
            "data": {"mode": mode},
        })
    }

    fn deployed(objects: &Objects) -> Objects {
        objects
            .iter()
            .map(|(id, o)| (id.clone(), tag_managed(&release(), o)))
            .collect()
    }

    #[test]
    fn check_value_allows_extra_fields() {
        let desired = json!({"spec": {"replicas": 2}});
        let actual = json!({"spec": {"replicas": 2, "paused": false}, "status": {}});
        assert!(check_value(&desired, &actual).is_ok());
    }

    #[test]
    fn check_value_reports_path_of_mismatch() {
        let desired = json!({"spec": {"ports": [{"port": 80}, {"port": 443}]}});
        let actual = json!({"spec": {"ports": [{"port": 80}, {"port": 8443}]}});
        assert_eq!(
            check_value(&desired, &actual),
            Err(vec!["spec".to_owned(), "ports".to_owned(), "1".to_owned(), "port".to_owned()])
        );
    }

    #[test]
    fn check_value_reports_missing_key() {
        let desired = json!({"data": {"mode": "fast"}});
        let actual = json!({"data": {}});
        assert_eq!(
            check_value(&desired, &actual),
            Err(vec!["data".to_owned(), "mode".to_owned()])
        );
    }

    #[test]
    fn check_value_rejects_arrays_of_different_length() {
        let desired = json!({"args": ["a"]});
        let actual = json!({"args": ["a", "b"]});
        assert_eq!(check_value(&desired, &actual), Err(vec!["args".to_owned()]));
    }

    #[test]
    fn check_value_rejects_type_changes() {
        assert!(check_value(&json!({"n": 1}), &json!({"n": "1"})).is_err());
        assert!(check_value(&json!({"n": {}}), &json!({"n": null})).is_err());
    }

    #[test]
    fn check_mapping_is_subset() {
        let desired = BTreeMap::from([("a".to_owned(), "1".to_owned())]);
        let actual =
            BTreeMap::from([("a".to_owned(), "1".to_owned()), ("b".to_owned(), "2".to_owned())]);
        assert!(check_mapping(&desired, &actual));
        assert!(!check_mapping(&actual, &desired));
    }

    #[test]
    fn verify_accepts_deployed_objects() {
        let desired = objects(vec![settings("fast")]);
        assert_eq!(verify_objects(&release(), &desired, &deployed(&desired)), Ok(()));
    }

    #[test]
    fn verify_reports_missing_object() {
        let desired = objects(vec![settings("fast")]);
        let result = verify_objects(&release(), &desired, &Objects::new());
        assert!(matches!(result, Err(Discrepancy::MissingObject(_))));
    }

    #[test]
    fn verify_reports_untagged_object_as_label_mismatch() {
        let desired = objects(vec![settings("fast")]);
        let result = verify_objects(&release(), &desired, &desired);
        assert!(matches!(result, Err(Discrepancy::MismatchingLabels { .. })), "got {result:?}");
    }

    #[test]
    fn verify_reports_data_drift() {
        let desired = objects(vec![settings("fast")]);
        let actual = deployed(&objects(vec![settings("slow")]));
        let result = verify_objects(&release(), &desired, &actual);
        match result {
            Err(Discrepancy::MismatchingData { path, .. }) => {
                assert_eq!(path, vec!["data".to_owned(), "mode".to_owned()]);
            }
            other => panic!("expected MismatchingData, got {other:?}"),
        }
    }

    #[test]
    fn verify_ignores_extra_cluster_labels() {
        let desired = objects(vec![settings("fast")]);
        let actual: Objects = deployed(&desired)
            .into_iter()
            .map(|(id, o)| (id, o.with_label(&("pod-template-hash", "abc"))))
            .collect();
        assert_eq!(verify_objects(&release(), &desired, &actual), Ok(()));
    }

    proptest::proptest! {
        #[test]
        fn proptest_value_always_contains_itself(
            keys in proptest::collection::btree_map(
                "[a-z]{1,6}",
                proptest::prelude::any::<i64>(),
                0..8usize,
            ),
        ) {
            let value = json!({"spec": keys});
            proptest::prop_assert!(check_value(&value, &value).is_ok());
        }
    }
}
