//! Manifest ingestion and the keyed object collection.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use kube::core::DynamicObject;
use serde::Deserialize;

use crate::error::CoreError;
use crate::id::Identifier;

/// The objects of a release, keyed by identifier.
pub type Objects = BTreeMap<Identifier, DynamicObject>;

/// Inserts `object` under its identifier, rejecting duplicates.
///
/// # Errors
/// Returns [`CoreError::DuplicateObject`] if the identifier is already taken,
/// or the errors of [`Identifier::from_object`].
pub fn insert_unique(objects: &mut Objects, object: DynamicObject) -> Result<(), CoreError> {
    let identifier = Identifier::from_object(&object)?;
    if objects.contains_key(&identifier) {
        return Err(CoreError::DuplicateObject(identifier));
    }
    objects.insert(identifier, object);
    Ok(())
}

/// Parses a multi-document YAML stream into `objects`.
///
/// Empty documents (a bare `---` or comments only) are skipped.
///
/// # Errors
/// Returns [`CoreError::Yaml`] on malformed input and the errors of
/// [`insert_unique`] for documents that cannot be keyed.
pub fn ingest<R: Read>(objects: &mut Objects, input: R) -> Result<(), CoreError> {
    for document in serde_yaml::Deserializer::from_reader(input) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let object: DynamicObject = serde_yaml::from_value(value)?;
        insert_unique(objects, object)?;
    }
    Ok(())
}

/// Ingests a manifest file, or every file below a directory.
///
/// Directory entries are visited in sorted order.
///
/// # Errors
/// Returns [`CoreError::FileNotFound`] if `path` does not exist, plus any
/// I/O or parse error from [`ingest`].
pub fn ingest_path(objects: &mut Objects, path: &Path) -> Result<(), CoreError> {
    for file in list_files(path)? {
        ingest(objects, File::open(&file)?)?;
    }
    Ok(())
}

/// Lists every file at or below `path`, sorted.
///
/// # Errors
/// Returns [`CoreError::FileNotFound`] if `path` does not exist.
pub fn list_files(path: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut files = Vec::new();
    collect_files(&mut files, path)?;
    Ok(files)
}

fn collect_files(files: &mut Vec<PathBuf>, path: &Path) -> Result<(), CoreError> {
    if path.is_dir() {
        let mut entries = path
            .read_dir()?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        entries.sort();
        for entry in entries {
            collect_files(files, &entry)?;
        }
    } else if path.exists() {
        files.push(path.to_path_buf());
    } else {
        return Err(CoreError::FileNotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Serde adapter storing [`Objects`] as a plain list of objects.
///
/// Identifiers are not valid JSON map keys, so collections are written as
/// arrays and re-keyed when read back.
pub mod as_list {
    use kube::core::DynamicObject;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{insert_unique, Objects};

    /// Serializes the objects in identifier order.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(objects: &Objects, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(objects.values())
    }

    /// Deserializes a list of objects and keys them by identifier.
    ///
    /// # Errors
    /// Fails on duplicate or unidentifiable objects.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Objects, D::Error> {
        let list = Vec::<DynamicObject>::deserialize(deserializer)?;
        let mut objects = Objects::new();
        for object in list {
            insert_unique(&mut objects, object).map_err(D::Error::custom)?;
        }
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const TWO_DOCS: &str = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: fast
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
";

    #[test]
    fn ingest_keys_documents_by_identifier() {
        let mut objects = Objects::new();
        assert!(ingest(&mut objects, TWO_DOCS.as_bytes()).is_ok());
        assert_eq!(objects.len(), 2);
        assert!(objects.contains_key(&Identifier::new("", "v1", "ConfigMap", "settings")));
        assert!(objects.contains_key(&Identifier::new("apps", "v1", "Deployment", "web")));
    }

    #[test]
    fn ingest_skips_empty_documents() {
        let input = format!("---\n# just a comment\n---\n{TWO_DOCS}---\n");
        let mut objects = Objects::new();
        assert!(ingest(&mut objects, input.as_bytes()).is_ok());
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn ingest_rejects_duplicates() {
        let input = format!("{TWO_DOCS}---\n{TWO_DOCS}");
        let mut objects = Objects::new();
        let result = ingest(&mut objects, input.as_bytes());
        assert!(
            matches!(result, Err(CoreError::DuplicateObject(_))),
            "duplicate identifiers must be rejected, got {result:?}"
        );
    }

    #[test]
    fn same_name_different_kind_is_not_a_duplicate() {
        let input = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: web
---
apiVersion: v1
kind: Service
metadata:
  name: web
";
        let mut objects = Objects::new();
        assert!(ingest(&mut objects, input.as_bytes()).is_ok());
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn ingest_rejects_unnamed_objects() {
        let input = "apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n";
        let mut objects = Objects::new();
        let result = ingest(&mut objects, input.as_bytes());
        assert!(matches!(result, Err(CoreError::ObjectWithoutName { .. })));
    }

    #[test]
    fn ingest_rejects_objects_without_kind() {
        let input = "metadata:\n  name: orphan\n";
        let mut objects = Objects::new();
        let result = ingest(&mut objects, input.as_bytes());
        assert!(matches!(result, Err(CoreError::MissingTypeMeta { .. })), "got {result:?}");
    }

    #[test]
    fn ingest_path_walks_directories() {
        let dir = match tempfile::tempdir() {
            Ok(d) => d,
            Err(e) => panic!("tempdir: {e}"),
        };
        let nested = dir.path().join("nested");
        assert!(fs::create_dir(&nested).is_ok());
        assert!(fs::write(dir.path().join("a.yaml"), TWO_DOCS).is_ok());
        assert!(fs::write(
            nested.join("b.yaml"),
            "apiVersion: v1\nkind: Secret\nmetadata:\n  name: token\n"
        )
        .is_ok());

        let mut objects = Objects::new();
        assert!(ingest_path(&mut objects, dir.path()).is_ok());
        assert_eq!(objects.len(), 3);

        let files = match list_files(dir.path()) {
            Ok(f) => f,
            Err(e) => panic!("list_files: {e}"),
        };
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.yaml"), "files must be sorted: {files:?}");
    }

    #[test]
    fn ingest_path_missing_returns_file_not_found() {
        let mut objects = Objects::new();
        let result = ingest_path(&mut objects, Path::new("/definitely/not/here.yaml"));
        assert!(matches!(result, Err(CoreError::FileNotFound(_))));
    }
}
