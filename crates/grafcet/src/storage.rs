//! Persistence boundary for diagram documents.
//!
//! Documents are JSON values addressed by project-relative paths. Two
//! backends are provided: [`FsStore`] below a root directory and
//! [`MemoryStore`] for tests and embedding.
//!
//! Older tools stored charts as `{ "steps": [...], "transitions": [...] }`
//! instead of a single tagged `elements` list. [`load_diagram`] converts such
//! documents once, on the way in; nothing past this module sees the old
//! shape.

use std::{
    collections::HashMap,
    fs, io,
    path::{Component, Path, PathBuf},
    sync::RwLock,
};

use log::{debug, info};
use serde_json::{Map, Value};
use thiserror::Error;

use grafcet_core::diagram::GrafcetDiagram;

/// Errors of a [`DiagramStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in `{path}`: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document `{0}` does not exist")]
    NotFound(PathBuf),

    #[error("path `{0}` must be relative and stay inside the project")]
    InvalidPath(PathBuf),

    #[error("`{path}` is not a diagram document: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },
}

/// Read and write JSON documents by project-relative path.
pub trait DiagramStore: Send + Sync {
    fn read_json(&self, path: &Path) -> Result<Value, StorageError>;

    fn write_json(&self, path: &Path, value: &Value) -> Result<(), StorageError>;

    fn exists(&self, path: &Path) -> Result<bool, StorageError>;
}

/// Reject absolute paths and paths leaving the project.
fn check_relative(path: &Path) -> Result<(), StorageError> {
    let escapes = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes || path.as_os_str().is_empty() {
        return Err(StorageError::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// Documents stored as files below a root directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError> {
        check_relative(path)?;
        Ok(self.root.join(path))
    }
}

impl DiagramStore for FsStore {
    fn read_json(&self, path: &Path) -> Result<Value, StorageError> {
        let full = self.resolve(path)?;
        let text = fs::read_to_string(&full).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound(path.to_path_buf())
            } else {
                StorageError::Io {
                    path: full.clone(),
                    source,
                }
            }
        })?;
        debug!(path = full.display().to_string(), bytes = text.len(); "Document read");
        serde_json::from_str(&text).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_json(&self, path: &Path, value: &Value) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let io_error = |source| StorageError::Io {
            path: full.clone(),
            source,
        };
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let text = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(&full, text).map_err(io_error)?;
        debug!(path = full.display().to_string(); "Document written");
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(self.resolve(path)?.is_file())
    }
}

/// Documents kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<PathBuf, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagramStore for MemoryStore {
    fn read_json(&self, path: &Path) -> Result<Value, StorageError> {
        check_relative(path)?;
        let documents = self.documents.read().map_err(|_| poisoned(path))?;
        documents
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))
    }

    fn write_json(&self, path: &Path, value: &Value) -> Result<(), StorageError> {
        check_relative(path)?;
        let mut documents = self.documents.write().map_err(|_| poisoned(path))?;
        documents.insert(path.to_path_buf(), value.clone());
        Ok(())
    }

    fn exists(&self, path: &Path) -> Result<bool, StorageError> {
        check_relative(path)?;
        let documents = self.documents.read().map_err(|_| poisoned(path))?;
        Ok(documents.contains_key(path))
    }
}

fn poisoned(path: &Path) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source: io::Error::other("store lock poisoned"),
    }
}

/// Legacy collections and the element type each holds.
const LEGACY_COLLECTIONS: [(&str, &str); 5] = [
    ("steps", "step"),
    ("actions", "action-block"),
    ("transitions", "transition"),
    ("gates", "gate"),
    ("connections", "connection"),
];

/// Bring a stored document into the `elements` shape.
///
/// Documents that already have an `elements` list are returned unchanged.
/// Legacy documents get their collections concatenated in the order steps,
/// actions, transitions, gates, connections, each item tagged with its
/// element type. Legacy field names are mapped on the way: `isInitial` to
/// `stepType`, a transition `label` to `name`, a document `name` to `title`.
pub fn normalize_document(document: Value) -> Result<Value, String> {
    let Value::Object(mut object) = document else {
        return Err("expected a JSON object".to_string());
    };
    if object.contains_key("elements") {
        return Ok(Value::Object(object));
    }
    if !LEGACY_COLLECTIONS
        .iter()
        .any(|(key, _)| object.contains_key(*key))
    {
        return Err("no `elements`, `steps` or `transitions` list".to_string());
    }

    let mut elements = Vec::new();
    for (key, tag) in LEGACY_COLLECTIONS {
        let items = match object.remove(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(items)) => items,
            Some(_) => return Err(format!("`{key}` must be a list")),
        };
        for item in items {
            let Value::Object(mut item) = item else {
                return Err(format!("`{key}` entries must be objects"));
            };
            item.entry("type").or_insert_with(|| Value::from(tag));
            match tag {
                "step" => migrate_step(&mut item),
                "transition" => rename_field(&mut item, "label", "name"),
                _ => {}
            }
            elements.push(Value::Object(item));
        }
    }

    if !object.contains_key("title") {
        if let Some(name) = object.remove("name") {
            object.insert("title".to_string(), name);
        }
    }
    object.insert("elements".to_string(), Value::Array(elements));
    Ok(Value::Object(object))
}

fn migrate_step(step: &mut Map<String, Value>) {
    if let Some(initial) = step.remove("isInitial") {
        if initial.as_bool() == Some(true) {
            step.entry("stepType")
                .or_insert_with(|| Value::from("initial"));
        }
    }
}

fn rename_field(item: &mut Map<String, Value>, from: &str, to: &str) {
    if item.contains_key(to) {
        return;
    }
    if let Some(value) = item.remove(from) {
        item.insert(to.to_string(), value);
    }
}

/// Load a diagram, converting the legacy shape if needed.
pub fn load_diagram(
    store: &dyn DiagramStore,
    path: &Path,
) -> Result<GrafcetDiagram, StorageError> {
    let document = store.read_json(path)?;
    let document = normalize_document(document).map_err(|reason| StorageError::InvalidDocument {
        path: path.to_path_buf(),
        reason,
    })?;
    let diagram: GrafcetDiagram =
        serde_json::from_value(document).map_err(|source| StorageError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    info!(
        path = path.display().to_string(),
        elements = diagram.elements().len();
        "Diagram loaded"
    );
    Ok(diagram)
}

/// Store a diagram in the `elements` shape.
pub fn save_diagram(
    store: &dyn DiagramStore,
    path: &Path,
    diagram: &GrafcetDiagram,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(diagram).map_err(|source| StorageError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    store.write_json(path, &value)?;
    info!(path = path.display().to_string(); "Diagram saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use grafcet_core::element::StepType;

    use super::*;

    fn legacy_document() -> Value {
        json!({
            "name": "Conveyor",
            "steps": [
                { "id": "step-0", "number": 0, "isInitial": true },
                { "id": "step-1", "number": 1 }
            ],
            "transitions": [
                { "id": "transition-0", "label": "T0", "condition": "Start" }
            ],
            "connections": [
                { "id": "connection-0", "sourceId": "step-0", "targetId": "transition-0" },
                { "id": "connection-1", "sourceId": "transition-0", "targetId": "step-1" }
            ]
        })
    }

    #[test]
    fn test_normalize_legacy_document() {
        let normalized = normalize_document(legacy_document()).unwrap();
        let elements = normalized["elements"].as_array().unwrap();
        let types: Vec<&str> = elements.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(types, ["step", "step", "transition", "connection", "connection"]);
        assert_eq!(elements[0]["stepType"], "initial");
        assert_eq!(elements[2]["name"], "T0");
        assert_eq!(normalized["title"], "Conveyor");
        assert!(normalized.get("steps").is_none());
    }

    #[test]
    fn test_normalize_keeps_current_documents() {
        let current = json!({ "title": "Mixer", "version": "1.0", "elements": [] });
        assert_eq!(normalize_document(current.clone()).unwrap(), current);
    }

    #[test]
    fn test_normalize_rejects_unknown_shapes() {
        assert!(normalize_document(json!([1, 2])).is_err());
        assert!(normalize_document(json!({ "title": "x" })).is_err());
        assert!(normalize_document(json!({ "steps": 3 })).is_err());
    }

    #[test]
    fn test_load_legacy_diagram() {
        let store = MemoryStore::new();
        let path = Path::new("modes/auto.json");
        store.write_json(path, &legacy_document()).unwrap();

        let diagram = load_diagram(&store, path).unwrap();
        assert_eq!(diagram.title(), "Conveyor");
        assert_eq!(diagram.steps().count(), 2);
        assert_eq!(diagram.initial_steps().next().unwrap().step_type(), StepType::Initial);
        assert!(diagram.dangling_connections().is_empty());
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let path = Path::new("project/main.json");

        assert!(!store.exists(path).unwrap());
        let diagram = GrafcetDiagram::new("Press");
        save_diagram(&store, path, &diagram).unwrap();
        assert!(store.exists(path).unwrap());
        assert!(dir.path().join("project/main.json").is_file());
        assert_eq!(load_diagram(&store, path).unwrap(), diagram);
    }

    #[test]
    fn test_fs_store_errors() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());

        assert!(matches!(
            store.read_json(Path::new("missing.json")),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.read_json(Path::new("../outside.json")),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.exists(Path::new("/etc/passwd")),
            Err(StorageError::InvalidPath(_))
        ));

        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(matches!(
            store.read_json(Path::new("broken.json")),
            Err(StorageError::Json { .. })
        ));
    }
}
