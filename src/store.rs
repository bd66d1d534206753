//! Whole-collection persistence.
//!
//! The manager never caches: every operation loads the full collection and
//! every mutation saves it back in one piece.

use crate::config::atomic_write;
use crate::error::{Result, TodoError};
use crate::lock::FileLock;
use crate::todo::{RawTodo, Todo};
use serde_json::Value;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub trait Storage {
    /// Raw records in storage order. Implementations decide what an
    /// unreadable source means; the manager treats `Err` as empty.
    fn load(&self) -> Result<Vec<RawTodo>>;

    fn save(&self, todos: &[Todo]) -> Result<()>;

    /// Guard held across one read-modify-write cycle.
    fn lock(&self) -> Result<Option<FileLock>> {
        Ok(None)
    }
}

/// Pretty-printed JSON array on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Create the file holding an empty collection if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        atomic_write(&self.path, b"[]\n")
    }
}

impl Storage for JsonFileStorage {
    fn load(&self) -> Result<Vec<RawTodo>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_document(&content)
    }

    fn save(&self, todos: &[Todo]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let mut content =
            serde_json::to_string_pretty(todos).map_err(|e| TodoError::Storage(e.to_string()))?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes())?;
        tracing::debug!(path = %self.path.display(), count = todos.len(), "saved collection");
        Ok(())
    }

    fn lock(&self) -> Result<Option<FileLock>> {
        FileLock::acquire(&self.lock_path()).map(Some)
    }
}

/// Parse a JSON array of records. Entries that are not readable as a record
/// are skipped.
pub fn parse_document(content: &str) -> Result<Vec<RawTodo>> {
    let values: Vec<Value> =
        serde_json::from_str(content).map_err(|e| TodoError::Storage(e.to_string()))?;

    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawTodo>(value) {
            Ok(raw) => records.push(raw),
            Err(e) => tracing::warn!(index, error = %e, "skipping unreadable record"),
        }
    }
    Ok(records)
}

/// Keeps the collection as a JSON string, so loads go through the same
/// decoding path as the file store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    document: RefCell<String>,
    fail_saves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: RefCell::new(document.into()),
            fail_saves: false,
        }
    }

    /// Every save returns an error; used to check that write failures surface.
    pub fn failing() -> Self {
        Self {
            document: RefCell::default(),
            fail_saves: true,
        }
    }

    pub fn document(&self) -> String {
        self.document.borrow().clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Vec<RawTodo>> {
        let document = self.document.borrow();
        if document.trim().is_empty() {
            return Ok(Vec::new());
        }
        parse_document(&document)
    }

    fn save(&self, todos: &[Todo]) -> Result<()> {
        if self.fail_saves {
            return Err(TodoError::Storage("save rejected".to_string()));
        }
        let content =
            serde_json::to_string(todos).map_err(|e| TodoError::Storage(e.to_string()))?;
        *self.document.borrow_mut() = content;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("todos.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("todos.json");
        std::fs::write(&path, "{ not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load(), Err(TodoError::Storage(_))));
    }

    #[test]
    fn test_ensure_exists_writes_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sub").join("todos.json");
        let storage = JsonFileStorage::new(&path);
        storage.ensure_exists().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "[]");
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("todos.json"));
        let raw: RawTodo =
            serde_json::from_str(r#"{"id": 5, "text": "Water plants", "tags": ["home"]}"#).unwrap();
        let todo = raw.migrate(0, Utc::now());
        storage.save(&[todo.clone()]).unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].clone().migrate(0, Utc::now()), todo);
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let records = parse_document(r#"[{"id": 1, "text": "ok"}, 17, "nope"]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), Some(1));
    }

    #[test]
    fn test_lock_path_sits_next_to_file() {
        let storage = JsonFileStorage::new("/data/todos.json");
        assert_eq!(storage.lock_path(), PathBuf::from("/data/todos.json.lock"));
    }

    #[test]
    fn test_held_lock_excludes_other_handles() {
        use fs2::FileExt;

        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("todos.json"));
        let held = storage.lock().unwrap();
        assert!(held.is_some());

        let other = std::fs::OpenOptions::new()
            .write(true)
            .open(storage.lock_path())
            .unwrap();
        assert!(other.try_lock_exclusive().is_err());

        drop(held);
        assert!(other.try_lock_exclusive().is_ok());
    }

    #[test]
    fn test_memory_storage_failing_save() {
        let storage = MemoryStorage::failing();
        assert!(storage.save(&[]).is_err());
    }
}
