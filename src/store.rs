//! Durable key/value storage for sessions, analyses, and risk caches.
//!
//! The [`Store`] trait is the narrow contract the core depends on:
//! `get` / `put` / `append`, strongly consistent for a single key
//! (read-after-write by the immediate next call). Backends are pluggable;
//! this module ships an in-memory implementation for tests and a
//! file-backed implementation that keeps one JSON document per key under
//! a storage directory.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Abstract storage backend.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the value for `key`, if present.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write (or overwrite) the value for `key`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Append one line to the value for `key`, creating it if absent.
    async fn append(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn append(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
        let entry = entries.entry(key.to_string()).or_default();
        entry.push_str(value);
        entry.push('\n');
        Ok(())
    }
}

/// File-backed store: one file per key under `root`.
///
/// Keys may contain `/` separators, which become subdirectories
/// (`sessions/abc` → `<root>/sessions/abc.json`). Key segments are
/// sanitized so a hostile contract id cannot escape the root.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        let segments: Vec<&str> = key.split('/').collect();
        let last_index = segments.len() - 1;
        for (i, segment) in segments.into_iter().enumerate() {
            let clean: String = segment
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            // "." and ".." would escape the root.
            let clean = if clean.chars().all(|c| c == '.') {
                "_".to_string()
            } else {
                clean
            };
            // The extension is appended, not set: a dot inside a key
            // segment is data, and must not be collapsed away.
            if i == last_index {
                path.push(format!("{clean}.json"));
            } else {
                path.push(clean);
            }
        }
        path
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, value)
            .map_err(|e| Error::Storage(format!("failed to write {}: {e}", path.display())))
    }

    async fn append(&self, key: &str, value: &str) -> Result<()> {
        use std::io::Write;

        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Storage(format!("failed to open {}: {e}", path.display())))?;
        writeln!(file, "{value}")
            .map_err(|e| Error::Storage(format!("failed to append {}: {e}", path.display())))
    }
}
