//! Two-level content-hash tree for incremental indexing
//!
//! Maps relative file path to a whole-file fast hash plus the ordered chunk
//! fast hashes of the last successful pass. If the file hash is unchanged the
//! file is skipped without parsing. These hashes are blake3 (cheap on large
//! inputs) and deliberately distinct from the SHA-256 chunk identity hash.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fast content hash, blake3 truncated to 16 hex chars
pub fn fast_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex()[..16].to_string()
}

/// Per-file tree entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub file_hash: String,
    #[serde(default)]
    pub chunk_hashes: Vec<String>,
}

/// Persisted change-tracker tree, one JSON document keyed by relative path
pub struct ChangeTracker {
    path: PathBuf,
    files: BTreeMap<String, FileEntry>,
    dirty: bool,
}

impl ChangeTracker {
    /// Load the tree from disk, starting empty when the file is absent or
    /// unreadable (recovery is a full re-scan)
    pub fn load(path: &Path) -> Self {
        let files = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            files,
            dirty: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// True when the stored file hash matches; no chunk inside can have
    /// changed in that case
    pub fn is_unchanged(&self, relative_path: &str, file_hash: &str) -> bool {
        self.files
            .get(relative_path)
            .map(|entry| entry.file_hash == file_hash)
            .unwrap_or(false)
    }

    pub fn entry(&self, relative_path: &str) -> Option<&FileEntry> {
        self.files.get(relative_path)
    }

    /// Record the outcome of (re)indexing a file
    pub fn update_file(&mut self, relative_path: &str, file_hash: String, chunk_hashes: Vec<String>) {
        self.files.insert(
            relative_path.to_string(),
            FileEntry {
                file_hash,
                chunk_hashes,
            },
        );
        self.dirty = true;
    }

    pub fn remove_file(&mut self, relative_path: &str) -> bool {
        let removed = self.files.remove(relative_path).is_some();
        if removed {
            self.dirty = true;
        }
        removed
    }

    /// All tracked relative paths
    pub fn tracked_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    /// Persist when mutated since load; no-op otherwise
    pub fn persist_if_dirty(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.files)?;
        std::fs::write(&self.path, json)?;
        self.dirty = false;
        debug!(files = self.files.len(), path = %self.path.display(), "persisted change-tracker tree");
        Ok(())
    }
}
