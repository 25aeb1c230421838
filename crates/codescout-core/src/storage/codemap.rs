//! Codemap persistence
//!
//! The codemap is the single JSON document `chunk_id -> ChunkRecord` that
//! serves symbol and graph lookups without touching the vector store. The
//! schema is additive: unknown per-chunk fields round-trip verbatim through
//! [`crate::model::ChunkRecord::extra`].

use crate::error::Result;
use crate::model::ChunkRecord;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persisted chunk_id -> metadata map
#[derive(Clone)]
pub struct Codemap {
    path: PathBuf,
    entries: BTreeMap<String, ChunkRecord>,
    dirty: bool,
}

impl Codemap {
    /// Load the codemap from disk, starting empty when absent. A corrupt
    /// document is an error: the codemap is the source of truth and silently
    /// discarding it would orphan the vector store.
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
        })
    }

    /// In-memory codemap with no backing file, for tests
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, chunk_id: &str) -> Option<&ChunkRecord> {
        self.entries.get(chunk_id)
    }

    /// True when an identical `(chunk_id, sha)` pair is already present,
    /// the no-re-embed gate of incremental indexing
    pub fn contains_identical(&self, chunk_id: &str, sha: &str) -> bool {
        self.entries
            .get(chunk_id)
            .map(|record| record.sha == sha)
            .unwrap_or(false)
    }

    pub fn insert(&mut self, record: ChunkRecord) {
        self.entries.insert(record.chunk_id.clone(), record);
        self.dirty = true;
    }

    pub fn remove(&mut self, chunk_id: &str) -> Option<ChunkRecord> {
        let removed = self.entries.remove(chunk_id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// All chunk ids recorded for a file
    pub fn ids_for_file(&self, file_path: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|record| record.file_path == file_path)
            .map(|record| record.chunk_id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChunkRecord)> {
        self.entries.iter()
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut ChunkRecord> {
        self.dirty = true;
        self.entries.values_mut()
    }

    /// Snapshot of all records, for search-time use
    pub fn records(&self) -> impl Iterator<Item = &ChunkRecord> {
        self.entries.values()
    }

    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty || self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        self.dirty = false;
        debug!(entries = self.entries.len(), path = %self.path.display(), "persisted codemap");
        Ok(())
    }
}
