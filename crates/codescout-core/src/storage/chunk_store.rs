//! Content-addressed chunk text storage
//!
//! The core treats chunk text as opaque content-addressed blobs keyed by the
//! chunk sha and never assumes plaintext on disk; an encrypting store
//! surfaces the key/auth/format taxonomy in [`crate::error::CodeScoutError`].

use crate::error::Result;
use std::path::PathBuf;

/// Outcome of a store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub encrypted: bool,
}

/// Opaque content-addressed blob operations
pub trait ChunkStore: Send + Sync {
    fn write(&self, sha: &str, text: &str) -> Result<WriteOutcome>;
    fn read(&self, sha: &str) -> Result<Option<String>>;
    fn remove(&self, sha: &str) -> Result<()>;
}

/// Plaintext filesystem store with two-char fan-out directories
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn blob_path(&self, sha: &str) -> PathBuf {
        let prefix = if sha.len() >= 2 { &sha[..2] } else { "00" };
        self.root.join(prefix).join(sha)
    }
}

impl ChunkStore for FsChunkStore {
    fn write(&self, sha: &str, text: &str) -> Result<WriteOutcome> {
        let path = self.blob_path(sha);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // identical sha means identical content; skip the rewrite
        if !path.exists() {
            std::fs::write(&path, text)?;
        }
        Ok(WriteOutcome { encrypted: false })
    }

    fn read(&self, sha: &str) -> Result<Option<String>> {
        let path = self.blob_path(sha);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, sha: &str) -> Result<()> {
        let path = self.blob_path(sha);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::chunk_sha;
    use tempfile::TempDir;

    #[test]
    fn test_write_read_remove() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path().to_path_buf());
        let sha = chunk_sha("fn a() {}");

        let outcome = store.write(&sha, "fn a() {}").unwrap();
        assert!(!outcome.encrypted);
        assert_eq!(store.read(&sha).unwrap().as_deref(), Some("fn a() {}"));

        store.remove(&sha).unwrap();
        assert!(store.read(&sha).unwrap().is_none());
        // removing twice is fine
        store.remove(&sha).unwrap();
    }

    #[test]
    fn test_fan_out_layout() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path().to_path_buf());
        let sha = chunk_sha("content");
        store.write(&sha, "content").unwrap();
        assert!(dir.path().join(&sha[..2]).join(&sha).exists());
    }

    #[test]
    fn test_missing_read_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsChunkStore::new(dir.path().to_path_buf());
        assert!(store.read("deadbeef").unwrap().is_none());
    }
}
