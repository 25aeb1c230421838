//! SQLite persistence: embedding rows plus the telemetry side tables

use crate::error::Result;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

const CREATE_TABLES: &str = r#"
-- Embedding vectors, one row per (chunk, provider, dimensions)
CREATE TABLE IF NOT EXISTS chunk_embeddings (
    chunk_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    sha TEXT NOT NULL,
    file_path TEXT NOT NULL,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (chunk_id, provider, dimensions)
);

CREATE INDEX IF NOT EXISTS idx_embeddings_provider
    ON chunk_embeddings(provider, dimensions);

-- High-confidence query -> chunk associations
CREATE TABLE IF NOT EXISTS intentions (
    query TEXT NOT NULL,
    chunk_id TEXT NOT NULL,
    score REAL NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (query, chunk_id)
);

-- PII-scrubbed query pattern signatures
CREATE TABLE IF NOT EXISTS query_patterns (
    pattern TEXT PRIMARY KEY,
    hits INTEGER NOT NULL DEFAULT 1,
    last_seen TEXT NOT NULL
);
"#;

/// Database handle; the connection is serialized behind a mutex so the
/// handle can be shared between the indexing engine and the search service.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (and initialize) the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, for tests
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace one embedding row
    pub fn upsert_embedding(
        &self,
        chunk_id: &str,
        provider: &str,
        dimensions: usize,
        sha: &str,
        file_path: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO chunk_embeddings
                (chunk_id, provider, dimensions, sha, file_path, embedding, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                chunk_id,
                provider,
                dimensions as i64,
                sha,
                file_path,
                embedding_to_bytes(embedding),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All embeddings for an active (provider, dimensions) pair
    pub fn embeddings_for(&self, provider: &str, dimensions: usize) -> Result<Vec<(String, Vec<f32>)>> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT chunk_id, embedding FROM chunk_embeddings
             WHERE provider = ?1 AND dimensions = ?2",
        )?;
        let rows = stmt
            .query_map(params![provider, dimensions as i64], |row| {
                let chunk_id: String = row.get(0)?;
                let blob: Vec<u8> = row.get(1)?;
                Ok((chunk_id, bytes_to_embedding(&blob)))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete embeddings by chunk id list (all providers)
    pub fn delete_chunks(&self, chunk_ids: &[String]) -> Result<usize> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().expect("db mutex poisoned");
        let mut deleted = 0;
        for chunk_id in chunk_ids {
            deleted += conn.execute(
                "DELETE FROM chunk_embeddings WHERE chunk_id = ?1",
                params![chunk_id],
            )?;
        }
        Ok(deleted)
    }

    pub fn count_embeddings(&self, provider: &str, dimensions: usize) -> Result<usize> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunk_embeddings WHERE provider = ?1 AND dimensions = ?2",
            params![provider, dimensions as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Record a high-confidence query -> chunk association
    pub fn record_intention(&self, query: &str, chunk_id: &str, score: f64) -> Result<()> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO intentions (query, chunk_id, score, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![query, chunk_id, score, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Best recorded chunk for a query, if any
    pub fn lookup_intention(&self, query: &str) -> Result<Option<(String, f64)>> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let result = conn
            .query_row(
                "SELECT chunk_id, score FROM intentions
                 WHERE query = ?1 ORDER BY score DESC LIMIT 1",
                params![query],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(result)
    }

    /// Record (or bump) a scrubbed query-pattern signature
    pub fn record_query_pattern(&self, pattern: &str) -> Result<()> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        conn.execute(
            "INSERT INTO query_patterns (pattern, hits, last_seen) VALUES (?1, 1, ?2)
             ON CONFLICT(pattern) DO UPDATE SET hits = hits + 1, last_seen = ?2",
            params![pattern, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn query_pattern_hits(&self, pattern: &str) -> Result<u64> {
        let conn = self.conn.lock().expect("db mutex poisoned");
        let hits: i64 = conn
            .query_row(
                "SELECT hits FROM query_patterns WHERE pattern = ?1",
                params![pattern],
                |row| row.get(0),
            )
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(0),
                other => Err(other),
            })?;
        Ok(hits as u64)
    }
}

/// Convert f32 embedding to little-endian bytes
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert bytes back to an f32 embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_blob_round_trip() {
        let embedding = vec![0.25f32, -1.5, 3.125];
        let bytes = embedding_to_bytes(&embedding);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_embedding(&bytes), embedding);
    }

    #[test]
    fn test_upsert_and_query_by_provider() {
        let db = Database::in_memory().unwrap();
        db.upsert_embedding("a.rs:f:11111111", "model-a", 3, "sha1", "a.rs", &[1.0, 0.0, 0.0])
            .unwrap();
        db.upsert_embedding("a.rs:g:22222222", "model-a", 3, "sha2", "a.rs", &[0.0, 1.0, 0.0])
            .unwrap();
        db.upsert_embedding("a.rs:f:11111111", "model-b", 2, "sha1", "a.rs", &[1.0, 1.0])
            .unwrap();

        let rows = db.embeddings_for("model-a", 3).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(db.embeddings_for("model-b", 2).unwrap().len(), 1);
        assert!(db.embeddings_for("model-a", 2).unwrap().is_empty());
    }

    #[test]
    fn test_delete_chunks_removes_all_providers() {
        let db = Database::in_memory().unwrap();
        db.upsert_embedding("id1", "m", 2, "s", "a.rs", &[1.0, 0.0]).unwrap();
        db.upsert_embedding("id1", "n", 2, "s", "a.rs", &[1.0, 0.0]).unwrap();
        db.upsert_embedding("id2", "m", 2, "s", "a.rs", &[0.0, 1.0]).unwrap();

        let deleted = db.delete_chunks(&["id1".to_string()]).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(db.count_embeddings("m", 2).unwrap(), 1);
    }

    #[test]
    fn test_intentions_round_trip() {
        let db = Database::in_memory().unwrap();
        assert!(db.lookup_intention("parse config").unwrap().is_none());
        db.record_intention("parse config", "a.rs:parse:12345678", 0.95)
            .unwrap();
        let (chunk_id, score) = db.lookup_intention("parse config").unwrap().unwrap();
        assert_eq!(chunk_id, "a.rs:parse:12345678");
        assert!((score - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_query_pattern_hits_accumulate() {
        let db = Database::in_memory().unwrap();
        db.record_query_pattern("find <service> by <num>").unwrap();
        db.record_query_pattern("find <service> by <num>").unwrap();
        assert_eq!(db.query_pattern_hits("find <service> by <num>").unwrap(), 2);
        assert_eq!(db.query_pattern_hits("unseen").unwrap(), 0);
    }
}
