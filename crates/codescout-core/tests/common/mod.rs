//! Shared fixtures for integration tests

use async_trait::async_trait;
use codescout_core::chunking::{SemanticChunker, SizeEstimator};
use codescout_core::config::ChunkLimits;
use codescout_core::error::Result;
use codescout_core::index::{ChangeTracker, IndexEngine};
use codescout_core::llm::Embedder;
use codescout_core::storage::{Codemap, Database, FsChunkStore};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DIMS: usize = 16;

/// Deterministic bag-of-words embedder: similar texts produce similar
/// vectors, and every call is counted so tests can assert on re-embedding.
pub struct MockEmbedder {
    pub embed_calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            embed_calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    fn vectorize(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.len() >= 2)
        {
            let mut h: u64 = 1469598103934665603;
            for b in token.bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(1099511628211);
            }
            v[(h % DIMS as u64) as usize] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn model_name(&self) -> &str {
        "mock-embedder"
    }
}

pub struct Fixture {
    pub embedder: Arc<MockEmbedder>,
    pub db: Arc<Database>,
    pub store: Arc<FsChunkStore>,
    pub engine: IndexEngine,
}

/// Engine over `root` with fresh in-memory db and store/state under `state`
pub fn engine_for(root: &Path, state: &Path) -> Fixture {
    let embedder = Arc::new(MockEmbedder::new());
    let db = Arc::new(Database::in_memory().unwrap());
    let store = Arc::new(FsChunkStore::new(state.join("chunks")));

    let limits = ChunkLimits::default();
    let estimator = Arc::new(SizeEstimator::new(limits, None));
    let chunker = SemanticChunker::new(estimator);

    let tracker = ChangeTracker::load(&state.join("tracker.json"));
    let codemap = Codemap::load(&state.join("codemap.json")).unwrap();

    let engine = IndexEngine::new(
        root.to_path_buf(),
        chunker,
        embedder.clone(),
        db.clone(),
        store.clone(),
        tracker,
        codemap,
    );
    Fixture {
        embedder,
        db,
        store,
        engine,
    }
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
