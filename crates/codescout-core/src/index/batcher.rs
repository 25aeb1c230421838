//! Embedding batch accumulator
//!
//! Collects chunk/embed-text pairs and hands them out in fixed-size batches
//! to cut provider round-trips and bound queue depth. The indexing engine
//! drains the remainder explicitly at finalization.

use crate::model::ChunkRecord;

/// Default embedding batch size
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A chunk queued for embedding
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub record: ChunkRecord,
    /// The chunk source text, persisted to the chunk store on flush
    pub text: String,
    /// The formatted text actually sent to the embedder
    pub embed_text: String,
}

/// Fixed-size batch accumulator
pub struct EmbeddingBatcher {
    pending: Vec<PendingChunk>,
    batch_size: usize,
}

impl EmbeddingBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            pending: Vec::new(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn push(&mut self, chunk: PendingChunk) {
        self.pending.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// A full batch is ready
    pub fn ready(&self) -> bool {
        self.pending.len() >= self.batch_size
    }

    /// Take one full batch off the front; `None` until a full batch exists
    pub fn take_batch(&mut self) -> Option<Vec<PendingChunk>> {
        if !self.ready() {
            return None;
        }
        Some(self.pending.drain(..self.batch_size).collect())
    }

    /// Drain everything that is left, regardless of batch size
    pub fn drain(&mut self) -> Vec<PendingChunk> {
        std::mem::take(&mut self.pending)
    }
}
