//! codescout-core: local semantic code search
//!
//! Indexes a source tree into size-bounded semantic chunks (tree-sitter
//! AST walking with subdivision and merging), embeds them through an
//! OpenAI-compatible provider, and answers queries with hybrid ranking:
//! cosine similarity fused with lexical BM25, call-graph symbol boosts
//! and an optional cross-encoder reranker.
//!
//! Indexing is incremental: a two-level content-hash tree skips unchanged
//! files entirely and re-embeds only chunks whose text actually changed.

pub mod chunking;
pub mod config;
pub mod error;
pub mod graph;
pub mod index;
pub mod llm;
pub mod model;
pub mod search;
pub mod storage;

pub use chunking::{SemanticChunker, SizeClass, SizeEstimator};
pub use config::Config;
pub use error::{CodeScoutError, Result};
pub use index::{IndexEngine, IndexOptions, IndexSummary};
pub use model::{chunk_id, chunk_sha, ChunkKind, ChunkRecord};
pub use search::{SearchCandidate, SearchOptions, SearchService};
pub use storage::{ChunkStore, Codemap, Database, FsChunkStore};

/// Directory name under the platform cache dir holding all persisted state
pub const DATA_DIR_NAME: &str = "codescout";
