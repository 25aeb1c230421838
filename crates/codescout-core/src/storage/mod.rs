//! Storage layer
//!
//! - SQLite embedding rows queryable by (provider, dimensions)
//! - content-addressed chunk text blobs
//! - the persisted codemap JSON document

mod chunk_store;
mod codemap;
mod db;

pub use chunk_store::{ChunkStore, FsChunkStore, WriteOutcome};
pub use codemap::Codemap;
pub use db::{bytes_to_embedding, embedding_to_bytes, Database};
