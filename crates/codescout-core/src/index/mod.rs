//! Incremental indexing engine
//!
//! Drives a full pass over a source tree: enumerate files, skip unchanged
//! ones via the change tracker, chunk the rest, embed new chunks in
//! batches, reconcile stale chunks, and finalize in a fixed order (flush,
//! persist tracker, rebuild the symbol graph, persist the codemap).
//!
//! Per-file failures are recorded in the summary and never abort the run;
//! only storage-level failures during finalization are fatal.

pub mod batcher;
pub mod metadata;
pub mod scanner;
pub mod tracker;

pub use batcher::{EmbeddingBatcher, PendingChunk, DEFAULT_BATCH_SIZE};
pub use scanner::{scan_files, ScanOptions, ScanResult};
pub use tracker::{fast_hash, ChangeTracker, FileEntry};

use crate::chunking::{ChunkPiece, PieceOrigin, SemanticChunker};
use crate::error::Result;
use crate::graph;
use crate::llm::Embedder;
use crate::model::{chunk_id, chunk_sha, ChunkKind, ChunkRecord};
use crate::storage::{ChunkStore, Codemap, Database};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options for one indexing run
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Full run: also reconcile files that vanished since last run
    pub full: bool,
    pub batch_size: usize,
    pub scan: ScanOptions,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            full: false,
            batch_size: DEFAULT_BATCH_SIZE,
            scan: ScanOptions::default(),
        }
    }
}

/// Aggregate statistics for one indexing run
#[derive(Debug, Clone, Default)]
pub struct IndexSummary {
    /// False when any per-file error was recorded
    pub success: bool,
    pub errors: Vec<String>,
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_indexed: usize,
    pub files_removed: usize,
    /// Chunks embedded and stored this run
    pub chunks_embedded: usize,
    /// Chunks re-encountered unchanged, no re-embedding
    pub chunks_kept: usize,
    pub chunks_deleted: usize,
    pub merged: usize,
    pub subdivided: usize,
    pub skipped_too_small: usize,
    pub statement_fallback: usize,
    /// Whole-file chunks emitted because AST parsing failed
    pub file_fallback: usize,
    /// Final codemap size after reconciliation
    pub total_chunks: usize,
}

/// Orchestrates incremental indexing over one source tree
pub struct IndexEngine {
    root: PathBuf,
    chunker: SemanticChunker,
    embedder: Arc<dyn Embedder>,
    db: Arc<Database>,
    store: Arc<dyn ChunkStore>,
    tracker: ChangeTracker,
    codemap: Codemap,
}

impl IndexEngine {
    pub fn new(
        root: PathBuf,
        chunker: SemanticChunker,
        embedder: Arc<dyn Embedder>,
        db: Arc<Database>,
        store: Arc<dyn ChunkStore>,
        tracker: ChangeTracker,
        codemap: Codemap,
    ) -> Self {
        Self {
            root,
            chunker,
            embedder,
            db,
            store,
            tracker,
            codemap,
        }
    }

    pub fn codemap(&self) -> &Codemap {
        &self.codemap
    }

    /// Run one indexing pass
    pub async fn run(&mut self, options: &IndexOptions) -> Result<IndexSummary> {
        let mut summary = IndexSummary::default();
        let mut batcher = EmbeddingBatcher::new(options.batch_size);

        let scanned = scan_files(&self.root, &options.scan)?;
        summary.files_scanned = scanned.len();
        info!(files = scanned.len(), root = %self.root.display(), "indexing pass started");

        let mut seen: HashSet<String> = HashSet::with_capacity(scanned.len());
        for file in &scanned {
            seen.insert(file.relative_path.clone());

            let source = match std::fs::read_to_string(&file.path) {
                Ok(source) => source,
                Err(e) => {
                    summary
                        .errors
                        .push(format!("{}: read failed: {e}", file.relative_path));
                    continue;
                }
            };

            let file_hash = fast_hash(&source);
            if !options.full && self.tracker.is_unchanged(&file.relative_path, &file_hash) {
                summary.files_unchanged += 1;
                continue;
            }

            match self
                .index_file(file, &source, file_hash, &mut batcher, &mut summary)
                .await
            {
                Ok(()) => summary.files_indexed += 1,
                Err(e) => {
                    summary
                        .errors
                        .push(format!("{}: {e}", file.relative_path));
                }
            }
        }

        if options.full {
            let vanished: Vec<String> = self
                .tracker
                .tracked_files()
                .into_iter()
                .filter(|path| !seen.contains(path))
                .collect();
            for path in vanished {
                let stale = self.codemap.ids_for_file(&path);
                self.delete_chunks(&stale, &mut summary)?;
                self.tracker.remove_file(&path);
                summary.files_removed += 1;
                debug!(file = %path, "removed vanished file");
            }
        }

        // fixed finalization order: flush, tracker, graph, codemap
        self.flush(&mut batcher, &mut summary, true).await?;
        self.tracker.persist_if_dirty()?;
        graph::rebuild(&mut self.codemap);
        self.codemap.persist()?;

        summary.total_chunks = self.codemap.records().count();
        summary.success = summary.errors.is_empty();
        info!(
            indexed = summary.files_indexed,
            unchanged = summary.files_unchanged,
            embedded = summary.chunks_embedded,
            kept = summary.chunks_kept,
            deleted = summary.chunks_deleted,
            errors = summary.errors.len(),
            "indexing pass finished"
        );
        Ok(summary)
    }

    async fn index_file(
        &mut self,
        file: &ScanResult,
        source: &str,
        file_hash: String,
        batcher: &mut EmbeddingBatcher,
        summary: &mut IndexSummary,
    ) -> Result<()> {
        let lang = crate::chunking::Language::from_path(&file.path);
        let pieces = match lang {
            Some(lang) => match self.chunker.chunk(source, lang).await {
                Ok(outcome) => {
                    summary.merged += outcome.stats.merged;
                    summary.subdivided += outcome.stats.subdivided;
                    summary.skipped_too_small += outcome.stats.skipped_too_small;
                    summary.statement_fallback += outcome.stats.statement_fallback;
                    outcome.pieces
                }
                Err(e) => {
                    // degrade to one opaque whole-file chunk
                    warn!(file = %file.relative_path, error = %e, "parse failed, indexing whole file");
                    summary.file_fallback += 1;
                    vec![file_fallback_piece(source)]
                }
            },
            None => {
                let outcome = self.chunker.chunk_plain(source).await?;
                outcome.pieces
            }
        };

        let mut stale: HashSet<String> = self
            .codemap
            .ids_for_file(&file.relative_path)
            .into_iter()
            .collect();
        let mut chunk_hashes = Vec::with_capacity(pieces.len());

        for (ordinal, piece) in pieces.iter().enumerate() {
            chunk_hashes.push(fast_hash(&piece.text));
            let record = self.build_record(file, piece, ordinal);

            if self.codemap.contains_identical(&record.chunk_id, &record.sha) {
                stale.remove(&record.chunk_id);
                summary.chunks_kept += 1;
                continue;
            }
            stale.remove(&record.chunk_id);

            let embed_text = embedding_text(&record, &piece.text);
            batcher.push(PendingChunk {
                record,
                text: piece.text.clone(),
                embed_text,
            });
            if batcher.ready() {
                self.flush(batcher, summary, false).await?;
            }
        }

        let stale: Vec<String> = stale.into_iter().collect();
        self.delete_chunks(&stale, summary)?;
        self.tracker
            .update_file(&file.relative_path, file_hash, chunk_hashes);
        Ok(())
    }

    fn build_record(&self, file: &ScanResult, piece: &ChunkPiece, ordinal: usize) -> ChunkRecord {
        let lang = crate::chunking::Language::from_path(&file.path);
        let fallback_symbol = match piece.origin {
            PieceOrigin::Declaration => format!("chunk_{ordinal}"),
            PieceOrigin::MergedMembers => format!("members_{ordinal}"),
            PieceOrigin::StatementSlice => format!("slice_{ordinal}"),
        };
        let meta = metadata::extract(&piece.text, lang, &fallback_symbol);

        let sha = chunk_sha(&piece.text);
        ChunkRecord {
            chunk_id: chunk_id(&file.relative_path, &meta.symbol, &sha),
            sha,
            file_path: file.relative_path.clone(),
            symbol: meta.symbol,
            lang: lang.map(|l| l.as_str().to_string()),
            chunk_kind: piece.kind,
            size: piece.size,
            tags: meta.tags,
            intent: meta.intent,
            doc_comment: meta.doc_comment,
            important_variables: meta.important_variables,
            signature: meta.signature,
            parameters: meta.parameters,
            return_type: meta.return_type,
            calls: meta.calls,
            parent_context: piece.parent_context.clone(),
            ..Default::default()
        }
    }

    /// Embed and persist queued chunks. Full batches only, unless `drain`
    /// is set (finalization), which also flushes the partial remainder.
    async fn flush(
        &mut self,
        batcher: &mut EmbeddingBatcher,
        summary: &mut IndexSummary,
        drain: bool,
    ) -> Result<()> {
        loop {
            let batch = match batcher.take_batch() {
                Some(batch) => batch,
                None if drain && !batcher.is_empty() => batcher.drain(),
                None => break,
            };
            let texts: Vec<String> = batch.iter().map(|p| p.embed_text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            for (pending, embedding) in batch.into_iter().zip(embeddings) {
                self.store.write(&pending.record.sha, &pending.text)?;
                self.db.upsert_embedding(
                    &pending.record.chunk_id,
                    self.embedder.model_name(),
                    self.embedder.dimensions(),
                    &pending.record.sha,
                    &pending.record.file_path,
                    &embedding,
                )?;
                self.codemap.insert(pending.record);
                summary.chunks_embedded += 1;
            }
        }
        Ok(())
    }

    fn delete_chunks(&mut self, chunk_ids: &[String], summary: &mut IndexSummary) -> Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        self.db.delete_chunks(chunk_ids)?;
        for chunk_id in chunk_ids {
            if let Some(removed) = self.codemap.remove(chunk_id) {
                // keep the blob while another chunk still shares the text
                let shared = self.codemap.records().any(|r| r.sha == removed.sha);
                if !shared {
                    self.store.remove(&removed.sha)?;
                }
            }
            summary.chunks_deleted += 1;
        }
        Ok(())
    }
}

fn file_fallback_piece(source: &str) -> ChunkPiece {
    let line_count = source.lines().count().max(1);
    ChunkPiece {
        text: source.to_string(),
        size: crate::chunking::SizeEstimator::estimate(source),
        kind: ChunkKind::File,
        origin: PieceOrigin::Declaration,
        parent_context: None,
        start_line: 1,
        end_line: line_count,
    }
}

/// Text actually sent to the embedder: identity header plus the code
fn embedding_text(record: &ChunkRecord, text: &str) -> String {
    let description = record.description();
    if description.is_empty() {
        format!("{} {}\n{}", record.symbol, record.file_path, text)
    } else {
        format!(
            "{} {}\n{}\n{}",
            record.symbol, record.file_path, description, text
        )
    }
}
