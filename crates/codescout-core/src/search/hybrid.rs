//! The search pipeline
//!
//! Stages, in order: query normalization, scoped vector scoring with
//! heuristic boosts, symbol-graph boost, BM25 rank fusion, literal-match
//! re-sort, optional external rerank, telemetry. Every optional stage
//! degrades to the previous ordering on failure; a query never fails
//! because an enrichment stage did.

use crate::error::Result;
use crate::graph;
use crate::llm::{Embedder, Reranker};
use crate::model::ChunkRecord;
use crate::search::{bm25::Bm25Index, in_scope, normalize_query, symbol_boost, telemetry, vector, SearchCandidate, SearchOptions};
use crate::storage::{ChunkStore, Codemap, Database};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Reciprocal rank fusion constant; also the minimum candidate pool size
pub const RRF_K: usize = 60;
/// Upper bound on documents sent to the external reranker
pub const MAX_RERANK_DOCS: usize = 20;
/// Per-document character budget for rerank payloads
const RERANK_TEXT_BUDGET: usize = 1600;
/// Bounded cache of chunk source texts read back from the store
const TEXT_CACHE_CAPACITY: usize = 256;

/// LRU of sha -> chunk text
struct TextCache {
    entries: HashMap<String, (String, u64)>,
    capacity: usize,
    tick: u64,
}

impl TextCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    fn get(&mut self, sha: &str) -> Option<String> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(sha).map(|(text, used)| {
            *used = tick;
            text.clone()
        })
    }

    fn put(&mut self, sha: String, text: String) {
        self.tick += 1;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&sha) {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(sha, (text, self.tick));
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Sum of reciprocal rank contributions over the lists a doc appears in.
///
/// The vector list contributes ranks `0..vector_pool`, with the candidate at
/// index `i` ranked `i`; `lexical_ranks` carries `(candidate index, rank)`
/// pairs for the lexical hits, which may point outside the vector pool. A doc
/// in both lists sums both contributions.
fn rrf_fuse(vector_pool: usize, lexical_ranks: &[(usize, usize)]) -> HashMap<usize, f64> {
    let mut fused: HashMap<usize, f64> = HashMap::new();
    for rank in 0..vector_pool {
        *fused.entry(rank).or_insert(0.0) += 1.0 / (RRF_K + rank + 1) as f64;
    }
    for &(index, rank) in lexical_ranks {
        *fused.entry(index).or_insert(0.0) += 1.0 / (RRF_K + rank + 1) as f64;
    }
    fused
}

/// Long-lived search front end owning the per-provider caches
pub struct SearchService {
    db: Arc<Database>,
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    bm25_cache: Mutex<HashMap<String, Bm25Index>>,
    text_cache: Mutex<TextCache>,
}

impl SearchService {
    pub fn new(
        db: Arc<Database>,
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Option<Arc<dyn Reranker>>,
    ) -> Self {
        Self {
            db,
            store,
            embedder,
            reranker,
            bm25_cache: Mutex::new(HashMap::new()),
            text_cache: Mutex::new(TextCache::new(TEXT_CACHE_CAPACITY)),
        }
    }

    /// Drop all cached state; the next query rebuilds lazily
    pub fn clear_caches(&self) {
        self.bm25_cache
            .lock()
            .expect("bm25 cache mutex poisoned")
            .clear();
        self.text_cache
            .lock()
            .expect("text cache mutex poisoned")
            .clear();
    }

    /// Run one query over the codemap
    pub async fn search(
        &self,
        codemap: &Codemap,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchCandidate>> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let provider = self.embedder.model_name().to_string();
        let dimensions = self.embedder.dimensions();
        let embeddings = self.db.embeddings_for(&provider, dimensions)?;
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(&normalized).await?;

        // vector scoring over everything in scope
        let mut candidates: Vec<SearchCandidate> = Vec::new();
        for (chunk_id, embedding) in &embeddings {
            let Some(record) = codemap.get(chunk_id) else {
                continue;
            };
            if !in_scope(record, options) {
                continue;
            }
            let similarity = vector::cosine_similarity(&query_embedding, embedding);
            let raw = vector::score_chunk(similarity, record, &normalized);
            candidates.push(SearchCandidate::new(record.clone(), raw));
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if options.symbol_boost {
            let by_sha = graph::neighbor_index(codemap);
            for candidate in &mut candidates {
                let neighbors: Vec<&ChunkRecord> = candidate
                    .record
                    .neighbors
                    .iter()
                    .filter_map(|sha| by_sha.get(sha.as_str()))
                    .flat_map(|records| records.iter().copied())
                    .collect();
                let boost =
                    symbol_boost::compute(&candidate.record, &neighbors, &normalized);
                candidate.symbol_boost = boost.amount;
                candidate.boost_sources = boost.sources;
                candidate.score = (candidate.raw_score + boost.amount).clamp(0.0, 1.0);
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.chunk_id.cmp(&b.record.chunk_id))
        });

        let pool_size = options.limit.max(RRF_K).min(candidates.len());
        let mut selected: Vec<SearchCandidate> = if options.hybrid && options.bm25 {
            self.fuse_with_bm25(codemap, &normalized, candidates, pool_size, options)
        } else {
            candidates.truncate(pool_size);
            candidates
        };

        // literal name matches outrank fused ordering, fused order breaks ties
        if options.symbol_boost && selected.iter().any(|c| c.symbol_boost > 0.0) {
            selected.sort_by(|a, b| {
                b.raw_score
                    .partial_cmp(&a.raw_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| {
                        b.symbol_boost
                            .partial_cmp(&a.symbol_boost)
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .then_with(|| {
                        b.hybrid_score
                            .unwrap_or(0.0)
                            .partial_cmp(&a.hybrid_score.unwrap_or(0.0))
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
            });
        }

        selected.truncate(options.limit);

        if options.rerank && selected.len() >= 2 {
            if let Some(reranker) = &self.reranker {
                self.apply_rerank(reranker.as_ref(), &normalized, &mut selected)
                    .await;
            }
        }

        selected.retain(|c| c.score >= options.min_score);

        if let Some(top) = selected.first() {
            telemetry::record_hit(&self.db, &normalized, &top.record.chunk_id, top.score);
        }

        Ok(selected)
    }

    /// Fuse the vector pool with lexical BM25 hits via reciprocal rank fusion
    fn fuse_with_bm25(
        &self,
        codemap: &Codemap,
        normalized: &str,
        candidates: Vec<SearchCandidate>,
        pool_size: usize,
        options: &SearchOptions,
    ) -> Vec<SearchCandidate> {
        let cache_key = format!("{}:{}", self.embedder.model_name(), self.embedder.dimensions());
        let mut cache = self.bm25_cache.lock().expect("bm25 cache mutex poisoned");
        let index = cache.entry(cache_key).or_default();

        // incremental maintenance: only chunks not yet indexed pay the cost
        for record in codemap.records() {
            if !index.contains(&record.chunk_id) {
                index.add_document(&record.chunk_id, &self.lexical_text(record));
            }
        }

        let hits: Vec<(String, f64)> = index
            .search(normalized, pool_size)
            .into_iter()
            .filter(|(chunk_id, _)| {
                codemap
                    .get(chunk_id)
                    .map(|r| in_scope(r, options))
                    .unwrap_or(false)
            })
            .collect();
        drop(cache);

        if hits.is_empty() {
            debug!("no lexical hits, keeping vector pool");
            let mut pool = candidates;
            pool.truncate(pool_size);
            return pool;
        }

        let by_id: HashMap<String, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.record.chunk_id.clone(), i))
            .collect();

        let pool_overlap = hits
            .iter()
            .any(|(id, _)| by_id.get(id).map(|&i| i < pool_size).unwrap_or(false));
        if !pool_overlap {
            let mut pool = candidates;
            pool.truncate(pool_size);
            return pool;
        }

        let mut candidates = candidates;
        let mut lexical_ranks = Vec::with_capacity(hits.len());
        for (rank, (chunk_id, bm25_score)) in hits.iter().enumerate() {
            let Some(&i) = by_id.get(chunk_id) else {
                continue;
            };
            lexical_ranks.push((i, rank));
            candidates[i].bm25_score = Some(*bm25_score);
            candidates[i].bm25_rank = Some(rank + 1);
        }
        let fused = rrf_fuse(pool_size.min(candidates.len()), &lexical_ranks);

        let mut order: Vec<(usize, f64)> = fused.into_iter().collect();
        order.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let mut selected = Vec::with_capacity(order.len().min(pool_size));
        let mut taken: Vec<Option<SearchCandidate>> =
            candidates.into_iter().map(Some).collect();
        for (hybrid_rank, (i, fused_score)) in order.into_iter().enumerate() {
            if selected.len() >= pool_size {
                break;
            }
            if let Some(mut candidate) = taken[i].take() {
                candidate.hybrid_score = Some(fused_score);
                candidate.hybrid_rank = Some(hybrid_rank + 1);
                selected.push(candidate);
            }
        }
        selected
    }

    /// Rerank the top of the result list; on any failure keep the order
    async fn apply_rerank(
        &self,
        reranker: &dyn Reranker,
        normalized: &str,
        selected: &mut Vec<SearchCandidate>,
    ) {
        let doc_count = selected.len().min(MAX_RERANK_DOCS);
        let docs: Vec<String> = selected[..doc_count]
            .iter()
            .map(|c| self.rerank_text(&c.record))
            .collect();

        let entries = match reranker.rerank(normalized, &docs).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "rerank failed, keeping original order");
                return;
            }
        };

        let remainder: Vec<SearchCandidate> = selected.split_off(doc_count);
        let mut taken: Vec<Option<SearchCandidate>> =
            std::mem::take(selected).into_iter().map(Some).collect();

        let mut reordered = Vec::with_capacity(taken.len());
        for (rank, entry) in entries.iter().enumerate() {
            if let Some(slot) = taken.get_mut(entry.index) {
                if let Some(mut candidate) = slot.take() {
                    candidate.rerank_score = Some(entry.relevance_score);
                    candidate.rerank_rank = Some(rank + 1);
                    candidate.score = entry.relevance_score.clamp(0.0, 1.0);
                    reordered.push(candidate);
                }
            }
        }
        // anything the API did not mention keeps its place after the reranked
        reordered.extend(taken.into_iter().flatten());
        reordered.extend(remainder);
        *selected = reordered;
    }

    /// Document text for the lexical index
    fn lexical_text(&self, record: &ChunkRecord) -> String {
        let code = self.chunk_text(&record.sha).unwrap_or_default();
        format!(
            "{} {} {} {} {}",
            record.symbol,
            record.file_path,
            record.description(),
            record.intent.as_deref().unwrap_or(""),
            code
        )
    }

    /// Payload sent to the cross-encoder, truncated to a fixed budget
    fn rerank_text(&self, record: &ChunkRecord) -> String {
        let code = self.chunk_text(&record.sha).unwrap_or_default();
        let mut text = format!(
            "{} {}\n{}\n{}\n{}",
            record.symbol,
            record.file_path,
            record.description(),
            record.intent.as_deref().unwrap_or(""),
            code
        );
        if text.len() > RERANK_TEXT_BUDGET {
            let mut cut = RERANK_TEXT_BUDGET;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        text
    }

    /// Chunk source text via the bounded read cache
    fn chunk_text(&self, sha: &str) -> Option<String> {
        {
            let mut cache = self.text_cache.lock().expect("text cache mutex poisoned");
            if let Some(text) = cache.get(sha) {
                return Some(text);
            }
        }
        match self.store.read(sha) {
            Ok(Some(text)) => {
                let mut cache = self.text_cache.lock().expect("text cache mutex poisoned");
                cache.put(sha.to_string(), text.clone());
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                debug!(sha, error = %e, "chunk text read failed");
                None
            }
        }
    }
}
