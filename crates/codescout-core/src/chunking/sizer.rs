//! Two-tier chunk size estimation
//!
//! Tier 1 is a character-count heuristic (`ceil(chars / 4)`); tier 2 is the
//! provider tokenizer, which may be a network call. Exact counts are memoized
//! in a bounded LRU so repeated classification of the same text is free.

use crate::config::ChunkLimits;
use crate::error::Result;
use crate::llm::Tokenizer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default memoization capacity
pub const TOKEN_CACHE_CAPACITY: usize = 1000;

/// Size classification against the active limits.
///
/// Bands are exact: `size < min` is too small, `size > max` is too large,
/// `size <= optimal` is optimal, anything between optimal and max is usable
/// but should be subdivided when a natural boundary exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    TooSmall,
    Optimal,
    NeedsSubdivision,
    TooLarge,
}

/// Bounded LRU keyed by exact source text
struct TokenCache {
    entries: HashMap<String, (usize, u64)>,
    tick: u64,
    capacity: usize,
}

impl TokenCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            tick: 0,
            capacity: capacity.max(1),
        }
    }

    fn get(&mut self, key: &str) -> Option<usize> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(count, last_used)| {
            *last_used = tick;
            *count
        })
    }

    fn put(&mut self, key: String, count: usize) {
        self.tick += 1;
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            if let Some(lru_key) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, last_used))| *last_used)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&lru_key);
            }
        }
        self.entries.insert(key, (count, self.tick));
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.tick = 0;
    }
}

/// Running counters for observability
#[derive(Default)]
struct EstimatorCounters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
    char_filter_skips: AtomicU64,
    exact_tokenizations: AtomicU64,
}

/// Snapshot of estimator activity
#[derive(Debug, Clone, Default)]
pub struct EstimatorReport {
    pub requests: u64,
    pub cache_hits: u64,
    pub char_filter_skips: u64,
    pub exact_tokenizations: u64,
    pub cache_hit_rate: f64,
    pub skip_rate: f64,
}

/// Size estimator with memoized exact tokenization
pub struct SizeEstimator {
    limits: ChunkLimits,
    tokenizer: Option<Arc<dyn Tokenizer>>,
    cache: Mutex<TokenCache>,
    counters: EstimatorCounters,
}

impl SizeEstimator {
    pub fn new(limits: ChunkLimits, tokenizer: Option<Arc<dyn Tokenizer>>) -> Self {
        Self::with_capacity(limits, tokenizer, TOKEN_CACHE_CAPACITY)
    }

    pub fn with_capacity(
        limits: ChunkLimits,
        tokenizer: Option<Arc<dyn Tokenizer>>,
        capacity: usize,
    ) -> Self {
        Self {
            limits,
            tokenizer,
            cache: Mutex::new(TokenCache::new(capacity)),
            counters: EstimatorCounters::default(),
        }
    }

    pub fn limits(&self) -> &ChunkLimits {
        &self.limits
    }

    /// Tier-1 character heuristic: `ceil(chars / 4)`
    pub fn estimate(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Classify a size against the limit bands
    pub fn classify_size(&self, size: usize) -> SizeClass {
        if size < self.limits.min {
            SizeClass::TooSmall
        } else if size > self.limits.max {
            SizeClass::TooLarge
        } else if size <= self.limits.optimal {
            SizeClass::Optimal
        } else {
            SizeClass::NeedsSubdivision
        }
    }

    /// Exact size in provider units; memoized. Falls back to the character
    /// heuristic when no tokenizer is configured.
    pub async fn size(&self, text: &str) -> Result<usize> {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(cached) = self.cache_get(text) {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached);
        }

        let count = match &self.tokenizer {
            Some(tokenizer) => {
                self.counters
                    .exact_tokenizations
                    .fetch_add(1, Ordering::Relaxed);
                tokenizer.count_tokens(text).await?
            }
            None => Self::estimate(text),
        };

        self.cache_put(text, count);
        Ok(count)
    }

    /// Batch variant: splits into already-cached and needs-tokenizing, counts
    /// the remainder in one call, backfills the cache.
    pub async fn size_batch(&self, texts: &[String]) -> Result<Vec<usize>> {
        self.counters
            .requests
            .fetch_add(texts.len() as u64, Ordering::Relaxed);

        let mut results: Vec<Option<usize>> = vec![None; texts.len()];
        let mut missing_indices = Vec::new();
        let mut missing_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(cached) = self.cache_get(text) {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                results[i] = Some(cached);
            } else {
                missing_indices.push(i);
                missing_texts.push(text.clone());
            }
        }

        if !missing_texts.is_empty() {
            let counts = match &self.tokenizer {
                Some(tokenizer) => {
                    self.counters
                        .exact_tokenizations
                        .fetch_add(missing_texts.len() as u64, Ordering::Relaxed);
                    tokenizer.count_tokens_batch(&missing_texts).await?
                }
                None => missing_texts.iter().map(|t| Self::estimate(t)).collect(),
            };

            for (idx, count) in missing_indices.iter().zip(counts) {
                self.cache_put(&texts[*idx], count);
                results[*idx] = Some(count);
            }
        }

        Ok(results.into_iter().map(|r| r.unwrap_or(0)).collect())
    }

    /// Classify a candidate, returning the class and the size the decision
    /// was based on.
    ///
    /// A memoized exact count always wins over the heuristic. When
    /// `allow_estimate_skip` is set and the character estimate lands far
    /// above the ceiling (`> 1.2 * max`), the too-large verdict is taken
    /// from the estimate without tokenizing; every other band needs the
    /// exact size, since the heuristic can undercount by several times on
    /// dense token streams.
    pub async fn classify(&self, text: &str, allow_estimate_skip: bool) -> Result<(SizeClass, usize)> {
        if let Some(cached) = self.cache_get(text) {
            self.counters.requests.fetch_add(1, Ordering::Relaxed);
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok((self.classify_size(cached), cached));
        }

        if allow_estimate_skip {
            let estimate = Self::estimate(text);
            let high_bar = (self.limits.max as f64 * 1.2) as usize;
            if estimate > high_bar {
                self.counters.requests.fetch_add(1, Ordering::Relaxed);
                self.counters.char_filter_skips.fetch_add(1, Ordering::Relaxed);
                return Ok((SizeClass::TooLarge, estimate));
            }
        }

        let size = self.size(text).await?;
        Ok((self.classify_size(size), size))
    }

    /// Reset counters and drop all memoized counts
    pub fn reset(&self) {
        self.counters.requests.store(0, Ordering::Relaxed);
        self.counters.cache_hits.store(0, Ordering::Relaxed);
        self.counters.char_filter_skips.store(0, Ordering::Relaxed);
        self.counters.exact_tokenizations.store(0, Ordering::Relaxed);
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Snapshot of the running counters
    pub fn report(&self) -> EstimatorReport {
        let requests = self.counters.requests.load(Ordering::Relaxed);
        let cache_hits = self.counters.cache_hits.load(Ordering::Relaxed);
        let char_filter_skips = self.counters.char_filter_skips.load(Ordering::Relaxed);
        let exact_tokenizations = self.counters.exact_tokenizations.load(Ordering::Relaxed);
        let denom = requests.max(1) as f64;
        EstimatorReport {
            requests,
            cache_hits,
            char_filter_skips,
            exact_tokenizations,
            cache_hit_rate: cache_hits as f64 / denom,
            skip_rate: char_filter_skips as f64 / denom,
        }
    }

    fn cache_get(&self, key: &str) -> Option<usize> {
        self.cache.lock().ok()?.get(key)
    }

    fn cache_put(&self, key: &str, count: usize) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key.to_string(), count);
        }
    }
}
