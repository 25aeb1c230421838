//! Symbol-graph score boost
//!
//! Chunks whose symbol, signature or parameter names lexically match the
//! query get a bounded additive boost, extended to call-graph neighbors so
//! that close collaborators of a strong name match surface too.

use crate::model::ChunkRecord;

const WHOLE_SYMBOL_WEIGHT: f64 = 1.0;
const SIGNATURE_WEIGHT: f64 = 0.6;
const SYMBOL_TOKEN_WEIGHT: f64 = 0.5;
const PARAM_TOKEN_WEIGHT: f64 = 0.3;

const OWN_WEIGHT: f64 = 0.2;
const NEIGHBOR_WEIGHT: f64 = 0.1;
/// Hard cap on the total boost added to a score
pub const MAX_SYMBOL_BOOST: f64 = 0.25;

/// Which signal contributed a boost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoostSource {
    /// The chunk's own name/signature matched
    Signature,
    /// A call-graph neighbor's name/signature matched
    Neighbor,
}

/// Result of the boost computation for one candidate
#[derive(Debug, Clone, Default)]
pub struct SymbolBoost {
    pub amount: f64,
    pub sources: Vec<BoostSource>,
}

/// Signature-match strength in [0, 1] for one record against a normalized
/// (lowercased) query.
pub fn signature_strength(record: &ChunkRecord, normalized_query: &str) -> f64 {
    let symbol = record.symbol.to_lowercase();
    if symbol.is_empty() {
        return 0.0;
    }

    let mut weighted = 0.0;
    let total = WHOLE_SYMBOL_WEIGHT + SIGNATURE_WEIGHT + SYMBOL_TOKEN_WEIGHT + PARAM_TOKEN_WEIGHT;

    if normalized_query.contains(&symbol) {
        weighted += WHOLE_SYMBOL_WEIGHT;
    }

    if let Some(signature) = &record.signature {
        let signature = signature.to_lowercase();
        if !signature.is_empty()
            && (normalized_query.contains(&signature) || signature.contains(normalized_query))
        {
            weighted += SIGNATURE_WEIGHT;
        }
    }

    let query_words: Vec<&str> = normalized_query.split_whitespace().collect();
    weighted += SYMBOL_TOKEN_WEIGHT * token_match_fraction(&split_identifier(&record.symbol), &query_words);

    let param_tokens: Vec<String> = record
        .parameters
        .iter()
        .flat_map(|p| split_identifier(p))
        .collect();
    weighted += PARAM_TOKEN_WEIGHT * token_match_fraction(&param_tokens, &query_words);

    (weighted / total).clamp(0.0, 1.0)
}

/// Own strength plus the best neighbor strength, weighted and capped
pub fn compute(
    record: &ChunkRecord,
    neighbors: &[&ChunkRecord],
    normalized_query: &str,
) -> SymbolBoost {
    let own = signature_strength(record, normalized_query);
    let neighbor = neighbors
        .iter()
        .map(|n| signature_strength(n, normalized_query))
        .fold(0.0f64, f64::max);

    let amount = (OWN_WEIGHT * own + NEIGHBOR_WEIGHT * neighbor).min(MAX_SYMBOL_BOOST);
    let mut sources = Vec::new();
    if own > 0.0 {
        sources.push(BoostSource::Signature);
    }
    if neighbor > 0.0 {
        sources.push(BoostSource::Neighbor);
    }
    SymbolBoost { amount, sources }
}

/// Fraction of `tokens` present among the query words (exact word match)
fn token_match_fraction(tokens: &[String], query_words: &[&str]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let matched = tokens
        .iter()
        .filter(|t| query_words.contains(&t.as_str()))
        .count();
    matched as f64 / tokens.len() as f64
}

/// Split camelCase and snake_case identifiers into lowercase words
fn split_identifier(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in identifier.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.retain(|w| w.len() > 1);
    words
}
