//! Vector scoring: cosine similarity plus heuristic boosts

use crate::model::ChunkRecord;

/// Boost when the chunk's recorded intent appears inside the query
pub const INTENT_BOOST: f64 = 0.1;
/// Boost per tag that appears as a query word
pub const TAG_BOOST: f64 = 0.03;
/// Boost for documentation-looking file paths
pub const DOC_BOOST: f64 = 0.05;

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Base similarity plus intent/tag/docs boosts, clamped to [0, 1].
/// `normalized_query` must already be lowercased.
pub fn score_chunk(similarity: f64, record: &ChunkRecord, normalized_query: &str) -> f64 {
    let mut score = similarity;

    if let Some(intent) = &record.intent {
        let intent = intent.trim().to_lowercase();
        if !intent.is_empty() && normalized_query.contains(&intent) {
            score += INTENT_BOOST;
        }
    }

    for tag in &record.tags {
        if normalized_query.split_whitespace().any(|word| word == tag) {
            score += TAG_BOOST;
        }
    }

    if is_documentation_path(&record.file_path) {
        score += DOC_BOOST;
    }

    score.clamp(0.0, 1.0)
}

fn is_documentation_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.ends_with(".md")
        || lower.contains("readme")
        || lower.contains("changelog")
        || lower.starts_with("docs/")
        || lower.contains("/docs/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0f32, 0.0, 0.0];
        let b = vec![1.0f32, 0.0, 0.0];
        let c = vec![0.0f32, 1.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &c).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_intent_and_tag_boosts() {
        let record = ChunkRecord {
            intent: Some("parse config".to_string()),
            tags: vec!["rust".to_string()],
            file_path: "src/config.rs".to_string(),
            ..Default::default()
        };
        let boosted = score_chunk(0.5, &record, "how to parse config in rust");
        assert!((boosted - (0.5 + INTENT_BOOST + TAG_BOOST)).abs() < 1e-9);

        let unboosted = score_chunk(0.5, &record, "serialize json");
        assert!((unboosted - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_doc_path_boost_and_clamp() {
        let record = ChunkRecord {
            file_path: "docs/README.md".to_string(),
            ..Default::default()
        };
        assert!((score_chunk(0.2, &record, "anything") - (0.2 + DOC_BOOST)).abs() < 1e-9);
        assert_eq!(score_chunk(0.99, &record, "anything"), 1.0);
        assert_eq!(score_chunk(-0.3, &record, "anything"), 0.0);
    }
}
