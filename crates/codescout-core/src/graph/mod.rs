//! Call-graph construction over the codemap
//!
//! A post-indexing pass: build a case-insensitive `symbol -> chunks` index,
//! resolve every chunk's raw call names to concrete chunks, invert the
//! adjacency for callers, and cap the stored neighbor lists. Edges are
//! stored as chunk-sha strings because the sha is the only identity stable
//! across runs.
//!
//! Resolution is heuristic: when several chunks share a symbol name the
//! same-file candidate wins, otherwise the first one found. Overloaded or
//! shadowed names can mis-link.

use crate::model::ChunkRecord;
use crate::storage::Codemap;
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on stored call_targets / callers / neighbors per chunk
pub const MAX_NEIGHBORS: usize = 10;

/// Rebuild call_targets, callers and neighbors for every codemap entry.
///
/// Returns the number of resolved outgoing edges.
pub fn rebuild(codemap: &mut Codemap) -> usize {
    // symbol -> [(chunk_id, file_path, sha)], insertion order = codemap order
    let mut by_symbol: HashMap<String, Vec<(String, String, String)>> = HashMap::new();
    for record in codemap.records() {
        by_symbol
            .entry(record.symbol.to_lowercase())
            .or_default()
            .push((
                record.chunk_id.clone(),
                record.file_path.clone(),
                record.sha.clone(),
            ));
    }

    // outgoing edges per chunk_id, then inverted into incoming
    let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<String>> = HashMap::new();

    for record in codemap.records() {
        let mut targets: Vec<String> = Vec::new();
        for call in &record.calls {
            let Some(candidates) = by_symbol.get(&call.to_lowercase()) else {
                continue;
            };
            let resolved = candidates
                .iter()
                .find(|(id, file, _)| *file == record.file_path && *id != record.chunk_id)
                .or_else(|| candidates.iter().find(|(id, _, _)| *id != record.chunk_id));
            if let Some((_, _, sha)) = resolved {
                if !targets.contains(sha) {
                    targets.push(sha.clone());
                }
            }
        }

        for sha in &targets {
            let callers = incoming.entry(sha.clone()).or_default();
            if !callers.contains(&record.sha) {
                callers.push(record.sha.clone());
            }
        }
        if !targets.is_empty() {
            outgoing.insert(record.chunk_id.clone(), targets);
        }
    }

    let mut edges = 0;
    for record in codemap.records_mut() {
        let call_targets = outgoing.remove(&record.chunk_id).unwrap_or_default();
        let callers = incoming.get(&record.sha).cloned().unwrap_or_default();
        edges += call_targets.len();

        let mut neighbors: Vec<String> = Vec::new();
        for sha in call_targets.iter().chain(callers.iter()) {
            if !neighbors.contains(sha) {
                neighbors.push(sha.clone());
            }
            if neighbors.len() >= MAX_NEIGHBORS {
                break;
            }
        }

        record.call_targets = truncated(call_targets);
        record.callers = truncated(callers);
        record.neighbors = neighbors;
    }

    debug!(edges, "symbol graph rebuilt");
    edges
}

/// One-pass `sha -> records` index, built once per query for neighbor
/// expansion. Several records can share a sha when files carry identical
/// chunk text.
pub fn neighbor_index(codemap: &Codemap) -> HashMap<&str, Vec<&ChunkRecord>> {
    let mut index: HashMap<&str, Vec<&ChunkRecord>> = HashMap::new();
    for record in codemap.records() {
        index.entry(record.sha.as_str()).or_default().push(record);
    }
    index
}

fn truncated(mut list: Vec<String>) -> Vec<String> {
    list.truncate(MAX_NEIGHBORS);
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{chunk_id, chunk_sha, ChunkRecord};

    fn record(file: &str, symbol: &str, text: &str, calls: &[&str]) -> ChunkRecord {
        let sha = chunk_sha(text);
        ChunkRecord {
            chunk_id: chunk_id(file, symbol, &sha),
            sha,
            file_path: file.to_string(),
            symbol: symbol.to_string(),
            calls: calls.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn codemap_with(records: Vec<ChunkRecord>) -> Codemap {
        let mut codemap = Codemap::ephemeral();
        for r in records {
            codemap.insert(r);
        }
        codemap
    }

    #[test]
    fn test_resolves_calls_and_inverts_callers() {
        let mut codemap = codemap_with(vec![
            record("a.rs", "caller", "fn caller() { helper(); }", &["helper"]),
            record("a.rs", "helper", "fn helper() {}", &[]),
        ]);

        let edges = rebuild(&mut codemap);
        assert_eq!(edges, 1);

        let helper_sha = chunk_sha("fn helper() {}");
        let caller_sha = chunk_sha("fn caller() { helper(); }");

        let caller = codemap
            .records()
            .find(|r| r.symbol == "caller")
            .unwrap();
        assert_eq!(caller.call_targets, vec![helper_sha.clone()]);
        assert_eq!(caller.neighbors, vec![helper_sha]);

        let helper = codemap
            .records()
            .find(|r| r.symbol == "helper")
            .unwrap();
        assert_eq!(helper.callers, vec![caller_sha.clone()]);
        assert_eq!(helper.neighbors, vec![caller_sha]);
    }

    #[test]
    fn test_prefers_same_file_match() {
        let mut codemap = codemap_with(vec![
            record("a.rs", "run", "fn run() { setup(); }", &["setup"]),
            record("b.rs", "setup", "fn setup() { /* b */ }", &[]),
            record("a.rs", "setup", "fn setup() { /* a */ }", &[]),
        ]);

        rebuild(&mut codemap);

        let same_file_sha = chunk_sha("fn setup() { /* a */ }");
        let caller = codemap.records().find(|r| r.symbol == "run").unwrap();
        assert_eq!(caller.call_targets, vec![same_file_sha]);
    }

    #[test]
    fn test_symbol_lookup_is_case_insensitive() {
        let mut codemap = codemap_with(vec![
            record("a.rs", "run", "fn run() { ParseConfig(); }", &["ParseConfig"]),
            record("b.rs", "parseconfig", "fn parseconfig() {}", &[]),
        ]);

        rebuild(&mut codemap);
        let caller = codemap.records().find(|r| r.symbol == "run").unwrap();
        assert_eq!(caller.call_targets.len(), 1);
    }

    #[test]
    fn test_unresolved_and_self_calls_dropped() {
        let mut codemap = codemap_with(vec![record(
            "a.rs",
            "recurse",
            "fn recurse() { recurse(); missing(); }",
            &["recurse", "missing"],
        )]);

        let edges = rebuild(&mut codemap);
        assert_eq!(edges, 0);
        let only = codemap.records().next().unwrap();
        assert!(only.call_targets.is_empty());
        assert!(only.neighbors.is_empty());
    }

    #[test]
    fn test_neighbor_cap_preserves_insertion_order() {
        let mut records = Vec::new();
        let callees: Vec<String> = (0..15).map(|i| format!("callee{i}")).collect();
        let callee_names: Vec<&str> = callees.iter().map(|s| s.as_str()).collect();
        records.push(record("hub.rs", "hub", "fn hub() { /* calls all */ }", &callee_names));
        for name in &callees {
            records.push(record("hub.rs", name, &format!("fn {name}() {{}}"), &[]));
        }
        let mut codemap = codemap_with(records);

        rebuild(&mut codemap);

        let hub = codemap.records().find(|r| r.symbol == "hub").unwrap();
        assert_eq!(hub.call_targets.len(), MAX_NEIGHBORS);
        assert_eq!(hub.neighbors.len(), MAX_NEIGHBORS);
        // first callee resolved stays first after truncation
        assert_eq!(hub.call_targets[0], chunk_sha("fn callee0() {}"));
    }

    #[test]
    fn test_rebuild_clears_stale_edges() {
        let mut codemap = codemap_with(vec![
            record("a.rs", "caller", "fn caller() { helper(); }", &["helper"]),
            record("a.rs", "helper", "fn helper() {}", &[]),
        ]);
        rebuild(&mut codemap);

        // caller stops calling helper; edges must disappear on the next pass
        for r in codemap.records_mut() {
            if r.symbol == "caller" {
                r.calls.clear();
            }
        }
        rebuild(&mut codemap);

        let helper = codemap.records().find(|r| r.symbol == "helper").unwrap();
        assert!(helper.callers.is_empty());
        assert!(helper.neighbors.is_empty());
    }

    #[test]
    fn test_neighbor_index_groups_records_sharing_a_sha() {
        let codemap = codemap_with(vec![
            record("a.rs", "dup", "fn dup() {}", &[]),
            record("b.rs", "dup", "fn dup() {}", &[]),
            record("a.rs", "other", "fn other() {}", &[]),
        ]);

        let index = neighbor_index(&codemap);
        assert_eq!(index.len(), 2);

        let dup_sha = chunk_sha("fn dup() {}");
        let dups = &index[dup_sha.as_str()];
        assert_eq!(dups.len(), 2);
        assert!(dups.iter().any(|r| r.file_path == "a.rs"));
        assert!(dups.iter().any(|r| r.file_path == "b.rs"));

        let other_sha = chunk_sha("fn other() {}");
        assert_eq!(index[other_sha.as_str()].len(), 1);
    }
}
