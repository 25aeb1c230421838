//! AST-aware semantic chunking
//!
//! Walks a tree-sitter syntax tree, selects declaration-level nodes per
//! language rule table and yields size-bounded code units. Oversized nodes
//! are subdivided at rule-table boundaries (class to methods); nodes with no
//! subdivision points fall back to statement-level line slicing with a
//! trailing overlap. Undersized subdivision leftovers are merged into one
//! synthetic chunk or dropped.

pub mod language;
pub mod parser;
pub mod sizer;

pub use language::{is_supported, kind_for_node, Language, LanguageRules};
pub use sizer::{EstimatorReport, SizeClass, SizeEstimator, TOKEN_CACHE_CAPACITY};

use crate::error::Result;
use crate::model::ChunkKind;
use futures::future::{FutureExt, LocalBoxFuture};
use std::sync::Arc;
use tracing::debug;
use tree_sitter::Node;

/// Hard floor for the statement-fallback overlap ratio; a fixed configured
/// overlap becomes a vanishing fraction on very large functions
const OVERLAP_FLOOR: f64 = 0.20;

/// How a piece was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PieceOrigin {
    /// A declaration-level node emitted whole
    Declaration,
    /// Synthetic merge of under-min subdivision leftovers
    MergedMembers,
    /// Statement-level slice of a node with no subdivision points
    StatementSlice,
}

/// One size-bounded retrieval unit produced by the chunker
#[derive(Debug, Clone)]
pub struct ChunkPiece {
    pub text: String,
    /// Size in provider units at decision time
    pub size: usize,
    pub kind: ChunkKind,
    pub origin: PieceOrigin,
    /// First line of the enclosing declaration, present when this piece was
    /// reached via subdivision
    pub parent_context: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
}

/// Counters for one chunking pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkStats {
    pub merged: usize,
    pub subdivided: usize,
    pub skipped_too_small: usize,
    pub statement_fallback: usize,
}

impl ChunkStats {
    fn absorb(&mut self, other: ChunkStats) {
        self.merged += other.merged;
        self.subdivided += other.subdivided;
        self.skipped_too_small += other.skipped_too_small;
        self.statement_fallback += other.statement_fallback;
    }
}

/// Chunking result: ordered pieces plus pass counters
#[derive(Debug, Default)]
pub struct ChunkOutcome {
    pub pieces: Vec<ChunkPiece>,
    pub stats: ChunkStats,
}

/// Semantic chunker over a parsed syntax tree
pub struct SemanticChunker {
    estimator: Arc<SizeEstimator>,
}

impl SemanticChunker {
    pub fn new(estimator: Arc<SizeEstimator>) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &Arc<SizeEstimator> {
        &self.estimator
    }

    /// Chunk source code for a supported language.
    ///
    /// Returns an error when the tree cannot be parsed at all; the indexing
    /// engine degrades to a whole-file fallback chunk in that case.
    pub async fn chunk(&self, source: &str, lang: Language) -> Result<ChunkOutcome> {
        let tree = parser::parse(source, lang)?;
        let rules = lang.rules();

        let candidates = collect_candidates(tree.root_node(), rules);
        debug!(
            language = lang.as_str(),
            candidates = candidates.len(),
            "collected top-level chunk candidates"
        );

        let mut outcome = ChunkOutcome::default();
        for node in candidates {
            let node_result = self.chunk_node(source, node, rules, None, true).await?;
            outcome.pieces.extend(node_result.pieces);
            outcome.stats.absorb(node_result.stats);
        }
        Ok(outcome)
    }

    /// Chunk non-AST content (unsupported languages, prose) by statement
    /// slicing; small inputs yield exactly one piece.
    pub async fn chunk_plain(&self, source: &str) -> Result<ChunkOutcome> {
        let size = self.estimator.size(source).await?;
        if size <= self.estimator.limits().max {
            return Ok(ChunkOutcome {
                pieces: vec![ChunkPiece {
                    text: source.to_string(),
                    size,
                    kind: ChunkKind::File,
                    origin: PieceOrigin::Declaration,
                    parent_context: None,
                    start_line: 1,
                    end_line: source.lines().count().max(1),
                }],
                stats: ChunkStats::default(),
            });
        }

        let mut stats = ChunkStats::default();
        let mut pieces = self.slice_statements(source, None, 1, &mut stats);
        for piece in &mut pieces {
            piece.kind = ChunkKind::File;
        }
        Ok(ChunkOutcome { pieces, stats })
    }

    fn chunk_node<'a>(
        &'a self,
        source: &'a str,
        node: Node<'a>,
        rules: &'a LanguageRules,
        parent_context: Option<String>,
        top_level: bool,
    ) -> LocalBoxFuture<'a, Result<ChunkOutcome>> {
        async move {
            let text = &source[node.start_byte()..node.end_byte()];
            let mut outcome = ChunkOutcome::default();

            // The estimate skip gives a cheap "definitely too large" verdict
            // without tokenizing; a node exactly at max is never TooLarge
            // because the band is strictly greater-than.
            let (class, size) = self.estimator.classify(text, true).await?;

            if class == SizeClass::TooLarge {
                return self
                    .subdivide(source, node, rules, text, parent_context)
                    .await;
            }

            // Undersized non-top-level members are handled by the parent's
            // merge pass; reaching here means the parent chose recursion, so
            // drop. A node exactly at min is kept.
            if class == SizeClass::TooSmall && !top_level {
                outcome.stats.skipped_too_small += 1;
                return Ok(outcome);
            }

            let (start_line, end_line) = line_numbers(source, node.start_byte(), node.end_byte());
            outcome.pieces.push(ChunkPiece {
                text: text.to_string(),
                size,
                kind: kind_for_node(node.kind()),
                origin: PieceOrigin::Declaration,
                parent_context,
                start_line,
                end_line,
            });
            Ok(outcome)
        }
        .boxed_local()
    }

    async fn subdivide<'a>(
        &'a self,
        source: &'a str,
        node: Node<'a>,
        rules: &'a LanguageRules,
        text: &'a str,
        parent_context: Option<String>,
    ) -> Result<ChunkOutcome> {
        let mut outcome = ChunkOutcome::default();
        outcome.stats.subdivided += 1;

        let sub_nodes = rules
            .subdivision_kinds(node.kind())
            .map(|kinds| collect_subdivision_nodes(node, kinds))
            .unwrap_or_default();

        if sub_nodes.is_empty() {
            let (start_line, _) = line_numbers(source, node.start_byte(), node.end_byte());
            let kind = kind_for_node(node.kind());
            let mut pieces = self.slice_statements(text, parent_context, start_line, &mut outcome.stats);
            for piece in &mut pieces {
                piece.kind = kind;
            }
            outcome.pieces = pieces;
            return Ok(outcome);
        }

        let context = first_line(text);
        let mut smalls: Vec<(String, usize, usize, usize)> = Vec::new();

        for sub in sub_nodes {
            let sub_text = &source[sub.start_byte()..sub.end_byte()];
            let sub_size = self.estimator.size(sub_text).await?;

            if sub_size < self.estimator.limits().min {
                let (start_line, end_line) = line_numbers(source, sub.start_byte(), sub.end_byte());
                smalls.push((sub_text.to_string(), sub_size, start_line, end_line));
            } else {
                let sub_outcome = self
                    .chunk_node(source, sub, rules, Some(context.clone()), false)
                    .await?;
                outcome.pieces.extend(sub_outcome.pieces);
                outcome.stats.absorb(sub_outcome.stats);
            }
        }

        if !smalls.is_empty() {
            let combined: usize = smalls.iter().map(|(_, size, _, _)| size).sum();
            let merge_floor = self.estimator.limits().merge_min_members;
            if combined >= self.estimator.limits().min || smalls.len() >= merge_floor {
                let start_line = smalls.iter().map(|(_, _, s, _)| *s).min().unwrap_or(1);
                let end_line = smalls.iter().map(|(_, _, _, e)| *e).max().unwrap_or(start_line);
                let merged_text = smalls
                    .iter()
                    .map(|(text, _, _, _)| text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                outcome.stats.merged += smalls.len();
                outcome.pieces.push(ChunkPiece {
                    text: merged_text,
                    size: combined,
                    kind: ChunkKind::Method,
                    origin: PieceOrigin::MergedMembers,
                    parent_context: Some(context),
                    start_line,
                    end_line,
                });
            } else {
                // 1-2 members under threshold with a combined size below min
                // are noise; tunable via merge_min_members
                outcome.stats.skipped_too_small += smalls.len();
            }
        }

        Ok(outcome)
    }

    /// Statement-level line slicing: accumulate lines up to `max`, emit, seed
    /// the next piece with a trailing overlap measured in size units.
    fn slice_statements(
        &self,
        text: &str,
        parent_context: Option<String>,
        base_line: usize,
        stats: &mut ChunkStats,
    ) -> Vec<ChunkPiece> {
        let limits = self.estimator.limits();
        let overlap_ratio = limits.overlap_ratio.max(OVERLAP_FLOOR);
        let overlap_units = (limits.max as f64 * overlap_ratio) as usize;

        let lines: Vec<&str> = text.lines().collect();
        let line_sizes: Vec<usize> = lines
            .iter()
            .map(|line| SizeEstimator::estimate(line).max(1))
            .collect();

        let mut pieces = Vec::new();
        let mut window: Vec<usize> = Vec::new();
        let mut window_size = 0usize;

        let emit = |window: &[usize], window_size: usize, pieces: &mut Vec<ChunkPiece>| {
            if window.is_empty() {
                return;
            }
            let piece_text = window
                .iter()
                .map(|&i| lines[i])
                .collect::<Vec<_>>()
                .join("\n");
            let start_line = base_line + window[0];
            let end_line = base_line + window[window.len() - 1];
            pieces.push(ChunkPiece {
                text: piece_text,
                size: window_size,
                kind: ChunkKind::Function,
                origin: PieceOrigin::StatementSlice,
                parent_context: parent_context.clone(),
                start_line,
                end_line,
            });
        };

        for (i, &line_size) in line_sizes.iter().enumerate() {
            if window_size + line_size > limits.max && !window.is_empty() {
                emit(&window, window_size, &mut pieces);

                // trailing overlap seed, measured in size units not lines
                let mut seed: Vec<usize> = Vec::new();
                let mut seed_size = 0usize;
                for &j in window.iter().rev() {
                    if seed_size >= overlap_units {
                        break;
                    }
                    seed.push(j);
                    seed_size += line_sizes[j];
                }
                seed.reverse();
                window = seed;
                window_size = seed_size;
            }
            window.push(i);
            window_size += line_size;
        }
        emit(&window, window_size, &mut pieces);

        stats.statement_fallback += pieces.len();
        pieces
    }
}

/// Collect top-level chunk candidates, transparently unwrapping export
/// wrappers whose only chunk-worthy child is a declaration.
fn collect_candidates<'t>(root: Node<'t>, rules: &LanguageRules) -> Vec<Node<'t>> {
    let mut candidates = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        let mut children: Vec<Node<'t>> = Vec::new();
        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                children.push(child);
            }
        }

        for child in &children {
            let kind = child.kind();
            if rules.is_chunk_kind(kind) {
                candidates.push(*child);
            } else if rules.is_export_wrapper(kind) {
                if let Some(inner) = unwrap_export(*child, rules) {
                    candidates.push(inner);
                }
            }
        }

        // descend into non-candidates to find nested declarations
        for child in children.into_iter().rev() {
            if !rules.is_chunk_kind(child.kind()) && !rules.is_export_wrapper(child.kind()) {
                stack.push(child);
            }
        }
    }

    candidates.sort_by_key(|n| n.start_byte());
    candidates
}

/// An export wrapper is transparent when its sole chunk-worthy named child
/// is a declaration; the wrapper itself is never chunked.
fn unwrap_export<'t>(node: Node<'t>, rules: &LanguageRules) -> Option<Node<'t>> {
    let mut inner = None;
    for i in 0..node.named_child_count() {
        let child = node.named_child(i)?;
        if rules.is_chunk_kind(child.kind()) {
            if inner.is_some() {
                return None;
            }
            inner = Some(child);
        }
    }
    inner
}

/// Collect subdivision points: walk the subtree, stop descending at matches
fn collect_subdivision_nodes<'t>(parent: Node<'t>, kinds: &[&str]) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![parent];

    while let Some(node) = stack.pop() {
        for i in (0..node.named_child_count()).rev() {
            if let Some(child) = node.named_child(i) {
                if kinds.contains(&child.kind()) {
                    found.push(child);
                } else {
                    stack.push(child);
                }
            }
        }
    }

    found.sort_by_key(|n| n.start_byte());
    found
}

/// Compute 1-indexed line numbers for a byte range
pub fn line_numbers(source: &str, start_byte: usize, end_byte: usize) -> (usize, usize) {
    let start_line = source[..start_byte].matches('\n').count() + 1;
    let end_line = source[..end_byte].matches('\n').count() + 1;
    (start_line, end_line)
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().trim_end().to_string()
}
