//! End-to-end indexing engine tests
//!
//! Covers: initial indexing, incremental re-runs (idempotence), stale
//! chunk reconciliation on edit, file deletion on full runs, and the
//! change-tracker skip path.

mod common;

use codescout_core::index::IndexOptions;
use codescout_core::storage::ChunkStore;
use common::{engine_for, write_file};
use std::sync::atomic::Ordering;
use tempfile::TempDir;

const LIB_RS: &str = r#"
/// Parses the configuration file at the given path.
pub fn parse_config(path: &str) -> Result<Config, Error> {
    let raw = std::fs::read_to_string(path)?;
    let parsed = serde_yaml::from_str(&raw)?;
    validate_config(parsed)
}

/// Validates a parsed configuration.
pub fn validate_config(config: Config) -> Result<Config, Error> {
    if config.name.is_empty() {
        return Err(Error::Invalid);
    }
    Ok(config)
}
"#;

const MAIL_PY: &str = r#"
def send_email(recipient, subject, body):
    """Send a notification email over smtp."""
    message = build_message(recipient, subject, body)
    return smtp_deliver(message)

def build_message(recipient, subject, body):
    return {"to": recipient, "subject": subject, "body": body}
"#;

#[tokio::test]
async fn test_initial_index_populates_everything() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(src.path(), "src/lib.rs", LIB_RS);
    write_file(src.path(), "mail.py", MAIL_PY);

    let mut fx = engine_for(src.path(), state.path());
    let summary = fx.engine.run(&IndexOptions::default()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.files_indexed, 2);
    assert!(summary.chunks_embedded >= 4, "expected one chunk per function");
    assert_eq!(summary.total_chunks, summary.chunks_embedded);

    // codemap, vector store and chunk store agree
    let codemap = fx.engine.codemap();
    assert_eq!(codemap.records().count(), summary.total_chunks);
    assert_eq!(
        fx.db.count_embeddings("mock-embedder", common::DIMS).unwrap(),
        summary.total_chunks
    );
    for record in codemap.records() {
        assert!(fx.store.read(&record.sha).unwrap().is_some());
        assert!(!record.symbol.is_empty());
    }

    let symbols: Vec<&str> = codemap.records().map(|r| r.symbol.as_str()).collect();
    assert!(symbols.contains(&"parse_config"));
    assert!(symbols.contains(&"send_email"));
}

#[tokio::test]
async fn test_reindex_unchanged_tree_is_idempotent() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(src.path(), "src/lib.rs", LIB_RS);

    let mut fx = engine_for(src.path(), state.path());
    let first = fx.engine.run(&IndexOptions::default()).await.unwrap();
    let embedded_after_first = fx.embedder.texts_embedded.load(Ordering::SeqCst);

    let second = fx.engine.run(&IndexOptions::default()).await.unwrap();

    assert_eq!(second.chunks_embedded, 0);
    assert_eq!(second.chunks_deleted, 0);
    assert_eq!(second.files_unchanged, 1);
    assert_eq!(second.total_chunks, first.total_chunks);
    // no embedding traffic at all on the second pass
    assert_eq!(
        fx.embedder.texts_embedded.load(Ordering::SeqCst),
        embedded_after_first
    );
}

#[tokio::test]
async fn test_edit_reembeds_only_changed_chunks() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(src.path(), "src/lib.rs", LIB_RS);

    let mut fx = engine_for(src.path(), state.path());
    fx.engine.run(&IndexOptions::default()).await.unwrap();

    // change one function body, leave the other untouched
    let edited = LIB_RS.replace("config.name.is_empty()", "config.name.trim().is_empty()");
    write_file(src.path(), "src/lib.rs", &edited);

    let summary = fx.engine.run(&IndexOptions::default()).await.unwrap();
    assert!(summary.success);
    assert_eq!(summary.chunks_embedded, 1, "only the edited chunk re-embeds");
    assert_eq!(summary.chunks_deleted, 1, "the old version is reconciled away");
    assert_eq!(summary.chunks_kept, summary.total_chunks - 1);
}

#[tokio::test]
async fn test_full_run_removes_deleted_files() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(src.path(), "src/lib.rs", LIB_RS);
    write_file(src.path(), "mail.py", MAIL_PY);

    let mut fx = engine_for(src.path(), state.path());
    let first = fx.engine.run(&IndexOptions::default()).await.unwrap();

    std::fs::remove_file(src.path().join("mail.py")).unwrap();
    let options = IndexOptions {
        full: true,
        ..IndexOptions::default()
    };
    let summary = fx.engine.run(&options).await.unwrap();

    assert_eq!(summary.files_removed, 1);
    assert!(summary.chunks_deleted >= 2);
    assert!(summary.total_chunks < first.total_chunks);
    assert!(fx
        .engine
        .codemap()
        .records()
        .all(|r| r.file_path != "mail.py"));
}

#[tokio::test]
async fn test_markdown_indexed_without_ast() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(
        src.path(),
        "README.md",
        "# Project\n\nHow to parse the config file and send email notifications.\n",
    );

    let mut fx = engine_for(src.path(), state.path());
    let summary = fx.engine.run(&IndexOptions::default()).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.total_chunks, 1);
    let record = fx.engine.codemap().records().next().unwrap();
    assert_eq!(record.file_path, "README.md");
}

#[tokio::test]
async fn test_call_graph_built_during_finalization() {
    let src = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_file(src.path(), "src/lib.rs", LIB_RS);

    let mut fx = engine_for(src.path(), state.path());
    fx.engine.run(&IndexOptions::default()).await.unwrap();

    let codemap = fx.engine.codemap();
    let parse = codemap
        .records()
        .find(|r| r.symbol == "parse_config")
        .unwrap();
    let validate = codemap
        .records()
        .find(|r| r.symbol == "validate_config")
        .unwrap();

    // parse_config calls validate_config in the same file
    assert!(parse.call_targets.contains(&validate.sha));
    assert!(validate.callers.contains(&parse.sha));
    assert!(parse.neighbors.contains(&validate.sha));
}
