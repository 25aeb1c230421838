//! Best-effort search telemetry
//!
//! After a high-confidence hit, the query is associated with the winning
//! chunk (a future shortcut) and a scrubbed query-pattern signature is
//! counted. Identifiers that could carry PII are replaced with
//! placeholders before anything is persisted. Failures are logged and
//! swallowed; the caller's result path never sees them.

use crate::storage::Database;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

/// Score above which a query -> chunk intention is recorded
pub const INTENTION_THRESHOLD: f64 = 0.92;

lazy_static! {
    static ref UUID_RE: Regex = Regex::new(
        r"(?i)\b[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\b"
    )
    .unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap();
    static ref HEX_RE: Regex = Regex::new(r"\b[0-9a-fA-F]{8,}\b").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"\b\d{3,}\b").unwrap();
    static ref SERVICE_RE: Regex =
        Regex::new(r"\b\w+(Service|Controller|Session|Handler|Manager)\b").unwrap();
    static ref VENDOR_RE: Regex =
        Regex::new(r"(?i)\b(stripe|twilio|sendgrid|datadog|okta|auth0|paypal)\b").unwrap();
}

/// Replace identifying tokens with stable placeholders
pub fn scrub_query(query: &str) -> String {
    let scrubbed = UUID_RE.replace_all(query, "<uuid>");
    let scrubbed = EMAIL_RE.replace_all(&scrubbed, "<email>");
    let scrubbed = HEX_RE.replace_all(&scrubbed, "<hex>");
    let scrubbed = SERVICE_RE.replace_all(&scrubbed, "<service>");
    let scrubbed = VENDOR_RE.replace_all(&scrubbed, "<vendor>");
    let scrubbed = NUMBER_RE.replace_all(&scrubbed, "<num>");
    scrubbed.into_owned()
}

/// Record intention + scrubbed pattern for a high-confidence result.
/// Never propagates storage errors.
pub fn record_hit(db: &Database, query: &str, chunk_id: &str, score: f64) {
    if score < INTENTION_THRESHOLD {
        return;
    }
    if let Err(e) = db.record_intention(query, chunk_id, score) {
        debug!(error = %e, "intention recording failed");
    }
    if let Err(e) = db.record_query_pattern(&scrub_query(query)) {
        debug!(error = %e, "query pattern recording failed");
    }
}
