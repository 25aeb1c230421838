//! Per-chunk metadata extraction
//!
//! Best-effort, regex-based: symbol name, signature triple, raw outgoing
//! call names, doc comments and derived intent, tags, important variables.
//! The symbol graph pass later resolves the raw call names to chunk
//! identities.

use crate::chunking::Language;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

const MAX_CALLS: usize = 24;
const MAX_VARIABLES: usize = 8;

lazy_static! {
    static ref RUST_FN: Regex =
        Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)")
            .unwrap();
    static ref RUST_TYPE: Regex =
        Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|mod)\s+(\w+)").unwrap();
    static ref RUST_IMPL: Regex = Regex::new(r"(?m)^\s*impl(?:<[^>]*>)?\s+(\w+)").unwrap();
    static ref PY_DEF: Regex = Regex::new(r"(?m)^\s*(?:async\s+)?def\s+(\w+)").unwrap();
    static ref PY_CLASS: Regex = Regex::new(r"(?m)^\s*class\s+(\w+)").unwrap();
    static ref JS_FN: Regex =
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)")
            .unwrap();
    static ref JS_CLASS: Regex =
        Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:class|interface|enum)\s+(\w+)")
            .unwrap();
    static ref JS_CONST_FN: Regex =
        Regex::new(r"(?m)^\s*(?:export\s+)?const\s+(\w+)\s*=\s*(?:async\s+)?(?:\(|function)")
            .unwrap();
    static ref JS_METHOD: Regex =
        Regex::new(r"(?m)^\s*(?:public\s+|private\s+|protected\s+|static\s+)*(?:async\s+)?(\w+)\s*\([^)]*\)\s*[:{]")
            .unwrap();
    static ref GO_FUNC: Regex =
        Regex::new(r"(?m)^\s*func\s+(?:\([^)]*\)\s+)?(\w+)").unwrap();
    static ref CALL_SITE: Regex = Regex::new(r"\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap();
    static ref LET_BINDING: Regex =
        Regex::new(r"(?m)^\s*(?:let\s+(?:mut\s+)?|const\s+|var\s+)(\w+)").unwrap();
    static ref PARAMS: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
    static ref RETURN_ARROW: Regex = Regex::new(r"->\s*([^{:\n]+)").unwrap();
}

lazy_static! {
    static ref CALL_STOPLIST: HashSet<&'static str> = [
        // rust
        "if", "for", "while", "match", "return", "loop", "fn", "let", "impl", "use", "mod",
        "struct", "enum", "trait", "async", "await", "move", "else", "unsafe", "where", "type",
        "dyn", "Some", "None", "Ok", "Err", "Box", "Vec", "String", "self", "Self", "println",
        "print", "format", "vec", "panic", "assert", "assert_eq", "assert_ne", "write", "writeln",
        // python
        "def", "class", "import", "lambda", "pass", "raise", "try", "except", "with", "yield",
        "not", "and", "or", "is", "elif", "del", "super", "isinstance", "range", "len", "str",
        "int", "float", "list", "dict", "set", "tuple", "enumerate", "zip",
        // javascript / typescript
        "function", "new", "typeof", "instanceof", "switch", "catch", "throw", "this", "export",
        "default", "require", "console", "constructor",
        // go
        "func", "package", "go", "defer", "select", "chan", "map", "interface", "make", "cap",
        "append", "copy", "delete",
    ]
    .into_iter()
    .collect();
}

/// Extracted metadata for one chunk
#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub symbol: String,
    pub signature: Option<String>,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub calls: Vec<String>,
    pub doc_comment: Option<String>,
    pub intent: Option<String>,
    pub tags: Vec<String>,
    pub important_variables: Vec<String>,
}

/// Extract metadata from chunk text. `fallback_symbol` is used when no
/// declaration name can be found (merged members, statement slices, files).
pub fn extract(text: &str, lang: Option<Language>, fallback_symbol: &str) -> ExtractedMetadata {
    let symbol = extract_symbol(text, lang).unwrap_or_else(|| fallback_symbol.to_string());
    let signature = extract_signature(text);
    let parameters = signature
        .as_deref()
        .map(extract_parameters)
        .unwrap_or_default();
    let return_type = signature.as_deref().and_then(extract_return_type);
    let calls = extract_calls(text, &symbol);
    let doc_comment = extract_doc_comment(text);
    let intent = doc_comment.as_deref().and_then(derive_intent);
    let tags = derive_tags(text, lang, &symbol);
    let important_variables = extract_variables(text);

    ExtractedMetadata {
        symbol,
        signature,
        parameters,
        return_type,
        calls,
        doc_comment,
        intent,
        tags,
        important_variables,
    }
}

fn extract_symbol(text: &str, lang: Option<Language>) -> Option<String> {
    let capture = |re: &Regex| re.captures(text).map(|c| c[1].to_string());

    match lang {
        Some(Language::Rust) => capture(&RUST_FN)
            .or_else(|| capture(&RUST_TYPE))
            .or_else(|| capture(&RUST_IMPL)),
        Some(Language::Python) => capture(&PY_DEF).or_else(|| capture(&PY_CLASS)),
        Some(Language::JavaScript) | Some(Language::TypeScript) | Some(Language::TypeScriptTsx) => {
            capture(&JS_FN)
                .or_else(|| capture(&JS_CLASS))
                .or_else(|| capture(&JS_CONST_FN))
                .or_else(|| capture(&JS_METHOD))
        }
        Some(Language::Go) => capture(&GO_FUNC),
        None => None,
    }
}

/// First declaration line, trimmed at the opening brace or trailing colon
fn extract_signature(text: &str) -> Option<String> {
    let line = text.lines().find(|line| {
        let t = line.trim_start();
        !t.is_empty() && !is_comment_line(t) && !t.starts_with('@') && !t.starts_with("#[")
    })?;

    let mut sig = line.trim();
    if let Some(pos) = sig.find('{') {
        sig = sig[..pos].trim_end();
    }
    let sig = sig.trim_end_matches(':').trim_end();
    if sig.is_empty() {
        None
    } else {
        Some(sig.to_string())
    }
}

fn extract_parameters(signature: &str) -> Vec<String> {
    let Some(caps) = PARAMS.captures(signature) else {
        return Vec::new();
    };
    caps[1]
        .split(',')
        .filter_map(|param| {
            let param = param.trim();
            if param.is_empty() {
                return None;
            }
            // "name: Type", "name Type" (go), "*name", "name=default"
            let name = param
                .split([':', '='])
                .next()?
                .trim()
                .trim_start_matches(['&', '*', ' '])
                .split_whitespace()
                .find(|w| !matches!(*w, "mut" | "self" | "&self" | "&mut"))?
                .trim_start_matches(['&', '*']);
            if name.is_empty() || name == "self" {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

fn extract_return_type(signature: &str) -> Option<String> {
    if let Some(caps) = RETURN_ARROW.captures(signature) {
        return Some(caps[1].trim().to_string());
    }
    // typescript style "): Type"
    if let Some(pos) = signature.rfind("):") {
        let ret = signature[pos + 2..].trim();
        if !ret.is_empty() {
            return Some(ret.to_string());
        }
    }
    None
}

/// Raw outgoing call names in source order, deduplicated and capped
fn extract_calls(text: &str, own_symbol: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut calls = Vec::new();
    for caps in CALL_SITE.captures_iter(text) {
        let name = &caps[1];
        if name == own_symbol || CALL_STOPLIST.contains(name) {
            continue;
        }
        if seen.insert(name.to_string()) {
            calls.push(name.to_string());
            if calls.len() >= MAX_CALLS {
                break;
            }
        }
    }
    calls
}

fn extract_doc_comment(text: &str) -> Option<String> {
    let mut doc_lines = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if is_comment_line(trimmed) {
            doc_lines.push(trimmed);
        } else if !trimmed.is_empty() {
            break;
        }
    }
    if doc_lines.is_empty() {
        // python docstring right under the def line
        let mut lines = text.lines();
        lines.next();
        if let Some(second) = lines.next() {
            let t = second.trim();
            if t.starts_with("\"\"\"") || t.starts_with("'''") {
                return Some(t.trim_matches(['"', '\'']).trim().to_string());
            }
        }
        return None;
    }
    Some(doc_lines.join("\n"))
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//")
        || line.starts_with('#') && !line.starts_with("#[")
        || line.starts_with("/*")
        || line.starts_with('*')
        || line.starts_with("\"\"\"")
        || line.starts_with("'''")
}

/// First meaningful doc line, stripped of markers and lowercased
fn derive_intent(doc: &str) -> Option<String> {
    doc.lines()
        .map(|line| {
            line.trim_start_matches(['/', '!', '#', '*', ' ', '"', '\''])
                .trim()
        })
        .find(|line| !line.is_empty())
        .map(|line| line.to_lowercase())
}

fn derive_tags(text: &str, lang: Option<Language>, symbol: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(lang) = lang {
        tags.push(lang.as_str().to_string());
    }
    if text.contains("async ") {
        tags.push("async".to_string());
    }
    if symbol.starts_with("test_") || text.contains("#[test]") || text.contains("#[tokio::test]") {
        tags.push("test".to_string());
    }
    if text.contains("#[deprecated") || text.contains("@deprecated") {
        tags.push("deprecated".to_string());
    }
    tags
}

fn extract_variables(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut vars = Vec::new();
    for caps in LET_BINDING.captures_iter(text) {
        let name = caps[1].to_string();
        if name.len() > 1 && seen.insert(name.clone()) {
            vars.push(name);
            if vars.len() >= MAX_VARIABLES {
                break;
            }
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_function_metadata() {
        let text = r#"/// Parses the configuration file at `path`.
pub async fn parse_config_file(path: &str, strict: bool) -> Result<Config> {
    let raw = read_to_string(path)?;
    let parsed = toml_decode(&raw)?;
    validate(parsed)
}"#;
        let meta = extract(text, Some(Language::Rust), "fallback");
        assert_eq!(meta.symbol, "parse_config_file");
        assert_eq!(meta.parameters, vec!["path", "strict"]);
        assert_eq!(meta.return_type.as_deref(), Some("Result<Config>"));
        assert!(meta.calls.contains(&"read_to_string".to_string()));
        assert!(meta.calls.contains(&"toml_decode".to_string()));
        assert!(meta.calls.contains(&"validate".to_string()));
        assert_eq!(
            meta.intent.as_deref(),
            Some("parses the configuration file at `path`.")
        );
        assert!(meta.tags.contains(&"rust".to_string()));
        assert!(meta.tags.contains(&"async".to_string()));
        assert!(meta.important_variables.contains(&"raw".to_string()));
    }

    #[test]
    fn test_python_metadata() {
        let text = r#"def send_email(recipient, subject="hi"):
    """Send a notification email."""
    message = build_message(recipient, subject)
    smtp_deliver(message)"#;
        let meta = extract(text, Some(Language::Python), "fallback");
        assert_eq!(meta.symbol, "send_email");
        assert_eq!(meta.parameters, vec!["recipient", "subject"]);
        assert!(meta.calls.contains(&"build_message".to_string()));
        assert!(meta.calls.contains(&"smtp_deliver".to_string()));
        assert_eq!(meta.intent.as_deref(), Some("send a notification email."));
    }

    #[test]
    fn test_typescript_class_metadata() {
        let text = "export class PaymentController {\n  process(order: Order): Receipt {\n    return chargeCard(order);\n  }\n}";
        let meta = extract(text, Some(Language::TypeScript), "fallback");
        assert_eq!(meta.symbol, "PaymentController");
        assert!(meta.calls.contains(&"chargeCard".to_string()));
    }

    #[test]
    fn test_go_metadata() {
        let text = "func (s *Server) HandleRequest(w http.ResponseWriter, r *http.Request) {\n\tdispatch(w, r)\n}";
        let meta = extract(text, Some(Language::Go), "fallback");
        assert_eq!(meta.symbol, "HandleRequest");
        assert!(meta.calls.contains(&"dispatch".to_string()));
    }

    #[test]
    fn test_fallback_symbol_used() {
        let meta = extract("plain text with no declarations", None, "README.md#0");
        assert_eq!(meta.symbol, "README.md#0");
        assert!(meta.intent.is_none());
    }

    #[test]
    fn test_keywords_not_treated_as_calls() {
        let text = "fn f() {\n    if check() {\n        while ready() { step(); }\n    }\n}";
        let meta = extract(text, Some(Language::Rust), "x");
        assert!(!meta.calls.contains(&"if".to_string()));
        assert!(!meta.calls.contains(&"while".to_string()));
        assert!(meta.calls.contains(&"check".to_string()));
        assert!(meta.calls.contains(&"ready".to_string()));
        assert!(meta.calls.contains(&"step".to_string()));
    }

    #[test]
    fn test_own_name_excluded_from_calls() {
        let text = "fn fib(n: u64) -> u64 {\n    if n < 2 { n } else { fib(n - 1) + fib(n - 2) }\n}";
        let meta = extract(text, Some(Language::Rust), "x");
        assert_eq!(meta.symbol, "fib");
        assert!(!meta.calls.contains(&"fib".to_string()));
    }
}
