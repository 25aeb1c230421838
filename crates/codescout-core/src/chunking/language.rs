//! Language detection and per-language chunking rule tables

use crate::model::ChunkKind;
use std::path::Path;

/// Supported programming languages for AST chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    TypeScriptTsx,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::TypeScriptTsx => "tsx",
            Self::Go => "go",
        }
    }

    /// Detect language from file path extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    /// Detect language from file extension string
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "rs" => Some(Self::Rust),
            "py" | "pyi" => Some(Self::Python),
            "js" | "mjs" | "cjs" | "jsx" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::TypeScriptTsx),
            "go" => Some(Self::Go),
            _ => None,
        }
    }

    /// Chunking rule table for this language
    pub fn rules(&self) -> &'static LanguageRules {
        match self {
            Self::Rust => &RUST_RULES,
            Self::Python => &PYTHON_RULES,
            Self::JavaScript | Self::TypeScript | Self::TypeScriptTsx => &JS_RULES,
            Self::Go => &GO_RULES,
        }
    }
}

/// Declarative chunking rules: which node kinds are chunk-worthy, which
/// child kinds are valid subdivision points per parent kind, and which
/// wrapper kinds are transparently unwrapped (e.g. `export function f`).
pub struct LanguageRules {
    pub chunk_kinds: &'static [&'static str],
    pub subdivision: &'static [(&'static str, &'static [&'static str])],
    pub export_wrappers: &'static [&'static str],
}

impl LanguageRules {
    pub fn is_chunk_kind(&self, kind: &str) -> bool {
        self.chunk_kinds.contains(&kind)
    }

    pub fn is_export_wrapper(&self, kind: &str) -> bool {
        self.export_wrappers.contains(&kind)
    }

    /// Valid subdivision child kinds for a parent node kind
    pub fn subdivision_kinds(&self, parent_kind: &str) -> Option<&'static [&'static str]> {
        self.subdivision
            .iter()
            .find(|(parent, _)| *parent == parent_kind)
            .map(|(_, kinds)| *kinds)
    }
}

static RUST_RULES: LanguageRules = LanguageRules {
    chunk_kinds: &[
        "function_item",
        "impl_item",
        "struct_item",
        "enum_item",
        "trait_item",
        "mod_item",
        "macro_definition",
    ],
    subdivision: &[
        ("impl_item", &["function_item"]),
        ("trait_item", &["function_item", "function_signature_item"]),
        (
            "mod_item",
            &["function_item", "struct_item", "enum_item", "impl_item"],
        ),
    ],
    export_wrappers: &[],
};

static PYTHON_RULES: LanguageRules = LanguageRules {
    chunk_kinds: &["function_definition", "class_definition"],
    subdivision: &[(
        "class_definition",
        &["function_definition", "decorated_definition"],
    )],
    export_wrappers: &["decorated_definition"],
};

static JS_RULES: LanguageRules = LanguageRules {
    chunk_kinds: &[
        "function_declaration",
        "generator_function_declaration",
        "class_declaration",
        "method_definition",
        "interface_declaration",
        "enum_declaration",
        "type_alias_declaration",
    ],
    subdivision: &[("class_declaration", &["method_definition"])],
    export_wrappers: &["export_statement"],
};

static GO_RULES: LanguageRules = LanguageRules {
    chunk_kinds: &[
        "function_declaration",
        "method_declaration",
        "type_declaration",
    ],
    subdivision: &[],
    export_wrappers: &[],
};

/// Map an AST node kind to the retrieval unit kind
pub fn kind_for_node(node_kind: &str) -> ChunkKind {
    match node_kind {
        "class_definition" | "class_declaration" | "struct_item" | "enum_item" | "trait_item"
        | "impl_item" | "interface_declaration" | "type_declaration" | "mod_item" => {
            ChunkKind::Class
        }
        "method_definition" | "method_declaration" => ChunkKind::Method,
        _ => ChunkKind::Function,
    }
}

/// Check if a file path is supported for AST chunking
pub fn is_supported(path: &Path) -> bool {
    Language::from_path(path).is_some()
}
