//! Identifier rendering shared by the emitters
//!
//! Each emitter picks a casing per [`NameKind`] and escapes the result
//! against its language's reserved words.

use devbind_model::Name;

/// What an identifier names, which decides its casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Classes, structs, aggregates
    Type,
    /// Methods and free functions
    Function,
    /// Parameters and locals
    Parameter,
    /// Aggregate fields
    Field,
    /// Constants and IDs
    Constant,
    /// File and module names
    Module,
}

/// How a reserved word is made usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// `r#type`
    Raw,
    /// `type_`
    TrailingUnderscore,
}

pub const RUST_KEYWORDS: &[&str] = &[
    "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn", "for",
    "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return",
    "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe", "use", "where",
    "while", "async", "await", "dyn", "abstract", "become", "box", "do", "final", "macro",
    "override", "priv", "typeof", "unsized", "virtual", "yield",
];

pub const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield", "id", "type", "len", "data",
];

pub const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "inline", "int", "long", "register",
    "restrict", "return", "short", "signed", "sizeof", "static", "struct", "switch", "typedef",
    "union", "unsigned", "void", "volatile", "while", "bool", "device",
];

pub const JAVASCRIPT_KEYWORDS: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

pub fn is_keyword(ident: &str, keywords: &[&str]) -> bool {
    keywords.contains(&ident)
}

/// Escape `ident` if it collides with a reserved word.
pub fn escape(ident: String, keywords: &[&str], style: Escape) -> String {
    if !is_keyword(&ident, keywords) {
        return ident;
    }

    match style {
        // `self`, `Self`, `super` and `crate` cannot be raw identifiers.
        Escape::Raw if !matches!(ident.as_str(), "self" | "Self" | "super" | "crate") => {
            format!("r#{}", ident)
        }
        _ => format!("{}_", ident),
    }
}

/// Identifiers cannot start with a digit: `2D Fix` renders as `_2D_FIX`.
pub fn guard_leading_digit(ident: String) -> String {
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", ident)
    } else {
        ident
    }
}

/// Name of a constant group member, `FIX_2D_FIX` for group `Fix`.
pub fn constant_name(group: &Name, constant: &Name) -> String {
    format!("{}_{}", group.upper(), constant.upper())
}
