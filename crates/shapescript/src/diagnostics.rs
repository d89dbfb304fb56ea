//! Structured errors: a closed set of categories, each carrying a message,
//! an optional hint, an optional single-token suggestion, and a source
//! range — plus the Levenshtein distance machinery used to produce
//! suggestions for misspelled symbols and members.
//!
//! Mirrors the teacher crate's convention of a hand-written `Display` impl
//! over a closed error enum rather than reaching for `thiserror`.

use std::fmt;

use crate::source_range::{self, SourceRange};

/// Lexer-level error categories (spec §4.B/§4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerErrorKind {
    InvalidNumber,
    UnexpectedToken { found: String },
    UnterminatedString,
    InvalidEscapeSequence { escape: String },
}

/// Parser-level error categories (spec §4.D/§4.E).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserErrorKind {
    UnexpectedToken { found: String, expected: Option<String> },
    Custom { message: String },
}

/// Runtime error categories (spec §4.I/§4.J).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    UnknownSymbol { name: String },
    UnknownMember { name: String, of: String },
    TypeMismatch { context: String, index: Option<usize>, expected: String, got: String },
    MissingArgument { command: String, index: usize, expected: String },
    UnexpectedArgument { command: String, max: usize },
    AssertionFailure { message: String },
    FileNotFound { path: String },
    FileAccessRestricted { path: String },
    FileTypeMismatch { path: String, expected: String },
    FileParsingError { path: String, message: String },
    ImportError { path: String, message: String },
    UnusedValue { of: String },
    UnknownFont { name: String },
}

/// The closed top-level error category set from spec §4.J.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Lexer(LexerErrorKind),
    Parser(ParserErrorKind),
    Runtime(RuntimeErrorKind),
}

/// A single structured diagnostic.
///
/// `message` never ends with a period; `hint`, when present, is a full
/// sentence that does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub range: SourceRange,
    pub hint: Option<String>,
    pub suggestion: Option<String>,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, range: SourceRange) -> Self {
        Self {
            kind,
            range,
            hint: None,
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// The short, period-free message describing what went wrong.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.kind {
            ErrorKind::Lexer(k) => match k {
                LexerErrorKind::InvalidNumber => "Invalid number literal".to_owned(),
                LexerErrorKind::UnexpectedToken { found } => format!("Unexpected token '{found}'"),
                LexerErrorKind::UnterminatedString => "Unterminated string literal".to_owned(),
                LexerErrorKind::InvalidEscapeSequence { escape } => format!("Invalid escape sequence '{escape}'"),
            },
            ErrorKind::Parser(k) => match k {
                ParserErrorKind::UnexpectedToken { found, expected: Some(exp) } => {
                    format!("Unexpected token '{found}', expected {exp}")
                }
                ParserErrorKind::UnexpectedToken { found, expected: None } => format!("Unexpected token '{found}'"),
                ParserErrorKind::Custom { message } => message.clone(),
            },
            ErrorKind::Runtime(k) => match k {
                RuntimeErrorKind::UnknownSymbol { name } => format!("Unknown symbol '{name}'"),
                RuntimeErrorKind::UnknownMember { name, of } => format!("Unknown member property '{name}' of {of}"),
                RuntimeErrorKind::TypeMismatch { context, index: Some(i), expected, got } => {
                    format!("Type mismatch in argument {i} of {context}: expected {expected}, got {got}")
                }
                RuntimeErrorKind::TypeMismatch { context, index: None, expected, got } => {
                    format!("Type mismatch in {context}: expected {expected}, got {got}")
                }
                RuntimeErrorKind::MissingArgument { command, index, expected } => {
                    format!("Missing argument {index} of type {expected} in call to '{command}'")
                }
                RuntimeErrorKind::UnexpectedArgument { command, max } => {
                    format!("Unexpected argument to '{command}', expected at most {max}")
                }
                RuntimeErrorKind::AssertionFailure { message } => message.clone(),
                RuntimeErrorKind::FileNotFound { path } => format!("File not found '{path}'"),
                RuntimeErrorKind::FileAccessRestricted { path } => format!("Unable to access file '{path}'"),
                RuntimeErrorKind::FileTypeMismatch { path, expected } => {
                    format!("File '{path}' is not a recognized {expected} file")
                }
                RuntimeErrorKind::FileParsingError { path, message } => format!("Error in '{path}': {message}"),
                RuntimeErrorKind::ImportError { path, message } => format!("Error importing '{path}': {message}"),
                RuntimeErrorKind::UnusedValue { of } => format!("Unused value of type {of}"),
                RuntimeErrorKind::UnknownFont { name } => format!("Unknown font '{name}'"),
            },
        }
    }

    /// Renders the full diagnostic: message, a line/column pointer, a
    /// caret-highlighted snippet, and the optional hint/suggestion.
    #[must_use]
    pub fn render(&self, source: &str) -> String {
        let loc = source_range::line_and_column(source, self.range.start);
        let line = source_range::line_range(source, self.range.start, false);
        let snippet = line.text(source);
        let caret_col = (self.range.start - line.start) as usize;
        let caret_len = if self.range.is_empty() {
            1
        } else {
            (self.range.len() as usize).min(snippet.len().saturating_sub(caret_col).max(1))
        };
        let mut out = format!(
            "{message} at {line}:{column}\n{snippet}\n{pad}{carets}",
            message = self.message(),
            line = loc.line + 1,
            column = loc.column + 1,
            snippet = snippet,
            pad = " ".repeat(caret_col),
            carets = "^".repeat(caret_len),
        );
        if let Some(suggestion) = &self.suggestion {
            out.push_str(&format!("\nDid you mean '{suggestion}'?"));
        }
        if let Some(hint) = &self.hint {
            out.push('\n');
            out.push_str(hint);
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for Error {}

/// Classic dynamic-programming Levenshtein distance, case-sensitive.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (n, m) = (a.len(), b.len());
    if n == 0 {
        return m;
    }
    if m == 0 {
        return n;
    }
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// Common alias pairs recognized regardless of edit distance: a typo that a
/// user coming from a related language or earlier ShapeScript syntax is
/// likely to type.
const ALIASES: &[(&str, &str)] = &[
    ("colour", "color"),
    ("and", "&&"),
    ("or", "||"),
    ("=", "=="),
    (":=", "="),
    ("<>", "!="),
    ("not", "!"),
];

/// The Levenshtein-closest name from `candidates`, provided the distance is
/// at most `ceil(len(name)/2)`, or an alias-table hit regardless of distance.
#[must_use]
pub fn suggest<'a>(name: &str, candidates: impl IntoIterator<Item = &'a str>) -> Option<String> {
    for (from, to) in ALIASES {
        if *from == name {
            return Some((*to).to_owned());
        }
    }
    let threshold = name.chars().count().div_ceil(2);
    let mut best: Option<(usize, &str)> = None;
    for candidate in candidates {
        let d = levenshtein(name, candidate);
        if d <= threshold && best.is_none_or(|(best_d, _)| d < best_d) {
            best = Some((d, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levenshtein_matches_spec_examples() {
        assert_eq!(levenshtein("foo", "foob"), 1);
        assert_eq!(levenshtein("FOO", "foo"), 3);
        assert_eq!(levenshtein("", "foo"), 3);
    }

    #[test]
    fn suggest_picks_closest_within_threshold() {
        let candidates = ["color", "position", "size"];
        assert_eq!(suggest("colr", candidates), Some("color".to_owned()));
        assert_eq!(suggest("zzzzzzzzzz", candidates), None);
    }

    #[test]
    fn suggest_uses_alias_table() {
        assert_eq!(suggest("colour", ["color"]), Some("color".to_owned()));
    }
}
