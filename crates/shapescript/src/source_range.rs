//! Half-open byte-index intervals into a source string, and the line/column
//! lookups diagnostics need to turn one into a caret-highlighted snippet.
//!
//! Lexing and parsing never branch on line or column — only the diagnostics
//! layer (see [`crate::diagnostics`]) calls into this module.

use std::ops::Range;

/// A half-open `[start, end)` byte index interval into a source string.
///
/// `start == end` is a valid, empty range (used for e.g. the `eof` token).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct SourceRange {
    pub start: u32,
    pub end: u32,
}

impl SourceRange {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// A zero-length range at `at`, used for synthetic/eof tokens.
    #[must_use]
    pub const fn empty_at(at: u32) -> Self {
        Self { start: at, end: at }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    /// The smallest range containing both `self` and `other`.
    #[must_use]
    pub fn to(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[must_use]
    pub fn as_std_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Slices `source` to the text this range covers.
    ///
    /// # Panics
    /// Panics if the range does not lie on UTF-8 boundaries within `source`.
    #[must_use]
    pub fn text<'a>(self, source: &'a str) -> &'a str {
        &source[self.as_std_range()]
    }
}

/// Zero-indexed line and column (in UTF-8 bytes, not codepoints or graphemes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineColumn {
    pub line: u32,
    pub column: u32,
}

fn is_line_break(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// Returns the 0-indexed line number containing byte index `ix`.
///
/// `\n`, `\r`, and `\r\n` are all recognized as line breaks; a `\r\n` pair
/// counts as a single break, not two.
#[must_use]
pub fn line_at(source: &str, ix: u32) -> u32 {
    let bytes = source.as_bytes();
    let ix = (ix as usize).min(bytes.len());
    let mut line = 0u32;
    let mut i = 0usize;
    while i < ix {
        if bytes[i] == b'\r' {
            line += 1;
            i += 1;
            if i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
        } else if bytes[i] == b'\n' {
            line += 1;
            i += 1;
        } else {
            i += 1;
        }
    }
    line
}

/// Returns the 0-indexed `(line, column)` of byte index `ix`.
#[must_use]
pub fn line_and_column(source: &str, ix: u32) -> LineColumn {
    let bytes = source.as_bytes();
    let ix = (ix as usize).min(bytes.len());
    let mut line = 0u32;
    let mut line_start = 0usize;
    let mut i = 0usize;
    while i < ix {
        if bytes[i] == b'\r' {
            i += 1;
            if i < bytes.len() && bytes[i] == b'\n' {
                i += 1;
            }
            line += 1;
            line_start = i;
        } else if bytes[i] == b'\n' {
            i += 1;
            line += 1;
            line_start = i;
        } else {
            i += 1;
        }
    }
    LineColumn {
        line,
        column: (ix - line_start) as u32,
    }
}

/// Returns the byte range of the line containing `ix`, not including the
/// line terminator.
///
/// When `include_indent` is `false`, leading whitespace (spaces and tabs)
/// is trimmed from the start of the returned range — used by diagnostics to
/// print a snippet without a wall of leading indentation.
#[must_use]
pub fn line_range(source: &str, ix: u32, include_indent: bool) -> SourceRange {
    let bytes = source.as_bytes();
    let ix = (ix as usize).min(bytes.len());
    let mut start = ix;
    while start > 0 && !is_line_break(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = ix;
    while end < bytes.len() && !is_line_break(bytes[end]) {
        end += 1;
    }
    if !include_indent {
        while start < end && (bytes[start] == b' ' || bytes[start] == b'\t') {
            start += 1;
        }
    }
    SourceRange::new(start as u32, end as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_and_column_handles_all_break_styles() {
        let src = "a\nbb\r\nccc\rd";
        assert_eq!(line_and_column(src, 0), LineColumn { line: 0, column: 0 });
        assert_eq!(line_and_column(src, 2), LineColumn { line: 1, column: 0 });
        assert_eq!(line_and_column(src, 5), LineColumn { line: 2, column: 0 });
        assert_eq!(line_and_column(src, 10), LineColumn { line: 3, column: 0 });
    }

    #[test]
    fn line_range_trims_indent_by_default() {
        let src = "  indented line\nnext";
        let r = line_range(src, 4, false);
        assert_eq!(r.text(src), "indented line");
        let r = line_range(src, 4, true);
        assert_eq!(r.text(src), "  indented line");
    }

    #[test]
    fn range_to_spans_both() {
        let a = SourceRange::new(2, 5);
        let b = SourceRange::new(8, 9);
        assert_eq!(a.to(b), SourceRange::new(2, 9));
    }
}
