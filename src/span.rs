//! Source location tracking
//!
//! Spans are used to track where tokens and tree nodes came from in the stylesheet.
//! This is essential for error reporting: every fatal expansion error points at the
//! at-rule that caused it.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// A position in the source code (line and column, both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span representing a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    /// Start position (byte offset)
    pub start: usize,
    /// End position (byte offset, exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Get the length of the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Merge two spans into one that covers both
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Get the source text for this span
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Where a tree node came from: the input file (if any) and its start position.
///
/// Nodes produced by a mixin inherit the location of the invocation that produced
/// them, so errors raised while expanding nested mixins still point at user code.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct SourceLocation {
    /// The stylesheet file, `None` for inline input
    pub file: Option<Arc<PathBuf>>,
    /// Start position of the node
    pub start: Position,
    /// Byte range of the node's first token
    pub span: Span,
}

impl SourceLocation {
    pub fn new(file: Option<Arc<PathBuf>>, start: Position, span: Span) -> Self {
        Self { file, start, span }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}", file.display(), self.start),
            None => write!(f, "<css input>:{}", self.start),
        }
    }
}

/// Line information cache for span-to-position conversion
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of each line start
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Create a new line index from source text
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-indexed position.
    ///
    /// Columns count characters, not bytes.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };
        let line_start = self.line_starts[line];
        let end = offset.min(text.len());
        let column = text
            .get(line_start..end)
            .map(|s| s.chars().count())
            .unwrap_or(end - line_start);

        Position::new(line as u32 + 1, column as u32 + 1)
    }
}
