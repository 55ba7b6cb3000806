//! Source positions and ranges.
//!
//! Positions inside the syntax tree are 1-based: the first character of a file sits at
//! line 1, column 1. Columns count Unicode scalar values, not bytes. Conversion to the
//! 0-based coordinates used on the protocol boundary happens in the server layer.

use std::fmt;

/// A 1-based line/column location in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// The first position of any file.
    pub const fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open `[start, end)` range of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// An empty range at `position`.
    pub const fn empty(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    /// True when `position` lies in `[start, end)`.
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// True when `position` lies in `[start, end]`; a cursor placed right after a word
    /// still counts as being on it.
    pub fn touches(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    /// True when `other` is fully inside `self`.
    pub fn encloses(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn merge(self, other: Range) -> Range {
        Range {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn is_multiline(&self) -> bool {
        self.end.line > self.start.line
    }

    /// Number of lines spanned plus a column-based tie-breaker, used to order enclosing
    /// nodes from innermost to outermost.
    pub fn extent(&self) -> (u32, u32) {
        let lines = self.end.line.saturating_sub(self.start.line);
        let columns = if lines == 0 {
            self.end.column.saturating_sub(self.start.column)
        } else {
            self.end.column
        };
        (lines, columns)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
