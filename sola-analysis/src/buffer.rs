//! The editable text of an open document.
//!
//! Line endings are normalised to `\n` on the way in, so every offset computation only
//! has to deal with a single separator. Positions use the syntax tree's 1-based
//! convention; columns count characters.

use sola_syntax::{Position, Range};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
    line_starts: Vec<usize>,
    version: i32,
}

/// A word found under a cursor together with where it sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub range: Range,
}

impl Word {
    pub fn is_variable(&self) -> bool {
        self.text.starts_with('$')
    }
}

/// Characters that make up identifiers and variables.
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Rewrites `\r\n` and lone `\r` to `\n`.
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        text.bytes()
            .enumerate()
            .filter(|(_, byte)| *byte == b'\n')
            .map(|(idx, _)| idx + 1),
    );
    starts
}

impl TextBuffer {
    pub fn new(text: &str, version: i32) -> Self {
        let text = normalize_newlines(text).into_owned();
        let line_starts = compute_line_starts(&text);
        Self {
            text,
            line_starts,
            version,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The text of 1-based `line` without its newline.
    pub fn line(&self, line: u32) -> Option<&str> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        self.text.get(start..end)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Byte offset of `position`, clamped into the buffer.
    pub fn offset_at(&self, position: Position) -> usize {
        if position.line == 0 {
            return 0;
        }
        let idx = position.line as usize - 1;
        let Some(&start) = self.line_starts.get(idx) else {
            return self.text.len();
        };
        let line = self.line(position.line).unwrap_or("");
        let column = position.column.saturating_sub(1) as usize;
        let within = line
            .char_indices()
            .nth(column)
            .map(|(offset, _)| offset)
            .unwrap_or(line.len());
        start + within
    }

    /// Position of byte `offset`, clamped into the buffer.
    pub fn position_at(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self.text[start..offset].chars().count();
        Position::new(line as u32 + 1, column as u32 + 1)
    }

    pub fn end_position(&self) -> Position {
        self.position_at(self.text.len())
    }

    pub fn full_range(&self) -> Range {
        Range::new(Position::start(), self.end_position())
    }

    pub fn slice(&self, range: Range) -> &str {
        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        &self.text[start..end]
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = normalize_newlines(text).into_owned();
        self.line_starts = compute_line_starts(&self.text);
    }

    /// Applies one content change.
    ///
    /// A missing range replaces the whole buffer. So does the empty range at the very
    /// start of the file when `range_length` is zero: some clients send full-document
    /// syncs in that shape even after negotiating incremental sync.
    pub fn replace_range(&mut self, range: Option<Range>, range_length: Option<u32>, new_text: &str) {
        let Some(range) = range else {
            self.set_text(new_text);
            return;
        };
        let zero = Range::empty(Position::start());
        if range == zero && range_length == Some(0) {
            self.set_text(new_text);
            return;
        }

        let start = self.offset_at(range.start);
        let end = self.offset_at(range.end).max(start);
        let replacement = normalize_newlines(new_text);
        self.text.replace_range(start..end, &replacement);
        self.line_starts = compute_line_starts(&self.text);
    }

    /// The identifier or variable touching `position`, if any.
    ///
    /// A cursor placed directly after a word still selects it.
    pub fn word_at(&self, position: Position) -> Option<Word> {
        let line = self.line(position.line)?;
        let chars: Vec<char> = line.chars().collect();
        let cursor = (position.column.saturating_sub(1) as usize).min(chars.len());

        let mut start = cursor;
        while start > 0 && is_word_char(chars[start - 1]) {
            start -= 1;
        }
        let mut end = cursor;
        while end < chars.len() && is_word_char(chars[end]) {
            end += 1;
        }
        if start == end {
            return None;
        }

        // `$` only ever opens a variable; anything before an inner `$` belongs elsewhere.
        if let Some(dollar) = chars[start..end].iter().skip(1).position(|c| *c == '$') {
            let split = start + 1 + dollar;
            if cursor >= split {
                start = split;
            } else {
                end = split;
            }
        }

        let text: String = chars[start..end].iter().collect();
        if text == "$" {
            return None;
        }
        Some(Word {
            text,
            range: Range::new(
                Position::new(position.line, start as u32 + 1),
                Position::new(position.line, end as u32 + 1),
            ),
        })
    }

    /// Text of the line holding `position` up to (not including) the cursor.
    pub fn line_prefix(&self, position: Position) -> &str {
        let Some(line) = self.line(position.line) else {
            return "";
        };
        let column = position.column.saturating_sub(1) as usize;
        let cut = line
            .char_indices()
            .nth(column)
            .map(|(offset, _)| offset)
            .unwrap_or(line.len());
        &line[..cut]
    }

    /// Everything before `position`.
    pub fn prefix(&self, position: Position) -> &str {
        &self.text[..self.offset_at(position)]
    }
}
