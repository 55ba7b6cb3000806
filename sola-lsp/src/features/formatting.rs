//! Document formatting.
//!
//! The server talks to a [`Formatter`]; the built-in [`IndentFormatter`] only normalises
//! layout: indentation by brace depth, trailing whitespace, runs of blank lines and the
//! final newline. It never reorders or rewrites tokens.

use sola_analysis::edits::SolaTextEdit;
use sola_syntax::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    pub indent_size: u32,
    pub use_tabs: bool,
    pub max_blank_lines: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            indent_size: 4,
            use_tabs: false,
            max_blank_lines: 2,
        }
    }
}

impl FormatOptions {
    fn indent(&self, depth: usize) -> String {
        if self.use_tabs {
            "\t".repeat(depth)
        } else {
            " ".repeat(depth * self.indent_size as usize)
        }
    }
}

/// Inclusive 1-based line span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }
}

pub trait Formatter: Send + Sync {
    /// The formatted text, or `None` when the input cannot be formatted.
    fn format(&self, text: &str, filename: &str, options: &FormatOptions) -> Option<String>;

    /// Edits confined to `lines`. The default formats the whole text and keeps the changed
    /// lines inside the span, which only works when formatting preserved the line count.
    fn format_range(
        &self,
        text: &str,
        filename: &str,
        options: &FormatOptions,
        lines: LineRange,
    ) -> Option<Vec<SolaTextEdit>> {
        let formatted = self.format(text, filename, options)?;
        let formatted: Vec<&str> = formatted.trim_end_matches('\n').split('\n').collect();
        line_edits(text, &formatted, lines)
    }
}

/// Replaces the whole of `original` with `formatted`, or nothing when they match.
pub fn full_document_edit(original: &str, formatted: String) -> Vec<SolaTextEdit> {
    if formatted == original {
        return Vec::new();
    }
    vec![SolaTextEdit::replace(
        Range::new(Position::start(), end_position(original)),
        formatted,
    )]
}

fn end_position(text: &str) -> Position {
    let line = text.matches('\n').count() as u32 + 1;
    let last = text.rsplit('\n').next().unwrap_or("");
    Position::new(line, last.chars().count() as u32 + 1)
}

fn line_edits(original: &str, formatted: &[&str], lines: LineRange) -> Option<Vec<SolaTextEdit>> {
    let original: Vec<&str> = original.split('\n').collect();
    let comparable = original.len() == formatted.len()
        || (original.len() == formatted.len() + 1 && original.last() == Some(&""));
    if !comparable {
        return None;
    }
    Some(
        formatted
            .iter()
            .zip(&original)
            .enumerate()
            .map(|(idx, (new, old))| (idx as u32 + 1, new, old))
            .filter(|(line, new, old)| lines.contains(*line) && new != old)
            .map(|(line, new, old)| {
                let range = Range::new(
                    Position::new(line, 1),
                    Position::new(line, old.chars().count() as u32 + 1),
                );
                SolaTextEdit::replace(range, *new)
            })
            .collect(),
    )
}

/// Re-indents by brace depth.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndentFormatter;

impl IndentFormatter {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct Layout {
    depth: usize,
    in_block_comment: bool,
}

impl Layout {
    /// Lays out one line and advances the nesting state past it.
    fn line(&mut self, line: &str, options: &FormatOptions) -> String {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        if self.in_block_comment {
            let text = if trimmed.starts_with('*') {
                format!("{} {trimmed}", options.indent(self.depth))
            } else {
                line.trim_end().to_string()
            };
            self.scan(trimmed);
            return text;
        }
        let closers = trimmed
            .chars()
            .take_while(|c| matches!(c, '}' | ')' | ']'))
            .count();
        let indent = options.indent(self.depth.saturating_sub(closers));
        self.scan(trimmed);
        format!("{indent}{trimmed}")
    }

    fn scan(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut idx = 0;
        let mut quote: Option<char> = None;
        while idx < chars.len() {
            let c = chars[idx];
            let next = chars.get(idx + 1).copied();
            if self.in_block_comment {
                if c == '*' && next == Some('/') {
                    self.in_block_comment = false;
                    idx += 1;
                }
            } else if let Some(open) = quote {
                if c == '\\' {
                    idx += 1;
                } else if c == open {
                    quote = None;
                }
            } else {
                match (c, next) {
                    ('/', Some('/')) | ('#', _) => return,
                    ('/', Some('*')) => {
                        self.in_block_comment = true;
                        idx += 1;
                    }
                    ('"' | '\'', _) => quote = Some(c),
                    ('{' | '(' | '[', _) => self.depth += 1,
                    ('}' | ')' | ']', _) => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                }
            }
            idx += 1;
        }
    }
}

impl IndentFormatter {
    fn layout<'a>(&self, text: &'a str, options: &FormatOptions) -> impl Iterator<Item = String> + 'a {
        let options = *options;
        let mut layout = Layout::default();
        text.split('\n').map(move |line| layout.line(line, &options))
    }
}

impl Formatter for IndentFormatter {
    fn format(&self, text: &str, _filename: &str, options: &FormatOptions) -> Option<String> {
        let mut output = String::with_capacity(text.len());
        let mut blank_run = 0u32;
        for line in self.layout(text, options) {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > options.max_blank_lines {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            output.push_str(&line);
            output.push('\n');
        }
        let content = output.trim_end_matches('\n').trim_start_matches('\n');
        if content.is_empty() {
            return Some(String::new());
        }
        Some(format!("{content}\n"))
    }

    fn format_range(
        &self,
        text: &str,
        _filename: &str,
        options: &FormatOptions,
        lines: LineRange,
    ) -> Option<Vec<SolaTextEdit>> {
        let formatted: Vec<String> = self.layout(text, options).collect();
        let formatted: Vec<&str> = formatted.iter().map(String::as_str).collect();
        line_edits(text, &formatted, lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(text: &str) -> String {
        IndentFormatter
            .format(text, "test.sola", &FormatOptions::default())
            .expect("formattable")
    }

    #[test]
    fn reindents_by_brace_depth() {
        let source = "class A {\npublic function f() {\nif ($x) {\nreturn 1\n}\n}\n}";
        assert_eq!(
            format(source),
            "class A {\n    public function f() {\n        if ($x) {\n            return 1\n        }\n    }\n}\n"
        );
    }

    #[test]
    fn braces_inside_strings_and_comments_do_not_count() {
        let source = "function f() {\n$s := \"{\" // }\nreturn $s\n}";
        assert_eq!(
            format(source),
            "function f() {\n    $s := \"{\" // }\n    return $s\n}\n"
        );
    }

    #[test]
    fn aligns_block_comment_continuations() {
        let source = "class A {\n/**\n* Greets.\n*/\nfunction f() {}\n}";
        assert_eq!(
            format(source),
            "class A {\n    /**\n     * Greets.\n     */\n    function f() {}\n}\n"
        );
    }

    #[test]
    fn strips_trailing_whitespace_and_collapses_blank_lines() {
        let source = "$a := 1   \n\n\n\n\n$b := 2\n\n\n";
        assert_eq!(format(source), "$a := 1\n\n\n$b := 2\n");
        let tight = FormatOptions {
            max_blank_lines: 0,
            ..FormatOptions::default()
        };
        assert_eq!(
            IndentFormatter.format(source, "t.sola", &tight).as_deref(),
            Some("$a := 1\n$b := 2\n")
        );
    }

    #[test]
    fn honours_tabs() {
        let options = FormatOptions {
            use_tabs: true,
            ..FormatOptions::default()
        };
        assert_eq!(
            IndentFormatter.format("if ($a) {\nprint($a)\n}", "t.sola", &options).as_deref(),
            Some("if ($a) {\n\tprint($a)\n}\n")
        );
    }

    #[test]
    fn full_document_edit_is_empty_when_unchanged() {
        let source = "class A {\n    $x := 1\n}\n";
        assert!(full_document_edit(source, format(source)).is_empty());

        let edits = full_document_edit("class A {\n$x := 1\n}", format("class A {\n$x := 1\n}"));
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, Range::new(Position::new(1, 1), Position::new(3, 2)));
        assert_eq!(edits[0].new_text, "class A {\n    $x := 1\n}\n");
    }

    #[test]
    fn range_formatting_only_touches_lines_inside_the_range() {
        let source = "class A {\n$a := 1\n$b := 2\n\n\n\n$c := 3\n}";
        let edits = IndentFormatter
            .format_range(source, "t.sola", &FormatOptions::default(), LineRange { start: 3, end: 7 })
            .expect("edits");
        let lines: Vec<u32> = edits.iter().map(|edit| edit.range.start.line).collect();
        assert_eq!(lines, vec![3, 7]);
        assert_eq!(edits[0].new_text, "    $b := 2");
        assert_eq!(edits[0].range.end, Position::new(3, 8));
    }

    #[test]
    fn default_range_formatting_gives_up_when_line_count_changes() {
        struct Joiner;
        impl Formatter for Joiner {
            fn format(&self, text: &str, _: &str, _: &FormatOptions) -> Option<String> {
                Some(text.replace('\n', " "))
            }
        }
        let lines = LineRange { start: 1, end: 2 };
        assert!(Joiner
            .format_range("a\nb", "t.sola", &FormatOptions::default(), lines)
            .is_none());
    }
}
