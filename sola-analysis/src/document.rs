//! Parsed view over a [`TextBuffer`].
//!
//! The tree and the symbol table are derived lazily: edits only mark the document dirty,
//! and the next read reparses. Both are dropped together so a stale symbol table can
//! never outlive the tree it came from.

use crate::buffer::TextBuffer;
use crate::symbols::SymbolTable;
use lsp_types::Url;
use sola_syntax::{ParseError, Position, Range, SourceParser, Tree};
use std::path::PathBuf;
use std::sync::Arc;

/// Documents larger than this are not parsed at all.
pub const MAX_PARSE_BYTES: usize = 500 * 1024;

pub const TOO_LARGE_MESSAGE: &str = "document too large to parse";

/// An immutable, cheaply clonable view of a document at one revision.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub uri: Url,
    pub buffer: Arc<TextBuffer>,
    pub tree: Option<Arc<Tree>>,
    pub symbols: Option<Arc<SymbolTable>>,
    pub parse_errors: Arc<[ParseError]>,
}

impl DocumentSnapshot {
    /// Parses `text` in one go. Used for files that are not open in the editor.
    pub fn from_text(uri: Url, text: &str, parser: &dyn SourceParser) -> Self {
        let mut document = ParsedDocument::new(uri, text, 0);
        document.snapshot(parser)
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn version(&self) -> i32 {
        self.buffer.version()
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.uri.to_file_path().ok()
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_deref()
    }

    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_deref()
    }
}

#[derive(Debug)]
pub struct ParsedDocument {
    uri: Url,
    buffer: Arc<TextBuffer>,
    tree: Option<Arc<Tree>>,
    symbols: Option<Arc<SymbolTable>>,
    parse_errors: Arc<[ParseError]>,
    dirty: bool,
}

impl ParsedDocument {
    pub fn new(uri: Url, text: &str, version: i32) -> Self {
        Self {
            uri,
            buffer: Arc::new(TextBuffer::new(text, version)),
            tree: None,
            symbols: None,
            parse_errors: Arc::from(Vec::new()),
            dirty: true,
        }
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn version(&self) -> i32 {
        self.buffer.version()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_version(&mut self, version: i32) {
        Arc::make_mut(&mut self.buffer).set_version(version);
    }

    pub fn apply_change(&mut self, range: Option<Range>, range_length: Option<u32>, text: &str) {
        Arc::make_mut(&mut self.buffer).replace_range(range, range_length, text);
        self.invalidate();
    }

    pub fn replace_text(&mut self, text: &str) {
        Arc::make_mut(&mut self.buffer).set_text(text);
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.dirty = true;
        self.tree = None;
        self.symbols = None;
    }

    /// Reparses if an edit happened since the last parse.
    pub fn ensure_parsed(&mut self, parser: &dyn SourceParser) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        if self.buffer.len() > MAX_PARSE_BYTES {
            tracing::debug!(uri = %self.uri, bytes = self.buffer.len(), "skipping parse of oversized document");
            self.tree = None;
            self.symbols = None;
            self.parse_errors = Arc::from(vec![ParseError::new(
                TOO_LARGE_MESSAGE,
                Range::empty(Position::start()),
            )]);
            return;
        }

        let filename = self
            .uri
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string();
        let (tree, errors) = parser.parse(self.buffer.text(), &filename);
        self.symbols = Some(Arc::new(SymbolTable::build(&tree)));
        self.tree = Some(Arc::new(tree));
        self.parse_errors = Arc::from(errors);
    }

    pub fn tree(&mut self, parser: &dyn SourceParser) -> Option<Arc<Tree>> {
        self.ensure_parsed(parser);
        self.tree.clone()
    }

    pub fn symbols(&mut self, parser: &dyn SourceParser) -> Option<Arc<SymbolTable>> {
        self.ensure_parsed(parser);
        self.symbols.clone()
    }

    pub fn parse_errors(&mut self, parser: &dyn SourceParser) -> Arc<[ParseError]> {
        self.ensure_parsed(parser);
        self.parse_errors.clone()
    }

    pub fn snapshot(&mut self, parser: &dyn SourceParser) -> DocumentSnapshot {
        self.ensure_parsed(parser);
        DocumentSnapshot {
            uri: self.uri.clone(),
            buffer: self.buffer.clone(),
            tree: self.tree.clone(),
            symbols: self.symbols.clone(),
            parse_errors: self.parse_errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sola_syntax::SolaParser;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingParser {
        calls: AtomicUsize,
    }

    impl SourceParser for CountingParser {
        fn parse(&self, text: &str, _filename: &str) -> (Tree, Vec<ParseError>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            sola_syntax::parse(text)
        }
    }

    fn uri() -> Url {
        Url::parse("file:///sample.sola").unwrap()
    }

    #[test]
    fn parses_lazily_and_only_once_per_edit() {
        let parser = CountingParser::default();
        let mut document = ParsedDocument::new(uri(), "class A {}", 1);
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);

        let tree = document.tree(&parser).expect("tree");
        assert!(tree.find_class("A").is_some());
        let _ = document.symbols(&parser);
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);

        document.apply_change(None, None, "class B {}");
        assert!(document.is_dirty());
        let symbols = document.symbols(&parser).expect("symbols");
        assert!(symbols.declares("B"));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn oversized_documents_are_not_parsed() {
        let parser = CountingParser::default();
        let text = "a".repeat(MAX_PARSE_BYTES + 1);
        let mut document = ParsedDocument::new(uri(), &text, 1);
        let snapshot = document.snapshot(&parser);
        assert!(snapshot.tree.is_none());
        assert!(snapshot.symbols.is_none());
        assert_eq!(snapshot.parse_errors.len(), 1);
        assert_eq!(snapshot.parse_errors[0].message, TOO_LARGE_MESSAGE);
        assert_eq!(snapshot.parse_errors[0].range.start, Position::start());
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_edits() {
        let mut document = ParsedDocument::new(uri(), "$x := 1", 1);
        let before = document.snapshot(&SolaParser);
        document.apply_change(
            Some(Range::new(Position::new(1, 7), Position::new(1, 8))),
            Some(1),
            "2",
        );
        document.set_version(2);
        let after = document.snapshot(&SolaParser);
        assert_eq!(before.text(), "$x := 1");
        assert_eq!(after.text(), "$x := 2");
        assert_eq!(after.version(), 2);
    }
}
