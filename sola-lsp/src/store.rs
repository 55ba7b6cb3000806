//! Open documents.

use crate::convert::from_lsp_range;
use sola_analysis::document::{DocumentSnapshot, ParsedDocument};
use sola_syntax::SourceParser;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tower_lsp::lsp_types::{TextDocumentContentChangeEvent, Url};
use tracing::{debug, warn};

/// Upper bound on simultaneously open documents.
pub const DEFAULT_MAX_DOCUMENTS: usize = 1000;

pub struct DocumentStore {
    entries: RwLock<HashMap<Url, ParsedDocument>>,
    max_documents: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DOCUMENTS)
    }
}

impl DocumentStore {
    pub fn new(max_documents: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_documents,
        }
    }

    /// Stores a freshly opened document, replacing any previous copy. Returns false when
    /// the store is full.
    pub async fn open(&self, uri: Url, text: &str, version: i32) -> bool {
        let mut entries = self.entries.write().await;
        if !entries.contains_key(&uri) && entries.len() >= self.max_documents {
            warn!(%uri, limit = self.max_documents, "document store full, ignoring didOpen");
            return false;
        }
        debug!(%uri, version, "opened document");
        entries.insert(uri.clone(), ParsedDocument::new(uri, text, version));
        true
    }

    /// Applies change events in order. Unknown documents are ignored.
    pub async fn change(&self, uri: &Url, version: i32, changes: &[TextDocumentContentChangeEvent]) -> bool {
        let mut entries = self.entries.write().await;
        let Some(document) = entries.get_mut(uri) else {
            warn!(%uri, "change for a document that is not open");
            return false;
        };
        for change in changes {
            document.apply_change(change.range.map(from_lsp_range), change.range_length, &change.text);
        }
        document.set_version(version);
        debug!(%uri, version, events = changes.len(), "changed document");
        true
    }

    /// Replaces the text when the client included it on save.
    pub async fn save(&self, uri: &Url, text: Option<&str>) -> bool {
        let mut entries = self.entries.write().await;
        let Some(document) = entries.get_mut(uri) else {
            return false;
        };
        if let Some(text) = text {
            if text != document.text() {
                document.replace_text(text);
            }
        }
        true
    }

    pub async fn close(&self, uri: &Url) -> bool {
        let removed = self.entries.write().await.remove(uri).is_some();
        if removed {
            debug!(%uri, "closed document");
        }
        removed
    }

    pub async fn contains(&self, uri: &Url) -> bool {
        self.entries.read().await.contains_key(uri)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Parses if needed and returns a snapshot. Takes the write lock because parsing
    /// caches the tree on the document.
    pub async fn snapshot(&self, uri: &Url, parser: &dyn SourceParser) -> Option<DocumentSnapshot> {
        let mut entries = self.entries.write().await;
        entries.get_mut(uri).map(|document| document.snapshot(parser))
    }

    /// Snapshots of every open document, ordered by URI.
    pub async fn snapshots(&self, parser: &dyn SourceParser) -> Vec<DocumentSnapshot> {
        let mut entries = self.entries.write().await;
        let mut snapshots: Vec<DocumentSnapshot> = entries
            .values_mut()
            .map(|document| document.snapshot(parser))
            .collect();
        snapshots.sort_by(|a, b| a.uri.as_str().cmp(b.uri.as_str()));
        snapshots
    }

    pub async fn uris(&self) -> Vec<Url> {
        let mut uris: Vec<Url> = self.entries.read().await.keys().cloned().collect();
        uris.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        uris
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sola_syntax::SolaParser;
    use tower_lsp::lsp_types::{Position, Range};

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///w/{name}")).expect("uri")
    }

    fn edit(range: Option<Range>, range_length: Option<u32>, text: &str) -> TextDocumentContentChangeEvent {
        TextDocumentContentChangeEvent {
            range,
            range_length,
            text: text.to_string(),
        }
    }

    fn span(start: (u32, u32), end: (u32, u32)) -> Range {
        Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
    }

    #[tokio::test]
    async fn applies_changes_in_order_and_tracks_version() {
        let store = DocumentStore::default();
        let doc = uri("a.sola");
        assert!(store.open(doc.clone(), "$x := 1\nprint($x)", 1).await);
        let changes = [
            edit(Some(span((0, 6), (0, 7))), Some(1), "42"),
            edit(Some(span((1, 8), (1, 8))), Some(0), " + 1"),
        ];
        assert!(store.change(&doc, 3, &changes).await);

        let snapshot = store.snapshot(&doc, &SolaParser).await.expect("open");
        assert_eq!(snapshot.text(), "$x := 42\nprint($x + 1)");
        assert_eq!(snapshot.version(), 3);
        assert!(snapshot.tree().is_some());
    }

    #[tokio::test]
    async fn full_replacement_forms() {
        let store = DocumentStore::default();
        let doc = uri("a.sola");
        store.open(doc.clone(), "old", 1).await;
        store.change(&doc, 2, &[edit(None, None, "new")]).await;
        store
            .change(&doc, 3, &[edit(Some(span((0, 0), (0, 0))), Some(0), "newest")])
            .await;
        let snapshot = store.snapshot(&doc, &SolaParser).await.expect("open");
        assert_eq!(snapshot.text(), "newest");

        store
            .change(&doc, 4, &[edit(Some(span((0, 0), (0, 0))), None, ">")])
            .await;
        let snapshot = store.snapshot(&doc, &SolaParser).await.expect("open");
        assert_eq!(snapshot.text(), ">newest");
    }

    #[tokio::test]
    async fn save_with_text_and_close() {
        let store = DocumentStore::default();
        let doc = uri("a.sola");
        store.open(doc.clone(), "class A {}", 1).await;
        assert!(store.save(&doc, Some("class B {}")).await);
        assert_eq!(
            store.snapshot(&doc, &SolaParser).await.map(|s| s.text().to_string()),
            Some("class B {}".to_string())
        );
        assert!(store.close(&doc).await);
        assert!(!store.close(&doc).await);
        assert!(store.snapshot(&doc, &SolaParser).await.is_none());
        assert!(!store.change(&doc, 2, &[edit(None, None, "x")]).await);
    }

    #[tokio::test]
    async fn refuses_documents_beyond_capacity() {
        let store = DocumentStore::new(2);
        assert!(store.open(uri("a.sola"), "", 1).await);
        assert!(store.open(uri("b.sola"), "", 1).await);
        assert!(!store.open(uri("c.sola"), "", 1).await);
        assert!(store.open(uri("a.sola"), "reopened", 2).await);
        assert_eq!(store.len().await, 2);
        let uris: Vec<String> = store.uris().await.iter().map(|u| u.to_string()).collect();
        assert_eq!(uris, vec!["file:///w/a.sola", "file:///w/b.sola"]);
        assert_eq!(store.snapshots(&SolaParser).await.len(), 2);
    }
}
