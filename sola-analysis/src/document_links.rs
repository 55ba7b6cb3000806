//! Clickable links: import paths and URLs written anywhere in the text.

use crate::document::DocumentSnapshot;
use crate::go_to_definition::resolve_use_target;
use crate::workspace::Workspace;
use lsp_types::Url;
use regex::Regex;
use sola_syntax::{Position, Range};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaDocumentLink {
    pub range: Range,
    pub target: Url,
    pub tooltip: Option<String>,
}

fn url_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"https?://[^\s"'<>`]+"#).ok())
        .as_ref()
}

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}'];

pub fn collect_document_links(doc: &DocumentSnapshot, workspace: Workspace<'_>) -> Vec<SolaDocumentLink> {
    let mut links = import_links(doc, workspace);
    links.extend(url_links(doc.text()));
    links.sort_by_key(|link| link.range.start);
    links
}

fn import_links(doc: &DocumentSnapshot, workspace: Workspace<'_>) -> Vec<SolaDocumentLink> {
    let Some(tree) = doc.tree() else {
        return Vec::new();
    };
    tree.uses()
        .filter_map(|decl| {
            let target = resolve_use_target(doc, workspace, decl)?;
            Some(SolaDocumentLink {
                range: decl.path_range,
                tooltip: Some(format!("Open {}", decl.path)),
                target,
            })
        })
        .collect()
}

fn url_links(text: &str) -> Vec<SolaDocumentLink> {
    let mut links = Vec::new();
    let Some(pattern) = url_pattern() else {
        return links;
    };
    for (line_idx, line) in text.split('\n').enumerate() {
        for found in pattern.find_iter(line) {
            let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            let Ok(target) = Url::parse(url) else {
                continue;
            };
            let line_no = line_idx as u32 + 1;
            let start = line[..found.start()].chars().count() as u32 + 1;
            let end = start + url.chars().count() as u32;
            links.push(SolaDocumentLink {
                range: Range::new(Position::new(line_no, start), Position::new(line_no, end)),
                target,
                tooltip: None,
            });
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    #[test]
    fn urls_drop_trailing_punctuation() {
        let links = url_links("// see https://example.com/docs.\n$u := \"http://a.test/x?y=1\"");
        let targets: Vec<_> = links.iter().map(|link| link.target.as_str()).collect();
        assert_eq!(targets, vec!["https://example.com/docs", "http://a.test/x?y=1"]);
        assert_eq!(
            links[0].range,
            Range::new(Position::new(1, 8), Position::new(1, 32))
        );
        assert_eq!(links[1].range.start, Position::new(2, 8));
    }

    #[test]
    fn file_imports_link_to_open_documents() {
        let docs = vec![
            snapshot("file:///p/main.sola", "use \"lib/util\"\nuse sola.Missing\n// https://sola.dev"),
            snapshot("file:///p/lib/util.sola", "function helper() {}"),
        ];
        let links = collect_document_links(&docs[0], Workspace::new(&docs, None));
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target.as_str(), "file:///p/lib/util.sola");
        assert_eq!(links[0].range.start.line, 1);
        assert_eq!(links[1].target.as_str(), "https://sola.dev/");
    }
}
