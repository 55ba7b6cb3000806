//! Find-references and document highlights.
//!
//! References are lexical: every open buffer is scanned for the word with the boundary
//! rules of [`word_occurrences`], so matches inside comments and strings are reported
//! too. Highlights use the syntax tree when there is one, which lets them tell reads
//! from writes.

use crate::document::DocumentSnapshot;
use crate::go_to_definition::goto_definition;
use crate::utils::{enclosing_function, word_occurrences};
use crate::visitor::{walk_tree, FunctionRef, NameRef, Visitor};
use crate::workspace::{Location, Workspace};
use lsp_types::DocumentHighlightKind;
use sola_syntax::{Position, Range, Tree};

pub fn find_references(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
    include_declaration: bool,
) -> Vec<Location> {
    let Some(word) = doc.buffer.word_at(position) else {
        return Vec::new();
    };

    let mut locations: Vec<Location> = word_occurrences(doc.text(), &word.text)
        .into_iter()
        .map(|range| Location {
            uri: doc.uri.clone(),
            range,
        })
        .collect();
    if !word.is_variable() {
        for other in workspace.documents.iter().filter(|other| other.uri != doc.uri) {
            locations.extend(
                word_occurrences(other.text(), &word.text)
                    .into_iter()
                    .map(|range| Location {
                        uri: other.uri.clone(),
                        range,
                    }),
            );
        }
    }

    if !include_declaration {
        if let Some(declaration) = goto_definition(doc, workspace, position) {
            locations.retain(|location| *location != declaration);
        }
    }
    locations
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub range: Range,
    pub kind: DocumentHighlightKind,
}

pub fn document_highlights(doc: &DocumentSnapshot, position: Position) -> Vec<Highlight> {
    let Some(word) = doc.buffer.word_at(position) else {
        return Vec::new();
    };
    if let Some(tree) = doc.tree() {
        let highlights = tree_highlights(tree, &word.text, position);
        if !highlights.is_empty() {
            return highlights;
        }
    }
    word_occurrences(doc.text(), &word.text)
        .into_iter()
        .map(|range| Highlight {
            range,
            kind: DocumentHighlightKind::TEXT,
        })
        .collect()
}

struct HighlightCollector<'n> {
    name: &'n str,
    /// Variables are only highlighted inside the function the cursor is in.
    scope: Option<Range>,
    highlights: Vec<Highlight>,
}

impl<'a> Visitor<'a> for HighlightCollector<'_> {
    fn visit_name(&mut self, name: NameRef<'a>) {
        if !name.matches(self.name) {
            return;
        }
        if self
            .scope
            .is_some_and(|scope| !scope.encloses(&name.ident.range))
        {
            return;
        }
        self.highlights.push(Highlight {
            range: name.ident.range,
            kind: if name.is_write {
                DocumentHighlightKind::WRITE
            } else {
                DocumentHighlightKind::READ
            },
        });
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        self.scope
            .map_or(true, |scope| function.range().overlaps(&scope))
    }
}

fn tree_highlights(tree: &Tree, name: &str, position: Position) -> Vec<Highlight> {
    let scope = if name.starts_with('$') && name != "$this" {
        enclosing_function(tree, position).map(|(_, function)| function.range)
    } else {
        None
    };
    let mut collector = HighlightCollector {
        name,
        scope,
        highlights: Vec::new(),
    };
    walk_tree(tree, &mut collector);
    collector.highlights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    #[test]
    fn variable_references_stay_in_the_current_buffer() {
        let docs = vec![
            snapshot("file:///r.sola", "$x := 1\n$y := $x + 1\nprint($x)"),
            snapshot("file:///other.sola", "$x := 2"),
        ];
        let locations = find_references(
            &docs[0],
            Workspace::new(&docs, None),
            Position::new(1, 1),
            true,
        );
        let starts: Vec<_> = locations.iter().map(|l| l.range.start).collect();
        assert_eq!(
            starts,
            vec![Position::new(1, 1), Position::new(2, 7), Position::new(3, 7)]
        );
        assert!(locations
            .iter()
            .all(|l| l.range.end.column - l.range.start.column == 2));
    }

    #[test]
    fn identifier_references_span_open_buffers() {
        let docs = vec![
            snapshot("file:///a.sola", "class A {}\n$a := new A()"),
            snapshot("file:///b.sola", "class B extends A {}"),
        ];
        let all = find_references(&docs[0], Workspace::new(&docs, None), Position::new(1, 7), true);
        assert_eq!(all.len(), 3);
        assert_eq!(all[2].uri.as_str(), "file:///b.sola");

        let without = find_references(&docs[0], Workspace::new(&docs, None), Position::new(1, 7), false);
        assert_eq!(without.len(), 2);
        assert!(without.iter().all(|l| l.range.start != Position::new(1, 7)));
    }

    #[test]
    fn highlights_distinguish_reads_and_writes() {
        let doc = snapshot(
            "file:///h.sola",
            "function f() {\n  $n := 1\n  $n = $n + 1\n}\nfunction g() { $n := 5 }",
        );
        let highlights = document_highlights(&doc, Position::new(2, 3));
        let kinds: Vec<_> = highlights.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DocumentHighlightKind::WRITE,
                DocumentHighlightKind::WRITE,
                DocumentHighlightKind::READ
            ]
        );
    }

    #[test]
    fn highlights_fall_back_to_text() {
        let doc = snapshot("file:///h.sola", "// todo: rename todo\n$x := 1");
        let highlights = document_highlights(&doc, Position::new(1, 5));
        assert_eq!(highlights.len(), 2);
        assert!(highlights
            .iter()
            .all(|h| h.kind == DocumentHighlightKind::TEXT));
    }
}
