//! Rename and its prepare step.
//!
//! Renaming is textual, with the same boundary rules as find-references. Variables are
//! renamed inside the current document only; every other name is renamed across all open
//! documents.

use crate::document::DocumentSnapshot;
use crate::edits::{push_edit, SolaTextEdit, SolaWorkspaceEdit};
use crate::utils::word_occurrences;
use crate::workspace::Workspace;
use sola_syntax::lexer::{is_builtin_function, is_builtin_type, is_keyword};
use sola_syntax::{Position, Range};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenameError {
    #[error("nothing to rename at this position")]
    NoSymbol,
    #[error("`{0}` is a keyword and cannot be renamed")]
    Keyword(String),
    #[error("`{0}` is a built-in type and cannot be renamed")]
    BuiltinType(String),
    #[error("`{0}` is a built-in function and cannot be renamed")]
    BuiltinFunction(String),
    #[error("`{0}` is not a valid name")]
    InvalidName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRename {
    pub range: Range,
    /// The current text, `$` included for variables.
    pub placeholder: String,
}

pub fn prepare_rename(doc: &DocumentSnapshot, position: Position) -> Result<PreparedRename, RenameError> {
    let word = doc.buffer.word_at(position).ok_or(RenameError::NoSymbol)?;
    if word.is_variable() {
        if word.text == "$this" {
            return Err(RenameError::Keyword(word.text));
        }
    } else {
        check_renamable(&word.text)?;
    }
    Ok(PreparedRename {
        range: word.range,
        placeholder: word.text,
    })
}

fn check_renamable(name: &str) -> Result<(), RenameError> {
    if is_keyword(name) {
        Err(RenameError::Keyword(name.to_string()))
    } else if is_builtin_type(name) {
        Err(RenameError::BuiltinType(name.to_string()))
    } else if is_builtin_function(name) {
        Err(RenameError::BuiltinFunction(name.to_string()))
    } else {
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_alphabetic() || first == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// The text to write for `new_name`, given whether the renamed word is a variable.
///
/// A variable keeps its `$` whether or not the user typed it. Identifiers may not gain one.
fn normalize_new_name(new_name: &str, variable: bool) -> Result<String, RenameError> {
    let trimmed = new_name.trim();
    let invalid = || RenameError::InvalidName(new_name.to_string());
    if variable {
        let bare = trimmed.strip_prefix('$').unwrap_or(trimmed);
        if !is_identifier(bare) || bare == "this" {
            return Err(invalid());
        }
        Ok(format!("${bare}"))
    } else {
        if !is_identifier(trimmed) {
            return Err(invalid());
        }
        if is_keyword(trimmed) || is_builtin_type(trimmed) {
            return Err(invalid());
        }
        Ok(trimmed.to_string())
    }
}

pub fn rename(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
    new_name: &str,
) -> Result<SolaWorkspaceEdit, RenameError> {
    let prepared = prepare_rename(doc, position)?;
    let variable = prepared.placeholder.starts_with('$');
    let replacement = normalize_new_name(new_name, variable)?;

    let mut changes = SolaWorkspaceEdit::new();
    let mut rename_in = |target: &DocumentSnapshot| {
        for range in word_occurrences(target.text(), &prepared.placeholder) {
            push_edit(&mut changes, &target.uri, SolaTextEdit::replace(range, replacement.clone()));
        }
    };
    rename_in(doc);
    if !variable {
        for other in workspace.documents.iter().filter(|other| other.uri != doc.uri) {
            rename_in(other);
        }
    }
    tracing::debug!(
        from = %prepared.placeholder,
        to = %replacement,
        documents = changes.len(),
        "computed rename"
    );
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TextBuffer;
    use crate::test_support::snapshot;
    use proptest::prelude::*;

    #[test]
    fn renames_a_variable_in_the_current_document() {
        let docs = vec![
            snapshot("file:///r.sola", "$x := 1\nprint($x)"),
            snapshot("file:///other.sola", "$x := 2"),
        ];
        let changes = rename(&docs[0], Workspace::new(&docs, None), Position::new(1, 2), "$y").expect("rename");
        assert_eq!(changes.len(), 1);
        let edits = &changes[&docs[0].uri];
        assert_eq!(
            edits,
            &vec![
                SolaTextEdit::replace(Range::new(Position::new(1, 1), Position::new(1, 3)), "$y"),
                SolaTextEdit::replace(Range::new(Position::new(2, 7), Position::new(2, 9)), "$y"),
            ]
        );
    }

    /// Applies the edits for `doc` back to front and reparses.
    fn apply(doc: &DocumentSnapshot, changes: &SolaWorkspaceEdit) -> DocumentSnapshot {
        let mut buffer = TextBuffer::clone(&doc.buffer);
        let mut edits = changes.get(&doc.uri).cloned().unwrap_or_default();
        edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
        for edit in &edits {
            buffer.replace_range(Some(edit.range), None, &edit.new_text);
        }
        snapshot(doc.uri.as_str(), buffer.text())
    }

    /// Renames the word at `position` and prepares again where its first occurrence was.
    fn rename_then_prepare(source: &str, position: Position, new_name: &str) -> Option<String> {
        let docs = vec![snapshot("file:///r.sola", source)];
        let before = prepare_rename(&docs[0], position).ok()?;
        let changes = rename(&docs[0], Workspace::new(&docs, None), position, new_name).ok()?;
        let first = changes.get(&docs[0].uri)?.iter().map(|edit| edit.range.start).min()?;
        assert!(first <= before.range.start);
        let renamed = apply(&docs[0], &changes);
        prepare_rename(&renamed, first).ok().map(|prepared| prepared.placeholder)
    }

    #[test]
    fn prepare_after_rename_sees_the_new_name() {
        assert_eq!(
            rename_then_prepare("$x := 1\nprint($x)", Position::new(2, 8), "total"),
            Some("$total".to_string())
        );
        assert_eq!(
            rename_then_prepare("class Point {}\nprint(new Point())", Position::new(2, 12), "Vec2"),
            Some("Vec2".to_string())
        );
    }

    fn renamable(name: &str) -> bool {
        check_renamable(name).is_ok()
    }

    proptest! {
        #[test]
        fn variable_rename_round_trips(
            old in "[a-z_][a-z0-9_]{0,6}",
            new in "[a-z_][a-z0-9_]{0,6}",
        ) {
            prop_assume!(old != "this" && new != "this");
            let source = format!("${old} := 1\nprint(${old})");
            prop_assert_eq!(
                rename_then_prepare(&source, Position::new(2, 8), &new),
                Some(format!("${new}"))
            );
        }

        #[test]
        fn identifier_rename_round_trips(
            old in "[A-Z][A-Za-z0-9_]{0,6}",
            new in "[A-Za-z][A-Za-z0-9_]{0,6}",
        ) {
            prop_assume!(renamable(&old) && renamable(&new));
            let source = format!("class {old} {{}}\nprint(new {old}())");
            prop_assert_eq!(
                rename_then_prepare(&source, Position::new(1, 7), &new),
                Some(new.clone())
            );
        }
    }

    #[test]
    fn variable_names_gain_their_sigil() {
        let docs = vec![snapshot("file:///r.sola", "$count := 1\n$count += 1")];
        let changes = rename(&docs[0], Workspace::new(&docs, None), Position::new(2, 3), "total").expect("rename");
        assert!(changes[&docs[0].uri].iter().all(|edit| edit.new_text == "$total"));
        assert_eq!(changes[&docs[0].uri].len(), 2);
    }

    #[test]
    fn identifiers_are_renamed_in_every_open_document() {
        let docs = vec![
            snapshot("file:///a.sola", "class Point {}\n$count := 1"),
            snapshot("file:///b.sola", "$p := new Point()\n// Point is used here\nPointer()"),
        ];
        let changes = rename(&docs[0], Workspace::new(&docs, None), Position::new(1, 8), "Vec2").expect("rename");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[&docs[0].uri].len(), 1);
        let other: Vec<_> = changes[&docs[1].uri].iter().map(|edit| edit.range.start).collect();
        assert_eq!(other, vec![Position::new(1, 11), Position::new(2, 4)]);
    }

    #[test]
    fn reserved_words_cannot_be_renamed() {
        let doc = snapshot("file:///r.sola", "class A {}\n$n: int = len($s)\n$this");
        assert_eq!(
            prepare_rename(&doc, Position::new(1, 2)),
            Err(RenameError::Keyword("class".into()))
        );
        assert_eq!(
            prepare_rename(&doc, Position::new(2, 6)),
            Err(RenameError::BuiltinType("int".into()))
        );
        assert_eq!(
            prepare_rename(&doc, Position::new(2, 12)),
            Err(RenameError::BuiltinFunction("len".into()))
        );
        assert!(prepare_rename(&doc, Position::new(3, 2)).is_err());
        assert_eq!(prepare_rename(&doc, Position::new(1, 20)), Err(RenameError::NoSymbol));
    }

    #[test]
    fn prepare_reports_range_and_placeholder() {
        let doc = snapshot("file:///r.sola", "$x := 1\nprint($x)");
        let prepared = prepare_rename(&doc, Position::new(2, 8)).expect("prepare");
        assert_eq!(prepared.placeholder, "$x");
        assert_eq!(prepared.range, Range::new(Position::new(2, 7), Position::new(2, 9)));
    }

    #[test]
    fn invalid_new_names_are_rejected() {
        let docs = vec![snapshot("file:///r.sola", "class A {}\n$x := 1")];
        let workspace = Workspace::new(&docs, None);
        assert!(matches!(
            rename(&docs[0], workspace, Position::new(1, 7), "$B"),
            Err(RenameError::InvalidName(_))
        ));
        assert!(matches!(
            rename(&docs[0], workspace, Position::new(1, 7), "class"),
            Err(RenameError::InvalidName(_))
        ));
        assert!(matches!(
            rename(&docs[0], workspace, Position::new(2, 1), "1x"),
            Err(RenameError::InvalidName(_))
        ));
    }
}
