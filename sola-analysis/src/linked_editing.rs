//! Linked editing: typing over one occurrence of a variable edits the others in the same
//! scope.

use crate::document::DocumentSnapshot;
use crate::utils::{enclosing_function, for_each_function, word_occurrences};
use sola_syntax::{Position, Range};

/// What the editor may type while the ranges are linked.
pub const VARIABLE_WORD_PATTERN: &str = r"\$?[A-Za-z_][A-Za-z0-9_]*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaLinkedEditing {
    pub ranges: Vec<Range>,
    pub word_pattern: String,
}

/// The occurrences of the variable at `position` inside its function, or inside the top
/// level of the file when the cursor is outside any function.
pub fn linked_editing_ranges(doc: &DocumentSnapshot, position: Position) -> Option<SolaLinkedEditing> {
    let word = doc.buffer.word_at(position)?;
    if !word.is_variable() || word.text == "$this" {
        return None;
    }
    let tree = doc.tree();
    let scope = tree.and_then(|tree| enclosing_function(tree, position).map(|(_, function)| function.range));

    let mut function_ranges = Vec::new();
    if let (Some(tree), None) = (tree, scope) {
        for_each_function(tree, &mut |_, function| function_ranges.push(function.range));
    }

    let ranges: Vec<Range> = word_occurrences(doc.text(), &word.text)
        .into_iter()
        .filter(|range| match scope {
            Some(scope) => scope.encloses(range),
            None => !function_ranges.iter().any(|function| function.encloses(range)),
        })
        .collect();
    if ranges.len() < 2 {
        return None;
    }
    Some(SolaLinkedEditing {
        ranges,
        word_pattern: VARIABLE_WORD_PATTERN.to_string(),
    })
}
