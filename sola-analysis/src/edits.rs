//! Text edits shared by rename, code actions, formatting and color presentations.

use lsp_types::Url;
use sola_syntax::{Position, Range};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaTextEdit {
    pub range: Range,
    pub new_text: String,
}

impl SolaTextEdit {
    pub fn replace(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }

    pub fn insert(position: Position, new_text: impl Into<String>) -> Self {
        Self::replace(Range::empty(position), new_text)
    }
}

/// Edits grouped per document, ordered by URI so results are stable.
pub type SolaWorkspaceEdit = BTreeMap<Url, Vec<SolaTextEdit>>;

/// Adds `edit` under `uri`.
pub fn push_edit(changes: &mut SolaWorkspaceEdit, uri: &Url, edit: SolaTextEdit) {
    changes.entry(uri.clone()).or_default().push(edit);
}
