//! Conversions between analysis results and protocol types.
//!
//! The analysis crate uses 1-based lines and columns; the protocol uses 0-based ones.
//! Columns are counted in characters on both sides.

use crate::features::formatting::LineRange;
use serde_json::{json, Value};
use sola_analysis::call_hierarchy::{SolaCallItem, SolaIncomingCall, SolaOutgoingCall};
use sola_analysis::code_actions::SolaCodeAction;
use sola_analysis::code_lens::SolaCodeLens;
use sola_analysis::colors::{SolaColorInfo, SolaColorPresentation};
use sola_analysis::completion::CompletionCandidate;
use sola_analysis::diagnostics::{SolaDiagnostic, DIAGNOSTIC_SOURCE};
use sola_analysis::document_links::SolaDocumentLink;
use sola_analysis::document_symbols::{SolaDocumentSymbol, WorkspaceSymbolMatch};
use sola_analysis::edits::{SolaTextEdit, SolaWorkspaceEdit};
use sola_analysis::folding_ranges::SolaFoldingRange;
use sola_analysis::inlay_hints::SolaInlayHint;
use sola_analysis::references::Highlight;
use sola_analysis::selection_ranges::SolaSelectionRange;
use sola_analysis::signature_help::SignatureHelpResult;
use sola_analysis::type_hierarchy::SolaTypeItem;
use sola_analysis::workspace;
use sola_syntax::{Position as SolaPosition, Range as SolaRange};
use std::collections::HashMap;
use tower_lsp::lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyItem, CallHierarchyOutgoingCall, CodeAction,
    CodeActionOrCommand, CodeLens, ColorInformation, ColorPresentation, Command, CompletionItem,
    Diagnostic, DiagnosticSeverity, DocumentHighlight, DocumentLink, DocumentSymbol,
    Documentation, FoldingRange, InlayHint, InlayHintKind, InlayHintLabel, InsertTextFormat,
    Location, MarkupContent, MarkupKind, NumberOrString, ParameterInformation, ParameterLabel,
    Position, Range, SelectionRange, SignatureHelp, SignatureInformation, SymbolInformation,
    TextEdit, TypeHierarchyItem, Url, WorkspaceEdit,
};

pub fn to_lsp_position(position: SolaPosition) -> Position {
    Position::new(position.line.saturating_sub(1), position.column.saturating_sub(1))
}

pub fn from_lsp_position(position: Position) -> SolaPosition {
    SolaPosition::new(position.line.saturating_add(1), position.character.saturating_add(1))
}

pub fn to_lsp_range(range: SolaRange) -> Range {
    Range {
        start: to_lsp_position(range.start),
        end: to_lsp_position(range.end),
    }
}

pub fn from_lsp_range(range: Range) -> SolaRange {
    SolaRange::new(from_lsp_position(range.start), from_lsp_position(range.end))
}

/// Lines touched by a protocol range. A range ending at column 0 of a later line does
/// not include that line.
pub fn to_line_range(range: Range) -> LineRange {
    let start = range.start.line.saturating_add(1);
    let mut end = range.end.line.saturating_add(1);
    if range.end.character == 0 && end > start {
        end -= 1;
    }
    LineRange { start, end }
}

pub fn to_lsp_location(location: &workspace::Location) -> Location {
    Location {
        uri: location.uri.clone(),
        range: to_lsp_range(location.range),
    }
}

pub fn to_lsp_diagnostic(diagnostic: &SolaDiagnostic) -> Diagnostic {
    Diagnostic {
        range: to_lsp_range(diagnostic.range),
        severity: Some(diagnostic.severity),
        code: diagnostic.code.clone().map(NumberOrString::String),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: diagnostic.message.clone(),
        tags: (!diagnostic.tags.is_empty()).then(|| diagnostic.tags.clone()),
        ..Diagnostic::default()
    }
}

/// Maps a client diagnostic back so code actions can match on it. Diagnostics from
/// other sources are dropped.
pub fn from_lsp_diagnostic(diagnostic: &Diagnostic) -> Option<SolaDiagnostic> {
    if diagnostic
        .source
        .as_deref()
        .is_some_and(|source| source != DIAGNOSTIC_SOURCE)
    {
        return None;
    }
    let code = match &diagnostic.code {
        Some(NumberOrString::String(code)) => Some(code.clone()),
        Some(NumberOrString::Number(code)) => Some(code.to_string()),
        None => None,
    };
    Some(SolaDiagnostic {
        range: from_lsp_range(diagnostic.range),
        severity: diagnostic.severity.unwrap_or(DiagnosticSeverity::ERROR),
        code,
        message: diagnostic.message.clone(),
        tags: diagnostic.tags.clone().unwrap_or_default(),
    })
}

pub fn markdown(value: String) -> MarkupContent {
    MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    }
}

pub fn to_lsp_text_edit(edit: &SolaTextEdit) -> TextEdit {
    TextEdit {
        range: to_lsp_range(edit.range),
        new_text: edit.new_text.clone(),
    }
}

pub fn to_lsp_workspace_edit(edit: &SolaWorkspaceEdit) -> WorkspaceEdit {
    let changes: HashMap<Url, Vec<TextEdit>> = edit
        .iter()
        .map(|(uri, edits)| (uri.clone(), edits.iter().map(to_lsp_text_edit).collect()))
        .collect();
    WorkspaceEdit {
        changes: Some(changes),
        ..WorkspaceEdit::default()
    }
}

#[allow(deprecated)]
pub fn to_lsp_document_symbol(symbol: &SolaDocumentSymbol) -> DocumentSymbol {
    DocumentSymbol {
        name: symbol.name.clone(),
        detail: symbol.detail.clone(),
        kind: symbol.kind,
        tags: None,
        deprecated: None,
        range: to_lsp_range(symbol.range),
        selection_range: to_lsp_range(symbol.selection_range),
        children: if symbol.children.is_empty() {
            None
        } else {
            Some(symbol.children.iter().map(to_lsp_document_symbol).collect())
        },
    }
}

#[allow(deprecated)]
pub fn to_lsp_symbol_information(symbol: &WorkspaceSymbolMatch) -> SymbolInformation {
    SymbolInformation {
        name: symbol.name.clone(),
        kind: symbol.kind,
        tags: None,
        deprecated: None,
        location: to_lsp_location(&symbol.location),
        container_name: symbol.container.clone(),
    }
}

/// Protocol folding lines are 0-based.
pub fn to_lsp_folding_range(range: &SolaFoldingRange) -> FoldingRange {
    FoldingRange {
        start_line: range.start_line.saturating_sub(1),
        start_character: None,
        end_line: range.end_line.saturating_sub(1),
        end_character: None,
        kind: range.kind.clone(),
        collapsed_text: None,
    }
}

pub fn to_lsp_selection_range(range: &SolaSelectionRange) -> SelectionRange {
    SelectionRange {
        range: to_lsp_range(range.range),
        parent: range
            .parent
            .as_deref()
            .map(|parent| Box::new(to_lsp_selection_range(parent))),
    }
}

pub fn to_lsp_completion_item(candidate: &CompletionCandidate) -> CompletionItem {
    CompletionItem {
        label: candidate.label.clone(),
        kind: Some(candidate.kind),
        detail: candidate.detail.clone(),
        insert_text: candidate.insert_text.clone(),
        insert_text_format: candidate
            .is_snippet
            .then_some(InsertTextFormat::SNIPPET),
        data: candidate
            .data
            .as_ref()
            .and_then(|data| serde_json::to_value(data).ok()),
        ..CompletionItem::default()
    }
}

pub fn to_lsp_signature_help(help: &SignatureHelpResult) -> SignatureHelp {
    let signatures = help
        .signatures
        .iter()
        .map(|signature| SignatureInformation {
            label: signature.label.clone(),
            documentation: signature
                .documentation
                .clone()
                .map(|doc| Documentation::MarkupContent(markdown(doc))),
            parameters: Some(
                signature
                    .parameters
                    .iter()
                    .map(|param| ParameterInformation {
                        label: ParameterLabel::Simple(param.clone()),
                        documentation: None,
                    })
                    .collect(),
            ),
            active_parameter: None,
        })
        .collect();
    SignatureHelp {
        signatures,
        active_signature: Some(help.active_signature),
        active_parameter: Some(help.active_parameter),
    }
}

pub fn to_lsp_highlight(highlight: &Highlight) -> DocumentHighlight {
    DocumentHighlight {
        range: to_lsp_range(highlight.range),
        kind: Some(highlight.kind),
    }
}

pub fn to_lsp_document_link(link: &SolaDocumentLink) -> DocumentLink {
    DocumentLink {
        range: to_lsp_range(link.range),
        target: Some(link.target.clone()),
        tooltip: link.tooltip.clone(),
        data: None,
    }
}

pub fn to_lsp_inlay_hint(hint: &SolaInlayHint) -> InlayHint {
    let parameter = hint.kind == InlayHintKind::PARAMETER;
    InlayHint {
        position: to_lsp_position(hint.position),
        label: InlayHintLabel::String(hint.label.clone()),
        kind: Some(hint.kind),
        text_edits: None,
        tooltip: None,
        padding_left: Some(!parameter),
        padding_right: Some(parameter),
        data: None,
    }
}

pub fn to_lsp_code_lens(lens: &SolaCodeLens) -> CodeLens {
    CodeLens {
        range: to_lsp_range(lens.range),
        command: Some(Command {
            title: lens.title.clone(),
            command: lens.command.clone(),
            arguments: (!lens.arguments.is_empty()).then(|| lens.arguments.clone()),
        }),
        data: None,
    }
}

pub fn to_lsp_code_action(action: &SolaCodeAction) -> CodeActionOrCommand {
    CodeActionOrCommand::CodeAction(CodeAction {
        title: action.title.clone(),
        kind: Some(action.kind.clone()),
        diagnostics: (!action.diagnostics.is_empty())
            .then(|| action.diagnostics.iter().map(to_lsp_diagnostic).collect()),
        edit: Some(to_lsp_workspace_edit(&action.edit)),
        command: None,
        is_preferred: action.is_preferred.then_some(true),
        disabled: None,
        data: None,
    })
}

pub fn to_lsp_color_information(info: &SolaColorInfo) -> ColorInformation {
    ColorInformation {
        range: to_lsp_range(info.range),
        color: info.color,
    }
}

pub fn to_lsp_color_presentation(presentation: &SolaColorPresentation) -> ColorPresentation {
    ColorPresentation {
        label: presentation.label.clone(),
        text_edit: Some(to_lsp_text_edit(&presentation.edit)),
        additional_text_edits: None,
    }
}

/// Items carry their selection range in `data` so follow-up requests can find the
/// declaration again even if the client rewrites the other fields.
fn item_data(uri: &Url, selection_range: SolaRange) -> Value {
    json!({ "uri": uri, "selectionRange": to_lsp_range(selection_range) })
}

/// Reads back what [`item_data`] stored, falling back to the item's own fields.
pub fn item_anchor(data: Option<&Value>, uri: &Url, selection_range: Range) -> (Url, SolaRange) {
    let stored = data.and_then(|data| {
        let uri = data.get("uri")?.as_str().and_then(|uri| Url::parse(uri).ok())?;
        let range: Range = serde_json::from_value(data.get("selectionRange")?.clone()).ok()?;
        Some((uri, range))
    });
    let (uri, range) = stored.unwrap_or_else(|| (uri.clone(), selection_range));
    (uri, from_lsp_range(range))
}

pub fn to_lsp_call_item(item: &SolaCallItem) -> CallHierarchyItem {
    CallHierarchyItem {
        name: item.name.clone(),
        kind: item.kind,
        tags: None,
        detail: item.detail.clone(),
        uri: item.uri.clone(),
        range: to_lsp_range(item.range),
        selection_range: to_lsp_range(item.selection_range),
        data: Some(item_data(&item.uri, item.selection_range)),
    }
}

pub fn to_lsp_incoming_call(call: &SolaIncomingCall) -> CallHierarchyIncomingCall {
    CallHierarchyIncomingCall {
        from: to_lsp_call_item(&call.from),
        from_ranges: call.from_ranges.iter().copied().map(to_lsp_range).collect(),
    }
}

pub fn to_lsp_outgoing_call(call: &SolaOutgoingCall) -> CallHierarchyOutgoingCall {
    CallHierarchyOutgoingCall {
        to: to_lsp_call_item(&call.to),
        from_ranges: call.from_ranges.iter().copied().map(to_lsp_range).collect(),
    }
}

pub fn to_lsp_type_item(item: &SolaTypeItem) -> TypeHierarchyItem {
    TypeHierarchyItem {
        name: item.name.clone(),
        kind: item.kind,
        tags: None,
        detail: item.detail.clone(),
        uri: item.uri.clone(),
        range: to_lsp_range(item.range),
        selection_range: to_lsp_range(item.selection_range),
        data: Some(item_data(&item.uri, item.selection_range)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::DiagnosticTag;

    #[test]
    fn positions_shift_between_bases() {
        assert_eq!(to_lsp_position(SolaPosition::new(1, 1)), Position::new(0, 0));
        assert_eq!(from_lsp_position(Position::new(2, 5)), SolaPosition::new(3, 6));
        let range = Range::new(Position::new(0, 6), Position::new(0, 7));
        assert_eq!(to_lsp_range(from_lsp_range(range)), range);
    }

    #[test]
    fn line_range_excludes_trailing_column_zero() {
        let range = Range::new(Position::new(1, 0), Position::new(3, 0));
        assert_eq!(to_line_range(range), LineRange { start: 2, end: 3 });
        let range = Range::new(Position::new(1, 2), Position::new(1, 0));
        assert_eq!(to_line_range(range), LineRange { start: 2, end: 2 });
        let range = Range::new(Position::new(0, 0), Position::new(2, 4));
        assert_eq!(to_line_range(range), LineRange { start: 1, end: 3 });
    }

    #[test]
    fn diagnostics_carry_source_code_and_tags() {
        let diagnostic = SolaDiagnostic {
            range: SolaRange::new(SolaPosition::new(2, 1), SolaPosition::new(2, 3)),
            severity: DiagnosticSeverity::HINT,
            code: Some("unused-variable".into()),
            message: "'$x' is never read".into(),
            tags: vec![DiagnosticTag::UNNECESSARY],
        };
        let lsp = to_lsp_diagnostic(&diagnostic);
        assert_eq!(lsp.source.as_deref(), Some("sola"));
        assert_eq!(lsp.range.start, Position::new(1, 0));
        assert_eq!(lsp.code, Some(NumberOrString::String("unused-variable".into())));
        assert_eq!(lsp.tags, Some(vec![DiagnosticTag::UNNECESSARY]));
        assert_eq!(from_lsp_diagnostic(&lsp), Some(diagnostic));

        let foreign = Diagnostic {
            source: Some("spelling".into()),
            ..lsp
        };
        assert!(from_lsp_diagnostic(&foreign).is_none());
    }

    #[test]
    fn folding_lines_become_zero_based() {
        let folding = SolaFoldingRange {
            start_line: 2,
            end_line: 5,
            kind: None,
        };
        let lsp = to_lsp_folding_range(&folding);
        assert_eq!((lsp.start_line, lsp.end_line), (1, 4));
    }

    #[test]
    fn hierarchy_items_round_trip_their_anchor() {
        let uri = Url::parse("file:///w/a.sola").expect("uri");
        let selection = SolaRange::new(SolaPosition::new(3, 10), SolaPosition::new(3, 14));
        let data = item_data(&uri, selection);
        let other = Url::parse("file:///w/b.sola").expect("uri");
        let (anchor_uri, anchor_range) =
            item_anchor(Some(&data), &other, Range::default());
        assert_eq!(anchor_uri, uri);
        assert_eq!(anchor_range, selection);

        let (fallback_uri, fallback_range) =
            item_anchor(None, &other, Range::new(Position::new(0, 6), Position::new(0, 7)));
        assert_eq!(fallback_uri, other);
        assert_eq!(fallback_range.start, SolaPosition::new(1, 7));
    }
}
