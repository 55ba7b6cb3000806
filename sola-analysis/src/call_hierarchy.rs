//! Call hierarchy: who calls a function or method, and what it calls.
//!
//! Incoming calls are found by walking every open document, so callers that live only in
//! indexed files are not reported. Outgoing calls are resolved through the workspace,
//! which does include the index.

use crate::document::DocumentSnapshot;
use crate::go_to_definition::goto_definition;
use crate::inference::Inference;
use crate::symbols::DeclKind;
use crate::utils::{for_each_function, innermost_declaration, ClassLike};
use crate::visitor::{walk_block, walk_stmt, FunctionRef, Visitor};
use crate::workspace::{Resolved, SourceView, Workspace};
use lsp_types::{SymbolKind, Url};
use sola_syntax::ast::{Declaration, Expr, ExprKind, FunctionDecl, Ident, Tree, TypeNode};
use sola_syntax::{Position, Range};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaCallItem {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: Option<String>,
    pub uri: Url,
    pub range: Range,
    pub selection_range: Range,
    /// Owning class for methods.
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaIncomingCall {
    pub from: SolaCallItem,
    pub from_ranges: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaOutgoingCall {
    pub to: SolaCallItem,
    pub from_ranges: Vec<Range>,
}

/// The function or method declared or called at `position`.
pub fn prepare_call_hierarchy(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
) -> Option<SolaCallItem> {
    let tree = doc.tree()?;
    if let Some(site) = innermost_declaration(tree, position) {
        let callable = matches!(site.kind, DeclKind::Function | DeclKind::Method);
        if callable && site.name.range.touches(position) {
            return call_item_at(workspace, &doc.uri, site.name.range);
        }
    }
    let location = goto_definition(doc, workspace, position)?;
    call_item_at(workspace, &location.uri, location.range)
}

/// Rebuilds the item whose name sits at `selection_range` in `uri`.
pub fn call_item_at(workspace: Workspace<'_>, uri: &Url, selection_range: Range) -> Option<SolaCallItem> {
    let source = workspace.sources().find(|source| source.uri == uri)?;
    let (owner, function) = find_function(source.tree, selection_range)?;
    Some(call_item(uri, owner, function))
}

fn find_function(tree: &Tree, name_range: Range) -> Option<(Option<ClassLike<'_>>, &FunctionDecl)> {
    let mut found = None;
    for_each_function(tree, &mut |owner, function| {
        if found.is_none() && function.name.range == name_range {
            found = Some((owner, function));
        }
    });
    found
}

fn call_item(uri: &Url, owner: Option<ClassLike<'_>>, function: &FunctionDecl) -> SolaCallItem {
    let owner = owner.map(|class| class.name().as_str().to_string());
    let kind = match (&owner, function.name.as_str()) {
        (Some(_), "__construct") => SymbolKind::CONSTRUCTOR,
        (Some(_), _) => SymbolKind::METHOD,
        (None, _) => SymbolKind::FUNCTION,
    };
    SolaCallItem {
        name: function.name.as_str().to_string(),
        kind,
        detail: Some(match &owner {
            Some(owner) => owner.clone(),
            None => function.signature(),
        }),
        uri: uri.clone(),
        range: function.range,
        selection_range: function.name.range,
        owner,
    }
}

/// Top-level statements of a file, presented as a caller named after the file.
fn script_item(uri: &Url, tree: &Tree) -> SolaCallItem {
    let name = uri
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| uri.to_string());
    SolaCallItem {
        name,
        kind: SymbolKind::FILE,
        detail: None,
        uri: uri.clone(),
        range: tree.range,
        selection_range: Range::empty(Position::start()),
        owner: None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Callee<'a> {
    Function(&'a Ident),
    Method {
        receiver: Option<&'a Expr>,
        class: Option<&'a Ident>,
        name: &'a Ident,
    },
    New(&'a TypeNode),
}

impl Callee<'_> {
    fn name(&self) -> &str {
        match self {
            Callee::Function(name) | Callee::Method { name, .. } => name.as_str(),
            Callee::New(_) => "__construct",
        }
    }

    fn range(&self) -> Range {
        match self {
            Callee::Function(name) | Callee::Method { name, .. } => name.range,
            Callee::New(ty) => ty.range,
        }
    }
}

#[derive(Default)]
struct CallCollector<'a> {
    calls: Vec<Callee<'a>>,
}

impl<'a> Visitor<'a> for CallCollector<'a> {
    fn visit_expr(&mut self, expr: &'a Expr) {
        let callee = match &expr.kind {
            ExprKind::Call { callee, .. } => callee.callee_name().map(Callee::Function),
            ExprKind::MethodCall {
                receiver, method, ..
            } => Some(Callee::Method {
                receiver: Some(&**receiver),
                class: None,
                name: method,
            }),
            ExprKind::StaticCall { class, method, .. } => Some(Callee::Method {
                receiver: None,
                class: Some(class),
                name: method,
            }),
            ExprKind::New { class, .. } => Some(Callee::New(class)),
            _ => None,
        };
        self.calls.extend(callee);
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        // Closures run on behalf of the function they are written in.
        !matches!(function, FunctionRef::Decl(_))
    }
}

fn calls_in_function(function: &FunctionDecl) -> Vec<Callee<'_>> {
    let mut collector = CallCollector::default();
    if let Some(body) = &function.body {
        walk_block(body, &mut collector);
    }
    collector.calls
}

fn calls_in_script(tree: &Tree) -> Vec<Callee<'_>> {
    let mut collector = CallCollector::default();
    for stmt in &tree.statements {
        if Declaration::from_stmt(stmt).is_none() {
            walk_stmt(stmt, &mut collector);
        }
    }
    collector.calls
}

/// The class a call is made on, when it can be worked out.
fn callee_class(inference: &Inference<'_>, callee: &Callee<'_>) -> Option<String> {
    match callee {
        Callee::Function(_) => None,
        Callee::Method {
            class: Some(class), ..
        } => Some(inference.resolve_special(class.as_str(), class.range.start)),
        Callee::Method {
            receiver: Some(receiver),
            ..
        } => inference.class_of(receiver),
        Callee::Method { .. } => None,
        Callee::New(ty) => ty
            .base_name()
            .map(|name| inference.resolve_special(name.as_str(), name.range.start)),
    }
}

fn targets(
    inference: &Inference<'_>,
    workspace: Workspace<'_>,
    callee: &Callee<'_>,
    target: &SolaCallItem,
) -> bool {
    if callee.name() != target.name {
        return false;
    }
    match (callee, &target.owner) {
        (Callee::Function(_), None) => true,
        (Callee::Function(_), Some(_)) | (_, None) => false,
        (_, Some(owner)) => match callee_class(inference, callee) {
            Some(class) => workspace
                .hierarchy(&class, inference.current())
                .iter()
                .any(|(name, _)| name == owner),
            None => true,
        },
    }
}

pub fn incoming_calls(workspace: Workspace<'_>, target: &SolaCallItem) -> Vec<SolaIncomingCall> {
    let mut incoming = Vec::new();
    for doc in workspace.documents {
        let Some(tree) = doc.tree() else {
            continue;
        };
        let inference = Inference::new(tree, workspace, Some(doc));
        let matching = |calls: Vec<Callee<'_>>| -> Vec<Range> {
            calls
                .iter()
                .filter(|callee| targets(&inference, workspace, callee, target))
                .map(Callee::range)
                .collect()
        };
        for_each_function(tree, &mut |owner, function| {
            let from_ranges = matching(calls_in_function(function));
            if !from_ranges.is_empty() {
                incoming.push(SolaIncomingCall {
                    from: call_item(&doc.uri, owner, function),
                    from_ranges,
                });
            }
        });
        let from_ranges = matching(calls_in_script(tree));
        if !from_ranges.is_empty() {
            incoming.push(SolaIncomingCall {
                from: script_item(&doc.uri, tree),
                from_ranges,
            });
        }
    }
    incoming
}

pub fn outgoing_calls(workspace: Workspace<'_>, source: &SolaCallItem) -> Vec<SolaOutgoingCall> {
    let Some(view) = workspace.sources().find(|view| *view.uri == source.uri) else {
        return Vec::new();
    };
    let Some((_, function)) = find_function(view.tree, source.selection_range) else {
        return Vec::new();
    };
    let current = workspace.document(&source.uri);
    let inference = Inference::new(view.tree, workspace, current);

    let mut outgoing: Vec<SolaOutgoingCall> = Vec::new();
    for callee in calls_in_function(function) {
        let Some(to) = resolve_callee(&inference, workspace, view, &callee) else {
            continue;
        };
        match outgoing
            .iter_mut()
            .find(|call| call.to.uri == to.uri && call.to.selection_range == to.selection_range)
        {
            Some(call) => call.from_ranges.push(callee.range()),
            None => outgoing.push(SolaOutgoingCall {
                to,
                from_ranges: vec![callee.range()],
            }),
        }
    }
    outgoing
}

fn resolve_callee(
    inference: &Inference<'_>,
    workspace: Workspace<'_>,
    view: SourceView<'_>,
    callee: &Callee<'_>,
) -> Option<SolaCallItem> {
    let current = inference.current();
    let resolved: Resolved<'_> = match callee {
        Callee::Function(name) => {
            let resolved = workspace.find_declaration(name.as_str(), current)?;
            if resolved.kind != DeclKind::Function {
                return None;
            }
            resolved
        }
        _ => match callee_class(inference, callee) {
            Some(class) => workspace.find_member(&class, callee.name(), current)?,
            None if matches!(callee, Callee::Method { .. }) => {
                workspace.find_any_member(callee.name(), current)?
            }
            None => return None,
        },
    };
    if !matches!(resolved.kind, DeclKind::Function | DeclKind::Method) {
        return None;
    }
    let uri = resolved.source.uri;
    if uri == view.uri {
        return find_function(view.tree, resolved.name_range)
            .map(|(owner, function)| call_item(uri, owner, function));
    }
    call_item_at(workspace, uri, resolved.name_range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    const SOURCE: &str = "function helper() {}
class Greeter {
  function greet() { helper(); $this->log() }
  function log() {}
}
function main() {
  $g := new Greeter()
  $g->greet()
  helper()
}
helper()
";

    fn docs() -> Vec<DocumentSnapshot> {
        vec![snapshot("file:///calls.sola", SOURCE)]
    }

    #[test]
    fn prepare_finds_declarations_and_call_sites() {
        let docs = docs();
        let workspace = Workspace::new(&docs, None);
        let item = prepare_call_hierarchy(&docs[0], workspace, Position::new(1, 11)).expect("helper");
        assert_eq!(item.name, "helper");
        assert_eq!(item.kind, SymbolKind::FUNCTION);

        let item = prepare_call_hierarchy(&docs[0], workspace, Position::new(8, 8)).expect("greet");
        assert_eq!(item.name, "greet");
        assert_eq!(item.owner.as_deref(), Some("Greeter"));
        assert_eq!(item.selection_range.start, Position::new(3, 12));
    }

    #[test]
    fn incoming_calls_group_by_caller() {
        let docs = docs();
        let workspace = Workspace::new(&docs, None);
        let helper = prepare_call_hierarchy(&docs[0], workspace, Position::new(1, 11)).expect("helper");
        let incoming = incoming_calls(workspace, &helper);
        let callers: Vec<_> = incoming
            .iter()
            .map(|call| (call.from.name.as_str(), call.from_ranges.len()))
            .collect();
        assert_eq!(callers, vec![("main", 1), ("greet", 1), ("calls.sola", 1)]);
        assert_eq!(incoming[2].from.kind, SymbolKind::FILE);
    }

    #[test]
    fn outgoing_calls_resolve_targets() {
        let docs = docs();
        let workspace = Workspace::new(&docs, None);
        let main = prepare_call_hierarchy(&docs[0], workspace, Position::new(6, 11)).expect("main");
        let outgoing = outgoing_calls(workspace, &main);
        let targets: Vec<_> = outgoing
            .iter()
            .map(|call| (call.to.name.as_str(), call.to.owner.as_deref()))
            .collect();
        assert_eq!(targets, vec![("greet", Some("Greeter")), ("helper", None)]);
        assert_eq!(outgoing[0].from_ranges[0].start, Position::new(8, 7));
    }
}
