use crate::document::DocumentSnapshot;
use crate::utils::{find_class_like, for_each_class_like, ClassLike};
use crate::workspace::Workspace;
use lsp_types::{SymbolKind, Url};
use sola_syntax::ast::{Ident, TypeNode};
use sola_syntax::{Position, Range};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaTypeItem {
    pub name: String,
    pub kind: SymbolKind,
    pub detail: Option<String>,
    pub uri: Url,
    pub range: Range,
    pub selection_range: Range,
}

fn type_item(uri: &Url, class: ClassLike<'_>) -> Option<SolaTypeItem> {
    let (kind, detail) = match class {
        ClassLike::Class(decl) => (
            SymbolKind::CLASS,
            decl.extends.as_ref().map(|parent| format!("extends {parent}")),
        ),
        ClassLike::Interface(_) => (SymbolKind::INTERFACE, None),
        ClassLike::Enum(_) => return None,
    };
    Some(SolaTypeItem {
        name: class.name().as_str().to_string(),
        kind,
        detail,
        uri: uri.clone(),
        range: class.range(),
        selection_range: class.name().range,
    })
}

/// The class or interface declared or named at `position`.
pub fn prepare_type_hierarchy(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
) -> Option<SolaTypeItem> {
    doc.tree()?;
    let word = doc.buffer.word_at(position)?;
    if word.is_variable() {
        return None;
    }
    let source = workspace.class_source(&word.text, Some(doc))?;
    let class = find_class_like(source.tree, &word.text)?;
    type_item(source.uri, class)
}

/// Looks the item up again by where its name is declared.
pub fn type_item_at(workspace: Workspace<'_>, uri: &Url, selection_range: Range) -> Option<SolaTypeItem> {
    let source = workspace.sources().find(|source| source.uri == uri)?;
    let mut found = None;
    for_each_class_like(source.tree, &mut |class| {
        if found.is_none() && class.name().range == selection_range {
            found = type_item(uri, class);
        }
    });
    found
}

fn declared_supertypes(class: ClassLike<'_>) -> Vec<&TypeNode> {
    match class {
        ClassLike::Class(decl) => decl.extends.iter().chain(&decl.implements).collect(),
        ClassLike::Interface(decl) => decl.extends.iter().collect(),
        ClassLike::Enum(decl) => decl.implements.iter().collect(),
    }
}

/// The parent class and implemented interfaces of a class, or the extended interfaces of
/// an interface. Names that do not resolve are left out.
pub fn supertypes(workspace: Workspace<'_>, item: &SolaTypeItem) -> Vec<SolaTypeItem> {
    let Some(source) = workspace.sources().find(|source| *source.uri == item.uri) else {
        return Vec::new();
    };
    let Some(class) = find_class_like(source.tree, &item.name) else {
        return Vec::new();
    };
    let current = workspace.document(&item.uri);
    declared_supertypes(class)
        .into_iter()
        .filter_map(TypeNode::base_name)
        .filter_map(|name| {
            let source = workspace.class_source(name.as_str(), current)?;
            let class = find_class_like(source.tree, name.as_str())?;
            type_item(source.uri, class)
        })
        .collect()
}

/// Open classes and interfaces that extend or implement `item`.
pub fn subtypes(workspace: Workspace<'_>, item: &SolaTypeItem) -> Vec<SolaTypeItem> {
    let names = |types: Vec<&TypeNode>| -> bool {
        types
            .into_iter()
            .filter_map(TypeNode::base_name)
            .any(|name: &Ident| name.as_str() == item.name)
    };
    let mut out = Vec::new();
    for doc in workspace.documents {
        let Some(tree) = doc.tree() else {
            continue;
        };
        for_each_class_like(tree, &mut |class| {
            if matches!(class, ClassLike::Enum(_)) || !names(declared_supertypes(class)) {
                return;
            }
            out.extend(type_item(&doc.uri, class));
        });
    }
    out
}
