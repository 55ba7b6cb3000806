use crate::symbols::DeclKind;
use crate::utils::{member_kind, ClassLike};
use crate::workspace::{Location, SourceView, Workspace};
use lsp_types::SymbolKind;
use pathdiff::diff_paths;
use sola_syntax::ast::{ClassMember, Declaration, FunctionDecl, Tree};
use sola_syntax::Range;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct SolaDocumentSymbol {
    pub name: String,
    pub detail: Option<String>,
    pub kind: SymbolKind,
    pub range: Range,
    pub selection_range: Range,
    pub children: Vec<SolaDocumentSymbol>,
}

/// One symbol per top-level declaration, with members nested under their class,
/// interface or enum.
pub fn collect_document_symbols(tree: &Tree) -> Vec<SolaDocumentSymbol> {
    tree.top_level_declarations().map(declaration_symbol).collect()
}

fn declaration_symbol(decl: Declaration<'_>) -> SolaDocumentSymbol {
    let name = decl.name();
    let (kind, detail, children) = match decl {
        Declaration::Class(class) => (
            SymbolKind::CLASS,
            class.extends.as_ref().map(|ty| format!("extends {ty}")),
            member_symbols(ClassLike::Class(class)),
        ),
        Declaration::Interface(interface) => (
            SymbolKind::INTERFACE,
            None,
            member_symbols(ClassLike::Interface(interface)),
        ),
        Declaration::Enum(decl) => (
            SymbolKind::ENUM,
            decl.backing.as_ref().map(ToString::to_string),
            member_symbols(ClassLike::Enum(decl)),
        ),
        Declaration::TypeAlias(alias) => (
            SymbolKind::TYPE_PARAMETER,
            Some(alias.ty.to_string()),
            Vec::new(),
        ),
        Declaration::Function(function) => {
            (SymbolKind::FUNCTION, Some(function_detail(function)), Vec::new())
        }
        Declaration::Const(constant) => (
            SymbolKind::CONSTANT,
            constant.ty.as_ref().map(ToString::to_string),
            Vec::new(),
        ),
    };
    SolaDocumentSymbol {
        name: name.as_str().to_string(),
        detail,
        kind,
        range: decl.range(),
        selection_range: name.range,
        children,
    }
}

fn member_symbols(owner: ClassLike<'_>) -> Vec<SolaDocumentSymbol> {
    owner
        .members()
        .iter()
        .filter(|member| !member.name().as_str().is_empty())
        .map(|member| {
            let (kind, detail) = match member {
                ClassMember::Method(method) if method.name.as_str() == "__construct" => {
                    (SymbolKind::CONSTRUCTOR, Some(function_detail(method)))
                }
                ClassMember::Method(method) => (SymbolKind::METHOD, Some(function_detail(method))),
                ClassMember::Property(property) => (
                    SymbolKind::PROPERTY,
                    property.ty.as_ref().map(ToString::to_string),
                ),
                ClassMember::Const(constant) => (
                    SymbolKind::CONSTANT,
                    constant.ty.as_ref().map(ToString::to_string),
                ),
                ClassMember::Case(_) => (SymbolKind::ENUM_MEMBER, None),
            };
            SolaDocumentSymbol {
                name: member.name().as_str().to_string(),
                detail,
                kind,
                range: member.range(),
                selection_range: member.name().range,
                children: Vec::new(),
            }
        })
        .collect()
}

/// `($a: int, $b): string`
fn function_detail(function: &FunctionDecl) -> String {
    let params: Vec<String> = function.params.iter().map(|param| param.render()).collect();
    match &function.return_type {
        Some(ret) => format!("({}): {ret}", params.join(", ")),
        None => format!("({})", params.join(", ")),
    }
}

pub const MAX_WORKSPACE_SYMBOLS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceSymbolMatch {
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    /// Owning class for members, the project-relative file for top-level declarations.
    pub container: Option<String>,
    pub score: u32,
}

/// Declarations across open documents and the index whose names match `query`,
/// best matches first.
pub fn workspace_symbols(workspace: Workspace<'_>, query: &str) -> Vec<WorkspaceSymbolMatch> {
    let root = workspace.index.and_then(|index| index.root());
    let query = query.to_lowercase();
    let mut matches = Vec::new();
    for source in workspace.sources() {
        collect_matches(source, &query, root, &mut matches);
    }
    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    matches.truncate(MAX_WORKSPACE_SYMBOLS);
    matches
}

fn collect_matches(
    source: SourceView<'_>,
    query: &str,
    root: Option<&Path>,
    out: &mut Vec<WorkspaceSymbolMatch>,
) {
    let file_container = source
        .uri
        .to_file_path()
        .ok()
        .and_then(|path| match root {
            Some(root) => diff_paths(&path, root),
            None => path.file_name().map(Into::into),
        })
        .map(|path| path.to_string_lossy().replace('\\', "/"));

    let mut push = |name: &str, kind: DeclKind, range: Range, container: Option<String>| {
        if let Some(score) = match_score(name, query, kind) {
            out.push(WorkspaceSymbolMatch {
                name: name.to_string(),
                kind: kind.symbol_kind(),
                location: Location {
                    uri: source.uri.clone(),
                    range,
                },
                container,
                score,
            });
        }
    };

    for decl in source.tree.top_level_declarations() {
        let kind = crate::utils::declaration_kind(&decl);
        push(decl.name().as_str(), kind, decl.name().range, file_container.clone());
        let members: &[ClassMember] = match decl {
            Declaration::Class(class) => &class.members,
            Declaration::Interface(interface) => &interface.members,
            Declaration::Enum(decl) => &decl.members,
            _ => &[],
        };
        for member in members {
            push(
                member.name().as_str(),
                member_kind(member),
                member.name().range,
                Some(decl.name().as_str().to_string()),
            );
        }
    }
}

/// Exact 100, prefix 80, substring 60, in-order characters 40, plus a bonus for
/// classes, interfaces and methods. `query` is lowercase.
fn match_score(name: &str, query: &str, kind: DeclKind) -> Option<u32> {
    if name.is_empty() {
        return None;
    }
    let lowered = name.to_lowercase();
    let bare = lowered.trim_start_matches('$');
    let base = if query.is_empty() || bare == query || lowered == query {
        100
    } else if bare.starts_with(query) || lowered.starts_with(query) {
        80
    } else if lowered.contains(query) {
        60
    } else if is_subsequence(query, &lowered) {
        40
    } else {
        return None;
    };
    let bonus = match kind {
        DeclKind::Class => 10,
        DeclKind::Interface => 8,
        DeclKind::Method => 5,
        _ => 0,
    };
    Some(base + bonus)
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut chars = haystack.chars();
    needle.chars().all(|wanted| chars.any(|c| c == wanted))
}
