//! Context-aware completion for Sola sources.
//!
//! The text in front of the cursor decides what is offered:
//!
//! - **Import path**: inside `use "...`, offers `.sola` files relative to the document.
//! - **Member access**: after `->` or `.`, offers methods and properties of the receiver's
//!   inferred type. Private members are only offered on `$this`.
//! - **Static access**: after `::`, offers enum cases, class constants and static members.
//! - **Variable**: after `$`, offers the variables visible at the cursor.
//! - **Constructor**: after `new `, offers class names.
//! - **Type position**: after `:`, `extends` or `implements`, offers built-in and declared types.
//! - **General**: keywords, snippets, functions, constants, types and variables.
//!
//! Candidates are deduplicated by `(label, kind)` and capped at
//! [`CompletionSettings::max_items`]; a capped list is reported as incomplete so the
//! client asks again as the user types.

use crate::buffer::is_word_char;
use crate::document::DocumentSnapshot;
use crate::hover::render_declaration;
use crate::inference::{
    access_before, receiver_expression, visible_bindings, Access, Inference, BUILTIN_SIGNATURES,
};
use crate::symbols::{strip_generics, DeclKind};
use crate::utils::enclosing_class;
use crate::workspace::Workspace;
use crate::workspace_index::is_source_path;
use ignore::WalkBuilder;
use lsp_types::CompletionItemKind;
use pathdiff::diff_paths;
use serde::{Deserialize, Serialize};
use sola_syntax::lexer::{BUILTIN_TYPES, KEYWORDS};
use sola_syntax::Position;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A completion suggestion with display metadata.
///
/// Maps to LSP `CompletionItem` but remains protocol-agnostic. The LSP layer
/// converts these to the wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionCandidate {
    /// The text shown in the completion menu and inserted by default.
    pub label: String,
    /// Short description shown alongside the label, usually a type or signature.
    pub detail: Option<String>,
    pub kind: CompletionItemKind,
    /// Alternative text to insert if different from label.
    pub insert_text: Option<String>,
    /// Whether `insert_text` uses snippet syntax (`$0`, `${1:name}`).
    pub is_snippet: bool,
    /// Carried to `completionItem/resolve` to look the declaration up again.
    pub data: Option<CompletionData>,
}

impl CompletionCandidate {
    fn new(label: impl Into<String>, kind: CompletionItemKind) -> Self {
        Self {
            label: label.into(),
            detail: None,
            kind,
            insert_text: None,
            is_snippet: false,
            data: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn with_insert_text(mut self, text: impl Into<String>) -> Self {
        self.insert_text = Some(text.into());
        self
    }

    fn with_snippet(mut self, body: impl Into<String>) -> Self {
        self.insert_text = Some(body.into());
        self.is_snippet = true;
        self
    }

    fn with_data(mut self, name: &str, kind: DeclKind, container: Option<&str>) -> Self {
        self.data = Some(CompletionData {
            name: name.to_string(),
            kind,
            container: container.map(str::to_string),
        });
        self
    }
}

/// Identifies the declaration behind a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    pub name: String,
    pub kind: DeclKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionSettings {
    pub keywords: bool,
    pub snippets: bool,
    pub max_items: usize,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            keywords: true,
            snippets: true,
            max_items: 200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionList {
    pub items: Vec<CompletionCandidate>,
    /// Set when the list was cut at `max_items`.
    pub is_incomplete: bool,
}

/// Internal classification of completion trigger context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletionContext<'t> {
    ImportPath,
    Member(&'t str),
    Static(&'t str),
    Variable,
    ClassName,
    Type,
    General,
}

const SNIPPETS: &[(&str, &str, &str)] = &[
    ("class", "class ${1:Name} {\n\t$0\n}", "class declaration"),
    (
        "function",
        "function ${1:name}(${2}) {\n\t$0\n}",
        "function declaration",
    ),
    ("if", "if (${1:condition}) {\n\t$0\n}", "if statement"),
    (
        "foreach",
        "foreach (${1:\\$items} as ${2:\\$item}) {\n\t$0\n}",
        "foreach loop",
    ),
    ("while", "while (${1:condition}) {\n\t$0\n}", "while loop"),
    (
        "try",
        "try {\n\t$0\n} catch (${1:Exception} ${2:\\$e}) {\n}",
        "try/catch block",
    ),
    ("match", "match (${1:\\$value}) {\n\t$0\n}", "match expression"),
];

const MAX_PATH_COMPLETIONS: usize = 256;

/// Returns completion candidates appropriate for the cursor position.
///
/// Returns an empty list when the document has no tree.
pub fn completion_items(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
    settings: &CompletionSettings,
) -> CompletionList {
    let Some(inference) = Inference::for_document(doc, workspace) else {
        return CompletionList::default();
    };
    let line_prefix = doc.buffer.line_prefix(position);
    let candidates = match detect_context(line_prefix) {
        CompletionContext::ImportPath => import_path_completions(doc, workspace),
        CompletionContext::Member(receiver) => {
            member_completions(&inference, receiver, position, settings)
        }
        CompletionContext::Static(class) => {
            static_completions(&inference, &inference.resolve_special(class, position), settings)
        }
        CompletionContext::Variable => variable_completions(&inference, position, true),
        CompletionContext::ClassName => type_completions(workspace, doc, false),
        CompletionContext::Type => type_completions(workspace, doc, true),
        CompletionContext::General => general_completions(&inference, doc, position, settings),
    };
    finish(candidates, settings.max_items)
}

/// Markdown documentation for a candidate, rendered the way hover shows it.
pub fn resolve_completion(data: &CompletionData, workspace: Workspace<'_>) -> Option<String> {
    let resolved = match &data.container {
        Some(container) => workspace.find_member(container, &data.name, None)?,
        None => workspace.find_declaration(&data.name, None)?,
    };
    render_declaration(
        resolved.source.symbols,
        resolved.kind,
        &data.name,
        resolved.owner.as_deref(),
    )
}

fn detect_context(line_prefix: &str) -> CompletionContext<'_> {
    let partial = line_prefix
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(line_prefix.len(), |(idx, _)| idx);
    let before = &line_prefix[..partial];

    if is_import_path(before) {
        return CompletionContext::ImportPath;
    }
    if before.ends_with('$') {
        return CompletionContext::Variable;
    }
    if let Some(access) = access_before(before) {
        return match access {
            Access::Instance(receiver) => CompletionContext::Member(receiver),
            Access::Static(class) => CompletionContext::Static(class),
        };
    }
    if let Some(rest) = before.strip_suffix('.') {
        // `$a.` is member access, `$a . ` is concatenation.
        if rest.ends_with(|c: char| is_word_char(c) || c == ')') {
            if let Some(receiver) = receiver_expression(rest) {
                return CompletionContext::Member(receiver);
            }
        }
    }

    let trimmed = before.trim_end();
    if before.len() > trimmed.len() && ends_with_word(trimmed, "new") {
        return CompletionContext::ClassName;
    }
    let after_type_keyword = before.len() > trimmed.len()
        && (ends_with_word(trimmed, "extends") || ends_with_word(trimmed, "implements"));
    if after_type_keyword || (trimmed.ends_with(':') && !trimmed.ends_with("::")) {
        return CompletionContext::Type;
    }
    CompletionContext::General
}

fn is_import_path(before: &str) -> bool {
    let Some(rest) = before.trim_start().strip_prefix("use") else {
        return false;
    };
    let rest = rest.trim_start();
    rest.starts_with('"') && rest.matches('"').count() == 1
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word).is_some_and(|head| {
        !head
            .chars()
            .next_back()
            .is_some_and(is_word_char)
    })
}

fn finish(candidates: Vec<CompletionCandidate>, max_items: usize) -> CompletionList {
    let mut seen: HashMap<String, Vec<CompletionItemKind>> = HashMap::new();
    let mut items = Vec::new();
    for candidate in candidates {
        let kinds = seen.entry(candidate.label.clone()).or_default();
        if kinds.contains(&candidate.kind) {
            continue;
        }
        kinds.push(candidate.kind);
        items.push(candidate);
    }
    let is_incomplete = items.len() > max_items;
    items.truncate(max_items);
    CompletionList {
        items,
        is_incomplete,
    }
}

fn call_snippet(name: &str, takes_args: bool, settings: &CompletionSettings) -> Option<String> {
    if !settings.snippets {
        return None;
    }
    Some(if takes_args {
        format!("{name}($0)")
    } else {
        format!("{name}()")
    })
}

fn member_completions(
    inference: &Inference<'_>,
    receiver: &str,
    position: Position,
    settings: &CompletionSettings,
) -> Vec<CompletionCandidate> {
    let Some(ty) = inference.chain_type(receiver, position) else {
        return Vec::new();
    };
    let class = strip_generics(&ty).to_string();
    let workspace = inference.workspace();
    let current = inference.current();
    let on_this = receiver == "$this";

    let mut out = Vec::new();
    for property in workspace.all_properties(&class, current) {
        let public = matches!(
            property.modifiers.visibility,
            None | Some(sola_syntax::ast::Visibility::Public)
        );
        if property.modifiers.is_static || !(public || on_this) {
            continue;
        }
        let mut candidate = CompletionCandidate::new(property.bare_name(), CompletionItemKind::PROPERTY)
            .with_data(&property.name, DeclKind::Property, Some(&class));
        if let Some(ty) = &property.ty {
            candidate = candidate.with_detail(ty.clone());
        }
        out.push(candidate);
    }
    for method in workspace.all_methods(&class, current) {
        if method.is_static() || !(method.is_public() || on_this) || method.name() == "__construct" {
            continue;
        }
        let mut candidate = CompletionCandidate::new(method.name(), CompletionItemKind::METHOD)
            .with_detail(method.signature.label())
            .with_data(method.name(), DeclKind::Method, Some(&method.owner));
        if let Some(snippet) = call_snippet(
            method.name(),
            !method.signature.param_names.is_empty(),
            settings,
        ) {
            candidate = candidate.with_snippet(snippet);
        }
        out.push(candidate);
    }
    out
}

fn static_completions(
    inference: &Inference<'_>,
    class: &str,
    settings: &CompletionSettings,
) -> Vec<CompletionCandidate> {
    let workspace = inference.workspace();
    let current = inference.current();
    let mut out = Vec::new();

    if let Some(source) = workspace.class_source(class, current) {
        if let Some(cases) = source.symbols.enum_values.get(class) {
            for case in cases {
                out.push(
                    CompletionCandidate::new(case, CompletionItemKind::ENUM_MEMBER)
                        .with_detail(format!("case {class}::{case}"))
                        .with_data(case, DeclKind::EnumCase, Some(class)),
                );
            }
        }
    }
    for (owner, source) in workspace.hierarchy(class, current) {
        for constant in source.symbols.constants_of(&owner) {
            let mut candidate = CompletionCandidate::new(&constant.name, CompletionItemKind::CONSTANT)
                .with_data(&constant.name, DeclKind::ClassConst, Some(&owner));
            if let Some(ty) = &constant.ty {
                candidate = candidate.with_detail(ty.clone());
            }
            out.push(candidate);
        }
    }
    for method in workspace.all_methods(class, current) {
        if !method.is_static() {
            continue;
        }
        let mut candidate = CompletionCandidate::new(method.name(), CompletionItemKind::METHOD)
            .with_detail(method.signature.label())
            .with_data(method.name(), DeclKind::Method, Some(&method.owner));
        if let Some(snippet) = call_snippet(
            method.name(),
            !method.signature.param_names.is_empty(),
            settings,
        ) {
            candidate = candidate.with_snippet(snippet);
        }
        out.push(candidate);
    }
    for property in workspace.all_properties(class, current) {
        if !property.modifiers.is_static {
            continue;
        }
        let mut candidate = CompletionCandidate::new(&property.name, CompletionItemKind::PROPERTY)
            .with_data(&property.name, DeclKind::Property, Some(class));
        if let Some(ty) = &property.ty {
            candidate = candidate.with_detail(ty.clone());
        }
        out.push(candidate);
    }
    out
}

/// Variables visible at `position`. After a typed `$` the sigil is left out of the
/// inserted text.
fn variable_completions(
    inference: &Inference<'_>,
    position: Position,
    after_sigil: bool,
) -> Vec<CompletionCandidate> {
    let candidate = |name: &str, ty: Option<String>| {
        let mut candidate = CompletionCandidate::new(name, CompletionItemKind::VARIABLE);
        if after_sigil {
            candidate = candidate.with_insert_text(name.trim_start_matches('$'));
        }
        match ty {
            Some(ty) => candidate.with_detail(ty),
            None => candidate,
        }
    };

    let mut out = Vec::new();
    if enclosing_class(inference.tree(), position).is_some() {
        out.push(candidate("$this", inference.variable_type("$this", position)));
    }
    for binding in visible_bindings(inference.tree(), position) {
        // The variable being typed is its own binding; offering it back is noise.
        if binding.ident.range.end >= position && binding.ident.range.start <= position {
            continue;
        }
        out.push(candidate(
            binding.ident.as_str(),
            inference.binding_type(&binding, position),
        ));
    }
    out
}

fn type_kind(kind: DeclKind) -> CompletionItemKind {
    match kind {
        DeclKind::Class => CompletionItemKind::CLASS,
        DeclKind::Interface => CompletionItemKind::INTERFACE,
        DeclKind::Enum => CompletionItemKind::ENUM,
        DeclKind::TypeAlias => CompletionItemKind::TYPE_PARAMETER,
        DeclKind::Function => CompletionItemKind::FUNCTION,
        DeclKind::Const | DeclKind::ClassConst => CompletionItemKind::CONSTANT,
        DeclKind::Method => CompletionItemKind::METHOD,
        DeclKind::Property => CompletionItemKind::PROPERTY,
        DeclKind::EnumCase => CompletionItemKind::ENUM_MEMBER,
    }
}

/// Declared types. `include_builtins` also offers built-in type names and every
/// type-like declaration; otherwise only instantiable classes are offered.
fn type_completions(
    workspace: Workspace<'_>,
    doc: &DocumentSnapshot,
    include_builtins: bool,
) -> Vec<CompletionCandidate> {
    let mut out = Vec::new();
    if include_builtins {
        for ty in BUILTIN_TYPES {
            out.push(CompletionCandidate::new(*ty, CompletionItemKind::KEYWORD).with_detail("built-in type"));
        }
    }
    for source in current_first(workspace, doc) {
        for (name, kind) in source.symbols.declared_names() {
            let wanted = if include_builtins {
                kind.is_type()
            } else {
                kind == DeclKind::Class
                    && source
                        .symbols
                        .class_signatures
                        .get(name)
                        .is_some_and(|class| !class.modifiers.is_abstract)
            };
            if wanted {
                out.push(
                    CompletionCandidate::new(name, type_kind(kind))
                        .with_detail(kind.label())
                        .with_data(name, kind, None),
                );
            }
        }
    }
    out
}

fn current_first<'a>(
    workspace: Workspace<'a>,
    doc: &'a DocumentSnapshot,
) -> impl Iterator<Item = crate::workspace::SourceView<'a>> + 'a {
    let current = doc.tree().and_then(|tree| {
        doc.symbols().map(|symbols| crate::workspace::SourceView {
            uri: &doc.uri,
            tree,
            symbols,
        })
    });
    current
        .into_iter()
        .chain(workspace.sources().filter(move |source| *source.uri != doc.uri))
}

fn general_completions(
    inference: &Inference<'_>,
    doc: &DocumentSnapshot,
    position: Position,
    settings: &CompletionSettings,
) -> Vec<CompletionCandidate> {
    let mut out = Vec::new();
    if settings.keywords {
        for keyword in KEYWORDS {
            out.push(CompletionCandidate::new(*keyword, CompletionItemKind::KEYWORD).with_detail("keyword"));
        }
    }
    if settings.snippets {
        for (label, body, detail) in SNIPPETS {
            out.push(
                CompletionCandidate::new(*label, CompletionItemKind::SNIPPET)
                    .with_detail(*detail)
                    .with_snippet(*body),
            );
        }
    }

    for source in current_first(inference.workspace(), doc) {
        for (name, kind) in source.symbols.declared_names() {
            let mut candidate = CompletionCandidate::new(name, type_kind(kind)).with_data(name, kind, None);
            match kind {
                DeclKind::Function => {
                    if let Some(function) = source.symbols.get_function(name) {
                        candidate = candidate.with_detail(function.label());
                        if let Some(snippet) =
                            call_snippet(name, !function.param_names.is_empty(), settings)
                        {
                            candidate = candidate.with_snippet(snippet);
                        }
                    }
                }
                DeclKind::Const => {
                    if let Some(ty) = source.symbols.constants.get(name).and_then(|c| c.ty.clone()) {
                        candidate = candidate.with_detail(ty);
                    }
                }
                _ => candidate = candidate.with_detail(kind.label()),
            }
            out.push(candidate);
        }
    }

    for (name, params, ret) in BUILTIN_SIGNATURES {
        let mut candidate = CompletionCandidate::new(*name, CompletionItemKind::FUNCTION)
            .with_detail(format!("{name}({}): {ret}", params.join(", ")));
        if let Some(snippet) = call_snippet(name, !params.is_empty(), settings) {
            candidate = candidate.with_snippet(snippet);
        }
        out.push(candidate);
    }

    out.extend(variable_completions(inference, position, false));
    out
}

fn import_path_completions(doc: &DocumentSnapshot, workspace: Workspace<'_>) -> Vec<CompletionCandidate> {
    let Some(document_path) = doc.path() else {
        return Vec::new();
    };
    let Some(document_directory) = document_path.parent().map(Path::to_path_buf) else {
        return Vec::new();
    };
    let project_root = workspace
        .index
        .and_then(|index| index.root())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| open_documents_root(&document_directory, workspace.documents));

    let mut entries = workspace_source_entries(&project_root, &document_directory, &document_path);
    // Open buffers may not exist on disk yet.
    for other in workspace.documents {
        if let Some(path) = other.path().filter(|path| *path != document_path) {
            if let Some(entry) = path_completion_from_file(&project_root, &document_directory, &path) {
                if !entries.iter().any(|existing| existing.insert_text == entry.insert_text) {
                    entries.push(entry);
                }
            }
        }
    }

    entries
        .into_iter()
        .map(|entry| {
            CompletionCandidate::new(entry.insert_text.clone(), CompletionItemKind::FILE)
                .with_detail(entry.label)
        })
        .collect()
}

/// Without an indexed root, the deepest directory holding every open document. Never
/// widens to a filesystem root.
fn open_documents_root(document_directory: &Path, documents: &[DocumentSnapshot]) -> PathBuf {
    let mut root = document_directory.to_path_buf();
    for directory in documents
        .iter()
        .filter_map(|doc| doc.path())
        .filter_map(|path| path.parent().map(Path::to_path_buf))
    {
        let shared: PathBuf = root
            .components()
            .zip(directory.components())
            .take_while(|(a, b)| a == b)
            .map(|(component, _)| component)
            .collect();
        if shared.parent().is_some() {
            root = shared;
        }
    }
    root
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PathCompletion {
    /// Project-relative path.
    label: String,
    /// Document-relative path without the extension, as written in `use "..."`.
    insert_text: String,
}

fn workspace_source_entries(
    project_root: &Path,
    document_directory: &Path,
    document_path: &Path,
) -> Vec<PathCompletion> {
    if !project_root.is_dir() {
        return Vec::new();
    }

    let mut entries = Vec::new();
    let mut walker = WalkBuilder::new(project_root);
    walker
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .ignore(true)
        .add_custom_ignore_filename(".gitignore")
        .hidden(false)
        .follow_links(false)
        .standard_filters(true);

    for result in walker.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
            continue;
        }
        if entry.path() == document_path || !is_source_path(entry.path()) {
            continue;
        }
        if let Some(candidate) = path_completion_from_file(project_root, document_directory, entry.path()) {
            entries.push(candidate);
            if entries.len() >= MAX_PATH_COMPLETIONS {
                break;
            }
        }
    }

    entries.sort_by(|a, b| a.label.cmp(&b.label));
    entries
}

fn path_completion_from_file(
    project_root: &Path,
    document_directory: &Path,
    file_path: &Path,
) -> Option<PathCompletion> {
    let label_path = diff_paths(file_path, project_root).unwrap_or_else(|| file_path.to_path_buf());
    let insert_path: PathBuf = diff_paths(file_path, document_directory)
        .unwrap_or_else(|| file_path.to_path_buf())
        .with_extension("");

    let label = normalize_path(&label_path)?;
    let insert_text = normalize_path(&insert_path)?;
    if label.is_empty() || insert_text.is_empty() {
        return None;
    }
    Some(PathCompletion { label, insert_text })
}

pub(crate) fn normalize_path(path: &Path) -> Option<String> {
    path.components().next()?;
    let mut value = path.to_string_lossy().replace('\\', "/");
    while let Some(rest) = value.strip_prefix("./") {
        value = rest.to_string();
    }
    if value == "." {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_snapshot, snapshot};
    use crate::workspace_index::WorkspaceIndex;
    use std::fs;
    use tempfile::tempdir;

    fn complete(docs: &[DocumentSnapshot], line: u32, column: u32) -> CompletionList {
        completion_items(
            &docs[0],
            Workspace::new(docs, None),
            Position::new(line, column),
            &CompletionSettings::default(),
        )
    }

    fn labels(list: &CompletionList) -> Vec<&str> {
        list.items.iter().map(|item| item.label.as_str()).collect()
    }

    #[test]
    fn classifies_the_text_before_the_cursor() {
        assert_eq!(detect_context("$a->"), CompletionContext::Member("$a"));
        assert_eq!(detect_context("$a->na"), CompletionContext::Member("$a"));
        assert_eq!(detect_context("$a?->"), CompletionContext::Member("$a"));
        assert_eq!(detect_context("  $user."), CompletionContext::Member("$user"));
        assert_eq!(detect_context("Status::Ac"), CompletionContext::Static("Status"));
        assert_eq!(detect_context("print($"), CompletionContext::Variable);
        assert_eq!(detect_context("$u := new Us"), CompletionContext::ClassName);
        assert_eq!(detect_context("function f($x: "), CompletionContext::Type);
        assert_eq!(detect_context("class B extends "), CompletionContext::Type);
        assert_eq!(detect_context("use \"lib/"), CompletionContext::ImportPath);
        assert_eq!(detect_context("$s := $a . "), CompletionContext::General);
        assert_eq!(detect_context("renew"), CompletionContext::General);
    }

    #[test]
    fn members_of_the_receiver_type() {
        let docs = vec![snapshot(
            "file:///c.sola",
            "class A { public $n: string; }\n$a := new A()\n$a->",
        )];
        let list = complete(&docs, 3, 5);
        let n = list
            .items
            .iter()
            .find(|item| item.label == "n")
            .expect("property n");
        assert_eq!(n.kind, CompletionItemKind::PROPERTY);
        assert_eq!(n.detail.as_deref(), Some("string"));
    }

    #[test]
    fn private_members_only_through_this() {
        let docs = vec![snapshot(
            "file:///p.sola",
            "class A {\n  private $secret: int;\n  public function open(): int { return 1; }\n  function inner() { $this-> }\n}\n$a := new A()\n$a->",
        )];
        let outside = complete(&docs, 7, 5);
        assert_eq!(labels(&outside), vec!["inner", "open"]);

        let inside = complete(&docs, 4, 29);
        assert!(labels(&inside).contains(&"secret"));
        let open = inside
            .items
            .iter()
            .find(|item| item.label == "open")
            .expect("open");
        assert_eq!(open.insert_text.as_deref(), Some("open()"));
        assert!(open.is_snippet);
    }

    #[test]
    fn static_access_offers_enum_cases() {
        let doc = sample_snapshot();
        let text = format!("{}\n$s := Status::", doc.text());
        let docs = vec![snapshot("file:///s.sola", &text)];
        let last = text.lines().count() as u32;
        let list = complete(&docs, last, 15);
        assert_eq!(labels(&list), vec!["Active", "Banned"]);
        assert!(list
            .items
            .iter()
            .all(|item| item.kind == CompletionItemKind::ENUM_MEMBER));
    }

    #[test]
    fn variables_visible_at_the_cursor() {
        let docs = vec![snapshot(
            "file:///v.sola",
            "$total := 0\nfunction f(int $count) {\n  $local := 1.5\n  print($\n}\n$after := 2",
        )];
        let list = complete(&docs, 4, 10);
        let names = labels(&list);
        assert!(names.contains(&"$count"));
        assert!(names.contains(&"$local"));
        assert!(names.contains(&"$total"));
        assert!(!names.contains(&"$after"));
        let local = list
            .items
            .iter()
            .find(|item| item.label == "$local")
            .expect("$local");
        assert_eq!(local.detail.as_deref(), Some("float"));
        assert_eq!(local.insert_text.as_deref(), Some("local"));
    }

    #[test]
    fn general_context_mixes_keywords_symbols_and_builtins() {
        let docs = vec![
            snapshot("file:///g.sola", "function helper(): int { return 1; }\n"),
            snapshot("file:///other.sola", "class Remote {}"),
        ];
        let list = complete(&docs, 2, 1);
        let names = labels(&list);
        assert!(names.contains(&"foreach"));
        assert!(names.contains(&"helper"));
        assert!(names.contains(&"Remote"));
        assert!(names.contains(&"strlen"));

        // Keyword and snippet share a label but not a kind.
        let classes: Vec<_> = list.items.iter().filter(|item| item.label == "class").collect();
        assert_eq!(classes.len(), 2);
    }

    #[test]
    fn settings_cap_and_filter() {
        let docs = vec![snapshot("file:///g.sola", "\n")];
        let settings = CompletionSettings {
            keywords: false,
            snippets: false,
            max_items: 3,
        };
        let list = completion_items(&docs[0], Workspace::new(&docs, None), Position::new(1, 1), &settings);
        assert_eq!(list.items.len(), 3);
        assert!(list.is_incomplete);
        assert!(list
            .items
            .iter()
            .all(|item| item.kind != CompletionItemKind::KEYWORD && !item.is_snippet));
    }

    #[test]
    fn new_offers_concrete_classes() {
        let docs = vec![snapshot(
            "file:///n.sola",
            "abstract class Shape {}\nclass Circle extends Shape {}\ninterface Drawable {}\n$c := new ",
        )];
        let list = complete(&docs, 4, 11);
        assert_eq!(labels(&list), vec!["Circle"]);
    }

    #[test]
    fn resolve_renders_documentation() {
        let docs = vec![snapshot(
            "file:///r.sola",
            "/** Adds things. */\nfunction add(int $a, int $b): int { return $a + $b; }",
        )];
        let data = CompletionData {
            name: "add".into(),
            kind: DeclKind::Function,
            container: None,
        };
        let markdown = resolve_completion(&data, Workspace::new(&docs, None)).expect("docs");
        assert!(markdown.contains("function add($a: int, $b: int): int"));
        assert!(markdown.contains("Adds things."));

        let json = serde_json::to_value(&data).expect("serialize");
        assert_eq!(json, serde_json::json!({"name": "add", "kind": "function"}));
    }

    #[test]
    fn import_paths_are_document_relative() {
        let temp = tempdir().expect("temp dir");
        let root = temp.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::write(root.join("lib/strings.sola"), "function pad() {}").unwrap();
        fs::write(root.join("notes.txt"), "not source").unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        let document_path = root.join("app/main.sola");
        fs::write(&document_path, "use \"").unwrap();

        let uri = lsp_types::Url::from_file_path(&document_path).unwrap();
        let docs = vec![snapshot(uri.as_str(), "use \"")];
        let index = WorkspaceIndex::new(Some(root.to_path_buf()));
        let list = completion_items(
            &docs[0],
            Workspace::new(&docs, Some(&index)),
            Position::new(1, 6),
            &CompletionSettings::default(),
        );
        let names = labels(&list);
        assert_eq!(names, vec!["../lib/strings"]);
        assert_eq!(list.items[0].kind, CompletionItemKind::FILE);
        assert_eq!(list.items[0].detail.as_deref(), Some("lib/strings.sola"));
    }

    #[test]
    fn import_paths_without_an_index_cover_every_open_directory() {
        let temp = tempdir().expect("temp dir");
        let root = temp.path();
        fs::create_dir_all(root.join("lib")).unwrap();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::write(root.join("lib/strings.sola"), "function pad() {}").unwrap();
        let main = lsp_types::Url::from_file_path(root.join("app/main.sola")).unwrap();
        let dates = lsp_types::Url::from_file_path(root.join("lib/dates.sola")).unwrap();
        let docs = vec![
            snapshot(main.as_str(), "use \""),
            snapshot(dates.as_str(), "function today() {}"),
        ];

        let list = complete(&docs, 1, 6);
        let mut names = labels(&list);
        names.sort();
        assert_eq!(names, vec!["../lib/dates", "../lib/strings"]);
    }
}
