//! Code actions.
//!
//! Quick fixes are keyed on the messages produced by the parser and the type checker, so
//! they only need the diagnostics the client sends back. Refactorings look at the
//! selection and the tree.

use crate::completion::normalize_path;
use crate::diagnostics::{unused_import_decls, SolaDiagnostic};
use crate::document::DocumentSnapshot;
use crate::edits::{push_edit, SolaTextEdit, SolaWorkspaceEdit};
use crate::go_to_definition::resolve_use_target;
use crate::utils::{enclosing_class, enclosing_function, indentation, word_occurrences, ClassLike};
use crate::visitor::{walk_tree, FunctionRef, NameKind, NameRef, Visitor};
use crate::workspace::Workspace;
use lsp_types::{CodeActionKind, Url};
use pathdiff::diff_paths;
use sola_syntax::ast::{ClassDecl, Expr, ExprKind, PropertyDecl, Stmt, StmtKind, Tree};
use sola_syntax::lexer::is_builtin_type;
use sola_syntax::{Position, Range};
use std::collections::HashSet;

/// Tokens the "Insert" quick fix offers for `expected 'X'` parse errors.
const INSERTABLE_TOKENS: &[&str] = &[";", ")", "]", "}", ",", ":"];
const DEFAULT_INDENT: &str = "    ";

#[derive(Debug, Clone, PartialEq)]
pub struct SolaCodeAction {
    pub title: String,
    pub kind: CodeActionKind,
    pub edit: SolaWorkspaceEdit,
    /// The diagnostics this action resolves.
    pub diagnostics: Vec<SolaDiagnostic>,
    pub is_preferred: bool,
}

impl SolaCodeAction {
    fn new(title: impl Into<String>, kind: CodeActionKind, uri: &Url, edits: Vec<SolaTextEdit>) -> Self {
        let mut edit = SolaWorkspaceEdit::new();
        for text_edit in edits {
            push_edit(&mut edit, uri, text_edit);
        }
        Self {
            title: title.into(),
            kind,
            edit,
            diagnostics: Vec::new(),
            is_preferred: false,
        }
    }

    fn resolving(mut self, diagnostic: &SolaDiagnostic) -> Self {
        self.diagnostics.push(diagnostic.clone());
        self.is_preferred = true;
        self
    }

    /// The edits for `uri`, if any.
    pub fn edits_for(&self, uri: &Url) -> &[SolaTextEdit] {
        self.edit.get(uri).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Actions available for `range`, given the diagnostics the client reports there.
pub fn code_actions(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    range: Range,
    diagnostics: &[SolaDiagnostic],
) -> Vec<SolaCodeAction> {
    let mut actions: Vec<SolaCodeAction> = diagnostics
        .iter()
        .filter_map(|diagnostic| quick_fix(doc, diagnostic))
        .collect();
    let Some(tree) = doc.tree() else {
        return actions;
    };
    actions.extend(add_missing_import(doc, workspace, tree, range.start));
    if range.start != range.end {
        actions.extend(extract_variable(doc, tree, range));
        actions.extend(extract_method(doc, tree, range));
    }
    if let Some(ClassLike::Class(class)) = enclosing_class(tree, range.start) {
        actions.extend(generate_constructor(doc, class));
        actions.extend(generate_accessors(doc, class, range.start));
        actions.extend(implement_interface_methods(doc, workspace, class));
    }
    actions.extend(organize_imports(doc, tree));
    tracing::trace!(count = actions.len(), "computed code actions");
    actions
}

/// The first single-quoted word after `prefix`.
fn quoted<'m>(message: &'m str, prefix: &str) -> Option<&'m str> {
    let rest = message.strip_prefix(prefix)?.strip_prefix('\'')?;
    rest.split('\'').next().filter(|word| !word.is_empty())
}

fn quick_fix(doc: &DocumentSnapshot, diagnostic: &SolaDiagnostic) -> Option<SolaCodeAction> {
    let uri = &doc.uri;
    let message = diagnostic.message.as_str();
    if let Some(token) = quoted(message, "expected ").filter(|token| INSERTABLE_TOKENS.contains(token)) {
        let edit = SolaTextEdit::insert(diagnostic.range.start, token);
        return Some(
            SolaCodeAction::new(format!("Insert '{token}'"), CodeActionKind::QUICKFIX, uri, vec![edit])
                .resolving(diagnostic),
        );
    }
    if let Some(name) = quoted(message, "undefined variable ") {
        let line = diagnostic.range.start.line;
        let indent = indentation(doc.buffer.line(line).unwrap_or_default());
        let edit = SolaTextEdit::insert(Position::new(line, 1), format!("{indent}{name} := null\n"));
        return Some(
            SolaCodeAction::new(format!("Declare variable '{name}'"), CodeActionKind::QUICKFIX, uri, vec![edit])
                .resolving(diagnostic),
        );
    }
    if let Some(name) = quoted(message, "undefined function ") {
        let arity = doc
            .tree()
            .and_then(|tree| call_arity(tree, diagnostic.range.start))
            .unwrap_or(0);
        let params = (1..=arity).map(|n| format!("$arg{n}")).collect::<Vec<_>>().join(", ");
        let text = format!("{}function {name}({params}) {{\n}}\n", append_separator(doc));
        let edit = SolaTextEdit::insert(doc.buffer.end_position(), text);
        return Some(
            SolaCodeAction::new(format!("Create function '{name}'"), CodeActionKind::QUICKFIX, uri, vec![edit])
                .resolving(diagnostic),
        );
    }
    None
}

/// What to put before text appended at the end of the document so it starts after a
/// blank line.
fn append_separator(doc: &DocumentSnapshot) -> &'static str {
    let text = doc.text();
    if text.is_empty() || text.ends_with("\n\n") {
        ""
    } else if text.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    }
}

struct CallArity {
    callee_start: Position,
    arity: Option<usize>,
}

impl<'a> Visitor<'a> for CallArity {
    fn visit_expr(&mut self, expr: &'a Expr) {
        if let ExprKind::Call { callee, args } = &expr.kind {
            if self.arity.is_none() && callee.range.start == self.callee_start {
                self.arity = Some(args.len());
            }
        }
    }
}

fn call_arity(tree: &Tree, callee_start: Position) -> Option<usize> {
    let mut finder = CallArity {
        callee_start,
        arity: None,
    };
    walk_tree(tree, &mut finder);
    finder.arity
}

fn line_end(doc: &DocumentSnapshot, line: u32) -> Position {
    let len = doc.buffer.line(line).map_or(0, |text| text.chars().count());
    Position::new(line, len as u32 + 1)
}

/// The document's indentation step, taken from its first indented line.
fn indent_unit(doc: &DocumentSnapshot) -> String {
    match doc.buffer.lines().map(indentation).find(|indent| !indent.is_empty()) {
        Some(indent) if indent.starts_with('\t') => "\t".to_string(),
        Some(indent) => indent.to_string(),
        None => DEFAULT_INDENT.to_string(),
    }
}

/// A name based on `base` that does not occur in `text`.
fn unique_name(text: &str, base: &str) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while !word_occurrences(text, &candidate).is_empty() {
        candidate = format!("{base}{suffix}");
        suffix += 1;
    }
    candidate
}

fn add_missing_import(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    tree: &Tree,
    position: Position,
) -> Option<SolaCodeAction> {
    let word = doc.buffer.word_at(position)?;
    let name = word.text.as_str();
    if word.is_variable() || !name.starts_with(char::is_uppercase) || is_builtin_type(name) {
        return None;
    }
    if doc.symbols()?.kind_of(name).is_some() || tree.uses().any(|decl| decl.effective_name() == name) {
        return None;
    }
    let source = workspace.sources().find(|source| {
        *source.uri != doc.uri && source.symbols.kind_of(name).is_some_and(|kind| kind.is_type())
    })?;
    // Already reachable through a file import.
    if tree
        .uses()
        .any(|decl| resolve_use_target(doc, workspace, decl).as_ref() == Some(source.uri))
    {
        return None;
    }

    let current = doc.path()?;
    let target = source.uri.to_file_path().ok()?;
    let relative = diff_paths(target, current.parent()?)?.with_extension("");
    let relative = normalize_path(&relative)?;
    let edit = import_insertion(doc, tree, &format!("use \"{relative}\""));
    Some(SolaCodeAction::new(
        format!("Import '{name}' from \"{relative}\""),
        CodeActionKind::QUICKFIX,
        &doc.uri,
        vec![edit],
    ))
}

/// Inserts `line` after the last import, after the namespace declaration, or at the top.
fn import_insertion(doc: &DocumentSnapshot, tree: &Tree, line: &str) -> SolaTextEdit {
    if let Some(last) = tree.uses().map(|decl| decl.range.end.line).max() {
        return SolaTextEdit::insert(line_end(doc, last), format!("\n{line}"));
    }
    if let Some(namespace) = tree.namespace() {
        return SolaTextEdit::insert(line_end(doc, namespace.range.end.line), format!("\n\n{line}"));
    }
    SolaTextEdit::insert(Position::new(1, 1), format!("{line}\n\n"))
}

/// `range` without surrounding whitespace, for single-line selections.
fn trim_selection(doc: &DocumentSnapshot, range: Range) -> Option<Range> {
    let text = doc.buffer.slice(range);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let leading = text[..text.len() - text.trim_start().len()].chars().count() as u32;
    let trailing = text[text.trim_end().len()..].chars().count() as u32;
    Some(Range::new(
        Position::new(range.start.line, range.start.column + leading),
        Position::new(range.end.line, range.end.column - trailing),
    ))
}

struct ExprAt<'a> {
    range: Range,
    found: Option<&'a Expr>,
}

impl<'a> Visitor<'a> for ExprAt<'a> {
    fn visit_expr(&mut self, expr: &'a Expr) {
        if self.found.is_none() && expr.range == self.range {
            self.found = Some(expr);
        }
    }
}

struct InnermostStmt<'a> {
    range: Range,
    found: Option<&'a Stmt>,
}

impl<'a> Visitor<'a> for InnermostStmt<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        let smaller = self.found.map_or(true, |found| found.range.encloses(&stmt.range));
        if stmt.range.encloses(&self.range) && smaller {
            self.found = Some(stmt);
        }
    }
}

fn is_declaration(stmt: &Stmt) -> bool {
    matches!(
        stmt.kind,
        StmtKind::Namespace(_)
            | StmtKind::Use(_)
            | StmtKind::Class(_)
            | StmtKind::Interface(_)
            | StmtKind::Enum(_)
            | StmtKind::TypeAlias(_)
            | StmtKind::Function(_)
            | StmtKind::Const(_)
    )
}

fn extract_variable(doc: &DocumentSnapshot, tree: &Tree, range: Range) -> Option<SolaCodeAction> {
    if range.is_multiline() {
        return None;
    }
    let target = trim_selection(doc, range)?;
    let mut finder = ExprAt { range: target, found: None };
    walk_tree(tree, &mut finder);
    let expr = finder.found?;
    if matches!(expr.kind, ExprKind::Variable(_)) {
        return None;
    }

    let mut statement = InnermostStmt { range: target, found: None };
    walk_tree(tree, &mut statement);
    let stmt = statement.found?;
    if is_declaration(stmt) {
        return None;
    }
    let line = stmt.range.start.line;
    let indent = indentation(doc.buffer.line(line)?);
    let name = unique_name(doc.text(), "$extracted");
    let value = doc.buffer.slice(expr.range);
    let edits = vec![
        SolaTextEdit::insert(Position::new(line, 1), format!("{indent}{name} := {value}\n")),
        SolaTextEdit::replace(expr.range, name),
    ];
    Some(SolaCodeAction::new(
        "Extract variable",
        CodeActionKind::REFACTOR_EXTRACT,
        &doc.uri,
        edits,
    ))
}

/// The outermost statements lying entirely inside `range`.
struct StatementsIn<'a> {
    range: Range,
    found: Vec<&'a Stmt>,
}

impl<'a> Visitor<'a> for StatementsIn<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        let nested = self.found.iter().any(|outer| outer.range.encloses(&stmt.range));
        if self.range.encloses(&stmt.range) && !nested {
            self.found.push(stmt);
        }
    }
}

/// Variables read and written by a run of statements, and the reads that follow it.
struct DataFlow<'a> {
    span: Range,
    scope: Range,
    declared: HashSet<&'a str>,
    reads: Vec<&'a str>,
    writes: Vec<&'a str>,
    reads_after: HashSet<&'a str>,
}

impl<'a> DataFlow<'a> {
    fn collect(tree: &'a Tree, span: Range, scope: Range) -> Self {
        let mut flow = DataFlow {
            span,
            scope,
            declared: HashSet::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            reads_after: HashSet::new(),
        };
        walk_tree(tree, &mut flow);
        flow
    }

    /// Variables the extracted code needs from its caller.
    fn inputs(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.reads
            .iter()
            .copied()
            .filter(|name| !self.declared.contains(name) && seen.insert(*name))
            .collect()
    }

    /// Variables the extracted code assigns and the caller reads afterwards.
    fn outputs(&self) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        self.writes
            .iter()
            .copied()
            .filter(|name| self.reads_after.contains(name) && seen.insert(*name))
            .collect()
    }
}

impl<'a> Visitor<'a> for DataFlow<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if !self.span.encloses(&stmt.range) {
            return;
        }
        match &stmt.kind {
            StmtKind::Var(var) => {
                self.declared.insert(var.name.as_str());
            }
            StmtKind::Foreach(foreach) => {
                self.declared.insert(foreach.value.as_str());
                if let Some(key) = &foreach.key {
                    self.declared.insert(key.as_str());
                }
            }
            _ => {}
        }
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        if self.span.encloses(&function.range()) {
            self.declared.extend(function.params().iter().map(|param| param.name.as_str()));
        }
        true
    }

    fn visit_name(&mut self, name: NameRef<'a>) {
        if name.kind != NameKind::Variable || name.ident.as_str() == "$this" {
            return;
        }
        let range = name.ident.range;
        let ident = name.ident.as_str();
        if self.span.encloses(&range) {
            if name.is_write {
                self.writes.push(ident);
            } else {
                self.reads.push(ident);
            }
        } else if !name.is_write && self.scope.encloses(&range) && range.start >= self.span.end {
            self.reads_after.insert(ident);
        }
    }
}

fn extract_method(doc: &DocumentSnapshot, tree: &Tree, range: Range) -> Option<SolaCodeAction> {
    let mut collector = StatementsIn { range, found: Vec::new() };
    walk_tree(tree, &mut collector);
    let stmts = collector.found;
    let (first, last) = (stmts.first()?, stmts.last()?);
    let control_flow = |stmt: &&Stmt| {
        matches!(stmt.kind, StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue)
    };
    if stmts.iter().any(|stmt| is_declaration(stmt)) || stmts.iter().any(control_flow) {
        return None;
    }
    // Only whitespace may separate the selection from the statements, and the statements
    // from each other, so they are siblings.
    let separator = |text: &str| text.chars().all(|c| c.is_whitespace() || c == ';');
    let span = Range::new(first.range.start, last.range.end);
    if !separator(doc.buffer.slice(Range::new(range.start, span.start)))
        || !separator(doc.buffer.slice(Range::new(span.end, range.end)))
        || !stmts
            .windows(2)
            .all(|pair| separator(doc.buffer.slice(Range::new(pair[0].range.end, pair[1].range.start))))
    {
        return None;
    }

    let function = enclosing_function(tree, span.start);
    let function_range = function.map(|(_, decl)| decl.range);
    if enclosing_function(tree, span.end).map(|(_, decl)| decl.range) != function_range {
        return None;
    }
    let flow = DataFlow::collect(tree, span, function_range.unwrap_or_else(|| doc.buffer.full_range()));
    let outputs = flow.outputs();
    if outputs.len() > 1 {
        return None;
    }
    let output = outputs.first().copied();
    let inputs = flow.inputs();

    let name = unique_name(doc.text(), "extracted");
    let args = inputs.join(", ");
    let is_method = function.is_some_and(|(owner, _)| owner.is_some());
    let is_static = function.is_some_and(|(_, decl)| decl.modifiers.is_static);
    let call = match (is_method, is_static) {
        (true, false) => format!("$this->{name}({args})"),
        (true, true) => format!("self::{name}({args})"),
        (false, _) => format!("{name}({args})"),
    };
    let call = match output {
        Some(var) if inputs.contains(&var) => format!("{var} = {call}"),
        Some(var) => format!("{var} := {call}"),
        None => call,
    };

    let unit = indent_unit(doc);
    let (decl_indent, insert_at, prefix, suffix) = match function {
        Some((_, decl)) => (
            indentation(doc.buffer.line(decl.range.start.line)?).to_string(),
            line_end(doc, decl.range.end.line),
            "\n\n",
            "",
        ),
        None => (String::new(), doc.buffer.end_position(), append_separator(doc), "\n"),
    };
    let body_indent = format!("{decl_indent}{unit}");
    let base_indent = indentation(doc.buffer.line(span.start.line)?);
    let mut body: Vec<String> = doc
        .buffer
        .slice(span)
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let line = if idx == 0 {
                line
            } else {
                line.strip_prefix(base_indent).unwrap_or_else(|| line.trim_start())
            };
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{body_indent}{line}")
            }
        })
        .collect();
    if let Some(var) = output {
        body.push(format!("{body_indent}return {var}"));
    }
    let visibility = match (is_method, is_static) {
        (true, false) => "private ",
        (true, true) => "private static ",
        (false, _) => "",
    };
    let declaration = format!(
        "{prefix}{decl_indent}{visibility}function {name}({args}) {{\n{}\n{decl_indent}}}{suffix}",
        body.join("\n")
    );
    let title = if is_method { "Extract method" } else { "Extract function" };
    Some(SolaCodeAction::new(
        title,
        CodeActionKind::REFACTOR_EXTRACT,
        &doc.uri,
        vec![
            SolaTextEdit::replace(span, call),
            SolaTextEdit::insert(insert_at, declaration),
        ],
    ))
}

/// Where a new member goes: after the last member of a multi-line class, or just inside
/// the braces of a single-line one. Returns the position, the member indentation and the
/// text to put before and after the member.
fn member_insertion(doc: &DocumentSnapshot, class: &ClassDecl) -> Option<(Position, String, &'static str, &'static str)> {
    let unit = indent_unit(doc);
    let class_indent = indentation(doc.buffer.line(class.range.start.line)?);
    let body = class.body_range;
    let indent = class
        .members
        .first()
        .map(|member| member.range().start.line)
        .filter(|line| *line != body.start.line)
        .and_then(|line| doc.buffer.line(line))
        .map(|line| indentation(line).to_string())
        .unwrap_or_else(|| format!("{class_indent}{unit}"));
    if !body.is_multiline() {
        let closing = Position::new(body.end.line, body.end.column.saturating_sub(1));
        return Some((closing, indent, "\n", "\n"));
    }
    let before_closing = body.end.line - 1;
    let prefix = if before_closing == body.start.line { "\n" } else { "\n\n" };
    Some((line_end(doc, before_closing), indent, prefix, ""))
}

fn property_param(property: &PropertyDecl) -> String {
    let bare = property.name.bare();
    match &property.ty {
        Some(ty) => format!("${bare}: {ty}"),
        None => format!("${bare}"),
    }
}

fn generate_constructor(doc: &DocumentSnapshot, class: &ClassDecl) -> Option<SolaCodeAction> {
    if class.find_method("__construct").is_some() {
        return None;
    }
    let properties: Vec<&PropertyDecl> = class
        .properties()
        .filter(|property| !property.modifiers.is_static)
        .collect();
    let last = properties.last()?;
    let (mut position, indent, mut prefix, suffix) = member_insertion(doc, class)?;
    if last.range.end.line < class.body_range.end.line {
        position = line_end(doc, last.range.end.line);
        prefix = "\n\n";
    }
    let unit = indent_unit(doc);
    let params = properties.iter().map(|property| property_param(property)).collect::<Vec<_>>();
    let assignments: String = properties
        .iter()
        .map(|property| {
            let bare = property.name.bare();
            format!("\n{indent}{unit}$this->{bare} = ${bare}")
        })
        .collect();
    let text = format!(
        "{prefix}{indent}public function __construct({}) {{{assignments}\n{indent}}}{suffix}",
        params.join(", ")
    );
    Some(SolaCodeAction::new(
        "Generate constructor",
        CodeActionKind::REFACTOR,
        &doc.uri,
        vec![SolaTextEdit::insert(position, text)],
    ))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn generate_accessors(doc: &DocumentSnapshot, class: &ClassDecl, position: Position) -> Vec<SolaCodeAction> {
    let mut actions = Vec::new();
    let Some(property) = class
        .properties()
        .find(|property| property.range.touches(position) && !property.modifiers.is_static)
    else {
        return actions;
    };
    let Some((insert_at, indent, prefix, suffix)) = member_insertion(doc, class) else {
        return actions;
    };
    let unit = indent_unit(doc);
    let bare = property.name.bare();
    let accessor = capitalize(bare);

    let getter = format!("get{accessor}");
    if class.find_method(&getter).is_none() {
        let returns = property.ty.as_ref().map(|ty| format!(": {ty}")).unwrap_or_default();
        let text = format!(
            "{prefix}{indent}public function {getter}(){returns} {{\n{indent}{unit}return $this->{bare}\n{indent}}}{suffix}"
        );
        actions.push(SolaCodeAction::new(
            format!("Generate getter for '{}'", property.name.as_str()),
            CodeActionKind::REFACTOR,
            &doc.uri,
            vec![SolaTextEdit::insert(insert_at, text)],
        ));
    }

    let setter = format!("set{accessor}");
    if !property.modifiers.is_readonly && class.find_method(&setter).is_none() {
        let text = format!(
            "{prefix}{indent}public function {setter}({}): void {{\n{indent}{unit}$this->{bare} = ${bare}\n{indent}}}{suffix}",
            property_param(property)
        );
        actions.push(SolaCodeAction::new(
            format!("Generate setter for '{}'", property.name.as_str()),
            CodeActionKind::REFACTOR,
            &doc.uri,
            vec![SolaTextEdit::insert(insert_at, text)],
        ));
    }
    actions
}

fn implement_interface_methods(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    class: &ClassDecl,
) -> Option<SolaCodeAction> {
    if class.modifiers.is_abstract || class.implements.is_empty() {
        return None;
    }
    let hierarchy = workspace.hierarchy(class.name.as_str(), Some(doc));
    let implemented: HashSet<&str> = hierarchy
        .iter()
        .filter(|(owner, source)| source.symbols.class_signatures.contains_key(owner))
        .flat_map(|(owner, source)| source.symbols.methods_of(owner).map(|method| method.name()))
        .collect();
    let mut seen = HashSet::new();
    let missing: Vec<_> = hierarchy
        .iter()
        .filter(|(owner, source)| source.symbols.interface_sigs.contains_key(owner))
        .flat_map(|(owner, source)| source.symbols.methods_of(owner))
        .filter(|method| !implemented.contains(method.name()) && seen.insert(method.name()))
        .collect();
    if missing.is_empty() {
        return None;
    }

    let (position, indent, prefix, suffix) = member_insertion(doc, class)?;
    let stubs: Vec<String> = missing
        .iter()
        .map(|method| {
            let signature = &method.signature;
            let returns = signature
                .return_type
                .as_ref()
                .map(|ty| format!(": {ty}"))
                .unwrap_or_default();
            format!(
                "{indent}public function {}({}){returns} {{\n{indent}}}",
                method.name(),
                signature.parameter_labels().join(", ")
            )
        })
        .collect();
    let text = format!("{prefix}{}{suffix}", stubs.join("\n\n"));
    let title = match missing.as_slice() {
        [only] => format!("Implement method '{}'", only.name()),
        _ => format!("Implement {} interface methods", missing.len()),
    };
    Some(SolaCodeAction::new(
        title,
        CodeActionKind::QUICKFIX,
        &doc.uri,
        vec![SolaTextEdit::insert(position, text)],
    ))
}

fn organize_imports(doc: &DocumentSnapshot, tree: &Tree) -> Option<SolaCodeAction> {
    let uses: Vec<_> = tree.uses().collect();
    let start_line = uses.first()?.range.start.line;
    let end_line = uses.iter().map(|decl| decl.range.end.line).max()?;
    for line in start_line..=end_line {
        let text = doc.buffer.line(line)?.trim();
        if !(text.is_empty() || text.starts_with("use ")) {
            return None;
        }
    }

    let unused: HashSet<Range> = unused_import_decls(tree).into_iter().map(|decl| decl.range).collect();
    let mut dotted = Vec::new();
    let mut files = Vec::new();
    for decl in uses.iter().filter(|decl| !unused.contains(&decl.range)) {
        let text = doc.buffer.slice(decl.range).trim().to_string();
        if decl.is_file {
            files.push(text);
        } else {
            dotted.push(text);
        }
    }
    dotted.sort_by_key(|text| text.to_lowercase());
    dotted.dedup();
    files.sort();
    files.dedup();
    dotted.extend(files);
    let replacement = dotted.join("\n");

    let mut range = Range::new(Position::new(start_line, 1), line_end(doc, end_line));
    if replacement.is_empty() && (end_line as usize) < doc.buffer.line_count() {
        range.end = Position::new(end_line + 1, 1);
    }
    if doc.buffer.slice(range) == replacement {
        return None;
    }
    Some(SolaCodeAction::new(
        "Organize imports",
        CodeActionKind::SOURCE_ORGANIZE_IMPORTS,
        &doc.uri,
        vec![SolaTextEdit::replace(range, replacement)],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;
    use lsp_types::DiagnosticSeverity;

    fn diagnostic(range: Range, message: &str) -> SolaDiagnostic {
        SolaDiagnostic {
            range,
            severity: DiagnosticSeverity::ERROR,
            code: None,
            message: message.to_string(),
            tags: Vec::new(),
        }
    }

    fn at(line: u32, column: u32) -> Range {
        Range::empty(Position::new(line, column))
    }

    fn span(start: (u32, u32), end: (u32, u32)) -> Range {
        Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
    }

    fn find<'a>(actions: &'a [SolaCodeAction], title: &str) -> &'a SolaCodeAction {
        actions
            .iter()
            .find(|action| action.title == title)
            .unwrap_or_else(|| panic!("no action titled {title:?} in {actions:#?}"))
    }

    fn actions_for(doc: &DocumentSnapshot, range: Range, diagnostics: &[SolaDiagnostic]) -> Vec<SolaCodeAction> {
        let docs = std::slice::from_ref(doc);
        code_actions(doc, Workspace::new(docs, None), range, diagnostics)
    }

    #[test]
    fn inserts_expected_punctuation() {
        let doc = snapshot("file:///q.sola", "print(1");
        let diag = diagnostic(at(1, 8), "expected ')', found end of file");
        let actions = actions_for(&doc, at(1, 8), std::slice::from_ref(&diag));
        let action = find(&actions, "Insert ')'");
        assert_eq!(action.kind, CodeActionKind::QUICKFIX);
        assert!(action.is_preferred);
        assert_eq!(action.diagnostics, vec![diag]);
        assert_eq!(action.edits_for(&doc.uri), &[SolaTextEdit::insert(Position::new(1, 8), ")")]);
    }

    #[test]
    fn other_parse_errors_get_no_insert_fix() {
        let doc = snapshot("file:///q.sola", "$x := 1");
        let diag = diagnostic(at(1, 1), "expected type, found '1'");
        let actions = actions_for(&doc, at(1, 1), &[diag]);
        assert!(actions.iter().all(|action| !action.title.starts_with("Insert")));
    }

    #[test]
    fn declares_an_undefined_variable() {
        let doc = snapshot("file:///q.sola", "function f() {\n    print($x)\n}");
        let diag = diagnostic(span((2, 11), (2, 13)), "undefined variable '$x'");
        let actions = actions_for(&doc, at(2, 11), &[diag]);
        let action = find(&actions, "Declare variable '$x'");
        assert_eq!(
            action.edits_for(&doc.uri),
            &[SolaTextEdit::insert(Position::new(2, 1), "    $x := null\n")]
        );
    }

    #[test]
    fn creates_a_stub_for_an_undefined_function() {
        let doc = snapshot("file:///q.sola", "greet(1, 2)");
        let diag = diagnostic(span((1, 1), (1, 6)), "undefined function 'greet'");
        let actions = actions_for(&doc, at(1, 1), &[diag]);
        let action = find(&actions, "Create function 'greet'");
        assert_eq!(
            action.edits_for(&doc.uri),
            &[SolaTextEdit::insert(
                Position::new(1, 12),
                "\n\nfunction greet($arg1, $arg2) {\n}\n"
            )]
        );
    }

    #[test]
    fn imports_a_class_declared_in_another_file() {
        let docs = vec![
            snapshot("file:///p/app/main.sola", "$u := new User()"),
            snapshot("file:///p/models/user.sola", "class User {}"),
        ];
        let actions = code_actions(&docs[0], Workspace::new(&docs, None), at(1, 12), &[]);
        let action = find(&actions, "Import 'User' from \"../models/user\"");
        assert_eq!(
            action.edits_for(&docs[0].uri),
            &[SolaTextEdit::insert(Position::new(1, 1), "use \"../models/user\"\n\n")]
        );
    }

    #[test]
    fn no_import_for_local_or_already_imported_names() {
        let docs = vec![
            snapshot("file:///p/app/main.sola", "use \"../models/user\"\n$u := new User()"),
            snapshot("file:///p/models/user.sola", "class User {}"),
        ];
        let actions = code_actions(&docs[0], Workspace::new(&docs, None), at(2, 12), &[]);
        assert!(actions.iter().all(|action| !action.title.starts_with("Import")));

        let local = snapshot("file:///p/app/local.sola", "class User {}\n$u := new User()");
        let actions = actions_for(&local, at(2, 12), &[]);
        assert!(actions.iter().all(|action| !action.title.starts_with("Import")));
    }

    #[test]
    fn extracts_a_selected_expression() {
        let doc = snapshot("file:///q.sola", "$price := 3\n$total := $price * 2 + 1");
        let actions = actions_for(&doc, span((2, 11), (2, 21)), &[]);
        let action = find(&actions, "Extract variable");
        assert_eq!(action.kind, CodeActionKind::REFACTOR_EXTRACT);
        assert_eq!(
            action.edits_for(&doc.uri),
            &[
                SolaTextEdit::insert(Position::new(2, 1), "$extracted := $price * 2\n"),
                SolaTextEdit::replace(span((2, 11), (2, 21)), "$extracted"),
            ]
        );
    }

    #[test]
    fn selecting_a_bare_variable_offers_no_extraction() {
        let doc = snapshot("file:///q.sola", "$price := 3\n$total := $price");
        let actions = actions_for(&doc, span((2, 11), (2, 17)), &[]);
        assert!(actions.iter().all(|action| action.title != "Extract variable"));
    }

    const CART: &str = "class Cart {
    public function total($items) {
        $sum := 0
        foreach ($items as $item) {
            $sum += $item
        }
        return $sum
    }
}";

    #[test]
    fn extracts_statements_into_a_private_method() {
        let doc = snapshot("file:///cart.sola", CART);
        let actions = actions_for(&doc, span((3, 1), (6, 10)), &[]);
        let action = find(&actions, "Extract method");
        let edits = action.edits_for(&doc.uri);
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].range.start, Position::new(3, 9));
        assert_eq!(edits[0].new_text, "$sum := $this->extracted($items)");
        assert_eq!(edits[1].range, Range::empty(Position::new(8, 6)));
        assert_eq!(
            edits[1].new_text,
            "\n\n    private function extracted($items) {
        $sum := 0
        foreach ($items as $item) {
            $sum += $item
        }
        return $sum
    }"
        );
    }

    #[test]
    fn extraction_stops_at_control_flow() {
        let doc = snapshot("file:///cart.sola", CART);
        let actions = actions_for(&doc, span((3, 1), (7, 20)), &[]);
        assert!(actions.iter().all(|action| action.title != "Extract method"));
    }

    const POINT: &str = "class Point {
    public $x: int;
    private $label;
}";

    #[test]
    fn generates_constructor_and_accessors() {
        let doc = snapshot("file:///point.sola", POINT);
        let actions = actions_for(&doc, at(2, 14), &[]);

        let constructor = find(&actions, "Generate constructor");
        assert_eq!(
            constructor.edits_for(&doc.uri),
            &[SolaTextEdit::insert(
                Position::new(3, 20),
                "\n\n    public function __construct($x: int, $label) {\n        $this->x = $x\n        $this->label = $label\n    }"
            )]
        );

        let getter = find(&actions, "Generate getter for '$x'");
        assert_eq!(
            getter.edits_for(&doc.uri),
            &[SolaTextEdit::insert(
                Position::new(3, 20),
                "\n\n    public function getX(): int {\n        return $this->x\n    }"
            )]
        );
        let setter = find(&actions, "Generate setter for '$x'");
        assert!(setter.edits_for(&doc.uri)[0]
            .new_text
            .contains("public function setX($x: int): void {\n        $this->x = $x\n    }"));
    }

    #[test]
    fn readonly_properties_get_no_setter() {
        let doc = snapshot("file:///point.sola", "class P {\n    public readonly $id: int;\n}");
        let actions = actions_for(&doc, at(2, 23), &[]);
        find(&actions, "Generate getter for '$id'");
        assert!(actions.iter().all(|action| !action.title.starts_with("Generate setter")));
    }

    #[test]
    fn implements_missing_interface_methods() {
        let doc = snapshot(
            "file:///shapes.sola",
            "interface Shape {
    function area(): float;
    function name(string $prefix): string;
}
class Square implements Shape {
    public function name(string $prefix): string { return $prefix }
}",
        );
        let actions = actions_for(&doc, at(5, 8), &[]);
        let action = find(&actions, "Implement method 'area'");
        assert_eq!(
            action.edits_for(&doc.uri),
            &[SolaTextEdit::insert(
                Position::new(6, 68),
                "\n\n    public function area(): float {\n    }"
            )]
        );
    }

    #[test]
    fn organizes_imports() {
        let doc = snapshot(
            "file:///imports.sola",
            "use z.Zeta\nuse a.Alpha\nuse \"lib/util\"\nuse m.Unused\nuse a.Alpha\n\n$z := new Zeta()\n$a := Alpha::make()",
        );
        let actions = actions_for(&doc, at(7, 1), &[]);
        let action = find(&actions, "Organize imports");
        assert_eq!(action.kind, CodeActionKind::SOURCE_ORGANIZE_IMPORTS);
        assert_eq!(
            action.edits_for(&doc.uri),
            &[SolaTextEdit::replace(
                span((1, 1), (5, 12)),
                "use a.Alpha\nuse z.Zeta\nuse \"lib/util\""
            )]
        );
    }

    #[test]
    fn sorted_imports_need_no_action() {
        let doc = snapshot("file:///imports.sola", "use a.Alpha\nuse z.Zeta\n\nnew Alpha()\nnew Zeta()");
        let actions = actions_for(&doc, at(4, 1), &[]);
        assert!(actions.iter().all(|action| action.title != "Organize imports"));
    }
}
