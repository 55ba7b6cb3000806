//! Diagnostics for one document.
//!
//! Four sources are merged, in this order: syntax errors from the parser, issues from the
//! injected [`TypeChecker`], variables that are assigned but never read, and imports
//! whose name never appears in the file.
//!
//! Type-checker severities come from the first letter of the issue code: `W` is a
//! warning, `I` information, `H` a hint, anything else an error.

use crate::document::DocumentSnapshot;
use crate::symbols::SymbolTable;
use crate::visitor::{walk_tree, FunctionRef, NameKind, NameRef, Visitor};
use lsp_types::{DiagnosticSeverity, DiagnosticTag};
use sola_syntax::ast::{ClassMember, Expr, ExprKind, Ident, Stmt, StmtKind, UseDecl};
use sola_syntax::lexer::is_builtin_function;
use sola_syntax::{Range, Tree};
use std::collections::{HashMap, HashSet};

pub const DIAGNOSTIC_SOURCE: &str = "sola";

pub const DUPLICATE_DECLARATION: &str = "E001";
pub const WRONG_ARITY: &str = "E002";
pub const UNDEFINED_VARIABLE: &str = "E003";
pub const UNDEFINED_FUNCTION: &str = "E004";
pub const VALUE_FROM_VOID: &str = "W001";
pub const ABSTRACT_IN_CONCRETE: &str = "W002";

pub const UNUSED_VARIABLE: &str = "unused-variable";
pub const UNUSED_IMPORT: &str = "unused-import";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaDiagnostic {
    pub range: Range,
    pub severity: DiagnosticSeverity,
    pub code: Option<String>,
    pub message: String,
    pub tags: Vec<DiagnosticTag>,
}

impl SolaDiagnostic {
    fn error(range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            severity: DiagnosticSeverity::ERROR,
            code: None,
            message: message.into(),
            tags: Vec::new(),
        }
    }

    fn unnecessary(range: Range, code: &str, message: String) -> Self {
        Self {
            range,
            severity: DiagnosticSeverity::HINT,
            code: Some(code.to_string()),
            message,
            tags: vec![DiagnosticTag::UNNECESSARY],
        }
    }
}

/// One finding of a type checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIssue {
    pub code: String,
    pub range: Range,
    pub message: String,
}

impl TypeIssue {
    pub fn new(code: &str, range: Range, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            range,
            message: message.into(),
        }
    }

    pub fn severity(&self) -> DiagnosticSeverity {
        severity_for_code(&self.code)
    }
}

pub fn severity_for_code(code: &str) -> DiagnosticSeverity {
    match code.chars().next() {
        Some('W') => DiagnosticSeverity::WARNING,
        Some('I') => DiagnosticSeverity::INFORMATION,
        Some('H') => DiagnosticSeverity::HINT,
        _ => DiagnosticSeverity::ERROR,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub errors: Vec<TypeIssue>,
    pub warnings: Vec<TypeIssue>,
}

impl CheckReport {
    fn push(&mut self, issue: TypeIssue) {
        if issue.severity() == DiagnosticSeverity::ERROR {
            self.errors.push(issue);
        } else {
            self.warnings.push(issue);
        }
    }

    pub fn issues(&self) -> impl Iterator<Item = &TypeIssue> {
        self.errors.iter().chain(&self.warnings)
    }
}

/// The type-checker seam.
pub trait TypeChecker: Send + Sync {
    fn check(&self, tree: &Tree, symbols: &SymbolTable) -> CheckReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticSettings {
    pub type_check: bool,
    pub unused_variables: bool,
    pub unused_imports: bool,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            type_check: true,
            unused_variables: true,
            unused_imports: true,
        }
    }
}

pub fn collect_diagnostics(
    doc: &DocumentSnapshot,
    checker: &dyn TypeChecker,
    settings: &DiagnosticSettings,
) -> Vec<SolaDiagnostic> {
    let mut diagnostics: Vec<SolaDiagnostic> = doc
        .parse_errors
        .iter()
        .map(|error| SolaDiagnostic::error(error.range, error.message.clone()))
        .collect();

    let (Some(tree), Some(symbols)) = (doc.tree(), doc.symbols()) else {
        return diagnostics;
    };

    if settings.type_check {
        let report = checker.check(tree, symbols);
        diagnostics.extend(report.issues().map(|issue| SolaDiagnostic {
            range: issue.range,
            severity: issue.severity(),
            code: Some(issue.code.clone()),
            message: issue.message.clone(),
            tags: Vec::new(),
        }));
    }
    if settings.unused_variables {
        for ident in analyze_scopes(tree).unused {
            diagnostics.push(SolaDiagnostic::unnecessary(
                ident.range,
                UNUSED_VARIABLE,
                format!("'{}' is assigned but never used", ident.as_str()),
            ));
        }
    }
    if settings.unused_imports {
        diagnostics.extend(unused_imports(tree));
    }
    tracing::debug!(uri = %doc.uri, count = diagnostics.len(), "collected diagnostics");
    diagnostics
}

/// Dotted imports whose name is never referenced. File imports are never reported.
pub(crate) fn unused_import_decls(tree: &Tree) -> Vec<&UseDecl> {
    let mut used = HashSet::new();
    let mut collector = UsedNames { used: &mut used };
    walk_tree(tree, &mut collector);
    tree.uses()
        .filter(|decl| !decl.is_file && !used.contains(decl.effective_name()))
        .collect()
}

fn unused_imports(tree: &Tree) -> Vec<SolaDiagnostic> {
    unused_import_decls(tree)
        .into_iter()
        .map(|decl| {
            SolaDiagnostic::unnecessary(
                decl.range,
                UNUSED_IMPORT,
                format!("'{}' is imported but never used", decl.effective_name()),
            )
        })
        .collect()
}

struct UsedNames<'u, 'a> {
    used: &'u mut HashSet<&'a str>,
}

impl<'a> Visitor<'a> for UsedNames<'_, 'a> {
    fn visit_name(&mut self, name: NameRef<'a>) {
        if matches!(
            name.kind,
            NameKind::Type | NameKind::Function | NameKind::Name
        ) {
            self.used.insert(name.ident.as_str());
        }
    }
}

/// Variable bookkeeping for one function body, or for the file's top level.
#[derive(Default)]
struct Scope<'a> {
    declared: Vec<&'a Ident>,
    written: HashSet<&'a str>,
    reads: Vec<&'a Ident>,
}

#[derive(Default)]
struct ScopeReport<'a> {
    /// First declaration of each variable that is never read.
    unused: Vec<&'a Ident>,
    /// Reads of variables that are never assigned in their scope.
    undefined: Vec<&'a Ident>,
}

struct ScopeCollector<'a> {
    scopes: Vec<Scope<'a>>,
    report: ScopeReport<'a>,
}

impl<'a> ScopeCollector<'a> {
    fn current(&mut self) -> &mut Scope<'a> {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    fn close(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        let read: HashSet<&str> = scope.reads.iter().map(|ident| ident.as_str()).collect();
        let mut reported = HashSet::new();
        for ident in scope.declared {
            let name = ident.as_str();
            if name.starts_with("$_") || read.contains(name) || !reported.insert(name) {
                continue;
            }
            self.report.unused.push(ident);
        }
        for ident in scope.reads {
            if ident.as_str() != "$this" && !scope.written.contains(ident.as_str()) {
                self.report.undefined.push(ident);
            }
        }
    }
}

impl<'a> Visitor<'a> for ScopeCollector<'a> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => self.current().declared.push(&decl.name),
            StmtKind::Foreach(stmt) => {
                let scope = self.current();
                scope.declared.extend(stmt.key.as_ref());
                scope.declared.push(&stmt.value);
            }
            _ => {}
        }
    }

    fn visit_name(&mut self, name: NameRef<'a>) {
        if name.kind != NameKind::Variable {
            return;
        }
        let scope = self.current();
        if name.is_write {
            scope.written.insert(name.ident.as_str());
        } else {
            scope.reads.push(name.ident);
        }
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        match function {
            FunctionRef::Decl(_) => self.scopes.push(Scope::default()),
            FunctionRef::Closure(closure, _) => {
                let mut scope = Scope::default();
                scope
                    .written
                    .extend(closure.uses.iter().map(|captured| captured.as_str()));
                self.scopes.push(scope);
            }
            // Arrow functions see the enclosing variables.
            FunctionRef::Arrow(..) => {}
        }
        true
    }

    fn leave_function(&mut self, function: FunctionRef<'a>) {
        if !matches!(function, FunctionRef::Arrow(..)) {
            self.close();
        }
    }
}

fn analyze_scopes(tree: &Tree) -> ScopeReport<'_> {
    let mut collector = ScopeCollector {
        scopes: vec![Scope::default()],
        report: ScopeReport::default(),
    };
    walk_tree(tree, &mut collector);
    while !collector.scopes.is_empty() {
        collector.close();
    }
    collector.report
}

/// The type checker used when none is injected.
///
/// It only looks at one file, so its checks are the ones that need no other file to be
/// right: duplicate top-level names, calls to local functions with the wrong number of
/// arguments, variables read without ever being assigned, calls to unknown functions in
/// files without imports, values returned from `void` functions, and abstract methods in
/// concrete classes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTypeChecker;

impl TypeChecker for BasicTypeChecker {
    fn check(&self, tree: &Tree, symbols: &SymbolTable) -> CheckReport {
        let mut report = CheckReport::default();
        check_duplicates(tree, &mut report);
        check_abstract_methods(tree, &mut report);

        let mut collector = CheckCollector {
            symbols,
            self_contained: tree.uses().next().is_none(),
            returns_void: Vec::new(),
            report: &mut report,
        };
        walk_tree(tree, &mut collector);

        for ident in analyze_scopes(tree).undefined {
            report.push(TypeIssue::new(
                UNDEFINED_VARIABLE,
                ident.range,
                format!("undefined variable '{}'", ident.as_str()),
            ));
        }
        report
    }
}

fn check_duplicates(tree: &Tree, report: &mut CheckReport) {
    let mut seen: HashMap<&str, Range> = HashMap::new();
    for decl in tree.top_level_declarations() {
        let name = decl.name();
        if let Some(first) = seen.get(name.as_str()) {
            report.push(TypeIssue::new(
                DUPLICATE_DECLARATION,
                name.range,
                format!(
                    "'{}' is already declared on line {}",
                    name.as_str(),
                    first.start.line
                ),
            ));
        } else {
            seen.insert(name.as_str(), name.range);
        }
    }
}

fn check_abstract_methods(tree: &Tree, report: &mut CheckReport) {
    for class in tree.classes() {
        if class.modifiers.is_abstract {
            continue;
        }
        for member in &class.members {
            if let ClassMember::Method(method) = member {
                if method.modifiers.is_abstract {
                    report.push(TypeIssue::new(
                        ABSTRACT_IN_CONCRETE,
                        method.name.range,
                        format!(
                            "abstract method '{}' in non-abstract class '{}'",
                            method.name.as_str(),
                            class.name.as_str()
                        ),
                    ));
                }
            }
        }
    }
}

struct CheckCollector<'s, 'r> {
    symbols: &'s SymbolTable,
    /// Files without `use` declarations can only call local and built-in functions.
    self_contained: bool,
    returns_void: Vec<bool>,
    report: &'r mut CheckReport,
}

impl CheckCollector<'_, '_> {
    fn check_call(&mut self, callee: &Expr, args: &[Expr]) {
        let ExprKind::Name(name) = &callee.kind else {
            return;
        };
        match self.symbols.get_function(name.as_str()) {
            Some(signature) if !signature.accepts(args.len()) => {
                let total = signature.param_names.len();
                let expected = if signature.variadic {
                    format!("at least {}", signature.required_params)
                } else if signature.required_params == total {
                    total.to_string()
                } else {
                    format!("{} to {}", signature.required_params, total)
                };
                self.report.push(TypeIssue::new(
                    WRONG_ARITY,
                    callee.range,
                    format!(
                        "'{}' expects {expected} arguments, found {}",
                        name.as_str(),
                        args.len()
                    ),
                ));
            }
            Some(_) => {}
            None if self.self_contained && !is_builtin_function(name.as_str()) => {
                self.report.push(TypeIssue::new(
                    UNDEFINED_FUNCTION,
                    name.range,
                    format!("undefined function '{}'", name.as_str()),
                ));
            }
            None => {}
        }
    }
}

impl<'a> Visitor<'a> for CheckCollector<'_, '_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if let StmtKind::Return(Some(value)) = &stmt.kind {
            if self.returns_void.last().copied().unwrap_or(false) {
                self.report.push(TypeIssue::new(
                    VALUE_FROM_VOID,
                    value.range,
                    "a void function should not return a value",
                ));
            }
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if let ExprKind::Call { callee, args } = &expr.kind {
            self.check_call(callee, args);
        }
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        let return_type = match function {
            FunctionRef::Decl(decl) => decl.return_type.as_ref(),
            FunctionRef::Closure(closure, _) => closure.return_type.as_ref(),
            FunctionRef::Arrow(arrow, _) => arrow.return_type.as_ref(),
        };
        self.returns_void
            .push(return_type.is_some_and(|ty| ty.to_string() == "void"));
        true
    }

    fn leave_function(&mut self, _function: FunctionRef<'a>) {
        self.returns_void.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_snapshot, snapshot};
    use sola_syntax::Position;

    fn check(text: &str) -> Vec<(String, u32)> {
        let doc = snapshot("file:///d.sola", text);
        let (Some(tree), Some(symbols)) = (doc.tree(), doc.symbols()) else {
            panic!("no tree");
        };
        BasicTypeChecker
            .check(tree, symbols)
            .issues()
            .map(|issue| (issue.code.clone(), issue.range.start.line))
            .collect()
    }

    #[test]
    fn severity_follows_the_code_prefix() {
        assert_eq!(severity_for_code("E001"), DiagnosticSeverity::ERROR);
        assert_eq!(severity_for_code("W001"), DiagnosticSeverity::WARNING);
        assert_eq!(severity_for_code("I100"), DiagnosticSeverity::INFORMATION);
        assert_eq!(severity_for_code("H1"), DiagnosticSeverity::HINT);
        assert_eq!(severity_for_code(""), DiagnosticSeverity::ERROR);
    }

    #[test]
    fn duplicate_top_level_declarations() {
        assert_eq!(
            check("class A {}\nfunction A() {}"),
            vec![(DUPLICATE_DECLARATION.to_string(), 2)]
        );
    }

    #[test]
    fn arity_is_checked_for_local_functions() {
        let issues = check("function add(int $a, int $b = 1) {}\nadd()\nadd(1)\nadd(1, 2, 3)");
        assert_eq!(
            issues,
            vec![
                (WRONG_ARITY.to_string(), 2),
                (WRONG_ARITY.to_string(), 4),
            ]
        );
    }

    #[test]
    fn void_functions_and_abstract_methods() {
        let issues = check(
            "function f(): void {\n  $g := fn() => 1\n  return 1\n}\nclass C {\n  abstract function m();\n}\nabstract class D {\n  abstract function m();\n}",
        );
        assert_eq!(
            issues,
            vec![
                (ABSTRACT_IN_CONCRETE.to_string(), 6),
                (VALUE_FROM_VOID.to_string(), 3),
            ]
        );
    }

    #[test]
    fn undefined_names_in_self_contained_files() {
        let issues = check("function f($a) {\n  print($a, $b)\n  missing()\n}");
        assert_eq!(
            issues,
            vec![
                (UNDEFINED_FUNCTION.to_string(), 3),
                (UNDEFINED_VARIABLE.to_string(), 2),
            ]
        );
        assert!(check("use lib.Helpers\nhelper()").is_empty());
    }

    #[test]
    fn closures_see_captured_variables() {
        let issues = check("$n := 1\n$f := function ($x) use ($n) { return $x + $n }\n$g := fn($y) => $y + $n\n$f($g)");
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn unused_variables_and_imports_are_hints() {
        let doc = snapshot(
            "file:///u.sola",
            "use sola.collections.List\nuse sola.io.File\n$_skip := 1\n$unused := 2\n$used := File::open()\nprint($used)",
        );
        let found = collect_diagnostics(&doc, &BasicTypeChecker, &DiagnosticSettings::default());
        let hints: Vec<_> = found
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::HINT)
            .map(|d| (d.code.as_deref().unwrap_or(""), d.range.start))
            .collect();
        assert_eq!(
            hints,
            vec![
                (UNUSED_VARIABLE, Position::new(4, 1)),
                (UNUSED_IMPORT, Position::new(1, 1)),
            ]
        );
        assert!(found
            .iter()
            .filter(|d| d.severity == DiagnosticSeverity::HINT)
            .all(|d| d.tags == vec![DiagnosticTag::UNNECESSARY]));
    }

    #[test]
    fn settings_switch_sources_off() {
        let doc = snapshot("file:///u.sola", "use a.B\n$x := 1\nclass A {}\nclass A {}");
        let off = DiagnosticSettings {
            type_check: false,
            unused_variables: false,
            unused_imports: false,
        };
        assert!(collect_diagnostics(&doc, &BasicTypeChecker, &off).is_empty());
        assert_eq!(
            collect_diagnostics(&doc, &BasicTypeChecker, &DiagnosticSettings::default()).len(),
            3
        );
    }

    #[test]
    fn parse_errors_come_first() {
        let doc = snapshot("file:///p.sola", "$x := 1 $y := 2\nprint($x, $y)");
        let found = collect_diagnostics(&doc, &BasicTypeChecker, &DiagnosticSettings::default());
        assert_eq!(found[0].message, "expected ';' after statement");
        assert_eq!(found[0].severity, DiagnosticSeverity::ERROR);
        assert_eq!(found[0].code, None);
    }

    #[test]
    fn oversized_documents_only_report_the_parse_error() {
        let text = format!("$x := \"{}\"", "a".repeat(crate::document::MAX_PARSE_BYTES));
        let doc = snapshot("file:///big.sola", &text);
        let found = collect_diagnostics(&doc, &BasicTypeChecker, &DiagnosticSettings::default());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn sample_has_only_the_unused_loop_key() {
        let doc = sample_snapshot();
        let found = collect_diagnostics(&doc, &BasicTypeChecker, &DiagnosticSettings::default());
        let messages: Vec<_> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "'$i' is assigned but never used",
                "'List' is imported but never used"
            ]
        );
    }
}
