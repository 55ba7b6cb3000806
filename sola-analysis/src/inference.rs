//! Best-effort type inference for hover, completion and inlay hints.
//!
//! Nothing here is a type checker. Types are propagated from declarations, literals and
//! signatures as far as they are written down, and anything that cannot be worked out
//! simply yields `None`. Types travel as rendered strings, the same form the symbol
//! tables store.

use crate::buffer::is_word_char;
use crate::document::DocumentSnapshot;
use crate::symbols::strip_generics;
use crate::utils::{enclosing_class, ClassLike};
use crate::visitor::{walk_tree, FunctionRef, Visitor};
use crate::workspace::Workspace;
use sola_syntax::ast::{
    BinaryOp, ClassMember, Expr, ExprKind, Ident, Stmt, StmtKind, Tree, TypeNode, UnaryOp,
};
use sola_syntax::Position;
use std::cell::Cell;

/// How deep inference may recurse through variables and calls.
const MAX_DEPTH: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Local,
    Parameter,
    ForeachKey,
    ForeachValue,
    Catch,
    Property,
    This,
}

/// Where a variable visible at some position was introduced.
#[derive(Debug, Clone, Copy)]
pub struct Binding<'a> {
    pub ident: &'a Ident,
    pub kind: BindingKind,
    pub declared_type: Option<&'a TypeNode>,
    pub value: Option<&'a Expr>,
    pub iterable: Option<&'a Expr>,
    pub catch_types: &'a [TypeNode],
}

impl<'a> Binding<'a> {
    fn new(ident: &'a Ident, kind: BindingKind) -> Self {
        Self {
            ident,
            kind,
            declared_type: None,
            value: None,
            iterable: None,
            catch_types: &[],
        }
    }
}

struct BindingFinder<'a, 'n> {
    /// `None` collects every variable.
    name: Option<&'n str>,
    at: Position,
    scopes: Vec<Vec<Binding<'a>>>,
    active: Vec<usize>,
}

impl<'a> BindingFinder<'a, '_> {
    fn record(&mut self, binding: Binding<'a>) {
        let wanted = self.name.map_or(true, |name| binding.ident.as_str() == name);
        if !wanted || binding.ident.range.start > self.at {
            return;
        }
        let scope = self.active.last().copied().unwrap_or(0);
        self.scopes[scope].push(binding);
    }
}

impl<'a> Visitor<'a> for BindingFinder<'a, '_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => self.record(Binding {
                declared_type: decl.ty.as_ref(),
                value: decl.value.as_ref(),
                ..Binding::new(&decl.name, BindingKind::Local)
            }),
            StmtKind::Foreach(foreach) => {
                if let Some(key) = &foreach.key {
                    self.record(Binding {
                        iterable: Some(&foreach.iterable),
                        ..Binding::new(key, BindingKind::ForeachKey)
                    });
                }
                self.record(Binding {
                    iterable: Some(&foreach.iterable),
                    ..Binding::new(&foreach.value, BindingKind::ForeachValue)
                });
            }
            StmtKind::Try(stmt) => {
                for catch in &stmt.catches {
                    if let Some(var) = &catch.var {
                        self.record(Binding {
                            catch_types: &catch.types,
                            ..Binding::new(var, BindingKind::Catch)
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if let ExprKind::Assign {
            op: sola_syntax::ast::AssignOp::Assign,
            target,
            value,
        } = &expr.kind
        {
            if let ExprKind::Variable(ident) = &target.kind {
                self.record(Binding {
                    value: Some(value),
                    ..Binding::new(ident, BindingKind::Local)
                });
            }
        }
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        if !function.range().contains(self.at) {
            return false;
        }
        self.scopes.push(Vec::new());
        self.active.push(self.scopes.len() - 1);
        for param in function.params() {
            self.record(Binding {
                declared_type: param.ty.as_ref(),
                value: param.default.as_ref(),
                ..Binding::new(&param.name, BindingKind::Parameter)
            });
        }
        true
    }

    fn leave_function(&mut self, _function: FunctionRef<'a>) {
        self.active.pop();
    }
}

/// The binding of variable `name` visible at `at`: the closest preceding declaration in
/// the innermost enclosing function, then outer scopes, then properties of the enclosing
/// class. `$this` binds to the enclosing class.
pub fn find_binding<'a>(tree: &'a Tree, name: &str, at: Position) -> Option<Binding<'a>> {
    if name == "$this" {
        let class = enclosing_class(tree, at)?;
        return Some(Binding::new(class.name(), BindingKind::This));
    }

    let mut finder = BindingFinder {
        name: Some(name),
        at,
        scopes: vec![Vec::new()],
        active: Vec::new(),
    };
    walk_tree(tree, &mut finder);
    for scope in finder.scopes.iter().rev() {
        if let Some(binding) = scope.iter().max_by_key(|b| b.ident.range.start) {
            return Some(*binding);
        }
    }

    let class = enclosing_class(tree, at)?;
    property_binding(class, name)
}

/// Every variable visible at `at`, innermost scope first, each name once with its
/// latest preceding binding.
pub fn visible_bindings(tree: &Tree, at: Position) -> Vec<Binding<'_>> {
    let mut finder = BindingFinder {
        name: None,
        at,
        scopes: vec![Vec::new()],
        active: Vec::new(),
    };
    walk_tree(tree, &mut finder);
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for scope in finder.scopes.iter().rev() {
        let mut bindings = scope.clone();
        bindings.sort_by_key(|binding| std::cmp::Reverse(binding.ident.range.start));
        for binding in bindings {
            if seen.insert(binding.ident.as_str()) {
                out.push(binding);
            }
        }
    }
    out
}

fn property_binding<'a>(class: ClassLike<'a>, name: &str) -> Option<Binding<'a>> {
    for member in class.members() {
        match member {
            ClassMember::Property(property) if property.name.as_str() == name => {
                return Some(Binding {
                    declared_type: property.ty.as_ref(),
                    value: property.default.as_ref(),
                    ..Binding::new(&property.name, BindingKind::Property)
                });
            }
            ClassMember::Method(method) if method.name.as_str() == "__construct" => {
                if let Some(param) = method
                    .params
                    .iter()
                    .find(|param| param.promoted.is_some() && param.name.as_str() == name)
                {
                    return Some(Binding {
                        declared_type: param.ty.as_ref(),
                        ..Binding::new(&param.name, BindingKind::Property)
                    });
                }
            }
            _ => {}
        }
    }
    None
}

/// Parameter labels and return types of the runtime's built-in functions.
pub const BUILTIN_SIGNATURES: &[(&str, &[&str], &str)] = &[
    ("print", &["$value: mixed"], "void"),
    ("println", &["$value: mixed"], "void"),
    ("printf", &["$format: string", "...$args"], "void"),
    ("len", &["$value: mixed"], "int"),
    ("count", &["$items: array"], "int"),
    ("isset", &["$value: mixed"], "bool"),
    ("unset", &["$value: mixed"], "void"),
    ("empty", &["$value: mixed"], "bool"),
    ("typeof", &["$value: mixed"], "string"),
    ("panic", &["$message: string"], "never"),
    ("sprintf", &["$format: string", "...$args"], "string"),
    ("json_encode", &["$value: mixed"], "string"),
    ("json_decode", &["$json: string"], "mixed"),
    ("array_map", &["$callback: callable", "$items: array"], "array"),
    ("array_filter", &["$items: array", "$callback: callable"], "array"),
    ("array_keys", &["$items: array"], "array"),
    ("array_values", &["$items: array"], "array"),
    ("in_array", &["$needle: mixed", "$items: array"], "bool"),
    ("str_contains", &["$haystack: string", "$needle: string"], "bool"),
    ("strlen", &["$value: string"], "int"),
    ("substr", &["$value: string", "$start: int", "$length: int"], "string"),
    ("implode", &["$separator: string", "$items: array"], "string"),
    ("explode", &["$separator: string", "$value: string"], "string[]"),
];

pub fn builtin_signature(name: &str) -> Option<(&'static [&'static str], &'static str)> {
    BUILTIN_SIGNATURES
        .iter()
        .find(|(builtin, _, _)| *builtin == name)
        .map(|(_, params, ret)| (*params, *ret))
}

pub fn builtin_return_type(name: &str) -> Option<&'static str> {
    builtin_signature(name).map(|(_, ret)| ret)
}

/// Splits the generic arguments of `Name<A, B<C>>` at the top level.
fn generic_args(ty: &str) -> Option<Vec<&str>> {
    let open = ty.find('<')?;
    let inner = ty.get(open + 1..ty.rfind('>')?)?;
    let mut args = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (idx, c) in inner.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                args.push(inner[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    args.push(inner[start..].trim());
    Some(args)
}

/// The type produced by iterating over a value of type `ty`.
pub fn element_type_of(ty: &str) -> Option<String> {
    let ty = ty.trim().trim_start_matches('?');
    if let Some(inner) = ty.strip_suffix("[]") {
        return Some(inner.to_string());
    }
    if let Some(args) = generic_args(ty) {
        return args.last().map(|arg| arg.to_string());
    }
    match ty {
        "array" | "map" | "iterable" | "mixed" => Some("mixed".to_string()),
        _ => None,
    }
}

/// The key type when iterating over a value of type `ty`.
pub fn key_type_of(ty: &str) -> Option<String> {
    let ty = ty.trim().trim_start_matches('?');
    if ty.ends_with("[]") {
        return Some("int".to_string());
    }
    match generic_args(ty) {
        Some(args) if args.len() == 2 => Some(args[0].to_string()),
        Some(_) => Some("int".to_string()),
        None if matches!(ty, "array" | "map" | "iterable") => Some("mixed".to_string()),
        None => None,
    }
}

pub struct Inference<'a> {
    tree: &'a Tree,
    workspace: Workspace<'a>,
    current: Option<&'a DocumentSnapshot>,
    depth: Cell<u32>,
}

impl<'a> Inference<'a> {
    pub fn new(tree: &'a Tree, workspace: Workspace<'a>, current: Option<&'a DocumentSnapshot>) -> Self {
        Self {
            tree,
            workspace,
            current,
            depth: Cell::new(0),
        }
    }

    /// Inference over an open document.
    pub fn for_document(doc: &'a DocumentSnapshot, workspace: Workspace<'a>) -> Option<Self> {
        Some(Self::new(doc.tree()?, workspace, Some(doc)))
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn workspace(&self) -> Workspace<'a> {
        self.workspace
    }

    pub fn current(&self) -> Option<&'a DocumentSnapshot> {
        self.current
    }

    fn guarded<T>(&self, f: impl FnOnce() -> Option<T>) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            return None;
        }
        self.depth.set(depth + 1);
        let result = f();
        self.depth.set(depth);
        result
    }

    /// Type of the variable `name` as seen from `at`.
    pub fn variable_type(&self, name: &str, at: Position) -> Option<String> {
        let binding = find_binding(self.tree, name, at)?;
        self.binding_type(&binding, at)
    }

    pub fn binding_type(&self, binding: &Binding<'_>, at: Position) -> Option<String> {
        self.guarded(|| {
            if let Some(ty) = binding.declared_type {
                return Some(self.resolve_special(&ty.to_string(), at));
            }
            match binding.kind {
                BindingKind::This => Some(binding.ident.as_str().to_string()),
                BindingKind::Local | BindingKind::Property | BindingKind::Parameter => {
                    binding.value.and_then(|value| self.expr_type(value))
                }
                BindingKind::ForeachValue => binding
                    .iterable
                    .and_then(|iterable| self.expr_type(iterable))
                    .and_then(|ty| element_type_of(&ty)),
                BindingKind::ForeachKey => binding
                    .iterable
                    .and_then(|iterable| self.expr_type(iterable))
                    .and_then(|ty| key_type_of(&ty)),
                BindingKind::Catch => {
                    let names: Vec<String> = binding
                        .catch_types
                        .iter()
                        .map(TypeNode::to_string)
                        .collect();
                    (!names.is_empty()).then(|| names.join("|"))
                }
            }
        })
    }

    /// Rewrites `self`, `static` and `parent` relative to the class enclosing `at`.
    pub fn resolve_special(&self, ty: &str, at: Position) -> String {
        match ty {
            "self" | "static" | "$this" => enclosing_class(self.tree, at)
                .map(|class| class.name().as_str().to_string())
                .unwrap_or_else(|| ty.to_string()),
            "parent" => enclosing_class(self.tree, at)
                .and_then(|class| match class {
                    ClassLike::Class(decl) => decl.extends.as_ref().map(TypeNode::to_string),
                    _ => None,
                })
                .unwrap_or_else(|| ty.to_string()),
            _ => ty.to_string(),
        }
    }

    /// The class name an expression evaluates to, without generics or nullability.
    pub fn class_of(&self, expr: &Expr) -> Option<String> {
        self.expr_type(expr)
            .map(|ty| strip_generics(&ty).to_string())
            .filter(|name| !name.is_empty())
    }

    fn function_return(&self, name: &str) -> Option<String> {
        if let Some(ty) = builtin_return_type(name) {
            return Some(ty.to_string());
        }
        let resolved = self.workspace.find_declaration(name, self.current)?;
        resolved
            .source
            .symbols
            .get_function(name)
            .and_then(|function| function.return_type.clone())
    }

    fn method_return(&self, class: &str, method: &str, arity: usize) -> Option<String> {
        let (_, signature) = self
            .workspace
            .find_method(class, method, Some(arity), self.current)?;
        let ret = signature.signature.return_type.clone()?;
        Some(match ret.as_str() {
            "self" | "static" | "$this" => class.to_string(),
            _ => ret,
        })
    }

    fn property_type(&self, class: &str, property: &str) -> Option<String> {
        let (_, signature) = self
            .workspace
            .find_property(class, property, self.current)?;
        signature.ty.clone()
    }

    fn static_class(&self, class: &Ident) -> String {
        self.resolve_special(class.as_str(), class.range.start)
    }

    pub fn expr_type(&self, expr: &Expr) -> Option<String> {
        self.guarded(|| self.expr_type_inner(expr))
    }

    fn expr_type_inner(&self, expr: &Expr) -> Option<String> {
        let at = expr.range.start;
        match &expr.kind {
            ExprKind::Int(_) => Some("int".into()),
            ExprKind::Float(_) => Some("float".into()),
            ExprKind::Str(_) => Some("string".into()),
            ExprKind::Bool(_) => Some("bool".into()),
            ExprKind::Null => Some("null".into()),
            ExprKind::Variable(ident) => self.variable_type(ident.as_str(), at),
            ExprKind::Name(ident) => self.constant_type(ident.as_str()),
            ExprKind::Binary { op, lhs, rhs } => self.binary_type(*op, lhs, rhs),
            ExprKind::Unary { op, operand } => match op {
                UnaryOp::Not => Some("bool".into()),
                UnaryOp::BitNot => Some("int".into()),
                _ => self.expr_type(operand),
            },
            ExprKind::Postfix { operand, .. } => self.expr_type(operand),
            ExprKind::Assign { value, .. } => self.expr_type(value),
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => {
                let then = match then {
                    Some(then) => self.expr_type(then),
                    None => self.expr_type(cond),
                };
                join_types(then, self.expr_type(otherwise))
            }
            ExprKind::Coalesce { lhs, rhs } => self
                .expr_type(lhs)
                .map(|ty| ty.trim_start_matches('?').to_string())
                .or_else(|| self.expr_type(rhs)),
            ExprKind::Call { callee, .. } => match callee.callee_name() {
                Some(name) => self.function_return(name.as_str()),
                None => None,
            },
            ExprKind::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                let class = self.class_of(receiver)?;
                self.method_return(&class, method.as_str(), args.len())
            }
            ExprKind::Property {
                receiver, property, ..
            } => {
                let class = self.class_of(receiver)?;
                self.property_type(&class, property.as_str())
            }
            ExprKind::StaticCall {
                class,
                method,
                args,
            } => {
                let class = self.static_class(class);
                self.method_return(&class, method.as_str(), args.len())
            }
            ExprKind::StaticAccess { class, member } => {
                let class = self.static_class(class);
                if member.is_variable() {
                    return self.property_type(&class, member.as_str());
                }
                let source = self.workspace.class_source(&class, self.current)?;
                if source
                    .symbols
                    .enum_values
                    .get(&class)
                    .is_some_and(|cases| cases.iter().any(|case| case == member.as_str()))
                {
                    return Some(class);
                }
                source
                    .symbols
                    .constants_of(&class)
                    .find(|constant| constant.name == member.as_str())
                    .and_then(|constant| constant.ty.clone())
            }
            ExprKind::Index { target, .. } => {
                let ty = self.expr_type(target)?;
                if ty == "string" {
                    return Some(ty);
                }
                element_type_of(&ty)
            }
            ExprKind::New { class, .. } => Some(self.resolve_special(&class.to_string(), at)),
            ExprKind::Array(items) => {
                let element = items.first().and_then(|item| self.expr_type(item));
                Some(match element {
                    Some(element) => format!("{element}[]"),
                    None => "array".into(),
                })
            }
            ExprKind::Map(entries) => {
                let first = entries.first().and_then(|entry| {
                    Some((self.expr_type(&entry.key)?, self.expr_type(&entry.value)?))
                });
                Some(match first {
                    Some((key, value)) => format!("map<{key}, {value}>"),
                    None => "map".into(),
                })
            }
            ExprKind::Closure(closure) => Some(callable_type(
                &closure.params,
                closure.return_type.as_ref(),
            )),
            ExprKind::Arrow(arrow) => {
                Some(callable_type(&arrow.params, arrow.return_type.as_ref()))
            }
            ExprKind::Cast { ty, .. } => Some(ty.to_string()),
            ExprKind::Is { .. } => Some("bool".into()),
            ExprKind::Match(stmt) => stmt
                .arms
                .iter()
                .find_map(|arm| self.expr_type(&arm.body)),
            ExprKind::Await(inner) => self.expr_type(inner),
            ExprKind::Error => None,
        }
    }

    fn constant_type(&self, name: &str) -> Option<String> {
        let resolved = self.workspace.find_declaration(name, self.current)?;
        resolved
            .source
            .symbols
            .constants
            .get(name)
            .and_then(|constant| constant.ty.clone())
    }

    fn binary_type(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Option<String> {
        if op.is_comparison() || op.is_logical() {
            return Some("bool".into());
        }
        match op {
            BinaryOp::Concat => Some("string".into()),
            BinaryOp::Mod
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => Some("int".into()),
            BinaryOp::Div => Some("float".into()),
            _ => {
                let lhs = self.expr_type(lhs)?;
                let rhs = self.expr_type(rhs)?;
                match (lhs.as_str(), rhs.as_str()) {
                    ("int", "int") => Some("int".into()),
                    ("float", "int" | "float") | ("int", "float") => Some("float".into()),
                    ("string", "string") if op == BinaryOp::Add => Some("string".into()),
                    _ => None,
                }
            }
        }
    }

    /// Type at the end of a member chain written as text, such as `$user->team()->lead`.
    pub fn chain_type(&self, chain: &str, at: Position) -> Option<String> {
        let segments = split_chain(chain);
        let (first, rest) = segments.split_first()?;
        let mut ty = self.chain_head_type(first.trim(), at)?;
        for segment in rest {
            let class = strip_generics(&ty).to_string();
            let segment = segment.trim();
            ty = match segment.find('(') {
                Some(paren) => {
                    let arity = count_args(&segment[paren..]);
                    self.method_return(&class, segment[..paren].trim(), arity)?
                }
                None => self.property_type(&class, segment)?,
            };
        }
        Some(ty)
    }

    fn chain_head_type(&self, head: &str, at: Position) -> Option<String> {
        let head = head.trim_start_matches('(').trim_end_matches(')').trim();
        if head.starts_with('$') && !head.contains('(') && !head.contains('[') {
            return self.variable_type(head, at);
        }
        if let Some(rest) = head.strip_prefix("new ") {
            let class = rest.split(['(', ' ']).next()?.trim();
            return Some(self.resolve_special(class, at));
        }
        if let Some((class, member)) = head.split_once("::") {
            let class = self.resolve_special(class.trim(), at);
            return match member.find('(') {
                Some(paren) => {
                    self.method_return(&class, member[..paren].trim(), count_args(&member[paren..]))
                }
                None if member.starts_with('$') => self.property_type(&class, member),
                None => Some(class),
            };
        }
        if let Some(paren) = head.find('(') {
            return self.function_return(head[..paren].trim());
        }
        if let Some(bracket) = head.find('[') {
            let ty = self.variable_type(head[..bracket].trim(), at)?;
            return element_type_of(&ty);
        }
        None
    }
}

fn join_types(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) if a == b => Some(a),
        (Some(a), Some(b)) if b == "null" => Some(format!("?{a}")),
        (Some(a), Some(b)) if a == "null" => Some(format!("?{b}")),
        (Some(a), Some(b)) => Some(format!("{a}|{b}")),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

fn callable_type(params: &[sola_syntax::ast::Param], ret: Option<&TypeNode>) -> String {
    let params: Vec<String> = params
        .iter()
        .map(|param| {
            param
                .ty
                .as_ref()
                .map(TypeNode::to_string)
                .unwrap_or_else(|| "mixed".into())
        })
        .collect();
    let ret = ret.map(TypeNode::to_string).unwrap_or_else(|| "mixed".into());
    format!("fn({}): {ret}", params.join(", "))
}

/// Splits `$a->b(1, $c->d)?->e` into `["$a", "b(1, $c->d)", "e"]`.
pub fn split_chain(chain: &str) -> Vec<&str> {
    let bytes = chain.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b'-' if depth == 0 && bytes.get(idx + 1) == Some(&b'>') => {
                let end = if idx > start && bytes[idx - 1] == b'?' {
                    idx - 1
                } else {
                    idx
                };
                segments.push(&chain[start..end]);
                idx += 2;
                start = idx;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    segments.push(&chain[start..]);
    segments
}

/// How a member name is reached, read from the text in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access<'t> {
    /// `receiver->member` or `receiver?->member`.
    Instance(&'t str),
    /// `Class::member`.
    Static(&'t str),
}

/// Classifies the text directly in front of a member name.
pub fn access_before(prefix: &str) -> Option<Access<'_>> {
    let prefix = prefix.trim_end();
    if let Some(rest) = prefix.strip_suffix("->") {
        let rest = rest.strip_suffix('?').unwrap_or(rest);
        return receiver_expression(rest).map(Access::Instance);
    }
    let rest = prefix.strip_suffix("::")?;
    let start = rest
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(idx, _)| idx)?;
    Some(Access::Static(&rest[start..]))
}

/// The receiver expression ending at the end of `prefix`, e.g. `$a->b()` in
/// `print($a->b()`. Balanced parentheses and brackets are kept whole.
pub fn receiver_expression(prefix: &str) -> Option<&str> {
    let chars: Vec<(usize, char)> = prefix.char_indices().collect();
    let mut idx = chars.len();
    let mut depth = 0usize;
    while idx > 0 {
        let c = chars[idx - 1].1;
        if depth > 0 {
            match c {
                ')' | ']' => depth += 1,
                '(' | '[' => depth -= 1,
                _ => {}
            }
            idx -= 1;
            continue;
        }
        match c {
            ')' | ']' => depth += 1,
            c if is_word_char(c) => {}
            '>' if idx >= 2 && chars[idx - 2].1 == '-' => idx -= 1,
            ':' if idx >= 2 && chars[idx - 2].1 == ':' => idx -= 1,
            '?' if chars.get(idx).is_some_and(|(_, next)| *next == '-') => {}
            _ => break,
        }
        idx -= 1;
    }
    if depth != 0 {
        return None;
    }
    let start = chars.get(idx).map_or(prefix.len(), |(offset, _)| *offset);
    let expr = prefix[start..].trim();
    (!expr.is_empty()).then_some(expr)
}

/// Number of top-level arguments in a `(...)` argument list.
fn count_args(list: &str) -> usize {
    let inner = list
        .trim()
        .strip_prefix('(')
        .and_then(|rest| rest.rfind(')').map(|end| &rest[..end]))
        .unwrap_or("");
    if inner.trim().is_empty() {
        return 0;
    }
    let mut depth = 0;
    let mut count = 1;
    for c in inner.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::Url;
    use sola_syntax::SolaParser;

    fn doc(text: &str) -> Vec<DocumentSnapshot> {
        vec![DocumentSnapshot::from_text(
            Url::parse("file:///infer.sola").unwrap(),
            text,
            &SolaParser,
        )]
    }

    fn type_at(docs: &[DocumentSnapshot], name: &str, line: u32, column: u32) -> Option<String> {
        let workspace = Workspace::new(docs, None);
        let inference = Inference::for_document(&docs[0], workspace)?;
        inference.variable_type(name, Position::new(line, column))
    }

    #[test]
    fn literals_and_operators() {
        let docs = doc("$a := 1\n$b := $a * 2.5\n$c := \"x\" . $a\n$d := $a > 1\n$e := [1, 2]\n$f := [\"k\" => true]");
        assert_eq!(type_at(&docs, "$a", 7, 1).as_deref(), Some("int"));
        assert_eq!(type_at(&docs, "$b", 7, 1).as_deref(), Some("float"));
        assert_eq!(type_at(&docs, "$c", 7, 1).as_deref(), Some("string"));
        assert_eq!(type_at(&docs, "$d", 7, 1).as_deref(), Some("bool"));
        assert_eq!(type_at(&docs, "$e", 7, 1).as_deref(), Some("int[]"));
        assert_eq!(type_at(&docs, "$f", 7, 1).as_deref(), Some("map<string, bool>"));
    }

    #[test]
    fn objects_methods_and_properties() {
        let docs = doc(
            "class Team { public $lead: User }\nclass User {\n  public $name: string\n  function team(): Team {}\n  function me(): static {}\n}\n$u := new User()\n$t := $u->team()\n$n := $u->me()->name\n",
        );
        assert_eq!(type_at(&docs, "$u", 10, 1).as_deref(), Some("User"));
        assert_eq!(type_at(&docs, "$t", 10, 1).as_deref(), Some("Team"));
        assert_eq!(type_at(&docs, "$n", 10, 1).as_deref(), Some("string"));

        let workspace = Workspace::new(&docs, None);
        let inference = Inference::for_document(&docs[0], workspace).unwrap();
        assert_eq!(
            inference.chain_type("$u->team()->lead", Position::new(10, 1)).as_deref(),
            Some("User")
        );
    }

    #[test]
    fn parameters_loops_and_this() {
        let docs = doc(
            "class Box {\n  function each(List<int> $items) {\n    foreach ($items as $i => $item) {\n      $self := $this\n    }\n  }\n}",
        );
        assert_eq!(type_at(&docs, "$items", 4, 7).as_deref(), Some("List<int>"));
        assert_eq!(type_at(&docs, "$item", 4, 7).as_deref(), Some("int"));
        assert_eq!(type_at(&docs, "$i", 4, 7).as_deref(), Some("int"));
        assert_eq!(type_at(&docs, "$self", 5, 1).as_deref(), Some("Box"));
    }

    #[test]
    fn later_declarations_are_not_visible() {
        let docs = doc("$x := 1\n$y := $x\n$x := \"s\"");
        assert_eq!(type_at(&docs, "$x", 2, 7).as_deref(), Some("int"));
        assert_eq!(type_at(&docs, "$x", 3, 10).as_deref(), Some("string"));
    }

    #[test]
    fn self_referencing_declarations_terminate() {
        let docs = doc("$x := $x + 1");
        assert_eq!(type_at(&docs, "$x", 1, 8), None);
    }

    #[test]
    fn chain_splitting_respects_parentheses() {
        assert_eq!(
            split_chain("$a->b(1, $c->d)?->e"),
            vec!["$a", "b(1, $c->d)", "e"]
        );
        assert_eq!(count_args("(1, f(2, 3), [4, 5])"), 3);
        assert_eq!(count_args("()"), 0);
    }

    #[test]
    fn receivers_are_read_backwards() {
        assert_eq!(receiver_expression("print($a->b(1, 2)"), Some("$a->b(1, 2)"));
        assert_eq!(receiver_expression("  (new User())"), Some("(new User())"));
        assert_eq!(receiver_expression("x := $list[0]"), Some("$list[0]"));
        assert_eq!(
            access_before("return $this?->"),
            Some(Access::Instance("$this"))
        );
        assert_eq!(access_before("Status::"), Some(Access::Static("Status")));
        assert_eq!(access_before("$a + "), None);
    }

    #[test]
    fn element_and_key_types() {
        assert_eq!(element_type_of("string[]").as_deref(), Some("string"));
        assert_eq!(element_type_of("map<string, List<int>>").as_deref(), Some("List<int>"));
        assert_eq!(key_type_of("map<string, int>").as_deref(), Some("string"));
        assert_eq!(key_type_of("User[]").as_deref(), Some("int"));
        assert_eq!(element_type_of("User"), None);
    }
}
