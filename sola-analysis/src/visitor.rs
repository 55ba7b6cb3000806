//! Tree traversal shared by the analysis features.
//!
//! [`walk_tree`] drives a [`Visitor`] over every statement, expression, type and name of
//! a file in source order. Names are reported with the role they play so features such
//! as highlights and unused-variable checks can tell reads from writes without
//! re-deriving it.

use crate::symbols::DeclKind;
use sola_syntax::ast::{
    ArrowFn, Block, ClassMember, Closure, Expr, ExprKind, FunctionDecl, Ident, Param, Stmt,
    StmtKind, Tree, TypeKind, TypeNode, TypeParam,
};
use sola_syntax::Range;

/// What a name occurrence refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// `$x`, including parameters and loop binders.
    Variable,
    /// The callee of a plain call such as `print(...)`.
    Function,
    /// Any other bare name in expression position, usually a constant.
    Name,
    Type,
    /// `->method()` or `::method()`.
    Method,
    /// `->prop` or `::$prop`.
    Property,
    /// `Class::CONST` or `Enum::Case`.
    StaticMember,
    /// The name being introduced by a declaration.
    Declaration(DeclKind),
}

#[derive(Debug, Clone, Copy)]
pub struct NameRef<'a> {
    pub ident: &'a Ident,
    pub kind: NameKind,
    /// Declarations, parameters, binders and assignment targets.
    pub is_write: bool,
}

impl NameRef<'_> {
    /// Whether this occurrence spells `name`. Property accesses are written without a
    /// `$` while their declarations keep it, so both spellings match each other.
    pub fn matches(&self, name: &str) -> bool {
        let spelled = self.ident.as_str();
        if spelled == name {
            return true;
        }
        let is_property = matches!(
            self.kind,
            NameKind::Property | NameKind::Declaration(DeclKind::Property)
        );
        is_property && spelled.trim_start_matches('$') == name.trim_start_matches('$')
    }
}

/// A function-like node whose body introduces a scope.
#[derive(Debug, Clone, Copy)]
pub enum FunctionRef<'a> {
    Decl(&'a FunctionDecl),
    Closure(&'a Closure, Range),
    Arrow(&'a ArrowFn, Range),
}

impl<'a> FunctionRef<'a> {
    pub fn params(&self) -> &'a [Param] {
        match self {
            FunctionRef::Decl(decl) => &decl.params,
            FunctionRef::Closure(closure, _) => &closure.params,
            FunctionRef::Arrow(arrow, _) => &arrow.params,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            FunctionRef::Decl(decl) => decl.range,
            FunctionRef::Closure(_, range) | FunctionRef::Arrow(_, range) => *range,
        }
    }
}

pub trait Visitor<'a> {
    fn visit_stmt(&mut self, _stmt: &'a Stmt) {}
    fn visit_expr(&mut self, _expr: &'a Expr) {}
    fn visit_type(&mut self, _ty: &'a TypeNode) {}
    fn visit_name(&mut self, _name: NameRef<'a>) {}

    /// Called before a function body is walked. Returning `false` skips its parameters
    /// and body; the function's own name has already been reported.
    fn enter_function(&mut self, _function: FunctionRef<'a>) -> bool {
        true
    }

    fn leave_function(&mut self, _function: FunctionRef<'a>) {}

    /// Called with the name of a class, interface or enum before its members.
    fn enter_class(&mut self, _name: &'a Ident) {}
    fn leave_class(&mut self, _name: &'a Ident) {}
}

pub fn walk_tree<'a, V: Visitor<'a> + ?Sized>(tree: &'a Tree, visitor: &mut V) {
    walk_stmts(&tree.statements, visitor);
}

pub fn walk_stmts<'a, V: Visitor<'a> + ?Sized>(stmts: &'a [Stmt], visitor: &mut V) {
    for stmt in stmts {
        walk_stmt(stmt, visitor);
    }
}

pub fn walk_block<'a, V: Visitor<'a> + ?Sized>(block: &'a Block, visitor: &mut V) {
    walk_stmts(&block.statements, visitor);
}

fn declare<'a, V: Visitor<'a> + ?Sized>(ident: &'a Ident, kind: DeclKind, visitor: &mut V) {
    visitor.visit_name(NameRef {
        ident,
        kind: NameKind::Declaration(kind),
        is_write: true,
    });
}

fn variable<'a, V: Visitor<'a> + ?Sized>(ident: &'a Ident, is_write: bool, visitor: &mut V) {
    visitor.visit_name(NameRef {
        ident,
        kind: NameKind::Variable,
        is_write,
    });
}

fn walk_type_params<'a, V: Visitor<'a> + ?Sized>(params: &'a [TypeParam], visitor: &mut V) {
    for param in params {
        if let Some(bound) = &param.bound {
            walk_type(bound, visitor);
        }
    }
}

pub fn walk_stmt<'a, V: Visitor<'a> + ?Sized>(stmt: &'a Stmt, visitor: &mut V) {
    visitor.visit_stmt(stmt);
    match &stmt.kind {
        StmtKind::Namespace(_) | StmtKind::Use(_) => {}
        StmtKind::Class(decl) => {
            declare(&decl.name, DeclKind::Class, visitor);
            walk_type_params(&decl.type_params, visitor);
            if let Some(parent) = &decl.extends {
                walk_type(parent, visitor);
            }
            for ty in &decl.implements {
                walk_type(ty, visitor);
            }
            visitor.enter_class(&decl.name);
            walk_members(&decl.members, visitor);
            visitor.leave_class(&decl.name);
        }
        StmtKind::Interface(decl) => {
            declare(&decl.name, DeclKind::Interface, visitor);
            walk_type_params(&decl.type_params, visitor);
            for ty in &decl.extends {
                walk_type(ty, visitor);
            }
            visitor.enter_class(&decl.name);
            walk_members(&decl.members, visitor);
            visitor.leave_class(&decl.name);
        }
        StmtKind::Enum(decl) => {
            declare(&decl.name, DeclKind::Enum, visitor);
            if let Some(backing) = &decl.backing {
                walk_type(backing, visitor);
            }
            for ty in &decl.implements {
                walk_type(ty, visitor);
            }
            visitor.enter_class(&decl.name);
            walk_members(&decl.members, visitor);
            visitor.leave_class(&decl.name);
        }
        StmtKind::TypeAlias(decl) => {
            declare(&decl.name, DeclKind::TypeAlias, visitor);
            walk_type_params(&decl.type_params, visitor);
            walk_type(&decl.ty, visitor);
        }
        StmtKind::Function(decl) => walk_function(decl, DeclKind::Function, visitor),
        StmtKind::Const(decl) => {
            declare(&decl.name, DeclKind::Const, visitor);
            if let Some(ty) = &decl.ty {
                walk_type(ty, visitor);
            }
            if let Some(value) = &decl.value {
                walk_expr(value, visitor);
            }
        }
        StmtKind::Var(decl) => {
            variable(&decl.name, true, visitor);
            if let Some(ty) = &decl.ty {
                walk_type(ty, visitor);
            }
            if let Some(value) = &decl.value {
                walk_expr(value, visitor);
            }
        }
        StmtKind::Expr(expr) | StmtKind::Throw(expr) | StmtKind::Go(expr) => {
            walk_expr(expr, visitor)
        }
        StmtKind::Block(block) => walk_block(block, visitor),
        StmtKind::If(stmt) => {
            walk_expr(&stmt.cond, visitor);
            walk_block(&stmt.then_branch, visitor);
            if let Some(other) = &stmt.else_branch {
                walk_stmt(other, visitor);
            }
        }
        StmtKind::For(stmt) => {
            if let Some(init) = &stmt.init {
                walk_stmt(init, visitor);
            }
            if let Some(cond) = &stmt.cond {
                walk_expr(cond, visitor);
            }
            if let Some(step) = &stmt.step {
                walk_expr(step, visitor);
            }
            walk_block(&stmt.body, visitor);
        }
        StmtKind::Foreach(stmt) => {
            walk_expr(&stmt.iterable, visitor);
            if let Some(key) = &stmt.key {
                variable(key, true, visitor);
            }
            variable(&stmt.value, true, visitor);
            walk_block(&stmt.body, visitor);
        }
        StmtKind::While { cond, body } => {
            walk_expr(cond, visitor);
            walk_block(body, visitor);
        }
        StmtKind::DoWhile { body, cond } => {
            walk_block(body, visitor);
            walk_expr(cond, visitor);
        }
        StmtKind::Switch(stmt) => {
            walk_expr(&stmt.subject, visitor);
            for case in &stmt.cases {
                if let Some(test) = &case.test {
                    walk_expr(test, visitor);
                }
                walk_stmts(&case.body, visitor);
            }
        }
        StmtKind::Try(stmt) => {
            walk_block(&stmt.body, visitor);
            for catch in &stmt.catches {
                for ty in &catch.types {
                    walk_type(ty, visitor);
                }
                if let Some(var) = &catch.var {
                    variable(var, true, visitor);
                }
                walk_block(&catch.body, visitor);
            }
            if let Some(finally) = &stmt.finally {
                walk_block(finally, visitor);
            }
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                walk_expr(value, visitor);
            }
        }
        StmtKind::Echo(values) => {
            for value in values {
                walk_expr(value, visitor);
            }
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Error => {}
    }
}

fn walk_members<'a, V: Visitor<'a> + ?Sized>(members: &'a [ClassMember], visitor: &mut V) {
    for member in members {
        match member {
            ClassMember::Method(method) => walk_function(method, DeclKind::Method, visitor),
            ClassMember::Property(property) => {
                declare(&property.name, DeclKind::Property, visitor);
                if let Some(ty) = &property.ty {
                    walk_type(ty, visitor);
                }
                if let Some(default) = &property.default {
                    walk_expr(default, visitor);
                }
            }
            ClassMember::Const(constant) => {
                declare(&constant.name, DeclKind::ClassConst, visitor);
                if let Some(ty) = &constant.ty {
                    walk_type(ty, visitor);
                }
                if let Some(value) = &constant.value {
                    walk_expr(value, visitor);
                }
            }
            ClassMember::Case(case) => {
                declare(&case.name, DeclKind::EnumCase, visitor);
                if let Some(value) = &case.value {
                    walk_expr(value, visitor);
                }
            }
        }
    }
}

fn walk_params<'a, V: Visitor<'a> + ?Sized>(params: &'a [Param], visitor: &mut V) {
    for param in params {
        if let Some(ty) = &param.ty {
            walk_type(ty, visitor);
        }
        variable(&param.name, true, visitor);
        if let Some(default) = &param.default {
            walk_expr(default, visitor);
        }
    }
}

pub fn walk_function<'a, V: Visitor<'a> + ?Sized>(
    decl: &'a FunctionDecl,
    kind: DeclKind,
    visitor: &mut V,
) {
    declare(&decl.name, kind, visitor);
    let function = FunctionRef::Decl(decl);
    if !visitor.enter_function(function) {
        return;
    }
    walk_type_params(&decl.type_params, visitor);
    walk_params(&decl.params, visitor);
    if let Some(ret) = &decl.return_type {
        walk_type(ret, visitor);
    }
    if let Some(body) = &decl.body {
        walk_block(body, visitor);
    }
    visitor.leave_function(function);
}

/// Walks an expression in a position that is written to.
fn walk_target<'a, V: Visitor<'a> + ?Sized>(expr: &'a Expr, visitor: &mut V) {
    match &expr.kind {
        ExprKind::Variable(ident) => {
            visitor.visit_expr(expr);
            variable(ident, true, visitor);
        }
        ExprKind::Property {
            receiver, property, ..
        } => {
            visitor.visit_expr(expr);
            walk_expr(receiver, visitor);
            visitor.visit_name(NameRef {
                ident: property,
                kind: NameKind::Property,
                is_write: true,
            });
        }
        ExprKind::Index { target, index } => {
            visitor.visit_expr(expr);
            walk_target(target, visitor);
            if let Some(index) = index {
                walk_expr(index, visitor);
            }
        }
        ExprKind::Array(items) => {
            visitor.visit_expr(expr);
            for item in items {
                walk_target(item, visitor);
            }
        }
        _ => walk_expr(expr, visitor),
    }
}

pub fn walk_expr<'a, V: Visitor<'a> + ?Sized>(expr: &'a Expr, visitor: &mut V) {
    visitor.visit_expr(expr);
    match &expr.kind {
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Error => {}
        ExprKind::Variable(ident) => variable(ident, false, visitor),
        ExprKind::Name(ident) => visitor.visit_name(NameRef {
            ident,
            kind: NameKind::Name,
            is_write: false,
        }),
        ExprKind::Binary { lhs, rhs, .. } | ExprKind::Coalesce { lhs, rhs } => {
            walk_expr(lhs, visitor);
            walk_expr(rhs, visitor);
        }
        ExprKind::Unary { op, operand } => {
            use sola_syntax::ast::UnaryOp;
            if matches!(op, UnaryOp::PreInc | UnaryOp::PreDec) {
                walk_target(operand, visitor);
            } else {
                walk_expr(operand, visitor);
            }
        }
        ExprKind::Postfix { operand, .. } => walk_target(operand, visitor),
        ExprKind::Assign { target, value, .. } => {
            walk_target(target, visitor);
            walk_expr(value, visitor);
        }
        ExprKind::Ternary {
            cond,
            then,
            otherwise,
        } => {
            walk_expr(cond, visitor);
            if let Some(then) = then {
                walk_expr(then, visitor);
            }
            walk_expr(otherwise, visitor);
        }
        ExprKind::Call { callee, args } => {
            match &callee.kind {
                ExprKind::Name(ident) => {
                    visitor.visit_expr(callee);
                    visitor.visit_name(NameRef {
                        ident,
                        kind: NameKind::Function,
                        is_write: false,
                    });
                }
                _ => walk_expr(callee, visitor),
            }
            walk_exprs(args, visitor);
        }
        ExprKind::MethodCall {
            receiver,
            method,
            args,
            ..
        } => {
            walk_expr(receiver, visitor);
            visitor.visit_name(NameRef {
                ident: method,
                kind: NameKind::Method,
                is_write: false,
            });
            walk_exprs(args, visitor);
        }
        ExprKind::Property {
            receiver, property, ..
        } => {
            walk_expr(receiver, visitor);
            visitor.visit_name(NameRef {
                ident: property,
                kind: NameKind::Property,
                is_write: false,
            });
        }
        ExprKind::StaticAccess { class, member } => {
            visitor.visit_name(NameRef {
                ident: class,
                kind: NameKind::Type,
                is_write: false,
            });
            let kind = if member.is_variable() {
                NameKind::Property
            } else {
                NameKind::StaticMember
            };
            visitor.visit_name(NameRef {
                ident: member,
                kind,
                is_write: false,
            });
        }
        ExprKind::StaticCall {
            class,
            method,
            args,
        } => {
            visitor.visit_name(NameRef {
                ident: class,
                kind: NameKind::Type,
                is_write: false,
            });
            visitor.visit_name(NameRef {
                ident: method,
                kind: NameKind::Method,
                is_write: false,
            });
            walk_exprs(args, visitor);
        }
        ExprKind::Index { target, index } => {
            walk_expr(target, visitor);
            if let Some(index) = index {
                walk_expr(index, visitor);
            }
        }
        ExprKind::New { class, args } => {
            walk_type(class, visitor);
            walk_exprs(args, visitor);
        }
        ExprKind::Array(items) => walk_exprs(items, visitor),
        ExprKind::Map(entries) => {
            for entry in entries {
                walk_expr(&entry.key, visitor);
                walk_expr(&entry.value, visitor);
            }
        }
        ExprKind::Closure(closure) => {
            for captured in &closure.uses {
                variable(captured, false, visitor);
            }
            let function = FunctionRef::Closure(closure, expr.range);
            if visitor.enter_function(function) {
                walk_params(&closure.params, visitor);
                if let Some(ret) = &closure.return_type {
                    walk_type(ret, visitor);
                }
                walk_block(&closure.body, visitor);
                visitor.leave_function(function);
            }
        }
        ExprKind::Arrow(arrow) => {
            let function = FunctionRef::Arrow(arrow, expr.range);
            if visitor.enter_function(function) {
                walk_params(&arrow.params, visitor);
                if let Some(ret) = &arrow.return_type {
                    walk_type(ret, visitor);
                }
                walk_expr(&arrow.body, visitor);
                visitor.leave_function(function);
            }
        }
        ExprKind::Cast { expr, ty } | ExprKind::Is { expr, ty } => {
            walk_expr(expr, visitor);
            walk_type(ty, visitor);
        }
        ExprKind::Match(stmt) => {
            walk_expr(&stmt.subject, visitor);
            for arm in &stmt.arms {
                walk_exprs(&arm.patterns, visitor);
                walk_expr(&arm.body, visitor);
            }
        }
        ExprKind::Await(inner) => walk_expr(inner, visitor),
    }
}

fn walk_exprs<'a, V: Visitor<'a> + ?Sized>(exprs: &'a [Expr], visitor: &mut V) {
    for expr in exprs {
        walk_expr(expr, visitor);
    }
}

pub fn walk_type<'a, V: Visitor<'a> + ?Sized>(ty: &'a TypeNode, visitor: &mut V) {
    visitor.visit_type(ty);
    match &ty.kind {
        TypeKind::Named { name, args } => {
            visitor.visit_name(NameRef {
                ident: name,
                kind: NameKind::Type,
                is_write: false,
            });
            for arg in args {
                walk_type(arg, visitor);
            }
        }
        TypeKind::Nullable(inner) | TypeKind::Array(inner) => walk_type(inner, visitor),
        TypeKind::Union(members) => {
            for member in members {
                walk_type(member, visitor);
            }
        }
        TypeKind::Function { params, ret } => {
            for param in params {
                walk_type(param, visitor);
            }
            if let Some(ret) = ret {
                walk_type(ret, visitor);
            }
        }
    }
}

struct NameCollector<'a, 'n, F> {
    name: &'n str,
    callback: F,
    _tree: std::marker::PhantomData<&'a ()>,
}

impl<'a, F: FnMut(NameRef<'a>)> Visitor<'a> for NameCollector<'a, '_, F> {
    fn visit_name(&mut self, name: NameRef<'a>) {
        if name.matches(self.name) {
            (self.callback)(name);
        }
    }
}

/// Calls `callback` for every occurrence of `name`, in source order.
pub fn traverse_for_name<'a>(tree: &'a Tree, name: &str, callback: impl FnMut(NameRef<'a>)) {
    let mut collector = NameCollector {
        name,
        callback,
        _tree: std::marker::PhantomData,
    };
    walk_tree(tree, &mut collector);
}

/// Node tags understood by [`traverse_for_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Call,
    MethodCall,
    StaticCall,
    New,
    Closure,
    Return,
    VarDecl,
    Assign,
    Foreach,
}

#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Stmt(&'a Stmt),
    Expr(&'a Expr),
}

impl NodeKind {
    fn matches(self, node: Node<'_>) -> bool {
        match node {
            Node::Stmt(stmt) => matches!(
                (self, &stmt.kind),
                (NodeKind::Return, StmtKind::Return(_))
                    | (NodeKind::VarDecl, StmtKind::Var(_))
                    | (NodeKind::Foreach, StmtKind::Foreach(_))
            ),
            Node::Expr(expr) => matches!(
                (self, &expr.kind),
                (NodeKind::Call, ExprKind::Call { .. })
                    | (NodeKind::MethodCall, ExprKind::MethodCall { .. })
                    | (NodeKind::StaticCall, ExprKind::StaticCall { .. })
                    | (NodeKind::New, ExprKind::New { .. })
                    | (NodeKind::Closure, ExprKind::Closure(_) | ExprKind::Arrow(_))
                    | (NodeKind::Assign, ExprKind::Assign { .. })
            ),
        }
    }
}

struct KindCollector<F> {
    kind: NodeKind,
    callback: F,
}

impl<'a, F: FnMut(Node<'a>)> Visitor<'a> for KindCollector<F> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        if self.kind.matches(Node::Stmt(stmt)) {
            (self.callback)(Node::Stmt(stmt));
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if self.kind.matches(Node::Expr(expr)) {
            (self.callback)(Node::Expr(expr));
        }
    }
}

/// Calls `callback` at every node tagged `kind` below `stmts`.
pub fn traverse_for_kind<'a>(stmts: &'a [Stmt], kind: NodeKind, callback: impl FnMut(Node<'a>)) {
    let mut collector = KindCollector { kind, callback };
    walk_stmts(stmts, &mut collector);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        let (tree, errors) = sola_syntax::parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        tree
    }

    #[test]
    fn reports_reads_and_writes_in_order() {
        let tree = parse("$x := 1\n$y := $x + 1\n$x = $y\nprint($x)");
        let mut seen = Vec::new();
        traverse_for_name(&tree, "$x", |name| {
            seen.push((name.ident.range.start.line, name.is_write))
        });
        assert_eq!(seen, vec![(1, true), (2, false), (3, true), (4, false)]);
    }

    #[test]
    fn property_spellings_match_each_other() {
        let tree = parse("class A { public $n: string\n function f() { return $this->n } }");
        let mut kinds = Vec::new();
        traverse_for_name(&tree, "$n", |name| kinds.push(name.kind));
        assert_eq!(
            kinds,
            vec![
                NameKind::Declaration(DeclKind::Property),
                NameKind::Property
            ]
        );
    }

    #[test]
    fn closures_capture_by_read_and_can_be_skipped() {
        struct Outer {
            writes: Vec<String>,
            reads: Vec<String>,
        }
        impl<'a> Visitor<'a> for Outer {
            fn visit_name(&mut self, name: NameRef<'a>) {
                if name.kind == NameKind::Variable {
                    let list = if name.is_write {
                        &mut self.writes
                    } else {
                        &mut self.reads
                    };
                    list.push(name.ident.as_str().to_string());
                }
            }
            fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
                !matches!(function, FunctionRef::Closure(..))
            }
        }
        let tree = parse("$a := 1\n$f := function ($b) use ($a) { return $b }");
        let mut outer = Outer {
            writes: Vec::new(),
            reads: Vec::new(),
        };
        walk_tree(&tree, &mut outer);
        assert_eq!(outer.writes, vec!["$a", "$f"]);
        assert_eq!(outer.reads, vec!["$a"]);
    }

    #[test]
    fn finds_nodes_by_kind() {
        let tree = parse("function f() { g(1)\n $o->m()\n return new A() }");
        let mut calls = 0;
        traverse_for_kind(&tree.statements, NodeKind::Call, |_| calls += 1);
        let mut returns = 0;
        traverse_for_kind(&tree.statements, NodeKind::Return, |_| returns += 1);
        assert_eq!((calls, returns), (1, 1));
    }
}
