//! Syntax tree for Sola source files.
//!
//! The tree is immutable once the parser returns it. Every node carries the range it was
//! parsed from; names carry their own range so navigation can point at the identifier
//! rather than the whole declaration.

use crate::span::{Position, Range};
use smol_str::SmolStr;
use std::fmt;

/// A name together with the range it occupies. Variables keep their leading `$`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: SmolStr,
    pub range: Range,
}

impl Ident {
    pub fn new(name: impl Into<SmolStr>, range: Range) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }

    pub fn as_str(&self) -> &str {
        self.name.as_str()
    }

    pub fn is_variable(&self) -> bool {
        self.name.starts_with('$')
    }

    /// The name without a leading `$`.
    pub fn bare(&self) -> &str {
        self.name.strip_prefix('$').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub text: SmolStr,
    pub range: Range,
}

/// A parsed file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tree {
    pub statements: Vec<Stmt>,
    pub comments: Vec<Comment>,
    pub range: Range,
}

impl Tree {
    pub fn classes(&self) -> impl Iterator<Item = &ClassDecl> {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Class(class) => Some(class.as_ref()),
            _ => None,
        })
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDecl> {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Interface(interface) => Some(interface.as_ref()),
            _ => None,
        })
    }

    pub fn enums(&self) -> impl Iterator<Item = &EnumDecl> {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Enum(decl) => Some(decl.as_ref()),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Function(function) => Some(function.as_ref()),
            _ => None,
        })
    }

    pub fn uses(&self) -> impl Iterator<Item = &UseDecl> {
        self.statements.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Use(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn namespace(&self) -> Option<&NamespaceDecl> {
        self.statements.iter().find_map(|stmt| match &stmt.kind {
            StmtKind::Namespace(decl) => Some(decl),
            _ => None,
        })
    }

    pub fn find_class(&self, name: &str) -> Option<&ClassDecl> {
        self.classes().find(|class| class.name.as_str() == name)
    }

    pub fn find_interface(&self, name: &str) -> Option<&InterfaceDecl> {
        self.interfaces()
            .find(|interface| interface.name.as_str() == name)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDecl> {
        self.enums().find(|decl| decl.name.as_str() == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions()
            .find(|function| function.name.as_str() == name)
    }

    /// Every top-level declaration with its name.
    pub fn top_level_declarations(&self) -> impl Iterator<Item = Declaration<'_>> {
        self.statements.iter().filter_map(Declaration::from_stmt)
    }
}

/// A borrowed view over the top-level declaration forms.
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    Class(&'a ClassDecl),
    Interface(&'a InterfaceDecl),
    Enum(&'a EnumDecl),
    TypeAlias(&'a TypeAliasDecl),
    Function(&'a FunctionDecl),
    Const(&'a ConstDecl),
}

impl<'a> Declaration<'a> {
    pub fn from_stmt(stmt: &'a Stmt) -> Option<Self> {
        match &stmt.kind {
            StmtKind::Class(decl) => Some(Declaration::Class(decl)),
            StmtKind::Interface(decl) => Some(Declaration::Interface(decl)),
            StmtKind::Enum(decl) => Some(Declaration::Enum(decl)),
            StmtKind::TypeAlias(decl) => Some(Declaration::TypeAlias(decl)),
            StmtKind::Function(decl) => Some(Declaration::Function(decl)),
            StmtKind::Const(decl) => Some(Declaration::Const(decl)),
            _ => None,
        }
    }

    pub fn name(&self) -> &'a Ident {
        match self {
            Declaration::Class(decl) => &decl.name,
            Declaration::Interface(decl) => &decl.name,
            Declaration::Enum(decl) => &decl.name,
            Declaration::TypeAlias(decl) => &decl.name,
            Declaration::Function(decl) => &decl.name,
            Declaration::Const(decl) => &decl.name,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            Declaration::Class(decl) => decl.range,
            Declaration::Interface(decl) => decl.range,
            Declaration::Enum(decl) => decl.range,
            Declaration::TypeAlias(decl) => decl.range,
            Declaration::Function(decl) => decl.range,
            Declaration::Const(decl) => decl.range,
        }
    }

    pub fn doc(&self) -> Option<&'a str> {
        match self {
            Declaration::Class(decl) => decl.doc.as_deref(),
            Declaration::Interface(decl) => decl.doc.as_deref(),
            Declaration::Enum(decl) => decl.doc.as_deref(),
            Declaration::TypeAlias(decl) => decl.doc.as_deref(),
            Declaration::Function(decl) => decl.doc.as_deref(),
            Declaration::Const(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub visibility: Option<Visibility>,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_readonly: bool,
}

impl Modifiers {
    /// Rendered modifier keywords in source order, e.g. `public static`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if self.is_abstract {
            parts.push("abstract");
        }
        if self.is_final {
            parts.push("final");
        }
        if let Some(visibility) = self.visibility {
            parts.push(visibility.as_str());
        }
        if self.is_static {
            parts.push("static");
        }
        if self.is_readonly {
            parts.push("readonly");
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeParam {
    pub name: Ident,
    pub bound: Option<TypeNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    pub kind: TypeKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Named { name: Ident, args: Vec<TypeNode> },
    Nullable(Box<TypeNode>),
    Array(Box<TypeNode>),
    Union(Vec<TypeNode>),
    Function {
        params: Vec<TypeNode>,
        ret: Option<Box<TypeNode>>,
    },
}

impl TypeNode {
    pub fn named(name: &str, range: Range) -> Self {
        TypeNode {
            kind: TypeKind::Named {
                name: Ident::new(name, range),
                args: Vec::new(),
            },
            range,
        }
    }

    /// The outermost class-like name, looking through `?T` and `T[]`.
    pub fn base_name(&self) -> Option<&Ident> {
        match &self.kind {
            TypeKind::Named { name, .. } => Some(name),
            TypeKind::Nullable(inner) => inner.base_name(),
            TypeKind::Array(_) | TypeKind::Union(_) | TypeKind::Function { .. } => None,
        }
    }

    /// Element type of `T[]` or of `array<T>` / `List<T>` style generics.
    pub fn element_type(&self) -> Option<&TypeNode> {
        match &self.kind {
            TypeKind::Array(inner) => Some(inner),
            TypeKind::Named { args, .. } => args.last(),
            TypeKind::Nullable(inner) => inner.element_type(),
            _ => None,
        }
    }

    /// Key type of `map<K, V>` style generics.
    pub fn key_type(&self) -> Option<&TypeNode> {
        match &self.kind {
            TypeKind::Named { args, .. } if args.len() == 2 => args.first(),
            TypeKind::Nullable(inner) => inner.key_type(),
            _ => None,
        }
    }

    /// Every named type referenced, nested arguments included.
    pub fn referenced_names(&self) -> Vec<&Ident> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match &self.kind {
            TypeKind::Named { name, args } => {
                out.push(name);
                for arg in args {
                    arg.collect_names(out);
                }
            }
            TypeKind::Nullable(inner) | TypeKind::Array(inner) => inner.collect_names(out),
            TypeKind::Union(members) => {
                for member in members {
                    member.collect_names(out);
                }
            }
            TypeKind::Function { params, ret } => {
                for param in params {
                    param.collect_names(out);
                }
                if let Some(ret) = ret {
                    ret.collect_names(out);
                }
            }
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Named { name, args } => {
                write!(f, "{}", name.name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (idx, arg) in args.iter().enumerate() {
                        if idx > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeKind::Nullable(inner) => write!(f, "?{inner}"),
            TypeKind::Array(inner) => write!(f, "{inner}[]"),
            TypeKind::Union(members) => {
                for (idx, member) in members.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "|")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
            TypeKind::Function { params, ret } => {
                write!(f, "fn(")?;
                for (idx, param) in params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if let Some(ret) = ret {
                    write!(f, ": {ret}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Ident,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub extends: Option<TypeNode>,
    pub implements: Vec<TypeNode>,
    pub members: Vec<ClassMember>,
    pub doc: Option<String>,
    /// From the opening `{` to the closing `}`.
    pub body_range: Range,
    pub range: Range,
}

impl ClassDecl {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(ClassMember::as_method)
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Property(property) => Some(property),
            _ => None,
        })
    }

    pub fn constants(&self) -> impl Iterator<Item = &ConstDecl> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Const(constant) => Some(constant),
            _ => None,
        })
    }

    pub fn find_method(&self, name: &str) -> Option<&FunctionDecl> {
        self.methods().find(|method| method.name.as_str() == name)
    }

    pub fn constructor(&self) -> Option<&FunctionDecl> {
        self.find_method("__construct")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub extends: Vec<TypeNode>,
    pub members: Vec<ClassMember>,
    pub doc: Option<String>,
    pub body_range: Range,
    pub range: Range,
}

impl InterfaceDecl {
    pub fn methods(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(ClassMember::as_method)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Ident,
    pub backing: Option<TypeNode>,
    pub implements: Vec<TypeNode>,
    pub members: Vec<ClassMember>,
    pub doc: Option<String>,
    pub body_range: Range,
    pub range: Range,
}

impl EnumDecl {
    pub fn cases(&self) -> impl Iterator<Item = &EnumCase> {
        self.members.iter().filter_map(|member| match member {
            ClassMember::Case(case) => Some(case),
            _ => None,
        })
    }

    pub fn methods(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.members.iter().filter_map(ClassMember::as_method)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumCase {
    pub name: Ident,
    pub value: Option<Expr>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasDecl {
    pub name: Ident,
    pub type_params: Vec<TypeParam>,
    pub ty: TypeNode,
    pub doc: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassMember {
    Method(FunctionDecl),
    Property(PropertyDecl),
    Const(ConstDecl),
    Case(EnumCase),
}

impl ClassMember {
    pub fn as_method(&self) -> Option<&FunctionDecl> {
        match self {
            ClassMember::Method(method) => Some(method),
            _ => None,
        }
    }

    pub fn name(&self) -> &Ident {
        match self {
            ClassMember::Method(decl) => &decl.name,
            ClassMember::Property(decl) => &decl.name,
            ClassMember::Const(decl) => &decl.name,
            ClassMember::Case(decl) => &decl.name,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            ClassMember::Method(decl) => decl.range,
            ClassMember::Property(decl) => decl.range,
            ClassMember::Const(decl) => decl.range,
            ClassMember::Case(decl) => decl.range,
        }
    }
}

/// Functions, methods, and interface method signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Option<Block>,
    pub doc: Option<String>,
    pub range: Range,
}

impl FunctionDecl {
    /// `function name(params): Ret` without modifiers.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(Param::render)
            .collect::<Vec<_>>()
            .join(", ");
        let mut signature = format!("function {}({params})", self.name.name);
        if let Some(ret) = &self.return_type {
            signature.push_str(&format!(": {ret}"));
        }
        signature
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<TypeNode>,
    pub default: Option<Expr>,
    pub variadic: bool,
    /// Constructor promotion: `public $x` declares a property too.
    pub promoted: Option<Visibility>,
    pub range: Range,
}

impl Param {
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.variadic {
            out.push_str("...");
        }
        out.push_str(&self.name.name);
        if let Some(ty) = &self.ty {
            out.push_str(&format!(": {ty}"));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDecl {
    pub name: Ident,
    pub modifiers: Modifiers,
    pub ty: Option<TypeNode>,
    pub default: Option<Expr>,
    pub doc: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: Ident,
    pub modifiers: Modifiers,
    pub ty: Option<TypeNode>,
    pub value: Option<Expr>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseDecl {
    /// Dotted path (`sola.collections.List`) or the contents of a string import.
    pub path: SmolStr,
    pub path_range: Range,
    pub alias: Option<Ident>,
    /// `use "relative/file"` form.
    pub is_file: bool,
    pub range: Range,
}

impl UseDecl {
    /// The name this import introduces into scope.
    pub fn effective_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias.as_str();
        }
        self.path
            .rsplit(['.', '/', '\\'])
            .next()
            .unwrap_or(self.path.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub path: SmolStr,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Namespace(NamespaceDecl),
    Use(UseDecl),
    Class(Box<ClassDecl>),
    Interface(Box<InterfaceDecl>),
    Enum(Box<EnumDecl>),
    TypeAlias(Box<TypeAliasDecl>),
    Function(Box<FunctionDecl>),
    Const(ConstDecl),
    Var(VarDecl),
    Expr(Expr),
    Block(Block),
    If(Box<IfStmt>),
    For(Box<ForStmt>),
    Foreach(Box<ForeachStmt>),
    While { cond: Expr, body: Block },
    DoWhile { body: Block, cond: Expr },
    Switch(Box<SwitchStmt>),
    Try(Box<TryStmt>),
    Return(Option<Expr>),
    Throw(Expr),
    Echo(Vec<Expr>),
    Go(Expr),
    Break,
    Continue,
    /// A statement the parser could not make sense of.
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub ty: Option<TypeNode>,
    pub value: Option<Expr>,
    /// `$x := value` as opposed to `var $x ...`.
    pub short: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<Stmt>,
    pub cond: Option<Expr>,
    pub step: Option<Expr>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeachStmt {
    pub iterable: Expr,
    pub key: Option<Ident>,
    pub value: Ident,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub subject: Expr,
    pub cases: Vec<SwitchCase>,
    pub body_range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// `None` for `default:`.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub body: Block,
    pub catches: Vec<CatchClause>,
    pub finally: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    pub types: Vec<TypeNode>,
    pub var: Option<Ident>,
    pub body: Block,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Variable(Ident),
    Name(Ident),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },
    Coalesce {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
        safe: bool,
    },
    Property {
        receiver: Box<Expr>,
        property: Ident,
        safe: bool,
    },
    StaticAccess {
        class: Ident,
        member: Ident,
    },
    StaticCall {
        class: Ident,
        method: Ident,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Option<Box<Expr>>,
    },
    New {
        class: TypeNode,
        args: Vec<Expr>,
    },
    Array(Vec<Expr>),
    Map(Vec<MapEntry>),
    Closure(Box<Closure>),
    Arrow(Box<ArrowFn>),
    Cast {
        expr: Box<Expr>,
        ty: TypeNode,
    },
    Is {
        expr: Box<Expr>,
        ty: TypeNode,
    },
    Match(Box<MatchExpr>),
    Await(Box<Expr>),
    Error,
}

impl Expr {
    /// The identifier a call expression invokes, if it is a plain name.
    pub fn callee_name(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Expr,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub uses: Vec<Ident>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrowFn {
    pub params: Vec<Param>,
    pub return_type: Option<TypeNode>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchExpr {
    pub subject: Expr,
    pub arms: Vec<MatchArm>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub patterns: Vec<Expr>,
    pub is_default: bool,
    pub body: Expr,
    pub range: Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Identical,
    NotIdentical,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Identical
                | BinaryOp::NotIdentical
                | BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Mul
                | BinaryOp::Div
                | BinaryOp::Mod
                | BinaryOp::Pow
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Concat => ".",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Identical => "===",
            BinaryOp::NotIdentical => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    PreInc,
    PreDec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Coalesce,
}

/// The position directly after `range`, used to place inserted text.
pub fn after(range: Range) -> Position {
    range.end
}
