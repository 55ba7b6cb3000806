//! Semantic tokens for Sola sources.
//!
//! Every lexical token that carries meaning gets a token type from a fixed legend; the
//! syntax tree refines identifiers and variables (a `$name` may be a parameter, a bare
//! name may be a class, a method or an enum case). The legend order is part of the
//! protocol: the server advertises [`SEMANTIC_TOKEN_TYPES`] and
//! [`SEMANTIC_TOKEN_MODIFIERS`] at initialization and emits indices into them.
//!
//! Tokens never span lines. Block comments covering several lines are split into one
//! token per line.

use crate::symbols::{DeclKind, SymbolTable};
use crate::utils::for_each_class_like;
use crate::visitor::{walk_tree, FunctionRef, NameKind, NameRef, Visitor};
use sola_syntax::ast::{ClassMember, Declaration, Modifiers, Tree, TypeParam};
use sola_syntax::lexer::{is_builtin_function, is_builtin_type, tokenize, Token, TokenKind};
use sola_syntax::{Position, Range};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolaTokenType {
    Namespace,
    Class,
    Enum,
    Interface,
    TypeParameter,
    Type,
    Parameter,
    Variable,
    Property,
    EnumMember,
    Function,
    Method,
    Keyword,
    Modifier,
    Comment,
    String,
    Number,
    Regexp,
    Operator,
}

impl SolaTokenType {
    /// The standard LSP token type name.
    pub fn as_str(self) -> &'static str {
        match self {
            SolaTokenType::Namespace => "namespace",
            SolaTokenType::Class => "class",
            SolaTokenType::Enum => "enum",
            SolaTokenType::Interface => "interface",
            SolaTokenType::TypeParameter => "typeParameter",
            SolaTokenType::Type => "type",
            SolaTokenType::Parameter => "parameter",
            SolaTokenType::Variable => "variable",
            SolaTokenType::Property => "property",
            SolaTokenType::EnumMember => "enumMember",
            SolaTokenType::Function => "function",
            SolaTokenType::Method => "method",
            SolaTokenType::Keyword => "keyword",
            SolaTokenType::Modifier => "modifier",
            SolaTokenType::Comment => "comment",
            SolaTokenType::String => "string",
            SolaTokenType::Number => "number",
            SolaTokenType::Regexp => "regexp",
            SolaTokenType::Operator => "operator",
        }
    }

    /// Index into [`SEMANTIC_TOKEN_TYPES`].
    pub fn index(self) -> u32 {
        self as u32
    }
}

pub const SEMANTIC_TOKEN_TYPES: &[SolaTokenType] = &[
    SolaTokenType::Namespace,
    SolaTokenType::Class,
    SolaTokenType::Enum,
    SolaTokenType::Interface,
    SolaTokenType::TypeParameter,
    SolaTokenType::Type,
    SolaTokenType::Parameter,
    SolaTokenType::Variable,
    SolaTokenType::Property,
    SolaTokenType::EnumMember,
    SolaTokenType::Function,
    SolaTokenType::Method,
    SolaTokenType::Keyword,
    SolaTokenType::Modifier,
    SolaTokenType::Comment,
    SolaTokenType::String,
    SolaTokenType::Number,
    SolaTokenType::Regexp,
    SolaTokenType::Operator,
];

/// Modifier names; bit `n` of a token's modifier set refers to entry `n`.
pub const SEMANTIC_TOKEN_MODIFIERS: &[&str] = &[
    "declaration",
    "definition",
    "readonly",
    "static",
    "deprecated",
    "abstract",
    "async",
    "modification",
    "documentation",
    "defaultLibrary",
];

pub const DECLARATION: u32 = 1;
pub const DEFINITION: u32 = 1 << 1;
pub const READONLY: u32 = 1 << 2;
pub const STATIC: u32 = 1 << 3;
pub const DEPRECATED: u32 = 1 << 4;
pub const ABSTRACT: u32 = 1 << 5;
pub const ASYNC: u32 = 1 << 6;
pub const MODIFICATION: u32 = 1 << 7;
pub const DOCUMENTATION: u32 = 1 << 8;
pub const DEFAULT_LIBRARY: u32 = 1 << 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolaSemanticToken {
    pub kind: SolaTokenType,
    pub modifiers: u32,
    /// Always within one line.
    pub range: Range,
}

/// Classifies every meaningful token of `source`, sorted by position.
///
/// Without a tree only lexical classification is available: identifiers are then
/// reported only when they name a built-in.
pub fn collect_semantic_tokens(
    source: &str,
    tree: Option<&Tree>,
    symbols: Option<&SymbolTable>,
) -> Vec<SolaSemanticToken> {
    let names = match tree {
        Some(tree) => classify_names(tree, symbols),
        None => HashMap::new(),
    };
    let lines: Vec<&str> = source.split('\n').collect();
    let tokens = tokenize(source);

    let mut out = Vec::new();
    let mut previous: Option<&Token> = None;
    for token in tokens.iter() {
        if let Some((kind, modifiers)) = classify_token(token, previous, &names) {
            push_split(&mut out, &lines, token.range, kind, modifiers);
        }
        if !token.is_trivia() {
            previous = Some(token);
        }
    }
    out.sort_by_key(|token| (token.range.start, token.range.end));
    out
}

fn classify_token(
    token: &Token,
    previous: Option<&Token>,
    names: &HashMap<Position, (SolaTokenType, u32)>,
) -> Option<(SolaTokenType, u32)> {
    let kind = token.kind;
    if kind.is_modifier() {
        return Some((SolaTokenType::Modifier, 0));
    }
    if kind.is_keyword() {
        return Some((SolaTokenType::Keyword, 0));
    }
    if kind.is_operator() {
        return Some((SolaTokenType::Operator, 0));
    }
    match kind {
        TokenKind::LineComment | TokenKind::HashComment => Some((SolaTokenType::Comment, 0)),
        TokenKind::BlockComment if token.is_doc_comment() => {
            Some((SolaTokenType::Comment, DOCUMENTATION))
        }
        TokenKind::BlockComment => Some((SolaTokenType::Comment, 0)),
        TokenKind::String => Some((SolaTokenType::String, 0)),
        TokenKind::Int | TokenKind::Float => Some((SolaTokenType::Number, 0)),
        TokenKind::Variable => Some(
            names
                .get(&token.range.start)
                .copied()
                .unwrap_or((SolaTokenType::Variable, 0)),
        ),
        TokenKind::Identifier => {
            if let Some(known) = names.get(&token.range.start) {
                return Some(*known);
            }
            let after_namespace = previous.is_some_and(|prev| {
                matches!(prev.kind, TokenKind::Namespace | TokenKind::Use | TokenKind::Dot)
            });
            if after_namespace {
                return Some((SolaTokenType::Namespace, 0));
            }
            if is_builtin_type(&token.text) {
                return Some((SolaTokenType::Type, DEFAULT_LIBRARY));
            }
            if is_builtin_function(&token.text) {
                return Some((SolaTokenType::Function, DEFAULT_LIBRARY));
            }
            None
        }
        _ => None,
    }
}

/// Pushes `range` as one token per line it covers.
fn push_split(
    out: &mut Vec<SolaSemanticToken>,
    lines: &[&str],
    range: Range,
    kind: SolaTokenType,
    modifiers: u32,
) {
    if range.start.line == range.end.line {
        if range.end.column > range.start.column {
            out.push(SolaSemanticToken {
                kind,
                modifiers,
                range,
            });
        }
        return;
    }
    for line in range.start.line..=range.end.line {
        let start = if line == range.start.line {
            range.start.column
        } else {
            1
        };
        let end = if line == range.end.line {
            range.end.column
        } else {
            let text = lines.get(line as usize - 1).copied().unwrap_or("");
            text.chars().count() as u32 + 1
        };
        if end > start {
            out.push(SolaSemanticToken {
                kind,
                modifiers,
                range: Range::new(Position::new(line, start), Position::new(line, end)),
            });
        }
    }
}

struct NameClassifier<'s> {
    symbols: Option<&'s SymbolTable>,
    type_params: Vec<String>,
    params: Vec<Position>,
    names: HashMap<Position, (SolaTokenType, u32)>,
}

impl NameClassifier<'_> {
    fn type_name(&self, name: &str) -> (SolaTokenType, u32) {
        if self.type_params.iter().any(|param| param == name) {
            return (SolaTokenType::TypeParameter, 0);
        }
        if is_builtin_type(name) {
            return (SolaTokenType::Type, DEFAULT_LIBRARY);
        }
        match self.symbols.and_then(|symbols| symbols.kind_of(name)) {
            Some(DeclKind::Interface) => (SolaTokenType::Interface, 0),
            Some(DeclKind::Enum) => (SolaTokenType::Enum, 0),
            Some(DeclKind::TypeAlias) => (SolaTokenType::Type, 0),
            _ => (SolaTokenType::Class, 0),
        }
    }

    fn is_enum_case(&self, name: &str) -> bool {
        self.symbols.is_some_and(|symbols| {
            symbols
                .enum_values
                .values()
                .any(|cases| cases.iter().any(|case| case == name))
        })
    }
}

impl<'a> Visitor<'a> for NameClassifier<'_> {
    fn visit_name(&mut self, name: NameRef<'a>) {
        let ident = name.ident;
        if ident.as_str().is_empty() {
            return;
        }
        let write = if name.is_write { MODIFICATION } else { 0 };
        let classified = match name.kind {
            NameKind::Variable if self.params.contains(&ident.range.start) => {
                (SolaTokenType::Parameter, DECLARATION)
            }
            NameKind::Variable if ident.as_str() == "$this" => {
                (SolaTokenType::Variable, DEFAULT_LIBRARY | READONLY)
            }
            NameKind::Variable => (SolaTokenType::Variable, write),
            NameKind::Function if is_builtin_function(ident.as_str()) => {
                (SolaTokenType::Function, DEFAULT_LIBRARY)
            }
            NameKind::Function => (SolaTokenType::Function, 0),
            NameKind::Name => (SolaTokenType::Variable, READONLY),
            NameKind::Type => self.type_name(ident.as_str()),
            NameKind::Method => (SolaTokenType::Method, 0),
            NameKind::Property => (SolaTokenType::Property, write),
            NameKind::StaticMember if self.is_enum_case(ident.as_str()) => {
                (SolaTokenType::EnumMember, 0)
            }
            NameKind::StaticMember => (SolaTokenType::Property, STATIC | READONLY),
            NameKind::Declaration(kind) => {
                let token_type = match kind {
                    DeclKind::Class => SolaTokenType::Class,
                    DeclKind::Interface => SolaTokenType::Interface,
                    DeclKind::Enum => SolaTokenType::Enum,
                    DeclKind::TypeAlias => SolaTokenType::Type,
                    DeclKind::Function => SolaTokenType::Function,
                    DeclKind::Method => SolaTokenType::Method,
                    DeclKind::Property => SolaTokenType::Property,
                    DeclKind::Const | DeclKind::ClassConst => SolaTokenType::Variable,
                    DeclKind::EnumCase => SolaTokenType::EnumMember,
                };
                let readonly = match kind {
                    DeclKind::Const | DeclKind::ClassConst | DeclKind::EnumCase => READONLY,
                    _ => 0,
                };
                (token_type, DECLARATION | DEFINITION | readonly)
            }
        };
        self.names.insert(ident.range.start, classified);
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        self.params
            .extend(function.params().iter().map(|param| param.name.range.start));
        if let FunctionRef::Decl(decl) = function {
            self.declare_type_params(&decl.type_params);
        }
        true
    }
}

impl NameClassifier<'_> {
    fn declare_type_params(&mut self, params: &[TypeParam]) {
        for param in params {
            self.type_params.push(param.name.as_str().to_string());
            self.names.insert(
                param.name.range.start,
                (SolaTokenType::TypeParameter, DECLARATION),
            );
        }
    }
}

fn member_modifiers(modifiers: &Modifiers) -> u32 {
    let mut bits = 0;
    if modifiers.is_static {
        bits |= STATIC;
    }
    if modifiers.is_abstract {
        bits |= ABSTRACT;
    }
    if modifiers.is_readonly {
        bits |= READONLY;
    }
    bits
}

fn is_deprecated(doc: Option<&str>) -> bool {
    doc.is_some_and(|doc| doc.contains("@deprecated"))
}

fn classify_names(tree: &Tree, symbols: Option<&SymbolTable>) -> HashMap<Position, (SolaTokenType, u32)> {
    let mut classifier = NameClassifier {
        symbols,
        type_params: Vec::new(),
        params: Vec::new(),
        names: HashMap::new(),
    };
    for decl in tree.top_level_declarations() {
        match decl {
            Declaration::Class(class) => classifier.declare_type_params(&class.type_params),
            Declaration::Interface(interface) => {
                classifier.declare_type_params(&interface.type_params)
            }
            Declaration::TypeAlias(alias) => classifier.declare_type_params(&alias.type_params),
            _ => {}
        }
    }
    walk_tree(tree, &mut classifier);

    let mut names = classifier.names;
    let mut add = |position: Position, bits: u32| {
        if let Some(entry) = names.get_mut(&position) {
            entry.1 |= bits;
        }
    };
    for decl in tree.top_level_declarations() {
        if is_deprecated(decl.doc()) {
            add(decl.name().range.start, DEPRECATED);
        }
        if let Declaration::Class(class) = decl {
            if class.modifiers.is_abstract {
                add(class.name.range.start, ABSTRACT);
            }
        }
    }
    for_each_class_like(tree, &mut |class| {
        for member in class.members() {
            let (bits, doc) = match member {
                ClassMember::Method(method) => {
                    (member_modifiers(&method.modifiers), method.doc.as_deref())
                }
                ClassMember::Property(property) => {
                    (member_modifiers(&property.modifiers), property.doc.as_deref())
                }
                ClassMember::Const(constant) => (member_modifiers(&constant.modifiers) | STATIC, None),
                ClassMember::Case(_) => (STATIC, None),
            };
            let deprecated = if is_deprecated(doc) { DEPRECATED } else { 0 };
            add(member.name().range.start, bits | deprecated);
        }
    });
    names
}

/// LSP relative encoding: `[Δline, Δstart, length, type, modifiers]` per token, lines and
/// columns 0-based, `Δstart` relative only when the previous token is on the same line.
pub fn encode_semantic_tokens(tokens: &[SolaSemanticToken]) -> Vec<u32> {
    let mut data = Vec::with_capacity(tokens.len() * 5);
    let mut previous_line = 0;
    let mut previous_start = 0;
    for token in tokens {
        let line = token.range.start.line.saturating_sub(1);
        let start = token.range.start.column.saturating_sub(1);
        let length = token.range.end.column.saturating_sub(token.range.start.column);
        let delta_line = line - previous_line;
        let delta_start = if delta_line == 0 {
            start - previous_start
        } else {
            start
        };
        data.extend_from_slice(&[
            delta_line,
            delta_start,
            length,
            token.kind.index(),
            token.modifiers,
        ]);
        previous_line = line;
        previous_start = start;
    }
    data
}

/// Tokens overlapping `range`, clipped to it.
pub fn tokens_in_range(tokens: &[SolaSemanticToken], range: Range) -> Vec<SolaSemanticToken> {
    tokens
        .iter()
        .filter_map(|token| {
            let start = token.range.start.max(range.start);
            let end = token.range.end.min(range.end);
            (start < end).then_some(SolaSemanticToken {
                range: Range::new(start, end),
                ..*token
            })
        })
        .collect()
}
