//! Recursive-descent parser for declarations, statements, and types.
//!
//! Statement terminators are optional: a statement ends at `;`, at a closing brace, or at a
//! line break. The parser never gives up on a file. Each error is recorded and the parser
//! skips to the next statement boundary, so the returned tree covers everything that could
//! be recovered.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, Token, TokenKind};
use crate::span::{Position, Range};
use smol_str::SmolStr;

/// Nesting limit for blocks and expressions.
const MAX_DEPTH: u32 = 48;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    docs: Vec<Option<String>>,
    pos: usize,
    last_end: Position,
    depth: u32,
    /// Set while parsing a `foreach` subject so `as` is not read as a cast.
    pub(crate) no_as: bool,
    comments: Vec<Comment>,
    errors: Vec<ParseError>,
}

impl Parser {
    pub(crate) fn new(source: &str) -> Self {
        let mut tokens = Vec::new();
        let mut docs = Vec::new();
        let mut comments = Vec::new();
        let mut errors = Vec::new();
        let mut pending_doc = None;
        let mut carry_newline = false;

        for mut token in tokenize(source) {
            if token.is_trivia() {
                carry_newline |= token.newline_before || token.text.contains('\n');
                pending_doc = token
                    .is_doc_comment()
                    .then(|| clean_doc_comment(&token.text));
                comments.push(Comment {
                    text: token.text.clone(),
                    range: token.range,
                });
                continue;
            }
            if token.kind == TokenKind::Error {
                errors.push(ParseError::new(
                    format!("unexpected character '{}'", token.text),
                    token.range,
                ));
                carry_newline |= token.newline_before;
                continue;
            }
            token.newline_before |= carry_newline;
            carry_newline = false;
            docs.push(pending_doc.take());
            tokens.push(token);
        }

        Self {
            tokens,
            docs,
            pos: 0,
            last_end: Position::start(),
            depth: 0,
            no_as: false,
            comments,
            errors,
        }
    }

    pub(crate) fn parse_file(mut self) -> (Tree, Vec<ParseError>) {
        let mut statements = Vec::new();
        while !self.at_eof() {
            let before = self.pos;
            if self.at(TokenKind::RBrace) {
                self.error_here("unexpected '}'");
                self.bump();
                continue;
            }
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            if self.pos == before {
                self.skip_unexpected();
            }
        }
        let end = self.peek().range.end;
        let tree = Tree {
            statements,
            comments: self.comments,
            range: Range::new(Position::start(), end),
        };
        (tree, self.errors)
    }

    // ----- token cursor -----

    pub(crate) fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    pub(crate) fn nth(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len().saturating_sub(1));
        &self.tokens[idx]
    }

    pub(crate) fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    pub(crate) fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.last_end = token.range.end;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        self.at(kind).then(|| self.bump())
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.at(kind) {
            return Some(self.bump());
        }
        let found = describe(self.peek());
        self.error_here(format!("expected {what}, found {found}"));
        None
    }

    pub(crate) fn pos_marker(&self) -> usize {
        self.pos
    }

    pub(crate) fn start(&self) -> Position {
        self.peek().range.start
    }

    pub(crate) fn range_from(&self, start: Position) -> Range {
        Range::new(start, self.last_end.max(start))
    }

    pub(crate) fn error_at(&mut self, message: impl Into<String>, range: Range) {
        if self
            .errors
            .last()
            .is_some_and(|last| last.range.start == range.start)
        {
            return;
        }
        self.errors.push(ParseError::new(message, range));
    }

    pub(crate) fn error_here(&mut self, message: impl Into<String>) {
        let range = self.peek().range;
        self.error_at(message, range);
    }

    fn skip_unexpected(&mut self) {
        let found = describe(self.peek());
        self.error_here(format!("unexpected {found}"));
        self.bump();
    }

    pub(crate) fn descend(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.error_here("nesting too deep");
            return false;
        }
        self.depth += 1;
        true
    }

    pub(crate) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn current_doc(&self) -> Option<String> {
        self.docs.get(self.pos).cloned().flatten()
    }

    pub(crate) fn at_statement_end(&self) -> bool {
        let next = self.peek();
        matches!(
            next.kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || next.newline_before
    }

    /// Consumes an optional `;`. Anything else left on the same line is an error, and the
    /// rest of the line is skipped.
    pub(crate) fn end_statement(&mut self) {
        if self.eat(TokenKind::Semicolon).is_some() {
            return;
        }
        if self.at_statement_end() {
            return;
        }
        self.error_here("expected ';' after statement");
        self.recover();
    }

    fn recover(&mut self) {
        while !self.at_eof() {
            if self.eat(TokenKind::Semicolon).is_some() || self.at(TokenKind::RBrace) {
                return;
            }
            self.bump();
            if self.peek().newline_before {
                return;
            }
        }
    }

    // ----- names -----

    pub(crate) fn ident(token: &Token) -> Ident {
        Ident::new(token.text.clone(), token.range)
    }

    fn missing_ident(&self) -> Ident {
        Ident::new("", Range::empty(self.last_end))
    }

    fn expect_ident(&mut self, what: &str) -> Ident {
        match self.expect(TokenKind::Identifier, what) {
            Some(token) => Self::ident(&token),
            None => self.missing_ident(),
        }
    }

    /// Member names may reuse keywords (`$list->match()`, `Status::default`).
    pub(crate) fn member_name(&mut self) -> Option<Ident> {
        let token = self.peek();
        if token.kind == TokenKind::Identifier || token.kind.is_keyword() {
            let token = self.bump();
            return Some(Self::ident(&token));
        }
        let found = describe(token);
        self.error_here(format!("expected member name, found {found}"));
        None
    }

    fn parse_path(&mut self) -> (SmolStr, Range) {
        let first = self.expect_ident("a name");
        let mut path = first.name.to_string();
        let mut range = first.range;
        while matches!(self.kind(), TokenKind::Dot | TokenKind::Backslash)
            && self.nth(1).kind == TokenKind::Identifier
            && !self.nth(1).newline_before
        {
            self.bump();
            let segment = self.bump();
            path.push('.');
            path.push_str(&segment.text);
            range.end = segment.range.end;
        }
        (SmolStr::new(path), range)
    }

    // ----- statements -----

    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.start();
        let doc = self.current_doc();
        let kind = match self.kind() {
            TokenKind::Semicolon => {
                self.bump();
                return None;
            }
            TokenKind::Namespace => self.parse_namespace(),
            TokenKind::Use => self.parse_use(),
            TokenKind::Abstract
            | TokenKind::Final
            | TokenKind::Public
            | TokenKind::Protected
            | TokenKind::Private
            | TokenKind::Readonly
            | TokenKind::Class => self.parse_modified_declaration(doc, start),
            TokenKind::Static if self.nth(1).kind != TokenKind::DoubleColon => {
                self.parse_modified_declaration(doc, start)
            }
            TokenKind::Interface => self.parse_interface(doc, start),
            TokenKind::Enum => self.parse_enum(doc, start),
            TokenKind::Type if self.nth(1).kind == TokenKind::Identifier => {
                self.parse_type_alias(doc, start)
            }
            TokenKind::Function if self.nth(1).kind != TokenKind::LParen => {
                let function = self.parse_function(Modifiers::default(), doc, start);
                StmtKind::Function(Box::new(function))
            }
            TokenKind::Const => {
                let decl = self.parse_const(Modifiers::default(), start);
                StmtKind::Const(decl)
            }
            TokenKind::Var => {
                let decl = self.parse_var();
                self.end_statement();
                StmtKind::Var(decl)
            }
            TokenKind::Variable if self.nth(1).kind == TokenKind::ColonEq => {
                let decl = self.parse_short_var();
                self.end_statement();
                StmtKind::Var(decl)
            }
            TokenKind::LBrace => StmtKind::Block(self.parse_block()),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::While => {
                self.bump();
                let cond = self.parse_paren_expr();
                let body = self.parse_body();
                StmtKind::While { cond, body }
            }
            TokenKind::Do => {
                self.bump();
                let body = self.parse_body();
                self.expect(TokenKind::While, "'while'");
                let cond = self.parse_paren_expr();
                self.end_statement();
                StmtKind::DoWhile { body, cond }
            }
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                self.bump();
                let value = (!self.at_statement_end()).then(|| self.parse_expr());
                self.end_statement();
                StmtKind::Return(value)
            }
            TokenKind::Throw => {
                self.bump();
                let value = self.parse_expr();
                self.end_statement();
                StmtKind::Throw(value)
            }
            TokenKind::Go => {
                self.bump();
                let value = self.parse_expr();
                self.end_statement();
                StmtKind::Go(value)
            }
            TokenKind::Echo => {
                self.bump();
                let mut values = vec![self.parse_expr()];
                while self.eat(TokenKind::Comma).is_some() {
                    values.push(self.parse_expr());
                }
                self.end_statement();
                StmtKind::Echo(values)
            }
            TokenKind::Break | TokenKind::Continue => {
                let keyword = self.bump();
                if self.at(TokenKind::Int) && !self.peek().newline_before {
                    self.bump();
                }
                self.end_statement();
                if keyword.kind == TokenKind::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            _ => {
                let before = self.pos;
                let expr = self.parse_expr();
                if self.pos == before {
                    return None;
                }
                self.end_statement();
                StmtKind::Expr(expr)
            }
        };
        Some(Stmt {
            kind,
            range: self.range_from(start),
        })
    }

    /// Statements until a closing brace or a token accepted by `stop`.
    fn parse_statements_until(&mut self, stop: impl Fn(TokenKind) -> bool) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.at_eof() && !self.at(TokenKind::RBrace) && !stop(self.kind()) {
            let before = self.pos;
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
            if self.pos == before {
                self.skip_unexpected();
            }
        }
        statements
    }

    pub(crate) fn parse_block(&mut self) -> Block {
        let start = self.start();
        if self.expect(TokenKind::LBrace, "'{'").is_none() {
            return Block {
                statements: Vec::new(),
                range: Range::empty(start),
            };
        }
        if !self.descend() {
            self.skip_balanced_braces();
            return Block {
                statements: Vec::new(),
                range: self.range_from(start),
            };
        }
        let statements = self.parse_statements_until(|_| false);
        self.ascend();
        self.expect(TokenKind::RBrace, "'}'");
        Block {
            statements,
            range: self.range_from(start),
        }
    }

    fn skip_balanced_braces(&mut self) {
        let mut depth = 1usize;
        while !self.at_eof() && depth > 0 {
            match self.bump().kind {
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
        }
    }

    /// A braced block, or a single statement wrapped in one.
    fn parse_body(&mut self) -> Block {
        if self.at(TokenKind::LBrace) {
            return self.parse_block();
        }
        let start = self.start();
        let statements = self.parse_statement().into_iter().collect();
        Block {
            statements,
            range: self.range_from(start),
        }
    }

    pub(crate) fn parse_paren_expr(&mut self) -> Expr {
        self.expect(TokenKind::LParen, "'('");
        let saved = std::mem::replace(&mut self.no_as, false);
        let expr = self.parse_expr();
        self.no_as = saved;
        self.expect(TokenKind::RParen, "')'");
        expr
    }

    fn parse_namespace(&mut self) -> StmtKind {
        let start = self.start();
        self.bump();
        let (path, _) = self.parse_path();
        self.end_statement();
        StmtKind::Namespace(NamespaceDecl {
            path,
            range: self.range_from(start),
        })
    }

    fn parse_use(&mut self) -> StmtKind {
        let start = self.start();
        self.bump();
        let (path, path_range, is_file) = match self.eat(TokenKind::String) {
            Some(token) => (SmolStr::new(unquote(&token.text)), token.range, true),
            None => {
                let (path, range) = self.parse_path();
                (path, range, false)
            }
        };
        let alias = self
            .eat(TokenKind::As)
            .map(|_| self.expect_ident("alias name"));
        self.end_statement();
        StmtKind::Use(UseDecl {
            path,
            path_range,
            alias,
            is_file,
            range: self.range_from(start),
        })
    }

    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::default();
        loop {
            match self.kind() {
                TokenKind::Public => modifiers.visibility = Some(Visibility::Public),
                TokenKind::Protected => modifiers.visibility = Some(Visibility::Protected),
                TokenKind::Private => modifiers.visibility = Some(Visibility::Private),
                TokenKind::Static if self.nth(1).kind != TokenKind::DoubleColon => {
                    modifiers.is_static = true
                }
                TokenKind::Abstract => modifiers.is_abstract = true,
                TokenKind::Final => modifiers.is_final = true,
                TokenKind::Readonly => modifiers.is_readonly = true,
                _ => return modifiers,
            }
            self.bump();
        }
    }

    fn parse_modified_declaration(&mut self, doc: Option<String>, start: Position) -> StmtKind {
        let modifiers = self.parse_modifiers();
        match self.kind() {
            TokenKind::Class => self.parse_class(modifiers, doc, start),
            TokenKind::Function => {
                StmtKind::Function(Box::new(self.parse_function(modifiers, doc, start)))
            }
            TokenKind::Interface => self.parse_interface(doc, start),
            TokenKind::Enum => self.parse_enum(doc, start),
            TokenKind::Const => StmtKind::Const(self.parse_const(modifiers, start)),
            _ => {
                let found = describe(self.peek());
                self.error_here(format!("expected declaration, found {found}"));
                StmtKind::Error
            }
        }
    }

    fn parse_class(&mut self, modifiers: Modifiers, doc: Option<String>, start: Position) -> StmtKind {
        self.bump();
        let name = self.expect_ident("class name");
        let type_params = self.parse_type_params();
        let extends = self
            .eat(TokenKind::Extends)
            .and_then(|_| self.parse_type());
        let implements = if self.eat(TokenKind::Implements).is_some() {
            self.parse_type_list()
        } else {
            Vec::new()
        };
        let (members, body_range) = self.parse_member_body(false);
        StmtKind::Class(Box::new(ClassDecl {
            name,
            modifiers,
            type_params,
            extends,
            implements,
            members,
            doc,
            body_range,
            range: self.range_from(start),
        }))
    }

    fn parse_interface(&mut self, doc: Option<String>, start: Position) -> StmtKind {
        self.bump();
        let name = self.expect_ident("interface name");
        let type_params = self.parse_type_params();
        let extends = if self.eat(TokenKind::Extends).is_some() {
            self.parse_type_list()
        } else {
            Vec::new()
        };
        let (members, body_range) = self.parse_member_body(false);
        StmtKind::Interface(Box::new(InterfaceDecl {
            name,
            type_params,
            extends,
            members,
            doc,
            body_range,
            range: self.range_from(start),
        }))
    }

    fn parse_enum(&mut self, doc: Option<String>, start: Position) -> StmtKind {
        self.bump();
        let name = self.expect_ident("enum name");
        let backing = self.eat(TokenKind::Colon).and_then(|_| self.parse_type());
        let implements = if self.eat(TokenKind::Implements).is_some() {
            self.parse_type_list()
        } else {
            Vec::new()
        };
        let (members, body_range) = self.parse_member_body(true);
        StmtKind::Enum(Box::new(EnumDecl {
            name,
            backing,
            implements,
            members,
            doc,
            body_range,
            range: self.range_from(start),
        }))
    }

    fn parse_type_alias(&mut self, doc: Option<String>, start: Position) -> StmtKind {
        self.bump();
        let name = self.expect_ident("type name");
        let type_params = self.parse_type_params();
        self.expect(TokenKind::Eq, "'='");
        let ty = self
            .parse_type()
            .unwrap_or_else(|| TypeNode::named("mixed", Range::empty(self.last_end)));
        self.end_statement();
        StmtKind::TypeAlias(Box::new(TypeAliasDecl {
            name,
            type_params,
            ty,
            doc,
            range: self.range_from(start),
        }))
    }

    fn parse_member_body(&mut self, in_enum: bool) -> (Vec<ClassMember>, Range) {
        let start = self.start();
        let mut members = Vec::new();
        if self.expect(TokenKind::LBrace, "'{'").is_none() {
            return (members, Range::empty(start));
        }
        while !self.at(TokenKind::RBrace) && !self.at_eof() {
            let before = self.pos;
            self.parse_member(in_enum, &mut members);
            if self.pos == before {
                let found = describe(self.peek());
                self.error_here(format!("unexpected {found} in declaration body"));
                self.bump();
            }
        }
        self.expect(TokenKind::RBrace, "'}'");
        (members, self.range_from(start))
    }

    fn parse_member(&mut self, in_enum: bool, out: &mut Vec<ClassMember>) {
        let start = self.start();
        let doc = self.current_doc();
        if self.eat(TokenKind::Semicolon).is_some() {
            return;
        }
        let mut modifiers = self.parse_modifiers();
        if self.eat(TokenKind::Var).is_some() {
            modifiers.visibility.get_or_insert(Visibility::Public);
        }
        match self.kind() {
            TokenKind::Function => {
                let method = self.parse_function(modifiers, doc, start);
                out.push(ClassMember::Method(method));
            }
            TokenKind::Const => {
                let constant = self.parse_const(modifiers, start);
                out.push(ClassMember::Const(constant));
            }
            TokenKind::Case => {
                self.bump();
                self.parse_enum_cases(start, out);
            }
            TokenKind::Variable => {
                let property = self.parse_property(modifiers, None, doc, start);
                out.push(ClassMember::Property(property));
            }
            TokenKind::Identifier
                if in_enum
                    && modifiers == Modifiers::default()
                    && (matches!(
                        self.nth(1).kind,
                        TokenKind::Comma | TokenKind::RBrace | TokenKind::Eq | TokenKind::Semicolon
                    ) || self.nth(1).newline_before) =>
            {
                self.parse_enum_cases(start, out);
            }
            TokenKind::Identifier | TokenKind::Question | TokenKind::Null | TokenKind::LParen => {
                let ty = self.parse_type();
                if self.at(TokenKind::Variable) {
                    let property = self.parse_property(modifiers, ty, doc, start);
                    out.push(ClassMember::Property(property));
                } else {
                    let found = describe(self.peek());
                    self.error_here(format!("expected property name, found {found}"));
                    self.recover();
                }
            }
            _ => {}
        }
    }

    fn parse_enum_cases(&mut self, start: Position, out: &mut Vec<ClassMember>) {
        let mut case_start = start;
        loop {
            let Some(name) = self.member_name() else {
                break;
            };
            let value = self.eat(TokenKind::Eq).map(|_| self.parse_expr());
            out.push(ClassMember::Case(EnumCase {
                name,
                value,
                range: self.range_from(case_start),
            }));
            if self.eat(TokenKind::Comma).is_none() || self.at(TokenKind::RBrace) {
                break;
            }
            case_start = self.start();
        }
        self.end_statement();
    }

    fn parse_property(
        &mut self,
        modifiers: Modifiers,
        ty: Option<TypeNode>,
        doc: Option<String>,
        start: Position,
    ) -> PropertyDecl {
        let token = self.bump();
        let name = Self::ident(&token);
        let ty = match ty {
            Some(ty) => Some(ty),
            None => self.eat(TokenKind::Colon).and_then(|_| self.parse_type()),
        };
        let default = self.eat(TokenKind::Eq).map(|_| self.parse_expr());
        self.end_statement();
        PropertyDecl {
            name,
            modifiers,
            ty,
            default,
            doc,
            range: self.range_from(start),
        }
    }

    fn parse_const(&mut self, modifiers: Modifiers, start: Position) -> ConstDecl {
        self.bump();
        let mut ty = None;
        if self.at(TokenKind::Identifier) && self.nth(1).kind == TokenKind::Identifier {
            ty = self.parse_type();
        }
        let name = self.member_name().unwrap_or_else(|| self.missing_ident());
        if ty.is_none() && self.eat(TokenKind::Colon).is_some() {
            ty = self.parse_type();
        }
        let value = match self.expect(TokenKind::Eq, "'='") {
            Some(_) => Some(self.parse_expr()),
            None => None,
        };
        self.end_statement();
        ConstDecl {
            name,
            modifiers,
            ty,
            value,
            range: self.range_from(start),
        }
    }

    pub(crate) fn parse_function(
        &mut self,
        modifiers: Modifiers,
        doc: Option<String>,
        start: Position,
    ) -> FunctionDecl {
        self.bump();
        let name = self.member_name().unwrap_or_else(|| self.missing_ident());
        let type_params = self.parse_type_params();
        let params = self.parse_params();
        let return_type = self.eat(TokenKind::Colon).and_then(|_| self.parse_type());
        let body = if self.at(TokenKind::LBrace) {
            Some(self.parse_block())
        } else {
            self.end_statement();
            None
        };
        FunctionDecl {
            name,
            modifiers,
            type_params,
            params,
            return_type,
            body,
            doc,
            range: self.range_from(start),
        }
    }

    pub(crate) fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if self.expect(TokenKind::LParen, "'('").is_none() {
            return params;
        }
        while !self.at(TokenKind::RParen) && !self.at_eof() {
            if let Some(param) = self.parse_param() {
                params.push(param);
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'");
        params
    }

    fn parse_param(&mut self) -> Option<Param> {
        let start = self.start();
        let mut promoted = None;
        loop {
            match self.kind() {
                TokenKind::Public => promoted = Some(Visibility::Public),
                TokenKind::Protected => promoted = Some(Visibility::Protected),
                TokenKind::Private => promoted = Some(Visibility::Private),
                TokenKind::Readonly => {
                    promoted.get_or_insert(Visibility::Public);
                }
                _ => break,
            }
            self.bump();
        }
        let mut ty = None;
        if !matches!(self.kind(), TokenKind::Variable | TokenKind::Ellipsis) {
            ty = self.parse_type();
        }
        let variadic = self.eat(TokenKind::Ellipsis).is_some();
        self.eat(TokenKind::Amp);
        let token = self.expect(TokenKind::Variable, "parameter name")?;
        if ty.is_none() && self.eat(TokenKind::Colon).is_some() {
            ty = self.parse_type();
        }
        let default = self.eat(TokenKind::Eq).map(|_| self.parse_expr());
        Some(Param {
            name: Self::ident(&token),
            ty,
            default,
            variadic,
            promoted,
            range: self.range_from(start),
        })
    }

    fn parse_var(&mut self) -> VarDecl {
        self.bump();
        let mut ty = None;
        if !self.at(TokenKind::Variable) {
            ty = self.parse_type();
        }
        let name = match self.expect(TokenKind::Variable, "variable name") {
            Some(token) => Self::ident(&token),
            None => self.missing_ident(),
        };
        if ty.is_none() && self.eat(TokenKind::Colon).is_some() {
            ty = self.parse_type();
        }
        let value = self.eat(TokenKind::Eq).map(|_| self.parse_expr());
        VarDecl {
            name,
            ty,
            value,
            short: false,
        }
    }

    fn parse_short_var(&mut self) -> VarDecl {
        let token = self.bump();
        self.bump();
        let value = self.parse_expr();
        VarDecl {
            name: Self::ident(&token),
            ty: None,
            value: Some(value),
            short: true,
        }
    }

    fn parse_if(&mut self) -> StmtKind {
        self.bump();
        let cond = self.parse_paren_expr();
        let then_branch = self.parse_body();
        let else_branch = if self.eat(TokenKind::Else).is_some() {
            let start = self.start();
            if self.at(TokenKind::If) {
                let kind = self.parse_if();
                Some(Stmt {
                    kind,
                    range: self.range_from(start),
                })
            } else {
                let block = self.parse_body();
                Some(Stmt {
                    range: block.range,
                    kind: StmtKind::Block(block),
                })
            }
        } else {
            None
        };
        StmtKind::If(Box::new(IfStmt {
            cond,
            then_branch,
            else_branch,
        }))
    }

    fn parse_simple_statement(&mut self) -> Stmt {
        let start = self.start();
        let kind = match self.kind() {
            TokenKind::Var => StmtKind::Var(self.parse_var()),
            TokenKind::Variable if self.nth(1).kind == TokenKind::ColonEq => {
                StmtKind::Var(self.parse_short_var())
            }
            _ => StmtKind::Expr(self.parse_expr()),
        };
        Stmt {
            kind,
            range: self.range_from(start),
        }
    }

    fn parse_for(&mut self) -> StmtKind {
        self.bump();
        self.expect(TokenKind::LParen, "'('");
        let init = (!self.at(TokenKind::Semicolon)).then(|| self.parse_simple_statement());
        self.expect(TokenKind::Semicolon, "';'");
        let cond = (!self.at(TokenKind::Semicolon)).then(|| self.parse_expr());
        self.expect(TokenKind::Semicolon, "';'");
        let step = (!self.at(TokenKind::RParen)).then(|| self.parse_expr());
        self.expect(TokenKind::RParen, "')'");
        let body = self.parse_body();
        StmtKind::For(Box::new(ForStmt {
            init,
            cond,
            step,
            body,
        }))
    }

    fn parse_foreach(&mut self) -> StmtKind {
        self.bump();
        self.expect(TokenKind::LParen, "'('");
        let saved = std::mem::replace(&mut self.no_as, true);
        let iterable = self.parse_expr();
        self.no_as = saved;
        self.expect(TokenKind::As, "'as'");
        let first = match self.expect(TokenKind::Variable, "loop variable") {
            Some(token) => Self::ident(&token),
            None => self.missing_ident(),
        };
        let (key, value) = if self.eat(TokenKind::FatArrow).is_some() {
            let value = match self.expect(TokenKind::Variable, "loop variable") {
                Some(token) => Self::ident(&token),
                None => self.missing_ident(),
            };
            (Some(first), value)
        } else {
            (None, first)
        };
        self.expect(TokenKind::RParen, "')'");
        let body = self.parse_body();
        StmtKind::Foreach(Box::new(ForeachStmt {
            iterable,
            key,
            value,
            body,
        }))
    }

    fn parse_switch(&mut self) -> StmtKind {
        self.bump();
        let subject = self.parse_paren_expr();
        let body_start = self.start();
        let mut cases = Vec::new();
        if self.expect(TokenKind::LBrace, "'{'").is_some() {
            while !self.at(TokenKind::RBrace) && !self.at_eof() {
                let case_start = self.start();
                let test = if self.eat(TokenKind::Case).is_some() {
                    Some(self.parse_expr())
                } else if self.eat(TokenKind::Default).is_some() {
                    None
                } else {
                    self.error_here("expected 'case' or 'default'");
                    self.bump();
                    continue;
                };
                if self.eat(TokenKind::Colon).is_none() && self.eat(TokenKind::Semicolon).is_none()
                {
                    self.error_here("expected ':' after case label");
                }
                let body = self.parse_statements_until(|kind| {
                    matches!(kind, TokenKind::Case | TokenKind::Default)
                });
                cases.push(SwitchCase {
                    test,
                    body,
                    range: self.range_from(case_start),
                });
            }
            self.expect(TokenKind::RBrace, "'}'");
        }
        StmtKind::Switch(Box::new(SwitchStmt {
            subject,
            cases,
            body_range: self.range_from(body_start),
        }))
    }

    fn parse_try(&mut self) -> StmtKind {
        self.bump();
        let body = self.parse_block();
        let mut catches = Vec::new();
        while self.at(TokenKind::Catch) {
            let start = self.start();
            self.bump();
            self.expect(TokenKind::LParen, "'('");
            let types = match self.parse_type() {
                Some(TypeNode {
                    kind: TypeKind::Union(members),
                    ..
                }) => members,
                Some(ty) => vec![ty],
                None => Vec::new(),
            };
            let var = self.eat(TokenKind::Variable).map(|token| Self::ident(&token));
            self.expect(TokenKind::RParen, "')'");
            let body = self.parse_block();
            catches.push(CatchClause {
                types,
                var,
                body,
                range: self.range_from(start),
            });
        }
        let finally = self
            .eat(TokenKind::Finally)
            .map(|_| self.parse_block());
        if catches.is_empty() && finally.is_none() {
            self.error_here("expected 'catch' or 'finally'");
        }
        StmtKind::Try(Box::new(TryStmt {
            body,
            catches,
            finally,
        }))
    }

    // ----- types -----

    pub(crate) fn parse_type(&mut self) -> Option<TypeNode> {
        let start = self.start();
        let first = self.parse_type_atom()?;
        if !self.at(TokenKind::Pipe) {
            return Some(first);
        }
        let mut members = vec![first];
        while self.eat(TokenKind::Pipe).is_some() {
            match self.parse_type_atom() {
                Some(member) => members.push(member),
                None => break,
            }
        }
        Some(TypeNode {
            kind: TypeKind::Union(members),
            range: self.range_from(start),
        })
    }

    pub(crate) fn parse_type_atom(&mut self) -> Option<TypeNode> {
        let start = self.start();
        let mut node = match self.kind() {
            TokenKind::Question => {
                self.bump();
                let inner = self.parse_type_atom()?;
                TypeNode {
                    kind: TypeKind::Nullable(Box::new(inner)),
                    range: self.range_from(start),
                }
            }
            TokenKind::Fn | TokenKind::Function if self.nth(1).kind == TokenKind::LParen => {
                self.bump();
                self.bump();
                let mut params = Vec::new();
                while !self.at(TokenKind::RParen) && !self.at_eof() {
                    match self.parse_type() {
                        Some(param) => params.push(param),
                        None => break,
                    }
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'");
                let ret = self
                    .eat(TokenKind::Colon)
                    .and_then(|_| self.parse_type_atom())
                    .map(Box::new);
                TypeNode {
                    kind: TypeKind::Function { params, ret },
                    range: self.range_from(start),
                }
            }
            TokenKind::Identifier | TokenKind::Null | TokenKind::Static => {
                let token = self.bump();
                let mut name = Self::ident(&token);
                while self.at(TokenKind::Backslash) && self.nth(1).kind == TokenKind::Identifier {
                    self.bump();
                    let segment = self.bump();
                    name = Ident::new(
                        format!("{}\\{}", name.name, segment.text),
                        name.range.merge(segment.range),
                    );
                }
                let mut args = Vec::new();
                if self.eat(TokenKind::Lt).is_some() {
                    while !self.at_closing_angle() && !self.at_eof() {
                        match self.parse_type() {
                            Some(arg) => args.push(arg),
                            None => break,
                        }
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                    self.expect_closing_angle();
                }
                TypeNode {
                    kind: TypeKind::Named { name, args },
                    range: self.range_from(start),
                }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect(TokenKind::RParen, "')'");
                inner
            }
            _ => {
                let found = describe(self.peek());
                self.error_here(format!("expected type, found {found}"));
                return None;
            }
        };
        while self.at(TokenKind::LBracket) && self.nth(1).kind == TokenKind::RBracket {
            self.bump();
            self.bump();
            node = TypeNode {
                kind: TypeKind::Array(Box::new(node)),
                range: self.range_from(start),
            };
        }
        Some(node)
    }

    fn at_closing_angle(&self) -> bool {
        matches!(self.kind(), TokenKind::Gt | TokenKind::Shr)
    }

    /// Closes a generic argument list. A `>>` token closes two lists, so it is split and
    /// only its first half is consumed.
    fn expect_closing_angle(&mut self) {
        match self.kind() {
            TokenKind::Gt => {
                self.bump();
            }
            TokenKind::Shr => {
                let idx = self.pos;
                let token = &mut self.tokens[idx];
                let split = Position::new(token.range.start.line, token.range.start.column + 1);
                token.kind = TokenKind::Gt;
                token.text = SmolStr::new(">");
                token.range.start = split;
                token.span.start += 1;
                token.newline_before = false;
                self.last_end = split;
            }
            _ => {
                let found = describe(self.peek());
                self.error_here(format!("expected '>', found {found}"));
            }
        }
    }

    fn parse_type_list(&mut self) -> Vec<TypeNode> {
        let mut types = Vec::new();
        loop {
            match self.parse_type_atom() {
                Some(ty) => types.push(ty),
                None => break,
            }
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        types
    }

    fn parse_type_params(&mut self) -> Vec<TypeParam> {
        let mut params = Vec::new();
        if self.eat(TokenKind::Lt).is_none() {
            return params;
        }
        while !self.at_closing_angle() && !self.at_eof() {
            let Some(token) = self.expect(TokenKind::Identifier, "type parameter") else {
                break;
            };
            let bound = self
                .eat(TokenKind::Extends)
                .or_else(|| self.eat(TokenKind::Colon))
                .and_then(|_| self.parse_type());
            params.push(TypeParam {
                name: Self::ident(&token),
                bound,
            });
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect_closing_angle();
        params
    }
}

pub(crate) fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of file".to_string(),
        _ => format!("'{}'", token.text),
    }
}

/// Strips quotes from a string literal and resolves the common escapes.
pub(crate) fn unquote(literal: &str) -> String {
    let mut chars = literal.chars();
    let quote = chars.next();
    let inner = chars.as_str();
    let inner = inner
        .strip_suffix(|c| Some(c) == quote)
        .unwrap_or(inner);
    if quote == Some('\'') {
        return inner.replace("\\'", "'").replace("\\\\", "\\");
    }
    let mut out = String::with_capacity(inner.len());
    let mut iter = inner.chars();
    while let Some(c) = iter.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match iter.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Removes the `/** */` markers and the leading `*` gutter from a doc comment.
pub(crate) fn clean_doc_comment(raw: &str) -> String {
    let body = raw.strip_prefix("/**").unwrap_or(raw);
    let body = body.strip_suffix("*/").unwrap_or(body);
    body.lines()
        .map(|line| {
            let trimmed = line.trim();
            trimmed
                .strip_prefix("* ")
                .or_else(|| trimmed.strip_prefix('*'))
                .unwrap_or(trimmed)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
