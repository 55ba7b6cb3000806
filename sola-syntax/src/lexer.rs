//! Lexer for Sola source code.
//!
//! Token classification is done by `logos`; this module wraps it to attach 1-based
//! positions, the literal text, and whether a line break precedes each token (statement
//! terminators are optional, so the parser needs to know where lines end).

use crate::span::{Position, Range};
use logos::Logos;
use smol_str::SmolStr;

/// A token with its literal text and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    pub range: Range,
    /// Byte offsets into the source.
    pub span: std::ops::Range<usize>,
    /// True when at least one `\n` separates this token from the previous one.
    pub newline_before: bool,
}

impl Token {
    pub fn is_trivia(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::LineComment | TokenKind::HashComment | TokenKind::BlockComment
        )
    }

    pub fn is_doc_comment(&self) -> bool {
        self.kind == TokenKind::BlockComment && self.text.starts_with("/**")
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    // Keywords
    #[token("abstract")]
    Abstract,
    #[token("as")]
    As,
    #[token("await")]
    Await,
    #[token("break")]
    Break,
    #[token("case")]
    Case,
    #[token("catch")]
    Catch,
    #[token("class")]
    Class,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("default")]
    Default,
    #[token("do")]
    Do,
    #[token("echo")]
    Echo,
    #[token("else")]
    Else,
    #[token("enum")]
    Enum,
    #[token("extends")]
    Extends,
    #[token("false")]
    False,
    #[token("final")]
    Final,
    #[token("finally")]
    Finally,
    #[token("fn")]
    Fn,
    #[token("for")]
    For,
    #[token("foreach")]
    Foreach,
    #[token("function")]
    Function,
    #[token("go")]
    Go,
    #[token("if")]
    If,
    #[token("implements")]
    Implements,
    #[token("interface")]
    Interface,
    #[token("is")]
    Is,
    #[token("match")]
    Match,
    #[token("namespace")]
    Namespace,
    #[token("new")]
    New,
    #[token("null")]
    Null,
    #[token("private")]
    Private,
    #[token("protected")]
    Protected,
    #[token("public")]
    Public,
    #[token("readonly")]
    Readonly,
    #[token("return")]
    Return,
    #[token("static")]
    Static,
    #[token("switch")]
    Switch,
    #[token("throw")]
    Throw,
    #[token("true")]
    True,
    #[token("try")]
    Try,
    #[token("type")]
    Type,
    #[token("use")]
    Use,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // Names and literals
    #[regex(r"[a-zA-Z_\u{80}-\u{10FFFF}][a-zA-Z0-9_\u{80}-\u{10FFFF}]*")]
    Identifier,
    #[regex(r"\$[a-zA-Z_\u{80}-\u{10FFFF}][a-zA-Z0-9_\u{80}-\u{10FFFF}]*")]
    Variable,
    #[regex(r"[0-9][0-9_]*")]
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*")]
    #[regex(r"0[bB][01][01_]*")]
    Int,
    #[regex(r"[0-9][0-9_]*\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    Float,
    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r"'([^'\\]|\\.)*'")]
    String,

    // Comments are kept as tokens; the parser filters them out.
    #[regex(r"//[^\n]*")]
    LineComment,
    #[regex(r"#[^\n]*")]
    HashComment,
    #[regex(r"/\*[^*]*\*+([^/*][^*]*\*+)*/")]
    BlockComment,

    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("->")]
    Arrow,
    #[token("?->")]
    SafeArrow,
    #[token("=>")]
    FatArrow,
    #[token("::")]
    DoubleColon,
    #[token(":")]
    Colon,
    #[token(":=")]
    ColonEq,
    #[token("\\")]
    Backslash,
    #[token("@")]
    At,

    // Operators
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("===")]
    EqEqEq,
    #[token("!=")]
    NotEq,
    #[token("!==")]
    NotEqEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("**")]
    StarStar,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token(".=")]
    DotEq,
    #[token("??=")]
    QuestionQuestionEq,
    #[token("??")]
    QuestionQuestion,
    #[token("?")]
    Question,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,

    /// A character the lexer does not recognise.
    Error,
    /// Synthetic end-of-file marker appended by [`tokenize`].
    Eof,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Abstract
                | As
                | Await
                | Break
                | Case
                | Catch
                | Class
                | Const
                | Continue
                | Default
                | Do
                | Echo
                | Else
                | Enum
                | Extends
                | False
                | Final
                | Finally
                | Fn
                | For
                | Foreach
                | Function
                | Go
                | If
                | Implements
                | Interface
                | Is
                | Match
                | Namespace
                | New
                | Null
                | Private
                | Protected
                | Public
                | Readonly
                | Return
                | Static
                | Switch
                | Throw
                | True
                | Try
                | Type
                | Use
                | Var
                | While
        )
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
        )
    }

    pub fn is_operator(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Eq | EqEq
                | EqEqEq
                | NotEq
                | NotEqEq
                | Lt
                | Gt
                | Le
                | Ge
                | Plus
                | Minus
                | Star
                | Slash
                | Percent
                | StarStar
                | PlusPlus
                | MinusMinus
                | PlusEq
                | MinusEq
                | StarEq
                | SlashEq
                | DotEq
                | QuestionQuestionEq
                | QuestionQuestion
                | Question
                | Bang
                | AndAnd
                | OrOr
                | Amp
                | Pipe
                | Caret
                | Tilde
                | Shl
                | Shr
                | ColonEq
                | Arrow
                | SafeArrow
                | FatArrow
                | DoubleColon
                | Dot
        )
    }
}

/// Every keyword of the language, used by completion and rename guards.
pub const KEYWORDS: &[&str] = &[
    "abstract",
    "as",
    "await",
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "default",
    "do",
    "echo",
    "else",
    "enum",
    "extends",
    "false",
    "final",
    "finally",
    "fn",
    "for",
    "foreach",
    "function",
    "go",
    "if",
    "implements",
    "interface",
    "is",
    "match",
    "namespace",
    "new",
    "null",
    "private",
    "protected",
    "public",
    "readonly",
    "return",
    "static",
    "switch",
    "throw",
    "true",
    "try",
    "type",
    "use",
    "var",
    "while",
];

/// Built-in type names.
pub const BUILTIN_TYPES: &[&str] = &[
    "int", "float", "string", "bool", "void", "mixed", "null", "array", "map", "object",
    "callable", "iterable", "never", "self", "static",
];

/// Functions provided by the runtime without an import.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "print", "println", "printf", "len", "count", "isset", "unset", "empty", "typeof", "panic",
    "sprintf", "json_encode", "json_decode", "array_map", "array_filter", "array_keys",
    "array_values", "in_array", "str_contains", "strlen", "substr", "implode", "explode",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

pub fn is_builtin_type(word: &str) -> bool {
    BUILTIN_TYPES.contains(&word)
}

pub fn is_builtin_function(word: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&word)
}

/// Maps byte offsets to 1-based positions.
#[derive(Debug, Clone)]
pub struct LineMap {
    line_starts: Vec<usize>,
}

impl LineMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    pub fn position(&self, source: &str, offset: usize) -> Position {
        let offset = offset.min(source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = source
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        Position::new(line as u32 + 1, column as u32 + 1)
    }
}

/// Splits `source` into tokens, comments included, terminated by an `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let lines = LineMap::new(source);
    let mut lexer = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut previous_end = 0usize;

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let kind = result.unwrap_or(TokenKind::Error);
        let newline_before = source
            .get(previous_end..span.start)
            .map(|gap| gap.contains('\n'))
            .unwrap_or(false);
        tokens.push(Token {
            kind,
            text: SmolStr::new(lexer.slice()),
            range: Range::new(
                lines.position(source, span.start),
                lines.position(source, span.end),
            ),
            span: span.clone(),
            newline_before,
        });
        previous_end = span.end;
    }

    let end = lines.position(source, source.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: SmolStr::default(),
        range: Range::empty(end),
        span: source.len()..source.len(),
        newline_before: source
            .get(previous_end..)
            .map(|rest| rest.contains('\n'))
            .unwrap_or(false),
    });
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn lexes_short_declaration() {
        assert_eq!(
            kinds("$x := 1"),
            vec![
                TokenKind::Variable,
                TokenKind::ColonEq,
                TokenKind::Int,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            kinds("class Classy"),
            vec![TokenKind::Class, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn member_operators() {
        assert_eq!(
            kinds("$a?->b::c->d"),
            vec![
                TokenKind::Variable,
                TokenKind::SafeArrow,
                TokenKind::Identifier,
                TokenKind::DoubleColon,
                TokenKind::Identifier,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn positions_are_one_based_and_track_lines() {
        let tokens = tokenize("class A {}\n  $x := 1");
        assert_eq!(tokens[0].range.start, Position::new(1, 1));
        assert_eq!(tokens[1].range.start, Position::new(1, 7));
        let variable = &tokens[4];
        assert_eq!(variable.kind, TokenKind::Variable);
        assert_eq!(variable.range.start, Position::new(2, 3));
        assert_eq!(variable.range.end, Position::new(2, 5));
        assert!(variable.newline_before);
    }

    #[test]
    fn comments_are_tokens() {
        let tokens = tokenize("// hi\n/** doc */ # region\nx");
        assert_eq!(tokens[0].kind, TokenKind::LineComment);
        assert!(tokens[1].is_doc_comment());
        assert_eq!(tokens[2].kind, TokenKind::HashComment);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn columns_count_characters() {
        let tokens = tokenize("\"héllo\" $y");
        assert_eq!(tokens[1].range.start, Position::new(1, 9));
    }
}
