//! Syntax layer for the Sola language: tokens, the syntax tree, and a tolerant parser.
//!
//! The parser always returns a tree. Syntax errors are collected alongside it and the
//! tree holds whatever could be recovered, so editor features keep working while a file
//! is being typed.

pub mod ast;
pub mod error;
mod expr;
pub mod lexer;
mod parser;
pub mod span;

pub use ast::Tree;
pub use error::ParseError;
pub use span::{Position, Range};

/// The parser seam. Analysis code only depends on this trait so tests can substitute
/// their own parser.
pub trait SourceParser: Send + Sync {
    fn parse(&self, text: &str, filename: &str) -> (Tree, Vec<ParseError>);
}

/// The built-in recursive-descent parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SolaParser;

impl SolaParser {
    pub fn new() -> Self {
        Self
    }
}

impl SourceParser for SolaParser {
    fn parse(&self, text: &str, filename: &str) -> (Tree, Vec<ParseError>) {
        let (tree, errors) = parse(text);
        tracing::trace!(
            filename,
            statements = tree.statements.len(),
            errors = errors.len(),
            "parsed source"
        );
        (tree, errors)
    }
}

/// Parses `text` into a tree and the errors found along the way.
pub fn parse(text: &str) -> (Tree, Vec<ParseError>) {
    parser::Parser::new(text).parse_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::lexer::{tokenize, TokenKind};
    use proptest::prelude::*;

    fn parse_ok(source: &str) -> Tree {
        let (tree, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        tree
    }

    #[test]
    fn parses_class_with_members() {
        let tree = parse_ok(
            "/** A greeter. */\nclass A extends Base implements I, J {\n    const MAX = 3;\n    public static $count: int = 0;\n    private string $name;\n    public function greet(string $who, $times: int = 1): string {\n        return \"hi\";\n    }\n}\n",
        );
        let class = tree.find_class("A").expect("class A");
        assert_eq!(class.doc.as_deref(), Some("A greeter."));
        assert_eq!(class.extends.as_ref().map(|t| t.to_string()), Some("Base".into()));
        assert_eq!(class.implements.len(), 2);
        assert_eq!(class.constants().count(), 1);
        let properties: Vec<_> = class.properties().collect();
        assert_eq!(properties.len(), 2);
        assert!(properties[0].modifiers.is_static);
        assert_eq!(properties[1].ty.as_ref().map(|t| t.to_string()), Some("string".into()));
        let greet = class.find_method("greet").expect("greet");
        assert_eq!(greet.params.len(), 2);
        assert_eq!(greet.params[0].name.as_str(), "$who");
        assert_eq!(greet.params[1].ty.as_ref().map(|t| t.to_string()), Some("int".into()));
        assert!(greet.params[1].default.is_some());
        assert_eq!(greet.signature(), "function greet($who: string, $times: int): string");
        assert_eq!(class.name.range.start, Position::new(2, 7));
    }

    #[test]
    fn semicolons_are_optional() {
        let tree = parse_ok("$x := 1\n$y := $x + 1\nprint($x)");
        assert_eq!(tree.statements.len(), 3);
        match &tree.statements[1].kind {
            StmtKind::Var(decl) => {
                assert!(decl.short);
                assert_eq!(decl.name.as_str(), "$y");
                assert!(matches!(
                    decl.value.as_ref().map(|v| &v.kind),
                    Some(ExprKind::Binary { op: BinaryOp::Add, .. })
                ));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn two_statements_on_one_line_need_a_separator() {
        let (tree, errors) = parse("$x := 1 $y := 2\n$z := 3");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected ';' after statement");
        assert_eq!(errors[0].range.start, Position::new(1, 9));
        assert!(tree.statements.iter().any(|stmt| matches!(
            &stmt.kind,
            StmtKind::Var(decl) if decl.name.as_str() == "$z"
        )));
    }

    #[test]
    fn recovers_after_broken_declaration() {
        let (tree, errors) = parse("class A {\n  public function f( {\n}\nclass B {}\n");
        assert!(!errors.is_empty());
        assert!(tree.find_class("A").is_some());
    }

    #[test]
    fn parses_enum_forms() {
        let tree = parse_ok("enum Color: string { case Red = 'r'; case Green = 'g' }\nenum Dir { Up, Down }");
        let color = tree.find_enum("Color").expect("Color");
        assert_eq!(color.cases().count(), 2);
        assert_eq!(color.backing.as_ref().map(|t| t.to_string()), Some("string".into()));
        let dir = tree.find_enum("Dir").expect("Dir");
        let names: Vec<_> = dir.cases().map(|case| case.name.as_str().to_string()).collect();
        assert_eq!(names, vec!["Up", "Down"]);
    }

    #[test]
    fn parses_use_forms() {
        let tree = parse_ok("namespace app.models\nuse sola.collections.List\nuse sola.io.File as F\nuse \"helpers\"\n");
        assert_eq!(tree.namespace().map(|ns| ns.path.as_str()), Some("app.models"));
        let uses: Vec<_> = tree.uses().collect();
        assert_eq!(uses.len(), 3);
        assert_eq!(uses[0].effective_name(), "List");
        assert_eq!(uses[1].effective_name(), "F");
        assert!(uses[2].is_file);
        assert_eq!(uses[2].path.as_str(), "helpers");
    }

    #[test]
    fn nested_generics_split_shift_token() {
        let tree = parse_ok("function f(map<string, List<int>> $m): ?List<int>[] {}");
        let function = tree.find_function("f").expect("f");
        let ty = function.params[0].ty.as_ref().expect("param type");
        assert_eq!(ty.to_string(), "map<string, List<int>>");
        assert_eq!(
            function.return_type.as_ref().map(|t| t.to_string()),
            Some("?List<int>[]".into())
        );
    }

    #[test]
    fn member_chains_continue_across_lines() {
        let tree = parse_ok("$q := $db\n    ->table(\"users\")\n    ?->first()");
        match &tree.statements[0].kind {
            StmtKind::Var(decl) => match decl.value.as_ref().map(|v| &v.kind) {
                Some(ExprKind::MethodCall { method, safe, receiver, .. }) => {
                    assert_eq!(method.as_str(), "first");
                    assert!(*safe);
                    assert!(matches!(receiver.kind, ExprKind::MethodCall { .. }));
                }
                other => panic!("unexpected value {other:?}"),
            },
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn call_on_next_line_starts_new_statement() {
        let tree = parse_ok("$f := $g\n($x)");
        assert_eq!(tree.statements.len(), 2);
    }

    #[test]
    fn foreach_subject_is_not_a_cast() {
        let tree = parse_ok("foreach ($items as $key => $value) { echo $value }");
        match &tree.statements[0].kind {
            StmtKind::Foreach(stmt) => {
                assert_eq!(stmt.key.as_ref().map(|k| k.as_str()), Some("$key"));
                assert_eq!(stmt.value.as_str(), "$value");
                assert!(matches!(stmt.iterable.kind, ExprKind::Variable(_)));
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn precedence_and_casts() {
        let tree = parse_ok("$r := 1 + 2 * 3 ** 2 ** 1 as int");
        let StmtKind::Var(decl) = &tree.statements[0].kind else {
            panic!("expected declaration");
        };
        let Some(ExprKind::Cast { expr, ty }) = decl.value.as_ref().map(|v| &v.kind) else {
            panic!("expected cast at the top");
        };
        assert_eq!(ty.to_string(), "int");
        let ExprKind::Binary { op: BinaryOp::Add, rhs, .. } = &expr.kind else {
            panic!("expected addition");
        };
        let ExprKind::Binary { op: BinaryOp::Mul, rhs: pow, .. } = &rhs.kind else {
            panic!("expected multiplication");
        };
        let ExprKind::Binary { op: BinaryOp::Pow, rhs: inner, .. } = &pow.kind else {
            panic!("expected power");
        };
        assert!(matches!(inner.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn parses_match_closures_and_maps() {
        let tree = parse_ok(
            "$label := match ($n) { 1, 2 => \"low\", default => \"high\" }\n$f := function ($a) use ($label) { return $a }\n$g := fn($x) => $x * 2\n$m := [\"a\" => 1, \"b\" => 2]",
        );
        assert_eq!(tree.statements.len(), 4);
        let values: Vec<_> = tree
            .statements
            .iter()
            .filter_map(|stmt| match &stmt.kind {
                StmtKind::Var(decl) => decl.value.as_ref(),
                _ => None,
            })
            .collect();
        match &values[0].kind {
            ExprKind::Match(m) => {
                assert_eq!(m.arms.len(), 2);
                assert_eq!(m.arms[0].patterns.len(), 2);
                assert!(m.arms[1].is_default);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&values[1].kind, ExprKind::Closure(c) if c.uses.len() == 1));
        assert!(matches!(values[2].kind, ExprKind::Arrow(_)));
        assert!(matches!(&values[3].kind, ExprKind::Map(entries) if entries.len() == 2));
    }

    #[test]
    fn parses_control_flow() {
        let tree = parse_ok(
            "function f($x) {\n  if ($x > 1) { return 1 } else if ($x < 0) { return -1 } else { return 0 }\n  for ($i := 0; $i < 3; $i++) { continue }\n  while (true) { break }\n  do { $x-- } while ($x > 0)\n  switch ($x) { case 1: echo 1; break; default: echo 2 }\n  try { throw new Error(\"x\") } catch (A | B $e) { } finally { }\n  go worker($x)\n}",
        );
        let function = tree.find_function("f").expect("f");
        let body = function.body.as_ref().expect("body");
        assert_eq!(body.statements.len(), 7);
        let StmtKind::Try(try_stmt) = &body.statements[5].kind else {
            panic!("expected try");
        };
        assert_eq!(try_stmt.catches[0].types.len(), 2);
        assert!(try_stmt.finally.is_some());
        assert!(matches!(body.statements[6].kind, StmtKind::Go(_)));
    }

    #[test]
    fn comments_are_collected() {
        let tree = parse_ok("// one\n# region\n/* two */\n$x := 1");
        assert_eq!(tree.comments.len(), 3);
    }

    #[test]
    fn unknown_characters_are_reported() {
        let (_, errors) = parse("$x := 1 ` 2");
        assert!(errors
            .iter()
            .any(|error| error.message.starts_with("unexpected character")));
    }

    #[test]
    fn deeply_nested_input_does_not_overflow() {
        let source = format!("$x := {}1{}", "(".repeat(500), ")".repeat(500));
        let (_, errors) = parse(&source);
        assert!(!errors.is_empty());
        let braces = format!("{}{}", "{".repeat(500), "}".repeat(500));
        let _ = parse(&braces);
    }

    fn sola_fragments() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("class A extends B implements C {".to_string()),
                Just("public static function f(int $a = 1): ?string {".to_string()),
                Just("enum E: int { case X = 1".to_string()),
                Just("$x := new A();".to_string()),
                Just("$x?->y::z(".to_string()),
                Just("use sola.io.File as".to_string()),
                Just("\"unterminated".to_string()),
                Just("/** doc".to_string()),
                Just("}".to_string()),
                "\\PC{0,10}",
            ],
            0..16,
        )
        .prop_map(|parts| parts.join("\n"))
    }

    proptest! {
        #[test]
        fn tokens_cover_source_slices_in_order(source in "\\PC{0,80}") {
            let tokens = tokenize(&source);
            prop_assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::Eof));
            for pair in tokens.windows(2) {
                prop_assert!(pair[0].span.end <= pair[1].span.start || pair[1].kind == TokenKind::Eof);
            }
            for token in tokens.iter().filter(|token| token.kind != TokenKind::Eof) {
                prop_assert_eq!(token.text.as_str(), &source[token.span.clone()]);
            }
        }

        #[test]
        fn parser_errors_stay_inside_the_document(source in sola_fragments()) {
            let (_, errors) = parse(&source);
            let end = tokenize(&source).last().map(|token| token.range.end).unwrap_or_else(Position::start);
            for error in &errors {
                prop_assert!(error.range.start <= error.range.end, "{:?}", error);
                prop_assert!(error.range.end <= end, "{:?} past {:?}", error, end);
            }
        }
    }
}
