use lsp_types::Url;
use sola_analysis::document::DocumentSnapshot;
use sola_analysis::semantic_tokens::{
    collect_semantic_tokens, encode_semantic_tokens, SolaSemanticToken, SolaTokenType,
};
use sola_syntax::SolaParser;

const SOURCE: &str = r#"use sola.collections.List

/**
 * Keeps a running total.
 */
class Counter {
    const START = 0;
    private $total: int = 0;

    public function add(int $amount): Counter {
        $this->total += $amount; // accumulate
        return $this;
    }
}

$c := new Counter();
$label := "total: #ff0000";
print($c->add(2)->total, $label);
"#;

fn tokens(source: &str) -> Vec<SolaSemanticToken> {
    let uri = Url::parse("file:///layout.sola").expect("uri");
    let doc = DocumentSnapshot::from_text(uri, source, &SolaParser);
    collect_semantic_tokens(doc.text(), doc.tree(), doc.symbols())
}

fn describe(source: &str, token: &SolaSemanticToken) -> String {
    let line = source
        .lines()
        .nth(token.range.start.line as usize - 1)
        .unwrap_or("");
    let text: String = line
        .chars()
        .skip(token.range.start.column as usize - 1)
        .take((token.range.end.column - token.range.start.column) as usize)
        .collect();
    format!("{:?} {:?} at {}", token.kind, text, token.range.start)
}

#[test]
fn test_tokens_are_sorted_single_line_and_disjoint() {
    let tokens = tokens(SOURCE);
    assert!(!tokens.is_empty());

    for token in &tokens {
        assert_eq!(
            token.range.start.line,
            token.range.end.line,
            "multi-line token: {}",
            describe(SOURCE, token)
        );
        assert!(token.range.start < token.range.end, "empty token: {}", describe(SOURCE, token));
    }

    for pair in tokens.windows(2) {
        assert!(
            pair[0].range.end <= pair[1].range.start,
            "overlap: {} WITH {}",
            describe(SOURCE, &pair[0]),
            describe(SOURCE, &pair[1])
        );
    }
}

#[test]
fn test_block_comment_is_split_per_line() {
    let comments: Vec<u32> = tokens(SOURCE)
        .iter()
        .filter(|token| token.kind == SolaTokenType::Comment)
        .map(|token| token.range.start.line)
        .collect();
    for line in 3..=5 {
        assert!(comments.contains(&line), "no comment token on line {line}");
    }
}

#[test]
fn test_encoding_has_five_entries_per_token() {
    let tokens = tokens(SOURCE);
    let data = encode_semantic_tokens(&tokens);
    assert_eq!(data.len(), tokens.len() * 5);

    // Absolute positions rebuilt from the deltas must match the tokens.
    let (mut line, mut column) = (0u32, 0u32);
    for (chunk, token) in data.chunks_exact(5).zip(&tokens) {
        if chunk[0] > 0 {
            line += chunk[0];
            column = chunk[1];
        } else {
            column += chunk[1];
        }
        assert_eq!(line + 1, token.range.start.line);
        assert_eq!(column + 1, token.range.start.column);
        assert_eq!(chunk[3], token.kind.index());
    }
}
