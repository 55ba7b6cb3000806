use crate::document::DocumentSnapshot;
use crate::visitor::{walk_tree, FunctionRef, Visitor};
use sola_syntax::ast::{Expr, Stmt};
use sola_syntax::{Position, Range};

/// One link of a selection chain; `parent` always encloses `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaSelectionRange {
    pub range: Range,
    pub parent: Option<Box<SolaSelectionRange>>,
}

impl SolaSelectionRange {
    /// Ranges from innermost to outermost.
    pub fn ranges(&self) -> Vec<Range> {
        let mut out = vec![self.range];
        let mut current = self.parent.as_deref();
        while let Some(link) = current {
            out.push(link.range);
            current = link.parent.as_deref();
        }
        out
    }
}

pub fn selection_ranges(doc: &DocumentSnapshot, positions: &[Position]) -> Vec<SolaSelectionRange> {
    positions
        .iter()
        .map(|position| selection_range(doc, *position))
        .collect()
}

/// Word, then line, then every syntax node around `position` by size, then the whole
/// document.
pub fn selection_range(doc: &DocumentSnapshot, position: Position) -> SolaSelectionRange {
    let mut candidates = Vec::new();
    if let Some(word) = doc.buffer.word_at(position) {
        candidates.push(word.range);
    }
    if let Some(line) = doc.buffer.line(position.line) {
        let width = line.chars().count() as u32;
        candidates.push(Range::new(
            Position::new(position.line, 1),
            Position::new(position.line, width + 1),
        ));
    }
    if let Some(tree) = doc.tree() {
        let mut collector = NodeCollector {
            position,
            ranges: Vec::new(),
        };
        walk_tree(tree, &mut collector);
        candidates.extend(collector.ranges);
    }
    let document = doc.buffer.full_range();
    candidates.sort_by_key(|range| range.extent());

    let mut chain: Vec<Range> = Vec::new();
    for range in candidates {
        let fits = chain
            .last()
            .map_or(true, |inner| *inner != range && range.encloses(inner));
        if fits && document.encloses(&range) && range != document {
            chain.push(range);
        }
    }
    chain.push(document);

    let mut link: Option<SolaSelectionRange> = None;
    for range in chain.into_iter().rev() {
        link = Some(SolaSelectionRange {
            range,
            parent: link.map(Box::new),
        });
    }
    link.unwrap_or(SolaSelectionRange {
        range: document,
        parent: None,
    })
}

struct NodeCollector {
    position: Position,
    ranges: Vec<Range>,
}

impl NodeCollector {
    fn consider(&mut self, range: Range) {
        if range.touches(self.position) && range.start != range.end {
            self.ranges.push(range);
        }
    }
}

impl<'a> Visitor<'a> for NodeCollector {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        self.consider(stmt.range);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        self.consider(expr.range);
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        let range = function.range();
        self.consider(range);
        range.touches(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    #[test]
    fn grows_from_word_to_document() {
        let doc = snapshot(
            "file:///s.sola",
            "function f() {\n  $total := $a + $b\n}\n",
        );
        let chain = selection_range(&doc, Position::new(2, 15)).ranges();
        assert_eq!(
            chain.first(),
            Some(&Range::new(Position::new(2, 13), Position::new(2, 15)))
        );
        assert_eq!(chain.last(), Some(&doc.buffer.full_range()));
        for pair in chain.windows(2) {
            assert!(pair[1].encloses(&pair[0]), "{:?} !> {:?}", pair[1], pair[0]);
            assert_ne!(pair[0], pair[1]);
        }
        assert!(chain.contains(&Range::new(Position::new(2, 13), Position::new(2, 20))));
        assert!(chain.contains(&Range::new(Position::new(2, 1), Position::new(2, 20))));
    }

    #[test]
    fn one_chain_per_position() {
        let doc = snapshot("file:///s.sola", "$a := 1\n$b := 2");
        let chains = selection_ranges(&doc, &[Position::new(1, 2), Position::new(2, 2)]);
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[1].range.start, Position::new(2, 1));
    }

    #[test]
    fn works_without_a_tree() {
        let big = "$x := 1\n".repeat(70_000);
        let doc = snapshot("file:///big.sola", &big);
        let chain = selection_range(&doc, Position::new(3, 2)).ranges();
        assert_eq!(chain.len(), 3);
    }
}
