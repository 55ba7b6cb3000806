use crate::utils::for_each_class_like;
use crate::visitor::{walk_tree, FunctionRef, Visitor};
use lsp_types::FoldingRangeKind;
use sola_syntax::ast::{Comment, Stmt, StmtKind, Tree};
use sola_syntax::Range;

/// A foldable line span. Lines are 1-based; `end_line` is the last hidden line, so the
/// closing brace of a block stays visible.
#[derive(Debug, Clone, PartialEq)]
pub struct SolaFoldingRange {
    pub start_line: u32,
    pub end_line: u32,
    pub kind: Option<FoldingRangeKind>,
}

pub fn folding_ranges(tree: &Tree) -> Vec<SolaFoldingRange> {
    let mut collector = FoldingCollector { ranges: Vec::new() };
    for_each_class_like(tree, &mut |class| collector.push_block(class.body_range()));
    walk_tree(tree, &mut collector);
    collector.process_imports(&tree.statements);
    collector.process_comments(&tree.comments);
    collector
        .ranges
        .sort_by_key(|range| (range.start_line, std::cmp::Reverse(range.end_line)));
    collector.ranges.dedup();
    collector.ranges
}

struct FoldingCollector {
    ranges: Vec<SolaFoldingRange>,
}

impl<'a> Visitor<'a> for FoldingCollector {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Block(block) => self.push_block(block.range),
            StmtKind::If(stmt) => self.push_block(stmt.then_branch.range),
            StmtKind::For(stmt) => self.push_block(stmt.body.range),
            StmtKind::Foreach(stmt) => self.push_block(stmt.body.range),
            StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } => {
                self.push_block(body.range)
            }
            StmtKind::Switch(stmt) => self.push_block(stmt.body_range),
            StmtKind::Try(stmt) => {
                self.push_block(stmt.body.range);
                for catch in &stmt.catches {
                    self.push_block(catch.body.range);
                }
                if let Some(finally) = &stmt.finally {
                    self.push_block(finally.range);
                }
            }
            _ => {}
        }
    }

    fn enter_function(&mut self, function: FunctionRef<'a>) -> bool {
        match function {
            FunctionRef::Decl(decl) => {
                if let Some(body) = &decl.body {
                    self.push_block(body.range);
                }
            }
            FunctionRef::Closure(closure, _) => self.push_block(closure.body.range),
            FunctionRef::Arrow(..) => {}
        }
        true
    }
}

impl FoldingCollector {
    /// Folds a `{ ... }` range, leaving the closing line visible.
    fn push_block(&mut self, range: Range) {
        let end_line = range.end.line.saturating_sub(1);
        self.push(range.start.line, end_line, None);
    }

    fn push(&mut self, start_line: u32, end_line: u32, kind: Option<FoldingRangeKind>) {
        if start_line >= end_line {
            return;
        }
        self.ranges.push(SolaFoldingRange {
            start_line,
            end_line,
            kind,
        });
    }

    /// Consecutive top-level `use` declarations fold as one region.
    fn process_imports(&mut self, statements: &[Stmt]) {
        let mut run: Option<(u32, u32)> = None;
        for stmt in statements {
            match (&stmt.kind, run) {
                (StmtKind::Use(_), Some((start, _))) => run = Some((start, stmt.range.end.line)),
                (StmtKind::Use(_), None) => run = Some((stmt.range.start.line, stmt.range.end.line)),
                (_, Some((start, end))) => {
                    self.push(start, end, Some(FoldingRangeKind::Imports));
                    run = None;
                }
                (_, None) => {}
            }
        }
        if let Some((start, end)) = run {
            self.push(start, end, Some(FoldingRangeKind::Imports));
        }
    }

    fn process_comments(&mut self, comments: &[Comment]) {
        let mut regions: Vec<u32> = Vec::new();
        let mut run: Option<(u32, u32)> = None;
        for comment in comments {
            let line = comment.range.start.line;
            match region_marker(&comment.text) {
                Some(RegionMarker::Start) => {
                    regions.push(line);
                    continue;
                }
                Some(RegionMarker::End) => {
                    if let Some(start) = regions.pop() {
                        self.push(start, line, Some(FoldingRangeKind::Region));
                    }
                    continue;
                }
                None => {}
            }

            if comment.text.starts_with("/*") {
                self.push(line, comment.range.end.line, Some(FoldingRangeKind::Comment));
                continue;
            }
            if !comment.text.starts_with("//") {
                continue;
            }
            run = match run {
                Some((start, end)) if end + 1 == line => Some((start, line)),
                Some((start, end)) => {
                    self.push(start, end, Some(FoldingRangeKind::Comment));
                    Some((line, line))
                }
                None => Some((line, line)),
            };
        }
        if let Some((start, end)) = run {
            self.push(start, end, Some(FoldingRangeKind::Comment));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionMarker {
    Start,
    End,
}

/// `#region`, `#endregion` and their `// region` spellings.
fn region_marker(text: &str) -> Option<RegionMarker> {
    let body = text
        .strip_prefix("//")
        .or_else(|| text.strip_prefix('#'))?
        .trim_start();
    let keyword = body.split_whitespace().next()?;
    match keyword {
        "endregion" => Some(RegionMarker::End),
        "region" => Some(RegionMarker::Start),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_snapshot, snapshot};

    fn folds(text: &str) -> Vec<SolaFoldingRange> {
        let doc = snapshot("file:///f.sola", text);
        folding_ranges(doc.tree().expect("tree"))
    }

    fn fold(start_line: u32, end_line: u32, kind: Option<FoldingRangeKind>) -> SolaFoldingRange {
        SolaFoldingRange {
            start_line,
            end_line,
            kind,
        }
    }

    #[test]
    fn classes_methods_and_blocks() {
        let ranges = folds(
            "class A {\n  function f() {\n    if (true) {\n      print(1)\n    }\n  }\n}",
        );
        assert_eq!(
            ranges,
            vec![fold(1, 6, None), fold(2, 5, None), fold(3, 4, None)]
        );
    }

    #[test]
    fn single_line_blocks_do_not_fold() {
        assert!(folds("function f() { return 1; }").is_empty());
    }

    #[test]
    fn imports_and_comment_runs() {
        let ranges = folds("use a.B\nuse a.C\nuse \"d\"\n\n// one\n// two\n// three\n$x := 1\n// lone");
        assert_eq!(
            ranges,
            vec![
                fold(1, 3, Some(FoldingRangeKind::Imports)),
                fold(5, 7, Some(FoldingRangeKind::Comment)),
            ]
        );
    }

    #[test]
    fn nested_regions_use_a_stack() {
        let ranges = folds("#region outer\n$a := 1\n// region inner\n$b := 2\n// endregion\n#endregion");
        assert_eq!(
            ranges,
            vec![
                fold(1, 6, Some(FoldingRangeKind::Region)),
                fold(3, 5, Some(FoldingRangeKind::Region)),
            ]
        );
    }

    #[test]
    fn sample_has_a_helpers_region() {
        let doc = sample_snapshot();
        let ranges = folding_ranges(doc.tree().expect("tree"));
        assert!(ranges
            .iter()
            .any(|range| range.kind == Some(FoldingRangeKind::Region)));
        assert!(ranges
            .iter()
            .any(|range| range.kind == Some(FoldingRangeKind::Imports)));
    }
}
