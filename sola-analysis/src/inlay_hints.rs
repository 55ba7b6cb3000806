//! Inlay hints: inferred types after untyped declarations and `foreach` binders, and
//! parameter names in front of call arguments.

use crate::document::DocumentSnapshot;
use crate::inference::{builtin_signature, element_type_of, key_type_of, Inference};
use crate::visitor::{walk_tree, Visitor};
use crate::workspace::Workspace;
use lsp_types::InlayHintKind;
use sola_syntax::ast::{Expr, ExprKind, Ident, Stmt, StmtKind};
use sola_syntax::{Position, Range};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlayHintSettings {
    pub variable_types: bool,
    pub parameter_names: bool,
    pub foreach_types: bool,
}

impl Default for InlayHintSettings {
    fn default() -> Self {
        Self {
            variable_types: true,
            parameter_names: true,
            foreach_types: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolaInlayHint {
    pub position: Position,
    pub label: String,
    pub kind: InlayHintKind,
}

pub fn inlay_hints(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    range: Range,
    settings: &InlayHintSettings,
) -> Vec<SolaInlayHint> {
    let Some(inference) = Inference::for_document(doc, workspace) else {
        return Vec::new();
    };
    let mut collector = HintCollector {
        inference: &inference,
        settings,
        hints: Vec::new(),
    };
    walk_tree(inference.tree(), &mut collector);
    let mut hints = collector.hints;
    hints.retain(|hint| range.touches(hint.position));
    hints.sort_by_key(|hint| hint.position);
    hints
}

struct HintCollector<'i, 'a> {
    inference: &'i Inference<'a>,
    settings: &'i InlayHintSettings,
    hints: Vec<SolaInlayHint>,
}

impl HintCollector<'_, '_> {
    fn type_hint(&mut self, ident: &Ident, ty: Option<String>) {
        if let Some(ty) = ty.filter(|ty| !ty.is_empty()) {
            self.hints.push(SolaInlayHint {
                position: ident.range.end,
                label: format!(": {ty}"),
                kind: InlayHintKind::TYPE,
            });
        }
    }

    fn parameter_hints(&mut self, args: &[Expr], params: Vec<String>, variadic: bool) {
        for (idx, arg) in args.iter().enumerate() {
            let param = match params.get(idx) {
                Some(param) => param,
                None => break,
            };
            // The rest parameter is labelled once, on its first argument.
            let is_rest = variadic && idx + 1 == params.len();
            if let ExprKind::Variable(var) = &arg.kind {
                if var.bare() == param {
                    continue;
                }
            }
            self.hints.push(SolaInlayHint {
                position: arg.range.start,
                label: format!("{param}:"),
                kind: InlayHintKind::PARAMETER,
            });
            if is_rest {
                break;
            }
        }
    }

    /// Bare parameter names of whatever `expr` calls, and whether the last one is variadic.
    fn callee_params(&self, expr: &Expr) -> Option<(Vec<String>, bool)> {
        let workspace = self.inference.workspace();
        let current = self.inference.current();
        let signature = match &expr.kind {
            ExprKind::Call { callee, .. } => {
                let name = callee.callee_name()?.as_str();
                if let Some((params, _)) = builtin_signature(name) {
                    let variadic = params.last().is_some_and(|p| p.starts_with("..."));
                    return Some((params.iter().map(|p| builtin_param_name(p)).collect(), variadic));
                }
                let resolved = workspace.find_declaration(name, current)?;
                resolved.source.symbols.get_function(name)?.clone()
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
                ..
            } => {
                let class = self.inference.class_of(receiver)?;
                let (_, method) = workspace.find_method(&class, method.as_str(), Some(args.len()), current)?;
                method.signature.clone()
            }
            ExprKind::StaticCall { class, method, args } => {
                let class = self.inference.resolve_special(class.as_str(), class.range.start);
                let (_, method) = workspace.find_method(&class, method.as_str(), Some(args.len()), current)?;
                method.signature.clone()
            }
            ExprKind::New { class, .. } => {
                let name = class.base_name()?;
                let class = self.inference.resolve_special(name.as_str(), name.range.start);
                let (_, ctor) = workspace.find_method(&class, "__construct", None, current)?;
                ctor.signature.clone()
            }
            _ => return None,
        };
        let names = signature
            .param_names
            .iter()
            .map(|name| name.trim_start_matches('$').to_string())
            .collect();
        Some((names, signature.variadic))
    }
}

/// `...$args: mixed` becomes `args`.
fn builtin_param_name(label: &str) -> String {
    label
        .trim_start_matches("...")
        .split(':')
        .next()
        .unwrap_or(label)
        .trim()
        .trim_start_matches('$')
        .to_string()
}

impl<'a> Visitor<'a> for HintCollector<'_, '_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) if self.settings.variable_types && decl.ty.is_none() => {
                let ty = decl
                    .value
                    .as_ref()
                    .and_then(|value| self.inference.expr_type(value));
                self.type_hint(&decl.name, ty);
            }
            StmtKind::Foreach(stmt) if self.settings.foreach_types => {
                let iterable = self.inference.expr_type(&stmt.iterable);
                if let Some(key) = &stmt.key {
                    self.type_hint(key, iterable.as_deref().and_then(key_type_of));
                }
                self.type_hint(&stmt.value, iterable.as_deref().and_then(element_type_of));
            }
            _ => {}
        }
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        if !self.settings.parameter_names {
            return;
        }
        let args = match &expr.kind {
            ExprKind::Call { args, .. }
            | ExprKind::MethodCall { args, .. }
            | ExprKind::StaticCall { args, .. }
            | ExprKind::New { args, .. } => args,
            _ => return,
        };
        if args.is_empty() {
            return;
        }
        if let Some((params, variadic)) = self.callee_params(expr) {
            self.parameter_hints(args, params, variadic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    fn hints(text: &str) -> Vec<(Position, String)> {
        let docs = vec![snapshot("file:///i.sola", text)];
        let range = docs[0].buffer.full_range();
        inlay_hints(&docs[0], Workspace::new(&docs, None), range, &InlayHintSettings::default())
            .into_iter()
            .map(|hint| (hint.position, hint.label))
            .collect()
    }

    #[test]
    fn untyped_declarations_get_types() {
        assert_eq!(
            hints("$n := 1\nvar $s: string = \"x\"\n$f := 1.5 + $n"),
            vec![
                (Position::new(1, 3), ": int".to_string()),
                (Position::new(3, 3), ": float".to_string()),
            ]
        );
    }

    #[test]
    fn foreach_binders_get_key_and_value_types() {
        let text = "function names(): string[] { return [] }\nforeach (names() as $i => $name) {}";
        let found = hints(text);
        assert!(found.contains(&(Position::new(2, 23), ": int".to_string())));
        assert!(found.contains(&(Position::new(2, 32), ": string".to_string())));
    }

    #[test]
    fn parameter_names_skip_matching_variables() {
        let text = "function move(int $x, int $y) {}\n$x := 1\nmove($x, 2)";
        let found = hints(text);
        assert!(found.contains(&(Position::new(3, 10), "y:".to_string())));
        assert!(!found.iter().any(|(_, label)| label == "x:"));
    }

    #[test]
    fn variadic_parameters_are_labelled_once() {
        let found = hints("printf(\"%d %d\", 1, 2)");
        let labels: Vec<_> = found.iter().map(|(_, label)| label.as_str()).collect();
        assert_eq!(labels, vec!["format:", "args:"]);
    }

    #[test]
    fn hints_outside_the_range_are_dropped() {
        let docs = vec![snapshot("file:///i.sola", "$a := 1\n$b := 2\n$c := 3")];
        let range = Range::new(Position::new(2, 1), Position::new(2, 8));
        let found = inlay_hints(&docs[0], Workspace::new(&docs, None), range, &InlayHintSettings::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position, Position::new(2, 3));
    }
}
