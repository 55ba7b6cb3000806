use crate::document::DocumentSnapshot;
use crate::inference::{access_before, find_binding, Access, Inference};
use crate::symbols::strip_generics;
use crate::utils::enclosing_class;
use crate::workspace::{Location, Workspace};
use crate::workspace_index::{file_import_candidate, resolve_file_import};
use lsp_types::Url;
use sola_syntax::ast::UseDecl;
use sola_syntax::{Position, Range};

pub fn goto_definition(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
) -> Option<Location> {
    let tree = doc.tree()?;
    if let Some(location) = import_target(doc, workspace, position) {
        return Some(location);
    }

    let word = doc.buffer.word_at(position)?;
    let prefix = doc.buffer.line_prefix(word.range.start);
    if let Some(access) = access_before(prefix) {
        let inference = Inference::for_document(doc, workspace)?;
        let class = match access {
            Access::Instance(receiver) => inference
                .chain_type(receiver, word.range.start)
                .map(|ty| strip_generics(&ty).to_string()),
            Access::Static(class) => Some(inference.resolve_special(class, word.range.start)),
        };
        let member = class
            .and_then(|class| workspace.find_member(&class, &word.text, Some(doc)))
            .or_else(|| workspace.find_any_member(&word.text, Some(doc)));
        return member.map(|resolved| resolved.location());
    }

    if word.is_variable() {
        if word.text == "$this" {
            let class = enclosing_class(tree, position)?;
            return Some(Location {
                uri: doc.uri.clone(),
                range: class.name().range,
            });
        }
        let binding = find_binding(tree, &word.text, word.range.start)?;
        return Some(Location {
            uri: doc.uri.clone(),
            range: binding.ident.range,
        });
    }

    if let Some(resolved) = workspace.find_declaration(&word.text, Some(doc)) {
        return Some(resolved.location());
    }
    workspace
        .find_any_member(&word.text, Some(doc))
        .map(|resolved| resolved.location())
}

/// The file a `use` path under the cursor points at.
fn import_target(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
) -> Option<Location> {
    let tree = doc.tree()?;
    let decl = tree
        .uses()
        .find(|decl| decl.path_range.touches(position))?;
    let uri = resolve_use_target(doc, workspace, decl)?;
    Some(Location {
        uri,
        range: Range::empty(Position::start()),
    })
}

/// The file an import in `doc` refers to. String imports prefer an open document at the
/// expected path even when nothing exists on disk yet.
pub fn resolve_use_target(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    decl: &UseDecl,
) -> Option<Url> {
    let importing = doc.path();
    if decl.is_file {
        let candidate = file_import_candidate(importing.as_deref()?, &decl.path)?;
        if let Some(open) = workspace
            .documents
            .iter()
            .find(|other| other.path().as_deref() == Some(candidate.as_path()))
        {
            return Some(open.uri.clone());
        }
    }
    let path = match workspace.index {
        Some(index) => index.resolve_use(decl, importing.as_deref()),
        None if decl.is_file => resolve_file_import(importing.as_deref()?, &decl.path),
        None => None,
    }?;
    Url::from_file_path(&path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::snapshot;

    fn at(docs: &[DocumentSnapshot], line: u32, column: u32) -> Option<Location> {
        goto_definition(&docs[0], Workspace::new(docs, None), Position::new(line, column))
    }

    #[test]
    fn resolves_class_in_another_open_document() {
        let docs = vec![
            snapshot("file:///b.sola", "use \"a\"\nclass B extends A {}"),
            snapshot("file:///a.sola", "class A {}"),
        ];
        let location = at(&docs, 2, 17).expect("A");
        assert_eq!(location.uri.as_str(), "file:///a.sola");
        assert_eq!(
            location.range,
            Range::new(Position::new(1, 7), Position::new(1, 8))
        );
    }

    #[test]
    fn file_import_points_at_the_file() {
        let docs = vec![
            snapshot("file:///b.sola", "use \"a\"\nclass B extends A {}"),
            snapshot("file:///a.sola", "class A {}"),
        ];
        let location = at(&docs, 1, 6).expect("import");
        assert_eq!(location.uri.as_str(), "file:///a.sola");
    }

    #[test]
    fn parent_relative_import_finds_the_open_document() {
        let docs = vec![
            snapshot("file:///p/app/main.sola", "use \"../models/user\"\n$u := new User()"),
            snapshot("file:///p/models/user.sola", "class User {}"),
        ];
        let location = at(&docs, 1, 8).expect("import");
        assert_eq!(location.uri.as_str(), "file:///p/models/user.sola");
    }

    #[test]
    fn variables_resolve_to_their_binding() {
        let docs = vec![snapshot(
            "file:///v.sola",
            "function f($a) {\n  $b := $a\n  return $b\n}",
        )];
        let param = at(&docs, 2, 10).expect("$a");
        assert_eq!(param.range.start, Position::new(1, 12));
        let local = at(&docs, 3, 11).expect("$b");
        assert_eq!(local.range.start, Position::new(2, 3));
    }

    #[test]
    fn members_resolve_through_the_receiver_type() {
        let docs = vec![snapshot(
            "file:///m.sola",
            "class A { function run() {} }\nclass B { function run() {} }\n$b := new B()\n$b->run()\nA::run()",
        )];
        let instance = at(&docs, 4, 6).expect("B::run");
        assert_eq!(instance.range.start, Position::new(2, 20));
        let stat = at(&docs, 5, 5).expect("A::run");
        assert_eq!(stat.range.start, Position::new(1, 20));
    }

    #[test]
    fn this_points_at_the_enclosing_class() {
        let docs = vec![snapshot(
            "file:///t.sola",
            "class T {\n  function me() { return $this }\n}",
        )];
        let location = at(&docs, 2, 27).expect("$this");
        assert_eq!(location.range.start, Position::new(1, 7));
    }

    #[test]
    fn missing_tree_yields_nothing() {
        let big = "$x := 1\n".repeat(70_000);
        let docs = vec![snapshot("file:///big.sola", &big)];
        assert!(at(&docs, 1, 2).is_none());
    }
}
