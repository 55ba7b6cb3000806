use crate::document::DocumentSnapshot;
use crate::inference::{access_before, builtin_return_type, find_binding, Access, BindingKind, Inference};
use crate::symbols::{strip_generics, DeclKind, SymbolTable};
use crate::utils::innermost_declaration;
use crate::workspace::{Resolved, Workspace};
use sola_syntax::{Position, Range};

#[derive(Debug, Clone, PartialEq)]
pub struct HoverResult {
    pub range: Range,
    pub contents: String,
}

pub fn hover(doc: &DocumentSnapshot, workspace: Workspace<'_>, position: Position) -> Option<HoverResult> {
    doc.tree()?;
    match doc.buffer.word_at(position) {
        Some(word) => word_hover(doc, workspace, &word.text, word.range),
        None => declaration_hover(doc, position),
    }
}

fn word_hover(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    word: &str,
    range: Range,
) -> Option<HoverResult> {
    let inference = Inference::for_document(doc, workspace)?;
    let prefix = doc.buffer.line_prefix(range.start);
    if let Some(access) = access_before(prefix) {
        let class = match access {
            Access::Instance(receiver) => inference
                .chain_type(receiver, range.start)
                .map(|ty| strip_generics(&ty).to_string()),
            Access::Static(class) => Some(inference.resolve_special(class, range.start)),
        }?;
        let resolved = workspace.find_member(&class, word, Some(doc))?;
        return resolved_hover(&resolved, word, range);
    }

    if word.starts_with('$') {
        return variable_hover(&inference, word, range);
    }

    if let Some(resolved) = workspace.find_declaration(word, Some(doc)) {
        return resolved_hover(&resolved, word, range);
    }
    if let Some(ret) = builtin_return_type(word) {
        return Some(HoverResult {
            range,
            contents: markdown(&format!("function {word}(...): {ret}"), "built-in function", None),
        });
    }
    let resolved = workspace.find_any_member(word, Some(doc))?;
    resolved_hover(&resolved, word, range)
}

fn variable_hover(inference: &Inference<'_>, name: &str, range: Range) -> Option<HoverResult> {
    let binding = find_binding(inference.tree(), name, range.start)?;
    let label = match binding.kind {
        BindingKind::Parameter => "parameter",
        BindingKind::Property => "property",
        BindingKind::This => "current instance",
        _ => "variable",
    };
    let signature = match inference.binding_type(&binding, range.start) {
        Some(ty) => format!("{name}: {ty}"),
        None => name.to_string(),
    };
    Some(HoverResult {
        range,
        contents: markdown(&signature, label, None),
    })
}

fn declaration_hover(doc: &DocumentSnapshot, position: Position) -> Option<HoverResult> {
    let tree = doc.tree()?;
    let symbols = doc.symbols()?;
    let site = innermost_declaration(tree, position)?;
    let contents = render_declaration(
        symbols,
        site.kind,
        site.name.as_str(),
        site.owner.map(|owner| owner.as_str()),
    )?;
    Some(HoverResult {
        range: site.name.range,
        contents,
    })
}

fn resolved_hover(resolved: &Resolved<'_>, name: &str, range: Range) -> Option<HoverResult> {
    let contents = render_declaration(
        resolved.source.symbols,
        resolved.kind,
        name,
        resolved.owner.as_deref(),
    )?;
    Some(HoverResult { range, contents })
}

fn markdown(signature: &str, label: &str, doc: Option<&str>) -> String {
    let mut out = format!("```sola\n{signature}\n```\n\n{label}");
    if let Some(doc) = doc.filter(|doc| !doc.trim().is_empty()) {
        out.push_str("\n\n");
        out.push_str(doc.trim());
    }
    out
}

/// The Markdown block shown for a declaration: its signature, a kind label and the doc
/// comment when there is one.
pub fn render_declaration(
    symbols: &SymbolTable,
    kind: DeclKind,
    name: &str,
    owner: Option<&str>,
) -> Option<String> {
    let (signature, doc) = match kind {
        DeclKind::Class => {
            let class = symbols.class_signatures.get(name)?;
            (class.header(), class.doc.clone())
        }
        DeclKind::Interface => {
            let interface = symbols.interface_sigs.get(name)?;
            (interface.header(), interface.doc.clone())
        }
        DeclKind::Enum => {
            let decl = symbols.enum_signatures.get(name)?;
            let mut header = decl.header();
            if let Some(cases) = symbols.enum_values.get(name) {
                header.push_str(&format!(" {{ {} }}", cases.join(", ")));
            }
            (header, decl.doc.clone())
        }
        DeclKind::TypeAlias => {
            let alias = symbols.type_aliases.get(name)?;
            let params = if alias.type_params.is_empty() {
                String::new()
            } else {
                format!("<{}>", alias.type_params.join(", "))
            };
            (format!("type {}{params} = {}", alias.name, alias.ty), alias.doc.clone())
        }
        DeclKind::Function => {
            let function = symbols.get_function(name)?;
            (format!("function {}", function.label()), function.doc.clone())
        }
        DeclKind::Const => {
            let constant = symbols.constants.get(name)?;
            (typed("const", &constant.name, constant.ty.as_deref()), None)
        }
        DeclKind::Method => {
            let method = symbols.get_method(owner?, name, None)?;
            let modifiers = method.modifiers.render();
            let signature = if modifiers.is_empty() {
                format!("function {}", method.signature.label())
            } else {
                format!("{modifiers} function {}", method.signature.label())
            };
            (
                format!("{signature}\n// {}", method.owner),
                method.signature.doc.clone(),
            )
        }
        DeclKind::Property => {
            let property = symbols.property(owner?, name)?;
            let modifiers = property.modifiers.render();
            let keyword = if modifiers.is_empty() { "var" } else { modifiers.as_str() };
            (
                typed(keyword, &property.name, property.ty.as_deref()),
                property.doc.clone(),
            )
        }
        DeclKind::ClassConst => {
            let owner = owner?;
            let constant = symbols.constants_of(owner).find(|c| c.name == name)?;
            (
                typed("const", &format!("{owner}::{}", constant.name), constant.ty.as_deref()),
                None,
            )
        }
        DeclKind::EnumCase => (format!("case {}::{name}", owner?), None),
    };
    Some(markdown(&signature, kind.label(), doc.as_deref()))
}

fn typed(keyword: &str, name: &str, ty: Option<&str>) -> String {
    match ty {
        Some(ty) => format!("{keyword} {name}: {ty}"),
        None => format!("{keyword} {name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_snapshot, snapshot};

    fn hover_at(doc: &DocumentSnapshot, line: u32, column: u32) -> Option<HoverResult> {
        let docs = std::slice::from_ref(doc);
        hover(doc, Workspace::new(docs, None), Position::new(line, column))
    }

    #[test]
    fn class_name_renders_class_header() {
        let doc = snapshot(
            "file:///t.sola",
            "class A { public function greet(): string { return \"hi\"; } }",
        );
        let result = hover_at(&doc, 1, 9).expect("hover");
        assert!(result.contents.contains("```sola\nclass A\n```"));
        assert!(result.contents.ends_with("class"));
    }

    #[test]
    fn whitespace_inside_a_declaration_falls_back_to_it() {
        let doc = snapshot("file:///t.sola", "class A {\n\n  public function f() {}\n}");
        let result = hover_at(&doc, 2, 1).expect("hover");
        assert!(result.contents.contains("class A"));
    }

    #[test]
    fn variables_show_inferred_types() {
        let doc = snapshot("file:///v.sola", "$x := 1.5 + 2\n$s := $x > 1");
        let x = hover_at(&doc, 1, 2).expect("$x");
        assert_eq!(x.contents, "```sola\n$x: float\n```\n\nvariable");
        let s = hover_at(&doc, 2, 2).expect("$s");
        assert!(s.contents.contains("$s: bool"));
    }

    #[test]
    fn methods_show_signature_and_doc() {
        let doc = sample_snapshot();
        let line = doc
            .text()
            .lines()
            .position(|line| line.contains("$this->name = $name;"))
            .expect("assignment line") as u32
            + 1;
        let result = hover_at(&doc, line, 17).expect("property hover");
        assert!(result.contents.contains("public $name: string"), "{}", result.contents);
        assert!(result.contents.ends_with("property"));

        let greet_line = doc
            .text()
            .lines()
            .position(|line| line.starts_with("function greet"))
            .expect("greet") as u32
            + 1;
        let greet = hover_at(&doc, greet_line, 11).expect("greet");
        assert!(greet.contents.contains("function greet($user: User): string"));
    }

    #[test]
    fn class_doc_comments_are_appended() {
        let doc = sample_snapshot();
        let line = doc
            .text()
            .lines()
            .position(|line| line.starts_with("class User"))
            .expect("class") as u32
            + 1;
        let result = hover_at(&doc, line, 8).expect("class hover");
        assert!(result.contents.contains("class User implements Storable"));
        assert!(result.contents.contains("A registered user."));
    }

    #[test]
    fn method_hover_names_the_owner() {
        let doc = snapshot(
            "file:///m.sola",
            "class Box {\n  public static function make(int $n): Box {}\n}\n$b := Box::make(1)",
        );
        let result = hover_at(&doc, 4, 13).expect("make");
        assert_eq!(
            result.contents,
            "```sola\npublic static function make($n: int): Box\n// Box\n```\n\nmethod"
        );
    }
}
