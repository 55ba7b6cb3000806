//! Cross-file lookups for a single query.
//!
//! A [`Workspace`] borrows the snapshots of every open document and, when available, the
//! workspace index. Open documents always win over indexed copies of the same file
//! since they hold what the user currently sees.

use crate::document::DocumentSnapshot;
use crate::symbols::{DeclKind, MethodSignature, PropertySignature, SymbolTable};
use crate::utils::{find_declaration, find_member_declaration, DeclarationSite};
use crate::workspace_index::WorkspaceIndex;
use lsp_types::Url;
use sola_syntax::{Range, Tree};
use std::collections::{HashSet, VecDeque};

/// A parsed file, open or indexed.
#[derive(Debug, Clone, Copy)]
pub struct SourceView<'a> {
    pub uri: &'a Url,
    pub tree: &'a Tree,
    pub symbols: &'a SymbolTable,
}

/// A range in some file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub uri: Url,
    pub range: Range,
}

/// A declaration resolved somewhere in the workspace.
#[derive(Debug, Clone)]
pub struct Resolved<'a> {
    pub source: SourceView<'a>,
    pub kind: DeclKind,
    /// Range of the declared name.
    pub name_range: Range,
    /// Range of the whole declaration.
    pub range: Range,
    /// Owning class for members.
    pub owner: Option<String>,
}

impl<'a> Resolved<'a> {
    pub fn location(&self) -> Location {
        Location {
            uri: self.source.uri.clone(),
            range: self.name_range,
        }
    }

    fn from_site(source: SourceView<'a>, site: DeclarationSite<'a>) -> Self {
        Self {
            source,
            kind: site.kind,
            name_range: site.name.range,
            range: site.range,
            owner: site.owner.map(|owner| owner.as_str().to_string()),
        }
    }
}

/// Inheritance chains deeper than this are assumed to be cyclic.
const MAX_HIERARCHY_DEPTH: usize = 32;

#[derive(Clone, Copy)]
pub struct Workspace<'a> {
    pub documents: &'a [DocumentSnapshot],
    pub index: Option<&'a WorkspaceIndex>,
}

impl<'a> Workspace<'a> {
    pub fn new(documents: &'a [DocumentSnapshot], index: Option<&'a WorkspaceIndex>) -> Self {
        Self { documents, index }
    }

    pub fn document(&self, uri: &Url) -> Option<&'a DocumentSnapshot> {
        self.documents.iter().find(|doc| &doc.uri == uri)
    }

    /// Open documents first, then indexed files that are not open.
    pub fn sources(&self) -> impl Iterator<Item = SourceView<'a>> + 'a {
        let documents = self.documents;
        let open = documents.iter().filter_map(view_of);
        let indexed = self.index.into_iter().flat_map(move |index| {
            index
                .files()
                .filter(move |file| !documents.iter().any(|doc| doc.uri == file.uri))
                .map(|file| SourceView {
                    uri: &file.uri,
                    tree: &file.tree,
                    symbols: &file.symbols,
                })
        });
        open.chain(indexed)
    }

    /// Finds a top-level declaration by name, looking at `current` first, then the
    /// other open documents, then the index.
    pub fn find_declaration(&self, name: &str, current: Option<&'a DocumentSnapshot>) -> Option<Resolved<'a>> {
        if let Some(source) = current.and_then(view_of) {
            if let Some(site) = find_declaration(source.tree, name) {
                return Some(Resolved::from_site(source, site));
            }
        }
        for source in self.documents.iter().filter_map(view_of) {
            if let Some(site) = find_declaration(source.tree, name) {
                return Some(Resolved::from_site(source, site));
            }
        }
        let index = self.index?;
        if let Some(file) = index.location_of(name) {
            if self.document(&file.uri).is_none() {
                let source = SourceView {
                    uri: &file.uri,
                    tree: &file.tree,
                    symbols: &file.symbols,
                };
                if let Some(site) = find_declaration(source.tree, name) {
                    return Some(Resolved::from_site(source, site));
                }
            }
        }
        self.sources()
            .find_map(|source| find_declaration(source.tree, name).map(|site| (source, site)))
            .map(|(source, site)| Resolved::from_site(source, site))
    }

    /// The file declaring the class-like `name`, with its symbol table.
    pub fn class_source(&self, name: &str, current: Option<&'a DocumentSnapshot>) -> Option<SourceView<'a>> {
        if let Some(source) = current.and_then(view_of) {
            if source.symbols.is_class_like(name) {
                return Some(source);
            }
        }
        if let Some(index) = self.index {
            if let Some(file) = index.location_of(name) {
                if self.document(&file.uri).is_none() && file.symbols.is_class_like(name) {
                    return Some(SourceView {
                        uri: &file.uri,
                        tree: &file.tree,
                        symbols: &file.symbols,
                    });
                }
            }
        }
        self.sources()
            .find(|source| source.symbols.is_class_like(name))
    }

    pub fn kind_of(&self, name: &str, current: Option<&'a DocumentSnapshot>) -> Option<DeclKind> {
        if let Some(kind) = current
            .and_then(|doc| doc.symbols())
            .and_then(|symbols| symbols.kind_of(name))
        {
            return Some(kind);
        }
        self.sources()
            .find_map(|source| source.symbols.kind_of(name))
    }

    /// `class` followed by its ancestors: parent classes and implemented interfaces,
    /// breadth first, without repeats.
    pub fn hierarchy(&self, class: &str, current: Option<&'a DocumentSnapshot>) -> Vec<(String, SourceView<'a>)> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class.to_string()]);
        let mut out = Vec::new();
        while let Some(name) = queue.pop_front() {
            if out.len() >= MAX_HIERARCHY_DEPTH || !seen.insert(name.clone()) {
                continue;
            }
            let Some(source) = self.class_source(&name, current) else {
                continue;
            };
            queue.extend(source.symbols.supertypes_of(&name));
            out.push((name, source));
        }
        out
    }

    /// A method of `class` or of one of its ancestors.
    pub fn find_method(
        &self,
        class: &str,
        name: &str,
        arity: Option<usize>,
        current: Option<&'a DocumentSnapshot>,
    ) -> Option<(SourceView<'a>, &'a MethodSignature)> {
        self.hierarchy(class, current)
            .into_iter()
            .find_map(|(owner, source)| {
                source
                    .symbols
                    .get_method(&owner, name, arity)
                    .map(|method| (source, method))
            })
    }

    pub fn find_property(
        &self,
        class: &str,
        name: &str,
        current: Option<&'a DocumentSnapshot>,
    ) -> Option<(SourceView<'a>, &'a PropertySignature)> {
        self.hierarchy(class, current)
            .into_iter()
            .find_map(|(owner, source)| {
                source
                    .symbols
                    .property(&owner, name)
                    .map(|property| (source, property))
            })
    }

    /// Every method visible on `class`, nearest declaration first; overridden methods
    /// from ancestors are not repeated.
    pub fn all_methods(&self, class: &str, current: Option<&'a DocumentSnapshot>) -> Vec<&'a MethodSignature> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (owner, source) in self.hierarchy(class, current) {
            for method in source.symbols.methods_of(&owner) {
                if seen.insert(method.name().to_string()) {
                    out.push(method);
                }
            }
        }
        out
    }

    pub fn all_properties(&self, class: &str, current: Option<&'a DocumentSnapshot>) -> Vec<&'a PropertySignature> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (owner, source) in self.hierarchy(class, current) {
            for property in source.symbols.properties_of(&owner) {
                if seen.insert(property.name.clone()) {
                    out.push(property);
                }
            }
        }
        out
    }

    /// The declaration of member `name` on `class` or its ancestors.
    pub fn find_member(&self, class: &str, name: &str, current: Option<&'a DocumentSnapshot>) -> Option<Resolved<'a>> {
        self.hierarchy(class, current)
            .into_iter()
            .find_map(|(owner, source)| {
                find_member_declaration(source.tree, Some(&owner), name)
                    .map(|site| Resolved::from_site(source, site))
            })
    }

    /// The first member called `name` on any class in the workspace, current file first.
    pub fn find_any_member(&self, name: &str, current: Option<&'a DocumentSnapshot>) -> Option<Resolved<'a>> {
        current
            .and_then(view_of)
            .into_iter()
            .chain(self.sources())
            .find_map(|source| {
                find_member_declaration(source.tree, None, name)
                    .map(|site| Resolved::from_site(source, site))
            })
    }
}

fn view_of(doc: &DocumentSnapshot) -> Option<SourceView<'_>> {
    Some(SourceView {
        uri: &doc.uri,
        tree: doc.tree.as_deref()?,
        symbols: doc.symbols.as_deref()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sola_syntax::SolaParser;

    fn doc(name: &str, text: &str) -> DocumentSnapshot {
        let uri = Url::parse(&format!("file:///{name}")).unwrap();
        DocumentSnapshot::from_text(uri, text, &SolaParser)
    }

    #[test]
    fn resolves_declarations_across_open_documents() {
        let docs = vec![
            doc("b.sola", "use \"a\"\nclass B extends A {}"),
            doc("a.sola", "class A {}"),
        ];
        let workspace = Workspace::new(&docs, None);
        let resolved = workspace
            .find_declaration("A", Some(&docs[0]))
            .expect("A");
        assert_eq!(resolved.source.uri.path(), "/a.sola");
        assert_eq!(resolved.kind, DeclKind::Class);
        assert_eq!(resolved.name_range.start.column, 7);
    }

    #[test]
    fn methods_are_inherited_and_overrides_shadow() {
        let docs = vec![doc(
            "m.sola",
            "class Base { function hello(): string {} function shared(): int {} }\nclass Child extends Base { function shared(): string {} }",
        )];
        let workspace = Workspace::new(&docs, None);
        let (_, method) = workspace
            .find_method("Child", "hello", None, None)
            .expect("inherited");
        assert_eq!(method.owner, "Base");
        let names: Vec<_> = workspace
            .all_methods("Child", None)
            .iter()
            .map(|m| (m.name().to_string(), m.owner.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("shared".to_string(), "Child".to_string()),
                ("hello".to_string(), "Base".to_string())
            ]
        );
    }

    #[test]
    fn cyclic_hierarchies_terminate() {
        let docs = vec![doc("c.sola", "class A extends B {}\nclass B extends A {}")];
        let workspace = Workspace::new(&docs, None);
        assert_eq!(workspace.hierarchy("A", None).len(), 2);
        assert!(workspace.find_method("A", "nope", None, None).is_none());
    }
}
