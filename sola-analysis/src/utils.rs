use crate::buffer::is_word_char;
use crate::symbols::DeclKind;
use sola_syntax::ast::{
    ClassDecl, ClassMember, Declaration, EnumDecl, FunctionDecl, Ident, InterfaceDecl, StmtKind,
    Tree,
};
use sola_syntax::{Position, Range};

/// A class, interface or enum declaration.
#[derive(Debug, Clone, Copy)]
pub enum ClassLike<'a> {
    Class(&'a ClassDecl),
    Interface(&'a InterfaceDecl),
    Enum(&'a EnumDecl),
}

impl<'a> ClassLike<'a> {
    pub fn name(&self) -> &'a Ident {
        match self {
            ClassLike::Class(decl) => &decl.name,
            ClassLike::Interface(decl) => &decl.name,
            ClassLike::Enum(decl) => &decl.name,
        }
    }

    pub fn members(&self) -> &'a [ClassMember] {
        match self {
            ClassLike::Class(decl) => &decl.members,
            ClassLike::Interface(decl) => &decl.members,
            ClassLike::Enum(decl) => &decl.members,
        }
    }

    pub fn range(&self) -> Range {
        match self {
            ClassLike::Class(decl) => decl.range,
            ClassLike::Interface(decl) => decl.range,
            ClassLike::Enum(decl) => decl.range,
        }
    }

    pub fn body_range(&self) -> Range {
        match self {
            ClassLike::Class(decl) => decl.body_range,
            ClassLike::Interface(decl) => decl.body_range,
            ClassLike::Enum(decl) => decl.body_range,
        }
    }

    pub fn doc(&self) -> Option<&'a str> {
        match self {
            ClassLike::Class(decl) => decl.doc.as_deref(),
            ClassLike::Interface(decl) => decl.doc.as_deref(),
            ClassLike::Enum(decl) => decl.doc.as_deref(),
        }
    }

    pub fn kind(&self) -> DeclKind {
        match self {
            ClassLike::Class(_) => DeclKind::Class,
            ClassLike::Interface(_) => DeclKind::Interface,
            ClassLike::Enum(_) => DeclKind::Enum,
        }
    }

    pub fn methods(&self) -> impl Iterator<Item = &'a FunctionDecl> {
        self.members().iter().filter_map(ClassMember::as_method)
    }

    pub fn find_member(&self, name: &str) -> Option<&'a ClassMember> {
        self.members().iter().find(|member| {
            let spelled = member.name().as_str();
            spelled == name || spelled.trim_start_matches('$') == name.trim_start_matches('$')
        })
    }
}

/// Visits every class, interface and enum declared at the top level.
pub fn for_each_class_like<'a, F>(tree: &'a Tree, f: &mut F)
where
    F: FnMut(ClassLike<'a>),
{
    for stmt in &tree.statements {
        match &stmt.kind {
            StmtKind::Class(decl) => f(ClassLike::Class(decl)),
            StmtKind::Interface(decl) => f(ClassLike::Interface(decl)),
            StmtKind::Enum(decl) => f(ClassLike::Enum(decl)),
            _ => {}
        }
    }
}

/// Visits every function and method, passing the owning class for methods.
///
/// Closures are not included; they have no name to navigate to.
pub fn for_each_function<'a, F>(tree: &'a Tree, f: &mut F)
where
    F: FnMut(Option<ClassLike<'a>>, &'a FunctionDecl),
{
    for stmt in &tree.statements {
        if let StmtKind::Function(decl) = &stmt.kind {
            f(None, decl);
        }
    }
    for_each_class_like(tree, &mut |class| {
        for method in class.methods() {
            f(Some(class), method);
        }
    });
}

pub fn find_class_like<'a>(tree: &'a Tree, name: &str) -> Option<ClassLike<'a>> {
    let mut found = None;
    for_each_class_like(tree, &mut |class| {
        if found.is_none() && class.name().as_str() == name {
            found = Some(class);
        }
    });
    found
}

/// The class-like declaration whose range contains `position`.
pub fn enclosing_class(tree: &Tree, position: Position) -> Option<ClassLike<'_>> {
    let mut found = None;
    for_each_class_like(tree, &mut |class| {
        if class.range().contains(position) {
            found = Some(class);
        }
    });
    found
}

/// The named function or method containing `position`.
pub fn enclosing_function(
    tree: &Tree,
    position: Position,
) -> Option<(Option<ClassLike<'_>>, &FunctionDecl)> {
    let mut found = None;
    for_each_function(tree, &mut |owner, function| {
        if function.range.contains(position) {
            found = Some((owner, function));
        }
    });
    found
}

/// A declaration found by position or name.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationSite<'a> {
    pub name: &'a Ident,
    pub kind: DeclKind,
    pub range: Range,
    pub owner: Option<&'a Ident>,
}

/// The innermost named declaration containing `position`: a member when the cursor is
/// inside one, otherwise the enclosing top-level declaration.
pub fn innermost_declaration(tree: &Tree, position: Position) -> Option<DeclarationSite<'_>> {
    let top = tree
        .top_level_declarations()
        .find(|decl| decl.range().contains(position))?;
    let owner = top.name();
    let members: &[ClassMember] = match top {
        Declaration::Class(decl) => &decl.members,
        Declaration::Interface(decl) => &decl.members,
        Declaration::Enum(decl) => &decl.members,
        _ => &[],
    };
    if let Some(member) = members
        .iter()
        .find(|member| member.range().contains(position))
    {
        return Some(DeclarationSite {
            name: member.name(),
            kind: member_kind(member),
            range: member.range(),
            owner: Some(owner),
        });
    }
    Some(DeclarationSite {
        name: top.name(),
        kind: declaration_kind(&top),
        range: top.range(),
        owner: None,
    })
}

/// Top-level declaration named `name`.
pub fn find_declaration<'a>(tree: &'a Tree, name: &str) -> Option<DeclarationSite<'a>> {
    tree.top_level_declarations()
        .find(|decl| decl.name().as_str() == name)
        .map(|decl| DeclarationSite {
            name: decl.name(),
            kind: declaration_kind(&decl),
            range: decl.range(),
            owner: None,
        })
}

/// A member named `name` of any class-like declaration in the file.
pub fn find_member_declaration<'a>(
    tree: &'a Tree,
    class: Option<&str>,
    name: &str,
) -> Option<DeclarationSite<'a>> {
    let mut found = None;
    for_each_class_like(tree, &mut |decl| {
        if found.is_some() || class.is_some_and(|class| decl.name().as_str() != class) {
            return;
        }
        if let Some(member) = decl.find_member(name) {
            found = Some(DeclarationSite {
                name: member.name(),
                kind: member_kind(member),
                range: member.range(),
                owner: Some(decl.name()),
            });
        }
    });
    found
}

pub fn declaration_kind(decl: &Declaration<'_>) -> DeclKind {
    match decl {
        Declaration::Class(_) => DeclKind::Class,
        Declaration::Interface(_) => DeclKind::Interface,
        Declaration::Enum(_) => DeclKind::Enum,
        Declaration::TypeAlias(_) => DeclKind::TypeAlias,
        Declaration::Function(_) => DeclKind::Function,
        Declaration::Const(_) => DeclKind::Const,
    }
}

pub fn member_kind(member: &ClassMember) -> DeclKind {
    match member {
        ClassMember::Method(_) => DeclKind::Method,
        ClassMember::Property(_) => DeclKind::Property,
        ClassMember::Const(_) => DeclKind::ClassConst,
        ClassMember::Case(_) => DeclKind::EnumCase,
    }
}

/// Lexical occurrences of `word` in `text`.
///
/// An occurrence counts only when it is not glued to other identifier characters. For
/// plain identifiers a preceding `$` also disqualifies the match, so `count` does not
/// match inside `$count`.
pub fn word_occurrences(text: &str, word: &str) -> Vec<Range> {
    if word.is_empty() {
        return Vec::new();
    }
    let is_variable = word.starts_with('$');
    let mut ranges = Vec::new();
    for (line_idx, line) in text.split('\n').enumerate() {
        for (offset, _) in line.match_indices(word) {
            let before = line[..offset].chars().next_back();
            let after = line[offset + word.len()..].chars().next();
            let glued_before = before.is_some_and(|c| {
                if is_variable {
                    c.is_alphanumeric() || c == '_'
                } else {
                    is_word_char(c)
                }
            });
            let glued_after = after.is_some_and(|c| c.is_alphanumeric() || c == '_');
            if glued_before || glued_after {
                continue;
            }
            let column = line[..offset].chars().count() as u32 + 1;
            let line_no = line_idx as u32 + 1;
            ranges.push(Range::new(
                Position::new(line_no, column),
                Position::new(line_no, column + word.chars().count() as u32),
            ));
        }
    }
    ranges
}

/// Leading whitespace of `line`.
pub fn indentation(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        sola_syntax::parse(source).0
    }

    #[test]
    fn word_occurrences_respect_boundaries() {
        let text = "$x := 1\n$xy := $x + count($x)\n$count := x";
        let variables = word_occurrences(text, "$x");
        assert_eq!(variables.len(), 3);
        assert_eq!(variables[1].start, Position::new(2, 8));
        let names = word_occurrences(text, "count");
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].start, Position::new(2, 13));
    }

    #[test]
    fn innermost_declaration_prefers_members() {
        let tree = parse("class A {\n  public function greet() {\n    return 1\n  }\n}");
        let site = innermost_declaration(&tree, Position::new(3, 5)).expect("member");
        assert_eq!(site.kind, DeclKind::Method);
        assert_eq!(site.owner.map(Ident::as_str), Some("A"));
        let site = innermost_declaration(&tree, Position::new(1, 9)).expect("class");
        assert_eq!(site.kind, DeclKind::Class);
    }

    #[test]
    fn enclosing_function_reports_owner() {
        let tree = parse("function f() {\n  $a := 1\n}\nclass B { function g() { } }");
        let (owner, function) = enclosing_function(&tree, Position::new(2, 3)).expect("f");
        assert!(owner.is_none());
        assert_eq!(function.name.as_str(), "f");
        let (owner, function) = enclosing_function(&tree, Position::new(4, 24)).expect("g");
        assert_eq!(owner.map(|c| c.name().as_str().to_string()), Some("B".into()));
        assert_eq!(function.name.as_str(), "g");
    }

    #[test]
    fn indentation_keeps_tabs_and_spaces() {
        assert_eq!(indentation("\t  $x"), "\t  ");
        assert_eq!(indentation("x"), "");
    }
}
