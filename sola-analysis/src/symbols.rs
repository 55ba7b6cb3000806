//! Per-file symbol tables.
//!
//! A [`SymbolTable`] is built from a parsed tree and answers the signature questions the
//! editor features keep asking: what a function accepts, which members a class has, which
//! cases an enum defines. Types are kept in their rendered form (`List<int>`, `?User`)
//! because that is how every consumer shows them.

use lsp_types::SymbolKind;
use serde::{Deserialize, Serialize};
use sola_syntax::ast::{
    ClassDecl, ClassMember, ConstDecl, EnumDecl, FunctionDecl, InterfaceDecl, Modifiers,
    PropertyDecl, StmtKind, Tree, TypeAliasDecl, TypeNode, TypeParam, Visibility,
};
use sola_syntax::Range;
use std::collections::BTreeMap;

/// The declaration forms a name can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeclKind {
    Class,
    Interface,
    Enum,
    TypeAlias,
    Function,
    Const,
    Method,
    Property,
    ClassConst,
    EnumCase,
}

impl DeclKind {
    pub fn symbol_kind(self) -> SymbolKind {
        match self {
            DeclKind::Class => SymbolKind::CLASS,
            DeclKind::Interface => SymbolKind::INTERFACE,
            DeclKind::Enum => SymbolKind::ENUM,
            DeclKind::TypeAlias => SymbolKind::TYPE_PARAMETER,
            DeclKind::Function => SymbolKind::FUNCTION,
            DeclKind::Const | DeclKind::ClassConst => SymbolKind::CONSTANT,
            DeclKind::Method => SymbolKind::METHOD,
            DeclKind::Property => SymbolKind::PROPERTY,
            DeclKind::EnumCase => SymbolKind::ENUM_MEMBER,
        }
    }

    /// Word used in hover text.
    pub fn label(self) -> &'static str {
        match self {
            DeclKind::Class => "class",
            DeclKind::Interface => "interface",
            DeclKind::Enum => "enum",
            DeclKind::TypeAlias => "type alias",
            DeclKind::Function => "function",
            DeclKind::Const => "constant",
            DeclKind::Method => "method",
            DeclKind::Property => "property",
            DeclKind::ClassConst => "class constant",
            DeclKind::EnumCase => "enum case",
        }
    }

    pub fn is_type(self) -> bool {
        matches!(
            self,
            DeclKind::Class | DeclKind::Interface | DeclKind::Enum | DeclKind::TypeAlias
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: String,
    pub type_params: Vec<String>,
    pub param_names: Vec<String>,
    pub param_types: Vec<Option<String>>,
    /// Parameters without a default value.
    pub required_params: usize,
    pub variadic: bool,
    pub return_type: Option<String>,
    pub doc: Option<String>,
    /// Range of the name.
    pub range: Range,
}

impl FunctionSignature {
    pub fn from_decl(decl: &FunctionDecl) -> Self {
        Self {
            name: decl.name.as_str().to_string(),
            type_params: type_param_names(&decl.type_params),
            param_names: decl
                .params
                .iter()
                .map(|param| param.name.as_str().to_string())
                .collect(),
            param_types: decl
                .params
                .iter()
                .map(|param| param.ty.as_ref().map(TypeNode::to_string))
                .collect(),
            required_params: decl
                .params
                .iter()
                .filter(|param| param.default.is_none() && !param.variadic)
                .count(),
            variadic: decl.params.iter().any(|param| param.variadic),
            return_type: decl.return_type.as_ref().map(TypeNode::to_string),
            doc: decl.doc.clone(),
            range: decl.name.range,
        }
    }

    /// `$name: type` for each parameter.
    pub fn parameter_labels(&self) -> Vec<String> {
        self.param_names
            .iter()
            .zip(&self.param_types)
            .enumerate()
            .map(|(idx, (name, ty))| {
                let prefix = if self.variadic && idx + 1 == self.param_names.len() {
                    "..."
                } else {
                    ""
                };
                match ty {
                    Some(ty) => format!("{prefix}{name}: {ty}"),
                    None => format!("{prefix}{name}"),
                }
            })
            .collect()
    }

    /// `name($a: int, $b): string`
    pub fn label(&self) -> String {
        let mut label = format!("{}({})", self.name, self.parameter_labels().join(", "));
        if let Some(ret) = &self.return_type {
            label.push_str(": ");
            label.push_str(ret);
        }
        label
    }

    pub fn accepts(&self, arity: usize) -> bool {
        arity >= self.required_params && (self.variadic || arity <= self.param_names.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodSignature {
    pub signature: FunctionSignature,
    pub modifiers: Modifiers,
    /// The class, interface or enum declaring the method.
    pub owner: String,
}

impl MethodSignature {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    pub fn is_public(&self) -> bool {
        matches!(self.modifiers.visibility, None | Some(Visibility::Public))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertySignature {
    /// Includes the leading `$`.
    pub name: String,
    pub ty: Option<String>,
    pub modifiers: Modifiers,
    pub doc: Option<String>,
    pub range: Range,
}

impl PropertySignature {
    pub fn bare_name(&self) -> &str {
        self.name.strip_prefix('$').unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstSignature {
    pub name: String,
    pub ty: Option<String>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSignature {
    pub name: String,
    pub type_params: Vec<String>,
    pub extends: Option<String>,
    pub implements: Vec<String>,
    pub modifiers: Modifiers,
    pub doc: Option<String>,
    pub range: Range,
}

impl ClassSignature {
    /// `abstract class A<T> extends B implements C, D`
    pub fn header(&self) -> String {
        let mut header = String::new();
        let modifiers = self.modifiers.render();
        if !modifiers.is_empty() {
            header.push_str(&modifiers);
            header.push(' ');
        }
        header.push_str("class ");
        header.push_str(&self.name);
        push_type_params(&mut header, &self.type_params);
        if let Some(parent) = &self.extends {
            header.push_str(" extends ");
            header.push_str(parent);
        }
        if !self.implements.is_empty() {
            header.push_str(" implements ");
            header.push_str(&self.implements.join(", "));
        }
        header
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceSignature {
    pub name: String,
    pub type_params: Vec<String>,
    pub extends: Vec<String>,
    pub methods: BTreeMap<String, MethodSignature>,
    pub doc: Option<String>,
    pub range: Range,
}

impl InterfaceSignature {
    pub fn header(&self) -> String {
        let mut header = format!("interface {}", self.name);
        push_type_params(&mut header, &self.type_params);
        if !self.extends.is_empty() {
            header.push_str(" extends ");
            header.push_str(&self.extends.join(", "));
        }
        header
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSignature {
    pub name: String,
    pub backing: Option<String>,
    pub implements: Vec<String>,
    pub doc: Option<String>,
    pub range: Range,
}

impl EnumSignature {
    pub fn header(&self) -> String {
        let mut header = format!("enum {}", self.name);
        if let Some(backing) = &self.backing {
            header.push_str(": ");
            header.push_str(backing);
        }
        if !self.implements.is_empty() {
            header.push_str(" implements ");
            header.push_str(&self.implements.join(", "));
        }
        header
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAliasSignature {
    pub name: String,
    pub type_params: Vec<String>,
    pub ty: String,
    pub doc: Option<String>,
    pub range: Range,
}

/// Signatures declared by one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolTable {
    pub functions: BTreeMap<String, FunctionSignature>,
    pub class_signatures: BTreeMap<String, ClassSignature>,
    /// Methods of classes and enums; a name may map to several overloads.
    pub class_methods: BTreeMap<String, BTreeMap<String, Vec<MethodSignature>>>,
    pub class_properties: BTreeMap<String, BTreeMap<String, PropertySignature>>,
    pub class_constants: BTreeMap<String, BTreeMap<String, ConstSignature>>,
    pub interface_sigs: BTreeMap<String, InterfaceSignature>,
    pub enum_signatures: BTreeMap<String, EnumSignature>,
    pub enum_values: BTreeMap<String, Vec<String>>,
    pub type_aliases: BTreeMap<String, TypeAliasSignature>,
    pub constants: BTreeMap<String, ConstSignature>,
}

impl SymbolTable {
    pub fn build(tree: &Tree) -> Self {
        let mut table = SymbolTable::default();
        for stmt in &tree.statements {
            match &stmt.kind {
                StmtKind::Class(decl) => table.add_class(decl),
                StmtKind::Interface(decl) => table.add_interface(decl),
                StmtKind::Enum(decl) => table.add_enum(decl),
                StmtKind::TypeAlias(decl) => table.add_type_alias(decl),
                StmtKind::Function(decl) => {
                    table
                        .functions
                        .entry(decl.name.as_str().to_string())
                        .or_insert_with(|| FunctionSignature::from_decl(decl));
                }
                StmtKind::Const(decl) => {
                    table
                        .constants
                        .insert(decl.name.as_str().to_string(), const_signature(decl));
                }
                _ => {}
            }
        }
        table
    }

    fn add_class(&mut self, decl: &ClassDecl) {
        let name = decl.name.as_str().to_string();
        self.class_signatures.insert(
            name.clone(),
            ClassSignature {
                name: name.clone(),
                type_params: type_param_names(&decl.type_params),
                extends: decl.extends.as_ref().map(TypeNode::to_string),
                implements: decl.implements.iter().map(TypeNode::to_string).collect(),
                modifiers: decl.modifiers,
                doc: decl.doc.clone(),
                range: decl.name.range,
            },
        );
        self.add_members(&name, &decl.members);
    }

    fn add_interface(&mut self, decl: &InterfaceDecl) {
        let name = decl.name.as_str().to_string();
        let methods = decl
            .methods()
            .map(|method| {
                (
                    method.name.as_str().to_string(),
                    method_signature(&name, method),
                )
            })
            .collect();
        self.interface_sigs.insert(
            name.clone(),
            InterfaceSignature {
                name,
                type_params: type_param_names(&decl.type_params),
                extends: decl.extends.iter().map(TypeNode::to_string).collect(),
                methods,
                doc: decl.doc.clone(),
                range: decl.name.range,
            },
        );
    }

    fn add_enum(&mut self, decl: &EnumDecl) {
        let name = decl.name.as_str().to_string();
        self.enum_signatures.insert(
            name.clone(),
            EnumSignature {
                name: name.clone(),
                backing: decl.backing.as_ref().map(TypeNode::to_string),
                implements: decl.implements.iter().map(TypeNode::to_string).collect(),
                doc: decl.doc.clone(),
                range: decl.name.range,
            },
        );
        self.enum_values.insert(
            name.clone(),
            decl.cases()
                .map(|case| case.name.as_str().to_string())
                .collect(),
        );
        self.add_members(&name, &decl.members);
    }

    fn add_type_alias(&mut self, decl: &TypeAliasDecl) {
        self.type_aliases.insert(
            decl.name.as_str().to_string(),
            TypeAliasSignature {
                name: decl.name.as_str().to_string(),
                type_params: type_param_names(&decl.type_params),
                ty: decl.ty.to_string(),
                doc: decl.doc.clone(),
                range: decl.name.range,
            },
        );
    }

    fn add_members(&mut self, owner: &str, members: &[ClassMember]) {
        for member in members {
            match member {
                ClassMember::Method(method) => {
                    self.class_methods
                        .entry(owner.to_string())
                        .or_default()
                        .entry(method.name.as_str().to_string())
                        .or_default()
                        .push(method_signature(owner, method));
                    if method.name.as_str() == "__construct" {
                        self.add_promoted_properties(owner, method);
                    }
                }
                ClassMember::Property(property) => {
                    self.class_properties
                        .entry(owner.to_string())
                        .or_default()
                        .insert(
                            property.name.as_str().to_string(),
                            property_signature(property),
                        );
                }
                ClassMember::Const(constant) => {
                    self.class_constants
                        .entry(owner.to_string())
                        .or_default()
                        .insert(constant.name.as_str().to_string(), const_signature(constant));
                }
                ClassMember::Case(_) => {}
            }
        }
    }

    fn add_promoted_properties(&mut self, owner: &str, constructor: &FunctionDecl) {
        for param in &constructor.params {
            let Some(visibility) = param.promoted else {
                continue;
            };
            self.class_properties
                .entry(owner.to_string())
                .or_default()
                .entry(param.name.as_str().to_string())
                .or_insert_with(|| PropertySignature {
                    name: param.name.as_str().to_string(),
                    ty: param.ty.as_ref().map(TypeNode::to_string),
                    modifiers: Modifiers {
                        visibility: Some(visibility),
                        ..Modifiers::default()
                    },
                    doc: None,
                    range: param.name.range,
                });
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    /// Looks up a method of a class, enum or interface. With an `arity`, the first
    /// overload accepting that many arguments wins; otherwise the first declared.
    pub fn get_method(&self, class: &str, name: &str, arity: Option<usize>) -> Option<&MethodSignature> {
        if let Some(overloads) = self.class_methods.get(class).and_then(|m| m.get(name)) {
            let matching = arity.and_then(|arity| {
                overloads
                    .iter()
                    .find(|method| method.signature.accepts(arity))
            });
            return matching.or_else(|| overloads.first());
        }
        self.interface_sigs
            .get(class)
            .and_then(|interface| interface.methods.get(name))
    }

    /// All methods of `class` in name order; overloads are listed once each.
    pub fn methods_of<'a>(&'a self, class: &str) -> Box<dyn Iterator<Item = &'a MethodSignature> + 'a> {
        if let Some(methods) = self.class_methods.get(class) {
            return Box::new(methods.values().flatten());
        }
        match self.interface_sigs.get(class) {
            Some(interface) => Box::new(interface.methods.values()),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Property by name, with or without its `$`.
    pub fn property(&self, class: &str, name: &str) -> Option<&PropertySignature> {
        let properties = self.class_properties.get(class)?;
        if name.starts_with('$') {
            properties.get(name)
        } else {
            properties.get(&format!("${name}"))
        }
    }

    pub fn properties_of<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a PropertySignature> + 'a {
        self.class_properties
            .get(class)
            .into_iter()
            .flat_map(|properties| properties.values())
    }

    pub fn constants_of<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a ConstSignature> + 'a {
        self.class_constants
            .get(class)
            .into_iter()
            .flat_map(|constants| constants.values())
    }

    /// What kind of top-level declaration `name` is in this file.
    pub fn kind_of(&self, name: &str) -> Option<DeclKind> {
        if self.class_signatures.contains_key(name) {
            Some(DeclKind::Class)
        } else if self.interface_sigs.contains_key(name) {
            Some(DeclKind::Interface)
        } else if self.enum_signatures.contains_key(name) {
            Some(DeclKind::Enum)
        } else if self.type_aliases.contains_key(name) {
            Some(DeclKind::TypeAlias)
        } else if self.functions.contains_key(name) {
            Some(DeclKind::Function)
        } else if self.constants.contains_key(name) {
            Some(DeclKind::Const)
        } else {
            None
        }
    }

    pub fn declares(&self, name: &str) -> bool {
        self.kind_of(name).is_some()
    }

    /// True for classes, interfaces and enums.
    pub fn is_class_like(&self, name: &str) -> bool {
        matches!(
            self.kind_of(name),
            Some(DeclKind::Class | DeclKind::Interface | DeclKind::Enum)
        )
    }

    /// Every top-level name with its kind.
    pub fn declared_names(&self) -> impl Iterator<Item = (&str, DeclKind)> {
        let classes = self
            .class_signatures
            .keys()
            .map(|name| (name.as_str(), DeclKind::Class));
        let interfaces = self
            .interface_sigs
            .keys()
            .map(|name| (name.as_str(), DeclKind::Interface));
        let enums = self
            .enum_signatures
            .keys()
            .map(|name| (name.as_str(), DeclKind::Enum));
        let aliases = self
            .type_aliases
            .keys()
            .map(|name| (name.as_str(), DeclKind::TypeAlias));
        let functions = self
            .functions
            .keys()
            .map(|name| (name.as_str(), DeclKind::Function));
        let constants = self
            .constants
            .keys()
            .map(|name| (name.as_str(), DeclKind::Const));
        classes
            .chain(interfaces)
            .chain(enums)
            .chain(aliases)
            .chain(functions)
            .chain(constants)
    }

    /// Parent class and implemented interfaces of a class, or the extended
    /// interfaces of an interface, without generic arguments.
    pub fn supertypes_of(&self, name: &str) -> Vec<String> {
        if let Some(class) = self.class_signatures.get(name) {
            return class
                .extends
                .iter()
                .chain(&class.implements)
                .map(|ty| strip_generics(ty).to_string())
                .collect();
        }
        if let Some(interface) = self.interface_sigs.get(name) {
            return interface
                .extends
                .iter()
                .map(|ty| strip_generics(ty).to_string())
                .collect();
        }
        if let Some(decl) = self.enum_signatures.get(name) {
            return decl
                .implements
                .iter()
                .map(|ty| strip_generics(ty).to_string())
                .collect();
        }
        Vec::new()
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.class_signatures
            .get(class)
            .and_then(|signature| signature.extends.as_deref())
            .map(strip_generics)
    }
}

/// `List<int>` becomes `List`; nullability and array suffixes are dropped too.
pub fn strip_generics(ty: &str) -> &str {
    let ty = ty.trim_start_matches('?');
    let end = ty.find(['<', '[']).unwrap_or(ty.len());
    &ty[..end]
}

fn method_signature(owner: &str, decl: &FunctionDecl) -> MethodSignature {
    MethodSignature {
        signature: FunctionSignature::from_decl(decl),
        modifiers: decl.modifiers,
        owner: owner.to_string(),
    }
}

fn property_signature(decl: &PropertyDecl) -> PropertySignature {
    PropertySignature {
        name: decl.name.as_str().to_string(),
        ty: decl.ty.as_ref().map(TypeNode::to_string),
        modifiers: decl.modifiers,
        doc: decl.doc.clone(),
        range: decl.name.range,
    }
}

fn const_signature(decl: &ConstDecl) -> ConstSignature {
    ConstSignature {
        name: decl.name.as_str().to_string(),
        ty: decl.ty.as_ref().map(TypeNode::to_string),
        range: decl.name.range,
    }
}

fn type_param_names(params: &[TypeParam]) -> Vec<String> {
    params
        .iter()
        .map(|param| param.name.as_str().to_string())
        .collect()
}

fn push_type_params(out: &mut String, params: &[String]) {
    if !params.is_empty() {
        out.push('<');
        out.push_str(&params.join(", "));
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> SymbolTable {
        let (tree, errors) = sola_syntax::parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        SymbolTable::build(&tree)
    }

    #[test]
    fn collects_top_level_declarations() {
        let symbols = table(
            "class A {}\ninterface I { function run(): void; }\nenum E { X, Y }\ntype Id = int\nfunction f($a, $b = 1) {}\nconst LIMIT = 3",
        );
        assert_eq!(symbols.kind_of("A"), Some(DeclKind::Class));
        assert_eq!(symbols.kind_of("I"), Some(DeclKind::Interface));
        assert_eq!(symbols.kind_of("E"), Some(DeclKind::Enum));
        assert_eq!(symbols.kind_of("Id"), Some(DeclKind::TypeAlias));
        assert_eq!(symbols.kind_of("LIMIT"), Some(DeclKind::Const));
        assert_eq!(symbols.enum_values["E"], vec!["X", "Y"]);
        let f = symbols.get_function("f").expect("f");
        assert_eq!(f.required_params, 1);
        assert!(f.accepts(1) && f.accepts(2) && !f.accepts(3));
        assert_eq!(symbols.declared_names().count(), 6);
    }

    #[test]
    fn overloads_resolve_by_arity() {
        let symbols = table(
            "class P {\n  public function at($i: int): string {}\n  public function at($i: int, $j: int): string[] {}\n}",
        );
        let two = symbols.get_method("P", "at", Some(2)).expect("overload");
        assert_eq!(two.signature.return_type.as_deref(), Some("string[]"));
        let fallback = symbols.get_method("P", "at", Some(5)).expect("fallback");
        assert_eq!(fallback.signature.param_names.len(), 1);
        assert_eq!(symbols.methods_of("P").count(), 2);
    }

    #[test]
    fn promoted_constructor_parameters_become_properties() {
        let symbols = table(
            "class User {\n  public $id: int\n  function __construct(private string $name) {}\n}",
        );
        assert_eq!(
            symbols.property("User", "name").and_then(|p| p.ty.clone()),
            Some("string".into())
        );
        assert!(symbols.property("User", "$id").is_some());
    }

    #[test]
    fn headers_and_labels_render() {
        let symbols = table(
            "abstract class Repo<T> extends Base implements Store<T> {}\nfunction add(int $a, ...$rest): int {}",
        );
        assert_eq!(
            symbols.class_signatures["Repo"].header(),
            "abstract class Repo<T> extends Base implements Store<T>"
        );
        assert_eq!(symbols.supertypes_of("Repo"), vec!["Base", "Store"]);
        assert_eq!(
            symbols.get_function("add").map(FunctionSignature::label),
            Some("add($a: int, ...$rest): int".into())
        );
    }
}
