//! Code lenses: test runners on test files and implementation counts on interfaces.
//!
//! What counts as a test is decided by naming alone:
//!
//! - a test file is named `*_test.sola`, `test_*` or `*Test.sola`;
//! - a test class is named `*Test`, `*TestCase` or `Test*`;
//! - a test method starts with `test`, `Test`, `should`, `it` or `spec`.

use crate::document::DocumentSnapshot;
use crate::symbols::strip_generics;
use crate::utils::{for_each_class_like, ClassLike};
use crate::workspace::Workspace;
use serde_json::{json, Value};
use sola_syntax::{Position, Range};

pub const RUN_TESTS_COMMAND: &str = "sola.runTests";
pub const DEBUG_TESTS_COMMAND: &str = "sola.debugTests";
pub const SHOW_IMPLEMENTATIONS_COMMAND: &str = "sola.showImplementations";

/// At most this many files are scanned when counting implementations.
pub const MAX_IMPLEMENTATION_SCAN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLensSettings {
    pub tests: bool,
    pub implementations: bool,
}

impl Default for CodeLensSettings {
    fn default() -> Self {
        Self {
            tests: true,
            implementations: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolaCodeLens {
    pub range: Range,
    pub title: String,
    pub command: String,
    pub arguments: Vec<Value>,
}

pub fn is_test_file(file_name: &str) -> bool {
    file_name.ends_with("_test.sola") || file_name.starts_with("test_") || file_name.ends_with("Test.sola")
}

pub fn is_test_class(name: &str) -> bool {
    name.ends_with("Test") || name.ends_with("TestCase") || name.starts_with("Test")
}

pub fn is_test_method(name: &str) -> bool {
    ["test", "Test", "should", "it", "spec"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn file_name(doc: &DocumentSnapshot) -> Option<String> {
    doc.uri
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
}

pub fn code_lenses(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    settings: &CodeLensSettings,
) -> Vec<SolaCodeLens> {
    let Some(tree) = doc.tree() else {
        return Vec::new();
    };
    let mut lenses = Vec::new();
    if settings.tests && file_name(doc).is_some_and(|name| is_test_file(&name)) {
        test_lenses(doc, &mut lenses);
    }
    if settings.implementations {
        for interface in tree.interfaces() {
            let count = count_implementations(workspace, interface.name.as_str());
            let title = match count {
                1 => "1 implementation".to_string(),
                n => format!("{n} implementations"),
            };
            lenses.push(SolaCodeLens {
                range: interface.name.range,
                title,
                command: SHOW_IMPLEMENTATIONS_COMMAND.to_string(),
                arguments: vec![json!(doc.uri.as_str()), json!(interface.name.as_str())],
            });
        }
    }
    lenses
}

fn test_lenses(doc: &DocumentSnapshot, lenses: &mut Vec<SolaCodeLens>) {
    let Some(tree) = doc.tree() else {
        return;
    };
    let uri = doc.uri.as_str();
    let mut push_pair = |range: Range, scope: &str, arguments: Vec<Value>| {
        lenses.push(SolaCodeLens {
            range,
            title: format!("Run {scope}"),
            command: RUN_TESTS_COMMAND.to_string(),
            arguments: arguments.clone(),
        });
        lenses.push(SolaCodeLens {
            range,
            title: format!("Debug {scope}"),
            command: DEBUG_TESTS_COMMAND.to_string(),
            arguments,
        });
    };

    push_pair(
        Range::empty(Position::start()),
        "all tests",
        vec![json!(uri)],
    );
    for function in tree.functions() {
        if is_test_method(function.name.as_str()) {
            push_pair(
                function.name.range,
                "test",
                vec![json!(uri), Value::Null, json!(function.name.as_str())],
            );
        }
    }
    for_each_class_like(tree, &mut |class| {
        let ClassLike::Class(decl) = class else {
            return;
        };
        let class_name = decl.name.as_str();
        if !is_test_class(class_name) {
            return;
        }
        push_pair(decl.name.range, "tests", vec![json!(uri), json!(class_name)]);
        for method in class.methods() {
            if is_test_method(method.name.as_str()) {
                push_pair(
                    method.name.range,
                    "test",
                    vec![json!(uri), json!(class_name), json!(method.name.as_str())],
                );
            }
        }
    });
}

/// Classes that list `interface` in their `implements` clause, counted over at most
/// [`MAX_IMPLEMENTATION_SCAN`] files.
pub fn count_implementations(workspace: Workspace<'_>, interface: &str) -> usize {
    workspace
        .sources()
        .take(MAX_IMPLEMENTATION_SCAN)
        .map(|source| {
            source
                .symbols
                .class_signatures
                .values()
                .filter(|class| {
                    class
                        .implements
                        .iter()
                        .any(|name| strip_generics(name) == interface)
                })
                .count()
        })
        .sum()
}
