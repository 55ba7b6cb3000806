//! Signature help for the call surrounding the cursor.

use crate::document::DocumentSnapshot;
use crate::inference::{access_before, builtin_signature, Access, Inference};
use crate::symbols::{strip_generics, FunctionSignature};
use crate::workspace::Workspace;
use sola_syntax::Position;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub label: String,
    pub parameters: Vec<String>,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHelpResult {
    pub signatures: Vec<SignatureInfo>,
    pub active_signature: u32,
    pub active_parameter: u32,
}

/// An unclosed `(` in the text before the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenCall {
    /// Byte offset of the `(`.
    paren: usize,
    /// Top-level commas between the `(` and the cursor.
    commas: usize,
}

pub fn signature_help(
    doc: &DocumentSnapshot,
    workspace: Workspace<'_>,
    position: Position,
) -> Option<SignatureHelpResult> {
    let inference = Inference::for_document(doc, workspace)?;
    let prefix = doc.buffer.line_prefix(position);
    let call = open_call(prefix)?;
    let callee_text = prefix[..call.paren].trim_end();
    let name_start = callee_text
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(idx, _)| idx)?;
    let name = &callee_text[name_start..];
    let before = &callee_text[..name_start];

    let info = resolve_callee(&inference, before, name, position)?;
    let count = info.parameters.len();
    let variadic = info
        .parameters
        .last()
        .is_some_and(|param| param.starts_with("..."));
    let active = match count {
        0 => 0,
        _ if call.commas >= count && variadic => count - 1,
        _ => call.commas.min(count),
    };
    Some(SignatureHelpResult {
        signatures: vec![info],
        active_signature: 0,
        active_parameter: active as u32,
    })
}

fn resolve_callee(
    inference: &Inference<'_>,
    before: &str,
    name: &str,
    position: Position,
) -> Option<SignatureInfo> {
    let workspace = inference.workspace();
    let current = inference.current();

    if let Some(access) = access_before(before) {
        let class = match access {
            Access::Instance(receiver) => inference
                .chain_type(receiver, position)
                .map(|ty| strip_generics(&ty).to_string())?,
            Access::Static(class) => inference.resolve_special(class, position),
        };
        let (_, method) = workspace.find_method(&class, name, None, current)?;
        return Some(from_signature(&method.signature));
    }

    if before.trim_end().ends_with("new") {
        let class = inference.resolve_special(name, position);
        return match workspace.find_method(&class, "__construct", None, current) {
            Some((_, ctor)) => {
                let mut info = from_signature(&ctor.signature);
                info.label = format!("{class}({})", info.parameters.join(", "));
                Some(info)
            }
            None => Some(SignatureInfo {
                label: format!("{class}()"),
                parameters: Vec::new(),
                documentation: None,
            }),
        };
    }

    if let Some((params, ret)) = builtin_signature(name) {
        return Some(SignatureInfo {
            label: format!("{name}({}): {ret}", params.join(", ")),
            parameters: params.iter().map(|param| param.to_string()).collect(),
            documentation: None,
        });
    }
    let resolved = workspace.find_declaration(name, current)?;
    let function = resolved.source.symbols.get_function(name)?;
    Some(from_signature(function))
}

fn from_signature(signature: &FunctionSignature) -> SignatureInfo {
    SignatureInfo {
        label: signature.label(),
        parameters: signature.parameter_labels(),
        documentation: signature.doc.clone(),
    }
}

/// The innermost call still open at the end of `prefix`. String literals are skipped
/// and commas inside nested brackets are not counted.
fn open_call(prefix: &str) -> Option<OpenCall> {
    // Every open bracket with its comma count; only `(` entries are calls.
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in prefix.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => stack.push((c, idx, 0)),
            ')' | ']' | '}' => {
                stack.pop();
            }
            ',' => {
                if let Some(top) = stack.last_mut() {
                    top.2 += 1;
                }
            }
            _ => {}
        }
    }
    stack
        .iter()
        .rev()
        .find(|(c, _, _)| *c == '(')
        .map(|(_, paren, commas)| OpenCall {
            paren: *paren,
            commas: *commas,
        })
}
