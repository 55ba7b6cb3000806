//! Document analysis and navigation for Sola
//!
//! This crate provides the language intelligence behind the Sola language server:
//! symbol extraction, light type inference, diagnostics, completion and navigation.
//! Nothing here speaks the LSP wire protocol; positions are the 1-based
//! [`sola_syntax::Position`] and results are plain data that the server converts.
//!
//! # Architecture
//!
//! - `buffer`, `document`: text buffers and parsed snapshots of open files
//! - `symbols`: per-file declaration tables built from the syntax tree
//! - `visitor`, `utils`: tree traversal and lookup helpers shared by the features
//! - `workspace`, `workspace_index`: cross-file resolution over open and indexed files
//! - `inference`: expression and variable type inference
//! - `diagnostics`: parse errors, type checks and unused-name hints
//! - the remaining modules each implement one editor feature
//!
//! # Design Principles
//!
//! - **Snapshot based**: features read an immutable [`document::DocumentSnapshot`]
//! - **Reusable**: not tied to the LSP transport, usable by CLIs and tests alike
//! - **Tolerant**: every feature copes with partial trees from broken input
//!
//! # Usage
//!
//! ```rust,ignore
//! use sola_analysis::document::DocumentSnapshot;
//! use sola_analysis::{document_symbols, hover, workspace::Workspace};
//! use sola_syntax::{Position, SolaParser};
//!
//! let doc = DocumentSnapshot::from_text(uri, "class Greeter {}", &SolaParser);
//! let outline = doc.tree().map(document_symbols::collect_document_symbols);
//! let docs = [doc];
//! let info = hover::hover(&docs[0], Workspace::new(&docs, None), Position::new(1, 8));
//! ```

// Core
pub mod buffer;
pub mod document;
pub mod edits;
pub mod symbols;
pub mod utils;
pub mod visitor;
pub mod workspace;
pub mod workspace_index;

// Analysis
pub mod diagnostics;
pub mod inference;

// Editor features
pub mod call_hierarchy;
pub mod code_actions;
pub mod code_lens;
pub mod colors;
pub mod completion;
pub mod document_links;
pub mod document_symbols;
pub mod folding_ranges;
pub mod go_to_definition;
pub mod hover;
pub mod inlay_hints;
pub mod linked_editing;
pub mod references;
pub mod rename;
pub mod selection_ranges;
pub mod semantic_tokens;
pub mod signature_help;
pub mod type_hierarchy;

// Test support (available in tests and as dev-dependency)
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
