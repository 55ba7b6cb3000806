//! Language Server Protocol (LSP) implementation for Sola
//!
//! This crate provides language server capabilities for Sola source files, enabling rich
//! editor support in any LSP-compatible editor (VSCode, Neovim, Emacs, Sublime, etc.).
//!
//! Feature Set
//!
//! Document sync:
//!     - Incremental didChange with in-order range edits, didSave with text
//!     - Diagnostics published on open, change, save and settings change
//!
//! Navigation:
//!     - Hover, go to definition, references and document highlights
//!     - Document and workspace symbols
//!     - Call hierarchy and type hierarchy
//!     - Document links for `use` paths
//!
//! Editing:
//!     - Completion with resolve, signature help
//!     - Rename with prepare, linked editing of variables
//!     - Code actions: quick fixes, extract refactorings, organize imports
//!     - Formatting and range formatting through the pluggable formatter
//!
//! Presentation:
//!     - Semantic tokens (full and range), folding and selection ranges
//!     - Inlay hints, code lenses, document colors
//!
//! Architecture
//!
//! LSP Layer (tower-lsp):
//!     - JSON-RPC framing, lifecycle and request routing
//!
//! Server Layer (this crate):
//!     - `server`: implements `LanguageServer`, converts between wire and analysis types
//!     - `store`: open documents and their incremental edits
//!     - `indexer` and `progress`: background workspace indexing with work-done progress
//!     - `config`: the `sola` settings section
//!     - `toolchain`: the parser, type checker, formatter and import resolver in use
//!
//! Feature Layer (sola-analysis):
//!     - Every editor feature over 1-based positions, independent of the wire protocol
//!
//! Robustness
//!
//! No request handler panics on bad input. Unknown documents give empty results, broken
//! source still gets best-effort answers from the partial tree, invalid settings are
//! reported and ignored.
//!
//! Usage
//!
//! ```rust,ignore
//! use sola_lsp::SolaLanguageServer;
//! use tower_lsp::{LspService, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let stdin = tokio::io::stdin();
//!     let stdout = tokio::io::stdout();
//!
//!     let (service, socket) = LspService::new(SolaLanguageServer::new);
//!     Server::new(stdin, stdout, socket).serve(service).await;
//! }
//! ```

pub mod config;
pub mod convert;
pub mod features;
pub mod indexer;
pub mod progress;
pub mod server;
pub mod store;
pub mod toolchain;

#[cfg(test)]
mod test_client;

pub use server::SolaLanguageServer;
