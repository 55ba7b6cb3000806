// LSP-side features that are not plain analysis queries
pub mod formatting;
