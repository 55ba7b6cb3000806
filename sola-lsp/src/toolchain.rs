//! The collaborators the server delegates to.
//!
//! Parsing, type checking, formatting and import resolution all live behind traits so a
//! server can be assembled with doubles in tests or with a different toolchain.

use crate::features::formatting::{Formatter, IndentFormatter};
use sola_analysis::diagnostics::{BasicTypeChecker, TypeChecker};
use sola_analysis::workspace_index::{ImportResolver, ProjectImportResolver};
use sola_syntax::{SolaParser, SourceParser};
use std::path::Path;

pub trait Toolchain: Send + Sync + 'static {
    fn parser(&self) -> &dyn SourceParser;
    fn type_checker(&self) -> &dyn TypeChecker;
    fn formatter(&self) -> &dyn Formatter;
    /// Resolver for dotted imports under `root`. `None` leaves dotted imports to the
    /// index's own lookups.
    fn import_resolver(&self, root: &Path) -> Option<Box<dyn ImportResolver>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultToolchain {
    parser: SolaParser,
    checker: BasicTypeChecker,
    formatter: IndentFormatter,
}

impl DefaultToolchain {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Toolchain for DefaultToolchain {
    fn parser(&self) -> &dyn SourceParser {
        &self.parser
    }

    fn type_checker(&self) -> &dyn TypeChecker {
        &self.checker
    }

    fn formatter(&self) -> &dyn Formatter {
        &self.formatter
    }

    fn import_resolver(&self, root: &Path) -> Option<Box<dyn ImportResolver>> {
        Some(Box::new(ProjectImportResolver::new(root)))
    }
}
