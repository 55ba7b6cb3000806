//! Index of the Sola sources under the workspace root and the standard library.
//!
//! Files are discovered with an `ignore` walk, parsed once and cached by modification
//! time. The index keeps a name to file map of every top-level declaration so
//! cross-file navigation does not have to scan every tree.
//!
//! Reading and parsing are split from insertion ([`WorkspaceIndex::read_source`],
//! [`WorkspaceIndex::prepare`], [`WorkspaceIndex::insert`]) so a caller holding the index
//! behind a lock only needs exclusive access for the final, cheap step.

use crate::symbols::SymbolTable;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use lsp_types::Url;
use sola_syntax::ast::UseDecl;
use sola_syntax::{ParseError, SourceParser, Tree};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

pub const SOURCE_EXTENSION: &str = "sola";

/// Files above this size are skipped unless configured otherwise.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 512 * 1024;

const SKIPPED_DIRECTORIES: &[&str] = &["node_modules", "vendor"];

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a Sola source file")]
    NotSource { path: PathBuf },
    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
}

/// Maps a dotted import path to a file.
pub trait ImportResolver: Send + Sync {
    fn resolve(&self, dotted: &str) -> Option<PathBuf>;
}

/// Looks for `a/b/C.sola` under the project root and under its `src/` directory.
#[derive(Debug, Clone)]
pub struct ProjectImportResolver {
    roots: Vec<PathBuf>,
}

impl ProjectImportResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let src = root.join("src");
        Self {
            roots: vec![root, src],
        }
    }
}

impl ImportResolver for ProjectImportResolver {
    fn resolve(&self, dotted: &str) -> Option<PathBuf> {
        let relative = dotted_to_path(dotted)?;
        self.roots
            .iter()
            .map(|root| root.join(&relative))
            .find(|candidate| candidate.is_file())
    }
}

fn dotted_to_path(dotted: &str) -> Option<PathBuf> {
    if dotted.is_empty() || dotted.split('.').any(str::is_empty) {
        return None;
    }
    let mut path: PathBuf = dotted.split('.').collect();
    path.set_extension(SOURCE_EXTENSION);
    Some(path)
}

/// Where a `use "relative/file"` import points, whether or not the file exists.
pub fn file_import_candidate(importing: &Path, target: &str) -> Option<PathBuf> {
    let base = importing.parent()?;
    let mut candidate = normalize_lexically(&base.join(target));
    if candidate.extension().is_none() {
        candidate.set_extension(SOURCE_EXTENSION);
    }
    Some(candidate)
}

/// Resolves `.` and `..` components without touching the filesystem. A `..` above the
/// root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normal = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normal.components().next_back() {
                Some(Component::Normal(_)) => {
                    normal.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normal.push(".."),
            },
            other => normal.push(other.as_os_str()),
        }
    }
    normal
}

/// Resolves a `use "relative/file"` import against the importing file's directory.
pub fn resolve_file_import(importing: &Path, target: &str) -> Option<PathBuf> {
    file_import_candidate(importing, target).filter(|candidate| candidate.is_file())
}

pub fn is_source_path(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(SOURCE_EXTENSION)
}

/// Every `.sola` file below `dir`, sorted. Hidden directories, `node_modules` and
/// `vendor` are skipped, as is anything matching one of `excludes` (gitignore-style
/// globs relative to `dir`).
pub fn discover_sources(dir: &Path, excludes: &[String]) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(dir);
    builder
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(name.starts_with('.') || SKIPPED_DIRECTORIES.contains(&name.as_ref()))
        });

    if !excludes.is_empty() {
        let mut overrides = OverrideBuilder::new(dir);
        for pattern in excludes {
            if let Err(err) = overrides.add(&format!("!{pattern}")) {
                tracing::warn!(pattern = %pattern, error = %err, "ignoring invalid exclude pattern");
            }
        }
        match overrides.build() {
            Ok(overrides) => {
                builder.overrides(overrides);
            }
            Err(err) => tracing::warn!(error = %err, "failed to build exclude patterns"),
        }
    }

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| is_source_path(path))
        .collect();
    files.sort();
    files
}

/// Where to look for source files.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub std_lib_dir: Option<PathBuf>,
    pub root: Option<PathBuf>,
}

impl Discovery {
    pub fn run(&self, excludes: &[String]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(std_lib) = &self.std_lib_dir {
            paths.extend(discover_sources(std_lib, &[]));
        }
        if let Some(root) = &self.root {
            for path in discover_sources(root, excludes) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }
}

/// Raw contents of a file about to be indexed.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
    pub modified: Option<SystemTime>,
}

/// A parsed file held by the index.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub uri: Url,
    pub tree: Arc<Tree>,
    pub symbols: Arc<SymbolTable>,
    pub parse_errors: Vec<ParseError>,
    pub modified: Option<SystemTime>,
}

pub struct WorkspaceIndex {
    root: Option<PathBuf>,
    std_lib_dir: Option<PathBuf>,
    resolver: Option<Box<dyn ImportResolver>>,
    max_file_size: u64,
    files: HashMap<PathBuf, IndexedFile>,
    symbol_locations: HashMap<String, PathBuf>,
}

impl Default for WorkspaceIndex {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WorkspaceIndex {
    pub fn new(root: Option<PathBuf>) -> Self {
        let resolver = root
            .clone()
            .map(|root| Box::new(ProjectImportResolver::new(root)) as Box<dyn ImportResolver>);
        Self {
            root,
            std_lib_dir: None,
            resolver,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            files: HashMap::new(),
            symbol_locations: HashMap::new(),
        }
    }

    pub fn with_std_lib(mut self, dir: Option<PathBuf>) -> Self {
        self.std_lib_dir = dir;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn ImportResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = limit;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn std_lib_dir(&self) -> Option<&Path> {
        self.std_lib_dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Standard library files first, then the workspace.
    pub fn discover(&self, excludes: &[String]) -> Vec<PathBuf> {
        self.discovery().run(excludes)
    }

    /// The directories [`discover`](Self::discover) walks, detached from the index so the
    /// walk can happen without holding a lock on it.
    pub fn discovery(&self) -> Discovery {
        Discovery {
            std_lib_dir: self.std_lib_dir.clone(),
            root: self.root.clone(),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// True for source files that are indexed or live under one of the indexed directories.
    pub fn covers(&self, path: &Path) -> bool {
        if self.files.contains_key(path) {
            return true;
        }
        is_source_path(path)
            && [self.root.as_deref(), self.std_lib_dir.as_deref()]
                .into_iter()
                .flatten()
                .any(|dir| path.starts_with(dir))
    }

    /// True when `path` is unknown or its modification time moved since it was indexed.
    pub fn needs_refresh(&self, path: &Path, modified: Option<SystemTime>) -> bool {
        match self.files.get(path) {
            Some(file) => modified.is_none() || file.modified != modified,
            None => true,
        }
    }

    /// Reads `path` from disk, enforcing the extension and size limits.
    pub fn read_source(&self, path: &Path) -> Result<SourceFile, IndexError> {
        read_source(path, self.max_file_size)
    }

    /// Parses a source file. Needs no access to the index.
    pub fn prepare(source: SourceFile, parser: &dyn SourceParser) -> Result<IndexedFile, IndexError> {
        let uri = Url::from_file_path(&source.path).map_err(|_| IndexError::NotSource {
            path: source.path.clone(),
        })?;
        let filename = source
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (tree, parse_errors) = parser.parse(&source.text, &filename);
        let symbols = SymbolTable::build(&tree);
        Ok(IndexedFile {
            path: source.path,
            uri,
            tree: Arc::new(tree),
            symbols: Arc::new(symbols),
            parse_errors,
            modified: source.modified,
        })
    }

    /// Stores a parsed file, replacing any previous version, and refreshes the name map.
    pub fn insert(&mut self, file: IndexedFile) {
        let path = file.path.clone();
        let names: Vec<String> = file
            .symbols
            .declared_names()
            .map(|(name, _)| name.to_string())
            .collect();
        if let Some(previous) = self.files.insert(path.clone(), file) {
            self.forget_stale_names(&path, &previous);
        }
        for name in names {
            self.symbol_locations.insert(name, path.clone());
        }
    }

    /// Reads, parses and stores `path` unless the cached copy is current.
    pub fn index_file(&mut self, path: &Path, parser: &dyn SourceParser) -> Result<&IndexedFile, IndexError> {
        let modified = fs::metadata(path)
            .map_err(|source| IndexError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .modified()
            .ok();
        if self.needs_refresh(path, modified) {
            let source = self.read_source(path)?;
            let file = Self::prepare(source, parser)?;
            self.insert(file);
        }
        self.files.get(path).ok_or_else(|| IndexError::NotSource {
            path: path.to_path_buf(),
        })
    }

    pub fn remove(&mut self, path: &Path) -> Option<IndexedFile> {
        let removed = self.files.remove(path)?;
        self.forget_stale_names(path, &removed);
        Some(removed)
    }

    /// Drops map entries pointing at `path` for names `previous` declared that the current
    /// entry no longer does, and re-points them at another file that still declares them.
    fn forget_stale_names(&mut self, path: &Path, previous: &IndexedFile) {
        let current = self.files.get(path);
        let stale: Vec<String> = previous
            .symbols
            .declared_names()
            .map(|(name, _)| name.to_string())
            .filter(|name| {
                self.symbol_locations
                    .get(name)
                    .is_some_and(|location| location.as_path() == path)
                    && !current.is_some_and(|file| file.symbols.declares(name))
            })
            .collect();
        for name in stale {
            self.symbol_locations.remove(&name);
            if let Some(other) = self
                .files
                .values()
                .find(|file| file.symbols.declares(&name))
            {
                self.symbol_locations.insert(name, other.path.clone());
            }
        }
    }

    pub fn file(&self, path: &Path) -> Option<&IndexedFile> {
        self.files.get(path)
    }

    pub fn file_by_uri(&self, uri: &Url) -> Option<&IndexedFile> {
        let path = uri.to_file_path().ok()?;
        self.files.get(&path)
    }

    /// Indexed files in path order.
    pub fn files(&self) -> impl Iterator<Item = &IndexedFile> {
        let mut files: Vec<&IndexedFile> = self.files.values().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.into_iter()
    }

    pub fn symbol_locations(&self) -> &HashMap<String, PathBuf> {
        &self.symbol_locations
    }

    /// The indexed file declaring the top-level name `name`.
    pub fn location_of(&self, name: &str) -> Option<&IndexedFile> {
        let path = self.symbol_locations.get(name)?;
        self.files.get(path)
    }

    /// Resolves a dotted import to an absolute path, trying the project first and the
    /// standard library second.
    pub fn resolve_import(&self, dotted: &str) -> Option<PathBuf> {
        if let Some(found) = self
            .resolver
            .as_ref()
            .and_then(|resolver| resolver.resolve(dotted))
        {
            return Some(found);
        }
        let std_lib = self.std_lib_dir.as_ref()?;
        let candidate = std_lib.join(dotted_to_path(dotted)?);
        candidate.is_file().then_some(candidate)
    }

    /// Resolves either import form declared in `importing`.
    pub fn resolve_use(&self, decl: &UseDecl, importing: Option<&Path>) -> Option<PathBuf> {
        if decl.is_file {
            return resolve_file_import(importing?, &decl.path);
        }
        self.resolve_import(&decl.path)
    }
}

/// Reads a source file with the same checks the index applies.
pub fn read_source(path: &Path, max_file_size: u64) -> Result<SourceFile, IndexError> {
    if !is_source_path(path) {
        return Err(IndexError::NotSource {
            path: path.to_path_buf(),
        });
    }
    let io_error = |source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };
    let metadata = fs::metadata(path).map_err(io_error)?;
    if metadata.len() > max_file_size {
        return Err(IndexError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_file_size,
        });
    }
    let text = fs::read_to_string(path).map_err(io_error)?;
    Ok(SourceFile {
        path: path.to_path_buf(),
        text,
        modified: metadata.modified().ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sola_syntax::SolaParser;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, text: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn discovery_skips_hidden_and_vendored_directories() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/app.sola", "class App {}");
        write(dir.path(), "lib/util.sola", "function util() {}");
        write(dir.path(), ".git/hooks.sola", "");
        write(dir.path(), "node_modules/pkg/x.sola", "");
        write(dir.path(), "vendor/y.sola", "");
        write(dir.path(), "notes.txt", "");
        write(dir.path(), "build/gen.sola", "");

        let found = discover_sources(dir.path(), &["build/**".to_string()]);
        let names: Vec<_> = found
            .iter()
            .map(|path| path.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![PathBuf::from("lib/util.sola"), PathBuf::from("src/app.sola")]
        );
    }

    #[test]
    fn indexes_files_and_tracks_declaration_locations() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.sola", "class A {}\nfunction helper() {}");
        let b = write(dir.path(), "b.sola", "interface Shape {}");
        let mut index = WorkspaceIndex::new(Some(dir.path().to_path_buf()));
        for path in index.discover(&[]) {
            index.index_file(&path, &SolaParser).unwrap();
        }
        assert_eq!(index.len(), 2);
        assert_eq!(index.symbol_locations().get("A"), Some(&a));
        assert_eq!(index.symbol_locations().get("helper"), Some(&a));
        assert_eq!(index.location_of("Shape").map(|f| f.path.clone()), Some(b.clone()));

        index.remove(&b);
        assert!(index.location_of("Shape").is_none());
    }

    #[test]
    fn reindexing_drops_names_that_disappeared() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.sola", "class A {}\nclass Gone {}");
        let mut index = WorkspaceIndex::new(Some(dir.path().to_path_buf()));
        index.index_file(&a, &SolaParser).unwrap();
        assert!(index.location_of("Gone").is_some());

        let file = WorkspaceIndex::prepare(
            SourceFile {
                path: a.clone(),
                text: "class A {}".into(),
                modified: None,
            },
            &SolaParser,
        )
        .unwrap();
        index.insert(file);
        assert!(index.location_of("Gone").is_none());
        assert!(index.location_of("A").is_some());
    }

    #[test]
    fn covers_sources_under_the_root_and_std_lib() {
        let project = tempdir().unwrap();
        let std_lib = tempdir().unwrap();
        let index = WorkspaceIndex::new(Some(project.path().to_path_buf()))
            .with_std_lib(Some(std_lib.path().to_path_buf()));
        assert!(index.covers(&project.path().join("src/app.sola")));
        assert!(index.covers(&std_lib.path().join("sola/List.sola")));
        assert!(!index.covers(&project.path().join("README.md")));
        assert!(!index.covers(Path::new("/elsewhere/app.sola")));
    }

    #[test]
    fn removing_a_file_repoints_names_declared_elsewhere() {
        let dir = tempdir().unwrap();
        let first = write(dir.path(), "a.sola", "class Shared {}\nclass OnlyA {}");
        let second = write(dir.path(), "b.sola", "class Shared {}");
        let mut index = WorkspaceIndex::new(Some(dir.path().to_path_buf()));
        index.index_file(&second, &SolaParser).unwrap();
        index.index_file(&first, &SolaParser).unwrap();
        assert_eq!(index.symbol_locations().get("Shared"), Some(&first));

        index.remove(&first);
        assert_eq!(index.symbol_locations().get("Shared"), Some(&second));
        assert!(index.symbol_locations().get("OnlyA").is_none());
        assert_eq!(index.symbol_locations().len(), 1);
    }

    #[test]
    fn unchanged_files_are_served_from_cache() {
        let dir = tempdir().unwrap();
        let a = write(dir.path(), "a.sola", "class A {}");
        let mut index = WorkspaceIndex::new(Some(dir.path().to_path_buf()));
        let first = index.index_file(&a, &SolaParser).unwrap().tree.clone();
        let second = index.index_file(&a, &SolaParser).unwrap().tree.clone();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn rejects_large_and_foreign_files() {
        let dir = tempdir().unwrap();
        let big = write(dir.path(), "big.sola", &"x".repeat(64));
        let txt = write(dir.path(), "readme.md", "hi");
        let mut index = WorkspaceIndex::new(None).with_max_file_size(16);
        assert!(matches!(
            index.index_file(&big, &SolaParser),
            Err(IndexError::TooLarge { size: 64, .. })
        ));
        assert!(matches!(
            index.index_file(&txt, &SolaParser),
            Err(IndexError::NotSource { .. })
        ));
    }

    #[test]
    fn resolves_imports_from_project_and_std_lib() {
        let project = tempdir().unwrap();
        let std_lib = tempdir().unwrap();
        let model = write(project.path(), "src/app/Model.sola", "class Model {}");
        let list = write(std_lib.path(), "sola/collections/List.sola", "class List {}");
        let helpers = write(project.path(), "src/app/helpers.sola", "");

        let index = WorkspaceIndex::new(Some(project.path().to_path_buf()))
            .with_std_lib(Some(std_lib.path().to_path_buf()));
        assert_eq!(index.resolve_import("app.Model"), Some(model.clone()));
        assert_eq!(index.resolve_import("sola.collections.List"), Some(list));
        assert_eq!(index.resolve_import("missing.Thing"), None);
        assert_eq!(index.resolve_import(""), None);
        assert_eq!(resolve_file_import(&model, "helpers"), Some(helpers));
    }

    #[test]
    fn parent_relative_imports_are_normalized() {
        let dir = tempdir().unwrap();
        let main = write(dir.path(), "app/main.sola", "use \"../models/user\"");
        let user = write(dir.path(), "models/user.sola", "class User {}");

        assert_eq!(
            file_import_candidate(&main, "../models/user"),
            Some(dir.path().join("models/user.sola"))
        );
        assert_eq!(file_import_candidate(&main, "./../models/./user"), Some(user.clone()));
        assert_eq!(resolve_file_import(&main, "../models/user"), Some(user));
    }

    #[test]
    fn lexical_normalization_keeps_leading_parents_and_stops_at_root() {
        assert_eq!(normalize_lexically(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_lexically(Path::new("../x/../../y")), PathBuf::from("../../y"));
        assert_eq!(normalize_lexically(Path::new("/a/../../b")), PathBuf::from("/b"));
    }
}
