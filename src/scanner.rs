//! Walks configured roots and populates the registry using the naming
//! convention described in SPEC_FULL.md §4.4.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::{inflector::Inflector, registry::Kind, registry::Registry};

/// Default extension recognized as a source unit (configurable via
/// [`Scanner::with_unit_ext`]).
pub const DEFAULT_UNIT_EXT: &str = "unit";
/// Default initializer file stem that marks a directory as a package.
pub const DEFAULT_INIT_STEM: &str = "_init";

pub struct Scanner {
    roots: Vec<PathBuf>,
    ignore: Vec<String>,
    inflector: Inflector,
    unit_ext: String,
    init_stem: String,
    top_level: Option<String>,
}

impl Scanner {
    pub fn new(roots: Vec<PathBuf>, inflector: Inflector) -> Self {
        Self {
            roots,
            ignore: Vec::new(),
            inflector,
            unit_ext: DEFAULT_UNIT_EXT.to_string(),
            init_stem: DEFAULT_INIT_STEM.to_string(),
            top_level: None,
        }
    }

    pub fn with_ignore(mut self, patterns: Vec<String>) -> Self {
        self.ignore = patterns;
        self
    }

    pub fn with_unit_ext(mut self, ext: impl Into<String>) -> Self {
        self.unit_ext = ext.into();
        self
    }

    pub fn with_init_stem(mut self, stem: impl Into<String>) -> Self {
        self.init_stem = stem.into();
        self
    }

    pub fn with_top_level(mut self, name: impl Into<String>) -> Self {
        self.top_level = Some(name.into());
        self
    }

    /// Scans every configured root and populates `registry`. Idempotent:
    /// repeated scans converge to the same state (property 3 in §8).
    /// Permission/IO errors walking a directory are logged and the
    /// directory is skipped (§7 ScanFailure) rather than aborting the scan.
    pub fn scan(&self, registry: &Registry) {
        for root in &self.roots {
            if !root.is_dir() {
                warn!("scan root '{}' is not a directory, skipping", root.display());
                continue;
            }
            let top_name = self
                .top_level
                .clone()
                .unwrap_or_else(|| self.inflector.segment(&basename(root)));
            info!("scanning root '{}' as top-level '{}'", root.display(), top_name);
            self.register_root(root, &top_name, registry);
        }
    }

    /// Registers a configured root unconditionally: unlike an interior
    /// subdirectory, a root is always registered (as a package when it has
    /// an initializer, else as a namespace) regardless of whether it holds
    /// any recognized descendant (SPEC_FULL.md §4.4: "The scanner registers
    /// the top-level segment itself before descending").
    fn register_root(&self, dir: &Path, name: &str, registry: &Registry) {
        match self.initializer_path(dir) {
            Some(init_path) => registry.insert(name, Some(init_path), Kind::Package),
            None => registry.insert(name, Some(dir.to_path_buf()), Kind::Namespace),
        }
        self.recurse_into_children(dir, name, registry);
    }

    /// The unified recursive routine resolving the historical split between
    /// top-level and descendant handling (SPEC_FULL.md §9). Unlike a
    /// configured root, an interior subdirectory is skipped entirely when it
    /// has neither an initializer nor a recognized descendant.
    fn classify_and_recurse(&self, dir: &Path, name: &str, registry: &Registry) {
        let init_path = self.initializer_path(dir);
        if let Some(init_path) = init_path {
            registry.insert(name, Some(init_path), Kind::Package);
        } else if self.contains_recognized_descendant(dir) {
            registry.insert(name, Some(dir.to_path_buf()), Kind::Namespace);
        } else {
            debug!("'{}' has no initializer and no recognized descendants, skipping", dir.display());
            return;
        }
        self.recurse_into_children(dir, name, registry);
    }

    fn recurse_into_children(&self, dir: &Path, name: &str, registry: &Registry) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to read directory '{}': {}", dir.display(), err);
                return;
            }
        };

        let mut children: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| !self.should_ignore(p))
            .collect();
        children.sort();

        for path in children {
            if path.is_dir() {
                let segment = self.inflector.segment(&basename(&path));
                let child_name = format!("{name}.{segment}");
                self.classify_and_recurse(&path, &child_name, registry);
            } else if self.is_unit_file(&path) && !self.is_initializer(&path) {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                let segment = self.inflector.segment(&stem);
                let module_name = format!("{name}.{segment}");
                registry.insert(&module_name, Some(path), Kind::Module);
            }
        }
    }

    fn initializer_path(&self, dir: &Path) -> Option<PathBuf> {
        let candidate = dir.join(format!("{}.{}", self.init_stem, self.unit_ext));
        candidate.is_file().then_some(candidate)
    }

    fn is_initializer(&self, path: &Path) -> bool {
        path.file_stem()
            .map(|s| s == self.init_stem.as_str())
            .unwrap_or(false)
    }

    fn is_unit_file(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext == self.unit_ext.as_str())
            .unwrap_or(false)
    }

    /// A directory qualifies as a namespace iff it recursively contains at
    /// least one recognized source file, ignoring the same patterns the
    /// scanner would ignore during its own walk.
    fn contains_recognized_descendant(&self, dir: &Path) -> bool {
        WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| !self.should_ignore(e.path()))
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file() && self.is_unit_file(e.path()))
    }

    fn should_ignore(&self, path: &Path) -> bool {
        let name = basename(path);
        if name.starts_with('.') || name.starts_with("__") || name == "setup.py" {
            return true;
        }
        let path_str = path.to_string_lossy();
        self.ignore.iter().any(|pattern| path_str.contains(pattern.as_str()))
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
