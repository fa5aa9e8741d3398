//! The module registry: an in-memory catalog of logical names with lifecycle
//! flags, file locations, and a bidirectional dependency graph.
//!
//! All query/mutation operations are serialized by a single lock held only
//! for the duration of one operation. The source system's re-entrant lock
//! (needed because a loader may call back into the registry while the host
//! re-enters the resolution hook mid-execution) is unnecessary here: no
//! method below holds the lock across a call back into caller code. See
//! DESIGN.md for the rationale.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::RwLock,
    time::SystemTime,
};

use crate::error::EngineError;

/// What kind of disk entity a registry entry was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A leaf source file.
    Module,
    /// A directory with an initializer file.
    Package,
    /// A directory without an initializer, holding recognized descendants.
    Namespace,
}

#[derive(Debug, Clone)]
struct Entry {
    path: Option<PathBuf>,
    kind: Kind,
    loaded: bool,
    mtime: Option<SystemTime>,
    deps: HashSet<String>,
    dependents: HashSet<String>,
}

impl Entry {
    fn new(path: Option<PathBuf>, kind: Kind) -> Self {
        Self {
            path,
            kind,
            loaded: false,
            mtime: None,
            deps: HashSet::new(),
            dependents: HashSet::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// Reverse index from an entry's path to its logical name, kept in sync
    /// with `entries` so the reload controller can map a filesystem event
    /// back to the name it affects without scanning the whole catalog.
    by_path: HashMap<PathBuf, String>,
}

/// Thread-safe associative store mapping logical names to registry entries.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registers `name`, replacing any prior entry of the same name while
    /// leaving its edges intact (duplicate inserts are not an error).
    pub fn insert(&self, name: &str, path: Option<PathBuf>, kind: Kind) {
        let mut inner = self.inner.write().unwrap();
        if let Some(old) = inner.entries.get(name) {
            if let Some(old_path) = &old.path {
                inner.by_path.remove(old_path);
            }
        }
        if let Some(p) = &path {
            inner.by_path.insert(p.clone(), name.to_string());
        }
        let (deps, dependents) = match inner.entries.get(name) {
            Some(old) => (old.deps.clone(), old.dependents.clone()),
            None => (HashSet::new(), HashSet::new()),
        };
        let mut entry = Entry::new(path, kind);
        entry.deps = deps;
        entry.dependents = dependents;
        inner.entries.insert(name.to_string(), entry);
    }

    /// Removes `name`, pruning every edge that referenced it so the graph
    /// stays mirrored (invariant 1 in the specification).
    pub fn remove(&self, name: &str) {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.entries.remove(name) else {
            return;
        };
        if let Some(path) = &entry.path {
            inner.by_path.remove(path);
        }
        for dep in &entry.deps {
            if let Some(dep_entry) = inner.entries.get_mut(dep) {
                dep_entry.dependents.remove(name);
            }
        }
        for dependent in &entry.dependents {
            if let Some(dependent_entry) = inner.entries.get_mut(dependent) {
                dependent_entry.deps.remove(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().unwrap().entries.contains_key(name)
    }

    pub fn path(&self, name: &str) -> Result<Option<PathBuf>, EngineError> {
        self.with_entry(name, |e| e.path.clone())
    }

    pub fn kind(&self, name: &str) -> Result<Kind, EngineError> {
        self.with_entry(name, |e| e.kind)
    }

    pub fn loaded(&self, name: &str) -> Result<bool, EngineError> {
        self.with_entry(name, |e| e.loaded)
    }

    pub fn mark_loaded(&self, name: &str, mtime: SystemTime) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .entries
            .get_mut(name)
            .ok_or_else(|| EngineError::unknown(name))?;
        entry.loaded = true;
        entry.mtime = Some(mtime);
        Ok(())
    }

    /// Marks `name` unloaded and clears its forward `deps` edges (mirroring
    /// them out of each dependency's `dependents` set), leaving the reverse
    /// graph (`dependents` of `name`) untouched so invalidation order remains
    /// computable until the next load reconstructs the forward edges.
    pub fn mark_unloaded(&self, name: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        let deps = {
            let entry = inner
                .entries
                .get_mut(name)
                .ok_or_else(|| EngineError::unknown(name))?;
            entry.loaded = false;
            entry.mtime = None;
            std::mem::take(&mut entry.deps)
        };
        for dep in deps {
            if let Some(dep_entry) = inner.entries.get_mut(&dep) {
                dep_entry.dependents.remove(name);
            }
        }
        Ok(())
    }

    pub fn mtime(&self, name: &str) -> Result<Option<SystemTime>, EngineError> {
        self.with_entry(name, |e| e.mtime)
    }

    /// Adds a mirrored edge `from -> to`. Both names must already be
    /// registered.
    pub fn add_edge(&self, from: &str, to: &str) -> Result<(), EngineError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.entries.contains_key(from) {
            return Err(EngineError::unknown(from));
        }
        if !inner.entries.contains_key(to) {
            return Err(EngineError::unknown(to));
        }
        inner
            .entries
            .get_mut(from)
            .unwrap()
            .deps
            .insert(to.to_string());
        inner
            .entries
            .get_mut(to)
            .unwrap()
            .dependents
            .insert(from.to_string());
        Ok(())
    }

    pub fn deps(&self, name: &str) -> Result<HashSet<String>, EngineError> {
        self.with_entry(name, |e| e.deps.clone())
    }

    pub fn dependents(&self, name: &str) -> Result<HashSet<String>, EngineError> {
        self.with_entry(name, |e| e.dependents.clone())
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.read().unwrap().entries.keys().cloned().collect()
    }

    /// Looks up the logical name registered for an exact filesystem path, if
    /// any. Used by the reload controller to map a watcher event to a name.
    pub fn name_for_path(&self, path: &Path) -> Option<String> {
        self.inner.read().unwrap().by_path.get(path).cloned()
    }

    fn with_entry<T>(&self, name: &str, f: impl FnOnce(&Entry) -> T) -> Result<T, EngineError> {
        let inner = self.inner.read().unwrap();
        inner
            .entries
            .get(name)
            .map(f)
            .ok_or_else(|| EngineError::unknown(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_query() {
        let reg = Registry::new();
        reg.insert("app", Some(PathBuf::from("/tmp/app/__init__")), Kind::Package);
        assert!(reg.contains("app"));
        assert_eq!(reg.kind("app").unwrap(), Kind::Package);
        assert!(!reg.loaded("app").unwrap());
    }

    #[test]
    fn unknown_name_errors() {
        let reg = Registry::new();
        assert!(matches!(reg.kind("nope"), Err(EngineError::UnknownName(_))));
    }

    #[test]
    fn duplicate_insert_replaces_but_keeps_edges() {
        let reg = Registry::new();
        reg.insert("a", None, Kind::Namespace);
        reg.insert("b", None, Kind::Module);
        reg.add_edge("b", "a").unwrap();

        reg.insert("a", Some(PathBuf::from("/x")), Kind::Package);
        assert_eq!(reg.kind("a").unwrap(), Kind::Package);
        assert!(reg.dependents("a").unwrap().contains("b"));
        assert!(reg.deps("b").unwrap().contains("a"));
    }

    #[test]
    fn edges_are_always_mirrored() {
        let reg = Registry::new();
        reg.insert("a", None, Kind::Module);
        reg.insert("b", None, Kind::Module);
        reg.add_edge("a", "b").unwrap();
        assert!(reg.deps("a").unwrap().contains("b"));
        assert!(reg.dependents("b").unwrap().contains("a"));
    }

    #[test]
    fn remove_prunes_incident_edges_both_directions() {
        let reg = Registry::new();
        reg.insert("a", None, Kind::Module);
        reg.insert("b", None, Kind::Module);
        reg.insert("c", None, Kind::Module);
        reg.add_edge("a", "b").unwrap();
        reg.add_edge("c", "a").unwrap();

        reg.remove("a");

        assert!(!reg.contains("a"));
        assert!(!reg.dependents("b").unwrap().contains("a"));
        assert!(!reg.deps("c").unwrap().contains("a"));
    }

    #[test]
    fn mark_unloaded_clears_forward_edges_but_keeps_dependents() {
        let reg = Registry::new();
        reg.insert("a", None, Kind::Module);
        reg.insert("b", None, Kind::Module);
        reg.add_edge("a", "b").unwrap();

        reg.mark_unloaded("a").unwrap();

        assert!(reg.deps("a").unwrap().is_empty());
        // b's dependents still mention a: reverse graph survives until a's
        // next load rebuilds the forward edge.
        assert!(reg.dependents("b").unwrap().contains("a"));
    }

    #[test]
    fn injective_paths_second_insert_wins() {
        let reg = Registry::new();
        let path = PathBuf::from("/tmp/shared.unit");
        reg.insert("old_name", Some(path.clone()), Kind::Module);
        reg.insert("new_name", Some(path.clone()), Kind::Module);

        assert_eq!(reg.name_for_path(&path), Some("new_name".to_string()));
    }

    #[test]
    fn mark_loaded_round_trips_mtime() {
        let reg = Registry::new();
        reg.insert("a", None, Kind::Module);
        let now = SystemTime::now();
        reg.mark_loaded("a", now).unwrap();
        assert!(reg.loaded("a").unwrap());
        assert_eq!(reg.mtime("a").unwrap(), Some(now));

        reg.mark_unloaded("a").unwrap();
        assert!(!reg.loaded("a").unwrap());
        assert_eq!(reg.mtime("a").unwrap(), None);
    }
}
