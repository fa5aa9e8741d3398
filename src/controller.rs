//! Reload controller: maps filesystem events to logical names and
//! invalidates (or unregisters) units in dependency order (§4.8).

use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, Mutex},
};

use log::{info, warn};

use crate::{
    host::HostRuntime,
    registry::Registry,
    scanner::Scanner,
};

/// A normalized filesystem event, as delivered by the watcher adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: std::path::PathBuf,
}

type ReloadCallback = Box<dyn Fn(&str) + Send + Sync>;

pub struct ReloadController {
    registry: Arc<Registry>,
    host: Arc<dyn HostRuntime>,
    scanner: Scanner,
    callback: Mutex<Option<ReloadCallback>>,
}

impl ReloadController {
    pub fn new(registry: Arc<Registry>, host: Arc<dyn HostRuntime>, scanner: Scanner) -> Self {
        Self {
            registry,
            host,
            scanner,
            callback: Mutex::new(None),
        }
    }

    pub fn set_callback(&self, callback: ReloadCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    /// Invalidates `name` and every transitive dependent, consumers before
    /// producers, so that by the time a producer is reset, nothing still
    /// references its old forward edges.
    pub fn invalidate(&self, name: &str) {
        if !self.registry.contains(name) {
            return;
        }
        let order = self.post_order_dependents(name);
        for affected in &order {
            self.host.drop_unit(affected);
            if let Err(err) = self.registry.mark_unloaded(affected) {
                warn!("invalidate: {err}");
                continue;
            }
            info!("invalidated '{}'", affected);
            if let Some(cb) = self.callback.lock().unwrap().as_ref() {
                cb(affected);
            }
        }
    }

    /// For every loaded entry whose on-disk mtime now exceeds its stored
    /// mtime, invalidates it.
    pub fn reload_changed(&self) {
        for name in self.registry.names() {
            let Ok(true) = self.registry.loaded(&name) else {
                continue;
            };
            let Ok(Some(path)) = self.registry.path(&name) else {
                continue;
            };
            let current_mtime = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(err) => {
                    warn!("reload_changed: failed to stat '{}': {}", path.display(), err);
                    continue;
                }
            };
            if let Ok(Some(stored_mtime)) = self.registry.mtime(&name) {
                if current_mtime > stored_mtime {
                    self.invalidate(&name);
                }
            }
        }
    }

    /// Handles one normalized filesystem event: maps the path to a logical
    /// name (when one is already registered for it), and invalidates or
    /// unregisters as appropriate. `Created` events trigger a rescan, since
    /// a brand-new file or directory isn't registered under any name yet;
    /// rescans are idempotent (§8 property 3), so this is safe to call on
    /// every creation event rather than only reasoning about the one path.
    pub fn handle_event(&self, event: &FsEvent) {
        match event.kind {
            FsEventKind::Created => {
                info!("path created: '{}', rescanning", event.path.display());
                self.scanner.scan(&self.registry);
            }
            FsEventKind::Modified => {
                if let Some(name) = self.registry.name_for_path(&event.path) {
                    info!("path modified: '{}' -> invalidating '{}'", event.path.display(), name);
                    self.invalidate(&name);
                } else {
                    warn!("modified path '{}' has no registered name", event.path.display());
                }
            }
            FsEventKind::Deleted => {
                if let Some(name) = self.registry.name_for_path(&event.path) {
                    info!("path deleted: '{}' -> unregistering '{}'", event.path.display(), name);
                    self.invalidate(&name);
                    self.registry.remove(&name);
                } else {
                    warn!("deleted path '{}' has no registered name", event.path.display());
                }
            }
        }
    }

    /// DFS from `name` over `dependents`, pushing each visited node after
    /// its children (a dependent is pushed only once its own dependents are
    /// already in the list), so the result lists consumers before the
    /// producers they consume. Cycle-safe via the visited-set guard.
    fn post_order_dependents(&self, name: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit(name, &mut visited, &mut order);
        order
    }

    fn visit(&self, name: &str, visited: &mut HashSet<String>, order: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        if let Ok(dependents) = self.registry.dependents(name) {
            let mut dependents: Vec<_> = dependents.into_iter().collect();
            dependents.sort();
            for dependent in dependents {
                self.visit(&dependent, visited, order);
            }
        }
        order.push(name.to_string());
    }
}
