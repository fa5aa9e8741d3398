//! Engine facade: wires inflector, registry, scanner, hook, loader,
//! controller, and watcher together and exposes the public configure /
//! setup / eager-load / reload operations (§4.9).

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use log::{error, info};

use crate::{
    controller::ReloadController,
    error::EngineError,
    host::{HostRuntime, NameResolver},
    hook::ResolutionHook,
    inflector::Inflector,
    loader::Loader,
    registry::{Kind, Registry},
    scanner::{Scanner, DEFAULT_INIT_STEM, DEFAULT_UNIT_EXT},
    watcher::WatcherAdapter,
};

/// Pre-setup configuration, gathered before [`Engine::setup`] is called.
#[derive(Default)]
pub struct EngineConfig {
    pub roots: Vec<PathBuf>,
    pub top_level: Option<String>,
    pub ignore: Vec<String>,
    pub inflector_overrides: Vec<(String, String)>,
    pub unit_ext: Option<String>,
    pub init_stem: Option<String>,
    pub debounce_ms: Option<u64>,
}

pub struct Engine {
    config: EngineConfig,
    host: Arc<dyn HostRuntime>,
    registry: Arc<Registry>,
    hook_installed: Mutex<bool>,
    watcher: Mutex<Option<WatcherAdapter>>,
    controller: Mutex<Option<Arc<ReloadController>>>,
}

impl Engine {
    /// `registry` is taken by the caller rather than created internally so
    /// it can be shared with a host that needs to drive the loader itself
    /// (e.g. the reference `LocalHostRuntime`, which binds to the same
    /// registry at construction time).
    pub fn new(host: Arc<dyn HostRuntime>, registry: Arc<Registry>) -> Self {
        Self {
            config: EngineConfig::default(),
            host,
            registry,
            hook_installed: Mutex::new(false),
            watcher: Mutex::new(None),
            controller: Mutex::new(None),
        }
    }

    pub fn add_root(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.config.roots.push(path.into());
        self
    }

    pub fn ignore(&mut self, patterns: impl IntoIterator<Item = String>) -> &mut Self {
        self.config.ignore.extend(patterns);
        self
    }

    pub fn inflect(&mut self, overrides: impl IntoIterator<Item = (String, String)>) -> &mut Self {
        self.config.inflector_overrides.extend(overrides);
        self
    }

    pub fn top_level(&mut self, name: impl Into<String>) -> &mut Self {
        self.config.top_level = Some(name.into());
        self
    }

    fn build_inflector(&self) -> Inflector {
        let mut inflector = Inflector::new();
        inflector.inflect(self.config.inflector_overrides.iter().cloned());
        inflector
    }

    fn build_scanner(&self, inflector: Inflector) -> Scanner {
        let mut scanner = Scanner::new(self.config.roots.clone(), inflector)
            .with_ignore(self.config.ignore.clone())
            .with_unit_ext(self.config.unit_ext.clone().unwrap_or_else(|| DEFAULT_UNIT_EXT.to_string()))
            .with_init_stem(self.config.init_stem.clone().unwrap_or_else(|| DEFAULT_INIT_STEM.to_string()));
        if let Some(top_level) = &self.config.top_level {
            scanner = scanner.with_top_level(top_level.clone());
        }
        scanner
    }

    /// Scans the configured roots and installs the resolution hook.
    /// Idempotent: calling it again rescans and reinstalls (harmless,
    /// matching §4.9).
    pub fn setup(&self) -> Result<(), EngineError> {
        if self.config.roots.is_empty() {
            return Err(EngineError::Configuration);
        }

        let inflector = self.build_inflector();
        let scanner = self.build_scanner(inflector.clone());
        scanner.scan(&self.registry);

        let hook = Arc::new(ResolutionHook::new(
            self.registry.clone(),
            self.config.roots.clone(),
            inflector,
        ));
        self.host.install_resolver(hook as Arc<dyn NameResolver>);
        *self.hook_installed.lock().unwrap() = true;

        let controller = Arc::new(ReloadController::new(self.registry.clone(), self.host.clone(), scanner));
        *self.controller.lock().unwrap() = Some(controller);

        info!("engine set up with {} root(s)", self.config.roots.len());
        Ok(())
    }

    /// Triggers a host-level reference for every registered non-namespace
    /// name not currently loaded. Per-entry errors are collected and do not
    /// abort the loop.
    pub fn eager_load(&self) -> Vec<(String, EngineError)> {
        let mut errors = Vec::new();
        for name in self.registry.names() {
            let Ok(kind) = self.registry.kind(&name) else {
                continue;
            };
            if kind == Kind::Namespace {
                continue;
            }
            let Ok(false) = self.registry.loaded(&name) else {
                continue;
            };
            let loader = Loader::new(&self.registry, self.host.as_ref());
            if let Err(err) = loader.load(&name) {
                error!("eager_load: '{}' failed: {}", name, err);
                errors.push((name, err));
            }
        }
        errors
    }

    /// Starts the watcher adapter, wired to the reload controller.
    /// `on_reload` is invoked with the logical name after each successful
    /// invalidation (the configuration surface's `reload_callback`).
    pub fn enable_reloading(
        &self,
        on_reload: Option<Box<dyn Fn(&str) + Send + Sync>>,
    ) -> notify::Result<()> {
        let controller = self
            .controller
            .lock()
            .unwrap()
            .clone()
            .expect("enable_reloading called before setup()");
        if let Some(cb) = on_reload {
            controller.set_callback(cb);
        }
        let debounce = Duration::from_millis(self.config.debounce_ms.unwrap_or(50));
        let adapter = WatcherAdapter::start(&self.config.roots, debounce, controller)?;
        *self.watcher.lock().unwrap() = Some(adapter);
        Ok(())
    }

    /// Invalidates every loaded entry whose on-disk mtime has advanced.
    pub fn reload(&self) {
        if let Some(controller) = self.controller.lock().unwrap().as_ref() {
            controller.reload_changed();
        }
    }

    /// Invalidates exactly `name` and its transitive dependents.
    pub fn reload_name(&self, name: &str) {
        if let Some(controller) = self.controller.lock().unwrap().as_ref() {
            controller.invalidate(name);
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Stops the watcher (joining its thread) and removes the hook from the
    /// host's resolver chain. Synchronous; in-flight loads complete
    /// normally.
    pub fn teardown(&self) {
        if let Some(adapter) = self.watcher.lock().unwrap().take() {
            adapter.stop();
        }
        if *self.hook_installed.lock().unwrap() {
            self.host.remove_resolver();
            *self.hook_installed.lock().unwrap() = false;
        }
        info!("engine torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::local::LocalHostRuntime;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &std::path::Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn setup_without_roots_is_a_configuration_error() {
        let registry = Arc::new(Registry::new());
        let host = Arc::new(LocalHostRuntime::new(registry.clone()));
        let engine = Engine::new(host.clone(), registry);
        assert!(matches!(engine.setup(), Err(EngineError::Configuration)));
    }

    #[test]
    fn setup_scans_and_installs_hook() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("app");
        write(&root.join("_init.unit"), "");
        write(&root.join("models").join("user.unit"), "class User: pass");

        let registry = Arc::new(Registry::new());
        let host = Arc::new(LocalHostRuntime::new(registry.clone()));
        let mut engine = Engine::new(host.clone(), registry);
        engine.add_root(root);
        engine.setup().unwrap();

        assert!(engine.registry().contains("App.Models.User"));
        assert!(!engine.registry().loaded("App.Models.User").unwrap());

        // The hook is installed: referencing through the host succeeds.
        host.reference("App.Models.User").unwrap();
        assert!(host.unit_exists("App.Models.User"));
        assert!(engine.registry().loaded("App.Models.User").unwrap());

        engine.teardown();
    }

    #[test]
    fn eager_load_loads_every_module() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("app");
        write(&root.join("a.unit"), "");
        write(&root.join("b.unit"), "");

        let registry = Arc::new(Registry::new());
        let host = Arc::new(LocalHostRuntime::new(registry.clone()));
        let mut engine = Engine::new(host.clone(), registry);
        engine.add_root(root);
        engine.setup().unwrap();

        let errors = engine.eager_load();
        assert!(errors.is_empty());
        assert!(engine.registry().loaded("App.A").unwrap());
        assert!(engine.registry().loaded("App.B").unwrap());
    }

    #[test]
    fn reload_name_invalidates_single_entry() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("app");
        write(&root.join("a.unit"), "");

        let registry = Arc::new(Registry::new());
        let host = Arc::new(LocalHostRuntime::new(registry.clone()));
        let mut engine = Engine::new(host.clone(), registry);
        engine.add_root(root);
        engine.setup().unwrap();
        engine.eager_load();

        assert!(engine.registry().loaded("App.A").unwrap());
        engine.reload_name("App.A");
        assert!(!engine.registry().loaded("App.A").unwrap());
    }
}
