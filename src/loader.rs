//! Reads source, executes it into a unit via the host, records dependency
//! edges, and updates the registry (§4.6).

use std::fs;

use log::debug;

use crate::{error::EngineError, host::HostRuntime, parser, registry::Registry};

pub struct Loader<'a> {
    registry: &'a Registry,
    host: &'a dyn HostRuntime,
}

impl<'a> Loader<'a> {
    pub fn new(registry: &'a Registry, host: &'a dyn HostRuntime) -> Self {
        Self { registry, host }
    }

    /// Loads `name`: reads its source, records dependency edges *before*
    /// executing (so a mid-execution failure still leaves the graph
    /// invalidatable), executes via the host, and marks the entry loaded on
    /// success.
    pub fn load(&self, name: &str) -> Result<(), EngineError> {
        let path = self
            .registry
            .path(name)?
            .ok_or_else(|| EngineError::Load {
                name: name.to_string(),
                message: "namespace entries have no source to load".to_string(),
            })?;

        let source = fs::read_to_string(&path).map_err(|source| EngineError::Io {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;

        let extracted = parser::extract_references(&source);
        let deps = parser::calculate_deps(name, &extracted, self.registry);
        for dep in &deps {
            // The registry may not (yet) contain a prior edge; add_edge is
            // idempotent, and both endpoints are guaranteed registered by
            // calculate_deps's own registry.contains() filtering.
            self.registry.add_edge(name, dep)?;
        }
        debug!("'{}' depends on {:?}", name, deps);

        self.host.exec_unit(name, &path).map_err(|message| {
            EngineError::Load {
                name: name.to_string(),
                message,
            }
        })?;

        let mtime = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|source| EngineError::Io {
                name: name.to_string(),
                path: path.clone(),
                source,
            })?;
        self.registry.mark_loaded(name, mtime)?;
        debug!("loaded '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{host::local::LocalHostRuntime, registry::Kind};
    use std::{path::PathBuf, sync::Arc};
    use tempfile::tempdir;

    #[test]
    fn load_success_marks_loaded_and_sets_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user.unit");
        std::fs::write(&path, "class User: pass").unwrap();

        let registry = Arc::new(Registry::new());
        registry.insert("App.Models.User", Some(path), Kind::Module);

        let host = LocalHostRuntime::new(registry.clone());
        let loader = Loader::new(&registry, &host);
        loader.load("App.Models.User").unwrap();

        assert!(registry.loaded("App.Models.User").unwrap());
        assert!(registry.mtime("App.Models.User").unwrap().is_some());
    }

    #[test]
    fn load_failure_leaves_entry_unloaded_but_edges_recorded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.unit");
        std::fs::write(&path, "import App.Models.User;\nraise RuntimeError").unwrap();

        let registry = Arc::new(Registry::new());
        registry.insert("App", None, Kind::Namespace);
        registry.insert("App.Models", None, Kind::Namespace);
        registry.insert("App.Models.User", Some(PathBuf::from("/dev/null")), Kind::Module);
        registry.insert("App.Broken", Some(path), Kind::Module);

        let host = LocalHostRuntime::new(registry.clone());
        let loader = Loader::new(&registry, &host);
        let result = loader.load("App.Broken");

        assert!(result.is_err());
        assert!(!registry.loaded("App.Broken").unwrap());
        // Edges recorded pre-execution survive the failure.
        assert!(registry.deps("App.Broken").unwrap().contains("App.Models.User"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let registry = Arc::new(Registry::new());
        let host = LocalHostRuntime::new(registry.clone());
        let loader = Loader::new(&registry, &host);
        assert!(loader.load("nope").is_err());
    }
}
