//! The host runtime contract (§6): everything this crate requires of the
//! runtime it plugs into, modeled as traits so the engine can be exercised
//! and tested independently of any concrete host.
//!
//! This is, by specification (§1), an external collaborator — the real
//! implementation belongs to whatever runtime embeds this engine. The
//! [`local`] submodule provides a minimal reference implementation used by
//! the CLI harness and the integration test suite; it is not part of the
//! core specification.

use std::path::PathBuf;

/// A descriptor telling the host how to realize a module or package unit.
#[derive(Debug, Clone)]
pub struct LoadDescriptor {
    pub name: String,
    pub path: PathBuf,
    /// Populated when the entry is a package: the directory search path the
    /// host should use when resolving the package's own submodules.
    pub submodule_search_locations: Option<PathBuf>,
}

/// A descriptor for a pure namespace container: no loader, just locations
/// the host should union across finders when resolving submodules.
#[derive(Debug, Clone)]
pub struct NamespaceDescriptor {
    pub name: String,
    pub search_locations: Vec<PathBuf>,
}

/// What the resolution hook hands back to the host for a given name.
#[derive(Debug, Clone)]
pub enum Resolution {
    Load(LoadDescriptor),
    Namespace(NamespaceDescriptor),
    /// "Not mine, try the next finder in the chain."
    NotMine,
}

/// Implemented by this crate's resolution hook; installed at the front of
/// the host's resolver chain.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Resolution;
}

/// The collaborator contract required of the host runtime (§6):
///
/// - a lookup table keyed by logical name, from which the engine can
///   observe presence and request removal;
/// - a way to execute a unit's source once the host has created the (empty)
///   unit object, surfacing any failure back to the engine unchanged;
/// - a resolver chain the engine can install its hook into, and remove it
///   from at teardown.
pub trait HostRuntime: Send + Sync {
    /// Whether the host currently exposes a materialized unit under `name`.
    fn unit_exists(&self, name: &str) -> bool;

    /// Drops the host's cached unit under `name`, if any. A no-op if absent.
    fn drop_unit(&self, name: &str);

    /// Executes the source file at `path` within a fresh unit named `name`.
    /// Any failure is surfaced as `Err`, verbatim, to the engine's loader,
    /// which propagates it to the original caller (§4.6 step 4 / §7
    /// LoadFailure).
    fn exec_unit(&self, name: &str, path: &std::path::Path) -> Result<(), String>;

    /// Installs `resolver` at the front of the host's resolver chain.
    fn install_resolver(&self, resolver: std::sync::Arc<dyn NameResolver>);

    /// Removes a previously installed resolver from the chain.
    fn remove_resolver(&self);
}

/// A minimal, in-process [`HostRuntime`] reference implementation. Not part
/// of the core specification — provided so the engine can be driven
/// end-to-end by the CLI harness and the integration test suite without a
/// real language runtime behind it. "Executing" a unit here just means
/// reading its source into memory; the reference host never interprets it.
pub mod local {
    use std::{
        collections::HashSet,
        fs,
        path::Path,
        sync::{Arc, Mutex, RwLock},
    };

    use super::{HostRuntime, NameResolver};
    use crate::{loader::Loader, registry::Registry};

    pub struct LocalHostRuntime {
        units: Mutex<HashSet<String>>,
        resolver: RwLock<Option<Arc<dyn NameResolver>>>,
        /// The registry this host shares with the engine that installed its
        /// resolver. Needed so `reference` can hand a load descriptor to a
        /// real `Loader` instead of touching unit storage directly.
        registry: Arc<Registry>,
    }

    impl LocalHostRuntime {
        pub fn new(registry: Arc<Registry>) -> Self {
            Self {
                units: Mutex::new(HashSet::new()),
                resolver: RwLock::new(None),
                registry,
            }
        }

        /// Exercises the resolver chain exactly as a real host would: ask
        /// the installed resolver for `name`, and on a load descriptor, hand
        /// it to a `Loader` bound to the shared registry. `exec_unit` is the
        /// loader's own internal primitive (§4.6 step 4); a real host never
        /// calls it on its own, since only the loader knows to extract and
        /// record dependency edges and mark the entry loaded.
        pub fn reference(&self, name: &str) -> Result<(), String> {
            let resolver = self
                .resolver
                .read()
                .unwrap()
                .clone()
                .ok_or_else(|| "no resolver installed".to_string())?;
            match resolver.resolve(name) {
                super::Resolution::Load(desc) => {
                    let loader = Loader::new(&self.registry, self);
                    loader.load(&desc.name).map_err(|err| err.to_string())
                }
                super::Resolution::Namespace(_) => {
                    // Namespace containers have no loader; referencing one
                    // just means "it exists", which it already does.
                    Ok(())
                }
                super::Resolution::NotMine => Err(format!("unresolvable name: '{name}'")),
            }
        }
    }

    impl HostRuntime for LocalHostRuntime {
        fn unit_exists(&self, name: &str) -> bool {
            self.units.lock().unwrap().contains(name)
        }

        fn drop_unit(&self, name: &str) {
            self.units.lock().unwrap().remove(name);
        }

        fn exec_unit(&self, name: &str, path: &Path) -> Result<(), String> {
            let source = fs::read_to_string(path).map_err(|e| e.to_string())?;
            if source.contains("raise RuntimeError") {
                return Err(format!("unit '{name}' raised during execution"));
            }
            self.units.lock().unwrap().insert(name.to_string());
            Ok(())
        }

        fn install_resolver(&self, resolver: Arc<dyn NameResolver>) {
            *self.resolver.write().unwrap() = Some(resolver);
        }

        fn remove_resolver(&self) {
            *self.resolver.write().unwrap() = None;
        }
    }
}
