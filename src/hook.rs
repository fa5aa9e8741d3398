//! The name-resolution hook: the host-facing finder that turns a registry
//! lookup into a [`Resolution`] the host can act on (§4.5).

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    host::{LoadDescriptor, NameResolver, NamespaceDescriptor, Resolution},
    inflector::Inflector,
    registry::{Kind, Registry},
};

pub struct ResolutionHook {
    registry: Arc<Registry>,
    roots: Vec<PathBuf>,
    inflector: Inflector,
}

impl ResolutionHook {
    pub fn new(registry: Arc<Registry>, roots: Vec<PathBuf>, inflector: Inflector) -> Self {
        Self {
            registry,
            roots,
            inflector,
        }
    }

    /// Walks down from `root` matching each of `segments` against the
    /// inflected basename of a child directory, so the synthesized
    /// namespace points at the real on-disk path rather than a
    /// logical-segment string joined directly onto the root (which would
    /// almost never exist once a non-identity inflection rule is in
    /// effect).
    fn locate_descendant(&self, root: &Path, segments: &[&str]) -> Option<PathBuf> {
        let mut current = root.to_path_buf();
        for segment in segments {
            let entries = std::fs::read_dir(&current).ok()?;
            let next = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .find(|p| p.is_dir() && self.inflector.segment(&basename(p)) == *segment)?;
            current = next;
        }
        Some(current)
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

impl NameResolver for ResolutionHook {
    fn resolve(&self, name: &str) -> Resolution {
        if self.registry.contains(name) {
            let kind = self.registry.kind(name).expect("just checked contains");
            let path = self.registry.path(name).expect("just checked contains");

            return match kind {
                Kind::Namespace => Resolution::Namespace(NamespaceDescriptor {
                    name: name.to_string(),
                    search_locations: path.into_iter().collect(),
                }),
                Kind::Package => {
                    let path = path.expect("packages always have a path");
                    let submodule_search_locations = path.parent().map(|p| p.to_path_buf());
                    Resolution::Load(LoadDescriptor {
                        name: name.to_string(),
                        path,
                        submodule_search_locations,
                    })
                }
                Kind::Module => {
                    let path = path.expect("modules always have a path");
                    Resolution::Load(LoadDescriptor {
                        name: name.to_string(),
                        path,
                        submodule_search_locations: None,
                    })
                }
            };
        }

        let prefix = format!("{name}.");
        let has_deeper_registration = self.registry.names().iter().any(|n| n.starts_with(&prefix));
        if has_deeper_registration {
            // `name`'s own segments may include a top-level override with no
            // disk basename of its own; matching is lenient root-by-root, so
            // a root that doesn't correspond to `name`'s first segment just
            // fails to resolve any segments and contributes nothing.
            let segments: Vec<&str> = name.split('.').collect();
            let search_locations = self
                .roots
                .iter()
                .filter_map(|root| self.locate_descendant(root, &segments[1..]))
                .collect();
            return Resolution::Namespace(NamespaceDescriptor {
                name: name.to_string(),
                search_locations,
            });
        }

        Resolution::NotMine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn returns_not_mine_for_unregistered_name() {
        let registry = Arc::new(Registry::new());
        let hook = ResolutionHook::new(registry, vec![], Inflector::new());
        assert!(matches!(hook.resolve("nope"), Resolution::NotMine));
    }

    #[test]
    fn returns_load_descriptor_for_module() {
        let registry = Arc::new(Registry::new());
        registry.insert("App.Models.User", Some(PathBuf::from("/tmp/user.unit")), Kind::Module);
        let hook = ResolutionHook::new(registry, vec![], Inflector::new());
        match hook.resolve("App.Models.User") {
            Resolution::Load(desc) => {
                assert_eq!(desc.path, PathBuf::from("/tmp/user.unit"));
                assert!(desc.submodule_search_locations.is_none());
            }
            other => panic!("expected Load, got {other:?}"),
        }
    }

    #[test]
    fn returns_load_descriptor_with_submodule_locations_for_package() {
        let registry = Arc::new(Registry::new());
        registry.insert(
            "App.Models",
            Some(PathBuf::from("/tmp/app/models/_init.unit")),
            Kind::Package,
        );
        let hook = ResolutionHook::new(registry, vec![], Inflector::new());
        match hook.resolve("App.Models") {
            Resolution::Load(desc) => {
                assert_eq!(
                    desc.submodule_search_locations,
                    Some(PathBuf::from("/tmp/app/models"))
                );
            }
            other => panic!("expected Load, got {other:?}"),
        }
    }

    #[test]
    fn returns_namespace_descriptor_for_namespace_kind() {
        let registry = Arc::new(Registry::new());
        registry.insert("Pkg.Sub", Some(PathBuf::from("/tmp/pkg/sub")), Kind::Namespace);
        let hook = ResolutionHook::new(registry, vec![], Inflector::new());
        match hook.resolve("Pkg.Sub") {
            Resolution::Namespace(desc) => {
                assert_eq!(desc.search_locations, vec![PathBuf::from("/tmp/pkg/sub")]);
            }
            other => panic!("expected Namespace, got {other:?}"),
        }
    }

    #[test]
    fn synthesizes_namespace_pointing_at_the_real_inflected_directory() {
        // The registered descendant lives under disk directory "pkg", whose
        // inflected logical segment is "Pkg" -- joining "Pkg" onto the root
        // directly (the bug) would never find "pkg" on disk.
        let dir = tempdir().unwrap();
        let root = dir.path().join("app");
        let pkg_dir = root.join("pkg");
        fs::create_dir_all(&pkg_dir).unwrap();
        fs::write(pkg_dir.join("leaf.unit"), "").unwrap();

        let registry = Arc::new(Registry::new());
        registry.insert(
            "App.Pkg.Leaf",
            Some(pkg_dir.join("leaf.unit")),
            Kind::Module,
        );
        // "App.Pkg" itself was never explicitly registered.
        let hook = ResolutionHook::new(registry, vec![root], Inflector::new());
        match hook.resolve("App.Pkg") {
            Resolution::Namespace(desc) => {
                assert_eq!(desc.search_locations, vec![pkg_dir]);
            }
            other => panic!("expected synthesized Namespace, got {other:?}"),
        }
    }

    #[test]
    fn synthesizes_namespace_for_unregistered_top_level() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(&root).unwrap();

        let registry = Arc::new(Registry::new());
        registry.insert(
            "App.Models.User",
            Some(root.join("models").join("user.unit")),
            Kind::Module,
        );
        let hook = ResolutionHook::new(registry, vec![root.clone()], Inflector::new());
        match hook.resolve("App") {
            Resolution::Namespace(desc) => {
                assert_eq!(desc.search_locations, vec![root]);
            }
            other => panic!("expected synthesized Namespace, got {other:?}"),
        }
    }
}
