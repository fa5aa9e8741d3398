//! Static extraction of referenced logical names from source text.
//!
//! The host's unit language is unspecified (out of scope), so this parser
//! works textually rather than against a language AST, in the spirit of the
//! teacher crate's own `regex`/`RegexSet`-based matching (`mount/mod.rs`)
//! rather than a full parser. See SPEC_FULL.md §4.3.1 for the recognized
//! reference syntax.

use std::{collections::HashSet, sync::LazyLock};

use regex::Regex;

use crate::registry::Registry;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:import|use)\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;").unwrap()
});

/// Extracts the set of absolute logical names referenced by `source`.
/// Relative references (those starting with `.`) are ignored. Never fails:
/// unparseable or unmatched text simply yields no references, matching the
/// specification's "syntax errors are swallowed" policy (§4.3 / §7
/// ParseFailure).
pub fn extract_references(source: &str) -> HashSet<String> {
    REFERENCE_RE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect()
}

/// Computes the registry edges a loaded unit `name` should record, given the
/// raw names its source referenced (`extracted`).
///
/// For each extracted name, records an edge to the *longest registered
/// prefix* of that name (so `app.models.user.Helper`, if `Helper` isn't
/// itself registered, still produces an edge to `app.models.user`).
/// Unconditionally also adds an edge to `name`'s immediate parent namespace,
/// if registered. The result is deduplicated (it's a `HashSet`) and excludes
/// `name` itself (a unit cannot depend on itself via this mechanism).
pub fn calculate_deps(name: &str, extracted: &HashSet<String>, registry: &Registry) -> HashSet<String> {
    let mut deps = HashSet::new();

    for reference in extracted {
        if let Some(prefix) = longest_registered_prefix(reference, registry) {
            if prefix != name {
                deps.insert(prefix);
            }
        }
    }

    if let Some(parent) = parent_of(name) {
        if registry.contains(&parent) {
            deps.insert(parent);
        }
    }

    deps
}

fn longest_registered_prefix(dotted: &str, registry: &Registry) -> Option<String> {
    let segments: Vec<&str> = dotted.split('.').collect();
    for len in (1..=segments.len()).rev() {
        let candidate = segments[..len].join(".");
        if registry.contains(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn parent_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(parent, _)| parent.to_string())
}
