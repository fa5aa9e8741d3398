//! Disk-name to logical-segment conversion, with user-supplied overrides.

use std::collections::HashMap;

/// Converts a disk base-name (a file or directory name, extension already
/// stripped) into the logical segment the registry should use for it.
///
/// The default rule splits on `_`, capitalizes each part, and concatenates —
/// e.g. `user_service` becomes `UserService`. Callers that want an identity
/// mapping (no camelization) can still get it via [`Inflector::inflect`]
/// overrides on a per-basename basis, or by wrapping this type.
#[derive(Debug, Default, Clone)]
pub struct Inflector {
    overrides: HashMap<String, String>,
}

impl Inflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs literal overrides: `basename -> segment`. These short-circuit
    /// the default camelization rule for exactly the keys given.
    pub fn inflect(&mut self, overrides: impl IntoIterator<Item = (String, String)>) {
        self.overrides.extend(overrides);
    }

    /// Converts `basename` to its logical segment.
    pub fn segment(&self, basename: &str) -> String {
        if let Some(over) = self.overrides.get(basename) {
            return over.clone();
        }
        camelize(basename)
    }
}

fn camelize(basename: &str) -> String {
    basename
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camelizes_snake_case() {
        let inflector = Inflector::new();
        assert_eq!(inflector.segment("user_service"), "UserService");
        assert_eq!(inflector.segment("user"), "User");
    }

    #[test]
    fn preserves_single_word() {
        let inflector = Inflector::new();
        assert_eq!(inflector.segment("app"), "App");
    }

    #[test]
    fn empty_parts_become_underscore_gaps_collapsed() {
        let inflector = Inflector::new();
        // A leading/trailing/double underscore yields empty parts, which
        // contribute nothing (matches splitting then capitalize-or-skip).
        assert_eq!(inflector.segment("__init__"), "");
    }

    #[test]
    fn override_short_circuits_default_rule() {
        let mut inflector = Inflector::new();
        inflector.inflect([("html_parser".to_string(), "HTMLParser".to_string())]);
        assert_eq!(inflector.segment("html_parser"), "HTMLParser");
        // Unrelated basenames are unaffected.
        assert_eq!(inflector.segment("user"), "User");
    }

    #[test]
    fn override_replaces_on_reinflect() {
        let mut inflector = Inflector::new();
        inflector.inflect([("x".to_string(), "One".to_string())]);
        inflector.inflect([("x".to_string(), "Two".to_string())]);
        assert_eq!(inflector.segment("x"), "Two");
    }
}
