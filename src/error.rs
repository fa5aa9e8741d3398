//! Typed error hierarchy for the autoload engine.
//!
//! Mirrors the teacher crate's per-subsystem `thiserror` enums (e.g.
//! `command::ExecError`): one enum here covers the core engine, since unlike
//! the teacher's many independent subsystems (mount, qemu, dash...) this
//! crate's fallible operations all bottom out in one registry/host contract.

use std::path::PathBuf;

use thiserror::Error;

/// Errors the engine surfaces to callers. Scan, watch, and parse failures are
/// deliberately *not* represented here in the paths that recover locally —
/// per the specification's error policy, those are logged and swallowed at
/// the point of occurrence rather than propagated. The variants below exist
/// for the failures that affect user-visible correctness.
#[derive(Error, Debug)]
pub enum EngineError {
    /// `setup()` was called with no roots configured.
    #[error("no roots configured; call add_root() before setup()")]
    Configuration,

    /// A registry query referenced a name that isn't registered.
    #[error("unknown logical name: '{0}'")]
    UnknownName(String),

    /// The loader failed to read the source file for a registered name.
    #[error("failed to read source for '{name}' at '{path}': {source}")]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The host runtime failed to execute a unit's source.
    #[error("failed to load '{name}': {message}")]
    Load { name: String, message: String },
}

impl EngineError {
    pub fn unknown(name: impl Into<String>) -> Self {
        EngineError::UnknownName(name.into())
    }
}
