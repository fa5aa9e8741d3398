//! Convention-driven, on-demand loading and hot reloading of logical-name-
//! addressed code units for a host runtime.
//!
//! The [`Engine`] facade is the intended entry point; the other modules are
//! public so a caller can wire custom scanning, resolution, or reload
//! behavior around them if the facade's defaults don't fit.

pub mod controller;
pub mod engine;
pub mod error;
pub mod host;
pub mod hook;
pub mod inflector;
pub mod loader;
pub mod parser;
pub mod registry;
pub mod scanner;
pub mod watcher;

pub use engine::{Engine, EngineConfig};
pub use error::EngineError;
pub use host::{HostRuntime, LoadDescriptor, NameResolver, NamespaceDescriptor, Resolution};
pub use registry::{Kind, Registry};
