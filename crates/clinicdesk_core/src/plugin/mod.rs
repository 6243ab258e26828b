//! Plugin composition runtime.
//!
//! Plugins are compiled in and registered through a [`PluginCatalog`]; the
//! kernel validates each one against the host version and initialises it
//! with a [`PluginContext`].

pub mod catalog;
pub mod context;
pub mod descriptor;
pub mod kernel;
pub mod version;

pub use catalog::PluginCatalog;
pub use context::{HostServices, PluginContext, PluginError};
pub use descriptor::{PluginDescriptor, PluginState};
pub use kernel::{KernelError, LoadReport, Plugin, PluginKernel};
pub use version::{validate, HostVersion, PluginValidator, ValidationMode, VersionParseError};
