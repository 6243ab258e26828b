//! Core runtime for ClinicDesk.
//! Plugin composition, permission gating, unit-of-work data access and the
//! notification bus live here; the CLI only wires them to a terminal.

pub mod bus;
pub mod config;
pub mod db;
pub mod factory;
pub mod host;
pub mod logging;
pub mod model;
pub mod plugin;
pub mod plugins;
pub mod repo;
pub mod security;
pub mod shell;

pub use bus::{NotificationBus, NotificationEvent, PublishReport, SubscriptionId};
pub use config::{ConfigError, HostConfig};
pub use db::{DataSession, DbError, UnitOfWork};
pub use factory::{ComponentFactory, FactoryError};
pub use host::{Host, HostError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use plugin::{
    HostServices, HostVersion, Plugin, PluginCatalog, PluginContext, PluginError, PluginKernel,
    PluginState, PluginValidator, ValidationMode,
};
pub use repo::{RepoError, RepoResult};
pub use security::door_keeper::{DoorKeeper, SessionContext};
pub use security::permission::PermissionLevel;
pub use shell::{
    ActionError, ContributionRegistry, HeadlessShell, MenuContribution, MenuKind, NavigationHost,
    StatusLevel, StatusSink,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
