//! Host assembly: storage, components, kernel and shell wired together.

use crate::bus::NotificationBus;
use crate::config::{ConfigError, HostConfig};
use crate::db::{DataSession, DbError};
use crate::factory::{ComponentFactory, FactoryError};
use crate::logging::{init_logging, LoggingError};
use crate::plugin::catalog::PluginCatalog;
use crate::plugin::context::HostServices;
use crate::plugin::kernel::{KernelError, LoadReport, PluginKernel};
use crate::repo::register_default_components;
use crate::security::door_keeper::DoorKeeper;
use crate::shell::headless::HeadlessShell;
use crate::shell::navigation::NavigationHost;
use crate::shell::status::StatusBoard;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// A booted host with its plugins loaded and menus rendered.
pub struct Host {
    kernel: PluginKernel,
    shell: HeadlessShell,
    status: Arc<StatusBoard>,
    load_report: LoadReport,
    rejected: Vec<KernelError>,
}

impl Host {
    /// Validates `config`, opens storage and loads every plugin of `catalog`.
    ///
    /// Plugin failures are recorded in [`Host::load_report`], never returned.
    pub fn boot(config: &HostConfig, catalog: &PluginCatalog) -> Result<Self, HostError> {
        let host_version = config.validate()?;
        if let Some(log_dir) = config.log_dir.as_deref() {
            init_logging(&config.log_level, log_dir, false)?;
        }
        info!("event=host_boot module=host status=start host_version={host_version}");

        let data = match config.database_path.as_deref() {
            Some(path) => DataSession::open(path)?,
            None => DataSession::open_in_memory()?,
        };
        let mut components = ComponentFactory::new();
        register_default_components(&mut components)?;

        let status = Arc::new(StatusBoard::new());
        let services = HostServices {
            door_keeper: Arc::new(DoorKeeper::new()),
            components: Arc::new(components),
            navigation: Arc::new(NavigationHost::new()),
            bus: Arc::new(NotificationBus::new()),
            status: status.clone(),
            data: Arc::new(data),
        };

        let mut kernel = PluginKernel::new(host_version, services)
            .with_disabled(config.disabled_plugins.iter().cloned());
        let rejected = kernel.discover_catalog(catalog);
        let load_report = kernel.load_all();

        let mut host = Self {
            kernel,
            shell: HeadlessShell::new(),
            status,
            load_report,
            rejected,
        };
        host.refresh_shell();
        info!(
            "event=host_boot module=host status=ok initialized={} failed={}",
            host.load_report.initialized.len(),
            host.load_report.failed.len() + host.rejected.len()
        );
        Ok(host)
    }

    /// Re-renders both menus into the shell.
    pub fn refresh_shell(&mut self) {
        self.kernel.render_into(&mut self.shell);
    }

    pub fn shell(&self) -> &HeadlessShell {
        &self.shell
    }

    pub fn kernel(&self) -> &PluginKernel {
        &self.kernel
    }

    pub fn services(&self) -> &HostServices {
        self.kernel.services()
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    /// Plugins refused at discovery (duplicate or invalid ids).
    pub fn rejected(&self) -> &[KernelError] {
        &self.rejected
    }

    pub fn shutdown(mut self) {
        self.kernel.shutdown();
        info!("event=host_shutdown module=host status=ok");
    }
}

#[derive(Debug)]
pub enum HostError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Factory(FactoryError),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "logging setup failed: {err}"),
            Self::Db(err) => write!(f, "storage setup failed: {err}"),
            Self::Factory(err) => write!(f, "component setup failed: {err}"),
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Factory(err) => Some(err),
        }
    }
}

impl From<ConfigError> for HostError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for HostError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for HostError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<FactoryError> for HostError {
    fn from(value: FactoryError) -> Self {
        Self::Factory(value)
    }
}
