//! Host services and the per-plugin context handed to `initialise`.
//!
//! # Responsibility
//! - Bundle the process-wide services plugins may use.
//! - Stage a plugin's menu contributions until its initialisation succeeds.
//! - Tag bus subscriptions with the plugin id so they can be removed later.

use crate::bus::{HandlerResult, NotificationBus, NotificationEvent, SubscriptionId};
use crate::db::{DataSession, DbError};
use crate::factory::{ComponentFactory, FactoryError};
use crate::plugin::version::{HostVersion, ValidationMode};
use crate::repo::RepoError;
use crate::security::door_keeper::{DoorKeeper, SessionContext};
use crate::shell::contribution::{MenuContribution, MenuKind};
use crate::shell::navigation::{NavigationHost, View};
use crate::shell::status::{StatusLevel, StatusSink};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Process-wide services shared by the kernel and every plugin.
#[derive(Clone)]
pub struct HostServices {
    pub door_keeper: Arc<DoorKeeper>,
    pub components: Arc<ComponentFactory>,
    pub navigation: Arc<NavigationHost>,
    pub bus: Arc<NotificationBus>,
    pub status: Arc<dyn StatusSink>,
    pub data: Arc<DataSession>,
}

impl HostServices {
    pub fn write_status(&self, level: StatusLevel, message: &str) {
        self.status.write_status(level, message);
    }

    pub fn connected_user(&self) -> Option<SessionContext> {
        self.door_keeper.session()
    }

    /// Resolves capability `C` from the component factory.
    pub fn resolve<C>(&self) -> Result<Arc<C>, FactoryError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.components.resolve::<C>()
    }
}

/// Handle given to a plugin while it initialises.
pub struct PluginContext<'k> {
    plugin_id: &'k str,
    services: &'k HostServices,
    staged: Vec<(MenuKind, MenuContribution)>,
}

impl<'k> PluginContext<'k> {
    pub(crate) fn new(plugin_id: &'k str, services: &'k HostServices) -> Self {
        Self {
            plugin_id,
            services,
            staged: Vec::new(),
        }
    }

    pub fn plugin_id(&self) -> &str {
        self.plugin_id
    }

    pub fn services(&self) -> &HostServices {
        self.services
    }

    pub fn add_to_application_menu(&mut self, contribution: MenuContribution) {
        self.staged.push((MenuKind::Application, contribution));
    }

    pub fn add_to_context_menu(&mut self, contribution: MenuContribution) {
        self.staged.push((MenuKind::Context, contribution));
    }

    pub fn navigate(&self, view: Arc<dyn View>) {
        self.services.navigation.navigate(view, self.plugin_id);
    }

    pub fn show_main_menu(&self) {
        self.services.navigation.show_main_menu();
    }

    pub fn write_status(&self, level: StatusLevel, message: &str) {
        self.services.write_status(level, message);
    }

    pub fn connected_user(&self) -> Option<SessionContext> {
        self.services.connected_user()
    }

    /// Resolves capability `C`; a missing registration fails initialisation.
    pub fn resolve<C>(&self) -> Result<Arc<C>, PluginError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        Ok(self.services.resolve::<C>()?)
    }

    /// Subscribes on behalf of this plugin.
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&NotificationEvent) -> HandlerResult + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.services.bus.subscribe(event, self.plugin_id, handler)
    }

    pub(crate) fn into_staged(self) -> Vec<(MenuKind, MenuContribution)> {
        self.staged
    }
}

/// Plugin load failure, isolated at the kernel boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    Compatibility {
        declared: HostVersion,
        host: HostVersion,
        mode: ValidationMode,
    },
    Initialization(String),
    Capability(FactoryError),
    /// Listed in the host's disabled plugins.
    Disabled,
}

impl Display for PluginError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compatibility {
                declared,
                host,
                mode,
            } => write!(
                f,
                "plugin requires host {declared} ({}), running {host}",
                mode.as_str()
            ),
            Self::Initialization(message) => write!(f, "plugin initialisation failed: {message}"),
            Self::Capability(err) => write!(f, "plugin initialisation failed: {err}"),
            Self::Disabled => write!(f, "plugin is disabled by configuration"),
        }
    }
}

impl Error for PluginError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Capability(err) => Some(err),
            Self::Compatibility { .. } | Self::Initialization(_) | Self::Disabled => None,
        }
    }
}

impl From<FactoryError> for PluginError {
    fn from(value: FactoryError) -> Self {
        Self::Capability(value)
    }
}

impl From<RepoError> for PluginError {
    fn from(value: RepoError) -> Self {
        Self::Initialization(value.to_string())
    }
}

impl From<DbError> for PluginError {
    fn from(value: DbError) -> Self {
        Self::Initialization(value.to_string())
    }
}
