//! First-party feature plugins.
//!
//! # Invariants
//! - Plugins reach the shell, gate, bus and data only through their
//!   `PluginContext` and the `HostServices` it hands out.
//! - Every data action runs in its own unit of work and publishes only after
//!   that unit of work has closed.
//! - Failed actions are reported to the status sink and leave navigation
//!   where it was.

use crate::plugin::catalog::PluginCatalog;
use crate::plugin::context::{HostServices, PluginError};
use crate::plugin::version::HostVersion;
use crate::security::permission::PermissionLevel;
use crate::shell::contribution::{ActionError, CommandResult};
use crate::shell::status::StatusLevel;
use log::warn;
use once_cell::sync::OnceCell;
use std::sync::Arc;

pub mod administration;
pub mod medical_record;
pub mod picture_manager;
pub mod user_session;

/// Oldest host every first-party plugin runs on.
pub const MIN_HOST_VERSION: HostVersion = HostVersion::new(3, 0, 0, 0);

/// Shared handle to a plugin's view, filled during `initialise`.
pub type ViewSlot<V> = Arc<OnceCell<Arc<V>>>;

/// Catalog of all first-party plugins in menu order of discovery.
pub fn builtin_catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with(|| Box::new(user_session::UserSessionPlugin::new()))
        .with(|| Box::new(medical_record::MedicalRecordPlugin::new()))
        .with(|| Box::new(administration::AdministrationPlugin::new()))
        .with(|| Box::new(picture_manager::PictureManagerPlugin::new()))
}

pub(crate) fn fill_slot<V>(slot: &ViewSlot<V>, view: Arc<V>) -> Result<(), PluginError> {
    slot.set(view)
        .map_err(|_| PluginError::Initialization("plugin initialised twice".to_string()))
}

/// Rejects the action unless the gate grants `required`.
pub(crate) fn guard(
    services: &HostServices,
    action: &str,
    required: PermissionLevel,
) -> CommandResult {
    if services.door_keeper.is_granted(required) {
        return Ok(());
    }
    Err(ActionError::Denied {
        action: action.to_string(),
        required,
    })
}

/// Writes a failed action to the status sink and passes the result through.
pub(crate) fn report<T>(
    services: &HostServices,
    action: &str,
    result: Result<T, ActionError>,
) -> Result<T, ActionError> {
    if let Err(err) = &result {
        let level = match err {
            ActionError::Denied { .. } => StatusLevel::Warning,
            ActionError::Data(_) | ActionError::Failed(_) => StatusLevel::Error,
        };
        warn!("event=action module=plugins status=error action={action} error={err}");
        services.write_status(level, &format!("{action}: {err}"));
    }
    result
}
