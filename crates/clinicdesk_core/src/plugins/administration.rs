//! Administration plugin: categorized tag workbench.

use crate::bus::EVENT_TAG_UPDATED;
use crate::model::tag::Tag;
use crate::plugin::context::{HostServices, PluginContext, PluginError};
use crate::plugin::kernel::Plugin;
use crate::plugin::version::PluginValidator;
use crate::plugins::{fill_slot, guard, report, ViewSlot, MIN_HOST_VERSION};
use crate::repo::{RepoResult, TagRepository};
use crate::security::permission::PermissionLevel;
use crate::shell::contribution::{CommandResult, MenuContribution};
use crate::shell::navigation::View;
use crate::shell::status::StatusLevel;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub const PLUGIN_ID: &str = "builtin.administration";
pub const MENU_TEXT: &str = "Administration";
const MENU_ORDER: i32 = 4;

/// Tag list shown by the administration plugin.
pub struct TagWorkbench {
    services: HostServices,
    tags: Arc<dyn TagRepository>,
    rows: Mutex<Vec<Tag>>,
}

impl TagWorkbench {
    fn new(services: HostServices, tags: Arc<dyn TagRepository>) -> Self {
        Self {
            services,
            tags,
            rows: Mutex::new(Vec::new()),
        }
    }

    /// Re-reads every tag in its own unit of work.
    pub fn refresh(&self) -> RepoResult<()> {
        let rows = self
            .services
            .data
            .run(|uow| self.tags.list_tags(uow, None))?;
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rows;
        Ok(())
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Creates a tag, then announces it on the bus.
    pub fn add_tag(&self, category: &str, name: &str) -> CommandResult {
        report(&self.services, "Add tag", self.try_add_tag(category, name))
    }

    pub fn rename_tag(&self, id: Uuid, name: &str) -> CommandResult {
        report(&self.services, "Rename tag", self.try_rename_tag(id, name))
    }

    fn try_add_tag(&self, category: &str, name: &str) -> CommandResult {
        guard(&self.services, "Add tag", PermissionLevel::Write)?;
        let tag = self
            .services
            .data
            .run(|uow| self.tags.create_tag(uow, category, name))?;
        self.services
            .write_status(StatusLevel::Info, &format!("Tag `{}` created", tag.name));
        self.services.bus.publish(
            EVENT_TAG_UPDATED,
            json!({ "id": tag.id, "category": tag.category, "name": tag.name }),
        );
        Ok(())
    }

    fn try_rename_tag(&self, id: Uuid, name: &str) -> CommandResult {
        guard(&self.services, "Rename tag", PermissionLevel::Write)?;
        self.services
            .data
            .run(|uow| self.tags.rename_tag(uow, id, name))?;
        self.services
            .bus
            .publish(EVENT_TAG_UPDATED, json!({ "id": id, "name": name.trim() }));
        Ok(())
    }
}

impl View for TagWorkbench {
    fn name(&self) -> &str {
        "tag_workbench"
    }
}

#[derive(Default)]
pub struct AdministrationPlugin {
    workbench: ViewSlot<TagWorkbench>,
}

impl AdministrationPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot filled with the workbench view once the plugin initialises.
    pub fn workbench_slot(&self) -> ViewSlot<TagWorkbench> {
        Arc::clone(&self.workbench)
    }
}

impl Plugin for AdministrationPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn validator(&self) -> PluginValidator {
        PluginValidator::minimum(MIN_HOST_VERSION)
    }

    fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let tags = ctx.resolve::<dyn TagRepository>()?;
        let workbench = Arc::new(TagWorkbench::new(ctx.services().clone(), tags));

        let view = Arc::clone(&workbench);
        let services = ctx.services().clone();
        ctx.add_to_application_menu(
            MenuContribution::new(MENU_TEXT, move || {
                report(&services, MENU_TEXT, view.refresh().map_err(Into::into))?;
                services.navigation.navigate(view.clone(), MENU_TEXT);
                Ok(())
            })
            .with_icon("administration")
            .with_order(MENU_ORDER)
            .requires(PermissionLevel::Read),
        );

        let view = Arc::clone(&workbench);
        ctx.subscribe(EVENT_TAG_UPDATED, move |_| Ok(view.refresh()?));

        fill_slot(&self.workbench, workbench)
    }
}
