//! Picture manager plugin: tagged picture metadata per patient.

use crate::bus::{EVENT_PICTURE_ADDED, EVENT_TAG_UPDATED};
use crate::model::picture::PictureInfo;
use crate::model::tag::Tag;
use crate::plugin::context::{HostServices, PluginContext, PluginError};
use crate::plugin::kernel::Plugin;
use crate::plugin::version::PluginValidator;
use crate::plugins::{fill_slot, guard, report, ViewSlot, MIN_HOST_VERSION};
use crate::repo::{PictureRepository, RepoError, RepoResult, TagRepository};
use crate::security::permission::PermissionLevel;
use crate::shell::contribution::{CommandResult, MenuContribution};
use crate::shell::navigation::View;
use crate::shell::status::StatusLevel;
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub const PLUGIN_ID: &str = "builtin.picture_manager";
pub const MENU_TEXT: &str = "Pictures";
const PICTURE_TAG_CATEGORY: &str = "picture";

#[derive(Default)]
struct Snapshot {
    pictures: Vec<PictureInfo>,
    tags: Vec<Tag>,
}

pub struct PictureWorkbench {
    services: HostServices,
    pictures: Arc<dyn PictureRepository>,
    tags: Arc<dyn TagRepository>,
    snapshot: Mutex<Snapshot>,
}

impl PictureWorkbench {
    fn new(
        services: HostServices,
        pictures: Arc<dyn PictureRepository>,
        tags: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            services,
            pictures,
            tags,
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    /// Re-reads pictures and picture tags together.
    pub fn refresh(&self) -> RepoResult<()> {
        let snapshot = self.services.data.run(|uow| {
            Ok::<_, RepoError>(Snapshot {
                pictures: self.pictures.list_pictures(uow, None)?,
                tags: self.tags.list_tags(uow, Some(PICTURE_TAG_CATEGORY))?,
            })
        })?;
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
        Ok(())
    }

    pub fn pictures(&self) -> Vec<PictureInfo> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pictures
            .clone()
    }

    /// Tags of the `picture` category offered when importing.
    pub fn tags(&self) -> Vec<Tag> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tags
            .clone()
    }

    pub fn import_picture(
        &self,
        patient: &str,
        file_name: &str,
        tag_id: Option<Uuid>,
    ) -> CommandResult {
        report(
            &self.services,
            "Import picture",
            self.try_import_picture(patient, file_name, tag_id),
        )
    }

    fn try_import_picture(
        &self,
        patient: &str,
        file_name: &str,
        tag_id: Option<Uuid>,
    ) -> CommandResult {
        guard(&self.services, "Import picture", PermissionLevel::Write)?;
        let picture = self
            .services
            .data
            .run(|uow| self.pictures.add_picture(uow, patient, file_name, tag_id))?;
        self.services.write_status(
            StatusLevel::Info,
            &format!("Picture `{}` added", picture.file_name),
        );
        self.services.bus.publish(
            EVENT_PICTURE_ADDED,
            json!({ "id": picture.id, "patient": picture.patient }),
        );
        Ok(())
    }
}

impl View for PictureWorkbench {
    fn name(&self) -> &str {
        "picture_workbench"
    }
}

#[derive(Default)]
pub struct PictureManagerPlugin {
    workbench: ViewSlot<PictureWorkbench>,
}

impl PictureManagerPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workbench_slot(&self) -> ViewSlot<PictureWorkbench> {
        Arc::clone(&self.workbench)
    }
}

impl Plugin for PictureManagerPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn validator(&self) -> PluginValidator {
        PluginValidator::minimum(MIN_HOST_VERSION)
    }

    fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let pictures = ctx.resolve::<dyn PictureRepository>()?;
        let tags = ctx.resolve::<dyn TagRepository>()?;
        let workbench = Arc::new(PictureWorkbench::new(
            ctx.services().clone(),
            pictures,
            tags,
        ));

        let view = Arc::clone(&workbench);
        let services = ctx.services().clone();
        ctx.add_to_application_menu(
            MenuContribution::new(MENU_TEXT, move || {
                report(&services, MENU_TEXT, view.refresh().map_err(Into::into))?;
                services.navigation.navigate(view.clone(), MENU_TEXT);
                Ok(())
            })
            .with_icon("pictures")
            .with_order(5)
            .requires(PermissionLevel::Read),
        );

        for event in [EVENT_PICTURE_ADDED, EVENT_TAG_UPDATED] {
            let view = Arc::clone(&workbench);
            ctx.subscribe(event, move |_| Ok(view.refresh()?));
        }

        fill_slot(&self.workbench, workbench)
    }
}
