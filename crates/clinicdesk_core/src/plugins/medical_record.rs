//! Medical record plugin: text macro editor.
//!
//! # Invariants
//! - Unsaved edits survive creating, removing and bus-driven reloads; only
//!   an explicit [`MacroEditor::refresh`] discards them.

use crate::bus::{EVENT_MACRO_CREATED, EVENT_MACRO_UPDATED};
use crate::model::text_macro::{TextMacro, DEFAULT_MACRO_TITLE};
use crate::plugin::context::{HostServices, PluginContext, PluginError};
use crate::plugin::kernel::Plugin;
use crate::plugin::version::PluginValidator;
use crate::plugins::{fill_slot, guard, report, ViewSlot, MIN_HOST_VERSION};
use crate::repo::{MacroRepository, RepoResult};
use crate::security::permission::PermissionLevel;
use crate::shell::contribution::{ActionError, CommandResult, MenuContribution};
use crate::shell::navigation::View;
use crate::shell::status::StatusLevel;
use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const PLUGIN_ID: &str = "builtin.medical_record";
pub const MENU_TEXT: &str = "Medical record";
pub const NEW_MACRO_TEXT: &str = "New macro";
pub const SAVE_MACROS_TEXT: &str = "Save macros";
pub const REMOVE_MACRO_TEXT: &str = "Remove macro";

#[derive(Default)]
struct EditorState {
    rows: Vec<TextMacro>,
    selected: Option<Uuid>,
}

/// Editable macro list. Edits stay in memory until [`MacroEditor::save`].
pub struct MacroEditor {
    services: HostServices,
    repository: Arc<dyn MacroRepository>,
    state: Mutex<EditorState>,
}

impl MacroEditor {
    fn new(services: HostServices, repository: Arc<dyn MacroRepository>) -> Self {
        Self {
            services,
            repository,
            state: Mutex::new(EditorState::default()),
        }
    }

    /// Reloads the stored macros, discarding unsaved edits.
    pub fn refresh(&self) -> RepoResult<()> {
        let stored = self.load()?;
        let mut state = self.lock();
        state.rows = stored;
        retain_selection(&mut state);
        Ok(())
    }

    /// Reloads the stored macros but keeps unsaved edits of rows still stored.
    pub fn sync(&self) -> RepoResult<()> {
        let stored = self.load()?;
        let mut state = self.lock();
        let merged: Vec<TextMacro> = stored
            .into_iter()
            .map(|stored_row| {
                state
                    .rows
                    .iter()
                    .find(|row| row.id == stored_row.id)
                    .cloned()
                    .unwrap_or(stored_row)
            })
            .collect();
        state.rows = merged;
        retain_selection(&mut state);
        Ok(())
    }

    pub fn macros(&self) -> Vec<TextMacro> {
        self.lock().rows.clone()
    }

    /// Changes one macro in memory. Returns `false` for unknown ids.
    pub fn edit(&self, id: Uuid, title: &str, expression: &str) -> bool {
        let mut state = self.lock();
        let Some(row) = state.rows.iter_mut().find(|row| row.id == id) else {
            return false;
        };
        row.title = title.to_string();
        row.expression = expression.to_string();
        true
    }

    /// Marks the macro targeted by "Remove macro". Returns `false` for unknown ids.
    pub fn select(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        if !state.rows.iter().any(|row| row.id == id) {
            return false;
        }
        state.selected = Some(id);
        true
    }

    pub fn selected(&self) -> Option<Uuid> {
        self.lock().selected
    }

    pub fn create_macro(&self) -> CommandResult {
        report(&self.services, NEW_MACRO_TEXT, self.try_create_macro())
    }

    /// Writes every in-memory macro in one unit of work.
    pub fn save(&self) -> CommandResult {
        report(&self.services, SAVE_MACROS_TEXT, self.try_save())
    }

    /// Deletes one stored macro; other rows keep their unsaved edits.
    pub fn remove_macro(&self, id: Uuid) -> CommandResult {
        report(&self.services, REMOVE_MACRO_TEXT, self.try_remove_macro(id))
    }

    pub fn remove_selected(&self) -> CommandResult {
        let result = match self.selected() {
            Some(id) => self.try_remove_macro(id),
            None => Err(ActionError::Failed("no macro selected".to_string())),
        };
        report(&self.services, REMOVE_MACRO_TEXT, result)
    }

    fn load(&self) -> RepoResult<Vec<TextMacro>> {
        self.services
            .data
            .run(|uow| self.repository.list_macros(uow))
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_create_macro(&self) -> CommandResult {
        guard(&self.services, NEW_MACRO_TEXT, PermissionLevel::Write)?;
        let created = self
            .services
            .data
            .run(|uow| self.repository.create_macro(uow, DEFAULT_MACRO_TITLE))?;
        self.lock().rows.push(created.clone());
        self.services.write_status(StatusLevel::Info, "Macro created");
        self.services.bus.publish(
            EVENT_MACRO_CREATED,
            json!({ "id": created.id, "title": created.title }),
        );
        Ok(())
    }

    fn try_remove_macro(&self, id: Uuid) -> CommandResult {
        guard(&self.services, REMOVE_MACRO_TEXT, PermissionLevel::Write)?;
        self.services
            .data
            .run(|uow| self.repository.remove_macro(uow, id))?;
        {
            let mut state = self.lock();
            state.rows.retain(|row| row.id != id);
            retain_selection(&mut state);
        }
        self.services.write_status(StatusLevel::Info, "Macro removed");
        self.services
            .bus
            .publish(EVENT_MACRO_UPDATED, json!({ "removed": id }));
        Ok(())
    }

    fn try_save(&self) -> CommandResult {
        guard(&self.services, SAVE_MACROS_TEXT, PermissionLevel::Write)?;
        let snapshot = self.macros();
        self.services
            .data
            .run(|uow| self.repository.update_macros(uow, &snapshot))?;
        self.services.write_status(
            StatusLevel::Info,
            &format!("{} macro(s) saved", snapshot.len()),
        );
        self.services
            .bus
            .publish(EVENT_MACRO_UPDATED, json!({ "count": snapshot.len() }));
        Ok(())
    }
}

fn retain_selection(state: &mut EditorState) {
    if let Some(id) = state.selected {
        if !state.rows.iter().any(|row| row.id == id) {
            state.selected = None;
        }
    }
}

impl View for MacroEditor {
    fn name(&self) -> &str {
        "macro_editor"
    }
}

#[derive(Default)]
pub struct MedicalRecordPlugin {
    editor: ViewSlot<MacroEditor>,
}

impl MedicalRecordPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn editor_slot(&self) -> ViewSlot<MacroEditor> {
        Arc::clone(&self.editor)
    }
}

impl Plugin for MedicalRecordPlugin {
    fn id(&self) -> &str {
        PLUGIN_ID
    }

    fn validator(&self) -> PluginValidator {
        PluginValidator::minimum(MIN_HOST_VERSION)
    }

    fn initialise(&mut self, ctx: &mut PluginContext<'_>) -> Result<(), PluginError> {
        let repository = ctx.resolve::<dyn MacroRepository>()?;
        let editor = Arc::new(MacroEditor::new(ctx.services().clone(), repository));

        let view = Arc::clone(&editor);
        let services = ctx.services().clone();
        ctx.add_to_application_menu(
            MenuContribution::new(MENU_TEXT, move || {
                report(&services, MENU_TEXT, view.refresh().map_err(Into::into))?;
                services.navigation.navigate(view.clone(), MENU_TEXT);
                Ok(())
            })
            .with_icon("medical_record")
            .with_order(2)
            .requires(PermissionLevel::Read),
        );

        let view = Arc::clone(&editor);
        ctx.add_to_context_menu(
            MenuContribution::new(NEW_MACRO_TEXT, move || view.create_macro())
                .with_icon("add")
                .with_order(1)
                .requires(PermissionLevel::Write),
        );
        let view = Arc::clone(&editor);
        ctx.add_to_context_menu(
            MenuContribution::new(SAVE_MACROS_TEXT, move || view.save())
                .with_icon("save")
                .with_order(2)
                .requires(PermissionLevel::Write),
        );

        let view = Arc::clone(&editor);
        ctx.add_to_context_menu(
            MenuContribution::new(REMOVE_MACRO_TEXT, move || view.remove_selected())
                .with_icon("delete")
                .with_order(3)
                .requires(PermissionLevel::Write),
        );

        let view = Arc::clone(&editor);
        ctx.subscribe(EVENT_MACRO_UPDATED, move |_| Ok(view.sync()?));

        fill_slot(&self.editor, editor)
    }
}
