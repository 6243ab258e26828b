//! Menu contributions and the registry that orders and renders them.
//!
//! # Responsibility
//! - Collect application-menu and context-menu contributions per plugin.
//! - Render them into a shell surface in a stable, key-ordered sequence.
//! - Bind each rendered entry to the permission gate.
//!
//! # Invariants
//! - Render order is ascending `order`; equal keys keep registration order.
//! - Entries that are not granted are rendered disabled, never hidden.
//! - Enablement is re-read from the gate on every query.
//! - Invoking a disabled entry never runs its command.

use crate::db::DbError;
use crate::repo::RepoError;
use crate::security::door_keeper::DoorKeeper;
use crate::security::permission::PermissionLevel;
use crate::shell::ShellSurface;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub type CommandResult = Result<(), ActionError>;

type Command = Arc<dyn Fn() -> CommandResult + Send + Sync>;

/// Failure of a contributed action.
#[derive(Debug)]
pub enum ActionError {
    /// The gate refused the action; the command did not run.
    Denied {
        action: String,
        required: PermissionLevel,
    },
    /// Data operation failed and its unit of work was rolled back.
    Data(RepoError),
    Failed(String),
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Denied { action, required } => {
                write!(f, "`{action}` requires {required} permission")
            }
            Self::Data(err) => write!(f, "data operation failed: {err}"),
            Self::Failed(message) => write!(f, "action failed: {message}"),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Data(err) => Some(err),
            Self::Denied { .. } | Self::Failed(_) => None,
        }
    }
}

impl From<RepoError> for ActionError {
    fn from(value: RepoError) -> Self {
        Self::Data(value)
    }
}

impl From<DbError> for ActionError {
    fn from(value: DbError) -> Self {
        Self::Data(RepoError::Db(value))
    }
}

/// Which shell collection a contribution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Application,
    Context,
}

impl MenuKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Context => "context",
        }
    }
}

/// A menu entry offered by a plugin.
#[derive(Clone)]
pub struct MenuContribution {
    text: String,
    icon: Option<String>,
    order: i32,
    required: PermissionLevel,
    command: Command,
}

impl MenuContribution {
    pub fn new(
        text: impl Into<String>,
        command: impl Fn() -> CommandResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            text: text.into(),
            icon: None,
            order: 0,
            required: PermissionLevel::None,
            command: Arc::new(command),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn requires(mut self, level: PermissionLevel) -> Self {
        self.required = level;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn required(&self) -> PermissionLevel {
        self.required
    }
}

impl Debug for MenuContribution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuContribution")
            .field("text", &self.text)
            .field("icon", &self.icon)
            .field("order", &self.order)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Rendered menu entry bound to the permission gate.
#[derive(Clone)]
pub struct MenuEntry {
    contribution: MenuContribution,
    owner: String,
    door_keeper: Arc<DoorKeeper>,
}

impl MenuEntry {
    pub fn text(&self) -> &str {
        &self.contribution.text
    }

    pub fn icon(&self) -> Option<&str> {
        self.contribution.icon.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.contribution.order
    }

    pub fn required(&self) -> PermissionLevel {
        self.contribution.required
    }

    /// Id of the plugin that contributed this entry.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Asks the gate; never cached.
    pub fn is_enabled(&self) -> bool {
        self.door_keeper.is_granted(self.contribution.required)
    }

    /// Runs the bound command when the gate grants it.
    pub fn invoke(&self) -> CommandResult {
        if !self.is_enabled() {
            warn!(
                "event=menu_invoke module=shell status=error owner={} action={} reason=denied required={}",
                self.owner, self.contribution.text, self.contribution.required
            );
            return Err(ActionError::Denied {
                action: self.contribution.text.clone(),
                required: self.contribution.required,
            });
        }

        debug!(
            "event=menu_invoke module=shell status=start owner={} action={}",
            self.owner, self.contribution.text
        );
        (self.contribution.command)()
    }
}

impl Debug for MenuEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuEntry")
            .field("contribution", &self.contribution)
            .field("owner", &self.owner)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

struct Registered {
    owner: String,
    contribution: MenuContribution,
}

/// Application-menu and context-menu collections.
pub struct ContributionRegistry {
    door_keeper: Arc<DoorKeeper>,
    application: Vec<Registered>,
    context: Vec<Registered>,
}

impl ContributionRegistry {
    pub fn new(door_keeper: Arc<DoorKeeper>) -> Self {
        Self {
            door_keeper,
            application: Vec::new(),
            context: Vec::new(),
        }
    }

    pub fn register_application_menu(&mut self, owner: &str, contribution: MenuContribution) {
        self.register(MenuKind::Application, owner, contribution);
    }

    pub fn register_context_menu(&mut self, owner: &str, contribution: MenuContribution) {
        self.register(MenuKind::Context, owner, contribution);
    }

    pub fn register(&mut self, kind: MenuKind, owner: &str, contribution: MenuContribution) {
        debug!(
            "event=menu_register module=shell status=ok kind={} owner={owner} text={} order={}",
            kind.as_str(),
            contribution.text,
            contribution.order
        );
        self.collection_mut(kind).push(Registered {
            owner: owner.to_string(),
            contribution,
        });
    }

    /// Entries of `kind` in render order.
    pub fn entries(&self, kind: MenuKind) -> Vec<MenuEntry> {
        let mut entries: Vec<MenuEntry> = self
            .collection(kind)
            .iter()
            .map(|registered| MenuEntry {
                contribution: registered.contribution.clone(),
                owner: registered.owner.clone(),
                door_keeper: Arc::clone(&self.door_keeper),
            })
            .collect();
        // `sort_by_key` is stable, so equal keys keep registration order.
        entries.sort_by_key(MenuEntry::order);
        entries
    }

    pub fn render_into(&self, shell: &mut dyn ShellSurface) {
        shell.render_application_menu(self.entries(MenuKind::Application));
        shell.render_context_menu(self.entries(MenuKind::Context));
    }

    /// Drops every contribution owned by `owner`. Returns how many.
    pub fn remove_owner(&mut self, owner: &str) -> usize {
        let before = self.len();
        self.application.retain(|registered| registered.owner != owner);
        self.context.retain(|registered| registered.owner != owner);
        before - self.len()
    }

    pub fn len(&self) -> usize {
        self.application.len() + self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collection(&self, kind: MenuKind) -> &Vec<Registered> {
        match kind {
            MenuKind::Application => &self.application,
            MenuKind::Context => &self.context,
        }
    }

    fn collection_mut(&mut self, kind: MenuKind) -> &mut Vec<Registered> {
        match kind {
            MenuKind::Application => &mut self.application,
            MenuKind::Context => &mut self.context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActionError, ContributionRegistry, MenuContribution, MenuKind};
    use crate::security::door_keeper::{DoorKeeper, SessionContext};
    use crate::security::permission::PermissionLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    fn noop(text: &str, order: i32) -> MenuContribution {
        MenuContribution::new(text, || Ok(())).with_order(order)
    }

    #[test]
    fn orders_by_key_and_keeps_ties_stable() {
        let mut registry = ContributionRegistry::new(Arc::new(DoorKeeper::new()));
        registry.register_application_menu("p", noop("four", 4));
        registry.register_application_menu("p", noop("two-a", 2));
        registry.register_application_menu("p", noop("two-b", 2));
        registry.register_application_menu("p", noop("five", 5));

        let texts: Vec<String> = registry
            .entries(MenuKind::Application)
            .iter()
            .map(|entry| entry.text().to_string())
            .collect();
        assert_eq!(texts, vec!["two-a", "two-b", "four", "five"]);
    }

    #[test]
    fn application_and_context_collections_are_distinct() {
        let mut registry = ContributionRegistry::new(Arc::new(DoorKeeper::new()));
        registry.register_application_menu("p", noop("menu", 1));
        registry.register_context_menu("p", noop("ctx-1", 1));
        registry.register_context_menu("p", noop("ctx-2", 0));

        assert_eq!(registry.entries(MenuKind::Application).len(), 1);
        let context = registry.entries(MenuKind::Context);
        assert_eq!(context[0].text(), "ctx-2");
        assert_eq!(context[1].text(), "ctx-1");
    }

    #[test]
    fn enablement_follows_the_gate_without_reregistering() {
        let door_keeper = Arc::new(DoorKeeper::new());
        let mut registry = ContributionRegistry::new(Arc::clone(&door_keeper));
        registry.register_application_menu(
            "p",
            noop("edit", 1).requires(PermissionLevel::Write),
        );
        let entry = registry.entries(MenuKind::Application).remove(0);

        assert!(!entry.is_enabled());
        door_keeper.login(SessionContext::new(
            Uuid::new_v4(),
            "writer",
            PermissionLevel::Write,
        ));
        assert!(entry.is_enabled());
        door_keeper.logout();
        assert!(!entry.is_enabled());
    }

    #[test]
    fn denied_invoke_does_not_run_command() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut registry = ContributionRegistry::new(Arc::new(DoorKeeper::new()));
        registry.register_context_menu(
            "p",
            MenuContribution::new("purge", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .requires(PermissionLevel::Admin),
        );

        let entry = registry.entries(MenuKind::Context).remove(0);
        let err = entry.invoke().expect_err("must be denied");
        assert!(matches!(
            err,
            ActionError::Denied {
                required: PermissionLevel::Admin,
                ..
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn remove_owner_drops_only_that_plugin() {
        let mut registry = ContributionRegistry::new(Arc::new(DoorKeeper::new()));
        registry.register_application_menu("a", noop("a-menu", 1));
        registry.register_context_menu("a", noop("a-ctx", 1));
        registry.register_application_menu("b", noop("b-menu", 2));

        assert_eq!(registry.remove_owner("a"), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries(MenuKind::Application)[0].owner(), "b");
    }
}
