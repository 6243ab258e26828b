//! In-memory shell surface used by the CLI and tests.

use crate::shell::contribution::{MenuEntry, MenuKind};
use crate::shell::ShellSurface;

/// Holds the last rendered menus.
#[derive(Debug, Default)]
pub struct HeadlessShell {
    application_menu: Vec<MenuEntry>,
    context_menu: Vec<MenuEntry>,
}

impl HeadlessShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self, kind: MenuKind) -> &[MenuEntry] {
        match kind {
            MenuKind::Application => &self.application_menu,
            MenuKind::Context => &self.context_menu,
        }
    }

    /// First rendered entry of `kind` whose text is `text`.
    pub fn find(&self, kind: MenuKind, text: &str) -> Option<&MenuEntry> {
        self.entries(kind).iter().find(|entry| entry.text() == text)
    }

    /// One line per entry: `[x] text (required)`, disabled entries as `[ ]`.
    pub fn describe(&self, kind: MenuKind) -> Vec<String> {
        self.entries(kind)
            .iter()
            .map(|entry| {
                format!(
                    "[{}] {} ({})",
                    if entry.is_enabled() { "x" } else { " " },
                    entry.text(),
                    entry.required()
                )
            })
            .collect()
    }
}

impl ShellSurface for HeadlessShell {
    fn render_application_menu(&mut self, entries: Vec<MenuEntry>) {
        self.application_menu = entries;
    }

    fn render_context_menu(&mut self, entries: Vec<MenuEntry>) {
        self.context_menu = entries;
    }
}

#[cfg(test)]
mod tests {
    use super::HeadlessShell;
    use crate::security::door_keeper::DoorKeeper;
    use crate::security::permission::PermissionLevel;
    use crate::shell::contribution::{ContributionRegistry, MenuContribution, MenuKind};
    use std::sync::Arc;

    #[test]
    fn renders_disabled_entries_instead_of_hiding_them() {
        let mut registry = ContributionRegistry::new(Arc::new(DoorKeeper::new()));
        registry.register_application_menu(
            "p",
            MenuContribution::new("Connection", || Ok(())).with_order(1),
        );
        registry.register_application_menu(
            "p",
            MenuContribution::new("Administration", || Ok(()))
                .with_order(4)
                .requires(PermissionLevel::Read),
        );

        let mut shell = HeadlessShell::new();
        registry.render_into(&mut shell);

        assert_eq!(
            shell.describe(MenuKind::Application),
            vec!["[x] Connection (none)", "[ ] Administration (read)"]
        );
        assert!(shell.find(MenuKind::Application, "Administration").is_some());
        assert!(shell.entries(MenuKind::Context).is_empty());
    }
}
