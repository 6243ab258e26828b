//! Shared shell contracts: menus, navigation, status reporting.

pub mod contribution;
pub mod headless;
pub mod navigation;
pub mod status;

pub use contribution::{
    ActionError, CommandResult, ContributionRegistry, MenuContribution, MenuEntry, MenuKind,
};
pub use headless::HeadlessShell;
pub use navigation::{NavigationEntry, NavigationHost, NavigationTarget, View};
pub use status::{StatusBoard, StatusLevel, StatusLine, StatusSink};

/// Surface the contribution registry renders into.
pub trait ShellSurface {
    fn render_application_menu(&mut self, entries: Vec<MenuEntry>);
    fn render_context_menu(&mut self, entries: Vec<MenuEntry>);
}
