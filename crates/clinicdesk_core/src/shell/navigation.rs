//! Navigation host: the shell's single active view plus a bounded history.
//!
//! # Invariants
//! - Exactly one target is current; the host starts on the main menu.
//! - `navigate` and `show_main_menu` replace the current target.
//! - History keeps at most `max_depth` previous targets, oldest dropped first.

use log::info;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

pub const DEFAULT_HISTORY_DEPTH: usize = 16;

const STARTUP_ENTRY_POINT: &str = "startup";
const MAIN_MENU_ENTRY_POINT: &str = "main_menu";

/// A plugin-supplied view the shell can display.
pub trait View: Send + Sync {
    fn name(&self) -> &str;

    /// Called after the view becomes current.
    fn on_navigated_to(&self) {}
}

#[derive(Clone)]
pub enum NavigationTarget {
    MainMenu,
    View(Arc<dyn View>),
}

impl NavigationTarget {
    pub fn is_main_menu(&self) -> bool {
        matches!(self, Self::MainMenu)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::MainMenu => "main_menu",
            Self::View(view) => view.name(),
        }
    }
}

impl Debug for NavigationTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MainMenu => f.write_str("MainMenu"),
            Self::View(view) => f.debug_tuple("View").field(&view.name()).finish(),
        }
    }
}

/// Current target plus the entry point that reached it.
#[derive(Debug, Clone)]
pub struct NavigationEntry {
    pub target: NavigationTarget,
    pub entry_point: String,
}

struct NavigationState {
    current: NavigationEntry,
    history: VecDeque<NavigationEntry>,
}

pub struct NavigationHost {
    state: Mutex<NavigationState>,
    max_depth: usize,
}

impl Default for NavigationHost {
    fn default() -> Self {
        Self::with_depth(DEFAULT_HISTORY_DEPTH)
    }
}

impl NavigationHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            state: Mutex::new(NavigationState {
                current: NavigationEntry {
                    target: NavigationTarget::MainMenu,
                    entry_point: STARTUP_ENTRY_POINT.to_string(),
                },
                history: VecDeque::new(),
            }),
            max_depth,
        }
    }

    /// Makes `view` current.
    pub fn navigate(&self, view: Arc<dyn View>, entry_point: &str) {
        self.replace(NavigationEntry {
            target: NavigationTarget::View(Arc::clone(&view)),
            entry_point: entry_point.to_string(),
        });
        view.on_navigated_to();
    }

    pub fn show_main_menu(&self) {
        self.replace(NavigationEntry {
            target: NavigationTarget::MainMenu,
            entry_point: MAIN_MENU_ENTRY_POINT.to_string(),
        });
    }

    pub fn current(&self) -> NavigationEntry {
        self.lock().current.clone()
    }

    /// Name of the current view, `None` on the main menu.
    pub fn current_view_name(&self) -> Option<String> {
        match &self.lock().current.target {
            NavigationTarget::MainMenu => None,
            NavigationTarget::View(view) => Some(view.name().to_string()),
        }
    }

    /// Restores the previous target. Returns `false` when history is empty.
    pub fn go_back(&self) -> bool {
        let restored = {
            let mut state = self.lock();
            let Some(previous) = state.history.pop_back() else {
                return false;
            };
            state.current = previous.clone();
            previous
        };
        info!(
            "event=navigate_back module=shell status=ok target={}",
            restored.target.name()
        );
        if let NavigationTarget::View(view) = &restored.target {
            view.on_navigated_to();
        }
        true
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    fn replace(&self, next: NavigationEntry) {
        info!(
            "event=navigate module=shell status=ok target={} entry_point={}",
            next.target.name(),
            next.entry_point
        );
        let mut state = self.lock();
        let previous = std::mem::replace(&mut state.current, next);
        if self.max_depth == 0 {
            return;
        }
        if state.history.len() == self.max_depth {
            state.history.pop_front();
        }
        state.history.push_back(previous);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
