//! Process-wide permission gate for the authenticated session.
//!
//! # Responsibility
//! - Hold the single current session (set at login, cleared at logout).
//! - Answer `is_granted(required)` for menu enablement and action checks.
//!
//! # Invariants
//! - No session means level `None`.
//! - Evaluation is read-only: repeated calls with unchanged state agree.
//! - `PermissionLevel::None` requirements are always granted.

use crate::security::permission::PermissionLevel;
use log::info;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub display_name: String,
    pub level: PermissionLevel,
}

impl SessionContext {
    pub fn new(user_id: Uuid, display_name: impl Into<String>, level: PermissionLevel) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            level,
        }
    }
}

/// Permission gate shared by the host and all plugins.
#[derive(Debug, Default)]
pub struct DoorKeeper {
    session: RwLock<Option<SessionContext>>,
}

impl DoorKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `session` as the current session, replacing any previous one.
    pub fn login(&self, session: SessionContext) {
        info!(
            "event=session_login module=security status=ok user_id={} level={}",
            session.user_id, session.level
        );
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Clears the current session and returns it.
    pub fn logout(&self) -> Option<SessionContext> {
        let previous = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = previous.as_ref() {
            info!(
                "event=session_logout module=security status=ok user_id={}",
                session.user_id
            );
        }
        previous
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> Option<SessionContext> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current_level(&self) -> PermissionLevel {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(PermissionLevel::None, |session| session.level)
    }

    /// Grants iff the current session level is at least `required`.
    pub fn is_granted(&self, required: PermissionLevel) -> bool {
        self.current_level().satisfies(required)
    }
}

#[cfg(test)]
mod tests {
    use super::{DoorKeeper, SessionContext};
    use crate::security::permission::PermissionLevel;
    use uuid::Uuid;

    fn session(level: PermissionLevel) -> SessionContext {
        SessionContext::new(Uuid::new_v4(), "Dr. Test", level)
    }

    #[test]
    fn anonymous_gate_only_grants_none() {
        let keeper = DoorKeeper::new();
        assert!(!keeper.is_authenticated());
        assert!(keeper.is_granted(PermissionLevel::None));
        assert!(!keeper.is_granted(PermissionLevel::Read));
    }

    #[test]
    fn grants_follow_session_level() {
        let keeper = DoorKeeper::new();
        keeper.login(session(PermissionLevel::Write));

        assert!(keeper.is_granted(PermissionLevel::Read));
        assert!(keeper.is_granted(PermissionLevel::Write));
        assert!(!keeper.is_granted(PermissionLevel::Admin));
    }

    #[test]
    fn repeated_checks_are_stable() {
        let keeper = DoorKeeper::new();
        keeper.login(session(PermissionLevel::Read));
        for _ in 0..5 {
            assert!(keeper.is_granted(PermissionLevel::Read));
            assert!(!keeper.is_granted(PermissionLevel::Write));
        }
    }

    #[test]
    fn logout_drops_back_to_none() {
        let keeper = DoorKeeper::new();
        let original = session(PermissionLevel::Admin);
        keeper.login(original.clone());
        assert_eq!(keeper.logout(), Some(original));
        assert_eq!(keeper.current_level(), PermissionLevel::None);
        assert!(keeper.logout().is_none());
    }
}
