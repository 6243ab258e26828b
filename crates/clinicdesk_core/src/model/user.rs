//! Practitioner accounts able to open a session.

use crate::model::{require_text, ValidationError};
use crate::security::permission::PermissionLevel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const NAME_MAX_CHARS: usize = 80;
const LOGIN_MAX_CHARS: usize = 40;

/// Stored user, without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub login: String,
    pub permission: PermissionLevel,
}

impl User {
    /// Name shown in the status bar and session context.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

/// Input for creating a user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub login: String,
    pub password: String,
    pub permission: PermissionLevel,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("first_name", &self.first_name, NAME_MAX_CHARS)?;
        require_text("last_name", &self.last_name, NAME_MAX_CHARS)?;
        require_text("login", &self.login, LOGIN_MAX_CHARS)?;
        if self.login.trim().chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidCharacters("login"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::BlankField("password"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::NewUser;
    use crate::model::ValidationError;
    use crate::security::permission::PermissionLevel;

    fn new_user() -> NewUser {
        NewUser {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            login: "ada".to_string(),
            password: "secret".to_string(),
            permission: PermissionLevel::Write,
        }
    }

    #[test]
    fn accepts_complete_user() {
        assert!(new_user().validate().is_ok());
    }

    #[test]
    fn rejects_login_with_inner_whitespace() {
        let mut user = new_user();
        user.login = "ada l".to_string();
        assert_eq!(
            user.validate(),
            Err(ValidationError::InvalidCharacters("login"))
        );
    }

    #[test]
    fn rejects_empty_password() {
        let mut user = new_user();
        user.password.clear();
        assert_eq!(user.validate(), Err(ValidationError::BlankField("password")));
    }
}
