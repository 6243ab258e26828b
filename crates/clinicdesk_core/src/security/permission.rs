//! Ordered permission levels used to gate contributed actions.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Access tier held by a session and required by an action.
///
/// Declaration order is the grant order: `None < Read < Write < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    #[default]
    None,
    Read,
    Write,
    Admin,
}

/// Stored string value for [`PermissionLevel::None`].
pub const PERMISSION_NONE: &str = "none";
/// Stored string value for [`PermissionLevel::Read`].
pub const PERMISSION_READ: &str = "read";
/// Stored string value for [`PermissionLevel::Write`].
pub const PERMISSION_WRITE: &str = "write";
/// Stored string value for [`PermissionLevel::Admin`].
pub const PERMISSION_ADMIN: &str = "admin";

impl PermissionLevel {
    /// Stable id used in storage and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => PERMISSION_NONE,
            Self::Read => PERMISSION_READ,
            Self::Write => PERMISSION_WRITE,
            Self::Admin => PERMISSION_ADMIN,
        }
    }

    /// Whether a session holding `self` may perform an action requiring
    /// `required`.
    pub fn satisfies(self, required: PermissionLevel) -> bool {
        self >= required
    }
}

impl Display for PermissionLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one permission level from its stored string value.
pub fn parse_permission_level(value: &str) -> Result<PermissionLevel, PermissionParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(PermissionParseError::Empty);
    }

    match normalized {
        PERMISSION_NONE => Ok(PermissionLevel::None),
        PERMISSION_READ => Ok(PermissionLevel::Read),
        PERMISSION_WRITE => Ok(PermissionLevel::Write),
        PERMISSION_ADMIN => Ok(PermissionLevel::Admin),
        other => Err(PermissionParseError::Unsupported(other.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionParseError {
    Empty,
    Unsupported(String),
}

impl Display for PermissionParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "permission level must not be empty"),
            Self::Unsupported(value) => write!(f, "permission level is unsupported: {value}"),
        }
    }
}

impl Error for PermissionParseError {}

#[cfg(test)]
mod tests {
    use super::{parse_permission_level, PermissionLevel, PermissionParseError};

    const ALL: [PermissionLevel; 4] = [
        PermissionLevel::None,
        PermissionLevel::Read,
        PermissionLevel::Write,
        PermissionLevel::Admin,
    ];

    #[test]
    fn levels_are_totally_ordered() {
        assert!(PermissionLevel::None < PermissionLevel::Read);
        assert!(PermissionLevel::Read < PermissionLevel::Write);
        assert!(PermissionLevel::Write < PermissionLevel::Admin);
    }

    #[test]
    fn satisfies_is_an_ordering_comparison() {
        for held in ALL {
            for required in ALL {
                assert_eq!(held.satisfies(required), held >= required);
            }
        }
    }

    #[test]
    fn parses_every_stored_value() {
        for level in ALL {
            assert_eq!(parse_permission_level(level.as_str()).unwrap(), level);
        }
    }

    #[test]
    fn rejects_empty_and_unknown_values() {
        assert_eq!(
            parse_permission_level("  "),
            Err(PermissionParseError::Empty)
        );
        assert_eq!(
            parse_permission_level("Root"),
            Err(PermissionParseError::Unsupported("Root".to_string()))
        );
    }
}
