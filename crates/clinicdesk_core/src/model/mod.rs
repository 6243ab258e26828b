//! Domain records consumed by the first-party plugins.
//!
//! # Responsibility
//! - Define the user, macro, tag, and picture records.
//! - Validate record invariants before they reach storage.
//!
//! # Invariants
//! - Every record is identified by a stable `Uuid`.
//! - Write paths call `validate()` before persistence.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod picture;
pub mod tag;
pub mod text_macro;
pub mod user;

/// Field-level validation failures shared by all records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trimming.
    BlankField(&'static str),
    /// Text field exceeds its maximum character count.
    TooLong { field: &'static str, max_chars: usize },
    /// Field contains characters that are not allowed.
    InvalidCharacters(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "`{field}` must not be blank"),
            Self::TooLong { field, max_chars } => {
                write!(f, "`{field}` must be at most {max_chars} characters")
            }
            Self::InvalidCharacters(field) => {
                write!(f, "`{field}` contains unsupported characters")
            }
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    if value.chars().count() > max_chars {
        return Err(ValidationError::TooLong { field, max_chars });
    }
    Ok(())
}
