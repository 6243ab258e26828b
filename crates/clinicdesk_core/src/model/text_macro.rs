//! Reusable text macros for medical record entries.

use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 120;
const EXPRESSION_MAX_CHARS: usize = 20_000;

/// Title shown for a freshly created macro.
pub const DEFAULT_MACRO_TITLE: &str = "New macro";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMacro {
    pub id: Uuid,
    pub title: String,
    /// Macro body; its interpretation belongs to the medical record plugin.
    pub expression: String,
    /// Epoch milliseconds of the last write.
    pub updated_at: i64,
}

impl TextMacro {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title, TITLE_MAX_CHARS)?;
        if self.expression.chars().count() > EXPRESSION_MAX_CHARS {
            return Err(ValidationError::TooLong {
                field: "expression",
                max_chars: EXPRESSION_MAX_CHARS,
            });
        }
        Ok(())
    }
}
