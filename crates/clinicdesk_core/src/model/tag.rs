//! Categorized tags managed from the administration workbench.

use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const CATEGORY_MAX_CHARS: usize = 40;
const NAME_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    /// Tag family, e.g. `pathology` or `picture`.
    pub category: String,
    pub name: String,
}

impl Tag {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("category", &self.category, CATEGORY_MAX_CHARS)?;
        Self::validate_name(&self.name)
    }

    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        require_text("name", name, NAME_MAX_CHARS)
    }
}
