//! Picture metadata. Image bytes live outside the records store.

use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PATIENT_MAX_CHARS: usize = 120;
const FILE_NAME_MAX_CHARS: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PictureInfo {
    pub id: Uuid,
    /// Patient label the picture is filed under.
    pub patient: String,
    pub file_name: String,
    pub tag_id: Option<Uuid>,
    pub created_at: i64,
}

impl PictureInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("patient", &self.patient, PATIENT_MAX_CHARS)?;
        require_text("file_name", &self.file_name, FILE_NAME_MAX_CHARS)?;
        if self.file_name.contains(['/', '\\']) {
            return Err(ValidationError::InvalidCharacters("file_name"));
        }
        Ok(())
    }
}
