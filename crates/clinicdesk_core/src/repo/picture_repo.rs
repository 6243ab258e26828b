//! Picture metadata persistence for the picture manager plugin.

use crate::db::UnitOfWork;
use crate::model::picture::PictureInfo;
use crate::repo::{parse_uuid, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use uuid::Uuid;

/// Picture metadata capability.
pub trait PictureRepository: Send + Sync {
    fn add_picture(
        &self,
        uow: &UnitOfWork<'_>,
        patient: &str,
        file_name: &str,
        tag_id: Option<Uuid>,
    ) -> RepoResult<PictureInfo>;
    /// Pictures newest first, optionally for one patient.
    fn list_pictures(
        &self,
        uow: &UnitOfWork<'_>,
        patient: Option<&str>,
    ) -> RepoResult<Vec<PictureInfo>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqlitePictureRepository;

impl PictureRepository for SqlitePictureRepository {
    fn add_picture(
        &self,
        uow: &UnitOfWork<'_>,
        patient: &str,
        file_name: &str,
        tag_id: Option<Uuid>,
    ) -> RepoResult<PictureInfo> {
        let mut picture = PictureInfo {
            id: Uuid::new_v4(),
            patient: patient.trim().to_string(),
            file_name: file_name.trim().to_string(),
            tag_id,
            created_at: 0,
        };
        picture.validate()?;

        picture.created_at = uow.connection().query_row(
            "INSERT INTO pictures (uuid, patient, file_name, tag_uuid)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING created_at;",
            params![
                picture.id.to_string(),
                picture.patient.as_str(),
                picture.file_name.as_str(),
                picture.tag_id.map(|id| id.to_string()),
            ],
            |row| row.get(0),
        )?;
        Ok(picture)
    }

    fn list_pictures(
        &self,
        uow: &UnitOfWork<'_>,
        patient: Option<&str>,
    ) -> RepoResult<Vec<PictureInfo>> {
        let mut sql =
            String::from("SELECT uuid, patient, file_name, tag_uuid, created_at FROM pictures");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(patient) = patient {
            sql.push_str(" WHERE patient = ?");
            bind_values.push(Value::Text(patient.trim().to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC, uuid ASC;");

        let mut stmt = uow.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut pictures = Vec::new();
        while let Some(row) = rows.next()? {
            pictures.push(parse_picture_row(row)?);
        }
        Ok(pictures)
    }
}

fn parse_picture_row(row: &Row<'_>) -> RepoResult<PictureInfo> {
    let uuid_text: String = row.get("uuid")?;
    let tag_id = match row.get::<_, Option<String>>("tag_uuid")? {
        Some(value) => Some(parse_uuid(&value, "pictures.tag_uuid")?),
        None => None,
    };
    Ok(PictureInfo {
        id: parse_uuid(&uuid_text, "pictures.uuid")?,
        patient: row.get("patient")?,
        file_name: row.get("file_name")?,
        tag_id,
        created_at: row.get("created_at")?,
    })
}
