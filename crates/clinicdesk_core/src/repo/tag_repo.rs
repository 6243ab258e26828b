//! Categorized tag persistence.
//!
//! # Invariants
//! - `(category, name)` is unique.
//! - Categories and names are stored trimmed; categories lowercase.

use crate::db::UnitOfWork;
use crate::model::tag::Tag;
use crate::repo::{map_write_error, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use uuid::Uuid;

/// Tag capability.
pub trait TagRepository: Send + Sync {
    fn create_tag(&self, uow: &UnitOfWork<'_>, category: &str, name: &str) -> RepoResult<Tag>;
    /// Tags sorted by category then name, optionally limited to one category.
    fn list_tags(&self, uow: &UnitOfWork<'_>, category: Option<&str>) -> RepoResult<Vec<Tag>>;
    fn rename_tag(&self, uow: &UnitOfWork<'_>, id: Uuid, name: &str) -> RepoResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteTagRepository;

impl TagRepository for SqliteTagRepository {
    fn create_tag(&self, uow: &UnitOfWork<'_>, category: &str, name: &str) -> RepoResult<Tag> {
        let tag = Tag {
            id: Uuid::new_v4(),
            category: category.trim().to_lowercase(),
            name: name.trim().to_string(),
        };
        tag.validate()?;

        uow.connection()
            .execute(
                "INSERT INTO tags (uuid, category, name) VALUES (?1, ?2, ?3);",
                params![tag.id.to_string(), tag.category.as_str(), tag.name.as_str()],
            )
            .map_err(|err| {
                map_write_error(err, || {
                    format!("tag `{}` already exists in `{}`", tag.name, tag.category)
                })
            })?;
        Ok(tag)
    }

    fn list_tags(&self, uow: &UnitOfWork<'_>, category: Option<&str>) -> RepoResult<Vec<Tag>> {
        let mut sql = String::from("SELECT uuid, category, name FROM tags WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(category) = category {
            sql.push_str(" AND category = ?");
            bind_values.push(Value::Text(category.trim().to_lowercase()));
        }
        sql.push_str(" ORDER BY category ASC, name COLLATE NOCASE ASC, uuid ASC;");

        let mut stmt = uow.connection().prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tags = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            tags.push(Tag {
                id: parse_uuid(&uuid_text, "tags.uuid")?,
                category: row.get("category")?,
                name: row.get("name")?,
            });
        }
        Ok(tags)
    }

    fn rename_tag(&self, uow: &UnitOfWork<'_>, id: Uuid, name: &str) -> RepoResult<()> {
        let name = name.trim();
        Tag::validate_name(name)?;

        let changed = uow
            .connection()
            .execute(
                "UPDATE tags SET name = ?2 WHERE uuid = ?1;",
                params![id.to_string(), name],
            )
            .map_err(|err| map_write_error(err, || format!("tag name `{name}` is taken")))?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}
