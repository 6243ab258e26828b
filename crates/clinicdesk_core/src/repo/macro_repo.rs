//! Text macro persistence for the medical record plugin.

use crate::db::UnitOfWork;
use crate::model::text_macro::TextMacro;
use crate::repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Row};
use uuid::Uuid;

const MACRO_SELECT_SQL: &str = "SELECT uuid, title, expression, updated_at FROM macros";

/// Text macro capability.
pub trait MacroRepository: Send + Sync {
    /// Creates an empty macro titled `title`.
    fn create_macro(&self, uow: &UnitOfWork<'_>, title: &str) -> RepoResult<TextMacro>;
    /// All macros sorted by title.
    fn list_macros(&self, uow: &UnitOfWork<'_>) -> RepoResult<Vec<TextMacro>>;
    /// Writes every macro in `macros`; any missing id fails the whole batch.
    fn update_macros(&self, uow: &UnitOfWork<'_>, macros: &[TextMacro]) -> RepoResult<()>;
    fn remove_macro(&self, uow: &UnitOfWork<'_>, id: Uuid) -> RepoResult<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteMacroRepository;

impl MacroRepository for SqliteMacroRepository {
    fn create_macro(&self, uow: &UnitOfWork<'_>, title: &str) -> RepoResult<TextMacro> {
        let mut created = TextMacro {
            id: Uuid::new_v4(),
            title: title.trim().to_string(),
            expression: String::new(),
            updated_at: 0,
        };
        created.validate()?;

        created.updated_at = uow.connection().query_row(
            "INSERT INTO macros (uuid, title, expression)
             VALUES (?1, ?2, ?3)
             RETURNING updated_at;",
            params![
                created.id.to_string(),
                created.title.as_str(),
                created.expression.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(created)
    }

    fn list_macros(&self, uow: &UnitOfWork<'_>) -> RepoResult<Vec<TextMacro>> {
        let mut stmt = uow.connection().prepare(&format!(
            "{MACRO_SELECT_SQL} ORDER BY title COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut macros = Vec::new();
        while let Some(row) = rows.next()? {
            macros.push(parse_macro_row(row)?);
        }
        Ok(macros)
    }

    fn update_macros(&self, uow: &UnitOfWork<'_>, macros: &[TextMacro]) -> RepoResult<()> {
        for text_macro in macros {
            text_macro.validate()?;
            let changed = uow.connection().execute(
                "UPDATE macros
                 SET
                    title = ?2,
                    expression = ?3,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    text_macro.id.to_string(),
                    text_macro.title.trim(),
                    text_macro.expression.as_str()
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound(text_macro.id));
            }
        }
        Ok(())
    }

    fn remove_macro(&self, uow: &UnitOfWork<'_>, id: Uuid) -> RepoResult<()> {
        let changed = uow
            .connection()
            .execute("DELETE FROM macros WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_macro_row(row: &Row<'_>) -> RepoResult<TextMacro> {
    let uuid_text: String = row.get("uuid")?;
    let text_macro = TextMacro {
        id: parse_uuid(&uuid_text, "macros.uuid")?,
        title: row.get("title")?,
        expression: row.get("expression")?,
        updated_at: row.get("updated_at")?,
    };
    text_macro
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("{err} in macros")))?;
    Ok(text_macro)
}
