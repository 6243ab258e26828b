//! User accounts and credential checks.
//!
//! # Invariants
//! - Logins are unique, case-insensitively.
//! - Passwords are stored as salted SHA-256 digests, never in clear.

use crate::db::UnitOfWork;
use crate::model::user::{NewUser, User};
use crate::repo::{map_write_error, parse_uuid, RepoError, RepoResult};
use crate::security::permission::parse_permission_level;
use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT uuid, first_name, last_name, login, permission FROM users";

/// User account capability.
pub trait UserRepository: Send + Sync {
    fn create_user(&self, uow: &UnitOfWork<'_>, user: &NewUser) -> RepoResult<User>;
    /// All users sorted by last name, then first name.
    fn list_users(&self, uow: &UnitOfWork<'_>) -> RepoResult<Vec<User>>;
    fn find_by_login(&self, uow: &UnitOfWork<'_>, login: &str) -> RepoResult<Option<User>>;
    /// Returns the user when `password` matches, `None` otherwise.
    fn can_connect(
        &self,
        uow: &UnitOfWork<'_>,
        login: &str,
        password: &str,
    ) -> RepoResult<Option<User>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteUserRepository;

impl UserRepository for SqliteUserRepository {
    fn create_user(&self, uow: &UnitOfWork<'_>, user: &NewUser) -> RepoResult<User> {
        user.validate()?;

        let id = Uuid::new_v4();
        let login = user.login.trim().to_string();
        uow.connection()
            .execute(
                "INSERT INTO users (uuid, first_name, last_name, login, password_hash, permission)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    id.to_string(),
                    user.first_name.trim(),
                    user.last_name.trim(),
                    login.as_str(),
                    password_digest(id, &user.password),
                    user.permission.as_str(),
                ],
            )
            .map_err(|err| map_write_error(err, || format!("login `{login}` is already taken")))?;

        Ok(User {
            id,
            first_name: user.first_name.trim().to_string(),
            last_name: user.last_name.trim().to_string(),
            login,
            permission: user.permission,
        })
    }

    fn list_users(&self, uow: &UnitOfWork<'_>) -> RepoResult<Vec<User>> {
        let mut stmt = uow.connection().prepare(&format!(
            "{USER_SELECT_SQL}
             ORDER BY last_name COLLATE NOCASE ASC, first_name COLLATE NOCASE ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn find_by_login(&self, uow: &UnitOfWork<'_>, login: &str) -> RepoResult<Option<User>> {
        let mut stmt = uow
            .connection()
            .prepare(&format!("{USER_SELECT_SQL} WHERE login = ?1;"))?;
        let mut rows = stmt.query([login.trim()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_user_row(row)?)),
            None => Ok(None),
        }
    }

    fn can_connect(
        &self,
        uow: &UnitOfWork<'_>,
        login: &str,
        password: &str,
    ) -> RepoResult<Option<User>> {
        let stored: Option<(String, String)> = uow
            .connection()
            .query_row(
                "SELECT uuid, password_hash FROM users WHERE login = ?1;",
                [login.trim()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((uuid_text, hash)) = stored else {
            return Ok(None);
        };
        let id = parse_uuid(&uuid_text, "users.uuid")?;
        if password_digest(id, password) != hash {
            return Ok(None);
        }
        self.find_by_login(uow, login)
    }
}

fn password_digest(id: Uuid, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    let permission_text: String = row.get("permission")?;
    let permission = parse_permission_level(&permission_text).map_err(|err| {
        RepoError::InvalidData(format!("{err} in users.permission"))
    })?;

    Ok(User {
        id: parse_uuid(&uuid_text, "users.uuid")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        login: row.get("login")?,
        permission,
    })
}
