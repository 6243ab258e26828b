//! Domain data-access capabilities and their SQLite implementations.
//!
//! # Responsibility
//! - Define one capability trait per domain area (users, macros, tags,
//!   pictures), resolved by plugins through the component factory.
//! - Keep SQL inside this boundary.
//!
//! # Invariants
//! - Every method takes the caller's open `UnitOfWork`; there is no other
//!   route to the connection.
//! - Write paths validate records before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::factory::{ComponentFactory, FactoryError};
use crate::model::ValidationError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub mod macro_repo;
pub mod picture_repo;
pub mod tag_repo;
pub mod user_repo;

pub use macro_repo::{MacroRepository, SqliteMacroRepository};
pub use picture_repo::{PictureRepository, SqlitePictureRepository};
pub use tag_repo::{SqliteTagRepository, TagRepository};
pub use user_repo::{SqliteUserRepository, UserRepository};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository failure, raised inside a unit of work.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound(Uuid),
    /// Unique constraint clash, e.g. an existing login.
    Conflict(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Conflict(message) => write!(f, "conflicting record: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Conflict(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Registers the SQLite implementation of every domain capability.
pub fn register_default_components(factory: &mut ComponentFactory) -> Result<(), FactoryError> {
    factory.register_instance::<dyn UserRepository>(Arc::new(SqliteUserRepository))?;
    factory.register_instance::<dyn MacroRepository>(Arc::new(SqliteMacroRepository))?;
    factory.register_instance::<dyn TagRepository>(Arc::new(SqliteTagRepository))?;
    factory.register_instance::<dyn PictureRepository>(Arc::new(SqlitePictureRepository))?;
    Ok(())
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

/// Maps unique-constraint failures to `Conflict`, everything else to `Db`.
pub(crate) fn map_write_error(err: rusqlite::Error, conflict: impl FnOnce() -> String) -> RepoError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            RepoError::Conflict(conflict())
        }
        _ => err.into(),
    }
}
