//! SQLite storage bootstrap, schema migrations, and units of work.
//!
//! # Responsibility
//! - Open and configure the SQLite connection behind a [`DataSession`].
//! - Apply schema migrations before any plugin can touch data.
//! - Provide the only path to a connection: an open [`UnitOfWork`].
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Domain reads/writes happen inside exactly one unit of work.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;
pub mod unit_of_work;

pub use open::{open_db, open_db_in_memory};
pub use unit_of_work::{DataSession, UnitOfWork};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
