//! Transactional unit-of-work scopes over one data session.
//!
//! # Responsibility
//! - Serialize access to the session's SQLite connection.
//! - Guarantee commit-or-rollback and connection release on every exit path.
//!
//! # Invariants
//! - At most one unit of work is open per `DataSession` at any time.
//! - Nested acquisition from the thread that already holds the scope is a
//!   contract violation and panics; other threads block until release.
//! - A unit of work is finished exactly once: commit, rollback, or drop
//!   (which rolls back).
//! - The connection is reachable only through an open unit of work.

use crate::db::{open_db, open_db_in_memory, DbError, DbResult};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;
use uuid::Uuid;

/// One persistent-store session shared by the host and every plugin.
///
/// `DataSession` is `Send + Sync`; long-running work can move to a worker
/// thread, which then acquires its own unit of work.
#[derive(Debug)]
pub struct DataSession {
    conn: Mutex<Connection>,
    owner: Mutex<Option<ThreadId>>,
}

impl DataSession {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            owner: Mutex::new(None),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        open_db(path).map(Self::new)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        open_db_in_memory().map(Self::new)
    }

    /// Opens a unit of work, blocking while another thread holds one.
    ///
    /// # Panics
    /// Panics when the calling thread already holds a unit of work on this
    /// session. Nested scopes are not supported.
    pub fn acquire(&self) -> DbResult<UnitOfWork<'_>> {
        let caller = thread::current().id();
        if self.owner() == Some(caller) {
            panic!(
                "nested unit of work: the current thread already holds a scope on this data session"
            );
        }

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        self.set_owner(Some(caller));
        if let Err(err) = conn.execute_batch("BEGIN IMMEDIATE;") {
            self.set_owner(None);
            error!("event=uow_begin module=db status=error error={err}");
            return Err(err.into());
        }

        let scope_id = Uuid::new_v4();
        debug!("event=uow_begin module=db status=ok scope_id={scope_id}");
        Ok(UnitOfWork {
            session: self,
            conn,
            scope_id,
            started_at: Instant::now(),
            finished: false,
        })
    }

    /// Runs `body` inside a fresh unit of work.
    ///
    /// Commits when `body` returns `Ok`, rolls back when it returns `Err` or
    /// panics. The connection is released before this function returns.
    pub fn run<T, E>(&self, body: impl FnOnce(&UnitOfWork<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let uow = self.acquire()?;
        match body(&uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(err) => {
                let scope_id = uow.scope_id();
                if let Err(rollback_err) = uow.rollback() {
                    error!(
                        "event=uow_rollback module=db status=error scope_id={scope_id} error={rollback_err}"
                    );
                }
                Err(err)
            }
        }
    }

    /// Whether the calling thread currently holds a unit of work here.
    pub fn is_in_scope(&self) -> bool {
        self.owner() == Some(thread::current().id())
    }

    fn owner(&self) -> Option<ThreadId> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_owner(&self, owner: Option<ThreadId>) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = owner;
    }
}

/// Open transaction on a [`DataSession`].
///
/// Dropping an unfinished unit of work rolls it back.
pub struct UnitOfWork<'s> {
    session: &'s DataSession,
    conn: MutexGuard<'s, Connection>,
    scope_id: Uuid,
    started_at: Instant,
    finished: bool,
}

impl UnitOfWork<'_> {
    /// Connection bound to this scope's transaction.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    /// Commits the transaction. On failure the transaction is rolled back
    /// and the commit error returned.
    pub fn commit(mut self) -> DbResult<()> {
        self.finished = true;
        if let Err(err) = self.conn.execute_batch("COMMIT;") {
            error!(
                "event=uow_commit module=db status=error scope_id={} error={}",
                self.scope_id, err
            );
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK;") {
                error!(
                    "event=uow_rollback module=db status=error scope_id={} error={}",
                    self.scope_id, rollback_err
                );
            }
            return Err(err.into());
        }

        debug!(
            "event=uow_commit module=db status=ok scope_id={} duration_ms={}",
            self.scope_id,
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Rolls the transaction back explicitly.
    pub fn rollback(mut self) -> DbResult<()> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK;")?;
        debug!(
            "event=uow_rollback module=db status=ok scope_id={} duration_ms={}",
            self.scope_id,
            self.started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            match self.conn.execute_batch("ROLLBACK;") {
                Ok(()) => warn!(
                    "event=uow_rollback module=db status=ok scope_id={} reason=dropped_uncommitted",
                    self.scope_id
                ),
                Err(err) => error!(
                    "event=uow_rollback module=db status=error scope_id={} error={}",
                    self.scope_id, err
                ),
            }
        }
        self.session.set_owner(None);
    }
}

#[cfg(test)]
mod tests {
    use super::DataSession;
    use crate::db::DbError;
    use std::sync::Arc;

    fn session_with_scratch_table() -> DataSession {
        let session = DataSession::open_in_memory().unwrap();
        session
            .run(|uow| {
                uow.connection()
                    .execute_batch("CREATE TABLE scratch (value INTEGER NOT NULL);")
                    .map_err(DbError::from)
            })
            .unwrap();
        session
    }

    fn count_rows(session: &DataSession) -> i64 {
        session
            .run(|uow| {
                uow.connection()
                    .query_row("SELECT COUNT(*) FROM scratch;", [], |row| row.get(0))
                    .map_err(DbError::from)
            })
            .unwrap()
    }

    #[test]
    fn committed_writes_are_visible_to_later_scopes() {
        let session = session_with_scratch_table();
        let uow = session.acquire().unwrap();
        uow.connection()
            .execute("INSERT INTO scratch (value) VALUES (1);", [])
            .unwrap();
        uow.commit().unwrap();

        assert_eq!(count_rows(&session), 1);
        assert!(!session.is_in_scope());
    }

    #[test]
    fn dropped_scope_rolls_back() {
        let session = session_with_scratch_table();
        {
            let uow = session.acquire().unwrap();
            assert!(session.is_in_scope());
            uow.connection()
                .execute("INSERT INTO scratch (value) VALUES (1);", [])
                .unwrap();
        }
        assert!(!session.is_in_scope());
        assert_eq!(count_rows(&session), 0);
    }

    #[test]
    fn run_rolls_back_when_body_fails() {
        let session = session_with_scratch_table();
        let result: Result<(), DbError> = session.run(|uow| {
            uow.connection()
                .execute("INSERT INTO scratch (value) VALUES (1);", [])?;
            uow.connection()
                .execute("INSERT INTO scratch (value) VALUES (NULL);", [])?;
            Ok(())
        });

        assert!(matches!(result, Err(DbError::Sqlite(_))));
        assert_eq!(count_rows(&session), 0);
    }

    #[test]
    fn run_rolls_back_when_body_panics() {
        let session = session_with_scratch_table();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<(), DbError> = session.run(|uow| {
                uow.connection()
                    .execute("INSERT INTO scratch (value) VALUES (1);", [])?;
                panic!("body failed mid-transaction");
            });
        }));

        assert!(outcome.is_err());
        assert!(!session.is_in_scope());
        assert_eq!(count_rows(&session), 0);
    }

    #[test]
    #[should_panic(expected = "nested unit of work")]
    fn nested_acquisition_on_same_thread_panics() {
        let session = session_with_scratch_table();
        let _outer = session.acquire().unwrap();
        let _inner = session.acquire();
    }

    #[test]
    fn scopes_from_worker_threads_are_serialized() {
        let session = Arc::new(session_with_scratch_table());
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    for step in 0..25 {
                        session
                            .run(|uow| {
                                uow.connection()
                                    .execute(
                                        "INSERT INTO scratch (value) VALUES (?1);",
                                        [worker * 100 + step],
                                    )
                                    .map(|_| ())
                                    .map_err(DbError::from)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(count_rows(&session), 100);
    }
}
