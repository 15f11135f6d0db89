//! SQLite store for works, authors and agendas.
//!
//! Single-writer, multi-reader:
//! - writes go through a [`SyncSession`], of which at most one exists per
//!   store (in-process flag) and per database file (`<db>.lock`)
//! - each page is written inside one immediate transaction
//! - readers may open their own read-only connection; WAL mode keeps them
//!   unblocked while a sync runs

mod identity;
mod queries;
mod writer;

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, TransactionBehavior};

use crate::error::{StoreError, StoreResult};
use crate::models::NormalizedWork;

pub use queries::StoreStats;
pub use writer::{BatchOutcome, UpsertOutcome};

pub(crate) use queries::scope_filter;

/// How long a reader waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Local relational store.
pub struct Store {
    conn: Mutex<Connection>,

    /// Database file; `None` for in-memory stores.
    path: Option<PathBuf>,

    read_only: bool,

    /// Set while a [`SyncSession`] is alive.
    writer_active: AtomicBool,
}

impl Store {
    /// Open (creating if needed) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::init_schema(&conn)?;

        tracing::debug!(path = %path.display(), "Opened store");
        Ok(Self::from_connection(conn, Some(path.to_path_buf()), false))
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self::from_connection(conn, None, false))
    }

    /// Open an existing store for reading only.
    ///
    /// Never blocks on, or is blocked by, a running sync.
    pub fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self::from_connection(conn, Some(path.to_path_buf()), true))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>, read_only: bool) -> Self {
        Self { conn: Mutex::new(conn), path, read_only, writer_active: AtomicBool::new(false) }
    }

    fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS works (
                id INTEGER PRIMARY KEY,
                external_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                year INTEGER NOT NULL,
                publication_date TEXT,
                venue TEXT NOT NULL,
                kind TEXT NOT NULL,
                doi TEXT,
                abstract TEXT,
                location TEXT,
                citation_count INTEGER NOT NULL DEFAULT 0,
                retrieved_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_works_venue_year ON works(venue, year);

            CREATE TABLE IF NOT EXISTS authors (
                id INTEGER PRIMARY KEY,
                canonical_name TEXT NOT NULL,
                external_id TEXT UNIQUE,
                orcid TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS author_variants (
                author_id INTEGER NOT NULL REFERENCES authors(id),
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                surname TEXT NOT NULL,
                given TEXT NOT NULL,
                PRIMARY KEY (author_id, name)
            );
            CREATE INDEX IF NOT EXISTS idx_variants_key ON author_variants(name_key);
            CREATE INDEX IF NOT EXISTS idx_variants_surname ON author_variants(surname);

            CREATE TABLE IF NOT EXISTS author_affiliations (
                author_id INTEGER NOT NULL REFERENCES authors(id),
                affiliation TEXT NOT NULL,
                affiliation_key TEXT NOT NULL,
                PRIMARY KEY (author_id, affiliation_key)
            );

            CREATE TABLE IF NOT EXISTS work_authors (
                work_id INTEGER NOT NULL REFERENCES works(id),
                author_id INTEGER NOT NULL REFERENCES authors(id),
                position INTEGER NOT NULL,
                PRIMARY KEY (work_id, author_id)
            );
            CREATE INDEX IF NOT EXISTS idx_work_authors_author ON work_authors(author_id);

            CREATE TABLE IF NOT EXISTS agendas (
                author_id INTEGER PRIMARY KEY REFERENCES authors(id),
                summary TEXT NOT NULL,
                source TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Database file path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the exclusive writer session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if another session is alive in this
    /// process or another process holds the lock file, or if the store was
    /// opened read-only.
    pub fn begin_sync(&self) -> StoreResult<SyncSession<'_>> {
        if self.read_only {
            return Err(StoreError::conflict("store is opened read-only"));
        }
        if self.writer_active.swap(true, Ordering::AcqRel) {
            return Err(StoreError::conflict("a sync session is already active on this store"));
        }

        let lock_file = match self.path.as_deref().map(lock_path) {
            Some(lock) => match create_lock_file(&lock) {
                Ok(()) => Some(lock),
                Err(e) => {
                    self.writer_active.store(false, Ordering::Release);
                    return Err(e);
                }
            },
            None => None,
        };

        tracing::debug!(lock_file = ?lock_file, "Writer session acquired");
        Ok(SyncSession { store: self, lock_file })
    }

    /// Lock the connection.
    pub(crate) fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .field("writer_active", &self.writer_active.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock_path(db: &Path) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

fn create_lock_file(lock: &Path) -> StoreResult<()> {
    match OpenOptions::new().write(true).create_new(true).open(lock) {
        Ok(mut file) => {
            writeln!(file, "{}", std::process::id())?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::conflict(
            format!("another sync holds {}; remove it if no sync is running", lock.display()),
        )),
        Err(e) => Err(e.into()),
    }
}

/// Exclusive writer session; released on drop.
pub struct SyncSession<'a> {
    store: &'a Store,
    lock_file: Option<PathBuf>,
}

impl SyncSession<'_> {
    /// Write one page of works in a single transaction.
    ///
    /// Any error rolls the whole page back.
    pub fn write_page(&self, works: &[NormalizedWork], force: bool) -> StoreResult<BatchOutcome> {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = writer::timestamp();

        let mut outcome = BatchOutcome::default();
        for work in works {
            outcome.record(writer::upsert(&tx, work, force, &now)?);
        }

        tx.commit()?;
        Ok(outcome)
    }

    /// Upsert a single work in its own transaction.
    pub fn upsert(&self, work: &NormalizedWork, force: bool) -> StoreResult<UpsertOutcome> {
        let mut conn = self.store.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let outcome = writer::upsert(&tx, work, force, &writer::timestamp())?;
        tx.commit()?;
        Ok(outcome)
    }

    /// Store an agenda summary, replacing any previous one.
    pub fn save_agenda(&self, author_id: i64, summary: &str, source: &str) -> StoreResult<()> {
        let conn = self.store.lock()?;
        writer::save_agenda(&conn, author_id, summary, source, &writer::timestamp())
    }
}

impl Drop for SyncSession<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock_file.take() {
            if let Err(e) = std::fs::remove_file(&lock) {
                tracing::warn!(path = %lock.display(), error = %e, "Failed to remove lock file");
            }
        }
        self.store.writer_active.store(false, Ordering::Release);
        tracing::debug!("Writer session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_session_is_exclusive() {
        let store = Store::open_in_memory().unwrap();
        let session = store.begin_sync().unwrap();
        assert!(matches!(store.begin_sync(), Err(StoreError::Conflict(_))));
        drop(session);
        assert!(store.begin_sync().is_ok());
    }

    #[test]
    fn test_lock_file_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("finrank.db");
        let store = Store::open(&db).unwrap();
        let lock = lock_path(&db);

        {
            let _session = store.begin_sync().unwrap();
            assert!(lock.exists());

            // A second process would see the same lock file.
            let other = Store::open(&db).unwrap();
            assert!(matches!(other.begin_sync(), Err(StoreError::Conflict(_))));
        }

        assert!(!lock.exists());
        assert!(store.begin_sync().is_ok());
    }

    #[test]
    fn test_read_only_store_refuses_writer() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("finrank.db");
        drop(Store::open(&db).unwrap());

        let reader = Store::open_read_only(&db).unwrap();
        assert!(matches!(reader.begin_sync(), Err(StoreError::Conflict(_))));
        assert_eq!(reader.stats().unwrap().works, 0);
    }

    #[test]
    fn test_schema_is_reentrant() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("finrank.db");
        drop(Store::open(&db).unwrap());
        assert!(Store::open(&db).is_ok());
    }
}
