//! DuckDB connection management for the market store.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ::duckdb::Connection;

struct ManagerInner {
    db_path: PathBuf,
    root: Mutex<Connection>,
}

/// Hands out connections to the store file.
///
/// The embedded database is opened once at startup and every connection is
/// cloned from that root handle, so the store file lock is taken exactly
/// once per process.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = Connection::open(db_path.as_path())?;
        root.execute_batch("PRAGMA disable_progress_bar;")?;
        Ok(Self {
            inner: Arc::new(ManagerInner {
                db_path,
                root: Mutex::new(root),
            }),
        })
    }

    /// Acquire a connection sharing the root database instance.
    ///
    /// # Panics
    /// Panics if the root connection mutex is poisoned (a previous panic
    /// while holding the lock).
    pub fn acquire(&self) -> Result<Connection, ::duckdb::Error> {
        self.inner
            .root
            .lock()
            .expect("store connection mutex poisoned")
            .try_clone()
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}
