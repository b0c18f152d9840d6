//! WAL-configured connection handles.
//!
//! Every connection opened through this module is configured the same way
//! before it is handed out:
//!
//! 1. journal mode is write-ahead-log,
//! 2. the WAL file is never truncated (`journal_size_limit=-1`),
//! 3. closing the connection does not trigger an implicit checkpoint.
//!
//! Together these guarantee that the WAL survives connection churn intact,
//! which the replication layer depends on when it captures or installs
//! database state.
//!
//! A [`Connection`] also carries its replication-mode state machine:
//! plain → leader | follower → cleared. The mode is set exactly once after
//! open and cleared before close.

use crate::dsn::Dsn;
use crate::error::{EngineError, EngineResult};
use crate::replication::ReplicationMethods;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Stable identity for an open connection.
///
/// Assigned from a process-wide monotonic counter at open time, so a
/// connection can be used as a map key without relying on its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Replication mode of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    /// No replication mode set.
    Plain,
    /// Accepts local writes and forwards them to the replication layer.
    Leader,
    /// Only applies writes received from the replication layer.
    Follower,
}

/// An open database connection with WAL journaling applied.
///
/// Thread-safe; the registry shares handles as `Arc<Connection>`.
pub struct Connection {
    id: ConnectionId,
    db_path: PathBuf,
    raw: Mutex<Option<rusqlite::Connection>>,
    mode: Mutex<ReplicationMode>,
}

impl Connection {
    /// Opens a new physical connection for `dsn` rooted at `dir` and applies
    /// the WAL configuration effects.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or any configuration step fails.
    /// No partial handle escapes: on failure the partially-opened handle is
    /// closed before the error propagates.
    pub fn open(dir: &Path, dsn: &Dsn) -> EngineResult<Self> {
        let db_path = dsn.path(dir);
        let raw = rusqlite::Connection::open(dsn.connect_string(dir)).map_err(|source| {
            EngineError::Open {
                path: db_path.clone(),
                source,
            }
        })?;

        // Dropping `raw` on any error below closes the partial handle.
        let mode: String = raw
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|source| EngineError::Pragma {
                pragma: "journal_mode",
                source,
            })?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(EngineError::JournalMode { mode });
        }

        // Keep the WAL unbounded rather than trimmed on commit.
        raw.query_row("PRAGMA journal_size_limit=-1", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|source| EngineError::Pragma {
            pragma: "journal_size_limit",
            source,
        })?;

        // The WAL must survive this connection closing.
        raw.set_db_config(
            rusqlite::config::DbConfig::SQLITE_DBCONFIG_NO_CKPT_ON_CLOSE,
            true,
        )
        .map_err(|source| EngineError::Configure { source })?;

        let id = ConnectionId::next();
        debug!(%id, path = %db_path.display(), "opened connection");

        Ok(Self {
            id,
            db_path,
            raw: Mutex::new(Some(raw)),
            mode: Mutex::new(ReplicationMode::Plain),
        })
    }

    /// Returns the stable identity of this connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the path of the database file this connection serves.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the path of the WAL file accompanying the database.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        let mut path = self.db_path.as_os_str().to_os_string();
        path.push("-wal");
        PathBuf::from(path)
    }

    /// Returns the path of the shared-memory file accompanying the database.
    #[must_use]
    pub fn shm_path(&self) -> PathBuf {
        let mut path = self.db_path.as_os_str().to_os_string();
        path.push("-shm");
        PathBuf::from(path)
    }

    /// Sets the WAL-frame threshold after which the engine checkpoints
    /// automatically. `0` disables automatic checkpointing entirely.
    pub fn set_auto_checkpoint(&self, frames: u32) -> EngineResult<()> {
        let guard = self.raw.lock();
        let raw = guard.as_ref().ok_or(EngineError::Closed)?;
        raw.query_row(
            &format!("PRAGMA wal_autocheckpoint={frames}"),
            [],
            |row| row.get::<_, i64>(0),
        )
        .map(|_| ())
        .map_err(|source| EngineError::Pragma {
            pragma: "wal_autocheckpoint",
            source,
        })
    }

    /// Switches the connection into leader replication mode, attaching the
    /// given capability object to its commit and rollback hooks. The hooks
    /// hold the only references to the capability; clearing the mode
    /// releases them.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::ReplicationState`] if a mode was already
    /// set; the mode is set exactly once after open.
    pub fn set_leader(&self, methods: Arc<dyn ReplicationMethods>) -> EngineResult<()> {
        let mut mode = self.mode.lock();
        if *mode != ReplicationMode::Plain {
            return Err(EngineError::replication_state(format!(
                "connection {} already has a replication mode",
                self.id
            )));
        }

        let guard = self.raw.lock();
        let raw = guard.as_ref().ok_or(EngineError::Closed)?;

        let commit_methods = Arc::clone(&methods);
        raw.commit_hook(Some(move || !commit_methods.on_commit()));
        raw.rollback_hook(Some(move || methods.on_rollback()));

        *mode = ReplicationMode::Leader;
        debug!(id = %self.id, "connection switched to leader mode");
        Ok(())
    }

    /// Switches the connection into follower replication mode.
    ///
    /// # Errors
    ///
    /// Fails with [`EngineError::ReplicationState`] if a mode was already
    /// set.
    pub fn set_follower(&self) -> EngineResult<()> {
        let mut mode = self.mode.lock();
        if *mode != ReplicationMode::Plain {
            return Err(EngineError::replication_state(format!(
                "connection {} already has a replication mode",
                self.id
            )));
        }
        *mode = ReplicationMode::Follower;
        debug!(id = %self.id, "connection switched to follower mode");
        Ok(())
    }

    /// Clears the replication mode, detaching any hooks so no callback
    /// references remain attached to the handle.
    pub fn clear_replication(&self) -> EngineResult<()> {
        let mut mode = self.mode.lock();
        let guard = self.raw.lock();
        let raw = guard.as_ref().ok_or(EngineError::Closed)?;
        raw.commit_hook(None::<fn() -> bool>);
        raw.rollback_hook(None::<fn()>);
        *mode = ReplicationMode::Plain;
        Ok(())
    }

    /// Returns the current replication mode.
    #[must_use]
    pub fn mode(&self) -> ReplicationMode {
        *self.mode.lock()
    }

    /// Runs `f` against the raw engine handle.
    ///
    /// This is the SQL surface through which the replication layer issues
    /// statements on a connection it holds.
    pub fn with_raw<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    ) -> EngineResult<T> {
        let guard = self.raw.lock();
        let raw = guard.as_ref().ok_or(EngineError::Closed)?;
        f(raw).map_err(|source| EngineError::Statement { source })
    }

    /// Executes a batch of SQL statements on the connection.
    pub fn execute_batch(&self, sql: &str) -> EngineResult<()> {
        self.with_raw(|raw| raw.execute_batch(sql))
    }

    /// Closes the physical connection.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] if the connection was already closed.
    /// If the engine reports a close failure the handle is put back and the
    /// connection remains open and usable.
    pub fn close(&self) -> EngineResult<()> {
        let mut guard = self.raw.lock();
        let raw = guard.take().ok_or(EngineError::Closed)?;
        match raw.close() {
            Ok(()) => {
                debug!(id = %self.id, "closed connection");
                Ok(())
            }
            Err((raw, source)) => {
                *guard = Some(raw);
                Err(EngineError::Close { source })
            }
        }
    }

    /// Returns whether the physical connection is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.raw.lock().is_some()
    }

    pub(crate) fn lock_raw(&self) -> parking_lot::MutexGuard<'_, Option<rusqlite::Connection>> {
        self.raw.lock()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("db_path", &self.db_path)
            .field("mode", &self.mode())
            .field("open", &self.is_open())
            .finish()
    }
}
