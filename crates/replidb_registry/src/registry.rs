//! Node-level connection registry.
//!
//! One [`Registry`] instance exists per node and tracks every open database
//! handle on it: the name → DSN catalog, the leader-connection index and
//! the follower-connection index, all guarded by a single reader/writer
//! lock. The replication layer owns the instance and drives it; the
//! registry never initiates calls itself.
//!
//! Locking discipline: the lock protects only the in-memory bookkeeping.
//! Raw connection opens run outside it, so operations on different names
//! can proceed concurrently at the I/O level while index updates stay
//! serialized. [`Registry::purge`] holds the exclusive lock for its whole
//! duration, so an open racing a purge either completes first or finds the
//! catalog empty.

use crate::error::{RegistryError, RegistryResult};
use parking_lot::RwLock;
use replidb_engine::{Connection, ConnectionId, Dsn, EngineError, ReplicationMethods};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// WAL frames after which leader connections checkpoint automatically,
/// unless overridden. Matches the engine's own default.
const DEFAULT_AUTO_CHECKPOINT: u32 = 1000;

struct LeaderEntry {
    name: String,
    conn: Arc<Connection>,
}

struct State {
    catalog: HashMap<String, Dsn>,
    leaders: HashMap<ConnectionId, LeaderEntry>,
    followers: HashMap<String, Arc<Connection>>,
    auto_checkpoint: u32,
}

/// Tracks all database connections open on a node.
///
/// Databases are registered once with [`Registry::add`]; the replication
/// layer then opens and closes leader and follower connections as roles
/// change, and uses [`Registry::backup`] / [`Registry::restore`] to move
/// full database state between nodes.
pub struct Registry {
    dir: PathBuf,
    state: RwLock<State>,
}

impl Registry {
    /// Creates a registry managing connections against database files in
    /// the given directory.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            state: RwLock::new(State {
                catalog: HashMap::new(),
                leaders: HashMap::new(),
                followers: HashMap::new(),
                auto_checkpoint: DEFAULT_AUTO_CHECKPOINT,
            }),
        }
    }

    /// Returns the directory where database files are kept.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sets the auto-checkpoint threshold applied to leader connections
    /// opened from now on. Follower connections always disable it.
    pub fn set_auto_checkpoint(&self, frames: u32) {
        self.state.write().auto_checkpoint = frames;
    }

    /// Registers a database under `name`, to be opened through `dsn`.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is already registered; the first
    /// registration's DSN remains authoritative.
    pub fn add(&self, name: &str, dsn: Dsn) -> RegistryResult<()> {
        let mut state = self.state.write();
        if state.catalog.contains_key(name) {
            return Err(RegistryError::precondition(format!(
                "name '{name}' is already registered"
            )));
        }
        state.catalog.insert(name.to_string(), dsn);
        Ok(())
    }

    /// Returns the DSN registered for `name`.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is unknown. This is an internal
    /// consistency check, not input validation; callers are expected to
    /// have validated names against [`Registry::all_names`].
    pub fn lookup_dsn(&self, name: &str) -> RegistryResult<Dsn> {
        self.state
            .read()
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| {
                RegistryError::precondition(format!("dsn not found: '{name}' is not registered"))
            })
    }

    /// Returns the names of all registered databases, in no particular
    /// order.
    #[must_use]
    pub fn all_names(&self) -> Vec<String> {
        self.state.read().catalog.keys().cloned().collect()
    }

    /// Opens a new leader connection for `name`, attaching `methods` as its
    /// replication capability, and registers it.
    ///
    /// A name may have any number of concurrently open leader connections.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is unknown; otherwise any open or
    /// configuration failure. No failure leaves a partial registration or a
    /// leaked handle.
    pub fn open_leader(
        &self,
        name: &str,
        methods: Arc<dyn ReplicationMethods>,
    ) -> RegistryResult<Arc<Connection>> {
        let (dsn, threshold) = {
            let state = self.state.read();
            let dsn = state.catalog.get(name).cloned().ok_or_else(|| {
                RegistryError::precondition(format!("'{name}' is not registered"))
            })?;
            (dsn, state.auto_checkpoint)
        };

        let conn = Connection::open(&self.dir, &dsn)?;
        if let Err(err) = conn
            .set_auto_checkpoint(threshold)
            .and_then(|()| conn.set_leader(methods))
        {
            discard(&conn);
            return Err(err.into());
        }

        let conn = Arc::new(conn);
        let mut state = self.state.write();
        if !state.catalog.contains_key(name) {
            // Purged while we were opening.
            drop(state);
            discard(&conn);
            return Err(RegistryError::precondition(format!(
                "'{name}' is not registered"
            )));
        }
        state.leaders.insert(
            conn.id(),
            LeaderEntry {
                name: name.to_string(),
                conn: Arc::clone(&conn),
            },
        );
        debug!(name, id = %conn.id(), "opened leader connection");
        Ok(conn)
    }

    /// Closes a registered leader connection and removes it from the index.
    ///
    /// The replication capability is detached first; if that fails the
    /// connection is left open and registered and the error is returned,
    /// so the registry never holds a half-closed handle.
    ///
    /// # Errors
    ///
    /// Precondition violation if `conn` is not a registered leader.
    pub fn close_leader(&self, conn: &Connection) -> RegistryResult<()> {
        let mut state = self.state.write();
        let id = conn.id();
        let entry = state.leaders.get(&id).ok_or_else(|| {
            RegistryError::precondition(format!(
                "connection {id} is not a registered leader"
            ))
        })?;

        entry.conn.clear_replication()?;
        entry.conn.close()?;
        state.leaders.remove(&id);
        debug!(%id, "closed leader connection");
        Ok(())
    }

    /// Returns the name of the database served by the given leader
    /// connection.
    ///
    /// # Errors
    ///
    /// Precondition violation if `conn` is not a registered leader.
    pub fn name_of_leader(&self, conn: &Connection) -> RegistryResult<String> {
        let id = conn.id();
        self.state
            .read()
            .leaders
            .get(&id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| {
                RegistryError::precondition(format!(
                    "connection {id} is not a registered leader"
                ))
            })
    }

    /// Returns all currently open leader connections for `name`, zero or
    /// more, for broadcast-style operations.
    #[must_use]
    pub fn leaders_of(&self, name: &str) -> Vec<Arc<Connection>> {
        self.state
            .read()
            .leaders
            .values()
            .filter(|entry| entry.name == name)
            .map(|entry| Arc::clone(&entry.conn))
            .collect()
    }

    /// Opens the follower connection for `name` and registers it.
    ///
    /// Followers never checkpoint automatically; checkpointing is driven
    /// externally to stay in lock-step with the replication stream.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is unknown or already has a
    /// follower; otherwise any open or configuration failure. No failure
    /// leaves a partial registration or a leaked handle.
    pub fn open_follower(&self, name: &str) -> RegistryResult<Arc<Connection>> {
        let dsn = {
            let state = self.state.read();
            if state.followers.contains_key(name) {
                return Err(RegistryError::precondition(format!(
                    "follower connection for '{name}' already open"
                )));
            }
            state.catalog.get(name).cloned().ok_or_else(|| {
                RegistryError::precondition(format!("'{name}' is not registered"))
            })?
        };

        let conn = Connection::open(&self.dir, &dsn)?;
        if let Err(err) = conn
            .set_auto_checkpoint(0)
            .and_then(|()| conn.set_follower())
        {
            discard(&conn);
            return Err(err.into());
        }

        let conn = Arc::new(conn);
        let mut state = self.state.write();
        if !state.catalog.contains_key(name) {
            drop(state);
            discard(&conn);
            return Err(RegistryError::precondition(format!(
                "'{name}' is not registered"
            )));
        }
        if state.followers.contains_key(name) {
            // Lost the race against a concurrent open for the same name.
            drop(state);
            discard(&conn);
            return Err(RegistryError::precondition(format!(
                "follower connection for '{name}' already open"
            )));
        }
        state.followers.insert(name.to_string(), Arc::clone(&conn));
        debug!(name, id = %conn.id(), "opened follower connection");
        Ok(conn)
    }

    /// Closes the follower connection for `name`.
    ///
    /// The index entry is removed before the close, so a close failure
    /// never leaves the name permanently un-reusable; the failure is still
    /// surfaced.
    ///
    /// # Errors
    ///
    /// Precondition violation if no follower is registered for `name`.
    pub fn close_follower(&self, name: &str) -> RegistryResult<()> {
        let conn = {
            let mut state = self.state.write();
            state.followers.remove(name).ok_or_else(|| {
                RegistryError::precondition(format!("no follower connection for '{name}'"))
            })?
        };
        conn.close()?;
        debug!(name, "closed follower connection");
        Ok(())
    }

    /// Returns the follower connection for `name`.
    ///
    /// # Errors
    ///
    /// Precondition violation if no follower is registered for `name`.
    pub fn follower_of(&self, name: &str) -> RegistryResult<Arc<Connection>> {
        self.state
            .read()
            .followers
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| {
                RegistryError::precondition(format!("no follower connection for '{name}'"))
            })
    }

    /// Closes every registered connection and removes the registry
    /// directory recursively. Used for full node teardown.
    ///
    /// Runs entirely under the exclusive lock: both indexes are drained
    /// directly, without re-entering the public close methods, so no open
    /// can interleave with the teardown.
    ///
    /// # Errors
    ///
    /// Close and removal failures are all attempted; the first error is
    /// returned after the teardown completes.
    pub fn purge(&self) -> RegistryResult<()> {
        let mut state = self.state.write();
        let mut first_err: Option<RegistryError> = None;

        for (id, entry) in state.leaders.drain() {
            if let Err(err) = entry
                .conn
                .clear_replication()
                .and_then(|()| entry.conn.close())
            {
                warn!(%id, error = %err, "failed to close leader connection during purge");
                if first_err.is_none() {
                    first_err = Some(err.into());
                }
            }
        }
        for (name, conn) in state.followers.drain() {
            if let Err(err) = conn.close() {
                warn!(name = %name, error = %err, "failed to close follower connection during purge");
                if first_err.is_none() {
                    first_err = Some(err.into());
                }
            }
        }
        state.catalog.clear();

        if let Err(source) = fs::remove_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), error = %source, "failed to remove registry directory");
            if first_err.is_none() {
                first_err = Some(RegistryError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Closes a connection the registry is abandoning, best-effort.
///
/// Used on error paths where the primary failure is already being
/// propagated and a close failure would only mask it.
pub(crate) fn discard(conn: &Connection) {
    let _ = conn.clear_replication();
    match conn.close() {
        Ok(()) | Err(EngineError::Closed) => {}
        Err(err) => {
            warn!(id = %conn.id(), error = %err, "failed to close discarded connection");
        }
    }
}
