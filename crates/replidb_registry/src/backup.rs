//! Byte-level backup and restore.
//!
//! [`Registry::backup`] produces a consistent point-in-time copy of a
//! database as two raw byte artifacts: the database file and the WAL tail
//! that accompanies it. Together they represent the exact replicable state;
//! the database file alone does not, because not-yet-checkpointed pages
//! live only in the WAL. [`Registry::restore`] installs such a pair
//! verbatim on another node.
//!
//! The backup works against a scratch copy in a uniquely-named temporary
//! file, never against a registered leader or follower handle, so live
//! replication traffic is not borrowed or blocked. All temporary files are
//! removed before the call returns, on success and failure alike.

use crate::error::{RegistryError, RegistryResult};
use crate::registry::{discard, Registry};
use replidb_engine::{copy_database, Connection, Dsn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

impl Registry {
    /// Produces a point-in-time copy of the database registered as `name`.
    ///
    /// Returns the raw bytes of the snapshot's database file and of its WAL
    /// file. The WAL captured is the backup copy's own uncheckpointed tail,
    /// not the source connection's WAL.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is unknown; otherwise any open,
    /// transfer, or read failure. Temporary files are cleaned up on every
    /// exit path.
    pub fn backup(&self, name: &str) -> RegistryResult<(Vec<u8>, Vec<u8>)> {
        let dsn = self.lookup_dsn(name)?;

        // Independent connection to the live database; registered handles
        // are never borrowed for backups.
        let src = Connection::open(self.dir(), &dsn)?;
        let result = self.snapshot(&dsn, &src);
        discard(&src);

        if result.is_ok() {
            debug!(name, "database backup complete");
        }
        result
    }

    fn snapshot(&self, dsn: &Dsn, src: &Connection) -> RegistryResult<(Vec<u8>, Vec<u8>)> {
        let temp_name = format!("{}-backup-{}", dsn.filename(), Uuid::new_v4().simple());
        let temp_dsn = Dsn::with_query(temp_name, dsn.query());

        // Guard installed before the scratch connection exists, so even a
        // failed open leaves nothing behind.
        let _cleanup = TempSnapshotFiles::new(self.dir(), &temp_dsn);

        let dst = Connection::open(self.dir(), &temp_dsn)?;
        let result: RegistryResult<(Vec<u8>, Vec<u8>)> = (|| {
            copy_database(src, &dst)?;
            let database = read_file(&dst.db_path())?;
            // After the transfer the WAL holds the snapshot's own
            // uncheckpointed tail. A missing file means the engine wrote
            // everything into the main file, leaving the tail empty.
            let wal = read_file_or_empty(&dst.wal_path())?;
            Ok((database, wal))
        })();
        discard(&dst);
        result
    }

    /// Overwrites the on-disk database and WAL files for `name` with the
    /// given raw bytes, verbatim.
    ///
    /// This is a raw snapshot install; the caller guarantees no connection
    /// for `name` is open while it runs.
    ///
    /// # Errors
    ///
    /// Precondition violation if `name` is unknown; otherwise any write
    /// failure, carrying the failing path.
    pub fn restore(&self, name: &str, database: &[u8], wal: &[u8]) -> RegistryResult<()> {
        let dsn = self.lookup_dsn(name)?;
        write_file(&dsn.path(self.dir()), database)?;
        write_file(&dsn.wal_path(self.dir()), wal)?;
        debug!(name, "database restore complete");
        Ok(())
    }
}

/// Removes a backup's temporary database, WAL, and shared-memory files when
/// dropped, regardless of how the backup attempt ended.
struct TempSnapshotFiles {
    paths: [PathBuf; 3],
}

impl TempSnapshotFiles {
    fn new(dir: &Path, dsn: &Dsn) -> Self {
        Self {
            paths: [dsn.path(dir), dsn.wal_path(dir), dsn.shm_path(dir)],
        }
    }
}

impl Drop for TempSnapshotFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to remove backup temp file");
                }
            }
        }
    }
}

fn read_file(path: &Path) -> RegistryResult<Vec<u8>> {
    fs::read(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_file_or_empty(path: &Path) -> RegistryResult<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(source) => Err(RegistryError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_file(path: &Path, data: &[u8]) -> RegistryResult<()> {
    fs::write(path, data).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })
}
