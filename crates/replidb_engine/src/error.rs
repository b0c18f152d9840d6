//! Error types for the engine binding layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the engine binding layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Opening the database file failed.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Path of the database file.
        path: PathBuf,
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// Applying a configuration pragma failed.
    #[error("failed to apply pragma {pragma}: {source}")]
    Pragma {
        /// Name of the pragma.
        pragma: &'static str,
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// The engine did not switch the connection to WAL journaling.
    #[error("engine refused WAL journal mode, still in {mode:?} mode")]
    JournalMode {
        /// The journal mode the engine reported instead.
        mode: String,
    },

    /// Applying a connection-level configuration option failed.
    #[error("failed to configure connection: {source}")]
    Configure {
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// A statement issued through the connection failed.
    #[error("statement failed: {source}")]
    Statement {
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// Closing the connection failed; the handle remains open.
    #[error("failed to close connection: {source}")]
    Close {
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// The connection has already been closed.
    #[error("connection is closed")]
    Closed,

    /// Invalid replication-mode transition for this connection.
    #[error("invalid replication state: {message}")]
    ReplicationState {
        /// Description of the violated transition.
        message: String,
    },

    /// The online backup engine reported a failure.
    #[error("online backup failed: {source}")]
    Backup {
        /// Underlying engine error.
        source: rusqlite::Error,
    },

    /// The online backup did not complete in a single full-size step.
    #[error("online backup did not complete")]
    BackupIncomplete,
}

impl EngineError {
    /// Creates a replication-state error.
    pub fn replication_state(message: impl Into<String>) -> Self {
        Self::ReplicationState {
            message: message.into(),
        }
    }
}
