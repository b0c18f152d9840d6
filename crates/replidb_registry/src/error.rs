//! Error types for the connection registry.

use replidb_engine::EngineError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur in registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// An engine-level failure: open, pragma, close, or backup stepping.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A file read or write failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path of the file involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A caller violated the registry protocol.
    ///
    /// Duplicate name registration, operating on an unregistered name, or
    /// closing a connection that is not in the expected index. These
    /// indicate a bug in the caller, not a recoverable runtime condition;
    /// the registry's bookkeeping is left untouched.
    #[error("precondition violated: {message}")]
    Precondition {
        /// Description of the violated protocol rule.
        message: String,
    },
}

impl RegistryError {
    /// Creates a precondition-violation error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
        }
    }
}
