//! # replidb engine
//!
//! SQLite binding layer for replidb.
//!
//! This crate provides:
//! - [`Dsn`] connection descriptors rendered against a base directory
//! - [`Connection`] handles opened with WAL journaling, an unbounded WAL,
//!   and no implicit checkpoint on close
//! - The replication-mode state machine (plain → leader | follower) and the
//!   [`ReplicationMethods`] capability hooks for leader connections
//! - [`copy_database`], the one-pass online backup primitive
//!
//! The registry crate builds the node-level bookkeeping on top of these
//! primitives; nothing in this crate tracks which connections exist.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod connection;
mod dsn;
mod error;
mod replication;

pub use backup::copy_database;
pub use connection::{Connection, ConnectionId, ReplicationMode};
pub use dsn::Dsn;
pub use error::{EngineError, EngineResult};
pub use replication::ReplicationMethods;

// Re-exported so callers can issue statements through `Connection::with_raw`
// without adding their own direct dependency.
pub use rusqlite;
