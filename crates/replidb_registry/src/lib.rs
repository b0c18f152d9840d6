//! # replidb registry
//!
//! Node-level connection registry for replidb.
//!
//! This crate is the single authority for every open database handle on a
//! node. It provides:
//! - The name → DSN catalog databases are registered into at startup
//! - Leader-connection management (open/close/enumerate, many per name)
//! - Follower-connection management (at most one per name)
//! - Byte-level backup and restore of full database state
//! - Whole-registry teardown via purge
//!
//! ## Key invariants
//!
//! - Every indexed connection belongs to a registered name
//! - A name has at most one open follower at a time
//! - A connection is tracked by at most one index, never both
//! - A failed open never leaves a partial registration or a leaked handle
//!
//! The replication layer owns one [`Registry`] per node and passes it
//! explicitly to its dependents; there is no global singleton.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod error;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use registry::Registry;

// The engine types that appear in the registry's public API.
pub use replidb_engine::{
    Connection, ConnectionId, Dsn, EngineError, ReplicationMethods, ReplicationMode,
};
