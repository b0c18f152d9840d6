//! Replication capability interface.
//!
//! The replication layer hands a [`ReplicationMethods`] object to every
//! leader connection it opens. The engine invokes it from the connection's
//! commit and rollback hooks, which is what turns local writes into
//! replicated operations. The engine itself never interprets the object
//! beyond calling these hooks.

/// Callbacks attached to a leader connection.
///
/// Invoked from inside the engine's transaction hooks, while the connection
/// is held. Implementations must not call back into the connection or the
/// registry that owns it.
pub trait ReplicationMethods: Send + Sync {
    /// Called when the leader connection is about to commit a write
    /// transaction. Returning `false` vetoes the commit and the engine
    /// rolls the transaction back instead.
    fn on_commit(&self) -> bool;

    /// Called when a transaction on the leader connection rolls back.
    fn on_rollback(&self) {}
}
