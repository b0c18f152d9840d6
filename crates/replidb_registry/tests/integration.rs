//! Integration tests for the connection registry.
//!
//! Exercise the full open → write → backup → restore → reopen path against
//! real database files, plus teardown and temp-file hygiene.

use replidb_registry::{Dsn, Registry, RegistryError, ReplicationMethods, ReplicationMode};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

struct Noop;

impl ReplicationMethods for Noop {
    fn on_commit(&self) -> bool {
        true
    }
}

fn noop() -> Arc<dyn ReplicationMethods> {
    Arc::new(Noop)
}

fn dir_entries(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn backup_restore_round_trip_includes_wal_tail() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    registry.add("source", Dsn::new("source.db")).unwrap();
    registry.add("copy", Dsn::new("copy.db")).unwrap();

    let leader = registry.open_leader("source", noop()).unwrap();
    leader
        .execute_batch(
            "CREATE TABLE model (n INTEGER, label TEXT);
             INSERT INTO model VALUES (1, 'one'), (2, 'two'), (3, 'three')",
        )
        .unwrap();

    // With automatic checkpointing far away, the rows live only in the WAL
    // tail at this point; the backup must still capture them.
    let wal = fs::read(dir.path().join("source.db-wal")).unwrap();
    assert!(!wal.is_empty());

    let (database_bytes, wal_bytes) = registry.backup("source").unwrap();
    assert!(!database_bytes.is_empty());

    registry.close_leader(&leader).unwrap();

    registry
        .restore("copy", &database_bytes, &wal_bytes)
        .unwrap();

    let reopened = registry.open_leader("copy", noop()).unwrap();
    let (count, sum): (i64, i64) = reopened
        .with_raw(|raw| {
            raw.query_row("SELECT COUNT(*), SUM(n) FROM model", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
        })
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(sum, 6);

    registry.close_leader(&reopened).unwrap();
}

#[test]
fn backup_leaves_no_temp_files_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    registry.add("app", Dsn::new("app.db")).unwrap();

    let leader = registry.open_leader("app", noop()).unwrap();
    leader
        .execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (42)")
        .unwrap();

    registry.backup("app").unwrap();

    for name in dir_entries(dir.path()) {
        assert!(
            !name.contains("-backup-"),
            "residual backup temp file: {name}"
        );
    }

    registry.close_leader(&leader).unwrap();
}

#[test]
fn failed_backup_leaves_directory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    // The source file cannot be opened: its parent directory is missing.
    registry.add("bad", Dsn::new("missing/app.db")).unwrap();

    let before = dir_entries(dir.path());
    assert!(registry.backup("bad").is_err());
    assert_eq!(dir_entries(dir.path()), before);
}

#[test]
fn backup_failure_after_transfer_starts_leaves_directory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    registry.add("app", Dsn::new("app.db")).unwrap();
    // Same file under read-only options: the source opens fine, but the
    // scratch copy cannot be created, so the backup fails only after the
    // temp-file cleanup guard is in place.
    registry
        .add("app-ro", Dsn::with_query("app.db", "mode=ro"))
        .unwrap();

    let leader = registry.open_leader("app", noop()).unwrap();
    leader
        .execute_batch("CREATE TABLE t (n INTEGER); INSERT INTO t VALUES (7)")
        .unwrap();

    let before = dir_entries(dir.path());
    assert!(registry.backup("app-ro").is_err());
    assert_eq!(dir_entries(dir.path()), before);

    registry.close_leader(&leader).unwrap();
}

#[test]
fn backup_of_unregistered_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());

    let before = dir_entries(dir.path());
    assert!(matches!(
        registry.backup("ghost"),
        Err(RegistryError::Precondition { .. })
    ));
    assert_eq!(dir_entries(dir.path()), before);
}

#[test]
fn restore_overwrites_database_and_wal_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Registry::new(dir.path());
    registry.add("app", Dsn::new("app.db")).unwrap();

    registry.restore("app", b"database-bytes", b"wal-bytes").unwrap();

    assert_eq!(
        fs::read(dir.path().join("app.db")).unwrap(),
        b"database-bytes"
    );
    assert_eq!(
        fs::read(dir.path().join("app.db-wal")).unwrap(),
        b"wal-bytes"
    );
}

#[test]
fn purge_closes_everything_and_removes_directory() {
    let parent = tempfile::tempdir().unwrap();
    let dir = parent.path().join("registry");
    fs::create_dir(&dir).unwrap();

    let registry = Registry::new(&dir);
    registry.add("app", Dsn::new("app.db")).unwrap();
    registry.add("other", Dsn::new("other.db")).unwrap();

    let leader = registry.open_leader("app", noop()).unwrap();
    let follower = registry.open_follower("other").unwrap();
    assert_eq!(follower.mode(), ReplicationMode::Follower);

    registry.purge().unwrap();

    assert!(!dir.exists());
    assert!(!leader.is_open());
    assert!(!follower.is_open());
    assert!(registry.all_names().is_empty());

    // Previously-registered names are gone.
    assert!(matches!(
        registry.open_leader("app", noop()),
        Err(RegistryError::Precondition { .. })
    ));
    assert!(matches!(
        registry.follower_of("other"),
        Err(RegistryError::Precondition { .. })
    ));
}
