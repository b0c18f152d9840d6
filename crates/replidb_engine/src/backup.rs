//! Online backup stepping.
//!
//! Copies the entire content of one live database into another through the
//! engine's online-backup machinery, without disrupting readers or writers
//! on the source.

use crate::connection::Connection;
use crate::error::{EngineError, EngineResult};
use rusqlite::backup::{Backup, StepResult};

/// Copies the main database of `src` into the main database of `dst`.
///
/// The transfer runs as a single full-size step; the engine is expected to
/// complete the copy in that one pass.
///
/// `src` and `dst` must be distinct connections.
///
/// # Errors
///
/// Returns [`EngineError::Backup`] if the engine reports a failure and
/// [`EngineError::BackupIncomplete`] if the full-size step does not finish
/// the copy, which means the engine violated its completeness contract.
pub fn copy_database(src: &Connection, dst: &Connection) -> EngineResult<()> {
    let src_guard = src.lock_raw();
    let src_raw = src_guard.as_ref().ok_or(EngineError::Closed)?;
    let mut dst_guard = dst.lock_raw();
    let dst_raw = dst_guard.as_mut().ok_or(EngineError::Closed)?;

    let backup =
        Backup::new(src_raw, dst_raw).map_err(|source| EngineError::Backup { source })?;
    match backup
        .step(-1)
        .map_err(|source| EngineError::Backup { source })?
    {
        StepResult::Done => Ok(()),
        _ => Err(EngineError::BackupIncomplete),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsn::Dsn;
    use tempfile::tempdir;

    #[test]
    fn copies_all_rows() {
        let dir = tempdir().unwrap();
        let src = Connection::open(dir.path(), &Dsn::new("src.db")).unwrap();
        src.execute_batch(
            "CREATE TABLE t (n INTEGER);
             INSERT INTO t VALUES (1), (2), (3)",
        )
        .unwrap();

        let dst = Connection::open(dir.path(), &Dsn::new("dst.db")).unwrap();
        copy_database(&src, &dst).unwrap();

        let count: i64 = dst
            .with_raw(|raw| raw.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0)))
            .unwrap();
        assert_eq!(count, 3);

        src.close().unwrap();
        dst.close().unwrap();
    }

    #[test]
    fn closed_source_is_rejected() {
        let dir = tempdir().unwrap();
        let src = Connection::open(dir.path(), &Dsn::new("src.db")).unwrap();
        let dst = Connection::open(dir.path(), &Dsn::new("dst.db")).unwrap();

        src.close().unwrap();
        assert!(matches!(
            copy_database(&src, &dst),
            Err(EngineError::Closed)
        ));
    }
}
