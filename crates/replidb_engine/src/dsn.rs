//! Connection descriptors.
//!
//! A [`Dsn`] identifies how to open one database file: the base file name
//! plus optional connection options, rendered against a base directory at
//! open time. The registry treats it as an opaque, immutable value.

use std::path::{Path, PathBuf};

/// A connection descriptor: database file name plus connection options.
///
/// The file name is relative to the directory the registry manages; the
/// query string carries engine open options (e.g. `cache=shared`) and is
/// appended as a `file:` URI when non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    filename: String,
    query: String,
}

impl Dsn {
    /// Creates a descriptor for the given file name with no options.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            query: String::new(),
        }
    }

    /// Creates a descriptor with connection options.
    pub fn with_query(filename: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            query: query.into(),
        }
    }

    /// Returns the base name of the database file.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the connection options, empty if none were given.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Returns the full path of the database file under `dir`.
    #[must_use]
    pub fn path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.filename)
    }

    /// Renders the string to open this database under `dir`.
    ///
    /// A plain path when there are no options, otherwise a `file:` URI
    /// carrying the query string.
    #[must_use]
    pub fn connect_string(&self, dir: &Path) -> String {
        let path = self.path(dir);
        if self.query.is_empty() {
            path.display().to_string()
        } else {
            format!("file:{}?{}", path.display(), self.query)
        }
    }

    /// Returns the path of the WAL file accompanying the database under `dir`.
    #[must_use]
    pub fn wal_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-wal", self.filename))
    }

    /// Returns the path of the shared-memory file accompanying the database
    /// under `dir`.
    #[must_use]
    pub fn shm_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}-shm", self.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_joins_directory_and_filename() {
        let dsn = Dsn::new("app.db");
        let dir = Path::new("/var/lib/node");

        assert_eq!(dsn.path(dir), PathBuf::from("/var/lib/node/app.db"));
        assert_eq!(dsn.wal_path(dir), PathBuf::from("/var/lib/node/app.db-wal"));
        assert_eq!(dsn.shm_path(dir), PathBuf::from("/var/lib/node/app.db-shm"));
    }

    #[test]
    fn connect_string_without_query_is_plain_path() {
        let dsn = Dsn::new("app.db");
        let dir = Path::new("/data");

        assert_eq!(dsn.connect_string(dir), "/data/app.db");
    }

    #[test]
    fn connect_string_with_query_is_uri() {
        let dsn = Dsn::with_query("app.db", "cache=shared");
        let dir = Path::new("/data");

        assert_eq!(dsn.connect_string(dir), "file:/data/app.db?cache=shared");
    }

    #[test]
    fn accessors_round_trip() {
        let dsn = Dsn::with_query("app.db", "mode=rwc");

        assert_eq!(dsn.filename(), "app.db");
        assert_eq!(dsn.query(), "mode=rwc");
    }
}
