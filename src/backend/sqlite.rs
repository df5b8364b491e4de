//! SQLite key backend.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use super::schema::init_schema;
use super::{KeyBackend, StoredKey};
use crate::error::{Error, Result};
use crate::types::Deadline;

/// Keys stored in a SQLite database.
///
/// The connection sits behind a mutex so one backend can be shared by every
/// thread using the manager. Each call sets the SQLite busy timeout to the
/// time left on its deadline.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open or create a database at `path`. Parent directories must exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn with_conn<T>(
        &self,
        what: &str,
        deadline: Deadline,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        deadline.check(what)?;
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        deadline.check(what)?;
        conn.busy_timeout(deadline.remaining().max(Duration::from_millis(1)))?;
        f(&conn)
    }
}

impl KeyBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string())
    }

    fn list(&self, deadline: Deadline) -> Result<Vec<String>> {
        self.with_conn("sqlite backend list", deadline, |conn| {
            let mut stmt = conn.prepare("SELECT id FROM keys ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn read(&self, id: &str, deadline: Deadline) -> Result<StoredKey> {
        self.with_conn("sqlite backend read", deadline, |conn| {
            conn.query_row(
                "SELECT key_data, metadata FROM keys WHERE id = ?1",
                [id],
                |row| {
                    Ok(StoredKey {
                        key_data: row.get(0)?,
                        metadata: row.get(1)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
        })
    }

    fn save_with_metadata(
        &self,
        id: &str,
        key_data: &str,
        metadata: Option<&str>,
        deadline: Deadline,
    ) -> Result<()> {
        self.with_conn("sqlite backend save", deadline, |conn| {
            conn.execute(
                "INSERT INTO keys (id, key_data, metadata, updated_at)
                 VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
                 ON CONFLICT(id) DO UPDATE SET
                    key_data = excluded.key_data,
                    metadata = excluded.metadata,
                    updated_at = CURRENT_TIMESTAMP",
                params![id, key_data, metadata],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[test]
    fn test_in_memory_round_trip() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.path(), ":memory:");
        assert!(backend.list(deadline()).unwrap().is_empty());

        backend
            .save_with_metadata("0016A9CA870AFA59", "armored", Some(r#"{"password":"x"}"#), deadline())
            .unwrap();
        let stored = backend.read("0016A9CA870AFA59", deadline()).unwrap();
        assert_eq!(stored.key_data, "armored");
        assert_eq!(stored.metadata.as_deref(), Some(r#"{"password":"x"}"#));

        // Replace clears the metadata
        backend
            .save_with_metadata("0016A9CA870AFA59", "armored-2", None, deadline())
            .unwrap();
        let stored = backend.read("0016A9CA870AFA59", deadline()).unwrap();
        assert_eq!(stored.key_data, "armored-2");
        assert!(stored.metadata.is_none());
        assert_eq!(backend.list(deadline()).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.read("ABCDEF0123456789", deadline()).unwrap_err().is_not_found());
    }
}
