//! Directory-backed key storage.
//!
//! Layout, for id `0016A9CA870AFA59` and prefix `key-`:
//!
//! ```text
//! <dir>/key-0016A9CA870AFA59.key        armored key
//! <dir>/key-0016A9CA870AFA59.key.json   metadata sidecar (optional)
//! ```
//!
//! With base64 encoding enabled the key file extension is `.b64`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{KeyBackend, StoredKey};
use crate::error::{Error, Result};
use crate::types::Deadline;

const METADATA_SUFFIX: &str = ".json";

/// One file per key in a single directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    prefix: String,
    extension: &'static str,
}

impl FileBackend {
    /// Open a backend over `dir`, creating the directory if needed.
    ///
    /// `base64_encoded` only selects the file extension; the manager does
    /// the encoding.
    pub fn open(dir: impl AsRef<Path>, prefix: &str, base64_encoded: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            extension: if base64_encoded { ".b64" } else { ".key" },
        })
    }

    fn key_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty()
            || id.contains(['/', '\\'])
            || id.contains("..")
        {
            return Err(Error::InvalidInput(format!("invalid key id: {:?}", id)));
        }
        Ok(self
            .dir
            .join(format!("{}{}{}", self.prefix, id, self.extension)))
    }

    fn metadata_path(key_path: &Path) -> PathBuf {
        let mut name = key_path.as_os_str().to_owned();
        name.push(METADATA_SUFFIX);
        PathBuf::from(name)
    }

    fn id_from_file_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.extension)
            .filter(|id| !id.is_empty())
    }
}

impl KeyBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    fn path(&self) -> String {
        self.dir.display().to_string()
    }

    fn list(&self, deadline: Deadline) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            deadline.check("file backend list")?;
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(id) = self.id_from_file_name(name) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn read(&self, id: &str, deadline: Deadline) -> Result<StoredKey> {
        deadline.check("file backend read")?;
        let path = self.key_path(id)?;

        let key_data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::KeyNotFound(id.to_string()))
            }
            Err(e) => return Err(Error::Backend(format!("{}: {}", path.display(), e))),
        };

        let metadata = match fs::read_to_string(Self::metadata_path(&path)) {
            Ok(meta) => Some(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::Backend(format!("{}: {}", path.display(), e))),
        };

        Ok(StoredKey { key_data, metadata })
    }

    fn save_with_metadata(
        &self,
        id: &str,
        key_data: &str,
        metadata: Option<&str>,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check("file backend save")?;
        let path = self.key_path(id)?;
        let meta_path = Self::metadata_path(&path);

        fs::write(&path, key_data)
            .map_err(|e| Error::Backend(format!("{}: {}", path.display(), e)))?;

        match metadata {
            Some(meta) => fs::write(&meta_path, meta)
                .map_err(|e| Error::Backend(format!("{}: {}", meta_path.display(), e)))?,
            None => match fs::remove_file(&meta_path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Backend(format!("{}: {}", meta_path.display(), e))),
            },
        }

        tracing::debug!(id = %id, path = %path.display(), "Key saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[test]
    fn test_round_trip_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), "key-", false).unwrap();

        backend
            .save_with_metadata("0016A9CA870AFA59", "armored", Some("{}"), deadline())
            .unwrap();

        assert!(dir.path().join("key-0016A9CA870AFA59.key").exists());
        assert!(dir.path().join("key-0016A9CA870AFA59.key.json").exists());

        let stored = backend.read("0016A9CA870AFA59", deadline()).unwrap();
        assert_eq!(stored.key_data, "armored");
        assert_eq!(stored.metadata.as_deref(), Some("{}"));

        // Saving without metadata drops the sidecar
        backend
            .save_with_metadata("0016A9CA870AFA59", "armored", None, deadline())
            .unwrap();
        assert!(backend.read("0016A9CA870AFA59", deadline()).unwrap().metadata.is_none());
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), "", true).unwrap();

        backend.save_with_metadata("BBBB", "b", Some("{}"), deadline()).unwrap();
        backend.save_with_metadata("AAAA", "a", None, deadline()).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("CCCC.key"), "wrong extension").unwrap();

        assert_eq!(backend.list(deadline()).unwrap(), vec!["AAAA", "BBBB"]);
    }

    #[test]
    fn test_missing_and_invalid_ids() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path(), "", false).unwrap();

        assert!(backend.read("ABCD", deadline()).unwrap_err().is_not_found());
        assert!(matches!(
            backend.read("../etc/passwd", deadline()),
            Err(Error::InvalidInput(_))
        ));
    }
}
