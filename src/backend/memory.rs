//! In-memory key backend.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{KeyBackend, StoredKey};
use crate::error::{Error, Result};
use crate::types::Deadline;

/// Keys held in a process-local map. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keys: RwLock<BTreeMap<String, StoredKey>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn path(&self) -> String {
        ":memory:".to_string()
    }

    fn list(&self, deadline: Deadline) -> Result<Vec<String>> {
        deadline.check("memory backend list")?;
        let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
        Ok(keys.keys().cloned().collect())
    }

    fn read(&self, id: &str, deadline: Deadline) -> Result<StoredKey> {
        deadline.check("memory backend read")?;
        let keys = self.keys.read().unwrap_or_else(|p| p.into_inner());
        keys.get(id)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    fn save_with_metadata(
        &self,
        id: &str,
        key_data: &str,
        metadata: Option<&str>,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check("memory backend save")?;
        let mut keys = self.keys.write().unwrap_or_else(|p| p.into_inner());
        keys.insert(
            id.to_string(),
            StoredKey {
                key_data: key_data.to_string(),
                metadata: metadata.map(str::to_string),
            },
        );
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
    fn test_save_read_list() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());

        backend
            .save_with_metadata("B", "key-b", None, deadline())
            .unwrap();
        backend
            .save_with_metadata("A", "key-a", Some(r#"{"password":"x"}"#), deadline())
            .unwrap();

        assert_eq!(backend.list(deadline()).unwrap(), vec!["A", "B"]);
        let a = backend.read("A", deadline()).unwrap();
        assert_eq!(a.key_data, "key-a");
        assert_eq!(a.metadata.as_deref(), Some(r#"{"password":"x"}"#));
    }

    #[test]
    fn test_missing_key() {
        let backend = MemoryBackend::new();
        let err = backend.read("nope", deadline()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_expired_deadline() {
        let backend = MemoryBackend::new();
        let past = Deadline::after(Duration::ZERO);
        assert!(matches!(backend.list(past), Err(Error::Timeout(_))));
    }
}
