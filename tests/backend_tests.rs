//! Key backend integration tests.
//!
//! The SQLite tests require the `keystore` feature to be enabled.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use keysmith::{
    CipherSuite, Deadline, Error, FileBackend, Identity, KeyBackend, KeyManager, ManagerConfig,
    MemoryBackend,
};

const TEST_PASSWORD: &str = "test-password-123";

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(5))
}

fn expired() -> Deadline {
    Deadline::after(Duration::ZERO)
}

fn create_test_key(manager: &KeyManager, name: &str) -> (String, String) {
    let identity = Identity {
        name: name.to_string(),
        comment: String::new(),
        email: format!("{}@example.com", name.to_lowercase()),
    };
    let key = manager
        .generate_key(&identity, TEST_PASSWORD, CipherSuite::Cv25519)
        .unwrap();
    (key.private_key, key.fingerprint)
}

/// Save a key through one manager, then load it through a fresh one.
fn persist_and_reload(backend: Arc<dyn KeyBackend>) {
    let writer = KeyManager::new(ManagerConfig::default(), backend.clone()).unwrap();
    let (secret_key, fingerprint) = create_test_key(&writer, "Persist");
    writer
        .save_key(&fingerprint, &secret_key, Some(TEST_PASSWORD))
        .unwrap();

    let reader = KeyManager::new(ManagerConfig::default(), backend).unwrap();
    let report = reader.load_keys().unwrap();
    assert_eq!(report.private_keys, 1);
    assert!(report.failures.is_empty());
    assert!(!reader.is_locked(&fingerprint));
}

#[test]
fn test_memory_backend_expired_deadline() {
    let backend = MemoryBackend::new();
    assert!(matches!(backend.list(expired()), Err(Error::Timeout(_))));
    assert!(matches!(
        backend.save_with_metadata("0123456789ABCDEF", "x", None, expired()),
        Err(Error::Timeout(_))
    ));
    assert!(backend.is_empty());
}

#[test]
fn test_file_backend_create() {
    let dir = tempdir().unwrap();
    let keys = dir.path().join("keys");

    let backend = FileBackend::open(&keys, "key-", false).unwrap();
    assert!(keys.exists());
    assert_eq!(backend.name(), "file");
    assert!(backend.list(deadline()).unwrap().is_empty());
}

#[test]
fn test_file_backend_persists_keys() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(FileBackend::open(dir.path(), "", false).unwrap());
    persist_and_reload(backend);
}

#[test]
fn test_file_backend_prefix_and_sidecar() {
    let dir = tempdir().unwrap();
    let backend = FileBackend::open(dir.path(), "key-", false).unwrap();

    backend
        .save_with_metadata("0123456789ABCDEF", "armored", Some(r#"{"password":"pw"}"#), deadline())
        .unwrap();
    assert!(dir.path().join("key-0123456789ABCDEF.key").exists());
    assert!(dir.path().join("key-0123456789ABCDEF.key.json").exists());

    // Saving without metadata drops the sidecar
    backend
        .save_with_metadata("0123456789ABCDEF", "armored", None, deadline())
        .unwrap();
    assert!(!dir.path().join("key-0123456789ABCDEF.key.json").exists());

    let stored = backend.read("0123456789ABCDEF", deadline()).unwrap();
    assert_eq!(stored.key_data, "armored");
    assert_eq!(stored.metadata, None);
}

#[test]
fn test_file_backend_bad_entry_does_not_stop_load() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(FileBackend::open(dir.path(), "", false).unwrap());
    let manager = KeyManager::new(ManagerConfig::default(), backend.clone()).unwrap();

    let (secret_key, fingerprint) = create_test_key(&manager, "Good");
    manager.save_key(&fingerprint, &secret_key, None).unwrap();
    backend
        .save_with_metadata("FFFFFFFFFFFFFFFF", &secret_key, Some("{not json"), deadline())
        .unwrap();

    let report = manager.load_keys().unwrap();
    assert_eq!(report.private_keys, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "FFFFFFFFFFFFFFFF");
    assert!(manager.is_locked(&fingerprint));
}

#[cfg(feature = "keystore")]
mod sqlite {
    use super::*;
    use keysmith::SqliteBackend;

    #[test]
    fn test_sqlite_create() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("keys.db");

        let backend = SqliteBackend::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(backend.path(), db_path.display().to_string());
    }

    #[test]
    fn test_sqlite_persists_keys() {
        let dir = tempdir().unwrap();
        let backend = Arc::new(SqliteBackend::open(dir.path().join("keys.db")).unwrap());
        persist_and_reload(backend);
    }

    #[test]
    fn test_sqlite_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("keys.db");

        {
            let backend = SqliteBackend::open(&db_path).unwrap();
            backend
                .save_with_metadata("0123456789ABCDEF", "first", None, deadline())
                .unwrap();
            backend
                .save_with_metadata("0123456789ABCDEF", "second", Some("{}"), deadline())
                .unwrap();
        }

        let backend = SqliteBackend::open(&db_path).unwrap();
        assert_eq!(backend.list(deadline()).unwrap(), vec!["0123456789ABCDEF"]);
        let stored = backend.read("0123456789ABCDEF", deadline()).unwrap();
        assert_eq!(stored.key_data, "second");
        assert_eq!(stored.metadata.as_deref(), Some("{}"));
    }

    #[test]
    fn test_sqlite_expired_deadline() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(matches!(backend.read("0123456789ABCDEF", expired()), Err(Error::Timeout(_))));
    }
}
