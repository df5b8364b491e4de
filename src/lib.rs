//! # keysmith
//!
//! An OpenPGP key manager core built on [rpgp](https://docs.rs/pgp): it loads,
//! indexes and unlocks keys, and signs, verifies, encrypts and decrypts on
//! their behalf.
//!
//! - **Key index**: keys addressed by 16-char fingerprint, with 8-char short
//!   ids and subkey-to-master indirection
//! - **Unlocking**: passphrase-checked private keys held in memory
//! - **Sign / Verify**: ASCII-armored detached signatures
//! - **Encrypt / Decrypt**: AES-256, ZLIB-compressed messages, armored or raw
//! - **Backends**: in-memory, directory, or SQLite (`keystore` feature)
//! - **Resolver**: sticky key ring with HKP keyserver fallback (`network` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use keysmith::*;
//!
//! let manager = KeyManager::new(ManagerConfig::default(), Arc::new(MemoryBackend::new())).unwrap();
//!
//! let identity = Identity { name: "Alice".into(), comment: String::new(), email: "alice@example.com".into() };
//! let key = manager.generate_key(&identity, "password", CipherSuite::Cv25519).unwrap();
//!
//! manager.load_key(&key.private_key).unwrap();
//! manager.unlock(&key.fingerprint, "password").unwrap();
//!
//! let signature = manager.sign(&key.fingerprint, b"hello", HashAlgorithm::Sha256).unwrap();
//! assert!(manager.verify(b"hello", &signature).unwrap());
//!
//! let message = manager.encrypt("note.txt", &key.fingerprint, b"secret", false).unwrap();
//! let plain = manager.decrypt(&message, false).unwrap();
//! assert_eq!(plain.data, b"secret");
//! ```
//!
//! ## Fingerprints
//!
//! Every operation accepts a full fingerprint (spaces allowed), its trailing
//! 16 hex characters, or the trailing 8 when those are unique among loaded
//! keys. [`KeyManager::fix_fingerprint`] shows what an input resolves to.
//!
//! ## Features
//!
//! - `keystore`: SQLite key backend (requires `rusqlite`)
//! - `network`: keyserver lookups in the external resolver (requires `reqwest`)

// Modules
mod config;
mod error;
mod types;
mod internal;

mod fingerprint;
mod entity;
mod index;
mod manager;

mod keyring;
mod lock;
mod sign;
mod verify;
mod encrypt;
mod decrypt;
mod key;

pub mod backend;
pub mod resolver;

/// Smallest RSA modulus accepted for key generation.
pub const MIN_KEY_BITS: u32 = 2048;

// Re-export error types
pub use error::{Error, Result};

pub use config::ManagerConfig;
pub use manager::KeyManager;
pub use entity::{Entity, Subkey};
pub use fingerprint::{FP_LEN, SHORT_FP_LEN};

pub use types::{
    CipherSuite,
    Deadline,
    DecryptedData,
    GeneratedKey,
    Identity,
    KeyInfo,
    LoadReport,
};

pub use backend::{FileBackend, KeyBackend, MemoryBackend, StoredKey};
#[cfg(feature = "keystore")]
pub use backend::SqliteBackend;

pub use resolver::{KeyResolver, StickyKeyRing};
#[cfg(feature = "network")]
pub use resolver::KeyServer;

/// Hash algorithms accepted by [`KeyManager::sign`].
pub use pgp::crypto::hash::HashAlgorithm;
