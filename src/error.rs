//! Error types for the keysmith crate.
//!
//! Every fallible operation returns [`Result`]. Batch loads never fail on a
//! single bad key; they log it and count it instead (see
//! [`LoadReport`](crate::LoadReport)).

use thiserror::Error;

/// The main error type for key manager operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed key, signature or message
    #[error("Parse error: {0}")]
    Parse(String),

    /// No key resolves for the given fingerprint, locally or remotely
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A subkey maps to a master key that is not in the index
    #[error("Subkey {subkey} points to master {master}, which is not loaded")]
    SubkeyUnresolved {
        /// Subkey fingerprint (16 chars)
        subkey: String,
        /// Master fingerprint the subkey map points to
        master: String,
    },

    /// Private key is present but has not been unlocked
    #[error("Key {0} is locked")]
    LockedKey(String),

    /// The entity carries no private key material
    #[error("Key {0} has no private key material")]
    NoSecretKey(String),

    /// Passphrase did not decrypt the private key material
    #[error("Wrong passphrase for key {0}")]
    WrongPassphrase(String),

    /// Recipient key has no usable encryption key or subkey
    #[error("Key {0} has no usable encryption key")]
    NoEncryptionKey(String),

    /// None of the message recipients has an unlocked key
    #[error("No unlocked key for decrypting packet")]
    NoUsableKey,

    /// Key backend I/O failure
    #[error("Key backend error: {0}")]
    Backend(String),

    /// Request rejected by key policy (weak key size, bad identity text)
    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    /// A backend or resolver call ran past its deadline
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// rPGP error
    #[error("OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    /// Metadata or configuration JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database error (keystore feature)
    #[cfg(feature = "keystore")]
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Network error (network feature)
    #[cfg(feature = "network")]
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// True for the "nothing there" family of errors, which resolution
    /// treats as a miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound(_) | Error::SubkeyUnresolved { .. })
    }
}

/// A specialized Result type for key manager operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Parse(format!("invalid base64: {}", e))
    }
}
