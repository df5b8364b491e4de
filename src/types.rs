//! Public type definitions for the keysmith crate.
//!
//! Plain data carried across the manager API: key summaries, decrypted
//! payloads, load reports, and the deadline handed to collaborators.

use std::time::{Duration, Instant};

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cipher suite options for key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// RSA primary and encryption subkey with the given modulus size in bits
    Rsa(u32),
    /// Curve25519 legacy format (EdDSA for signing, ECDH for encryption)
    Cv25519,
    /// Modern Curve25519 (Ed25519 for signing, X25519 for encryption)
    Cv25519Modern,
    /// NIST P-256 curve (ECDSA for signing, ECDH for encryption)
    NistP256,
    /// NIST P-384 curve (ECDSA for signing, ECDH for encryption)
    NistP384,
}

impl Default for CipherSuite {
    fn default() -> Self {
        CipherSuite::Rsa(crate::MIN_KEY_BITS)
    }
}

impl std::str::FromStr for CipherSuite {
    type Err = String;

    /// Parse cipher suite from string (case-insensitive).
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rsa2k" | "rsa2048" => Ok(CipherSuite::Rsa(2048)),
            "rsa3k" | "rsa3072" => Ok(CipherSuite::Rsa(3072)),
            "rsa4k" | "rsa4096" => Ok(CipherSuite::Rsa(4096)),
            "cv25519" | "curve25519" | "ed25519" | "ed25519legacy" => Ok(CipherSuite::Cv25519),
            "cv25519modern" | "curve25519modern" | "x25519" => Ok(CipherSuite::Cv25519Modern),
            "nistp256" | "p256" | "secp256r1" => Ok(CipherSuite::NistP256),
            "nistp384" | "p384" | "secp384r1" => Ok(CipherSuite::NistP384),
            _ => Err(format!("unknown cipher suite: {}", s)),
        }
    }
}

impl CipherSuite {
    /// Get a human-readable name for the cipher suite.
    pub fn name(&self) -> String {
        match self {
            CipherSuite::Rsa(bits) => format!("RSA {}", bits),
            CipherSuite::Cv25519 => "Curve25519 (Legacy)".to_string(),
            CipherSuite::Cv25519Modern => "Curve25519 (Modern)".to_string(),
            CipherSuite::NistP256 => "NIST P-256".to_string(),
            CipherSuite::NistP384 => "NIST P-384".to_string(),
        }
    }

    /// rPGP key type for the primary (certify + sign) key.
    pub(crate) fn primary_key_type(&self) -> pgp::composed::KeyType {
        use pgp::composed::KeyType;
        use pgp::crypto::ecc_curve::ECCCurve;

        match self {
            CipherSuite::Rsa(bits) => KeyType::Rsa(*bits),
            CipherSuite::Cv25519 => KeyType::Ed25519Legacy,
            CipherSuite::Cv25519Modern => KeyType::Ed25519,
            CipherSuite::NistP256 => KeyType::ECDSA(ECCCurve::P256),
            CipherSuite::NistP384 => KeyType::ECDSA(ECCCurve::P384),
        }
    }

    /// rPGP key type for the encryption subkey.
    pub(crate) fn encryption_key_type(&self) -> pgp::composed::KeyType {
        use pgp::composed::KeyType;
        use pgp::crypto::ecc_curve::ECCCurve;

        match self {
            CipherSuite::Rsa(bits) => KeyType::Rsa(*bits),
            CipherSuite::Cv25519 => KeyType::ECDH(ECCCurve::Curve25519),
            CipherSuite::Cv25519Modern => KeyType::X25519,
            CipherSuite::NistP256 => KeyType::ECDH(ECCCurve::P256),
            CipherSuite::NistP384 => KeyType::ECDH(ECCCurve::P384),
        }
    }
}

/// One user identity on a key: `Name (Comment) <email>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub comment: String,
    pub email: String,
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.comment.is_empty() {
            write!(f, " ({})", self.comment)?;
        }
        if !self.email.is_empty() {
            write!(f, " <{}>", self.email)?;
        }
        Ok(())
    }
}

/// Summary of a key known to the manager or the external resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    /// 16-char fingerprint
    pub fingerprint: String,
    /// Identities joined as a single display string
    pub identifier: String,
    /// Key size in bits
    pub bits: usize,
    pub contains_private_key: bool,
    pub private_key_is_decrypted: bool,
    pub creation_time: DateTime<Utc>,
}

/// Result of key generation.
#[derive(Debug)]
pub struct GeneratedKey {
    /// ASCII-armored private key (still passphrase protected)
    pub private_key: String,
    /// ASCII-armored public key
    pub public_key: String,
    /// Full 40-char fingerprint
    pub fingerprint: String,
}

/// Output of a successful decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedData {
    pub data: Vec<u8>,
    /// File name embedded in the literal data packet
    pub filename: String,
    /// 16-char fingerprint of the recipient key that opened the message
    pub fingerprint: String,
}

impl DecryptedData {
    /// The plaintext as standard base64, the form the transport layer ships.
    pub fn base64_data(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

/// Counts from a load pass. Failures are recorded, never raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Public keys registered in the index
    pub public_keys: usize,
    /// Keys that carried private material
    pub private_keys: usize,
    /// Backend ids (or bundle positions) that failed, with the reason
    pub failures: Vec<(String, String)>,
}

impl LoadReport {
    pub(crate) fn merge(&mut self, other: LoadReport) {
        self.public_keys += other.public_keys;
        self.private_keys += other.private_keys;
        self.failures.extend(other.failures);
    }
}

/// Point in time after which a backend or resolver call must give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now() + timeout)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Fail with [`Error::Timeout`](crate::Error::Timeout) if already past.
    pub fn check(&self, what: &str) -> crate::Result<()> {
        if self.expired() {
            return Err(crate::Error::Timeout(what.to_string()));
        }
        Ok(())
    }
}
