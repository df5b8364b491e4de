//! Parsed OpenPGP keys as the manager holds them.
//!
//! An [`Entity`] owns the public certificate, the private key exactly as it
//! was loaded (usually passphrase protected), its addressable [`Subkey`]s and
//! the identities on it. Unlocking never touches the entity; it yields a
//! separate [`UnlockedKey`] that the manager caches.

use std::io::Cursor;

use pgp::composed::{
    DetachedSignature, Message, SignedPublicKey, SignedPublicSubKey, SignedSecretKey,
};
use pgp::crypto::hash::HashAlgorithm;
use pgp::types::{Password, PublicKeyTrait};
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::fingerprint::long_form;
use crate::internal::{
    fingerprint_to_hex, get_key_bit_size, parse_identity, ParsedKey,
};
use crate::types::{Identity, KeyInfo};

/// A subkey of an [`Entity`], addressable by its own fingerprint.
#[derive(Debug, Clone)]
pub struct Subkey {
    fingerprint: String,
    full_fingerprint: String,
    has_private_key: bool,
    key: SignedPublicSubKey,
}

impl Subkey {
    /// 16-char fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Full hex fingerprint.
    pub fn full_fingerprint(&self) -> &str {
        &self.full_fingerprint
    }

    /// Whether private material for this subkey was loaded.
    pub fn has_private_key(&self) -> bool {
        self.has_private_key
    }

    pub fn can_encrypt(&self) -> bool {
        self.key.key.is_encryption_key()
    }
}

/// A loaded key: public certificate, optional private key, subkeys and
/// identities.
#[derive(Debug, Clone)]
pub struct Entity {
    fingerprint: String,
    full_fingerprint: String,
    public: SignedPublicKey,
    secret: Option<SignedSecretKey>,
    subkeys: Vec<Subkey>,
    identities: Vec<Identity>,
}

impl Entity {
    /// Build from a transferable secret key.
    pub fn from_secret_key(secret: SignedSecretKey) -> Self {
        let secret_fps: Vec<String> = secret
            .secret_subkeys
            .iter()
            .map(|sk| fingerprint_to_hex(&sk.key))
            .collect();
        let public = secret.signed_public_key();
        Self::build(public, Some(secret), &secret_fps)
    }

    /// Build from a public certificate.
    pub fn from_public_key(public: SignedPublicKey) -> Self {
        Self::build(public, None, &[])
    }

    pub(crate) fn from_parsed(parsed: ParsedKey) -> Self {
        match parsed {
            ParsedKey::Secret(secret) => Self::from_secret_key(secret),
            ParsedKey::Public(public) => Self::from_public_key(public),
        }
    }

    fn build(public: SignedPublicKey, secret: Option<SignedSecretKey>, secret_fps: &[String]) -> Self {
        let full_fingerprint = fingerprint_to_hex(&public.primary_key);

        let subkeys = public
            .public_subkeys
            .iter()
            .map(|sk| {
                let full = fingerprint_to_hex(&sk.key);
                Subkey {
                    fingerprint: long_form(&full),
                    has_private_key: secret_fps.contains(&full),
                    full_fingerprint: full,
                    key: sk.clone(),
                }
            })
            .collect();

        let identities = public
            .details
            .users
            .iter()
            .map(|u| parse_identity(&String::from_utf8_lossy(u.id.id())))
            .collect();

        Entity {
            fingerprint: long_form(&full_fingerprint),
            full_fingerprint,
            public,
            secret,
            subkeys,
            identities,
        }
    }

    /// 16-char fingerprint of the primary key.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Full hex fingerprint of the primary key.
    pub fn full_fingerprint(&self) -> &str {
        &self.full_fingerprint
    }

    pub fn subkeys(&self) -> &[Subkey] {
        &self.subkeys
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn has_private_key(&self) -> bool {
        self.secret.is_some()
    }

    pub fn public_key(&self) -> &SignedPublicKey {
        &self.public
    }

    pub(crate) fn secret_key(&self) -> Option<&SignedSecretKey> {
        self.secret.as_ref()
    }

    /// Copy without private material.
    pub fn to_public(&self) -> Entity {
        Entity {
            secret: None,
            subkeys: self
                .subkeys
                .iter()
                .cloned()
                .map(|sk| Subkey {
                    has_private_key: false,
                    ..sk
                })
                .collect(),
            ..self.clone()
        }
    }

    /// Subkey with the given 16-char fingerprint.
    pub fn subkey(&self, fp: &str) -> Option<&Subkey> {
        self.subkeys.iter().find(|sk| sk.fingerprint == fp)
    }

    /// Identities joined for display, `", "` separated.
    pub fn identifier(&self) -> String {
        self.identities
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn creation_time(&self) -> chrono::DateTime<chrono::Utc> {
        *self.public.primary_key.created_at()
    }

    /// Summary for listings. `decrypted` comes from the unlocked-key cache.
    pub fn info(&self, decrypted: bool) -> KeyInfo {
        KeyInfo {
            fingerprint: self.fingerprint.clone(),
            identifier: self.identifier(),
            bits: get_key_bit_size(&self.public.primary_key),
            contains_private_key: self.has_private_key(),
            private_key_is_decrypted: decrypted,
            creation_time: self.creation_time(),
        }
    }

    /// Check a detached signature against the primary key and every subkey.
    pub fn verify_detached(&self, signature: &DetachedSignature, data: &[u8]) -> bool {
        if signature.verify(&self.public.primary_key, data).is_ok() {
            return true;
        }
        self.subkeys
            .iter()
            .any(|sk| signature.verify(&sk.key.key, data).is_ok())
    }

    /// Check the passphrase against the primary key and every secret subkey.
    ///
    /// All-or-nothing: a single failure leaves nothing unlocked.
    pub(crate) fn unlock(&self, passphrase: &str) -> Result<UnlockedKey> {
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| Error::NoSecretKey(self.fingerprint.clone()))?;
        let password = Password::from(passphrase);

        secret
            .primary_key
            .unlock(&password, |_, _| Ok(()))
            .and_then(|opened| opened)
            .map_err(|_| Error::WrongPassphrase(self.fingerprint.clone()))?;

        for subkey in &secret.secret_subkeys {
            subkey
                .key
                .unlock(&password, |_, _| Ok(()))
                .and_then(|opened| opened)
                .map_err(|_| Error::WrongPassphrase(long_form(&fingerprint_to_hex(&subkey.key))))?;
        }

        Ok(UnlockedKey {
            master: self.fingerprint.clone(),
            key: secret.clone(),
            password,
        })
    }
}

/// Private key material that passed the passphrase check.
///
/// rPGP decrypts secret parameters per operation, so the unlocked form is the
/// key copy together with its verified passphrase. One `UnlockedKey` serves
/// the master and all of its subkeys.
pub(crate) struct UnlockedKey {
    master: String,
    key: SignedSecretKey,
    password: Password,
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

impl UnlockedKey {
    /// 16-char fingerprint of the master key.
    pub(crate) fn master(&self) -> &str {
        &self.master
    }

    /// Detached signature over `data` with the primary key.
    pub(crate) fn sign_detached(&self, data: &[u8], hash: HashAlgorithm) -> Result<DetachedSignature> {
        let mut rng = thread_rng();
        DetachedSignature::sign_binary_data(
            &mut rng,
            &self.key.primary_key,
            &self.password,
            hash,
            Cursor::new(data),
        )
        .map_err(|e| Error::Crypto(e.to_string()))
    }

    /// Decrypt a binary OpenPGP message, returning plaintext and the literal
    /// data file name.
    pub(crate) fn decrypt(&self, ciphertext: &[u8]) -> Result<(Vec<u8>, String)> {
        let message = Message::from_bytes(ciphertext).map_err(|e| Error::Parse(e.to_string()))?;

        let decrypted = message
            .decrypt(&self.password, &self.key)
            .map_err(|e| Error::Crypto(e.to_string()))?;

        let mut plain = if decrypted.is_compressed() {
            decrypted
                .decompress()
                .map_err(|e| Error::Crypto(e.to_string()))?
        } else {
            decrypted
        };

        let filename = plain
            .literal_data_header()
            .map(|h| String::from_utf8_lossy(h.file_name()).to_string())
            .unwrap_or_default();

        let data = plain
            .as_data_vec()
            .map_err(|e| Error::Crypto(e.to_string()))?;

        Ok((data, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_secret_key;
    use crate::types::CipherSuite;

    fn entity(passphrase: &str) -> Entity {
        let identity = Identity {
            name: "Erin".into(),
            comment: "entity".into(),
            email: "erin@example.com".into(),
        };
        Entity::from_secret_key(generate_secret_key(&identity, passphrase, CipherSuite::Cv25519).unwrap())
    }

    #[test]
    fn test_entity_shape() {
        let e = entity("pw");
        assert_eq!(e.fingerprint().len(), 16);
        assert!(e.full_fingerprint().ends_with(e.fingerprint()));
        assert!(e.has_private_key());
        assert_eq!(e.subkeys().len(), 1);
        assert!(e.subkeys()[0].has_private_key());
        assert!(e.subkeys()[0].can_encrypt());
        assert_eq!(e.identities()[0].email, "erin@example.com");
        assert_eq!(e.identifier(), "Erin (entity) <erin@example.com>");

        let info = e.info(false);
        assert!(info.contains_private_key);
        assert!(!info.private_key_is_decrypted);
    }

    #[test]
    fn test_to_public() {
        let e = entity("pw");
        let public = e.to_public();
        assert!(!public.has_private_key());
        assert!(!public.subkeys()[0].has_private_key());
        assert_eq!(public.fingerprint(), e.fingerprint());
        assert!(matches!(public.unlock("pw"), Err(Error::NoSecretKey(_))));
    }

    #[test]
    fn test_unlock_checks_passphrase() {
        let e = entity("correct horse");
        assert!(matches!(e.unlock("wrong"), Err(Error::WrongPassphrase(_))));
        let unlocked = e.unlock("correct horse").unwrap();
        assert_eq!(unlocked.master(), e.fingerprint());
    }

    #[test]
    fn test_sign_and_verify_detached() {
        let e = entity("pw");
        let unlocked = e.unlock("pw").unwrap();
        let sig = unlocked.sign_detached(b"payload", HashAlgorithm::Sha256).unwrap();

        assert!(e.verify_detached(&sig, b"payload"));
        assert!(!e.verify_detached(&sig, b"payloaD"));
    }
}
