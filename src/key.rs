//! Key generation and private key export.

use pgp::composed::{SecretKeyParamsBuilder, SignedSecretKey, SubkeyParamsBuilder};
use pgp::types::Password;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::internal::{
    check_key_bits, fingerprint_to_hex, public_key_to_armored, secret_key_to_armored,
    validate_identity,
};
use crate::manager::KeyManager;
use crate::types::{CipherSuite, GeneratedKey, Identity};

/// Generate a certify+sign primary key with one encryption subkey.
///
/// Both keys are protected with `passphrase` unless it is empty.
pub(crate) fn generate_secret_key(
    identity: &Identity,
    passphrase: &str,
    cipher: CipherSuite,
) -> Result<SignedSecretKey> {
    validate_identity(identity)?;
    if let CipherSuite::Rsa(bits) = cipher {
        check_key_bits(bits)?;
    }

    let mut rng = thread_rng();

    let mut enc_builder = SubkeyParamsBuilder::default();
    enc_builder
        .key_type(cipher.encryption_key_type())
        .can_encrypt(true)
        .can_sign(false)
        .can_authenticate(false);
    if !passphrase.is_empty() {
        enc_builder.passphrase(Some(passphrase.to_string()));
    }
    let encryption_subkey = enc_builder
        .build()
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let mut key_params = SecretKeyParamsBuilder::default();
    key_params
        .key_type(cipher.primary_key_type())
        .can_certify(true)
        .can_sign(true)
        .can_encrypt(false)
        .primary_user_id(identity.to_string())
        .subkeys(vec![encryption_subkey]);
    if !passphrase.is_empty() {
        key_params.passphrase(Some(passphrase.to_string()));
    }

    let secret_key_params = key_params
        .build()
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let secret_key = secret_key_params
        .generate(&mut rng)
        .map_err(|e| Error::Crypto(e.to_string()))?;

    // Self-signatures are made with the freshly protected primary key
    secret_key
        .sign(&mut rng, &Password::from(passphrase))
        .map_err(|e| Error::Crypto(e.to_string()))
}

impl KeyManager {
    /// Generate a new key pair. The key is returned, not loaded.
    ///
    /// # Errors
    /// * [`Error::PolicyViolation`] - RSA below [`MIN_KEY_BITS`](crate::MIN_KEY_BITS),
    ///   or identity fields containing `(`, `)`, `<` or `>`
    pub fn generate_key(
        &self,
        identity: &Identity,
        passphrase: &str,
        cipher: CipherSuite,
    ) -> Result<GeneratedKey> {
        let secret_key = generate_secret_key(identity, passphrase, cipher)?;
        let public_key = secret_key.signed_public_key();
        let fingerprint = fingerprint_to_hex(&public_key.primary_key);

        tracing::info!(
            fingerprint = %fingerprint,
            cipher = %cipher.name(),
            "Generated key"
        );

        Ok(GeneratedKey {
            private_key: secret_key_to_armored(&secret_key, &self.headers)?,
            public_key: public_key_to_armored(&public_key, &self.headers)?,
            fingerprint,
        })
    }

    /// Generate an RSA key pair with a `bits`-sized modulus.
    pub fn generate_rsa_key(
        &self,
        identity: &Identity,
        passphrase: &str,
        bits: u32,
    ) -> Result<GeneratedKey> {
        self.generate_key(identity, passphrase, CipherSuite::Rsa(bits))
    }

    /// Export a loaded private key, still passphrase protected.
    ///
    /// The passphrase must open the key; the export itself is the stored
    /// (encrypted) form.
    pub fn private_key_armored(&self, fp: &str, passphrase: &str) -> Result<String> {
        let fp = self.require_fingerprint(fp)?;
        let entity = match self.local_entity(&fp)? {
            Some(entity) => entity,
            None => {
                self.load_key_from_backend(&fp)?;
                self.local_entity(&fp)?
                    .ok_or_else(|| Error::KeyNotFound(fp.clone()))?
            }
        };

        let secret = entity
            .secret_key()
            .ok_or_else(|| Error::NoSecretKey(entity.fingerprint().to_string()))?;

        entity.unlock(passphrase)?;
        secret_key_to_armored(secret, &self.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity {
            name: "Test".into(),
            comment: "unit".into(),
            email: "test@example.com".into(),
        }
    }

    #[test]
    fn test_generate_cv25519() {
        let key = generate_secret_key(&identity(), "pw", CipherSuite::Cv25519).unwrap();
        assert_eq!(key.secret_subkeys.len(), 1);
        assert_eq!(key.details.users.len(), 1);
        assert_eq!(
            String::from_utf8_lossy(key.details.users[0].id.id()),
            "Test (unit) <test@example.com>"
        );
    }

    #[test]
    fn test_generate_weak_rsa_rejected() {
        let err = generate_secret_key(&identity(), "pw", CipherSuite::Rsa(1024)).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation(_)));
    }

    #[test]
    fn test_generate_bad_identity_rejected() {
        let bad = Identity {
            name: "Mallory <m@example.com>".into(),
            ..Default::default()
        };
        let err = generate_secret_key(&bad, "pw", CipherSuite::Cv25519).unwrap_err();
        assert!(matches!(err, Error::PolicyViolation(_)));
    }
}
