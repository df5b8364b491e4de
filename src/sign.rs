//! Detached signing with unlocked keys.

use std::sync::Arc;

use pgp::crypto::hash::HashAlgorithm;

use crate::entity::UnlockedKey;
use crate::error::{Error, Result};
use crate::manager::KeyManager;

impl KeyManager {
    /// Create an ASCII-armored detached signature over `data`.
    ///
    /// A key missing from the index is read from the backend, but signing
    /// never unlocks: [`unlock`](Self::unlock) must have succeeded first.
    ///
    /// # Errors
    /// * [`Error::KeyNotFound`] - the fingerprint resolves nowhere
    /// * [`Error::LockedKey`] - the key is loaded but not unlocked
    /// * [`Error::NoSecretKey`] - only the public key is known
    pub fn sign(&self, fp: &str, data: &[u8], hash: HashAlgorithm) -> Result<String> {
        let fp = self.require_fingerprint(fp)?;
        let key = self.signing_key(&fp)?;

        let signature = key.sign_detached(data, hash)?;
        let armored = signature
            .to_armored_string(self.headers.options())
            .map_err(|e| Error::Crypto(e.to_string()))?;

        tracing::debug!(fingerprint = %fp, hash = ?hash, bytes = data.len(), "Signed data");
        Ok(armored)
    }

    /// Sign with the default key.
    pub fn sign_with_default(&self, data: &[u8], hash: HashAlgorithm) -> Result<String> {
        let fp = self
            .default_fingerprint()
            .ok_or_else(|| Error::KeyNotFound("no default signing key".to_string()))?;
        self.sign(&fp, data, hash)
    }

    fn signing_key(&self, fp: &str) -> Result<Arc<UnlockedKey>> {
        if let Some(key) = self.cached_unlocked(fp) {
            return Ok(key);
        }

        let entity = match self.local_entity(fp)? {
            Some(entity) => entity,
            None => {
                self.load_key_from_backend(fp).map_err(|e| {
                    if e.is_not_found() {
                        Error::KeyNotFound(fp.to_string())
                    } else {
                        e
                    }
                })?;
                // The backend sidecar may have unlocked it
                if let Some(key) = self.cached_unlocked(fp) {
                    return Ok(key);
                }
                self.local_entity(fp)?
                    .ok_or_else(|| Error::KeyNotFound(fp.to_string()))?
            }
        };

        if entity.has_private_key() {
            Err(Error::LockedKey(fp.to_string()))
        } else {
            Err(Error::NoSecretKey(fp.to_string()))
        }
    }

    pub(crate) fn cached_unlocked(&self, fp: &str) -> Option<Arc<UnlockedKey>> {
        let state = self.read_state();
        if let Some(key) = state.unlocked.get(fp) {
            return Some(key.clone());
        }
        state
            .index
            .master_of(fp)
            .and_then(|master| state.unlocked.get(master))
            .cloned()
    }
}
