//! Passphrase unlocking.
//!
//! Unlocking checks the passphrase against a copy of the private key outside
//! the state lock, then publishes the result for the master and each of its
//! secret subkeys in one write-locked step. There is no relock: unlocked keys
//! stay unlocked for the life of the manager.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::manager::KeyManager;

impl KeyManager {
    /// `true` unless `fp` has an unlocked entry. Unresolvable input counts
    /// as locked.
    pub fn is_locked(&self, fp: &str) -> bool {
        let state = self.read_state();
        match state.index.sanitize(fp) {
            Some(fp) => !state.unlocked.contains_key(&fp),
            None => true,
        }
    }

    /// Unlock a private key (master or subkey fingerprint) with `passphrase`.
    ///
    /// A key missing from the index is read from the backend first.
    /// Unlocking an already unlocked key with the right passphrase succeeds.
    ///
    /// # Errors
    /// * [`Error::KeyNotFound`] - neither the index nor the backend has the key
    /// * [`Error::NoSecretKey`] - the key has no private material
    /// * [`Error::WrongPassphrase`] - the passphrase does not open every part
    pub fn unlock(&self, fp: &str, passphrase: &str) -> Result<()> {
        let fp = self.require_fingerprint(fp)?;

        let entity = match self.local_entity(&fp)? {
            Some(entity) => entity,
            None => {
                self.load_key_from_backend(&fp).map_err(|e| {
                    if e.is_not_found() {
                        Error::KeyNotFound(fp.clone())
                    } else {
                        e
                    }
                })?;
                self.local_entity(&fp)?
                    .ok_or_else(|| Error::KeyNotFound(fp.clone()))?
            }
        };

        let unlocked = Arc::new(entity.unlock(passphrase)?);
        let master = unlocked.master().to_string();

        let mut state = self.write_state();
        if state.index.get(&master).is_none() {
            return Err(Error::KeyNotFound(master));
        }

        state.unlocked.insert(master.clone(), unlocked.clone());
        for subkey in entity.subkeys().iter().filter(|sk| sk.has_private_key()) {
            state
                .unlocked
                .insert(subkey.fingerprint().to_string(), unlocked.clone());
        }

        if state.default_fingerprint.is_none() {
            tracing::info!(fingerprint = %master, "Adopting first unlocked key as default");
            state.default_fingerprint = Some(master.clone());
        }
        drop(state);

        tracing::info!(fingerprint = %master, requested = %fp, "Key unlocked");
        Ok(())
    }
}
