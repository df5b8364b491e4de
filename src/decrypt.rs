//! Decryption with unlocked keys.

use std::sync::Arc;

use base64::Engine;

use crate::entity::UnlockedKey;
use crate::error::{Error, Result};
use crate::internal::{dearmor, message_recipients};
use crate::manager::KeyManager;
use crate::types::DecryptedData;

impl KeyManager {
    /// Decrypt a message addressed to one of the unlocked keys.
    ///
    /// `raw_input` means `data` is base64 of a binary message (what
    /// [`encrypt`](Self::encrypt) produces with `raw_output`); otherwise it
    /// is an ASCII-armored message. Recipients are tried in the order the
    /// message lists them. Nothing is loaded or unlocked implicitly.
    ///
    /// # Errors
    /// * [`Error::Parse`] - undecodable input or no session key packets
    /// * [`Error::NoUsableKey`] - no recipient has an unlocked key
    pub fn decrypt(&self, data: &str, raw_input: bool) -> Result<DecryptedData> {
        let binary = if raw_input {
            let compact: String = data.split_whitespace().collect();
            base64::engine::general_purpose::STANDARD.decode(compact)?
        } else {
            dearmor(data.as_bytes())?
        };

        let recipients = message_recipients(&binary)?;
        if recipients.is_empty() {
            return Err(Error::Parse("no encrypted payloads found".to_string()));
        }

        let (fingerprint, key) = self
            .first_unlocked(&recipients)
            .ok_or(Error::NoUsableKey)?;

        let (plaintext, filename) = key.decrypt(&binary)?;

        tracing::debug!(
            fingerprint = %fingerprint,
            master = %key.master(),
            bytes = plaintext.len(),
            "Decrypted message"
        );

        Ok(DecryptedData {
            data: plaintext,
            filename,
            fingerprint,
        })
    }

    fn first_unlocked(&self, recipients: &[String]) -> Option<(String, Arc<UnlockedKey>)> {
        recipients.iter().find_map(|candidate| {
            self.cached_unlocked(candidate)
                .map(|key| (candidate.clone(), key))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::backend::MemoryBackend;
    use crate::config::ManagerConfig;
    use crate::manager::KeyManager;
    use crate::types::{CipherSuite, Identity};

    #[test]
    fn test_subkey_falls_back_to_unlocked_master() {
        let manager = KeyManager::new(ManagerConfig::default(), Arc::new(MemoryBackend::new())).unwrap();
        let identity = Identity {
            name: "Dana".into(),
            comment: String::new(),
            email: "dana@example.com".into(),
        };
        let key = manager.generate_key(&identity, "pw", CipherSuite::Cv25519).unwrap();
        manager.load_key(&key.private_key).unwrap();
        manager.unlock(&key.fingerprint, "pw").unwrap();

        let entity = manager.public_key(&key.fingerprint).unwrap();
        let master = entity.fingerprint().to_string();
        let subkey = entity.subkeys()[0].fingerprint().to_string();

        // Only the master stays cached; the subkey is reachable through the index
        {
            let mut state = manager.write_state();
            assert!(state.unlocked.remove(&subkey).is_some());
            assert_eq!(state.index.master_of(&subkey), Some(master.as_str()));
        }
        assert!(manager.cached_unlocked(&subkey).is_some());

        let message = manager.encrypt("fallback.txt", &key.fingerprint, b"via master", false).unwrap();
        let plain = manager.decrypt(&message, false).unwrap();
        assert_eq!(plain.data, b"via master");
        assert_eq!(plain.fingerprint, subkey);
    }
}
