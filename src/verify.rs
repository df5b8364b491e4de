//! Detached signature verification.

use std::io::Cursor;

use pgp::composed::{Deserializable, DetachedSignature};

use crate::error::{Error, Result};
use crate::internal::{armor_block_type, signature_issuers};
use crate::manager::KeyManager;

impl KeyManager {
    /// Verify an ASCII-armored detached signature over `data`.
    ///
    /// The signer is found from the issuer recorded in the signature,
    /// through the local index or the external resolver.
    ///
    /// # Returns
    /// `true` if the signature is valid, `false` if it does not match.
    ///
    /// # Errors
    /// * [`Error::Parse`] - not a signature block, or no issuer recorded
    /// * [`Error::KeyNotFound`] - no issuer key resolves anywhere
    pub fn verify(&self, data: &[u8], signature: &str) -> Result<bool> {
        match armor_block_type(signature) {
            Some("PGP SIGNATURE") => {}
            Some(other) => {
                return Err(Error::Parse(format!("expected a signature block, got {}", other)))
            }
            None => return Err(Error::Parse("signature is not armored".to_string())),
        }

        let (sig, _headers) = DetachedSignature::from_armor_single(Cursor::new(signature.as_bytes()))
            .map_err(|e| Error::Parse(e.to_string()))?;

        let issuers = signature_issuers(&sig);
        if issuers.is_empty() {
            return Err(Error::Parse("signature names no issuer".to_string()));
        }

        for issuer in &issuers {
            let entity = match self.resolve_public(issuer) {
                Ok(entity) => entity,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };

            let valid = entity.verify_detached(&sig, data);
            tracing::debug!(
                issuer = %issuer,
                fingerprint = %entity.fingerprint(),
                valid,
                "Verified signature"
            );
            return Ok(valid);
        }

        Err(Error::KeyNotFound(issuers.join(", ")))
    }
}
