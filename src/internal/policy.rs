//! Key validation and algorithm policy functions.
//!
//! rpgp doesn't have a policy system like sequoia, so we implement
//! manual validation of key properties here. This includes:
//! - Subkey expiration and revocation checks
//! - Minimum key size for generation
//! - User ID text rules

use std::time::SystemTime;

use pgp::composed::{SignedPublicKey, SignedPublicSubKey};
use pgp::packet::SignatureType;
use pgp::types::PublicKeyTrait;

use crate::error::{Error, Result};
use crate::types::Identity;
use crate::MIN_KEY_BITS;

/// Check if a key has expired based on its creation time and validity period.
pub(crate) fn is_key_expired(creation_time: SystemTime, validity_seconds: Option<u64>) -> bool {
    if let Some(validity) = validity_seconds {
        if validity == 0 {
            return false; // No expiration
        }
        let expiration = creation_time + std::time::Duration::from_secs(validity);
        expiration < SystemTime::now()
    } else {
        false
    }
}

/// Check if a subkey is revoked.
pub(crate) fn is_subkey_revoked(subkey: &SignedPublicSubKey) -> bool {
    subkey
        .signatures
        .iter()
        .any(|sig| sig.typ() == Some(SignatureType::SubkeyRevocation))
}

/// Check if a subkey is usable (not revoked and, unless allowed, not expired).
pub(crate) fn is_subkey_valid(subkey: &SignedPublicSubKey, allow_expired: bool) -> bool {
    if is_subkey_revoked(subkey) {
        return false;
    }

    if !allow_expired {
        // Expiration comes from the most recent binding signature
        if let Some(sig) = subkey.signatures.last() {
            if let Some(validity) = sig.key_expiration_time() {
                let creation_time = SystemTime::from(*subkey.key.created_at());
                let seconds = u64::try_from(validity.num_seconds()).unwrap_or(0);
                if is_key_expired(creation_time, Some(seconds)) {
                    return false;
                }
            }
        }
    }

    true
}

/// Subkeys flagged for encryption that are still valid.
pub(crate) fn encryption_subkeys(key: &SignedPublicKey) -> Vec<&SignedPublicSubKey> {
    key.public_subkeys
        .iter()
        .filter(|subkey| subkey.key.is_encryption_key())
        .filter(|subkey| {
            subkey.signatures.iter().any(|sig| {
                let flags = sig.key_flags();
                flags.encrypt_comms() || flags.encrypt_storage()
            })
        })
        .filter(|subkey| is_subkey_valid(subkey, false))
        .collect()
}

/// Reject generation requests below the minimum RSA modulus.
pub(crate) fn check_key_bits(bits: u32) -> Result<()> {
    if bits < MIN_KEY_BITS {
        return Err(Error::PolicyViolation(format!(
            "key size {} is below the minimum of {} bits",
            bits, MIN_KEY_BITS
        )));
    }
    Ok(())
}

const RESERVED_UID_CHARS: [char; 4] = ['(', ')', '<', '>'];

/// Reject identities whose fields contain the user ID delimiters.
pub(crate) fn validate_identity(identity: &Identity) -> Result<()> {
    for (field, value) in [
        ("name", &identity.name),
        ("comment", &identity.comment),
        ("email", &identity.email),
    ] {
        if value.contains(RESERVED_UID_CHARS) {
            return Err(Error::PolicyViolation(format!(
                "identity {} contains one of ( ) < >",
                field
            )));
        }
    }
    if identity.name.trim().is_empty() && identity.email.trim().is_empty() {
        return Err(Error::PolicyViolation(
            "identity needs a name or an email".to_string(),
        ));
    }
    Ok(())
}

/// Split a `Name (Comment) <email>` user ID into its parts.
///
/// Text that does not follow the layout ends up in `name`.
pub(crate) fn parse_identity(uid: &str) -> Identity {
    let mut rest = uid.trim();
    let mut identity = Identity::default();

    if rest.ends_with('>') {
        if let Some(open) = rest.rfind('<') {
            identity.email = rest[open + 1..rest.len() - 1].trim().to_string();
            rest = rest[..open].trim_end();
        }
    }

    if rest.ends_with(')') {
        if let Some(open) = rest.rfind('(') {
            identity.comment = rest[open + 1..rest.len() - 1].trim().to_string();
            rest = rest[..open].trim_end();
        }
    }

    identity.name = rest.to_string();
    identity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_bits() {
        assert!(check_key_bits(2048).is_ok());
        assert!(check_key_bits(4096).is_ok());
        assert!(matches!(check_key_bits(1024), Err(Error::PolicyViolation(_))));
    }

    #[test]
    fn test_parse_identity() {
        let id = parse_identity("Alice Doe (work) <alice@example.com>");
        assert_eq!(id.name, "Alice Doe");
        assert_eq!(id.comment, "work");
        assert_eq!(id.email, "alice@example.com");

        let id = parse_identity("Bob <bob@example.com>");
        assert_eq!(id.name, "Bob");
        assert_eq!(id.comment, "");
        assert_eq!(id.email, "bob@example.com");

        let id = parse_identity("just a name");
        assert_eq!(id.name, "just a name");
        assert!(id.email.is_empty());
    }

    #[test]
    fn test_validate_identity() {
        let ok = Identity {
            name: "HUE".into(),
            comment: "test key".into(),
            email: "a@b.c".into(),
        };
        assert!(validate_identity(&ok).is_ok());

        let bad = Identity {
            name: "Eve <evil>".into(),
            ..Default::default()
        };
        assert!(matches!(validate_identity(&bad), Err(Error::PolicyViolation(_))));

        let bad_comment = Identity {
            name: "Eve".into(),
            comment: "(nested)".into(),
            ..Default::default()
        };
        assert!(validate_identity(&bad_comment).is_err());

        assert!(validate_identity(&Identity::default()).is_err());
    }

    #[test]
    fn test_is_key_expired() {
        let now = SystemTime::now();
        assert!(!is_key_expired(now, None));
        assert!(!is_key_expired(now, Some(0)));
        assert!(!is_key_expired(now, Some(3600)));

        let long_ago = now - std::time::Duration::from_secs(7200);
        assert!(is_key_expired(long_ago, Some(3600)));
    }
}
