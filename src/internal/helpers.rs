//! Internal helper functions around the rPGP codec.
//!
//! Everything that touches packet or armor details lives here so the manager
//! code only sees crate types and hex fingerprints.

use std::collections::BTreeMap;
use std::io::{BufReader, Cursor, Read};

use pgp::armor::Dearmor;
use pgp::composed::{Deserializable, DetachedSignature, SignedPublicKey, SignedSecretKey};
use pgp::packet::{Packet, PacketParser, PublicKeyEncryptedSessionKey};
use pgp::types::KeyDetails;

use crate::error::{Error, Result};
use crate::fingerprint::{long_form, FP_LEN};

/// Armor header lines attached to everything the manager emits.
#[derive(Debug, Clone)]
pub(crate) struct ArmorHeaders(BTreeMap<String, Vec<String>>);

impl ArmorHeaders {
    pub(crate) fn new(version: &str, comment: &str) -> Self {
        let mut headers = BTreeMap::new();
        if !version.is_empty() {
            headers.insert("Version".to_string(), vec![version.to_string()]);
        }
        if !comment.is_empty() {
            headers.insert("Comment".to_string(), vec![comment.to_string()]);
        }
        ArmorHeaders(headers)
    }

    pub(crate) fn options(&self) -> pgp::composed::ArmorOptions<'_> {
        Some(&self.0).into()
    }
}

/// A transferable key parsed out of a bundle.
pub(crate) enum ParsedKey {
    Secret(SignedSecretKey),
    Public(SignedPublicKey),
}

/// Parse every transferable key in an armored (or binary) bundle.
///
/// Private-key bundles are tried first. Individual keys that fail to parse
/// are returned as `Err` entries so the caller can skip and log them; only a
/// bundle that yields nothing at all is an error.
pub(crate) fn parse_key_bundle(data: &[u8]) -> Result<Vec<Result<ParsedKey>>> {
    if let Ok((keys, _headers)) = SignedSecretKey::from_reader_many(Cursor::new(data)) {
        let parsed: Vec<Result<ParsedKey>> = keys
            .map(|k| k.map(ParsedKey::Secret).map_err(|e| Error::Parse(e.to_string())))
            .collect();
        if parsed.iter().any(|k| k.is_ok()) {
            return Ok(parsed);
        }
    }

    let (keys, _headers) = SignedPublicKey::from_reader_many(Cursor::new(data))
        .map_err(|e| Error::Parse(e.to_string()))?;
    let parsed: Vec<Result<ParsedKey>> = keys
        .map(|k| k.map(ParsedKey::Public).map_err(|e| Error::Parse(e.to_string())))
        .collect();

    if parsed.is_empty() {
        return Err(Error::Parse("no keys found in bundle".to_string()));
    }
    Ok(parsed)
}

/// Serialize a public key to ASCII armor.
pub(crate) fn public_key_to_armored(key: &SignedPublicKey, headers: &ArmorHeaders) -> Result<String> {
    key.to_armored_string(headers.options())
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// Serialize a secret key to ASCII armor.
pub(crate) fn secret_key_to_armored(key: &SignedSecretKey, headers: &ArmorHeaders) -> Result<String> {
    key.to_armored_string(headers.options())
        .map_err(|e| Error::Crypto(e.to_string()))
}

/// Get the fingerprint as a hex string (uppercase, no spaces).
pub(crate) fn fingerprint_to_hex(key: &impl KeyDetails) -> String {
    hex::encode_upper(key.fingerprint().as_bytes())
}

/// Read the declared block type from the `-----BEGIN ...-----` line.
pub(crate) fn armor_block_type(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.strip_prefix("-----BEGIN "))
        .and_then(|l| l.strip_suffix("-----"))
}

/// Issuer fingerprints (16-char form) named by a detached signature.
pub(crate) fn signature_issuers(sig: &DetachedSignature) -> Vec<String> {
    let mut issuers: Vec<String> = Vec::new();

    let ids = sig
        .signature
        .issuer()
        .into_iter()
        .map(|id| hex::encode_upper(id.as_ref()));
    let fingerprints = sig
        .signature
        .issuer_fingerprint()
        .into_iter()
        .map(|fp| long_form(&hex::encode_upper(fp.as_bytes())));

    for issuer in ids.chain(fingerprints) {
        if issuer.len() == FP_LEN && !issuers.contains(&issuer) {
            issuers.push(issuer);
        }
    }

    issuers
}

/// Strip ASCII armor, returning the binary packet stream. Input that is not
/// armored is returned unchanged.
pub(crate) fn dearmor(input: &[u8]) -> Result<Vec<u8>> {
    let trimmed = input.trim_ascii_start();
    if !trimmed.starts_with(b"-----BEGIN PGP") {
        return Ok(input.to_vec());
    }

    let dearmor = Dearmor::new(Cursor::new(trimmed));
    let mut buf = Vec::new();
    BufReader::new(dearmor)
        .read_to_end(&mut buf)
        .map_err(|e| Error::Parse(e.to_string()))?;
    Ok(buf)
}

/// Key IDs (16-char form) that a binary encrypted message was addressed to,
/// in packet order.
pub(crate) fn message_recipients(data: &[u8]) -> Result<Vec<String>> {
    let mut key_ids = Vec::new();

    let parser = PacketParser::new(Cursor::new(data));

    for packet_result in parser {
        match packet_result {
            Ok(Packet::PublicKeyEncryptedSessionKey(pkesk)) => {
                let key_id = match pkesk {
                    PublicKeyEncryptedSessionKey::V3 { id, .. } => hex::encode_upper(id.as_ref()),
                    PublicKeyEncryptedSessionKey::V6 { fingerprint, .. } => match fingerprint {
                        Some(fp) => long_form(&hex::encode_upper(fp.as_bytes())),
                        // Anonymous recipient
                        None => continue,
                    },
                    PublicKeyEncryptedSessionKey::Other { .. } => continue,
                };
                key_ids.push(key_id);
            }
            Ok(_) => {}
            // Encrypted data follows the session key packets
            Err(_) => break,
        }
    }

    Ok(key_ids)
}

/// Get the bit size for a key based on its algorithm.
/// Returns 0 if the bit size cannot be determined.
pub(crate) fn get_key_bit_size(key: &impl KeyDetails) -> usize {
    use pgp::crypto::public_key::PublicKeyAlgorithm;

    match key.algorithm() {
        // The modulus sits behind the rsa crate's traits; report the policy floor
        PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
            crate::MIN_KEY_BITS as usize
        }
        PublicKeyAlgorithm::EdDSALegacy | PublicKeyAlgorithm::Ed25519 => 256,
        PublicKeyAlgorithm::X25519 => 256,
        PublicKeyAlgorithm::X448 | PublicKeyAlgorithm::Ed448 => 448,
        PublicKeyAlgorithm::ECDH | PublicKeyAlgorithm::ECDSA => 256,
        PublicKeyAlgorithm::DSA | PublicKeyAlgorithm::Elgamal => 2048,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armor_block_type() {
        let sig = "-----BEGIN PGP SIGNATURE-----\n\nabc\n-----END PGP SIGNATURE-----";
        assert_eq!(armor_block_type(sig), Some("PGP SIGNATURE"));

        let msg = "\n  -----BEGIN PGP MESSAGE-----\nVersion: x\n";
        assert_eq!(armor_block_type(msg), Some("PGP MESSAGE"));

        assert_eq!(armor_block_type("not armored"), None);
        assert_eq!(armor_block_type(""), None);
    }

    #[test]
    fn test_parse_key_bundle_garbage() {
        assert!(parse_key_bundle(b"definitely not a key").is_err());
    }

    #[test]
    fn test_message_recipients_garbage() {
        let ids = message_recipients(b"\x00\x01\x02").unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_dearmor_passthrough() {
        let raw = vec![0xc1u8, 0x02, 0x03];
        assert_eq!(dearmor(&raw).unwrap(), raw);
    }

    #[test]
    fn test_armor_headers() {
        let headers = ArmorHeaders::new("GnuPG v2", "");
        assert_eq!(headers.0.get("Version"), Some(&vec!["GnuPG v2".to_string()]));
        assert!(!headers.0.contains_key("Comment"));
    }
}
