//! Encryption to a single resolved recipient.

use std::io::{Cursor, Write};

use base64::Engine;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pgp::armor::{self, BlockType};
use pgp::composed::RawSessionKey;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::packet::{
    CompressedData, LiteralData, Packet, PacketHeader, PacketTrait, PublicKeyEncryptedSessionKey,
    SymEncryptedProtectedData,
};
use pgp::ser::Serialize;
use pgp::types::{CompressionAlgorithm, PublicKeyTrait, Tag};
use rand::rngs::ThreadRng;
use rand::thread_rng;

use crate::error::{Error, Result};
use crate::internal::encryption_subkeys;
use crate::manager::KeyManager;

const SYM_ALG: SymmetricKeyAlgorithm = SymmetricKeyAlgorithm::AES256;

impl KeyManager {
    /// Encrypt `data` to the key `fp`.
    ///
    /// The message uses AES-256 with ZLIB compression. Its literal data
    /// packet is binary, named `filename` and stamped with the current time.
    /// Valid encryption subkeys are preferred; the primary key is used only
    /// when it can encrypt and no subkey can.
    ///
    /// # Returns
    /// Base64 of the binary message when `raw_output` is set, otherwise an
    /// ASCII-armored message.
    ///
    /// # Errors
    /// * [`Error::KeyNotFound`] - the recipient resolves nowhere
    /// * [`Error::NoEncryptionKey`] - the recipient cannot receive messages
    pub fn encrypt(&self, filename: &str, fp: &str, data: &[u8], raw_output: bool) -> Result<String> {
        let fp = self.require_fingerprint(fp)?;
        let entity = self.resolve_public(&fp)?;
        let public = entity.public_key();

        let subkeys = encryption_subkeys(public);
        let use_primary = subkeys.is_empty() && public.primary_key.is_encryption_key();
        if subkeys.is_empty() && !use_primary {
            return Err(Error::NoEncryptionKey(entity.fingerprint().to_string()));
        }

        let mut rng = thread_rng();
        let session_key = SYM_ALG.new_session_key(&mut rng);

        let mut packets = Vec::with_capacity(subkeys.len() + 2);
        if use_primary {
            packets.push(session_key_packet(&mut rng, &session_key, &public.primary_key)?);
        }
        for subkey in &subkeys {
            packets.push(session_key_packet(&mut rng, &session_key, &subkey.key)?);
        }

        let mut plaintext = Vec::new();
        compressed_literal(filename, data)?.to_writer_with_header(&mut plaintext)?;
        let sealed =
            SymEncryptedProtectedData::encrypt_seipdv1(&mut rng, SYM_ALG, session_key.as_ref(), &plaintext)?;
        packets.push(Packet::from(sealed));

        tracing::debug!(
            fingerprint = %entity.fingerprint(),
            recipients = packets.len() - 1,
            bytes = data.len(),
            raw_output,
            "Encrypting"
        );

        if raw_output {
            return Ok(base64::engine::general_purpose::STANDARD.encode(packets.to_bytes()?));
        }

        let options = self.headers.options();
        let mut armored = Vec::new();
        armor::write(
            &packets,
            BlockType::Message,
            &mut armored,
            options.headers,
            options.include_checksum,
        )?;
        String::from_utf8(armored).map_err(|e| Error::Crypto(e.to_string()))
    }
}

fn session_key_packet(
    rng: &mut ThreadRng,
    session_key: &RawSessionKey,
    key: &impl PublicKeyTrait,
) -> Result<Packet> {
    let pkesk = PublicKeyEncryptedSessionKey::from_session_key_v3(rng, session_key, SYM_ALG, key)?;
    Ok(Packet::from(pkesk))
}

/// ZLIB-compressed packet wrapping one binary literal data packet.
fn compressed_literal(filename: &str, data: &[u8]) -> Result<CompressedData> {
    let literal = LiteralData::from_bytes(filename.to_string(), data.to_vec().into())?;
    let mut packet = Vec::new();
    literal.to_writer_with_header(&mut packet)?;

    let mut encoder = ZlibEncoder::new(
        vec![u8::from(CompressionAlgorithm::ZLIB)],
        Compression::default(),
    );
    encoder.write_all(&packet)?;
    let body = encoder.finish()?;

    let len = u32::try_from(body.len())
        .map_err(|_| Error::InvalidInput("message too large".to_string()))?;
    let header = PacketHeader::new_fixed(Tag::CompressedData, len);
    Ok(CompressedData::try_from_reader(header, Cursor::new(body))?)
}
