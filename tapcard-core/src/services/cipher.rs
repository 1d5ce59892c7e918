//! Envelope cipher - AES-128-GCM sealing of card payloads
//!
//! Every encryption draws a fresh 96-bit nonce from the operating system
//! CSPRNG. The per-key usage limit on [`KeyHandle`] bounds the chance of a
//! nonce collision.

use aes_gcm::aead::Aead;
use aes_gcm::Nonce;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::result::{Error, Result};
use crate::domain::{EncryptedEnvelope, NONCE_LEN, TAG_LEN};
use crate::ports::KeyHandle;

/// Encrypt `plaintext` under `key` with a fresh random nonce
pub fn encrypt(key: &KeyHandle, plaintext: &[u8]) -> Result<EncryptedEnvelope> {
    key.reserve_encryption()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(Error::entropy)?;

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| Error::encoding("AES-GCM encryption failed"))?;
    debug_assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

    Ok(EncryptedEnvelope::new(nonce_bytes, ciphertext))
}

/// Encrypt and render as Base64 transport text
pub fn encrypt_to_text(key: &KeyHandle, plaintext: &[u8]) -> Result<String> {
    Ok(encrypt(key, plaintext)?.to_text())
}

/// Verify and decrypt an envelope
///
/// Any verification failure is reported as the detail-free
/// `Error::Authentication`; no plaintext is released.
pub fn decrypt_envelope(key: &KeyHandle, envelope: &EncryptedEnvelope) -> Result<Vec<u8>> {
    key.cipher()
        .decrypt(
            Nonce::from_slice(envelope.nonce()),
            envelope.ciphertext_and_tag(),
        )
        .map_err(|_| Error::Authentication)
}

/// Decode Base64 transport text, then verify and decrypt
pub fn decrypt(key: &KeyHandle, envelope_text: &str) -> Result<Vec<u8>> {
    let envelope = EncryptedEnvelope::from_text(envelope_text)?;
    decrypt_envelope(key, &envelope)
}
