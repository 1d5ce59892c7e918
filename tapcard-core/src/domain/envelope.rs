//! Encrypted envelope domain model

use base64::Engine;

use super::result::{Error, Result};

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits)
pub const TAG_LEN: usize = 16;

/// Nonce plus ciphertext-and-tag, as stored on a card
///
/// Transported as `Base64(nonce || ciphertext || tag)` using the standard
/// padded alphabet on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    nonce: [u8; NONCE_LEN],
    ciphertext_and_tag: Vec<u8>,
}

impl EncryptedEnvelope {
    pub fn new(nonce: [u8; NONCE_LEN], ciphertext_and_tag: Vec<u8>) -> Self {
        Self {
            nonce,
            ciphertext_and_tag,
        }
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn ciphertext_and_tag(&self) -> &[u8] {
        &self.ciphertext_and_tag
    }

    /// Raw `nonce || ciphertext || tag` bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(NONCE_LEN + self.ciphertext_and_tag.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext_and_tag);
        bytes
    }

    /// Split raw bytes into nonce and remainder
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_LEN {
            return Err(Error::format(format!(
                "envelope is {} bytes, shorter than the {}-byte nonce",
                bytes.len(),
                NONCE_LEN
            )));
        }
        let (nonce, rest) = bytes.split_at(NONCE_LEN);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self::new(nonce_bytes, rest.to_vec()))
    }

    /// Base64 transport text
    pub fn to_text(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.to_bytes())
    }

    /// Parse transport text
    ///
    /// ASCII whitespace is ignored so cards written with line-wrapped Base64
    /// (76-column MIME style) still decode.
    pub fn from_text(text: &str) -> Result<Self> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| Error::format(format!("invalid Base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}
