//! Key custodian port - reader key lifecycle

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aes_gcm::aead::KeyInit;
use aes_gcm::Aes128Gcm;
use sha2::{Digest, Sha256};

use crate::domain::result::{Error, Result};

/// AES-128 key length in bytes
pub const KEY_LEN: usize = 16;

/// Encryptions allowed under one key with random 96-bit nonces (NIST SP 800-38D)
///
/// Enforced per [`KeyHandle`]. The counter lives in memory and starts at zero
/// for every handle loaded from the key store, so the limit does not carry
/// across processes.
// TODO: persist the encryption count next to the key file and load it in
// `KeyCustodian::get` so the limit survives restarts.
pub const MAX_ENCRYPTIONS_PER_KEY: u64 = 1 << 32;

/// Opaque capability to encrypt and decrypt with the reader key
///
/// The raw key bytes are consumed on construction and never exposed again.
/// Clones share the encryption counter.
#[derive(Clone)]
pub struct KeyHandle {
    cipher: Aes128Gcm,
    key_id: String,
    encryptions: Arc<AtomicU64>,
}

impl KeyHandle {
    /// Build a handle from raw AES-128 key bytes
    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(Error::key_store(format!(
                "expected a {KEY_LEN}-byte AES-128 key, got {} bytes",
                key.len()
            )));
        }
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|_| Error::key_store("invalid AES-128 key"))?;

        // Public identifier: truncated SHA-256 over a domain-separated key hash
        let mut hasher = Sha256::new();
        hasher.update(b"tapcard-key-id-v1");
        hasher.update(key);
        let key_id = hex::encode(&hasher.finalize()[..8]);

        Ok(Self {
            cipher,
            key_id,
            encryptions: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Short non-secret fingerprint for display
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Encryptions performed through this handle (and its clones)
    pub fn encryptions(&self) -> u64 {
        self.encryptions.load(Ordering::Relaxed)
    }

    pub(crate) fn cipher(&self) -> &Aes128Gcm {
        &self.cipher
    }

    /// Count one encryption, refusing once the per-key limit is reached
    pub(crate) fn reserve_encryption(&self) -> Result<()> {
        self.encryptions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < MAX_ENCRYPTIONS_PER_KEY).then_some(used + 1)
            })
            .map(|_| ())
            .map_err(|_| Error::KeyExhausted)
    }

    #[cfg(test)]
    pub(crate) fn set_encryptions(&self, used: u64) {
        self.encryptions.store(used, Ordering::Relaxed);
    }
}

impl fmt::Debug for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyHandle")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Secure key custodian
///
/// Implementations guarantee the reader key is created once, stored so it
/// cannot be exported, and only usable for AES-128-GCM. The file-backed
/// adapter is a development stand-in; production readers should back this
/// with an OS keychain or secure element.
pub trait KeyCustodian {
    /// Create the reader key if none exists yet, then return it
    fn generate_if_absent(&self) -> Result<KeyHandle>;

    /// Return the existing reader key, failing with `KeyStore` if absent
    fn get(&self) -> Result<KeyHandle>;

    /// Whether a key has been provisioned
    fn exists(&self) -> bool;
}
