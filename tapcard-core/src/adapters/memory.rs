//! In-memory adapters for tests and demos
//!
//! `MemoryTag` simulates a card in the reader's field, with hooks to pull the
//! card away or make the next write fail. `MemoryKeyStore` keeps a random
//! key for the lifetime of the process.

use std::sync::Mutex;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};
use crate::ports::{KeyCustodian, KeyHandle, TagTransport, KEY_LEN};

/// A simulated tag
#[derive(Debug, Clone)]
pub struct MemoryTag {
    payload: Option<Vec<u8>>,
    capacity: Option<usize>,
    present: bool,
    connected: bool,
    fail_next_write: bool,
    writes: usize,
}

impl Default for MemoryTag {
    fn default() -> Self {
        Self::blank()
    }
}

impl MemoryTag {
    /// A card in the field with nothing written on it
    pub fn blank() -> Self {
        Self {
            payload: None,
            capacity: None,
            present: true,
            connected: false,
            fail_next_write: false,
            writes: 0,
        }
    }

    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::blank()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Successful writes so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Take the card out of the field
    pub fn remove(&mut self) {
        self.present = false;
        self.connected = false;
    }

    /// Put the card back
    pub fn insert(&mut self) {
        self.present = true;
    }

    /// Make the next write fail as if the card left mid-write
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.present {
            return Err(Error::tag_io("tag left the field"));
        }
        if !self.connected {
            return Err(Error::tag_io("tag not connected"));
        }
        Ok(())
    }
}

impl TagTransport for MemoryTag {
    fn connect(&mut self) -> Result<()> {
        if !self.present {
            return Err(Error::tag_io("no tag in the field"));
        }
        self.connected = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        Ok(self.payload.clone().unwrap_or_default())
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        if let Some(capacity) = self.capacity {
            if payload.len() > capacity {
                return Err(Error::CapacityExceeded {
                    needed: payload.len(),
                    capacity,
                });
            }
        }
        if self.fail_next_write {
            self.fail_next_write = false;
            self.connected = false;
            return Err(Error::tag_io("tag lost during write"));
        }
        // Single assignment: the old payload survives until the new one is complete
        self.payload = Some(payload.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Process-local key custodian
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    key: Mutex<Option<KeyHandle>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custodian preloaded with a fixed key
    pub fn with_key(key: &[u8]) -> Result<Self> {
        Ok(Self {
            key: Mutex::new(Some(KeyHandle::from_bytes(key)?)),
        })
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<KeyHandle>>> {
        self.key
            .lock()
            .map_err(|_| Error::key_store("key store lock poisoned"))
    }
}

impl KeyCustodian for MemoryKeyStore {
    fn generate_if_absent(&self) -> Result<KeyHandle> {
        let mut slot = self.slot()?;
        if let Some(key) = slot.as_ref() {
            return Ok(key.clone());
        }
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(Error::entropy)?;
        let key = KeyHandle::from_bytes(&bytes[..])?;
        *slot = Some(key.clone());
        Ok(key)
    }

    fn get(&self) -> Result<KeyHandle> {
        self.slot()?
            .as_ref()
            .cloned()
            .ok_or_else(|| Error::key_store("no reader key has been generated"))
    }

    fn exists(&self) -> bool {
        self.slot().map(|slot| slot.is_some()).unwrap_or(false)
    }
}
