//! Tapcard Core - Encrypted balance ledger stored on NFC tap cards
//!
//! This crate implements the card protocol following hexagonal architecture:
//!
//! - **domain**: Value types (AccountRecord, DecimalAmount, EncryptedEnvelope, NDEF framing)
//! - **ports**: Trait definitions for external dependencies (KeyCustodian, TagTransport)
//! - **services**: Codec, cipher, pending delta ledger, card session and reader
//! - **adapters**: Concrete implementations (card image files, key file, in-memory)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;

use std::path::{Path, PathBuf};

use adapters::{FileKeyStore, FileTag};
use config::Config;
use ports::{KeyCustodian, KeyHandle};

// Re-export commonly used types at crate root
pub use domain::{AccountRecord, DecimalAmount, EncryptedEnvelope};
pub use domain::result::{DecodingError, Error, ErrorKind, OperationResult, Result};
pub use services::{CardReader, OverdraftPolicy, OverdraftWarning, SessionOutcome};

/// Main context for Tapcard operations
///
/// Wires the settings, the reader key custodian and card adapters for one
/// data directory.
pub struct TapcardContext {
    pub config: Config,
    pub key_store: FileKeyStore,
    data_dir: PathBuf,
}

impl TapcardContext {
    /// Create a new Tapcard context
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let key_store = FileKeyStore::new(config.key_path(data_dir));

        Ok(Self {
            config,
            key_store,
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Provision the reader key, keeping an existing one
    pub fn init_key(&self) -> Result<KeyHandle> {
        self.key_store.generate_if_absent()
    }

    /// A reader bound to the provisioned key and the configured overdraft policy
    pub fn reader(&self) -> Result<CardReader> {
        CardReader::from_custodian(&self.key_store, self.config.overdraft)
    }

    /// Open a card image with the configured capacity and language code
    pub fn card(&self, path: impl Into<PathBuf>) -> FileTag {
        FileTag::new(path)
            .with_capacity(self.config.capacity_limit())
            .with_language(self.config.language_code.clone())
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save(&self.data_dir)
    }
}
