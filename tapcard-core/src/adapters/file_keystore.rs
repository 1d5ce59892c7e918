//! File-backed key custodian
//!
//! Stores the reader key hex-encoded in a single owner-only file. This is a
//! development stand-in: it keeps the create-once and never-overwrite
//! guarantees, but a production reader should keep the key in an OS keychain
//! or secure element behind the same `KeyCustodian` port.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;
use zeroize::Zeroizing;

use crate::domain::result::{Error, Result};
use crate::ports::{KeyCustodian, KeyHandle, KEY_LEN};

pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut key[..])
            .map_err(Error::entropy)?;
        let encoded = Zeroizing::new(hex::encode(&key[..]));

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        match options.open(&self.path) {
            Ok(mut file) => {
                file.write_all(encoded.as_bytes())?;
                file.sync_all()?;
                info!(path = %self.path.display(), "reader key created");
                Ok(())
            }
            // Another process won the race; keep its key
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(Error::key_store(format!("cannot create key file: {e}"))),
        }
    }
}

impl KeyCustodian for FileKeyStore {
    fn generate_if_absent(&self) -> Result<KeyHandle> {
        if !self.exists() {
            self.create()?;
        }
        self.get()
    }

    fn get(&self) -> Result<KeyHandle> {
        let encoded = Zeroizing::new(fs::read_to_string(&self.path).map_err(|e| {
            Error::key_store(format!("cannot read key file {}: {e}", self.path.display()))
        })?);
        let bytes = Zeroizing::new(
            hex::decode(encoded.trim())
                .map_err(|_| Error::key_store("key file is not valid hex"))?,
        );
        KeyHandle::from_bytes(&bytes)
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}
