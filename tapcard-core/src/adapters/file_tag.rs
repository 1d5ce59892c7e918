//! File-backed tag - a card image on disk
//!
//! The file holds the raw NDEF message exactly as it would sit in the tag's
//! data area. A present card is an existing file; an empty file is a blank
//! card. A sidecar `.lock` file is held exclusively while connected so two
//! readers cannot run a session against the same card.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::domain::ndef;
use crate::domain::result::{Error, Result};
use crate::ports::TagTransport;

/// Default NDEF language code, matching what Android text records use
pub const DEFAULT_LANGUAGE: &str = "en";

pub struct FileTag {
    path: PathBuf,
    language: String,
    capacity: Option<usize>,
    lock: Option<File>,
}

impl FileTag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            capacity: None,
            lock: None,
        }
    }

    /// Limit the framed NDEF message size, e.g. 888 bytes for an NTAG216
    pub fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a card image exists at this path
    pub fn is_present(&self) -> bool {
        self.path.is_file()
    }

    /// Create an empty (blank) card image if none exists
    pub fn create_blank(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(path)?;
        Ok(())
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.lock.is_none() {
            return Err(Error::tag_io("tag not connected"));
        }
        if !self.is_present() {
            return Err(Error::tag_io(format!("card removed: {}", self.path.display())));
        }
        Ok(())
    }
}

impl TagTransport for FileTag {
    fn connect(&mut self) -> Result<()> {
        if self.lock.is_some() {
            return Ok(());
        }
        if !self.is_present() {
            return Err(Error::tag_io(format!("no card at {}", self.path.display())));
        }

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())
            .map_err(|e| Error::tag_io(format!("cannot open card lock: {e}")))?;
        lock.try_lock_exclusive()
            .map_err(|_| Error::tag_io("card is in use by another session"))?;

        debug!(path = %self.path.display(), "card connected");
        self.lock = Some(lock);
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let raw = fs::read(&self.path).map_err(|e| Error::tag_io(format!("read failed: {e}")))?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        Ok(ndef::decode_text_message(&raw)?.text.into_bytes())
    }

    fn write(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        let text = std::str::from_utf8(payload)
            .map_err(|_| Error::encoding("card payload must be UTF-8 text"))?;
        let message = ndef::encode_text_message(&self.language, text)?;

        if let Some(capacity) = self.capacity {
            if message.len() > capacity {
                return Err(Error::CapacityExceeded {
                    needed: message.len(),
                    capacity,
                });
            }
        }

        // Write beside the card and rename over it so a crash leaves either image intact
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staged = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::tag_io(format!("cannot stage card write: {e}")))?;
        staged
            .write_all(&message)
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| Error::tag_io(format!("write failed: {e}")))?;
        staged
            .persist(&self.path)
            .map_err(|e| Error::tag_io(format!("write failed: {}", e.error)))?;

        debug!(bytes = message.len(), "card image replaced");
        Ok(())
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn disconnect(&mut self) {
        if let Some(lock) = self.lock.take() {
            let _ = FileExt::unlock(&lock);
        }
    }
}

impl Drop for FileTag {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn blank_card(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("card.tap");
        FileTag::create_blank(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_card_cannot_connect() {
        let dir = TempDir::new().unwrap();
        let mut tag = FileTag::new(dir.path().join("absent.tap"));
        assert!(matches!(tag.connect(), Err(Error::TagIo(_))));
    }

    #[test]
    fn test_blank_card_reads_empty() {
        let dir = TempDir::new().unwrap();
        let mut tag = FileTag::new(blank_card(&dir));
        tag.connect().unwrap();
        assert!(tag.read().unwrap().is_empty());
    }

    #[test]
    fn test_write_stores_ndef_text_record() {
        let dir = TempDir::new().unwrap();
        let path = blank_card(&dir);
        let mut tag = FileTag::new(&path);
        tag.connect().unwrap();
        tag.write(b"ZW52ZWxvcGU=").unwrap();

        let raw = fs::read(&path).unwrap();
        assert_eq!(raw[0], 0xD1);
        assert_eq!(&raw[3..7], b"T\x02en");
        assert_eq!(tag.read().unwrap(), b"ZW52ZWxvcGU=");
    }

    #[test]
    fn test_capacity_exceeded_leaves_card_untouched() {
        let dir = TempDir::new().unwrap();
        let path = blank_card(&dir);
        let mut tag = FileTag::new(&path).with_capacity(Some(16));
        tag.connect().unwrap();
        tag.write(b"short").unwrap();
        let before = fs::read(&path).unwrap();

        let err = tag.write(&[b'A'; 64]).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { capacity: 16, .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_second_session_is_locked_out() {
        let dir = TempDir::new().unwrap();
        let path = blank_card(&dir);
        let mut first = FileTag::new(&path);
        let mut second = FileTag::new(&path);

        first.connect().unwrap();
        assert!(matches!(second.connect(), Err(Error::TagIo(_))));

        first.disconnect();
        second.connect().unwrap();
    }

    #[test]
    fn test_card_removed_while_connected() {
        let dir = TempDir::new().unwrap();
        let path = blank_card(&dir);
        let mut tag = FileTag::new(&path);
        tag.connect().unwrap();
        fs::remove_file(&path).unwrap();

        assert!(matches!(tag.read(), Err(Error::TagIo(_))));
        assert!(matches!(tag.write(b"x"), Err(Error::TagIo(_))));
    }
}
