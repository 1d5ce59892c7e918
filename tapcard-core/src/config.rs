//! Configuration management
//!
//! Reader settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "overdraft": "reject",
//!   "tagCapacity": 888,
//!   "languageCode": "en",
//!   "keyFile": "reader.key"
//! }
//! ```
//! Keys this crate does not know about are kept when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::adapters::file_tag::DEFAULT_LANGUAGE;
use crate::domain::result::{Error, Result};
use crate::services::OverdraftPolicy;

/// NTAG216 user memory in bytes
pub const DEFAULT_TAG_CAPACITY: usize = 888;
pub const DEFAULT_KEY_FILE: &str = "reader.key";
pub const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overdraft: Option<OverdraftPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Tapcard reader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub overdraft: OverdraftPolicy,
    /// Zero disables the capacity check
    pub tag_capacity: usize,
    pub language_code: String,
    pub key_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overdraft: OverdraftPolicy::default(),
            tag_capacity: DEFAULT_TAG_CAPACITY,
            language_code: DEFAULT_LANGUAGE.to_string(),
            key_file: DEFAULT_KEY_FILE.to_string(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// `TAPCARD_OVERDRAFT` and `TAPCARD_TAG_CAPACITY` override the file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(&data_dir.join(SETTINGS_FILE))?;
        let mut config = Self::from_settings(raw);
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.check()?;
        Ok(config)
    }

    /// Save config to the data directory, preserving keys we don't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(data_dir)?;
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = read_settings(&settings_path)?;
        settings.overdraft = Some(self.overdraft);
        settings.tag_capacity = Some(self.tag_capacity);
        settings.language_code = Some(self.language_code.clone());
        settings.key_file = Some(self.key_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Tag capacity as the adapters take it
    pub fn capacity_limit(&self) -> Option<usize> {
        (self.tag_capacity > 0).then_some(self.tag_capacity)
    }

    /// Key file path, resolved against the data directory when relative
    pub fn key_path(&self, data_dir: &Path) -> PathBuf {
        let key_file = Path::new(&self.key_file);
        if key_file.is_absolute() {
            key_file.to_path_buf()
        } else {
            data_dir.join(key_file)
        }
    }

    fn from_settings(raw: SettingsFile) -> Self {
        let defaults = Self::default();
        Self {
            overdraft: raw.overdraft.unwrap_or(defaults.overdraft),
            tag_capacity: raw.tag_capacity.unwrap_or(defaults.tag_capacity),
            language_code: raw.language_code.unwrap_or(defaults.language_code),
            key_file: raw.key_file.unwrap_or(defaults.key_file),
        }
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = var("TAPCARD_OVERDRAFT") {
            self.overdraft = value.parse()?;
        }
        if let Some(value) = var("TAPCARD_TAG_CAPACITY") {
            self.tag_capacity = value.trim().parse().map_err(|_| {
                Error::Config(format!("TAPCARD_TAG_CAPACITY must be a byte count, got {value:?}"))
            })?;
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        let lang = self.language_code.as_bytes();
        if lang.is_empty() || lang.len() > 63 || !lang.is_ascii() {
            return Err(Error::Config(format!(
                "languageCode must be 1-63 ASCII bytes, got {:?}",
                self.language_code
            )));
        }
        if self.key_file.trim().is_empty() {
            return Err(Error::Config("keyFile must not be empty".to_string()));
        }
        Ok(())
    }
}

fn read_settings(path: &Path) -> Result<SettingsFile> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
}
