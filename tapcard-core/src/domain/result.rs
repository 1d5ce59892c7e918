//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a decrypted card payload could not be turned into an account record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodingError {
    #[error("expected 3 fields (name, surname, balance), found {found}")]
    WrongFieldCount { found: usize },

    #[error("balance is not a canonical decimal literal: {0:?}")]
    InvalidBalance(String),

    #[error("record is not valid UTF-8 text")]
    InvalidText,
}

/// Core library error type
///
/// Every kind is distinguishable to the caller. `Authentication` carries no
/// detail: a forged ciphertext and a wrong key look the same from outside.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(#[from] DecodingError),

    #[error("Malformed envelope: {0}")]
    Format(String),

    #[error("Card data could not be authenticated")]
    Authentication,

    #[error("Tag I/O error: {0}")]
    TagIo(String),

    #[error("Card capacity exceeded: need {needed} bytes, card holds {capacity}")]
    CapacityExceeded { needed: usize, capacity: usize },

    #[error("Balance arithmetic overflow")]
    Overflow,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient funds: withdrawal exceeds the card balance")]
    InsufficientFunds,

    #[error("Invalid session state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Session aborted before commit")]
    Aborted,

    #[error("Key store error: {0}")]
    KeyStore(String),

    #[error("Key usage limit reached, a new reader key is required")]
    KeyExhausted,

    #[error("System random source unavailable: {0}")]
    Entropy(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an encoding error
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create an envelope format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a tag transport error
    pub fn tag_io(msg: impl Into<String>) -> Self {
        Self::TagIo(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a key store error
    pub fn key_store(msg: impl Into<String>) -> Self {
        Self::KeyStore(msg.into())
    }

    /// Create an error for a failed draw from the OS random source
    pub fn entropy(msg: impl std::fmt::Display) -> Self {
        Self::Entropy(msg.to_string())
    }

    /// The coarse kind of this error, kept by a failed session
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Decoding(DecodingError::WrongFieldCount { .. }) => ErrorKind::WrongFieldCount,
            Self::Decoding(DecodingError::InvalidBalance(_)) => ErrorKind::InvalidBalance,
            Self::Decoding(DecodingError::InvalidText) => ErrorKind::InvalidText,
            Self::Format(_) => ErrorKind::Format,
            Self::Authentication => ErrorKind::Authentication,
            Self::TagIo(_) => ErrorKind::TagIo,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Overflow => ErrorKind::Overflow,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientFunds => ErrorKind::InsufficientFunds,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Aborted => ErrorKind::Aborted,
            Self::KeyStore(_) => ErrorKind::KeyStore,
            Self::KeyExhausted => ErrorKind::KeyExhausted,
            Self::Entropy(_) => ErrorKind::Entropy,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Json(_) => ErrorKind::Json,
        }
    }
}

/// Fieldless mirror of [`Error`] for state tracking and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Encoding,
    WrongFieldCount,
    InvalidBalance,
    InvalidText,
    Format,
    Authentication,
    TagIo,
    CapacityExceeded,
    Overflow,
    Validation,
    InsufficientFunds,
    InvalidState,
    Aborted,
    KeyStore,
    KeyExhausted,
    Entropy,
    Config,
    Io,
    Json,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Encoding => "encoding",
            Self::WrongFieldCount => "wrong_field_count",
            Self::InvalidBalance => "invalid_balance",
            Self::InvalidText => "invalid_text",
            Self::Format => "format",
            Self::Authentication => "authentication",
            Self::TagIo => "tag_io",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::Overflow => "overflow",
            Self::Validation => "validation",
            Self::InsufficientFunds => "insufficient_funds",
            Self::InvalidState => "invalid_state",
            Self::Aborted => "aborted",
            Self::KeyStore => "key_store",
            Self::KeyExhausted => "key_exhausted",
            Self::Entropy => "entropy",
            Self::Config => "config",
            Self::Io => "io",
            Self::Json => "json",
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            context: None,
        }
    }

    /// Create a successful result with context
    pub fn ok_with_context(data: T, context: HashMap<String, serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            context: Some(context),
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: None,
            context: None,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let kind = e.kind();
                let mut failed = Self::fail(e.to_string());
                failed.error_kind = Some(kind);
                failed
            }
        }
    }
}
