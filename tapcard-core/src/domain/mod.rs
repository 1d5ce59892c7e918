//! Core domain entities
//!
//! Pure value types for the card ledger protocol - no I/O or external
//! dependencies beyond encoding.

mod account;
mod amount;
mod envelope;
pub mod ndef;
pub mod result;

pub use account::{AccountRecord, FIELD_DELIMITER};
pub use amount::DecimalAmount;
pub use envelope::{EncryptedEnvelope, NONCE_LEN, TAG_LEN};
pub use result::{DecodingError, Error, ErrorKind, OperationResult, Result};
