//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external collaborators. The card ledger
//! depends only on these traits, not on concrete key stores or NFC stacks.

mod key_custodian;
mod tag_transport;

pub use key_custodian::{KeyCustodian, KeyHandle, KEY_LEN, MAX_ENCRYPTIONS_PER_KEY};
pub use tag_transport::TagTransport;
