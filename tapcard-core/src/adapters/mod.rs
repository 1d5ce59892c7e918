//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Card image files (NDEF framed) for the TagTransport port
//! - A hex key file for the KeyCustodian port
//! - In-memory tag and key store for tests and demos

pub mod file_keystore;
pub mod file_tag;
pub mod memory;

pub use file_keystore::FileKeyStore;
pub use file_tag::FileTag;
pub use memory::{MemoryKeyStore, MemoryTag};
