//! Tag transport port - access to a card's data area

use crate::domain::result::Result;

/// Physical tag abstraction
///
/// `read` and `write` deal in the envelope text bytes; any on-card framing
/// (NDEF) is the transport's business. Both fail with `TagIo` when the card
/// leaves the field. `write` must check capacity and fail with
/// `CapacityExceeded` before touching the card, and must replace the stored
/// bytes atomically: either the old content or the new one survives.
pub trait TagTransport {
    /// Establish a low-level connection to the tag's data area
    fn connect(&mut self) -> Result<()>;

    /// Read the stored payload
    fn read(&mut self) -> Result<Vec<u8>>;

    /// Replace the stored payload
    fn write(&mut self, payload: &[u8]) -> Result<()>;

    /// Usable bytes on the tag, if the transport knows
    fn capacity(&self) -> Option<usize>;

    /// Release the connection. Must be safe to call more than once.
    fn disconnect(&mut self);
}
