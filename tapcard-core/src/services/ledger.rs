//! Pending delta ledger - the one amount waiting for the next card write

use crate::domain::result::Result;
use crate::domain::{AccountRecord, DecimalAmount};

/// Holds at most one outstanding delta. Zero means nothing is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDeltaLedger {
    pending: DecimalAmount,
}

impl PendingDeltaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the pending amount (last writer wins, nothing is queued)
    pub fn set(&mut self, amount: DecimalAmount) {
        self.pending = amount;
    }

    pub fn pending(&self) -> DecimalAmount {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_zero()
    }

    pub fn clear(&mut self) {
        self.pending = DecimalAmount::ZERO;
    }

    /// The record that applying the pending amount would produce, without consuming it
    ///
    /// Returns the input unchanged when nothing is pending. A resulting
    /// negative balance is not rejected here.
    pub fn preview(&self, record: &AccountRecord) -> Result<AccountRecord> {
        if self.is_empty() {
            return Ok(record.clone());
        }
        let balance = record.balance().checked_add(&self.pending)?;
        Ok(record.with_balance(balance))
    }

    /// Fold the pending amount into `record` and reset it to zero
    pub fn apply(&mut self, record: &AccountRecord) -> Result<AccountRecord> {
        let updated = self.preview(record)?;
        self.clear();
        Ok(updated)
    }
}
