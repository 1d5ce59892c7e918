//! Account record domain model

use serde::{Deserialize, Serialize};

use super::amount::DecimalAmount;

/// Separator between record fields in the on-card plaintext
pub const FIELD_DELIMITER: char = ',';

/// The account holder and balance carried by one card
///
/// Values are immutable: a balance change produces a new record via
/// [`AccountRecord::with_balance`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    name: String,
    surname: String,
    balance: DecimalAmount,
}

impl AccountRecord {
    pub fn new(name: impl Into<String>, surname: impl Into<String>, balance: DecimalAmount) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            balance,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    pub fn balance(&self) -> DecimalAmount {
        self.balance
    }

    /// Same holder, new balance
    pub fn with_balance(&self, balance: DecimalAmount) -> Self {
        Self {
            name: self.name.clone(),
            surname: self.surname.clone(),
            balance,
        }
    }

    /// Validate holder fields for issuing a new card
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty");
        }
        if self.surname.trim().is_empty() {
            return Err("surname cannot be empty");
        }
        if self.name.contains(FIELD_DELIMITER) || self.surname.contains(FIELD_DELIMITER) {
            return Err("name and surname cannot contain a comma");
        }
        Ok(())
    }
}
