//! Account record codec - canonical `name,surname,balance` text

use crate::domain::result::{DecodingError, Error, Result};
use crate::domain::{AccountRecord, DecimalAmount, FIELD_DELIMITER};

/// Encode a record as `name,surname,balance` with no whitespace or trailing delimiter
pub fn encode(record: &AccountRecord) -> Result<String> {
    for (field, value) in [("name", record.name()), ("surname", record.surname())] {
        if value.contains(FIELD_DELIMITER) {
            return Err(Error::encoding(format!(
                "{field} contains the reserved delimiter {FIELD_DELIMITER:?}"
            )));
        }
    }

    Ok(format!(
        "{}{d}{}{d}{}",
        record.name(),
        record.surname(),
        record.balance().to_canonical(),
        d = FIELD_DELIMITER
    ))
}

/// Decode canonical record text
pub fn decode(text: &str) -> Result<AccountRecord> {
    let fields: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    let [name, surname, balance] = fields.as_slice() else {
        return Err(DecodingError::WrongFieldCount { found: fields.len() }.into());
    };

    let balance = DecimalAmount::parse_canonical(balance)?;
    Ok(AccountRecord::new(*name, *surname, balance))
}

/// Decode decrypted plaintext bytes
pub fn decode_bytes(bytes: &[u8]) -> Result<AccountRecord> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodingError::InvalidText)?;
    decode(text)
}
