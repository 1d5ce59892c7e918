//! NDEF Text record framing
//!
//! Cards carry the envelope text inside a single NFC Forum Text record
//! (TNF well-known, type `T`), the way Android's `NdefRecord.createTextRecord`
//! lays it out. Only UTF-8 text is produced or accepted.

use super::result::{Error, Result};

const FLAG_MB: u8 = 0x80;
const FLAG_ME: u8 = 0x40;
const FLAG_CF: u8 = 0x20;
const FLAG_SR: u8 = 0x10;
const FLAG_IL: u8 = 0x08;
const TNF_MASK: u8 = 0x07;
const TNF_WELL_KNOWN: u8 = 0x01;
const RTD_TEXT: &[u8] = b"T";

/// Status byte bit marking UTF-16 text
const STATUS_UTF16: u8 = 0x80;
/// Status byte bits holding the language code length
const STATUS_LANG_LEN_MASK: u8 = 0x3F;

/// A decoded Text record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRecord {
    pub language: String,
    pub text: String,
}

/// Build a one-record NDEF message holding `text`
pub fn encode_text_message(language: &str, text: &str) -> Result<Vec<u8>> {
    let lang = language.as_bytes();
    if lang.is_empty() || lang.len() > STATUS_LANG_LEN_MASK as usize || !language.is_ascii() {
        return Err(Error::encoding(format!("invalid NDEF language code {language:?}")));
    }

    let mut payload = Vec::with_capacity(1 + lang.len() + text.len());
    payload.push(lang.len() as u8);
    payload.extend_from_slice(lang);
    payload.extend_from_slice(text.as_bytes());

    let short = payload.len() <= u8::MAX as usize;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| Error::encoding("NDEF payload too large"))?;

    let mut message = Vec::with_capacity(payload.len() + 7);
    let mut header = FLAG_MB | FLAG_ME | TNF_WELL_KNOWN;
    if short {
        header |= FLAG_SR;
    }
    message.push(header);
    message.push(RTD_TEXT.len() as u8);
    if short {
        message.push(payload_len as u8);
    } else {
        message.extend_from_slice(&payload_len.to_be_bytes());
    }
    message.extend_from_slice(RTD_TEXT);
    message.extend_from_slice(&payload);
    Ok(message)
}

/// Parse an NDEF message and return its first Text record
pub fn decode_text_message(message: &[u8]) -> Result<TextRecord> {
    let mut cursor = Cursor { bytes: message, pos: 0 };

    loop {
        let header = cursor.byte()?;
        if header & FLAG_CF != 0 {
            return Err(Error::format("chunked NDEF records are not supported"));
        }
        let type_len = cursor.byte()? as usize;
        let payload_len = if header & FLAG_SR != 0 {
            cursor.byte()? as usize
        } else {
            let raw = cursor.take(4)?;
            u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
        };
        let id_len = if header & FLAG_IL != 0 {
            cursor.byte()? as usize
        } else {
            0
        };
        let record_type = cursor.take(type_len)?;
        cursor.take(id_len)?;
        let payload = cursor.take(payload_len)?;

        if header & TNF_MASK == TNF_WELL_KNOWN && record_type == RTD_TEXT {
            return parse_text_payload(payload);
        }
        if header & FLAG_ME != 0 {
            return Err(Error::format("card holds no NDEF text record"));
        }
    }
}

fn parse_text_payload(payload: &[u8]) -> Result<TextRecord> {
    let (&status, rest) = payload
        .split_first()
        .ok_or_else(|| Error::format("empty NDEF text payload"))?;
    if status & STATUS_UTF16 != 0 {
        return Err(Error::format("UTF-16 NDEF text is not supported"));
    }
    let lang_len = (status & STATUS_LANG_LEN_MASK) as usize;
    if rest.len() < lang_len {
        return Err(Error::format("NDEF language code overruns payload"));
    }
    let (lang, text) = rest.split_at(lang_len);
    let language = String::from_utf8(lang.to_vec())
        .map_err(|_| Error::format("NDEF language code is not UTF-8"))?;
    let text = String::from_utf8(text.to_vec())
        .map_err(|_| Error::format("NDEF text is not UTF-8"))?;
    Ok(TextRecord { language, text })
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::format("truncated NDEF message"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }
}
