//! Card session state machine
//!
//! One tap of one card:
//!
//! ```text
//! Idle -> Connected -> RecordLoaded -> Committed -> Idle
//!             \              \
//!              +--------------+--> Failed -> Idle
//! ```
//!
//! A failed read never reaches the write step, and a failed write leaves the
//! pending delta in place so the same card can be tapped again.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::result::{Error, ErrorKind, Result};
use crate::domain::{AccountRecord, DecimalAmount};
use crate::ports::{KeyHandle, TagTransport};

use super::cipher;
use super::codec;
use super::ledger::PendingDeltaLedger;

/// Where a session currently stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Connected,
    RecordLoaded(AccountRecord),
    Committed(AccountRecord),
    Failed(ErrorKind),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connected => "connected",
            Self::RecordLoaded(_) => "record_loaded",
            Self::Committed(_) => "committed",
            Self::Failed(_) => "failed",
        }
    }
}

/// What a successful commit did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    /// Record as read from the card
    pub previous: AccountRecord,
    /// Record now on the card
    pub record: AccountRecord,
    /// False for a read-only pass (nothing pending)
    pub written: bool,
}

/// Summary handed back when a session is released
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub outcome: Option<CommitOutcome>,
    pub error: Option<ErrorKind>,
}

/// A single read-modify-write pass over one tag
pub struct CardSession<'a, T: TagTransport + ?Sized> {
    id: Uuid,
    key: &'a KeyHandle,
    ledger: &'a mut PendingDeltaLedger,
    tag: &'a mut T,
    state: SessionState,
    outcome: Option<CommitOutcome>,
}

impl<'a, T: TagTransport + ?Sized> CardSession<'a, T> {
    pub fn new(key: &'a KeyHandle, ledger: &'a mut PendingDeltaLedger, tag: &'a mut T) -> Self {
        Self {
            id: Uuid::new_v4(),
            key,
            ledger,
            tag,
            state: SessionState::Idle,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Idle -> Connected
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn connect(&mut self) -> Result<()> {
        self.expect_state("connect", |s| matches!(s, SessionState::Idle))?;

        if let Err(e) = self.tag.connect() {
            return Err(self.fail(e));
        }
        self.transition(SessionState::Connected);
        Ok(())
    }

    /// Connected -> RecordLoaded: read, decrypt, decode
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn load(&mut self) -> Result<AccountRecord> {
        self.expect_state("load", |s| matches!(s, SessionState::Connected))?;

        match self.read_record() {
            Ok(record) => {
                self.transition(SessionState::RecordLoaded(record.clone()));
                Ok(record)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// RecordLoaded -> Committed: fold the pending delta and write it back
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn commit(&mut self) -> Result<CommitOutcome> {
        let loaded = match &self.state {
            SessionState::RecordLoaded(record) => record.clone(),
            other => {
                return Err(Error::InvalidState {
                    operation: "commit",
                    state: other.name(),
                })
            }
        };

        if self.ledger.is_empty() {
            debug!("nothing pending, read-only pass");
            return Ok(self.committed(loaded.clone(), loaded, false));
        }

        let updated = match self.write_record(&loaded) {
            Ok(updated) => updated,
            Err(e) => return Err(self.fail(e)),
        };
        self.ledger.clear();
        Ok(self.committed(loaded, updated, true))
    }

    /// Amount the next commit would fold into the card
    pub fn pending(&self) -> DecimalAmount {
        self.ledger.pending()
    }

    /// Caller-side veto after the record is loaded, e.g. an overdraft check
    /// against this card's balance. The card and the pending amount are left
    /// alone; the session ends Failed with the kind of `reason`.
    #[instrument(skip(self, reason), fields(session_id = %self.id))]
    pub fn refuse(&mut self, reason: Error) -> Error {
        if let Err(e) = self.expect_state("refuse", |s| matches!(s, SessionState::RecordLoaded(_))) {
            return e;
        }
        self.fail(reason)
    }

    /// Caller-initiated cancel before commit. The card is not touched.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn abort(&mut self) -> Result<()> {
        self.expect_state("abort", |s| {
            matches!(s, SessionState::Connected | SessionState::RecordLoaded(_))
        })?;
        self.fail(Error::Aborted);
        Ok(())
    }

    /// Committed or Failed -> Idle, disconnecting the tag
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn release(&mut self) -> Result<SessionReport> {
        let error = match &self.state {
            SessionState::Committed(_) => None,
            SessionState::Failed(kind) => Some(*kind),
            other => {
                return Err(Error::InvalidState {
                    operation: "release",
                    state: other.name(),
                })
            }
        };

        self.tag.disconnect();
        self.transition(SessionState::Idle);
        Ok(SessionReport {
            session_id: self.id,
            outcome: self.outcome.take(),
            error,
        })
    }

    fn read_record(&mut self) -> Result<AccountRecord> {
        let raw = self.tag.read()?;
        debug!(bytes = raw.len(), "read card payload");

        let text = std::str::from_utf8(&raw)
            .map_err(|_| Error::format("card payload is not UTF-8 text"))?;
        let plaintext = cipher::decrypt(self.key, text)?;
        codec::decode_bytes(&plaintext)
    }

    fn write_record(&mut self, loaded: &AccountRecord) -> Result<AccountRecord> {
        let updated = self.ledger.preview(loaded)?;
        let plaintext = codec::encode(&updated)?;
        let envelope = cipher::encrypt_to_text(self.key, plaintext.as_bytes())?;

        self.tag.write(envelope.as_bytes())?;
        debug!(bytes = envelope.len(), "wrote card payload");
        Ok(updated)
    }

    fn committed(&mut self, previous: AccountRecord, record: AccountRecord, written: bool) -> CommitOutcome {
        let outcome = CommitOutcome {
            previous,
            record: record.clone(),
            written,
        };
        self.outcome = Some(outcome.clone());
        self.transition(SessionState::Committed(record));
        info!(written, "session committed");
        outcome
    }

    fn expect_state(&self, operation: &'static str, allowed: impl Fn(&SessionState) -> bool) -> Result<()> {
        if allowed(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = self.state.name(), to = next.name(), "session transition");
        self.state = next;
    }

    fn fail(&mut self, error: Error) -> Error {
        let kind = error.kind();
        warn!(from = self.state.name(), error_kind = kind.as_str(), "session failed");
        self.state = SessionState::Failed(kind);
        error
    }
}

impl<T: TagTransport + ?Sized> Drop for CardSession<'_, T> {
    fn drop(&mut self) {
        if self.state != SessionState::Idle {
            self.tag.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryTag;
    use crate::domain::{DecimalAmount, DecodingError};
    use crate::ports::KEY_LEN;

    fn key() -> KeyHandle {
        KeyHandle::from_bytes(&[0x42; KEY_LEN]).unwrap()
    }

    fn card_with(key: &KeyHandle, plaintext: &str) -> MemoryTag {
        let envelope = cipher::encrypt_to_text(key, plaintext.as_bytes()).unwrap();
        MemoryTag::with_payload(envelope.into_bytes())
    }

    fn read_card(key: &KeyHandle, tag: &MemoryTag) -> AccountRecord {
        let text = String::from_utf8(tag.payload().unwrap().to_vec()).unwrap();
        codec::decode_bytes(&cipher::decrypt(key, &text).unwrap()).unwrap()
    }

    #[test]
    fn test_read_only_pass_does_not_write() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        let before = tag.payload().unwrap().to_vec();
        let mut ledger = PendingDeltaLedger::new();

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        let loaded = session.load().unwrap();
        let outcome = session.commit().unwrap();
        let report = session.release().unwrap();
        drop(session);

        assert_eq!(loaded.balance().to_canonical(), "100.00");
        assert!(!outcome.written);
        assert_eq!(outcome.record, loaded);
        assert_eq!(report.error, None);
        assert_eq!(tag.writes(), 0);
        assert_eq!(tag.payload().unwrap(), before.as_slice());
    }

    #[test]
    fn test_pending_delta_is_written_and_consumed() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(-50, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        session.load().unwrap();
        let outcome = session.commit().unwrap();
        assert!(matches!(session.state(), SessionState::Committed(_)));
        session.release().unwrap();
        assert_eq!(session.state(), &SessionState::Idle);
        drop(session);

        assert!(outcome.written);
        assert_eq!(outcome.record.balance().to_canonical(), "50.00");
        assert!(ledger.is_empty());
        assert_eq!(read_card(&key, &tag).balance().to_canonical(), "50.00");
    }

    #[test]
    fn test_failed_write_preserves_pending() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        let before = tag.payload().unwrap().to_vec();
        tag.fail_next_write();
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(25, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        session.load().unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, Error::TagIo(_)));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::TagIo));
        let report = session.release().unwrap();
        drop(session);

        assert_eq!(report.error, Some(ErrorKind::TagIo));
        assert!(report.outcome.is_none());
        assert_eq!(ledger.pending(), DecimalAmount::new(25, 0));
        assert_eq!(tag.payload().unwrap(), before.as_slice());
    }

    #[test]
    fn test_decode_failure_never_writes() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe");
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(25, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        let err = session.load().unwrap_err();
        assert!(matches!(
            err,
            Error::Decoding(DecodingError::WrongFieldCount { found: 2 })
        ));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::WrongFieldCount));
        assert!(matches!(session.commit(), Err(Error::InvalidState { .. })));
        session.release().unwrap();
        drop(session);

        assert_eq!(tag.writes(), 0);
        assert_eq!(ledger.pending(), DecimalAmount::new(25, 0));
    }

    #[test]
    fn test_foreign_card_is_authentication_failure() {
        let other = KeyHandle::from_bytes(&[0x01; KEY_LEN]).unwrap();
        let mut tag = card_with(&other, "Jane,Doe,100.00");
        let key = key();
        let mut ledger = PendingDeltaLedger::new();

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        assert!(matches!(session.load(), Err(Error::Authentication)));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::Authentication));
    }

    #[test]
    fn test_removed_card_fails_on_connect() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        tag.remove();
        let mut ledger = PendingDeltaLedger::new();

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        assert!(matches!(session.connect(), Err(Error::TagIo(_))));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::TagIo));
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        let mut ledger = PendingDeltaLedger::new();

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        assert!(matches!(
            session.load(),
            Err(Error::InvalidState { operation: "load", state: "idle" })
        ));
        assert!(matches!(session.release(), Err(Error::InvalidState { .. })));
        // A rejected call does not move the machine
        assert_eq!(session.state(), &SessionState::Idle);
    }

    #[test]
    fn test_abort_leaves_card_and_pending_alone() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,100.00");
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(5, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        session.load().unwrap();
        session.abort().unwrap();
        let report = session.release().unwrap();
        drop(session);

        assert_eq!(report.error, Some(ErrorKind::Aborted));
        assert_eq!(tag.writes(), 0);
        assert_eq!(ledger.pending(), DecimalAmount::new(5, 0));
    }

    #[test]
    fn test_capacity_exceeded_on_commit_keeps_pending() {
        let key = key();
        // 60 Base64 characters now; the grown balance needs 64
        let mut tag = card_with(&key, "Jane,Doe,100.00").with_capacity(60);
        let before = tag.payload().unwrap().to_vec();
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(999_900, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        session.load().unwrap();
        let err = session.commit().unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { needed: 64, capacity: 60 }));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::CapacityExceeded));
        let report = session.release().unwrap();
        drop(session);

        assert_eq!(report.error, Some(ErrorKind::CapacityExceeded));
        assert_eq!(ledger.pending(), DecimalAmount::new(999_900, 0));
        assert_eq!(tag.writes(), 0);
        assert_eq!(tag.payload().unwrap(), before.as_slice());
    }

    #[test]
    fn test_refuse_after_load_leaves_card_alone() {
        let key = key();
        let mut tag = card_with(&key, "Jane,Doe,10.00");
        let mut ledger = PendingDeltaLedger::new();
        ledger.set(DecimalAmount::new(-50, 0));

        let mut session = CardSession::new(&key, &mut ledger, &mut tag);
        session.connect().unwrap();
        let early = session.refuse(Error::InsufficientFunds);
        assert!(matches!(early, Error::InvalidState { operation: "refuse", state: "connected" }));
        assert_eq!(session.state(), &SessionState::Connected);

        session.load().unwrap();
        assert_eq!(session.pending(), DecimalAmount::new(-50, 0));
        let err = session.refuse(Error::InsufficientFunds);
        assert!(matches!(err, Error::InsufficientFunds));
        assert_eq!(session.state(), &SessionState::Failed(ErrorKind::InsufficientFunds));
        let report = session.release().unwrap();
        drop(session);

        assert_eq!(report.error, Some(ErrorKind::InsufficientFunds));
        assert_eq!(tag.writes(), 0);
        assert_eq!(ledger.pending(), DecimalAmount::new(-50, 0));
    }
}
