//! Reader service - the device that owns the key and the pending delta
//!
//! A `CardReader` threads its own `PendingDeltaLedger` through each card
//! session. Deposit and withdrawal requests only set the pending amount; the
//! money moves when a card is tapped and the write succeeds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountRecord, DecimalAmount};
use crate::ports::{KeyCustodian, KeyHandle, TagTransport};

use super::cipher;
use super::codec;
use super::ledger::PendingDeltaLedger;
use super::session::{CardSession, CommitOutcome};

/// What to do when a withdrawal exceeds the last balance this reader saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// Refuse the request; nothing becomes pending
    #[default]
    Reject,
    /// Accept the request and hand back a warning for display
    Warn,
}

impl OverdraftPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for OverdraftPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverdraftPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "warn" | "allow" => Ok(Self::Warn),
            other => Err(Error::Config(format!(
                "unknown overdraft policy {other:?} (expected \"reject\" or \"warn\")"
            ))),
        }
    }
}

/// Returned when a withdrawal goes through under `OverdraftPolicy::Warn`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverdraftWarning {
    pub balance: DecimalAmount,
    pub requested: DecimalAmount,
}

/// Result of one tap
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub session_id: Uuid,
    pub previous: AccountRecord,
    pub record: AccountRecord,
    pub written: bool,
}

impl SessionOutcome {
    fn from_commit(session_id: Uuid, commit: CommitOutcome) -> Self {
        Self {
            session_id,
            previous: commit.previous,
            record: commit.record,
            written: commit.written,
        }
    }
}

/// A reader device: one key, one pending delta, one session at a time
pub struct CardReader {
    key: KeyHandle,
    ledger: PendingDeltaLedger,
    policy: OverdraftPolicy,
    last_seen: Option<AccountRecord>,
}

impl CardReader {
    pub fn new(key: KeyHandle, policy: OverdraftPolicy) -> Self {
        Self {
            key,
            ledger: PendingDeltaLedger::new(),
            policy,
            last_seen: None,
        }
    }

    /// Build a reader around the custodian's existing key
    pub fn from_custodian(custodian: &dyn KeyCustodian, policy: OverdraftPolicy) -> Result<Self> {
        Ok(Self::new(custodian.get()?, policy))
    }

    pub fn key_id(&self) -> &str {
        self.key.key_id()
    }

    pub fn policy(&self) -> OverdraftPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: OverdraftPolicy) {
        self.policy = policy;
    }

    /// Amount waiting for the next card write (zero when nothing is pending)
    pub fn pending(&self) -> DecimalAmount {
        self.ledger.pending()
    }

    /// Record from the latest successful session
    pub fn last_seen(&self) -> Option<&AccountRecord> {
        self.last_seen.as_ref()
    }

    /// Queue a deposit for the next tap, replacing anything already pending
    pub fn request_deposit(&mut self, amount: DecimalAmount) -> Result<()> {
        if !amount.is_positive() {
            return Err(Error::validation("deposit amount must be greater than zero"));
        }
        self.ledger.set(amount);
        Ok(())
    }

    /// Queue a withdrawal for the next tap, replacing anything already pending
    ///
    /// When the last seen balance is known and smaller than `amount`, the
    /// overdraft policy decides. With no known balance the request is queued.
    /// `last_seen` may belong to a different card than the next one tapped,
    /// so under `OverdraftPolicy::Reject` `tap` checks again against the
    /// balance actually loaded from the card before writing.
    pub fn request_withdrawal(&mut self, amount: DecimalAmount) -> Result<Option<OverdraftWarning>> {
        if !amount.is_positive() {
            return Err(Error::validation("withdrawal amount must be greater than zero"));
        }

        let warning = match &self.last_seen {
            Some(record) if amount > record.balance() => match self.policy {
                OverdraftPolicy::Reject => {
                    warn!("withdrawal rejected by overdraft policy");
                    return Err(Error::InsufficientFunds);
                }
                OverdraftPolicy::Warn => {
                    warn!("withdrawal exceeds last known balance, queued under warn policy");
                    Some(OverdraftWarning {
                        balance: record.balance(),
                        requested: amount,
                    })
                }
            },
            _ => None,
        };

        self.ledger.set(-amount);
        Ok(warning)
    }

    /// Drop whatever is pending
    pub fn cancel_pending(&mut self) {
        self.ledger.clear();
    }

    /// Run one full session against a tag in the field
    ///
    /// Reads the card, applies the pending delta if there is one, and writes
    /// it back. On any failure the card keeps its previous content and the
    /// pending delta stays queued for the next tap.
    pub fn tap<T: TagTransport + ?Sized>(&mut self, tag: &mut T) -> Result<SessionOutcome> {
        let mut session = CardSession::new(&self.key, &mut self.ledger, tag);
        let session_id = session.id();

        let result = run_session(&mut session, self.policy);
        // Committed or Failed at this point, so release cannot be out of order
        let report = session.release()?;
        drop(session);

        match result {
            Ok(commit) => {
                info!(%session_id, written = commit.written, "tap complete");
                self.last_seen = Some(commit.record.clone());
                Ok(SessionOutcome::from_commit(session_id, commit))
            }
            Err(e) => {
                warn!(%session_id, error_kind = ?report.error, "tap failed");
                Err(e)
            }
        }
    }

    /// Write a freshly issued account onto a tag, replacing whatever it held
    #[instrument(skip_all)]
    pub fn issue<T: TagTransport + ?Sized>(
        &mut self,
        tag: &mut T,
        name: &str,
        surname: &str,
        balance: DecimalAmount,
    ) -> Result<AccountRecord> {
        let record = AccountRecord::new(name, surname, balance);
        record.validate().map_err(Error::validation)?;

        let plaintext = codec::encode(&record)?;
        let envelope = cipher::encrypt_to_text(&self.key, plaintext.as_bytes())?;

        tag.connect()?;
        let written = tag.write(envelope.as_bytes());
        tag.disconnect();
        written?;

        info!(bytes = envelope.len(), "card issued");
        self.last_seen = Some(record.clone());
        Ok(record)
    }
}

fn run_session<T: TagTransport + ?Sized>(
    session: &mut CardSession<'_, T>,
    policy: OverdraftPolicy,
) -> Result<CommitOutcome> {
    session.connect()?;
    let loaded = session.load()?;

    let pending = session.pending();
    if policy == OverdraftPolicy::Reject && pending.is_negative() && -pending > loaded.balance() {
        warn!("withdrawal exceeds the balance on this card, rejected by overdraft policy");
        return Err(session.refuse(Error::InsufficientFunds));
    }
    session.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryKeyStore, MemoryTag};
    use crate::domain::ErrorKind;
    use crate::ports::KEY_LEN;

    fn reader(policy: OverdraftPolicy) -> CardReader {
        CardReader::new(KeyHandle::from_bytes(&[0x11; KEY_LEN]).unwrap(), policy)
    }

    fn amount(literal: &str) -> DecimalAmount {
        DecimalAmount::parse_canonical(literal).unwrap()
    }

    #[test]
    fn test_issue_then_tap_reads_back() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();

        reader.issue(&mut tag, "Jane", "Doe", amount("100.00")).unwrap();
        let outcome = reader.tap(&mut tag).unwrap();

        assert!(!outcome.written);
        assert_eq!(outcome.record.name(), "Jane");
        assert_eq!(outcome.record.surname(), "Doe");
        assert_eq!(outcome.record.balance().to_canonical(), "100.00");
    }

    #[test]
    fn test_issue_validates_holder() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();

        let err = reader.issue(&mut tag, "", "Doe", amount("1")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = reader.issue(&mut tag, "Jane", "Doe,Jr", amount("1")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(tag.writes(), 0);
    }

    #[test]
    fn test_deposit_is_applied_on_tap() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();
        reader.issue(&mut tag, "Jane", "Doe", amount("100.00")).unwrap();

        reader.request_deposit(amount("25")).unwrap();
        let outcome = reader.tap(&mut tag).unwrap();

        assert!(outcome.written);
        assert_eq!(outcome.previous.balance().to_canonical(), "100.00");
        assert_eq!(outcome.record.balance().to_canonical(), "125.00");
        assert!(reader.pending().is_zero());
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let mut reader = reader(OverdraftPolicy::Reject);
        assert!(matches!(reader.request_deposit(DecimalAmount::ZERO), Err(Error::Validation(_))));
        assert!(matches!(reader.request_withdrawal(amount("-5")), Err(Error::Validation(_))));
        assert!(reader.pending().is_zero());
    }

    #[test]
    fn test_overdraft_rejected_under_reject_policy() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();
        reader.issue(&mut tag, "Jane", "Doe", amount("10.00")).unwrap();

        let err = reader.request_withdrawal(amount("20")).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds));
        assert!(reader.pending().is_zero());
    }

    #[test]
    fn test_overdraft_warns_and_proceeds_under_warn_policy() {
        let mut reader = reader(OverdraftPolicy::Warn);
        let mut tag = MemoryTag::blank();
        reader.issue(&mut tag, "Jane", "Doe", amount("10.00")).unwrap();

        let warning = reader.request_withdrawal(amount("20")).unwrap().unwrap();
        assert_eq!(warning.balance, amount("10.00"));
        assert_eq!(warning.requested, amount("20"));

        let outcome = reader.tap(&mut tag).unwrap();
        assert_eq!(outcome.record.balance().to_canonical(), "-10.00");
    }

    #[test]
    fn test_overdraft_rechecked_against_tapped_card() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut poor = MemoryTag::blank();
        let mut rich = MemoryTag::blank();
        reader.issue(&mut poor, "John", "Roe", amount("10.00")).unwrap();
        reader.issue(&mut rich, "Jane", "Doe", amount("100.00")).unwrap();

        // Accepted against the rich card, which was seen last
        assert!(reader.request_withdrawal(amount("50")).unwrap().is_none());

        let poor_before = poor.payload().unwrap().to_vec();
        let err = reader.tap(&mut poor).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds));
        assert_eq!(poor.writes(), 1);
        assert_eq!(poor.payload().unwrap(), poor_before.as_slice());
        assert_eq!(reader.pending(), amount("-50"));
        assert_eq!(reader.last_seen().unwrap().name(), "Jane");

        let outcome = reader.tap(&mut rich).unwrap();
        assert_eq!(outcome.record.balance().to_canonical(), "50.00");
        assert!(reader.pending().is_zero());
    }

    #[test]
    fn test_unseen_card_overdraft_depends_on_policy() {
        let mut issuer = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();
        issuer.issue(&mut tag, "Jane", "Doe", amount("10.00")).unwrap();

        // Fresh readers with the same key have no last seen balance
        let mut strict = reader(OverdraftPolicy::Reject);
        assert!(strict.request_withdrawal(amount("30")).unwrap().is_none());
        assert!(matches!(strict.tap(&mut tag), Err(Error::InsufficientFunds)));
        assert_eq!(strict.pending(), amount("-30"));

        let mut lenient = reader(OverdraftPolicy::Warn);
        assert!(lenient.request_withdrawal(amount("30")).unwrap().is_none());
        let outcome = lenient.tap(&mut tag).unwrap();
        assert_eq!(outcome.record.balance().to_canonical(), "-20.00");
    }

    #[test]
    fn test_failed_write_keeps_delta_for_retry() {
        let mut reader = reader(OverdraftPolicy::Reject);
        let mut tag = MemoryTag::blank();
        reader.issue(&mut tag, "Jane", "Doe", amount("100.00")).unwrap();
        reader.request_deposit(amount("25")).unwrap();

        tag.fail_next_write();
        let err = reader.tap(&mut tag).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TagIo);
        assert_eq!(reader.pending(), amount("25"));

        let outcome = reader.tap(&mut tag).unwrap();
        assert_eq!(outcome.record.balance().to_canonical(), "125.00");
        assert!(reader.pending().is_zero());
    }

    #[test]
    fn test_from_custodian_requires_key() {
        let store = MemoryKeyStore::new();
        assert!(CardReader::from_custodian(&store, OverdraftPolicy::Reject).is_err());

        let key = store.generate_if_absent().unwrap();
        let reader = CardReader::from_custodian(&store, OverdraftPolicy::Reject).unwrap();
        assert_eq!(reader.key_id(), key.key_id());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("warn".parse::<OverdraftPolicy>().unwrap(), OverdraftPolicy::Warn);
        assert_eq!(" Reject ".parse::<OverdraftPolicy>().unwrap(), OverdraftPolicy::Reject);
        assert!(matches!("maybe".parse::<OverdraftPolicy>(), Err(Error::Config(_))));
    }
}
