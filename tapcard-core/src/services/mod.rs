//! Service layer - card protocol orchestration
//!
//! Services coordinate domain logic and port interactions. The codec and
//! cipher are stateless; the ledger, session and reader carry the state of
//! a pending balance change through a tap.

pub mod cipher;
pub mod codec;
mod ledger;
mod reader;
mod session;

pub use ledger::PendingDeltaLedger;
pub use reader::{CardReader, OverdraftPolicy, OverdraftWarning, SessionOutcome};
pub use session::{CardSession, CommitOutcome, SessionReport, SessionState};
