//! acb-ledger
//!
//! Adjusted-cost-base replay core.
//! - Fixed-point money (micros), no floats in arithmetic
//! - Deterministic transaction ordering
//! - Same-day ambiguity gate
//! - ACB processor producing balanced ledger entries
//! - Exactly-once state manager over an injected checkpoint
//! - Replay loop with an optional batch limit
//!
//! Pure logic: no file IO, no clock.  Durable storage lives in `acb-store`.

mod holding;
mod ordering;
mod transaction;

pub mod ambiguity;
pub mod journal;
pub mod money;
pub mod processor;
pub mod replay;
pub mod state;

pub use ambiguity::{detect_same_day_ambiguities, AmbiguityGroup, AmbiguityPolicy};
pub use holding::{holding_for, Holding, Holdings};
pub use journal::{
    JournalLine, JournalTransaction, LedgerEntry, LedgerSink, Side, SimpleEntry, SinkError,
};
pub use money::{Money, MoneyParseError, MICROS_SCALE};
pub use ordering::{compare_transactions, sort_transactions};
pub use processor::{
    dividend_share_count, AccountNames, ApplyError, CostBasisProcessor, ProcessError, Processed,
    DEFAULT_DIVIDEND_INCOME_ACCOUNT, DEFAULT_REALIZED_GAINS_ACCOUNT,
};
pub use replay::{replay, ReplaySummary};
pub use state::{
    Advance, BoxError, Checkpoint, MemoryCheckpoint, Phase, ProcessedSet, StateError,
    StateManager,
};
pub use transaction::{Fingerprint, Transaction, TransactionKind, DATE_FORMAT};
