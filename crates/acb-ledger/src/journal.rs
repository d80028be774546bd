//! Accounting entries handed to the external ledger sink.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::transaction::Fingerprint;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

/// One leg of a journal transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub side: Side,
    pub account: String,
    pub amount: Money,
}

impl JournalLine {
    pub fn debit(account: impl Into<String>, amount: Money) -> Self {
        Self {
            side: Side::Debit,
            account: account.into(),
            amount,
        }
    }

    pub fn credit(account: impl Into<String>, amount: Money) -> Self {
        Self {
            side: Side::Credit,
            account: account.into(),
            amount,
        }
    }
}

/// Two-leg cash/category entry: `amount` moves from `from_account` to
/// `to_account`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleEntry {
    pub date: NaiveDate,
    pub description: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Money,
    pub notes: String,
}

/// Multi-leg balanced journal transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub notes: String,
    pub lines: Vec<JournalLine>,
}

impl JournalTransaction {
    pub fn total(&self, side: Side) -> Money {
        self.lines
            .iter()
            .filter(|l| l.side == side)
            .fold(Money::ZERO, |acc, l| acc + l.amount)
    }

    /// Debits equal credits.
    pub fn is_balanced(&self) -> bool {
        self.total(Side::Debit) == self.total(Side::Credit)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEntry {
    Expense(SimpleEntry),
    Journal(JournalTransaction),
}

impl LedgerEntry {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Expense(e) => e.date,
            Self::Journal(j) => j.date,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Expense(e) => &e.description,
            Self::Journal(j) => &j.description,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Ledger-write failure reported by a sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SinkError {
    pub reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ledger sink write failed: {}", self.reason)
    }
}

impl std::error::Error for SinkError {}

/// External bookkeeping system.
///
/// `record` must not return `Ok` until the entry is durably accepted; a
/// returned error aborts the current transaction.
pub trait LedgerSink {
    fn record(&mut self, entry: &LedgerEntry, source: &Fingerprint) -> Result<(), SinkError>;
}

impl<S: LedgerSink + ?Sized> LedgerSink for &mut S {
    fn record(&mut self, entry: &LedgerEntry, source: &Fingerprint) -> Result<(), SinkError> {
        (**self).record(entry, source)
    }
}
