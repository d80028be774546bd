//! Resumable, exactly-once transaction replay.
//!
//! [`StateManager`] owns the sorted transaction list, the processed set and
//! the holdings mapping for one run.  Each [`StateManager::advance`] call
//! applies at most one transaction:
//!
//! 1. refuse while any same-day ambiguity is outstanding;
//! 2. move the cursor, skipping transactions already in the processed set;
//! 3. call the caller's apply function with the symbol's current holding;
//! 4. on success, durably record the fingerprint, then persist holdings if
//!    the holding changed.
//!
//! A failed apply leaves the processed log, the holdings snapshot and the
//! cursor untouched, so the same transaction is retried next call.
//!
//! A failed holdings save after the fingerprint was recorded leaves the
//! snapshot pending: every later `advance` retries the save first and applies
//! nothing new until it succeeds.
//!
//! ```text
//! Loaded --advance--> Iterating --(cursor past end)--> Exhausted
//! ```

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, warn};

use crate::ambiguity::{detect_same_day_ambiguities, AmbiguityGroup, AmbiguityPolicy};
use crate::holding::{holding_for, Holding, Holdings};
use crate::ordering::sort_transactions;
use crate::processor::dividend_share_count;
use crate::transaction::{Fingerprint, Transaction, TransactionKind};

/// Error type returned by injected effects and apply functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Checkpoint effects
// ---------------------------------------------------------------------------

/// Durable effects the state manager drives.
///
/// Both methods must not return `Ok` before the write is durable.
pub trait Checkpoint {
    /// Append one fingerprint to the processed log.
    fn append_processed(&mut self, fingerprint: &Fingerprint) -> Result<(), BoxError>;

    /// Overwrite the holdings snapshot.
    fn save_holdings(&mut self, holdings: &Holdings) -> Result<(), BoxError>;
}

impl<C: Checkpoint + ?Sized> Checkpoint for &mut C {
    fn append_processed(&mut self, fingerprint: &Fingerprint) -> Result<(), BoxError> {
        (**self).append_processed(fingerprint)
    }

    fn save_holdings(&mut self, holdings: &Holdings) -> Result<(), BoxError> {
        (**self).save_holdings(holdings)
    }
}

/// In-memory checkpoint.  Records every write; can be told to fail.
#[derive(Clone, Debug, Default)]
pub struct MemoryCheckpoint {
    pub processed: Vec<Fingerprint>,
    pub snapshots: Vec<Holdings>,
    pub fail_append: bool,
    pub fail_save: bool,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved snapshot, if any.
    pub fn last_snapshot(&self) -> Option<&Holdings> {
        self.snapshots.last()
    }
}

impl Checkpoint for MemoryCheckpoint {
    fn append_processed(&mut self, fingerprint: &Fingerprint) -> Result<(), BoxError> {
        if self.fail_append {
            return Err("processed log unavailable".into());
        }
        self.processed.push(fingerprint.clone());
        Ok(())
    }

    fn save_holdings(&mut self, holdings: &Holdings) -> Result<(), BoxError> {
        if self.fail_save {
            return Err("holdings store unavailable".into());
        }
        self.snapshots.push(holdings.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Processed set
// ---------------------------------------------------------------------------

/// Fingerprints of transactions already applied.  Only grows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessedSet(HashSet<Fingerprint>);

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored processed-log lines; blank lines are ignored.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            lines
                .into_iter()
                .filter(|l| !l.as_ref().trim().is_empty())
                .map(|l| Fingerprint::from_line(l.as_ref()))
                .collect(),
        )
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.0.contains(fingerprint)
    }

    pub fn insert(&mut self, fingerprint: Fingerprint) -> bool {
        self.0.insert(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Fingerprint> for ProcessedSet {
    fn from_iter<I: IntoIterator<Item = Fingerprint>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StateError {
    /// Construction: a kind the processor cannot apply.
    UnsupportedKind {
        fingerprint: Fingerprint,
        kind: TransactionKind,
    },
    /// Construction: a dividend whose memo has no share count.
    MalformedDividend { fingerprint: Fingerprint },
    /// Gate: same-day ambiguities must be fixed in the input and reloaded.
    AmbiguitiesOutstanding { groups: usize },
    /// The apply function failed.  Nothing durable changed.
    Apply {
        fingerprint: Fingerprint,
        source: BoxError,
    },
    /// The processed log rejected the write.  Nothing durable changed.
    MarkProcessed {
        fingerprint: Fingerprint,
        source: BoxError,
    },
    /// Fingerprint was recorded but the holdings snapshot was not saved.
    /// The save stays pending and is retried by the next `advance`.
    SaveHoldings {
        fingerprint: Fingerprint,
        source: BoxError,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKind { fingerprint, kind } => {
                write!(f, "unsupported transaction kind '{kind}' in [{fingerprint}]")
            }
            Self::MalformedDividend { fingerprint } => write!(
                f,
                "failed to find share quantity in dividend description [{fingerprint}]"
            ),
            Self::AmbiguitiesOutstanding { groups } => write!(
                f,
                "resolve {groups} same-day ambiguit{} before processing transactions",
                if *groups == 1 { "y" } else { "ies" }
            ),
            Self::Apply {
                fingerprint,
                source,
            } => write!(f, "apply failed for [{fingerprint}]: {source}"),
            Self::MarkProcessed {
                fingerprint,
                source,
            } => write!(f, "could not mark [{fingerprint}] processed: {source}"),
            Self::SaveHoldings {
                fingerprint,
                source,
            } => write!(
                f,
                "[{fingerprint}] marked processed but holdings were not saved: {source}"
            ),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Apply { source, .. }
            | Self::MarkProcessed { source, .. }
            | Self::SaveHoldings { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// State manager
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Loaded,
    Iterating,
    Exhausted,
}

/// Outcome of one [`StateManager::advance`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// One transaction was applied and recorded.
    Applied {
        fingerprint: Fingerprint,
        holding_changed: bool,
    },
    /// The cursor passed the last transaction.
    Exhausted,
}

impl Advance {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Advance::Exhausted)
    }
}

pub struct StateManager<C: Checkpoint> {
    transactions: Vec<Transaction>,
    /// Index of the next transaction to inspect.
    cursor: usize,
    phase: Phase,
    processed: ProcessedSet,
    holdings: Holdings,
    checkpoint: C,
    ambiguities: Vec<AmbiguityGroup>,
    /// Transaction whose holdings update is in memory but not yet saved.
    unsaved: Option<Fingerprint>,
}

impl<C: Checkpoint> StateManager<C> {
    /// Load with the default ambiguity policy (buys and sells).
    pub fn new(
        transactions: Vec<Transaction>,
        processed: ProcessedSet,
        holdings: Holdings,
        checkpoint: C,
    ) -> Result<Self, StateError> {
        Self::with_policy(
            transactions,
            processed,
            holdings,
            checkpoint,
            &AmbiguityPolicy::default(),
        )
    }

    /// Validate the whole batch, detect ambiguities on the input as given,
    /// then sort for replay.
    ///
    /// Fails on the first unsupported kind or unreadable dividend memo so
    /// that a partly bad batch is never partly applied.
    pub fn with_policy(
        mut transactions: Vec<Transaction>,
        processed: ProcessedSet,
        holdings: Holdings,
        checkpoint: C,
        policy: &AmbiguityPolicy,
    ) -> Result<Self, StateError> {
        validate_batch(&transactions)?;

        let ambiguities = detect_same_day_ambiguities(&transactions, policy);
        if !ambiguities.is_empty() {
            warn!(groups = ambiguities.len(), "same-day ambiguities detected");
        }
        sort_transactions(&mut transactions);

        debug!(
            transactions = transactions.len(),
            processed = processed.len(),
            symbols = holdings.len(),
            "state manager loaded"
        );

        Ok(Self {
            transactions,
            cursor: 0,
            phase: Phase::Loaded,
            processed,
            holdings,
            checkpoint,
            ambiguities,
            unsaved: None,
        })
    }

    /// Apply the next unprocessed transaction.
    ///
    /// `apply` receives the transaction and the symbol's current holding and
    /// returns the updated holding.  It typically posts ledger entries as a
    /// side effect before returning.
    pub fn advance<F, E>(&mut self, apply: F) -> Result<Advance, StateError>
    where
        F: FnOnce(&Transaction, &Holding) -> Result<Holding, E>,
        E: Into<BoxError>,
    {
        if !self.ambiguities.is_empty() {
            warn!(groups = self.ambiguities.len(), "refusing to process: ambiguities outstanding");
            return Err(StateError::AmbiguitiesOutstanding {
                groups: self.ambiguities.len(),
            });
        }

        self.flush_holdings()?;

        loop {
            let Some(tx) = self.transactions.get(self.cursor) else {
                if self.phase != Phase::Exhausted {
                    info!(transactions = self.transactions.len(), "no more transactions");
                }
                self.phase = Phase::Exhausted;
                return Ok(Advance::Exhausted);
            };
            self.phase = Phase::Iterating;

            let fingerprint = tx.fingerprint();
            if self.processed.contains(&fingerprint) {
                debug!(tx = %tx.label(), "already processed, skipping");
                self.cursor += 1;
                continue;
            }

            let holding = holding_for(&self.holdings, &tx.symbol);
            let updated = apply(tx, &holding).map_err(|e| StateError::Apply {
                fingerprint: fingerprint.clone(),
                source: e.into(),
            })?;

            self.checkpoint
                .append_processed(&fingerprint)
                .map_err(|source| StateError::MarkProcessed {
                    fingerprint: fingerprint.clone(),
                    source,
                })?;
            self.processed.insert(fingerprint.clone());
            self.cursor += 1;

            let label = tx.label();
            let holding_changed = updated != holding;
            if holding_changed {
                self.holdings.insert(tx.symbol.clone(), updated);
                self.unsaved = Some(fingerprint.clone());
                self.flush_holdings()?;
            }

            info!(
                tx = %label,
                acb = %updated.adjusted_cost_base,
                qty = updated.quantity,
                "transaction applied"
            );
            return Ok(Advance::Applied {
                fingerprint,
                holding_changed,
            });
        }
    }

    /// Save the holdings snapshot if an update is pending.  No-op otherwise.
    pub fn flush_holdings(&mut self) -> Result<(), StateError> {
        let Some(fingerprint) = self.unsaved.take() else {
            return Ok(());
        };
        if let Err(source) = self.checkpoint.save_holdings(&self.holdings) {
            warn!(tx = %fingerprint, error = %source, "holdings snapshot not saved");
            self.unsaved = Some(fingerprint.clone());
            return Err(StateError::SaveHoldings {
                fingerprint,
                source,
            });
        }
        Ok(())
    }

    /// `true` while a holdings update is waiting to be saved.
    pub fn has_unsaved_holdings(&self) -> bool {
        self.unsaved.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ambiguities(&self) -> &[AmbiguityGroup] {
        &self.ambiguities
    }

    pub fn holdings(&self) -> &Holdings {
        &self.holdings
    }

    /// Transactions in replay order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn processed(&self) -> &ProcessedSet {
        &self.processed
    }

    /// Transactions at or after the cursor not yet in the processed set.
    pub fn remaining(&self) -> usize {
        self.transactions[self.cursor.min(self.transactions.len())..]
            .iter()
            .filter(|t| !self.processed.contains(&t.fingerprint()))
            .count()
    }

    pub fn checkpoint(&self) -> &C {
        &self.checkpoint
    }

    pub fn checkpoint_mut(&mut self) -> &mut C {
        &mut self.checkpoint
    }

    pub fn into_checkpoint(self) -> C {
        self.checkpoint
    }
}

fn validate_batch(transactions: &[Transaction]) -> Result<(), StateError> {
    for tx in transactions {
        if !tx.kind.is_supported() {
            return Err(StateError::UnsupportedKind {
                fingerprint: tx.fingerprint(),
                kind: tx.kind.clone(),
            });
        }
        if tx.kind == TransactionKind::CashDividend && dividend_share_count(&tx.description).is_none() {
            return Err(StateError::MalformedDividend {
                fingerprint: tx.fingerprint(),
            });
        }
    }
    Ok(())
}
