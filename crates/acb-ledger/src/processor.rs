//! Cost-basis (ACB) processor.
//!
//! `process(transaction, holding) -> (entries, updated holding)` with no side
//! effects.  [`CostBasisProcessor::apply_to_sink`] is the wiring used during
//! replay: it forwards the entries to a [`LedgerSink`] and returns the new
//! holding only after every entry was accepted.
//!
//! Accounting convention: gains are treated as income.  Trading fees are
//! capitalised into the cost base on a buy and flow entirely into the realized
//! gain/loss on a sell.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::holding::Holding;
use crate::journal::{JournalLine, JournalTransaction, LedgerEntry, LedgerSink, SimpleEntry, SinkError};
use crate::money::Money;
use crate::transaction::{Fingerprint, Transaction, TransactionKind};

pub const DEFAULT_REALIZED_GAINS_ACCOUNT: &str = "Realized Gains/Losses";
pub const DEFAULT_DIVIDEND_INCOME_ACCOUNT: &str = "Dividend Income";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    UnsupportedKind {
        fingerprint: Fingerprint,
        kind: TransactionKind,
    },
    /// The dividend memo does not carry `... ON <n> SHS REC mm/dd/yy PAY mm/dd/yy`.
    DividendShareCount {
        fingerprint: Fingerprint,
        description: String,
    },
    /// Selling a symbol with no shares on the books.
    NoHolding {
        fingerprint: Fingerprint,
        symbol: String,
    },
    Overflow {
        fingerprint: Fingerprint,
        field: &'static str,
    },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKind { fingerprint, kind } => {
                write!(f, "unsupported transaction kind '{kind}' in [{fingerprint}]")
            }
            Self::DividendShareCount {
                fingerprint,
                description,
            } => write!(
                f,
                "failed to find share quantity in dividend description \"{description}\" [{fingerprint}]"
            ),
            Self::NoHolding {
                fingerprint,
                symbol,
            } => write!(
                f,
                "cannot sell {symbol}: no quantity or cost base on record [{fingerprint}]"
            ),
            Self::Overflow { fingerprint, field } => {
                write!(f, "arithmetic overflow computing {field} [{fingerprint}]")
            }
        }
    }
}

impl std::error::Error for ProcessError {}

/// Failure of [`CostBasisProcessor::apply_to_sink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    Process(ProcessError),
    Sink {
        fingerprint: Fingerprint,
        source: SinkError,
    },
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(e) => e.fmt(f),
            Self::Sink {
                fingerprint,
                source,
            } => write!(f, "{source} [{fingerprint}]"),
        }
    }
}

impl std::error::Error for ApplyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Process(e) => Some(e),
            Self::Sink { source, .. } => Some(source),
        }
    }
}

impl From<ProcessError> for ApplyError {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// Ledger account names the entries are posted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountNames {
    pub cash: String,
    pub equities: String,
    pub realized_gains: String,
    pub dividend_income: String,
}

impl AccountNames {
    /// Cash and equities accounts with the default income account names.
    pub fn new(cash: impl Into<String>, equities: impl Into<String>) -> Self {
        Self {
            cash: cash.into(),
            equities: equities.into(),
            realized_gains: DEFAULT_REALIZED_GAINS_ACCOUNT.to_string(),
            dividend_income: DEFAULT_DIVIDEND_INCOME_ACCOUNT.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Output of [`CostBasisProcessor::process`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Processed {
    pub entries: Vec<LedgerEntry>,
    pub holding: Holding,
}

#[derive(Clone, Debug)]
pub struct CostBasisProcessor {
    accounts: AccountNames,
}

impl CostBasisProcessor {
    pub fn new(accounts: AccountNames) -> Self {
        Self { accounts }
    }

    pub fn accounts(&self) -> &AccountNames {
        &self.accounts
    }

    pub fn process(&self, tx: &Transaction, holding: &Holding) -> Result<Processed, ProcessError> {
        match &tx.kind {
            TransactionKind::Buy => self.buy(tx, holding),
            TransactionKind::Sell => self.sell(tx, holding),
            TransactionKind::CashDividend => self.cash_dividend(tx, holding),
            TransactionKind::Held => Ok(Processed {
                entries: Vec::new(),
                holding: *holding,
            }),
            TransactionKind::Other(_) => Err(ProcessError::UnsupportedKind {
                fingerprint: tx.fingerprint(),
                kind: tx.kind.clone(),
            }),
        }
    }

    /// Process, then forward every entry to `sink` in order.
    ///
    /// The updated holding is returned only when the sink accepted all
    /// entries; any failure leaves the caller's state untouched.
    pub fn apply_to_sink<S: LedgerSink>(
        &self,
        sink: &mut S,
        tx: &Transaction,
        holding: &Holding,
    ) -> Result<Holding, ApplyError> {
        let processed = self.process(tx, holding)?;
        if processed.entries.is_empty() {
            return Ok(processed.holding);
        }
        let fingerprint = tx.fingerprint();
        for entry in &processed.entries {
            sink.record(entry, &fingerprint)
                .map_err(|source| ApplyError::Sink {
                    fingerprint: fingerprint.clone(),
                    source,
                })?;
        }
        Ok(processed.holding)
    }

    fn buy(&self, tx: &Transaction, holding: &Holding) -> Result<Processed, ProcessError> {
        let qty = tx.quantity.abs();
        let paid = tx.settlement_amount.abs();
        let overflow = |field| ProcessError::Overflow {
            fingerprint: tx.fingerprint(),
            field,
        };

        let entry = LedgerEntry::Expense(SimpleEntry {
            date: tx.transaction_date,
            description: format!("Buy {qty} {}", tx.symbol),
            from_account: self.accounts.cash.clone(),
            to_account: self.accounts.equities.clone(),
            amount: paid.round_to_cents(),
            notes: tx.description.clone(),
        });

        // Settlement includes the fee; all of it is capitalised.
        let updated = Holding {
            adjusted_cost_base: holding
                .adjusted_cost_base
                .checked_add(paid)
                .ok_or_else(|| overflow("adjusted cost base"))?,
            quantity: holding
                .quantity
                .checked_add(qty)
                .ok_or_else(|| overflow("quantity"))?,
        };

        Ok(Processed {
            entries: vec![entry],
            holding: updated,
        })
    }

    fn sell(&self, tx: &Transaction, holding: &Holding) -> Result<Processed, ProcessError> {
        if holding.quantity == 0 {
            return Err(ProcessError::NoHolding {
                fingerprint: tx.fingerprint(),
                symbol: tx.symbol.clone(),
            });
        }
        let sold = tx.quantity.abs();
        let overflow = |field| ProcessError::Overflow {
            fingerprint: tx.fingerprint(),
            field,
        };

        // sold * (acb / held), rounded once: to cents for the ledger, to
        // micros for the remaining book value.
        let acb = holding.adjusted_cost_base;
        let cost_amount = acb
            .mul_div_round_cents(sold, holding.quantity)
            .ok_or_else(|| overflow("cost amount"))?;
        let cost_removed = acb
            .mul_div_round(sold, holding.quantity)
            .ok_or_else(|| overflow("cost removed"))?;

        let proceeds = tx.settlement_amount.round_to_cents();
        let gain_or_loss = proceeds
            .checked_sub(cost_amount)
            .ok_or_else(|| overflow("realized gain"))?;

        let mut lines = vec![
            JournalLine::debit(&self.accounts.cash, proceeds),
            JournalLine::credit(&self.accounts.equities, cost_amount),
        ];
        if gain_or_loss.is_negative() {
            lines.push(JournalLine::debit(&self.accounts.realized_gains, gain_or_loss.abs()));
        } else if !gain_or_loss.is_zero() {
            lines.push(JournalLine::credit(&self.accounts.realized_gains, gain_or_loss));
        }

        let entry = LedgerEntry::Journal(JournalTransaction {
            date: tx.transaction_date,
            description: format!("Sell {sold} {}", tx.symbol),
            notes: tx.description.clone(),
            lines,
        });

        // Book value leaves at cost, not at settlement: the fee stays in the
        // realized figure above.
        let updated = Holding {
            adjusted_cost_base: acb
                .checked_sub(cost_removed)
                .ok_or_else(|| overflow("adjusted cost base"))?,
            quantity: holding
                .quantity
                .checked_sub(sold)
                .ok_or_else(|| overflow("quantity"))?,
        };

        Ok(Processed {
            entries: vec![entry],
            holding: updated,
        })
    }

    fn cash_dividend(&self, tx: &Transaction, holding: &Holding) -> Result<Processed, ProcessError> {
        let shares = dividend_share_count(&tx.description).ok_or_else(|| {
            ProcessError::DividendShareCount {
                fingerprint: tx.fingerprint(),
                description: tx.description.clone(),
            }
        })?;
        let amount = tx.settlement_amount.round_to_cents();

        let entry = LedgerEntry::Journal(JournalTransaction {
            date: tx.settlement_date,
            description: format!("Dividend paid on {shares} {}", tx.symbol),
            notes: tx.description.clone(),
            lines: vec![
                JournalLine::debit(&self.accounts.cash, amount),
                JournalLine::credit(&self.accounts.dividend_income, amount),
            ],
        });

        Ok(Processed {
            entries: vec![entry],
            holding: *holding,
        })
    }
}

/// Share count a cash dividend was paid on, read from the feed memo.
///
/// The feed leaves the quantity column empty for dividends, so the count is
/// only available in text like `CASH DIV ON 100 SHS REC 06/01/21 PAY 07/01/21`.
/// This ties correctness to the upstream memo format.
pub fn dividend_share_count(description: &str) -> Option<i64> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| {
            Regex::new(r"CASH DIV\s+ON\s+(\d+)\s+SHS\s+REC\s+\d\d/\d\d/\d\d\s+PAY\s+\d\d/\d\d/\d\d").ok()
        })
        .as_ref()?;
    re.captures(description)?.get(1)?.as_str().parse().ok()
}
