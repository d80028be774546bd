//! Same-day ordering ambiguity detection.
//!
//! Brokerage exports give no intra-day order.  When a symbol is both bought
//! and sold on one day the adjusted cost base, and therefore the realized
//! gain, depends on which trade is applied first.  Those days must be pinned
//! down by the operator (via `disambiguation_order`) before replay starts.
//!
//! Which kinds take part is an [`AmbiguityPolicy`], not a hardcoded pair:
//! a kind whose accounting does not depend on order (dividends, held funds)
//! must never raise an ambiguity, even next to a buy and a sell.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::transaction::{Transaction, TransactionKind};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Set of kinds whose relative order changes the computed result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbiguityPolicy {
    order_sensitive: BTreeSet<TransactionKind>,
}

impl AmbiguityPolicy {
    pub fn new<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = TransactionKind>,
    {
        Self {
            order_sensitive: kinds.into_iter().collect(),
        }
    }

    /// Build from feed codes such as `["BUY", "SELL"]`.
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(codes.into_iter().map(|c| TransactionKind::from_code(c.as_ref())))
    }

    pub fn is_order_sensitive(&self, kind: &TransactionKind) -> bool {
        self.order_sensitive.contains(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &TransactionKind> {
        self.order_sensitive.iter()
    }
}

impl Default for AmbiguityPolicy {
    /// Buys and sells move the cost base; nothing else does.
    fn default() -> Self {
        Self::new([TransactionKind::Buy, TransactionKind::Sell])
    }
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Transactions of one symbol on one day whose relative order is unknown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbiguityGroup {
    pub symbol: String,
    pub date: NaiveDate,
    /// Members in input order.  Always two or more.
    pub transactions: Vec<Transaction>,
}

/// Find every (symbol, date) bucket that mixes order-sensitive kinds and is
/// not fully ordered.
///
/// Groups are returned in order of first appearance in `transactions`;
/// members keep their input order.
pub fn detect_same_day_ambiguities(
    transactions: &[Transaction],
    policy: &AmbiguityPolicy,
) -> Vec<AmbiguityGroup> {
    struct Bucket<'a> {
        kinds: BTreeSet<&'a TransactionKind>,
        members: Vec<&'a Transaction>,
    }

    let mut index: HashMap<(&str, NaiveDate), usize> = HashMap::new();
    let mut buckets: Vec<Bucket<'_>> = Vec::new();

    for tx in transactions.iter().filter(|t| policy.is_order_sensitive(&t.kind)) {
        let key = (tx.symbol.as_str(), tx.transaction_date);
        let i = *index.entry(key).or_insert_with(|| {
            buckets.push(Bucket {
                kinds: BTreeSet::new(),
                members: Vec::new(),
            });
            buckets.len() - 1
        });
        buckets[i].kinds.insert(&tx.kind);
        buckets[i].members.push(tx);
    }

    buckets
        .into_iter()
        // A single kind on a day has no order effect.
        .filter(|b| b.kinds.len() > 1)
        // Fully ordered buckets are already deterministic.
        .filter(|b| b.members.iter().any(|t| t.disambiguation_order.is_none()))
        .map(|b| AmbiguityGroup {
            symbol: b.members[0].symbol.clone(),
            date: b.members[0].transaction_date,
            transactions: b.members.into_iter().cloned().collect(),
        })
        .collect()
}
