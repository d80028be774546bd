//! Brokerage transaction record and its canonical fingerprint.
//!
//! A [`Transaction`] is immutable once decoded.  Its canonical form is the
//! key of the processed log: two records with identical field values always
//! produce the same [`Fingerprint`], no matter how the source file spaced or
//! padded them.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::money::Money;

/// Date format used by the brokerage feed and by the canonical form.
pub const DATE_FORMAT: &str = "%d-%b-%Y";

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// What a transaction does to the position.
///
/// `Other` keeps unrecognised feed codes around so the whole batch can be
/// rejected with the offending code instead of failing mid-decode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    Buy,
    Sell,
    CashDividend,
    /// Funds held or released for reinvestment.  Informational only.
    Held,
    Other(String),
}

impl TransactionKind {
    /// Wire code used by the brokerage feed.
    pub fn code(&self) -> &str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::CashDividend => "CASH DIV",
            Self::Held => "REI",
            Self::Other(code) => code,
        }
    }

    /// Decode a feed code.  Matching ignores case and surrounding whitespace.
    pub fn from_code(code: &str) -> Self {
        let normalized = code.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            "CASH DIV" => Self::CashDividend,
            "REI" => Self::Held,
            _ => Self::Other(normalized),
        }
    }

    /// Kinds the cost-basis processor knows how to apply.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for TransactionKind {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        kind.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// One brokerage event.
///
/// `quantity` follows the feed convention: positive for buys, negative (or a
/// bare magnitude) for sells.  The processor reconciles sign with `kind`.
/// `settlement_amount` is signed; negative is cash leaving the account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub description: String,
    pub symbol: String,
    pub transaction_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub account_currency: String,
    pub kind: TransactionKind,
    pub quantity: i64,
    /// Currency the security is priced in.
    pub currency: String,
    pub unit_price: Money,
    pub settlement_amount: Money,
    /// Operator-assigned tie-breaker among same-day trades of one symbol.
    /// Unique per (symbol, date) when present; `None` means "order unknown".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguation_order: Option<u32>,
}

impl Transaction {
    /// Deterministic one-line serialization of the brokerage fields in a
    /// fixed order, with whitespace runs collapsed.
    ///
    /// `disambiguation_order` is operator metadata, not part of the
    /// brokerage record, and is left out so that annotating an already
    /// applied line does not make it look new.
    pub fn canonical_line(&self) -> String {
        [
            collapse_whitespace(&self.description),
            collapse_whitespace(&self.symbol),
            self.transaction_date.format(DATE_FORMAT).to_string(),
            self.settlement_date.format(DATE_FORMAT).to_string(),
            collapse_whitespace(&self.account_currency),
            self.kind.code().to_string(),
            self.quantity.to_string(),
            collapse_whitespace(&self.currency),
            self.unit_price.to_string(),
            self.settlement_amount.to_string(),
        ]
        .join(",")
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint(self.canonical_line())
    }

    /// Short human label for logs: `BUY 100 FOO @ 04-Jul-2021`.
    pub fn label(&self) -> String {
        format!(
            "{} {} {} @ {}",
            self.kind,
            self.quantity,
            self.symbol,
            self.transaction_date.format(DATE_FORMAT)
        )
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

/// Processed-log key: the canonical line of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Rebuild a fingerprint from a stored processed-log line.
    ///
    /// Trailing `\r\n` and surrounding whitespace are ignored.
    pub fn from_line(line: &str) -> Self {
        Fingerprint(line.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 hex of the canonical line.  Stable identifier for sinks that
    /// want a compact key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(description: &str) -> Transaction {
        Transaction {
            description: description.to_string(),
            symbol: "FOO".to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2021, 7, 4).unwrap(),
            settlement_date: NaiveDate::from_ymd_opt(2021, 7, 6).unwrap(),
            account_currency: "CAD".to_string(),
            kind: TransactionKind::Buy,
            quantity: 200,
            currency: "CAD".to_string(),
            unit_price: Money::parse("10.000").unwrap(),
            settlement_amount: Money::parse("-2009.99").unwrap(),
            disambiguation_order: None,
        }
    }

    #[test]
    fn canonical_line_matches_processed_log_format() {
        assert_eq!(
            tx("FOO CORP      ").canonical_line(),
            "FOO CORP,FOO,04-Jul-2021,06-Jul-2021,CAD,BUY,200,CAD,10,-2009.99"
        );
    }

    #[test]
    fn fingerprint_ignores_source_whitespace() {
        assert_eq!(tx("FOO   CORP ").fingerprint(), tx(" FOO CORP").fingerprint());
        assert_ne!(tx("FOO CORP").fingerprint(), tx("BAR CORP").fingerprint());
    }

    #[test]
    fn fingerprint_ignores_disambiguation_order() {
        let mut ordered = tx("FOO CORP");
        ordered.disambiguation_order = Some(2);
        assert_eq!(ordered.fingerprint(), tx("FOO CORP").fingerprint());
    }

    #[test]
    fn fingerprint_from_stored_line_trims_line_ending() {
        let stored = "FOO CORP,FOO,04-Jul-2021,06-Jul-2021,CAD,BUY,200,CAD,10,-2009.99\r\n";
        assert_eq!(Fingerprint::from_line(stored), tx("FOO CORP").fingerprint());
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = tx("FOO CORP").fingerprint().digest();
        assert_eq!(d.len(), 64);
        assert_eq!(d, tx("FOO  CORP").fingerprint().digest());
    }

    #[test]
    fn kind_codes_roundtrip() {
        for code in ["BUY", "SELL", "CASH DIV", "REI"] {
            let kind = TransactionKind::from_code(code);
            assert!(kind.is_supported(), "{code}");
            assert_eq!(kind.code(), code);
        }
        assert_eq!(TransactionKind::from_code(" cash   div "), TransactionKind::CashDividend);
        let other = TransactionKind::from_code("TRANSFER");
        assert_eq!(other, TransactionKind::Other("TRANSFER".to_string()));
        assert!(!other.is_supported());
    }
}
