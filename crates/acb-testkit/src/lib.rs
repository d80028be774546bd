//! acb-testkit
//!
//! Fixtures for replay scenarios.  Used ONLY by tests.
//! - [`tx`] builds a transaction with deterministic defaults
//! - [`RecordingSink`] is an idempotent in-memory ledger
//! - [`FailingSink`] rejects entries on demand
//! - [`Workspace`] is a temp directory with the replay file layout

mod sink;
mod workspace;

pub use sink::{FailingSink, RecordingSink};
pub use workspace::Workspace;

use acb_ledger::{Money, Transaction, TransactionKind};
use chrono::NaiveDate;

/// Parse `DD-Mon-YYYY`; panics on bad input (fixtures only).
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, acb_ledger::DATE_FORMAT)
        .unwrap_or_else(|_| panic!("bad fixture date {s}"))
}

/// Parse a decimal amount; panics on bad input (fixtures only).
pub fn money(s: &str) -> Money {
    Money::parse(s).unwrap_or_else(|e| panic!("bad fixture amount {s}: {e}"))
}

/// Transaction with `"{symbol} CORP"` description, CAD currencies,
/// settlement two days after `trade_date`, and unit price
/// `|settlement| / |qty|` rounded to cents (zero when `qty` is zero).
pub fn tx(kind: &str, symbol: &str, trade_date: &str, qty: i64, settlement: &str) -> Transaction {
    let transaction_date = date(trade_date);
    let settlement_amount = money(settlement);
    let unit_price = if qty == 0 {
        Money::ZERO
    } else {
        settlement_amount
            .abs()
            .mul_div_round_cents(1, qty.abs())
            .unwrap_or(Money::ZERO)
    };
    Transaction {
        description: format!("{symbol} CORP"),
        symbol: symbol.to_string(),
        transaction_date,
        settlement_date: transaction_date + chrono::Days::new(2),
        account_currency: "CAD".to_string(),
        kind: TransactionKind::from_code(kind),
        quantity: qty,
        currency: "CAD".to_string(),
        unit_price,
        settlement_amount,
        disambiguation_order: None,
    }
}

/// Cash dividend on `shares` shares with a memo the processor can read.
pub fn dividend(symbol: &str, trade_date: &str, shares: i64, amount: &str) -> Transaction {
    let mut t = tx("CASH DIV", symbol, trade_date, 0, amount);
    t.description = format!(
        "{symbol} CORP CASH DIV  ON     {shares} SHS REC 06/01/21 PAY 06/28/21"
    );
    t
}

/// Same transaction with a disambiguation order.
pub fn ordered(mut t: Transaction, order: u32) -> Transaction {
    t.disambiguation_order = Some(order);
    t
}

/// Render transactions as a brokerage export with an `Order` column.
pub fn to_export_csv(txs: &[Transaction]) -> String {
    let mut out = format!("{},{}\r\n", acb_ingest::STANDARD_HEADER, acb_ingest::ORDER_COLUMN);
    for t in txs {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},\r\n",
            t.description,
            t.symbol,
            t.transaction_date.format(acb_ledger::DATE_FORMAT),
            t.settlement_date.format(acb_ledger::DATE_FORMAT),
            t.account_currency,
            t.kind,
            t.quantity,
            t.currency,
            t.unit_price,
            t.settlement_amount,
            t.disambiguation_order.map(|o| o.to_string()).unwrap_or_default(),
        ));
    }
    out
}
