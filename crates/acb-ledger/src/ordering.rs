//! Deterministic transaction ordering.
//!
//! # Sort key
//!
//! `(transaction_date, symbol, disambiguation_order)` ascending, where a
//! defined `disambiguation_order` sorts before an undefined one.  Two
//! transactions that both lack an order compare equal; the sort is stable so
//! they keep their input order.
//!
//! The order alone does not prove that same-day trades were applied in the
//! right sequence.  That is what [`crate::ambiguity`] gates on.

use std::cmp::Ordering;

use crate::transaction::Transaction;

/// Total preorder over transactions used for replay.
pub fn compare_transactions(a: &Transaction, b: &Transaction) -> Ordering {
    let date = a.transaction_date.cmp(&b.transaction_date);
    if date != Ordering::Equal {
        return date;
    }
    let sym = a.symbol.cmp(&b.symbol);
    if sym != Ordering::Equal {
        return sym;
    }
    match (a.disambiguation_order, b.disambiguation_order) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(&y),
    }
}

/// Stable in-place sort by [`compare_transactions`].
pub fn sort_transactions(transactions: &mut [Transaction]) {
    transactions.sort_by(compare_transactions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::transaction::TransactionKind;
    use chrono::NaiveDate;

    fn tx(symbol: &str, day: u32, order: Option<u32>, memo: &str) -> Transaction {
        Transaction {
            description: memo.to_string(),
            symbol: symbol.to_string(),
            transaction_date: NaiveDate::from_ymd_opt(2021, 7, day).unwrap(),
            settlement_date: NaiveDate::from_ymd_opt(2021, 7, day + 2).unwrap(),
            account_currency: "CAD".into(),
            kind: TransactionKind::Buy,
            quantity: 100,
            currency: "CAD".into(),
            unit_price: Money::ZERO,
            settlement_amount: Money::ZERO,
            disambiguation_order: order,
        }
    }

    fn memos(txs: &[Transaction]) -> Vec<&str> {
        txs.iter().map(|t| t.description.as_str()).collect()
    }

    #[test]
    fn date_then_symbol_then_order() {
        let mut txs = vec![
            tx("FOO", 2, None, "a"),
            tx("FOO", 1, Some(2), "b"),
            tx("BAR", 1, None, "c"),
            tx("FOO", 1, Some(1), "d"),
        ];
        sort_transactions(&mut txs);
        assert_eq!(memos(&txs), ["c", "d", "b", "a"]);
    }

    #[test]
    fn defined_order_sorts_before_undefined() {
        let a = tx("FOO", 1, Some(9), "a");
        let b = tx("FOO", 1, None, "b");
        assert_eq!(compare_transactions(&a, &b), Ordering::Less);
        assert_eq!(compare_transactions(&b, &a), Ordering::Greater);
    }

    #[test]
    fn undefined_orders_keep_input_order() {
        let mut txs = vec![
            tx("FOO", 1, None, "first"),
            tx("FOO", 1, None, "second"),
            tx("FOO", 1, None, "third"),
        ];
        sort_transactions(&mut txs);
        assert_eq!(memos(&txs), ["first", "second", "third"]);
    }

    #[test]
    fn resorting_a_sorted_list_is_a_no_op() {
        let mut txs = vec![
            tx("ZED", 3, None, "a"),
            tx("FOO", 1, None, "b"),
            tx("FOO", 1, Some(1), "c"),
            tx("ABC", 3, Some(4), "d"),
            tx("FOO", 1, None, "e"),
        ];
        sort_transactions(&mut txs);
        let once = txs.clone();
        sort_transactions(&mut txs);
        assert_eq!(txs, once);
    }
}
