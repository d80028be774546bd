use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Position snapshot for one symbol.
///
/// Serialized as `{ "acb": 1009.99, "qty": 100 }`, the holdings file schema.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    /// Book value of the shares currently held.
    #[serde(rename = "acb")]
    pub adjusted_cost_base: Money,
    #[serde(rename = "qty")]
    pub quantity: i64,
}

impl Holding {
    /// Zero/zero holding for a symbol seen for the first time.
    pub const EMPTY: Holding = Holding {
        adjusted_cost_base: Money::ZERO,
        quantity: 0,
    };

    pub fn new(adjusted_cost_base: Money, quantity: i64) -> Self {
        Self {
            adjusted_cost_base,
            quantity,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }
}

/// Symbol -> holding.  `BTreeMap` keeps the persisted snapshot ordered.
pub type Holdings = BTreeMap<String, Holding>;

/// Current holding for `symbol`, defaulting to [`Holding::EMPTY`].
pub fn holding_for(holdings: &Holdings, symbol: &str) -> Holding {
    holdings.get(symbol).copied().unwrap_or(Holding::EMPTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_schema_matches_holdings_file() {
        let mut holdings = Holdings::new();
        holdings.insert("FOO".into(), Holding::new(Money::from_cents(100_999), 100));
        let json = serde_json::to_string(&holdings).unwrap();
        assert_eq!(json, r#"{"FOO":{"acb":1009.99,"qty":100}}"#);

        let back: Holdings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, holdings);
    }

    #[test]
    fn unknown_symbol_defaults_to_empty() {
        let holdings = Holdings::new();
        assert_eq!(holding_for(&holdings, "BAR"), Holding::EMPTY);
        assert!(Holding::EMPTY.is_flat());
    }
}
