//! acb-ingest
//!
//! Decodes the brokerage transaction export into [`Transaction`] values.
//!
//! ## Column contract (exact names, any order)
//!
//! | Column              | Example        | Notes                               |
//! |---------------------|----------------|-------------------------------------|
//! | `Description`       | `ACME CORP`    | Padded in the export; trimmed       |
//! | `Symbol`            | `ACME`         |                                     |
//! | `Transaction Date`  | `28-Jun-2021`  | `DD-Mon-YYYY`                       |
//! | `Settlement Date`   | `30-Jun-2021`  | `DD-Mon-YYYY`                       |
//! | `Account Currency`  | `CAD`          |                                     |
//! | `Type`              | `BUY`          | `BUY`, `SELL`, `CASH DIV`, `REI`    |
//! | `Quantity`          | `200.00`       | Must be a whole number              |
//! | `Currency of Price` | `CAD`          |                                     |
//! | `Price`             | `10.000`       | Decimal, up to 6 places             |
//! | `Settlement Amount` | `-2009.99`     | Decimal, up to 6 places             |
//! | `Order`             | `1`            | Optional column; blank = unknown    |
//!
//! Unknown, missing or repeated columns reject the whole file.  The export
//! appends a trailing comma to data rows; empty trailing fields are ignored.
//! Unknown `Type` codes are kept (as `TransactionKind::Other`) so the replay
//! engine can reject the batch naming the offending row.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;

use acb_ledger::{Money, Transaction, TransactionKind, DATE_FORMAT};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

/// Header line written by the brokerage export.
pub const STANDARD_HEADER: &str = "Description,Symbol,Transaction Date,Settlement Date,Account Currency,Type,Quantity,Currency of Price,Price,Settlement Amount";

/// Optional operator-added column holding the same-day tie-breaker.
pub const ORDER_COLUMN: &str = "Order";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CsvIngestError {
    /// An I/O or CSV-library error.
    Io(String),
    /// No header line.
    Empty,
    UnexpectedColumn(String),
    MissingHeader(String),
    DuplicateColumn(String),
    /// A record field could not be parsed into the expected type.
    ParseField {
        row: u64,
        field: &'static str,
        raw: String,
    },
    /// Non-empty value past the last header column.
    ExtraField { row: u64, raw: String },
    /// Two transactions of one symbol on one day share an `Order` value.
    DuplicateOrder {
        row: u64,
        symbol: String,
        date: NaiveDate,
        order: u32,
    },
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "csv io error: {msg}"),
            Self::Empty => write!(f, "input is empty"),
            Self::UnexpectedColumn(col) => write!(f, "unexpected column '{col}'"),
            Self::MissingHeader(col) => write!(f, "missing column '{col}'"),
            Self::DuplicateColumn(col) => write!(f, "column '{col}' appears more than once"),
            Self::ParseField { row, field, raw } => {
                write!(f, "csv line {row}: cannot parse field '{field}' from value '{raw}'")
            }
            Self::ExtraField { row, raw } => {
                write!(f, "csv line {row}: unexpected value '{raw}' past the last column")
            }
            Self::DuplicateOrder {
                row,
                symbol,
                date,
                order,
            } => write!(
                f,
                "csv line {row}: order {order} already used for {symbol} on {}",
                date.format(DATE_FORMAT)
            ),
        }
    }
}

impl std::error::Error for CsvIngestError {}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Column {
    Description,
    Symbol,
    TransactionDate,
    SettlementDate,
    AccountCurrency,
    Type,
    Quantity,
    CurrencyOfPrice,
    Price,
    SettlementAmount,
    Order,
}

impl Column {
    const REQUIRED: [Column; 10] = [
        Column::Description,
        Column::Symbol,
        Column::TransactionDate,
        Column::SettlementDate,
        Column::AccountCurrency,
        Column::Type,
        Column::Quantity,
        Column::CurrencyOfPrice,
        Column::Price,
        Column::SettlementAmount,
    ];

    fn name(self) -> &'static str {
        match self {
            Column::Description => "Description",
            Column::Symbol => "Symbol",
            Column::TransactionDate => "Transaction Date",
            Column::SettlementDate => "Settlement Date",
            Column::AccountCurrency => "Account Currency",
            Column::Type => "Type",
            Column::Quantity => "Quantity",
            Column::CurrencyOfPrice => "Currency of Price",
            Column::Price => "Price",
            Column::SettlementAmount => "Settlement Amount",
            Column::Order => ORDER_COLUMN,
        }
    }

    fn from_name(name: &str) -> Option<Column> {
        Column::REQUIRED
            .into_iter()
            .chain([Column::Order])
            .find(|c| c.name() == name)
    }
}

fn build_col_index(header: &StringRecord) -> Result<HashMap<Column, usize>, CsvIngestError> {
    let mut idx = HashMap::new();
    for (i, name) in header.iter().enumerate() {
        let col = Column::from_name(name)
            .ok_or_else(|| CsvIngestError::UnexpectedColumn(name.to_string()))?;
        if idx.insert(col, i).is_some() {
            return Err(CsvIngestError::DuplicateColumn(name.to_string()));
        }
    }
    for col in Column::REQUIRED {
        if !idx.contains_key(&col) {
            return Err(CsvIngestError::MissingHeader(col.name().to_string()));
        }
    }
    Ok(idx)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn parse_transactions_file(path: &Path) -> Result<Vec<Transaction>, CsvIngestError> {
    let file = std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))?;
    parse_transactions_reader(file)
}

/// Parse CSV from a string slice.  See the module docs for the contract.
pub fn parse_transactions_str(src: &str) -> Result<Vec<Transaction>, CsvIngestError> {
    parse_transactions_reader(src.as_bytes())
}

pub fn parse_transactions_reader<R: Read>(rdr: R) -> Result<Vec<Transaction>, CsvIngestError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(rdr);

    let mut records = rdr.records();
    let header = match records.next() {
        Some(rec) => rec.map_err(|e| CsvIngestError::Io(e.to_string()))?,
        None => return Err(CsvIngestError::Empty),
    };
    if header.iter().all(str::is_empty) {
        return Err(CsvIngestError::Empty);
    }
    let cols = build_col_index(&header)?;

    let mut out = Vec::new();
    let mut orders: HashSet<(String, NaiveDate, u32)> = HashSet::new();

    for rec in records {
        let rec = rec.map_err(|e| CsvIngestError::Io(e.to_string()))?;
        let row = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.iter().all(str::is_empty) {
            continue;
        }
        if let Some(extra) = rec.iter().skip(header.len()).find(|v| !v.is_empty()) {
            return Err(CsvIngestError::ExtraField {
                row,
                raw: extra.to_string(),
            });
        }

        let tx = decode_row(&rec, &cols, row)?;
        if let Some(order) = tx.disambiguation_order {
            let key = (tx.symbol.clone(), tx.transaction_date, order);
            if !orders.insert(key) {
                return Err(CsvIngestError::DuplicateOrder {
                    row,
                    symbol: tx.symbol,
                    date: tx.transaction_date,
                    order,
                });
            }
        }
        out.push(tx);
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn decode_row(
    rec: &StringRecord,
    cols: &HashMap<Column, usize>,
    row: u64,
) -> Result<Transaction, CsvIngestError> {
    let get = |col: Column| cols.get(&col).and_then(|&i| rec.get(i)).unwrap_or("");

    let date = |col: Column| -> Result<NaiveDate, CsvIngestError> {
        let raw = get(col);
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| parse_err(row, col, raw))
    };
    let money = |col: Column| -> Result<Money, CsvIngestError> {
        let raw = get(col);
        Money::parse(raw).map_err(|_| parse_err(row, col, raw))
    };

    let quantity = {
        let raw = get(Column::Quantity);
        let q = Money::parse(raw).map_err(|_| parse_err(row, Column::Quantity, raw))?;
        if !q.is_whole() {
            return Err(parse_err(row, Column::Quantity, raw));
        }
        q.whole_units()
    };

    let disambiguation_order = match get(Column::Order) {
        "" => None,
        raw => Some(
            raw.parse::<u32>()
                .map_err(|_| parse_err(row, Column::Order, raw))?,
        ),
    };

    Ok(Transaction {
        description: get(Column::Description).to_string(),
        symbol: get(Column::Symbol).to_string(),
        transaction_date: date(Column::TransactionDate)?,
        settlement_date: date(Column::SettlementDate)?,
        account_currency: get(Column::AccountCurrency).to_string(),
        kind: TransactionKind::from_code(get(Column::Type)),
        quantity,
        currency: get(Column::CurrencyOfPrice).to_string(),
        unit_price: money(Column::Price)?,
        settlement_amount: money(Column::SettlementAmount)?,
        disambiguation_order,
    })
}

fn parse_err(row: u64, col: Column, raw: &str) -> CsvIngestError {
    CsvIngestError::ParseField {
        row,
        field: col.name(),
        raw: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv(rows: &[&str]) -> String {
        let mut s = STANDARD_HEADER.to_string();
        for r in rows {
            s.push('\n');
            s.push_str(r);
        }
        s
    }

    #[test]
    fn recognizes_every_kind() {
        let cases = [
            (TransactionKind::Buy, "ACME CORP      ,ACME,28-Jun-2021,30-Jun-2021,CAD,BUY,200.00,CAD,10.000,-2009.99,"),
            (TransactionKind::Sell, "ACME CORP      ,ACME,28-Jun-2021,30-Jun-2021,CAD,SELL,200.00,CAD,10.000,1990.01,"),
            (TransactionKind::CashDividend, "ACME CORP CASH DIV  ON     200 SHS REC 06/01/21 PAY 06/28/21      ,ACME,28-Jun-2021,30-Jun-2021,CAD,CASH DIV,0.00,CAD,0.000,2.50,"),
            (TransactionKind::Held, "ACME CORP FUNDS HELD FOR REINVESTMENT      ,ACME,28-Jun-2021,30-Jun-2021,CAD,REI,0.00,CAD,0.000,-2.50,"),
        ];
        for (kind, line) in cases {
            let txs = parse_transactions_str(&csv(&[line])).unwrap();
            assert_eq!(txs.len(), 1);
            assert_eq!(txs[0].kind, kind);
        }
    }

    #[test]
    fn parses_fields() {
        let txs = parse_transactions_str(&csv(&[
            "ACME CORP      ,ACME,28-Jun-2021,30-Jun-2021,CAD,BUY,200.00,CAD,10.000,-2009.99,",
            "ACME CORP      ,ACME,28-Jun-2021,30-Jun-2021,CAD,SELL,200.00,CAD,10.000,1990.01,",
        ]))
        .unwrap();
        assert_eq!(txs.len(), 2);

        let t = &txs[0];
        assert_eq!(t.description, "ACME CORP");
        assert_eq!(t.symbol, "ACME");
        assert_eq!(t.transaction_date, NaiveDate::from_ymd_opt(2021, 6, 28).unwrap());
        assert_eq!(t.settlement_date, NaiveDate::from_ymd_opt(2021, 6, 30).unwrap());
        assert_eq!(t.account_currency, "CAD");
        assert_eq!(t.quantity, 200);
        assert_eq!(t.currency, "CAD");
        assert_eq!(t.unit_price, Money::from_cents(1_000));
        assert_eq!(t.settlement_amount, Money::from_cents(-200_999));
        assert_eq!(t.disambiguation_order, None);
        assert_eq!(txs[1].settlement_amount, Money::from_cents(199_001));
    }

    #[test]
    fn unknown_column_is_fatal() {
        let src = "Description,Symbol,Transaction Date,Foo,Settlement Date,Account Currency,Type,Quantity,Currency of Price,Price,Settlement Amount\nACME CORP      ,ACME,28-Jun-2021,Bar,30-Jun-2021,CAD,SELL,200.00,CAD,10.000,1990.01,";
        let err = parse_transactions_str(src).unwrap_err();
        assert!(matches!(err, CsvIngestError::UnexpectedColumn(ref c) if c == "Foo"));
    }

    #[test]
    fn missing_column_is_fatal() {
        let src = "Description,Symbol,Settlement Date,Account Currency,Type,Quantity,Currency of Price,Price,Settlement Amount\nACME CORP      ,ACME,30-Jun-2021,CAD,SELL,200.00,CAD,10.000,1990.01,";
        let err = parse_transactions_str(src).unwrap_err();
        assert_eq!(err.to_string(), "missing column 'Transaction Date'");
    }

    #[test]
    fn empty_input_is_fatal() {
        assert!(matches!(parse_transactions_str(""), Err(CsvIngestError::Empty)));
        assert!(matches!(parse_transactions_str("\n\n"), Err(CsvIngestError::Empty)));
    }

    #[test]
    fn header_only_is_an_empty_batch() {
        assert!(parse_transactions_str(STANDARD_HEADER).unwrap().is_empty());
    }

    #[test]
    fn order_column_is_optional_and_read() {
        let src = format!(
            "{STANDARD_HEADER},Order\nA,FOO,01-Jul-2021,03-Jul-2021,CAD,BUY,1,CAD,1,-1,2\nB,FOO,01-Jul-2021,03-Jul-2021,CAD,SELL,1,CAD,1,1,\n"
        );
        let txs = parse_transactions_str(&src).unwrap();
        assert_eq!(txs[0].disambiguation_order, Some(2));
        assert_eq!(txs[1].disambiguation_order, None);
    }

    #[test]
    fn duplicate_order_for_same_symbol_and_day_is_rejected() {
        let src = format!(
            "{STANDARD_HEADER},Order\nA,FOO,01-Jul-2021,03-Jul-2021,CAD,BUY,1,CAD,1,-1,1\nB,FOO,01-Jul-2021,03-Jul-2021,CAD,SELL,1,CAD,1,1,1\n"
        );
        let err = parse_transactions_str(&src).unwrap_err();
        assert!(matches!(err, CsvIngestError::DuplicateOrder { row: 3, order: 1, .. }));
    }

    #[test]
    fn fractional_quantity_is_rejected() {
        let err = parse_transactions_str(&csv(&["A,FOO,01-Jul-2021,03-Jul-2021,CAD,BUY,1.5,CAD,1,-1,"]))
            .unwrap_err();
        assert!(matches!(err, CsvIngestError::ParseField { row: 2, field: "Quantity", .. }));
    }

    #[test]
    fn bad_date_names_the_field() {
        let err = parse_transactions_str(&csv(&["A,FOO,2021-07-01,03-Jul-2021,CAD,BUY,1,CAD,1,-1,"]))
            .unwrap_err();
        assert!(matches!(err, CsvIngestError::ParseField { field: "Transaction Date", .. }));
    }

    #[test]
    fn unknown_type_is_kept_for_the_engine_to_reject() {
        let txs = parse_transactions_str(&csv(&["A,FOO,01-Jul-2021,03-Jul-2021,CAD,TRANSFER,0,CAD,0,0,"]))
            .unwrap();
        assert_eq!(txs[0].kind, TransactionKind::Other("TRANSFER".into()));
    }

    #[test]
    fn non_empty_extra_value_is_rejected() {
        let err = parse_transactions_str(&csv(&["A,FOO,01-Jul-2021,03-Jul-2021,CAD,BUY,1,CAD,1,-1,oops"]))
            .unwrap_err();
        assert!(matches!(err, CsvIngestError::ExtraField { .. }));
    }
}
