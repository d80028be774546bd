//! Typed replay settings.
//!
//! ```yaml
//! accounts:
//!   cash: "Brokerage Cash"
//!   equities: "Brokerage Equities"
//!   realized_gains: "Realized Gains/Losses"   # optional
//!   dividend_income: "Dividend Income"        # optional
//! paths:
//!   transactions_csv: data/trades.csv
//!   holdings_json: data/holdings.json
//!   journal_jsonl: data/trades.journal.jsonl  # optional
//! replay:
//!   batch_size: 0       # 0 = no limit
//!   hash_chain: true
//! ambiguity:
//!   order_sensitive_kinds: [BUY, SELL]
//! ```
//!
//! `ACB_CASH_ACCOUNT`, `ACB_EQUITIES_ACCOUNT` and `ACB_BATCH_SIZE` override
//! the file values when set.  Overrides do not enter the config hash.

use std::path::PathBuf;

use acb_ledger::{
    AccountNames, AmbiguityPolicy, DEFAULT_DIVIDEND_INCOME_ACCOUNT, DEFAULT_REALIZED_GAINS_ACCOUNT,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENV_CASH_ACCOUNT: &str = "ACB_CASH_ACCOUNT";
pub const ENV_EQUITIES_ACCOUNT: &str = "ACB_EQUITIES_ACCOUNT";
pub const ENV_BATCH_SIZE: &str = "ACB_BATCH_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub accounts: AccountsConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub replay: ReplaySection,
    #[serde(default)]
    pub ambiguity: AmbiguityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsConfig {
    pub cash: String,
    pub equities: String,
    #[serde(default = "default_realized_gains")]
    pub realized_gains: String,
    #[serde(default = "default_dividend_income")]
    pub dividend_income: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    pub transactions_csv: PathBuf,
    pub holdings_json: PathBuf,
    #[serde(default)]
    pub journal_jsonl: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySection {
    #[serde(default)]
    pub batch_size: usize,
    #[serde(default = "default_true")]
    pub hash_chain: bool,
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            batch_size: 0,
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguityConfig {
    #[serde(default = "default_order_sensitive_kinds")]
    pub order_sensitive_kinds: Vec<String>,
}

impl Default for AmbiguityConfig {
    fn default() -> Self {
        Self {
            order_sensitive_kinds: default_order_sensitive_kinds(),
        }
    }
}

fn default_realized_gains() -> String {
    DEFAULT_REALIZED_GAINS_ACCOUNT.to_string()
}

fn default_dividend_income() -> String {
    DEFAULT_DIVIDEND_INCOME_ACCOUNT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_order_sensitive_kinds() -> Vec<String> {
    vec!["BUY".to_string(), "SELL".to_string()]
}

impl ReplayConfig {
    /// Typed view of the merged config, process environment applied.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        Self::from_config_json_with_env(config_json, |k| std::env::var(k).ok())
    }

    /// Same as [`Self::from_config_json`] with an explicit variable lookup.
    pub fn from_config_json_with_env<F>(config_json: &Value, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut v = config_json.clone();
        if let Some(cash) = env(ENV_CASH_ACCOUNT) {
            set_pointer(&mut v, &["accounts", "cash"], Value::String(cash));
        }
        if let Some(eq) = env(ENV_EQUITIES_ACCOUNT) {
            set_pointer(&mut v, &["accounts", "equities"], Value::String(eq));
        }
        if let Some(raw) = env(ENV_BATCH_SIZE) {
            let n: usize = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_BATCH_SIZE} must be a non-negative integer, got '{raw}'"))?;
            set_pointer(&mut v, &["replay", "batch_size"], Value::from(n));
        }

        let cfg: ReplayConfig =
            serde_json::from_value(v).context("config does not match the replay schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let a = &self.accounts;
        for (key, name) in [
            ("accounts.cash", &a.cash),
            ("accounts.equities", &a.equities),
            ("accounts.realized_gains", &a.realized_gains),
            ("accounts.dividend_income", &a.dividend_income),
        ] {
            if name.trim().is_empty() {
                bail!("{key} must not be empty");
            }
        }
        if self.ambiguity.order_sensitive_kinds.is_empty() {
            bail!("ambiguity.order_sensitive_kinds must name at least one kind");
        }
        for kind in self.policy().kinds() {
            if !kind.is_supported() {
                bail!("ambiguity.order_sensitive_kinds: unknown kind '{kind}'");
            }
        }
        Ok(())
    }

    pub fn account_names(&self) -> AccountNames {
        AccountNames {
            cash: self.accounts.cash.clone(),
            equities: self.accounts.equities.clone(),
            realized_gains: self.accounts.realized_gains.clone(),
            dividend_income: self.accounts.dividend_income.clone(),
        }
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        AmbiguityPolicy::from_codes(&self.ambiguity.order_sensitive_kinds)
    }

    /// `None` when unlimited.
    pub fn batch_limit(&self) -> Option<usize> {
        match self.replay.batch_size {
            0 => None,
            n => Some(n),
        }
    }
}

/// Create intermediate objects as needed.  Non-object parents are replaced.
fn set_pointer(root: &mut Value, path: &[&str], leaf: Value) {
    match path.split_first() {
        None => *root = leaf,
        Some((head, rest)) => {
            if !root.is_object() {
                *root = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = root {
                let child = map.entry(head.to_string()).or_insert(Value::Null);
                set_pointer(child, rest, leaf);
            }
        }
    }
}
