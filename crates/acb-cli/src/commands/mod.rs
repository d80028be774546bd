//! Command handlers for the `acb` binary.
//!
//! Shared start-up (config, paths, transactions, checkpoint) lives here so
//! `replay` and `ambiguities` see the same world.

pub mod inspect;
pub mod replay;

use std::path::PathBuf;

use acb_config::{LoadedConfig, ReplayConfig};
use acb_ledger::{AmbiguityGroup, StateManager, DATE_FORMAT};
use acb_store::{FileCheckpoint, ReplayPaths};
use anyhow::{Context, Result};
use tracing::info;

/// Everything loaded from disk before the first transaction is applied.
pub struct Loaded {
    pub config: LoadedConfig,
    pub replay: ReplayConfig,
    pub paths: ReplayPaths,
    pub state: StateManager<FileCheckpoint>,
}

pub fn load(config_paths: &[PathBuf]) -> Result<Loaded> {
    let config = acb_config::load_layered_yaml(config_paths)?;
    let replay = ReplayConfig::from_config_json(&config.config_json)?;
    let paths = ReplayPaths::new(
        &replay.paths.transactions_csv,
        &replay.paths.holdings_json,
        replay.paths.journal_jsonl.clone(),
    )?;

    let transactions = acb_ingest::parse_transactions_file(&paths.transactions_csv)
        .with_context(|| format!("decode transactions {:?}", paths.transactions_csv))?;
    let checkpoint = FileCheckpoint::from_paths(&paths)?;
    let processed = checkpoint.load_processed()?;
    let holdings = checkpoint.load_holdings()?;
    info!(
        config_hash = %config.config_hash,
        transactions = transactions.len(),
        processed = processed.len(),
        "replay inputs loaded"
    );

    let state = StateManager::with_policy(
        transactions,
        processed,
        holdings,
        checkpoint,
        &replay.policy(),
    )?;

    Ok(Loaded {
        config,
        replay,
        paths,
        state,
    })
}

/// One block per group: header line, then each member's canonical line.
pub fn render_ambiguities(groups: &[AmbiguityGroup]) -> String {
    let mut out = String::new();
    for g in groups {
        out.push_str(&format!(
            "ambiguity symbol={} date={} transactions={}\n",
            g.symbol,
            g.date.format(DATE_FORMAT),
            g.transactions.len()
        ));
        for t in &g.transactions {
            out.push_str(&format!("  {}\n", t.canonical_line()));
        }
    }
    out
}
