use std::path::PathBuf;

use acb_config::{report_unused_keys, UnusedKeyPolicy};
use acb_journal::JournalWriter;
use acb_ledger::{replay, CostBasisProcessor};
use anyhow::{bail, Result};
use tracing::{error, warn};

use super::{load, render_ambiguities, Loaded};

pub fn run(config_paths: &[PathBuf], batch_size: Option<usize>, strict_keys: bool) -> Result<()> {
    let Loaded {
        config,
        replay: cfg,
        paths,
        mut state,
    } = load(config_paths)?;

    let policy = if strict_keys {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&config.config_json, policy)?;
    for key in &report.unused_keys {
        warn!(key = %key, "config key is not used");
    }

    if !state.ambiguities().is_empty() {
        eprint!("{}", render_ambiguities(state.ambiguities()));
        bail!(
            "resolve {} same-day ambiguity group(s) by adding Order values to {}",
            state.ambiguities().len(),
            paths.transactions_csv.display()
        );
    }

    let limit = match batch_size {
        Some(0) => None,
        Some(n) => Some(n),
        None => cfg.batch_limit(),
    };

    let processor = CostBasisProcessor::new(cfg.account_names());
    let mut journal = JournalWriter::open(&paths.journal_jsonl, cfg.replay.hash_chain)?;
    let summary = match replay(&mut state, &processor, &mut journal, limit) {
        Ok(summary) => summary,
        Err(e) => {
            if state.has_unsaved_holdings() {
                if let Err(retry) = state.flush_holdings() {
                    error!(
                        holdings = %paths.holdings_json.display(),
                        error = %retry,
                        "holdings snapshot is behind the processed log; restore it before the next run"
                    );
                }
            }
            return Err(e.into());
        }
    };

    println!("config_hash={}", config.config_hash);
    println!("applied={}", summary.applied);
    println!("holdings_changed={}", summary.holdings_changed);
    println!("remaining={}", state.remaining());
    println!("exhausted={}", summary.exhausted);
    println!("journal={}", paths.journal_jsonl.display());
    Ok(())
}
