use std::fs;
use std::path::PathBuf;

use acb_ledger::{AmbiguityPolicy, StateError, StateManager, Transaction};
use acb_store::{FileCheckpoint, ReplayPaths};
use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::to_export_csv;

/// Temp directory holding `trades.csv`, `holdings.json` and their companions.
/// Removed on drop.
pub struct Workspace {
    dir: TempDir,
    pub paths: ReplayPaths,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp workspace")?;
        let paths = ReplayPaths::new(
            dir.path().join("trades.csv"),
            dir.path().join("holdings.json"),
            None,
        )?;
        Ok(Self { dir, paths })
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn write_export(&self, txs: &[Transaction]) -> Result<()> {
        fs::write(&self.paths.transactions_csv, to_export_csv(txs))
            .with_context(|| format!("write {:?}", self.paths.transactions_csv))
    }

    pub fn write_holdings_json(&self, json: &str) -> Result<()> {
        fs::write(&self.paths.holdings_json, json)
            .with_context(|| format!("write {:?}", self.paths.holdings_json))
    }

    pub fn read(&self, path: &std::path::Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    /// Decode the export and load the state manager from the files, as the
    /// CLI does on start-up.
    pub fn open_state(&self) -> Result<Result<StateManager<FileCheckpoint>, StateError>> {
        let txs = acb_ingest::parse_transactions_file(&self.paths.transactions_csv)?;
        let cp = FileCheckpoint::from_paths(&self.paths)?;
        let processed = cp.load_processed()?;
        let holdings = cp.load_holdings()?;
        Ok(StateManager::with_policy(
            txs,
            processed,
            holdings,
            cp,
            &AmbiguityPolicy::default(),
        ))
    }
}
