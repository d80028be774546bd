//! acb-store
//!
//! Durable side of the replay checkpoint.  [`FileCheckpoint`] implements
//! [`acb_ledger::Checkpoint`] over a CRLF processed log and an atomically
//! replaced holdings snapshot.

mod holdings;
mod paths;
mod processed;

pub use holdings::HoldingsFile;
pub use paths::{backup_path, require_extension, ReplayPaths};
pub use processed::ProcessedLog;

use std::path::Path;

use acb_ledger::{BoxError, Checkpoint, Fingerprint, Holdings, ProcessedSet};
use anyhow::Result;

pub struct FileCheckpoint {
    processed: ProcessedLog,
    holdings: HoldingsFile,
}

impl FileCheckpoint {
    pub fn new(processed_log: impl AsRef<Path>, holdings_json: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            processed: ProcessedLog::new(processed_log)?,
            holdings: HoldingsFile::new(holdings_json),
        })
    }

    pub fn from_paths(paths: &ReplayPaths) -> Result<Self> {
        Self::new(&paths.processed_log, &paths.holdings_json)
    }

    pub fn load_processed(&self) -> Result<ProcessedSet> {
        self.processed.load()
    }

    pub fn load_holdings(&self) -> Result<Holdings> {
        self.holdings.load()
    }
}

impl Checkpoint for FileCheckpoint {
    fn append_processed(&mut self, fingerprint: &Fingerprint) -> Result<(), BoxError> {
        self.processed.append(fingerprint).map_err(Into::into)
    }

    fn save_holdings(&mut self, holdings: &Holdings) -> Result<(), BoxError> {
        self.holdings.save(holdings).map_err(Into::into)
    }
}
