//! File naming for one replay workspace.
//!
//! Given `trades.csv` and `holdings.json`:
//! - processed log: `trades.processed.csv` next to the CSV
//! - journal: `trades.journal.jsonl` next to the CSV (unless overridden)
//! - holdings backup: `holdings.<unix_millis>.json` next to the snapshot

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Every path a replay touches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayPaths {
    pub transactions_csv: PathBuf,
    pub holdings_json: PathBuf,
    pub processed_log: PathBuf,
    pub journal_jsonl: PathBuf,
}

impl ReplayPaths {
    /// Validate extensions and derive the companion paths.
    pub fn new(
        transactions_csv: impl Into<PathBuf>,
        holdings_json: impl Into<PathBuf>,
        journal_jsonl: Option<PathBuf>,
    ) -> Result<Self> {
        let transactions_csv = transactions_csv.into();
        let holdings_json = holdings_json.into();
        require_extension(&transactions_csv, "csv")?;
        require_extension(&holdings_json, "json")?;

        let processed_log = sibling_with_suffix(&transactions_csv, "processed.csv")?;
        let journal_jsonl = match journal_jsonl {
            Some(p) => p,
            None => sibling_with_suffix(&transactions_csv, "journal.jsonl")?,
        };

        Ok(Self {
            transactions_csv,
            holdings_json,
            processed_log,
            journal_jsonl,
        })
    }
}

/// Fail unless `path` ends in `.{ext}` (case-insensitive).
pub fn require_extension(path: &Path, ext: &str) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(e) if e.eq_ignore_ascii_case(ext) => Ok(()),
        _ => bail!("{} must have a .{} extension", path.display(), ext),
    }
}

/// `<dir>/<stem>.<millis>.json` for a holdings snapshot at `path`.
pub fn backup_path(path: &Path, unix_millis: i64) -> Result<PathBuf> {
    sibling_with_suffix(path, &format!("{unix_millis}.json"))
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .with_context(|| format!("{} has no usable file name", path.display()))?;
    Ok(path.with_file_name(format!("{stem}.{suffix}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_companion_paths() {
        let p = ReplayPaths::new("data/trades.csv", "data/holdings.json", None).unwrap();
        assert_eq!(p.processed_log, PathBuf::from("data/trades.processed.csv"));
        assert_eq!(p.journal_jsonl, PathBuf::from("data/trades.journal.jsonl"));
    }

    #[test]
    fn journal_override_wins() {
        let p = ReplayPaths::new("t.csv", "h.json", Some("out/j.jsonl".into())).unwrap();
        assert_eq!(p.journal_jsonl, PathBuf::from("out/j.jsonl"));
    }

    #[test]
    fn rejects_wrong_extensions() {
        assert!(ReplayPaths::new("trades.txt", "h.json", None).is_err());
        assert!(ReplayPaths::new("trades.csv", "h.yaml", None).is_err());
        assert!(ReplayPaths::new("trades", "h.json", None).is_err());
        assert!(ReplayPaths::new("TRADES.CSV", "H.JSON", None).is_ok());
    }

    #[test]
    fn backup_name_carries_timestamp() {
        let b = backup_path(Path::new("/x/holdings.json"), 1_625_400_000_123).unwrap();
        assert_eq!(b, PathBuf::from("/x/holdings.1625400000123.json"));
    }
}
