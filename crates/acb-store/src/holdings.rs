//! Holdings snapshot: `{"SYM": {"acb": 2009.99, "qty": 200}, ...}`.
//!
//! Saves are atomic (temp file in the same directory, fsync, rename).  The
//! first save of a run copies the previous snapshot to
//! `<stem>.<unix_millis>.json` before overwriting it.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use acb_ledger::Holdings;
use anyhow::{Context, Result};
use chrono::Utc;
use tempfile::NamedTempFile;
use tracing::info;

use crate::paths::backup_path;

pub struct HoldingsFile {
    path: PathBuf,
    backed_up: bool,
}

impl HoldingsFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            backed_up: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing or blank file is an empty mapping.
    pub fn load(&self) -> Result<Holdings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Holdings::new()),
            Err(e) => return Err(e).with_context(|| format!("read holdings {:?}", self.path)),
        };
        if content.trim().is_empty() {
            return Ok(Holdings::new());
        }
        serde_json::from_str(&content).with_context(|| format!("parse holdings {:?}", self.path))
    }

    pub fn save(&mut self, holdings: &Holdings) -> Result<()> {
        if !self.backed_up {
            self.backup()?;
            self.backed_up = true;
        }

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).with_context(|| format!("create_dir_all {:?}", dir))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {:?}", dir))?;
        serde_json::to_writer_pretty(&mut tmp, holdings).context("serialize holdings failed")?;
        tmp.write_all(b"\n").context("write holdings failed")?;
        tmp.as_file().sync_all().context("sync holdings failed")?;
        tmp.persist(&self.path)
            .with_context(|| format!("replace holdings {:?}", self.path))?;
        Ok(())
    }

    /// Copy the current snapshot aside.  Nothing to do if there is none.
    fn backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let target = backup_path(&self.path, Utc::now().timestamp_millis())?;
        fs::copy(&self.path, &target)
            .with_context(|| format!("backup holdings {:?} -> {:?}", self.path, target))?;
        info!(backup = %target.display(), "holdings backed up");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acb_ledger::{Holding, Money};

    fn backups(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy().to_string();
                name.starts_with("holdings.") && name != "holdings.json"
            })
            .collect()
    }

    #[test]
    fn missing_and_blank_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        assert!(HoldingsFile::new(&path).load().unwrap().is_empty());

        fs::write(&path, "  \n").unwrap();
        assert!(HoldingsFile::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn reads_documented_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        fs::write(&path, r#"{"FOO":{"acb":1009.99,"qty":100},"BAR":{"acb":"2009.99","qty":200}}"#)
            .unwrap();

        let h = HoldingsFile::new(&path).load().unwrap();
        assert_eq!(h["FOO"], Holding::new(Money::from_cents(100_999), 100));
        assert_eq!(h["BAR"], Holding::new(Money::from_cents(200_999), 200));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        let mut file = HoldingsFile::new(&path);

        let mut h = Holdings::new();
        h.insert("FOO".into(), Holding::new(Money::from_cents(301_998), 300));
        file.save(&h).unwrap();

        assert_eq!(file.load().unwrap(), h);
        let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["FOO"]["acb"], serde_json::json!(3019.98));
        assert_eq!(v["FOO"]["qty"], serde_json::json!(300));
    }

    #[test]
    fn first_save_backs_up_existing_snapshot_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holdings.json");
        let original = r#"{"FOO":{"acb":1,"qty":1}}"#;
        fs::write(&path, original).unwrap();

        let mut file = HoldingsFile::new(&path);
        file.save(&Holdings::new()).unwrap();
        file.save(&Holdings::new()).unwrap();

        let found = backups(dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(fs::read_to_string(&found[0]).unwrap(), original);
    }

    #[test]
    fn no_backup_without_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = HoldingsFile::new(dir.path().join("holdings.json"));
        file.save(&Holdings::new()).unwrap();
        assert!(backups(dir.path()).is_empty());
    }
}
