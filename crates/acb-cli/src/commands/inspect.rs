//! Read-only commands.

use std::path::{Path, PathBuf};

use acb_journal::VerifyResult;
use anyhow::{bail, Result};

use super::{load, render_ambiguities};

pub fn ambiguities(config_paths: &[PathBuf]) -> Result<()> {
    let loaded = load(config_paths)?;
    let groups = loaded.state.ambiguities();
    println!("ambiguity_groups={}", groups.len());
    print!("{}", render_ambiguities(groups));
    Ok(())
}

pub fn verify_journal(path: &Path) -> Result<()> {
    match acb_journal::verify_journal(path)? {
        VerifyResult::Valid { lines } => {
            println!("journal_valid=true lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("journal_valid=false line={line}");
            bail!("journal broken at line {line}: {reason}")
        }
    }
}
