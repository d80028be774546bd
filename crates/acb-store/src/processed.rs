//! Append-only processed log.
//!
//! One canonical line per applied transaction, CRLF-terminated.  A line is
//! only considered written once `sync_data` returns.
//!
//! A crash mid-write can leave the last line without its terminator.  It
//! still loads (a complete fingerprint counts as processed, a torn prefix
//! matches nothing), and the next append terminates it first so the new
//! fingerprint gets a line of its own.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use acb_ledger::{Fingerprint, ProcessedSet};
use anyhow::{Context, Result};
use tracing::warn;

pub struct ProcessedLog {
    path: PathBuf,
}

impl ProcessedLog {
    /// Ensures parent dirs exist.  Does not create the file.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every stored fingerprint.  A missing file is an empty log.
    pub fn load(&self) -> Result<ProcessedSet> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(ProcessedSet::from_lines(content.lines())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProcessedSet::new()),
            Err(e) => Err(e).with_context(|| format!("read processed log {:?}", self.path)),
        }
    }

    pub fn append(&mut self, fingerprint: &Fingerprint) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open processed log {:?}", self.path))?;

        let mut buf = String::new();
        if !ends_with_newline(&mut f)
            .with_context(|| format!("read tail of processed log {:?}", self.path))?
        {
            warn!(path = %self.path.display(), "processed log has an unterminated last line");
            buf.push_str("\r\n");
        }
        buf.push_str(fingerprint.as_str());
        buf.push_str("\r\n");

        f.write_all(buf.as_bytes())
            .context("write processed line failed")?;
        f.sync_data().context("sync processed log failed")?;
        Ok(())
    }
}

/// `true` for an empty file or one whose last byte is `\n`.
fn ends_with_newline(f: &mut File) -> std::io::Result<bool> {
    let len = f.seek(SeekFrom::End(0))?;
    if len == 0 {
        return Ok(true);
    }
    f.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    f.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
