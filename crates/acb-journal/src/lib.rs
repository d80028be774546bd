//! acb-journal
//!
//! File-backed [`LedgerSink`].  Every accepted ledger entry becomes one JSON
//! line with sorted keys.  With the hash chain on, each record carries
//! `hash_prev` (previous record's `hash_self`) and `hash_self` (SHA-256 of
//! the record's canonical JSON with `hash_self` cleared).
//!
//! Entry ids are UUID v5 over the source transaction's digest and the entry
//! content, so re-posting the same entry after a crash is detected and
//! skipped instead of written twice.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use acb_ledger::{Fingerprint, LedgerEntry, LedgerSink, SinkError};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalRecord {
    pub entry_id: Uuid,
    /// Position in the file, starting at 0.
    pub seq: u64,
    pub recorded_at_utc: DateTime<Utc>,
    /// Canonical line of the transaction that produced the entry.
    pub source: String,
    pub entry: LedgerEntry,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

pub struct JournalWriter {
    path: PathBuf,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
    seen: HashSet<Uuid>,
}

impl JournalWriter {
    /// Open (or prepare to create) a journal, resuming chain state from any
    /// records already in the file.
    pub fn open(path: impl AsRef<Path>, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("create_dir_all {:?}", parent))?;
        }

        let mut writer = Self {
            path,
            hash_chain,
            last_hash: None,
            seq: 0,
            seen: HashSet::new(),
        };

        let content = match fs::read_to_string(&writer.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e).with_context(|| format!("read journal {:?}", writer.path)),
        };
        let mut offset = 0usize;
        for (i, raw) in content.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += raw.len();
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let terminated = raw.ends_with('\n');
            let rec: JournalRecord = match serde_json::from_str(trimmed) {
                Ok(rec) => rec,
                Err(e) if !terminated => {
                    // Torn final write: the entry was never acknowledged.
                    warn!(line = i + 1, error = %e, "dropping torn journal tail");
                    truncate_to(&writer.path, start as u64)?;
                    break;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("parse journal record at line {}", i + 1))
                }
            };
            if !terminated {
                append_bytes(&writer.path, b"\n")?;
            }
            writer.seen.insert(rec.entry_id);
            writer.last_hash = rec.hash_self;
            writer.seq += 1;
        }
        debug!(records = writer.seq, path = %writer.path.display(), "journal opened");

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the file.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Append one entry.  Returns `None` when an identical entry from the
    /// same source is already in the journal.
    pub fn append(
        &mut self,
        entry: &LedgerEntry,
        source: &Fingerprint,
    ) -> Result<Option<JournalRecord>> {
        let entry_id = derive_entry_id(entry, source)?;
        if self.seen.contains(&entry_id) {
            debug!(%entry_id, "entry already journaled, skipping");
            return Ok(None);
        }

        let mut rec = JournalRecord {
            entry_id,
            seq: self.seq,
            recorded_at_utc: Utc::now(),
            source: source.as_str().to_string(),
            entry: entry.clone(),
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            rec.hash_prev = self.last_hash.clone();
            rec.hash_self = Some(compute_record_hash(&rec)?);
        }

        let line = canonical_json_line(&rec)?;
        append_line(&self.path, &line)?;

        self.seq += 1;
        self.seen.insert(entry_id);
        if self.hash_chain {
            self.last_hash = rec.hash_self.clone();
        }
        Ok(Some(rec))
    }
}

impl LedgerSink for JournalWriter {
    fn record(&mut self, entry: &LedgerEntry, source: &Fingerprint) -> Result<(), SinkError> {
        self.append(entry, source)
            .map(|_| ())
            .map_err(|e| SinkError::new(format!("{e:#}")))
    }
}

/// Deterministic id for one entry of one source transaction.  No clock, no RNG.
pub fn derive_entry_id(entry: &LedgerEntry, source: &Fingerprint) -> Result<Uuid> {
    let body = canonical_json_line(entry)?;
    let data = format!("acb-journal.entry.v1|{}|{}", source.digest(), body);
    Ok(Uuid::new_v5(&Uuid::NAMESPACE_DNS, data.as_bytes()))
}

/// Hash of the record's canonical JSON with `hash_self` cleared.
pub fn compute_record_hash(rec: &JournalRecord) -> Result<String> {
    let mut clone = rec.clone();
    clone.hash_self = None;

    let canonical = canonical_json_line(&clone)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid { lines: usize },
    Broken { line: usize, reason: String },
}

pub fn verify_journal(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read journal {:?}", path.as_ref()))?;
    verify_journal_str(&content)
}

/// Checks, per record: `hash_prev` links to the previous `hash_self`,
/// `hash_self` matches the content, `seq` is consecutive, and journal
/// transactions balance.
pub fn verify_journal_str(content: &str) -> Result<VerifyResult> {
    let mut prev_hash: Option<String> = None;
    let mut count = 0usize;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line_no = i + 1;
        let rec: JournalRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("parse journal record at line {line_no}"))?;

        if rec.seq != count as u64 {
            return Ok(broken(line_no, format!("seq gap: expected {count}, got {}", rec.seq)));
        }
        count += 1;

        if rec.hash_prev != prev_hash {
            return Ok(broken(
                line_no,
                format!("hash_prev mismatch: expected {:?}, got {:?}", prev_hash, rec.hash_prev),
            ));
        }

        if let Some(ref claimed) = rec.hash_self {
            let recomputed = compute_record_hash(&rec)?;
            if *claimed != recomputed {
                return Ok(broken(
                    line_no,
                    format!("hash_self mismatch: claimed {claimed}, recomputed {recomputed}"),
                ));
            }
        }

        if let LedgerEntry::Journal(ref j) = rec.entry {
            if !j.is_balanced() {
                return Ok(broken(line_no, format!("unbalanced journal transaction '{}'", j.description)));
            }
        }

        prev_hash = rec.hash_self;
    }

    Ok(VerifyResult::Valid { lines: count })
}

fn broken(line: usize, reason: String) -> VerifyResult {
    VerifyResult::Broken { line, reason }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    append_bytes(path, buf.as_bytes())
}

fn append_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    f.write_all(bytes).context("write journal line failed")?;
    f.sync_data().context("sync journal failed")?;
    Ok(())
}

fn truncate_to(path: &Path, len: u64) -> Result<()> {
    let f = OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open journal {:?}", path))?;
    f.set_len(len)
        .with_context(|| format!("truncate journal {:?} to {len} bytes", path))?;
    f.sync_all().context("sync journal failed")?;
    Ok(())
}

fn canonical_json_line<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize journal record failed")?;
    serde_json::to_string(&sort_keys(&raw)).context("json stringify failed")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
