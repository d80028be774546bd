use acb_ledger::{Fingerprint, JournalTransaction, LedgerEntry, LedgerSink, SinkError};

/// In-memory ledger.  Re-recording an identical entry from the same source
/// is a no-op, like a bookkeeping API keyed by idempotency token.
#[derive(Default, Debug)]
pub struct RecordingSink {
    entries: Vec<(Fingerprint, LedgerEntry)>,
    duplicates: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter().map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records ignored because they were already present.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn journals(&self) -> impl Iterator<Item = &JournalTransaction> {
        self.entries().filter_map(|e| match e {
            LedgerEntry::Journal(j) => Some(j),
            LedgerEntry::Expense(_) => None,
        })
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.entries().map(|e| e.description().to_string()).collect()
    }
}

impl LedgerSink for RecordingSink {
    fn record(&mut self, entry: &LedgerEntry, source: &Fingerprint) -> Result<(), SinkError> {
        if self
            .entries
            .iter()
            .any(|(f, e)| f == source && e == entry)
        {
            self.duplicates += 1;
            return Ok(());
        }
        self.entries.push((source.clone(), entry.clone()));
        Ok(())
    }
}

/// Accepts `budget` entries, then rejects every later one until healed.
#[derive(Debug)]
pub struct FailingSink {
    pub inner: RecordingSink,
    budget: Option<usize>,
}

impl FailingSink {
    pub fn always() -> Self {
        Self::after(0)
    }

    pub fn after(budget: usize) -> Self {
        Self {
            inner: RecordingSink::new(),
            budget: Some(budget),
        }
    }

    /// Stop failing.
    pub fn heal(&mut self) {
        self.budget = None;
    }
}

impl LedgerSink for FailingSink {
    fn record(&mut self, entry: &LedgerEntry, source: &Fingerprint) -> Result<(), SinkError> {
        match self.budget {
            Some(0) => Err(SinkError::new("ledger unavailable")),
            Some(ref mut n) => {
                *n -= 1;
                self.inner.record(entry, source)
            }
            None => self.inner.record(entry, source),
        }
    }
}
