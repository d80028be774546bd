//! Replay loop: drive a [`StateManager`] with the cost-basis processor until
//! the input is exhausted or a batch limit is reached.

use tracing::info;

use crate::journal::LedgerSink;
use crate::processor::CostBasisProcessor;
use crate::state::{Advance, Checkpoint, StateError, StateManager};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Transactions applied in this call.
    pub applied: usize,
    /// Of those, how many moved a holding.
    pub holdings_changed: usize,
    /// True when every transaction has now been processed.
    pub exhausted: bool,
}

/// Apply up to `limit` transactions (all of them when `None`).
///
/// Stops at the first error; everything applied before it stays applied.
pub fn replay<C, S>(
    state: &mut StateManager<C>,
    processor: &CostBasisProcessor,
    sink: &mut S,
    limit: Option<usize>,
) -> Result<ReplaySummary, StateError>
where
    C: Checkpoint,
    S: LedgerSink,
{
    let mut summary = ReplaySummary::default();
    while limit.map_or(true, |n| summary.applied < n) {
        match state.advance(|tx, h| processor.apply_to_sink(&mut *sink, tx, h))? {
            Advance::Applied {
                holding_changed, ..
            } => {
                summary.applied += 1;
                if holding_changed {
                    summary.holdings_changed += 1;
                }
            }
            Advance::Exhausted => {
                summary.exhausted = true;
                break;
            }
        }
    }
    if !summary.exhausted && state.remaining() == 0 {
        summary.exhausted = true;
    }
    info!(
        applied = summary.applied,
        holdings_changed = summary.holdings_changed,
        exhausted = summary.exhausted,
        "replay stopped"
    );
    Ok(summary)
}
