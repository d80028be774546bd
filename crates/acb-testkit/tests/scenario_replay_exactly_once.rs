//! Exactly-once replay across interruptions.
//!
//! GREEN when:
//! - A replay split into batches of one, with the state manager rebuilt from
//!   the checkpoint between batches, posts the same entries and ends with the
//!   same holdings as one uninterrupted replay.
//! - No entry reaches the sink twice.
//! - Re-running a finished replay applies nothing.

use acb_ledger::{
    replay, AccountNames, CostBasisProcessor, Holdings, MemoryCheckpoint, ProcessedSet,
    StateManager, Transaction,
};
use acb_testkit::{dividend, tx, RecordingSink};

fn processor() -> CostBasisProcessor {
    CostBasisProcessor::new(AccountNames::new("Cash", "Equities"))
}

fn batch() -> Vec<Transaction> {
    vec![
        tx("SELL", "FOO", "10-Jul-2021", -50, "600.00"),
        tx("BUY", "FOO", "04-Jul-2021", 100, "-1000.00"),
        dividend("FOO", "08-Jul-2021", 100, "4.00"),
        tx("BUY", "BAR", "05-Jul-2021", 30, "-309.99"),
        tx("REI", "FOO", "09-Jul-2021", 0, "-4.00"),
        tx("SELL", "BAR", "12-Jul-2021", -10, "120.00"),
    ]
}

#[test]
fn batched_replay_matches_single_run() {
    let proc = processor();

    let mut straight_sink = RecordingSink::new();
    let mut straight = StateManager::new(
        batch(),
        ProcessedSet::new(),
        Holdings::new(),
        MemoryCheckpoint::new(),
    )
    .unwrap();
    let summary = replay(&mut straight, &proc, &mut straight_sink, None).unwrap();
    assert_eq!(summary.applied, 6);
    assert!(summary.exhausted);

    let mut sink = RecordingSink::new();
    let mut cp = MemoryCheckpoint::new();
    let mut holdings = Holdings::new();
    let mut runs = 0;
    loop {
        let processed: ProcessedSet = cp.processed.iter().cloned().collect();
        let mut sm = StateManager::new(batch(), processed, holdings.clone(), &mut cp).unwrap();
        let s = replay(&mut sm, &proc, &mut sink, Some(1)).unwrap();
        holdings = sm.holdings().clone();
        runs += 1;
        if s.exhausted {
            break;
        }
        assert_eq!(s.applied, 1);
        assert!(runs < 20, "replay did not converge");
    }

    assert_eq!(&holdings, straight.holdings());
    assert_eq!(sink.descriptions(), straight_sink.descriptions());
    assert_eq!(sink.duplicates(), 0);
    assert_eq!(cp.processed.len(), 6);
}

#[test]
fn finished_replay_is_a_no_op() {
    let proc = processor();
    let mut sink = RecordingSink::new();
    let mut cp = MemoryCheckpoint::new();
    {
        let mut sm =
            StateManager::new(batch(), ProcessedSet::new(), Holdings::new(), &mut cp).unwrap();
        replay(&mut sm, &proc, &mut sink, None).unwrap();
    }
    let posted = sink.len();
    let holdings = cp.last_snapshot().cloned().unwrap();

    let processed: ProcessedSet = cp.processed.iter().cloned().collect();
    let mut sm = StateManager::new(batch(), processed, holdings, &mut cp).unwrap();
    let s = replay(&mut sm, &proc, &mut sink, None).unwrap();
    assert_eq!(s.applied, 0);
    assert!(s.exhausted);
    assert_eq!(sink.len(), posted);
}

#[test]
fn entries_follow_replay_order() {
    let proc = processor();
    let mut sink = RecordingSink::new();
    let mut sm = StateManager::new(
        batch(),
        ProcessedSet::new(),
        Holdings::new(),
        MemoryCheckpoint::new(),
    )
    .unwrap();
    replay(&mut sm, &proc, &mut sink, None).unwrap();
    assert_eq!(
        sink.descriptions(),
        [
            "Buy 100 FOO",
            "Buy 30 BAR",
            "Dividend paid on 100 FOO",
            "Sell 50 FOO",
            "Sell 10 BAR",
        ]
    );
    assert!(sink.journals().all(|j| j.is_balanced()));
}
