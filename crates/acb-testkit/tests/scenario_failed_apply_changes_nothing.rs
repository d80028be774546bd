//! Failure atomicity of one replay step.
//!
//! GREEN when:
//! - A ledger sink rejection stops the replay with an Apply error, and the
//!   failing transaction is neither marked processed nor reflected in the
//!   holdings snapshot.
//! - After the sink recovers, the same transaction is retried and the final
//!   state equals an undisturbed run.
//! - Selling a symbol with no holding is fatal and leaves state untouched.

use acb_ledger::{
    replay, AccountNames, CostBasisProcessor, Holdings, MemoryCheckpoint, ProcessedSet,
    StateError, StateManager,
};
use acb_testkit::{tx, FailingSink, RecordingSink};

fn processor() -> CostBasisProcessor {
    CostBasisProcessor::new(AccountNames::new("Cash", "Equities"))
}

#[test]
fn sink_outage_is_retried_not_skipped() {
    let txs = vec![
        tx("BUY", "FOO", "04-Jul-2021", 200, "-2009.99"),
        tx("SELL", "FOO", "05-Jul-2021", -200, "1990.01"),
    ];
    let proc = processor();

    let mut sink = FailingSink::after(1);
    let mut sm = StateManager::new(
        txs.clone(),
        ProcessedSet::new(),
        Holdings::new(),
        MemoryCheckpoint::new(),
    )
    .unwrap();

    let err = replay(&mut sm, &proc, &mut sink, None).unwrap_err();
    match &err {
        StateError::Apply { fingerprint, .. } => assert_eq!(fingerprint, &txs[1].fingerprint()),
        other => panic!("expected apply error, got {other}"),
    }
    assert_eq!(sm.checkpoint().processed, vec![txs[0].fingerprint()]);
    assert_eq!(sm.checkpoint().snapshots.len(), 1);
    assert_eq!(sm.holdings()["FOO"].quantity, 200);

    sink.heal();
    let s = replay(&mut sm, &proc, &mut sink, None).unwrap();
    assert_eq!(s.applied, 1);
    assert!(s.exhausted);

    let mut clean_sink = RecordingSink::new();
    let mut clean =
        StateManager::new(txs, ProcessedSet::new(), Holdings::new(), MemoryCheckpoint::new())
            .unwrap();
    replay(&mut clean, &proc, &mut clean_sink, None).unwrap();

    assert_eq!(sm.holdings(), clean.holdings());
    assert_eq!(sink.inner.descriptions(), clean_sink.descriptions());
}

#[test]
fn selling_without_holding_is_fatal() {
    let txs = vec![tx("SELL", "FOO", "05-Jul-2021", -10, "100.00")];
    let mut sink = RecordingSink::new();
    let mut sm =
        StateManager::new(txs, ProcessedSet::new(), Holdings::new(), MemoryCheckpoint::new())
            .unwrap();

    let err = replay(&mut sm, &processor(), &mut sink, None).unwrap_err();
    assert!(matches!(err, StateError::Apply { .. }));
    assert!(err.to_string().contains("FOO"));
    assert!(sink.is_empty());
    assert!(sm.checkpoint().processed.is_empty());
    assert!(sm.checkpoint().snapshots.is_empty());
}
