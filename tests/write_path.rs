//! Live write path tests
//!
//! Pre-commit and post-commit driven through a simulated host:
//! - planner visibility across sequential mutations to one row
//! - per-row merging of batches
//! - lock balance for any durability mix
//! - exactly-once delivery per log-append unit

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use aeroindex::config::IndexerConfig;
use aeroindex::coordinator::{IndexErrorCode, PostCommitOutcome, PreCommitOutcome};
use aeroindex::mutation::Mutation;
use aeroindex::wal::LogEdit;
use aeroindex::writer::IndexWriteError;
use common::{cells, deletes, puts, Host, INDEX};

// =============================================================================
// Planner visibility
// =============================================================================

#[test]
fn test_sequential_puts_see_state_before_then_after() {
    let host = Host::covered("f");
    let t = 1_000;

    // M1: first value for the row
    assert!(host.put(&Mutation::new("r").put("f", "c", t, "v1")).wrote());
    let writes = host.writer.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].index.as_str(), INDEX);
    assert!(writes[0].mutation.is_empty());
    assert_eq!(cells(&writes[1]), puts(&["v1"]));

    // M2: newer value, the prior one is retained as an older version
    host.writer.clear();
    assert!(host.put(&Mutation::new("r").put("f", "c", t + 1, "v2")).wrote());
    let writes = host.writer.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(cells(&writes[0]), deletes(&["v1"]));
    assert_eq!(cells(&writes[1]), puts(&["v2", "v1"]));
}

#[test]
fn test_uncovered_columns_never_reach_the_index() {
    let host = Host::covered("f:c");
    let outcome = host.put(&Mutation::new("r").put("g", "c", 1, "x"));
    assert_eq!(outcome, PostCommitOutcome::NotApplicable);
    assert_eq!(host.writer.call_count(), 0);
    assert!(host.lock.stats().is_balanced());
}

#[test]
fn test_delete_clears_covered_state() {
    let host = Host::covered("f");
    host.put(&Mutation::new("r").put("f", "c", 10, "v1"));
    host.writer.clear();

    host.put(&Mutation::new("r").delete("f", "c", 10));
    let writes = host.writer.writes();
    assert_eq!(cells(&writes[0]), deletes(&["v1"]));
    assert!(writes[1].mutation.is_empty());
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_on_one_row_is_planned_as_one_merged_mutation() {
    let host = Host::covered("f");
    let t = 500;

    let (outcome, post) = host.batch(&[
        Mutation::new("r").put("f", "c", t, "v1"),
        Mutation::new("r").put("f", "c", t + 1, "v2"),
    ]);

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].1, PreCommitOutcome::Embedded { records: 4 });

    // one unit: the first post-commit writes, the second finds it finished
    assert_eq!(post[0], PostCommitOutcome::Written { records: 4 });
    assert_eq!(post[1], PostCommitOutcome::AlreadyFinished);

    let writes = host.writer.writes();
    assert!(writes[0].mutation.is_empty());
    assert_eq!(cells(&writes[1]), puts(&["v1"]));
    assert_eq!(cells(&writes[2]), deletes(&["v1"]));
    assert_eq!(cells(&writes[3]), puts(&["v2", "v1"]));
    assert_eq!(host.writer.call_count(), 1);
}

#[test]
fn test_batch_of_distinct_rows_writes_once() {
    let host = Host::covered("f");
    let (outcome, post) = host.batch(&[
        Mutation::new("a").put("f", "c", 1, "1"),
        Mutation::new("b").put("f", "c", 1, "2"),
        Mutation::new("c").put("f", "c", 1, "3"),
    ]);

    assert_eq!(outcome.embedded_records(), 6);
    assert_eq!(post.iter().filter(|p| p.wrote()).count(), 1);
    assert_eq!(host.writer.write_count(), 6);
    assert_eq!(host.lock.stats().shared_acquired, 1);
    assert!(host.lock.stats().is_balanced());
}

#[test]
fn test_batch_with_unindexed_mutations_keeps_marker_in_log() {
    let host = Host::covered("f");
    let (edit, outcome) = host.append_batch(&[
        Mutation::new("a").put("g", "c", 1, "1"),
        Mutation::new("b").put("g", "c", 1, "2"),
    ]);

    assert_eq!(outcome.skipped, 2);
    assert!(outcome.retention_marker);
    assert!(edit.has_retention_marker());
    assert!(!outcome.lock_acquired);
    assert_eq!(host.log.appended(), 1);
}

// =============================================================================
// Lock balance
// =============================================================================

#[test]
fn test_lock_counts_are_zero_or_one_for_every_durability_mix() {
    // every combination of three rows, each durable or not, indexed or not
    for mask in 0u8..64 {
        let host = Host::covered("f");
        let mutations: Vec<_> = (0..3)
            .map(|i| {
                let durable = mask & (1 << i) != 0;
                let family = if mask & (1 << (i + 3)) != 0 { "f" } else { "g" };
                Mutation::new(format!("row{}", i).as_str())
                    .put(family, "c", 1, "v")
                    .with_durability(durable)
            })
            .collect();

        let (outcome, _) = host.batch(&mutations);
        let stats = host.lock.stats();

        let any_embedded = (0..3).any(|i| mask & (1 << i) != 0 && mask & (1 << (i + 3)) != 0);
        assert_eq!(stats.shared_acquired, u64::from(any_embedded), "mask {:06b}", mask);
        assert!(stats.is_balanced(), "mask {:06b}", mask);
        assert_eq!(stats.rejected_releases, 0, "mask {:06b}", mask);
        assert_eq!(outcome.lock_acquired, any_embedded);
    }
}

#[test]
fn test_same_row_mixed_durability_merges_to_durable() {
    let host = Host::covered("f");
    let (outcome, post) = host.batch(&[
        Mutation::new("r").put("f", "a", 1, "1").with_durability(false),
        Mutation::new("r").put("f", "b", 1, "2"),
    ]);

    assert!(matches!(outcome.rows[0].1, PreCommitOutcome::Embedded { .. }));
    assert_eq!(post[0], PostCommitOutcome::NotApplicable);
    assert!(post[1].wrote());
    assert!(host.lock.stats().is_balanced());
}

#[test]
fn test_non_durable_write_failure_fails_mutation() {
    let host = Host::covered("f");
    host.writer
        .fail_next(IndexWriteError::Unreachable("refused".into()));

    let edit = LogEdit::new();
    let mutation = Mutation::new("r").put("f", "c", 1, "v").with_durability(false);
    let err = host.indexer.pre_single(&mutation, &edit).unwrap_err();

    assert_eq!(err.code(), IndexErrorCode::AeroIndexStoreUnreachable);
    assert!(!err.is_fatal());
    assert_eq!(host.lock.stats().shared_acquired, 0);
    assert_eq!(host.indexer.metrics().direct_write_failures, 1);
}

// =============================================================================
// Exactly-once post-commit
// =============================================================================

#[test]
fn test_post_commit_twice_writes_once() {
    let host = Host::covered("f");
    let mutation = Mutation::new("r").put("f", "c", 1, "v");
    let (edit, _) = host.append_single(&mutation);

    assert!(host.indexer.post_single(&mutation, &edit).wrote());
    assert_eq!(
        host.indexer.post_single(&mutation, &edit),
        PostCommitOutcome::AlreadyFinished
    );
    assert_eq!(host.writer.call_count(), 1);
    assert_eq!(host.lock.stats().shared_released, 1);
}

#[test]
fn test_post_commit_from_many_workers_writes_once() {
    let host = Host::covered("f");
    let batch: Vec<_> = (0..16)
        .map(|i| Mutation::new(format!("r{}", i).as_str()).put("f", "c", 1, "v"))
        .collect();
    let (edit, _) = host.append_batch(&batch);

    let indexer = Arc::new(host.indexer);
    let handles: Vec<_> = batch
        .into_iter()
        .map(|mutation| {
            let indexer = Arc::clone(&indexer);
            let edit = Arc::clone(&edit);
            let writer = Arc::clone(&host.writer);
            thread::spawn(move || {
                let outcome = indexer.post_single(&mutation, &edit);
                (outcome, writer.call_count())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|(outcome, _)| outcome.wrote()).count(), 1);
    // no worker returns, and lets its mutation be acknowledged, before the
    // unit's index write has landed
    for (outcome, calls_seen) in &results {
        assert_eq!(*calls_seen, 1, "{:?} returned before the write", outcome);
    }
    assert_eq!(host.writer.call_count(), 1);
    assert!(host.lock.stats().is_balanced());
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_table_without_planner_is_pass_through() {
    let host = Host::with_config(&IndexerConfig::default());
    assert!(!host.indexer.is_enabled());

    assert_eq!(
        host.put(&Mutation::new("r").put("f", "c", 1, "v")),
        PostCommitOutcome::NotApplicable
    );
    assert_eq!(host.writer.call_count(), 0);
}

#[test]
fn test_unknown_planner_disables_indexing_for_table() {
    let config = IndexerConfig::with_planner("missing", BTreeMap::new());
    let host = Host::with_config(&config);

    assert!(!host.indexer.is_enabled());
    let failure = host.indexer.init_failure().expect("init failure reported");
    assert_eq!(failure.code(), IndexErrorCode::AeroIndexPlannerInitFailed);

    host.put(&Mutation::new("r").put("f", "c", 1, "v"));
    assert_eq!(host.writer.call_count(), 0);
}
