//! Crash recovery tests
//!
//! A crash between the log append and post-commit leaves index records only
//! in the log. Replaying the segment must deliver exactly what live
//! post-commit would have written. Corrupt segments halt replay before any
//! write for the corrupt edit.

mod common;

use std::panic::{self, AssertUnwindSafe};

use aeroindex::coordinator::IndexErrorCode;
use aeroindex::mutation::Mutation;
use aeroindex::wal::{LogEdit, SegmentSource};
use aeroindex::writer::IndexWriteError;
use common::{cells, puts, Host};

// =============================================================================
// Replay after crash
// =============================================================================

#[test]
fn test_replay_delivers_what_post_commit_would_have() {
    // live run, for reference
    let live = Host::covered("f");
    live.put(&Mutation::new("r").put("f", "c", 7, "v1"));
    let expected = live.writer.writes();
    assert_eq!(expected.len(), 2);

    // crashed run: appended, never post-committed
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("f", "c", 7, "v1"));
    assert_eq!(crashed.writer.call_count(), 0);

    // restart: fresh indexer over the surviving log
    let restarted = Host::covered("f");
    let mut segment = crashed.log.current_segment();
    let stats = restarted.indexer.replay_segment(&mut segment).unwrap();

    assert_eq!(stats.records, 2);
    assert_eq!(stats.units, 1);
    assert_eq!(restarted.writer.write_count(), 2);
    assert_eq!(restarted.writer.writes(), expected);
}

#[test]
fn test_replay_takes_no_lock_and_marks_nothing() {
    let crashed = Host::covered("f");
    crashed.append_batch(&[
        Mutation::new("a").put("f", "c", 1, "1"),
        Mutation::new("b").put("f", "c", 1, "2"),
    ]);

    let restarted = Host::covered("f");
    let mut segment = crashed.log.current_segment();
    let stats = restarted.indexer.replay_segment(&mut segment).unwrap();

    assert_eq!(stats.records, 4);
    assert_eq!(restarted.lock.stats().shared_acquired, 0);
    assert_eq!(restarted.indexer.metrics().replayed_records, 4);
}

#[test]
fn test_replay_is_repeatable() {
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("f", "c", 1, "v"));

    let restarted = Host::covered("f");
    restarted
        .indexer
        .replay_segment(&mut crashed.log.current_segment())
        .unwrap();
    let first = restarted.writer.writes();

    restarted.writer.clear();
    restarted
        .indexer
        .replay_segment(&mut crashed.log.current_segment())
        .unwrap();
    assert_eq!(restarted.writer.writes(), first);
}

#[test]
fn test_replay_skips_edits_without_records() {
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("g", "c", 1, "x"));
    crashed.append_batch(&[Mutation::new("s").put("g", "c", 1, "y")]);

    let restarted = Host::covered("f");
    let stats = restarted
        .indexer
        .replay_segment(&mut crashed.log.current_segment())
        .unwrap();

    assert_eq!(stats.edits, 2);
    assert_eq!(stats.records, 0);
    assert_eq!(stats.markers, 1);
    assert_eq!(stats.opaque_entries, 2);
    assert_eq!(restarted.writer.call_count(), 0);
}

#[test]
fn test_replay_of_sealed_segment_after_roll() {
    let host = Host::covered("f");
    host.put(&Mutation::new("a").put("f", "c", 1, "1"));
    let sealed_id = host.log.roll();
    host.append_single(&Mutation::new("b").put("f", "c", 1, "2"));

    let restarted = Host::covered("f");
    let mut sealed = host.log.sealed_segments().remove(0);
    assert_eq!(sealed.segment_id(), sealed_id);
    let stats = restarted.indexer.replay_segment(&mut sealed).unwrap();
    assert_eq!(stats.records, 2);

    let mut current = host.log.current_segment();
    let stats = restarted.indexer.replay_segment(&mut current).unwrap();
    assert_eq!(stats.records, 2);
    assert_eq!(cells(&restarted.writer.writes()[3]), puts(&["2"]));
}

// =============================================================================
// Fatal paths
// =============================================================================

#[test]
fn test_corrupt_segment_fails_without_writes() {
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("f", "c", 1, "v"));

    let mut segment = crashed.log.current_segment();
    // the last byte is the checksum of the edit's last index record
    let edit = &mut segment.encoded_edits_mut()[0];
    let last = edit.len() - 1;
    edit[last] ^= 0x5A;

    let restarted = Host::covered("f");
    let err = restarted.indexer.replay_segment(&mut segment).unwrap_err();
    assert_eq!(err.code(), IndexErrorCode::AeroIndexLogCorruption);
    assert!(err.is_fatal());
    assert_eq!(restarted.writer.call_count(), 0);
}

#[test]
fn test_truncated_segment_fails_without_writes() {
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("f", "c", 1, "v"));

    let mut segment = crashed.log.current_segment();
    let edit = &mut segment.encoded_edits_mut()[0];
    let torn = edit.len() - 3;
    edit.truncate(torn);

    let restarted = Host::covered("f");
    let err = restarted.indexer.replay_segment(&mut segment).unwrap_err();
    assert_eq!(err.code(), IndexErrorCode::AeroIndexLogCorruption);
    assert_eq!(restarted.writer.call_count(), 0);
}

#[test]
fn test_store_failure_during_replay_aborts() {
    let crashed = Host::covered("f");
    crashed.append_single(&Mutation::new("r").put("f", "c", 1, "v"));

    let restarted = Host::covered("f");
    restarted
        .writer
        .fail_next(IndexWriteError::Unreachable("down".into()));
    let mut segment = crashed.log.current_segment();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        restarted.indexer.replay_segment(&mut segment)
    }));
    let payload = result.unwrap_err();
    assert_eq!(
        payload.downcast_ref::<String>().map(String::as_str),
        Some("AERO_INDEX_RECOVERY_WRITE_FAILED")
    );
    assert_eq!(restarted.indexer.metrics().fatal_aborts, 1);
}

#[test]
fn test_store_failure_after_durable_append_aborts() {
    let host = Host::covered("f");
    let mutation = Mutation::new("r").put("f", "c", 1, "v");
    let (edit, _) = host.append_single(&mutation);
    host.writer
        .fail_next(IndexWriteError::Unreachable("down".into()));

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        host.indexer.post_single(&mutation, &edit)
    }));
    let payload = result.unwrap_err();
    assert_eq!(
        payload.downcast_ref::<String>().map(String::as_str),
        Some("AERO_INDEX_DURABLE_WRITE_FAILED")
    );

    // the updates are still in the log for the next start
    let restarted = Host::covered("f");
    let stats = restarted
        .indexer
        .replay_segment(&mut host.log.current_segment())
        .unwrap();
    assert_eq!(stats.records, 2);
}

#[test]
fn test_unappended_edit_leaves_nothing_to_replay() {
    let host = Host::covered("f");
    let edit = LogEdit::new();
    host.indexer
        .pre_single(&Mutation::new("r").put("f", "c", 1, "v"), &edit)
        .unwrap();

    let stats = Host::covered("f")
        .indexer
        .replay_segment(&mut host.log.current_segment())
        .unwrap();
    assert_eq!(stats.edits, 0);
}
