//! Index replay from persisted log segments
//!
//! After a crash, every edit of a segment may carry index records whose
//! post-commit never ran. The replay driver hands each segment here once.
//!
//! - Edits are read sequentially; a corrupt edit stops replay before any
//!   write for it is issued
//! - Every embedded record is re-written through write-or-abort
//! - No locking and no finished marking: the driver runs before the log
//!   accepts new appends

use crate::crash_point::{maybe_crash, points};
use crate::observability::{log_event_with_fields, Event};
use crate::wal::{LogEntry, SegmentSource};
use crate::writer::{IndexCommitter, WritePath};

use super::errors::{IndexError, IndexResult};

/// Statistics from one segment replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Segment replayed
    pub segment: u64,
    /// Edits read
    pub edits: u64,
    /// Edits that carried index records
    pub units: u64,
    /// Index updates re-written
    pub records: u64,
    /// Retention markers seen
    pub markers: u64,
    /// Opaque host entries seen
    pub opaque_entries: u64,
}

pub struct RecoveryReplayer {
    committer: IndexCommitter,
}

impl RecoveryReplayer {
    pub fn new(committer: IndexCommitter) -> Self {
        Self { committer }
    }

    /// Replay every edit of `source`.
    ///
    /// Returns Err only for corruption. A failed index write aborts through
    /// the committer and never returns.
    pub fn replay(&self, source: &mut dyn SegmentSource) -> IndexResult<ReplayStats> {
        let segment = source.segment_id();
        let segment_str = segment.to_string();
        log_event_with_fields(Event::ReplaySegmentBegin, &[("segment", &segment_str)]);

        let mut stats = ReplayStats {
            segment,
            ..ReplayStats::default()
        };

        loop {
            let position = source.position();
            let edit = match source.next_edit() {
                Ok(Some(edit)) => edit,
                Ok(None) => break,
                Err(e) => {
                    let err = IndexError::log_corruption(segment, position, e);
                    let position = position.to_string();
                    log_event_with_fields(
                        Event::ReplayCorruption,
                        &[
                            ("code", err.code().code()),
                            ("error", &err.to_string()),
                            ("position", &position),
                            ("segment", &segment_str),
                        ],
                    );
                    return Err(err);
                }
            };

            stats.edits += 1;
            self.committer.metrics().increment_replayed_edits();

            let mut updates = Vec::new();
            for entry in edit.entries() {
                match entry {
                    LogEntry::Data(_) => stats.opaque_entries += 1,
                    LogEntry::RetentionMarker => stats.markers += 1,
                    LogEntry::Index(record) => updates.push(record.into_update()),
                }
            }
            if updates.is_empty() {
                continue;
            }

            maybe_crash(points::REPLAY_BEFORE_WRITE);
            self.committer
                .write_or_abort(edit.unit(), &updates, WritePath::Replay { segment });

            stats.units += 1;
            stats.records += updates.len() as u64;
            self.committer
                .metrics()
                .add_replayed_records(updates.len() as u64);
        }

        log_event_with_fields(
            Event::ReplaySegmentComplete,
            &[
                ("edits", &stats.edits.to_string()),
                ("records", &stats.records.to_string()),
                ("segment", &segment_str),
            ],
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::IndexErrorCode;
    use crate::index_update::IndexUpdate;
    use crate::mutation::Mutation;
    use crate::observability::IndexMetrics;
    use crate::wal::{encode_edit, LogEdit, MemorySegment};
    use crate::writer::{AbortHandler, IndexWriteError, RecordingIndexWriter};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    struct PanicAbort;

    impl AbortHandler for PanicAbort {
        fn abort(&self, error: &IndexError) -> ! {
            panic!("{}", error.code());
        }
    }

    fn replayer() -> (Arc<RecordingIndexWriter>, RecoveryReplayer) {
        let writer = Arc::new(RecordingIndexWriter::new());
        let committer = IndexCommitter::new(
            writer.clone(),
            Arc::new(PanicAbort),
            Arc::new(IndexMetrics::new()),
        );
        (writer, RecoveryReplayer::new(committer))
    }

    fn update(row: &str) -> IndexUpdate {
        IndexUpdate::new("idx", Mutation::new(row).put("f", "q", 1, "v"))
    }

    fn encoded(build: impl FnOnce(&LogEdit)) -> Vec<u8> {
        let edit = LogEdit::new();
        build(&edit);
        encode_edit(&edit).unwrap()
    }

    #[test]
    fn test_replays_embedded_records_in_order() {
        let (writer, replayer) = replayer();
        let mut segment = MemorySegment::new(
            4,
            vec![
                encoded(|e| e.push_data("row-a")),
                encoded(|e| {
                    e.push_data("row-b");
                    e.embed(&[update("b1"), update("b2")]);
                }),
                encoded(|e| e.add_retention_marker()),
            ],
        );

        let stats = replayer.replay(&mut segment).unwrap();
        assert_eq!(stats.segment, 4);
        assert_eq!(stats.edits, 3);
        assert_eq!(stats.units, 1);
        assert_eq!(stats.records, 2);
        assert_eq!(stats.markers, 1);
        assert_eq!(stats.opaque_entries, 2);
        assert_eq!(writer.writes(), vec![update("b1"), update("b2")]);
    }

    #[test]
    fn test_empty_segment() {
        let (writer, replayer) = replayer();
        let stats = replayer.replay(&mut MemorySegment::new(0, Vec::new())).unwrap();
        assert_eq!(stats.edits, 0);
        assert_eq!(writer.call_count(), 0);
    }

    #[test]
    fn test_corruption_stops_before_write() {
        let (writer, replayer) = replayer();
        let mut segment = MemorySegment::new(
            1,
            vec![
                encoded(|e| e.embed(&[update("a")])),
                encoded(|e| e.embed(&[update("b")])),
            ],
        );
        let last = segment.encoded_edits_mut()[1].len() - 1;
        segment.encoded_edits_mut()[1][last] ^= 0xFF;

        let err = replayer.replay(&mut segment).unwrap_err();
        assert_eq!(err.code(), IndexErrorCode::AeroIndexLogCorruption);
        assert_eq!(err.segment(), Some(1));
        // first edit was delivered, the corrupt one was not
        assert_eq!(writer.writes(), vec![update("a")]);
    }

    #[test]
    fn test_write_failure_aborts() {
        let (writer, replayer) = replayer();
        writer.fail_next(IndexWriteError::Unreachable("down".into()));
        let mut segment = MemorySegment::new(2, vec![encoded(|e| e.embed(&[update("a")]))]);

        let result = panic::catch_unwind(AssertUnwindSafe(|| replayer.replay(&mut segment)));
        assert!(result.is_err());
    }
}
