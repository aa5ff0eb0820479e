//! Persisted log segments as seen by the replay driver

use super::codec::decode_edit;
use super::edit::LogEdit;
use super::errors::LogCodecResult;

/// Sequential reader over the edits of one persisted segment.
pub trait SegmentSource {
    /// Identifier of the segment being read
    fn segment_id(&self) -> u64;

    /// Read and decode the next edit.
    /// Returns None at the end of the segment.
    /// Returns Err if the persisted bytes are corrupt.
    fn next_edit(&mut self) -> LogCodecResult<Option<LogEdit>>;

    /// Number of edits consumed so far
    fn position(&self) -> usize;
}

/// A segment held in memory as encoded edits.
#[derive(Debug, Clone, Default)]
pub struct MemorySegment {
    id: u64,
    edits: Vec<Vec<u8>>,
    position: usize,
}

impl MemorySegment {
    pub fn new(id: u64, edits: Vec<Vec<u8>>) -> Self {
        Self {
            id,
            edits,
            position: 0,
        }
    }

    /// Encoded edits in append order
    pub fn encoded_edits(&self) -> &[Vec<u8>] {
        &self.edits
    }

    /// Mutable access to the raw bytes, for corruption tests
    pub fn encoded_edits_mut(&mut self) -> &mut [Vec<u8>] {
        &mut self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

impl SegmentSource for MemorySegment {
    fn segment_id(&self) -> u64 {
        self.id
    }

    fn next_edit(&mut self) -> LogCodecResult<Option<LogEdit>> {
        let Some(bytes) = self.edits.get(self.position) else {
            return Ok(None);
        };
        let edit = decode_edit(bytes)?;
        self.position += 1;
        Ok(Some(edit))
    }

    fn position(&self) -> usize {
        self.position
    }
}
