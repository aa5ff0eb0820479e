//! Persisted form of log edits
//!
//! ```text
//! edit   := unit (16 bytes) | u32 entry_count | frame*
//! frame  := u32 len | u8 kind | body | u32 crc32(kind | body)
//! ```
//!
//! `len` counts `kind | body`. Bodies per kind:
//!
//! - `0` data: raw bytes
//! - `1` retention marker: empty
//! - `2` index record: u32 len | index id (UTF-8) | encoded mutation
//!
//! Integers are little endian.

use crate::index_update::{IndexId, IndexUpdate};
use crate::mutation::{ByteReader, Mutation, MutationError};

use super::checksum::{compute_checksum, verify_checksum};
use super::edit::{LogEdit, LogEntry, RawEntry, UnitId};
use super::errors::{LogCodecError, LogCodecResult};

const KIND_DATA: u8 = 0;
const KIND_MARKER: u8 = 1;
const KIND_INDEX: u8 = 2;

const UNIT_LEN: usize = 16;
const FRAME_OVERHEAD: usize = 4 + 4;

/// Encode an edit into its persisted form
pub fn encode_edit(edit: &LogEdit) -> LogCodecResult<Vec<u8>> {
    let entries = edit.entries();
    let mut buf = Vec::with_capacity(UNIT_LEN + 4 + entries.len() * 64);
    buf.extend_from_slice(edit.unit().as_bytes());
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());

    for entry in &entries {
        let offset = buf.len();
        let body = encode_entry(entry).map_err(|source| LogCodecError::Mutation { offset, source })?;
        buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
        buf.extend_from_slice(&body);
        buf.extend_from_slice(&compute_checksum(&body).to_le_bytes());
    }

    Ok(buf)
}

fn encode_entry(entry: &LogEntry) -> Result<Vec<u8>, MutationError> {
    let body = match entry {
        LogEntry::Data(data) => {
            let mut body = Vec::with_capacity(1 + data.len());
            body.push(KIND_DATA);
            body.extend_from_slice(data);
            body
        }
        LogEntry::RetentionMarker => vec![KIND_MARKER],
        LogEntry::Index(record) => {
            let update = record.update();
            let mutation = update.mutation.encode()?;
            let index = update.index.as_str().as_bytes();
            let mut body = Vec::with_capacity(1 + 4 + index.len() + mutation.len());
            body.push(KIND_INDEX);
            body.extend_from_slice(&(index.len() as u32).to_le_bytes());
            body.extend_from_slice(index);
            body.extend_from_slice(&mutation);
            body
        }
    };
    Ok(body)
}

/// Decode a persisted edit.
///
/// Records of the returned edit start unfinished; replay never marks them.
pub fn decode_edit(data: &[u8]) -> LogCodecResult<LogEdit> {
    if data.len() < UNIT_LEN + 4 {
        return Err(LogCodecError::Truncated {
            offset: 0,
            needed: UNIT_LEN + 4 - data.len(),
        });
    }

    let mut unit = [0u8; UNIT_LEN];
    unit.copy_from_slice(&data[..UNIT_LEN]);
    let unit = UnitId::from_bytes(unit);
    let declared = u32::from_le_bytes([
        data[UNIT_LEN],
        data[UNIT_LEN + 1],
        data[UNIT_LEN + 2],
        data[UNIT_LEN + 3],
    ]);

    let mut offset = UNIT_LEN + 4;
    let mut entries = Vec::new();
    while offset < data.len() {
        let (entry, consumed) = decode_frame(data, offset)?;
        entries.push(entry);
        offset += consumed;
    }

    let found = entries.len() as u32;
    if found != declared {
        return Err(LogCodecError::EntryCountMismatch { declared, found });
    }

    Ok(LogEdit::from_raw(unit, entries))
}

fn decode_frame(data: &[u8], offset: usize) -> LogCodecResult<(RawEntry, usize)> {
    let available = data.len() - offset;
    if available < FRAME_OVERHEAD {
        return Err(LogCodecError::Truncated {
            offset,
            needed: FRAME_OVERHEAD - available,
        });
    }

    let len = u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]) as usize;
    let frame_len = FRAME_OVERHEAD + len;
    if available < frame_len {
        return Err(LogCodecError::Truncated {
            offset,
            needed: frame_len - available,
        });
    }

    let body = &data[offset + 4..offset + 4 + len];
    let crc_at = offset + 4 + len;
    let expected = u32::from_le_bytes([
        data[crc_at],
        data[crc_at + 1],
        data[crc_at + 2],
        data[crc_at + 3],
    ]);
    if !verify_checksum(body, expected) {
        return Err(LogCodecError::ChecksumMismatch {
            offset,
            expected,
            computed: compute_checksum(body),
        });
    }

    let Some((&kind, rest)) = body.split_first() else {
        return Err(LogCodecError::Truncated { offset, needed: 1 });
    };

    let entry = match kind {
        KIND_DATA => RawEntry::Data(rest.to_vec()),
        KIND_MARKER => RawEntry::RetentionMarker,
        KIND_INDEX => RawEntry::Index(decode_index_body(rest, offset)?),
        other => return Err(LogCodecError::UnknownEntryKind { offset, kind: other }),
    };

    Ok((entry, frame_len))
}

fn decode_index_body(body: &[u8], offset: usize) -> LogCodecResult<IndexUpdate> {
    let wrap = |source| LogCodecError::Mutation { offset, source };

    let mut reader = ByteReader::new(body);
    let index = reader.bytes().map_err(wrap)?;
    let index = String::from_utf8(index).map_err(|_| LogCodecError::InvalidIndexId { offset })?;
    let mutation = Mutation::decode(reader.rest()).map_err(wrap)?;

    Ok(IndexUpdate::new(IndexId::new(index), mutation))
}
