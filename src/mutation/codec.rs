//! Binary encoding of mutations
//!
//! Layout (all integers little endian):
//!
//! ```text
//! row        u32 len | bytes
//! durable    u8
//! attrs      u32 count | (u32 len | name | u32 len | value)*
//! cells      u32 count | (u32 len | family | u32 len | qualifier | u64 ts | u8 kind | u32 len | value)*
//! ```
//!
//! Only plain mutations are encodable. Merged mutations are rejected.

use super::errors::{MutationError, MutationResult};
use super::types::{Cell, CellKind, Mutation, RowKey};

impl Mutation {
    /// Serialize this mutation for embedding in a durability log record
    pub fn encode(&self) -> MutationResult<Vec<u8>> {
        if self.is_merged() {
            return Err(MutationError::MergedNotPersistable(self.row().to_string()));
        }

        let mut buf = Vec::with_capacity(64 + self.cell_count() * 32);
        put_bytes(&mut buf, self.row().as_bytes());
        buf.push(u8::from(self.is_durable()));

        let attributes: Vec<_> = self.attributes().collect();
        buf.extend_from_slice(&(attributes.len() as u32).to_le_bytes());
        for (name, value) in attributes {
            put_bytes(&mut buf, name.as_bytes());
            put_bytes(&mut buf, value);
        }

        buf.extend_from_slice(&(self.cell_count() as u32).to_le_bytes());
        for cell in self.cells() {
            put_bytes(&mut buf, &cell.family);
            put_bytes(&mut buf, &cell.qualifier);
            buf.extend_from_slice(&cell.timestamp.to_le_bytes());
            buf.push(cell.kind.as_u8());
            put_bytes(&mut buf, &cell.value);
        }

        Ok(buf)
    }

    /// Deserialize a mutation produced by [`Mutation::encode`]
    pub fn decode(data: &[u8]) -> MutationResult<Self> {
        let mut reader = ByteReader::new(data);

        let row = RowKey::new(reader.bytes()?);
        let durable = reader.u8()? != 0;
        let mut mutation = Mutation::new(row).with_durability(durable);

        let attr_count = reader.u32()?;
        for _ in 0..attr_count {
            let name = String::from_utf8(reader.bytes()?)
                .map_err(|_| MutationError::InvalidAttributeName)?;
            let value = reader.bytes()?;
            mutation.set_attribute_if_absent(&name, &value);
        }

        let cell_count = reader.u32()?;
        for _ in 0..cell_count {
            let family = reader.bytes()?;
            let qualifier = reader.bytes()?;
            let timestamp = reader.u64()?;
            let raw_kind = reader.u8()?;
            let kind = CellKind::from_u8(raw_kind).ok_or(MutationError::InvalidCellKind(raw_kind))?;
            let value = reader.bytes()?;
            mutation.add_cell(Cell {
                family,
                qualifier,
                timestamp,
                kind,
                value,
            });
        }

        let rest = reader.remaining();
        if rest != 0 {
            return Err(MutationError::TrailingBytes(rest));
        }
        Ok(mutation)
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// Cursor over an encoded buffer with bounds-checked reads.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize) -> MutationResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(MutationError::Truncated {
                offset: self.offset,
                needed: len - self.remaining(),
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub(crate) fn u8(&mut self) -> MutationResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u32(&mut self) -> MutationResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64(&mut self) -> MutationResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub(crate) fn bytes(&mut self) -> MutationResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.offset..];
        self.offset = self.data.len();
        slice
    }
}
