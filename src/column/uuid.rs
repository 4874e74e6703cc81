//! UUID columns.
//!
//! The sixteen wire bytes are a transposition of the canonical layout:
//! each 8-byte half is reversed, so canonical
//! `00112233-4455-6677-8899-AABBCCDDEEFF` travels as
//! `77 66 55 44 33 22 11 00 FF EE DD CC BB AA 99 88`. Decode transposes
//! back; encode performs the inverse.

use std::sync::Arc;

use uuid::Uuid;

use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{Column, ColumnRef};

fn wire_to_uuid(wire: &[u8]) -> Uuid {
    let mut canonical = [0u8; 16];
    for i in 0..8 {
        canonical[i] = wire[7 - i];
        canonical[8 + i] = wire[15 - i];
    }
    Uuid::from_bytes(canonical)
}

fn uuid_to_wire(value: Uuid) -> [u8; 16] {
    let canonical = value.as_bytes();
    let mut wire = [0u8; 16];
    for i in 0..8 {
        wire[i] = canonical[7 - i];
        wire[8 + i] = canonical[15 - i];
    }
    wire
}

/// Column for `UUID`.
pub struct ColumnUuid {
    type_: TypeNode,
    data: Vec<Uuid>,
}

impl ColumnUuid {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("UUID"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one value.
    pub fn append(&mut self, value: Uuid) {
        self.data.push(value);
    }

    /// Value at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Uuid> {
        self.data.get(index).copied()
    }

    /// Value at `index`; panics out of range.
    pub fn at(&self, index: usize) -> Uuid {
        self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bulk value slice.
    pub fn values(&self) -> &[Uuid] {
        &self.data
    }
}

impl Default for ColumnUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnUuid {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows * 16) else {
            return Err(Error::Truncated {
                context: "UUID",
                need: rows * 16,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(raw.chunks_exact(16).map(wire_to_uuid));
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_bytes(&uuid_to_wire(value));
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnUuid::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|u| u.is_nil()).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Encode one UUID into its wire transposition (the bulk-insert extractor
/// path writes values without building a column).
pub(crate) fn write_uuid(writer: &mut ByteWriter, value: Uuid) {
    writer.write_bytes(&uuid_to_wire(value));
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn reference_transposition() {
        let canonical =
            Uuid::parse_str("00112233-4455-6677-8899-AABBCCDDEEFF")
                .unwrap();
        let wire = uuid_to_wire(canonical);
        assert_eq!(
            wire,
            [
                0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11, 0x00, 0xFF,
                0xEE, 0xDD, 0xCC, 0xBB, 0xAA, 0x99, 0x88
            ]
        );
        assert_eq!(wire_to_uuid(&wire), canonical);
    }

    #[test]
    fn column_round_trip() {
        let values = [
            Uuid::nil(),
            Uuid::parse_str("00112233-4455-6677-8899-AABBCCDDEEFF")
                .unwrap(),
            Uuid::parse_str("ffffffff-ffff-ffff-ffff-ffffffffffff")
                .unwrap(),
        ];
        let mut col = ColumnUuid::new();
        for &v in &values {
            col.append(v);
        }

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        assert_eq!(w.len(), 48);

        let bytes = w.as_slice().to_vec();
        let mut col2 = ColumnUuid::new();
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 3).unwrap();
        assert_eq!(col2.values(), &values);
    }

    #[test]
    fn nil_is_default() {
        let mut col = ColumnUuid::new();
        col.append(Uuid::nil());
        col.append(Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap());
        assert!(col.is_default_at(0));
        assert!(!col.is_default_at(1));
    }
}
