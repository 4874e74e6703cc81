//! Map columns.
//!
//! `Map(K, V)` is semantically `Array(Tuple(K, V))` but with its own wire
//! shape: cumulative u64 offsets, then *all* keys as one flat K column,
//! then all values as one flat V column of the same total length.

use std::sync::Arc;

use crate::options::CodecOptions;
use crate::pool::{self, Pooled};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::WireScalar;
use super::{column_mut, create_column, Column, ColumnRef};

/// Column for `Map(K, V)`.
pub struct ColumnMap {
    type_: TypeNode,
    offsets: Pooled<u64>,
    keys: ColumnRef,
    values: ColumnRef,
}

impl ColumnMap {
    /// Create from a parsed `Map` type.
    pub fn new(type_: TypeNode, options: &CodecOptions) -> Result<Self> {
        let keys = create_column(&type_.type_arguments[0], options)?;
        let values = create_column(&type_.type_arguments[1], options)?;
        Ok(Self { type_, offsets: pool::rent_offsets(256)?, keys, values })
    }

    /// Close the current row after the caller appended `len` entries to
    /// both flat columns.
    pub fn append_len(&mut self, len: u64) {
        let total = self.offsets.last().copied().unwrap_or(0) + len;
        self.offsets.push(total);
    }

    /// The flat key column.
    pub fn keys(&self) -> &ColumnRef {
        &self.keys
    }

    /// The flat value column.
    pub fn values(&self) -> &ColumnRef {
        &self.values
    }

    /// Mutable access to the flat key column (building path).
    pub fn keys_mut(&mut self) -> Result<&mut (dyn Column + 'static)> {
        column_mut(&mut self.keys)
    }

    /// Mutable access to the flat value column (building path).
    pub fn values_mut(&mut self) -> Result<&mut (dyn Column + 'static)> {
        column_mut(&mut self.values)
    }

    /// Entry range `[start, end)` of the row at `index`.
    pub fn row_range(&self, index: usize) -> Option<(usize, usize)> {
        let end = *self.offsets.get(index)? as usize;
        let start = if index == 0 {
            0
        } else {
            self.offsets[index - 1] as usize
        };
        Some((start, end))
    }

    /// Entry count of the row at `index`.
    pub fn row_len(&self, index: usize) -> Option<usize> {
        self.row_range(index).map(|(start, end)| end - start)
    }

    /// The cumulative offsets.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl Column for ColumnMap {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.offsets.len()
    }

    fn clear(&mut self) {
        self.offsets.clear();
        if let Ok(keys) = column_mut(&mut self.keys) {
            keys.clear();
        }
        if let Ok(values) = column_mut(&mut self.values) {
            values.clear();
        }
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows * 8) else {
            return Err(Error::Truncated {
                context: "map offsets",
                need: rows * 8,
                have,
            });
        };

        let base = self.offsets.last().copied().unwrap_or(0);
        let mut previous = 0u64;
        self.offsets.reserve(rows);
        for chunk in raw.chunks_exact(8) {
            let offset = <u64 as WireScalar>::from_le_slice(chunk);
            if offset < previous {
                return Err(Error::CorruptFrame(format!(
                    "map offsets decrease: {} after {}",
                    offset, previous
                )));
            }
            previous = offset;
            self.offsets.push(base + offset);
        }

        let total = previous as usize;
        column_mut(&mut self.keys)?.load_body(reader, total)?;
        column_mut(&mut self.values)?.load_body(reader, total)
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        let total = self.offsets.last().copied().unwrap_or(0) as usize;
        if self.keys.size() != total || self.values.size() != total {
            return Err(Error::Bug(format!(
                "map offsets cover {} entries, keys {} / values {}",
                total,
                self.keys.size(),
                self.values.size()
            )));
        }
        for &offset in self.offsets.iter() {
            writer.write_u64(offset);
        }
        self.keys.save_body(writer)?;
        self.values.save_body(writer)
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnMap {
            type_: self.type_.clone(),
            offsets: pool::rent_offsets(256).expect("pool rental"),
            keys: self.keys.clone_empty(),
            values: self.values.clone_empty(),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
