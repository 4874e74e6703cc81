//! Array columns.
//!
//! Wire layout: `row_count` cumulative offsets as u64 (`offset[i]` is the
//! total element count through row `i`), then one flat inner column of
//! `offset[row_count - 1]` elements.
//!
//! The column stores the flattened shape directly: one nested column plus
//! a pooled offsets vector, with zero-copy row spans for consumers that
//! can use them and materializing helpers for those that cannot. Both
//! shapes are wire-identical.

use std::sync::Arc;

use crate::options::CodecOptions;
use crate::pool::{self, Pooled};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::{ColumnVector, WireScalar};
use super::{column_mut, create_column, Column, ColumnRef};

/// Column for `Array(T)`, flattened.
pub struct ColumnArray {
    type_: TypeNode,
    nested: ColumnRef,
    offsets: Pooled<u64>,
}

impl ColumnArray {
    /// Create from a parsed `Array` type.
    pub fn new(type_: TypeNode, options: &CodecOptions) -> Result<Self> {
        let nested = create_column(type_.inner()?, options)?;
        Ok(Self { type_, nested, offsets: pool::rent_offsets(256)? })
    }

    /// Wrap an existing flat inner column with no rows yet.
    pub fn with_nested(nested: ColumnRef) -> Result<Self> {
        let type_ = TypeNode::wrapping("Array", nested.type_node().clone());
        Ok(Self { type_, nested, offsets: pool::rent_offsets(256)? })
    }

    /// Close the current row after the caller appended `len` elements to
    /// the inner column.
    pub fn append_len(&mut self, len: u64) {
        let total = self.offsets.last().copied().unwrap_or(0) + len;
        self.offsets.push(total);
    }

    /// The flat inner column.
    pub fn nested(&self) -> &ColumnRef {
        &self.nested
    }

    /// Mutable access to the flat inner column (building path).
    pub fn nested_mut(&mut self) -> Result<&mut (dyn Column + 'static)> {
        column_mut(&mut self.nested)
    }

    /// The cumulative offsets.
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    /// Element range `[start, end)` of the row at `index`.
    pub fn row_range(&self, index: usize) -> Option<(usize, usize)> {
        let end = *self.offsets.get(index)? as usize;
        let start = if index == 0 {
            0
        } else {
            self.offsets[index - 1] as usize
        };
        Some((start, end))
    }

    /// Element count of the row at `index`.
    pub fn row_len(&self, index: usize) -> Option<usize> {
        self.row_range(index).map(|(start, end)| end - start)
    }

    /// Zero-copy span of a fixed-width row: borrows straight out of the
    /// flat inner column.
    pub fn typed_row<T: WireScalar>(&self, index: usize) -> Option<&[T]> {
        let (start, end) = self.row_range(index)?;
        let inner =
            self.nested.as_any().downcast_ref::<ColumnVector<T>>()?;
        inner.values().get(start..end)
    }

    /// Materialize a row of strings (per-row accessor over an eager
    /// string inner column).
    pub fn string_row(&self, index: usize) -> Option<Vec<&str>> {
        let (start, end) = self.row_range(index)?;
        let inner = self
            .nested
            .as_any()
            .downcast_ref::<super::string::ColumnString>()?;
        (start..end).map(|i| inner.get(i)).collect()
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

impl Column for ColumnArray {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.offsets.len()
    }

    fn clear(&mut self) {
        self.offsets.clear();
        if let Ok(nested) = column_mut(&mut self.nested) {
            nested.clear();
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
                context: "array offsets",
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
                    "array offsets decrease: {} after {}",
                    offset, previous
                )));
            }
            previous = offset;
            self.offsets.push(base + offset);
        }

        let total = previous as usize;
        column_mut(&mut self.nested)?.load_body(reader, total)
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        let total = self.offsets.last().copied().unwrap_or(0);
        if self.nested.size() as u64 != total {
            return Err(Error::Bug(format!(
                "array offsets cover {} elements, inner column has {}",
                total,
                self.nested.size()
            )));
        }
        for &offset in self.offsets.iter() {
            writer.write_u64(offset);
        }
        self.nested.save_body(writer)
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnArray {
            type_: self.type_.clone(),
            nested: self.nested.clone_empty(),
            offsets: pool::rent_offsets(256).expect("pool rental"),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
