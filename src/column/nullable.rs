//! Nullable columns.
//!
//! Wire layout: `row_count` null-flag bytes (0 = present, non-zero =
//! null), then the *full* inner column. Null slots still occupy wire
//! bytes in the inner payload; the mask is applied after the inner column
//! decodes, so those bytes are consumed consistently and ignored.

use std::sync::Arc;

use crate::options::CodecOptions;
use crate::pool::{self, Pooled};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{column_mut, create_column, Column, ColumnRef};

/// Column for `Nullable(T)`.
pub struct ColumnNullable {
    type_: TypeNode,
    nested: ColumnRef,
    nulls: Pooled<u8>,
}

impl ColumnNullable {
    /// Create from a parsed `Nullable` type.
    pub fn new(type_: TypeNode, options: &CodecOptions) -> Result<Self> {
        let nested = create_column(type_.inner()?, options)?;
        Ok(Self { type_, nested, nulls: pool::rent_bytes(256)? })
    }

    /// Wrap an existing inner column.
    pub fn with_nested(nested: ColumnRef) -> Result<Self> {
        let type_ =
            TypeNode::wrapping("Nullable", nested.type_node().clone());
        Ok(Self { type_, nested, nulls: pool::rent_bytes(256)? })
    }

    /// Mark the next row as null. The caller appends a placeholder value
    /// to the inner column separately; row counts are reconciled at
    /// encode time.
    pub fn append_null(&mut self) {
        self.nulls.push(1);
    }

    /// Mark the next row as present. The caller appends the value to the
    /// inner column separately.
    pub fn append_non_null(&mut self) {
        self.nulls.push(0);
    }

    /// Whether the row at `index` is null.
    pub fn is_null(&self, index: usize) -> bool {
        self.nulls.get(index).map(|&flag| flag != 0).unwrap_or(false)
    }

    /// The inner column.
    pub fn nested(&self) -> &ColumnRef {
        &self.nested
    }

    /// Mutable access to the inner column (building path).
    pub fn nested_mut(&mut self) -> Result<&mut (dyn Column + 'static)> {
        column_mut(&mut self.nested)
    }

    /// The raw null mask.
    pub fn null_mask(&self) -> &[u8] {
        &self.nulls
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.nulls.is_empty()
    }
}

impl Column for ColumnNullable {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.nulls.len()
    }

    fn clear(&mut self) {
        self.nulls.clear();
        // Inner columns of a decoded block are uniquely held.
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
        let Some(mask) = reader.try_get_contiguous(rows) else {
            return Err(Error::Truncated {
                context: "null mask",
                need: rows,
                have,
            });
        };
        self.nulls.extend_from_slice(mask);
        column_mut(&mut self.nested)?.load_body(reader, rows)
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        if self.nested.size() != self.nulls.len() {
            return Err(Error::Bug(format!(
                "nullable mask has {} rows, inner column {}",
                self.nulls.len(),
                self.nested.size()
            )));
        }
        writer.write_bytes(&self.nulls);
        self.nested.save_body(writer)
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnNullable {
            type_: self.type_.clone(),
            nested: self.nested.clone_empty(),
            nulls: pool::rent_bytes(256).expect("pool rental"),
        })
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
