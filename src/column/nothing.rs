//! Nothing/Void columns: the NULL-only placeholder type. One ignored byte
//! per row on the wire.

use std::sync::Arc;

use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{Column, ColumnRef};

/// Column for `Nothing`.
pub struct ColumnNothing {
    type_: TypeNode,
    rows: usize,
}

impl ColumnNothing {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("Nothing"), rows: 0 }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, rows: 0 }
    }

    /// Append one placeholder row.
    pub fn append(&mut self) {
        self.rows += 1;
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

impl Default for ColumnNothing {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnNothing {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.rows
    }

    fn clear(&mut self) {
        self.rows = 0;
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        let have = reader.remaining();
        if !reader.try_advance(rows) {
            return Err(Error::Truncated {
                context: "Nothing",
                need: rows,
                have,
            });
        }
        self.rows += rows;
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for _ in 0..self.rows {
            writer.write_u8(0);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnNothing::with_type(self.type_.clone()))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
