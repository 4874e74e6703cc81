//! Data blocks: the unit of wire transfer.
//!
//! A block is a collection of named, typed columns with the same number of
//! rows, plus the block-info metadata the server attaches. The block owns
//! its columns; dropping the block releases their pooled storage.

use crate::column::ColumnRef;
use crate::{Error, Result};

/// Block metadata carried between the table name and the column counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// True when this block carries group-by overflow rows.
    pub is_overflow: bool,
    /// Two-level aggregation bucket, `-1` when unused.
    pub bucket_num: i32,
}

impl Default for BlockInfo {
    fn default() -> Self {
        Self { is_overflow: false, bucket_num: -1 }
    }
}

/// One named column inside a block.
pub struct BlockColumn {
    /// Column name, preserved verbatim on the wire.
    pub name: String,
    /// The type text exactly as it appeared (or will appear) on the wire.
    pub type_text: String,
    /// Custom-serialization kind byte, if the descriptor carried one.
    pub custom_serialization: Option<u8>,
    /// The decoded (or to-be-encoded) column payload.
    pub column: ColumnRef,
}

/// A block: named columns sharing one row count.
pub struct Block {
    table_name: String,
    info: BlockInfo,
    columns: Vec<BlockColumn>,
    rows: usize,
}

impl Block {
    /// Create an empty block (the bulk-insert terminator shape).
    pub fn new() -> Self {
        Self {
            table_name: String::new(),
            info: BlockInfo::default(),
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Create an empty block with column capacity reserved.
    pub fn with_capacity(cols: usize) -> Self {
        Self {
            table_name: String::new(),
            info: BlockInfo::default(),
            columns: Vec::with_capacity(cols),
            rows: 0,
        }
    }

    /// The temporary-table name; empty for query results.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Set the temporary-table name.
    pub fn set_table_name(&mut self, name: impl Into<String>) {
        self.table_name = name.into();
    }

    /// Append a named column. The first column fixes the row count; later
    /// columns must match it.
    pub fn append_column(
        &mut self,
        name: impl Into<String>,
        column: ColumnRef,
    ) -> Result<()> {
        let name = name.into();
        if self.columns.is_empty() {
            self.rows = column.size();
        } else if column.size() != self.rows {
            return Err(Error::SchemaMismatch(format!(
                "all columns in a block must have the same row count: \
                 '{}' has {} rows, block has {}",
                name,
                column.size(),
                self.rows
            )));
        }
        let type_text = column.type_node().original_text.clone();
        self.columns.push(BlockColumn {
            name,
            type_text,
            custom_serialization: None,
            column,
        });
        Ok(())
    }

    /// Append a column whose descriptor came off the wire, keeping the
    /// verbatim type text and custom-serialization byte.
    pub(crate) fn push_wire_column(&mut self, item: BlockColumn) {
        if self.columns.is_empty() {
            self.rows = item.column.size();
        }
        self.columns.push(item);
    }

    pub(crate) fn set_row_count(&mut self, rows: usize) {
        self.rows = rows;
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Column payload by index.
    pub fn column(&self, index: usize) -> Option<&ColumnRef> {
        self.columns.get(index).map(|item| &item.column)
    }

    /// Column name by index.
    pub fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|item| item.name.as_str())
    }

    /// Wire type text by index.
    pub fn type_text(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|item| item.type_text.as_str())
    }

    /// Column payload by name.
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnRef> {
        self.columns
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.column)
    }

    /// Block metadata.
    pub fn info(&self) -> &BlockInfo {
        &self.info
    }

    /// Replace the block metadata.
    pub fn set_info(&mut self, info: BlockInfo) {
        self.info = info;
    }

    /// Iterate over the column items.
    pub fn iter(&self) -> impl Iterator<Item = &BlockColumn> {
        self.columns.iter()
    }

    /// True when the block has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns.is_empty()
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}
