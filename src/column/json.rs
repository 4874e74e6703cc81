//! JSON columns.
//!
//! The payload opens with a varint serialization version. Version 1 is a
//! sequence of length-prefixed UTF-8 JSON documents, one per row; the
//! deprecated object serializations (versions 0 and 3) are rejected with
//! [`Error::UnsupportedJsonFormat`]. The writer always emits version 1.

use std::sync::Arc;

use crate::protocol::JSON_SERIALIZATION_VERSION_STRING;
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{Column, ColumnRef};

/// Column for `JSON`: one serialized document per row.
pub struct ColumnJson {
    type_: TypeNode,
    data: Vec<String>,
}

impl ColumnJson {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("JSON"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one document.
    pub fn append(&mut self, document: impl Into<String>) {
        self.data.push(document.into());
    }

    /// Document at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(|s| s.as_str())
    }

    /// Document at `index`; panics out of range.
    pub fn at(&self, index: usize) -> &str {
        &self.data[index]
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no documents are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for ColumnJson {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnJson {
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
        let version = reader.read_varint()?;
        if version != JSON_SERIALIZATION_VERSION_STRING {
            return Err(Error::UnsupportedJsonFormat(version));
        }
        self.data.reserve(rows);
        for _ in 0..rows {
            self.data.push(reader.read_string()?);
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_varint(JSON_SERIALIZATION_VERSION_STRING);
        for document in &self.data {
            writer.write_string(document);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnJson::with_type(self.type_.clone()))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut col = ColumnJson::new();
        col.append(r#"{"a": 1}"#);
        col.append(r#"{"b": [true, null]}"#);

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        // Version byte leads the payload.
        assert_eq!(w.as_slice()[0], 1);

        let bytes = w.as_slice().to_vec();
        let mut col2 = ColumnJson::new();
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 2).unwrap();
        assert_eq!(col2.get(0), Some(r#"{"a": 1}"#));
        assert_eq!(col2.get(1), Some(r#"{"b": [true, null]}"#));
    }

    #[test]
    fn deprecated_versions_rejected() {
        for version in [0u64, 3] {
            let mut w = ByteWriter::new();
            w.write_varint(version);
            w.write_string("{}");
            let bytes = w.as_slice().to_vec();

            let mut col = ColumnJson::new();
            let mut r = ByteReader::new(&bytes);
            let err = col.load_body(&mut r, 1).unwrap_err();
            assert!(matches!(
                err,
                Error::UnsupportedJsonFormat(v) if v == version
            ));
        }
    }
}
