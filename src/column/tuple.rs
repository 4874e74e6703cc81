//! Tuple and Nested columns.
//!
//! `Tuple(T1, ..., Tn)` is columnar on the wire: the full T1 column, then
//! the full T2 column, and so on, with no per-row delimiters. Named
//! tuples are wire-identical; the names are metadata only.
//!
//! `Nested(f1 T1, ..., fn Tn)` serializes as
//! `Tuple(Array(T1), ..., Array(Tn))`; each field reads back as a per-row
//! array.

use std::sync::Arc;

use crate::options::CodecOptions;
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{column_mut, create_column, Column, ColumnRef};

/// Column for `Tuple(...)`, named tuples, and `Nested(...)`.
pub struct ColumnTuple {
    type_: TypeNode,
    fields: Vec<ColumnRef>,
    field_names: Vec<String>,
}

impl ColumnTuple {
    /// Create from a parsed `Tuple` or `Nested` type.
    pub fn new(type_: TypeNode, options: &CodecOptions) -> Result<Self> {
        let mut fields = Vec::with_capacity(type_.type_arguments.len());
        for argument in &type_.type_arguments {
            let element = if type_.is("Nested") {
                // Nested fields travel as Array(T).
                TypeNode::wrapping("Array", argument.clone())
            } else {
                argument.clone()
            };
            fields.push(create_column(&element, options)?);
        }
        let field_names = type_.field_names.clone();
        Ok(Self { type_, fields, field_names })
    }

    /// Number of tuple elements.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Element column at `index`.
    pub fn field(&self, index: usize) -> Option<&ColumnRef> {
        self.fields.get(index)
    }

    /// Element column by field name (named tuples and Nested only).
    pub fn field_by_name(&self, name: &str) -> Option<&ColumnRef> {
        let index =
            self.field_names.iter().position(|field| field == name)?;
        self.fields.get(index)
    }

    /// Mutable element column at `index` (building path).
    pub fn field_mut(&mut self, index: usize) -> Result<&mut (dyn Column + 'static)> {
        let field = self.fields.get_mut(index).ok_or_else(|| {
            Error::Bug(format!("tuple field {} out of range", index))
        })?;
        column_mut(field)
    }

    /// The field names, empty for unnamed tuples.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.fields.first().map(|field| field.size()).unwrap_or(0)
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Column for ColumnTuple {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.len()
    }

    fn clear(&mut self) {
        for field in &mut self.fields {
            if let Ok(field) = column_mut(field) {
                field.clear();
            }
        }
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        for field in &mut self.fields {
            column_mut(field)?.load_body(reader, rows)?;
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        let rows = self.len();
        for field in &self.fields {
            if field.size() != rows {
                return Err(Error::Bug(format!(
                    "tuple field holds {} rows, expected {}",
                    field.size(),
                    rows
                )));
            }
            field.save_body(writer)?;
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnTuple {
            type_: self.type_.clone(),
            fields: self
                .fields
                .iter()
                .map(|field| field.clone_empty())
                .collect(),
            field_names: self.field_names.clone(),
        })
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
    use crate::column::array::ColumnArray;
    use crate::column::numeric::{ColumnInt64, ColumnUInt32};
    use crate::column::string::ColumnString;
    use crate::types::parse_type;

    fn tuple(text: &str) -> ColumnTuple {
        ColumnTuple::new(parse_type(text).unwrap(), &CodecOptions::default())
            .unwrap()
    }

    #[test]
    fn columnar_layout() {
        let mut col = tuple("Tuple(UInt32, String)");
        {
            let ints = col.field_mut(0).unwrap();
            let ints =
                ints.as_any_mut().downcast_mut::<ColumnUInt32>().unwrap();
            ints.append(1);
            ints.append(2);
        }
        {
            let strings = col.field_mut(1).unwrap();
            let strings = strings
                .as_any_mut()
                .downcast_mut::<ColumnString>()
                .unwrap();
            strings.append("one");
            strings.append("two");
        }

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        // All first-element values precede all second-element values.
        assert_eq!(&w.as_slice()[..8], &[1, 0, 0, 0, 2, 0, 0, 0]);

        let bytes = w.as_slice().to_vec();
        let mut col2 = tuple("Tuple(UInt32, String)");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 2).unwrap();
        assert!(r.is_empty());
        assert_eq!(col2.len(), 2);

        let strings = col2
            .field(1)
            .unwrap()
            .as_any()
            .downcast_ref::<ColumnString>()
            .unwrap();
        assert_eq!(strings.get(1), Some("two"));
    }

    #[test]
    fn named_tuple_is_wire_identical() {
        let mut named = tuple("Tuple(id UInt32, name String)");
        let mut unnamed = tuple("Tuple(UInt32, String)");
        for col in [&mut named, &mut unnamed] {
            {
                let ints = col.field_mut(0).unwrap();
                ints.as_any_mut()
                    .downcast_mut::<ColumnUInt32>()
                    .unwrap()
                    .append(9);
            }
            {
                let strings = col.field_mut(1).unwrap();
                strings
                    .as_any_mut()
                    .downcast_mut::<ColumnString>()
                    .unwrap()
                    .append("nine");
            }
        }

        let mut w1 = ByteWriter::new();
        named.save_body(&mut w1).unwrap();
        let mut w2 = ByteWriter::new();
        unnamed.save_body(&mut w2).unwrap();
        assert_eq!(w1.as_slice(), w2.as_slice());

        assert!(named.field_by_name("name").is_some());
        assert!(unnamed.field_by_name("name").is_none());
    }

    #[test]
    fn nested_fields_become_arrays() {
        let mut col = tuple("Nested(key String, val Int64)");
        assert_eq!(col.field_count(), 2);

        {
            let keys = col.field_mut(0).unwrap();
            let keys =
                keys.as_any_mut().downcast_mut::<ColumnArray>().unwrap();
            {
                let flat = keys.nested_mut().unwrap();
                let strings = flat
                    .as_any_mut()
                    .downcast_mut::<ColumnString>()
                    .unwrap();
                strings.append("a");
                strings.append("b");
            }
            keys.append_len(2);
        }
        {
            let vals = col.field_mut(1).unwrap();
            let vals =
                vals.as_any_mut().downcast_mut::<ColumnArray>().unwrap();
            {
                let flat = vals.nested_mut().unwrap();
                let ints = flat
                    .as_any_mut()
                    .downcast_mut::<ColumnInt64>()
                    .unwrap();
                ints.append(10);
                ints.append(20);
            }
            vals.append_len(2);
        }

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut col2 = tuple("Nested(key String, val Int64)");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 1).unwrap();
        assert!(r.is_empty());

        let keys = col2
            .field_by_name("key")
            .unwrap()
            .as_any()
            .downcast_ref::<ColumnArray>()
            .unwrap();
        assert_eq!(keys.string_row(0).unwrap(), vec!["a", "b"]);
        let vals = col2
            .field_by_name("val")
            .unwrap()
            .as_any()
            .downcast_ref::<ColumnArray>()
            .unwrap();
        assert_eq!(vals.typed_row::<i64>(0), Some(&[10i64, 20][..]));
    }
}
