//! LowCardinality columns (dictionary encoding).
//!
//! Wire layout:
//!
//! ```text
//! version: u64
//! flags:   u64   (low byte = index width: 0=u8 1=u16 2=u32 3=u64;
//!                 bit 9 = has-additional-keys)
//! dictionary size: u64
//! dictionary payload: full column of the BASE type
//! index count: u64  (== row_count)
//! indices: row_count integers of the flagged width
//! ```
//!
//! For `LowCardinality(Nullable(T))` the dictionary payload uses the base
//! type `T`; NULL is represented through the index sentinel — dictionary
//! entry 0 holds the type's default value and every null row points at
//! it. A non-default first slot is surfaced as
//! [`Error::MalformedType`] rather than silently coerced.
//!
//! The decoder exposes the dictionary-encoded pair directly
//! (dictionary + indices, value-by-index lookup). The writer rebuilds the
//! dictionary from scratch per block and picks the narrowest index width
//! that addresses it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::options::CodecOptions;
use crate::pool::{self, Pooled};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::string::ColumnString;
use super::{column_mut, create_column, Column, ColumnRef};

const HAS_ADDITIONAL_KEYS_BIT: u64 = 1 << 9;
const INDEX_WIDTH_MASK: u64 = 0xFF;

/// Column for `LowCardinality(T)` and `LowCardinality(Nullable(T))`.
pub struct ColumnLowCardinality {
    type_: TypeNode,
    /// Dictionary over the base (never `Nullable`) type.
    dictionary: ColumnRef,
    indices: Pooled<u64>,
    nullable: bool,
    /// Version word observed on decode; written as 0.
    version: u64,
    /// Builder-path dedup map for string dictionaries.
    lookup: HashMap<Arc<str>, u64>,
}

impl ColumnLowCardinality {
    /// Create from a parsed `LowCardinality` type.
    pub fn new(type_: TypeNode, options: &CodecOptions) -> Result<Self> {
        let inner = type_.inner()?;
        let (base, nullable) = if inner.is("Nullable") {
            (inner.inner()?, true)
        } else {
            (inner, false)
        };
        let dictionary = create_column(base, options)?;
        Ok(Self {
            type_,
            dictionary,
            indices: pool::rent_offsets(256)?,
            nullable,
            version: 0,
            lookup: HashMap::new(),
        })
    }

    /// Whether the inner type is `Nullable`.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The serialization version word observed on decode (written as 0).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The dictionary column (base type).
    pub fn dictionary(&self) -> &ColumnRef {
        &self.dictionary
    }

    /// Unique values currently in the dictionary (the null sentinel
    /// included when nullable).
    pub fn dictionary_size(&self) -> usize {
        self.dictionary.size()
    }

    /// The raw index of the row at `index`.
    pub fn index_at(&self, index: usize) -> u64 {
        self.indices[index]
    }

    /// Whether the row at `index` is NULL (nullable columns only).
    pub fn is_null_at(&self, index: usize) -> bool {
        self.nullable && self.indices.get(index) == Some(&0)
    }

    /// Row value through the dictionary, for string dictionaries.
    /// NULL rows of a nullable column read as `None`.
    pub fn str_at(&self, index: usize) -> Option<&str> {
        if self.is_null_at(index) {
            return None;
        }
        let slot = *self.indices.get(index)? as usize;
        let strings =
            self.dictionary.as_any().downcast_ref::<ColumnString>()?;
        strings.get(slot)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when no rows are held.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn ensure_null_sentinel(&mut self) -> Result<()> {
        if self.nullable && self.dictionary.size() == 0 {
            let dict = column_mut(&mut self.dictionary)?;
            let strings = dict
                .as_any_mut()
                .downcast_mut::<ColumnString>()
                .ok_or_else(|| {
                    Error::UnsupportedType(format!(
                        "builder path for {} requires a String dictionary",
                        self.type_.original_text
                    ))
                })?;
            strings.append("");
        }
        Ok(())
    }

    /// Append one string value, deduplicating through the per-block
    /// dictionary. Builder path for string dictionaries.
    pub fn append(&mut self, value: &str) -> Result<()> {
        self.ensure_null_sentinel()?;
        if let Some(&slot) = self.lookup.get(value) {
            self.indices.push(slot);
            return Ok(());
        }
        let slot = self.dictionary.size() as u64;
        {
            let dict = column_mut(&mut self.dictionary)?;
            let strings = dict
                .as_any_mut()
                .downcast_mut::<ColumnString>()
                .ok_or_else(|| {
                    Error::UnsupportedType(format!(
                        "builder path for {} requires a String dictionary",
                        self.type_.original_text
                    ))
                })?;
            strings.append(value);
        }
        self.lookup.insert(Arc::from(value), slot);
        self.indices.push(slot);
        Ok(())
    }

    /// Append a NULL row (nullable columns only).
    pub fn append_null(&mut self) -> Result<()> {
        if !self.nullable {
            return Err(Error::SchemaMismatch(format!(
                "{} does not admit NULL",
                self.type_.original_text
            )));
        }
        self.ensure_null_sentinel()?;
        self.indices.push(0);
        Ok(())
    }

    /// Assemble from an already-built dictionary and index vector
    /// (builder path for non-string dictionaries).
    pub fn from_parts(
        type_: TypeNode,
        dictionary: ColumnRef,
        indices: Vec<u64>,
    ) -> Result<Self> {
        let inner = type_.inner()?;
        let nullable = inner.is("Nullable");
        let dict_size = dictionary.size() as u64;
        if let Some(&bad) =
            indices.iter().find(|&&index| index >= dict_size)
        {
            return Err(Error::Bug(format!(
                "index {} outside dictionary of {}",
                bad, dict_size
            )));
        }
        let mut pooled = pool::rent_offsets(indices.len().max(1))?;
        pooled.extend_from_slice(&indices);
        Ok(Self {
            type_,
            dictionary,
            indices: pooled,
            nullable,
            version: 0,
            lookup: HashMap::new(),
        })
    }

    fn index_width_for(dictionary_size: u64) -> u64 {
        if dictionary_size <= u64::from(u8::MAX) + 1 {
            0
        } else if dictionary_size <= u64::from(u16::MAX) + 1 {
            1
        } else if dictionary_size <= u64::from(u32::MAX) + 1 {
            2
        } else {
            3
        }
    }
}

impl Column for ColumnLowCardinality {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.indices.len()
    }

    fn clear(&mut self) {
        self.indices.clear();
        self.lookup.clear();
        if let Ok(dict) = column_mut(&mut self.dictionary) {
            dict.clear();
        }
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        self.version = reader.read_u64()?;
        let flags = reader.read_u64()?;
        let width_tag = flags & INDEX_WIDTH_MASK;
        if width_tag > 3 {
            return Err(Error::CorruptFrame(format!(
                "LowCardinality index width tag {}",
                width_tag
            )));
        }

        let dictionary_size = reader.read_u64()? as usize;
        if dictionary_size > 0 {
            column_mut(&mut self.dictionary)?
                .load_body(reader, dictionary_size)?;
        }
        if self.nullable {
            if dictionary_size == 0 {
                return Err(Error::MalformedType(format!(
                    "{}: empty dictionary leaves no null slot",
                    self.type_.original_text
                )));
            }
            if !self.dictionary.is_default_at(0) {
                return Err(Error::MalformedType(format!(
                    "{}: dictionary slot 0 must hold the null sentinel",
                    self.type_.original_text
                )));
            }
        }

        let index_count = reader.read_u64()? as usize;
        if index_count != rows {
            return Err(Error::CorruptFrame(format!(
                "LowCardinality index count {} for {} rows",
                index_count, rows
            )));
        }

        self.indices.reserve(rows);
        for _ in 0..rows {
            let index = match width_tag {
                0 => reader.read_u8()? as u64,
                1 => reader.read_u16()? as u64,
                2 => reader.read_u32()? as u64,
                _ => reader.read_u64()?,
            };
            if index >= dictionary_size as u64 {
                return Err(Error::CorruptFrame(format!(
                    "LowCardinality index {} outside dictionary of {}",
                    index, dictionary_size
                )));
            }
            self.indices.push(index);
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        let dictionary_size = self.dictionary.size() as u64;
        let width_tag = Self::index_width_for(dictionary_size);

        writer.write_u64(0);
        writer.write_u64(width_tag | HAS_ADDITIONAL_KEYS_BIT);
        writer.write_u64(dictionary_size);
        self.dictionary.save_body(writer)?;
        writer.write_u64(self.indices.len() as u64);
        for &index in self.indices.iter() {
            match width_tag {
                0 => writer.write_u8(index as u8),
                1 => writer.write_u16(index as u16),
                2 => writer.write_u32(index as u32),
                _ => writer.write_u64(index),
            }
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnLowCardinality {
            type_: self.type_.clone(),
            dictionary: self.dictionary.clone_empty(),
            indices: pool::rent_offsets(256).expect("pool rental"),
            nullable: self.nullable,
            version: 0,
            lookup: HashMap::new(),
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
    use crate::types::parse_type;

    fn low_cardinality(text: &str) -> ColumnLowCardinality {
        ColumnLowCardinality::new(
            parse_type(text).unwrap(),
            &CodecOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn reference_scenario_five_rows() {
        // ["x", "y", "x", "x", "y"]: dictionary of 2, u8 indices.
        let mut col = low_cardinality("LowCardinality(String)");
        for value in ["x", "y", "x", "x", "y"] {
            col.append(value).unwrap();
        }
        assert_eq!(col.dictionary_size(), 2);

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u64().unwrap(), 0); // version
        assert_eq!(r.read_u64().unwrap(), 0x0200); // u8 width + keys bit
        assert_eq!(r.read_u64().unwrap(), 2); // dictionary size
        assert_eq!(r.read_string().unwrap(), "x");
        assert_eq!(r.read_string().unwrap(), "y");
        assert_eq!(r.read_u64().unwrap(), 5); // index count
        let mut indices = Vec::new();
        for _ in 0..5 {
            indices.push(r.read_u8().unwrap());
        }
        assert_eq!(indices, vec![0, 1, 0, 0, 1]);
        assert!(r.is_empty());

        let mut col2 = low_cardinality("LowCardinality(String)");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 5).unwrap();
        let values: Vec<&str> =
            (0..5).map(|i| col2.str_at(i).unwrap()).collect();
        assert_eq!(values, vec!["x", "y", "x", "x", "y"]);
    }

    #[test]
    fn nullable_uses_index_sentinel() {
        let mut col =
            low_cardinality("LowCardinality(Nullable(String))");
        col.append("a").unwrap();
        col.append_null().unwrap();
        col.append("a").unwrap();
        // Sentinel occupies slot 0.
        assert_eq!(col.dictionary_size(), 2);

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut col2 =
            low_cardinality("LowCardinality(Nullable(String))");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 3).unwrap();
        assert_eq!(col2.str_at(0), Some("a"));
        assert!(col2.is_null_at(1));
        assert_eq!(col2.str_at(1), None);
        assert_eq!(col2.str_at(2), Some("a"));
    }

    #[test]
    fn non_default_sentinel_is_malformed() {
        // Hand-build a nullable payload whose first dictionary slot holds
        // a non-empty value.
        let mut w = ByteWriter::new();
        w.write_u64(0);
        w.write_u64(HAS_ADDITIONAL_KEYS_BIT); // u8 indices
        w.write_u64(1);
        w.write_string("not-null");
        w.write_u64(1);
        w.write_u8(0);
        let bytes = w.as_slice().to_vec();

        let mut col =
            low_cardinality("LowCardinality(Nullable(String))");
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            col.load_body(&mut r, 1),
            Err(Error::MalformedType(_))
        ));
    }

    #[test]
    fn wide_dictionary_widens_indices() {
        let mut col = low_cardinality("LowCardinality(String)");
        for i in 0..300 {
            col.append(&format!("value-{}", i)).unwrap();
        }
        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut r = ByteReader::new(&bytes);
        r.read_u64().unwrap();
        let flags = r.read_u64().unwrap();
        assert_eq!(flags & INDEX_WIDTH_MASK, 1); // u16 indices

        let mut col2 = low_cardinality("LowCardinality(String)");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 300).unwrap();
        assert_eq!(col2.str_at(299), Some("value-299"));
    }

    #[test]
    fn index_outside_dictionary_rejected() {
        let mut w = ByteWriter::new();
        w.write_u64(0);
        w.write_u64(HAS_ADDITIONAL_KEYS_BIT);
        w.write_u64(1);
        w.write_string("only");
        w.write_u64(1);
        w.write_u8(7);
        let bytes = w.as_slice().to_vec();

        let mut col = low_cardinality("LowCardinality(String)");
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            col.load_body(&mut r, 1),
            Err(Error::CorruptFrame(_))
        ));
    }

    #[test]
    fn all_index_widths_decode() {
        let widths: [(u64, fn(&mut ByteWriter, u64)); 4] = [
            (0, |w, i| w.write_u8(i as u8)),
            (1, |w, i| w.write_u16(i as u16)),
            (2, |w, i| w.write_u32(i as u32)),
            (3, |w, i| w.write_u64(i)),
        ];
        for (tag, write) in widths {
            let mut w = ByteWriter::new();
            w.write_u64(1); // decoders tolerate any version word
            w.write_u64(tag | HAS_ADDITIONAL_KEYS_BIT);
            w.write_u64(2);
            w.write_string("a");
            w.write_string("b");
            w.write_u64(3);
            for index in [0u64, 1, 1] {
                write(&mut w, index);
            }
            let bytes = w.as_slice().to_vec();

            let mut col = low_cardinality("LowCardinality(String)");
            let mut r = ByteReader::new(&bytes);
            col.load_body(&mut r, 3).unwrap();
            assert!(r.is_empty(), "width tag {}", tag);
            assert_eq!(col.str_at(2), Some("b"));
        }
    }
}
