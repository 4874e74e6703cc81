//! Enum columns.
//!
//! `Enum8` travels as Int8 and `Enum16` as Int16. The name/value mapping
//! lives in the type grammar; the codec stores the numeric codes and
//! leaves symbol resolution to consumers, with a lookup helper over the
//! carried definition.

use std::sync::Arc;

use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::WireScalar;
use super::{Column, ColumnRef};

macro_rules! enum_column {
    ($name:ident, $raw:ty, $type_name:literal, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            type_: TypeNode,
            data: Vec<$raw>,
        }

        impl $name {
            /// Create from the parsed enum type carrying the definition.
            pub fn new(type_: TypeNode) -> Self {
                Self { type_, data: Vec::new() }
            }

            /// Append a numeric code.
            pub fn append(&mut self, code: $raw) {
                self.data.push(code);
            }

            /// Append by symbolic name, resolved against the definition.
            pub fn append_name(&mut self, name: &str) -> Result<()> {
                let code = self
                    .type_
                    .enum_entries()
                    .find(|(entry, _)| *entry == name)
                    .map(|(_, value)| value as $raw)
                    .ok_or_else(|| {
                        Error::SchemaMismatch(format!(
                            "'{}' is not a variant of {}",
                            name, self.type_.original_text
                        ))
                    })?;
                self.data.push(code);
                Ok(())
            }

            /// Numeric code at `index`; panics out of range.
            pub fn at(&self, index: usize) -> $raw {
                self.data[index]
            }

            /// Numeric code at `index`, if in range.
            pub fn get(&self, index: usize) -> Option<$raw> {
                self.data.get(index).copied()
            }

            /// Resolve the symbolic name of the code at `index`.
            pub fn name_at(&self, index: usize) -> Option<&str> {
                let code = *self.data.get(index)? as i64;
                self.type_
                    .enum_entries()
                    .find(|(_, value)| *value == code)
                    .map(|(name, _)| name)
            }

            /// Number of values.
            pub fn len(&self) -> usize {
                self.data.len()
            }

            /// True when no values are held.
            pub fn is_empty(&self) -> bool {
                self.data.is_empty()
            }

            /// The bulk code slice.
            pub fn values(&self) -> &[$raw] {
                &self.data
            }
        }

        impl Column for $name {
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
                let width = <$raw as WireScalar>::WIDTH;
                let have = reader.remaining();
                let Some(raw) = reader.try_get_contiguous(rows * width)
                else {
                    return Err(Error::Truncated {
                        context: $type_name,
                        need: rows * width,
                        have,
                    });
                };
                self.data.reserve(rows);
                self.data.extend(
                    raw.chunks_exact(width)
                        .map(<$raw as WireScalar>::from_le_slice),
                );
                Ok(())
            }

            fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
                for &code in &self.data {
                    <$raw as WireScalar>::write(code, writer);
                }
                Ok(())
            }

            fn clone_empty(&self) -> ColumnRef {
                Arc::new($name::new(self.type_.clone()))
            }

            fn is_default_at(&self, index: usize) -> bool {
                self.data.get(index).map(|&c| c == 0).unwrap_or(false)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
}

enum_column!(
    ColumnEnum8,
    i8,
    "Enum8",
    "Column for `Enum8`: Int8 codes with the mapping in the type."
);
enum_column!(
    ColumnEnum16,
    i16,
    "Enum16",
    "Column for `Enum16`: Int16 codes with the mapping in the type."
);
