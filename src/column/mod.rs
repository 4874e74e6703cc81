//! Column codecs: one encoder/decoder pair per ClickHouse type.
//!
//! Concrete columns implement the dyn-compatible [`Column`] contract and
//! are produced by [`create_column`], which dispatches on the parsed type
//! grammar. Composite columns (`Nullable`, `Array`, `Map`, `Tuple`,
//! `LowCardinality`) hold their inner columns through the same trait.
//!
//! ## Type nesting rules
//!
//! ClickHouse only permits certain nestings; the factory builds whatever
//! the grammar allows, and the server is the arbiter of legality:
//!
//! - `Array(Nullable(T))` — each element may be NULL
//! - `LowCardinality(Nullable(T))` — dictionary entry 0 is the NULL slot
//! - `Nullable(Array(T))` / `Nullable(LowCardinality(T))` — rejected by
//!   the server, never produced here

/// Array columns (`Array(T)`), flattened elements plus offsets.
pub mod array;
/// Date, Date32, DateTime, and DateTime64 columns.
pub mod date;
/// Decimal columns across all precision buckets.
pub mod decimal;
/// Enum8 and Enum16 columns.
pub mod enumeration;
/// IPv4 and IPv6 columns.
pub mod ip;
/// Versioned JSON string columns.
pub mod json;
/// LowCardinality columns (dictionary encoding).
pub mod lowcardinality;
/// Map columns (`Map(K, V)`).
pub mod map;
/// Nothing/Void placeholder columns.
pub mod nothing;
/// Nullable columns (`Nullable(T)`).
pub mod nullable;
/// Fixed-width numeric columns and Bool.
pub mod numeric;
/// String, lazy String, and FixedString columns.
pub mod string;
/// Tuple and Nested columns.
pub mod tuple;
/// UUID columns.
pub mod uuid;

pub use array::ColumnArray;
pub use date::{ColumnDate, ColumnDate32, ColumnDateTime, ColumnDateTime64};
pub use decimal::ColumnDecimal;
pub use enumeration::{ColumnEnum16, ColumnEnum8};
pub use ip::{ColumnIpv4, ColumnIpv6};
pub use json::ColumnJson;
pub use lowcardinality::ColumnLowCardinality;
pub use map::ColumnMap;
pub use nothing::ColumnNothing;
pub use nullable::ColumnNullable;
pub use numeric::{
    ColumnBool, ColumnFloat32, ColumnFloat64, ColumnInt128, ColumnInt16,
    ColumnInt256, ColumnInt32, ColumnInt64, ColumnInt8, ColumnUInt128,
    ColumnUInt16, ColumnUInt256, ColumnUInt32, ColumnUInt64, ColumnUInt8,
    ColumnVector,
};
pub use string::{ColumnFixedString, ColumnString, ColumnStringLazy};
pub use tuple::ColumnTuple;
pub use uuid::ColumnUuid;

use std::sync::Arc;

use crate::options::{CodecOptions, StringMaterialization};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

/// Reference to a column. `Arc` keeps clones cheap; the decode path holds
/// the only reference and mutates through `Arc::get_mut`.
pub type ColumnRef = Arc<dyn Column>;

/// The column contract: decode `rows` worth of payload from a reader,
/// encode the held values back, and expose typed access through
/// downcasting.
pub trait Column: Send + Sync {
    /// The parsed type this column holds.
    fn type_node(&self) -> &TypeNode;

    /// Number of rows currently held.
    fn size(&self) -> usize;

    /// Drop all rows, keeping capacity where practical.
    fn clear(&mut self);

    /// Decode exactly `rows` rows from the reader, appending to any rows
    /// already held.
    fn load_body(&mut self, reader: &mut ByteReader<'_>, rows: usize)
        -> Result<()>;

    /// Encode every held row to the writer.
    fn save_body(&self, writer: &mut ByteWriter) -> Result<()>;

    /// An empty column of the same type.
    fn clone_empty(&self) -> ColumnRef;

    /// Whether the value at `index` is the type's default value. Used to
    /// validate the LowCardinality null-sentinel slot; types that cannot
    /// cheaply answer report `true`.
    fn is_default_at(&self, _index: usize) -> bool {
        true
    }

    /// Downcast support.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

/// Build an empty column for a parsed type.
///
/// Composite types recurse; unknown base names fail with
/// [`Error::UnsupportedType`].
pub fn create_column(
    node: &TypeNode,
    options: &CodecOptions,
) -> Result<ColumnRef> {
    Ok(match node.base_name.as_str() {
        "Int8" => Arc::new(ColumnInt8::with_type(node.clone())),
        "Int16" => Arc::new(ColumnInt16::with_type(node.clone())),
        "Int32" => Arc::new(ColumnInt32::with_type(node.clone())),
        "Int64" => Arc::new(ColumnInt64::with_type(node.clone())),
        "Int128" => Arc::new(ColumnInt128::with_type(node.clone())),
        "Int256" => Arc::new(ColumnInt256::with_type(node.clone())),
        "UInt8" => Arc::new(ColumnUInt8::with_type(node.clone())),
        "UInt16" => Arc::new(ColumnUInt16::with_type(node.clone())),
        "UInt32" => Arc::new(ColumnUInt32::with_type(node.clone())),
        "UInt64" => Arc::new(ColumnUInt64::with_type(node.clone())),
        "UInt128" => Arc::new(ColumnUInt128::with_type(node.clone())),
        "UInt256" => Arc::new(ColumnUInt256::with_type(node.clone())),
        "Float32" => Arc::new(ColumnFloat32::with_type(node.clone())),
        "Float64" => Arc::new(ColumnFloat64::with_type(node.clone())),
        "Bool" => Arc::new(ColumnBool::with_type(node.clone())),
        "String" => match options.string_materialization {
            StringMaterialization::Eager => {
                Arc::new(ColumnString::with_type(node.clone()))
            }
            StringMaterialization::Lazy => {
                Arc::new(ColumnStringLazy::with_type(node.clone())?)
            }
        },
        "FixedString" => Arc::new(ColumnFixedString::new(node.clone())?),
        "Date" => Arc::new(ColumnDate::with_type(node.clone())),
        "Date32" => Arc::new(ColumnDate32::with_type(node.clone())),
        "DateTime" => Arc::new(ColumnDateTime::with_type(node.clone())),
        "DateTime64" => Arc::new(ColumnDateTime64::new(node.clone())?),
        "Decimal" | "Decimal32" | "Decimal64" | "Decimal128"
        | "Decimal256" => Arc::new(ColumnDecimal::new(node.clone())?),
        "UUID" => Arc::new(ColumnUuid::with_type(node.clone())),
        "IPv4" => Arc::new(ColumnIpv4::with_type(node.clone())),
        "IPv6" => Arc::new(ColumnIpv6::with_type(node.clone())),
        "Enum8" => Arc::new(ColumnEnum8::new(node.clone())),
        "Enum16" => Arc::new(ColumnEnum16::new(node.clone())),
        "JSON" => Arc::new(ColumnJson::with_type(node.clone())),
        "Nothing" => Arc::new(ColumnNothing::with_type(node.clone())),
        "Nullable" => Arc::new(ColumnNullable::new(node.clone(), options)?),
        "Array" => Arc::new(ColumnArray::new(node.clone(), options)?),
        "Map" => Arc::new(ColumnMap::new(node.clone(), options)?),
        "Tuple" | "Nested" => {
            Arc::new(ColumnTuple::new(node.clone(), options)?)
        }
        "LowCardinality" => {
            Arc::new(ColumnLowCardinality::new(node.clone(), options)?)
        }
        _ => {
            return Err(Error::UnsupportedType(
                node.original_text.clone(),
            ))
        }
    })
}

/// Mutable access to a freshly created column reference.
///
/// The decode path creates the `Arc` and holds the only clone, so this
/// cannot fail outside an internal logic error.
pub(crate) fn column_mut<'a>(
    column: &'a mut ColumnRef,
) -> Result<&'a mut (dyn Column + 'static)> {
    Arc::get_mut(column).ok_or_else(|| {
        Error::Bug("column is shared during mutation".to_string())
    })
}
