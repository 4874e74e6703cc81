//! Fixed-width numeric columns.
//!
//! All integer and float types are `row_count * width` contiguous
//! little-endian bytes on the wire:
//!
//! | Type | Rust type | Width |
//! |------|-----------|-------|
//! | `Int8`/`UInt8` | `i8`/`u8` | 1 |
//! | `Int16`/`UInt16` | `i16`/`u16` | 2 |
//! | `Int32`/`UInt32`/`Float32` | `i32`/`u32`/`f32` | 4 |
//! | `Int64`/`UInt64`/`Float64` | `i64`/`u64`/`f64` | 8 |
//! | `Int128`/`UInt128` | `i128`/`u128` | 16 |
//! | `Int256`/`UInt256` | [`I256`]/[`U256`] | 32 |
//!
//! Decoding takes the contiguous fast path: one bounds check, then a
//! chunked copy out of the wire buffer. `Bool` is one byte per row where
//! any non-zero value decodes to `true`.

use std::sync::Arc;

use crate::int256::{I256, U256};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{Column, ColumnRef};

/// A scalar with a fixed little-endian wire width.
pub trait WireScalar: Copy + PartialEq + Send + Sync + 'static {
    /// Wire width in bytes.
    const WIDTH: usize;
    /// ClickHouse type name used when no explicit type is supplied.
    const TYPE_NAME: &'static str;

    /// Decode from exactly [`Self::WIDTH`] little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
    /// Encode to the writer.
    fn write(self, writer: &mut ByteWriter);
    /// The type's default value (the LowCardinality sentinel check).
    fn zero() -> Self;
}

macro_rules! impl_wire_scalar {
    ($ty:ty, $name:literal, $write:ident) => {
        impl WireScalar for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            const TYPE_NAME: &'static str = $name;

            fn from_le_slice(bytes: &[u8]) -> Self {
                <$ty>::from_le_bytes(bytes.try_into().expect("chunk width"))
            }

            fn write(self, writer: &mut ByteWriter) {
                writer.$write(self);
            }

            fn zero() -> Self {
                0 as $ty
            }
        }
    };
}

impl_wire_scalar!(u8, "UInt8", write_u8);
impl_wire_scalar!(u16, "UInt16", write_u16);
impl_wire_scalar!(u32, "UInt32", write_u32);
impl_wire_scalar!(u64, "UInt64", write_u64);
impl_wire_scalar!(u128, "UInt128", write_u128);
impl_wire_scalar!(i8, "Int8", write_i8);
impl_wire_scalar!(i16, "Int16", write_i16);
impl_wire_scalar!(i32, "Int32", write_i32);
impl_wire_scalar!(i64, "Int64", write_i64);
impl_wire_scalar!(i128, "Int128", write_i128);
impl_wire_scalar!(f32, "Float32", write_f32);
impl_wire_scalar!(f64, "Float64", write_f64);

impl WireScalar for I256 {
    const WIDTH: usize = 32;
    const TYPE_NAME: &'static str = "Int256";

    fn from_le_slice(bytes: &[u8]) -> Self {
        I256::from_le_bytes(bytes.try_into().expect("chunk width"))
    }

    fn write(self, writer: &mut ByteWriter) {
        writer.write_i256(self);
    }

    fn zero() -> Self {
        I256::ZERO
    }
}

impl WireScalar for U256 {
    const WIDTH: usize = 32;
    const TYPE_NAME: &'static str = "UInt256";

    fn from_le_slice(bytes: &[u8]) -> Self {
        U256::from_le_bytes(bytes.try_into().expect("chunk width"))
    }

    fn write(self, writer: &mut ByteWriter) {
        writer.write_u256(self);
    }

    fn zero() -> Self {
        U256::ZERO
    }
}

/// Generic column over any fixed-width scalar.
pub struct ColumnVector<T: WireScalar> {
    type_: TypeNode,
    data: Vec<T>,
}

impl<T: WireScalar> ColumnVector<T> {
    /// Create with the type inferred from `T`.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple(T::TYPE_NAME), data: Vec::new() }
    }

    /// Create with an explicit parsed type (wire decode keeps the verbatim
    /// node).
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Create with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            type_: TypeNode::simple(T::TYPE_NAME),
            data: Vec::with_capacity(capacity),
        }
    }

    /// Take ownership of prepared values.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { type_: TypeNode::simple(T::TYPE_NAME), data }
    }

    /// Append one value.
    pub fn append(&mut self, value: T) {
        self.data.push(value);
    }

    /// Value at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<T> {
        self.data.get(index).copied()
    }

    /// Value at `index`; panics out of range (test convenience).
    pub fn at(&self, index: usize) -> T {
        self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bulk value slice.
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Mutable access to the backing vector.
    pub fn values_mut(&mut self) -> &mut Vec<T> {
        &mut self.data
    }
}

impl<T: WireScalar> Default for ColumnVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WireScalar> Column for ColumnVector<T> {
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
        let bytes_needed = rows * T::WIDTH;
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(bytes_needed) else {
            return Err(Error::Truncated {
                context: T::TYPE_NAME,
                need: bytes_needed,
                have,
            });
        };
        self.data.reserve(rows);
        self.data
            .extend(raw.chunks_exact(T::WIDTH).map(T::from_le_slice));
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for value in &self.data {
            value.write(writer);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnVector::<T>::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|v| *v == T::zero()).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Column for `Bool`: one byte per row, any non-zero decodes to true.
pub struct ColumnBool {
    type_: TypeNode,
    data: Vec<bool>,
}

impl ColumnBool {
    /// Create with the default `Bool` type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("Bool"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one value.
    pub fn append(&mut self, value: bool) {
        self.data.push(value);
    }

    /// Value at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<bool> {
        self.data.get(index).copied()
    }

    /// Value at `index`; panics out of range.
    pub fn at(&self, index: usize) -> bool {
        self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bulk value slice.
    pub fn values(&self) -> &[bool] {
        &self.data
    }
}

impl Default for ColumnBool {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnBool {
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
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows) else {
            return Err(Error::Truncated {
                context: "Bool",
                need: rows,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(raw.iter().map(|&b| b != 0));
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_u8(value as u8);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnBool::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|v| !v).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Unsigned 8-bit column.
pub type ColumnUInt8 = ColumnVector<u8>;
/// Unsigned 16-bit column.
pub type ColumnUInt16 = ColumnVector<u16>;
/// Unsigned 32-bit column.
pub type ColumnUInt32 = ColumnVector<u32>;
/// Unsigned 64-bit column.
pub type ColumnUInt64 = ColumnVector<u64>;
/// Unsigned 128-bit column.
pub type ColumnUInt128 = ColumnVector<u128>;
/// Unsigned 256-bit column.
pub type ColumnUInt256 = ColumnVector<U256>;
/// Signed 8-bit column.
pub type ColumnInt8 = ColumnVector<i8>;
/// Signed 16-bit column.
pub type ColumnInt16 = ColumnVector<i16>;
/// Signed 32-bit column.
pub type ColumnInt32 = ColumnVector<i32>;
/// Signed 64-bit column.
pub type ColumnInt64 = ColumnVector<i64>;
/// Signed 128-bit column.
pub type ColumnInt128 = ColumnVector<i128>;
/// Signed 256-bit column.
pub type ColumnInt256 = ColumnVector<I256>;
/// 32-bit float column.
pub type ColumnFloat32 = ColumnVector<f32>;
/// 64-bit float column.
pub type ColumnFloat64 = ColumnVector<f64>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn round_trip<T: WireScalar + std::fmt::Debug>(values: &[T]) {
        let mut col = ColumnVector::<T>::new();
        for &v in values {
            col.append(v);
        }
        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        assert_eq!(w.len(), values.len() * T::WIDTH);

        let bytes = w.as_slice().to_vec();
        let mut col2 = ColumnVector::<T>::new();
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, values.len()).unwrap();
        assert!(r.is_empty());
        assert_eq!(col2.values(), values);
    }

    #[test]
    fn round_trip_all_widths() {
        round_trip::<u8>(&[0, 1, 255]);
        round_trip::<i16>(&[i16::MIN, -1, 0, i16::MAX]);
        round_trip::<u32>(&[0, 0xDEAD_BEEF, u32::MAX]);
        round_trip::<i64>(&[i64::MIN, 0, i64::MAX]);
        round_trip::<u128>(&[0, u128::MAX]);
        round_trip::<i128>(&[i128::MIN, -7, i128::MAX]);
        round_trip::<f32>(&[0.0, -1.5, f32::MAX]);
        round_trip::<f64>(&[0.0, std::f64::consts::PI]);
        round_trip::<I256>(&[
            I256::ZERO,
            I256::from_i128(-42),
            I256::from_i128(i128::MAX),
        ]);
        round_trip::<U256>(&[U256::ZERO, U256::from_u128(u128::MAX)]);
    }

    #[test]
    fn truncated_load_fails_hard() {
        let bytes = [0u8; 7];
        let mut col = ColumnUInt32::new();
        let mut r = ByteReader::new(&bytes);
        let err = col.load_body(&mut r, 2).unwrap_err();
        assert!(matches!(err, Error::Truncated { .. }));
        // Position untouched: the try path did not advance.
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn bulk_load_large() {
        let values: Vec<u64> = (0..10_000).collect();
        let mut w = ByteWriter::new();
        for &v in &values {
            w.write_u64(v);
        }
        let bytes = w.as_slice().to_vec();
        let mut col = ColumnUInt64::new();
        let mut r = ByteReader::new(&bytes);
        col.load_body(&mut r, 10_000).unwrap();
        assert_eq!(col.len(), 10_000);
        assert_eq!(col.at(5_000), 5_000);
    }

    #[test]
    fn bool_any_nonzero_is_true() {
        let bytes = [0u8, 1, 2, 255];
        let mut col = ColumnBool::new();
        let mut r = ByteReader::new(&bytes);
        col.load_body(&mut r, 4).unwrap();
        assert_eq!(col.values(), &[false, true, true, true]);

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        assert_eq!(w.as_slice(), &[0, 1, 1, 1]);
    }

    #[test]
    fn default_detection() {
        let mut col = ColumnInt32::new();
        col.append(0);
        col.append(5);
        assert!(col.is_default_at(0));
        assert!(!col.is_default_at(1));
        assert!(!col.is_default_at(9));
    }
}
