//! Date and time columns.
//!
//! | Type | Storage | Meaning |
//! |------|---------|---------|
//! | `Date` | UInt16 | days since 1970-01-01 |
//! | `Date32` | Int32 | days since 1970-01-01, extended range |
//! | `DateTime` | UInt32 | Unix seconds |
//! | `DateTime64(P[, tz])` | Int64 | Unix time scaled by `10^P` |
//!
//! The optional timezone parameter is decoration only: storage is always
//! Unix time, and the accessors return offset-aware UTC instants. A
//! `DateTime64` with precision above 9 is downscaled to nanoseconds (the
//! native chrono tick) on access.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::WireScalar;
use super::{Column, ColumnRef};

fn epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date")
}

macro_rules! day_column {
    ($name:ident, $raw:ty, $type_name:literal, $doc:literal) => {
        #[doc = $doc]
        pub struct $name {
            type_: TypeNode,
            data: Vec<$raw>,
        }

        impl $name {
            /// Create with the default type.
            pub fn new() -> Self {
                Self {
                    type_: TypeNode::simple($type_name),
                    data: Vec::new(),
                }
            }

            /// Create with an explicit parsed type.
            pub fn with_type(type_: TypeNode) -> Self {
                Self { type_, data: Vec::new() }
            }

            /// Append a raw day count.
            pub fn append(&mut self, days: $raw) {
                self.data.push(days);
            }

            /// Append a calendar date as its day count since the epoch,
            /// cast to the storage width.
            pub fn append_date(&mut self, date: NaiveDate) {
                let days =
                    date.signed_duration_since(epoch_date()).num_days();
                self.data.push(days as $raw);
            }

            /// Raw day count at `index`.
            pub fn at(&self, index: usize) -> $raw {
                self.data[index]
            }

            /// Calendar date at `index`.
            pub fn date_at(&self, index: usize) -> Option<NaiveDate> {
                let days = *self.data.get(index)? as i64;
                epoch_date().checked_add_signed(Duration::days(days))
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
            pub fn values(&self) -> &[$raw] {
                &self.data
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
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
                for &value in &self.data {
                    <$raw as WireScalar>::write(value, writer);
                }
                Ok(())
            }

            fn clone_empty(&self) -> ColumnRef {
                Arc::new($name::with_type(self.type_.clone()))
            }

            fn is_default_at(&self, index: usize) -> bool {
                self.data.get(index).map(|&v| v == 0).unwrap_or(false)
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

day_column!(
    ColumnDate,
    u16,
    "Date",
    "Column for `Date`: UInt16 days since 1970-01-01."
);
day_column!(
    ColumnDate32,
    i32,
    "Date32",
    "Column for `Date32`: Int32 days since 1970-01-01."
);

/// Column for `DateTime`: UInt32 Unix seconds, optional decoration-only
/// timezone.
pub struct ColumnDateTime {
    type_: TypeNode,
    data: Vec<u32>,
}

impl ColumnDateTime {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("DateTime"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append raw Unix seconds.
    pub fn append(&mut self, seconds: u32) {
        self.data.push(seconds);
    }

    /// Append an instant, truncated to seconds.
    pub fn append_datetime(&mut self, instant: DateTime<Utc>) {
        self.data.push(instant.timestamp().max(0) as u32);
    }

    /// Raw Unix seconds at `index`.
    pub fn at(&self, index: usize) -> u32 {
        self.data[index]
    }

    /// Instant at `index`.
    pub fn datetime_at(&self, index: usize) -> Option<DateTime<Utc>> {
        let seconds = *self.data.get(index)? as i64;
        DateTime::from_timestamp(seconds, 0)
    }

    /// The decoration-only timezone, if the type carried one.
    pub fn timezone(&self) -> Option<&str> {
        self.type_.timezone()
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
    pub fn values(&self) -> &[u32] {
        &self.data
    }
}

impl Default for ColumnDateTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnDateTime {
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
        let Some(raw) = reader.try_get_contiguous(rows * 4) else {
            return Err(Error::Truncated {
                context: "DateTime",
                need: rows * 4,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(
            raw.chunks_exact(4).map(<u32 as WireScalar>::from_le_slice),
        );
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_u32(value);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnDateTime::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|&v| v == 0).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Column for `DateTime64(P[, tz])`: Int64 Unix time scaled by `10^P`.
pub struct ColumnDateTime64 {
    type_: TypeNode,
    precision: u32,
    data: Vec<i64>,
}

impl ColumnDateTime64 {
    /// Create from a parsed `DateTime64` type.
    pub fn new(type_: TypeNode) -> Result<Self> {
        let precision = type_.datetime64_precision()?;
        Ok(Self { type_, precision, data: Vec::new() })
    }

    /// Sub-second precision P.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// The decoration-only timezone, if the type carried one.
    pub fn timezone(&self) -> Option<&str> {
        self.type_.timezone()
    }

    /// Append a raw value scaled by `10^P`.
    pub fn append(&mut self, raw: i64) {
        self.data.push(raw);
    }

    /// Append an instant, scaled to the column precision.
    pub fn append_datetime(
        &mut self,
        instant: DateTime<Utc>,
    ) -> Result<()> {
        let nanos = instant.timestamp_nanos_opt().ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "{} is out of DateTime64 range",
                instant
            ))
        })?;
        let raw = if self.precision <= 9 {
            nanos / 10_i64.pow(9 - self.precision)
        } else {
            nanos
                .checked_mul(10_i64.pow(self.precision - 9))
                .ok_or_else(|| {
                    Error::SchemaMismatch(format!(
                        "{} overflows DateTime64({})",
                        instant, self.precision
                    ))
                })?
        };
        self.data.push(raw);
        Ok(())
    }

    /// Raw scaled value at `index`.
    pub fn at(&self, index: usize) -> i64 {
        self.data[index]
    }

    /// Instant at `index`. Values with precision above 9 are downscaled to
    /// nanosecond ticks before conversion.
    pub fn datetime_at(&self, index: usize) -> Option<DateTime<Utc>> {
        let raw = *self.data.get(index)?;
        let nanos = if self.precision <= 9 {
            raw.checked_mul(10_i64.pow(9 - self.precision))?
        } else {
            raw / 10_i64.pow(self.precision - 9)
        };
        Some(DateTime::from_timestamp_nanos(nanos))
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
    pub fn values(&self) -> &[i64] {
        &self.data
    }
}

impl Column for ColumnDateTime64 {
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
        let Some(raw) = reader.try_get_contiguous(rows * 8) else {
            return Err(Error::Truncated {
                context: "DateTime64",
                need: rows * 8,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(
            raw.chunks_exact(8).map(<i64 as WireScalar>::from_le_slice),
        );
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_i64(value);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(
            ColumnDateTime64::new(self.type_.clone())
                .expect("valid DateTime64 type"),
        )
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|&v| v == 0).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
