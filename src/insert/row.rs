//! Row-shape descriptors for bulk insert.
//!
//! A [`RowShape`] declares, in caller order, the fields a row type
//! exposes: a name (matched case-insensitively against schema column
//! names) and a typed accessor closure. The accessor set is a closed
//! enum — the build-time equivalent of the reflection-driven extractors
//! other clients generate at runtime. A field the schema should not see
//! is simply not declared; a differently named column is declared under
//! the wire name.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::types::{parse_type, TypeNode};
use crate::Result;

/// One column of the server's INSERT schema reply.
pub struct SchemaColumn {
    /// Column name, preserved verbatim on the wire.
    pub name: String,
    /// Verbatim type text from the reply.
    pub type_text: String,
    /// The parsed form.
    pub node: Arc<TypeNode>,
}

/// The ordered column list from the server's INSERT reply.
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    /// Parse a schema from `(name, type_text)` pairs as they came off the
    /// wire.
    pub fn from_wire<N, T>(columns: &[(N, T)]) -> Result<Self>
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let mut parsed = Vec::with_capacity(columns.len());
        for (name, type_text) in columns {
            parsed.push(SchemaColumn {
                name: name.as_ref().to_string(),
                type_text: type_text.as_ref().to_string(),
                node: Arc::new(parse_type(type_text.as_ref())?),
            });
        }
        Ok(Self { columns: parsed })
    }

    /// The columns in server order.
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True when the reply carried no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

type Getter<R, T> = Box<dyn Fn(&R) -> T + Send + Sync>;
type StrGetter<R> = Box<dyn for<'a> Fn(&'a R) -> &'a str + Send + Sync>;
type OptStrGetter<R> =
    Box<dyn for<'a> Fn(&'a R) -> Option<&'a str> + Send + Sync>;

/// A typed accessor for one row field. Every base type comes in a plain
/// and an `Option` form; either may be bound against a nullable or
/// non-nullable schema column.
pub enum FieldGetter<R> {
    /// `bool` accessor.
    Bool(Getter<R, bool>),
    /// `Option<bool>` accessor.
    OptBool(Getter<R, Option<bool>>),
    /// `i8` accessor.
    Int8(Getter<R, i8>),
    /// `Option<i8>` accessor.
    OptInt8(Getter<R, Option<i8>>),
    /// `i16` accessor.
    Int16(Getter<R, i16>),
    /// `Option<i16>` accessor.
    OptInt16(Getter<R, Option<i16>>),
    /// `i32` accessor.
    Int32(Getter<R, i32>),
    /// `Option<i32>` accessor.
    OptInt32(Getter<R, Option<i32>>),
    /// `i64` accessor.
    Int64(Getter<R, i64>),
    /// `Option<i64>` accessor.
    OptInt64(Getter<R, Option<i64>>),
    /// `u8` accessor.
    UInt8(Getter<R, u8>),
    /// `Option<u8>` accessor.
    OptUInt8(Getter<R, Option<u8>>),
    /// `u16` accessor.
    UInt16(Getter<R, u16>),
    /// `Option<u16>` accessor.
    OptUInt16(Getter<R, Option<u16>>),
    /// `u32` accessor.
    UInt32(Getter<R, u32>),
    /// `Option<u32>` accessor.
    OptUInt32(Getter<R, Option<u32>>),
    /// `u64` accessor.
    UInt64(Getter<R, u64>),
    /// `Option<u64>` accessor.
    OptUInt64(Getter<R, Option<u64>>),
    /// `f32` accessor.
    Float32(Getter<R, f32>),
    /// `Option<f32>` accessor.
    OptFloat32(Getter<R, Option<f32>>),
    /// `f64` accessor.
    Float64(Getter<R, f64>),
    /// `Option<f64>` accessor.
    OptFloat64(Getter<R, Option<f64>>),
    /// Borrowed string accessor.
    Str(StrGetter<R>),
    /// Borrowed optional string accessor.
    OptStr(OptStrGetter<R>),
    /// UUID accessor.
    Uuid(Getter<R, Uuid>),
    /// `Option<Uuid>` accessor.
    OptUuid(Getter<R, Option<Uuid>>),
    /// Calendar date accessor.
    Date(Getter<R, NaiveDate>),
    /// Optional calendar date accessor.
    OptDate(Getter<R, Option<NaiveDate>>),
    /// UTC instant accessor.
    DateTime(Getter<R, DateTime<Utc>>),
    /// Optional UTC instant accessor.
    OptDateTime(Getter<R, Option<DateTime<Utc>>>),
    /// Fixed-precision decimal accessor.
    Decimal(Getter<R, Decimal>),
    /// Optional fixed-precision decimal accessor.
    OptDecimal(Getter<R, Option<Decimal>>),
    /// IPv4 accessor.
    Ipv4(Getter<R, std::net::Ipv4Addr>),
    /// Optional IPv4 accessor.
    OptIpv4(Getter<R, Option<std::net::Ipv4Addr>>),
    /// IPv6 accessor.
    Ipv6(Getter<R, std::net::Ipv6Addr>),
    /// Optional IPv6 accessor.
    OptIpv6(Getter<R, Option<std::net::Ipv6Addr>>),
}

/// One declared row field.
pub struct RowField<R> {
    /// The name matched (case-insensitively) against schema columns.
    pub name: String,
    /// The typed accessor.
    pub getter: FieldGetter<R>,
}

/// The ordered field list of a row type.
pub struct RowShape<R> {
    fields: Vec<RowField<R>>,
}

/// A row type that can describe its own shape.
pub trait InsertRow: Sized {
    /// The field descriptors for this row type.
    fn shape() -> RowShape<Self>;
}

macro_rules! shape_builders {
    ($(($plain:ident, $opt:ident, $plain_variant:ident, $opt_variant:ident, $ty:ty)),+ $(,)?) => {
        $(
            /// Declare a plain field of this type.
            pub fn $plain(
                mut self,
                name: impl Into<String>,
                get: impl Fn(&R) -> $ty + Send + Sync + 'static,
            ) -> Self {
                self.fields.push(RowField {
                    name: name.into(),
                    getter: FieldGetter::$plain_variant(Box::new(get)),
                });
                self
            }

            /// Declare an `Option` field of this type.
            pub fn $opt(
                mut self,
                name: impl Into<String>,
                get: impl Fn(&R) -> Option<$ty> + Send + Sync + 'static,
            ) -> Self {
                self.fields.push(RowField {
                    name: name.into(),
                    getter: FieldGetter::$opt_variant(Box::new(get)),
                });
                self
            }
        )+
    };
}

impl<R> RowShape<R> {
    /// Start an empty shape.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Declare a borrowed string field.
    pub fn string(
        mut self,
        name: impl Into<String>,
        get: impl for<'a> Fn(&'a R) -> &'a str + Send + Sync + 'static,
    ) -> Self {
        self.fields.push(RowField {
            name: name.into(),
            getter: FieldGetter::Str(Box::new(get)),
        });
        self
    }

    /// Declare a borrowed optional string field.
    pub fn opt_string(
        mut self,
        name: impl Into<String>,
        get: impl for<'a> Fn(&'a R) -> Option<&'a str>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.fields.push(RowField {
            name: name.into(),
            getter: FieldGetter::OptStr(Box::new(get)),
        });
        self
    }

    shape_builders!(
        (boolean, opt_boolean, Bool, OptBool, bool),
        (int8, opt_int8, Int8, OptInt8, i8),
        (int16, opt_int16, Int16, OptInt16, i16),
        (int32, opt_int32, Int32, OptInt32, i32),
        (int64, opt_int64, Int64, OptInt64, i64),
        (uint8, opt_uint8, UInt8, OptUInt8, u8),
        (uint16, opt_uint16, UInt16, OptUInt16, u16),
        (uint32, opt_uint32, UInt32, OptUInt32, u32),
        (uint64, opt_uint64, UInt64, OptUInt64, u64),
        (float32, opt_float32, Float32, OptFloat32, f32),
        (float64, opt_float64, Float64, OptFloat64, f64),
        (uuid, opt_uuid, Uuid, OptUuid, Uuid),
        (date, opt_date, Date, OptDate, NaiveDate),
        (datetime, opt_datetime, DateTime, OptDateTime, DateTime<Utc>),
        (decimal, opt_decimal, Decimal, OptDecimal, Decimal),
        (ipv4, opt_ipv4, Ipv4, OptIpv4, std::net::Ipv4Addr),
        (ipv6, opt_ipv6, Ipv6, OptIpv6, std::net::Ipv6Addr),
    );

    /// The declared fields in caller order.
    pub fn fields(&self) -> &[RowField<R>] {
        &self.fields
    }

    pub(crate) fn into_fields(self) -> Vec<RowField<R>> {
        self.fields
    }
}

impl<R> Default for RowShape<R> {
    fn default() -> Self {
        Self::new()
    }
}
