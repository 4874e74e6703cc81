//! Column extractors: one per (row field, schema column) pair.
//!
//! An extractor writes one column's on-wire bytes by reading the field
//! straight out of each borrowed row. The factory selects a specialized
//! plan per pair; a pair it has no plan for fails with
//! [`Error::SchemaMismatch`] so the caller can fall back to the
//! column-building API.
//!
//! Nullability is the extractor's concern: when the schema column is
//! `Nullable(T)` the extractor emits the leading null-flag bytes even for
//! a non-optional source (all zeros), and writes the type default under
//! null slots. An `Option` source bound to a non-nullable column errors
//! at extract time on the first `None`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::int256::I256;
use crate::options::InsertOptions;
use crate::types::TypeNode;
use crate::wire::{scale_decimal_i128, ByteWriter};
use crate::{Error, Result};

use super::row::{FieldGetter, RowField, RowShape, Schema};

/// Writes one column for a borrowed row batch.
pub(crate) type ColumnExtractor<R> =
    Box<dyn Fn(&mut ByteWriter, &[R]) -> Result<()> + Send + Sync>;

/// One schema column bound to its extractor.
pub(crate) struct BoundColumn<R> {
    pub name: String,
    pub type_text: String,
    pub extract: ColumnExtractor<R>,
}

impl<R> std::fmt::Debug for BoundColumn<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundColumn")
            .field("name", &self.name)
            .field("type_text", &self.type_text)
            .finish()
    }
}

type ValueWriter<R> =
    Box<dyn Fn(&mut ByteWriter, &R) -> Result<()> + Send + Sync>;
type DefaultWriter =
    Box<dyn Fn(&mut ByteWriter) -> Result<()> + Send + Sync>;
type NullProbe<R> = Box<dyn Fn(&R) -> bool + Send + Sync>;

/// How to write one cell: the value from a row, the type default under a
/// null slot, and (for `Option` sources) whether a row is null.
struct CellPlan<R> {
    write_value: ValueWriter<R>,
    write_default: DefaultWriter,
    is_null: Option<NullProbe<R>>,
}

fn plan_value<R: 'static, T, W>(
    get: Box<dyn Fn(&R) -> T + Send + Sync>,
    write: W,
    default: T,
) -> CellPlan<R>
where
    T: Clone + Send + Sync + 'static,
    W: Fn(&mut ByteWriter, &T) -> Result<()> + Send + Sync + Clone + 'static,
{
    let write_default = {
        let write = write.clone();
        Box::new(move |w: &mut ByteWriter| write(w, &default))
    };
    CellPlan {
        write_value: Box::new(move |w, row| write(w, &get(row))),
        write_default,
        is_null: None,
    }
}

fn plan_opt<R: 'static, T, W>(
    field_name: &str,
    get: Box<dyn Fn(&R) -> Option<T> + Send + Sync>,
    write: W,
    default: T,
) -> CellPlan<R>
where
    T: Clone + Send + Sync + 'static,
    W: Fn(&mut ByteWriter, &T) -> Result<()> + Send + Sync + Clone + 'static,
{
    let get = Arc::new(get);
    let field_name = field_name.to_string();
    let write_default = {
        let write = write.clone();
        Box::new(move |w: &mut ByteWriter| write(w, &default))
    };
    let probe_get = get.clone();
    CellPlan {
        write_value: Box::new(move |w, row| match (*get)(row) {
            Some(value) => write(w, &value),
            None => Err(Error::SchemaMismatch(format!(
                "field '{}' is None but the column is not Nullable",
                field_name
            ))),
        }),
        write_default,
        is_null: Some(Box::new(move |row| (*probe_get)(row).is_none())),
    }
}

fn plan_str<R: 'static, W>(
    get: Box<dyn for<'a> Fn(&'a R) -> &'a str + Send + Sync>,
    write: W,
) -> CellPlan<R>
where
    W: Fn(&mut ByteWriter, &str) -> Result<()> + Send + Sync + Clone + 'static,
{
    let write_default = {
        let write = write.clone();
        Box::new(move |w: &mut ByteWriter| write(w, ""))
    };
    CellPlan {
        write_value: Box::new(move |w, row| write(w, get(row))),
        write_default,
        is_null: None,
    }
}

fn plan_opt_str<R: 'static, W>(
    field_name: &str,
    get: Box<dyn for<'a> Fn(&'a R) -> Option<&'a str> + Send + Sync>,
    write: W,
) -> CellPlan<R>
where
    W: Fn(&mut ByteWriter, &str) -> Result<()> + Send + Sync + Clone + 'static,
{
    let get = Arc::new(get);
    let field_name = field_name.to_string();
    let write_default = {
        let write = write.clone();
        Box::new(move |w: &mut ByteWriter| write(w, ""))
    };
    let probe_get = get.clone();
    CellPlan {
        write_value: Box::new(move |w, row| match (*get)(row) {
            Some(value) => write(w, value),
            None => Err(Error::SchemaMismatch(format!(
                "field '{}' is None but the column is not Nullable",
                field_name
            ))),
        }),
        write_default,
        is_null: Some(Box::new(move |row| (*probe_get)(row).is_none())),
    }
}

fn write_fixed_cell(
    writer: &mut ByteWriter,
    value: &str,
    width: usize,
) -> Result<()> {
    let bytes = value.as_bytes();
    if bytes.len() > width {
        return Err(Error::SchemaMismatch(format!(
            "value of {} bytes does not fit FixedString({})",
            bytes.len(),
            width
        )));
    }
    writer.write_bytes(bytes);
    for _ in bytes.len()..width {
        writer.write_u8(0);
    }
    Ok(())
}

fn write_decimal_cell(
    writer: &mut ByteWriter,
    value: Decimal,
    precision: u32,
    scale: u32,
) -> Result<()> {
    let mantissa = scale_decimal_i128(value, scale)?;
    if precision <= 38 {
        let bound = 10_i128.pow(precision);
        if mantissa <= -bound || mantissa >= bound {
            return Err(Error::DecimalOverflow(format!(
                "{} exceeds precision {}",
                value, precision
            )));
        }
    }
    match TypeNode::decimal_storage_width(precision) {
        4 => writer.write_i32(i32::try_from(mantissa).map_err(|_| {
            Error::DecimalOverflow(format!(
                "{} does not fit Decimal32 storage",
                value
            ))
        })?),
        8 => writer.write_i64(i64::try_from(mantissa).map_err(|_| {
            Error::DecimalOverflow(format!(
                "{} does not fit Decimal64 storage",
                value
            ))
        })?),
        16 => writer.write_i128(mantissa),
        _ => writer.write_i256(I256::from_i128(mantissa)),
    }
    Ok(())
}

fn days_since_epoch(date: &NaiveDate) -> i64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date");
    date.signed_duration_since(epoch).num_days()
}

fn scale_instant(instant: &DateTime<Utc>, precision: u32) -> Result<i64> {
    let nanos = instant.timestamp_nanos_opt().ok_or_else(|| {
        Error::SchemaMismatch(format!(
            "{} is out of DateTime64 range",
            instant
        ))
    })?;
    if precision <= 9 {
        Ok(nanos / 10_i64.pow(9 - precision))
    } else {
        nanos.checked_mul(10_i64.pow(precision - 9)).ok_or_else(|| {
            Error::SchemaMismatch(format!(
                "{} overflows DateTime64({})",
                instant, precision
            ))
        })
    }
}

macro_rules! scalar_cell {
    ($get:expr, $write:expr, $default:expr) => {
        plan_value($get, $write, $default)
    };
}
macro_rules! opt_scalar_cell {
    ($name:expr, $get:expr, $write:expr, $default:expr) => {
        plan_opt($name, $get, $write, $default)
    };
}

/// Select the specialized cell plan for one (field, base column type)
/// pair. `base` has any `Nullable` wrapper already stripped.
fn cell_plan<R: 'static>(
    field_name: &str,
    getter: FieldGetter<R>,
    base: &TypeNode,
) -> Result<CellPlan<R>> {
    use FieldGetter::*;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch date");
    let epoch_instant =
        chrono::DateTime::<Utc>::from_timestamp(0, 0).expect("epoch instant");

    Ok(match (getter, base.base_name.as_str()) {
        (Bool(get), "Bool" | "UInt8") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &bool| {
                w.write_u8(*v as u8);
                Ok(())
            },
            false
        ),
        (OptBool(get), "Bool" | "UInt8") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &bool| {
                w.write_u8(*v as u8);
                Ok(())
            },
            false
        ),
        (Int8(get), "Int8" | "Enum8") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &i8| {
                w.write_i8(*v);
                Ok(())
            },
            0
        ),
        (OptInt8(get), "Int8" | "Enum8") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &i8| {
                w.write_i8(*v);
                Ok(())
            },
            0
        ),
        (Int16(get), "Int16" | "Enum16") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &i16| {
                w.write_i16(*v);
                Ok(())
            },
            0
        ),
        (OptInt16(get), "Int16" | "Enum16") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &i16| {
                w.write_i16(*v);
                Ok(())
            },
            0
        ),
        (Int32(get), "Int32") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &i32| {
                w.write_i32(*v);
                Ok(())
            },
            0
        ),
        (OptInt32(get), "Int32") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &i32| {
                w.write_i32(*v);
                Ok(())
            },
            0
        ),
        (Int64(get), "Int64") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &i64| {
                w.write_i64(*v);
                Ok(())
            },
            0
        ),
        (OptInt64(get), "Int64") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &i64| {
                w.write_i64(*v);
                Ok(())
            },
            0
        ),
        (UInt8(get), "UInt8") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &u8| {
                w.write_u8(*v);
                Ok(())
            },
            0
        ),
        (OptUInt8(get), "UInt8") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &u8| {
                w.write_u8(*v);
                Ok(())
            },
            0
        ),
        (UInt16(get), "UInt16") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &u16| {
                w.write_u16(*v);
                Ok(())
            },
            0
        ),
        (OptUInt16(get), "UInt16") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &u16| {
                w.write_u16(*v);
                Ok(())
            },
            0
        ),
        (UInt32(get), "UInt32") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &u32| {
                w.write_u32(*v);
                Ok(())
            },
            0
        ),
        (OptUInt32(get), "UInt32") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &u32| {
                w.write_u32(*v);
                Ok(())
            },
            0
        ),
        (UInt64(get), "UInt64") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &u64| {
                w.write_u64(*v);
                Ok(())
            },
            0
        ),
        (OptUInt64(get), "UInt64") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &u64| {
                w.write_u64(*v);
                Ok(())
            },
            0
        ),
        (Float32(get), "Float32") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &f32| {
                w.write_f32(*v);
                Ok(())
            },
            0.0
        ),
        (OptFloat32(get), "Float32") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &f32| {
                w.write_f32(*v);
                Ok(())
            },
            0.0
        ),
        (Float64(get), "Float64") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &f64| {
                w.write_f64(*v);
                Ok(())
            },
            0.0
        ),
        (OptFloat64(get), "Float64") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &f64| {
                w.write_f64(*v);
                Ok(())
            },
            0.0
        ),
        (Str(get), "String") => plan_str(get, |w, s| {
            w.write_string(s);
            Ok(())
        }),
        (OptStr(get), "String") => {
            plan_opt_str(field_name, get, |w, s| {
                w.write_string(s);
                Ok(())
            })
        }
        (Str(get), "FixedString") => {
            let width = base.int_parameter(0)? as usize;
            plan_str(get, move |w, s| write_fixed_cell(w, s, width))
        }
        (OptStr(get), "FixedString") => {
            let width = base.int_parameter(0)? as usize;
            plan_opt_str(field_name, get, move |w, s| {
                write_fixed_cell(w, s, width)
            })
        }
        (Uuid(get), "UUID") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &uuid::Uuid| {
                crate::column::uuid::write_uuid(w, *v);
                Ok(())
            },
            uuid::Uuid::nil()
        ),
        (OptUuid(get), "UUID") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &uuid::Uuid| {
                crate::column::uuid::write_uuid(w, *v);
                Ok(())
            },
            uuid::Uuid::nil()
        ),
        (Date(get), "Date") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &NaiveDate| {
                let days = days_since_epoch(v);
                let days = u16::try_from(days).map_err(|_| {
                    Error::SchemaMismatch(format!(
                        "{} is out of Date range",
                        v
                    ))
                })?;
                w.write_u16(days);
                Ok(())
            },
            epoch
        ),
        (OptDate(get), "Date") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &NaiveDate| {
                let days = days_since_epoch(v);
                let days = u16::try_from(days).map_err(|_| {
                    Error::SchemaMismatch(format!(
                        "{} is out of Date range",
                        v
                    ))
                })?;
                w.write_u16(days);
                Ok(())
            },
            epoch
        ),
        (Date(get), "Date32") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &NaiveDate| {
                w.write_i32(days_since_epoch(v) as i32);
                Ok(())
            },
            epoch
        ),
        (OptDate(get), "Date32") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &NaiveDate| {
                w.write_i32(days_since_epoch(v) as i32);
                Ok(())
            },
            epoch
        ),
        (DateTime(get), "DateTime") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &chrono::DateTime<Utc>| {
                w.write_u32(v.timestamp().max(0) as u32);
                Ok(())
            },
            epoch_instant
        ),
        (OptDateTime(get), "DateTime") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &chrono::DateTime<Utc>| {
                w.write_u32(v.timestamp().max(0) as u32);
                Ok(())
            },
            epoch_instant
        ),
        (DateTime(get), "DateTime64") => {
            let precision = base.datetime64_precision()?;
            scalar_cell!(
                get,
                move |w: &mut ByteWriter, v: &chrono::DateTime<Utc>| {
                    w.write_i64(scale_instant(v, precision)?);
                    Ok(())
                },
                epoch_instant
            )
        }
        (OptDateTime(get), "DateTime64") => {
            let precision = base.datetime64_precision()?;
            opt_scalar_cell!(
                field_name,
                get,
                move |w: &mut ByteWriter, v: &chrono::DateTime<Utc>| {
                    w.write_i64(scale_instant(v, precision)?);
                    Ok(())
                },
                epoch_instant
            )
        }
        (
            Decimal(get),
            "Decimal" | "Decimal32" | "Decimal64" | "Decimal128"
            | "Decimal256",
        ) => {
            let (precision, scale) = base.decimal_precision_scale()?;
            scalar_cell!(
                get,
                move |w: &mut ByteWriter, v: &rust_decimal::Decimal| {
                    write_decimal_cell(w, *v, precision, scale)
                },
                rust_decimal::Decimal::ZERO
            )
        }
        (
            OptDecimal(get),
            "Decimal" | "Decimal32" | "Decimal64" | "Decimal128"
            | "Decimal256",
        ) => {
            let (precision, scale) = base.decimal_precision_scale()?;
            opt_scalar_cell!(
                field_name,
                get,
                move |w: &mut ByteWriter, v: &rust_decimal::Decimal| {
                    write_decimal_cell(w, *v, precision, scale)
                },
                rust_decimal::Decimal::ZERO
            )
        }
        (Ipv4(get), "IPv4") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &std::net::Ipv4Addr| {
                w.write_u32(u32::from(*v));
                Ok(())
            },
            std::net::Ipv4Addr::UNSPECIFIED
        ),
        (OptIpv4(get), "IPv4") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &std::net::Ipv4Addr| {
                w.write_u32(u32::from(*v));
                Ok(())
            },
            std::net::Ipv4Addr::UNSPECIFIED
        ),
        (Ipv6(get), "IPv6") => scalar_cell!(
            get,
            |w: &mut ByteWriter, v: &std::net::Ipv6Addr| {
                w.write_bytes(&v.octets());
                Ok(())
            },
            std::net::Ipv6Addr::UNSPECIFIED
        ),
        (OptIpv6(get), "IPv6") => opt_scalar_cell!(
            field_name,
            get,
            |w: &mut ByteWriter, v: &std::net::Ipv6Addr| {
                w.write_bytes(&v.octets());
                Ok(())
            },
            std::net::Ipv6Addr::UNSPECIFIED
        ),
        (_, _) => {
            return Err(Error::SchemaMismatch(format!(
                "no specialized extractor for field '{}' against {}",
                field_name, base.original_text
            )))
        }
    })
}

/// The type-default writer for an unmatched Nullable column emitted as
/// all-NULL.
fn default_cell(base: &TypeNode) -> Result<DefaultWriter> {
    if let Some(width) = base.fixed_width() {
        return Ok(Box::new(move |w| {
            for _ in 0..width {
                w.write_u8(0);
            }
            Ok(())
        }));
    }
    if base.is("String") {
        return Ok(Box::new(|w| {
            w.write_string("");
            Ok(())
        }));
    }
    Err(Error::SchemaMismatch(format!(
        "cannot synthesize NULL column of type {}",
        base.original_text
    )))
}

fn extractor_from<R: 'static>(
    plan: CellPlan<R>,
    nullable: bool,
) -> ColumnExtractor<R> {
    let CellPlan { write_value, write_default, is_null } = plan;
    if nullable {
        Box::new(move |writer, rows| {
            match &is_null {
                Some(is_null) => {
                    for row in rows {
                        writer.write_u8(is_null(row) as u8);
                    }
                    for row in rows {
                        if is_null(row) {
                            write_default(writer)?;
                        } else {
                            write_value(writer, row)?;
                        }
                    }
                }
                None => {
                    // Non-optional source into a Nullable column: the
                    // flag bytes are still emitted, all zero.
                    for _ in rows {
                        writer.write_u8(0);
                    }
                    for row in rows {
                        write_value(writer, row)?;
                    }
                }
            }
            Ok(())
        })
    } else {
        Box::new(move |writer, rows| {
            for row in rows {
                write_value(writer, row)?;
            }
            Ok(())
        })
    }
}

fn all_null_extractor<R>(base: &TypeNode) -> Result<ColumnExtractor<R>> {
    let write_default = default_cell(base)?;
    Ok(Box::new(move |writer, rows| {
        for _ in rows {
            writer.write_u8(1);
        }
        for _ in rows {
            write_default(writer)?;
        }
        Ok(())
    }))
}

/// Bind every schema column to an extractor, in schema order.
pub(crate) fn bind_columns<R: 'static>(
    schema: &Schema,
    shape: RowShape<R>,
    options: &InsertOptions,
) -> Result<Vec<BoundColumn<R>>> {
    let mut fields: HashMap<String, RowField<R>> = HashMap::new();
    for field in shape.into_fields() {
        let key = field.name.to_lowercase();
        if fields.insert(key, field).is_some() {
            return Err(Error::SchemaMismatch(
                "duplicate field name in row shape".to_string(),
            ));
        }
    }

    let mut bound = Vec::with_capacity(schema.len());
    for column in schema.columns() {
        let nullable = column.node.is("Nullable");
        let base = if nullable {
            column.node.inner()?
        } else {
            column.node.as_ref()
        };

        match fields.remove(&column.name.to_lowercase()) {
            Some(field) => {
                let plan = cell_plan(&field.name, field.getter, base)?;
                bound.push(BoundColumn {
                    name: column.name.clone(),
                    type_text: column.type_text.clone(),
                    extract: extractor_from(plan, nullable),
                });
            }
            None if nullable && options.include_null_columns => {
                bound.push(BoundColumn {
                    name: column.name.clone(),
                    type_text: column.type_text.clone(),
                    extract: all_null_extractor(base)?,
                });
            }
            None if nullable => {
                // Omitted entirely under include_null_columns = false.
            }
            None => {
                return Err(Error::SchemaMismatch(format!(
                    "no row field matches non-nullable column '{}'",
                    column.name
                )))
            }
        }
    }
    Ok(bound)
}
