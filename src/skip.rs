//! Column skippers: the allocation-free mirror of the column decoders.
//!
//! The scan pass walks a block without materializing anything to confirm
//! every byte has arrived before the allocating parse commits. Each
//! skipper returns `true` when it advanced cleanly and `false` when the
//! buffer ran short, restoring the reader position so nothing irreversible
//! happens. Structural problems (unknown types, corrupt widths) are real
//! errors either way.
//!
//! A byte-literal fast path matches common type names against their UTF-8
//! encoding before falling back to the parameterized-type grammar, so the
//! hot path never allocates a type string.

use crate::types::{TypeCache, TypeNode};
use crate::wire::{ByteReader, VarintStatus};
use crate::{Error, Result};

/// Fixed widths for the common unparameterized type names, keyed by their
/// UTF-8 byte encoding.
fn fixed_width_by_name(name: &[u8]) -> Option<usize> {
    Some(match name {
        b"Int8" | b"UInt8" | b"Bool" | b"Nothing" => 1,
        b"Int16" | b"UInt16" | b"Date" => 2,
        b"Int32" | b"UInt32" | b"Float32" | b"Date32" | b"DateTime"
        | b"IPv4" => 4,
        b"Int64" | b"UInt64" | b"Float64" => 8,
        b"Int128" | b"UInt128" | b"UUID" | b"IPv6" => 16,
        b"Int256" | b"UInt256" => 32,
        _ => return None,
    })
}

/// Skip one column payload of `rows` rows whose type is already parsed.
///
/// `false` means "not enough bytes"; the reader position is unchanged.
pub fn skip_column(
    node: &TypeNode,
    reader: &mut ByteReader<'_>,
    rows: usize,
) -> Result<bool> {
    let start = reader.position();
    let advanced = skip_column_inner(node, reader, rows)?;
    if !advanced {
        reader.set_position(start);
    }
    Ok(advanced)
}

/// Skip one column payload resolving the type text lazily: the byte
/// fast path first, the grammar only for parameterized types.
pub fn skip_column_by_name(
    type_name: &[u8],
    cache: &TypeCache,
    reader: &mut ByteReader<'_>,
    rows: usize,
) -> Result<bool> {
    if let Some(width) = fixed_width_by_name(type_name) {
        return Ok(reader.try_advance(rows * width));
    }
    if type_name == b"String" {
        let start = reader.position();
        for _ in 0..rows {
            if !reader.try_skip_string()? {
                reader.set_position(start);
                return Ok(false);
            }
        }
        return Ok(true);
    }
    let text = std::str::from_utf8(type_name).map_err(|e| {
        Error::MalformedType(format!("type name is not UTF-8: {}", e))
    })?;
    let node = cache.resolve(text)?;
    skip_column(&node, reader, rows)
}

fn skip_column_inner(
    node: &TypeNode,
    reader: &mut ByteReader<'_>,
    rows: usize,
) -> Result<bool> {
    if let Some(width) = node.fixed_width() {
        return Ok(reader.try_advance(rows * width));
    }
    match node.base_name.as_str() {
        // Reached only when the parameters are malformed (fixed_width
        // answers the well-formed spellings); propagate the precise error.
        "FixedString" => {
            let width = node.int_parameter(0)? as usize;
            Ok(reader.try_advance(rows * width))
        }
        "Decimal" | "Decimal32" | "Decimal64" | "Decimal128"
        | "Decimal256" => {
            let (precision, _) = node.decimal_precision_scale()?;
            let width = TypeNode::decimal_storage_width(precision);
            Ok(reader.try_advance(rows * width))
        }
        "String" => {
            for _ in 0..rows {
                if !reader.try_skip_string()? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "JSON" => skip_json(reader, rows),
        "Nullable" => {
            if !reader.try_advance(rows) {
                return Ok(false);
            }
            skip_column_inner(node.inner()?, reader, rows)
        }
        "Array" => {
            let Some(total) = skip_offsets(reader, rows)? else {
                return Ok(false);
            };
            skip_column_inner(node.inner()?, reader, total)
        }
        "Map" => {
            let Some(total) = skip_offsets(reader, rows)? else {
                return Ok(false);
            };
            if !skip_column_inner(
                &node.type_arguments[0],
                reader,
                total,
            )? {
                return Ok(false);
            }
            skip_column_inner(&node.type_arguments[1], reader, total)
        }
        "Tuple" => {
            for field in &node.type_arguments {
                if !skip_column_inner(field, reader, rows)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "Nested" => {
            for field in &node.type_arguments {
                let as_array = TypeNode::wrapping("Array", field.clone());
                if !skip_column_inner(&as_array, reader, rows)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        "LowCardinality" => skip_low_cardinality(node, reader, rows),
        other => Err(Error::UnsupportedType(other.to_string())),
    }
}

/// Read `rows` cumulative offsets; `None` on shortfall. Returns the total
/// element count (the last offset).
fn skip_offsets(
    reader: &mut ByteReader<'_>,
    rows: usize,
) -> Result<Option<usize>> {
    let mut total = 0u64;
    for _ in 0..rows {
        let Some(offset) = reader.try_read_u64() else {
            return Ok(None);
        };
        if offset < total {
            return Err(Error::CorruptFrame(format!(
                "offsets decrease: {} after {}",
                offset, total
            )));
        }
        total = offset;
    }
    Ok(Some(total as usize))
}

fn skip_json(reader: &mut ByteReader<'_>, rows: usize) -> Result<bool> {
    match reader.try_read_varint()? {
        VarintStatus::Done { value, .. } => {
            if value != crate::protocol::JSON_SERIALIZATION_VERSION_STRING {
                return Err(Error::UnsupportedJsonFormat(value));
            }
        }
        VarintStatus::Continue { .. } => return Ok(false),
    }
    for _ in 0..rows {
        if !reader.try_skip_string()? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn skip_low_cardinality(
    node: &TypeNode,
    reader: &mut ByteReader<'_>,
    rows: usize,
) -> Result<bool> {
    let Some(_version) = reader.try_read_u64() else {
        return Ok(false);
    };
    let Some(flags) = reader.try_read_u64() else {
        return Ok(false);
    };
    let width = match flags & 0xFF {
        0 => 1,
        1 => 2,
        2 => 4,
        3 => 8,
        other => {
            return Err(Error::CorruptFrame(format!(
                "LowCardinality index width tag {}",
                other
            )))
        }
    };
    let Some(dictionary_size) = reader.try_read_u64() else {
        return Ok(false);
    };

    // The dictionary payload uses the base type, Nullable stripped.
    let inner = node.inner()?;
    let base = if inner.is("Nullable") { inner.inner()? } else { inner };
    if !skip_column_inner(base, reader, dictionary_size as usize)? {
        return Ok(false);
    }

    let Some(index_count) = reader.try_read_u64() else {
        return Ok(false);
    };
    if index_count as usize != rows {
        return Err(Error::CorruptFrame(format!(
            "LowCardinality index count {} for {} rows",
            index_count, rows
        )));
    }
    Ok(reader.try_advance(rows * width))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::column::{column_mut, create_column};
    use crate::options::CodecOptions;
    use crate::types::parse_type;
    use crate::wire::ByteWriter;

    /// Encode a column of `rows` rows and verify the skipper consumes the
    /// same number of bytes the decoder produces.
    fn assert_skip_matches_encode(
        type_text: &str,
        build: impl FnOnce(&mut dyn crate::column::Column),
    ) {
        let node = parse_type(type_text).unwrap();
        let mut column =
            create_column(&node, &CodecOptions::default()).unwrap();
        build(column_mut(&mut column).unwrap());
        let rows = column.size();

        let mut w = ByteWriter::new();
        column.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut r = ByteReader::new(&bytes);
        assert!(skip_column(&node, &mut r, rows).unwrap(), "{}", type_text);
        assert!(r.is_empty(), "{} left {} bytes", type_text, r.remaining());

        // Every strict prefix reports "not enough" and restores position.
        for cut in 0..bytes.len() {
            let mut r = ByteReader::new(&bytes[..cut]);
            let advanced = skip_column(&node, &mut r, rows).unwrap();
            assert!(!advanced, "{} advanced at cut {}", type_text, cut);
            assert_eq!(r.position(), 0, "{} moved at cut {}", type_text, cut);
        }
    }

    #[test]
    fn skips_fixed_width() {
        assert_skip_matches_encode("UInt32", |col| {
            let ints = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnUInt32>()
                .unwrap();
            ints.append(1);
            ints.append(2);
            ints.append(3);
        });
    }

    #[test]
    fn skips_strings() {
        assert_skip_matches_encode("String", |col| {
            let strings = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnString>()
                .unwrap();
            strings.append("a");
            strings.append("");
            strings.append("longer value");
        });
    }

    #[test]
    fn skips_nullable_array_of_strings() {
        assert_skip_matches_encode("Array(Nullable(String))", |col| {
            let array = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnArray>()
                .unwrap();
            {
                let nullable = array.nested_mut().unwrap();
                let nullable = nullable
                    .as_any_mut()
                    .downcast_mut::<crate::column::ColumnNullable>()
                    .unwrap();
                nullable.append_non_null();
                nullable.append_null();
                let strings = nullable.nested_mut().unwrap();
                let strings = strings
                    .as_any_mut()
                    .downcast_mut::<crate::column::ColumnString>()
                    .unwrap();
                strings.append("x");
                strings.append("");
            }
            array.append_len(2);
        });
    }

    #[test]
    fn skips_map_and_tuple() {
        assert_skip_matches_encode("Map(String, UInt64)", |col| {
            let map = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnMap>()
                .unwrap();
            {
                let keys = map.keys_mut().unwrap();
                keys.as_any_mut()
                    .downcast_mut::<crate::column::ColumnString>()
                    .unwrap()
                    .append("k");
            }
            {
                let values = map.values_mut().unwrap();
                values
                    .as_any_mut()
                    .downcast_mut::<crate::column::ColumnUInt64>()
                    .unwrap()
                    .append(5);
            }
            map.append_len(1);
        });

        assert_skip_matches_encode("Tuple(UInt8, String)", |col| {
            let tuple = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnTuple>()
                .unwrap();
            {
                let a = tuple.field_mut(0).unwrap();
                a.as_any_mut()
                    .downcast_mut::<crate::column::ColumnUInt8>()
                    .unwrap()
                    .append(1);
            }
            {
                let b = tuple.field_mut(1).unwrap();
                b.as_any_mut()
                    .downcast_mut::<crate::column::ColumnString>()
                    .unwrap()
                    .append("one");
            }
        });
    }

    #[test]
    fn skips_low_cardinality() {
        assert_skip_matches_encode("LowCardinality(String)", |col| {
            let lc = col
                .as_any_mut()
                .downcast_mut::<crate::column::ColumnLowCardinality>()
                .unwrap();
            for value in ["x", "y", "x"] {
                lc.append(value).unwrap();
            }
        });
    }

    #[test]
    fn byte_literal_fast_path() {
        let cache = TypeCache::new();
        let bytes = [0u8; 12];
        let mut r = ByteReader::new(&bytes);
        assert!(skip_column_by_name(b"UInt32", &cache, &mut r, 3).unwrap());
        assert!(r.is_empty());

        let mut r = ByteReader::new(&bytes[..11]);
        assert!(!skip_column_by_name(b"UInt32", &cache, &mut r, 3).unwrap());
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn fast_path_falls_back_to_grammar() {
        let cache = TypeCache::new();
        let mut w = ByteWriter::new();
        w.write_bytes(&[0, 0]); // null mask for two rows
        w.write_u32(1);
        w.write_u32(2);
        let bytes = w.as_slice().to_vec();
        let mut r = ByteReader::new(&bytes);
        assert!(skip_column_by_name(
            b"Nullable(UInt32)",
            &cache,
            &mut r,
            2
        )
        .unwrap());
        assert!(r.is_empty());
    }

    #[test]
    fn unknown_type_is_an_error_not_a_retry() {
        let node = parse_type("Widget").unwrap();
        let bytes = [0u8; 4];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            skip_column(&node, &mut r, 1),
            Err(Error::UnsupportedType(_))
        ));
    }
}
