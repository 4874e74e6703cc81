//! Whole-block round trips across the type grammar, plus the
//! scan-equals-parse law and the streaming read path.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use clickhouse_block_codec::column::{
    create_column, ColumnArray, ColumnBool, ColumnDate,
    ColumnDateTime, ColumnEnum8, ColumnFixedString, ColumnFloat64,
    ColumnInt64, ColumnIpv4, ColumnIpv6, ColumnLowCardinality, ColumnMap,
    ColumnNullable, ColumnString, ColumnStringLazy, ColumnTuple,
    ColumnUInt64, ColumnUuid,
};
use clickhouse_block_codec::types::parse_type;
use clickhouse_block_codec::wire::{ByteReader, ByteWriter};
use clickhouse_block_codec::{
    Block, BlockCodec, BlockStreamDecoder, CodecOptions,
    CompressionMethod, StringMaterialization,
};

/// Build a block with one column of most supported shapes.
fn rich_block() -> Block {
    let options = CodecOptions::default();
    let mut block = Block::new();

    let mut ids = ColumnUInt64::new();
    let mut signed = ColumnInt64::new();
    let mut flags = ColumnBool::new();
    let mut ratios = ColumnFloat64::new();
    let mut names = ColumnString::new();
    let mut dates = ColumnDate::new();
    let mut stamps = ColumnDateTime::new();
    let mut uuids = ColumnUuid::new();
    let mut v4 = ColumnIpv4::new();
    let mut v6 = ColumnIpv6::new();
    for i in 0..4u64 {
        ids.append(i);
        signed.append(-(i as i64) * 3);
        flags.append(i % 2 == 0);
        ratios.append(i as f64 / 7.0);
        names.append(format!("name-{}", i));
        dates.append(19_000 + i as u16);
        stamps.append(1_700_000_000 + i as u32);
        uuids.append(uuid::Uuid::from_u128(0x1111_2222 + i as u128));
        v4.append(Ipv4Addr::from(0x0A00_0001 + i as u32));
        v6.append(Ipv6Addr::from((0xFE80 as u128) << 112 | i as u128));
    }

    let fixed_node = parse_type("FixedString(6)").unwrap();
    let mut fixed = ColumnFixedString::new(fixed_node).unwrap();
    for i in 0..4 {
        fixed.append(&format!("f{}", i)).unwrap();
    }

    let enum_node = parse_type("Enum8('off' = 0, 'on' = 1)").unwrap();
    let mut states = ColumnEnum8::new(enum_node);
    for i in 0..4 {
        states.append((i % 2) as i8);
    }

    let nullable_node = parse_type("Nullable(Int64)").unwrap();
    let mut maybe = ColumnNullable::new(nullable_node, &options).unwrap();
    for i in 0..4 {
        if i % 2 == 0 {
            maybe.append_non_null();
        } else {
            maybe.append_null();
        }
    }
    {
        let nested = maybe.nested_mut().unwrap();
        let ints = nested.as_any_mut().downcast_mut::<ColumnInt64>().unwrap();
        for i in 0..4 {
            ints.append(i * 11);
        }
    }

    let array_node = parse_type("Array(UInt64)").unwrap();
    let mut lists = ColumnArray::new(array_node, &options).unwrap();
    {
        let nested = lists.nested_mut().unwrap();
        let ints =
            nested.as_any_mut().downcast_mut::<ColumnUInt64>().unwrap();
        for v in [1u64, 2, 3, 4, 5, 6] {
            ints.append(v);
        }
    }
    lists.append_len(2);
    lists.append_len(0);
    lists.append_len(3);
    lists.append_len(1);

    let map_node = parse_type("Map(String, UInt64)").unwrap();
    let mut maps = ColumnMap::new(map_node, &options).unwrap();
    {
        let keys = maps.keys_mut().unwrap();
        let keys = keys.as_any_mut().downcast_mut::<ColumnString>().unwrap();
        keys.append("k1");
        keys.append("k2");
        keys.append("k3");
    }
    {
        let values = maps.values_mut().unwrap();
        let values =
            values.as_any_mut().downcast_mut::<ColumnUInt64>().unwrap();
        values.append(100);
        values.append(200);
        values.append(300);
    }
    maps.append_len(1);
    maps.append_len(2);
    maps.append_len(0);
    maps.append_len(0);

    let tuple_node = parse_type("Tuple(id UInt64, tag String)").unwrap();
    let mut pairs = ColumnTuple::new(tuple_node, &options).unwrap();
    {
        let ids = pairs.field_mut(0).unwrap();
        let ids = ids.as_any_mut().downcast_mut::<ColumnUInt64>().unwrap();
        for i in 0..4 {
            ids.append(i * 5);
        }
    }
    {
        let tags = pairs.field_mut(1).unwrap();
        let tags =
            tags.as_any_mut().downcast_mut::<ColumnString>().unwrap();
        for i in 0..4 {
            tags.append(format!("t{}", i));
        }
    }

    let lc_node = parse_type("LowCardinality(String)").unwrap();
    let mut dict = ColumnLowCardinality::new(lc_node, &options).unwrap();
    for value in ["alpha", "beta", "alpha", "beta"] {
        dict.append(value).unwrap();
    }

    block.append_column("id", Arc::new(ids)).unwrap();
    block.append_column("signed", Arc::new(signed)).unwrap();
    block.append_column("flag", Arc::new(flags)).unwrap();
    block.append_column("ratio", Arc::new(ratios)).unwrap();
    block.append_column("name", Arc::new(names)).unwrap();
    block.append_column("fixed", Arc::new(fixed)).unwrap();
    block.append_column("day", Arc::new(dates)).unwrap();
    block.append_column("stamp", Arc::new(stamps)).unwrap();
    block.append_column("uid", Arc::new(uuids)).unwrap();
    block.append_column("addr4", Arc::new(v4)).unwrap();
    block.append_column("addr6", Arc::new(v6)).unwrap();
    block.append_column("state", Arc::new(states)).unwrap();
    block.append_column("maybe", Arc::new(maybe)).unwrap();
    block.append_column("list", Arc::new(lists)).unwrap();
    block.append_column("attrs", Arc::new(maps)).unwrap();
    block.append_column("pair", Arc::new(pairs)).unwrap();
    block.append_column("dict", Arc::new(dict)).unwrap();
    block
}

#[test]
fn rich_block_round_trips_byte_identically() {
    let codec = BlockCodec::new(CodecOptions::default());
    let block = rich_block();

    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &block).unwrap();
    let first = writer.as_slice().to_vec();

    let mut reader = ByteReader::new(&first);
    let decoded = codec.read_block(&mut reader).unwrap();
    assert!(reader.is_empty());
    assert_eq!(decoded.column_count(), block.column_count());
    assert_eq!(decoded.row_count(), block.row_count());

    // Re-encoding the decoded block reproduces the exact bytes.
    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &decoded).unwrap();
    assert_eq!(writer.as_slice(), &first[..]);
}

#[test]
fn decoded_values_survive() {
    let codec = BlockCodec::new(CodecOptions::default());
    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &rich_block()).unwrap();
    let bytes = writer.as_slice().to_vec();

    let mut reader = ByteReader::new(&bytes);
    let block = codec.read_block(&mut reader).unwrap();

    let names = block
        .column_by_name("name")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnString>()
        .unwrap();
    assert_eq!(names.get(3), Some("name-3"));

    let maybe = block
        .column_by_name("maybe")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnNullable>()
        .unwrap();
    assert!(!maybe.is_null(0));
    assert!(maybe.is_null(1));

    let lists = block
        .column_by_name("list")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnArray>()
        .unwrap();
    assert_eq!(lists.typed_row::<u64>(2), Some(&[4u64, 5, 6][..]));

    let dict = block
        .column_by_name("dict")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnLowCardinality>()
        .unwrap();
    assert_eq!(dict.str_at(2), Some("alpha"));

    let pair = block
        .column_by_name("pair")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnTuple>()
        .unwrap();
    assert!(pair.field_by_name("tag").is_some());
}

#[test]
fn scan_and_parse_agree_on_every_block() {
    let codec = BlockCodec::new(CodecOptions::default());
    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &rich_block()).unwrap();
    let bytes = writer.as_slice().to_vec();

    let mut scan_reader = ByteReader::new(&bytes);
    let consumed = codec.scan_block(&mut scan_reader).unwrap().unwrap();

    let mut parse_reader = ByteReader::new(&bytes);
    codec.read_block(&mut parse_reader).unwrap();

    assert_eq!(consumed, parse_reader.position());
    assert_eq!(consumed, bytes.len());

    // And the scan refuses every strict prefix.
    for cut in [0, 1, bytes.len() / 2, bytes.len() - 1] {
        let mut reader = ByteReader::new(&bytes[..cut]);
        assert_eq!(codec.scan_block(&mut reader).unwrap(), None);
    }
}

#[test]
fn compressed_round_trips_all_methods() {
    for method in [CompressionMethod::Lz4, CompressionMethod::Zstd] {
        let options = CodecOptions::new().compression(method);
        let codec = BlockCodec::new(options.clone());
        let bytes = codec.encode_block(&rich_block()).unwrap();

        let mut decoder = BlockStreamDecoder::new(options);
        decoder.feed(&bytes);
        let block = decoder.next_block().unwrap().unwrap();
        assert_eq!(block.row_count(), 4);
        assert_eq!(block.column_count(), 17);
    }
}

#[test]
fn lazy_strings_decode_on_demand() {
    let eager = BlockCodec::new(CodecOptions::default());
    let mut writer = ByteWriter::new();
    let mut block = Block::new();
    let mut names = ColumnString::new();
    for i in 0..5 {
        names.append(format!("value-{}", i));
    }
    block.append_column("name", Arc::new(names)).unwrap();
    eager.write_block(&mut writer, &block).unwrap();
    let bytes = writer.as_slice().to_vec();

    let lazy = BlockCodec::new(
        CodecOptions::new()
            .string_materialization(StringMaterialization::Lazy),
    );
    let mut reader = ByteReader::new(&bytes);
    let decoded = lazy.read_block(&mut reader).unwrap();
    let column = decoded
        .column(0)
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnStringLazy>()
        .unwrap();
    assert_eq!(column.len(), 5);
    assert_eq!(column.get(4).unwrap(), Some("value-4"));
    assert_eq!(column.bytes_at(0), Some(&b"value-0"[..]));

    // The lazy shape writes the identical wire bytes back.
    let mut writer = ByteWriter::new();
    lazy.write_block(&mut writer, &decoded).unwrap();
    assert_eq!(writer.as_slice(), &bytes[..]);
}

#[test]
fn nested_column_round_trips_through_blocks() {
    let options = CodecOptions::default();
    let node = parse_type("Nested(key String, val Int64)").unwrap();
    let mut column = create_column(&node, &options).unwrap();
    {
        let tuple = Arc::get_mut(&mut column)
            .unwrap()
            .as_any_mut()
            .downcast_mut::<ColumnTuple>()
            .unwrap();
        {
            let keys = tuple.field_mut(0).unwrap();
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
            keys.append_len(0);
        }
        {
            let vals = tuple.field_mut(1).unwrap();
            let vals =
                vals.as_any_mut().downcast_mut::<ColumnArray>().unwrap();
            {
                let flat = vals.nested_mut().unwrap();
                let ints = flat
                    .as_any_mut()
                    .downcast_mut::<ColumnInt64>()
                    .unwrap();
                ints.append(1);
                ints.append(2);
            }
            vals.append_len(2);
            vals.append_len(0);
        }
    }

    let mut block = Block::new();
    block.append_column("n", column).unwrap();
    assert_eq!(block.row_count(), 2);

    let codec = BlockCodec::new(options);
    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &block).unwrap();
    let bytes = writer.as_slice().to_vec();

    let mut reader = ByteReader::new(&bytes);
    let decoded = codec.read_block(&mut reader).unwrap();
    assert!(reader.is_empty());
    assert_eq!(decoded.type_text(0), Some("Nested(key String, val Int64)"));

    let tuple = decoded
        .column(0)
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnTuple>()
        .unwrap();
    let keys = tuple
        .field_by_name("key")
        .unwrap()
        .as_any()
        .downcast_ref::<ColumnArray>()
        .unwrap();
    assert_eq!(keys.string_row(0).unwrap(), vec!["a", "b"]);
    assert_eq!(keys.string_row(1).unwrap(), Vec::<&str>::new());
}
