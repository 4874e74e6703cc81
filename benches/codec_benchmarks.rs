//! Criterion benchmarks for the hot codec paths: numeric column loads,
//! string decode (eager vs lazy), frame compression, and the scan pass.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use clickhouse_block_codec::column::{
    Column, ColumnString, ColumnUInt64,
};
use clickhouse_block_codec::wire::{ByteReader, ByteWriter};
use clickhouse_block_codec::{
    frame, Block, BlockCodec, CodecOptions, CompressionMethod,
    StringMaterialization,
};

const ROWS: usize = 100_000;

fn numeric_column_bytes() -> Vec<u8> {
    let mut writer = ByteWriter::new();
    for i in 0..ROWS as u64 {
        writer.write_u64(i.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    }
    writer.as_slice().to_vec()
}

fn string_block_bytes() -> Vec<u8> {
    let mut column = ColumnString::new();
    for i in 0..ROWS {
        column.append(format!("value-{}", i % 1000));
    }
    let mut block = Block::new();
    block.append_column("s", Arc::new(column)).unwrap();
    let codec = BlockCodec::new(CodecOptions::default());
    let mut writer = ByteWriter::new();
    codec.write_block(&mut writer, &block).unwrap();
    writer.as_slice().to_vec()
}

fn bench_numeric_load(c: &mut Criterion) {
    let bytes = numeric_column_bytes();
    c.bench_function("load_uint64_100k", |b| {
        b.iter(|| {
            let mut column = ColumnUInt64::new();
            let mut reader = ByteReader::new(black_box(&bytes));
            column.load_body(&mut reader, ROWS).unwrap();
            black_box(column.len())
        })
    });
}

fn bench_string_materialization(c: &mut Criterion) {
    let bytes = string_block_bytes();

    let eager = BlockCodec::new(CodecOptions::default());
    c.bench_function("read_string_block_eager", |b| {
        b.iter(|| {
            let mut reader = ByteReader::new(black_box(&bytes));
            black_box(eager.read_block(&mut reader).unwrap().row_count())
        })
    });

    let lazy = BlockCodec::new(
        CodecOptions::new()
            .string_materialization(StringMaterialization::Lazy),
    );
    c.bench_function("read_string_block_lazy", |b| {
        b.iter(|| {
            let mut reader = ByteReader::new(black_box(&bytes));
            black_box(lazy.read_block(&mut reader).unwrap().row_count())
        })
    });
}

fn bench_scan_pass(c: &mut Criterion) {
    let bytes = string_block_bytes();
    let codec = BlockCodec::new(CodecOptions::default());
    c.bench_function("scan_string_block", |b| {
        b.iter(|| {
            let mut reader = ByteReader::new(black_box(&bytes));
            black_box(codec.scan_block(&mut reader).unwrap())
        })
    });
}

fn bench_frame(c: &mut Criterion) {
    let payload = numeric_column_bytes();
    c.bench_function("lz4_frame_encode", |b| {
        b.iter(|| {
            black_box(
                frame::encode_frame(
                    CompressionMethod::Lz4,
                    black_box(&payload),
                )
                .unwrap()
                .len(),
            )
        })
    });

    let framed =
        frame::encode_frame(CompressionMethod::Lz4, &payload).unwrap();
    c.bench_function("lz4_frame_decode", |b| {
        b.iter(|| match frame::decode_frame(black_box(&framed)).unwrap() {
            frame::FrameDecode::Frame { payload, .. } => {
                black_box(payload.len())
            }
            frame::FrameDecode::NeedMoreData { .. } => unreachable!(),
        })
    });
}

criterion_group!(
    benches,
    bench_numeric_load,
    bench_string_materialization,
    bench_scan_pass,
    bench_frame
);
criterion_main!(benches);
