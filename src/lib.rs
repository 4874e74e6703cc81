//! # ClickHouse Block Codec
//!
//! The block codec at the core of a native-protocol ClickHouse client:
//! it parses schema-qualified columnar data blocks from a byte stream
//! into strongly-typed, pooled columns, and encodes caller rows back into
//! the same columnar binary form for insertion.
//!
//! The codec consumes only a byte producer (reads) and a byte sink
//! (writes). Connection lifecycle, handshakes, query text, and message
//! routing belong to the surrounding client and are out of scope here.
//!
//! # Reading blocks
//!
//! ```
//! use clickhouse_block_codec::{
//!     Block, BlockCodec, BlockStreamDecoder, CodecOptions,
//! };
//! use clickhouse_block_codec::column::ColumnUInt64;
//! use std::sync::Arc;
//!
//! # fn example() -> clickhouse_block_codec::Result<()> {
//! // Encode a block...
//! let mut block = Block::new();
//! let mut ids = ColumnUInt64::new();
//! ids.append(1);
//! ids.append(2);
//! block.append_column("id", Arc::new(ids))?;
//! let codec = BlockCodec::new(CodecOptions::default());
//! let bytes = codec.encode_block(&block)?;
//!
//! // ...and stream it back, feeding arbitrary chunks.
//! let mut decoder = BlockStreamDecoder::new(CodecOptions::default());
//! decoder.feed(&bytes[..3]);
//! assert!(decoder.next_block()?.is_none()); // incomplete: waits
//! decoder.feed(&bytes[3..]);
//! let decoded = decoder.next_block()?.expect("whole block arrived");
//! assert_eq!(decoded.row_count(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Bulk insert
//!
//! Rows are described once as a [`insert::RowShape`] of typed accessors;
//! the [`insert::InsertPipeline`] buffers them and flushes columnar
//! blocks straight from the row fields, in server schema order.
//!
//! # Modules
//!
//! - [`block`] - Data blocks (`Block`, `BlockInfo`)
//! - [`mod@column`] - Column codecs for all supported ClickHouse types
//! - [`frame`] - Checksummed LZ4/ZSTD frame envelope
//! - [`io`] - Block assembler and streaming decoder
//! - [`insert`] - Bulk-insert pipeline and extractors
//! - [`skip`] - Allocation-free column skippers (the scan pass)
//! - [`types`] - Type grammar and parser
//! - [`wire`] - Wire-format primitives (varints, scalars, strings)
//! - [`pool`] - Process-wide pooled buffers
//! - [`error`] - Error kinds and `Result` alias

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(missing_docs)]

/// Data blocks (collections of named columns).
pub mod block;
/// Column codecs for all supported ClickHouse types.
pub mod column;
/// Error kinds and `Result` alias.
pub mod error;
/// Checksummed compressed-frame envelope.
pub mod frame;
/// Bulk-insert pipeline, row shapes, and extractors.
pub mod insert;
/// 256-bit integer values.
pub mod int256;
/// Block assembler and streaming decoder.
pub mod io;
/// Codec and insert configuration.
pub mod options;
/// Process-wide pooled buffers.
pub mod pool;
/// Protocol constants (revisions, compression tags).
pub mod protocol;
/// Allocation-free column skippers.
pub mod skip;
/// ClickHouse type grammar and parser.
pub mod types;
/// Wire-format primitives.
pub mod wire;

pub use block::{Block, BlockInfo};
pub use error::{Error, Result};
pub use insert::{InsertPipeline, InsertSink, RowShape, Schema};
pub use io::{BlockCodec, BlockStreamDecoder};
pub use options::{CodecOptions, InsertOptions, StringMaterialization};
pub use protocol::CompressionMethod;
