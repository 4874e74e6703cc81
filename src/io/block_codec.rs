//! The block assembler.
//!
//! Wire shape of one block:
//!
//! ```text
//! table_name : String
//! block_info : (field_id varint, value)*, terminated by field_id 0
//!              field 1 = is_overflow u8, field 2 = bucket_num i32
//! column_count : varint
//! row_count    : varint
//! column*      : name String || type_text String
//!                || [has_custom u8 [, kind u8]]   (revision-gated)
//!                || payload
//! ```
//!
//! Reading supports two passes over uncompressed input: an allocation-free
//! scan that confirms the whole block has arrived (skippers), then the
//! allocating parse. Scan and parse consume identical byte counts.

use bytes::Bytes;
use tracing::trace;

use crate::block::{Block, BlockColumn, BlockInfo};
use crate::column::{column_mut, create_column};
use crate::options::CodecOptions;
use crate::protocol::{
    CompressionMethod, BLOCK_INFO_FIELD_BUCKET, BLOCK_INFO_FIELD_END,
    BLOCK_INFO_FIELD_OVERFLOW,
};
use crate::types::TypeCache;
use crate::wire::{ByteReader, ByteWriter, VarintStatus};
use crate::{frame, skip, Error, Result};

/// Encoder/decoder for whole blocks, with a per-instance cache of
/// resolved column types.
pub struct BlockCodec {
    options: CodecOptions,
    types: TypeCache,
}

impl BlockCodec {
    /// Create a codec with the given options.
    pub fn new(options: CodecOptions) -> Self {
        Self { options, types: TypeCache::new() }
    }

    /// The codec options.
    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Strict parse of one block. The caller has already confirmed (via
    /// [`Self::scan_block`] or the framing layer) that the buffer holds
    /// the whole block; shortfalls here are [`Error::Truncated`].
    ///
    /// Columns decoded before a mid-block failure are dropped, which
    /// releases their pooled storage.
    pub fn read_block(&self, reader: &mut ByteReader<'_>) -> Result<Block> {
        let table_name = reader.read_string()?;
        let info = read_block_info(reader)?;
        let column_count = reader.read_varint()? as usize;
        let row_count = reader.read_varint()? as usize;

        let mut block = Block::with_capacity(column_count);
        block.set_table_name(table_name);
        block.set_info(info);

        for _ in 0..column_count {
            let name = reader.read_string()?;
            let type_text = reader.read_string()?;
            let custom_serialization = if self
                .options
                .has_custom_serialization()
            {
                let has_custom = reader.read_u8()?;
                if has_custom != 0 {
                    // Reserved: one kind byte follows, read and skipped.
                    Some(reader.read_u8()?)
                } else {
                    None
                }
            } else {
                None
            };

            let node = self.types.resolve(&type_text)?;
            let mut column = create_column(&node, &self.options)?;
            if row_count > 0 {
                column_mut(&mut column)?.load_body(reader, row_count)?;
            }
            block.push_wire_column(BlockColumn {
                name,
                type_text,
                custom_serialization,
                column,
            });
        }
        block.set_row_count(row_count);

        trace!(
            columns = block.column_count(),
            rows = block.row_count(),
            "block decoded"
        );
        Ok(block)
    }

    /// Allocation-free scan of one block. Returns the bytes one block
    /// occupies, or `None` (with the reader restored) when the buffer
    /// does not yet hold all of it.
    pub fn scan_block(
        &self,
        reader: &mut ByteReader<'_>,
    ) -> Result<Option<usize>> {
        let start = reader.position();
        match self.scan_block_inner(reader) {
            Ok(Some(consumed)) => Ok(Some(consumed)),
            Ok(None) => {
                reader.set_position(start);
                Ok(None)
            }
            Err(err) => {
                reader.set_position(start);
                Err(err)
            }
        }
    }

    fn scan_block_inner(
        &self,
        reader: &mut ByteReader<'_>,
    ) -> Result<Option<usize>> {
        let start = reader.position();

        if !reader.try_skip_string()? {
            return Ok(None);
        }
        if !scan_block_info(reader)? {
            return Ok(None);
        }

        let Some(column_count) = try_varint(reader)? else {
            return Ok(None);
        };
        let Some(row_count) = try_varint(reader)? else {
            return Ok(None);
        };

        for _ in 0..column_count {
            if !reader.try_skip_string()? {
                return Ok(None);
            }
            let Some(type_name) = reader.try_read_prefixed_bytes()? else {
                return Ok(None);
            };
            if self.options.has_custom_serialization() {
                let Some(has_custom) = reader.try_read_u8() else {
                    return Ok(None);
                };
                if has_custom != 0 && reader.try_read_u8().is_none() {
                    return Ok(None);
                }
            }
            if row_count > 0
                && !skip::skip_column_by_name(
                    type_name,
                    &self.types,
                    reader,
                    row_count as usize,
                )?
            {
                return Ok(None);
            }
        }

        Ok(Some(reader.position() - start))
    }

    /// Encode one block into the writer.
    pub fn write_block(
        &self,
        writer: &mut ByteWriter,
        block: &Block,
    ) -> Result<()> {
        writer.write_string(block.table_name());

        writer.write_varint(BLOCK_INFO_FIELD_OVERFLOW);
        writer.write_u8(block.info().is_overflow as u8);
        writer.write_varint(BLOCK_INFO_FIELD_BUCKET);
        writer.write_i32(block.info().bucket_num);
        writer.write_varint(BLOCK_INFO_FIELD_END);

        writer.write_varint(block.column_count() as u64);
        writer.write_varint(block.row_count() as u64);

        for item in block.iter() {
            writer.write_string(&item.name);
            writer.write_string(&item.type_text);
            if self.options.has_custom_serialization() {
                writer.write_u8(0);
            }
            if block.row_count() > 0 {
                item.column.save_body(writer)?;
            }
        }

        trace!(
            columns = block.column_count(),
            rows = block.row_count(),
            "block encoded"
        );
        Ok(())
    }

    /// Encode one block into its on-wire bytes, framed and compressed
    /// according to the codec options.
    pub fn encode_block(&self, block: &Block) -> Result<Bytes> {
        let mut writer = ByteWriter::new();
        self.write_block(&mut writer, block)?;
        match self.options.compression {
            CompressionMethod::None => Ok(writer.freeze()),
            method => frame::encode_frame(method, writer.as_slice()),
        }
    }
}

fn read_block_info(reader: &mut ByteReader<'_>) -> Result<BlockInfo> {
    let mut info = BlockInfo::default();
    loop {
        match reader.read_varint()? {
            BLOCK_INFO_FIELD_END => return Ok(info),
            BLOCK_INFO_FIELD_OVERFLOW => {
                info.is_overflow = reader.read_u8()? != 0;
            }
            BLOCK_INFO_FIELD_BUCKET => {
                info.bucket_num = reader.read_i32()?;
            }
            // The wire layout does not encode unknown-field widths, so
            // tolerance is impossible: fail.
            unknown => {
                return Err(Error::CorruptFrame(format!(
                    "unknown block info field {}",
                    unknown
                )))
            }
        }
    }
}

fn scan_block_info(reader: &mut ByteReader<'_>) -> Result<bool> {
    loop {
        let Some(field) = try_varint(reader)? else {
            return Ok(false);
        };
        match field {
            BLOCK_INFO_FIELD_END => return Ok(true),
            BLOCK_INFO_FIELD_OVERFLOW => {
                if !reader.try_advance(1) {
                    return Ok(false);
                }
            }
            BLOCK_INFO_FIELD_BUCKET => {
                if !reader.try_advance(4) {
                    return Ok(false);
                }
            }
            unknown => {
                return Err(Error::CorruptFrame(format!(
                    "unknown block info field {}",
                    unknown
                )))
            }
        }
    }
}

fn try_varint(reader: &mut ByteReader<'_>) -> Result<Option<u64>> {
    match reader.try_read_varint()? {
        VarintStatus::Done { value, .. } => Ok(Some(value)),
        VarintStatus::Continue { .. } => Ok(None),
    }
}
