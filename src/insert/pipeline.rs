//! The bulk-insert pipeline.
//!
//! Rows buffer until `batch_size`, then flush as one data block: empty
//! table name, default block info, the bound columns in schema order,
//! each written by its extractor and framed per the codec's compression.
//! `complete` sends the empty terminator block and waits for the
//! collaborator's end-of-stream acknowledgement.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::options::{CodecOptions, InsertOptions};
use crate::protocol::{
    CompressionMethod, BLOCK_INFO_FIELD_BUCKET, BLOCK_INFO_FIELD_END,
    BLOCK_INFO_FIELD_OVERFLOW,
};
use crate::wire::ByteWriter;
use crate::{frame, Error, Result};

use super::extractor::{bind_columns, BoundColumn};
use super::row::{InsertRow, RowShape, Schema};

/// The byte sink the pipeline flushes into: the transport half of the
/// external collaborator.
#[async_trait::async_trait]
pub trait InsertSink: Send {
    /// Ship one encoded data block.
    async fn send_block(&mut self, bytes: Bytes) -> Result<()>;

    /// Wait for the server's end-of-stream acknowledgement after the
    /// terminator block.
    async fn await_end_of_stream(&mut self) -> Result<()>;
}

/// [`InsertSink`] over any async byte writer, for callers that pipe
/// encoded blocks straight into a transport they manage. The
/// end-of-stream acknowledgement is the surrounding client's business;
/// this sink only drains its writer.
pub struct AsyncWriteSink<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> AsyncWriteSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait::async_trait]
impl<W: AsyncWrite + Unpin + Send> InsertSink for AsyncWriteSink<W> {
    async fn send_block(&mut self, bytes: Bytes) -> Result<()> {
        self.writer.write_all(&bytes).await?;
        Ok(())
    }

    async fn await_end_of_stream(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }
}

/// Buffers rows and flushes them as columnar data blocks.
pub struct InsertPipeline<R: Send> {
    columns: Vec<BoundColumn<R>>,
    buffer: Vec<R>,
    sink: Box<dyn InsertSink>,
    codec_options: CodecOptions,
    batch_size: usize,
    completed: bool,
}

impl<R: Send + 'static> InsertPipeline<R> {
    /// Bind a row shape to the server schema and wire the pipeline to a
    /// sink.
    pub fn new(
        schema: &Schema,
        shape: RowShape<R>,
        sink: Box<dyn InsertSink>,
        codec_options: CodecOptions,
        insert_options: InsertOptions,
    ) -> Result<Self> {
        if schema.is_empty() {
            return Err(Error::NotInitialized);
        }
        let columns = bind_columns(schema, shape, &insert_options)?;
        Ok(Self {
            columns,
            buffer: Vec::with_capacity(insert_options.batch_size),
            sink,
            codec_options,
            batch_size: insert_options.batch_size,
            completed: false,
        })
    }

    /// Bind using the row type's own [`InsertRow::shape`] declaration.
    pub fn for_row(
        schema: &Schema,
        sink: Box<dyn InsertSink>,
        codec_options: CodecOptions,
        insert_options: InsertOptions,
    ) -> Result<Self>
    where
        R: InsertRow,
    {
        Self::new(schema, R::shape(), sink, codec_options, insert_options)
    }

    /// Number of rows currently buffered.
    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    /// Append one row, flushing when the batch threshold is reached.
    pub async fn add(&mut self, row: R) -> Result<()> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        self.buffer.push(row);
        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush the buffered rows as one data block. A no-op on an empty
    /// buffer.
    pub async fn flush(&mut self) -> Result<()> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = self.buffer.len();
        let bytes = self.encode_block(rows)?;
        self.sink.send_block(bytes).await?;
        // The buffer keeps its capacity for the next batch.
        self.buffer.clear();
        debug!(rows, "insert block flushed");
        Ok(())
    }

    /// Flush the remainder, send the empty terminator block, and wait for
    /// the end-of-stream acknowledgement.
    pub async fn complete(&mut self) -> Result<()> {
        if self.completed {
            return Err(Error::AlreadyCompleted);
        }
        self.flush().await?;
        let terminator = self.encode_block(0)?;
        self.sink.send_block(terminator).await?;
        self.sink.await_end_of_stream().await?;
        self.completed = true;
        Ok(())
    }

    /// Encode one block from the first `rows` buffered rows (0 = the
    /// terminator shape).
    fn encode_block(&self, rows: usize) -> Result<Bytes> {
        let mut writer = ByteWriter::new();
        writer.write_string(""); // table name: data blocks carry none

        writer.write_varint(BLOCK_INFO_FIELD_OVERFLOW);
        writer.write_u8(0);
        writer.write_varint(BLOCK_INFO_FIELD_BUCKET);
        writer.write_i32(-1);
        writer.write_varint(BLOCK_INFO_FIELD_END);

        let column_count = if rows == 0 { 0 } else { self.columns.len() };
        writer.write_varint(column_count as u64);
        writer.write_varint(rows as u64);

        if rows > 0 {
            let batch = &self.buffer[..rows];
            for column in &self.columns {
                writer.write_string(&column.name);
                writer.write_string(&column.type_text);
                if self.codec_options.has_custom_serialization() {
                    writer.write_u8(0);
                }
                (column.extract)(&mut writer, batch)?;
            }
        }

        match self.codec_options.compression {
            CompressionMethod::None => Ok(writer.freeze()),
            method => frame::encode_frame(method, writer.as_slice()),
        }
    }
}

impl<R: Send> Drop for InsertPipeline<R> {
    fn drop(&mut self) {
        if !self.completed {
            // complete() is async and cannot run here; the buffered rows
            // are lost and the server never sees the terminator.
            warn!(
                buffered = self.buffer.len(),
                "insert pipeline dropped without complete()"
            );
        }
    }
}
