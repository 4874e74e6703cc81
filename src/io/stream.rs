//! Streaming block decoder.
//!
//! Raw socket reads deliver arbitrary byte chunks; this wrapper buffers
//! them and yields whole blocks. Uncompressed input goes through the
//! scan-then-parse two-pass: the skipper scan confirms the buffer holds a
//! complete block before the allocating parse runs, and a short buffer
//! just waits for the next feed without losing the bytes already held.
//! Compressed input waits for one whole frame, verifies it, and parses
//! the decompressed payload.
//!
//! A `Truncated` or `Checksum` failure leaves the connection in an
//! indeterminate state: the decoder poisons itself and every later call
//! fails fast with [`Error::Poisoned`].

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::block::Block;
use crate::options::CodecOptions;
use crate::protocol::CompressionMethod;
use crate::wire::ByteReader;
use crate::{frame, Error, Result};

use super::BlockCodec;

/// Incremental feed/poll decoder over a retained byte buffer.
pub struct BlockStreamDecoder {
    codec: BlockCodec,
    buf: BytesMut,
    poisoned: bool,
}

impl BlockStreamDecoder {
    /// Create a decoder with the given options.
    pub fn new(options: CodecOptions) -> Self {
        Self {
            codec: BlockCodec::new(options),
            buf: BytesMut::new(),
            poisoned: false,
        }
    }

    /// Append bytes received from the transport.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes currently buffered and not yet consumed by a block.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Try to decode the next whole block. `Ok(None)` means the buffer
    /// does not yet hold one; feed more bytes and retry — nothing is
    /// discarded.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        if self.poisoned {
            return Err(Error::Poisoned);
        }
        match self.next_block_inner() {
            Ok(found) => Ok(found),
            Err(err) => {
                if err.poisons_stream() {
                    debug!(error = %err, "stream decoder poisoned");
                    self.poisoned = true;
                }
                Err(err)
            }
        }
    }

    fn next_block_inner(&mut self) -> Result<Option<Block>> {
        match self.codec.options().compression {
            CompressionMethod::None => {
                let mut scan_reader = ByteReader::new(&self.buf);
                let Some(consumed) =
                    self.codec.scan_block(&mut scan_reader)?
                else {
                    return Ok(None);
                };

                let mut parse_reader = ByteReader::new(&self.buf);
                let block = self.codec.read_block(&mut parse_reader)?;
                if parse_reader.position() != consumed {
                    return Err(Error::Bug(format!(
                        "scan consumed {} bytes, parse {}",
                        consumed,
                        parse_reader.position()
                    )));
                }
                self.buf.advance(consumed);
                Ok(Some(block))
            }
            _ => match frame::decode_frame(&self.buf)? {
                frame::FrameDecode::NeedMoreData { .. } => Ok(None),
                frame::FrameDecode::Frame { payload, consumed } => {
                    self.buf.advance(consumed);
                    let mut reader = ByteReader::new(&payload);
                    let block = self.codec.read_block(&mut reader)?;
                    // One frame wraps exactly one logical block.
                    if !reader.is_empty() {
                        return Err(Error::CorruptFrame(format!(
                            "{} bytes left over after the framed block",
                            reader.remaining()
                        )));
                    }
                    Ok(Some(block))
                }
            },
        }
    }

    /// The underlying block codec (for encoding replies on the same
    /// options).
    pub fn codec(&self) -> &BlockCodec {
        &self.codec
    }
}
