//! Positioned reader over a borrowed byte slice.
//!
//! Two operation families:
//!
//! - *strict* (`read_*`) — fail hard with [`Error::Truncated`] on underrun;
//!   used once a scan pass has confirmed the buffer holds a whole block.
//! - *try* (`try_*`) — return `Option`/status and leave the position
//!   untouched on shortfall; used by the scan pass and the streaming
//!   decoder, which must be able to wait for more bytes without losing
//!   work.

use crate::int256::{I256, U256};
use crate::wire::{MAX_STRING_LEN, MAX_VARINT_LEN};
use crate::{Error, Result};

/// Outcome of [`ByteReader::try_read_varint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintStatus {
    /// A complete number was decoded; the reader advanced past it.
    Done {
        /// Decoded value.
        value: u64,
        /// Encoded length in bytes.
        size: usize,
    },
    /// The buffer ended mid-number. The reader did not advance; `partial`
    /// and `bytes_consumed` describe the progress so far so a streaming
    /// caller can size its next read.
    Continue {
        /// Bits accumulated before the buffer ran out.
        partial: u64,
        /// Bytes inspected before the buffer ran out.
        bytes_consumed: usize,
    },
}

/// Transient view over a byte buffer. Borrows, never owns.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

macro_rules! impl_read_fixed {
    ($strict:ident, $try_:ident, $ty:ty, $ctx:literal) => {
        /// Strict little-endian read.
        pub fn $strict(&mut self) -> Result<$ty> {
            self.$try_().ok_or_else(|| self.truncated::<$ty>($ctx))
        }

        /// Non-advancing on shortfall.
        pub fn $try_(&mut self) -> Option<$ty> {
            const N: usize = std::mem::size_of::<$ty>();
            let bytes = self.buf.get(self.pos..self.pos + N)?;
            let value = <$ty>::from_le_bytes(bytes.try_into().ok()?);
            self.pos += N;
            Some(value)
        }
    };
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Rewind or fast-forward to an absolute position. Positions beyond
    /// the buffer end are clamped.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.buf.len());
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// True when every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }

    fn truncated<T>(&self, context: &'static str) -> Error {
        Error::Truncated {
            context,
            need: std::mem::size_of::<T>(),
            have: self.remaining(),
        }
    }

    impl_read_fixed!(read_u8, try_read_u8, u8, "u8");
    impl_read_fixed!(read_i8, try_read_i8, i8, "i8");
    impl_read_fixed!(read_u16, try_read_u16, u16, "u16");
    impl_read_fixed!(read_i16, try_read_i16, i16, "i16");
    impl_read_fixed!(read_u32, try_read_u32, u32, "u32");
    impl_read_fixed!(read_i32, try_read_i32, i32, "i32");
    impl_read_fixed!(read_u64, try_read_u64, u64, "u64");
    impl_read_fixed!(read_i64, try_read_i64, i64, "i64");
    impl_read_fixed!(read_u128, try_read_u128, u128, "u128");
    impl_read_fixed!(read_i128, try_read_i128, i128, "i128");
    impl_read_fixed!(read_f32, try_read_f32, f32, "f32");
    impl_read_fixed!(read_f64, try_read_f64, f64, "f64");

    /// Strict 32-byte little-endian signed read.
    pub fn read_i256(&mut self) -> Result<I256> {
        self.try_read_i256().ok_or(Error::Truncated {
            context: "i256",
            need: 32,
            have: self.remaining(),
        })
    }

    /// Non-advancing on shortfall.
    pub fn try_read_i256(&mut self) -> Option<I256> {
        let bytes = self.try_get_contiguous(32)?;
        let value = I256::from_le_bytes(bytes.try_into().ok()?);
        Some(value)
    }

    /// Strict 32-byte little-endian unsigned read.
    pub fn read_u256(&mut self) -> Result<U256> {
        self.try_read_u256().ok_or(Error::Truncated {
            context: "u256",
            need: 32,
            have: self.remaining(),
        })
    }

    /// Non-advancing on shortfall.
    pub fn try_read_u256(&mut self) -> Option<U256> {
        let bytes = self.try_get_contiguous(32)?;
        let value = U256::from_le_bytes(bytes.try_into().ok()?);
        Some(value)
    }

    /// Borrow `n` contiguous bytes and advance past them. The bulk fast
    /// path for homogeneous column loads: the caller memcpys straight out
    /// of the wire buffer.
    pub fn try_get_contiguous(&mut self, n: usize) -> Option<&'a [u8]> {
        let bytes = self.buf.get(self.pos..self.pos + n)?;
        self.pos += n;
        Some(bytes)
    }

    /// Strict form of [`Self::try_get_contiguous`].
    pub fn get_contiguous(&mut self, n: usize) -> Result<&'a [u8]> {
        let have = self.remaining();
        self.try_get_contiguous(n).ok_or(Error::Truncated {
            context: "raw bytes",
            need: n,
            have,
        })
    }

    /// Advance without touching the bytes; `false` leaves the position
    /// unchanged.
    pub fn try_advance(&mut self, n: usize) -> bool {
        if self.remaining() < n {
            return false;
        }
        self.pos += n;
        true
    }

    /// Strict varint read (little-endian base-128, 7 bits per byte, MSB
    /// continuation, at most 10 bytes).
    pub fn read_varint(&mut self) -> Result<u64> {
        match self.try_read_varint()? {
            VarintStatus::Done { value, .. } => Ok(value),
            VarintStatus::Continue { bytes_consumed, .. } => {
                Err(Error::Truncated {
                    context: "varint",
                    need: bytes_consumed + 1,
                    have: self.remaining(),
                })
            }
        }
    }

    /// Varint read that never fails on shortfall: an incomplete number
    /// reports [`VarintStatus::Continue`] and the position stays put so
    /// the caller can retry after buffering more bytes.
    pub fn try_read_varint(&mut self) -> Result<VarintStatus> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        for (i, &byte) in self.buf[self.pos..]
            .iter()
            .take(MAX_VARINT_LEN)
            .enumerate()
        {
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                self.pos += i + 1;
                return Ok(VarintStatus::Done { value, size: i + 1 });
            }
            shift += 7;
        }
        let consumed = self.remaining().min(MAX_VARINT_LEN);
        if consumed == MAX_VARINT_LEN {
            // Ten continuation bytes cannot encode a 64-bit payload.
            return Err(Error::CorruptFrame(
                "varint exceeds 10 bytes".to_string(),
            ));
        }
        Ok(VarintStatus::Continue { partial: value, bytes_consumed: consumed })
    }

    /// Strict length-prefixed UTF-8 string read.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint()? as usize;
        if len > MAX_STRING_LEN {
            return Err(Error::CorruptFrame(format!(
                "string length too large: {}",
                len
            )));
        }
        let bytes = self.get_contiguous(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            Error::CorruptFrame(format!("invalid UTF-8 in string: {}", e))
        })
    }

    /// Length-prefixed string read that does not advance on shortfall.
    pub fn try_read_string(&mut self) -> Result<Option<String>> {
        let start = self.pos;
        let len = match self.try_read_varint()? {
            VarintStatus::Done { value, .. } => value as usize,
            VarintStatus::Continue { .. } => return Ok(None),
        };
        if len > MAX_STRING_LEN {
            self.pos = start;
            return Err(Error::CorruptFrame(format!(
                "string length too large: {}",
                len
            )));
        }
        match self.try_get_contiguous(len) {
            Some(bytes) => {
                let s = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    Error::CorruptFrame(format!(
                        "invalid UTF-8 in string: {}",
                        e
                    ))
                })?;
                Ok(Some(s))
            }
            None => {
                self.pos = start;
                Ok(None)
            }
        }
    }

    /// Borrow the raw bytes of a length-prefixed string without
    /// allocating; `None` leaves the position unchanged. The scan-pass
    /// hot path matches these bytes against known type names directly.
    pub fn try_read_prefixed_bytes(
        &mut self,
    ) -> Result<Option<&'a [u8]>> {
        let start = self.pos;
        let len = match self.try_read_varint()? {
            VarintStatus::Done { value, .. } => value as usize,
            VarintStatus::Continue { .. } => return Ok(None),
        };
        if len > MAX_STRING_LEN {
            self.pos = start;
            return Err(Error::CorruptFrame(format!(
                "string length too large: {}",
                len
            )));
        }
        match self.try_get_contiguous(len) {
            Some(bytes) => Ok(Some(bytes)),
            None => {
                self.pos = start;
                Ok(None)
            }
        }
    }

    /// Skip a length-prefixed string without materializing it; `false`
    /// leaves the position unchanged.
    pub fn try_skip_string(&mut self) -> Result<bool> {
        let start = self.pos;
        let len = match self.try_read_varint()? {
            VarintStatus::Done { value, .. } => value as usize,
            VarintStatus::Continue { .. } => return Ok(false),
        };
        if len > MAX_STRING_LEN {
            self.pos = start;
            return Err(Error::CorruptFrame(format!(
                "string length too large: {}",
                len
            )));
        }
        if self.try_advance(len) {
            Ok(true)
        } else {
            self.pos = start;
            Ok(false)
        }
    }
}
