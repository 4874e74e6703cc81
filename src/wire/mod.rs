//! Wire-format primitives: a positioned reader over a borrowed byte slice
//! and a growable writer, covering varints, fixed little-endian scalars up
//! to 256 bits, floats, and length-prefixed strings.

mod reader;
mod writer;

pub use reader::{ByteReader, VarintStatus};
pub use writer::ByteWriter;
pub(crate) use writer::scale_decimal_i128;

/// Maximum encoded length of a varint carrying a 64-bit payload.
pub const MAX_VARINT_LEN: usize = 10;

/// Longest string length this codec will read (guards against corrupt
/// length prefixes allocating unbounded memory).
pub(crate) const MAX_STRING_LEN: usize = 0x00FF_FFFF;
