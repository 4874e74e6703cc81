//! Block-level I/O: the assembler that reads and writes whole blocks over
//! wire buffers, and the streaming decoder that retains partial input
//! across reads.

mod block_codec;
mod stream;

pub use block_codec::BlockCodec;
pub use stream::BlockStreamDecoder;
