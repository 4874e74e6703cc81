//! Compressed frames: the checksum-prefixed, algorithm-tagged envelope
//! around one block payload.
//!
//! Wire layout:
//!
//! ```text
//! hash[16] || algo[1] || frame_size[4, LE u32] || uncompressed_size[4, LE u32] || body
//! ```
//!
//! `frame_size` counts the 9-byte header plus the body but not the
//! checksum; `hash` is CityHash 1.0.2 128-bit over everything after the
//! checksum. The hash is validated *before* decompression; a mismatch is
//! [`Error::Checksum`] and poisons the stream.

use bytes::{BufMut, Bytes, BytesMut};
use cityhash_rs::cityhash_102_128;

use crate::pool;
use crate::protocol::{CompressionMethod, CompressionMethodByte};
use crate::{Error, Result};

/// Checksum size in bytes (CityHash128).
pub const CHECKSUM_SIZE: usize = 16;
/// Header size: 1 byte method + 4 bytes frame size + 4 bytes
/// uncompressed size.
pub const HEADER_SIZE: usize = 9;
/// Smallest well-formed frame: checksum plus header.
pub const MIN_FRAME_SIZE: usize = CHECKSUM_SIZE + HEADER_SIZE;

/// Maximum accepted compressed or uncompressed payload size (1 GiB),
/// guarding against corrupt headers.
const MAX_PAYLOAD_SIZE: usize = 0x4000_0000;

/// Outcome of [`decode_frame`].
#[derive(Debug)]
pub enum FrameDecode {
    /// The buffer does not yet hold a whole frame; `need` is the total
    /// byte count required.
    NeedMoreData {
        /// Bytes required before decoding can proceed.
        need: usize,
    },
    /// One frame decoded.
    Frame {
        /// The verified, decompressed payload.
        payload: Bytes,
        /// Bytes of input consumed, including the checksum.
        consumed: usize,
    },
}

/// Compress one block payload into a frame.
pub fn encode_frame(
    method: CompressionMethod,
    payload: &[u8],
) -> Result<Bytes> {
    let mut scratch =
        pool::rent_bytes(HEADER_SIZE + payload.len() + 64)?;

    scratch.push(CompressionMethodByte::from(method) as u8);
    // Frame size is patched once the body length is known.
    scratch.extend_from_slice(&[0u8; 8]);

    match method {
        CompressionMethod::None => {
            scratch.extend_from_slice(payload);
        }
        CompressionMethod::Lz4 => {
            let bound = lz4::block::compress_bound(payload.len())
                .map_err(|e| Error::CorruptFrame(format!(
                    "lz4 bound: {}", e
                )))?;
            let start = scratch.len();
            scratch.resize(start + bound, 0);
            let written = lz4::block::compress_to_buffer(
                payload,
                None,
                false,
                &mut scratch[start..],
            )
            .map_err(|e| {
                Error::CorruptFrame(format!("lz4 compression: {}", e))
            })?;
            scratch.truncate(start + written);
        }
        CompressionMethod::Zstd => {
            let compressed =
                zstd::bulk::compress(payload, 3).map_err(|e| {
                    Error::CorruptFrame(format!("zstd compression: {}", e))
                })?;
            scratch.extend_from_slice(&compressed);
        }
    }

    let frame_size = scratch.len() as u32;
    scratch[1..5].copy_from_slice(&frame_size.to_le_bytes());
    scratch[5..9].copy_from_slice(&(payload.len() as u32).to_le_bytes());

    let checksum = cityhash_102_128(&scratch);

    let mut out = BytesMut::with_capacity(CHECKSUM_SIZE + scratch.len());
    out.put_u128_le(checksum);
    out.put_slice(&scratch);
    scratch.release();
    Ok(out.freeze())
}

/// Decode one frame from the front of `buf`.
///
/// Returns [`FrameDecode::NeedMoreData`] while the buffer is short; the
/// caller retains its bytes and retries. The checksum covers the header
/// and body and is verified before the compressor runs.
pub fn decode_frame(buf: &[u8]) -> Result<FrameDecode> {
    if buf.len() < MIN_FRAME_SIZE {
        return Ok(FrameDecode::NeedMoreData { need: MIN_FRAME_SIZE });
    }

    let tag = buf[CHECKSUM_SIZE];
    let frame_size = u32::from_le_bytes(
        buf[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5].try_into().unwrap(),
    ) as usize;
    let uncompressed_size = u32::from_le_bytes(
        buf[CHECKSUM_SIZE + 5..CHECKSUM_SIZE + 9].try_into().unwrap(),
    ) as usize;

    if frame_size < HEADER_SIZE {
        return Err(Error::CorruptFrame(format!(
            "frame size {} smaller than its header",
            frame_size
        )));
    }
    if frame_size > MAX_PAYLOAD_SIZE || uncompressed_size > MAX_PAYLOAD_SIZE
    {
        return Err(Error::CorruptFrame(format!(
            "frame sizes out of range: {} / {}",
            frame_size, uncompressed_size
        )));
    }

    let total = CHECKSUM_SIZE + frame_size;
    if buf.len() < total {
        return Ok(FrameDecode::NeedMoreData { need: total });
    }

    let stored = u128::from_le_bytes(buf[..CHECKSUM_SIZE].try_into().unwrap());
    let computed = cityhash_102_128(&buf[CHECKSUM_SIZE..total]);
    if stored != computed {
        return Err(Error::Checksum);
    }

    let body = &buf[CHECKSUM_SIZE + HEADER_SIZE..total];
    let payload = match CompressionMethodByte::from_tag(tag) {
        Some(CompressionMethodByte::None) => {
            if body.len() != uncompressed_size {
                return Err(Error::CorruptFrame(format!(
                    "stored body is {} bytes, header claims {}",
                    body.len(),
                    uncompressed_size
                )));
            }
            Bytes::copy_from_slice(body)
        }
        Some(CompressionMethodByte::Lz4) => {
            let decompressed = lz4::block::decompress(
                body,
                Some(uncompressed_size as i32),
            )
            .map_err(|e| {
                Error::CorruptFrame(format!("lz4 decompression: {}", e))
            })?;
            if decompressed.len() != uncompressed_size {
                return Err(Error::CorruptFrame(format!(
                    "lz4 produced {} bytes, header claims {}",
                    decompressed.len(),
                    uncompressed_size
                )));
            }
            Bytes::from(decompressed)
        }
        Some(CompressionMethodByte::Zstd) => {
            let decompressed =
                zstd::bulk::decompress(body, uncompressed_size).map_err(
                    |e| {
                        Error::CorruptFrame(format!(
                            "zstd decompression: {}",
                            e
                        ))
                    },
                )?;
            if decompressed.len() != uncompressed_size {
                return Err(Error::CorruptFrame(format!(
                    "zstd produced {} bytes, header claims {}",
                    decompressed.len(),
                    uncompressed_size
                )));
            }
            Bytes::from(decompressed)
        }
        None => return Err(Error::UnsupportedAlgorithm(tag)),
    };

    Ok(FrameDecode::Frame { payload, consumed: total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(method: CompressionMethod, payload: &[u8]) -> Bytes {
        let frame = encode_frame(method, payload).unwrap();
        match decode_frame(&frame).unwrap() {
            FrameDecode::Frame { payload, consumed } => {
                assert_eq!(consumed, frame.len());
                payload
            }
            FrameDecode::NeedMoreData { .. } => {
                panic!("whole frame should decode")
            }
        }
    }

    #[test]
    fn round_trip_all_methods() {
        let payload = b"ClickHouse speaks columns ".repeat(64);
        for method in [
            CompressionMethod::None,
            CompressionMethod::Lz4,
            CompressionMethod::Zstd,
        ] {
            assert_eq!(&round_trip(method, &payload)[..], &payload[..]);
        }
    }

    #[test]
    fn compresses_repetitive_payload() {
        let payload = vec![42u8; 100_000];
        let frame = encode_frame(CompressionMethod::Lz4, &payload).unwrap();
        assert!(frame.len() < payload.len() / 10);
        assert_eq!(&round_trip(CompressionMethod::Lz4, &payload)[..], &payload[..]);
    }

    #[test]
    fn empty_payload() {
        assert_eq!(&round_trip(CompressionMethod::Lz4, b"")[..], b"");
    }

    #[test]
    fn short_buffer_needs_more() {
        let frame =
            encode_frame(CompressionMethod::Lz4, b"hello world").unwrap();
        match decode_frame(&frame[..10]).unwrap() {
            FrameDecode::NeedMoreData { need } => {
                assert_eq!(need, MIN_FRAME_SIZE)
            }
            _ => panic!("expected NeedMoreData"),
        }
        match decode_frame(&frame[..frame.len() - 1]).unwrap() {
            FrameDecode::NeedMoreData { need } => {
                assert_eq!(need, frame.len())
            }
            _ => panic!("expected NeedMoreData"),
        }
    }

    #[test]
    fn any_body_bit_flip_fails_checksum() {
        let frame =
            encode_frame(CompressionMethod::Lz4, b"checksum coverage")
                .unwrap();
        // The algorithm tag, the uncompressed-size field, and every body
        // byte are covered by the hash and must fail it when flipped.
        // (The frame-size field is covered too, but inflating it makes
        // the decoder wait for bytes that never come; see below.)
        let mut flips: Vec<usize> = vec![CHECKSUM_SIZE];
        flips.extend(CHECKSUM_SIZE + 5..frame.len());
        for byte_index in flips {
            let mut corrupted = frame.to_vec();
            corrupted[byte_index] ^= 0x01;
            let result = decode_frame(&corrupted);
            assert!(
                matches!(result, Err(Error::Checksum)),
                "flip at byte {} should fail the checksum",
                byte_index
            );
        }
    }

    #[test]
    fn frame_size_corruption() {
        let frame =
            encode_frame(CompressionMethod::Lz4, b"checksum coverage")
                .unwrap();
        let size = u32::from_le_bytes(
            frame[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5].try_into().unwrap(),
        );

        // A shrunken frame size changes the hashed range: checksum fails.
        let mut shrunk = frame.to_vec();
        shrunk[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5]
            .copy_from_slice(&(size - 1).to_le_bytes());
        assert!(matches!(decode_frame(&shrunk), Err(Error::Checksum)));

        // An inflated frame size makes the decoder wait for the missing
        // tail; the corruption surfaces as soon as those bytes "arrive"
        // and the checksum runs.
        let mut inflated = frame.to_vec();
        inflated[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5]
            .copy_from_slice(&(size + 4).to_le_bytes());
        match decode_frame(&inflated).unwrap() {
            FrameDecode::NeedMoreData { need } => {
                assert_eq!(need, frame.len() + 4)
            }
            _ => panic!("expected NeedMoreData"),
        }
        inflated.extend_from_slice(&[0u8; 4]);
        assert!(matches!(decode_frame(&inflated), Err(Error::Checksum)));
    }

    #[test]
    fn checksum_flip_detected() {
        let frame = encode_frame(CompressionMethod::None, b"abc").unwrap();
        let mut corrupted = frame.to_vec();
        corrupted[0] ^= 0x80;
        assert!(matches!(decode_frame(&corrupted), Err(Error::Checksum)));
    }

    #[test]
    fn unknown_algorithm_surfaces_after_checksum() {
        // Build a frame with a bogus tag but a correct hash: the tag check
        // must report UnsupportedAlgorithm, not Checksum.
        let mut body = Vec::new();
        body.push(0x55u8);
        body.extend_from_slice(&(HEADER_SIZE as u32 + 3).to_le_bytes());
        body.extend_from_slice(&3u32.to_le_bytes());
        body.extend_from_slice(b"xyz");
        let checksum = cityhash_102_128(&body);
        let mut frame = Vec::new();
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&body);

        assert!(matches!(
            decode_frame(&frame),
            Err(Error::UnsupportedAlgorithm(0x55))
        ));
    }

    #[test]
    fn trailing_bytes_left_for_next_frame() {
        let a = encode_frame(CompressionMethod::Zstd, b"first").unwrap();
        let b = encode_frame(CompressionMethod::Zstd, b"second").unwrap();
        let mut joined = a.to_vec();
        joined.extend_from_slice(&b);

        match decode_frame(&joined).unwrap() {
            FrameDecode::Frame { payload, consumed } => {
                assert_eq!(&payload[..], b"first");
                assert_eq!(consumed, a.len());
                match decode_frame(&joined[consumed..]).unwrap() {
                    FrameDecode::Frame { payload, .. } => {
                        assert_eq!(&payload[..], b"second")
                    }
                    _ => panic!("second frame should decode"),
                }
            }
            _ => panic!("first frame should decode"),
        }
    }
}
