//! Protocol constants: revision gates, compression tags, block-info field
//! ids, and the JSON serialization version.

/// First revision that writes the per-column custom-serialization byte.
pub const DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION: u64 = 54454;

/// Revision negotiated by current servers; used as the default
/// `protocol_revision` in [`crate::options::CodecOptions`].
pub const DBMS_TCP_PROTOCOL_VERSION: u64 = 54465;

/// Block-info field id for the overflow flag.
pub const BLOCK_INFO_FIELD_OVERFLOW: u64 = 1;
/// Block-info field id for the bucket number.
pub const BLOCK_INFO_FIELD_BUCKET: u64 = 2;
/// Block-info terminator field id.
pub const BLOCK_INFO_FIELD_END: u64 = 0;

/// JSON column serialization version this codec reads and writes.
/// Versions 0 and 3 are deprecated object serializations and rejected.
pub const JSON_SERIALIZATION_VERSION_STRING: u64 = 1;

/// Methods of block compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    /// No compression (default). Blocks travel unframed.
    #[default]
    None,
    /// LZ4 compression -- fast with good compression ratio.
    Lz4,
    /// ZSTD compression -- better ratio but slower than LZ4.
    Zstd,
}

/// Compression method byte values inside a frame header
/// (from ClickHouse `CompressionMethodByte`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethodByte {
    /// Stored body, still framed and checksummed.
    None = 0x02,
    /// LZ4 block format.
    Lz4 = 0x82,
    /// ZSTD.
    Zstd = 0x90,
}

impl CompressionMethodByte {
    /// Map a wire tag back to the method byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x02 => Some(CompressionMethodByte::None),
            0x82 => Some(CompressionMethodByte::Lz4),
            0x90 => Some(CompressionMethodByte::Zstd),
            _ => None,
        }
    }
}

impl From<CompressionMethod> for CompressionMethodByte {
    fn from(method: CompressionMethod) -> Self {
        match method {
            CompressionMethod::None => CompressionMethodByte::None,
            CompressionMethod::Lz4 => CompressionMethodByte::Lz4,
            CompressionMethod::Zstd => CompressionMethodByte::Zstd,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for method in [
            CompressionMethod::None,
            CompressionMethod::Lz4,
            CompressionMethod::Zstd,
        ] {
            let byte = CompressionMethodByte::from(method);
            assert_eq!(CompressionMethodByte::from_tag(byte as u8), Some(byte));
        }
        assert_eq!(CompressionMethodByte::from_tag(0x55), None);
    }

    #[test]
    fn known_tag_values() {
        assert_eq!(CompressionMethodByte::Lz4 as u8, 0x82);
        assert_eq!(CompressionMethodByte::Zstd as u8, 0x90);
        assert_eq!(CompressionMethodByte::None as u8, 0x02);
    }
}
