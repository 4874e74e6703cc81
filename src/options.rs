//! Codec and bulk-insert configuration.
//!
//! Plain builder-style option structs. Nothing at this layer reads
//! environment variables, files, or the CLI.

use crate::protocol::{CompressionMethod, DBMS_TCP_PROTOCOL_VERSION};

/// How `String` columns are materialized on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMaterialization {
    /// Decode every cell into an owned string eagerly (default).
    #[default]
    Eager,
    /// Keep one backing buffer plus offsets; decode cells on demand.
    /// Chosen when the consumer stream-scans without touching every cell.
    Lazy,
}

/// Options for one codec instance.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Compression applied to block payloads in both directions.
    pub compression: CompressionMethod,
    /// String column materialization strategy.
    pub string_materialization: StringMaterialization,
    /// Negotiated protocol revision. Gates the per-column
    /// custom-serialization byte.
    pub protocol_revision: u64,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            compression: CompressionMethod::None,
            string_materialization: StringMaterialization::Eager,
            protocol_revision: DBMS_TCP_PROTOCOL_VERSION,
        }
    }
}

impl CodecOptions {
    /// Create options with defaults (no compression, eager strings,
    /// current protocol revision).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the block compression method.
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = method;
        self
    }

    /// Set the string materialization strategy.
    pub fn string_materialization(
        mut self,
        mode: StringMaterialization,
    ) -> Self {
        self.string_materialization = mode;
        self
    }

    /// Set the negotiated protocol revision.
    pub fn protocol_revision(mut self, revision: u64) -> Self {
        self.protocol_revision = revision;
        self
    }

    /// Whether block column descriptors carry the custom-serialization
    /// byte at this revision.
    pub fn has_custom_serialization(&self) -> bool {
        self.protocol_revision
            >= crate::protocol::DBMS_MIN_REVISION_WITH_CUSTOM_SERIALIZATION
    }
}

/// Options for the bulk-insert pipeline.
#[derive(Debug, Clone)]
pub struct InsertOptions {
    /// Rows buffered before a flush is issued. Must be positive.
    pub batch_size: usize,
    /// When true, Nullable schema columns with no matching row field are
    /// emitted as all-NULL columns; when false they are omitted.
    pub include_null_columns: bool,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self { batch_size: 10_000, include_null_columns: true }
    }
}

impl InsertOptions {
    /// Create options with defaults (batch of 10 000, null columns
    /// included).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flush threshold.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` is zero.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        assert!(batch_size > 0, "batch_size must be positive");
        self.batch_size = batch_size;
        self
    }

    /// Set whether unmatched Nullable schema columns are emitted as
    /// all-NULL columns.
    pub fn include_null_columns(mut self, include: bool) -> Self {
        self.include_null_columns = include;
        self
    }
}
