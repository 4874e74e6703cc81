//! Bulk-insert fast path.
//!
//! The server's reply to `INSERT INTO t (...) VALUES` carries the target
//! schema; caller rows are described once as a [`RowShape`] of typed
//! accessors, and the factory binds one extractor per schema column. An
//! extractor writes a whole column's wire bytes straight from borrowed
//! rows — no per-value heap allocation, no intermediate column objects.
//!
//! Rows buffer in the [`InsertPipeline`] until the batch threshold, then
//! flush as one data block through the byte sink.

mod extractor;
mod pipeline;
mod row;

pub use pipeline::{AsyncWriteSink, InsertPipeline, InsertSink};
pub use row::{FieldGetter, InsertRow, RowField, RowShape, Schema, SchemaColumn};
