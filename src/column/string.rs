//! String columns.
//!
//! `String` cells are varint-length-prefixed UTF-8 on the wire. Two
//! materializations exist:
//!
//! - [`ColumnString`] decodes every cell eagerly. Columns with at least
//!   100 rows run through a bounded FIFO intern table so repeated values
//!   share one allocation.
//! - [`ColumnStringLazy`] keeps one pooled backing buffer plus offsets and
//!   decodes cells on demand; the right shape when the consumer will
//!   stream-scan without materializing every cell.
//!
//! `FixedString(N)` is exactly N bytes per row, null-padded on write and
//! trailing-NUL-trimmed when converted to text.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::pool::{self, Pooled};
use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::{Column, ColumnRef};

/// Row count at which the eager decoder starts interning.
const INTERN_ROW_THRESHOLD: usize = 100;
/// Bound on the intern table; replacement is FIFO.
const INTERN_TABLE_CAPACITY: usize = 10_000;

/// A cheap deduplicator with bounded memory, scratch state for one decode
/// call.
struct Interner {
    map: HashMap<Arc<str>, ()>,
    order: VecDeque<Arc<str>>,
}

impl Interner {
    fn new() -> Self {
        Self { map: HashMap::new(), order: VecDeque::new() }
    }

    fn intern(&mut self, text: &str) -> Arc<str> {
        if let Some((existing, _)) = self.map.get_key_value(text) {
            return existing.clone();
        }
        let value: Arc<str> = Arc::from(text);
        self.map.insert(value.clone(), ());
        self.order.push_back(value.clone());
        if self.order.len() > INTERN_TABLE_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.map.remove(&evicted);
            }
        }
        value
    }
}

fn read_cell<'a>(
    reader: &mut ByteReader<'a>,
    context: &'static str,
) -> Result<&'a [u8]> {
    let len = reader.read_varint()? as usize;
    let have = reader.remaining();
    reader.try_get_contiguous(len).ok_or(Error::Truncated {
        context,
        need: len,
        have,
    })
}

/// Eagerly materialized string column.
pub struct ColumnString {
    type_: TypeNode,
    data: Vec<Arc<str>>,
}

impl ColumnString {
    /// Create with the default `String` type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("String"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one value.
    pub fn append(&mut self, value: impl AsRef<str>) {
        self.data.push(Arc::from(value.as_ref()));
    }

    /// Value at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(|s| s.as_ref())
    }

    /// Value at `index`; panics out of range.
    pub fn at(&self, index: usize) -> &str {
        &self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate over the values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.data.iter().map(|s| s.as_ref())
    }

    /// The shared value at `index` (interned cells share allocations).
    pub fn shared_at(&self, index: usize) -> Arc<str> {
        self.data[index].clone()
    }
}

impl Default for ColumnString {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnString {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        self.data.reserve(rows);
        let mut interner = (rows >= INTERN_ROW_THRESHOLD)
            .then(Interner::new);
        for _ in 0..rows {
            let raw = read_cell(reader, "String cell")?;
            let text = std::str::from_utf8(raw).map_err(|e| {
                Error::CorruptFrame(format!("invalid UTF-8 in String: {}", e))
            })?;
            let cell = match interner.as_mut() {
                Some(interner) => interner.intern(text),
                None => Arc::from(text),
            };
            self.data.push(cell);
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for value in &self.data {
            writer.write_string(value);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnString::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data.get(index).map(|s| s.is_empty()).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Lazily materialized string column: one pooled UTF-8 backing buffer plus
/// cumulative end offsets. Cells decode on access.
pub struct ColumnStringLazy {
    type_: TypeNode,
    backing: Pooled<u8>,
    offsets: Pooled<u64>,
}

impl ColumnStringLazy {
    /// Create with an explicit parsed type, renting pooled storage.
    pub fn with_type(type_: TypeNode) -> Result<Self> {
        Ok(Self {
            type_,
            backing: pool::rent_bytes(4096)?,
            offsets: pool::rent_offsets(256)?,
        })
    }

    /// Append one value.
    pub fn append(&mut self, value: &str) {
        self.backing.extend_from_slice(value.as_bytes());
        self.offsets.push(self.backing.len() as u64);
    }

    fn range(&self, index: usize) -> Option<(usize, usize)> {
        let end = *self.offsets.get(index)? as usize;
        let start = if index == 0 {
            0
        } else {
            self.offsets[index - 1] as usize
        };
        Some((start, end))
    }

    /// Raw cell bytes at `index`.
    pub fn bytes_at(&self, index: usize) -> Option<&[u8]> {
        let (start, end) = self.range(index)?;
        Some(&self.backing[start..end])
    }

    /// Decode the cell at `index`, validating UTF-8 on demand.
    pub fn get(&self, index: usize) -> Result<Option<&str>> {
        let Some(raw) = self.bytes_at(index) else {
            return Ok(None);
        };
        std::str::from_utf8(raw).map(Some).map_err(|e| {
            Error::CorruptFrame(format!("invalid UTF-8 in String: {}", e))
        })
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

impl Column for ColumnStringLazy {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.offsets.len()
    }

    fn clear(&mut self) {
        self.backing.clear();
        self.offsets.clear();
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        self.offsets.reserve(rows);
        for _ in 0..rows {
            let raw = read_cell(reader, "String cell")?;
            self.backing.extend_from_slice(raw);
            self.offsets.push(self.backing.len() as u64);
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for index in 0..self.offsets.len() {
            let (start, end) = self.range(index).ok_or_else(|| {
                Error::Bug("lazy string offsets out of range".to_string())
            })?;
            writer.write_len_prefixed_bytes(&self.backing[start..end]);
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(
            ColumnStringLazy::with_type(self.type_.clone())
                .expect("pool rental for empty clone"),
        )
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.bytes_at(index).map(|b| b.is_empty()).unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Fixed-length string column: exactly N bytes per row.
pub struct ColumnFixedString {
    type_: TypeNode,
    width: usize,
    data: Vec<u8>,
}

impl ColumnFixedString {
    /// Create from a parsed `FixedString(N)` type.
    pub fn new(type_: TypeNode) -> Result<Self> {
        let width = type_.int_parameter(0)? as usize;
        if width == 0 {
            return Err(Error::MalformedType(
                "FixedString width must be positive".to_string(),
            ));
        }
        Ok(Self { type_, width, data: Vec::new() })
    }

    /// The fixed width N.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Append a value, null-padding to the width.
    pub fn append(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > self.width {
            return Err(Error::SchemaMismatch(format!(
                "value of {} bytes does not fit FixedString({})",
                bytes.len(),
                self.width
            )));
        }
        self.data.extend_from_slice(bytes);
        self.data.resize(self.data.len() + (self.width - bytes.len()), 0);
        Ok(())
    }

    /// Raw cell bytes at `index` (padding included).
    pub fn bytes_at(&self, index: usize) -> Option<&[u8]> {
        if index >= self.size() {
            return None;
        }
        let start = index * self.width;
        Some(&self.data[start..start + self.width])
    }

    /// Cell at `index` as text with trailing NULs trimmed.
    pub fn get(&self, index: usize) -> Option<String> {
        let bytes = self.bytes_at(index)?;
        let trimmed =
            bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..trimmed]).into_owned())
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.size()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Column for ColumnFixedString {
    fn type_node(&self) -> &TypeNode {
        &self.type_
    }

    fn size(&self) -> usize {
        self.data.len() / self.width
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn load_body(
        &mut self,
        reader: &mut ByteReader<'_>,
        rows: usize,
    ) -> Result<()> {
        let total = rows * self.width;
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(total) else {
            return Err(Error::Truncated {
                context: "FixedString",
                need: total,
                have,
            });
        };
        self.data.extend_from_slice(raw);
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        writer.write_bytes(&self.data);
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(
            ColumnFixedString::new(self.type_.clone())
                .expect("valid FixedString type"),
        )
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.bytes_at(index)
            .map(|b| b.iter().all(|&byte| byte == 0))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn eager_round_trip() {
        let mut col = ColumnString::new();
        col.append("hello");
        col.append("мир");
        col.append("");
        col.append("🦀");

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut col2 = ColumnString::new();
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 4).unwrap();
        assert!(r.is_empty());
        assert_eq!(col2.get(0), Some("hello"));
        assert_eq!(col2.get(1), Some("мир"));
        assert_eq!(col2.get(2), Some(""));
        assert_eq!(col2.get(3), Some("🦀"));
    }

    #[test]
    fn interning_shares_repeated_values() {
        let mut w = ByteWriter::new();
        for i in 0..200 {
            w.write_string(if i % 2 == 0 { "even" } else { "odd" });
        }
        let bytes = w.as_slice().to_vec();

        let mut col = ColumnString::new();
        let mut r = ByteReader::new(&bytes);
        col.load_body(&mut r, 200).unwrap();

        assert_eq!(col.at(0), "even");
        assert_eq!(col.at(198), "even");
        // Interned cells share one allocation.
        assert!(Arc::ptr_eq(&col.shared_at(0), &col.shared_at(2)));
        assert!(Arc::ptr_eq(&col.shared_at(1), &col.shared_at(199)));
    }

    #[test]
    fn small_columns_skip_the_interner() {
        let mut w = ByteWriter::new();
        w.write_string("x");
        w.write_string("x");
        let bytes = w.as_slice().to_vec();

        let mut col = ColumnString::new();
        let mut r = ByteReader::new(&bytes);
        col.load_body(&mut r, 2).unwrap();
        assert!(!Arc::ptr_eq(&col.shared_at(0), &col.shared_at(1)));
    }

    #[test]
    fn interner_fifo_eviction() {
        let mut interner = Interner::new();
        for i in 0..INTERN_TABLE_CAPACITY + 5 {
            interner.intern(&format!("value-{}", i));
        }
        assert_eq!(interner.map.len(), INTERN_TABLE_CAPACITY);
        // The first entries were evicted in insertion order.
        assert!(!interner.map.contains_key("value-0"));
        assert!(interner.map.contains_key("value-5"));
    }

    #[test]
    fn lazy_round_trip_and_on_demand_decode() {
        let mut w = ByteWriter::new();
        w.write_string("a");
        w.write_string("");
        w.write_string("ccc");
        let bytes = w.as_slice().to_vec();

        let mut col = ColumnStringLazy::with_type(TypeNode::simple("String"))
            .unwrap();
        let mut r = ByteReader::new(&bytes);
        col.load_body(&mut r, 3).unwrap();

        assert_eq!(col.len(), 3);
        assert_eq!(col.get(0).unwrap(), Some("a"));
        assert_eq!(col.get(1).unwrap(), Some(""));
        assert_eq!(col.get(2).unwrap(), Some("ccc"));
        assert_eq!(col.get(3).unwrap(), None);
        assert_eq!(col.bytes_at(2), Some(&b"ccc"[..]));

        let mut w2 = ByteWriter::new();
        col.save_body(&mut w2).unwrap();
        assert_eq!(w2.as_slice(), &bytes[..]);
    }

    #[test]
    fn truncated_cell_reports_need() {
        let mut w = ByteWriter::new();
        w.write_varint(10);
        w.write_bytes(b"abc");
        let bytes = w.as_slice().to_vec();

        let mut col = ColumnString::new();
        let mut r = ByteReader::new(&bytes);
        let err = col.load_body(&mut r, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated { need: 10, have: 3, .. }
        ));
    }

    #[test]
    fn fixed_string_padding_and_trimming() {
        let node = crate::types::parse_type("FixedString(8)").unwrap();
        let mut col = ColumnFixedString::new(node).unwrap();
        col.append("hi").unwrap();
        col.append("eightby8").unwrap();
        assert!(col.append("way too long").is_err());

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        assert_eq!(w.len(), 16);
        assert_eq!(&w.as_slice()[..8], b"hi\0\0\0\0\0\0");

        let bytes = w.as_slice().to_vec();
        let node = crate::types::parse_type("FixedString(8)").unwrap();
        let mut col2 = ColumnFixedString::new(node).unwrap();
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 2).unwrap();
        assert_eq!(col2.get(0), Some("hi".to_string()));
        assert_eq!(col2.get(1), Some("eightby8".to_string()));
    }
}
