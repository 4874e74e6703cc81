//! IP address columns.
//!
//! `IPv4` is four wire bytes in reversed (little-endian) order: the
//! numeric address read as an LE u32. `IPv6` is sixteen bytes in network
//! order, untransposed.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::types::TypeNode;
use crate::wire::{ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::WireScalar;
use super::{Column, ColumnRef};

/// Column for `IPv4`.
pub struct ColumnIpv4 {
    type_: TypeNode,
    data: Vec<Ipv4Addr>,
}

impl ColumnIpv4 {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("IPv4"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one address.
    pub fn append(&mut self, value: Ipv4Addr) {
        self.data.push(value);
    }

    /// Address at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Ipv4Addr> {
        self.data.get(index).copied()
    }

    /// Address at `index`; panics out of range.
    pub fn at(&self, index: usize) -> Ipv4Addr {
        self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bulk value slice.
    pub fn values(&self) -> &[Ipv4Addr] {
        &self.data
    }
}

impl Default for ColumnIpv4 {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnIpv4 {
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
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows * 4) else {
            return Err(Error::Truncated {
                context: "IPv4",
                need: rows * 4,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(raw.chunks_exact(4).map(|chunk| {
            Ipv4Addr::from(<u32 as WireScalar>::from_le_slice(chunk))
        }));
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_u32(u32::from(value));
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnIpv4::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data
            .get(index)
            .map(|a| *a == Ipv4Addr::UNSPECIFIED)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Column for `IPv6`.
pub struct ColumnIpv6 {
    type_: TypeNode,
    data: Vec<Ipv6Addr>,
}

impl ColumnIpv6 {
    /// Create with the default type.
    pub fn new() -> Self {
        Self { type_: TypeNode::simple("IPv6"), data: Vec::new() }
    }

    /// Create with an explicit parsed type.
    pub fn with_type(type_: TypeNode) -> Self {
        Self { type_, data: Vec::new() }
    }

    /// Append one address.
    pub fn append(&mut self, value: Ipv6Addr) {
        self.data.push(value);
    }

    /// Address at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Ipv6Addr> {
        self.data.get(index).copied()
    }

    /// Address at `index`; panics out of range.
    pub fn at(&self, index: usize) -> Ipv6Addr {
        self.data[index]
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bulk value slice.
    pub fn values(&self) -> &[Ipv6Addr] {
        &self.data
    }
}

impl Default for ColumnIpv6 {
    fn default() -> Self {
        Self::new()
    }
}

impl Column for ColumnIpv6 {
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
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows * 16) else {
            return Err(Error::Truncated {
                context: "IPv6",
                need: rows * 16,
                have,
            });
        };
        self.data.reserve(rows);
        self.data.extend(raw.chunks_exact(16).map(|chunk| {
            let bytes: [u8; 16] = chunk.try_into().expect("chunk width");
            Ipv6Addr::from(bytes)
        }));
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        for &value in &self.data {
            writer.write_bytes(&value.octets());
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(ColumnIpv6::with_type(self.type_.clone()))
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.data
            .get(index)
            .map(|a| *a == Ipv6Addr::UNSPECIFIED)
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
