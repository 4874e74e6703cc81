//! The ClickHouse type grammar.
//!
//! A column's type arrives on the wire as text
//! (`Nullable(Array(LowCardinality(String)))`, `Decimal(18, 4)`,
//! `Tuple(id UInt64, name String)`, `Enum8('a' = 1)`) and is parsed by
//! [`parser`] into a [`TypeNode`] tree that the column factory and the
//! skippers dispatch on.
//!
//! Composite bases take *type arguments* (`Array`, `Nullable`,
//! `LowCardinality`, `Map`, `Tuple`, `Nested`); parameterized terminals
//! take opaque literal *parameters* (`FixedString(8)`, `DateTime64(3,
//! 'UTC')`, enum definitions). Named tuples and `Nested` carry
//! `field_names` parallel to their type arguments.

mod parser;

pub use parser::parse_type;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Error, Result};

/// One opaque literal parameter of a parameterized type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeParameter {
    /// An integer literal, e.g. the `8` in `FixedString(8)`.
    Int(i64),
    /// A quoted string literal, e.g. the timezone in `DateTime('UTC')`.
    Quoted(String),
    /// One `'name' = value` entry of an enum definition.
    EnumEntry {
        /// Symbolic name.
        name: String,
        /// Numeric code.
        value: i64,
    },
}

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeNode {
    /// The base identifier (`UInt64`, `Array`, `Decimal`, ...).
    pub base_name: String,
    /// Ordered child types of a composite base.
    pub type_arguments: Vec<TypeNode>,
    /// Ordered literal parameters of a parameterized terminal.
    pub parameters: Vec<TypeParameter>,
    /// Field names parallel to `type_arguments`; non-empty only for named
    /// tuples and `Nested`.
    pub field_names: Vec<String>,
    /// The verbatim source text this node was parsed from.
    pub original_text: String,
}

impl TypeNode {
    /// Build a bare terminal node (used in tests and by the factory for
    /// synthesized inner types).
    pub fn simple(base_name: &str) -> Self {
        Self {
            base_name: base_name.to_string(),
            type_arguments: Vec::new(),
            parameters: Vec::new(),
            field_names: Vec::new(),
            original_text: base_name.to_string(),
        }
    }

    /// Wrap `inner` in a single-argument composite, synthesizing the text.
    pub fn wrapping(base_name: &str, inner: TypeNode) -> Self {
        let original_text =
            format!("{}({})", base_name, inner.original_text);
        Self {
            base_name: base_name.to_string(),
            type_arguments: vec![inner],
            parameters: Vec::new(),
            field_names: Vec::new(),
            original_text,
        }
    }

    /// True when the base identifier equals `name`.
    pub fn is(&self, name: &str) -> bool {
        self.base_name == name
    }

    /// The single type argument of `Nullable`/`Array`/`LowCardinality`.
    pub fn inner(&self) -> Result<&TypeNode> {
        self.type_arguments.first().ok_or_else(|| {
            Error::MalformedType(format!(
                "{} requires a type argument",
                self.original_text
            ))
        })
    }

    /// Integer parameter at `index`.
    pub fn int_parameter(&self, index: usize) -> Result<i64> {
        match self.parameters.get(index) {
            Some(TypeParameter::Int(value)) => Ok(*value),
            _ => Err(Error::MalformedType(format!(
                "{} requires an integer parameter at position {}",
                self.original_text, index
            ))),
        }
    }

    /// Quoted parameter at `index`, if present.
    pub fn quoted_parameter(&self, index: usize) -> Option<&str> {
        match self.parameters.get(index) {
            Some(TypeParameter::Quoted(text)) => Some(text),
            _ => None,
        }
    }

    /// The `'name' = value` entries of an enum definition.
    pub fn enum_entries(&self) -> impl Iterator<Item = (&str, i64)> {
        self.parameters.iter().filter_map(|p| match p {
            TypeParameter::EnumEntry { name, value } => {
                Some((name.as_str(), *value))
            }
            _ => None,
        })
    }

    /// Decimal precision and scale for any `Decimal*` spelling.
    ///
    /// `Decimal(P, S)` carries both; `Decimal32(S)`/`Decimal64(S)`/
    /// `Decimal128(S)`/`Decimal256(S)` fix the precision bucket.
    pub fn decimal_precision_scale(&self) -> Result<(u32, u32)> {
        let (precision, scale) = match self.base_name.as_str() {
            "Decimal" => {
                (self.int_parameter(0)?, self.int_parameter(1)?)
            }
            "Decimal32" => (9, self.int_parameter(0)?),
            "Decimal64" => (18, self.int_parameter(0)?),
            "Decimal128" => (38, self.int_parameter(0)?),
            "Decimal256" => (76, self.int_parameter(0)?),
            _ => {
                return Err(Error::MalformedType(format!(
                    "{} is not a decimal type",
                    self.original_text
                )))
            }
        };
        if precision < 1 || precision > 76 {
            return Err(Error::MalformedType(format!(
                "decimal precision {} out of range 1..=76",
                precision
            )));
        }
        if scale < 0 || scale > precision {
            return Err(Error::MalformedType(format!(
                "decimal scale {} out of range 0..={}",
                scale, precision
            )));
        }
        Ok((precision as u32, scale as u32))
    }

    /// Storage width in bytes of a decimal with the given precision.
    pub fn decimal_storage_width(precision: u32) -> usize {
        match precision {
            0..=9 => 4,
            10..=18 => 8,
            19..=38 => 16,
            _ => 32,
        }
    }

    /// `DateTime64` sub-second precision (first parameter).
    pub fn datetime64_precision(&self) -> Result<u32> {
        let precision = self.int_parameter(0)?;
        if !(0..=18).contains(&precision) {
            return Err(Error::MalformedType(format!(
                "DateTime64 precision {} out of range 0..=18",
                precision
            )));
        }
        Ok(precision as u32)
    }

    /// The decoration-only timezone of `DateTime`/`DateTime64`, if any.
    pub fn timezone(&self) -> Option<&str> {
        match self.base_name.as_str() {
            "DateTime" => self.quoted_parameter(0),
            "DateTime64" => self.quoted_parameter(1),
            _ => None,
        }
    }

    /// Fixed per-row wire width for types whose payload is
    /// `row_count * width` bytes; `None` for variable-width and composite
    /// types.
    pub fn fixed_width(&self) -> Option<usize> {
        match self.base_name.as_str() {
            "Int8" | "UInt8" | "Bool" | "Enum8" | "Nothing" => Some(1),
            "Int16" | "UInt16" | "Date" | "Enum16" => Some(2),
            "Int32" | "UInt32" | "Float32" | "Date32" | "DateTime"
            | "IPv4" => Some(4),
            "Int64" | "UInt64" | "Float64" | "DateTime64" => Some(8),
            "Int128" | "UInt128" | "UUID" | "IPv6" => Some(16),
            "Int256" | "UInt256" => Some(32),
            "FixedString" => {
                self.int_parameter(0).ok().map(|n| n as usize)
            }
            "Decimal" | "Decimal32" | "Decimal64" | "Decimal128"
            | "Decimal256" => self
                .decimal_precision_scale()
                .ok()
                .map(|(p, _)| Self::decimal_storage_width(p)),
            _ => None,
        }
    }

    /// Enforce the arity invariants of the grammar. Called by the parser
    /// on every node it produces.
    pub fn validate(&self) -> Result<()> {
        let args = self.type_arguments.len();
        let params = self.parameters.len();
        match self.base_name.as_str() {
            "Nullable" | "Array" | "LowCardinality" => {
                if args != 1 || params != 0 {
                    return Err(Error::MalformedType(format!(
                        "{} takes exactly one type argument",
                        self.original_text
                    )));
                }
            }
            "Map" => {
                if args != 2 || params != 0 {
                    return Err(Error::MalformedType(format!(
                        "{} takes exactly two type arguments",
                        self.original_text
                    )));
                }
            }
            "Tuple" | "Nested" => {
                if args == 0 {
                    return Err(Error::MalformedType(format!(
                        "{} takes at least one type argument",
                        self.original_text
                    )));
                }
            }
            _ => {}
        }
        if !self.field_names.is_empty() && self.field_names.len() != args {
            return Err(Error::MalformedType(format!(
                "{}: {} field names for {} type arguments",
                self.original_text,
                self.field_names.len(),
                args
            )));
        }
        for child in &self.type_arguments {
            child.validate()?;
        }
        Ok(())
    }
}

impl std::fmt::Display for TypeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.original_text)
    }
}

/// Per-codec-instance cache of resolved type texts.
///
/// Shared by the block reader and the skippers of one codec instance;
/// lookup misses incur a single parser invocation.
pub struct TypeCache {
    entries: Mutex<HashMap<String, Arc<TypeNode>>>,
}

impl TypeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Fetch the parsed form of `type_text`, parsing on first use.
    pub fn resolve(&self, type_text: &str) -> Result<Arc<TypeNode>> {
        if let Some(node) = self.entries.lock().get(type_text) {
            return Ok(node.clone());
        }
        let node = Arc::new(parse_type(type_text)?);
        self.entries
            .lock()
            .insert(type_text.to_string(), node.clone());
        Ok(node)
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn fixed_widths() {
        assert_eq!(parse_type("UInt64").unwrap().fixed_width(), Some(8));
        assert_eq!(parse_type("FixedString(10)").unwrap().fixed_width(), Some(10));
        assert_eq!(parse_type("Decimal(18, 4)").unwrap().fixed_width(), Some(8));
        assert_eq!(parse_type("Decimal(40, 4)").unwrap().fixed_width(), Some(32));
        assert_eq!(parse_type("String").unwrap().fixed_width(), None);
        assert_eq!(parse_type("Array(UInt8)").unwrap().fixed_width(), None);
    }

    #[test]
    fn decimal_buckets() {
        assert_eq!(TypeNode::decimal_storage_width(9), 4);
        assert_eq!(TypeNode::decimal_storage_width(18), 8);
        assert_eq!(TypeNode::decimal_storage_width(38), 16);
        assert_eq!(TypeNode::decimal_storage_width(76), 32);
    }

    #[test]
    fn decimal_shorthand_spellings() {
        assert_eq!(
            parse_type("Decimal64(4)")
                .unwrap()
                .decimal_precision_scale()
                .unwrap(),
            (18, 4)
        );
        assert_eq!(
            parse_type("Decimal256(10)")
                .unwrap()
                .decimal_precision_scale()
                .unwrap(),
            (76, 10)
        );
    }

    #[test]
    fn decimal_out_of_range() {
        assert!(parse_type("Decimal(80, 4)")
            .unwrap()
            .decimal_precision_scale()
            .is_err());
        assert!(parse_type("Decimal(10, 12)")
            .unwrap()
            .decimal_precision_scale()
            .is_err());
    }

    #[test]
    fn timezone_decoration() {
        let dt = parse_type("DateTime('UTC')").unwrap();
        assert_eq!(dt.timezone(), Some("UTC"));
        let dt64 = parse_type("DateTime64(3, 'Europe/Moscow')").unwrap();
        assert_eq!(dt64.datetime64_precision().unwrap(), 3);
        assert_eq!(dt64.timezone(), Some("Europe/Moscow"));
        assert_eq!(parse_type("DateTime").unwrap().timezone(), None);
    }

    #[test]
    fn cache_resolves_once() {
        let cache = TypeCache::new();
        let a = cache.resolve("Array(String)").unwrap();
        let b = cache.resolve("Array(String)").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn wrapping_synthesizes_text() {
        let node = TypeNode::wrapping("Array", TypeNode::simple("UInt8"));
        assert_eq!(node.original_text, "Array(UInt8)");
        assert_eq!(node.inner().unwrap().base_name, "UInt8");
    }
}
