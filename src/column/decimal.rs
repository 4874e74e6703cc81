//! Decimal columns.
//!
//! Storage width follows precision: `P <= 9` is Int32, `P <= 18` Int64,
//! `P <= 38` Int128, `P <= 76` Int256. The raw value is the mantissa
//! scaled by `10^S`.
//!
//! Accessors come in two shapes: [`ColumnDecimal::native_at`] converts to
//! [`rust_decimal::Decimal`], applying banker's rounding only when the
//! mantissa or scale must shrink to fit; [`ColumnDecimal::big_at`]
//! preserves the full mantissa through [`bigdecimal::BigDecimal`] at any
//! precision.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use rust_decimal::Decimal;

use crate::int256::I256;
use crate::types::TypeNode;
use crate::wire::{scale_decimal_i128, ByteReader, ByteWriter};
use crate::{Error, Result};

use super::numeric::WireScalar;
use super::{Column, ColumnRef};

/// rust_decimal scales beyond 28 are unrepresentable.
const NATIVE_MAX_SCALE: u32 = 28;

enum DecimalStorage {
    B32(Vec<i32>),
    B64(Vec<i64>),
    B128(Vec<i128>),
    B256(Vec<I256>),
}

impl DecimalStorage {
    fn for_precision(precision: u32) -> Self {
        match TypeNode::decimal_storage_width(precision) {
            4 => DecimalStorage::B32(Vec::new()),
            8 => DecimalStorage::B64(Vec::new()),
            16 => DecimalStorage::B128(Vec::new()),
            _ => DecimalStorage::B256(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            DecimalStorage::B32(v) => v.len(),
            DecimalStorage::B64(v) => v.len(),
            DecimalStorage::B128(v) => v.len(),
            DecimalStorage::B256(v) => v.len(),
        }
    }

    fn clear(&mut self) {
        match self {
            DecimalStorage::B32(v) => v.clear(),
            DecimalStorage::B64(v) => v.clear(),
            DecimalStorage::B128(v) => v.clear(),
            DecimalStorage::B256(v) => v.clear(),
        }
    }
}

/// Column for all `Decimal*` spellings.
pub struct ColumnDecimal {
    type_: TypeNode,
    precision: u32,
    scale: u32,
    data: DecimalStorage,
}

impl ColumnDecimal {
    /// Create from any parsed decimal type.
    pub fn new(type_: TypeNode) -> Result<Self> {
        let (precision, scale) = type_.decimal_precision_scale()?;
        Ok(Self {
            type_,
            precision,
            scale,
            data: DecimalStorage::for_precision(precision),
        })
    }

    /// Total significant digits.
    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Fractional digits; the raw divisor is `10^scale`.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn check_precision_i128(&self, mantissa: i128) -> Result<()> {
        // 10^38 fits i128, so every bucket up to B128 can be checked here.
        if self.precision <= 38 {
            let bound = 10_i128.pow(self.precision);
            if mantissa <= -bound || mantissa >= bound {
                return Err(Error::DecimalOverflow(format!(
                    "mantissa {} exceeds precision {}",
                    mantissa, self.precision
                )));
            }
        }
        Ok(())
    }

    /// Append a raw scaled mantissa.
    pub fn append_raw(&mut self, mantissa: i128) -> Result<()> {
        self.check_precision_i128(mantissa)?;
        match &mut self.data {
            DecimalStorage::B32(v) => {
                v.push(i32::try_from(mantissa).map_err(|_| {
                    Error::DecimalOverflow(format!(
                        "{} does not fit Decimal32 storage",
                        mantissa
                    ))
                })?)
            }
            DecimalStorage::B64(v) => {
                v.push(i64::try_from(mantissa).map_err(|_| {
                    Error::DecimalOverflow(format!(
                        "{} does not fit Decimal64 storage",
                        mantissa
                    ))
                })?)
            }
            DecimalStorage::B128(v) => v.push(mantissa),
            DecimalStorage::B256(v) => v.push(I256::from_i128(mantissa)),
        }
        Ok(())
    }

    /// Append a native decimal, rescaled to the column scale.
    pub fn append(&mut self, value: Decimal) -> Result<()> {
        let mantissa = scale_decimal_i128(value, self.scale)?;
        self.append_raw(mantissa)
    }

    /// Append an arbitrary-precision decimal (any bucket; required for
    /// precision above 38).
    pub fn append_big(&mut self, value: &BigDecimal) -> Result<()> {
        let rescaled = value.with_scale_round(
            self.scale as i64,
            bigdecimal::RoundingMode::HalfEven,
        );
        let (mantissa, _) = rescaled.as_bigint_and_exponent();
        let bound = BigInt::from(10).pow(self.precision);
        if mantissa <= -&bound || mantissa >= bound {
            return Err(Error::DecimalOverflow(format!(
                "mantissa {} exceeds precision {}",
                mantissa, self.precision
            )));
        }
        match &mut self.data {
            DecimalStorage::B256(v) => {
                v.push(I256::from_bigint(&mantissa)?);
                Ok(())
            }
            _ => {
                let narrow: i128 =
                    i128::try_from(&mantissa).map_err(|_| {
                        Error::DecimalOverflow(format!(
                            "{} does not fit 128-bit storage",
                            mantissa
                        ))
                    })?;
                self.append_raw(narrow)
            }
        }
    }

    /// Raw scaled mantissa at `index` as an arbitrary-precision integer.
    pub fn raw_at(&self, index: usize) -> Option<BigInt> {
        Some(match &self.data {
            DecimalStorage::B32(v) => BigInt::from(*v.get(index)?),
            DecimalStorage::B64(v) => BigInt::from(*v.get(index)?),
            DecimalStorage::B128(v) => BigInt::from(*v.get(index)?),
            DecimalStorage::B256(v) => v.get(index)?.to_bigint(),
        })
    }

    /// Full-mantissa value at `index`.
    pub fn big_at(&self, index: usize) -> Option<BigDecimal> {
        Some(BigDecimal::new(self.raw_at(index)?, self.scale as i64))
    }

    /// Value at `index` as the platform-native fixed-precision decimal.
    ///
    /// Mantissas or scales beyond the native range are reduced with
    /// banker's rounding; a value whose integral part cannot fit fails
    /// with [`Error::DecimalOverflow`].
    pub fn native_at(&self, index: usize) -> Result<Decimal> {
        let mut mantissa = self.raw_at(index).ok_or_else(|| {
            Error::Bug(format!("decimal index {} out of range", index))
        })?;
        let mut scale = self.scale;
        loop {
            if scale <= NATIVE_MAX_SCALE {
                if let Ok(narrow) = i128::try_from(&mantissa) {
                    if let Ok(value) =
                        Decimal::try_from_i128_with_scale(narrow, scale)
                    {
                        return Ok(value);
                    }
                }
            }
            if scale == 0 {
                return Err(Error::DecimalOverflow(format!(
                    "{} does not fit the native decimal",
                    self.big_at(index).expect("index checked above")
                )));
            }
            mantissa = bankers_div10(mantissa);
            scale -= 1;
        }
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when no values are held.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }
}

/// Divide by ten with round-half-to-even.
fn bankers_div10(value: BigInt) -> BigInt {
    let ten = BigInt::from(10);
    let quotient: BigInt = &value / &ten;
    let remainder: BigInt = &value % &ten;
    let rem_i32 = i32::try_from(&remainder).expect("remainder of /10");
    let carry = match rem_i32.abs() {
        0..=4 => 0,
        6..=9 => 1,
        _ => {
            // Exactly half: round toward the even quotient.
            let even = (&quotient % 2) == BigInt::from(0);
            usize::from(!even) as i32
        }
    };
    if rem_i32 < 0 {
        quotient - carry
    } else {
        quotient + carry
    }
}

impl Column for ColumnDecimal {
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
        let width = TypeNode::decimal_storage_width(self.precision);
        let have = reader.remaining();
        let Some(raw) = reader.try_get_contiguous(rows * width) else {
            return Err(Error::Truncated {
                context: "Decimal",
                need: rows * width,
                have,
            });
        };
        match &mut self.data {
            DecimalStorage::B32(v) => v.extend(
                raw.chunks_exact(4).map(<i32 as WireScalar>::from_le_slice),
            ),
            DecimalStorage::B64(v) => v.extend(
                raw.chunks_exact(8).map(<i64 as WireScalar>::from_le_slice),
            ),
            DecimalStorage::B128(v) => v.extend(
                raw.chunks_exact(16)
                    .map(<i128 as WireScalar>::from_le_slice),
            ),
            DecimalStorage::B256(v) => v.extend(
                raw.chunks_exact(32)
                    .map(<I256 as WireScalar>::from_le_slice),
            ),
        }
        Ok(())
    }

    fn save_body(&self, writer: &mut ByteWriter) -> Result<()> {
        match &self.data {
            DecimalStorage::B32(v) => {
                v.iter().for_each(|&m| writer.write_i32(m))
            }
            DecimalStorage::B64(v) => {
                v.iter().for_each(|&m| writer.write_i64(m))
            }
            DecimalStorage::B128(v) => {
                v.iter().for_each(|&m| writer.write_i128(m))
            }
            DecimalStorage::B256(v) => {
                v.iter().for_each(|&m| writer.write_i256(m))
            }
        }
        Ok(())
    }

    fn clone_empty(&self) -> ColumnRef {
        Arc::new(
            ColumnDecimal::new(self.type_.clone())
                .expect("valid decimal type"),
        )
    }

    fn is_default_at(&self, index: usize) -> bool {
        self.raw_at(index)
            .map(|m| m == BigInt::from(0))
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
    use crate::types::parse_type;
    use std::str::FromStr;

    fn column(text: &str) -> ColumnDecimal {
        ColumnDecimal::new(parse_type(text).unwrap()).unwrap()
    }

    #[test]
    fn storage_bucket_round_trips() {
        for (text, width) in [
            ("Decimal(9, 2)", 4usize),
            ("Decimal(18, 4)", 8),
            ("Decimal(38, 10)", 16),
            ("Decimal(76, 10)", 32),
        ] {
            let mut col = column(text);
            col.append(Decimal::from_str("12.34").unwrap()).unwrap();
            col.append(Decimal::from_str("-1.5").unwrap()).unwrap();

            let mut w = ByteWriter::new();
            col.save_body(&mut w).unwrap();
            assert_eq!(w.len(), 2 * width, "{}", text);

            let bytes = w.as_slice().to_vec();
            let mut col2 = column(text);
            let mut r = ByteReader::new(&bytes);
            col2.load_body(&mut r, 2).unwrap();
            assert_eq!(
                col2.native_at(0).unwrap(),
                Decimal::from_str("12.34").unwrap()
            );
            assert_eq!(
                col2.native_at(1).unwrap(),
                Decimal::from_str("-1.50").unwrap()
            );
        }
    }

    #[test]
    fn reference_scenario_decimal_18_4() {
        let mut col = column("Decimal(18, 4)");
        col.append(Decimal::from_str("1234.5678").unwrap()).unwrap();
        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        assert_eq!(
            w.as_slice(),
            &[0x4E, 0x61, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn precision_overflow_on_encode() {
        let mut col = column("Decimal(4, 2)");
        let err = col
            .append(Decimal::from_str("123.45").unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::DecimalOverflow(_)));
    }

    #[test]
    fn big_decimal_preserves_mantissa() {
        let mut col = column("Decimal(76, 6)");
        let value = BigDecimal::from_str(
            "1234567890123456789012345678901234567890.123456",
        )
        .unwrap();
        col.append_big(&value).unwrap();

        let mut w = ByteWriter::new();
        col.save_body(&mut w).unwrap();
        let bytes = w.as_slice().to_vec();

        let mut col2 = column("Decimal(76, 6)");
        let mut r = ByteReader::new(&bytes);
        col2.load_body(&mut r, 1).unwrap();
        assert_eq!(col2.big_at(0).unwrap(), value);
        // The integral part exceeds the native decimal's 96-bit range.
        assert!(matches!(
            col2.native_at(0),
            Err(Error::DecimalOverflow(_))
        ));
    }

    #[test]
    fn native_downcast_uses_bankers_rounding() {
        // Scale 30 exceeds the native maximum of 28; two digits are
        // dropped with round-half-to-even.
        let mut col = column("Decimal(76, 30)");
        let value = BigDecimal::from_str("0.000000000000000000000000000125")
            .unwrap();
        col.append_big(&value).unwrap();
        let native = col.native_at(0).unwrap();
        assert_eq!(
            native,
            Decimal::from_str("0.0000000000000000000000000001").unwrap()
        );
    }

    #[test]
    fn bankers_div10_cases() {
        for (input, expected) in [
            (25i64, 2i64),
            (35, 4),
            (24, 2),
            (26, 3),
            (-25, -2),
            (-35, -4),
            (-26, -3),
            (0, 0),
        ] {
            assert_eq!(
                bankers_div10(BigInt::from(input)),
                BigInt::from(expected),
                "input {}",
                input
            );
        }
    }
}
