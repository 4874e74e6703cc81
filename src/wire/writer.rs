//! Growable writer mirroring [`ByteReader`](crate::wire::ByteReader).
//!
//! The sink grows on demand, so there is no `try_` family. The decimal
//! helpers scale a value by `10^s` and emit the sign-extended
//! two's-complement little-endian encoding without intermediate
//! allocation on the 128-bit path.

use bigdecimal::BigDecimal;
use bytes::{BufMut, Bytes, BytesMut};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::int256::I256;
use crate::{Error, Result};

/// Wire writer over a `BytesMut` sink.
pub struct ByteWriter {
    buf: BytesMut,
}

macro_rules! impl_write_fixed {
    ($name:ident, $ty:ty, $put:ident) => {
        /// Little-endian fixed-width write.
        pub fn $name(&mut self, value: $ty) {
            self.buf.$put(value);
        }
    };
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: BytesMut::with_capacity(capacity) }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Freeze into an immutable buffer, consuming the writer.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Take the accumulated bytes, leaving the writer empty.
    pub fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    impl_write_fixed!(write_u8, u8, put_u8);
    impl_write_fixed!(write_i8, i8, put_i8);
    impl_write_fixed!(write_u16, u16, put_u16_le);
    impl_write_fixed!(write_i16, i16, put_i16_le);
    impl_write_fixed!(write_u32, u32, put_u32_le);
    impl_write_fixed!(write_i32, i32, put_i32_le);
    impl_write_fixed!(write_u64, u64, put_u64_le);
    impl_write_fixed!(write_i64, i64, put_i64_le);
    impl_write_fixed!(write_u128, u128, put_u128_le);
    impl_write_fixed!(write_i128, i128, put_i128_le);
    impl_write_fixed!(write_f32, f32, put_f32_le);
    impl_write_fixed!(write_f64, f64, put_f64_le);

    /// 32-byte little-endian signed write.
    pub fn write_i256(&mut self, value: I256) {
        self.buf.put_slice(&value.to_le_bytes());
    }

    /// 32-byte little-endian unsigned write.
    pub fn write_u256(&mut self, value: crate::int256::U256) {
        self.buf.put_slice(&value.to_le_bytes());
    }

    /// Raw byte write.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Varint write (little-endian base-128, MSB continuation).
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buf.put_u8(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Length-prefixed UTF-8 string write.
    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as u64);
        self.buf.put_slice(value.as_bytes());
    }

    /// Length-prefixed raw-bytes write (a String column cell that is not
    /// guaranteed to be UTF-8 on the wire).
    pub fn write_len_prefixed_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buf.put_slice(bytes);
    }

    /// Scale a decimal by `10^scale` and write the `i64` encoding.
    pub fn write_decimal_as_i64(
        &mut self,
        value: Decimal,
        scale: u32,
    ) -> Result<()> {
        let scaled = scale_decimal_i128(value, scale)?;
        let narrowed = i64::try_from(scaled).map_err(|_| {
            Error::DecimalOverflow(format!(
                "{} does not fit Decimal64 storage",
                value
            ))
        })?;
        self.write_i64(narrowed);
        Ok(())
    }

    /// Scale a decimal by `10^scale` and write the `i32` encoding.
    pub fn write_decimal_as_i32(
        &mut self,
        value: Decimal,
        scale: u32,
    ) -> Result<()> {
        let scaled = scale_decimal_i128(value, scale)?;
        let narrowed = i32::try_from(scaled).map_err(|_| {
            Error::DecimalOverflow(format!(
                "{} does not fit Decimal32 storage",
                value
            ))
        })?;
        self.write_i32(narrowed);
        Ok(())
    }

    /// Scale a decimal by `10^scale` and write the sign-extended
    /// little-endian `i128` encoding without intermediate allocation.
    pub fn write_decimal_as_i128(
        &mut self,
        value: Decimal,
        scale: u32,
    ) -> Result<()> {
        let scaled = scale_decimal_i128(value, scale)?;
        self.write_i128(scaled);
        Ok(())
    }

    /// Scale an arbitrary-precision decimal by `10^scale` and write the
    /// sign-extended two's-complement little-endian 256-bit encoding.
    pub fn write_decimal_as_i256(
        &mut self,
        value: &BigDecimal,
        scale: i64,
    ) -> Result<()> {
        let rescaled = value
            .with_scale_round(scale, bigdecimal::RoundingMode::HalfEven);
        let (mantissa, exponent) = rescaled.as_bigint_and_exponent();
        if exponent != scale {
            return Err(Error::Bug(format!(
                "rescale produced exponent {} instead of {}",
                exponent, scale
            )));
        }
        let wide = I256::from_bigint(&mantissa)?;
        self.write_i256(wide);
        Ok(())
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rescale `value` to exactly `scale` fractional digits (banker's rounding
/// if digits must be dropped) and return the scaled mantissa.
pub(crate) fn scale_decimal_i128(value: Decimal, scale: u32) -> Result<i128> {
    let rounded = value
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointNearestEven);
    let mut mantissa = rounded.mantissa();
    let mut shortfall = scale - rounded.scale();
    while shortfall > 0 {
        mantissa = mantissa.checked_mul(10).ok_or_else(|| {
            Error::DecimalOverflow(format!(
                "{} at scale {} overflows 128 bits",
                value, scale
            ))
        })?;
        shortfall -= 1;
    }
    Ok(mantissa)
}
