//! 256-bit integer values.
//!
//! `Int256`/`UInt256` columns and `Decimal` with precision above 38 store
//! 32 little-endian bytes per row. These value types keep the raw wire
//! representation and widen through [`num_bigint`] for arithmetic-free
//! conversion at the edges.

use num_bigint::{BigInt, BigUint, Sign};

use crate::{Error, Result};

/// Signed 256-bit integer, 32 bytes little-endian two's complement.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct I256(pub [u8; 32]);

/// Unsigned 256-bit integer, 32 bytes little-endian.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct U256(pub [u8; 32]);

impl I256 {
    /// The zero value.
    pub const ZERO: I256 = I256([0u8; 32]);

    /// Construct from raw little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        I256(bytes)
    }

    /// The raw little-endian bytes.
    pub fn to_le_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Sign-extend an `i128` into 256 bits.
    pub fn from_i128(value: i128) -> Self {
        let mut bytes = if value < 0 { [0xFFu8; 32] } else { [0u8; 32] };
        bytes[..16].copy_from_slice(&value.to_le_bytes());
        I256(bytes)
    }

    /// Widen to an arbitrary-precision integer.
    pub fn to_bigint(self) -> BigInt {
        BigInt::from_signed_bytes_le(&self.0)
    }

    /// Narrow an arbitrary-precision integer, failing when it does not fit
    /// in 256 bits.
    pub fn from_bigint(value: &BigInt) -> Result<Self> {
        let bytes = value.to_signed_bytes_le();
        if bytes.len() > 32 {
            return Err(Error::DecimalOverflow(format!(
                "value {} does not fit in 256 bits",
                value
            )));
        }
        let fill = if value.sign() == Sign::Minus { 0xFF } else { 0x00 };
        let mut out = [fill; 32];
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(I256(out))
    }
}

impl U256 {
    /// The zero value.
    pub const ZERO: U256 = U256([0u8; 32]);

    /// Construct from raw little-endian bytes.
    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        U256(bytes)
    }

    /// The raw little-endian bytes.
    pub fn to_le_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Zero-extend a `u128` into 256 bits.
    pub fn from_u128(value: u128) -> Self {
        let mut bytes = [0u8; 32];
        bytes[..16].copy_from_slice(&value.to_le_bytes());
        U256(bytes)
    }

    /// Widen to an arbitrary-precision unsigned integer.
    pub fn to_biguint(self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Narrow an arbitrary-precision unsigned integer, failing when it
    /// does not fit in 256 bits.
    pub fn from_biguint(value: &BigUint) -> Result<Self> {
        let bytes = value.to_bytes_le();
        if bytes.len() > 32 {
            return Err(Error::DecimalOverflow(format!(
                "value {} does not fit in 256 bits",
                value
            )));
        }
        let mut out = [0u8; 32];
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(U256(out))
    }
}

impl From<i128> for I256 {
    fn from(value: i128) -> Self {
        I256::from_i128(value)
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        U256::from_u128(value)
    }
}

impl std::fmt::Debug for I256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I256({})", self.to_bigint())
    }
}

impl std::fmt::Display for I256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bigint())
    }
}

impl std::fmt::Debug for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "U256({})", self.to_biguint())
    }
}

impl std::fmt::Display for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_biguint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i256_sign_extension() {
        let neg = I256::from_i128(-1);
        assert_eq!(neg.to_le_bytes(), [0xFF; 32]);
        assert_eq!(neg.to_bigint(), BigInt::from(-1));

        let pos = I256::from_i128(i128::MAX);
        assert_eq!(pos.to_bigint(), BigInt::from(i128::MAX));
    }

    #[test]
    fn i256_bigint_round_trip() {
        let big: BigInt = BigInt::from(10).pow(75);
        let wide = I256::from_bigint(&big).unwrap();
        assert_eq!(wide.to_bigint(), big);

        let neg = -&big;
        let wide = I256::from_bigint(&neg).unwrap();
        assert_eq!(wide.to_bigint(), neg);
    }

    #[test]
    fn i256_overflow_detected() {
        let too_big = BigInt::from(2).pow(256);
        assert!(matches!(
            I256::from_bigint(&too_big),
            Err(Error::DecimalOverflow(_))
        ));
    }

    #[test]
    fn u256_round_trip() {
        let value = U256::from_u128(u128::MAX);
        assert_eq!(value.to_biguint(), BigUint::from(u128::MAX));
        let back = U256::from_biguint(&value.to_biguint()).unwrap();
        assert_eq!(back, value);
    }
}
