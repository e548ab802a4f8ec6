use std::cmp::Ordering;

use num_bigint::BigInt;

const MAX_SAFE_NUMERIC_STRING_LEN: usize = 512;
const MAX_SAFE_DECIMAL_EXPONENT: i32 = 2048;

/// Tolerance applied to custom-query aggregate comparisons.
pub const CUSTOM_QUERY_EPSILON: f64 = 0.001;

/// Exact decimal value: `unscaled * 10^-scale`, kept with trailing zeros stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decimal {
    unscaled: BigInt,
    scale: i32,
}

impl Decimal {
    /// Parses `[+-]digits[.digits][(e|E)[+-]digits]`; at least one mantissa digit.
    pub fn parse(input: &str) -> Option<Self> {
        if input.is_empty() || input.len() > MAX_SAFE_NUMERIC_STRING_LEN {
            return None;
        }

        let bytes = input.as_bytes();
        let mut index = 0usize;
        let mut negative = false;
        if let Some(sign @ (b'+' | b'-')) = bytes.first() {
            negative = *sign == b'-';
            index += 1;
        }

        let mut digits = String::new();
        while let Some(byte) = bytes.get(index)
            && byte.is_ascii_digit()
        {
            digits.push(char::from(*byte));
            index += 1;
        }

        let mut fractional_digits: i32 = 0;
        if bytes.get(index) == Some(&b'.') {
            index += 1;
            while let Some(byte) = bytes.get(index)
                && byte.is_ascii_digit()
            {
                digits.push(char::from(*byte));
                fractional_digits = fractional_digits.checked_add(1)?;
                index += 1;
            }
        }

        if digits.is_empty() {
            return None;
        }

        let mut exponent: i32 = 0;
        if matches!(bytes.get(index), Some(b'e' | b'E')) {
            index += 1;
            let mut exponent_negative = false;
            if let Some(sign @ (b'+' | b'-')) = bytes.get(index) {
                exponent_negative = *sign == b'-';
                index += 1;
            }
            let exponent_start = index;
            while let Some(byte) = bytes.get(index)
                && byte.is_ascii_digit()
            {
                exponent = exponent
                    .checked_mul(10)?
                    .checked_add(i32::from(*byte - b'0'))?;
                index += 1;
            }
            if exponent_start == index {
                return None;
            }
            if exponent_negative {
                exponent = -exponent;
            }
        }

        if index != bytes.len() {
            return None;
        }

        let scale = fractional_digits.checked_sub(exponent)?;
        if scale.abs() > MAX_SAFE_DECIMAL_EXPONENT {
            return None;
        }

        let mut unscaled = BigInt::parse_bytes(digits.as_bytes(), 10)?;
        if negative {
            unscaled = -unscaled;
        }
        Some(Self::normalized(unscaled, scale))
    }

    fn normalized(mut unscaled: BigInt, mut scale: i32) -> Self {
        let zero = BigInt::from(0u8);
        if unscaled == zero {
            return Self {
                unscaled: zero,
                scale: 0,
            };
        }
        let ten = BigInt::from(10u8);
        while &unscaled % &ten == zero {
            unscaled /= &ten;
            scale -= 1;
        }
        Self { unscaled, scale }
    }

    pub fn to_f64(&self) -> Option<f64> {
        let value: f64 = format!("{}e{}", self.unscaled, -self.scale).parse().ok()?;
        value.is_finite().then_some(value)
    }
}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        let left = &self.unscaled * pow10(scale - self.scale);
        let right = &other.unscaled * pow10(scale - other.scale);
        left.cmp(&right)
    }
}

fn pow10(exponent: i32) -> BigInt {
    BigInt::from(10u8).pow(exponent.unsigned_abs())
}

/// Document-driven equality: numeric when the document value is a decimal and the
/// stored value also parses, exact string equality otherwise.
pub fn equals(document_value: &str, stored_value: &str) -> bool {
    match Decimal::parse(document_value) {
        Some(left) => match Decimal::parse(stored_value) {
            Some(right) => left == right,
            None => document_value == stored_value,
        },
        None => document_value == stored_value,
    }
}

pub fn approximately_equals(left: f64, right: f64, epsilon: f64) -> bool {
    (left - right).abs() < epsilon
}
