//! Signed fixed-point decimal with 18 fractional digits.
//!
//! Prices and fee rates are `Dec`s. The value is kept as a sign and a `U256`
//! magnitude scaled by 10^18, so `MaxPrice = 10^40` is representable. Products
//! with amounts are computed in 512 bits and every conversion back to an
//! integer amount names its rounding direction.

use crate::types::{Amount, U256};
use alloy::primitives::Uint;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

type U512 = Uint<512, 8>;

/// Number of fractional digits.
pub const PRECISION: u32 = 18;

/// `10^exp` as a `U256`. `exp` must be at most 77.
pub(crate) fn pow10(exp: u32) -> U256 {
    (0..exp).fold(U256::from(1u64), |acc, _| acc * U256::from(10u64))
}

fn scale() -> U256 {
    pow10(PRECISION)
}

fn widen(value: U256) -> U512 {
    U512::from_limbs_slice(value.as_limbs())
}

fn narrow(value: U512) -> Option<U256> {
    U256::checked_from_limbs_slice(value.as_limbs())
}

/// `a * b / d`, rounded down or up. `None` on a zero divisor or if the result
/// does not fit 256 bits.
fn mul_div(a: U256, b: U256, d: U256, round_up: bool) -> Option<U256> {
    if d.is_zero() {
        return None;
    }
    let product = widen(a) * widen(b);
    let divisor = widen(d);
    let mut quotient = product / divisor;
    if round_up && !(product % divisor).is_zero() {
        quotient += U512::from(1u64);
    }
    narrow(quotient)
}

/// Errors from parsing a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecParseError {
    #[error("empty decimal string")]
    Empty,
    #[error("invalid decimal string: {0}")]
    Invalid(String),
    #[error("too many fractional digits (max {PRECISION}): {0}")]
    TooPrecise(String),
    #[error("decimal out of range: {0}")]
    Overflow(String),
}

/// A signed decimal with 18 fractional digits.
///
/// Zero is never negative, so the derived equality is value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dec {
    negative: bool,
    raw: U256,
}

impl Dec {
    pub const ZERO: Self = Self {
        negative: false,
        raw: U256::ZERO,
    };

    pub fn one() -> Self {
        Self::from_raw(scale())
    }

    /// A non-negative decimal from its scaled representation.
    pub fn from_raw(raw: U256) -> Self {
        Self {
            negative: false,
            raw,
        }
    }

    /// A decimal from a sign and its scaled magnitude.
    pub fn from_raw_parts(negative: bool, raw: U256) -> Self {
        Self {
            negative: negative && !raw.is_zero(),
            raw,
        }
    }

    /// `value * 10^-prec`, e.g. `new_with_prec(-15, 4)` is `-0.0015`.
    ///
    /// Panics if `prec` exceeds [`PRECISION`].
    pub fn new_with_prec(value: i64, prec: u32) -> Self {
        assert!(prec <= PRECISION, "precision {prec} exceeds {PRECISION}");
        let raw = U256::from(value.unsigned_abs()) * pow10(PRECISION - prec);
        Self::from_raw_parts(value < 0, raw)
    }

    /// The decimal equal to an integer amount.
    pub fn from_int(value: Amount) -> Option<Self> {
        value.checked_mul(scale()).map(Self::from_raw)
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_raw(U256::from(value) * scale())
    }

    /// The scaled magnitude.
    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.raw.is_zero()
    }

    pub fn neg(self) -> Self {
        Self::from_raw_parts(!self.negative, self.raw)
    }

    pub fn abs(self) -> Self {
        Self::from_raw(self.raw)
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.negative == other.negative {
            let raw = self.raw.checked_add(other.raw)?;
            return Some(Self::from_raw_parts(self.negative, raw));
        }
        if self.raw >= other.raw {
            Some(Self::from_raw_parts(self.negative, self.raw - other.raw))
        } else {
            Some(Self::from_raw_parts(other.negative, other.raw - self.raw))
        }
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.neg())
    }

    /// Product of two decimals, truncated toward zero.
    pub fn checked_mul(self, other: Self) -> Option<Self> {
        let raw = mul_div(self.raw, other.raw, scale(), false)?;
        Some(Self::from_raw_parts(self.negative != other.negative, raw))
    }

    /// `floor(|self| * amount)`. The sign is ignored.
    pub fn mul_int_floor(&self, amount: Amount) -> Option<Amount> {
        mul_div(self.raw, amount, scale(), false)
    }

    /// `ceil(|self| * amount)`. The sign is ignored.
    pub fn mul_int_ceil(&self, amount: Amount) -> Option<Amount> {
        mul_div(self.raw, amount, scale(), true)
    }

    /// `floor(amount / |self|)`; `None` when `self` is zero.
    pub fn int_quo_floor(&self, amount: Amount) -> Option<Amount> {
        mul_div(amount, scale(), self.raw, false)
    }

    /// Integer part of the magnitude.
    pub fn truncate_int(&self) -> Amount {
        self.raw / scale()
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.raw.cmp(&other.raw),
            (true, true) => other.raw.cmp(&self.raw),
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
        }
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = scale();
        let int = self.raw / scale;
        let frac = self.raw % scale;
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{int}")?;
        if !frac.is_zero() {
            let digits = format!("{:0>width$}", frac.to_string(), width = PRECISION as usize);
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

impl FromStr for Dec {
    type Err = DecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if body.is_empty() {
            return Err(DecParseError::Empty);
        }
        let (int_part, frac_part) = match body.split_once('.') {
            Some((int_part, frac_part)) if !frac_part.is_empty() => (int_part, frac_part),
            Some(_) => return Err(DecParseError::Invalid(s.to_string())),
            None => (body, ""),
        };
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if int_part.is_empty() || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(DecParseError::Invalid(s.to_string()));
        }
        if frac_part.len() > PRECISION as usize {
            return Err(DecParseError::TooPrecise(s.to_string()));
        }
        let digits = format!("{int_part}{frac_part:0<width$}", width = PRECISION as usize);
        let raw = digits
            .parse::<U256>()
            .map_err(|_| DecParseError::Overflow(s.to_string()))?;
        Ok(Self::from_raw_parts(negative, raw))
    }
}
