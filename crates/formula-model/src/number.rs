use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ErrorCode;

/// Quiet NaN payload reserved for "division by zero".
///
/// Any other non-finite result maps to `#NUM!`.
const DIVISION_BY_ZERO_BITS: u64 = 0x7FF8_0000_0000_D1F0;

/// A finite IEEE-754 double.
///
/// Construction goes through [`Number::new`], so NaN and infinities never exist as
/// numbers; they are turned into [`ErrorCode`]s at the point of creation.
#[derive(Copy, Clone, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Number(f64);

impl Number {
    pub const ZERO: Number = Number(0.0);
    pub const ONE: Number = Number(1.0);

    /// Classifies a raw double: finite values become numbers, the reserved pattern becomes
    /// `#DIV/0!` and anything else non-finite becomes `#NUM!`.
    pub fn new(value: f64) -> Result<Number, ErrorCode> {
        if value.is_finite() {
            // Normalize negative zero so text rendering never shows "-0".
            return Ok(Number(if value == 0.0 { 0.0 } else { value }));
        }
        if value.to_bits() == DIVISION_BY_ZERO_BITS {
            Err(ErrorCode::DivisionByZero)
        } else {
            Err(ErrorCode::NotANumber)
        }
    }

    /// The raw double carrying the "division by zero" marker.
    #[inline]
    pub fn division_by_zero() -> f64 {
        f64::from_bits(DIVISION_BY_ZERO_BITS)
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    pub fn add(self, rhs: Number) -> Result<Number, ErrorCode> {
        Number::new(self.0 + rhs.0)
    }

    pub fn sub(self, rhs: Number) -> Result<Number, ErrorCode> {
        Number::new(self.0 - rhs.0)
    }

    pub fn mul(self, rhs: Number) -> Result<Number, ErrorCode> {
        Number::new(self.0 * rhs.0)
    }

    pub fn div(self, rhs: Number) -> Result<Number, ErrorCode> {
        if rhs.0 == 0.0 {
            return Number::new(Number::division_by_zero());
        }
        Number::new(self.0 / rhs.0)
    }

    pub fn pow(self, rhs: Number) -> Result<Number, ErrorCode> {
        if self.0 == 0.0 && rhs.0 < 0.0 {
            return Number::new(Number::division_by_zero());
        }
        if self.0 == 0.0 && rhs.0 == 0.0 {
            return Err(ErrorCode::NotANumber);
        }
        Number::new(self.0.powf(rhs.0))
    }

    /// Parses a number from text, ignoring surrounding whitespace.
    ///
    /// Spellings of infinity and NaN are rejected.
    pub fn parse(text: &str) -> Option<Number> {
        let trimmed = text.trim();
        let has_letters = trimmed
            .bytes()
            .any(|b| b.is_ascii_alphabetic() && !b.eq_ignore_ascii_case(&b'e'));
        if trimmed.is_empty() || has_letters {
            return None;
        }
        let value: f64 = trimmed.parse().ok()?;
        Number::new(value).ok()
    }
}

impl TryFrom<f64> for Number {
    type Error = ErrorCode;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Number::new(value)
    }
}

impl From<Number> for f64 {
    fn from(value: Number) -> Self {
        value.0
    }
}

impl From<u32> for Number {
    fn from(value: u32) -> Self {
        Number(value as f64)
    }
}

impl From<bool> for Number {
    fn from(value: bool) -> Self {
        if value {
            Number::ONE
        } else {
            Number::ZERO
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
