use core::cmp::Ordering;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::{ErrorCode, Number};

/// A single spreadsheet value.
///
/// Numbers are always finite; see [`Number`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    #[default]
    Blank,
    Bool(bool),
    Number(Number),
    Text(String),
    Error(ErrorCode),
}

impl Scalar {
    /// Builds a numeric scalar, mapping non-finite doubles to the matching error.
    #[must_use]
    pub fn number(value: f64) -> Scalar {
        Number::new(value).into()
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Scalar {
        Scalar::Text(value.into())
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        matches!(self, Scalar::Blank)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Scalar::Error(_))
    }

    pub fn as_error(&self) -> Option<ErrorCode> {
        match self {
            Scalar::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Numeric view of the value, as arithmetic operators see it.
    pub fn coerce_to_number(&self) -> Result<Number, ErrorCode> {
        match self {
            Scalar::Blank => Ok(Number::ZERO),
            Scalar::Bool(b) => Ok(Number::from(*b)),
            Scalar::Number(n) => Ok(*n),
            Scalar::Text(s) => Number::parse(s).ok_or(ErrorCode::InvalidValue),
            Scalar::Error(e) => Err(*e),
        }
    }

    /// Logical view of the value, as `IF`/`AND`/`OR` see it.
    pub fn coerce_to_bool(&self) -> Result<bool, ErrorCode> {
        match self {
            Scalar::Blank => Ok(false),
            Scalar::Bool(b) => Ok(*b),
            Scalar::Number(n) => Ok(n.value() != 0.0),
            Scalar::Text(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Ok(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Ok(false)
                } else {
                    Err(ErrorCode::InvalidValue)
                }
            }
            Scalar::Error(e) => Err(*e),
        }
    }

    /// Text view of the value, as `&` sees it.
    pub fn coerce_to_text(&self) -> Result<String, ErrorCode> {
        match self {
            Scalar::Blank => Ok(String::new()),
            Scalar::Bool(true) => Ok("TRUE".to_string()),
            Scalar::Bool(false) => Ok("FALSE".to_string()),
            Scalar::Number(n) => Ok(n.to_string()),
            Scalar::Text(s) => Ok(s.clone()),
            Scalar::Error(e) => Err(*e),
        }
    }

    /// Orders two values the way comparison operators do.
    ///
    /// Values of different kinds order as number < text < boolean; a blank takes the
    /// kind of the other side. Text compares case-insensitively. Errors propagate,
    /// left side first.
    pub fn compare(&self, other: &Scalar) -> Result<Ordering, ErrorCode> {
        use Scalar::*;

        match (self, other) {
            (Error(e), _) | (_, Error(e)) => Err(*e),
            (Blank, Blank) => Ok(Ordering::Equal),
            (Blank, Number(n)) => Ok(compare_numbers(crate::Number::ZERO, *n)),
            (Number(n), Blank) => Ok(compare_numbers(*n, crate::Number::ZERO)),
            (Blank, Bool(b)) => Ok(false.cmp(b)),
            (Bool(b), Blank) => Ok(b.cmp(&false)),
            (Blank, Text(s)) => Ok(compare_text("", s)),
            (Text(s), Blank) => Ok(compare_text(s, "")),
            (Number(a), Number(b)) => Ok(compare_numbers(*a, *b)),
            (Text(a), Text(b)) => Ok(compare_text(a, b)),
            (Bool(a), Bool(b)) => Ok(a.cmp(b)),
            (lhs, rhs) => Ok(kind_rank(lhs).cmp(&kind_rank(rhs))),
        }
    }

    /// Renders the value the way it is spelled inside formula text.
    pub fn to_formula_literal(&self) -> String {
        match self {
            Scalar::Text(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('"');
                for ch in s.chars() {
                    if ch == '"' {
                        out.push('"');
                    }
                    out.push(ch);
                }
                out.push('"');
                out
            }
            other => other.to_string(),
        }
    }
}

fn compare_numbers(a: Number, b: Number) -> Ordering {
    a.value().total_cmp(&b.value())
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

fn kind_rank(value: &Scalar) -> u8 {
    match value {
        Scalar::Number(_) => 0,
        Scalar::Text(_) => 1,
        Scalar::Bool(_) => 2,
        Scalar::Blank | Scalar::Error(_) => 3,
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Blank => Ok(()),
            Scalar::Bool(true) => f.write_str("TRUE"),
            Scalar::Bool(false) => f.write_str("FALSE"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<Number> for Scalar {
    fn from(value: Number) -> Self {
        Scalar::Number(value)
    }
}

impl From<Result<Number, ErrorCode>> for Scalar {
    fn from(value: Result<Number, ErrorCode>) -> Self {
        match value {
            Ok(n) => Scalar::Number(n),
            Err(e) => Scalar::Error(e),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<ErrorCode> for Scalar {
    fn from(value: ErrorCode) -> Self {
        Scalar::Error(value)
    }
}
