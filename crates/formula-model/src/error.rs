use core::fmt;

use serde::{Deserialize, Serialize};

/// Spreadsheet error codes.
///
/// These are ordinary values: a formula that fails produces one of these as its result,
/// it never aborts evaluation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    /// `#NULL!`
    NullRange = 1,
    /// `#DIV/0!`
    DivisionByZero,
    /// `#VALUE!`
    InvalidValue,
    /// `#REF!`
    InvalidReference,
    /// `#NAME?`
    InvalidName,
    /// `#NUM!`
    NotANumber,
    /// `#N/A`
    InvalidArgs,
    /// `#GETTING_DATA`
    GettingData,
    /// `#SPILL!`
    Spill,
    /// `#ERROR!`
    InvalidFormula,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::NullRange,
        ErrorCode::DivisionByZero,
        ErrorCode::InvalidValue,
        ErrorCode::InvalidReference,
        ErrorCode::InvalidName,
        ErrorCode::NotANumber,
        ErrorCode::InvalidArgs,
        ErrorCode::GettingData,
        ErrorCode::Spill,
        ErrorCode::InvalidFormula,
    ];

    /// The literal text of the error as it appears in a cell or formula.
    pub const fn as_code(self) -> &'static str {
        match self {
            ErrorCode::NullRange => "#NULL!",
            ErrorCode::DivisionByZero => "#DIV/0!",
            ErrorCode::InvalidValue => "#VALUE!",
            ErrorCode::InvalidReference => "#REF!",
            ErrorCode::InvalidName => "#NAME?",
            ErrorCode::NotANumber => "#NUM!",
            ErrorCode::InvalidArgs => "#N/A",
            ErrorCode::GettingData => "#GETTING_DATA",
            ErrorCode::Spill => "#SPILL!",
            ErrorCode::InvalidFormula => "#ERROR!",
        }
    }

    /// Case-insensitive lookup of an error literal.
    pub fn from_code(text: &str) -> Option<ErrorCode> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_code().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_text() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_code(code.as_code()), Some(code));
        }
        assert_eq!(ErrorCode::from_code("#div/0!"), Some(ErrorCode::DivisionByZero));
        assert_eq!(ErrorCode::from_code("#BOGUS!"), None);
    }
}
