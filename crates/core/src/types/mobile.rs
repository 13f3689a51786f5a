//! Mobile number type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`MobileNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MobileNumberError {
    /// The input is empty after trimming.
    #[error("mobile number cannot be empty")]
    Empty,
}

/// A mobile number as entered on the signup form.
///
/// Stored verbatim (trimmed) in the profile record. No format is imposed:
/// the number is only used for account notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MobileNumber(String);

impl MobileNumber {
    /// Parse a mobile number.
    ///
    /// # Errors
    ///
    /// Returns `MobileNumberError::Empty` if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, MobileNumberError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MobileNumberError::Empty);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_formatting() {
        assert_eq!(MobileNumber::parse(" 555-0100 ").unwrap().as_str(), "555-0100");
        assert_eq!(
            MobileNumber::parse("+1 (555) 010-0100").unwrap().as_str(),
            "+1 (555) 010-0100"
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(MobileNumber::parse(""), Err(MobileNumberError::Empty));
        assert_eq!(MobileNumber::parse("  \t"), Err(MobileNumberError::Empty));
    }
}
