//! Username (handle) type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Username`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UsernameError {
    /// Fewer than [`Username::MIN_LENGTH`] characters.
    #[error("username must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// More than [`Username::MAX_LENGTH`] characters.
    #[error("username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains `/` or whitespace.
    #[error("username cannot contain {0:?}")]
    InvalidCharacter(char),
    /// A name the document store does not accept as a document id.
    #[error("username {0:?} is reserved")]
    Reserved(String),
}

/// A normalized username.
///
/// The username is the literal document id of its username record, so the
/// normalized string is what enforces uniqueness: two inputs that normalize
/// to the same string address the same record.
///
/// ## Normalization
///
/// - Lower-cased (the form lower-cases input as it is typed)
///
/// ## Constraints
///
/// - Length: 3-64 characters
/// - No `/` and no whitespace (it is a single path segment)
/// - Not made of dots only and not of the form `__name__` (reserved document ids)
///
/// ## Examples
///
/// ```
/// use neoays_core::Username;
///
/// assert_eq!(Username::parse("Alice").unwrap().as_str(), "alice");
/// assert!(Username::parse("ab").is_err());
/// assert!(Username::parse("a/b/c").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Minimum number of characters.
    pub const MIN_LENGTH: usize = 3;

    /// Maximum number of characters.
    pub const MAX_LENGTH: usize = 64;

    /// Normalize raw form input the way the form does on entry.
    #[must_use]
    pub fn normalize(input: &str) -> String {
        input.to_lowercase()
    }

    /// Normalize and validate a username.
    ///
    /// # Errors
    ///
    /// Returns an error if the normalized input is too short, too long,
    /// contains `/` or whitespace, or is a reserved document id.
    pub fn parse(input: &str) -> Result<Self, UsernameError> {
        let normalized = Self::normalize(input);
        let len = normalized.chars().count();

        if len < Self::MIN_LENGTH {
            return Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }

        if len > Self::MAX_LENGTH {
            return Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(c) = normalized
            .chars()
            .find(|c| *c == '/' || c.is_whitespace())
        {
            return Err(UsernameError::InvalidCharacter(c));
        }

        let reserved = normalized.chars().all(|c| c == '.')
            || (normalized.starts_with("__") && normalized.ends_with("__"));
        if reserved {
            return Err(UsernameError::Reserved(normalized));
        }

        Ok(Self(normalized))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `Username` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Username {
    type Err = UsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lowercases() {
        assert_eq!(Username::parse("Alice").unwrap().as_str(), "alice");
        assert_eq!(Username::parse("BOB").unwrap().as_str(), "bob");
    }

    #[test]
    fn test_parse_too_short() {
        for input in ["", "a", "ab"] {
            assert_eq!(
                Username::parse(input),
                Err(UsernameError::TooShort { min: 3 })
            );
        }
        assert!(Username::parse("abc").is_ok());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Two characters, four bytes
        assert!(Username::parse("éé").is_err());
        assert!(Username::parse("ééé").is_ok());
    }

    #[test]
    fn test_parse_too_long() {
        let long = "a".repeat(65);
        assert_eq!(
            Username::parse(&long),
            Err(UsernameError::TooLong { max: 64 })
        );
        assert!(Username::parse(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_parse_rejects_path_separator_and_whitespace() {
        assert_eq!(
            Username::parse("a/b/c"),
            Err(UsernameError::InvalidCharacter('/'))
        );
        assert_eq!(
            Username::parse("al ice"),
            Err(UsernameError::InvalidCharacter(' '))
        );
    }

    #[test]
    fn test_parse_rejects_reserved_ids() {
        assert!(matches!(
            Username::parse("..."),
            Err(UsernameError::Reserved(_))
        ));
        assert!(matches!(
            Username::parse("__name__"),
            Err(UsernameError::Reserved(_))
        ));
        assert!(Username::parse("_alice_").is_ok());
    }
}
