//! Newtype IDs for type-safe identity references.
//!
//! Identity providers hand out opaque string ids. Use the `define_id!` macro
//! to wrap them so an identity id cannot be mixed up with a username or any
//! other string that ends up in a document path.

/// Errors that can occur when parsing an id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input contains a path separator.
    #[error("id cannot contain '/'")]
    PathSeparator,
}

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `parse()`, `as_str()`, `into_inner()`
/// - `Display` and `FromStr` implementations
///
/// Ids end up as segments of document paths, so they must be non-empty and
/// must not contain `/`.
///
/// # Example
///
/// ```rust
/// # use neoays_core::define_id;
/// define_id!(SessionKey);
///
/// let key = SessionKey::parse("abc123").unwrap();
/// assert_eq!(key.as_str(), "abc123");
/// assert!(SessionKey::parse("a/b").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an id from a string.
            ///
            /// # Errors
            ///
            /// Returns an error if the input is empty or contains `/`.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                if id.is_empty() {
                    return Err($crate::types::id::IdError::Empty);
                }
                if id.contains('/') {
                    return Err($crate::types::id::IdError::PathSeparator);
                }
                Ok(Self(id.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Identity provider user id (Firebase `localId`)
define_id!(IdentityId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let id = IdentityId::parse("u9").unwrap();
        assert_eq!(id.as_str(), "u9");
        assert_eq!(id.to_string(), "u9");
    }

    #[test]
    fn test_parse_rejects_empty_and_separator() {
        assert_eq!(IdentityId::parse(""), Err(IdError::Empty));
        assert_eq!(IdentityId::parse("a/b"), Err(IdError::PathSeparator));
    }

    #[test]
    fn test_serde_transparent() {
        let id = IdentityId::parse("anon1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"anon1\"");
    }
}
