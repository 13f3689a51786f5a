//! Documents written to the document store, and the paths they live at.
//!
//! # Path scheme
//!
//! ```text
//! /<namespace>/<app-id>/public/data/usernames/<username>   - UsernameRecord
//! /<namespace>/<app-id>/users/<identity-id>/profile/data   - ProfileRecord
//! ```
//!
//! The username record's existence is the only availability signal: there is
//! no status field, and the path itself is what makes a username unique.

use core::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Email, IdentityId, MobileNumber, Username};

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Errors converting between records and stored field maps.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The stored fields do not match the record shape.
    #[error("malformed {record} document: {source}")]
    Malformed {
        /// Record type name.
        record: &'static str,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// The record did not serialize to a field map.
    #[error("{0} did not serialize to a field map")]
    NotAMap(&'static str),
}

/// Result of an availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Not checked yet, or invalidated by an edit.
    #[default]
    Unknown,
    /// No username record exists.
    Available,
    /// A username record exists, or the check could not be completed.
    Taken,
}

impl Availability {
    /// Availability implied by whether the username record exists.
    #[must_use]
    pub const fn from_exists(exists: bool) -> Self {
        if exists { Self::Taken } else { Self::Available }
    }
}

/// Absolute path of a document in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Build a path from segments.
    ///
    /// Segments are joined with `/` and the result always starts with `/`.
    #[must_use]
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for segment in segments {
            path.push('/');
            path.push_str(segment.as_ref());
        }
        Self(path)
    }

    /// The path as a string slice, including the leading `/`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without its leading `/`, as REST APIs expect it.
    #[must_use]
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    /// The unescaped path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.relative().split('/')
    }

    /// Whether this path starts with `prefix` (segment-wise).
    #[must_use]
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0 == prefix
            || self
                .0
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/') || prefix.ends_with('/'))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds the document paths for one app within a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    namespace: String,
    app_id: String,
}

impl DocumentPaths {
    /// Create a path builder for `/<namespace>/<app_id>/...`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            app_id: app_id.into(),
        }
    }

    /// Path of the username record for `username`.
    #[must_use]
    pub fn username(&self, username: &Username) -> DocumentPath {
        DocumentPath::from_segments([
            self.namespace.as_str(),
            self.app_id.as_str(),
            "public",
            "data",
            "usernames",
            username.as_str(),
        ])
    }

    /// Path of the profile record owned by `owner`.
    #[must_use]
    pub fn profile(&self, owner: &IdentityId) -> DocumentPath {
        DocumentPath::from_segments([
            self.namespace.as_str(),
            self.app_id.as_str(),
            "users",
            owner.as_str(),
            "profile",
            "data",
        ])
    }

    /// Parent document of the public username collection.
    ///
    /// Used to probe store reachability; it need not exist.
    #[must_use]
    pub fn public_root(&self) -> DocumentPath {
        DocumentPath::from_segments([
            self.namespace.as_str(),
            self.app_id.as_str(),
            "public",
            "data",
        ])
    }
}

/// Public record claiming a username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameRecord {
    /// Identity that reserved the username. Not enforced by the store.
    pub owner_id: IdentityId,
}

/// Private profile written once signup completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    /// The reserved username.
    pub username: Username,
    /// Account email.
    pub email: Email,
    /// Contact number for account notifications.
    pub mobile_number: MobileNumber,
}

/// Conversion between records and stored field maps.
pub trait Record: Serialize + DeserializeOwned {
    /// Record name used in error messages.
    const NAME: &'static str;

    /// Serialize into a field map.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotAMap` if the record is not a struct.
    fn to_fields(&self) -> Result<Fields, RecordError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(fields)) => Ok(fields),
            _ => Err(RecordError::NotAMap(Self::NAME)),
        }
    }

    /// Deserialize from a field map. Unknown fields are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Malformed` if required fields are missing or mistyped.
    fn from_fields(fields: Fields) -> Result<Self, RecordError> {
        serde_json::from_value(serde_json::Value::Object(fields)).map_err(|source| {
            RecordError::Malformed {
                record: Self::NAME,
                source,
            }
        })
    }
}

impl Record for UsernameRecord {
    const NAME: &'static str = "username";
}

impl Record for ProfileRecord {
    const NAME: &'static str = "profile";
}
