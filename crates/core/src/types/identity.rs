//! Identities issued by the identity provider.

use serde::{Deserialize, Serialize};

use super::{Email, IdentityId};

/// An identity issued by the identity provider.
///
/// Every visitor gets an anonymous identity on first page load. Creating an
/// account with email and password yields a *new* persistent identity; the
/// provider does not link the two, so anything owned by the anonymous id has
/// to be re-pointed at the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-assigned unique id.
    pub id: IdentityId,
    /// Whether this identity was issued without credentials.
    pub is_anonymous: bool,
    /// Email address for persistent identities.
    pub email: Option<Email>,
}

impl Identity {
    /// An anonymous identity.
    #[must_use]
    pub const fn anonymous(id: IdentityId) -> Self {
        Self {
            id,
            is_anonymous: true,
            email: None,
        }
    }

    /// A persistent identity created from email credentials.
    #[must_use]
    pub const fn persistent(id: IdentityId, email: Email) -> Self {
        Self {
            id,
            is_anonymous: false,
            email: Some(email),
        }
    }
}
