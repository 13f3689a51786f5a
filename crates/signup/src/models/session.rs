//! Session-related types.
//!
//! The session holds the visitor's identity and the signup form state. The
//! form state is never written to the document store.

/// Session keys for signup data.
pub mod keys {
    /// Key for the identity issued to this visitor (`neoays_core::Identity`).
    pub const IDENTITY: &str = "identity";

    /// Key for the signup form state (`neoays_core::FormState`).
    pub const FORM_STATE: &str = "signup_form";
}
