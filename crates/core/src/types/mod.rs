//! Core types for Neoays ID.
//!
//! This module provides type-safe wrappers for the values a visitor submits
//! through the signup form and for the identities issued by the provider.

pub mod email;
pub mod id;
pub mod identity;
pub mod mobile;
pub mod username;

pub use email::{Email, EmailError};
pub use id::*;
pub use identity::Identity;
pub use mobile::{MobileNumber, MobileNumberError};
pub use username::{Username, UsernameError};
