//! Neoays Core - Domain types for the Neoays ID signup service.
//!
//! This crate provides the types shared by the signup server and the CLI:
//! - `signup` - Public username reservation and signup form
//! - `cli` - Operator tools for inspecting and repairing records
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no backend SDKs. The form state machine lives here so it can be
//! tested without any remote calls.
//!
//! # Modules
//!
//! - [`types`] - Validated newtypes for usernames, emails, mobile numbers and identities
//! - [`records`] - Username and profile documents and their store paths
//! - [`flow`] - Signup form state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod flow;
pub mod records;
pub mod types;

pub use flow::{Event, FormState, Phase, TransitionError, transition};
pub use records::{
    Availability, DocumentPath, DocumentPaths, Fields, ProfileRecord, Record, RecordError,
    UsernameRecord,
};
pub use types::*;
