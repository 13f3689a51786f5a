//! Business logic services for the signup server.
//!
//! # Services
//!
//! - `reservation` - Username availability, reservation and the signup saga
//! - `form` - Session-backed controller driving the form state machine

pub mod form;
pub mod reservation;
