//! Session models for the signup server.

pub mod session;
