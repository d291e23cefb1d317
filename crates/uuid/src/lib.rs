//! Unique identifier utilities.
//!
//! Every resource created at the hosted backend (users, stored files, patient documents) is
//! keyed by an identifier the client chooses. This crate generates those identifiers and
//! validates identifiers received from outside (URL path segments, CLI arguments).
//!
//! ## Generated form
//! `<8 hex: unix seconds><5 hex: microseconds><7 hex: random>`, 20 lowercase hex characters.
//!
//! Example: `66f3a1b2000c8d41e7a9`
//!
//! The timestamp prefix keeps ids roughly time ordered; the random suffix makes collisions
//! within the same microsecond unlikely.
//!
//! ## Accepted form
//! Ids created elsewhere (for example through the backend console) follow the backend's looser
//! rule: 1 to 36 characters of `a-z`, `A-Z`, `0-9`, `.`, `-`, `_`, not starting with a special
//! character. [`UniqueId::parse`] accepts anything matching that rule.

mod service;

pub use service::UniqueId;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
