//! Internal implementation of the unique identifier type.

use crate::{IdError, IdResult};
use chrono::{DateTime, Timelike, Utc};
use std::{fmt, str::FromStr};

/// Identifier for a resource at the hosted backend.
///
/// Once constructed the contained value is guaranteed to satisfy the backend's id rule, so it
/// can be embedded in request paths without further escaping.
///
/// # Construction
/// - [`UniqueId::new`] generates a fresh time-prefixed id.
/// - [`UniqueId::parse`] validates an externally supplied id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UniqueId(String);

impl Default for UniqueId {
    fn default() -> Self {
        Self::new()
    }
}

impl UniqueId {
    /// Maximum identifier length accepted by the backend.
    pub const MAX_LEN: usize = 36;

    /// Length of generated identifiers.
    pub const GENERATED_LEN: usize = 20;

    const RANDOM_PADDING: usize = 7;

    /// Generates a new identifier from the current time.
    pub fn new() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generates an identifier for the given instant.
    ///
    /// The random suffix is taken from a v4 UUID, so two calls with the same instant still
    /// produce different identifiers.
    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let seconds = now.timestamp().max(0) as u64;
        let micros = now.nanosecond() / 1_000 % 1_000_000;
        let random = uuid::Uuid::new_v4().simple().to_string();

        Self(format!(
            "{:08x}{:05x}{}",
            seconds,
            micros,
            &random[..Self::RANDOM_PADDING]
        ))
    }

    /// Validates and wraps an identifier created elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidInput`] if `input` is empty, longer than
    /// [`UniqueId::MAX_LEN`], contains characters outside `a-zA-Z0-9._-`, or starts with one of
    /// `.`, `-`, `_`.
    pub fn parse(input: &str) -> IdResult<Self> {
        if Self::is_valid(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(IdError::InvalidInput(format!(
            "id must be 1-{} characters of a-z, A-Z, 0-9, '.', '-', '_' and must not start with a special character, got: '{}'",
            Self::MAX_LEN,
            input
        )))
    }

    /// Returns true if `input` satisfies the backend id rule.
    pub fn is_valid(input: &str) -> bool {
        let Some(first) = input.bytes().next() else {
            return false;
        };

        input.len() <= Self::MAX_LEN
            && first.is_ascii_alphanumeric()
            && input
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for UniqueId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UniqueId::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for UniqueId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for UniqueId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UniqueId::parse(&s).map_err(serde::de::Error::custom)
    }
}
