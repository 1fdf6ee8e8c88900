//! Resource identifier allocation.
//!
//! Every resource placed in a converted bundle receives a synthetic logical id, and its bundle
//! entry is addressed by `urn:uuid:<id>`. References between entries use that URN, so ids must be
//! unique within one conversion.
//!
//! This crate provides:
//! - A wrapper type ([`ResourceId`]) that *guarantees* the canonical lowercase hyphenated UUID
//!   form once constructed.
//! - An allocator ([`IdGenerator`]) that hands out ids either randomly (v4, production default)
//!   or deterministically (v5 over a seed and a counter), so that the same input converted with
//!   the same seed yields byte-identical output.
//!
//! ## Canonical form
//! - Length: 36
//! - Characters: `0-9`, `a-f` and hyphens at positions 8, 13, 18 and 23
//! - Example: `550e8400-e29b-41d4-a716-446655440000`
//!
//! Notes:
//! - This is the same value you would get from `Uuid::new_v4().hyphenated().to_string()`.
//! - Uppercase, braced, URN-prefixed and simple (unhyphenated) forms are rejected by
//!   [`ResourceId::parse`]; use [`ResourceId::from_full_url`] for `urn:uuid:` references.

mod service;

// Re-export public types
pub use service::{IdGenerator, ResourceId, Uuid, FULL_URL_PREFIX};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;
