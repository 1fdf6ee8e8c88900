//! Internal implementation of identifier services.
//!
//! This module contains the implementation details for the resource ids and `urn:uuid:` full
//! URLs used throughout a conversion.

use crate::{UuidError, UuidResult};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Prefix of a bundle entry `fullUrl`.
pub const FULL_URL_PREFIX: &str = "urn:uuid:";

/// Canonical resource id (36 lowercase characters, hyphenated).
///
/// This wrapper type guarantees that once constructed, the contained UUID is in canonical
/// form. It provides type safety between bare ids (`Resource.id`) and full URLs
/// (`Bundle.entry.fullUrl`), which are easy to mix up when both are plain strings.
///
/// # Construction
/// - [`IdGenerator::next_id`] allocates a fresh id for a new resource.
/// - [`ResourceId::parse`] validates an externally supplied id.
/// - [`ResourceId::from_full_url`] validates a `urn:uuid:` reference.
///
/// # Display format
/// When displayed or converted to string, `ResourceId` always produces the canonical hyphenated
/// lowercase format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct ResourceId(Uuid);

impl ResourceId {
    /// Validates and parses an id that must already be in canonical form.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not canonical.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if !Self::is_canonical(input) {
            return Err(UuidError::InvalidInput(format!(
                "resource id must be a lowercase hyphenated UUID, got: '{input}'"
            )));
        }
        Uuid::parse_str(input)
            .map(Self)
            .map_err(|e| UuidError::InvalidInput(format!("invalid resource id '{input}': {e}")))
    }

    /// Parses the id out of a `urn:uuid:<id>` full URL.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if the prefix is missing or the id is not canonical.
    pub fn from_full_url(full_url: &str) -> UuidResult<Self> {
        let id = full_url.strip_prefix(FULL_URL_PREFIX).ok_or_else(|| {
            UuidError::InvalidInput(format!(
                "full URL must start with '{FULL_URL_PREFIX}', got: '{full_url}'"
            ))
        })?;
        Self::parse(id)
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check:
    /// - Exactly 36 bytes long
    /// - Hyphens at offsets 8, 13, 18 and 23
    /// - Lowercase hex everywhere else
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 36
            && input.bytes().enumerate().all(|(i, b)| match i {
                8 | 13 | 18 | 23 => b == b'-',
                _ => matches!(b, b'0'..=b'9' | b'a'..=b'f'),
            })
    }

    /// Returns the underlying `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns the bundle entry address for this id (`urn:uuid:<id>`).
    pub fn full_url(&self) -> String {
        format!("{FULL_URL_PREFIX}{}", self.0.hyphenated())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ResourceId {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceId::parse(s)
    }
}

/// Allocator of resource ids for one conversion.
///
/// A generator is owned by a single conversion context and never shared, so allocation needs no
/// synchronisation.
///
/// # Modes
/// - **Random**: every id is a fresh v4 UUID.
/// - **Deterministic**: the n-th id is the v5 UUID of `n` in a namespace derived from the seed.
///   Two generators built from the same seed produce the same sequence.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    namespace: Option<Uuid>,
    counter: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}

impl IdGenerator {
    /// Generator of random (v4) ids.
    pub fn random() -> Self {
        Self {
            namespace: None,
            counter: 0,
        }
    }

    /// Generator of reproducible (v5) ids for `seed`.
    pub fn deterministic(seed: &str) -> Self {
        Self {
            namespace: Some(Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes())),
            counter: 0,
        }
    }

    /// Random when `seed` is `None`, deterministic otherwise.
    pub fn from_seed(seed: Option<&str>) -> Self {
        seed.map_or_else(Self::random, Self::deterministic)
    }

    pub fn is_deterministic(&self) -> bool {
        self.namespace.is_some()
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter
    }

    /// Allocates the next id.
    pub fn next_id(&mut self) -> ResourceId {
        self.counter += 1;
        let uuid = match &self.namespace {
            Some(namespace) => Uuid::new_v5(namespace, &self.counter.to_be_bytes()),
            None => Uuid::new_v4(),
        };
        ResourceId(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_random_ids_are_canonical() {
        let mut ids = IdGenerator::random();
        let id = ids.next_id();
        assert!(ResourceId::is_canonical(&id.to_string()));
        assert_eq!(id.uuid().get_version_num(), 4);
    }

    #[test]
    fn test_deterministic_sequence_repeats_for_same_seed() {
        let mut a = IdGenerator::deterministic("seed-1");
        let mut b = IdGenerator::deterministic("seed-1");
        let first: Vec<_> = (0..5).map(|_| a.next_id()).collect();
        let second: Vec<_> = (0..5).map(|_| b.next_id()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0].uuid().get_version_num(), 5);
        assert_eq!(a.issued(), 5);
    }

    #[test]
    fn test_deterministic_sequence_differs_across_seeds() {
        let mut a = IdGenerator::deterministic("seed-1");
        let mut b = IdGenerator::deterministic("seed-2");
        assert_ne!(a.next_id(), b.next_id());
    }

    #[test]
    fn test_ids_are_unique_within_a_generator() {
        let mut ids = IdGenerator::deterministic("unique");
        let set: HashSet<_> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(set.len(), 1000);
    }

    #[test]
    fn test_from_seed_selects_mode() {
        assert!(IdGenerator::from_seed(Some("s")).is_deterministic());
        assert!(!IdGenerator::from_seed(None).is_deterministic());
    }

    #[test]
    fn test_full_url_round_trip() {
        let mut ids = IdGenerator::deterministic("urls");
        let id = ids.next_id();
        let url = id.full_url();
        assert!(url.starts_with("urn:uuid:"));
        assert_eq!(ResourceId::from_full_url(&url).expect("parse"), id);
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        for input in [
            "550E8400-E29B-41D4-A716-446655440000",
            "550e8400e29b41d4a716446655440000",
            "{550e8400-e29b-41d4-a716-446655440000}",
            "550e8400-e29b-41d4-a716-44665544000",
            "550e8400-e29b-41d4-a716-44665544000g",
        ] {
            let err = ResourceId::parse(input).expect_err("should reject");
            match err {
                UuidError::InvalidInput(msg) => assert!(msg.contains(input)),
            }
        }
    }

    #[test]
    fn test_from_full_url_requires_prefix() {
        let err = ResourceId::from_full_url("550e8400-e29b-41d4-a716-446655440000")
            .expect_err("missing prefix");
        assert!(err.to_string().contains("urn:uuid:"));
    }

    #[test]
    fn test_from_str_valid() {
        let id: ResourceId = "550e8400-e29b-41d4-a716-446655440000"
            .parse()
            .expect("valid");
        assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
    }

    #[test]
    fn test_serializes_as_string() {
        let id: ResourceId = "550e8400-e29b-41d4-a716-446655440000"
            .parse()
            .expect("valid");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, r#""550e8400-e29b-41d4-a716-446655440000""#);
    }
}
