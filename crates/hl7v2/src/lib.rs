//! HL7 v2.x wire-format support.
//!
//! This crate turns raw pipe-and-hat message text into a typed, immutable field tree.
//!
//! Responsibilities:
//! - Normalise record separators and strip control characters
//! - Read the delimiters declared by the header segment (with standard fallbacks)
//! - Split every record into fields, repetitions, components and subcomponents
//! - Decode standard escape sequences in leaf text
//! - Collect non-fatal, field-level parse warnings instead of aborting
//!
//! Notes:
//! - The crate knows nothing about FHIR; mapping lives in `hl7fr-core`.
//! - A [`ParsedMessage`] is created once per input and never mutated afterwards.

mod delimiters;
mod escape;
mod field;
mod message;
mod parser;

pub use delimiters::Delimiters;
pub use escape::unescape;
pub use field::FieldValue;
pub use message::{HeaderSegment, ParsedMessage, Segment};
pub use parser::{parse, ParseWarning};

/// Name of the header segment that must open every message.
pub const HEADER_SEGMENT: &str = "MSH";

/// Errors returned by the `hl7v2` parser.
///
/// All variants are structural: a single malformed field never produces an error, only a
/// [`ParseWarning`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Hl7Error {
    #[error("message text is empty")]
    Empty,

    #[error("message contains no non-blank segment")]
    NoSegments,

    #[error("first segment must be {HEADER_SEGMENT}, found '{0}'")]
    MissingHeader(String),
}

/// Type alias for Results that can fail with an [`Hl7Error`].
pub type Hl7Result<T> = Result<T, Hl7Error>;
