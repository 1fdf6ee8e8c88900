//! Field resolvers: pure functions from HL7 field values to FHIR datatypes.
//!
//! Nothing in this module touches the bundle or the conversion context; handlers call these and
//! decide where the results go.

pub mod address;
pub mod codes;
pub mod datetime;
pub mod identifiers;
pub mod names;
pub mod organizations;
pub mod practitioners;
pub mod telecom;
