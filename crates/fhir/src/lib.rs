//! FHIR R4 wire/boundary support for HL7 v2 conversion output.
//!
//! This crate provides **wire models** for the closed set of FHIR R4 resources produced by the
//! converter, plus the `Bundle` container that carries them.
//!
//! This crate focuses on:
//! - FHIR JSON shape (camelCase keys, `resourceType` discriminator, absent-not-null optionals)
//! - FR Core canonical URLs, extension URLs and identifier OIDs ([`fr_core`])
//! - strict JSON parsing with a path to the failing field
//!
//! It does not validate against StructureDefinitions; it only guarantees conformant shapes.

pub mod bundle;
pub mod coverage;
pub mod datatypes;
pub mod encounter;
pub mod fr_core;
pub mod messaging;
pub mod orders;
pub mod patient;
pub mod practitioner;
pub mod resource;
pub mod scheduling;

// Re-export facades
pub use bundle::{Bundle, BundleEntry, BundleEntryRequest, BundleType, HttpVerb};
pub use coverage::{Coverage, CoverageClass};
pub use datatypes::{
    Address, AddressType, AddressUse, Annotation, CodeableConcept, Coding, ContactPoint,
    ContactPointSystem, ContactPointUse, Extension, HumanName, Identifier, IdentifierUse, Meta,
    NameUse, Period, Quantity, Reference, find_extension, upsert_extension,
};
pub use encounter::{
    Encounter, EncounterHospitalization, EncounterLocation, EncounterLocationStatus,
    EncounterParticipant, EncounterStatus, Location,
};
pub use messaging::{MessageDestination, MessageHeader, MessageSource};
pub use orders::{
    Observation, ObservationReferenceRange, ObservationStatus, RequestPriority, RequestStatus,
    ServiceRequest,
};
pub use patient::{AdministrativeGender, Patient, PatientCommunication, PatientLink, RelatedPerson};
pub use practitioner::{Organization, Practitioner, PractitionerRole};
pub use resource::{Resource, ResourceType};
pub use scheduling::{Appointment, AppointmentParticipant, AppointmentStatus, ParticipationStatus, Schedule};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
