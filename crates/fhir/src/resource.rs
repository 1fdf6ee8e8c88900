//! Closed set of resources the converter can emit.
//!
//! [`Resource`] is internally tagged by `resourceType`, so the discriminator is written as the
//! first key of every entry's `resource` object and individual resource structs carry no
//! `resourceType` field of their own.

use crate::{
    Appointment, Coverage, Encounter, Extension, Location, Meta, MessageHeader, Observation,
    Organization, Patient, Practitioner, PractitionerRole, RelatedPerson, Schedule,
    ServiceRequest,
};
use serde::{Deserialize, Serialize};

/// Resource kinds, used for routing, lookups and transaction request URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    MessageHeader,
    Patient,
    RelatedPerson,
    Practitioner,
    PractitionerRole,
    Organization,
    Location,
    Encounter,
    Coverage,
    ServiceRequest,
    Observation,
    Appointment,
    Schedule,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::MessageHeader => "MessageHeader",
            ResourceType::Patient => "Patient",
            ResourceType::RelatedPerson => "RelatedPerson",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::PractitionerRole => "PractitionerRole",
            ResourceType::Organization => "Organization",
            ResourceType::Location => "Location",
            ResourceType::Encounter => "Encounter",
            ResourceType::Coverage => "Coverage",
            ResourceType::ServiceRequest => "ServiceRequest",
            ResourceType::Observation => "Observation",
            ResourceType::Appointment => "Appointment",
            ResourceType::Schedule => "Schedule",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any resource that can appear in a converted bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    MessageHeader(MessageHeader),
    Patient(Patient),
    RelatedPerson(RelatedPerson),
    Practitioner(Practitioner),
    PractitionerRole(PractitionerRole),
    Organization(Organization),
    Location(Location),
    Encounter(Encounter),
    Coverage(Coverage),
    ServiceRequest(ServiceRequest),
    Observation(Observation),
    Appointment(Appointment),
    Schedule(Schedule),
}

macro_rules! each_resource {
    ($value:expr, $bind:ident => $body:expr) => {
        match $value {
            Resource::MessageHeader($bind) => $body,
            Resource::Patient($bind) => $body,
            Resource::RelatedPerson($bind) => $body,
            Resource::Practitioner($bind) => $body,
            Resource::PractitionerRole($bind) => $body,
            Resource::Organization($bind) => $body,
            Resource::Location($bind) => $body,
            Resource::Encounter($bind) => $body,
            Resource::Coverage($bind) => $body,
            Resource::ServiceRequest($bind) => $body,
            Resource::Observation($bind) => $body,
            Resource::Appointment($bind) => $body,
            Resource::Schedule($bind) => $body,
        }
    };
}

impl Resource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Resource::MessageHeader(_) => ResourceType::MessageHeader,
            Resource::Patient(_) => ResourceType::Patient,
            Resource::RelatedPerson(_) => ResourceType::RelatedPerson,
            Resource::Practitioner(_) => ResourceType::Practitioner,
            Resource::PractitionerRole(_) => ResourceType::PractitionerRole,
            Resource::Organization(_) => ResourceType::Organization,
            Resource::Location(_) => ResourceType::Location,
            Resource::Encounter(_) => ResourceType::Encounter,
            Resource::Coverage(_) => ResourceType::Coverage,
            Resource::ServiceRequest(_) => ResourceType::ServiceRequest,
            Resource::Observation(_) => ResourceType::Observation,
            Resource::Appointment(_) => ResourceType::Appointment,
            Resource::Schedule(_) => ResourceType::Schedule,
        }
    }

    /// Logical id (the bare UUID, without the `urn:uuid:` prefix).
    pub fn id(&self) -> Option<&str> {
        each_resource!(self, r => r.id.as_deref())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        each_resource!(self, r => r.id = Some(id))
    }

    pub fn meta(&self) -> Option<&Meta> {
        each_resource!(self, r => r.meta.as_ref())
    }

    pub fn extensions(&self) -> &[Extension] {
        each_resource!(self, r => r.extension.as_slice())
    }

    pub fn extensions_mut(&mut self) -> &mut Vec<Extension> {
        each_resource!(self, r => &mut r.extension)
    }

    /// Declares `profile` in `meta.profile`, keeping any profiles already set.
    pub fn add_profile(&mut self, profile: &str) {
        let meta = each_resource!(self, r => r.meta.get_or_insert_with(Meta::default));
        if !meta.profile.iter().any(|p| p == profile) {
            meta.profile.push(profile.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_is_first_key() {
        let resource = Resource::Patient(Patient {
            id: Some("p1".into()),
            ..Patient::default()
        });
        let json = serde_json::to_string(&resource).expect("serialize");
        assert!(json.starts_with(r#"{"resourceType":"Patient""#), "{json}");
    }

    #[test]
    fn deserializes_by_discriminator() {
        let json = r#"{"resourceType":"Organization","id":"o1","name":"CHU"}"#;
        let resource: Resource = serde_json::from_str(json).expect("deserialize");
        assert_eq!(resource.resource_type(), ResourceType::Organization);
        assert_eq!(resource.id(), Some("o1"));
    }

    #[test]
    fn add_profile_is_idempotent() {
        let mut resource = Resource::Location(Location::default());
        resource.add_profile("http://example.org/p");
        resource.add_profile("http://example.org/p");
        assert_eq!(resource.meta().map(|m| m.profile.len()), Some(1));
    }
}
