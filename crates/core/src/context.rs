//! Per-conversion mutable state.
//!
//! Responsibilities:
//! - Own the in-progress bundle and the id generator of one conversion
//! - Record which entry plays which role (patient, primary encounter, ...) so that later
//!   resources and the enrichment pass can reference it without scanning the bundle
//! - Deduplicate practitioners and organizations within the message
//! - Collect non-fatal warnings
//!
//! A context is created for one conversion and dropped at its end; it is never shared.

use crate::config::ConversionOptions;
use crate::error::{ConversionError, ConversionResult, ConversionWarning};
use crate::resolvers::organizations::organization_key;
use crate::resolvers::practitioners::ResolvedPractitioner;
use crate::router::MessageType;
use crate::terminology::TerminologyLookup;
use chrono::FixedOffset;
use fhir::{fr_core, Bundle, Organization, Reference, Resource};
use hl7fr_uuid::IdGenerator;
use std::collections::HashMap;
use std::sync::Arc;

/// Logical role of an entry within the bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceRole {
    MessageHeader,
    Patient,
    PrimaryEncounter,
    PrimaryLocation,
    PrimaryCoverage,
    PrimaryAppointment,
    PrimaryServiceRequest,
    SendingOrganization,
    ReceivingOrganization,
}

pub struct ConversionContext {
    message_type: MessageType,
    options: ConversionOptions,
    timezone: FixedOffset,
    bundle: Bundle,
    ids: IdGenerator,
    terminology: Arc<dyn TerminologyLookup>,
    roles: HashMap<ResourceRole, String>,
    practitioners: HashMap<String, String>,
    organizations: HashMap<String, String>,
    warnings: Vec<ConversionWarning>,
    message_time: Option<String>,
}

impl ConversionContext {
    pub(crate) fn new(
        message_type: MessageType,
        options: ConversionOptions,
        bundle: Bundle,
        ids: IdGenerator,
        terminology: Arc<dyn TerminologyLookup>,
        message_time: Option<String>,
    ) -> Self {
        let timezone = options.timezone();
        Self {
            message_type,
            options,
            timezone,
            bundle,
            ids,
            terminology,
            roles: HashMap::new(),
            practitioners: HashMap::new(),
            organizations: HashMap::new(),
            warnings: Vec::new(),
            message_time,
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn event(&self) -> &str {
        &self.message_type.event_type
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Offset applied to HL7 date-times without one.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn terminology(&self) -> &dyn TerminologyLookup {
        self.terminology.as_ref()
    }

    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    /// Raw MSH-7.
    pub fn message_time(&self) -> Option<&str> {
        self.message_time.as_deref()
    }

    pub fn warnings(&self) -> &[ConversionWarning] {
        &self.warnings
    }

    // ========================================================================
    // Bundle entries
    // ========================================================================

    /// Assigns an id, declares the default FR Core profile and appends the resource.
    ///
    /// Returns the entry's `fullUrl`.
    pub fn add(&mut self, mut resource: Resource) -> ConversionResult<String> {
        let id = self.ids.next_id();
        resource.set_id(id.to_string());
        let resource_type = resource.resource_type();
        if let Some(profile) = fr_core::default_profile(resource_type) {
            resource.add_profile(profile);
        }
        let full_url = id.full_url();
        self.bundle
            .push(full_url.clone(), resource)
            .map_err(|e| self.mapping_error(None, e.to_string()))?;
        tracing::debug!("added {} {}", resource_type, full_url);
        Ok(full_url)
    }

    /// Adds a resource and records it under `role` unless the role is already taken.
    pub fn add_with_role(&mut self, role: ResourceRole, resource: Resource) -> ConversionResult<String> {
        let full_url = self.add(resource)?;
        self.roles.entry(role).or_insert_with(|| full_url.clone());
        Ok(full_url)
    }

    pub fn set_role(&mut self, role: ResourceRole, full_url: &str) {
        self.roles.insert(role, full_url.to_string());
    }

    pub fn role(&self, role: ResourceRole) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    pub fn reference(&self, role: ResourceRole) -> Option<Reference> {
        self.role(role).map(Reference::to)
    }

    pub fn resource_mut(&mut self, full_url: &str) -> Option<&mut Resource> {
        self.bundle.resource_mut(full_url)
    }

    /// The entry recorded under `role`.
    pub fn role_resource_mut(&mut self, role: ResourceRole) -> Option<&mut Resource> {
        let full_url = self.roles.get(&role)?.clone();
        self.bundle.resource_mut(&full_url)
    }

    /// Lists `full_url` in the MessageHeader `focus`, when the bundle has a header.
    pub fn add_focus(&mut self, full_url: &str) {
        if let Some(Resource::MessageHeader(header)) = self.role_resource_mut(ResourceRole::MessageHeader) {
            header.add_focus(full_url);
        }
    }

    /// A fresh `urn:uuid:` value for temporary identifiers.
    pub fn temporary_value(&mut self) -> String {
        self.ids.next_id().full_url()
    }

    // ========================================================================
    // Deduplicated side resources
    // ========================================================================

    /// Adds a practitioner once per message; later calls with the same identity return the
    /// existing entry.
    pub fn practitioner(&mut self, practitioner: ResolvedPractitioner) -> ConversionResult<String> {
        let key = practitioner.dedup_key();
        if let Some(full_url) = self.practitioners.get(&key) {
            return Ok(full_url.clone());
        }
        let full_url = self.add(Resource::Practitioner(practitioner.into_resource()))?;
        self.practitioners.insert(key, full_url.clone());
        Ok(full_url)
    }

    /// Adds an organization once per message, keyed by identifier or name.
    pub fn organization(&mut self, organization: Organization) -> ConversionResult<String> {
        let key = organization_key(&organization);
        if let Some(full_url) = self.organizations.get(&key) {
            return Ok(full_url.clone());
        }
        let full_url = self.add(Resource::Organization(organization))?;
        self.organizations.insert(key, full_url.clone());
        Ok(full_url)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Records a non-fatal issue.
    pub fn warn(&mut self, segment: &str, field_index: Option<usize>, reason: impl Into<String>) {
        let warning = ConversionWarning::new(segment, field_index, reason);
        tracing::warn!(
            "{} {}{}: {}",
            self.message_type.event_code(),
            warning.segment,
            warning.field_index.map(|i| format!("-{i}")).unwrap_or_default(),
            warning.reason
        );
        self.warnings.push(warning);
    }

    pub(crate) fn record_parse_warning(&mut self, warning: &hl7v2::ParseWarning) {
        self.warnings.push(ConversionWarning::from(warning));
    }

    /// A [`ConversionError::Mapping`] carrying this conversion's type and event.
    pub fn mapping_error(&self, segment: Option<&str>, reason: impl Into<String>) -> ConversionError {
        ConversionError::Mapping {
            message_type: self.message_type.message_type.clone(),
            event: self.message_type.event_type.clone(),
            segment: segment.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub(crate) fn into_parts(self) -> (MessageType, Bundle, Vec<ConversionWarning>) {
        (self.message_type, self.bundle, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminology::FrenchTerminology;
    use fhir::{BundleType, Patient, ResourceType};

    fn context() -> ConversionContext {
        let message_type = MessageType {
            message_type: "ADT".into(),
            event_type: "A01".into(),
            structure: "ADT_A01".into(),
            supported: true,
        };
        ConversionContext::new(
            message_type,
            ConversionOptions::default(),
            Bundle::new("b1", BundleType::Collection, "2025-01-01T12:00:00+01:00"),
            IdGenerator::deterministic("context-tests"),
            Arc::new(FrenchTerminology::default()),
            None,
        )
    }

    #[test]
    fn add_sets_id_and_profile() {
        let mut ctx = context();
        let full_url = ctx
            .add_with_role(ResourceRole::Patient, Resource::Patient(Patient::default()))
            .expect("add");
        assert!(full_url.starts_with("urn:uuid:"));
        let resource = ctx.bundle().resource(&full_url).expect("entry");
        assert_eq!(resource.resource_type(), ResourceType::Patient);
        assert_eq!(resource.id(), full_url.strip_prefix("urn:uuid:"));
        assert_eq!(
            resource.meta().map(|m| m.profile.clone()),
            Some(vec![fr_core::PROFILE_PATIENT.to_string()])
        );
        assert_eq!(ctx.role(ResourceRole::Patient), Some(full_url.as_str()));
    }

    #[test]
    fn first_resource_keeps_the_role() {
        let mut ctx = context();
        let first = ctx
            .add_with_role(ResourceRole::Patient, Resource::Patient(Patient::default()))
            .expect("first");
        ctx.add_with_role(ResourceRole::Patient, Resource::Patient(Patient::default()))
            .expect("second");
        assert_eq!(ctx.role(ResourceRole::Patient), Some(first.as_str()));
    }

    #[test]
    fn organizations_are_deduplicated() {
        let mut ctx = context();
        let org = Organization {
            name: Some("CHU".into()),
            ..Organization::default()
        };
        let a = ctx.organization(org.clone()).expect("a");
        let b = ctx.organization(org).expect("b");
        assert_eq!(a, b);
        assert_eq!(ctx.bundle().len(), 1);
    }

    #[test]
    fn warnings_are_collected() {
        let mut ctx = context();
        ctx.warn("ZBE", Some(9), "unknown movement type");
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.warnings()[0].field_index, Some(9));
    }
}
