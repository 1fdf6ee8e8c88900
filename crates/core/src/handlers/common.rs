//! Side resources shared across message families.
//!
//! Responsibilities:
//! - Sending/receiving organizations from MSH-4 and MSH-6, linked from the MessageHeader
//! - Practitioner references from `XCN` fields
//! - Related persons (NK1), coverages (IN1) and practitioner roles (ROL)

use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::resolvers::address::addresses_from_field;
use crate::resolvers::codes::{administrative_gender, codeable_concept, coded, subscriber_relationship};
use crate::resolvers::datetime::{to_fhir_date, to_fhir_datetime};
use crate::resolvers::identifiers::{classify, organization_identifier, RawIdentifier};
use crate::resolvers::names::{first_name, names_from_field, XPN};
use crate::resolvers::organizations::{organization_from_hd, organization_from_xon};
use crate::resolvers::practitioners::{practitioner_from_xcn, practitioners_from_field};
use crate::resolvers::telecom::telecoms;
use fhir::fr_core::{CS_LOCATION_PHYSICAL_TYPE, CS_V2_0063, CS_V2_0131};
use fhir::{
    CodeableConcept, Coding, Coverage, CoverageClass, Identifier, Location, Organization, Period,
    PractitionerRole, Reference, RelatedPerson, Resource,
};
use hl7v2::{FieldValue, ParsedMessage, Segment};

const CS_COVERAGE_CLASS: &str = "http://terminology.hl7.org/CodeSystem/coverage-class";

// ============================================================================
// References
// ============================================================================

/// Adds (or reuses) the practitioner of the first usable `XCN` repetition.
pub fn practitioner_reference(ctx: &mut ConversionContext, field: &FieldValue) -> ConversionResult<Option<Reference>> {
    let Some(practitioner) = field.repetitions().find_map(practitioner_from_xcn) else {
        return Ok(None);
    };
    let display = practitioner.display();
    let full_url = ctx.practitioner(practitioner)?;
    Ok(Some(with_display(Reference::to(full_url), display)))
}

/// Adds (or reuses) every practitioner of a repeated `XCN` field.
pub fn practitioner_references(ctx: &mut ConversionContext, field: &FieldValue) -> ConversionResult<Vec<Reference>> {
    let mut references = Vec::new();
    for practitioner in practitioners_from_field(field) {
        let display = practitioner.display();
        let full_url = ctx.practitioner(practitioner)?;
        references.push(with_display(Reference::to(full_url), display));
    }
    Ok(references)
}

/// Adds (or reuses) the organization of an `XON` field.
pub fn organization_reference(ctx: &mut ConversionContext, field: &FieldValue) -> ConversionResult<Option<Reference>> {
    let Some(organization) = organization_from_xon(field.first_repetition()) else {
        return Ok(None);
    };
    let display = organization.name.clone();
    let full_url = ctx.organization(organization)?;
    Ok(Some(with_display(Reference::to(full_url), display)))
}

pub(crate) fn with_display(mut reference: Reference, display: Option<String>) -> Reference {
    reference.display = display;
    reference
}

/// `[start, end]` from two HL7 timestamps; `None` when both are blank or malformed.
pub(crate) fn period(ctx: &ConversionContext, start: Option<&str>, end: Option<&str>) -> Option<Period> {
    let period = Period {
        start: start.and_then(|raw| to_fhir_datetime(raw, ctx.timezone())),
        end: end.and_then(|raw| to_fhir_datetime(raw, ctx.timezone())),
    };
    (!period.is_empty()).then_some(period)
}

// ============================================================================
// Locations
// ============================================================================

/// `PL`: PL-1 point of care, PL-2 room, PL-3 bed, PL-4 facility, PL-9 description.
///
/// The physical type is the finest level present. `None` when nothing locates the patient.
pub fn location_from_pl(pl: &FieldValue) -> Option<Location> {
    let parts: Vec<&str> = (1..=3).filter_map(|i| pl.component_value(i)).collect();
    let description = pl.component_value(9);
    if parts.is_empty() && description.is_none() {
        return None;
    }
    let (code, display) = if pl.component_value(3).is_some() {
        ("bd", "Bed")
    } else if pl.component_value(2).is_some() {
        ("ro", "Room")
    } else {
        ("wa", "Ward")
    };
    Some(Location {
        status: Some("active".to_string()),
        mode: Some("instance".to_string()),
        name: Some(description.map(str::to_string).unwrap_or_else(|| parts.join(" - "))),
        identifier: (!parts.is_empty())
            .then(|| Identifier {
                value: Some(parts.join("/")),
                ..Identifier::default()
            })
            .into_iter()
            .collect(),
        physical_type: Some(coded(CS_LOCATION_PHYSICAL_TYPE, code, Some(display))),
        ..Location::default()
    })
}

/// Adds the Location of a `PL` field, with its facility as managing organization.
pub fn location_reference(ctx: &mut ConversionContext, pl: &FieldValue) -> ConversionResult<Option<Reference>> {
    let pl = pl.first_repetition();
    let Some(mut location) = location_from_pl(pl) else {
        return Ok(None);
    };
    if let Some(facility) = organization_from_hd(pl.component(4)) {
        let display = facility.name.clone();
        let full_url = ctx.organization(facility)?;
        location.managing_organization = Some(with_display(Reference::to(full_url), display));
    }
    let display = location.name.clone();
    let full_url = ctx.add(Resource::Location(location))?;
    Ok(Some(with_display(Reference::to(full_url), display)))
}

// ============================================================================
// Header organizations
// ============================================================================

/// MSH-4 and MSH-6 facilities as Organizations, linked from the MessageHeader sender and
/// receiver.
pub fn header_organizations(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    let Some(header) = message.header() else {
        return Ok(());
    };

    if let Some(sender) = organization_from_hd(header.field(4)) {
        let display = sender.name.clone();
        let full_url = ctx.organization(sender)?;
        ctx.set_role(ResourceRole::SendingOrganization, &full_url);
        let reference = with_display(Reference::to(full_url), display);
        if let Some(Resource::MessageHeader(message_header)) = ctx.role_resource_mut(ResourceRole::MessageHeader) {
            message_header.sender = Some(reference.clone());
        }
        if let Some(Resource::Patient(patient)) = ctx.role_resource_mut(ResourceRole::Patient) {
            patient.managing_organization.get_or_insert(reference);
        }
    }

    if let Some(receiver) = organization_from_hd(header.field(6)) {
        let display = receiver.name.clone();
        let full_url = ctx.organization(receiver)?;
        ctx.set_role(ResourceRole::ReceivingOrganization, &full_url);
        let reference = with_display(Reference::to(full_url), display);
        if let Some(Resource::MessageHeader(message_header)) = ctx.role_resource_mut(ResourceRole::MessageHeader) {
            if let Some(destination) = message_header.destination.first_mut() {
                destination.receiver = Some(reference);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Related persons
// ============================================================================

/// One RelatedPerson per NK1 segment.
pub fn related_persons(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    let segments = message.segments_of("NK1");
    if segments.is_empty() {
        return Ok(());
    }
    let Some(patient) = ctx.reference(ResourceRole::Patient) else {
        ctx.warn("NK1", None, "next-of-kin segments without a Patient; skipped");
        return Ok(());
    };
    for nk1 in segments {
        let person = related_person(nk1, patient.clone(), ctx);
        if person.name.is_empty() && person.telecom.is_empty() && person.address.is_empty() {
            ctx.warn("NK1", Some(2), "next of kin has no name, telecom or address; skipped");
            continue;
        }
        ctx.add(Resource::RelatedPerson(person))?;
    }
    Ok(())
}

fn related_person(nk1: &Segment, patient: Reference, ctx: &ConversionContext) -> RelatedPerson {
    let mut relationship = Vec::new();
    if let Some(mut concept) = codeable_concept(nk1.field(3).first_repetition()) {
        default_system(&mut concept, CS_V2_0063);
        relationship.push(concept);
    }
    if let Some(mut role) = codeable_concept(nk1.field(7).first_repetition()) {
        default_system(&mut role, CS_V2_0131);
        relationship.push(role);
    }
    RelatedPerson {
        active: Some(true),
        patient,
        relationship,
        name: names_from_field(nk1.field(2)),
        telecom: telecoms(nk1.field(5), nk1.field(6)),
        address: addresses_from_field(nk1.field(4)).addresses,
        gender: nk1.value(15).and_then(administrative_gender),
        period: period(ctx, nk1.value(8), nk1.value(9)),
        ..RelatedPerson::default()
    }
}

/// Fills the system of codings that carry none.
pub(crate) fn default_system(concept: &mut CodeableConcept, system: &str) {
    for coding in &mut concept.coding {
        if coding.system.is_none() {
            coding.system = Some(system.to_string());
        }
    }
}

// ============================================================================
// Coverage
// ============================================================================

/// One Coverage per IN1 segment; the first becomes the primary coverage.
pub fn coverages(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    let segments = message.segments_of("IN1");
    if segments.is_empty() {
        return Ok(());
    }
    let Some(patient) = ctx.reference(ResourceRole::Patient) else {
        ctx.warn("IN1", None, "insurance segments without a Patient; skipped");
        return Ok(());
    };
    for in1 in segments {
        let coverage = coverage(in1, patient.clone(), ctx)?;
        ctx.add_with_role(ResourceRole::PrimaryCoverage, Resource::Coverage(coverage))?;
    }
    Ok(())
}

fn coverage(in1: &Segment, patient: Reference, ctx: &mut ConversionContext) -> ConversionResult<Coverage> {
    let mut coverage = Coverage {
        status: "active".to_string(),
        beneficiary: patient.clone(),
        period: coverage_period(in1.value(12), in1.value(13)),
        ..Coverage::default()
    };

    // IN1-3 insurer id, IN1-4 insurer name
    let payer = payer_organization(in1);
    match payer {
        Some(payer) => {
            let display = payer.name.clone();
            let full_url = ctx.organization(payer)?;
            coverage.payor.push(with_display(Reference::to(full_url), display));
        }
        None => {
            ctx.warn("IN1", Some(3), "no insurer identifier or name; the patient is recorded as payor");
            coverage.payor.push(patient.clone());
        }
    }

    if let Some(code) = in1.field(15).value() {
        match ctx.terminology().lookup_coverage_type(code) {
            Some(concept) => {
                coverage.coverage_type = Some(coded(&concept.system, &concept.code, Some(&concept.display)));
            }
            None => {
                coverage.coverage_type = Some(CodeableConcept::from_text(code));
                ctx.warn("IN1", Some(15), format!("unknown coverage type '{code}'"));
            }
        }
    }

    if let Some(plan) = in1.field(2).value() {
        coverage.class.push(coverage_class("plan", plan, in1.component_value(2, 2)));
    }
    if let Some(group) = in1.field(8).value() {
        coverage.class.push(coverage_class("group", group, in1.value(9)));
    }

    let relationship = in1.field(17).value().map(subscriber_relationship);
    let is_self = relationship
        .as_ref()
        .is_some_and(|coding| coding.code.as_deref() == Some("self"));
    coverage.relationship = relationship.map(CodeableConcept::from_coding);

    // IN1-36 policy number, IN1-49 insured's identifier
    if let Some(raw) = RawIdentifier::from_cx(in1.field(49).first_repetition()) {
        coverage.identifier.push(classify(&raw));
    }
    coverage.subscriber_id = in1
        .value(36)
        .or_else(|| in1.field(49).value())
        .map(str::to_string);
    if is_self {
        coverage.subscriber = Some(patient);
    } else if let Some(name) = first_name(in1.field(16), XPN).and_then(|n| n.display()) {
        coverage.subscriber = Some(Reference {
            display: Some(name),
            ..Reference::default()
        });
    }
    Ok(coverage)
}

fn coverage_period(start: Option<&str>, end: Option<&str>) -> Option<Period> {
    let period = Period {
        start: start.and_then(to_fhir_date),
        end: end.and_then(to_fhir_date),
    };
    (!period.is_empty()).then_some(period)
}

/// IN1-4 names the insurer and IN1-3 identifies it; either one is enough.
fn payer_organization(in1: &Segment) -> Option<Organization> {
    let insurer_id = RawIdentifier::from_cx(in1.field(3).first_repetition())
        .map(|raw| organization_identifier(&raw.value, raw.authority_oid.as_deref()));
    match organization_from_xon(in1.field(4).first_repetition()) {
        Some(mut payer) => {
            if payer.identifier.is_empty() {
                payer.identifier.extend(insurer_id);
            }
            Some(payer)
        }
        None => insurer_id.map(|identifier| Organization {
            active: Some(true),
            identifier: vec![identifier],
            ..Organization::default()
        }),
    }
}

fn coverage_class(kind: &str, value: &str, name: Option<&str>) -> CoverageClass {
    CoverageClass {
        class_type: CodeableConcept::from_coding(Coding::new(CS_COVERAGE_CLASS, kind)),
        value: value.to_string(),
        name: name.map(str::to_string),
    }
}

// ============================================================================
// Practitioner roles
// ============================================================================

/// One PractitionerRole per ROL segment naming a practitioner.
pub fn practitioner_roles(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    for rol in message.segments_of("ROL") {
        let Some(practitioner) = practitioner_reference(ctx, rol.field(4))? else {
            ctx.warn("ROL", Some(4), "role without a practitioner; skipped");
            continue;
        };
        let role = PractitionerRole {
            active: Some(!rol.value(2).is_some_and(|action| action.eq_ignore_ascii_case("DE"))),
            practitioner: Some(practitioner),
            organization: ctx.reference(ResourceRole::SendingOrganization),
            code: codeable_concept(rol.field(3).first_repetition()).into_iter().collect(),
            location: ctx.reference(ResourceRole::PrimaryLocation).into_iter().collect(),
            period: period(ctx, rol.value(5), rol.value(6)),
            ..PractitionerRole::default()
        };
        ctx.add(Resource::PractitionerRole(role))?;
    }
    Ok(())
}
