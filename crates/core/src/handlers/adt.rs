//! ADT (admission, discharge, transfer) conversion.
//!
//! Responsibilities:
//! - Patient from PID/PD1/MRG
//! - Encounter from PV1/PV2, with its mandatory Location
//! - Practitioners (PV1-7/8/9/17, ROL), header organizations, related persons and coverages
//!
//! Notes:
//! - Patient-level events (A28, A31, A40, A47) carry no visit; a missing PV1 is only a warning
//!   for the other events.
//! - The Encounter always lists at least one location; a default Location is created when PV1-3
//!   is blank.

use crate::constants::DEFAULT_LOCATION_NAME;
use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::handlers::common::{self, location_reference, period, practitioner_references, with_display};
use crate::handlers::patient::build_patient;
use crate::resolvers::codes::{
    codeable_concept, coded, discharge_disposition, encounter_class, encounter_status, is_discharge_disposition,
};
use crate::resolvers::datetime::to_fhir_datetime;
use crate::resolvers::identifiers::RawIdentifier;
use fhir::fr_core::{CS_V2_0023, CS_V2_0203, CS_V3_PARTICIPATION_TYPE, EXT_ESTIMATED_DISCHARGE_DATE};
use fhir::{
    upsert_extension, CodeableConcept, Encounter, EncounterHospitalization, EncounterLocation,
    EncounterLocationStatus, EncounterParticipant, EncounterStatus, Extension, Identifier, IdentifierUse,
    Location, Reference, Resource,
};
use hl7v2::{ParsedMessage, Segment};

const PATIENT_EVENTS: [&str; 4] = ["A28", "A31", "A40", "A47"];

/// PV1 fields naming practitioners, with their v3 participation type.
const PARTICIPANTS: [(usize, &str, &str); 4] = [
    (7, "ATND", "attender"),
    (8, "REF", "referrer"),
    (9, "CON", "consultant"),
    (17, "ADM", "admitter"),
];

pub fn handle(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    build_patient(message, ctx)?;
    match message.segment("PV1") {
        Some(pv1) => build_encounter(message, pv1, ctx)?,
        None if PATIENT_EVENTS.contains(&ctx.event()) => {}
        None => ctx.warn("PV1", None, "message has no PV1 segment; no Encounter created"),
    }
    common::header_organizations(message, ctx)?;
    default_service_provider(ctx);
    common::practitioner_roles(message, ctx)?;
    common::related_persons(message, ctx)?;
    common::coverages(message, ctx)?;
    Ok(())
}

// ============================================================================
// Encounter
// ============================================================================

fn build_encounter(message: &ParsedMessage, pv1: &Segment, ctx: &mut ConversionContext) -> ConversionResult<()> {
    let pv2 = message.segment("PV2");
    // PV1-45 discharge time, or a PV1-36 disposition from table 0112
    let discharged = pv1.value(45).is_some() || pv1.value(36).is_some_and(is_discharge_disposition);
    let status = encounter_status(ctx.event(), discharged);

    let mut encounter = Encounter {
        status,
        class: encounter_class(pv1.value(2), ctx.event()),
        subject: ctx.reference(ResourceRole::Patient),
        identifier: visit_identifier(pv1).into_iter().collect(),
        period: period(ctx, pv1.value(44), pv1.value(45)),
        encounter_type: codeable_concept(pv1.field(4)).into_iter().collect(),
        service_type: codeable_concept(pv1.field(10)),
        reason_code: pv2
            .and_then(|pv2| codeable_concept(pv2.field(3)))
            .into_iter()
            .collect(),
        hospitalization: hospitalization(pv1),
        ..Encounter::default()
    };
    if encounter.subject.is_none() {
        ctx.warn("PV1", None, "Encounter has no Patient to reference");
    }

    for (field, code, display) in PARTICIPANTS {
        for individual in practitioner_references(ctx, pv1.field(field))? {
            encounter.participant.push(EncounterParticipant {
                participant_type: vec![coded(CS_V3_PARTICIPATION_TYPE, code, Some(display))],
                individual: Some(individual),
                period: None,
            });
        }
    }

    if let Some(expected) = expected_discharge(pv1, pv2, ctx) {
        upsert_extension(
            &mut encounter.extension,
            Extension::date_time(EXT_ESTIMATED_DISCHARGE_DATE, expected),
        );
    }

    let encounter_url = ctx.add_with_role(ResourceRole::PrimaryEncounter, Resource::Encounter(encounter))?;
    ctx.add_focus(&encounter_url);

    let locations = encounter_locations(pv1, status, ctx)?;
    if let Some(Resource::Encounter(encounter)) = ctx.resource_mut(&encounter_url) {
        encounter.location = locations;
    }
    tracing::debug!("encounter {} built from PV1", encounter_url);
    Ok(())
}

/// PV1-19 visit number.
fn visit_identifier(pv1: &Segment) -> Option<Identifier> {
    let raw = RawIdentifier::from_cx(pv1.field(19).first_repetition())?;
    Some(Identifier {
        use_type: Some(IdentifierUse::Usual),
        identifier_type: Some(coded(CS_V2_0203, "VN", Some("Visit number"))),
        system: raw.authority_oid,
        value: Some(raw.value),
        ..Identifier::default()
    })
}

/// PV1-5 pre-admit number, PV1-13 re-admission, PV1-14 admit source, PV1-36 discharge
/// disposition.
fn hospitalization(pv1: &Segment) -> Option<EncounterHospitalization> {
    let hospitalization = EncounterHospitalization {
        pre_admission_identifier: pv1.field(5).value().map(|value| Identifier {
            value: Some(value.to_string()),
            ..Identifier::default()
        }),
        admit_source: pv1.value(14).map(|code| coded(CS_V2_0023, code, None)),
        re_admission: pv1
            .value(13)
            .filter(|code| code.eq_ignore_ascii_case("R"))
            .map(|_| CodeableConcept::from_text("Re-admission")),
        discharge_disposition: pv1.value(36).and_then(discharge_disposition),
        ..EncounterHospitalization::default()
    };
    (hospitalization != EncounterHospitalization::default()).then_some(hospitalization)
}

/// PV2-9 expected discharge, then the actual discharge (PV1-45), then the admission (PV1-44).
fn expected_discharge(pv1: &Segment, pv2: Option<&Segment>, ctx: &ConversionContext) -> Option<String> {
    [pv2.and_then(|pv2| pv2.value(9)), pv1.value(45), pv1.value(44)]
        .into_iter()
        .flatten()
        .find_map(|raw| to_fhir_datetime(raw, ctx.timezone()))
}

/// Current (PV1-3), prior (PV1-6) and pending (PV1-42) locations.
fn encounter_locations(
    pv1: &Segment,
    status: EncounterStatus,
    ctx: &mut ConversionContext,
) -> ConversionResult<Vec<EncounterLocation>> {
    let current_status = match status {
        EncounterStatus::Finished | EncounterStatus::Cancelled => EncounterLocationStatus::Completed,
        EncounterStatus::Planned => EncounterLocationStatus::Planned,
        _ => EncounterLocationStatus::Active,
    };

    let current = match location_reference(ctx, pv1.field(3))? {
        Some(reference) => reference,
        None => {
            ctx.warn("PV1", Some(3), "assigned patient location is blank; using a default Location");
            default_location(ctx)?
        }
    };
    if let Some(full_url) = current.reference.as_deref() {
        ctx.set_role(ResourceRole::PrimaryLocation, full_url);
    }

    let mut locations = vec![EncounterLocation {
        location: current,
        status: Some(current_status),
        period: None,
    }];
    for (field, location_status) in [
        (6, EncounterLocationStatus::Completed),
        (42, EncounterLocationStatus::Planned),
    ] {
        if let Some(location) = location_reference(ctx, pv1.field(field))? {
            locations.push(EncounterLocation {
                location,
                status: Some(location_status),
                period: None,
            });
        }
    }
    Ok(locations)
}

fn default_location(ctx: &mut ConversionContext) -> ConversionResult<Reference> {
    let location = Location {
        status: Some("active".to_string()),
        mode: Some("instance".to_string()),
        name: Some(DEFAULT_LOCATION_NAME.to_string()),
        ..Location::default()
    };
    let full_url = ctx.add(Resource::Location(location))?;
    Ok(with_display(Reference::to(full_url), Some(DEFAULT_LOCATION_NAME.to_string())))
}

/// The sending facility provides the encounter unless enrichment names a unit later.
fn default_service_provider(ctx: &mut ConversionContext) {
    let Some(sender) = ctx.reference(ResourceRole::SendingOrganization) else {
        return;
    };
    if let Some(Resource::Encounter(encounter)) = ctx.role_resource_mut(ResourceRole::PrimaryEncounter) {
        encounter.service_provider.get_or_insert(sender);
    }
}
