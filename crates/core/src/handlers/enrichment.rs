//! French extension-segment enrichment (ZBE, ZFP, ZFV, ZFM, ZFD, ZFC).
//!
//! Responsibilities:
//! - Read the national Z-segments of ADT messages and fold them into FR Core extensions and
//!   elements of the resources the handler already built
//! - Resolve coded values through the terminology lookup
//!
//! Notes:
//! - Targets are reached through the context's role map (Patient, primary Encounter, primary
//!   Coverage). A segment whose target is absent is ignored with a warning.
//! - Every segment is optional.

use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::handlers::common::organization_reference;
use crate::resolvers::codes::{oid_uri, yes_no};
use crate::resolvers::datetime::{to_fhir_date, to_fhir_datetime};
use crate::resolvers::identifiers::organization_identifier;
use fhir::fr_core::{
    CS_MOVEMENT_TYPE, CS_PMSI_DESTINATION, CS_PMSI_ENTRY_MODE, CS_PMSI_EXIT_MODE, CS_PMSI_ORIGIN,
    EXT_CARE_MODE, EXT_DISCHARGE_TRANSPORT_MODE, EXT_FULL_COVERAGE, EXT_IDENTITY_COLLECTION_MODE,
    EXT_LAST_STAY_DATE, EXT_LUNAR_DATE, EXT_MOVEMENT, EXT_PMSI, EXT_SMS_CONSENT, EXT_SOCIO_PROFESSIONAL,
};
use fhir::{
    upsert_extension, CodeableConcept, Coding, Coverage, Encounter, Extension, Identifier, IdentifierUse,
    Organization, Patient, Reference, Resource,
};
use hl7v2::{ParsedMessage, Segment};

/// Runs every enrichment step whose segment is present.
pub fn enrich(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    if let Some(zbe) = message.segment("ZBE") {
        movement(zbe, ctx)?;
    }
    if let Some(zfp) = message.segment("ZFP") {
        socio_professional(zfp, ctx);
    }
    if let Some(zfv) = message.segment("ZFV") {
        visit_complement(zfv, ctx)?;
    }
    if let Some(zfm) = message.segment("ZFM") {
        pmsi(zfm, ctx);
    }
    if let Some(zfd) = message.segment("ZFD") {
        patient_complement(zfd, ctx);
    }
    if let Some(zfc) = message.segment("ZFC") {
        coverage_complement(zfc, ctx);
    }
    Ok(())
}

// ============================================================================
// Targets
// ============================================================================

fn encounter_mut(ctx: &mut ConversionContext) -> Option<&mut Encounter> {
    match ctx.role_resource_mut(ResourceRole::PrimaryEncounter) {
        Some(Resource::Encounter(encounter)) => Some(encounter),
        _ => None,
    }
}

fn patient_mut(ctx: &mut ConversionContext) -> Option<&mut Patient> {
    match ctx.role_resource_mut(ResourceRole::Patient) {
        Some(Resource::Patient(patient)) => Some(patient),
        _ => None,
    }
}

fn coverage_mut(ctx: &mut ConversionContext) -> Option<&mut Coverage> {
    match ctx.role_resource_mut(ResourceRole::PrimaryCoverage) {
        Some(Resource::Coverage(coverage)) => Some(coverage),
        _ => None,
    }
}

/// Warns and returns `false` when `role` has no entry.
fn has_target(ctx: &mut ConversionContext, segment: &str, role: ResourceRole, target: &str) -> bool {
    if ctx.role(role).is_some() {
        return true;
    }
    ctx.warn(segment, None, format!("no {target} to enrich; segment ignored"));
    false
}

// ============================================================================
// ZBE: movement
// ============================================================================

fn movement(zbe: &Segment, ctx: &mut ConversionContext) -> ConversionResult<()> {
    if !has_target(ctx, "ZBE", ResourceRole::PrimaryEncounter, "Encounter") {
        return Ok(());
    }

    let identifier = zbe.field(1).first_repetition();
    let movement_id = identifier.component_value(1).map(|value| Identifier {
        use_type: Some(IdentifierUse::Secondary),
        system: identifier.component_value(3).and_then(oid_uri),
        value: Some(value.to_string()),
        ..Identifier::default()
    });

    let mut parts = Vec::new();
    if let Some(id) = &movement_id {
        parts.push(Extension::identifier("identifier", id.clone()));
    }
    if let Some(date) = zbe.value(2).and_then(|raw| to_fhir_datetime(raw, ctx.timezone())) {
        parts.push(Extension::date_time("movementDate", date));
    }
    if let Some(action) = zbe.value(4) {
        parts.push(Extension::code("action", action.to_ascii_uppercase()));
    }
    if let Some(historic) = zbe.value(5).and_then(yes_no) {
        parts.push(Extension::boolean("historicMovement", historic));
    }
    if let Some(trigger) = zbe.value(6) {
        parts.push(Extension::code("originalTrigger", trigger));
    }
    if let Some(code) = zbe.value(9) {
        let mut coding = Coding::new(CS_MOVEMENT_TYPE, code.to_ascii_uppercase());
        match ctx.terminology().lookup_movement_type(code) {
            Some(display) => coding.display = Some(display),
            None => ctx.warn("ZBE", Some(9), format!("unknown movement type '{code}'")),
        }
        parts.push(Extension::coding("movementType", coding));
    }

    let responsible_unit = organization_reference(ctx, zbe.field(7))?;
    if let Some(care_unit) = organization_reference(ctx, zbe.field(8))? {
        parts.push(Extension::reference("careUnit", care_unit));
    }

    if let Some(encounter) = encounter_mut(ctx) {
        if let Some(id) = movement_id {
            if !encounter.identifier.iter().any(|existing| existing.value == id.value) {
                encounter.identifier.push(id);
            }
        }
        if let Some(unit) = responsible_unit {
            encounter.service_provider = Some(unit);
        }
        if !parts.is_empty() {
            upsert_extension(&mut encounter.extension, Extension::nested(EXT_MOVEMENT, parts));
        }
    }
    Ok(())
}

// ============================================================================
// ZFP: socio-professional situation
// ============================================================================

fn socio_professional(zfp: &Segment, ctx: &mut ConversionContext) {
    let parts: Vec<Extension> = [(1, "activity"), (2, "category")]
        .into_iter()
        .filter_map(|(field, name)| zfp.value(field).map(|code| Extension::code(name, code)))
        .collect();
    if parts.is_empty() || !has_target(ctx, "ZFP", ResourceRole::Patient, "Patient") {
        return;
    }
    if let Some(patient) = patient_mut(ctx) {
        upsert_extension(&mut patient.extension, Extension::nested(EXT_SOCIO_PROFESSIONAL, parts));
    }
}

// ============================================================================
// ZFV: visit complement
// ============================================================================

fn visit_complement(zfv: &Segment, ctx: &mut ConversionContext) -> ConversionResult<()> {
    if !has_target(ctx, "ZFV", ResourceRole::PrimaryEncounter, "Encounter") {
        return Ok(());
    }

    // ZFV-1: establishment of origin (FINESS) ^ date of last stay
    let origin_field = zfv.field(1);
    let origin = match origin_field.component_value(1) {
        Some(finess) => {
            let organization = Organization {
                active: Some(true),
                identifier: vec![organization_identifier(finess, None)],
                ..Organization::default()
            };
            Some(Reference::to(ctx.organization(organization)?))
        }
        None => None,
    };
    let last_stay = origin_field.component_value(2).and_then(to_fhir_date);

    let care_mode = match zfv.value(11) {
        Some(code) => Some(match ctx.terminology().lookup_care_mode(code) {
            Some(concept) => Coding::new(concept.system, concept.code).with_display(concept.display),
            None => {
                ctx.warn("ZFV", Some(11), format!("unknown legal care mode '{code}'"));
                Coding {
                    code: Some(code.to_string()),
                    ..Coding::default()
                }
            }
        }),
        None => None,
    };
    let transport = zfv.value(2).map(str::to_string);

    if let Some(encounter) = encounter_mut(ctx) {
        if let Some(origin) = origin {
            encounter.hospitalization_mut().origin = Some(origin);
        }
        if let Some(date) = last_stay {
            upsert_extension(&mut encounter.extension, Extension::date(EXT_LAST_STAY_DATE, date));
        }
        if let Some(mode) = transport {
            upsert_extension(
                &mut encounter.extension,
                Extension::code(EXT_DISCHARGE_TRANSPORT_MODE, mode),
            );
        }
        if let Some(coding) = care_mode {
            upsert_extension(&mut encounter.extension, Extension::coding(EXT_CARE_MODE, coding));
        }
    }
    Ok(())
}

// ============================================================================
// ZFM: PMSI medical information
// ============================================================================

fn pmsi(zfm: &Segment, ctx: &mut ConversionContext) {
    if !has_target(ctx, "ZFM", ResourceRole::PrimaryEncounter, "Encounter") {
        return;
    }
    let code = |field: usize, system: &str| zfm.value(field).map(|code| Coding::new(system, code));
    let entry_mode = code(1, CS_PMSI_ENTRY_MODE);
    let exit_mode = code(2, CS_PMSI_EXIT_MODE);
    let origin = code(3, CS_PMSI_ORIGIN);
    let destination = code(4, CS_PMSI_DESTINATION);

    let parts: Vec<Extension> = [
        ("entryMode", &entry_mode),
        ("exitMode", &exit_mode),
        ("origin", &origin),
        ("destination", &destination),
    ]
    .into_iter()
    .filter_map(|(name, coding)| coding.clone().map(|coding| Extension::coding(name, coding)))
    .collect();
    if parts.is_empty() {
        return;
    }

    if let Some(encounter) = encounter_mut(ctx) {
        let hospitalization = encounter.hospitalization_mut();
        let admit: Vec<Coding> = entry_mode.into_iter().chain(origin).collect();
        if !admit.is_empty() {
            hospitalization.admit_source = Some(with_codings(hospitalization.admit_source.take(), admit));
        }
        let discharge: Vec<Coding> = exit_mode.into_iter().chain(destination).collect();
        if !discharge.is_empty() {
            hospitalization.discharge_disposition =
                Some(with_codings(hospitalization.discharge_disposition.take(), discharge));
        }
        upsert_extension(&mut encounter.extension, Extension::nested(EXT_PMSI, parts));
    }
}

/// PMSI codings go first; codings already mapped from PV1 are kept after them.
fn with_codings(existing: Option<CodeableConcept>, codings: Vec<Coding>) -> CodeableConcept {
    let mut concept = existing.unwrap_or_default();
    let previous = std::mem::replace(&mut concept.coding, codings);
    concept.coding.extend(previous);
    concept
}

// ============================================================================
// ZFD: patient complement
// ============================================================================

fn patient_complement(zfd: &Segment, ctx: &mut ConversionContext) {
    if !has_target(ctx, "ZFD", ResourceRole::Patient, "Patient") {
        return;
    }
    let lunar = zfd.field(1);
    let lunar_date = match (lunar.component_value(1), lunar.component_value(2), lunar.component_value(3)) {
        (None, None, None) => None,
        (day, month, year) => Some(format!(
            "{:0>4}-{:0>2}-{:0>2}",
            year.unwrap_or("0"),
            month.unwrap_or("0"),
            day.unwrap_or("0")
        )),
    };
    let sms = zfd.value(3).map(|raw| (raw, yes_no(raw)));
    if let Some((raw, None)) = sms {
        ctx.warn("ZFD", Some(3), format!("SMS consent '{raw}' is not a yes/no value"));
    }
    let collection_mode = zfd.value(5).map(str::to_string);

    if let Some(patient) = patient_mut(ctx) {
        if let Some(date) = lunar_date {
            upsert_extension(&mut patient.extension, Extension::string(EXT_LUNAR_DATE, date));
        }
        if let Some((_, Some(consent))) = sms {
            upsert_extension(&mut patient.extension, Extension::boolean(EXT_SMS_CONSENT, consent));
        }
        if let Some(mode) = collection_mode {
            upsert_extension(
                &mut patient.extension,
                Extension::code(EXT_IDENTITY_COLLECTION_MODE, mode),
            );
        }
    }
}

// ============================================================================
// ZFC: coverage complement
// ============================================================================

fn coverage_complement(zfc: &Segment, ctx: &mut ConversionContext) {
    let Some(raw) = zfc.value(1) else {
        return;
    };
    if !has_target(ctx, "ZFC", ResourceRole::PrimaryCoverage, "Coverage") {
        return;
    }
    let Some(full) = yes_no(raw) else {
        ctx.warn("ZFC", Some(1), format!("full-coverage flag '{raw}' is not a yes/no value"));
        return;
    };
    if let Some(coverage) = coverage_mut(ctx) {
        upsert_extension(&mut coverage.extension, Extension::boolean(EXT_FULL_COVERAGE, full));
    }
}
