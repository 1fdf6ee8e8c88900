//! Patient construction from PID, PD1 and MRG.
//!
//! Responsibilities:
//! - Identifiers (PID-2/3/4), names, telecoms, addresses and birth place
//! - Demographics: birth date, gender, marital status, language, multiple birth, death
//! - FR Core patient extensions: identity reliability, nationality, mother's maiden name
//! - Merge links (MRG-1) and the general practitioner (PD1-4)
//!
//! Every family shares this builder; the Patient is the first entry after the MessageHeader.

use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::handlers::common::{default_system, with_display};
use crate::resolvers::address::{addresses_from_field, birth_place_from_text};
use crate::resolvers::codes::{administrative_gender, codeable_concept, identity_reliability, marital_status, yes_no};
use crate::resolvers::datetime::{timestamp_digits, to_fhir_date, to_fhir_datetime};
use crate::resolvers::identifiers::{
    classify, dedupe, finalize_patient_identifiers, identifiers_from_field, RawIdentifier,
};
use crate::resolvers::names::{first_name, names_from_field, XPN};
use crate::resolvers::organizations::organization_from_xon;
use crate::resolvers::practitioners::practitioners_from_field;
use crate::resolvers::telecom::telecoms;
use fhir::fr_core::{
    CS_ISO_3166, CS_LANGUAGE, EXT_BIRTH_PLACE, EXT_IDENTITY_RELIABILITY, EXT_MOTHERS_MAIDEN_NAME,
    EXT_NATIONALITY,
};
use fhir::{
    upsert_extension, CodeableConcept, Extension, Patient, PatientCommunication, PatientLink,
    Reference, Resource,
};
use hl7v2::{ParsedMessage, Segment};

/// Builds the Patient from the message's PID and records it under [`ResourceRole::Patient`].
///
/// Returns the patient's `fullUrl`, or `None` (with a warning) when the message has no PID.
pub fn build_patient(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<Option<String>> {
    let Some(pid) = message.segment("PID") else {
        ctx.warn("PID", None, "message has no PID segment; no Patient created");
        return Ok(None);
    };

    let mut patient = Patient {
        active: Some(true),
        identifier: patient_identifiers(pid, ctx),
        name: names_from_field(pid.field(5)),
        telecom: telecoms(pid.field(13), pid.field(14)),
        birth_date: pid.value(7).and_then(to_fhir_date),
        gender: pid.value(8).and_then(administrative_gender),
        marital_status: pid.field(16).value().and_then(marital_status),
        ..Patient::default()
    };
    if pid.value(7).is_some() && patient.birth_date.is_none() {
        ctx.warn("PID", Some(7), "birth date is malformed; omitted");
    }

    let addresses = addresses_from_field(pid.field(11));
    patient.address = addresses.addresses;
    let birth_place = addresses
        .birth_place
        .or_else(|| pid.value(23).and_then(birth_place_from_text));
    if let Some(birth_place) = birth_place {
        upsert_extension(&mut patient.extension, Extension::address(EXT_BIRTH_PLACE, birth_place));
    }

    if let Some(maiden) = first_name(pid.field(6), XPN).and_then(|name| name.family) {
        upsert_extension(&mut patient.extension, Extension::string(EXT_MOTHERS_MAIDEN_NAME, maiden));
    }
    if let Some(language) = language(pid) {
        patient.communication.push(PatientCommunication {
            language,
            preferred: Some(true),
        });
    }
    apply_multiple_birth(pid, &mut patient);
    apply_death(pid, ctx, &mut patient);
    if let Some(nationality) = nationality(pid) {
        upsert_extension(&mut patient.extension, nationality);
    }
    if let Some(code) = pid.value(32) {
        match identity_reliability(code) {
            Some(status) => upsert_extension(
                &mut patient.extension,
                Extension::nested(EXT_IDENTITY_RELIABILITY, vec![Extension::coding("identityStatus", status)]),
            ),
            None => ctx.warn("PID", Some(32), format!("unknown identity reliability code '{code}'")),
        }
    }
    patient.link = merge_links(message);

    let full_url = ctx.add_with_role(ResourceRole::Patient, Resource::Patient(patient))?;
    ctx.add_focus(&full_url);
    attach_care_providers(message, ctx, &full_url)?;
    tracing::debug!("patient {} built from PID", full_url);
    Ok(Some(full_url))
}

fn patient_identifiers(pid: &Segment, ctx: &mut ConversionContext) -> Vec<fhir::Identifier> {
    let mut identifiers = identifiers_from_field(pid.field(3));
    identifiers.extend(identifiers_from_field(pid.field(2)));
    identifiers.extend(identifiers_from_field(pid.field(4)));
    let mut identifiers = dedupe(identifiers);
    let digits = ctx
        .message_time()
        .and_then(timestamp_digits)
        .map(str::to_string);
    finalize_patient_identifiers(&mut identifiers, digits.as_deref(), || ctx.temporary_value());
    identifiers
}

/// PID-15 primary language. A bare code is read as a BCP-47 tag.
fn language(pid: &Segment) -> Option<CodeableConcept> {
    let mut concept = codeable_concept(pid.field(15).first_repetition())?;
    default_system(&mut concept, CS_LANGUAGE);
    Some(concept)
}

/// PID-28 nationality as an ISO 3166 country code.
fn nationality(pid: &Segment) -> Option<Extension> {
    let mut concept = codeable_concept(pid.field(28).first_repetition())?;
    default_system(&mut concept, CS_ISO_3166);
    Some(Extension::nested(
        EXT_NATIONALITY,
        vec![Extension::codeable_concept("code", concept)],
    ))
}

/// PID-24 multiple birth indicator, refined by PID-25 birth order.
fn apply_multiple_birth(pid: &Segment, patient: &mut Patient) {
    let order = pid.value(25).and_then(|v| v.parse::<i64>().ok());
    match (pid.value(24).and_then(yes_no), order) {
        (Some(true), Some(order)) | (None, Some(order)) => patient.multiple_birth_integer = Some(order),
        (Some(flag), None) | (Some(flag @ false), Some(_)) => patient.multiple_birth_boolean = Some(flag),
        (None, None) => {}
    }
}

/// PID-29 death date/time wins over the PID-30 indicator.
fn apply_death(pid: &Segment, ctx: &mut ConversionContext, patient: &mut Patient) {
    if let Some(raw) = pid.value(29) {
        match to_fhir_datetime(raw, ctx.timezone()) {
            Some(when) => {
                patient.deceased_date_time = Some(when);
                return;
            }
            None => ctx.warn("PID", Some(29), "death date/time is malformed; omitted"),
        }
    }
    if let Some(flag) = pid.value(30).and_then(yes_no) {
        patient.deceased_boolean = Some(flag);
    }
}

/// MRG-1: identifiers the patient replaces after a merge.
fn merge_links(message: &ParsedMessage) -> Vec<PatientLink> {
    message
        .segments_of("MRG")
        .iter()
        .flat_map(|mrg| mrg.field(1).repetitions())
        .filter_map(RawIdentifier::from_cx)
        .map(|raw| PatientLink {
            other: Reference {
                identifier: Some(classify(&raw)),
                display: Some(raw.value),
                ..Reference::default()
            },
            link_type: "replaces".to_string(),
        })
        .collect()
}

/// PD1-4 general practitioners and PD1-3 primary facility.
fn attach_care_providers(message: &ParsedMessage, ctx: &mut ConversionContext, patient_url: &str) -> ConversionResult<()> {
    let Some(pd1) = message.segment("PD1") else {
        return Ok(());
    };
    let mut references = Vec::new();
    for practitioner in practitioners_from_field(pd1.field(4)) {
        let display = practitioner.display();
        let full_url = ctx.practitioner(practitioner)?;
        references.push(with_display(Reference::to(full_url), display));
    }
    if let Some(facility) = organization_from_xon(pd1.field(3).first_repetition()) {
        let display = facility.name.clone();
        let full_url = ctx.organization(facility)?;
        references.push(with_display(Reference::to(full_url), display));
    }
    if let Some(Resource::Patient(patient)) = ctx.resource_mut(patient_url) {
        patient.general_practitioner.extend(references);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::{convert, message, resources};
    use fhir::fr_core::{OID_INS_NIR, OID_IPP, SYSTEM_TEMPORARY};
    use fhir::{AdministrativeGender, Coding, IdentifierUse, ResourceType};

    const MSH: &str = "MSH|^~\\&|SIH|CHU|DPI|CHU|20250115103000||ADT^A28|MSG1|P|2.5";

    fn identity_status(patient: &Patient) -> Option<&Coding> {
        fhir::find_extension(&patient.extension, EXT_IDENTITY_RELIABILITY)?
            .extension
            .iter()
            .find(|e| e.url == "identityStatus")?
            .value_coding
            .as_ref()
    }

    fn patient(raw: &str) -> Patient {
        let outcome = convert(raw);
        match resources(&outcome, ResourceType::Patient).first() {
            Some(Resource::Patient(patient)) => patient.clone(),
            other => panic!("unexpected patient entry: {other:?}"),
        }
    }

    #[test]
    fn builds_demographics() {
        let raw = message(&[
            MSH,
            "PID|||123456^^^HOSP^PI||DUPONT^JEAN^^^M.^^L~MARTIN^^^^^^M|BERNARD|19800101|M|||1 RUE DE LA PAIX^^PARIS^^75001^FRA^H~^^LYON^^^^BDL^^69123||0123456789^PRN^PH|||M||||||||||||FRA||N||VALI",
        ]);
        let patient = patient(&raw);
        assert_eq!(patient.birth_date.as_deref(), Some("1980-01-01"));
        assert_eq!(patient.gender, Some(AdministrativeGender::Male));
        assert_eq!(patient.name.len(), 2);
        assert_eq!(patient.address.len(), 1);
        assert!(fhir::find_extension(&patient.extension, EXT_BIRTH_PLACE).is_some());
        assert_eq!(
            fhir::find_extension(&patient.extension, EXT_MOTHERS_MAIDEN_NAME)
                .and_then(|e| e.value_string.as_deref()),
            Some("BERNARD")
        );
        assert_eq!(identity_status(&patient).and_then(|c| c.code.as_deref()), Some("VALI"));
        assert_eq!(patient.deceased_boolean, Some(false));
        assert!(patient.identifier.iter().any(|id| id.system.as_deref() == Some(OID_IPP)));
    }

    #[test]
    fn national_identifier_gets_a_derived_ipp() {
        let raw = message(&[MSH, "PID|||180017512345678^^^INS-NIR^NH||DURAND^MARIE||19800101|F"]);
        let patient = patient(&raw);
        let national = patient
            .identifier
            .iter()
            .find(|id| id.system.as_deref() == Some(OID_INS_NIR))
            .expect("national identifier");
        assert_eq!(national.use_type, Some(IdentifierUse::Official));
        let ipp = patient
            .identifier
            .iter()
            .find(|id| id.system.as_deref() == Some(OID_IPP))
            .expect("derived IPP");
        assert_eq!(ipp.value.as_deref(), Some("18001751103000"));
    }

    #[test]
    fn missing_identifiers_get_a_temporary_one() {
        let patient = patient(&message(&[MSH, "PID|||||DOE^JOHN"]));
        assert_eq!(patient.identifier.len(), 1);
        assert_eq!(patient.identifier[0].system.as_deref(), Some(SYSTEM_TEMPORARY));
        assert_eq!(patient.identifier[0].use_type, Some(IdentifierUse::Temp));
    }

    #[test]
    fn death_and_multiple_birth() {
        let raw = message(&[
            MSH,
            "PID|||1^^^HOSP^PI||DOE^JOHN||19500101|M||||||||||||||||Y|2||||20240101120000|Y",
        ]);
        let patient = patient(&raw);
        assert_eq!(patient.multiple_birth_integer, Some(2));
        assert_eq!(patient.deceased_date_time.as_deref(), Some("2024-01-01T12:00:00+01:00"));
        assert_eq!(patient.deceased_boolean, None);
    }

    #[test]
    fn merge_creates_replaces_link() {
        let raw = message(&[
            MSH.replace("ADT^A28", "ADT^A40").as_str(),
            "PID|||1^^^HOSP^PI||DOE^JOHN",
            "MRG|999^^^HOSP^PI",
        ]);
        let patient = patient(&raw);
        assert_eq!(patient.link.len(), 1);
        assert_eq!(patient.link[0].link_type, "replaces");
        assert_eq!(patient.link[0].other.display.as_deref(), Some("999"));
    }

    #[test]
    fn general_practitioner_from_pd1() {
        let raw = message(&[MSH, "PID|||1^^^HOSP^PI||DOE^JOHN", "PD1|||CABINET^^^^^^^^^123456789|10003456789^MEDECIN^ALICE"]);
        let outcome = convert(&raw);
        let patient = match resources(&outcome, ResourceType::Patient).first() {
            Some(Resource::Patient(p)) => (*p).clone(),
            other => panic!("unexpected patient entry: {other:?}"),
        };
        assert_eq!(patient.general_practitioner.len(), 2);
        assert_eq!(resources(&outcome, ResourceType::Practitioner).len(), 1);
    }

    #[test]
    fn no_pid_means_no_patient() {
        let outcome = convert(&message(&[MSH, "EVN|A28|20250115"]));
        assert!(resources(&outcome, ResourceType::Patient).is_empty());
        assert!(outcome.warnings.iter().any(|w| w.segment == "PID"));
    }
}
