//! Coded-element resolution and the fixed HL7 to FHIR code tables.
//!
//! Responsibilities:
//! - Map HL7 coding-system names (`LN`, `SCT`, `CCAM`, `HL70203`, OIDs, ...) to FHIR system URIs
//! - Turn `CE`/`CWE` values into `CodeableConcept`
//! - Hold the small closed tables (gender, marital status, patient class, priorities, statuses)

use fhir::fr_core::{
    CS_CCAM, CS_CIM10, CS_DISCHARGE_DISPOSITION, CS_IDENTITY_RELIABILITY, CS_LOINC,
    CS_NULL_FLAVOR, CS_SNOMED, CS_SUBSCRIBER_RELATIONSHIP, CS_UCUM, CS_V3_ACT_CODE,
    CS_V3_MARITAL_STATUS,
};
use fhir::{
    AdministrativeGender, AppointmentStatus, CodeableConcept, Coding, EncounterStatus,
    ObservationStatus, RequestPriority, RequestStatus,
};
use hl7v2::FieldValue;

// ============================================================================
// Coding systems and coded elements
// ============================================================================

fn is_oid(value: &str) -> bool {
    !value.is_empty()
        && value.contains('.')
        && value.split('.').all(|arc| !arc.is_empty() && arc.bytes().all(|b| b.is_ascii_digit()))
}

/// Normalises a bare OID or `urn:oid:` URI to `urn:oid:<oid>`. Returns `None` for non-OIDs.
pub fn oid_uri(value: &str) -> Option<String> {
    let value = value.trim();
    let bare = value.strip_prefix("urn:oid:").unwrap_or(value);
    is_oid(bare).then(|| format!("urn:oid:{bare}"))
}

/// Maps an HL7 coding-system name to a FHIR system URI.
pub fn coding_system_uri(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    if let Some(uri) = oid_uri(name) {
        return Some(uri);
    }
    if name.contains("://") || name.starts_with("urn:") {
        return Some(name.to_string());
    }
    let upper = name.to_ascii_uppercase();
    let known = match upper.as_str() {
        "LN" | "LOINC" => Some(CS_LOINC),
        "SCT" | "SNM" | "SNOMED" | "SNOMEDCT" => Some(CS_SNOMED),
        "CCAM" => Some(CS_CCAM),
        "CIM10" | "CIM-10" | "I10" | "ICD10" => Some(CS_CIM10),
        "UCUM" | "ISO+" => Some(CS_UCUM),
        _ => None,
    };
    if let Some(uri) = known {
        return Some(uri.to_string());
    }
    // HL7 tables: HL70203 / HL7203 / HL70001
    upper
        .strip_prefix("HL7")
        .filter(|table| !table.is_empty() && table.bytes().all(|b| b.is_ascii_digit()))
        .map(|table| {
            format!(
                "http://terminology.hl7.org/CodeSystem/v2-{:0>4}",
                table.trim_start_matches('0')
            )
        })
}

/// `CE`/`CWE` (first repetition) to a concept: primary triplet, alternate triplet, then text.
pub fn codeable_concept(value: &FieldValue) -> Option<CodeableConcept> {
    let mut concept = CodeableConcept::default();
    for (code, display, system) in [(1, 2, 3), (4, 5, 6)] {
        if let Some(code) = value.component_value(code) {
            concept.coding.push(Coding {
                system: value.component_value(system).and_then(coding_system_uri),
                code: Some(code.to_string()),
                display: value.component_value(display).map(str::to_string),
            });
        }
    }
    let text = value
        .component_value(2)
        .or_else(|| value.component_value(9))
        .map(str::to_string);
    if concept.coding.is_empty() {
        concept.text = text;
    } else if value.component_value(9).is_some() {
        concept.text = value.component_value(9).map(str::to_string);
    }
    (!concept.coding.is_empty() || concept.text.is_some()).then_some(concept)
}

/// A bare code under a fixed system, for `IS`/`ID` fields bound to an HL7 table.
pub fn coded(system: &str, code: &str, display: Option<&str>) -> CodeableConcept {
    let mut coding = Coding::new(system, code);
    coding.display = display.map(str::to_string);
    CodeableConcept::from_coding(coding)
}

/// Y/N indicator (also accepts 1/0 and O/N for French sources).
pub fn yes_no(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "Y" | "YES" | "O" | "OUI" | "1" | "TRUE" => Some(true),
        "N" | "NO" | "NON" | "0" | "FALSE" => Some(false),
        _ => None,
    }
}

// ============================================================================
// Demographics
// ============================================================================

/// HL7 table 0001 to administrative gender.
pub fn administrative_gender(code: &str) -> Option<AdministrativeGender> {
    match code.trim().to_ascii_uppercase().as_str() {
        "M" => Some(AdministrativeGender::Male),
        "F" => Some(AdministrativeGender::Female),
        "O" | "A" => Some(AdministrativeGender::Other),
        "U" | "N" => Some(AdministrativeGender::Unknown),
        _ => None,
    }
}

/// HL7 table 0002 to the v3 marital status system.
pub fn marital_status(code: &str) -> Option<CodeableConcept> {
    let (system, code, display) = match code.trim().to_ascii_uppercase().as_str() {
        "M" => (CS_V3_MARITAL_STATUS, "M", "Married"),
        "S" => (CS_V3_MARITAL_STATUS, "S", "Never Married"),
        "D" => (CS_V3_MARITAL_STATUS, "D", "Divorced"),
        "W" => (CS_V3_MARITAL_STATUS, "W", "Widowed"),
        "A" | "L" => (CS_V3_MARITAL_STATUS, "L", "Legally Separated"),
        "C" | "G" | "P" | "T" => (CS_V3_MARITAL_STATUS, "T", "Domestic partner"),
        "I" => (CS_V3_MARITAL_STATUS, "I", "Interlocutory"),
        "B" | "U" => (CS_V3_MARITAL_STATUS, "U", "unmarried"),
        "O" | "UNK" => (CS_NULL_FLAVOR, "UNK", "unknown"),
        _ => return None,
    };
    Some(coded(system, code, Some(display)))
}

/// PID-32 identity reliability code to its display.
pub fn identity_reliability(code: &str) -> Option<Coding> {
    let (code, display) = match code.trim().to_ascii_uppercase().as_str() {
        "VIDE" => ("VIDE", "Identité non renseignée"),
        "PROV" => ("PROV", "Identité provisoire"),
        "VALI" => ("VALI", "Identité validée"),
        "DOUTE" | "DOUT" => ("DOUTE", "Identité douteuse"),
        "FICTI" | "FICT" => ("FICTI", "Identité fictive"),
        _ => return None,
    };
    Some(Coding::new(CS_IDENTITY_RELIABILITY, code).with_display(display))
}

/// IN1-17 insured's relationship to patient.
pub fn subscriber_relationship(code: &str) -> Coding {
    let code = match code.trim().to_ascii_uppercase().as_str() {
        "01" | "SEL" | "SELF" => "self",
        "02" | "SPO" | "SPOUSE" => "spouse",
        "03" | "CHD" | "CHILD" => "child",
        "DOM" | "PAR" => "common",
        _ => "other",
    };
    Coding::new(CS_SUBSCRIBER_RELATIONSHIP, code)
}

// ============================================================================
// Encounters
// ============================================================================

/// PV1-2 patient class to the v3 ActCode encounter class.
///
/// Unknown or blank classes default to inpatient for admissions and ambulatory otherwise.
pub fn encounter_class(patient_class: Option<&str>, event: &str) -> Coding {
    let (code, display) = match patient_class.map(|c| c.trim().to_ascii_uppercase()).as_deref() {
        Some("I") => ("IMP", "inpatient encounter"),
        Some("O") => ("AMB", "ambulatory"),
        Some("E") => ("EMER", "emergency"),
        Some("P") => ("PRENC", "pre-admission"),
        Some("R") => ("SS", "short stay"),
        Some("H") => ("HH", "home health"),
        _ if event == "A01" => ("IMP", "inpatient encounter"),
        _ => ("AMB", "ambulatory"),
    };
    Coding::new(CS_V3_ACT_CODE, code).with_display(display)
}

/// Encounter status from the triggering event, then from discharge evidence.
pub fn encounter_status(event: &str, discharged: bool) -> EncounterStatus {
    match event {
        "A03" => EncounterStatus::Finished,
        "A11" | "A38" => EncounterStatus::Cancelled,
        "A05" | "A14" => EncounterStatus::Planned,
        "A21" => EncounterStatus::Onleave,
        "A13" | "A22" => EncounterStatus::InProgress,
        _ if discharged => EncounterStatus::Finished,
        _ => EncounterStatus::InProgress,
    }
}

/// PV1-36 codes listed in HL7 table 0112, with their FHIR discharge-disposition counterpart.
fn known_discharge_disposition(code: &str) -> Option<(&'static str, &'static str)> {
    let entry = match code.trim().to_ascii_uppercase().as_str() {
        "01" | "HOME" => ("home", "Home"),
        "02" | "05" | "OTHER-HCF" => ("other-hcf", "Other healthcare facility"),
        "03" | "SNF" => ("snf", "Skilled nursing facility"),
        "04" | "LONG" => ("long", "Long-term care"),
        "06" | "HOSP" => ("hosp", "Hospice"),
        "07" | "AADVICE" => ("aadvice", "Left against advice"),
        "20" | "EXP" => ("exp", "Expired"),
        "09" | "PSY" => ("psy", "Psychiatric hospital"),
        "REHAB" => ("rehab", "Rehabilitation"),
        _ => return None,
    };
    Some(entry)
}

/// Whether a PV1-36 code is a recognised discharge disposition, i.e. evidence the stay ended.
pub fn is_discharge_disposition(code: &str) -> bool {
    known_discharge_disposition(code).is_some()
}

/// PV1-36 discharge disposition (HL7 table 0112) to the FHIR discharge-disposition system.
pub fn discharge_disposition(code: &str) -> Option<CodeableConcept> {
    if code.trim().is_empty() {
        return None;
    }
    let (fhir_code, display) = known_discharge_disposition(code).unwrap_or(("oth", "Other"));
    let mut concept = coded(CS_DISCHARGE_DISPOSITION, fhir_code, Some(display));
    concept.text = Some(code.trim().to_string());
    Some(concept)
}

// ============================================================================
// Orders and results
// ============================================================================

/// Priority codes (`TQ1-9`, `TQ-6`, `OBR-5`).
pub fn request_priority(code: &str) -> Option<RequestPriority> {
    match code.trim().to_ascii_uppercase().as_str() {
        "S" => Some(RequestPriority::Stat),
        "A" => Some(RequestPriority::Asap),
        "R" | "T" => Some(RequestPriority::Routine),
        "P" | "C" => Some(RequestPriority::Urgent),
        _ => None,
    }
}

/// ORC-5 order status (HL7 table 0038).
pub fn order_status(code: &str) -> Option<RequestStatus> {
    match code.trim().to_ascii_uppercase().as_str() {
        "A" | "IP" | "SC" => Some(RequestStatus::Active),
        "CM" => Some(RequestStatus::Completed),
        "CA" | "DC" | "RP" => Some(RequestStatus::Revoked),
        "HD" => Some(RequestStatus::OnHold),
        "ER" => Some(RequestStatus::EnteredInError),
        _ => None,
    }
}

/// ORC-1 order control (HL7 table 0119), used when ORC-5 is blank.
pub fn order_control_status(code: &str) -> Option<RequestStatus> {
    match code.trim().to_ascii_uppercase().as_str() {
        "NW" | "RL" | "XO" | "SC" | "RE" | "OK" | "SN" => Some(RequestStatus::Active),
        "CA" | "OC" | "DC" | "OD" | "CR" => Some(RequestStatus::Revoked),
        "HD" | "OH" => Some(RequestStatus::OnHold),
        "CM" => Some(RequestStatus::Completed),
        _ => None,
    }
}

/// OBX-11 result status (HL7 table 0085).
pub fn observation_status(code: &str) -> ObservationStatus {
    match code.trim().to_ascii_uppercase().as_str() {
        "P" | "S" => ObservationStatus::Preliminary,
        "C" => ObservationStatus::Corrected,
        "X" => ObservationStatus::Cancelled,
        "D" | "W" => ObservationStatus::EnteredInError,
        "R" | "I" => ObservationStatus::Registered,
        "A" => ObservationStatus::Amended,
        _ => ObservationStatus::Final,
    }
}

// ============================================================================
// Scheduling
// ============================================================================

/// Appointment status from the SIU triggering event.
pub fn appointment_status(event: &str) -> AppointmentStatus {
    match event {
        "S12" | "S13" | "S14" => AppointmentStatus::Booked,
        "S15" | "S16" => AppointmentStatus::Cancelled,
        "S17" => AppointmentStatus::EnteredInError,
        "S26" => AppointmentStatus::Noshow,
        _ => AppointmentStatus::Proposed,
    }
}
