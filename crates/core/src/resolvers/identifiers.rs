//! Identifier classification (`CX`, `XCN`, `HD`/`XON`).
//!
//! Responsibilities:
//! - Split a repeated identifier field into `(value, type code, authority name, authority OID)`
//! - Classify each entry as national (INS), internal (IPP), explicit-OID or generic
//! - Deduplicate by `(system, value)` and apply the patient post-processing rules
//! - Classify practitioner (RPPS/ADELI) and organization (FINESS) identifiers
//!
//! Classification is idempotent: feeding a produced [`Identifier`] back through
//! [`RawIdentifier::from_identifier`] and [`classify`] yields the same identifier.

use crate::constants::{INTERNAL_AUTHORITIES, IPP_TYPE_CODE};
use crate::resolvers::codes::oid_uri;
use fhir::fr_core::{
    CS_FR_V2_0203, CS_V2_0203, OID_FINESS, OID_INS_C, OID_INS_NIA, OID_INS_NIA_TEST, OID_INS_NIR,
    OID_INS_NIR_TEST, OID_IPP, OID_PRACTITIONER, SYSTEM_TEMPORARY,
};
use fhir::{CodeableConcept, Coding, Identifier, IdentifierUse, Reference};
use hl7v2::FieldValue;
use std::collections::HashSet;

// ============================================================================
// Raw identifiers
// ============================================================================

/// The parts of an HL7 identifier relevant to classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawIdentifier {
    pub value: String,
    pub type_code: Option<String>,
    pub authority_name: Option<String>,
    /// Always in `urn:oid:` form.
    pub authority_oid: Option<String>,
}

impl RawIdentifier {
    /// Reads one `CX` repetition: CX-1 value, CX-4.1/4.2 authority, CX-5 type.
    pub fn from_cx(cx: &FieldValue) -> Option<Self> {
        Self::from_parts(
            cx.component_value(1)?,
            cx.component_value(5),
            cx.subcomponent(4, 1).value(),
            cx.subcomponent(4, 2).value(),
        )
    }

    /// Reads one `XCN` repetition: XCN-1 value, XCN-9.1/9.2 authority, XCN-13 type.
    pub fn from_xcn(xcn: &FieldValue) -> Option<Self> {
        Self::from_parts(
            xcn.component_value(1)?,
            xcn.component_value(13),
            xcn.subcomponent(9, 1).value(),
            xcn.subcomponent(9, 2).value(),
        )
    }

    fn from_parts(
        value: &str,
        type_code: Option<&str>,
        namespace: Option<&str>,
        universal_id: Option<&str>,
    ) -> Option<Self> {
        let authority_oid = universal_id.and_then(oid_uri);
        let authority_name = namespace
            .or(universal_id.filter(|_| authority_oid.is_none()))
            .map(str::to_string);
        Some(Self {
            value: value.to_string(),
            type_code: type_code.map(str::to_string),
            authority_name,
            authority_oid,
        })
    }

    /// Recovers the classification inputs from an already-produced identifier.
    pub fn from_identifier(identifier: &Identifier) -> Option<Self> {
        let value = identifier.value.as_deref()?.to_string();
        let system = identifier.system.as_deref();
        let authority_oid = system.and_then(oid_uri);
        let authority_name = system
            .filter(|_| authority_oid.is_none())
            .map(str::to_string)
            .or_else(|| {
                identifier
                    .assigner
                    .as_ref()
                    .and_then(|a| a.display.clone())
            });
        Some(Self {
            value,
            type_code: identifier.type_code().map(str::to_string),
            authority_name,
            authority_oid,
        })
    }
}

// ============================================================================
// Classification
// ============================================================================

/// National health identifier variants, each bound to one OID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NationalKind {
    Nir,
    C,
    Nia,
    NirTest,
    NiaTest,
}

impl NationalKind {
    pub fn oid(self) -> &'static str {
        match self {
            NationalKind::Nir => OID_INS_NIR,
            NationalKind::C => OID_INS_C,
            NationalKind::Nia => OID_INS_NIA,
            NationalKind::NirTest => OID_INS_NIR_TEST,
            NationalKind::NiaTest => OID_INS_NIA_TEST,
        }
    }

    pub fn type_code(self) -> &'static str {
        match self {
            NationalKind::Nir => "INS-NIR",
            NationalKind::C => "INS-C",
            NationalKind::Nia => "INS-NIA",
            NationalKind::NirTest => "INS-NIR-TEST",
            NationalKind::NiaTest => "INS-NIA-TEST",
        }
    }

    fn from_oid(oid: &str) -> Option<Self> {
        [
            NationalKind::Nir,
            NationalKind::C,
            NationalKind::Nia,
            NationalKind::NirTest,
            NationalKind::NiaTest,
        ]
        .into_iter()
        .find(|kind| kind.oid() == oid)
    }

    fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim().to_ascii_uppercase().as_str() {
            "INS" | "INS-NIR" | "INS-A" | "NIR" => Some(NationalKind::Nir),
            "INS-C" => Some(NationalKind::C),
            "INS-NIA" | "NIA" => Some(NationalKind::Nia),
            "INS-NIR-TEST" => Some(NationalKind::NirTest),
            "INS-NIA-TEST" => Some(NationalKind::NiaTest),
            _ => None,
        }
    }
}

/// Outcome of [`classify_kind`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IdentifierKind {
    National(NationalKind),
    Internal,
    ExplicitOid(String),
    Generic,
}

fn is_ins_like(authority: &str) -> bool {
    let upper = authority.to_ascii_uppercase();
    upper.contains("INS") || upper.contains("NIR")
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// Decides the kind of a raw identifier.
pub fn classify_kind(raw: &RawIdentifier) -> IdentifierKind {
    if let Some(kind) = raw.authority_oid.as_deref().and_then(NationalKind::from_oid) {
        return IdentifierKind::National(kind);
    }
    let marker = raw
        .authority_name
        .as_deref()
        .and_then(NationalKind::from_marker)
        .or_else(|| raw.type_code.as_deref().and_then(NationalKind::from_marker));
    if let Some(kind) = marker {
        return IdentifierKind::National(kind);
    }
    if all_digits(&raw.value, 15) && raw.authority_name.as_deref().is_some_and(is_ins_like) {
        return IdentifierKind::National(NationalKind::Nir);
    }

    let type_code = raw.type_code.as_deref().map(str::to_ascii_uppercase);
    let internal_type = matches!(type_code.as_deref(), None | Some("PI") | Some("NH"));
    let internal_authority = raw
        .authority_name
        .as_deref()
        .is_some_and(|a| INTERNAL_AUTHORITIES.iter().any(|i| i.eq_ignore_ascii_case(a)));
    if internal_type || internal_authority {
        return IdentifierKind::Internal;
    }

    match &raw.authority_oid {
        Some(oid) => IdentifierKind::ExplicitOid(oid.clone()),
        None => IdentifierKind::Generic,
    }
}

fn type_concept(system: &str, code: &str) -> CodeableConcept {
    CodeableConcept::from_coding(Coding::new(system, code))
}

fn national_identifier(kind: NationalKind, value: &str) -> Identifier {
    Identifier {
        use_type: Some(IdentifierUse::Official),
        identifier_type: Some(type_concept(CS_FR_V2_0203, kind.type_code())),
        ..Identifier::new(kind.oid(), value)
    }
}

/// An internal patient identifier (IPP) under the canonical internal OID.
pub fn internal_identifier(value: &str) -> Identifier {
    Identifier {
        use_type: Some(IdentifierUse::Usual),
        identifier_type: Some(type_concept(CS_V2_0203, IPP_TYPE_CODE)),
        ..Identifier::new(OID_IPP, value)
    }
}

fn is_uri_like(value: &str) -> bool {
    value.contains(':')
}

/// Classifies one raw identifier into a FHIR identifier.
pub fn classify(raw: &RawIdentifier) -> Identifier {
    let declared_type = raw
        .type_code
        .as_deref()
        .map(|code| type_concept(CS_V2_0203, code));
    match classify_kind(raw) {
        IdentifierKind::National(kind) => national_identifier(kind, &raw.value),
        IdentifierKind::Internal => internal_identifier(&raw.value),
        IdentifierKind::ExplicitOid(oid) => Identifier {
            identifier_type: declared_type,
            ..Identifier::new(oid, raw.value.clone())
        },
        IdentifierKind::Generic => generic_identifier(raw),
    }
}

/// Drops identifiers whose `(system, value)` pair was already seen, keeping the first.
pub fn dedupe(identifiers: Vec<Identifier>) -> Vec<Identifier> {
    let mut seen = HashSet::new();
    identifiers
        .into_iter()
        .filter(|id| seen.insert((id.system.clone(), id.value.clone())))
        .collect()
}

// ============================================================================
// Patient identifiers
// ============================================================================

/// Classifies every repetition of a `CX` field (PID-3, PID-2, PID-4, MRG-1, ...).
pub fn identifiers_from_field(field: &FieldValue) -> Vec<Identifier> {
    dedupe(
        field
            .repetitions()
            .filter_map(RawIdentifier::from_cx)
            .map(|raw| classify(&raw))
            .collect(),
    )
}

pub fn is_national(identifier: &Identifier) -> bool {
    identifier
        .system
        .as_deref()
        .is_some_and(fhir::fr_core::is_national_identifier_system)
}

pub fn is_internal(identifier: &Identifier) -> bool {
    identifier.system.as_deref() == Some(OID_IPP)
}

/// Applies the patient post-processing rules in place.
///
/// - No identifier at all: one temporary identifier carrying `temporary_value`.
/// - A national identifier without any internal one: an IPP built from the first 8 digits of the
///   national value and the last 6 digits of `timestamp_digits` (`000000` when absent). The
///   derivation is not collision-free.
pub fn finalize_patient_identifiers(
    identifiers: &mut Vec<Identifier>,
    timestamp_digits: Option<&str>,
    temporary_value: impl FnOnce() -> String,
) {
    if identifiers.is_empty() {
        identifiers.push(Identifier {
            use_type: Some(IdentifierUse::Temp),
            ..Identifier::new(SYSTEM_TEMPORARY, temporary_value())
        });
        return;
    }
    if identifiers.iter().any(is_internal) {
        return;
    }
    let Some(national) = identifiers.iter().find(|id| is_national(id)) else {
        return;
    };
    let prefix: String = national
        .value
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .take(8)
        .collect();
    let suffix = timestamp_digits
        .and_then(|digits| digits.get(digits.len().checked_sub(6)?..))
        .filter(|tail| tail.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or("000000");
    identifiers.push(internal_identifier(&format!("{prefix}{suffix}")));
}

// ============================================================================
// Practitioner and organization identifiers
// ============================================================================

/// Classifies an `XCN` identifier: RPPS (11 digits) and ADELI (9 digits) go under the national
/// practitioner OID, anything else keeps its authority.
pub fn practitioner_identifier(raw: &RawIdentifier) -> Identifier {
    let marker = |needle: &str| {
        raw.type_code.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(needle))
            || raw
                .authority_name
                .as_deref()
                .is_some_and(|a| a.to_ascii_uppercase().contains(needle))
    };
    let registry = if marker("RPPS") || (all_digits(&raw.value, 11) && !marker("ADELI")) {
        Some("RPPS")
    } else if marker("ADELI") || all_digits(&raw.value, 9) {
        Some("ADELI")
    } else {
        None
    };
    match registry {
        Some(code) => Identifier {
            use_type: Some(IdentifierUse::Official),
            identifier_type: Some(type_concept(CS_FR_V2_0203, code)),
            ..Identifier::new(OID_PRACTITIONER, raw.value.clone())
        },
        None => match &raw.authority_oid {
            Some(oid) => Identifier {
                identifier_type: raw
                    .type_code
                    .as_deref()
                    .map(|code| type_concept(CS_V2_0203, code)),
                ..Identifier::new(oid.clone(), raw.value.clone())
            },
            None => generic_identifier(raw),
        },
    }
}

/// Keeps the declared type; a URI authority becomes the system, any other the assigner.
fn generic_identifier(raw: &RawIdentifier) -> Identifier {
    let authority = raw.authority_name.as_deref();
    Identifier {
        identifier_type: raw
            .type_code
            .as_deref()
            .map(|code| type_concept(CS_V2_0203, code)),
        system: authority.filter(|a| is_uri_like(a)).map(str::to_string),
        value: Some(raw.value.clone()),
        assigner: authority.filter(|a| !is_uri_like(a)).map(|a| {
            Box::new(Reference {
                display: Some(a.to_string()),
                ..Reference::default()
            })
        }),
        ..Identifier::default()
    }
}

/// Classifies an organization identifier (`HD` universal id or `XON-10`).
///
/// A 9-digit value is a FINESS number; an OID value or authority is kept verbatim.
pub fn organization_identifier(value: &str, authority: Option<&str>) -> Identifier {
    let value = value.trim();
    if all_digits(value, 9) {
        return Identifier {
            use_type: Some(IdentifierUse::Official),
            identifier_type: Some(type_concept(CS_FR_V2_0203, "FINEG")),
            ..Identifier::new(OID_FINESS, value)
        };
    }
    if let Some(oid) = authority.and_then(oid_uri) {
        return Identifier::new(oid, value);
    }
    if let Some(oid) = oid_uri(value) {
        return Identifier::new(SYSTEM_TEMPORARY, oid);
    }
    Identifier {
        value: Some(value.to_string()),
        assigner: authority.map(|a| {
            Box::new(Reference {
                display: Some(a.to_string()),
                ..Reference::default()
            })
        }),
        ..Identifier::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> FieldValue {
        FieldValue::from(text)
    }

    fn cx(value: &str, authority: FieldValue, type_code: &str) -> FieldValue {
        FieldValue::Composite(vec![s(value), s(""), s(""), authority, s(type_code)])
    }

    fn hd(namespace: &str, oid: &str) -> FieldValue {
        FieldValue::Composite(vec![s(namespace), s(oid), s("ISO")])
    }

    fn raw(value: &str, type_code: Option<&str>, name: Option<&str>, oid: Option<&str>) -> RawIdentifier {
        RawIdentifier {
            value: value.into(),
            type_code: type_code.map(Into::into),
            authority_name: name.map(Into::into),
            authority_oid: oid.map(Into::into),
        }
    }

    #[test]
    fn fifteen_digits_under_ins_authority_is_national() {
        let id = classify(&raw("180017512345678", None, Some("ASIP-SANTE-INS"), None));
        assert_eq!(id.system.as_deref(), Some(OID_INS_NIR));
        assert_eq!(id.use_type, Some(IdentifierUse::Official));
        assert_eq!(id.type_code(), Some("INS-NIR"));
    }

    #[test]
    fn markers_select_national_variant() {
        assert_eq!(
            classify(&raw("123", Some("INS-C"), None, None)).system.as_deref(),
            Some(OID_INS_C)
        );
        assert_eq!(
            classify(&raw("123", None, Some("INS-NIA"), None)).system.as_deref(),
            Some(OID_INS_NIA)
        );
    }

    #[test]
    fn pi_and_blank_type_are_internal() {
        for id in [
            classify(&raw("12345", Some("PI"), Some("HOSP"), None)),
            classify(&raw("12345", None, None, Some("urn:oid:1.2.3"))),
            classify(&raw("12345", Some("MR"), Some("IPP"), None)),
        ] {
            assert_eq!(id.system.as_deref(), Some(OID_IPP));
            assert_eq!(id.type_code(), Some("PI"));
            assert_eq!(id.use_type, Some(IdentifierUse::Usual));
        }
    }

    #[test]
    fn explicit_oid_is_kept_verbatim() {
        let id = classify(&raw("A1", Some("AN"), None, Some("urn:oid:1.2.250.99")));
        assert_eq!(id.system.as_deref(), Some("urn:oid:1.2.250.99"));
        assert_eq!(id.type_code(), Some("AN"));
        let id = classify(&raw("A1", Some("AN"), None, Some("urn:oid:1.2.250.1.213.1.4.8")));
        assert_eq!(id.type_code(), Some("INS-NIR"));
    }

    #[test]
    fn generic_keeps_declared_type_and_authority() {
        let id = classify(&raw("SS-9", Some("SS"), Some("CPAM"), None));
        assert_eq!(id.system, None);
        assert_eq!(id.type_code(), Some("SS"));
        assert_eq!(
            id.assigner.as_ref().and_then(|a| a.display.as_deref()),
            Some("CPAM")
        );
        let id = classify(&raw("X", Some("MR"), Some("http://example.org/mrn"), None));
        assert_eq!(id.system.as_deref(), Some("http://example.org/mrn"));
    }

    #[test]
    fn classification_is_idempotent() {
        let inputs = [
            raw("180017512345678", None, Some("INS"), None),
            raw("12345", Some("PI"), Some("HOSP"), None),
            raw("A1", Some("AN"), None, Some("urn:oid:1.2.250.99")),
            raw("SS-9", Some("SS"), Some("CPAM"), None),
            raw("X", Some("MR"), Some("http://example.org/mrn"), None),
            raw("999", Some("INS-NIA-TEST"), None, None),
        ];
        for input in inputs {
            let first = classify(&input);
            let again = RawIdentifier::from_identifier(&first).expect("value survives");
            assert_eq!(classify(&again), first, "{input:?}");
        }
    }

    #[test]
    fn reads_cx_repetitions_and_dedupes() {
        let field = FieldValue::Repeated(vec![
            cx("12345", hd("HOSP", "1.2.250.1.71.4.2.7"), "PI"),
            cx("12345", s("IPP"), "PI"),
            cx("180017512345678", hd("ASIP-SANTE-INS-NIR", "1.2.250.1.213.1.4.8"), "INS"),
        ]);
        let ids = identifiers_from_field(&field);
        assert_eq!(ids.len(), 2);
        assert!(is_internal(&ids[0]));
        assert!(is_national(&ids[1]));
    }

    #[test]
    fn national_without_internal_gets_synthesized_ipp() {
        let mut ids = vec![national_identifier(NationalKind::Nir, "180017512345678")];
        finalize_patient_identifiers(&mut ids, Some("20250101120000"), || unreachable!());
        assert_eq!(ids.len(), 2);
        assert!(is_internal(&ids[1]));
        assert_eq!(ids[1].value.as_deref(), Some("18001751120000"));
    }

    #[test]
    fn empty_list_gets_temporary_identifier() {
        let mut ids = Vec::new();
        finalize_patient_identifiers(&mut ids, None, || "urn:uuid:tmp".to_string());
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].use_type, Some(IdentifierUse::Temp));
        assert_eq!(ids[0].system.as_deref(), Some(SYSTEM_TEMPORARY));
    }

    #[test]
    fn practitioner_registries_by_length() {
        let rpps = practitioner_identifier(&raw("10001234567", None, None, None));
        assert_eq!(rpps.system.as_deref(), Some(OID_PRACTITIONER));
        assert_eq!(rpps.type_code(), Some("RPPS"));
        let adeli = practitioner_identifier(&raw("751234567", None, Some("ADELI"), None));
        assert_eq!(adeli.type_code(), Some("ADELI"));
        let local = practitioner_identifier(&raw("DR42", None, Some("HOSP"), None));
        assert_eq!(local.system, None);
    }

    #[test]
    fn finess_numbers_are_recognised() {
        let id = organization_identifier("750712184", None);
        assert_eq!(id.system.as_deref(), Some(OID_FINESS));
        let id = organization_identifier("SERV-A", Some("1.2.250.1.99"));
        assert_eq!(id.system.as_deref(), Some("urn:oid:1.2.250.1.99"));
    }
}
