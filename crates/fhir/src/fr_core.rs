//! FR Core canonical URLs, extension URLs, identifier namespaces and code systems.
//!
//! Values follow the French national FHIR R4 implementation guide (`hl7.fr.ig.fhir.core`) and the
//! OID registry of the Agence du Numérique en Santé.

use crate::ResourceType;

// ============================================================================
// Profiles
// ============================================================================

pub const PROFILE_BASE: &str = "https://hl7.fr/ig/fhir/core/StructureDefinition";

pub const PROFILE_PATIENT: &str = "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-patient";
pub const PROFILE_ENCOUNTER: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-encounter";
pub const PROFILE_LOCATION: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-location";
pub const PROFILE_ORGANIZATION: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-organization";
pub const PROFILE_PRACTITIONER: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-practitioner";
pub const PROFILE_PRACTITIONER_ROLE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-practitioner-role";
pub const PROFILE_RELATED_PERSON: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-related-person";
pub const PROFILE_COVERAGE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-coverage";
pub const PROFILE_SCHEDULE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-schedule";

/// FR Core profile declared by default for `resource_type`, if FR Core profiles it.
pub fn default_profile(resource_type: ResourceType) -> Option<&'static str> {
    match resource_type {
        ResourceType::Patient => Some(PROFILE_PATIENT),
        ResourceType::Encounter => Some(PROFILE_ENCOUNTER),
        ResourceType::Location => Some(PROFILE_LOCATION),
        ResourceType::Organization => Some(PROFILE_ORGANIZATION),
        ResourceType::Practitioner => Some(PROFILE_PRACTITIONER),
        ResourceType::PractitionerRole => Some(PROFILE_PRACTITIONER_ROLE),
        ResourceType::RelatedPerson => Some(PROFILE_RELATED_PERSON),
        ResourceType::Coverage => Some(PROFILE_COVERAGE),
        ResourceType::Schedule => Some(PROFILE_SCHEDULE),
        ResourceType::MessageHeader
        | ResourceType::ServiceRequest
        | ResourceType::Observation
        | ResourceType::Appointment => None,
    }
}

// ============================================================================
// Extensions
// ============================================================================

pub const EXT_IDENTITY_RELIABILITY: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-identity-reliability";
pub const EXT_BIRTH_PLACE: &str = "http://hl7.org/fhir/StructureDefinition/patient-birthPlace";
pub const EXT_MOTHERS_MAIDEN_NAME: &str =
    "http://hl7.org/fhir/StructureDefinition/patient-mothersMaidenName";
pub const EXT_NATIONALITY: &str = "http://hl7.org/fhir/StructureDefinition/patient-nationality";
pub const EXT_ADDRESS_INSEE_CODE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-address-insee-code";
pub const EXT_ESTIMATED_DISCHARGE_DATE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-estimated-discharge-date";
pub const EXT_MOVEMENT: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-encounter-movement";
pub const EXT_CARE_MODE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-legal-care-mode";
pub const EXT_LAST_STAY_DATE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-last-stay-date";
pub const EXT_DISCHARGE_TRANSPORT_MODE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-discharge-transport-mode";
pub const EXT_SOCIO_PROFESSIONAL: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-socio-professional-activity";
pub const EXT_LUNAR_DATE: &str = "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-lunar-date";
pub const EXT_SMS_CONSENT: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-sms-consent";
pub const EXT_IDENTITY_COLLECTION_MODE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-identity-collection-mode";
pub const EXT_FULL_COVERAGE: &str =
    "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-coverage-full-coverage";
pub const EXT_PMSI: &str = "https://hl7.fr/ig/fhir/core/StructureDefinition/fr-core-pmsi";

// ============================================================================
// Identifier namespaces
// ============================================================================

/// INS-NIR (national health identifier, NIR-based).
pub const OID_INS_NIR: &str = "urn:oid:1.2.250.1.213.1.4.8";
/// INS-C (computed national identifier, legacy).
pub const OID_INS_C: &str = "urn:oid:1.2.250.1.213.1.4.2";
/// INS-NIA (temporary NIR attributed by the INSEE).
pub const OID_INS_NIA: &str = "urn:oid:1.2.250.1.213.1.4.9";
/// INS-NIR test namespace.
pub const OID_INS_NIR_TEST: &str = "urn:oid:1.2.250.1.213.1.4.10";
/// INS-NIA test namespace.
pub const OID_INS_NIA_TEST: &str = "urn:oid:1.2.250.1.213.1.4.11";

/// Namespaces that denote a national health identifier.
pub const NATIONAL_IDENTIFIER_OIDS: [&str; 5] = [
    OID_INS_NIR,
    OID_INS_C,
    OID_INS_NIA,
    OID_INS_NIR_TEST,
    OID_INS_NIA_TEST,
];

/// Internal patient identifier (IPP) namespace, used uniformly for every IPP.
pub const OID_IPP: &str = "urn:oid:1.2.250.1.71.4.2.7";
/// National practitioner registries (RPPS and ADELI).
pub const OID_PRACTITIONER: &str = "urn:oid:1.2.250.1.71.4.2.1";
/// FINESS establishment registry.
pub const OID_FINESS: &str = "urn:oid:1.2.250.1.71.4.2.2";

/// Namespace of synthesized temporary identifiers.
pub const SYSTEM_TEMPORARY: &str = "urn:ietf:rfc:3986";

// ============================================================================
// Code systems
// ============================================================================

pub const CS_V2_0203: &str = "http://terminology.hl7.org/CodeSystem/v2-0203";
pub const CS_FR_V2_0203: &str = "https://hl7.fr/ig/fhir/core/CodeSystem/fr-core-cs-v2-0203";
pub const CS_V3_ACT_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-ActCode";
pub const CS_V2_0443: &str = "http://terminology.hl7.org/CodeSystem/v2-0443";
pub const CS_V2_0131: &str = "http://terminology.hl7.org/CodeSystem/v2-0131";
pub const CS_V2_0063: &str = "http://terminology.hl7.org/CodeSystem/v2-0063";
pub const CS_V3_MARITAL_STATUS: &str = "http://terminology.hl7.org/CodeSystem/v3-MaritalStatus";
pub const CS_V3_PARTICIPATION_TYPE: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ParticipationType";
pub const CS_ADMIT_SOURCE: &str = "http://terminology.hl7.org/CodeSystem/admit-source";
pub const CS_DISCHARGE_DISPOSITION: &str =
    "http://terminology.hl7.org/CodeSystem/discharge-disposition";
pub const CS_OBSERVATION_INTERPRETATION: &str =
    "http://terminology.hl7.org/CodeSystem/v3-ObservationInterpretation";
pub const CS_IDENTITY_RELIABILITY: &str =
    "https://mos.esante.gouv.fr/NOS/TRE_R352-IdentityReliability/FHIR/TRE-R352-IdentityReliability";
pub const CS_MOVEMENT_TYPE: &str = "https://hl7.fr/ig/fhir/core/CodeSystem/fr-core-cs-movement-type";
pub const CS_V2_0003: &str = "http://terminology.hl7.org/CodeSystem/v2-0003";
pub const CS_V2_0023: &str = "http://terminology.hl7.org/CodeSystem/v2-0023";
pub const CS_SUBSCRIBER_RELATIONSHIP: &str =
    "http://terminology.hl7.org/CodeSystem/subscriber-relationship";
pub const CS_NULL_FLAVOR: &str = "http://terminology.hl7.org/CodeSystem/v3-NullFlavor";
pub const CS_LOCATION_PHYSICAL_TYPE: &str =
    "http://terminology.hl7.org/CodeSystem/location-physical-type";
pub const CS_PMSI_ENTRY_MODE: &str =
    "https://mos.esante.gouv.fr/NOS/TRE_R213-ModeEntree/FHIR/TRE-R213-ModeEntree";
pub const CS_PMSI_EXIT_MODE: &str =
    "https://mos.esante.gouv.fr/NOS/TRE_R214-ModeSortie/FHIR/TRE-R214-ModeSortie";
pub const CS_PMSI_ORIGIN: &str =
    "https://mos.esante.gouv.fr/NOS/TRE_R215-Provenance/FHIR/TRE-R215-Provenance";
pub const CS_PMSI_DESTINATION: &str =
    "https://mos.esante.gouv.fr/NOS/TRE_R216-Destination/FHIR/TRE-R216-Destination";
/// INSEE code of French communes (Code Officiel Géographique).
pub const CS_INSEE_COMMUNE: &str = "urn:oid:1.2.250.1.213.2.12";
pub const CS_LOINC: &str = "http://loinc.org";
pub const CS_SNOMED: &str = "http://snomed.info/sct";
pub const CS_UCUM: &str = "http://unitsofmeasure.org";
pub const CS_CCAM: &str = "https://mos.esante.gouv.fr/NOS/TRE_R38-ActeCCAM/FHIR/TRE-R38-ActeCCAM";
pub const CS_CIM10: &str = "http://hl7.org/fhir/sid/icd-10";
pub const CS_ISO_3166: &str = "urn:iso:std:iso:3166";
pub const CS_LANGUAGE: &str = "urn:ietf:bcp:47";

/// Returns whether `system` denotes a national health identifier namespace.
pub fn is_national_identifier_system(system: &str) -> bool {
    NATIONAL_IDENTIFIER_OIDS.contains(&system)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_share_base() {
        for rt in [
            ResourceType::Patient,
            ResourceType::Encounter,
            ResourceType::Coverage,
            ResourceType::Schedule,
        ] {
            let profile = default_profile(rt).expect("profiled");
            assert!(profile.starts_with(PROFILE_BASE));
        }
        assert!(default_profile(ResourceType::MessageHeader).is_none());
    }

    #[test]
    fn national_oids_are_recognised() {
        assert!(is_national_identifier_system(OID_INS_NIR));
        assert!(is_national_identifier_system(OID_INS_C));
        assert!(!is_national_identifier_system(OID_IPP));
    }
}
