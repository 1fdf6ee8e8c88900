//! # hl7fr core
//!
//! Conversion of HL7 v2.x messages into FHIR R4 bundles following the French FR Core profiles.
//!
//! Responsibilities:
//! - Detect the message type and route it to the ADT, SIU or order handler
//! - Map segments to FHIR resources through the field resolvers
//! - Assemble the bundle and run the French extension-segment enrichment pass
//! - Report fatal errors with a discriminator and collect field-level warnings
//!
//! Notes:
//! - Every conversion owns its context; a [`Converter`] can be shared across threads.
//! - Parsing lives in the `hl7v2` crate and the wire models in `fhir`.

pub mod assembler;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod handlers;
pub mod resolvers;
pub mod router;
pub mod terminology;

pub use assembler::ConversionOutcome;
pub use config::{ConfigError, ConfigResult, ConversionOptions};
pub use error::{ConversionError, ConversionResult, ConversionWarning, ErrorKind};
pub use router::{capabilities, capability, detect_type, Capability, MessageHandler, MessageType, Router};
pub use terminology::{FrenchTerminology, TerminologyConcept, TerminologyError, TerminologyLookup};

use hl7v2::ParsedMessage;
use std::sync::{Arc, OnceLock};

/// The embedded terminology table, parsed on first use.
fn bundled_terminology() -> ConversionResult<Arc<dyn TerminologyLookup>> {
    static BUNDLED: OnceLock<Result<Arc<FrenchTerminology>, String>> = OnceLock::new();
    match BUNDLED.get_or_init(|| {
        FrenchTerminology::bundled()
            .map(Arc::new)
            .map_err(|e| e.to_string())
    }) {
        Ok(table) => {
            let lookup: Arc<dyn TerminologyLookup> = table.clone();
            Ok(lookup)
        }
        Err(reason) => Err(ConversionError::Mapping {
            message_type: String::new(),
            event: String::new(),
            segment: None,
            reason: format!("bundled terminology is invalid: {reason}"),
        }),
    }
}

/// Entry point of the conversion pipeline: parse, route, map, assemble.
#[derive(Clone)]
pub struct Converter {
    router: Arc<Router>,
    terminology: Arc<dyn TerminologyLookup>,
}

impl Converter {
    /// Converter with the default handlers and the given terminology.
    pub fn new(terminology: Arc<dyn TerminologyLookup>) -> Self {
        Self::with_router(Router::default(), terminology)
    }

    pub fn with_router(router: Router, terminology: Arc<dyn TerminologyLookup>) -> Self {
        Self {
            router: Arc::new(router),
            terminology,
        }
    }

    /// Converter with the default handlers and the embedded terminology table.
    pub fn bundled() -> ConversionResult<Self> {
        Ok(Self::new(bundled_terminology()?))
    }

    /// Converts one raw message.
    ///
    /// # Errors
    ///
    /// Structural parse failures, an unreadable header, an unregistered message type, or a
    /// handler that cannot complete. Field-level issues are returned as warnings instead.
    pub fn convert(&self, raw: &str, options: &ConversionOptions) -> ConversionResult<ConversionOutcome> {
        let message = hl7v2::parse(raw)?;
        self.convert_parsed(&message, options)
    }

    pub fn convert_parsed(
        &self,
        message: &ParsedMessage,
        options: &ConversionOptions,
    ) -> ConversionResult<ConversionOutcome> {
        self.router.route(message, options, self.terminology.clone())
    }
}

/// Converts one raw message with the embedded terminology table.
pub fn convert(raw: &str, options: &ConversionOptions) -> ConversionResult<ConversionOutcome> {
    Converter::bundled()?.convert(raw, options)
}

/// Parses `raw` and classifies it from MSH-9 without converting it.
pub fn detect(raw: &str) -> ConversionResult<MessageType> {
    let message = hl7v2::parse(raw)?;
    detect_type(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{AppointmentStatus, BundleType, Resource, ResourceType};

    fn options() -> ConversionOptions {
        ConversionOptions {
            id_seed: Some("end-to-end".into()),
            ..ConversionOptions::default()
        }
    }

    fn run(segments: &[&str]) -> ConversionOutcome {
        convert(&segments.join("\r"), &options()).expect("convert")
    }

    #[test]
    fn admission_with_national_identifier() {
        let outcome = run(&[
            "MSH|^~\\&|A|B|C|D|20250101120000||ADT^A01|1|P|2.5",
            "PID|||180017512345678^^^INS-NIR||DUPONT^JEAN||19800101|M",
        ]);
        assert_eq!(outcome.bundle.bundle_type, BundleType::Message);
        assert!(matches!(outcome.bundle.entries()[0].resource, Resource::MessageHeader(_)));

        let patients: Vec<_> = outcome.bundle.resources_of(ResourceType::Patient).collect();
        assert_eq!(patients.len(), 1);
        let Resource::Patient(patient) = &patients[0].resource else {
            panic!("not a patient");
        };
        assert_eq!(patient.identifier.len(), 2);
        assert!(resolvers::identifiers::is_national(&patient.identifier[0]));
        assert!(!resolvers::identifiers::is_national(&patient.identifier[1]));
    }

    #[test]
    fn new_appointment_is_booked() {
        let outcome = run(&[
            "MSH|^~\\&|RIS|CHU|DPI|CHU|20250105100000||SIU^S12|1|P|2.5",
            "SCH|RDV001^RIS",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
        ]);
        let appointments: Vec<_> = outcome.bundle.resources_of(ResourceType::Appointment).collect();
        assert_eq!(appointments.len(), 1);
        match &appointments[0].resource {
            Resource::Appointment(appointment) => assert_eq!(appointment.status, AppointmentStatus::Booked),
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn order_details_share_one_patient() {
        let outcome = run(&[
            "MSH|^~\\&|DPI|CHU|LAB|CHU|20250101120000||ORM^O01|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
            "ORC|NW|CMD1",
            "OBR|1|CMD1||GLU^Glycemie^L",
            "OBR|2|CMD2||NFS^Numeration^L",
        ]);
        let patient_url = outcome
            .bundle
            .resources_of(ResourceType::Patient)
            .next()
            .map(|entry| entry.full_url.clone())
            .expect("patient");
        let subjects: Vec<_> = outcome
            .bundle
            .resources_of(ResourceType::ServiceRequest)
            .map(|entry| match &entry.resource {
                Resource::ServiceRequest(request) => request.subject.reference.clone().expect("subject"),
                other => panic!("unexpected entry: {other:?}"),
            })
            .collect();
        assert_eq!(subjects, vec![patient_url.clone(), patient_url]);
    }

    #[test]
    fn missing_header_produces_no_bundle() {
        let raw = "PID|||123^^^HOSP^PI||DUPONT^JEAN";
        let err = convert(raw, &options()).expect_err("no header");
        assert_eq!(err.kind(), ErrorKind::MissingHeaderError);
        let err = detect(raw).expect_err("no header");
        assert_eq!(err.kind(), ErrorKind::MissingHeaderError);
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let err = convert("MSH|^~\\&|A|B|C|D|20250101120000||MFN^M02|1|P|2.5", &options())
            .expect_err("unsupported");
        assert_eq!(err.kind(), ErrorKind::UnsupportedTypeError);
    }

    #[test]
    fn empty_input_is_a_format_error() {
        let err = convert("", &options()).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::FormatError);
    }

    #[test]
    fn repeated_names_collapse() {
        let outcome = run(&[
            "MSH|^~\\&|A|B|C|D|20250101120000||ADT^A28|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN^^^^^L~DUPONT^JEAN^^^^^L~MARTIN^^^^^^D~^MARIE^^^^^D",
        ]);
        match &outcome.bundle.resources_of(ResourceType::Patient).next().expect("patient").resource {
            Resource::Patient(patient) => assert_eq!(patient.name.len(), 2),
            other => panic!("unexpected entry: {other:?}"),
        };
    }

    #[test]
    fn every_encounter_has_a_location() {
        for pv1 in ["PV1||I", "PV1||I|CARDIO^101^1"] {
            let outcome = run(&[
                "MSH|^~\\&|A|B|C|D|20250101120000||ADT^A01|1|P|2.5",
                "PID|||123^^^HOSP^PI||DUPONT^JEAN",
                pv1,
            ]);
            for entry in outcome.bundle.resources_of(ResourceType::Encounter) {
                match &entry.resource {
                    Resource::Encounter(encounter) => assert!(!encounter.location.is_empty(), "{pv1}"),
                    other => panic!("unexpected entry: {other:?}"),
                }
            }
        }
    }

    #[test]
    fn seeded_conversions_are_reproducible() {
        let raw = [
            "MSH|^~\\&|A|B|C|D|20250101120000||ADT^A01|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
            "PV1||I|CARDIO^101^1",
        ]
        .join("\r");
        let first = convert(&raw, &options()).expect("first");
        let second = convert(&raw, &options()).expect("second");
        assert_eq!(first.bundle, second.bundle);
    }

    fn collect_references(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    match (key.as_str(), child) {
                        ("reference", serde_json::Value::String(target)) => out.push(target.clone()),
                        _ => collect_references(child, out),
                    }
                }
            }
            serde_json::Value::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
            _ => {}
        }
    }

    #[test]
    fn entries_are_addressed_and_references_resolve() {
        let outcome = run(&[
            "MSH|^~\\&|SIH|CHU|DPI|CHU|20250101120000||ADT^A01|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
            "PV1||I|CARDIO^101^1||||10003456789^MEDECIN^ALICE",
            "NK1|1|DUPONT^MARIE|SPO",
            "IN1|1|PLAN1||CPAM",
            "ZBE|MVT001|20250101110000||INSERT|N||URGENCES^^^^^^^^^UF001",
        ]);
        for entry in outcome.bundle.entries() {
            let id = hl7fr_uuid::ResourceId::from_full_url(&entry.full_url).expect("urn:uuid full URL");
            assert_eq!(entry.resource.id(), Some(id.to_string().as_str()));
        }
        let json = serde_json::to_value(&outcome.bundle).expect("serialise");
        let mut references = Vec::new();
        collect_references(&json, &mut references);
        assert!(!references.is_empty());
        for reference in references {
            assert!(outcome.bundle.contains(&reference), "dangling reference {reference}");
        }
    }

    fn focus_of(outcome: &ConversionOutcome) -> Vec<String> {
        match &outcome.bundle.entries()[0].resource {
            Resource::MessageHeader(header) => header
                .focus
                .iter()
                .filter_map(|reference| reference.reference.clone())
                .collect(),
            other => panic!("unexpected first entry: {other:?}"),
        }
    }

    fn url_of(outcome: &ConversionOutcome, resource_type: ResourceType) -> String {
        outcome
            .bundle
            .resources_of(resource_type)
            .next()
            .map(|entry| entry.full_url.clone())
            .expect("resource present")
    }

    #[test]
    fn message_header_focuses_patient_and_primary_resource() {
        let admission = run(&[
            "MSH|^~\\&|A|B|C|D|20250101120000||ADT^A01|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
            "PV1||I|CARDIO^101^1",
        ]);
        assert_eq!(
            focus_of(&admission),
            vec![
                url_of(&admission, ResourceType::Patient),
                url_of(&admission, ResourceType::Encounter)
            ]
        );

        let order = run(&[
            "MSH|^~\\&|DPI|CHU|LAB|CHU|20250101120000||ORM^O01|1|P|2.5",
            "PID|||123^^^HOSP^PI||DUPONT^JEAN",
            "ORC|NW|CMD1",
            "OBR|1|CMD1||GLU^Glycemie^L",
        ]);
        assert_eq!(
            focus_of(&order),
            vec![
                url_of(&order, ResourceType::Patient),
                url_of(&order, ResourceType::ServiceRequest)
            ]
        );
    }

    #[test]
    fn detects_without_converting() {
        let detected = detect("MSH|^~\\&|A|B|C|D|20250101120000||ORU^R01^ORU_R01|1|P|2.5").expect("detect");
        assert_eq!(detected.to_string(), "ORU^R01^ORU_R01");
        assert!(detected.supported);
    }
}
