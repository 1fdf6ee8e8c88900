//! Practitioners from `XCN` fields (PV1-7/8/9/17, ORC-12, OBR-16, AIP-3, ROL-4, ...).

use crate::resolvers::identifiers::{practitioner_identifier, RawIdentifier};
use crate::resolvers::names::{human_name, XCN};
use fhir::{HumanName, Identifier, Practitioner};
use hl7v2::FieldValue;

/// A practitioner read from one `XCN` repetition, before it is added to a bundle.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedPractitioner {
    pub identifier: Option<Identifier>,
    pub name: Option<HumanName>,
}

impl ResolvedPractitioner {
    /// Key used to recognise the same practitioner across fields of one message.
    ///
    /// The classified identifier wins; otherwise the upper-cased name.
    pub fn dedup_key(&self) -> String {
        if let Some(id) = &self.identifier {
            return format!(
                "id|{}|{}",
                id.system.as_deref().unwrap_or_default(),
                id.value.as_deref().unwrap_or_default()
            );
        }
        let name = self.name.as_ref();
        format!(
            "name|{}|{}",
            name.and_then(|n| n.family.as_deref()).unwrap_or_default().to_uppercase(),
            name.map(|n| n.given.join(" ")).unwrap_or_default().to_uppercase()
        )
    }

    pub fn display(&self) -> Option<String> {
        self.name.as_ref().and_then(HumanName::display)
    }

    pub fn into_resource(self) -> Practitioner {
        Practitioner {
            identifier: self.identifier.into_iter().collect(),
            name: self.name.into_iter().collect(),
            ..Practitioner::default()
        }
    }
}

/// Reads one `XCN` repetition; `None` when it has neither identifier nor name.
pub fn practitioner_from_xcn(xcn: &FieldValue) -> Option<ResolvedPractitioner> {
    let identifier = RawIdentifier::from_xcn(xcn).map(|raw| practitioner_identifier(&raw));
    let name = human_name(xcn, XCN);
    if identifier.is_none() && name.is_none() {
        return None;
    }
    Some(ResolvedPractitioner { identifier, name })
}

/// Every practitioner of a repeated `XCN` field.
pub fn practitioners_from_field(field: &FieldValue) -> Vec<ResolvedPractitioner> {
    field.repetitions().filter_map(practitioner_from_xcn).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::fr_core::OID_PRACTITIONER;

    fn xcn(parts: &[&str]) -> FieldValue {
        FieldValue::Composite(parts.iter().map(|p| FieldValue::from(*p)).collect())
    }

    #[test]
    fn reads_rpps_and_name() {
        let resolved = practitioner_from_xcn(&xcn(&["10001234567", "MARTIN", "SOPHIE"])).expect("practitioner");
        let id = resolved.identifier.as_ref().expect("identifier");
        assert_eq!(id.system.as_deref(), Some(OID_PRACTITIONER));
        assert_eq!(resolved.display().as_deref(), Some("SOPHIE MARTIN"));
        let practitioner = resolved.into_resource();
        assert_eq!(practitioner.identifier.len(), 1);
        assert_eq!(practitioner.name.len(), 1);
    }

    #[test]
    fn same_identifier_same_key() {
        let a = practitioner_from_xcn(&xcn(&["10001234567", "MARTIN", "SOPHIE"])).expect("a");
        let b = practitioner_from_xcn(&xcn(&["10001234567", "MARTIN", "S"])).expect("b");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn name_only_key_is_case_insensitive() {
        let a = practitioner_from_xcn(&xcn(&["", "Martin", "Sophie"])).expect("a");
        let b = practitioner_from_xcn(&xcn(&["", "MARTIN", "SOPHIE"])).expect("b");
        assert!(a.identifier.is_none());
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn blank_xcn_is_skipped() {
        assert!(practitioners_from_field(&FieldValue::default()).is_empty());
    }
}
