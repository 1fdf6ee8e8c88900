//! Organizations from `HD` (MSH-4, MSH-6) and `XON` (IN1-3/4, ZBE-7, ZBE-8, PD1-3) fields.

use crate::resolvers::identifiers::organization_identifier;
use fhir::{Identifier, Organization};
use hl7v2::FieldValue;

fn is_finess(value: &str) -> bool {
    value.len() == 9 && value.bytes().all(|b| b.is_ascii_digit())
}

fn organization(name: Option<&str>, identifier: Option<Identifier>) -> Option<Organization> {
    if name.is_none() && identifier.is_none() {
        return None;
    }
    Some(Organization {
        active: Some(true),
        name: name.map(str::to_string),
        identifier: identifier.into_iter().collect(),
        ..Organization::default()
    })
}

/// `HD`: HD-1 namespace (a name, or a bare FINESS number), HD-2 universal id.
pub fn organization_from_hd(hd: &FieldValue) -> Option<Organization> {
    let namespace = hd.component_value(1);
    let universal_id = hd.component_value(2);
    match (namespace, universal_id) {
        (Some(ns), None) if is_finess(ns) => organization(None, Some(organization_identifier(ns, None))),
        (name, Some(id)) => organization(name, Some(organization_identifier(id, None))),
        (name, None) => organization(name, None),
    }
}

/// `XON`: XON-1 name, XON-10 identifier (XON-3 in older versions), XON-6 assigning authority.
pub fn organization_from_xon(xon: &FieldValue) -> Option<Organization> {
    let name = xon.component_value(1);
    let id = xon.component_value(10).or_else(|| xon.component_value(3));
    let authority = xon
        .subcomponent(6, 2)
        .value()
        .or_else(|| xon.subcomponent(6, 1).value());
    organization(name, id.map(|id| organization_identifier(id, authority)))
}

/// Key used to recognise the same organization within a message.
pub fn organization_key(organization: &Organization) -> String {
    match organization.identifier.first() {
        Some(id) => format!(
            "id|{}|{}",
            id.system.as_deref().unwrap_or_default(),
            id.value.as_deref().unwrap_or_default()
        ),
        None => format!(
            "name|{}",
            organization.name.as_deref().unwrap_or_default().to_uppercase()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::fr_core::OID_FINESS;

    fn composite(parts: &[&str]) -> FieldValue {
        FieldValue::Composite(parts.iter().map(|p| FieldValue::from(*p)).collect())
    }

    #[test]
    fn hd_with_name_and_finess() {
        let org = organization_from_hd(&composite(&["CHU NANTES", "440000289", "ISO"])).expect("org");
        assert_eq!(org.name.as_deref(), Some("CHU NANTES"));
        assert_eq!(org.identifier[0].system.as_deref(), Some(OID_FINESS));
    }

    #[test]
    fn bare_finess_namespace() {
        let org = organization_from_hd(&FieldValue::from("440000289")).expect("org");
        assert!(org.name.is_none());
        assert_eq!(org.identifier[0].value.as_deref(), Some("440000289"));
    }

    #[test]
    fn name_only_hd() {
        let org = organization_from_hd(&FieldValue::from("LABO")).expect("org");
        assert_eq!(org.name.as_deref(), Some("LABO"));
        assert!(org.identifier.is_empty());
        assert_eq!(organization_key(&org), "name|LABO");
    }

    #[test]
    fn xon_functional_unit() {
        let xon = composite(&["CARDIOLOGIE", "", "", "", "", "HOSP", "", "", "", "UF1234"]);
        let org = organization_from_xon(&xon).expect("org");
        assert_eq!(org.name.as_deref(), Some("CARDIOLOGIE"));
        assert_eq!(org.identifier[0].value.as_deref(), Some("UF1234"));
        assert!(organization_from_xon(&FieldValue::default()).is_none());
    }
}
