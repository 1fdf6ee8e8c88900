//! Telecom extraction (`XTN`: PID-13, PID-14, NK1-5, ...).
//!
//! A telecom field shows up in three shapes and all of them are handled: a plain number
//! (`Simple`), one flat component list (`Composite`), or several repetitions (`Repeated`).

use fhir::{ContactPoint, ContactPointSystem, ContactPointUse};
use hl7v2::FieldValue;
use std::collections::HashSet;

/// HL7 table 0202 (telecommunication equipment type).
pub fn equipment_system(code: &str) -> Option<ContactPointSystem> {
    match code.trim().to_ascii_uppercase().as_str() {
        "PH" | "CP" | "SAT" => Some(ContactPointSystem::Phone),
        "FX" => Some(ContactPointSystem::Fax),
        "BP" => Some(ContactPointSystem::Pager),
        "INTERNET" | "X.400" => Some(ContactPointSystem::Email),
        "URL" => Some(ContactPointSystem::Url),
        "MD" | "TDD" | "TTY" => Some(ContactPointSystem::Other),
        _ => None,
    }
}

/// HL7 table 0201 (telecommunication use code).
pub fn contact_use(code: &str) -> Option<ContactPointUse> {
    match code.trim().to_ascii_uppercase().as_str() {
        "PRN" | "ORN" => Some(ContactPointUse::Home),
        "WPN" | "BPN" => Some(ContactPointUse::Work),
        "VHN" => Some(ContactPointUse::Temp),
        "PRS" => Some(ContactPointUse::Mobile),
        _ => None,
    }
}

/// `06`, `07`, `+336`, `+337`, `00336`, `00337` after removing separators.
pub fn is_french_mobile(number: &str) -> bool {
    let compact: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
        .collect();
    ["06", "07", "+336", "+337", "00336", "00337"]
        .iter()
        .any(|prefix| compact.starts_with(prefix))
}

fn contact_from_simple(text: &str, default_use: Option<ContactPointUse>) -> Option<ContactPoint> {
    let value = text.trim();
    if value.is_empty() {
        return None;
    }
    let system = if value.contains('@') {
        ContactPointSystem::Email
    } else {
        ContactPointSystem::Phone
    };
    Some(finish(system, value.to_string(), default_use))
}

fn contact_from_composite(xtn: &FieldValue, default_use: Option<ContactPointUse>) -> Option<ContactPoint> {
    let declared_system = xtn.component_value(3).and_then(equipment_system);
    let email = xtn.component_value(4);
    let number = xtn
        .component_value(12)
        .or_else(|| xtn.component_value(1))
        .map(str::to_string)
        .or_else(|| {
            let local = xtn.component_value(7)?;
            Some(match xtn.component_value(6) {
                Some(area) => format!("{area}{local}"),
                None => local.to_string(),
            })
        });

    let (system, value) = match (declared_system, number, email) {
        (Some(ContactPointSystem::Email), _, Some(email)) | (_, None, Some(email)) => {
            (ContactPointSystem::Email, email.to_string())
        }
        (Some(system), Some(number), _) => (system, number),
        (None, Some(number), _) if number.contains('@') => (ContactPointSystem::Email, number),
        (None, Some(number), _) => (ContactPointSystem::Phone, number),
        (_, None, None) => return None,
    };
    if value.trim().is_empty() {
        return None;
    }

    let declared_use = xtn.component_value(2).and_then(contact_use).or(default_use);
    let declared_use = match xtn.component_value(3) {
        Some(code) if code.eq_ignore_ascii_case("CP") => Some(ContactPointUse::Mobile),
        _ => declared_use,
    };
    Some(finish(system, value, declared_use))
}

fn finish(system: ContactPointSystem, value: String, declared_use: Option<ContactPointUse>) -> ContactPoint {
    let use_type = if system == ContactPointSystem::Phone && is_french_mobile(&value) {
        Some(ContactPointUse::Mobile)
    } else {
        declared_use
    };
    ContactPoint {
        system: Some(system),
        value: Some(value.trim().to_string()),
        use_type,
        rank: None,
    }
}

/// Extracts every contact point of one telecom field.
///
/// `default_use` applies when a repetition declares none (home for PID-13, work for PID-14).
pub fn telecoms_from_field(field: &FieldValue, default_use: Option<ContactPointUse>) -> Vec<ContactPoint> {
    field
        .repetitions()
        .filter_map(|repetition| match repetition {
            FieldValue::Simple(text) => contact_from_simple(text, default_use),
            FieldValue::Composite(_) => contact_from_composite(repetition, default_use),
            // A repetition never repeats again.
            FieldValue::Repeated(_) => None,
        })
        .collect()
}

/// Drops contact points already seen under the same `(system, use, value)`.
pub fn dedupe(contacts: Vec<ContactPoint>) -> Vec<ContactPoint> {
    let mut seen = HashSet::new();
    contacts
        .into_iter()
        .filter(|c| seen.insert((c.system, c.use_type, c.value.clone())))
        .collect()
}

/// Home and work fields together, deduplicated.
pub fn telecoms(home: &FieldValue, work: &FieldValue) -> Vec<ContactPoint> {
    let mut all = telecoms_from_field(home, Some(ContactPointUse::Home));
    all.extend(telecoms_from_field(work, Some(ContactPointUse::Work)));
    dedupe(all)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xtn(parts: &[&str]) -> FieldValue {
        FieldValue::Composite(parts.iter().map(|p| FieldValue::from(*p)).collect())
    }

    #[test]
    fn plain_string_is_a_phone() {
        let contacts = telecoms_from_field(&FieldValue::from("0145678900"), Some(ContactPointUse::Home));
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].system, Some(ContactPointSystem::Phone));
        assert_eq!(contacts[0].use_type, Some(ContactPointUse::Home));
    }

    #[test]
    fn flat_component_list_reads_equipment_and_email() {
        let field = xtn(&["", "NET", "Internet", "jean.dupont@example.fr"]);
        let contacts = telecoms_from_field(&field, None);
        assert_eq!(contacts[0].system, Some(ContactPointSystem::Email));
        assert_eq!(contacts[0].value.as_deref(), Some("jean.dupont@example.fr"));
    }

    #[test]
    fn repeated_with_number_at_fixed_offset() {
        let field = FieldValue::Repeated(vec![
            xtn(&["", "WPN", "FX", "", "33", "01", "45678901"]),
            xtn(&["0145678900", "PRN", "PH"]),
        ]);
        let contacts = telecoms_from_field(&field, None);
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].system, Some(ContactPointSystem::Fax));
        assert_eq!(contacts[0].value.as_deref(), Some("0145678901"));
        assert_eq!(contacts[0].use_type, Some(ContactPointUse::Work));
    }

    #[test]
    fn french_mobile_prefix_overrides_use() {
        for number in ["0612345678", "07 12 34 56 78", "+33612345678", "0033712345678"] {
            let contacts = telecoms_from_field(&xtn(&[number, "PRN", "PH"]), None);
            assert_eq!(contacts[0].use_type, Some(ContactPointUse::Mobile), "{number}");
        }
        let contacts = telecoms_from_field(&xtn(&["0145678900", "WPN", "PH"]), None);
        assert_eq!(contacts[0].use_type, Some(ContactPointUse::Work));
    }

    #[test]
    fn duplicates_are_dropped() {
        let home = FieldValue::Repeated(vec![
            xtn(&["0145678900", "PRN", "PH"]),
            FieldValue::from("0145678900"),
        ]);
        assert_eq!(telecoms(&home, FieldValue::empty()).len(), 1);
    }

    #[test]
    fn blank_field_yields_nothing() {
        assert!(telecoms_from_field(&FieldValue::default(), None).is_empty());
    }
}
