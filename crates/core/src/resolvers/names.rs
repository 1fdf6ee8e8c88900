//! Person names (`XPN`, and the name part of `XCN`).
//!
//! Suffix markers found among the given names are moved to `suffix`. Entries of the same `use` are
//! merged when one carries only a family name and the other only given names; exact duplicates
//! `(use, family, given set)` are dropped.

use crate::constants::NAME_SUFFIXES;
use fhir::{HumanName, NameUse};
use hl7v2::FieldValue;
use std::collections::BTreeSet;

/// Component positions of the name parts inside a composite.
#[derive(Clone, Copy, Debug)]
pub struct NameLayout {
    family: usize,
    given: usize,
    further_given: usize,
    suffix: usize,
    prefix: usize,
    degree: usize,
    type_code: usize,
}

/// `XPN` (PID-5, NK1-2, IN1-16, ...).
pub const XPN: NameLayout = NameLayout {
    family: 1,
    given: 2,
    further_given: 3,
    suffix: 4,
    prefix: 5,
    degree: 6,
    type_code: 7,
};

/// `XCN` (PV1-7, ORC-12, AIP-3, ...), offset by the leading identifier.
pub const XCN: NameLayout = NameLayout {
    family: 2,
    given: 3,
    further_given: 4,
    suffix: 5,
    prefix: 6,
    degree: 7,
    type_code: 10,
};

/// HL7 table 0200 to name use.
pub fn name_use(code: &str) -> Option<NameUse> {
    match code.trim().to_ascii_uppercase().as_str() {
        "L" | "B" => Some(NameUse::Official),
        "D" | "A" => Some(NameUse::Usual),
        "M" => Some(NameUse::Maiden),
        "N" => Some(NameUse::Nickname),
        "S" => Some(NameUse::Anonymous),
        "T" | "U" => Some(NameUse::Temp),
        "O" => Some(NameUse::Old),
        _ => None,
    }
}

fn is_suffix_marker(token: &str) -> bool {
    let upper = token.trim().to_uppercase();
    NAME_SUFFIXES.iter().any(|s| *s == upper)
}

/// Builds a name from one repetition; `None` when no part is present.
pub fn human_name(value: &FieldValue, layout: NameLayout) -> Option<HumanName> {
    let mut name = HumanName {
        use_type: value.component_value(layout.type_code).and_then(name_use),
        // FN.1 surname; the other FN subcomponents are prefixes we do not model.
        family: value.subcomponent(layout.family, 1).value().map(str::to_string),
        ..HumanName::default()
    };

    let mut given: Vec<String> = Vec::new();
    if let Some(first) = value.component_value(layout.given) {
        given.push(first.to_string());
    }
    if let Some(further) = value.component_value(layout.further_given) {
        given.extend(further.split_whitespace().map(str::to_string));
    }
    for token in given {
        if is_suffix_marker(&token) {
            name.suffix.push(token);
        } else if !name.given.contains(&token) {
            name.given.push(token);
        }
    }
    for index in [layout.suffix, layout.degree] {
        if let Some(suffix) = value.component_value(index) {
            name.suffix.push(suffix.to_string());
        }
    }
    if let Some(prefix) = value.component_value(layout.prefix) {
        name.prefix.push(prefix.to_string());
    }

    let empty = name.family.is_none()
        && name.given.is_empty()
        && name.prefix.is_empty()
        && name.suffix.is_empty();
    (!empty).then_some(name)
}

fn family_only(name: &HumanName) -> bool {
    name.family.is_some() && name.given.is_empty()
}

fn given_only(name: &HumanName) -> bool {
    name.family.is_none() && !name.given.is_empty()
}

/// Merges complementary partial names, then drops exact duplicates. Order is preserved.
pub fn merge_and_dedupe(names: Vec<HumanName>) -> Vec<HumanName> {
    let mut merged: Vec<HumanName> = Vec::with_capacity(names.len());
    for name in names {
        let partner = merged.iter_mut().find(|existing| {
            existing.use_type == name.use_type
                && ((family_only(existing) && given_only(&name))
                    || (given_only(existing) && family_only(&name)))
        });
        match partner {
            Some(existing) => {
                if existing.family.is_none() {
                    existing.family = name.family;
                } else {
                    existing.given = name.given;
                }
                existing.prefix.extend(name.prefix);
                existing.suffix.extend(name.suffix);
            }
            None => merged.push(name),
        }
    }

    let mut seen = BTreeSet::new();
    merged.retain(|name| {
        let given: BTreeSet<String> = name.given.iter().cloned().collect();
        seen.insert((name.use_type.map(NameUse::as_str), name.family.clone(), given))
    });
    merged
}

/// Every name of a repeated `XPN` field, merged and deduplicated.
pub fn names_from_field(field: &FieldValue) -> Vec<HumanName> {
    merge_and_dedupe(
        field
            .repetitions()
            .filter_map(|repetition| human_name(repetition, XPN))
            .collect(),
    )
}

/// First usable name of a field, for single-name resources.
pub fn first_name(field: &FieldValue, layout: NameLayout) -> Option<HumanName> {
    field
        .repetitions()
        .find_map(|repetition| human_name(repetition, layout))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xpn(parts: &[&str]) -> FieldValue {
        FieldValue::Composite(parts.iter().map(|p| FieldValue::from(*p)).collect())
    }

    #[test]
    fn maps_parts_and_use() {
        let name = human_name(&xpn(&["DUPONT", "JEAN", "PIERRE PAUL", "", "M.", "", "L"]), XPN)
            .expect("name");
        assert_eq!(name.family.as_deref(), Some("DUPONT"));
        assert_eq!(name.given, vec!["JEAN", "PIERRE", "PAUL"]);
        assert_eq!(name.prefix, vec!["M."]);
        assert_eq!(name.use_type, Some(NameUse::Official));
    }

    #[test]
    fn suffix_markers_leave_given_list() {
        let name = human_name(&xpn(&["MARTIN", "LUC", "JR"]), XPN).expect("name");
        assert_eq!(name.given, vec!["LUC"]);
        assert_eq!(name.suffix, vec!["JR"]);
    }

    #[test]
    fn identical_names_collapse() {
        let field = FieldValue::Repeated(vec![
            xpn(&["DUPONT", "JEAN", "", "", "", "", "L"]),
            xpn(&["DUPONT", "JEAN", "", "", "", "", "L"]),
        ]);
        assert_eq!(names_from_field(&field).len(), 1);
    }

    #[test]
    fn family_only_and_given_only_merge() {
        let field = FieldValue::Repeated(vec![
            xpn(&["DUPONT", "", "", "", "", "", "D"]),
            xpn(&["", "MARIE", "", "", "", "", "D"]),
        ]);
        let names = names_from_field(&field);
        assert_eq!(names.len(), 1);
        assert_eq!(names[0].family.as_deref(), Some("DUPONT"));
        assert_eq!(names[0].given, vec!["MARIE"]);
    }

    #[test]
    fn different_uses_stay_apart() {
        let field = FieldValue::Repeated(vec![
            xpn(&["DUPONT", "", "", "", "", "", "L"]),
            xpn(&["", "MARIE", "", "", "", "", "D"]),
        ]);
        assert_eq!(names_from_field(&field).len(), 2);
    }

    #[test]
    fn blank_repetition_yields_nothing() {
        assert!(human_name(&FieldValue::default(), XPN).is_none());
    }

    #[test]
    fn reads_xcn_layout() {
        let xcn = xpn(&["10001234567", "HOUSE", "GREGORY", "", "", "DR"]);
        let name = human_name(&xcn, XCN).expect("name");
        assert_eq!(name.family.as_deref(), Some("HOUSE"));
        assert_eq!(name.given, vec!["GREGORY"]);
        assert_eq!(name.prefix, vec!["DR"]);
    }
}
