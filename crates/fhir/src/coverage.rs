//! Coverage wire model (insurance segments).

use crate::{CodeableConcept, Extension, Identifier, Meta, Period, Reference};
use serde::{Deserialize, Serialize};

/// Additional classification of a coverage (group, plan, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageClass {
    #[serde(rename = "type")]
    pub class_type: CodeableConcept,

    pub value: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coverage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,

    /// `active | cancelled | draft | entered-in-error`.
    pub status: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub coverage_type: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,

    pub beneficiary: Reference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,

    #[serde(default)]
    pub payor: Vec<Reference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class: Vec<CoverageClass>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payor_is_always_serialized() {
        let coverage = Coverage {
            status: "active".into(),
            beneficiary: Reference::to("urn:uuid:p"),
            ..Coverage::default()
        };
        let json = serde_json::to_value(&coverage).expect("serialize");
        assert_eq!(json["payor"], serde_json::json!([]));
        assert_eq!(json["beneficiary"]["reference"], "urn:uuid:p");
    }
}
