//! FHIR R4 general-purpose datatypes.
//!
//! Only the elements the converter populates are modelled. Every optional element is omitted from
//! JSON when absent, and every list is omitted when empty.

use serde::{Deserialize, Serialize};

// ============================================================================
// Coded values
// ============================================================================

/// A single code from a code system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            display: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// A concept expressed as one or more codings plus optional text.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            coding: Vec::new(),
            text: Some(text.into()),
        }
    }

    /// Returns the code of the first coding, if any.
    pub fn first_code(&self) -> Option<&str> {
        self.coding.iter().find_map(|c| c.code.as_deref())
    }
}

// ============================================================================
// Identity and references
// ============================================================================

/// Purpose of an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierUse {
    Usual,
    Official,
    Temp,
    Secondary,
    Old,
}

/// An identifier scoped by a namespace (`system`, an OID URI for French registries).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<IdentifierUse>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub identifier_type: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigner: Option<Box<Reference>>,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Returns the code of the first `type` coding, if any.
    pub fn type_code(&self) -> Option<&str> {
        self.identifier_type.as_ref().and_then(CodeableConcept::first_code)
    }
}

/// A reference from one resource to another.
///
/// Inside a bundle, `reference` holds the target entry's `fullUrl` (`urn:uuid:...`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Reference {
    pub fn to(full_url: impl Into<String>) -> Self {
        Self {
            reference: Some(full_url.into()),
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

// ============================================================================
// People and contact details
// ============================================================================

/// Purpose of a human name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameUse {
    /// Official name.
    Official,
    /// Usual/preferred name.
    Usual,
    /// Temporary name.
    Temp,
    /// Nickname or informal name.
    Nickname,
    /// Anonymous name.
    Anonymous,
    /// Old name (no longer in use).
    Old,
    /// Maiden name.
    Maiden,
}

impl NameUse {
    pub fn as_str(self) -> &'static str {
        match self {
            NameUse::Official => "official",
            NameUse::Usual => "usual",
            NameUse::Temp => "temp",
            NameUse::Nickname => "nickname",
            NameUse::Anonymous => "anonymous",
            NameUse::Old => "old",
            NameUse::Maiden => "maiden",
        }
    }
}

/// A human name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<NameUse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub given: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prefix: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suffix: Vec<String>,
}

impl HumanName {
    /// Returns `"Given Family"` for display purposes.
    pub fn display(&self) -> Option<String> {
        let mut parts: Vec<&str> = self.given.iter().map(String::as_str).collect();
        if let Some(family) = self.family.as_deref() {
            parts.push(family);
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPointSystem {
    Phone,
    Fax,
    Email,
    Pager,
    Url,
    Sms,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPointUse {
    Home,
    Work,
    Temp,
    Old,
    Mobile,
}

/// A phone number, email address or other telecom endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<ContactPointSystem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<ContactPointUse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressUse {
    Home,
    Work,
    Temp,
    Old,
    Billing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Postal,
    Physical,
    Both,
}

/// A postal or physical address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_type: Option<AddressUse>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub address_type: Option<AddressType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
}

// ============================================================================
// Time, quantities, notes
// ============================================================================

/// A time range; either bound may be open.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Period {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// A measured amount.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A text note.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

// ============================================================================
// Metadata and extensions
// ============================================================================

/// Resource metadata; the converter only sets declared profiles and the source system.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Meta {
    pub fn profile(url: &str) -> Option<Self> {
        Some(Self {
            profile: vec![url.to_string()],
            source: None,
        })
    }
}

/// An extension with at most one `value[x]` or a list of nested extensions.
///
/// `value[x]` is modelled as one optional field per supported type; constructors set exactly
/// one of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_boolean: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_integer: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_date_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_coding: Option<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_codeable_concept: Option<CodeableConcept>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_reference: Option<Reference>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_identifier: Option<Identifier>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_address: Option<Address>,
}

impl Extension {
    fn with_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn string(url: &str, value: impl Into<String>) -> Self {
        Self {
            value_string: Some(value.into()),
            ..Self::with_url(url)
        }
    }

    pub fn code(url: &str, value: impl Into<String>) -> Self {
        Self {
            value_code: Some(value.into()),
            ..Self::with_url(url)
        }
    }

    pub fn boolean(url: &str, value: bool) -> Self {
        Self {
            value_boolean: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn integer(url: &str, value: i64) -> Self {
        Self {
            value_integer: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn date(url: &str, value: impl Into<String>) -> Self {
        Self {
            value_date: Some(value.into()),
            ..Self::with_url(url)
        }
    }

    pub fn date_time(url: &str, value: impl Into<String>) -> Self {
        Self {
            value_date_time: Some(value.into()),
            ..Self::with_url(url)
        }
    }

    pub fn coding(url: &str, value: Coding) -> Self {
        Self {
            value_coding: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn codeable_concept(url: &str, value: CodeableConcept) -> Self {
        Self {
            value_codeable_concept: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn reference(url: &str, value: Reference) -> Self {
        Self {
            value_reference: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn identifier(url: &str, value: Identifier) -> Self {
        Self {
            value_identifier: Some(value),
            ..Self::with_url(url)
        }
    }

    pub fn address(url: &str, value: Address) -> Self {
        Self {
            value_address: Some(value),
            ..Self::with_url(url)
        }
    }

    /// Complex extension made of nested sub-extensions.
    pub fn nested(url: &str, extension: Vec<Extension>) -> Self {
        Self {
            extension,
            ..Self::with_url(url)
        }
    }
}

/// Returns the first extension with `url` in `extensions`.
pub fn find_extension<'a>(extensions: &'a [Extension], url: &str) -> Option<&'a Extension> {
    extensions.iter().find(|e| e.url == url)
}

/// Replaces any extension with the same URL, then appends `extension`.
pub fn upsert_extension(extensions: &mut Vec<Extension>, extension: Extension) {
    extensions.retain(|e| e.url != extension.url);
    extensions.push(extension);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_absent_elements() {
        let id = Identifier::new("urn:oid:1.2.3", "42");
        let json = serde_json::to_value(&id).expect("serialize");
        assert_eq!(json, serde_json::json!({"system": "urn:oid:1.2.3", "value": "42"}));
    }

    #[test]
    fn renames_reserved_keys() {
        let name = HumanName {
            use_type: Some(NameUse::Maiden),
            family: Some("MARTIN".into()),
            ..HumanName::default()
        };
        let json = serde_json::to_value(&name).expect("serialize");
        assert_eq!(json["use"], "maiden");
        assert_eq!(json["family"], "MARTIN");
        assert!(json.get("given").is_none());
    }

    #[test]
    fn extension_sets_single_value_key() {
        let ext = Extension::date_time("http://example.org/x", "2025-01-01T00:00:00+01:00");
        let json = serde_json::to_value(&ext).expect("serialize");
        assert_eq!(json["valueDateTime"], "2025-01-01T00:00:00+01:00");
        assert_eq!(json.as_object().map(|o| o.len()), Some(2));
    }

    #[test]
    fn upsert_replaces_same_url() {
        let mut exts = vec![Extension::string("u", "a"), Extension::string("v", "b")];
        upsert_extension(&mut exts, Extension::string("u", "c"));
        assert_eq!(exts.len(), 2);
        assert_eq!(
            find_extension(&exts, "u").and_then(|e| e.value_string.as_deref()),
            Some("c")
        );
    }

    #[test]
    fn human_name_display_joins_given_then_family() {
        let name = HumanName {
            family: Some("DUPONT".into()),
            given: vec!["Jean".into(), "Pierre".into()],
            ..HumanName::default()
        };
        assert_eq!(name.display().as_deref(), Some("Jean Pierre DUPONT"));
    }
}
