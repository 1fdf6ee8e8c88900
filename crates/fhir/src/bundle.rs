//! Bundle container.
//!
//! Responsibilities:
//! - Hold the ordered list of entries produced by one conversion
//! - Keep `fullUrl` unique across entries
//! - Serialise to, and strictly parse from, FHIR JSON

use crate::{FhirError, FhirResult, Resource, ResourceType};
use serde::{Deserialize, Serialize};

/// Bundle type. Only the kinds a converter can produce are modelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleType {
    #[default]
    Message,
    Transaction,
    Collection,
    Batch,
}

impl BundleType {
    pub fn as_str(self) -> &'static str {
        match self {
            BundleType::Message => "message",
            BundleType::Transaction => "transaction",
            BundleType::Collection => "collection",
            BundleType::Batch => "batch",
        }
    }

    /// Parses the wire code. Returns `None` for unsupported kinds.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "message" => Some(BundleType::Message),
            "transaction" => Some(BundleType::Transaction),
            "collection" => Some(BundleType::Collection),
            "batch" => Some(BundleType::Batch),
            _ => None,
        }
    }

    /// Whether entries carry a `request` element.
    pub fn has_requests(self) -> bool {
        matches!(self, BundleType::Transaction | BundleType::Batch)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpVerb {
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntryRequest {
    pub method: HttpVerb,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    pub full_url: String,
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<BundleEntryRequest>,
}

fn bundle_marker() -> String {
    "Bundle".to_string()
}

/// A bundle of converted resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default = "bundle_marker")]
    resource_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type")]
    pub bundle_type: BundleType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(default)]
    entry: Vec<BundleEntry>,
}

impl Bundle {
    pub fn new(id: impl Into<String>, bundle_type: BundleType, timestamp: impl Into<String>) -> Self {
        Self {
            resource_type: bundle_marker(),
            id: Some(id.into()),
            bundle_type,
            timestamp: Some(timestamp.into()),
            entry: Vec::new(),
        }
    }

    /// Appends an entry.
    ///
    /// For transaction and batch bundles a `POST <resourceType>` request is attached.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::InvalidInput`] if `full_url` is already used by another entry.
    pub fn push(&mut self, full_url: impl Into<String>, resource: Resource) -> FhirResult<()> {
        let full_url = full_url.into();
        if self.contains(&full_url) {
            return Err(FhirError::InvalidInput(format!(
                "duplicate fullUrl in bundle: {full_url}"
            )));
        }
        let request = self.bundle_type.has_requests().then(|| BundleEntryRequest {
            method: HttpVerb::Post,
            url: resource.resource_type().as_str().to_string(),
        });
        self.entry.push(BundleEntry {
            full_url,
            resource,
            request,
        });
        Ok(())
    }

    pub fn contains(&self, full_url: &str) -> bool {
        self.entry.iter().any(|e| e.full_url == full_url)
    }

    pub fn entries(&self) -> &[BundleEntry] {
        &self.entry
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }

    pub fn resource(&self, full_url: &str) -> Option<&Resource> {
        self.entry
            .iter()
            .find(|e| e.full_url == full_url)
            .map(|e| &e.resource)
    }

    pub fn resource_mut(&mut self, full_url: &str) -> Option<&mut Resource> {
        self.entry
            .iter_mut()
            .find(|e| e.full_url == full_url)
            .map(|e| &mut e.resource)
    }

    /// Entries holding resources of `resource_type`, in bundle order.
    pub fn resources_of(&self, resource_type: ResourceType) -> impl Iterator<Item = &BundleEntry> {
        self.entry
            .iter()
            .filter(move |e| e.resource.resource_type() == resource_type)
    }

    pub fn to_json_pretty(&self) -> FhirResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> FhirResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Strictly parses a bundle, reporting the JSON path of the first mismatch.
    pub fn parse_json(input: &str) -> FhirResult<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(input);
        let bundle: Bundle = serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            let source = e.into_inner();
            let path = if path.is_empty() { "<root>" } else { path.as_str() };
            FhirError::Translation(format!("Bundle schema mismatch at {path}: {source}"))
        })?;
        if bundle.resource_type != "Bundle" {
            return Err(FhirError::InvalidInput(format!(
                "expected resourceType Bundle, found {}",
                bundle.resource_type
            )));
        }
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Organization, Patient};

    fn patient() -> Resource {
        Resource::Patient(Patient {
            id: Some("p".into()),
            ..Patient::default()
        })
    }

    #[test]
    fn rejects_duplicate_full_url() {
        let mut bundle = Bundle::new("b", BundleType::Message, "2025-01-01T00:00:00+01:00");
        bundle.push("urn:uuid:1", patient()).expect("first push");
        let err = bundle
            .push("urn:uuid:1", patient())
            .expect_err("duplicate should fail");
        match err {
            FhirError::InvalidInput(msg) => assert!(msg.contains("urn:uuid:1")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(bundle.len(), 1);
    }

    #[test]
    fn transaction_entries_carry_post_request() {
        let mut bundle = Bundle::new("b", BundleType::Transaction, "2025-01-01T00:00:00+01:00");
        bundle.push("urn:uuid:1", patient()).expect("push");
        let json: serde_json::Value =
            serde_json::from_str(&bundle.to_json().expect("json")).expect("value");
        assert_eq!(json["entry"][0]["request"]["method"], "POST");
        assert_eq!(json["entry"][0]["request"]["url"], "Patient");
    }

    #[test]
    fn message_entries_have_no_request() {
        let mut bundle = Bundle::new("b", BundleType::Message, "2025-01-01T00:00:00+01:00");
        bundle.push("urn:uuid:1", patient()).expect("push");
        assert!(bundle.entries()[0].request.is_none());
    }

    #[test]
    fn round_trips_through_json() {
        let mut bundle = Bundle::new("b", BundleType::Collection, "2025-01-01T00:00:00+01:00");
        bundle.push("urn:uuid:1", patient()).expect("push");
        bundle
            .push("urn:uuid:2", Resource::Organization(Organization::default()))
            .expect("push");
        let json = bundle.to_json_pretty().expect("json");
        assert!(json.contains(r#""resourceType": "Bundle""#));
        let parsed = Bundle::parse_json(&json).expect("parse");
        assert_eq!(parsed, bundle);
        assert_eq!(parsed.resources_of(ResourceType::Organization).count(), 1);
    }

    #[test]
    fn parse_reports_path() {
        let json = r#"{"resourceType":"Bundle","type":"nonsense","entry":[]}"#;
        let err = Bundle::parse_json(json).expect_err("bad type");
        match err {
            FhirError::Translation(msg) => assert!(msg.contains("type"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
