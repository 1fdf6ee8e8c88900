//! MessageHeader wire model.
//!
//! Responsibilities:
//! - Describe the originating and destination systems of a converted message
//! - Carry the event code (`<type>_<event>`) and the `focus` references to principal resources
//!
//! Notes:
//! - When a bundle is of type `message`, its MessageHeader is always entry 0

use crate::{Coding, Extension, Meta, Reference};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub endpoint: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageDestination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<Reference>,

    pub endpoint: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    pub event_coding: Coding,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination: Vec<MessageDestination>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Reference>,

    pub source: MessageSource,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus: Vec<Reference>,
}

impl MessageHeader {
    /// Adds `full_url` to `focus` unless it is already listed.
    pub fn add_focus(&mut self, full_url: &str) {
        if self
            .focus
            .iter()
            .any(|r| r.reference.as_deref() == Some(full_url))
        {
            return;
        }
        self.focus.push(Reference::to(full_url));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_is_deduplicated() {
        let mut header = MessageHeader::default();
        header.add_focus("urn:uuid:a");
        header.add_focus("urn:uuid:b");
        header.add_focus("urn:uuid:a");
        assert_eq!(header.focus.len(), 2);
    }

    #[test]
    fn serializes_event_coding() {
        let header = MessageHeader {
            event_coding: Coding::new("http://terminology.hl7.org/CodeSystem/v2-0003", "ADT_A01"),
            source: MessageSource {
                name: Some("APP".into()),
                endpoint: "urn:hl7v2:APP".into(),
                ..MessageSource::default()
            },
            ..MessageHeader::default()
        };
        let json = serde_json::to_value(&header).expect("serialize");
        assert_eq!(json["eventCoding"]["code"], "ADT_A01");
        assert_eq!(json["source"]["endpoint"], "urn:hl7v2:APP");
        assert!(json.get("focus").is_none());
    }
}
