//! Message type detection and dispatch.
//!
//! Responsibilities:
//! - Read MSH-9 into `{message type, event, structure, supported}`
//! - Hold the static capability table of supported families
//! - Dispatch a parsed message to the handler registered for its type
//!
//! Notes:
//! - The capability table answers capability queries only. An event missing from it is a warning,
//!   and the type's handler still runs.

use crate::assembler::{self, ConversionOutcome};
use crate::config::ConversionOptions;
use crate::context::ConversionContext;
use crate::error::{ConversionError, ConversionResult};
use crate::handlers::{AdtHandler, OrderHandler, SchedulingHandler};
use crate::terminology::TerminologyLookup;
use hl7v2::ParsedMessage;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Detection
// ============================================================================

/// Classification of a message, read from MSH-9.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageType {
    /// MSH-9.1 (`ADT`, `SIU`, ...).
    pub message_type: String,
    /// MSH-9.2 (`A01`, `S12`, ...).
    pub event_type: String,
    /// MSH-9.3, or `<type>_<event>` when absent.
    pub structure: String,
    /// Whether the event is listed in the capability table.
    pub supported: bool,
}

impl MessageType {
    /// `<type>_<event>`, as used in the MessageHeader event code.
    pub fn event_code(&self) -> String {
        format!("{}_{}", self.message_type, self.event_type)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}^{}^{}", self.message_type, self.event_type, self.structure)
    }
}

fn is_code(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Classifies a parsed message from its header.
///
/// # Errors
///
/// Returns [`ConversionError::MissingHeader`] when MSH-9.1 or MSH-9.2 is absent or is not a
/// three-character code. A combined `ADT_A01` in MSH-9.1 is accepted.
pub fn detect_type(message: &ParsedMessage) -> ConversionResult<MessageType> {
    let header = message.header().ok_or_else(|| ConversionError::MissingHeader {
        field: "MSH",
        reason: "message has no header segment".into(),
    })?;

    let first = header.component_value(9, 1).map(str::to_ascii_uppercase);
    let (message_type, event) = match first.as_deref().and_then(|f| f.split_once('_')) {
        Some((t, e)) if header.component_value(9, 2).is_none() => (Some(t.to_string()), Some(e.to_string())),
        _ => (
            first.clone(),
            header.component_value(9, 2).map(str::to_ascii_uppercase),
        ),
    };

    let message_type = message_type
        .filter(|t| is_code(t, 3))
        .ok_or_else(|| ConversionError::MissingHeader {
            field: "MSH-9.1",
            reason: format!("message type is missing or malformed: '{}'", header.value(9).unwrap_or_default()),
        })?;
    let event_type = event
        .filter(|e| is_code(e, 3))
        .ok_or_else(|| ConversionError::MissingHeader {
            field: "MSH-9.2",
            reason: "triggering event is missing or malformed".into(),
        })?;
    let structure = header
        .component_value(9, 3)
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| format!("{message_type}_{event_type}"));
    let supported = capability(&message_type)
        .is_some_and(|c| c.events.contains(&event_type.as_str()));

    Ok(MessageType {
        message_type,
        event_type,
        structure,
        supported,
    })
}

// ============================================================================
// Capability table
// ============================================================================

/// One supported message family.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub message_type: &'static str,
    pub events: &'static [&'static str],
    pub segments: &'static [&'static str],
    pub resources: &'static [&'static str],
}

const CAPABILITIES: [Capability; 5] = [
    Capability {
        message_type: "ADT",
        events: &[
            "A01", "A02", "A03", "A04", "A05", "A06", "A07", "A08", "A11", "A12", "A13", "A21",
            "A22", "A28", "A31", "A38", "A40",
        ],
        segments: &[
            "MSH", "EVN", "PID", "PD1", "MRG", "NK1", "PV1", "PV2", "ROL", "IN1", "IN2", "ZBE", "ZFP",
            "ZFV", "ZFM", "ZFD", "ZFC",
        ],
        resources: &[
            "MessageHeader", "Patient", "Encounter", "Location", "Organization", "Practitioner",
            "PractitionerRole", "RelatedPerson", "Coverage",
        ],
    },
    Capability {
        message_type: "SIU",
        events: &["S12", "S13", "S14", "S15", "S16", "S17", "S26"],
        segments: &["MSH", "SCH", "TQ1", "NTE", "PID", "PV1", "RGS", "AIS", "AIG", "AIL", "AIP"],
        resources: &[
            "MessageHeader", "Patient", "Appointment", "Schedule", "Location", "Practitioner",
            "Organization",
        ],
    },
    Capability {
        message_type: "ORM",
        events: &["O01"],
        segments: &["MSH", "PID", "PV1", "ORC", "OBR", "TQ1", "NTE", "OBX"],
        resources: &[
            "MessageHeader", "Patient", "ServiceRequest", "Observation", "Practitioner",
            "Organization",
        ],
    },
    Capability {
        message_type: "OML",
        events: &["O21"],
        segments: &["MSH", "PID", "PV1", "ORC", "OBR", "TQ1", "NTE", "OBX", "SPM"],
        resources: &[
            "MessageHeader", "Patient", "ServiceRequest", "Observation", "Practitioner",
            "Organization",
        ],
    },
    Capability {
        message_type: "ORU",
        events: &["R01"],
        segments: &["MSH", "PID", "PV1", "ORC", "OBR", "NTE", "OBX"],
        resources: &[
            "MessageHeader", "Patient", "ServiceRequest", "Observation", "Practitioner",
            "Organization",
        ],
    },
];

/// The static table of supported message families.
pub fn capabilities() -> &'static [Capability] {
    &CAPABILITIES
}

pub fn capability(message_type: &str) -> Option<&'static Capability> {
    CAPABILITIES
        .iter()
        .find(|c| c.message_type.eq_ignore_ascii_case(message_type))
}

// ============================================================================
// Dispatch
// ============================================================================

/// A handler for one or more message families.
pub trait MessageHandler: Send + Sync {
    /// MSH-9.1 values served by this handler.
    fn message_types(&self) -> &'static [&'static str];

    /// Adds the resources of `message` to the context's bundle.
    fn handle(&self, message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()>;
}

/// Dispatches parsed messages to their handler.
pub struct Router {
    handlers: Vec<Box<dyn MessageHandler>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(vec![
            Box::new(AdtHandler),
            Box::new(SchedulingHandler),
            Box::new(OrderHandler),
        ])
    }
}

impl Router {
    pub fn new(handlers: Vec<Box<dyn MessageHandler>>) -> Self {
        Self { handlers }
    }

    pub fn handler_for(&self, message_type: &str) -> Option<&dyn MessageHandler> {
        self.handlers
            .iter()
            .find(|h| h.message_types().iter().any(|t| t.eq_ignore_ascii_case(message_type)))
            .map(|h| h.as_ref())
    }

    /// Converts a parsed message into a bundle.
    ///
    /// # Errors
    ///
    /// - [`ConversionError::MissingHeader`] when MSH-9 cannot be read
    /// - [`ConversionError::UnsupportedType`] when no handler serves the message type
    /// - [`ConversionError::Mapping`] when a handler cannot complete
    pub fn route(
        &self,
        message: &ParsedMessage,
        options: &ConversionOptions,
        terminology: Arc<dyn TerminologyLookup>,
    ) -> ConversionResult<ConversionOutcome> {
        let message_type = detect_type(message)?;
        let handler = self.handler_for(&message_type.message_type).ok_or_else(|| {
            ConversionError::UnsupportedType {
                message_type: message_type.message_type.clone(),
                event: message_type.event_type.clone(),
            }
        })?;

        let mut ctx = assembler::create_base_bundle(message, message_type, options, terminology)?;
        for warning in message.warnings() {
            ctx.record_parse_warning(warning);
        }
        if !ctx.message_type().supported {
            let reason = format!(
                "event {} is not in the capability table; converted with the {} handler",
                ctx.message_type().event_type,
                ctx.message_type().message_type
            );
            ctx.warn("MSH", Some(9), reason);
        }

        handler.handle(message, &mut ctx)?;
        assembler::finalize(message, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(msh9: &str) -> ParsedMessage {
        hl7v2::parse(&format!("MSH|^~\\&|APP|FAC|RCV|RFAC|20250101120000||{msh9}|1|P|2.5"))
            .expect("parse")
    }

    #[test]
    fn reads_type_event_and_structure() {
        let detected = detect_type(&header("ADT^A01^ADT_A01")).expect("detect");
        assert_eq!(detected.message_type, "ADT");
        assert_eq!(detected.event_type, "A01");
        assert_eq!(detected.structure, "ADT_A01");
        assert!(detected.supported);
        assert_eq!(detected.event_code(), "ADT_A01");
    }

    #[test]
    fn synthesises_structure() {
        let detected = detect_type(&header("SIU^S12")).expect("detect");
        assert_eq!(detected.structure, "SIU_S12");
    }

    #[test]
    fn accepts_combined_code() {
        let detected = detect_type(&header("ORU_R01")).expect("detect");
        assert_eq!(detected.message_type, "ORU");
        assert_eq!(detected.event_type, "R01");
    }

    #[test]
    fn unknown_event_is_unsupported_but_detected() {
        let detected = detect_type(&header("ADT^A60")).expect("detect");
        assert!(!detected.supported);
    }

    #[test]
    fn missing_event_is_a_header_error() {
        let err = detect_type(&header("ADT")).expect_err("no event");
        match err {
            ConversionError::MissingHeader { field, .. } => assert_eq!(field, "MSH-9.2"),
            other => panic!("unexpected error: {other:?}"),
        }
        let err = detect_type(&header("ADT^A0")).expect_err("bad event");
        assert!(matches!(err, ConversionError::MissingHeader { field: "MSH-9.2", .. }));
        let err = detect_type(&header("")).expect_err("no type");
        assert!(matches!(err, ConversionError::MissingHeader { field: "MSH-9.1", .. }));
    }

    #[test]
    fn capability_table_lists_families() {
        let types: Vec<_> = capabilities().iter().map(|c| c.message_type).collect();
        assert_eq!(types, ["ADT", "SIU", "ORM", "OML", "ORU"]);
        assert!(capability("siu").is_some_and(|c| c.events.contains(&"S26")));
    }

    #[test]
    fn default_router_serves_every_family() {
        let router = Router::default();
        for capability in capabilities() {
            assert!(router.handler_for(capability.message_type).is_some(), "{}", capability.message_type);
        }
        assert!(router.handler_for("MFN").is_none());
    }
}
