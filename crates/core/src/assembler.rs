//! Bundle assembly.
//!
//! Responsibilities:
//! - Create the base bundle: id, timestamp from MSH-7, and the MessageHeader as entry 0 for
//!   `message` bundles
//! - Run the French extension-segment enrichment pass for ADT messages
//! - Hand the finished bundle and warnings back to the caller

use crate::config::ConversionOptions;
use crate::constants::{APPLICATION_ENDPOINT_PREFIX, UNKNOWN_APPLICATION};
use crate::context::{ConversionContext, ResourceRole};
use crate::error::{ConversionError, ConversionResult, ConversionWarning};
use crate::handlers::enrichment;
use crate::resolvers::datetime::{format_datetime, parse_hl7_datetime};
use crate::router::MessageType;
use crate::terminology::TerminologyLookup;
use chrono::Utc;
use fhir::fr_core::CS_V2_0003;
use fhir::{Bundle, BundleType, Coding, MessageDestination, MessageHeader, MessageSource, Resource};
use hl7fr_uuid::IdGenerator;
use hl7v2::ParsedMessage;
use serde::Serialize;
use std::sync::Arc;

/// Result of a successful conversion.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    pub bundle: Bundle,
    pub message_type: MessageType,
    pub warnings: Vec<ConversionWarning>,
}

fn application_endpoint(name: &str) -> String {
    format!("{APPLICATION_ENDPOINT_PREFIX}{name}")
}

/// Builds the conversion context around a fresh bundle.
///
/// The timestamp is MSH-7 in FHIR form, or the current time in the configured offset when MSH-7
/// is absent or malformed. For `message` bundles the MessageHeader is added first.
pub fn create_base_bundle(
    message: &ParsedMessage,
    message_type: MessageType,
    options: &ConversionOptions,
    terminology: Arc<dyn TerminologyLookup>,
) -> ConversionResult<ConversionContext> {
    let header = message.header().ok_or_else(|| ConversionError::MissingHeader {
        field: "MSH",
        reason: "message has no header segment".into(),
    })?;
    let timezone = options.timezone();
    let message_time = header.value(7).map(str::to_string);
    let parsed_time = message_time
        .as_deref()
        .and_then(|raw| parse_hl7_datetime(raw, timezone));
    let timestamp = format_datetime(&parsed_time.unwrap_or_else(|| Utc::now().with_timezone(&timezone)));

    let mut ids = IdGenerator::from_seed(options.id_seed.as_deref());
    let bundle_type = options.effective_bundle_type();
    let bundle = Bundle::new(ids.next_id().to_string(), bundle_type, timestamp);
    let mut ctx = ConversionContext::new(
        message_type,
        options.clone(),
        bundle,
        ids,
        terminology,
        message_time.clone(),
    );
    if message_time.is_some() && parsed_time.is_none() {
        ctx.warn("MSH", Some(7), "message date/time is malformed; using the current time");
    }

    if bundle_type == BundleType::Message {
        let sending_app = header.component_value(3, 1).unwrap_or(UNKNOWN_APPLICATION);
        let receiving_app = header.component_value(5, 1);
        let destination = MessageDestination {
            name: receiving_app.map(str::to_string),
            receiver: None,
            endpoint: application_endpoint(receiving_app.unwrap_or(UNKNOWN_APPLICATION)),
        };
        let message_header = MessageHeader {
            event_coding: Coding::new(CS_V2_0003, ctx.message_type().event_code()),
            destination: vec![destination],
            source: MessageSource {
                name: Some(sending_app.to_string()),
                software: None,
                version: header.value(12).map(str::to_string),
                endpoint: application_endpoint(sending_app),
            },
            ..MessageHeader::default()
        };
        ctx.add_with_role(ResourceRole::MessageHeader, Resource::MessageHeader(message_header))?;
    }
    Ok(ctx)
}

/// Runs the post-handler passes and releases the bundle.
pub fn finalize(message: &ParsedMessage, mut ctx: ConversionContext) -> ConversionResult<ConversionOutcome> {
    if ctx.options().french_mode && ctx.message_type().message_type == "ADT" {
        enrichment::enrich(message, &mut ctx)?;
    }
    let (message_type, bundle, warnings) = ctx.into_parts();
    tracing::info!(
        "converted {} into a {} bundle with {} entries ({} warnings)",
        message_type,
        bundle.bundle_type.as_str(),
        bundle.len(),
        warnings.len()
    );
    Ok(ConversionOutcome {
        bundle,
        message_type,
        warnings,
    })
}
