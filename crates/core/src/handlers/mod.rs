//! Message-family handlers.
//!
//! Responsibilities:
//! - One handler per family: ADT, SIU, and the order/result messages (ORM, OML, ORU)
//! - Shared builders for the Patient and the side resources several families emit
//! - The French extension-segment enrichment pass run after the ADT handler
//!
//! Notes:
//! - Handlers only add to the bundle through [`ConversionContext`]; they never remove entries.
//! - A missing optional segment is never an error. A resource whose mandatory input is absent is
//!   skipped with a warning.

pub mod adt;
pub mod common;
pub mod enrichment;
pub mod orders;
pub mod patient;
pub mod scheduling;

use crate::context::ConversionContext;
use crate::error::ConversionResult;
use crate::router::MessageHandler;
use hl7v2::ParsedMessage;

/// Admission, discharge and transfer messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdtHandler;

impl MessageHandler for AdtHandler {
    fn message_types(&self) -> &'static [&'static str] {
        &["ADT"]
    }

    fn handle(&self, message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
        adt::handle(message, ctx)
    }
}

/// Scheduling messages.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulingHandler;

impl MessageHandler for SchedulingHandler {
    fn message_types(&self) -> &'static [&'static str] {
        &["SIU"]
    }

    fn handle(&self, message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
        scheduling::handle(message, ctx)
    }
}

/// Orders and observation results.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderHandler;

impl MessageHandler for OrderHandler {
    fn message_types(&self) -> &'static [&'static str] {
        &["ORM", "OML", "ORU"]
    }

    fn handle(&self, message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
        orders::handle(message, ctx)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::assembler::ConversionOutcome;
    use crate::config::ConversionOptions;
    use crate::router::Router;
    use crate::terminology::FrenchTerminology;
    use fhir::{Resource, ResourceType};
    use std::sync::Arc;

    /// Joins segment lines with the HL7 segment terminator.
    pub(crate) fn message(segments: &[&str]) -> String {
        segments.join("\r")
    }

    pub(crate) fn convert(raw: &str) -> ConversionOutcome {
        let options = ConversionOptions {
            id_seed: Some("handler-tests".into()),
            ..ConversionOptions::default()
        };
        convert_with(raw, &options)
    }

    pub(crate) fn convert_with(raw: &str, options: &ConversionOptions) -> ConversionOutcome {
        let message = hl7v2::parse(raw).expect("parse");
        let terminology = FrenchTerminology::bundled().expect("bundled terminology");
        Router::default()
            .route(&message, options, Arc::new(terminology))
            .expect("convert")
    }

    pub(crate) fn resources(outcome: &ConversionOutcome, resource_type: ResourceType) -> Vec<&Resource> {
        outcome
            .bundle
            .resources_of(resource_type)
            .map(|entry| &entry.resource)
            .collect()
    }
}
