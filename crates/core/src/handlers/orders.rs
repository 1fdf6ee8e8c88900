//! Order and result conversion (ORM^O01, OML^O21, ORU^R01).
//!
//! Responsibilities:
//! - Group the segment stream into orders: an ORC sets the context for the OBR that follows,
//!   TQ1 refines its timing, OBX results and NTE notes attach to the nearest order or result
//! - One ServiceRequest per order, one Observation per OBX
//!
//! Notes:
//! - An OBR without its own ORC inherits the previous ORC.
//! - An ORC with no OBR still yields a ServiceRequest.

use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::handlers::common::{self, practitioner_reference, practitioner_references};
use crate::handlers::patient::build_patient;
use crate::resolvers::codes::{
    codeable_concept, coded, coding_system_uri, observation_status, order_control_status, order_status,
    request_priority,
};
use crate::resolvers::datetime::{format_datetime, parse_hl7_datetime, to_fhir_datetime};
use fhir::fr_core::{CS_OBSERVATION_INTERPRETATION, CS_UCUM, CS_V2_0203};
use fhir::{
    Annotation, Identifier, Observation, ObservationReferenceRange, Quantity, Reference,
    RequestStatus, Resource, ServiceRequest,
};
use hl7v2::{ParsedMessage, Segment};

// ============================================================================
// Segment grouping
// ============================================================================

#[derive(Default)]
struct OrderGroup<'a> {
    orc: Option<&'a Segment>,
    obr: Option<&'a Segment>,
    timing: Option<&'a Segment>,
    notes: Vec<&'a Segment>,
    results: Vec<ResultGroup<'a>>,
}

struct ResultGroup<'a> {
    obx: &'a Segment,
    notes: Vec<&'a Segment>,
}

impl OrderGroup<'_> {
    fn is_started(&self) -> bool {
        self.orc.is_some() || self.obr.is_some() || !self.results.is_empty()
    }
}

/// Splits the message body into order groups, in message order.
fn group_orders(message: &ParsedMessage) -> Vec<OrderGroup<'_>> {
    let mut groups = Vec::new();
    let mut current = OrderGroup::default();
    let mut last_orc: Option<&Segment> = None;

    for segment in message.segments_in_order() {
        match segment.segment_type() {
            "ORC" => {
                if current.is_started() {
                    groups.push(std::mem::take(&mut current));
                }
                current.orc = Some(segment);
                last_orc = Some(segment);
            }
            "OBR" => {
                if current.obr.is_some() || !current.results.is_empty() {
                    groups.push(std::mem::take(&mut current));
                    current.orc = last_orc;
                }
                current.obr = Some(segment);
            }
            "TQ1" if current.is_started() => current.timing = Some(segment),
            "OBX" => current.results.push(ResultGroup {
                obx: segment,
                notes: Vec::new(),
            }),
            "NTE" => {
                if let Some(result) = current.results.last_mut() {
                    result.notes.push(segment);
                } else if current.is_started() {
                    current.notes.push(segment);
                }
            }
            _ => {}
        }
    }
    if current.is_started() {
        groups.push(current);
    }
    groups
}

// ============================================================================
// Handler
// ============================================================================

pub fn handle(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    build_patient(message, ctx)?;
    let groups = group_orders(message);
    if groups.is_empty() {
        ctx.warn("ORC", None, "message has no ORC, OBR or OBX segment; nothing to convert");
    }
    for group in &groups {
        let request = if group.orc.is_some() || group.obr.is_some() {
            build_service_request(group, ctx)?
        } else {
            None
        };
        for result in &group.results {
            build_observation(result, group.obr, request.as_deref(), ctx)?;
        }
    }
    common::header_organizations(message, ctx)?;
    Ok(())
}

fn build_service_request(group: &OrderGroup<'_>, ctx: &mut ConversionContext) -> ConversionResult<Option<String>> {
    let Some(subject) = ctx.reference(ResourceRole::Patient) else {
        ctx.warn("OBR", None, "order without a Patient; ServiceRequest skipped");
        return Ok(None);
    };
    let orc = group.orc;
    let obr = group.obr;
    let tq1 = group.timing;

    let mut request = ServiceRequest {
        status: request_status(orc, obr, ctx.message_type().message_type == "ORU"),
        intent: "order".to_string(),
        priority: request_priority_of(orc, obr, tq1),
        code: obr.and_then(|obr| codeable_concept(obr.field(4))),
        subject,
        identifier: order_identifiers(orc, obr),
        reason_code: obr
            .map(|obr| obr.field(31).repetitions().filter_map(codeable_concept).collect())
            .unwrap_or_default(),
        authored_on: orc
            .and_then(|orc| orc.value(9))
            .and_then(|raw| to_fhir_datetime(raw, ctx.timezone())),
        note: group
            .notes
            .iter()
            .filter_map(|nte| nte.value(3))
            .map(|text| Annotation {
                text: text.to_string(),
                time: None,
            })
            .collect(),
        ..ServiceRequest::default()
    };
    if request.code.is_none() {
        ctx.warn("OBR", Some(4), "order has no universal service identifier");
    }

    // OBR-6 requested, OBR-7 observation, TQ1-7 start, ORC-7.4 quantity/timing start
    request.occurrence_date_time = [
        obr.and_then(|obr| obr.value(6)),
        obr.and_then(|obr| obr.value(7)),
        tq1.and_then(|tq1| tq1.component_value(7, 1)),
        orc.and_then(|orc| orc.component_value(7, 4)),
    ]
    .into_iter()
    .flatten()
    .find_map(|raw| to_fhir_datetime(raw, ctx.timezone()));

    let requester_field = match orc.map(|orc| orc.field(12)) {
        Some(field) if !field.is_empty() => Some(field),
        _ => obr.map(|obr| obr.field(16)),
    };
    if let Some(field) = requester_field {
        request.requester = practitioner_reference(ctx, field)?;
    }
    if let Some(orc) = orc {
        if let Some(facility) = common::organization_reference(ctx, orc.field(21))? {
            request.performer.push(facility);
        }
    }

    let full_url = ctx.add_with_role(ResourceRole::PrimaryServiceRequest, Resource::ServiceRequest(request))?;
    ctx.add_focus(&full_url);
    tracing::debug!("service request {} built", full_url);
    Ok(Some(full_url))
}

/// ORC-5, then ORC-1; results messages default to completed, orders to active.
fn request_status(orc: Option<&Segment>, obr: Option<&Segment>, is_result: bool) -> RequestStatus {
    let from_orc = orc.and_then(|orc| {
        orc.value(5)
            .and_then(order_status)
            .or_else(|| orc.value(1).and_then(order_control_status))
    });
    let from_obr = obr
        .and_then(|obr| obr.value(25))
        .filter(|code| matches!(*code, "F" | "C"))
        .map(|_| RequestStatus::Completed);
    from_orc.or(from_obr).unwrap_or(if is_result {
        RequestStatus::Completed
    } else {
        RequestStatus::Active
    })
}

/// TQ1-9, then ORC-7.6, then OBR-27.6, then OBR-5.
fn request_priority_of(
    orc: Option<&Segment>,
    obr: Option<&Segment>,
    tq1: Option<&Segment>,
) -> Option<fhir::RequestPriority> {
    [
        tq1.and_then(|tq1| tq1.component_value(9, 1)),
        orc.and_then(|orc| orc.component_value(7, 6)),
        obr.and_then(|obr| obr.component_value(27, 6)),
        obr.and_then(|obr| obr.value(5)),
    ]
    .into_iter()
    .flatten()
    .find_map(request_priority)
}

/// Placer (OBR-2/ORC-2) and filler (OBR-3/ORC-3) order numbers.
fn order_identifiers(orc: Option<&Segment>, obr: Option<&Segment>) -> Vec<Identifier> {
    [(2, "PLAC", "Placer Identifier"), (3, "FILL", "Filler Identifier")]
        .into_iter()
        .filter_map(|(field, code, display)| {
            let ei = obr
                .map(|obr| obr.field(field))
                .filter(|f| !f.is_empty())
                .or_else(|| orc.map(|orc| orc.field(field)))?
                .first_repetition();
            let value = ei.component_value(1)?;
            Some(Identifier {
                identifier_type: Some(coded(CS_V2_0203, code, Some(display))),
                system: ei.component_value(3).and_then(coding_system_uri),
                value: Some(value.to_string()),
                ..Identifier::default()
            })
        })
        .collect()
}

// ============================================================================
// Observations
// ============================================================================

fn build_observation(
    result: &ResultGroup<'_>,
    obr: Option<&Segment>,
    request: Option<&str>,
    ctx: &mut ConversionContext,
) -> ConversionResult<()> {
    let obx = result.obx;
    let Some(code) = codeable_concept(obx.field(3)) else {
        ctx.warn("OBX", Some(3), "result without an observation identifier; skipped");
        return Ok(());
    };

    let mut observation = Observation {
        status: obx.value(11).map(observation_status).unwrap_or(fhir::ObservationStatus::Final),
        code,
        subject: ctx.reference(ResourceRole::Patient),
        based_on: request.map(Reference::to).into_iter().collect(),
        effective_date_time: [obx.value(14), obr.and_then(|obr| obr.value(7))]
            .into_iter()
            .flatten()
            .find_map(|raw| to_fhir_datetime(raw, ctx.timezone())),
        issued: obr
            .and_then(|obr| obr.value(22))
            .and_then(|raw| parse_hl7_datetime(raw, ctx.timezone()))
            .map(|dt| format_datetime(&dt)),
        interpretation: obx
            .field(8)
            .repetitions()
            .filter_map(|flag| flag.component_value(1))
            .map(|flag| coded(CS_OBSERVATION_INTERPRETATION, flag, None))
            .collect(),
        reference_range: obx.value(7).map(reference_range).into_iter().collect(),
        note: result
            .notes
            .iter()
            .filter_map(|nte| nte.value(3))
            .map(|text| Annotation {
                text: text.to_string(),
                time: None,
            })
            .collect(),
        ..Observation::default()
    };
    observation.performer = practitioner_references(ctx, obx.field(16))?;
    apply_value(obx, &mut observation, ctx);

    ctx.add(Resource::Observation(observation))?;
    Ok(())
}

/// OBX-5 typed by OBX-2.
fn apply_value(obx: &Segment, observation: &mut Observation, ctx: &mut ConversionContext) {
    let value = obx.field(5);
    if value.is_empty() {
        return;
    }
    let value_type = obx.value(2).map(str::to_ascii_uppercase);
    match value_type.as_deref() {
        Some("NM") | Some("SN") => {
            let raw = value.flatten_text("");
            match parse_number(&raw) {
                Some(number) => observation.value_quantity = Some(quantity(number, obx)),
                None => {
                    ctx.warn("OBX", Some(5), format!("numeric result '{raw}' is not a number; kept as text"));
                    observation.value_string = Some(raw);
                }
            }
        }
        Some("CE") | Some("CWE") | Some("CNE") => {
            observation.value_codeable_concept = codeable_concept(value);
        }
        Some("TS") | Some("DT") | Some("DTM") => match value.value().and_then(|raw| to_fhir_datetime(raw, ctx.timezone())) {
            Some(when) => observation.value_date_time = Some(when),
            None => observation.value_string = value.value().map(str::to_string),
        },
        _ => {
            let text: Vec<String> = value
                .repetitions()
                .map(|repetition| repetition.flatten_text(" "))
                .filter(|text| !text.is_empty())
                .collect();
            observation.value_string = Some(text.join("\n"));
        }
    }
}

/// Decimal comma accepted; `NaN` and infinities are not numbers in FHIR JSON.
fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// OBX-6 units: UCUM when declared so or when no system is given.
fn quantity(value: f64, obx: &Segment) -> Quantity {
    let units = obx.field(6);
    let code = units.component_value(1);
    let system = match units.component_value(3) {
        Some(name) => coding_system_uri(name),
        None => code.map(|_| CS_UCUM.to_string()),
    };
    Quantity {
        value: Some(value),
        unit: units.component_value(2).or(code).map(str::to_string),
        system,
        code: code.map(str::to_string),
    }
}

/// OBX-7 `low-high`, `<high`, `>low`, or free text.
fn reference_range(raw: &str) -> ObservationReferenceRange {
    let bound = |text: &str| {
        parse_number(text).map(|value| Quantity {
            value: Some(value),
            ..Quantity::default()
        })
    };
    let raw = raw.trim();
    let parsed = if let Some(high) = raw.strip_prefix('<') {
        bound(high.trim_start_matches('=')).map(|high| (None, Some(high)))
    } else if let Some(low) = raw.strip_prefix('>') {
        bound(low.trim_start_matches('=')).map(|low| (Some(low), None))
    } else {
        raw.split_once('-')
            .and_then(|(low, high)| Some((Some(bound(low)?), Some(bound(high)?))))
    };
    match parsed {
        Some((low, high)) => ObservationReferenceRange {
            low,
            high,
            text: None,
        },
        None => ObservationReferenceRange {
            text: Some(raw.to_string()),
            ..ObservationReferenceRange::default()
        },
    }
}
