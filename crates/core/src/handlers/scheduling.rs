//! SIU (scheduling) conversion.
//!
//! Responsibilities:
//! - Appointment from SCH (status from the triggering event), TQ1 and NTE
//! - Resource groups: AIS service, AIG general resource (Schedule), AIL location, AIP personnel
//! - Patient participant from PID
//!
//! Notes:
//! - The start comes from SCH-11.4, then TQ1-7, then the first AIS-4; the duration from SCH-9/10,
//!   then AIS-7/8.

use crate::context::{ConversionContext, ResourceRole};
use crate::error::ConversionResult;
use crate::handlers::common::{self, location_reference, practitioner_reference};
use crate::handlers::patient::build_patient;
use crate::resolvers::codes::{appointment_status, codeable_concept, oid_uri};
use crate::resolvers::datetime::to_fhir_datetime;
use fhir::{
    Appointment, AppointmentParticipant, AppointmentStatus, Identifier, IdentifierUse, ParticipationStatus,
    Reference, Resource, Schedule,
};
use hl7v2::{FieldValue, ParsedMessage, Segment};

pub fn handle(message: &ParsedMessage, ctx: &mut ConversionContext) -> ConversionResult<()> {
    let patient = build_patient(message, ctx)?;
    match message.segment("SCH") {
        Some(sch) => build_appointment(message, sch, patient, ctx)?,
        None => ctx.warn("SCH", None, "message has no SCH segment; no Appointment created"),
    }
    common::header_organizations(message, ctx)?;
    Ok(())
}

fn build_appointment(
    message: &ParsedMessage,
    sch: &Segment,
    patient: Option<String>,
    ctx: &mut ConversionContext,
) -> ConversionResult<()> {
    let status = appointment_status(ctx.event());
    let tq1 = message.segment("TQ1");
    let services = message.segments_of("AIS");

    let mut appointment = Appointment {
        status,
        identifier: appointment_identifiers(sch),
        appointment_type: codeable_concept(sch.field(8)),
        reason_code: [sch.field(6), sch.field(7)]
            .into_iter()
            .filter_map(codeable_concept)
            .collect(),
        service_type: services
            .iter()
            .filter_map(|ais| codeable_concept(ais.field(3)))
            .collect(),
        ..Appointment::default()
    };
    if matches!(status, AppointmentStatus::Cancelled | AppointmentStatus::Noshow) {
        appointment.cancelation_reason = codeable_concept(sch.field(6));
    }

    let start = [
        sch.field(11).component_value(4),
        tq1.and_then(|tq1| tq1.component_value(7, 1)),
        services.first().and_then(|ais| ais.value(4)),
    ]
    .into_iter()
    .flatten()
    .find_map(|raw| to_fhir_datetime(raw, ctx.timezone()));
    let end = [
        sch.field(11).component_value(5),
        tq1.and_then(|tq1| tq1.component_value(8, 1)),
    ]
    .into_iter()
    .flatten()
    .find_map(|raw| to_fhir_datetime(raw, ctx.timezone()));
    if start.is_none() && sch.field(11).component_value(4).is_some() {
        ctx.warn("SCH", Some(11), "appointment start is malformed; omitted");
    }
    appointment.start = start;
    appointment.end = end;
    appointment.minutes_duration = duration_minutes(sch.field(9), sch.field(10)).or_else(|| {
        services
            .first()
            .and_then(|ais| duration_minutes(ais.field(7), ais.field(8)))
    });

    let notes: Vec<&str> = message
        .segments_of("NTE")
        .iter()
        .filter_map(|nte| nte.value(3))
        .collect();
    if !notes.is_empty() {
        appointment.comment = Some(notes.join("\n"));
    }

    let participant_status = match status {
        AppointmentStatus::Cancelled | AppointmentStatus::Noshow | AppointmentStatus::EnteredInError => {
            ParticipationStatus::Declined
        }
        AppointmentStatus::Booked | AppointmentStatus::Arrived | AppointmentStatus::Fulfilled => {
            ParticipationStatus::Accepted
        }
        _ => ParticipationStatus::NeedsAction,
    };
    if let Some(patient) = patient {
        appointment.participant.push(AppointmentParticipant {
            actor: Some(Reference::to(patient)),
            required: Some("required".to_string()),
            status: participant_status,
            ..AppointmentParticipant::default()
        });
    }
    appointment.participant.extend(resource_participants(message, ctx, participant_status)?);
    if appointment.participant.is_empty() {
        ctx.warn("SCH", None, "appointment has no participant");
    }

    let actors: Vec<Reference> = appointment
        .participant
        .iter()
        .filter_map(|p| p.actor.clone())
        .collect();
    for aig in message.segments_of("AIG") {
        let schedule = Schedule {
            active: Some(true),
            identifier: codeable_concept(aig.field(3))
                .and_then(|c| c.first_code().map(str::to_string))
                .map(|value| Identifier {
                    value: Some(value),
                    ..Identifier::default()
                })
                .into_iter()
                .collect(),
            service_type: codeable_concept(aig.field(4)).into_iter().collect(),
            actor: actors.clone(),
            comment: aig.field(3).component_value(2).map(str::to_string),
            ..Schedule::default()
        };
        let full_url = ctx.add(Resource::Schedule(schedule))?;
        appointment.supporting_information.push(Reference::to(full_url));
    }

    let full_url = ctx.add_with_role(ResourceRole::PrimaryAppointment, Resource::Appointment(appointment))?;
    ctx.add_focus(&full_url);
    tracing::debug!("appointment {} built from SCH", full_url);
    Ok(())
}

/// SCH-1 placer and SCH-2 filler appointment ids (`EI`).
fn appointment_identifiers(sch: &Segment) -> Vec<Identifier> {
    [(1, IdentifierUse::Usual), (2, IdentifierUse::Secondary)]
        .into_iter()
        .filter_map(|(field, use_type)| {
            let ei = sch.field(field).first_repetition();
            let value = ei.component_value(1)?;
            Some(Identifier {
                use_type: Some(use_type),
                system: ei.component_value(3).and_then(oid_uri),
                value: Some(value.to_string()),
                ..Identifier::default()
            })
        })
        .collect()
}

/// A duration and its `CE` unit (`MIN` when absent) in whole minutes.
fn duration_minutes(amount: &FieldValue, unit: &FieldValue) -> Option<u32> {
    let amount: f64 = amount.value()?.parse().ok()?;
    let factor = match unit.component_value(1).map(str::to_ascii_uppercase).as_deref() {
        None | Some("MIN") | Some("M") => 1.0,
        Some("S") | Some("SEC") => 1.0 / 60.0,
        Some("H") | Some("HR") => 60.0,
        Some("D") => 1440.0,
        Some(_) => return None,
    };
    let minutes = (amount * factor).round();
    (0.0..=f64::from(u32::MAX))
        .contains(&minutes)
        .then_some(minutes as u32)
}

/// AIL locations and AIP personnel as appointment participants.
fn resource_participants(
    message: &ParsedMessage,
    ctx: &mut ConversionContext,
    status: ParticipationStatus,
) -> ConversionResult<Vec<AppointmentParticipant>> {
    let mut participants = Vec::new();
    for ail in message.segments_of("AIL") {
        let Some(location) = location_reference(ctx, ail.field(3))? else {
            ctx.warn("AIL", Some(3), "location resource without a location; skipped");
            continue;
        };
        participants.push(AppointmentParticipant {
            participant_type: codeable_concept(ail.field(4)).into_iter().collect(),
            actor: Some(location),
            required: Some("required".to_string()),
            status,
        });
    }
    for aip in message.segments_of("AIP") {
        let Some(practitioner) = practitioner_reference(ctx, aip.field(3))? else {
            ctx.warn("AIP", Some(3), "personnel resource without a practitioner; skipped");
            continue;
        };
        participants.push(AppointmentParticipant {
            participant_type: codeable_concept(aip.field(4)).into_iter().collect(),
            actor: Some(practitioner),
            required: Some("required".to_string()),
            status,
        });
    }
    Ok(participants)
}
