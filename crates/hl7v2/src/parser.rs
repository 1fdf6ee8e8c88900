//! Record splitting and field-tree construction.

use crate::delimiters::is_usable;
use crate::escape::unescape;
use crate::message::{ParsedMessage, Segment};
use crate::{Delimiters, FieldValue, Hl7Error, Hl7Result, HEADER_SEGMENT};
use serde::Serialize;

/// A non-fatal issue found while parsing a single record or field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParseWarning {
    /// Segment type code of the record the issue was found in.
    pub segment: String,
    /// Raw field index within the record, when the issue is field-specific.
    pub field_index: Option<usize>,
    pub reason: String,
}

impl ParseWarning {
    fn new(segment: &str, field_index: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            segment: segment.to_string(),
            field_index,
            reason: reason.into(),
        }
    }
}

/// Parse raw HL7 v2.x message text.
///
/// Any mix of CR, LF, CRLF and LFCR separates records; blank records are skipped. Control
/// characters are removed from record text.
///
/// # Errors
///
/// Returns [`Hl7Error`] if:
/// - the text is empty or whitespace only,
/// - no non-blank record remains after normalisation,
/// - the first record is not the header segment.
pub fn parse(raw: &str) -> Hl7Result<ParsedMessage> {
    if raw.trim().is_empty() {
        return Err(Hl7Error::Empty);
    }

    let mut warnings = Vec::new();
    let records = split_records(raw, &mut warnings);
    let first = records.first().ok_or(Hl7Error::NoSegments)?;

    if !is_header_record(first) {
        let found: String = first
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .take(8)
            .collect();
        return Err(Hl7Error::MissingHeader(found));
    }

    let (delimiters, fell_back) = Delimiters::from_header_record(first);
    if fell_back {
        warnings.push(ParseWarning::new(
            HEADER_SEGMENT,
            Some(2),
            "encoding characters missing or truncated; standard delimiters applied",
        ));
    }

    let mut message = ParsedMessage::new(delimiters);
    for record in &records {
        let segment = parse_record(record, &delimiters, &mut warnings);
        message.push(segment);
    }

    for warning in &warnings {
        tracing::debug!(
            segment = %warning.segment,
            field = ?warning.field_index,
            "hl7 parse warning: {}",
            warning.reason
        );
    }
    message.set_warnings(warnings);

    Ok(message)
}

/// `MSH` followed by the field separator (or nothing at all, in which case defaults apply).
fn is_header_record(record: &str) -> bool {
    match record.strip_prefix(HEADER_SEGMENT) {
        Some(rest) => rest.chars().next().map_or(true, is_usable),
        None => false,
    }
}

/// Split on every line-ending convention and drop blank records and control characters.
///
/// Leading padding (spaces, byte-order mark) is dropped; trailing spaces are field content.
fn split_records(raw: &str, warnings: &mut Vec<ParseWarning>) -> Vec<String> {
    raw.split(['\r', '\n'])
        .filter_map(|line| {
            let cleaned: String = line.chars().filter(|c| !c.is_control()).collect();
            if cleaned.trim().is_empty() {
                return None;
            }
            let removed = cleaned.len() != line.len();
            let cleaned = cleaned.trim_start_matches([' ', '\u{feff}']).to_string();
            if removed {
                let segment: String = cleaned.chars().take(3).collect();
                warnings.push(ParseWarning::new(
                    &segment,
                    None,
                    "control characters removed from record",
                ));
            }
            Some(cleaned)
        })
        .collect()
}

fn parse_record(record: &str, delimiters: &Delimiters, warnings: &mut Vec<ParseWarning>) -> Segment {
    let tokens: Vec<&str> = record.split(delimiters.field).collect();
    let segment_type = tokens.first().copied().unwrap_or("");

    if !is_valid_segment_type(segment_type) {
        warnings.push(ParseWarning::new(
            segment_type,
            Some(0),
            format!("unexpected segment type code '{segment_type}'"),
        ));
    }

    let is_header = segment_type == HEADER_SEGMENT;
    let fields = tokens
        .iter()
        .enumerate()
        .map(|(idx, token)| match idx {
            0 => FieldValue::Simple((*token).to_string()),
            // The encoding characters must never be split or unescaped.
            1 if is_header => FieldValue::Simple((*token).to_string()),
            _ => {
                let mut field = FieldParser {
                    delimiters,
                    segment: segment_type,
                    index: idx,
                    warnings: &mut *warnings,
                };
                field.parse_field(token)
            }
        })
        .collect();

    Segment::new(fields)
}

fn is_valid_segment_type(code: &str) -> bool {
    code.len() == 3
        && code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

struct FieldParser<'a> {
    delimiters: &'a Delimiters,
    segment: &'a str,
    index: usize,
    warnings: &'a mut Vec<ParseWarning>,
}

impl FieldParser<'_> {
    fn parse_field(&mut self, token: &str) -> FieldValue {
        if token.contains(self.delimiters.repetition) {
            let repetitions = token
                .split(self.delimiters.repetition)
                .map(|rep| self.parse_repetition(rep))
                .collect();
            return FieldValue::Repeated(repetitions);
        }
        self.parse_repetition(token)
    }

    fn parse_repetition(&mut self, token: &str) -> FieldValue {
        if token.contains(self.delimiters.component) {
            let components = token
                .split(self.delimiters.component)
                .map(|component| self.parse_component(component))
                .collect();
            return FieldValue::Composite(components);
        }
        if token.contains(self.delimiters.subcomponent) {
            return FieldValue::Composite(vec![self.parse_component(token)]);
        }
        self.leaf(token)
    }

    fn parse_component(&mut self, token: &str) -> FieldValue {
        if token.contains(self.delimiters.subcomponent) {
            let subcomponents = token
                .split(self.delimiters.subcomponent)
                .map(|sub| self.leaf(sub))
                .collect();
            return FieldValue::Composite(subcomponents);
        }
        self.leaf(token)
    }

    fn leaf(&mut self, token: &str) -> FieldValue {
        let (text, unknown) = unescape(token, self.delimiters);
        for sequence in unknown {
            self.warnings.push(ParseWarning::new(
                self.segment,
                Some(self.index),
                format!("unrecognised escape sequence '{sequence}' kept verbatim"),
            ));
        }
        FieldValue::Simple(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|APP|FAC|RCV|RFAC|20250101120000||ADT^A01^ADT_A01|1|P|2.5|||||FRA|8859/1\r\
PID|1||123456^^^HOSP^PI~1850775123456^^^ASIP-SANTE-INS-NIR^INS||DUPONT^JEAN^PIERRE||19850715|M\r\
PV1|1|I|CARDIO^101^1\r";

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse("").unwrap_err(), Hl7Error::Empty);
        assert_eq!(parse(" \r\n ").unwrap_err(), Hl7Error::Empty);
    }

    #[test]
    fn rejects_message_without_header_first() {
        let err = parse("PID|1||123\rMSH|^~\\&|A").unwrap_err();
        assert_eq!(err, Hl7Error::MissingHeader("PID".into()));
    }

    #[test]
    fn rejects_control_only_records() {
        let err = parse("\u{1}\u{2}\r\u{3}").unwrap_err();
        assert_eq!(err, Hl7Error::NoSegments);
    }

    #[test]
    fn parses_segments_and_groups_by_type() {
        let msg = parse(ADT).expect("parse");
        let types: Vec<&str> = msg.segment_types().collect();
        assert_eq!(types, vec!["MSH", "PID", "PV1"]);
        assert_eq!(msg.segment_count(), 3);
        assert!(msg.warnings().is_empty(), "{:?}", msg.warnings());
    }

    #[test]
    fn header_view_uses_hl7_numbering() {
        let msg = parse(ADT).expect("parse");
        let header = msg.header().expect("header");
        assert_eq!(header.field_separator(), '|');
        assert_eq!(header.value(2), Some("^~\\&"));
        assert_eq!(header.value(3), Some("APP"));
        assert_eq!(header.value(7), Some("20250101120000"));
        assert_eq!(header.component_value(9, 1), Some("ADT"));
        assert_eq!(header.component_value(9, 2), Some("A01"));
        assert_eq!(header.component_value(9, 3), Some("ADT_A01"));
        assert_eq!(msg.character_set(), Some("8859/1"));
    }

    #[test]
    fn splits_repetitions_components_and_subcomponents() {
        let msg = parse("MSH|^~\\&|A\rPID|1||1^^^HOSP&1.2.250&ISO^PI~2^^^X").expect("parse");
        let pid = msg.segment("PID").expect("pid");
        let ids = pid.field(3);
        assert_eq!(ids.repetitions().count(), 2);
        let first = ids.first_repetition();
        assert_eq!(first.component_value(1), Some("1"));
        assert_eq!(first.subcomponent(4, 1).text(), "HOSP");
        assert_eq!(first.subcomponent(4, 2).text(), "1.2.250");
        assert_eq!(first.component_value(5), Some("PI"));
    }

    #[test]
    fn field_count_includes_trailing_empty_fields() {
        let msg = parse("MSH|^~\\&|A\rPID|1||123||||").expect("parse");
        let pid = msg.segment("PID").expect("pid");
        assert_eq!(pid.len(), "PID|1||123||||".split('|').count());
        assert_eq!(pid.field(6), &FieldValue::Simple(String::new()));
    }

    #[test]
    fn every_line_ending_convention_separates_records() {
        for sep in ["\r", "\n", "\r\n", "\n\r", "\r\r\r"] {
            let raw = format!("MSH|^~\\&|A{sep}PID|1{sep}PV1|1{sep}");
            let msg = parse(&raw).expect("parse");
            assert_eq!(msg.segment_count(), 3, "separator {sep:?}");
        }
    }

    #[test]
    fn custom_delimiters_are_honoured() {
        let msg = parse("MSH#*$!%#APP\rPID#1##A*B$C*D").expect("parse");
        let d = msg.delimiters();
        assert_eq!((d.field, d.component, d.repetition, d.escape, d.subcomponent), ('#', '*', '$', '!', '%'));
        let pid = msg.segment("PID").expect("pid");
        assert_eq!(pid.field(3).repetitions().count(), 2);
        assert_eq!(pid.field(3).component_value(2), Some("B"));
    }

    #[test]
    fn truncated_encoding_field_records_warning() {
        let msg = parse("MSH|^|A\rPID|1||X~Y").expect("parse");
        assert_eq!(msg.delimiters().repetition, '~');
        assert!(msg
            .warnings()
            .iter()
            .any(|w| w.segment == "MSH" && w.field_index == Some(2)));
        assert_eq!(msg.segment("PID").expect("pid").field(3).repetitions().count(), 2);
    }

    #[test]
    fn colliding_encoding_characters_are_reset_with_warning() {
        let msg = parse("MSH|^^\\&|A\rPID|1||X~Y^Z").expect("parse");
        assert_eq!(*msg.delimiters(), Delimiters::default());
        assert!(msg
            .warnings()
            .iter()
            .any(|w| w.segment == "MSH" && w.field_index == Some(2)));
        assert_eq!(msg.segment("PID").expect("pid").field(3).repetitions().count(), 2);
    }

    #[test]
    fn escape_sequences_are_decoded_in_leaves() {
        let msg = parse("MSH|^~\\&|A\rNTE|1||50\\S\\50 \\F\\ ok").expect("parse");
        let nte = msg.segment("NTE").expect("nte");
        assert_eq!(nte.value(3), Some("50^50 | ok"));
    }

    #[test]
    fn unknown_escape_is_a_warning_not_an_error() {
        let msg = parse("MSH|^~\\&|A\rNTE|1||\\Q\\").expect("parse");
        let warning = msg.warnings().first().expect("warning");
        assert_eq!(warning.segment, "NTE");
        assert_eq!(warning.field_index, Some(3));
    }

    #[test]
    fn control_characters_are_dropped_but_accents_kept() {
        let msg = parse("MSH|^~\\&|A\rPID|1||1||H\u{7}ÉLÈNE").expect("parse");
        assert_eq!(msg.segment("PID").expect("pid").value(5), Some("HÉLÈNE"));
        assert!(!msg.warnings().is_empty());
    }

    #[test]
    fn repeated_segments_keep_order() {
        let msg = parse("MSH|^~\\&|A\rOBR|1|A\rOBX|1\rOBR|2|B\rOBX|2").expect("parse");
        assert_eq!(msg.segments_of("OBR").len(), 2);
        let order: Vec<String> = msg
            .segments_in_order()
            .map(|s| format!("{}{}", s.segment_type(), s.value(1).unwrap_or("")))
            .collect();
        assert_eq!(order, vec!["MSH^~\\&", "OBR1", "OBX1", "OBR2", "OBX2"]);
    }

    #[test]
    fn header_code_must_be_followed_by_a_separator() {
        let err = parse("MSHX|^~\\&|A\rPID|1").unwrap_err();
        assert_eq!(err, Hl7Error::MissingHeader("MSHX".into()));
        assert!(parse("MSH").is_ok());
    }

    #[test]
    fn trailing_spaces_are_field_content() {
        let msg = parse("MSH|^~\\&|A\r\nNTE|1||fin de ligne  \r\n").expect("parse");
        assert_eq!(msg.segment("NTE").expect("nte").field(3).text(), "fin de ligne  ");
        assert!(msg.warnings().is_empty(), "{:?}", msg.warnings());
    }

    #[test]
    fn hex_escapes_and_accents_survive_parsing() {
        let msg = parse("MSH|^~\\&|A\rNTE|1||Unité \\X4142\\ \\X1É2\\").expect("parse");
        assert_eq!(msg.segment("NTE").expect("nte").value(3), Some("Unité AB \\X1É2\\"));
        assert_eq!(msg.warnings().len(), 1);
    }

    #[test]
    fn odd_segment_code_is_kept_with_warning() {
        let msg = parse("MSH|^~\\&|A\rzbe|1").expect("parse");
        assert!(msg.has_segment("zbe"));
        assert!(msg.warnings().iter().any(|w| w.segment == "zbe"));
    }
}
