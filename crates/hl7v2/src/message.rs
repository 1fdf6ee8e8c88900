//! Parsed message model.

use crate::{Delimiters, FieldValue, ParseWarning, HEADER_SEGMENT};
use serde::Serialize;

/// One occurrence of a segment.
///
/// `fields[0]` is the segment type code itself, so `fields[n]` is HL7 field `n` for every segment
/// except the header (see [`HeaderSegment`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Segment {
    fields: Vec<FieldValue>,
}

impl Segment {
    pub(crate) fn new(fields: Vec<FieldValue>) -> Self {
        Self { fields }
    }

    /// Returns the segment type code (`PID`, `PV1`, ...).
    pub fn segment_type(&self) -> &str {
        self.fields.first().map(FieldValue::text).unwrap_or("")
    }

    /// Returns field `index`, or a shared empty value when the record is shorter.
    pub fn field(&self, index: usize) -> &FieldValue {
        self.fields.get(index).unwrap_or(FieldValue::empty())
    }

    /// Returns the trimmed leading text of field `index`, or `None` when blank.
    pub fn value(&self, index: usize) -> Option<&str> {
        self.field(index).value()
    }

    /// Returns the trimmed text of component `component` of field `index`.
    pub fn component_value(&self, index: usize, component: usize) -> Option<&str> {
        self.field(index).component_value(component)
    }

    /// Number of field positions, including the type code and trailing empty fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }
}

/// Header view addressing fields by their HL7 number.
///
/// In the raw occurrence the field separator is consumed by splitting, so `MSH-2` sits at
/// index 1. This view restores HL7 numbering: `MSH-1` is the field separator and `MSH-n` is raw
/// index `n - 1`.
#[derive(Clone, Copy, Debug)]
pub struct HeaderSegment<'a> {
    segment: &'a Segment,
    delimiters: &'a Delimiters,
}

impl<'a> HeaderSegment<'a> {
    /// Returns `MSH-n` for `n >= 2`. `MSH-1` has no [`FieldValue`]; use [`Self::field_separator`].
    pub fn field(&self, number: usize) -> &'a FieldValue {
        if number < 2 {
            return FieldValue::empty();
        }
        self.segment.field(number - 1)
    }

    pub fn value(&self, number: usize) -> Option<&'a str> {
        self.field(number).value()
    }

    pub fn component_value(&self, number: usize, component: usize) -> Option<&'a str> {
        self.field(number).component_value(component)
    }

    pub fn field_separator(&self) -> char {
        self.delimiters.field
    }

    pub fn segment(&self) -> &'a Segment {
        self.segment
    }
}

/// A fully parsed message.
///
/// Segments are grouped by type in first-appearance order; each group keeps its occurrences in
/// message order. The original record order is kept separately so that callers can walk
/// hierarchical groups (an order followed by its results).
#[derive(Clone, Debug, Serialize)]
pub struct ParsedMessage {
    delimiters: Delimiters,
    segments: Vec<(String, Vec<Segment>)>,
    #[serde(skip)]
    order: Vec<(usize, usize)>,
    warnings: Vec<ParseWarning>,
}

impl ParsedMessage {
    pub(crate) fn new(delimiters: Delimiters) -> Self {
        Self {
            delimiters,
            segments: Vec::new(),
            order: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn set_warnings(&mut self, warnings: Vec<ParseWarning>) {
        self.warnings = warnings;
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        let segment_type = segment.segment_type().to_string();
        let group = match self.segments.iter().position(|(t, _)| *t == segment_type) {
            Some(idx) => idx,
            None => {
                self.segments.push((segment_type, Vec::new()));
                self.segments.len() - 1
            }
        };
        let occurrences = &mut self.segments[group].1;
        occurrences.push(segment);
        self.order.push((group, occurrences.len() - 1));
    }

    /// Non-fatal issues recorded while parsing.
    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// Returns the header view, if the message has a header segment.
    pub fn header(&self) -> Option<HeaderSegment<'_>> {
        self.segment(HEADER_SEGMENT).map(|segment| HeaderSegment {
            segment,
            delimiters: &self.delimiters,
        })
    }

    /// Returns the first occurrence of `segment_type`.
    pub fn segment(&self, segment_type: &str) -> Option<&Segment> {
        self.segments_of(segment_type).first()
    }

    /// Returns all occurrences of `segment_type` in message order.
    pub fn segments_of(&self, segment_type: &str) -> &[Segment] {
        self.segments
            .iter()
            .find(|(t, _)| t == segment_type)
            .map(|(_, occurrences)| occurrences.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_segment(&self, segment_type: &str) -> bool {
        !self.segments_of(segment_type).is_empty()
    }

    /// Segment type codes in first-appearance order.
    pub fn segment_types(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|(t, _)| t.as_str())
    }

    /// All segments in original record order.
    pub fn segments_in_order(&self) -> impl Iterator<Item = &Segment> {
        self.order
            .iter()
            .map(move |(group, idx)| &self.segments[*group].1[*idx])
    }

    /// Total number of records.
    pub fn segment_count(&self) -> usize {
        self.order.len()
    }

    /// Character set declared in `MSH-18`, surfaced as-is (text is not re-decoded).
    pub fn character_set(&self) -> Option<&str> {
        self.header().and_then(|h| h.value(18))
    }
}
