use hl7v2::Hl7Error;
use serde::Serialize;

/// Discriminator carried by every fatal conversion error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    FormatError,
    MissingHeaderError,
    UnsupportedTypeError,
    MappingError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::FormatError => "FormatError",
            ErrorKind::MissingHeaderError => "MissingHeaderError",
            ErrorKind::UnsupportedTypeError => "UnsupportedTypeError",
            ErrorKind::MappingError => "MappingError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("invalid message format: {0}")]
    Format(#[from] Hl7Error),

    #[error("missing or unparseable header field {field}: {reason}")]
    MissingHeader { field: &'static str, reason: String },

    #[error("no handler registered for message type {message_type} (event {event})")]
    UnsupportedType { message_type: String, event: String },

    #[error(
        "failed to map {message_type}^{event}{at}: {reason}",
        at = segment.as_deref().map(|s| format!(" at {s}")).unwrap_or_default()
    )]
    Mapping {
        message_type: String,
        event: String,
        segment: Option<String>,
        reason: String,
    },
}

impl ConversionError {
    /// Returns the discriminator exposed to callers.
    ///
    /// A first record that is not the header segment is reported as a missing header; every
    /// other parse failure is a format error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConversionError::Format(Hl7Error::MissingHeader(_)) => ErrorKind::MissingHeaderError,
            ConversionError::Format(_) => ErrorKind::FormatError,
            ConversionError::MissingHeader { .. } => ErrorKind::MissingHeaderError,
            ConversionError::UnsupportedType { .. } => ErrorKind::UnsupportedTypeError,
            ConversionError::Mapping { .. } => ErrorKind::MappingError,
        }
    }
}

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// A non-fatal issue, attached to the conversion result instead of being raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionWarning {
    /// Segment type code (`PID`, `ZBE`, ...).
    pub segment: String,
    /// HL7 field number, when the issue is field-specific.
    pub field_index: Option<usize>,
    pub reason: String,
}

impl ConversionWarning {
    pub fn new(segment: &str, field_index: Option<usize>, reason: impl Into<String>) -> Self {
        Self {
            segment: segment.to_string(),
            field_index,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field_index {
            Some(index) => write!(f, "{}-{}: {}", self.segment, index, self.reason),
            None => write!(f, "{}: {}", self.segment, self.reason),
        }
    }
}

impl From<&hl7v2::ParseWarning> for ConversionWarning {
    fn from(warning: &hl7v2::ParseWarning) -> Self {
        Self {
            segment: warning.segment.clone(),
            field_index: warning.field_index,
            reason: warning.reason.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_discriminators() {
        assert_eq!(
            ConversionError::Format(Hl7Error::Empty).kind().as_str(),
            "FormatError"
        );
        assert_eq!(
            ConversionError::Format(Hl7Error::MissingHeader("PID".into())).kind(),
            ErrorKind::MissingHeaderError
        );
        let err = ConversionError::UnsupportedType {
            message_type: "MFN".into(),
            event: "M02".into(),
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedTypeError);
        assert!(err.to_string().contains("MFN"));
    }

    #[test]
    fn mapping_message_includes_segment() {
        let err = ConversionError::Mapping {
            message_type: "ADT".into(),
            event: "A01".into(),
            segment: Some("PV1".into()),
            reason: "boom".into(),
        };
        assert_eq!(err.to_string(), "failed to map ADT^A01 at PV1: boom");
        let err = ConversionError::Mapping {
            message_type: "ADT".into(),
            event: "A01".into(),
            segment: None,
            reason: "boom".into(),
        };
        assert_eq!(err.to_string(), "failed to map ADT^A01: boom");
    }
}
