//! Constants used throughout the conversion core.
//!
//! HL7 field numbers are kept next to the code that reads them; this module only holds values
//! shared by several modules.

/// Offset applied to HL7 date-times without one (metropolitan France, winter time).
pub const DEFAULT_TIMEZONE: &str = "+01:00";

/// Seconds east of UTC of [`DEFAULT_TIMEZONE`].
pub const FALLBACK_OFFSET_SECONDS: i32 = 3600;

/// Type code of the internal patient identifier (IPP).
pub const IPP_TYPE_CODE: &str = "PI";

/// Authority names that denote the internal patient identifier namespace.
pub const INTERNAL_AUTHORITIES: [&str; 3] = ["IPP", "PI", "HOSP"];

/// Tokens moved from the given-name list to the suffix list.
pub const NAME_SUFFIXES: [&str; 14] = [
    "JR", "JR.", "SR", "SR.", "II", "III", "IV", "FILS", "PERE", "PÈRE", "DR", "DR.", "PR", "PR.",
];

/// Name given to the Location synthesized when an encounter has no usable point of care.
pub const DEFAULT_LOCATION_NAME: &str = "Localisation non renseignée";

/// Endpoint prefix used for applications named in the header.
pub const APPLICATION_ENDPOINT_PREFIX: &str = "urn:hl7v2:application:";

/// Fallback application name when MSH-3 or MSH-5 is blank.
pub const UNKNOWN_APPLICATION: &str = "unknown";
