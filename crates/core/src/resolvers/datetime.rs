//! HL7 `DTM`/`DT` normalisation to FHIR `date` and `dateTime`.
//!
//! HL7 timestamps are `YYYY[MM[DD[HH[MM[SS[.S+]]]]]][+/-ZZZZ]`. Missing time components default to
//! midnight, a missing offset takes the configured default, and anything malformed yields `None`.

use crate::constants::FALLBACK_OFFSET_SECONDS;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

/// `+01:00`, or UTC if the constant were ever out of range.
pub fn fallback_offset() -> FixedOffset {
    FixedOffset::east_opt(FALLBACK_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// Parses `+01:00`, `+0100`, `-05`, or `Z`.
pub fn parse_offset(input: &str) -> Option<FixedOffset> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match input.as_bytes().first()? {
        b'+' => (1, &input[1..]),
        b'-' => (-1, &input[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Digits (fraction dropped) and optional offset of an HL7 timestamp.
struct RawTimestamp<'a> {
    digits: &'a str,
    offset: Option<FixedOffset>,
}

fn split_timestamp(raw: &str) -> Option<RawTimestamp<'_>> {
    let raw = raw.trim();
    if raw.len() < 4 || !raw.is_char_boundary(4) {
        return None;
    }
    // An offset sign can only appear after the year.
    let (body, offset) = match raw[4..].find(['+', '-']) {
        Some(pos) => {
            let (body, offset) = raw.split_at(pos + 4);
            (body, Some(parse_offset(offset)?))
        }
        None => (raw, None),
    };
    let digits = match body.split_once('.') {
        Some((digits, fraction)) => {
            if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits
        }
        None => body,
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) || !matches!(digits.len(), 4 | 6 | 8 | 10 | 12 | 14) {
        return None;
    }
    Some(RawTimestamp { digits, offset })
}

fn field(digits: &str, range: std::ops::Range<usize>) -> Option<u32> {
    digits.get(range).and_then(|s| s.parse().ok())
}

/// Parses an HL7 timestamp with at least day precision.
pub fn parse_hl7_datetime(raw: &str, default_offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let ts = split_timestamp(raw)?;
    if ts.digits.len() < 8 {
        return None;
    }
    let d = ts.digits;
    let date = NaiveDate::from_ymd_opt(field(d, 0..4)? as i32, field(d, 4..6)?, field(d, 6..8)?)?;
    let time = NaiveTime::from_hms_opt(
        field(d, 8..10).unwrap_or(0),
        field(d, 10..12).unwrap_or(0),
        field(d, 12..14).unwrap_or(0),
    )?;
    let offset = ts.offset.unwrap_or(default_offset);
    offset
        .from_local_datetime(&NaiveDateTime::new(date, time))
        .single()
}

/// Formats a date-time the way FHIR expects (`2025-01-01T12:00:00+01:00`).
pub fn format_datetime(value: &DateTime<FixedOffset>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// HL7 `DT`/`DTM` to FHIR `date`, keeping the source precision (`YYYY`, `YYYY-MM`, `YYYY-MM-DD`).
pub fn to_fhir_date(raw: &str) -> Option<String> {
    let ts = split_timestamp(raw)?;
    let d = ts.digits;
    let year = field(d, 0..4)? as i32;
    match d.len() {
        4 => Some(format!("{year:04}")),
        6 => {
            let month = field(d, 4..6)?;
            NaiveDate::from_ymd_opt(year, month, 1)?;
            Some(format!("{year:04}-{month:02}"))
        }
        _ => {
            let date = NaiveDate::from_ymd_opt(year, field(d, 4..6)?, field(d, 6..8)?)?;
            Some(date.format("%Y-%m-%d").to_string())
        }
    }
}

/// HL7 `DTM` to FHIR `dateTime`.
///
/// Year and year-month precision are returned as partial dates, which FHIR `dateTime` allows.
pub fn to_fhir_datetime(raw: &str, default_offset: FixedOffset) -> Option<String> {
    let ts = split_timestamp(raw)?;
    if ts.digits.len() < 8 {
        return to_fhir_date(raw);
    }
    parse_hl7_datetime(raw, default_offset).map(|dt| format_datetime(&dt))
}

/// Digits of an HL7 timestamp (`20250101120000`), used to derive stable suffixes.
pub fn timestamp_digits(raw: &str) -> Option<&str> {
    split_timestamp(raw).map(|ts| ts.digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> FixedOffset {
        fallback_offset()
    }

    #[test]
    fn full_timestamp_gets_default_offset() {
        assert_eq!(
            to_fhir_datetime("20250101120000", paris()).as_deref(),
            Some("2025-01-01T12:00:00+01:00")
        );
    }

    #[test]
    fn date_only_defaults_to_midnight() {
        assert_eq!(
            to_fhir_datetime("20250315", paris()).as_deref(),
            Some("2025-03-15T00:00:00+01:00")
        );
    }

    #[test]
    fn explicit_offset_wins() {
        assert_eq!(
            to_fhir_datetime("202503151030-0500", paris()).as_deref(),
            Some("2025-03-15T10:30:00-05:00")
        );
    }

    #[test]
    fn fraction_is_accepted_and_dropped() {
        assert_eq!(
            to_fhir_datetime("20250315103000.1234+0200", paris()).as_deref(),
            Some("2025-03-15T10:30:00+02:00")
        );
    }

    #[test]
    fn partial_precision_dates() {
        assert_eq!(to_fhir_date("1980").as_deref(), Some("1980"));
        assert_eq!(to_fhir_date("198005").as_deref(), Some("1980-05"));
        assert_eq!(to_fhir_date("19800512").as_deref(), Some("1980-05-12"));
        assert_eq!(to_fhir_date("198005121530").as_deref(), Some("1980-05-12"));
        assert_eq!(to_fhir_datetime("198005", paris()).as_deref(), Some("1980-05"));
    }

    #[test]
    fn malformed_input_yields_none() {
        for raw in ["", "abc", "2025013", "20251301", "20250230", "2025010112345", "20250101+99"] {
            assert_eq!(to_fhir_datetime(raw, paris()), None, "{raw}");
        }
        assert_eq!(to_fhir_date("20250132"), None);
    }

    #[test]
    fn offsets_parse_in_common_shapes() {
        assert_eq!(parse_offset("+01:00").map(|o| o.local_minus_utc()), Some(3600));
        assert_eq!(parse_offset("+0100").map(|o| o.local_minus_utc()), Some(3600));
        assert_eq!(parse_offset("-05").map(|o| o.local_minus_utc()), Some(-18000));
        assert_eq!(parse_offset("Z").map(|o| o.local_minus_utc()), Some(0));
        assert_eq!(parse_offset("Europe/Paris"), None);
        assert_eq!(parse_offset("+25:00"), None);
    }

    #[test]
    fn timestamp_digits_strip_offset() {
        assert_eq!(timestamp_digits("20250101120000+0100"), Some("20250101120000"));
        assert_eq!(timestamp_digits("bad"), None);
    }
}
