//! Address extraction (`XAD`: PID-11, NK1-4, IN1-5, ...).
//!
//! A French INSEE commune code given as `CITY (75056)` or in XAD-9 becomes the FR Core INSEE
//! extension and is stripped from the city text. Birth-delivery-location addresses (`BDL`) are set
//! aside as the patient's birth place.

use fhir::fr_core::{CS_INSEE_COMMUNE, EXT_ADDRESS_INSEE_CODE};
use fhir::{Address, AddressType, AddressUse, Coding, Extension, Period};
use hl7v2::FieldValue;

/// Addresses of one field, with the birth place split out.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedAddresses {
    pub addresses: Vec<Address>,
    pub birth_place: Option<Address>,
}

/// HL7 table 0190 to FHIR use and type.
pub fn address_use_and_type(code: &str) -> (Option<AddressUse>, Option<AddressType>) {
    match code.trim().to_ascii_uppercase().as_str() {
        "H" | "P" | "L" | "RH" => (Some(AddressUse::Home), None),
        "B" | "O" => (Some(AddressUse::Work), None),
        "C" => (Some(AddressUse::Temp), None),
        "BA" | "F" => (Some(AddressUse::Old), None),
        "M" => (None, Some(AddressType::Postal)),
        "SH" => (None, Some(AddressType::Physical)),
        "BI" => (Some(AddressUse::Billing), None),
        _ => (None, None),
    }
}

/// `75056`, `2A004`, `2B033`.
pub fn is_insee_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 5 {
        return false;
    }
    let corsica = bytes[0] == b'2' && matches!(bytes[1], b'A' | b'B' | b'a' | b'b');
    let tail = if corsica { &bytes[2..] } else { bytes };
    tail.iter().all(u8::is_ascii_digit)
}

/// Splits `PARIS (75056)` into `("PARIS", Some("75056"))`.
pub fn split_city_insee(city: &str) -> (String, Option<String>) {
    let trimmed = city.trim();
    if let Some(open) = trimmed.rfind('(') {
        if let Some(inner) = trimmed[open + 1..].strip_suffix(')') {
            let inner = inner.trim();
            if is_insee_code(inner) {
                return (trimmed[..open].trim_end().to_string(), Some(inner.to_ascii_uppercase()));
            }
        }
    }
    (trimmed.to_string(), None)
}

pub fn insee_extension(code: &str) -> Extension {
    Extension::coding(EXT_ADDRESS_INSEE_CODE, Coding::new(CS_INSEE_COMMUNE, code))
}

fn address_from_composite(xad: &FieldValue) -> Option<Address> {
    let mut address = Address::default();
    for line in [
        xad.subcomponent(1, 1).value(),
        xad.component_value(2),
    ]
    .into_iter()
    .flatten()
    {
        address.line.push(line.to_string());
    }

    let mut insee = None;
    if let Some(city) = xad.component_value(3) {
        let (city, code) = split_city_insee(city);
        if !city.is_empty() {
            address.city = Some(city);
        }
        insee = code;
    }
    if insee.is_none() {
        insee = xad
            .component_value(9)
            .filter(|code| is_insee_code(code))
            .map(str::to_ascii_uppercase);
    }
    if let Some(code) = insee {
        address.extension.push(insee_extension(&code));
    }

    address.state = xad.component_value(4).map(str::to_string);
    address.postal_code = xad.component_value(5).map(str::to_string);
    address.country = xad.component_value(6).map(str::to_string);
    address.district = xad
        .component_value(9)
        .filter(|code| !is_insee_code(code))
        .map(str::to_string);
    if let Some(code) = xad.component_value(7) {
        (address.use_type, address.address_type) = address_use_and_type(code);
    }
    let period = Period {
        start: xad.subcomponent(12, 1).value().map(str::to_string),
        end: xad.subcomponent(12, 2).value().map(str::to_string),
    };
    if !period.is_empty() {
        address.period = Some(period);
    }

    let empty = address.line.is_empty()
        && address.city.is_none()
        && address.postal_code.is_none()
        && address.country.is_none()
        && address.extension.is_empty();
    (!empty).then_some(address)
}

fn is_birth_place(xad: &FieldValue) -> bool {
    xad.component_value(7)
        .is_some_and(|code| code.eq_ignore_ascii_case("BDL") || code.eq_ignore_ascii_case("BR"))
}

/// Extracts every address of a field, flat or repeated.
pub fn addresses_from_field(field: &FieldValue) -> ResolvedAddresses {
    let mut resolved = ResolvedAddresses::default();
    for repetition in field.repetitions() {
        let address = match repetition {
            FieldValue::Simple(text) if !text.trim().is_empty() => Some(Address {
                text: Some(text.trim().to_string()),
                ..Address::default()
            }),
            FieldValue::Simple(_) | FieldValue::Repeated(_) => None,
            FieldValue::Composite(_) => address_from_composite(repetition),
        };
        let Some(address) = address else { continue };
        if is_birth_place(repetition) {
            if resolved.birth_place.is_none() {
                resolved.birth_place = Some(Address {
                    use_type: None,
                    ..address
                });
            }
        } else if !resolved.addresses.contains(&address) {
            resolved.addresses.push(address);
        }
    }
    resolved
}

/// Birth place given as plain text (PID-23).
pub fn birth_place_from_text(text: &str) -> Option<Address> {
    let (city, code) = split_city_insee(text);
    if city.is_empty() && code.is_none() {
        return None;
    }
    Some(Address {
        extension: code.iter().map(|c| insee_extension(c)).collect(),
        city: (!city.is_empty()).then_some(city),
        ..Address::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xad(parts: &[&str]) -> FieldValue {
        FieldValue::Composite(parts.iter().map(|p| FieldValue::from(*p)).collect())
    }

    #[test]
    fn hoists_insee_code_from_city() {
        let resolved = addresses_from_field(&xad(&["1 RUE DE LA PAIX", "", "PARIS (75056)", "", "75002", "FRA", "H"]));
        let address = &resolved.addresses[0];
        assert_eq!(address.city.as_deref(), Some("PARIS"));
        assert_eq!(address.use_type, Some(AddressUse::Home));
        let ext = &address.extension[0];
        assert_eq!(ext.url, EXT_ADDRESS_INSEE_CODE);
        assert_eq!(
            ext.value_coding.as_ref().and_then(|c| c.code.as_deref()),
            Some("75056")
        );
    }

    #[test]
    fn corsican_codes_and_county_field() {
        assert!(is_insee_code("2A004"));
        assert!(!is_insee_code("2C004"));
        assert!(!is_insee_code("7505"));
        let resolved = addresses_from_field(&xad(&["", "", "AJACCIO", "", "20000", "", "", "", "2A004"]));
        assert_eq!(resolved.addresses[0].extension.len(), 1);
        assert_eq!(resolved.addresses[0].district, None);
    }

    #[test]
    fn city_without_code_is_untouched() {
        assert_eq!(split_city_insee("LYON"), ("LYON".to_string(), None));
        assert_eq!(split_city_insee("LYON (RHONE)"), ("LYON (RHONE)".to_string(), None));
    }

    #[test]
    fn birth_delivery_location_is_split_out() {
        let field = FieldValue::Repeated(vec![
            xad(&["3 AVENUE FOCH", "", "LYON", "", "69006", "FRA", "H"]),
            xad(&["", "", "MARSEILLE (13055)", "", "", "FRA", "BDL"]),
        ]);
        let resolved = addresses_from_field(&field);
        assert_eq!(resolved.addresses.len(), 1);
        let birth = resolved.birth_place.expect("birth place");
        assert_eq!(birth.city.as_deref(), Some("MARSEILLE"));
    }

    #[test]
    fn plain_text_birth_place() {
        let birth = birth_place_from_text("NANTES (44109)").expect("birth place");
        assert_eq!(birth.city.as_deref(), Some("NANTES"));
        assert_eq!(birth.extension.len(), 1);
        assert!(birth_place_from_text("  ").is_none());
    }

    #[test]
    fn duplicate_addresses_collapse() {
        let field = FieldValue::Repeated(vec![
            xad(&["1 RUE A", "", "PARIS", "", "75001"]),
            xad(&["1 RUE A", "", "PARIS", "", "75001"]),
        ]);
        assert_eq!(addresses_from_field(&field).addresses.len(), 1);
    }
}
