//! Escape-sequence decoding for leaf text.

use crate::Delimiters;

/// Decode the standard HL7 escape sequences in `text`.
///
/// Supported sequences (shown with the default escape character):
/// `\F\` field, `\S\` component, `\T\` subcomponent, `\R\` repetition, `\E\` escape,
/// `\.br\` line break, `\Xhh..\` hexadecimal ASCII data.
///
/// Unknown or unterminated sequences are kept verbatim; the second element of the returned tuple
/// lists them so the caller can record a warning.
pub fn unescape(text: &str, delimiters: &Delimiters) -> (String, Vec<String>) {
    let esc = delimiters.escape;
    if !text.contains(esc) {
        return (text.to_string(), Vec::new());
    }

    let mut out = String::with_capacity(text.len());
    let mut unknown = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(esc) {
        out.push_str(&rest[..start]);
        let after = &rest[start + esc.len_utf8()..];
        let Some(end) = after.find(esc) else {
            // Unterminated: keep the remainder as-is.
            unknown.push(rest[start..].to_string());
            out.push_str(&rest[start..]);
            return (out, unknown);
        };

        let sequence = &after[..end];
        match decode_sequence(sequence, delimiters) {
            Some(decoded) => out.push_str(&decoded),
            None => {
                unknown.push(format!("{esc}{sequence}{esc}"));
                out.push(esc);
                out.push_str(sequence);
                out.push(esc);
            }
        }
        rest = &after[end + esc.len_utf8()..];
    }

    out.push_str(rest);
    (out, unknown)
}

fn decode_sequence(sequence: &str, delimiters: &Delimiters) -> Option<String> {
    match sequence {
        "F" => Some(delimiters.field.to_string()),
        "S" => Some(delimiters.component.to_string()),
        "T" => Some(delimiters.subcomponent.to_string()),
        "R" => Some(delimiters.repetition.to_string()),
        "E" => Some(delimiters.escape.to_string()),
        ".br" => Some("\n".to_string()),
        s => s.strip_prefix('X').and_then(decode_hex),
    }
}

fn decode_hex(hex: &str) -> Option<String> {
    if hex.is_empty() || !hex.is_ascii() || hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
