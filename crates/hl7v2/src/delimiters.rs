//! Message delimiters declared by the header segment.

use serde::Serialize;

/// The five HL7 delimiter characters.
///
/// The field separator is the character immediately following the `MSH` segment code; the
/// remaining four are read positionally from the encoding-characters field (`MSH-2`) in the order
/// component, repetition, escape, subcomponent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Derive the delimiters from a header record (`MSH|^~\&|...`).
    ///
    /// Returns the delimiters together with a flag telling whether any position had to fall back
    /// to its default. Every missing or unusable position is defaulted independently, so a
    /// truncated encoding field such as `^~` still yields the declared component and repetition
    /// characters. If two of the resulting delimiters collide, the four encoding characters are
    /// reset to their defaults (and the field separator too when it clashes with them).
    pub fn from_header_record(record: &str) -> (Self, bool) {
        let defaults = Self::default();
        let mut chars = record.chars().skip(crate::HEADER_SEGMENT.len());

        let mut fell_back = false;
        let field = match chars.next() {
            Some(c) if is_usable(c) => c,
            _ => {
                fell_back = true;
                defaults.field
            }
        };

        let encoding: Vec<char> = chars.take_while(|c| *c != field).take(4).collect();
        let mut pick = |idx: usize, default: char| match encoding.get(idx) {
            Some(c) if is_usable(*c) && *c != field => *c,
            _ => {
                fell_back = true;
                default
            }
        };

        let component = pick(0, defaults.component);
        let repetition = pick(1, defaults.repetition);
        let escape = pick(2, defaults.escape);
        let subcomponent = pick(3, defaults.subcomponent);

        let delimiters = Self {
            field,
            component,
            repetition,
            escape,
            subcomponent,
        };
        if delimiters.are_distinct() {
            return (delimiters, fell_back);
        }

        let reset = Self { field, ..defaults };
        if reset.are_distinct() {
            (reset, true)
        } else {
            (defaults, true)
        }
    }

    fn are_distinct(&self) -> bool {
        let all = [self.field, self.component, self.repetition, self.escape, self.subcomponent];
        all.iter()
            .enumerate()
            .all(|(i, c)| !all[i + 1..].contains(c))
    }

    /// Returns the encoding-characters string as it would appear in `MSH-2`.
    pub fn encoding_characters(&self) -> String {
        [self.component, self.repetition, self.escape, self.subcomponent]
            .iter()
            .collect()
    }
}

/// Whether `c` may serve as a delimiter: printable ASCII punctuation.
pub(crate) fn is_usable(c: char) -> bool {
    c.is_ascii_graphic() && !c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_declared_delimiters() {
        let (d, fell_back) = Delimiters::from_header_record("MSH#*$!%#A#B");
        assert!(!fell_back);
        assert_eq!(d.field, '#');
        assert_eq!(d.component, '*');
        assert_eq!(d.repetition, '$');
        assert_eq!(d.escape, '!');
        assert_eq!(d.subcomponent, '%');
    }

    #[test]
    fn standard_header_matches_defaults() {
        let (d, fell_back) = Delimiters::from_header_record(r"MSH|^~\&|APP");
        assert!(!fell_back);
        assert_eq!(d, Delimiters::default());
        assert_eq!(d.encoding_characters(), r"^~\&");
    }

    #[test]
    fn empty_encoding_field_falls_back() {
        let (d, fell_back) = Delimiters::from_header_record("MSH||APP");
        assert!(fell_back);
        assert_eq!(d, Delimiters::default());
    }

    #[test]
    fn truncated_encoding_field_defaults_per_position() {
        let (d, fell_back) = Delimiters::from_header_record("MSH|*$|APP");
        assert!(fell_back);
        assert_eq!(d.component, '*');
        assert_eq!(d.repetition, '$');
        assert_eq!(d.escape, '\\');
        assert_eq!(d.subcomponent, '&');
    }

    #[test]
    fn colliding_encoding_characters_fall_back() {
        let (d, fell_back) = Delimiters::from_header_record(r"MSH|^^\&|APP");
        assert!(fell_back);
        assert_eq!(d, Delimiters::default());

        // A truncated field whose defaulted positions clash with the declared ones.
        let (d, fell_back) = Delimiters::from_header_record("MSH#~#APP");
        assert!(fell_back);
        assert_eq!(d.field, '#');
        assert_eq!((d.component, d.repetition), ('^', '~'));
    }

    #[test]
    fn field_separator_clashing_with_defaults_resets_everything() {
        let (d, fell_back) = Delimiters::from_header_record("MSH^^^^^^APP");
        assert!(fell_back);
        assert_eq!(d, Delimiters::default());
    }

    #[test]
    fn bare_header_code_falls_back_entirely() {
        let (d, fell_back) = Delimiters::from_header_record("MSH");
        assert!(fell_back);
        assert_eq!(d, Delimiters::default());
    }
}
