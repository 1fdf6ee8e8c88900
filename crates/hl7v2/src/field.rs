//! Recursive field values.
//!
//! Every field position of a segment yields exactly one [`FieldValue`]. The nesting mirrors the
//! HL7 delimiter hierarchy:
//!
//! ```text
//! field ─┬─ Repeated(repetitions)
//!        └─ repetition ─┬─ Composite(components)
//!                       └─ component ─┬─ Composite(subcomponents)
//!                                     └─ Simple(text)
//! ```
//!
//! Nothing deeper than a subcomponent is modelled; subcomponents are always `Simple`.
//!
//! Component and subcomponent accessors use HL7's 1-based numbering (`PID-5.2` is
//! `field.component(2)`).

use serde::Serialize;

/// A parsed field, repetition, component or subcomponent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Leaf text (already escape-decoded). Empty fields are `Simple("")`.
    Simple(String),
    /// Repetitions of a field, separated by the repetition delimiter.
    Repeated(Vec<FieldValue>),
    /// Components of a repetition, or subcomponents of a component.
    Composite(Vec<FieldValue>),
}

static EMPTY: FieldValue = FieldValue::Simple(String::new());

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Simple(String::new())
    }
}

impl FieldValue {
    /// Returns a reference to a shared empty value.
    pub fn empty() -> &'static FieldValue {
        &EMPTY
    }

    /// Returns `true` when no leaf anywhere below this value holds non-blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Simple(s) => s.trim().is_empty(),
            FieldValue::Repeated(items) | FieldValue::Composite(items) => {
                items.iter().all(FieldValue::is_empty)
            }
        }
    }

    /// Iterate over the repetitions of this field.
    ///
    /// A non-repeated value is its own single repetition.
    pub fn repetitions(&self) -> std::slice::Iter<'_, FieldValue> {
        match self {
            FieldValue::Repeated(items) => items.iter(),
            FieldValue::Simple(_) | FieldValue::Composite(_) => std::slice::from_ref(self).iter(),
        }
    }

    /// Returns the first repetition (or the value itself when it does not repeat).
    pub fn first_repetition(&self) -> &FieldValue {
        match self {
            FieldValue::Repeated(items) => items.first().unwrap_or(&EMPTY),
            FieldValue::Simple(_) | FieldValue::Composite(_) => self,
        }
    }

    /// Returns component `index` (1-based) of the first repetition.
    ///
    /// A `Simple` value is its own first component.
    pub fn component(&self, index: usize) -> &FieldValue {
        if index == 0 {
            return &EMPTY;
        }
        match self.first_repetition() {
            FieldValue::Composite(items) => items.get(index - 1).unwrap_or(&EMPTY),
            simple @ FieldValue::Simple(_) if index == 1 => simple,
            FieldValue::Simple(_) => &EMPTY,
            // A repetition can never itself repeat.
            FieldValue::Repeated(_) => &EMPTY,
        }
    }

    /// Returns subcomponent `sub` (1-based) of component `index` (1-based).
    pub fn subcomponent(&self, index: usize, sub: usize) -> &FieldValue {
        let component = self.component(index);
        if sub == 0 {
            return &EMPTY;
        }
        match component {
            FieldValue::Composite(items) => items.get(sub - 1).unwrap_or(&EMPTY),
            simple @ FieldValue::Simple(_) if sub == 1 => simple,
            FieldValue::Simple(_) | FieldValue::Repeated(_) => &EMPTY,
        }
    }

    /// Returns the leading leaf text: the first subcomponent of the first component of the first
    /// repetition.
    pub fn text(&self) -> &str {
        match self {
            FieldValue::Simple(s) => s.as_str(),
            FieldValue::Repeated(items) | FieldValue::Composite(items) => {
                items.first().map(FieldValue::text).unwrap_or("")
            }
        }
    }

    /// Returns the trimmed leading text, or `None` when blank.
    pub fn value(&self) -> Option<&str> {
        let text = self.text().trim();
        (!text.is_empty()).then_some(text)
    }

    /// Shorthand for `self.component(index).value()`.
    pub fn component_value(&self, index: usize) -> Option<&str> {
        self.component(index).value()
    }

    /// Returns the number of components of the first repetition (`Simple` counts as one).
    pub fn component_count(&self) -> usize {
        match self.first_repetition() {
            FieldValue::Composite(items) => items.len(),
            FieldValue::Simple(_) | FieldValue::Repeated(_) => 1,
        }
    }

    /// Joins all non-blank leaves with `separator`, depth first.
    pub fn flatten_text(&self, separator: &str) -> String {
        let mut parts = Vec::new();
        self.collect_leaves(&mut parts);
        parts.join(separator)
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FieldValue::Simple(s) => {
                let s = s.trim();
                if !s.is_empty() {
                    out.push(s);
                }
            }
            FieldValue::Repeated(items) | FieldValue::Composite(items) => {
                for item in items {
                    item.collect_leaves(out);
                }
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Simple(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(s: &str) -> FieldValue {
        FieldValue::Simple(s.into())
    }

    #[test]
    fn simple_is_its_own_first_component() {
        let v = simple("DUPONT");
        assert_eq!(v.component(1).text(), "DUPONT");
        assert!(v.component(2).is_empty());
        assert_eq!(v.component_count(), 1);
    }

    #[test]
    fn composite_components_are_one_based() {
        let v = FieldValue::Composite(vec![simple("DUPONT"), simple("JEAN")]);
        assert_eq!(v.component_value(1), Some("DUPONT"));
        assert_eq!(v.component_value(2), Some("JEAN"));
        assert_eq!(v.component_value(3), None);
        assert!(v.component(0).is_empty());
    }

    #[test]
    fn repeated_reads_first_repetition() {
        let v = FieldValue::Repeated(vec![
            FieldValue::Composite(vec![simple("A"), simple("B")]),
            FieldValue::Composite(vec![simple("C"), simple("D")]),
        ]);
        assert_eq!(v.repetitions().count(), 2);
        assert_eq!(v.component_value(2), Some("B"));
        assert_eq!(v.text(), "A");
    }

    #[test]
    fn subcomponents_are_addressable() {
        let v = FieldValue::Composite(vec![
            simple("123"),
            FieldValue::Composite(vec![simple("HOSP"), simple("1.2.3"), simple("ISO")]),
        ]);
        assert_eq!(v.subcomponent(2, 1).text(), "HOSP");
        assert_eq!(v.subcomponent(2, 2).text(), "1.2.3");
        assert_eq!(v.subcomponent(1, 1).text(), "123");
        assert!(v.subcomponent(1, 2).is_empty());
    }

    #[test]
    fn emptiness_looks_through_nesting() {
        let v = FieldValue::Repeated(vec![FieldValue::Composite(vec![simple(""), simple("  ")])]);
        assert!(v.is_empty());
        assert_eq!(v.value(), None);
    }

    #[test]
    fn flatten_joins_non_blank_leaves() {
        let v = FieldValue::Composite(vec![simple("12 rue"), simple(""), simple("PARIS")]);
        assert_eq!(v.flatten_text(" "), "12 rue PARIS");
    }

    #[test]
    fn serializes_untagged() {
        let v = FieldValue::Composite(vec![simple("A"), simple("B")]);
        let json = serde_json::to_string(&v).expect("serialize");
        assert_eq!(json, r#"["A","B"]"#);
    }
}
