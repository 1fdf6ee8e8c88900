//! Read-only lookup of French coded terminologies.
//!
//! Responsibilities:
//! - Movement types (ZBE-9), legal care modes (ZFV-11) and coverage types (IN1-15)
//! - Load the table embedded in the crate, or a replacement YAML file
//!
//! A loaded table is never mutated; share it behind an `Arc` across threads.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const BUNDLED_TERMINOLOGY: &str = include_str!("../data/terminology.yaml");

#[derive(Debug, thiserror::Error)]
pub enum TerminologyError {
    #[error("failed to read terminology file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("terminology schema mismatch at {path}: {message}")]
    Schema { path: String, message: String },
}

pub type TerminologyResult<T> = std::result::Result<T, TerminologyError>;

/// One coded concept of the table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminologyConcept {
    pub system: String,
    pub code: String,
    pub display: String,
}

/// Lookup interface consumed by the mapping engine.
pub trait TerminologyLookup: Send + Sync {
    /// Display of a movement type code.
    fn lookup_movement_type(&self, code: &str) -> Option<String>;

    fn lookup_care_mode(&self, code: &str) -> Option<TerminologyConcept>;

    fn lookup_coverage_type(&self, code: &str) -> Option<TerminologyConcept>;
}

/// YAML-backed terminology table. Keys are matched case-insensitively.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FrenchTerminology {
    #[serde(default)]
    movement_types: BTreeMap<String, String>,
    #[serde(default)]
    care_modes: BTreeMap<String, TerminologyConcept>,
    #[serde(default)]
    coverage_types: BTreeMap<String, TerminologyConcept>,
}

impl FrenchTerminology {
    /// The table shipped with the crate.
    pub fn bundled() -> TerminologyResult<Self> {
        Self::from_yaml_str(BUNDLED_TERMINOLOGY)
    }

    pub fn from_yaml_str(input: &str) -> TerminologyResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(input);
        let table: Self = serde_path_to_error::deserialize(deserializer).map_err(|e| {
            let path = e.path().to_string();
            TerminologyError::Schema {
                path: if path.is_empty() { "<root>".to_string() } else { path },
                message: e.into_inner().to_string(),
            }
        })?;
        Ok(table.normalised())
    }

    pub fn from_path(path: &Path) -> TerminologyResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| TerminologyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    fn normalised(self) -> Self {
        fn upper<V>(map: BTreeMap<String, V>) -> BTreeMap<String, V> {
            map.into_iter()
                .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
                .collect()
        }
        Self {
            movement_types: upper(self.movement_types),
            care_modes: upper(self.care_modes),
            coverage_types: upper(self.coverage_types),
        }
    }

    pub fn len(&self) -> usize {
        self.movement_types.len() + self.care_modes.len() + self.coverage_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl TerminologyLookup for FrenchTerminology {
    fn lookup_movement_type(&self, code: &str) -> Option<String> {
        self.movement_types.get(&key(code)).cloned()
    }

    fn lookup_care_mode(&self, code: &str) -> Option<TerminologyConcept> {
        self.care_modes.get(&key(code)).cloned()
    }

    fn lookup_coverage_type(&self, code: &str) -> Option<TerminologyConcept> {
        self.coverage_types.get(&key(code)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bundled_table_loads() {
        let table = FrenchTerminology::bundled().expect("bundled table parses");
        assert_eq!(table.movement_types.len(), 8);
        assert_eq!(table.care_modes.len(), 7);
        assert!(!table.is_empty());
    }

    #[test]
    fn lookups_ignore_case() {
        let table = FrenchTerminology::bundled().expect("bundled");
        assert!(table.lookup_movement_type("sm").is_some());
        let care = table.lookup_care_mode("hdt").expect("care mode");
        assert_eq!(care.code, "HDT");
        let coverage = table.lookup_coverage_type(" AMO ").expect("coverage");
        assert_eq!(coverage.code, "PUBLICPOL");
        assert!(table.lookup_coverage_type("XYZ").is_none());
    }

    #[test]
    fn schema_error_names_the_key() {
        let err = FrenchTerminology::from_yaml_str("careModes:\n  SL:\n    system: x\n    code: SL\n")
            .expect_err("missing display");
        match err {
            TerminologyError::Schema { path, .. } => assert!(path.contains("careModes"), "{path}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn loads_replacement_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(file, "movementTypes:\n  X: Test").expect("write");
        let table = FrenchTerminology::from_path(file.path()).expect("load");
        assert_eq!(table.lookup_movement_type("x").as_deref(), Some("Test"));
        assert!(table.lookup_care_mode("SL").is_none());
    }
}
