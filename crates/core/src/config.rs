//! Conversion options.
//!
//! Options are resolved once (from defaults, a YAML/JSON file, or CLI flags) and then passed into
//! every conversion by reference. Nothing in the conversion path reads process environment.

use crate::constants::DEFAULT_TIMEZONE;
use crate::resolvers::datetime::{fallback_offset, parse_offset};
use chrono::FixedOffset;
use fhir::BundleType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read options file {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Parse(String),

    #[error("invalid option value: {0}")]
    InvalidValue(String),

    #[error("unsupported options file extension: {0}")]
    UnsupportedFormat(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

/// Recognised conversion options, all optional with typed defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConversionOptions {
    /// Runs the French extension-segment enrichment pass.
    #[serde(default = "default_true")]
    pub french_mode: bool,

    /// Forces a `message` bundle whose first entry is a MessageHeader.
    #[serde(default = "default_true")]
    pub generate_message_header: bool,

    /// Bundle type used when no MessageHeader is generated.
    #[serde(default)]
    pub bundle_type: Option<BundleType>,

    /// Advisory; surfaced to callers, not enforced.
    #[serde(default, alias = "validateFRCore")]
    pub validate_fr_core: bool,

    /// Advisory; surfaced to callers, not enforced.
    #[serde(default)]
    pub strict_compliance: bool,

    /// Offset applied to HL7 date-times that carry none (`+01:00`).
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    /// Seed for reproducible resource ids; random ids when absent.
    #[serde(default)]
    pub id_seed: Option<String>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            french_mode: true,
            generate_message_header: true,
            bundle_type: None,
            validate_fr_core: false,
            strict_compliance: false,
            default_timezone: default_timezone(),
            id_seed: None,
        }
    }
}

impl ConversionOptions {
    /// Parses options from YAML text.
    pub fn from_yaml_str(input: &str) -> ConfigResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(input);
        let options: Self = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| schema_error("YAML", e))?;
        options.validate()?;
        Ok(options)
    }

    /// Parses options from JSON text.
    pub fn from_json_str(input: &str) -> ConfigResult<Self> {
        let deserializer = &mut serde_json::Deserializer::from_str(input);
        let options: Self = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| schema_error("JSON", e))?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a `.yaml`/`.yml` or `.json` file.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&contents),
            "json" => Self::from_json_str(&contents),
            other => Err(ConfigError::UnsupportedFormat(if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            })),
        }
    }

    /// Checks values that the type system cannot.
    pub fn validate(&self) -> ConfigResult<()> {
        if parse_offset(&self.default_timezone).is_none() {
            return Err(ConfigError::InvalidValue(format!(
                "defaultTimezone must look like +01:00, got '{}'",
                self.default_timezone
            )));
        }
        if let Some(seed) = &self.id_seed {
            if seed.trim().is_empty() {
                return Err(ConfigError::InvalidValue("idSeed cannot be blank".into()));
            }
        }
        Ok(())
    }

    /// Offset for date-times without one; `+01:00` when the configured value is unusable.
    pub fn timezone(&self) -> FixedOffset {
        parse_offset(&self.default_timezone).unwrap_or_else(fallback_offset)
    }

    /// Bundle type produced with these options.
    ///
    /// A MessageHeader always implies a `message` bundle; otherwise the override applies and
    /// defaults to `transaction`.
    pub fn effective_bundle_type(&self) -> BundleType {
        if self.generate_message_header {
            return BundleType::Message;
        }
        self.bundle_type.unwrap_or(BundleType::Transaction)
    }
}

fn schema_error<E: std::fmt::Display>(format: &str, e: serde_path_to_error::Error<E>) -> ConfigError {
    let path = e.path().to_string();
    let path = if path.is_empty() { "<root>".to_string() } else { path };
    ConfigError::Parse(format!(
        "options {format} schema mismatch at {path}: {}",
        e.into_inner()
    ))
}
