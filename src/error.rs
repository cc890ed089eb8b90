//! Error types for configuration loading, validation and reload.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Errors produced while resolving or persisting configuration.
///
/// Variants follow the load pipeline: anything up to `Validation` aborts the
/// attempted load, `Discovery` is only ever logged by the loader.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {0} (only YAML supported)")]
    UnsupportedFormat(String),

    #[error("strict config parse error: {0}")]
    Parse(String),

    #[error("config file contains multiple documents or trailing content")]
    MultipleDocuments,

    #[error("unsupported config version {found:?} (expected {expected:?})")]
    Version { found: String, expected: &'static str },

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("{0}")]
    Deprecated(String),

    #[error("{var} uses the removed {prefix} prefix. Use {replacement}")]
    LegacyPrefix {
        var: String,
        prefix: &'static str,
        replacement: String,
    },

    #[error(
        "{legacy} conflicts with {canonical} (compat alias): {legacy_value} != {canonical_value}. Prefer {canonical} and remove {legacy}"
    )]
    AliasConflict {
        legacy: String,
        canonical: String,
        legacy_value: String,
        canonical_value: String,
    },

    #[error("e2 auth mode: {0}")]
    AuthMode(String),

    #[error("unknown environment variables in strict mode: {}", .0.join(", "))]
    UnknownEnv(Vec<String>),

    #[error("config validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("tuner slot discovery failed: {0}")]
    Discovery(String),

    #[error("save config to {path}: {reason}")]
    Save { path: PathBuf, reason: String },

    #[error("watch config file {path}: {reason}")]
    Watch { path: PathBuf, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl fmt::Display) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the classes that are fatal even before validation runs.
    pub fn is_deprecation(&self) -> bool {
        matches!(
            self,
            ConfigError::Deprecated(_) | ConfigError::LegacyPrefix { .. }
        )
    }
}

/// A single semantic violation found by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl fmt::Display) -> Self {
        self.value = Some(value.to_string());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {} (value: {:?})", self.field, self.message, value),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// All violations collected in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.push(Violation::new(field, message));
    }

    pub fn add_value(
        &mut self,
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl fmt::Display,
    ) {
        self.push(Violation::new(field, message).with_value(value));
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// True if any violation was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {}", v)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_render_all() {
        let mut errs = ValidationErrors::new();
        errs.add_value("enigma2.streamPort", "must be between 1 and 65535", 0);
        errs.add("epg.days", "must be between 1 and 14");

        let rendered = errs.to_string();
        assert!(rendered.starts_with("2 violation(s)"));
        assert!(rendered.contains("enigma2.streamPort"));
        assert!(rendered.contains("epg.days"));
        assert!(errs.has_field("epg.days"));
    }

    #[test]
    fn test_empty_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_alias_conflict_message() {
        let err = ConfigError::AliasConflict {
            legacy: "openWebIF.timeout".into(),
            canonical: "enigma2.timeout".into(),
            legacy_value: "10s".into(),
            canonical_value: "5s".into(),
        };
        assert!(
            err.to_string()
                .contains("openWebIF.timeout conflicts with enigma2.timeout")
        );
    }
}
