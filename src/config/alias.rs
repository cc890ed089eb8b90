//! Compat alias resolution between `openWebIF.*` (legacy) and `enigma2.*`
//! (canonical).
//!
//! Each alias can be set from four places: either YAML section, and either
//! environment name. Values from the same side follow normal precedence
//! (env over file); values from opposite sides must agree once normalized,
//! otherwise the load fails naming both paths.

use super::coerce;
use super::env::EnvResolver;
use super::redact;
use super::types::Enigma2Settings;
use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// A normalized alias value.
#[derive(Debug, Clone, PartialEq)]
pub enum AliasValue {
    Text(String),
    Duration(Duration),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for AliasValue {
    /// URL credentials are masked; rendered values end up in errors and logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasValue::Text(s) => write!(f, "{:?}", redact::mask_url(s)),
            AliasValue::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            AliasValue::Int(i) => write!(f, "{}", i),
            AliasValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvKind {
    Text,
    Duration,
    Millis,
    Int,
    Bool,
}

/// One legacy/canonical pair. `key` is the YAML key in both sections.
#[derive(Debug, Clone, Copy)]
pub struct AliasPair {
    pub key: &'static str,
    pub legacy_env: &'static str,
    pub canonical_env: &'static str,
    legacy_kind: EnvKind,
    canonical_kind: EnvKind,
}

pub const LEGACY_SECTION: &str = "openWebIF";
pub const CANONICAL_SECTION: &str = "enigma2";

pub const ALIAS_PAIRS: &[AliasPair] = &[
    AliasPair {
        key: "baseUrl",
        legacy_env: "XG2G_OWI_BASE",
        canonical_env: "XG2G_E2_HOST",
        legacy_kind: EnvKind::Text,
        canonical_kind: EnvKind::Text,
    },
    AliasPair {
        key: "timeout",
        legacy_env: "XG2G_OWI_TIMEOUT_MS",
        canonical_env: "XG2G_E2_TIMEOUT",
        legacy_kind: EnvKind::Millis,
        canonical_kind: EnvKind::Duration,
    },
    AliasPair {
        key: "retries",
        legacy_env: "XG2G_OWI_RETRIES",
        canonical_env: "XG2G_E2_RETRIES",
        legacy_kind: EnvKind::Int,
        canonical_kind: EnvKind::Int,
    },
    AliasPair {
        key: "backoff",
        legacy_env: "XG2G_OWI_BACKOFF_MS",
        canonical_env: "XG2G_E2_BACKOFF",
        legacy_kind: EnvKind::Millis,
        canonical_kind: EnvKind::Duration,
    },
    AliasPair {
        key: "maxBackoff",
        legacy_env: "XG2G_OWI_MAX_BACKOFF_MS",
        canonical_env: "XG2G_E2_MAX_BACKOFF",
        legacy_kind: EnvKind::Millis,
        canonical_kind: EnvKind::Duration,
    },
    AliasPair {
        key: "streamPort",
        legacy_env: "XG2G_STREAM_PORT",
        canonical_env: "XG2G_E2_STREAM_PORT",
        legacy_kind: EnvKind::Int,
        canonical_kind: EnvKind::Int,
    },
    AliasPair {
        key: "useWebIFStreams",
        legacy_env: "XG2G_USE_WEBIF_STREAMS",
        canonical_env: "XG2G_E2_USE_WEBIF_STREAMS",
        legacy_kind: EnvKind::Bool,
        canonical_kind: EnvKind::Bool,
    },
];

impl AliasPair {
    pub fn legacy_path(&self) -> String {
        format!("{}.{}", LEGACY_SECTION, self.key)
    }

    pub fn canonical_path(&self) -> String {
        format!("{}.{}", CANONICAL_SECTION, self.key)
    }

    fn apply(&self, e2: &mut Enigma2Settings, value: &AliasValue) -> Result<()> {
        let path = self.canonical_path();
        let mismatch = || ConfigError::invalid(&path, format!("unexpected value {}", value));
        match (self.key, value) {
            ("baseUrl", AliasValue::Text(s)) => e2.base_url = s.clone(),
            ("timeout", AliasValue::Duration(d)) => e2.timeout = *d,
            ("retries", AliasValue::Int(i)) => e2.retries = coerce::to_u32(&path, *i)?,
            ("backoff", AliasValue::Duration(d)) => e2.backoff = *d,
            ("maxBackoff", AliasValue::Duration(d)) => e2.max_backoff = *d,
            ("streamPort", AliasValue::Int(i)) => e2.stream_port = coerce::to_u32(&path, *i)?,
            ("useWebIFStreams", AliasValue::Bool(b)) => e2.use_webif_streams = *b,
            _ => return Err(mismatch()),
        }
        Ok(())
    }
}

fn read_env_value(env: &mut EnvResolver<'_>, key: &str, kind: EnvKind) -> Result<Option<AliasValue>> {
    Ok(match kind {
        EnvKind::Text => env.string(key).map(AliasValue::Text),
        EnvKind::Duration => env.duration(key)?.map(AliasValue::Duration),
        EnvKind::Millis => env.duration_ms(key)?.map(AliasValue::Duration),
        EnvKind::Int => env.int(key)?.map(AliasValue::Int),
        EnvKind::Bool => env.bool(key)?.map(AliasValue::Bool),
    })
}

/// Which YAML section a file value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Legacy,
    Canonical,
}

/// Explicitly-set alias values collected during file merge and env reading.
#[derive(Debug, Clone, Default)]
pub struct AliasInputs {
    file_legacy: BTreeMap<&'static str, AliasValue>,
    file_canonical: BTreeMap<&'static str, AliasValue>,
    env_legacy: BTreeMap<&'static str, AliasValue>,
    env_canonical: BTreeMap<&'static str, AliasValue>,
}

impl AliasInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value found in one of the YAML sections.
    pub fn set_file(&mut self, side: Side, key: &'static str, value: AliasValue) {
        match side {
            Side::Legacy => self.file_legacy.insert(key, value),
            Side::Canonical => self.file_canonical.insert(key, value),
        };
    }

    /// Read both environment names of every pair.
    pub fn read_env(&mut self, env: &mut EnvResolver<'_>) -> Result<()> {
        for pair in ALIAS_PAIRS {
            if let Some(v) = read_env_value(env, pair.legacy_env, pair.legacy_kind)? {
                self.env_legacy.insert(pair.key, v);
            }
            if let Some(v) = read_env_value(env, pair.canonical_env, pair.canonical_kind)? {
                self.env_canonical.insert(pair.key, v);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.file_legacy.is_empty()
            && self.file_canonical.is_empty()
            && self.env_legacy.is_empty()
            && self.env_canonical.is_empty()
    }
}

/// Check every pair for cross-side disagreement, then write the winning
/// value into the canonical field. Returns the keys that were set.
pub fn resolve(inputs: &AliasInputs, e2: &mut Enigma2Settings) -> Result<Vec<&'static str>> {
    let mut resolved = Vec::new();
    for pair in ALIAS_PAIRS {
        let key = pair.key;
        let file_legacy = inputs.file_legacy.get(key);
        let file_canonical = inputs.file_canonical.get(key);
        let env_legacy = inputs.env_legacy.get(key);
        let env_canonical = inputs.env_canonical.get(key);

        let legacy_path = pair.legacy_path();
        let canonical_path = pair.canonical_path();
        let checks = [
            (file_legacy, legacy_path.as_str(), file_canonical, canonical_path.as_str()),
            (env_legacy, pair.legacy_env, env_canonical, pair.canonical_env),
            (file_legacy, legacy_path.as_str(), env_canonical, pair.canonical_env),
            (env_legacy, pair.legacy_env, file_canonical, canonical_path.as_str()),
        ];
        for (legacy, legacy_name, canonical, canonical_name) in checks {
            if let (Some(l), Some(c)) = (legacy, canonical)
                && l != c
            {
                return Err(ConfigError::AliasConflict {
                    legacy: legacy_name.to_string(),
                    canonical: canonical_name.to_string(),
                    legacy_value: l.to_string(),
                    canonical_value: c.to_string(),
                });
            }
        }

        let winner = env_canonical
            .or(env_legacy)
            .or(file_canonical)
            .or(file_legacy);
        if let Some(value) = winner {
            pair.apply(e2, value)?;
            debug!(alias = key, value = %value, "alias resolved");
            resolved.push(key);
        }
    }
    Ok(resolved)
}
