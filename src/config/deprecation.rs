//! Deprecation guard for removed and renamed environment keys.
//!
//! The registry is built once at startup and handed to the loader. A key
//! whose removal version has been reached fails the load outright; a key that
//! is only deprecated logs a warning naming its successor.

use super::env::EnvSource;
use crate::error::{ConfigError, Result};
use std::collections::BTreeMap;
use tracing::warn;

/// A removed or renamed configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationEntry {
    pub old_field: String,
    pub new_field: String,
    pub deprecated_since: String,
    pub removal_version: String,
}

impl DeprecationEntry {
    pub fn new(
        old_field: impl Into<String>,
        new_field: impl Into<String>,
        deprecated_since: impl Into<String>,
        removal_version: impl Into<String>,
    ) -> Self {
        Self {
            old_field: old_field.into(),
            new_field: new_field.into(),
            deprecated_since: deprecated_since.into(),
            removal_version: removal_version.into(),
        }
    }

    /// True once `current` has reached the removal version.
    pub fn is_removed(&self, current: &str) -> bool {
        match (major(&self.removal_version), major(current)) {
            (Some(removal), Some(current)) => current >= removal,
            // Unparseable versions are treated as removed
            _ => true,
        }
    }

    pub fn removal_message(&self) -> String {
        format!("{} removed. Use {}", self.old_field, self.new_field)
    }
}

/// Leading major number of `v3`, `3.1.0`, `v4.0`.
fn major(version: &str) -> Option<u32> {
    let v = version.trim().trim_start_matches(['v', 'V']);
    let digits: String = v.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Removed/renamed keys, keyed by old field name, plus rejected prefixes.
#[derive(Debug, Clone, Default)]
pub struct DeprecationRegistry {
    entries: BTreeMap<String, DeprecationEntry>,
    legacy_prefixes: Vec<(&'static str, &'static str)>,
}

impl DeprecationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries shipped with this build.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(DeprecationEntry::new(
            "XG2G_STREAM_PROFILE",
            "XG2G_STREAMING_POLICY=universal (ADR-00X)",
            "v2",
            "v3",
        ));
        registry.register(DeprecationEntry::new(
            "XG2G_HLS_DVR_SECONDS",
            "XG2G_HLS_DVR_WINDOW",
            "v3",
            "v4",
        ));
        registry.reject_prefix("XG2G_V3_", "XG2G_");
        registry
    }

    pub fn register(&mut self, entry: DeprecationEntry) {
        self.entries.insert(entry.old_field.clone(), entry);
    }

    /// Reject every variable starting with `prefix`, pointing at the name
    /// with `prefix` replaced by `replacement`.
    pub fn reject_prefix(&mut self, prefix: &'static str, replacement: &'static str) {
        self.legacy_prefixes.push((prefix, replacement));
    }

    pub fn get(&self, old_field: &str) -> Option<&DeprecationEntry> {
        self.entries.get(old_field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.legacy_prefixes.clear();
    }

    /// Every old key name, for the strict-mode usage check.
    pub fn known_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Fail on removed keys and legacy prefixes present in `env`; warn on
    /// keys that are only deprecated.
    pub fn check_env(&self, env: &dyn EnvSource, current_version: &str) -> Result<()> {
        for (key, entry) in &self.entries {
            let Some(value) = env.get(key) else { continue };
            if value.trim().is_empty() {
                continue;
            }
            if entry.is_removed(current_version) {
                return Err(ConfigError::Deprecated(entry.removal_message()));
            }
            warn!(
                key = %key,
                replacement = %entry.new_field,
                since = %entry.deprecated_since,
                removal = %entry.removal_version,
                "deprecated environment variable in use"
            );
        }

        let mut keys = env.keys();
        keys.sort();
        for key in keys {
            for &(prefix, replacement) in &self.legacy_prefixes {
                if let Some(rest) = key.strip_prefix(prefix) {
                    return Err(ConfigError::LegacyPrefix {
                        var: key.clone(),
                        prefix,
                        replacement: format!("{}{}", replacement, rest),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::env::MapEnv;

    #[test]
    fn test_stream_profile_fails_start() {
        let env = MapEnv::from_pairs([("XG2G_STREAM_PROFILE", "auto")]);
        let err = DeprecationRegistry::standard()
            .check_env(&env, "v3")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "XG2G_STREAM_PROFILE removed. Use XG2G_STREAMING_POLICY=universal (ADR-00X)"
        );
        assert!(err.is_deprecation());
    }

    #[test]
    fn test_blank_removed_key_ignored() {
        let env = MapEnv::from_pairs([("XG2G_STREAM_PROFILE", " ")]);
        assert!(DeprecationRegistry::standard().check_env(&env, "v3").is_ok());
    }

    #[test]
    fn test_deprecated_key_only_warns() {
        let env = MapEnv::from_pairs([("XG2G_HLS_DVR_SECONDS", "2700")]);
        assert!(DeprecationRegistry::standard().check_env(&env, "v3").is_ok());
        assert!(DeprecationRegistry::standard().check_env(&env, "v4").is_err());
    }

    #[test]
    fn test_legacy_prefix_rejected() {
        let env = MapEnv::from_pairs([("XG2G_V3_HLS_ROOT", "/srv/hls")]);
        let err = DeprecationRegistry::standard()
            .check_env(&env, "v3")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("XG2G_V3_HLS_ROOT"));
        assert!(msg.contains("XG2G_HLS_ROOT"));
    }

    #[test]
    fn test_isolated_registry() {
        let mut registry = DeprecationRegistry::new();
        assert!(registry.is_empty());
        registry.register(DeprecationEntry::new("XG2G_OLD", "XG2G_NEW", "v1", "v2"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("XG2G_OLD").unwrap().new_field, "XG2G_NEW");

        let env = MapEnv::from_pairs([("XG2G_OLD", "1"), ("XG2G_STREAM_PROFILE", "x")]);
        let err = registry.check_env(&env, "v3").unwrap_err();
        assert_eq!(err.to_string(), "XG2G_OLD removed. Use XG2G_NEW");

        registry.clear();
        assert!(registry.check_env(&env, "v3").is_ok());
    }

    #[test]
    fn test_major_version_parsing() {
        assert_eq!(major("v3"), Some(3));
        assert_eq!(major("3.1.0"), Some(3));
        assert_eq!(major("V10"), Some(10));
        assert_eq!(major("dev"), None);
    }
}
