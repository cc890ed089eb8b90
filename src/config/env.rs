//! Environment variable resolution.
//!
//! All environment access goes through [`EnvSource`] so the loader can be
//! driven from the process environment or from an in-memory map. The
//! [`EnvResolver`] wraps a source for one load and records every key it
//! looked at, which the strict-mode usage check relies on.

use super::coerce;
use super::defaults::DefaultRegistry;
use super::types::ResolvedConfig;
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::debug;

/// Namespace shared by every variable this crate reads.
pub const ENV_PREFIX: &str = "XG2G_";

/// Read-only view of an environment.
pub trait EnvSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// All variable names currently set.
    fn keys(&self) -> Vec<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars_os()
            .filter_map(|(k, _)| k.into_string().ok())
            .collect()
    }
}

/// In-memory environment.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.vars.remove(key);
        self
    }
}

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }
}

/// Per-load environment reader that remembers which keys were consumed.
///
/// Blank values count as unset for every type.
pub struct EnvResolver<'a> {
    source: &'a dyn EnvSource,
    consumed: BTreeSet<String>,
}

impl<'a> EnvResolver<'a> {
    pub fn new(source: &'a dyn EnvSource) -> Self {
        Self {
            source,
            consumed: BTreeSet::new(),
        }
    }

    pub fn source(&self) -> &'a dyn EnvSource {
        self.source
    }

    /// Raw trimmed value, or `None` when unset or blank.
    pub fn lookup(&mut self, key: &str) -> Option<String> {
        let raw = self.source.get(key)?;
        self.consumed.insert(key.to_string());
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    pub fn bool(&mut self, key: &str) -> Result<Option<bool>> {
        self.lookup(key)
            .map(|raw| coerce::parse_bool(key, &raw))
            .transpose()
    }

    pub fn int(&mut self, key: &str) -> Result<Option<i64>> {
        self.lookup(key)
            .map(|raw| coerce::parse_int(key, &raw))
            .transpose()
    }

    pub fn duration(&mut self, key: &str) -> Result<Option<Duration>> {
        self.lookup(key)
            .map(|raw| coerce::parse_duration(key, &raw))
            .transpose()
    }

    pub fn duration_ms(&mut self, key: &str) -> Result<Option<Duration>> {
        self.lookup(key)
            .map(|raw| coerce::parse_duration_ms(key, &raw))
            .transpose()
    }

    /// Expand `$VAR` references against this environment.
    pub fn expand(&mut self, raw: &str) -> String {
        let source = self.source;
        let consumed = &mut self.consumed;
        coerce::expand_env(raw, |name| {
            let value = source.get(name);
            if value.is_some() {
                consumed.insert(name.to_string());
            }
            value
        })
    }

    pub fn consumed(&self) -> &BTreeSet<String> {
        &self.consumed
    }

    /// Set `XG2G_*` variables that nothing consumed and `known` does not list.
    pub fn unconsumed<'k>(&self, known: impl IntoIterator<Item = &'k str>) -> Vec<String> {
        let known: BTreeSet<&str> = known.into_iter().collect();
        let mut out: Vec<String> = self
            .source
            .keys()
            .into_iter()
            .filter(|k| k.starts_with(ENV_PREFIX))
            .filter(|k| !self.consumed.contains(k) && !known.contains(k.as_str()))
            .collect();
        out.sort();
        out
    }
}

/// Apply every registry-bound environment variable onto `cfg`.
///
/// Returns the registry paths that were overridden.
pub fn apply_registry_env(
    registry: &DefaultRegistry,
    env: &mut EnvResolver<'_>,
    cfg: &mut ResolvedConfig,
) -> Result<Vec<&'static str>> {
    let mut applied = Vec::new();
    for entry in registry.entries() {
        let Some(key) = entry.env else { continue };
        let Some(raw) = env.lookup(key) else { continue };
        let value = entry.default.coerce_like(key, &raw)?;
        entry.set(cfg, value).map_err(|e| match e {
            ConfigError::InvalidValue { reason, .. } => ConfigError::invalid(key, reason),
            other => other,
        })?;
        debug!(key, path = entry.path, "environment override applied");
        applied.push(entry.path);
    }

    // A metrics listen address from the environment implies the server is on.
    if applied.contains(&"metrics.listenAddr") && !cfg.metrics.listen_addr.is_empty() {
        cfg.metrics.enabled = true;
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolver_records_consumed_keys() {
        let env = MapEnv::from_pairs([("XG2G_EPG_DAYS", "7"), ("XG2G_BLANK", "  ")]);
        let mut resolver = EnvResolver::new(&env);
        assert_eq!(resolver.int("XG2G_EPG_DAYS").unwrap(), Some(7));
        assert_eq!(resolver.string("XG2G_BLANK"), None);
        assert_eq!(resolver.string("XG2G_MISSING"), None);
        assert!(resolver.consumed().contains("XG2G_EPG_DAYS"));
        assert!(resolver.consumed().contains("XG2G_BLANK"));
        assert!(!resolver.consumed().contains("XG2G_MISSING"));
    }

    #[test]
    fn test_unconsumed_lists_only_prefixed_unknowns() {
        let env = MapEnv::from_pairs([
            ("XG2G_LISTEN", ":9000"),
            ("XG2G_TYPO", "1"),
            ("XG2G_PUBLIC_URL", "http://x"),
            ("HOME", "/root"),
        ]);
        let mut resolver = EnvResolver::new(&env);
        resolver.lookup("XG2G_LISTEN");
        assert_eq!(resolver.unconsumed(["XG2G_PUBLIC_URL"]), vec!["XG2G_TYPO"]);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let env = MapEnv::from_pairs([("XG2G_EPG_DAYS", "many")]);
        let mut resolver = EnvResolver::new(&env);
        let mut cfg = DefaultRegistry::standard().defaults().unwrap();
        let err = apply_registry_env(&DefaultRegistry::standard(), &mut resolver, &mut cfg)
            .unwrap_err();
        assert!(err.to_string().contains("XG2G_EPG_DAYS"));
    }

    #[test]
    fn test_negative_int_names_variable() {
        let env = MapEnv::from_pairs([("XG2G_MAX_SESSIONS", "-1")]);
        let mut resolver = EnvResolver::new(&env);
        let mut cfg = DefaultRegistry::standard().defaults().unwrap();
        let err = apply_registry_env(&DefaultRegistry::standard(), &mut resolver, &mut cfg)
            .unwrap_err();
        assert!(err.to_string().contains("XG2G_MAX_SESSIONS"));
    }

    #[test]
    fn test_registry_env_overrides() {
        let env = MapEnv::from_pairs([
            ("XG2G_EPG_ENABLED", "false"),
            ("XG2G_MAX_TRANSCODES", "0"),
            ("XG2G_ENGINE_IDLE_TIMEOUT", "90s"),
            ("XG2G_METRICS_LISTEN", ":9100"),
            ("XG2G_TRUSTED_PROXIES", "10.0.0.0/8, 127.0.0.1"),
        ]);
        let registry = DefaultRegistry::standard();
        let mut resolver = EnvResolver::new(&env);
        let mut cfg = registry.defaults().unwrap();
        apply_registry_env(&registry, &mut resolver, &mut cfg).unwrap();

        assert!(!cfg.epg.enabled);
        assert_eq!(cfg.limits.max_transcodes, 0);
        assert_eq!(cfg.engine.idle_timeout, Duration::from_secs(90));
        assert!(cfg.metrics.enabled);
        assert_eq!(cfg.trusted_proxies, vec!["10.0.0.0/8", "127.0.0.1"]);
    }

    #[test]
    fn test_expand_marks_consumed() {
        let env = MapEnv::from_pairs([("XG2G_SECRET_REF", "pw")]);
        let mut resolver = EnvResolver::new(&env);
        assert_eq!(resolver.expand("${XG2G_SECRET_REF}"), "pw");
        assert!(resolver.consumed().contains("XG2G_SECRET_REF"));
    }
}
