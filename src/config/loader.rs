//! Configuration loader.
//!
//! Runs one deterministic pipeline from registry defaults, through the YAML
//! file and the environment, to a validated [`ResolvedConfig`]:
//!
//! 1. deprecation guard (removed keys and legacy prefixes)
//! 2. registry defaults
//! 3. strict file parse and merge
//! 4. registry-bound environment overrides
//! 5. alias conflict resolution
//! 6. auth-mode validation, then resolution
//! 7. path normalization and sibling fallbacks
//! 8. tuner slot discovery
//! 9. strict environment usage check
//! 10. validation

use super::alias::{self, AliasInputs};
use super::auth_mode;
use super::defaults::DefaultRegistry;
use super::deprecation::DeprecationRegistry;
use super::discovery::{self, DEFAULT_DISCOVERY_TIMEOUT, SlotDiscovery};
use super::env::{self, EnvResolver, EnvSource, ProcessEnv};
use super::file;
use super::snapshot::RUNTIME_ENV_KEYS;
use super::types::{CONFIG_VERSION, ResolvedConfig};
use super::validation;
use crate::error::{ConfigError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Builds a [`ResolvedConfig`] from defaults, an optional YAML file and an
/// environment source. Cheap to clone; the holder keeps one for reloads.
#[derive(Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    version: String,
    env: Arc<dyn EnvSource>,
    defaults: Arc<DefaultRegistry>,
    deprecations: Arc<DeprecationRegistry>,
    discovery: Option<Arc<dyn SlotDiscovery>>,
    discovery_timeout: Duration,
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("config_path", &self.config_path)
            .field("version", &self.version)
            .field("defaults", &self.defaults.entries().len())
            .field("deprecations", &self.deprecations.len())
            .field("discovery", &self.discovery.is_some())
            .field("discovery_timeout", &self.discovery_timeout)
            .finish()
    }
}

impl ConfigLoader {
    /// Loader over the process environment with the standard registries.
    pub fn new(config_path: Option<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            config_path,
            version: version.into(),
            env: Arc::new(ProcessEnv),
            defaults: Arc::new(DefaultRegistry::standard()),
            deprecations: Arc::new(DeprecationRegistry::standard()),
            discovery: None,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_registry(mut self, defaults: DefaultRegistry) -> Self {
        self.defaults = Arc::new(defaults);
        self
    }

    pub fn with_deprecations(mut self, deprecations: DeprecationRegistry) -> Self {
        self.deprecations = Arc::new(deprecations);
        self
    }

    pub fn with_slot_discovery(mut self, discovery: Arc<dyn SlotDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn env(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    pub fn registry(&self) -> &DefaultRegistry {
        &self.defaults
    }

    /// Run the full pipeline.
    pub async fn load(&self) -> Result<ResolvedConfig> {
        self.deprecations.check_env(self.env.as_ref(), CONFIG_VERSION)?;

        let mut cfg = self.defaults.defaults()?;
        cfg.config_version = CONFIG_VERSION.to_string();

        let mut env = EnvResolver::new(self.env.as_ref());
        let mut aliases = AliasInputs::new();

        if let Some(path) = &self.config_path {
            let parsed = file::load_file(path)?;
            file::merge_file(&parsed, &mut cfg, &mut env, &mut aliases)?;
            debug!(path = %path.display(), "config file merged");
        }

        let applied = env::apply_registry_env(&self.defaults, &mut env, &mut cfg)?;
        aliases.read_env(&mut env)?;
        debug!(overrides = applied.len(), "environment applied");

        alias::resolve(&aliases, &mut cfg.enigma2)?;

        auth_mode::validate_inputs(&cfg.open_webif, &cfg.enigma2)?;
        auth_mode::resolve(&cfg.open_webif, &mut cfg.enigma2);

        normalize(&mut cfg)?;
        cfg.version = self.version.clone();

        discovery::apply_discovery(
            &mut cfg.engine,
            &cfg.enigma2,
            self.discovery.as_deref(),
            self.discovery_timeout,
        )
        .await;

        if cfg.config_strict {
            let mut known: Vec<&str> = RUNTIME_ENV_KEYS.to_vec();
            known.extend(self.deprecations.known_keys());
            let unknown = env.unconsumed(known);
            if !unknown.is_empty() {
                return Err(ConfigError::UnknownEnv(unknown));
            }
        }

        validation::validate(&cfg)?;

        info!(
            path = ?self.config_path,
            strict = cfg.config_strict,
            version = %cfg.version,
            "configuration loaded"
        );
        Ok(cfg)
    }
}

/// Make the data directory absolute and fill fields that default to a
/// sibling value.
fn normalize(cfg: &mut ResolvedConfig) -> Result<()> {
    if !cfg.data_dir.as_os_str().is_empty() && !cfg.data_dir.is_absolute() {
        cfg.data_dir = std::path::absolute(&cfg.data_dir)
            .map_err(|e| ConfigError::invalid("dataDir", e))?;
    }
    if cfg.hls.root.trim().is_empty() {
        cfg.hls.root = cfg.data_dir.join("hls").display().to_string();
    }
    if cfg.picons.base_url.trim().is_empty() {
        cfg.picons.base_url = cfg.enigma2.base_url.clone();
    }
    cfg.log_level = cfg.log_level.trim().to_ascii_lowercase();
    Ok(())
}
