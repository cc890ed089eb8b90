//! Immutable, versioned runtime snapshots.

use super::env::{EnvResolver, EnvSource};
use super::redact;
use super::types::{ResolvedConfig, duration_str};
use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Process-level settings read from the environment alongside each load.
pub const RUNTIME_ENV_KEYS: &[&str] = &[
    "XG2G_PLAYLIST_FILENAME",
    "XG2G_PUBLIC_URL",
    "XG2G_HTTP_MAX_IDLE_CONNS",
    "XG2G_HTTP_IDLE_TIMEOUT",
    "XG2G_HTTP_ENABLE_HTTP2",
];

/// Derived paths and environment-only runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEnvFacts {
    pub config_path: Option<PathBuf>,
    pub data_dir: PathBuf,
    pub hls_root: PathBuf,
    pub store_path: PathBuf,
    pub playlist_filename: String,
    pub public_url: String,
    pub http_max_idle_conns: u32,
    #[serde(with = "duration_str")]
    pub http_idle_timeout: Duration,
    pub http_enable_http2: bool,
}

impl RuntimeEnvFacts {
    /// Read every runtime key once. Invalid values fail the build.
    pub fn read(env: &dyn EnvSource, cfg: &ResolvedConfig, config_path: Option<&Path>) -> Result<Self> {
        let mut env = EnvResolver::new(env);
        let max_idle = match env.int("XG2G_HTTP_MAX_IDLE_CONNS")? {
            Some(n) => super::coerce::to_u32("XG2G_HTTP_MAX_IDLE_CONNS", n)?,
            None => 100,
        };
        Ok(Self {
            config_path: config_path.map(Path::to_path_buf),
            data_dir: cfg.data_dir.clone(),
            hls_root: PathBuf::from(&cfg.hls.root),
            store_path: PathBuf::from(&cfg.store.path),
            playlist_filename: env
                .string("XG2G_PLAYLIST_FILENAME")
                .unwrap_or_else(|| "playlist.m3u".to_string()),
            public_url: env.string("XG2G_PUBLIC_URL").unwrap_or_default(),
            http_max_idle_conns: max_idle,
            http_idle_timeout: env
                .duration("XG2G_HTTP_IDLE_TIMEOUT")?
                .unwrap_or(Duration::from_secs(90)),
            http_enable_http2: env.bool("XG2G_HTTP_ENABLE_HTTP2")?.unwrap_or(true),
        })
    }
}

/// A published configuration: validated config, its epoch and the runtime
/// facts it was built with.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub config: Arc<ResolvedConfig>,
    pub epoch: u64,
    pub env: RuntimeEnvFacts,
}

impl Snapshot {
    pub fn new(config: ResolvedConfig, epoch: u64, env: RuntimeEnvFacts) -> Self {
        Self {
            config: Arc::new(config),
            epoch,
            env,
        }
    }

    /// Build a snapshot, reading runtime facts from `source`.
    pub fn build(
        config: ResolvedConfig,
        epoch: u64,
        source: &dyn EnvSource,
        config_path: Option<&Path>,
    ) -> Result<Self> {
        let env = RuntimeEnvFacts::read(source, &config, config_path)?;
        Ok(Self::new(config, epoch, env))
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::json!({
            "epoch": self.epoch,
            "env": redact::mask_secrets(&self.env),
            "config": redact::mask_secrets(self.config.as_ref()),
        });
        write!(f, "{}", rendered)
    }
}
