//! Resolved runtime configuration types.
//!
//! `ResolvedConfig` is the authoritative object handed to consumers. It is
//! produced by the loader after defaults, file and environment have been
//! merged and validated, and is never mutated once published.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Config schema version accepted by this build.
pub const CONFIG_VERSION: &str = "v3";

/// Closed set of API token scopes.
pub const TOKEN_SCOPES: &[&str] = &["v3:read", "v3:write", "v3:admin", "v3:*"];

/// Serialize durations as human-readable strings ("10s", "1m 30s").
pub(crate) mod duration_str {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }
}

/// How the streaming (subordinate) credentials relate to the receiver
/// (primary) credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Empty streaming credentials are copied from the receiver credentials.
    #[default]
    Inherit,
    /// Streaming requests carry no credentials.
    None,
    /// Streaming credentials are used exactly as configured.
    Explicit,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Inherit => "inherit",
            AuthMode::None => "none",
            AuthMode::Explicit => "explicit",
        }
    }
}

impl FromStr for AuthMode {
    type Err = String;

    /// Canonicalizes (trim, lowercase) before matching.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inherit" => Ok(AuthMode::Inherit),
            "none" => Ok(AuthMode::None),
            "explicit" => Ok(AuthMode::Explicit),
            other => Err(format!(
                "invalid auth mode {:?} (expected inherit, none or explicit)",
                other
            )),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An API credential with an explicit scope set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScopedToken {
    pub token: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
}

/// Receiver web-interface credentials (the primary pair).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenWebIfSettings {
    pub username: String,
    pub password: String,
}

/// Receiver client settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enigma2Settings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub auth_mode: AuthMode,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    #[serde(with = "duration_str")]
    pub response_header_timeout: Duration,
    #[serde(with = "duration_str")]
    pub tune_timeout: Duration,
    pub retries: u32,
    #[serde(with = "duration_str")]
    pub backoff: Duration,
    #[serde(with = "duration_str")]
    pub max_backoff: Duration,
    pub rate_limit: u32,
    pub rate_burst: u32,
    pub user_agent: String,
    pub stream_port: u32,
    #[serde(rename = "useWebIFStreams")]
    pub use_webif_streams: bool,
    #[serde(rename = "fallbackTo8001")]
    pub fallback_to_8001: bool,
    pub analyze_duration: String,
    pub probe_size: String,
    #[serde(with = "duration_str")]
    pub preflight_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpgSettings {
    pub enabled: bool,
    pub days: u32,
    pub max_concurrency: u32,
    pub timeout_ms: u32,
    pub retries: u32,
    pub fuzzy_max: u32,
    pub xmltv_path: String,
    pub source: String,
    #[serde(with = "duration_str")]
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    pub listen_addr: String,
    pub token: String,
    pub token_scopes: Vec<String>,
    pub tokens: Vec<ScopedToken>,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSettings {
    pub enabled: bool,
    pub listen_addr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    pub enabled: bool,
    pub cert: String,
    pub key: String,
    #[serde(rename = "forceHTTPS")]
    pub force_https: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PiconSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    pub enabled: bool,
    pub mode: String,
    #[serde(with = "duration_str")]
    pub idle_timeout: Duration,
    /// `None` until a source sets it or discovery fills it in.
    pub tuner_slots: Option<Vec<u32>>,
    pub max_pool: u32,
    pub gpu_limit: u32,
    pub cpu_threshold_scale: f64,
}

impl EngineSettings {
    pub fn is_virtual(&self) -> bool {
        self.mode.eq_ignore_ascii_case("virtual")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub backend: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsSettings {
    pub root: String,
    #[serde(with = "duration_str")]
    pub dvr_window: Duration,
    pub segment_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FfmpegSettings {
    pub bin: String,
    #[serde(with = "duration_str")]
    pub kill_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Requests per second.
    pub global: u32,
    /// Requests per minute on auth endpoints.
    pub auth: u32,
    pub burst: u32,
    pub whitelist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitSettings {
    pub max_sessions: u32,
    /// Zero disables transcoding.
    pub max_transcodes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutSettings {
    #[serde(with = "duration_str")]
    pub transcode_start: Duration,
    #[serde(with = "duration_str")]
    pub transcode_no_progress: Duration,
    #[serde(with = "duration_str")]
    pub kill_grace: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSettings {
    #[serde(with = "duration_str")]
    pub window: Duration,
    pub min_attempts: u32,
    pub failures_threshold: u32,
    pub consecutive_threshold: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundAllowlist {
    pub hosts: Vec<String>,
    pub cidrs: Vec<String>,
    pub ports: Vec<u32>,
    pub schemes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundSettings {
    pub enabled: bool,
    pub allow: OutboundAllowlist,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSettings {
    pub outbound: OutboundSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSettings {
    pub delivery_policy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    #[serde(with = "duration_str")]
    pub lease_ttl: Duration,
    #[serde(with = "duration_str")]
    pub heartbeat_interval: Duration,
    #[serde(with = "duration_str")]
    pub expiry_check_interval: Duration,
}

/// The fully resolved and validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// Binary version that produced this config.
    pub version: String,
    pub config_version: String,
    pub config_strict: bool,
    pub ready_strict: bool,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub log_service: String,
    pub trusted_proxies: Vec<String>,
    pub bouquets: Vec<String>,
    pub recording_roots: BTreeMap<String, String>,

    #[serde(rename = "openWebIF")]
    pub open_webif: OpenWebIfSettings,
    pub enigma2: Enigma2Settings,
    pub epg: EpgSettings,
    pub api: ApiSettings,
    pub metrics: MetricsSettings,
    pub tls: TlsSettings,
    pub picons: PiconSettings,
    pub engine: EngineSettings,
    pub store: StoreSettings,
    pub hls: HlsSettings,
    pub ffmpeg: FfmpegSettings,
    pub rate_limit: RateLimitSettings,
    pub limits: LimitSettings,
    pub timeouts: TimeoutSettings,
    pub breaker: BreakerSettings,
    pub network: NetworkSettings,
    pub streaming: StreamingSettings,
    pub sessions: SessionSettings,
}

impl fmt::Display for ResolvedConfig {
    /// Redacted rendering, safe for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::redact::masked_string(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_canonicalized() {
        assert_eq!(" Inherit ".parse::<AuthMode>().unwrap(), AuthMode::Inherit);
        assert_eq!("NONE".parse::<AuthMode>().unwrap(), AuthMode::None);
        assert_eq!("explicit\n".parse::<AuthMode>().unwrap(), AuthMode::Explicit);
        assert!("basic".parse::<AuthMode>().is_err());
        assert!("".parse::<AuthMode>().is_err());
    }

    #[test]
    fn test_durations_serialize_as_strings() {
        let t = TimeoutSettings {
            transcode_start: Duration::from_secs(15),
            transcode_no_progress: Duration::from_secs(90),
            kill_grace: Duration::from_millis(500),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["transcodeStart"], "15s");
        assert_eq!(json["transcodeNoProgress"], "1m 30s");
        assert_eq!(json["killGrace"], "500ms");
    }

    #[test]
    fn test_engine_virtual_mode() {
        let engine = EngineSettings {
            mode: "Virtual".into(),
            ..Default::default()
        };
        assert!(engine.is_virtual());
    }
}
