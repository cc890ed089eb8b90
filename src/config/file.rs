//! Strict YAML config file parsing, merging and saving.
//!
//! The on-disk shape is [`FileConfig`]: every field optional so that an
//! absent key leaves the lower layer untouched while an explicit zero, false
//! or empty string overrides it. Unknown keys at any depth are parse errors.

use super::alias::{self, AliasInputs, AliasValue, Side};
use super::coerce;
use super::env::EnvResolver;
use super::types::{AuthMode, CONFIG_VERSION, ResolvedConfig, ScopedToken};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileConfig {
    pub version: Option<String>,
    pub config_version: Option<String>,
    pub config_strict: Option<bool>,
    pub ready_strict: Option<bool>,
    pub data_dir: Option<String>,
    pub log_level: Option<String>,
    pub log_service: Option<String>,
    pub trusted_proxies: Option<Vec<String>>,
    pub bouquets: Option<Vec<String>>,
    pub recording_roots: Option<BTreeMap<String, String>>,
    #[serde(rename = "openWebIF")]
    pub open_webif: Option<FileOpenWebIf>,
    pub enigma2: Option<FileEnigma2>,
    pub epg: Option<FileEpg>,
    pub api: Option<FileApi>,
    pub metrics: Option<FileMetrics>,
    pub tls: Option<FileTls>,
    pub picons: Option<FilePicons>,
    pub engine: Option<FileEngine>,
    pub store: Option<FileStore>,
    pub hls: Option<FileHls>,
    pub ffmpeg: Option<FileFfmpeg>,
    pub rate_limit: Option<FileRateLimit>,
    pub limits: Option<FileLimits>,
    pub timeouts: Option<FileTimeouts>,
    pub breaker: Option<FileBreaker>,
    pub network: Option<FileNetwork>,
    pub streaming: Option<FileStreaming>,
    pub sessions: Option<FileSessions>,
}

/// Legacy receiver section. Credentials are the primary pair; the remaining
/// keys are compat aliases of `enigma2.*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileOpenWebIf {
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub retries: Option<u32>,
    pub backoff: Option<String>,
    pub max_backoff: Option<String>,
    pub stream_port: Option<u32>,
    #[serde(rename = "useWebIFStreams")]
    pub use_webif_streams: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileEnigma2 {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_mode: Option<String>,
    pub timeout: Option<String>,
    pub response_header_timeout: Option<String>,
    pub tune_timeout: Option<String>,
    pub retries: Option<u32>,
    pub backoff: Option<String>,
    pub max_backoff: Option<String>,
    pub rate_limit: Option<u32>,
    pub rate_burst: Option<u32>,
    pub user_agent: Option<String>,
    pub stream_port: Option<u32>,
    #[serde(rename = "useWebIFStreams")]
    pub use_webif_streams: Option<bool>,
    #[serde(rename = "fallbackTo8001")]
    pub fallback_to_8001: Option<bool>,
    pub analyze_duration: Option<String>,
    pub probe_size: Option<String>,
    pub preflight_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileEpg {
    pub enabled: Option<bool>,
    pub days: Option<u32>,
    pub max_concurrency: Option<u32>,
    pub timeout_ms: Option<u32>,
    pub retries: Option<u32>,
    pub fuzzy_max: Option<u32>,
    pub xmltv_path: Option<String>,
    pub source: Option<String>,
    pub refresh_interval: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileApi {
    pub listen_addr: Option<String>,
    pub token: Option<String>,
    pub token_scopes: Option<Vec<String>>,
    pub tokens: Option<Vec<ScopedToken>>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileMetrics {
    pub enabled: Option<bool>,
    pub listen_addr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileTls {
    pub enabled: Option<bool>,
    pub cert: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "forceHTTPS")]
    pub force_https: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilePicons {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileEngine {
    pub enabled: Option<bool>,
    pub mode: Option<String>,
    pub idle_timeout: Option<String>,
    pub tuner_slots: Option<Vec<u32>>,
    pub max_pool: Option<u32>,
    pub gpu_limit: Option<u32>,
    pub cpu_threshold_scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileStore {
    pub backend: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileHls {
    pub root: Option<String>,
    pub dvr_window: Option<String>,
    pub segment_seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileFfmpeg {
    pub bin: Option<String>,
    pub kill_timeout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileRateLimit {
    pub enabled: Option<bool>,
    pub global: Option<u32>,
    pub auth: Option<u32>,
    pub burst: Option<u32>,
    pub whitelist: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileLimits {
    pub max_sessions: Option<u32>,
    pub max_transcodes: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileTimeouts {
    pub transcode_start: Option<String>,
    pub transcode_no_progress: Option<String>,
    pub kill_grace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileBreaker {
    pub window: Option<String>,
    pub min_attempts: Option<u32>,
    pub failures_threshold: Option<u32>,
    pub consecutive_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileAllowlist {
    pub hosts: Option<Vec<String>>,
    pub cidrs: Option<Vec<String>>,
    pub ports: Option<Vec<u32>>,
    pub schemes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileOutbound {
    pub enabled: Option<bool>,
    pub allow: Option<FileAllowlist>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileNetwork {
    pub outbound: Option<FileOutbound>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileStreaming {
    pub delivery_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileSessions {
    pub lease_ttl: Option<String>,
    pub heartbeat_interval: Option<String>,
    pub expiry_check_interval: Option<String>,
}

/// Read and strictly parse the config file at `path`.
pub fn load_file(path: &Path) -> Result<FileConfig> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext != "yaml" && ext != "yml" {
        let shown = if ext.is_empty() {
            path.display().to_string()
        } else {
            format!(".{}", ext)
        };
        return Err(ConfigError::UnsupportedFormat(shown));
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file = parse_str(&content)?;
    debug!(path = %path.display(), "config file parsed");
    Ok(file)
}

/// Strictly parse YAML text. Blank or comment-only input yields an empty
/// config; more than one document is rejected.
pub fn parse_str(content: &str) -> Result<FileConfig> {
    if is_blank(content) {
        return Ok(FileConfig::default());
    }

    let mut documents = serde_yaml::Deserializer::from_str(content);
    let Some(first) = documents.next() else {
        return Ok(FileConfig::default());
    };
    let file = FileConfig::deserialize(first).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if documents.next().is_some() {
        return Err(ConfigError::MultipleDocuments);
    }

    check_version("version", file.version.as_deref())?;
    check_version("configVersion", file.config_version.as_deref())?;
    Ok(file)
}

fn is_blank(content: &str) -> bool {
    content.lines().map(str::trim).all(|line| {
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

fn check_version(key: &str, found: Option<&str>) -> Result<()> {
    match found.map(str::trim) {
        None | Some("") => Ok(()),
        Some(v) if v == CONFIG_VERSION => Ok(()),
        Some(v) => {
            debug!(key, found = v, "config version mismatch");
            Err(ConfigError::Version {
                found: v.to_string(),
                expected: CONFIG_VERSION,
            })
        }
    }
}

fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

fn set_text(dst: &mut String, src: &Option<String>, env: &mut EnvResolver<'_>) {
    if let Some(v) = src {
        *dst = env.expand(v);
    }
}

fn set_list(dst: &mut Vec<String>, src: &Option<Vec<String>>, env: &mut EnvResolver<'_>) {
    if let Some(items) = src {
        *dst = items
            .iter()
            .map(|item| env.expand(item).trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }
}

fn set_duration(dst: &mut Duration, src: &Option<String>, key: &str) -> Result<()> {
    if let Some(raw) = src {
        *dst = coerce::parse_duration(key, raw)?;
    }
    Ok(())
}

/// Alias-managed keys shared by the `openWebIF` and `enigma2` sections.
struct AliasFields<'a> {
    base_url: Option<String>,
    timeout: &'a Option<String>,
    retries: Option<u32>,
    backoff: &'a Option<String>,
    max_backoff: &'a Option<String>,
    stream_port: Option<u32>,
    use_webif_streams: Option<bool>,
}

fn capture_aliases(
    side: Side,
    section: &str,
    fields: AliasFields<'_>,
    aliases: &mut AliasInputs,
) -> Result<()> {
    let duration = |key: &str, raw: &str| coerce::parse_duration(&format!("{}.{}", section, key), raw);
    if let Some(url) = fields.base_url {
        aliases.set_file(side, "baseUrl", AliasValue::Text(url.trim().to_string()));
    }
    if let Some(raw) = fields.timeout {
        aliases.set_file(side, "timeout", AliasValue::Duration(duration("timeout", raw.as_str())?));
    }
    if let Some(n) = fields.retries {
        aliases.set_file(side, "retries", AliasValue::Int(i64::from(n)));
    }
    if let Some(raw) = fields.backoff {
        aliases.set_file(side, "backoff", AliasValue::Duration(duration("backoff", raw.as_str())?));
    }
    if let Some(raw) = fields.max_backoff {
        aliases.set_file(side, "maxBackoff", AliasValue::Duration(duration("maxBackoff", raw.as_str())?));
    }
    if let Some(port) = fields.stream_port {
        aliases.set_file(side, "streamPort", AliasValue::Int(i64::from(port)));
    }
    if let Some(b) = fields.use_webif_streams {
        aliases.set_file(side, "useWebIFStreams", AliasValue::Bool(b));
    }
    Ok(())
}

/// Overlay every explicitly-set field of `file` onto `cfg`.
///
/// String values have `$VAR` references expanded. Alias fields from both
/// receiver sections are captured into `aliases` and only written to `cfg`
/// once conflicts have been checked.
pub fn merge_file(
    file: &FileConfig,
    cfg: &mut ResolvedConfig,
    env: &mut EnvResolver<'_>,
    aliases: &mut AliasInputs,
) -> Result<()> {
    if let Some(v) = &file.config_version {
        cfg.config_version = v.trim().to_string();
    }
    set(&mut cfg.config_strict, &file.config_strict);
    set(&mut cfg.ready_strict, &file.ready_strict);
    if let Some(dir) = &file.data_dir {
        cfg.data_dir = PathBuf::from(env.expand(dir));
    }
    set_text(&mut cfg.log_level, &file.log_level, env);
    set_text(&mut cfg.log_service, &file.log_service, env);
    set_list(&mut cfg.trusted_proxies, &file.trusted_proxies, env);
    set_list(&mut cfg.bouquets, &file.bouquets, env);
    if let Some(roots) = &file.recording_roots {
        cfg.recording_roots = roots
            .iter()
            .map(|(k, v)| (k.clone(), env.expand(v)))
            .collect();
    }

    if let Some(owi) = &file.open_webif {
        set_text(&mut cfg.open_webif.username, &owi.username, env);
        set_text(&mut cfg.open_webif.password, &owi.password, env);
        let fields = AliasFields {
            base_url: owi.base_url.as_ref().map(|u| env.expand(u)),
            timeout: &owi.timeout,
            retries: owi.retries,
            backoff: &owi.backoff,
            max_backoff: &owi.max_backoff,
            stream_port: owi.stream_port,
            use_webif_streams: owi.use_webif_streams,
        };
        capture_aliases(Side::Legacy, alias::LEGACY_SECTION, fields, aliases)?;
    }

    if let Some(e2) = &file.enigma2 {
        let dst = &mut cfg.enigma2;
        set_text(&mut dst.username, &e2.username, env);
        set_text(&mut dst.password, &e2.password, env);
        if let Some(mode) = &e2.auth_mode {
            dst.auth_mode = mode
                .parse::<AuthMode>()
                .map_err(|reason| ConfigError::invalid("enigma2.authMode", reason))?;
        }
        set_duration(&mut dst.response_header_timeout, &e2.response_header_timeout, "enigma2.responseHeaderTimeout")?;
        set_duration(&mut dst.tune_timeout, &e2.tune_timeout, "enigma2.tuneTimeout")?;
        set(&mut dst.rate_limit, &e2.rate_limit);
        set(&mut dst.rate_burst, &e2.rate_burst);
        set_text(&mut dst.user_agent, &e2.user_agent, env);
        set(&mut dst.fallback_to_8001, &e2.fallback_to_8001);
        set_text(&mut dst.analyze_duration, &e2.analyze_duration, env);
        set_text(&mut dst.probe_size, &e2.probe_size, env);
        set_duration(&mut dst.preflight_timeout, &e2.preflight_timeout, "enigma2.preflightTimeout")?;
        let fields = AliasFields {
            base_url: e2.base_url.as_ref().map(|u| env.expand(u)),
            timeout: &e2.timeout,
            retries: e2.retries,
            backoff: &e2.backoff,
            max_backoff: &e2.max_backoff,
            stream_port: e2.stream_port,
            use_webif_streams: e2.use_webif_streams,
        };
        capture_aliases(Side::Canonical, alias::CANONICAL_SECTION, fields, aliases)?;
    }

    if let Some(epg) = &file.epg {
        let dst = &mut cfg.epg;
        set(&mut dst.enabled, &epg.enabled);
        set(&mut dst.days, &epg.days);
        set(&mut dst.max_concurrency, &epg.max_concurrency);
        set(&mut dst.timeout_ms, &epg.timeout_ms);
        set(&mut dst.retries, &epg.retries);
        set(&mut dst.fuzzy_max, &epg.fuzzy_max);
        set_text(&mut dst.xmltv_path, &epg.xmltv_path, env);
        set_text(&mut dst.source, &epg.source, env);
        set_duration(&mut dst.refresh_interval, &epg.refresh_interval, "epg.refreshInterval")?;
    }

    if let Some(api) = &file.api {
        let dst = &mut cfg.api;
        set_text(&mut dst.listen_addr, &api.listen_addr, env);
        set_text(&mut dst.token, &api.token, env);
        set_list(&mut dst.token_scopes, &api.token_scopes, env);
        if let Some(tokens) = &api.tokens {
            let expanded = tokens
                .iter()
                .map(|t| ScopedToken {
                    token: env.expand(&t.token),
                    scopes: t.scopes.clone(),
                    user: t.user.clone(),
                })
                .collect();
            dst.tokens = coerce::normalize_tokens("api.tokens", expanded)?;
        }
        set_list(&mut dst.allowed_origins, &api.allowed_origins, env);
    }

    if let Some(metrics) = &file.metrics {
        set(&mut cfg.metrics.enabled, &metrics.enabled);
        set_text(&mut cfg.metrics.listen_addr, &metrics.listen_addr, env);
    }

    if let Some(tls) = &file.tls {
        set(&mut cfg.tls.enabled, &tls.enabled);
        set_text(&mut cfg.tls.cert, &tls.cert, env);
        set_text(&mut cfg.tls.key, &tls.key, env);
        set(&mut cfg.tls.force_https, &tls.force_https);
    }

    if let Some(picons) = &file.picons {
        set_text(&mut cfg.picons.base_url, &picons.base_url, env);
    }

    if let Some(engine) = &file.engine {
        let dst = &mut cfg.engine;
        set(&mut dst.enabled, &engine.enabled);
        set_text(&mut dst.mode, &engine.mode, env);
        set_duration(&mut dst.idle_timeout, &engine.idle_timeout, "engine.idleTimeout")?;
        if let Some(slots) = &engine.tuner_slots {
            dst.tuner_slots = (!slots.is_empty()).then(|| slots.clone());
        }
        set(&mut dst.max_pool, &engine.max_pool);
        set(&mut dst.gpu_limit, &engine.gpu_limit);
        set(&mut dst.cpu_threshold_scale, &engine.cpu_threshold_scale);
    }

    if let Some(store) = &file.store {
        set_text(&mut cfg.store.backend, &store.backend, env);
        set_text(&mut cfg.store.path, &store.path, env);
    }

    if let Some(hls) = &file.hls {
        set_text(&mut cfg.hls.root, &hls.root, env);
        set_duration(&mut cfg.hls.dvr_window, &hls.dvr_window, "hls.dvrWindow")?;
        set(&mut cfg.hls.segment_seconds, &hls.segment_seconds);
    }

    if let Some(ffmpeg) = &file.ffmpeg {
        set_text(&mut cfg.ffmpeg.bin, &ffmpeg.bin, env);
        set_duration(&mut cfg.ffmpeg.kill_timeout, &ffmpeg.kill_timeout, "ffmpeg.killTimeout")?;
    }

    if let Some(rl) = &file.rate_limit {
        let dst = &mut cfg.rate_limit;
        set(&mut dst.enabled, &rl.enabled);
        set(&mut dst.global, &rl.global);
        set(&mut dst.auth, &rl.auth);
        set(&mut dst.burst, &rl.burst);
        set_list(&mut dst.whitelist, &rl.whitelist, env);
    }

    if let Some(limits) = &file.limits {
        set(&mut cfg.limits.max_sessions, &limits.max_sessions);
        set(&mut cfg.limits.max_transcodes, &limits.max_transcodes);
    }

    if let Some(t) = &file.timeouts {
        let dst = &mut cfg.timeouts;
        set_duration(&mut dst.transcode_start, &t.transcode_start, "timeouts.transcodeStart")?;
        set_duration(&mut dst.transcode_no_progress, &t.transcode_no_progress, "timeouts.transcodeNoProgress")?;
        set_duration(&mut dst.kill_grace, &t.kill_grace, "timeouts.killGrace")?;
    }

    if let Some(b) = &file.breaker {
        let dst = &mut cfg.breaker;
        set_duration(&mut dst.window, &b.window, "breaker.window")?;
        set(&mut dst.min_attempts, &b.min_attempts);
        set(&mut dst.failures_threshold, &b.failures_threshold);
        set(&mut dst.consecutive_threshold, &b.consecutive_threshold);
    }

    if let Some(outbound) = file.network.as_ref().and_then(|n| n.outbound.as_ref()) {
        let dst = &mut cfg.network.outbound;
        set(&mut dst.enabled, &outbound.enabled);
        if let Some(allow) = &outbound.allow {
            set_list(&mut dst.allow.hosts, &allow.hosts, env);
            set_list(&mut dst.allow.cidrs, &allow.cidrs, env);
            set(&mut dst.allow.ports, &allow.ports);
            set_list(&mut dst.allow.schemes, &allow.schemes, env);
        }
    }

    if let Some(streaming) = &file.streaming {
        set_text(&mut cfg.streaming.delivery_policy, &streaming.delivery_policy, env);
    }

    if let Some(s) = &file.sessions {
        let dst = &mut cfg.sessions;
        set_duration(&mut dst.lease_ttl, &s.lease_ttl, "sessions.leaseTtl")?;
        set_duration(&mut dst.heartbeat_interval, &s.heartbeat_interval, "sessions.heartbeatInterval")?;
        set_duration(&mut dst.expiry_check_interval, &s.expiry_check_interval, "sessions.expiryCheckInterval")?;
    }

    Ok(())
}

fn dur(d: Duration) -> Option<String> {
    Some(humantime::format_duration(d).to_string())
}

impl FileConfig {
    /// The file representation of a resolved config. Alias values are written
    /// only under `enigma2`; the legacy section carries just the credentials.
    pub fn from_resolved(cfg: &ResolvedConfig) -> Self {
        let e2 = &cfg.enigma2;
        // Values the loader derives from a sibling are left out so the
        // derivation still applies after the file is reloaded.
        let inherited = e2.auth_mode == AuthMode::Inherit
            && e2.username == cfg.open_webif.username
            && e2.password == cfg.open_webif.password;
        let derived_hls = cfg.data_dir.join("hls").display().to_string();
        Self {
            version: None,
            config_version: Some(cfg.config_version.clone()),
            config_strict: Some(cfg.config_strict),
            ready_strict: Some(cfg.ready_strict),
            data_dir: Some(cfg.data_dir.display().to_string()),
            log_level: Some(cfg.log_level.clone()),
            log_service: Some(cfg.log_service.clone()),
            trusted_proxies: Some(cfg.trusted_proxies.clone()),
            bouquets: Some(cfg.bouquets.clone()),
            recording_roots: Some(cfg.recording_roots.clone()),
            open_webif: Some(FileOpenWebIf {
                username: Some(cfg.open_webif.username.clone()),
                password: Some(cfg.open_webif.password.clone()),
                ..Default::default()
            }),
            enigma2: Some(FileEnigma2 {
                base_url: Some(e2.base_url.clone()),
                username: (!inherited).then(|| e2.username.clone()),
                password: (!inherited).then(|| e2.password.clone()),
                auth_mode: Some(e2.auth_mode.to_string()),
                timeout: dur(e2.timeout),
                response_header_timeout: dur(e2.response_header_timeout),
                tune_timeout: dur(e2.tune_timeout),
                retries: Some(e2.retries),
                backoff: dur(e2.backoff),
                max_backoff: dur(e2.max_backoff),
                rate_limit: Some(e2.rate_limit),
                rate_burst: Some(e2.rate_burst),
                user_agent: Some(e2.user_agent.clone()),
                stream_port: Some(e2.stream_port),
                use_webif_streams: Some(e2.use_webif_streams),
                fallback_to_8001: Some(e2.fallback_to_8001),
                analyze_duration: Some(e2.analyze_duration.clone()),
                probe_size: Some(e2.probe_size.clone()),
                preflight_timeout: dur(e2.preflight_timeout),
            }),
            epg: Some(FileEpg {
                enabled: Some(cfg.epg.enabled),
                days: Some(cfg.epg.days),
                max_concurrency: Some(cfg.epg.max_concurrency),
                timeout_ms: Some(cfg.epg.timeout_ms),
                retries: Some(cfg.epg.retries),
                fuzzy_max: Some(cfg.epg.fuzzy_max),
                xmltv_path: Some(cfg.epg.xmltv_path.clone()),
                source: Some(cfg.epg.source.clone()),
                refresh_interval: dur(cfg.epg.refresh_interval),
            }),
            api: Some(FileApi {
                listen_addr: Some(cfg.api.listen_addr.clone()),
                token: Some(cfg.api.token.clone()),
                token_scopes: Some(cfg.api.token_scopes.clone()),
                tokens: (!cfg.api.tokens.is_empty()).then(|| cfg.api.tokens.clone()),
                allowed_origins: Some(cfg.api.allowed_origins.clone()),
            }),
            metrics: Some(FileMetrics {
                enabled: Some(cfg.metrics.enabled),
                listen_addr: Some(cfg.metrics.listen_addr.clone()),
            }),
            tls: Some(FileTls {
                enabled: Some(cfg.tls.enabled),
                cert: Some(cfg.tls.cert.clone()),
                key: Some(cfg.tls.key.clone()),
                force_https: Some(cfg.tls.force_https),
            }),
            picons: Some(FilePicons {
                base_url: (cfg.picons.base_url != e2.base_url).then(|| cfg.picons.base_url.clone()),
            }),
            engine: Some(FileEngine {
                enabled: Some(cfg.engine.enabled),
                mode: Some(cfg.engine.mode.clone()),
                idle_timeout: dur(cfg.engine.idle_timeout),
                tuner_slots: cfg.engine.tuner_slots.clone(),
                max_pool: Some(cfg.engine.max_pool),
                gpu_limit: Some(cfg.engine.gpu_limit),
                cpu_threshold_scale: Some(cfg.engine.cpu_threshold_scale),
            }),
            store: Some(FileStore {
                backend: Some(cfg.store.backend.clone()),
                path: Some(cfg.store.path.clone()),
            }),
            hls: Some(FileHls {
                root: (cfg.hls.root != derived_hls).then(|| cfg.hls.root.clone()),
                dvr_window: dur(cfg.hls.dvr_window),
                segment_seconds: Some(cfg.hls.segment_seconds),
            }),
            ffmpeg: Some(FileFfmpeg {
                bin: Some(cfg.ffmpeg.bin.clone()),
                kill_timeout: dur(cfg.ffmpeg.kill_timeout),
            }),
            rate_limit: Some(FileRateLimit {
                enabled: Some(cfg.rate_limit.enabled),
                global: Some(cfg.rate_limit.global),
                auth: Some(cfg.rate_limit.auth),
                burst: Some(cfg.rate_limit.burst),
                whitelist: Some(cfg.rate_limit.whitelist.clone()),
            }),
            limits: Some(FileLimits {
                max_sessions: Some(cfg.limits.max_sessions),
                max_transcodes: Some(cfg.limits.max_transcodes),
            }),
            timeouts: Some(FileTimeouts {
                transcode_start: dur(cfg.timeouts.transcode_start),
                transcode_no_progress: dur(cfg.timeouts.transcode_no_progress),
                kill_grace: dur(cfg.timeouts.kill_grace),
            }),
            breaker: Some(FileBreaker {
                window: dur(cfg.breaker.window),
                min_attempts: Some(cfg.breaker.min_attempts),
                failures_threshold: Some(cfg.breaker.failures_threshold),
                consecutive_threshold: Some(cfg.breaker.consecutive_threshold),
            }),
            network: Some(FileNetwork {
                outbound: Some(FileOutbound {
                    enabled: Some(cfg.network.outbound.enabled),
                    allow: Some(FileAllowlist {
                        hosts: Some(cfg.network.outbound.allow.hosts.clone()),
                        cidrs: Some(cfg.network.outbound.allow.cidrs.clone()),
                        ports: Some(cfg.network.outbound.allow.ports.clone()),
                        schemes: Some(cfg.network.outbound.allow.schemes.clone()),
                    }),
                }),
            }),
            streaming: Some(FileStreaming {
                delivery_policy: Some(cfg.streaming.delivery_policy.clone()),
            }),
            sessions: Some(FileSessions {
                lease_ttl: dur(cfg.sessions.lease_ttl),
                heartbeat_interval: dur(cfg.sessions.heartbeat_interval),
                expiry_check_interval: dur(cfg.sessions.expiry_check_interval),
            }),
        }
    }

    /// Render as YAML, leaving out unset keys.
    pub fn to_yaml(&self) -> Result<String> {
        let mut value = serde_yaml::to_value(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        strip_nulls(&mut value);
        serde_yaml::to_string(&value).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

fn strip_nulls(value: &mut serde_yaml::Value) {
    if let serde_yaml::Value::Mapping(map) = value {
        map.retain(|_, v| !v.is_null());
        for (_, v) in map.iter_mut() {
            strip_nulls(v);
        }
    }
}

/// Atomically write `cfg` to `path` as YAML: the content goes to a temporary
/// file in the same directory which is then renamed over the target.
pub fn save_file(path: &Path, cfg: &ResolvedConfig) -> Result<()> {
    let save_err = |reason: String| ConfigError::Save {
        path: path.to_path_buf(),
        reason,
    };
    let yaml = FileConfig::from_resolved(cfg).to_yaml()?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| save_err(e.to_string()))?;
    tmp.write_all(yaml.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| save_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| save_err(e.error.to_string()))?;
    info!(path = %path.display(), "config saved");
    Ok(())
}
