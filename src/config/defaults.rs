//! Default registry.
//!
//! Every resolvable field is declared exactly once here with its YAML path,
//! optional environment variable, exposure profile and typed default. The
//! loader applies the defaults from this table and the environment resolver
//! coerces variables by the kind of the default they override.

use super::coerce;
use super::types::{AuthMode, ResolvedConfig, ScopedToken};
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A typed registry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Duration(Duration),
    List(Vec<String>),
    IntList(Vec<i64>),
    Map(BTreeMap<String, String>),
    Tokens(Vec<ScopedToken>),
}

impl Value {
    /// Coerce a raw environment string into a value of the same kind as `self`.
    pub fn coerce_like(&self, key: &str, raw: &str) -> Result<Value> {
        Ok(match self {
            Value::Str(_) => Value::Str(raw.trim().to_string()),
            Value::Bool(_) => Value::Bool(coerce::parse_bool(key, raw)?),
            Value::Int(_) => Value::Int(coerce::parse_int(key, raw)?),
            Value::Float(_) => Value::Float(coerce::parse_float(key, raw)?),
            Value::Duration(_) => Value::Duration(coerce::parse_duration(key, raw)?),
            Value::List(_) => Value::List(coerce::parse_list(raw)),
            Value::IntList(_) => Value::IntList(coerce::parse_int_list(key, raw)?),
            Value::Map(_) => Value::Map(coerce::parse_map(key, raw)?),
            Value::Tokens(_) => Value::Tokens(coerce::parse_scoped_tokens(key, raw)?),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::IntList(_) => "int list",
            Value::Map(_) => "map",
            Value::Tokens(_) => "token list",
        }
    }

    fn into_string(self) -> Result<String, String> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    fn into_bool(self) -> Result<bool, String> {
        match self {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }

    fn into_u32(self) -> Result<u32, String> {
        match self {
            Value::Int(i) => u32::try_from(i).map_err(|_| format!("{} is out of range", i)),
            other => Err(mismatch("int", &other)),
        }
    }

    fn into_f64(self) -> Result<f64, String> {
        match self {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch("float", &other)),
        }
    }

    fn into_duration(self) -> Result<Duration, String> {
        match self {
            Value::Duration(d) => Ok(d),
            other => Err(mismatch("duration", &other)),
        }
    }

    fn into_list(self) -> Result<Vec<String>, String> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(mismatch("list", &other)),
        }
    }

    fn into_u32_list(self) -> Result<Vec<u32>, String> {
        match self {
            Value::IntList(l) => l
                .into_iter()
                .map(|i| u32::try_from(i).map_err(|_| format!("{} is out of range", i)))
                .collect(),
            other => Err(mismatch("int list", &other)),
        }
    }

    fn into_map(self) -> Result<BTreeMap<String, String>, String> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(mismatch("map", &other)),
        }
    }

    fn into_tokens(self) -> Result<Vec<ScopedToken>, String> {
        match self {
            Value::Tokens(t) => Ok(t),
            other => Err(mismatch("token list", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {}, got {}", expected, got.kind())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Duration(d) => write!(f, "{}", humantime::format_duration(*d)),
            Value::List(l) => write!(f, "[{}]", l.join(", ")),
            Value::IntList(l) => {
                let items: Vec<String> = l.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Value::Map(m) => write!(f, "{{{} entries}}", m.len()),
            Value::Tokens(t) => write!(f, "[{} tokens]", t.len()),
        }
    }
}

/// Audience of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Simple,
    Advanced,
    Internal,
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Simple => write!(f, "simple"),
            Profile::Advanced => write!(f, "advanced"),
            Profile::Internal => write!(f, "internal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Active,
    Internal,
}

type Setter = fn(&mut ResolvedConfig, Value) -> Result<(), String>;

/// One registry row.
#[derive(Clone)]
pub struct ConfigEntry {
    pub path: &'static str,
    pub env: Option<&'static str>,
    pub profile: Profile,
    pub status: Status,
    pub default: Value,
    apply: Setter,
}

impl ConfigEntry {
    /// Write `value` into the matching field of `cfg`.
    pub fn set(&self, cfg: &mut ResolvedConfig, value: Value) -> Result<()> {
        (self.apply)(cfg, value).map_err(|reason| ConfigError::invalid(self.path, reason))
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("path", &self.path)
            .field("env", &self.env)
            .field("profile", &self.profile)
            .field("status", &self.status)
            .field("default", &self.default)
            .finish()
    }
}

macro_rules! entry {
    ($path:literal, $env:expr, $profile:ident, $default:expr, |$c:ident, $v:ident| $body:expr) => {
        ConfigEntry {
            path: $path,
            env: $env,
            profile: Profile::$profile,
            status: if matches!(Profile::$profile, Profile::Internal) {
                Status::Internal
            } else {
                Status::Active
            },
            default: $default,
            apply: |$c: &mut ResolvedConfig, $v: Value| -> Result<(), String> {
                $body;
                Ok(())
            },
        }
    };
}

fn s(v: &str) -> Value {
    Value::Str(v.to_string())
}

fn secs(n: u64) -> Value {
    Value::Duration(Duration::from_secs(n))
}

/// The declared defaults, indexed by path and environment variable.
#[derive(Debug, Clone)]
pub struct DefaultRegistry {
    entries: Vec<ConfigEntry>,
}

impl DefaultRegistry {
    /// Build a registry from explicit entries, rejecting duplicate paths or
    /// environment names.
    pub fn from_entries(entries: Vec<ConfigEntry>) -> Result<Self> {
        let mut paths = HashSet::new();
        let mut envs = HashSet::new();
        for e in &entries {
            if !paths.insert(e.path) {
                return Err(ConfigError::invalid(e.path, "duplicate registry path"));
            }
            if let Some(env) = e.env
                && !envs.insert(env)
            {
                return Err(ConfigError::invalid(env, "duplicate registry environment name"));
            }
        }
        Ok(Self { entries })
    }

    /// The full registry of this build.
    pub fn standard() -> Self {
        Self {
            entries: standard_entries(),
        }
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    pub fn by_path(&self, path: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn by_env(&self, env: &str) -> Option<&ConfigEntry> {
        self.entries.iter().find(|e| e.env == Some(env))
    }

    /// Apply every default onto `cfg`.
    pub fn apply_defaults(&self, cfg: &mut ResolvedConfig) -> Result<()> {
        for entry in &self.entries {
            entry.set(cfg, entry.default.clone())?;
        }
        Ok(())
    }

    /// A config holding only registry defaults.
    pub fn defaults(&self) -> Result<ResolvedConfig> {
        let mut cfg = ResolvedConfig::default();
        self.apply_defaults(&mut cfg)?;
        Ok(cfg)
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_entries() -> Vec<ConfigEntry> {
    vec![
        // Core
        entry!("configVersion", None, Internal, s("v3"), |c, v| c.config_version = v.into_string()?),
        entry!("configStrict", Some("XG2G_CONFIG_STRICT"), Advanced, Value::Bool(true), |c, v| c.config_strict = v.into_bool()?),
        entry!("readyStrict", Some("XG2G_READY_STRICT"), Advanced, Value::Bool(false), |c, v| c.ready_strict = v.into_bool()?),
        entry!("dataDir", Some("XG2G_DATA"), Simple, s("/tmp"), |c, v| c.data_dir = PathBuf::from(v.into_string()?)),
        entry!("logLevel", Some("XG2G_LOG_LEVEL"), Simple, s("info"), |c, v| c.log_level = v.into_string()?),
        entry!("logService", Some("XG2G_LOG_SERVICE"), Advanced, s(""), |c, v| c.log_service = v.into_string()?),
        entry!("trustedProxies", Some("XG2G_TRUSTED_PROXIES"), Advanced, Value::List(vec![]), |c, v| c.trusted_proxies = v.into_list()?),
        entry!("bouquets", Some("XG2G_BOUQUET"), Simple, Value::List(vec![]), |c, v| c.bouquets = v.into_list()?),
        entry!("recordingRoots", Some("XG2G_RECORDING_ROOTS"), Advanced, Value::Map(BTreeMap::new()), |c, v| c.recording_roots = v.into_map()?),
        // Receiver credentials (primary pair)
        entry!("openWebIF.username", Some("XG2G_OWI_USER"), Simple, s(""), |c, v| c.open_webif.username = v.into_string()?),
        entry!("openWebIF.password", Some("XG2G_OWI_PASS"), Simple, s(""), |c, v| c.open_webif.password = v.into_string()?),
        // Enigma2 client; alias-managed fields have no direct env binding
        entry!("enigma2.baseUrl", None, Simple, s(""), |c, v| c.enigma2.base_url = v.into_string()?),
        entry!("enigma2.username", Some("XG2G_E2_USER"), Advanced, s(""), |c, v| c.enigma2.username = v.into_string()?),
        entry!("enigma2.password", Some("XG2G_E2_PASS"), Advanced, s(""), |c, v| c.enigma2.password = v.into_string()?),
        entry!("enigma2.authMode", Some("XG2G_E2_AUTH_MODE"), Advanced, s("inherit"), |c, v| c.enigma2.auth_mode = v.into_string()?.parse::<AuthMode>()?),
        entry!("enigma2.timeout", None, Advanced, secs(10), |c, v| c.enigma2.timeout = v.into_duration()?),
        entry!("enigma2.responseHeaderTimeout", Some("XG2G_E2_RESPONSE_HEADER_TIMEOUT"), Advanced, secs(10), |c, v| c.enigma2.response_header_timeout = v.into_duration()?),
        entry!("enigma2.tuneTimeout", Some("XG2G_E2_TUNE_TIMEOUT"), Advanced, secs(10), |c, v| c.enigma2.tune_timeout = v.into_duration()?),
        entry!("enigma2.retries", None, Advanced, Value::Int(2), |c, v| c.enigma2.retries = v.into_u32()?),
        entry!("enigma2.backoff", None, Advanced, Value::Duration(Duration::from_millis(200)), |c, v| c.enigma2.backoff = v.into_duration()?),
        entry!("enigma2.maxBackoff", None, Advanced, secs(30), |c, v| c.enigma2.max_backoff = v.into_duration()?),
        entry!("enigma2.rateLimit", Some("XG2G_E2_RATE_LIMIT"), Advanced, Value::Int(10), |c, v| c.enigma2.rate_limit = v.into_u32()?),
        entry!("enigma2.rateBurst", Some("XG2G_E2_RATE_BURST"), Advanced, Value::Int(20), |c, v| c.enigma2.rate_burst = v.into_u32()?),
        entry!("enigma2.userAgent", Some("XG2G_E2_USER_AGENT"), Advanced, s("xg2g"), |c, v| c.enigma2.user_agent = v.into_string()?),
        entry!("enigma2.streamPort", None, Advanced, Value::Int(8001), |c, v| c.enigma2.stream_port = v.into_u32()?),
        entry!("enigma2.useWebIFStreams", None, Advanced, Value::Bool(true), |c, v| c.enigma2.use_webif_streams = v.into_bool()?),
        entry!("enigma2.fallbackTo8001", Some("XG2G_E2_FALLBACK_TO_8001"), Advanced, Value::Bool(false), |c, v| c.enigma2.fallback_to_8001 = v.into_bool()?),
        entry!("enigma2.analyzeDuration", Some("XG2G_E2_ANALYZE_DURATION"), Advanced, s("10000000"), |c, v| c.enigma2.analyze_duration = v.into_string()?),
        entry!("enigma2.probeSize", Some("XG2G_E2_PROBE_SIZE"), Advanced, s("32M"), |c, v| c.enigma2.probe_size = v.into_string()?),
        entry!("enigma2.preflightTimeout", Some("XG2G_E2_PREFLIGHT_TIMEOUT"), Advanced, secs(10), |c, v| c.enigma2.preflight_timeout = v.into_duration()?),
        // EPG
        entry!("epg.enabled", Some("XG2G_EPG_ENABLED"), Simple, Value::Bool(true), |c, v| c.epg.enabled = v.into_bool()?),
        entry!("epg.days", Some("XG2G_EPG_DAYS"), Simple, Value::Int(14), |c, v| c.epg.days = v.into_u32()?),
        entry!("epg.maxConcurrency", Some("XG2G_EPG_MAX_CONCURRENCY"), Advanced, Value::Int(5), |c, v| c.epg.max_concurrency = v.into_u32()?),
        entry!("epg.timeoutMs", Some("XG2G_EPG_TIMEOUT_MS"), Advanced, Value::Int(5000), |c, v| c.epg.timeout_ms = v.into_u32()?),
        entry!("epg.retries", Some("XG2G_EPG_RETRIES"), Advanced, Value::Int(2), |c, v| c.epg.retries = v.into_u32()?),
        entry!("epg.fuzzyMax", Some("XG2G_FUZZY_MAX"), Advanced, Value::Int(2), |c, v| c.epg.fuzzy_max = v.into_u32()?),
        entry!("epg.xmltvPath", Some("XG2G_XMLTV"), Advanced, s("xmltv.xml"), |c, v| c.epg.xmltv_path = v.into_string()?),
        entry!("epg.source", Some("XG2G_EPG_SOURCE"), Advanced, s("per-service"), |c, v| c.epg.source = v.into_string()?),
        entry!("epg.refreshInterval", Some("XG2G_EPG_REFRESH_INTERVAL"), Advanced, secs(6 * 3600), |c, v| c.epg.refresh_interval = v.into_duration()?),
        // API
        entry!("api.listenAddr", Some("XG2G_LISTEN"), Simple, s(":8088"), |c, v| c.api.listen_addr = v.into_string()?),
        entry!("api.token", Some("XG2G_API_TOKEN"), Simple, s(""), |c, v| c.api.token = v.into_string()?),
        entry!("api.tokenScopes", Some("XG2G_API_TOKEN_SCOPES"), Simple, Value::List(vec![]), |c, v| c.api.token_scopes = v.into_list()?),
        entry!("api.tokens", Some("XG2G_API_TOKENS"), Advanced, Value::Tokens(vec![]), |c, v| c.api.tokens = v.into_tokens()?),
        entry!("api.allowedOrigins", Some("XG2G_ALLOWED_ORIGINS"), Advanced, Value::List(vec![]), |c, v| c.api.allowed_origins = v.into_list()?),
        // Metrics; an env listen address also enables the server
        entry!("metrics.enabled", None, Advanced, Value::Bool(false), |c, v| c.metrics.enabled = v.into_bool()?),
        entry!("metrics.listenAddr", Some("XG2G_METRICS_LISTEN"), Advanced, s(""), |c, v| c.metrics.listen_addr = v.into_string()?),
        // TLS
        entry!("tls.enabled", Some("XG2G_TLS_ENABLED"), Advanced, Value::Bool(false), |c, v| c.tls.enabled = v.into_bool()?),
        entry!("tls.cert", Some("XG2G_TLS_CERT"), Advanced, s(""), |c, v| c.tls.cert = v.into_string()?),
        entry!("tls.key", Some("XG2G_TLS_KEY"), Advanced, s(""), |c, v| c.tls.key = v.into_string()?),
        entry!("tls.forceHTTPS", Some("XG2G_FORCE_HTTPS"), Advanced, Value::Bool(false), |c, v| c.tls.force_https = v.into_bool()?),
        entry!("picons.baseUrl", Some("XG2G_PICON_BASE"), Advanced, s(""), |c, v| c.picons.base_url = v.into_string()?),
        // Engine
        entry!("engine.enabled", Some("XG2G_ENGINE_ENABLED"), Advanced, Value::Bool(false), |c, v| c.engine.enabled = v.into_bool()?),
        entry!("engine.mode", Some("XG2G_ENGINE_MODE"), Advanced, s("standard"), |c, v| c.engine.mode = v.into_string()?),
        entry!("engine.idleTimeout", Some("XG2G_ENGINE_IDLE_TIMEOUT"), Advanced, secs(60), |c, v| c.engine.idle_timeout = v.into_duration()?),
        entry!("engine.tunerSlots", Some("XG2G_TUNER_SLOTS"), Advanced, Value::IntList(vec![]), |c, v| {
            let slots = v.into_u32_list()?;
            c.engine.tuner_slots = (!slots.is_empty()).then_some(slots)
        }),
        entry!("engine.maxPool", Some("XG2G_ENGINE_MAX_POOL"), Advanced, Value::Int(2), |c, v| c.engine.max_pool = v.into_u32()?),
        entry!("engine.gpuLimit", Some("XG2G_ENGINE_GPU_LIMIT"), Advanced, Value::Int(8), |c, v| c.engine.gpu_limit = v.into_u32()?),
        entry!("engine.cpuThresholdScale", Some("XG2G_ENGINE_CPU_SCALE"), Advanced, Value::Float(1.5), |c, v| c.engine.cpu_threshold_scale = v.into_f64()?),
        // Store
        entry!("store.backend", Some("XG2G_STORE_BACKEND"), Advanced, s("memory"), |c, v| c.store.backend = v.into_string()?),
        entry!("store.path", Some("XG2G_STORE_PATH"), Advanced, s("/var/lib/xg2g/store"), |c, v| c.store.path = v.into_string()?),
        // HLS / FFmpeg
        entry!("hls.root", Some("XG2G_HLS_ROOT"), Advanced, s(""), |c, v| c.hls.root = v.into_string()?),
        entry!("hls.dvrWindow", Some("XG2G_HLS_DVR_WINDOW"), Advanced, secs(45 * 60), |c, v| c.hls.dvr_window = v.into_duration()?),
        entry!("hls.segmentSeconds", Some("XG2G_HLS_SEGMENT_SECONDS"), Advanced, Value::Int(6), |c, v| c.hls.segment_seconds = v.into_u32()?),
        entry!("ffmpeg.bin", Some("XG2G_FFMPEG_BIN"), Advanced, s("ffmpeg"), |c, v| c.ffmpeg.bin = v.into_string()?),
        entry!("ffmpeg.killTimeout", Some("XG2G_FFMPEG_KILL_TIMEOUT"), Advanced, secs(5), |c, v| c.ffmpeg.kill_timeout = v.into_duration()?),
        // Rate limiting
        entry!("rateLimit.enabled", Some("XG2G_RATE_LIMIT_ENABLED"), Advanced, Value::Bool(true), |c, v| c.rate_limit.enabled = v.into_bool()?),
        entry!("rateLimit.global", Some("XG2G_RATE_LIMIT_GLOBAL"), Advanced, Value::Int(100), |c, v| c.rate_limit.global = v.into_u32()?),
        entry!("rateLimit.auth", Some("XG2G_RATE_LIMIT_AUTH"), Advanced, Value::Int(10), |c, v| c.rate_limit.auth = v.into_u32()?),
        entry!("rateLimit.burst", Some("XG2G_RATE_LIMIT_BURST"), Advanced, Value::Int(20), |c, v| c.rate_limit.burst = v.into_u32()?),
        entry!("rateLimit.whitelist", Some("XG2G_RATE_LIMIT_WHITELIST"), Advanced, Value::List(vec![]), |c, v| c.rate_limit.whitelist = v.into_list()?),
        // Resilience
        entry!("limits.maxSessions", Some("XG2G_MAX_SESSIONS"), Advanced, Value::Int(8), |c, v| c.limits.max_sessions = v.into_u32()?),
        entry!("limits.maxTranscodes", Some("XG2G_MAX_TRANSCODES"), Advanced, Value::Int(2), |c, v| c.limits.max_transcodes = v.into_u32()?),
        entry!("timeouts.transcodeStart", Some("XG2G_TIMEOUT_TRANSCODE_START"), Advanced, secs(15), |c, v| c.timeouts.transcode_start = v.into_duration()?),
        entry!("timeouts.transcodeNoProgress", Some("XG2G_TIMEOUT_TRANSCODE_NO_PROGRESS"), Advanced, secs(30), |c, v| c.timeouts.transcode_no_progress = v.into_duration()?),
        entry!("timeouts.killGrace", Some("XG2G_TIMEOUT_KILL_GRACE"), Advanced, secs(2), |c, v| c.timeouts.kill_grace = v.into_duration()?),
        entry!("breaker.window", Some("XG2G_BREAKER_WINDOW"), Advanced, secs(5 * 60), |c, v| c.breaker.window = v.into_duration()?),
        entry!("breaker.minAttempts", Some("XG2G_BREAKER_MIN_ATTEMPTS"), Advanced, Value::Int(10), |c, v| c.breaker.min_attempts = v.into_u32()?),
        entry!("breaker.failuresThreshold", Some("XG2G_BREAKER_FAILURES_THRESHOLD"), Advanced, Value::Int(7), |c, v| c.breaker.failures_threshold = v.into_u32()?),
        entry!("breaker.consecutiveThreshold", Some("XG2G_BREAKER_CONSECUTIVE_THRESHOLD"), Advanced, Value::Int(5), |c, v| c.breaker.consecutive_threshold = v.into_u32()?),
        // Outbound network policy
        entry!("network.outbound.enabled", Some("XG2G_OUTBOUND_ENABLED"), Advanced, Value::Bool(false), |c, v| c.network.outbound.enabled = v.into_bool()?),
        entry!("network.outbound.allow.hosts", Some("XG2G_OUTBOUND_ALLOW_HOSTS"), Advanced, Value::List(vec![]), |c, v| c.network.outbound.allow.hosts = v.into_list()?),
        entry!("network.outbound.allow.cidrs", Some("XG2G_OUTBOUND_ALLOW_CIDRS"), Advanced, Value::List(vec![]), |c, v| c.network.outbound.allow.cidrs = v.into_list()?),
        entry!("network.outbound.allow.ports", Some("XG2G_OUTBOUND_ALLOW_PORTS"), Advanced, Value::IntList(vec![]), |c, v| c.network.outbound.allow.ports = v.into_u32_list()?),
        entry!("network.outbound.allow.schemes", Some("XG2G_OUTBOUND_ALLOW_SCHEMES"), Advanced, Value::List(vec![]), |c, v| c.network.outbound.allow.schemes = v.into_list()?),
        // Streaming / sessions
        entry!("streaming.deliveryPolicy", Some("XG2G_STREAMING_POLICY"), Simple, s("universal"), |c, v| c.streaming.delivery_policy = v.into_string()?),
        entry!("sessions.leaseTtl", None, Advanced, secs(2 * 3600), |c, v| c.sessions.lease_ttl = v.into_duration()?),
        entry!("sessions.heartbeatInterval", None, Advanced, secs(30), |c, v| c.sessions.heartbeat_interval = v.into_duration()?),
        entry!("sessions.expiryCheckInterval", None, Advanced, secs(60), |c, v| c.sessions.expiry_check_interval = v.into_duration()?),
    ]
}
