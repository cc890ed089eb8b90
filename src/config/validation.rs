//! Semantic validation of a resolved configuration.
//!
//! Every rule runs; violations are collected into one [`ValidationErrors`]
//! rather than stopping at the first problem.

use super::redact::mask_url;
use super::types::{ResolvedConfig, TOKEN_SCOPES};
use crate::error::ValidationErrors;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;
use url::Url;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const ENGINE_MODES: &[&str] = &["standard", "virtual"];
const DELIVERY_POLICIES: &[&str] = &["universal"];
const EPG_SOURCES: &[&str] = &["bouquet", "per-service"];
const STORE_BACKENDS: &[&str] = &["memory", "sqlite"];
const OUTBOUND_SCHEMES: &[&str] = &["http", "https"];

/// A combination of settings that is never allowed, regardless of how each
/// value got there.
pub struct ForbiddenCombination {
    pub name: &'static str,
    pub field: &'static str,
    pub explanation: &'static str,
    pub violated: fn(&ResolvedConfig) -> bool,
}

fn https_without_tls(c: &ResolvedConfig) -> bool {
    c.tls.force_https && !c.tls.enabled && c.trusted_proxies.is_empty()
}

fn transcodes_exceed_sessions(c: &ResolvedConfig) -> bool {
    c.limits.max_transcodes > c.limits.max_sessions
}

fn outbound_without_allowlist(c: &ResolvedConfig) -> bool {
    let allow = &c.network.outbound.allow;
    c.network.outbound.enabled && allow.hosts.is_empty() && allow.cidrs.is_empty()
}

fn metrics_on_api_listener(c: &ResolvedConfig) -> bool {
    c.metrics.enabled
        && !c.metrics.listen_addr.is_empty()
        && c.metrics.listen_addr.trim() == c.api.listen_addr.trim()
}

fn token_scopes_without_token(c: &ResolvedConfig) -> bool {
    !c.api.token_scopes.is_empty() && c.api.token.trim().is_empty()
}

pub const FORBIDDEN_COMBINATIONS: &[ForbiddenCombination] = &[
    ForbiddenCombination {
        name: "HTTPS_WITHOUT_TLS",
        field: "tls.forceHTTPS",
        explanation: "forceHTTPS requires tls.enabled or a trusted TLS-terminating proxy",
        violated: https_without_tls,
    },
    ForbiddenCombination {
        name: "TRANSCODES_EXCEED_SESSIONS",
        field: "limits.maxTranscodes",
        explanation: "maxTranscodes cannot exceed maxSessions",
        violated: transcodes_exceed_sessions,
    },
    ForbiddenCombination {
        name: "OUTBOUND_WITHOUT_ALLOWLIST",
        field: "network.outbound.allow",
        explanation: "outbound policy enabled with neither hosts nor cidrs allowed",
        violated: outbound_without_allowlist,
    },
    ForbiddenCombination {
        name: "METRICS_ON_API_LISTENER",
        field: "metrics.listenAddr",
        explanation: "metrics listener must not share the API listen address",
        violated: metrics_on_api_listener,
    },
    ForbiddenCombination {
        name: "TOKEN_SCOPES_WITHOUT_TOKEN",
        field: "api.tokenScopes",
        explanation: "tokenScopes has no effect without api.token",
        violated: token_scopes_without_token,
    },
];

/// Run every rule against `cfg`.
pub fn validate(cfg: &ResolvedConfig) -> Result<(), ValidationErrors> {
    let mut errs = ValidationErrors::new();

    check_core(cfg, &mut errs);
    check_enigma2(cfg, &mut errs);
    check_epg(cfg, &mut errs);
    check_api(cfg, &mut errs);
    check_network(cfg, &mut errs);
    check_engine(cfg, &mut errs);
    check_resilience(cfg, &mut errs);
    if cfg.config_strict {
        check_strict(cfg, &mut errs);
    }

    for rule in FORBIDDEN_COMBINATIONS {
        if (rule.violated)(cfg) {
            errs.add(rule.field, format!("{}: {}", rule.name, rule.explanation));
        }
    }

    errs.into_result()
}

fn one_of(errs: &mut ValidationErrors, field: &str, value: &str, allowed: &[&str]) {
    if !allowed.contains(&value) {
        errs.add_value(field, format!("must be one of: {}", allowed.join(", ")), value);
    }
}

fn in_range(errs: &mut ValidationErrors, field: &str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errs.add_value(field, format!("must be between {} and {}", min, max), value);
    }
}

fn positive(errs: &mut ValidationErrors, field: &str, value: Duration) {
    if value.is_zero() {
        errs.add(field, "must be greater than zero");
    }
}

/// http(s) URL with a host. Reported values never carry userinfo.
fn check_http_url(errs: &mut ValidationErrors, field: &str, raw: &str) {
    match Url::parse(raw.trim()) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errs.add_value(field, "scheme must be http or https", url.scheme());
        }
        Ok(url) if url.host_str().is_none_or(str::is_empty) => {
            errs.add_value(field, "URL has no host", mask_url(raw));
        }
        Ok(_) => {}
        Err(e) => errs.add_value(field, format!("invalid URL: {}", e), mask_url(raw)),
    }
}

/// `host:port` or `:port`.
fn check_listen_addr(errs: &mut ValidationErrors, field: &str, raw: &str) {
    let Some((host, port)) = raw.trim().rsplit_once(':') else {
        errs.add_value(field, "must be host:port or :port", raw);
        return;
    };
    match port.parse::<u16>() {
        Ok(p) if p > 0 => {}
        _ => errs.add_value(field, "port must be between 1 and 65535", port),
    }
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.contains(char::is_whitespace) {
        errs.add_value(field, "invalid host", host);
    }
}

const IPV4_MAPPED_PREFIX: Ipv6Addr = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0, 0);

/// View an IPv4-mapped network (`::ffff:a.b.c.d/n`, n >= 96) as the IPv4
/// network it matches.
fn canonical_net(net: IpNet) -> IpNet {
    if let IpNet::V6(v6) = net
        && v6.prefix_len() >= 96
        && let Some(v4) = v6.addr().to_ipv4_mapped()
        && let Ok(unmapped) = Ipv4Net::new(v4, v6.prefix_len() - 96)
    {
        return IpNet::V4(unmapped);
    }
    net
}

/// True if `net` matches every client of a family, directly or through the
/// whole IPv4-mapped range.
fn matches_all(net: &IpNet) -> bool {
    match net {
        _ if net.prefix_len() == 0 => true,
        IpNet::V6(v6) => Ipv6Net::new(IPV4_MAPPED_PREFIX, 96).is_ok_and(|mapped| v6.contains(&mapped)),
        IpNet::V4(_) => false,
    }
}

/// Reject trust-all networks, unspecified addresses and garbage. Blank
/// entries are ignored. IPv4-mapped IPv6 forms are judged as the IPv4
/// addresses they stand for.
pub fn check_cidr_list(errs: &mut ValidationErrors, field: &str, entries: &[String]) {
    for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
        if entry.contains('/') {
            match entry.parse::<IpNet>().map(canonical_net) {
                Ok(net) if matches_all(&net) => {
                    errs.add_value(field, "trust-all network is not allowed", entry);
                }
                Ok(net) if net.addr().is_unspecified() && net.prefix_len() == net.max_prefix_len() => {
                    errs.add_value(field, "unspecified address is not allowed", entry);
                }
                Ok(_) => {}
                Err(e) => errs.add_value(field, format!("invalid CIDR: {}", e), entry),
            }
        } else {
            match entry.parse::<IpAddr>().map(|ip| ip.to_canonical()) {
                Ok(ip) if ip.is_unspecified() => {
                    errs.add_value(field, "unspecified address is not allowed", entry);
                }
                Ok(_) => {}
                Err(e) => errs.add_value(field, format!("invalid IP address: {}", e), entry),
            }
        }
    }
}

fn check_core(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    if cfg.data_dir.as_os_str().is_empty() {
        errs.add("dataDir", "must not be empty");
    }
    one_of(errs, "logLevel", &cfg.log_level.to_ascii_lowercase(), LOG_LEVELS);
    check_cidr_list(errs, "trustedProxies", &cfg.trusted_proxies);
    one_of(errs, "streaming.deliveryPolicy", &cfg.streaming.delivery_policy, DELIVERY_POLICIES);

    if cfg.hls.segment_seconds == 0 {
        errs.add("hls.segmentSeconds", "must be at least 1");
    } else if cfg.hls.dvr_window < Duration::from_secs(u64::from(cfg.hls.segment_seconds)) {
        errs.add_value(
            "hls.dvrWindow",
            "must hold at least one segment",
            humantime::format_duration(cfg.hls.dvr_window),
        );
    }
    positive(errs, "ffmpeg.killTimeout", cfg.ffmpeg.kill_timeout);

    if cfg.tls.cert.trim().is_empty() != cfg.tls.key.trim().is_empty() {
        errs.add("tls", "tls.cert and tls.key must be set together");
    }
    if cfg.tls.enabled && cfg.tls.cert.trim().is_empty() {
        errs.add("tls.cert", "required when tls.enabled");
    }
}

fn check_enigma2(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    let e2 = &cfg.enigma2;
    if !e2.base_url.trim().is_empty() {
        check_http_url(errs, "enigma2.baseUrl", &e2.base_url);
    }
    if !cfg.picons.base_url.trim().is_empty() {
        check_http_url(errs, "picons.baseUrl", &cfg.picons.base_url);
    }
    in_range(errs, "enigma2.streamPort", e2.stream_port, 1, 65535);
    in_range(errs, "enigma2.retries", e2.retries, 0, 10);
    positive(errs, "enigma2.timeout", e2.timeout);
    if e2.max_backoff < e2.backoff {
        errs.add_value(
            "enigma2.maxBackoff",
            "must not be less than enigma2.backoff",
            humantime::format_duration(e2.max_backoff),
        );
    }
    if e2.rate_limit > 0 && e2.rate_burst == 0 {
        errs.add("enigma2.rateBurst", "must be at least 1 when rateLimit is set");
    }
}

fn check_epg(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    let epg = &cfg.epg;
    if !epg.enabled {
        return;
    }
    in_range(errs, "epg.days", epg.days, 1, 14);
    in_range(errs, "epg.maxConcurrency", epg.max_concurrency, 1, 10);
    in_range(errs, "epg.timeoutMs", epg.timeout_ms, 100, 60_000);
    in_range(errs, "epg.retries", epg.retries, 0, 5);
    in_range(errs, "epg.fuzzyMax", epg.fuzzy_max, 0, 10);
    one_of(errs, "epg.source", &epg.source, EPG_SOURCES);
}

fn check_scopes(errs: &mut ValidationErrors, field: &str, scopes: &[String]) {
    for scope in scopes {
        if !TOKEN_SCOPES.contains(&scope.as_str()) {
            errs.add_value(
                field,
                format!("unknown scope (expected one of: {})", TOKEN_SCOPES.join(", ")),
                scope,
            );
        }
    }
}

fn check_api(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    let api = &cfg.api;
    check_listen_addr(errs, "api.listenAddr", &api.listen_addr);
    if cfg.metrics.enabled {
        check_listen_addr(errs, "metrics.listenAddr", &cfg.metrics.listen_addr);
    }
    check_scopes(errs, "api.tokenScopes", &api.token_scopes);

    let mut seen: HashSet<&str> = HashSet::new();
    if !api.token.trim().is_empty() {
        seen.insert(api.token.trim());
    }
    for (i, t) in api.tokens.iter().enumerate() {
        let field = format!("api.tokens[{}]", i);
        if !seen.insert(t.token.trim()) {
            // Never echo the token value
            errs.add(&field, "duplicate token");
        }
        if t.scopes.is_empty() {
            errs.add(&field, "scopes must not be empty");
        }
        check_scopes(errs, &format!("{}.scopes", field), &t.scopes);
    }

    for origin in &api.allowed_origins {
        if origin != "*" {
            check_http_url(errs, "api.allowedOrigins", origin);
        }
    }
}

fn check_network(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    let rl = &cfg.rate_limit;
    check_cidr_list(errs, "rateLimit.whitelist", &rl.whitelist);
    if rl.enabled {
        if rl.global == 0 {
            errs.add("rateLimit.global", "must be at least 1 when rate limiting is enabled");
        }
        if rl.auth == 0 {
            errs.add("rateLimit.auth", "must be at least 1 when rate limiting is enabled");
        }
        if rl.burst == 0 {
            errs.add("rateLimit.burst", "must be at least 1 when rate limiting is enabled");
        }
    }

    let allow = &cfg.network.outbound.allow;
    for cidr in allow.cidrs.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if cidr.parse::<IpNet>().is_err() && cidr.parse::<IpAddr>().is_err() {
            errs.add_value("network.outbound.allow.cidrs", "invalid CIDR", cidr);
        }
    }
    for &port in &allow.ports {
        in_range(errs, "network.outbound.allow.ports", port, 1, 65535);
    }
    for scheme in &allow.schemes {
        one_of(errs, "network.outbound.allow.schemes", &scheme.to_ascii_lowercase(), OUTBOUND_SCHEMES);
    }
}

fn check_engine(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    let engine = &cfg.engine;
    one_of(errs, "engine.mode", &engine.mode.to_ascii_lowercase(), ENGINE_MODES);
    if !engine.enabled {
        return;
    }
    positive(errs, "engine.idleTimeout", engine.idle_timeout);
    if engine.max_pool == 0 {
        errs.add("engine.maxPool", "must be at least 1");
    }
    if engine.cpu_threshold_scale.is_nan() || engine.cpu_threshold_scale <= 0.0 {
        errs.add_value("engine.cpuThresholdScale", "must be greater than zero", engine.cpu_threshold_scale);
    }
}

fn check_resilience(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    if cfg.limits.max_sessions == 0 {
        errs.add("limits.maxSessions", "must be at least 1");
    }

    let t = &cfg.timeouts;
    positive(errs, "timeouts.transcodeStart", t.transcode_start);
    if t.transcode_no_progress <= t.transcode_start {
        errs.add_value(
            "timeouts.transcodeNoProgress",
            "must be greater than timeouts.transcodeStart",
            humantime::format_duration(t.transcode_no_progress),
        );
    }
    if t.kill_grace.is_zero() || t.kill_grace >= t.transcode_no_progress {
        errs.add_value(
            "timeouts.killGrace",
            "must be greater than zero and less than timeouts.transcodeNoProgress",
            humantime::format_duration(t.kill_grace),
        );
    }

    let b = &cfg.breaker;
    positive(errs, "breaker.window", b.window);
    if b.min_attempts == 0 {
        errs.add("breaker.minAttempts", "must be at least 1");
    }
    if b.failures_threshold == 0 {
        errs.add("breaker.failuresThreshold", "must be at least 1");
    }
    if b.consecutive_threshold == 0 {
        errs.add("breaker.consecutiveThreshold", "must be at least 1");
    }

    let s = &cfg.sessions;
    positive(errs, "sessions.heartbeatInterval", s.heartbeat_interval);
    if s.lease_ttl <= s.heartbeat_interval {
        errs.add("sessions.leaseTtl", "must be greater than sessions.heartbeatInterval");
    }
}

fn check_strict(cfg: &ResolvedConfig, errs: &mut ValidationErrors) {
    one_of(errs, "store.backend", &cfg.store.backend, STORE_BACKENDS);
    if cfg.store.backend == "sqlite" && cfg.store.path.trim().is_empty() {
        errs.add("store.path", "required for the sqlite backend");
    }
    if cfg.ffmpeg.bin.trim().is_empty() {
        errs.add("ffmpeg.bin", "must not be empty in strict mode");
    }
}
