//! Integration tests for the configuration loader.
//!
//! Each test writes a YAML file into a temp directory and drives the loader
//! with an in-memory environment.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use xg2g_config::config::{AuthMode, ConfigLoader, MapEnv};
use xg2g_config::error::ConfigError;

/// Write `yaml` as `config.yaml` in a fresh temp dir.
fn write_config(yaml: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, yaml).expect("write config");
    (dir, path)
}

fn loader(path: Option<PathBuf>, env: MapEnv) -> ConfigLoader {
    ConfigLoader::new(path, "1.2.3").with_env(Arc::new(env))
}

fn validation_fields(err: ConfigError) -> Vec<String> {
    match err {
        ConfigError::Validation(errs) => errs.violations.into_iter().map(|v| v.field).collect(),
        other => panic!("expected validation error, got: {other}"),
    }
}

#[tokio::test]
async fn test_env_overrides_file_overrides_default() {
    let (_dir, path) = write_config(
        r#"
logLevel: debug
bouquets: [Favourites, Movies]
epg:
  enabled: false
  days: 5
enigma2:
  baseUrl: http://receiver.local
  tuneTimeout: 20s
api:
  listenAddr: ":9000"
"#,
    );
    let env = MapEnv::from_pairs([
        ("XG2G_EPG_DAYS", "3"),
        ("XG2G_EPG_ENABLED", "true"),
        ("XG2G_E2_TUNE_TIMEOUT", "45s"),
        ("XG2G_BOUQUET", "Sports"),
    ]);
    let cfg = loader(Some(path), env).load().await.unwrap();

    // env wins
    assert_eq!(cfg.epg.days, 3);
    assert!(cfg.epg.enabled);
    assert_eq!(cfg.enigma2.tune_timeout, Duration::from_secs(45));
    assert_eq!(cfg.bouquets, vec!["Sports"]);
    // file wins over default
    assert_eq!(cfg.log_level, "debug");
    assert_eq!(cfg.api.listen_addr, ":9000");
    // default
    assert_eq!(cfg.epg.max_concurrency, 5);
    assert_eq!(cfg.enigma2.stream_port, 8001);
    assert_eq!(cfg.version, "1.2.3");
}

#[tokio::test]
async fn test_yaml_alias_conflict_names_both_paths() {
    let (_dir, path) = write_config(
        r#"
openWebIF:
  timeout: 10s
enigma2:
  timeout: 5s
"#,
    );
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::AliasConflict { .. }));
    assert!(
        err.to_string()
            .contains("openWebIF.timeout conflicts with enigma2.timeout"),
        "{err}"
    );
}

#[tokio::test]
async fn test_yaml_alias_agreement_is_accepted() {
    let (_dir, path) = write_config(
        r#"
openWebIF:
  baseUrl: http://box
  streamPort: 17999
enigma2:
  baseUrl: http://box
"#,
    );
    let cfg = loader(Some(path), MapEnv::new()).load().await.unwrap();
    assert_eq!(cfg.enigma2.base_url, "http://box");
    assert_eq!(cfg.enigma2.stream_port, 17999);
}

#[tokio::test]
async fn test_env_aliases_equal_after_normalization() {
    let env = MapEnv::from_pairs([
        ("XG2G_OWI_TIMEOUT_MS", "10000"),
        ("XG2G_E2_TIMEOUT", "10s"),
    ]);
    let cfg = loader(None, env).load().await.unwrap();
    assert_eq!(cfg.enigma2.timeout, Duration::from_secs(10));
}

#[tokio::test]
async fn test_env_aliases_disagreeing_fail() {
    let env = MapEnv::from_pairs([
        ("XG2G_OWI_TIMEOUT_MS", "10000"),
        ("XG2G_E2_TIMEOUT", "5s"),
    ]);
    let err = loader(None, env).load().await.unwrap_err();
    assert!(err.to_string().contains("XG2G_OWI_TIMEOUT_MS"), "{err}");
    assert!(err.to_string().contains("XG2G_E2_TIMEOUT"), "{err}");
}

#[tokio::test]
async fn test_auth_mode_none_rejects_credentials() {
    let (_dir, path) = write_config(
        r#"
enigma2:
  authMode: none
  username: root
"#,
    );
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::AuthMode(_)), "{err}");
}

#[tokio::test]
async fn test_auth_mode_none_keeps_credentials_empty() {
    let (_dir, path) = write_config(
        r#"
openWebIF:
  username: root
  password: dreambox
enigma2:
  authMode: none
"#,
    );
    let cfg = loader(Some(path), MapEnv::new()).load().await.unwrap();
    assert_eq!(cfg.enigma2.auth_mode, AuthMode::None);
    assert!(cfg.enigma2.username.is_empty());
    assert!(cfg.enigma2.password.is_empty());
}

#[tokio::test]
async fn test_removed_env_var_fails_start() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let env = MapEnv::from_pairs([("XG2G_STREAM_PROFILE", "high")]);
    let err = loader(Some(path), env).load().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "XG2G_STREAM_PROFILE removed. Use XG2G_STREAMING_POLICY=universal (ADR-00X)"
    );
}

#[tokio::test]
async fn test_legacy_prefix_rejected() {
    let env = MapEnv::from_pairs([("XG2G_V3_HLS_ROOT", "/srv/hls")]);
    let err = loader(None, env).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::LegacyPrefix { .. }));
    assert!(err.to_string().contains("XG2G_HLS_ROOT"));
}

#[tokio::test]
async fn test_unknown_keys_rejected() {
    let (_dir, path) = write_config("epg:\n  dayz: 7\n");
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
    assert!(err.to_string().contains("dayz"));
}

#[tokio::test]
async fn test_multiple_documents_rejected() {
    let (_dir, path) = write_config("logLevel: info\n---\nlogLevel: debug\n");
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::MultipleDocuments));
}

#[tokio::test]
async fn test_empty_file_yields_defaults() {
    let (_dir, path) = write_config("# nothing configured yet\n");
    let cfg = loader(Some(path), MapEnv::new()).load().await.unwrap();
    assert_eq!(cfg.epg.days, 14);
    assert_eq!(cfg.api.listen_addr, ":8088");
}

#[tokio::test]
async fn test_non_yaml_extension_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, "{}").unwrap();
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[tokio::test]
async fn test_version_mismatch_rejected() {
    let (_dir, path) = write_config("configVersion: v2\n");
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(matches!(err, ConfigError::Version { .. }));
}

#[tokio::test]
async fn test_https_without_tls_is_forbidden() {
    let (_dir, path) = write_config("tls:\n  forceHTTPS: true\n");
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    assert!(err.to_string().contains("HTTPS_WITHOUT_TLS"), "{err}");
    assert!(validation_fields(err).contains(&"tls.forceHTTPS".to_string()));
}

#[tokio::test]
async fn test_trust_all_networks_rejected_in_both_lists() {
    let (_dir, path) = write_config(
        r#"
trustedProxies: ["0.0.0.0/0"]
rateLimit:
  whitelist: ["10.0.0.0/8", "::/0"]
"#,
    );
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    let fields = validation_fields(err);
    assert!(fields.contains(&"trustedProxies".to_string()));
    assert!(fields.contains(&"rateLimit.whitelist".to_string()));
}

#[tokio::test]
async fn test_private_ranges_accepted() {
    let (_dir, path) = write_config(
        r#"
trustedProxies: ["10.0.0.0/8", "127.0.0.1", "fd00::/8"]
rateLimit:
  whitelist: ["192.168.0.0/16"]
"#,
    );
    assert!(loader(Some(path), MapEnv::new()).load().await.is_ok());
}

#[tokio::test]
async fn test_all_violations_reported_together() {
    let (_dir, path) = write_config(
        r#"
epg:
  days: 30
  maxConcurrency: 50
enigma2:
  streamPort: 0
"#,
    );
    let err = loader(Some(path), MapEnv::new()).load().await.unwrap_err();
    let fields = validation_fields(err);
    assert!(fields.contains(&"epg.days".to_string()));
    assert!(fields.contains(&"epg.maxConcurrency".to_string()));
    assert!(fields.contains(&"enigma2.streamPort".to_string()));
}

#[tokio::test]
async fn test_strict_mode_rejects_unknown_env() {
    let env = MapEnv::from_pairs([("XG2G_EPG_DAY", "3"), ("XG2G_LISTN", ":1")]);
    let err = loader(None, env).load().await.unwrap_err();
    match err {
        ConfigError::UnknownEnv(keys) => assert_eq!(keys, vec!["XG2G_EPG_DAY", "XG2G_LISTN"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_file_values_expand_env_references() {
    let (_dir, path) = write_config("openWebIF:\n  username: root\n  password: ${XG2G_RECEIVER_PASSWORD}\n");
    let env = MapEnv::from_pairs([("XG2G_RECEIVER_PASSWORD", "dreambox")]);
    let cfg = loader(Some(path), env).load().await.unwrap();
    assert_eq!(cfg.open_webif.password, "dreambox");
    assert_eq!(cfg.enigma2.password, "dreambox");
}
