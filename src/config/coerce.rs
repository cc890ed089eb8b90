//! String coercion shared by the file merge and the environment resolver.
//!
//! Every function names the offending key in its error so a bad value can be
//! traced back to the exact YAML path or environment variable.

use super::types::ScopedToken;
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::warn;

pub fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(
            key,
            format!("expected a boolean, got {:?}", other),
        )),
    }
}

pub fn parse_int(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::invalid(key, format!("expected an integer, got {:?}: {}", raw, e)))
}

pub fn parse_float(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ConfigError::invalid(key, format!("expected a number, got {:?}: {}", raw, e)))
}

/// Duration-string grammar: `500ms`, `10s`, `1m 30s`, `1h30m`.
pub fn parse_duration(key: &str, raw: &str) -> Result<Duration> {
    humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigError::invalid(key, format!("invalid duration {:?}: {}", raw, e)))
}

/// Integer milliseconds, as used by the `*_MS` environment variables.
pub fn parse_duration_ms(key: &str, raw: &str) -> Result<Duration> {
    let ms = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(key, format!("expected milliseconds, got {:?}: {}", raw, e)))?;
    Ok(Duration::from_millis(ms))
}

pub fn to_u32(key: &str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ConfigError::invalid(key, format!("{} is out of range (0..={})", value, u32::MAX)))
}

/// Comma-separated list; blank entries are dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_int_list(key: &str, raw: &str) -> Result<Vec<i64>> {
    parse_list(raw)
        .iter()
        .map(|item| parse_int(key, item))
        .collect()
}

/// `key=value` pairs separated by commas.
pub fn parse_map(key: &str, raw: &str) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for entry in parse_list(raw) {
        let Some((k, v)) = entry.split_once('=') else {
            return Err(ConfigError::invalid(
                key,
                format!("entry {:?} must be key=value", entry),
            ));
        };
        let (k, v) = (k.trim(), v.trim());
        if k.is_empty() || v.is_empty() {
            return Err(ConfigError::invalid(
                key,
                format!("entry {:?} has an empty key or value", entry),
            ));
        }
        out.insert(k.to_string(), v.to_string());
    }
    Ok(out)
}

/// Parse a scoped token list: a JSON array of `{token, scopes, user}` objects,
/// or the legacy `token=scope1,scope2;token2=scope3` form.
pub fn parse_scoped_tokens(key: &str, raw: &str) -> Result<Vec<ScopedToken>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('{') {
        return Err(ConfigError::invalid(
            key,
            "JSON must be an array of objects",
        ));
    }
    let tokens = if trimmed.starts_with('[') {
        let tokens: Vec<ScopedToken> = serde_json::from_str(trimmed)
            .map_err(|e| ConfigError::invalid(key, format!("JSON parse failed: {}", e)))?;
        if tokens.is_empty() {
            return Err(ConfigError::invalid(key, "JSON array is empty"));
        }
        tokens
    } else {
        warn!(key, "legacy token format detected; JSON array is recommended");
        parse_legacy_tokens(key, trimmed)?
    };
    normalize_tokens(key, tokens)
}

fn parse_legacy_tokens(key: &str, raw: &str) -> Result<Vec<ScopedToken>> {
    let mut out = Vec::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((token, scopes)) = entry.split_once('=') else {
            return Err(ConfigError::invalid(
                key,
                format!("legacy entry must be token=scopes: {:?}", entry),
            ));
        };
        out.push(ScopedToken {
            token: token.trim().to_string(),
            scopes: parse_list(scopes),
            user: String::new(),
        });
    }
    if out.is_empty() {
        return Err(ConfigError::invalid(key, "no valid token entries"));
    }
    Ok(out)
}

pub(crate) fn normalize_tokens(key: &str, tokens: Vec<ScopedToken>) -> Result<Vec<ScopedToken>> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tokens.len());
    for t in tokens {
        let token = t.token.trim().to_string();
        if token.is_empty() {
            return Err(ConfigError::invalid(key, "token is empty"));
        }
        if !seen.insert(token.clone()) {
            return Err(ConfigError::invalid(key, "duplicate token"));
        }
        let mut scopes = Vec::with_capacity(t.scopes.len());
        for scope in &t.scopes {
            let scope = scope.trim();
            if scope.is_empty() {
                return Err(ConfigError::invalid(key, "scopes must not contain empty entries"));
            }
            scopes.push(scope.to_string());
        }
        if scopes.is_empty() {
            return Err(ConfigError::invalid(key, "every token needs at least one scope"));
        }
        out.push(ScopedToken {
            token,
            scopes,
            user: t.user.trim().to_string(),
        });
    }
    Ok(out)
}

/// Expand `$VAR` and `${VAR}` references. Unset variables expand to "".
pub fn expand_env(raw: &str, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
    if !raw.contains('$') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some((start, '{')) => {
                chars.next();
                let rest = &raw[start + 1..];
                if let Some(end) = rest.find('}') {
                    let name = &rest[..end];
                    out.push_str(&lookup(name).unwrap_or_default());
                    for _ in 0..=name.chars().count() {
                        chars.next();
                    }
                } else {
                    out.push_str(&raw[i..]);
                    break;
                }
            }
            Some((start, n)) if n == '_' || n.is_ascii_alphabetic() => {
                let len = raw[start..]
                    .find(|ch: char| !(ch == '_' || ch.is_ascii_alphanumeric()))
                    .unwrap_or(raw.len() - start);
                let name = &raw[start..start + len];
                out.push_str(&lookup(name).unwrap_or_default());
                for _ in 0..name.chars().count() {
                    chars.next();
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_variants() {
        for raw in ["true", "1", "YES", " on "] {
            assert!(parse_bool("K", raw).unwrap(), "{raw}");
        }
        for raw in ["false", "0", "no", "Off"] {
            assert!(!parse_bool("K", raw).unwrap(), "{raw}");
        }
        let err = parse_bool("XG2G_EPG_ENABLED", "maybe").unwrap_err();
        assert!(err.to_string().contains("XG2G_EPG_ENABLED"));
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!(parse_duration("k", "10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("k", "500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("k", "1m 30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration_ms("k", "10000").unwrap(), Duration::from_secs(10));

        let err = parse_duration("enigma2.timeout", "ten seconds").unwrap_err();
        assert!(err.to_string().contains("enigma2.timeout"));
        assert!(parse_duration_ms("XG2G_OWI_TIMEOUT_MS", "10s").is_err());
    }

    #[test]
    fn test_parse_list_drops_blanks() {
        assert_eq!(parse_list(" a, ,b ,"), vec!["a", "b"]);
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_parse_map() {
        let m = parse_map("K", "hdd=/media/hdd/movie, net=/media/net").unwrap();
        assert_eq!(m["hdd"], "/media/hdd/movie");
        assert_eq!(m["net"], "/media/net");
        assert!(parse_map("K", "broken").is_err());
        assert!(parse_map("K", "=x").is_err());
    }

    #[test]
    fn test_scoped_tokens_json() {
        let raw = r#"[{"token":"abc","scopes":["v3:read"]},{"token":"def","scopes":["v3:write"],"user":"ops"}]"#;
        let tokens = parse_scoped_tokens("XG2G_API_TOKENS", raw).unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].user, "ops");
    }

    #[test]
    fn test_scoped_tokens_legacy() {
        let tokens = parse_scoped_tokens("K", "abc=v3:read,v3:write; def=v3:admin").unwrap();
        assert_eq!(tokens[0].scopes, vec!["v3:read", "v3:write"]);
        assert_eq!(tokens[1].token, "def");
    }

    #[test]
    fn test_scoped_tokens_rejects_bad_input() {
        assert!(parse_scoped_tokens("K", r#"{"token":"a"}"#).is_err());
        assert!(parse_scoped_tokens("K", "[]").is_err());
        assert!(parse_scoped_tokens("K", "abc=v3:read;abc=v3:write").is_err());
        assert!(parse_scoped_tokens("K", "abc=").is_err());
        assert!(parse_scoped_tokens("K", r#"[{"token":" ","scopes":["v3:read"]}]"#).is_err());
    }

    #[test]
    fn test_expand_env() {
        let lookup = |name: &str| match name {
            "HOST" => Some("receiver.local".to_string()),
            "PASS" => Some("s3cret".to_string()),
            _ => None,
        };
        assert_eq!(expand_env("http://$HOST:80", lookup), "http://receiver.local:80");
        assert_eq!(expand_env("${PASS}!", lookup), "s3cret!");
        assert_eq!(expand_env("${MISSING}x", lookup), "x");
        assert_eq!(expand_env("cost $5", lookup), "cost $5");
        assert_eq!(expand_env("plain", lookup), "plain");
    }
}
