//! Streaming credential policy.
//!
//! Inputs are checked against the mode first so that a contradictory setup
//! is reported instead of being silently resolved away.

use super::types::{AuthMode, Enigma2Settings, OpenWebIfSettings};
use crate::error::{ConfigError, Result};
use tracing::debug;

fn is_set(s: &str) -> bool {
    !s.trim().is_empty()
}

/// Both or neither of a username/password pair.
fn check_pair(label: &str, username: &str, password: &str) -> Result<()> {
    match (is_set(username), is_set(password)) {
        (true, false) => Err(ConfigError::AuthMode(format!(
            "{label} username is set without a password"
        ))),
        (false, true) => Err(ConfigError::AuthMode(format!(
            "{label} password is set without a username"
        ))),
        _ => Ok(()),
    }
}

/// Reject credential combinations the configured mode does not allow.
pub fn validate_inputs(primary: &OpenWebIfSettings, e2: &Enigma2Settings) -> Result<()> {
    match e2.auth_mode {
        AuthMode::None => {
            if is_set(&e2.username) || is_set(&e2.password) {
                return Err(ConfigError::AuthMode(
                    "mode none forbids enigma2 username/password".into(),
                ));
            }
            Ok(())
        }
        AuthMode::Explicit => check_pair("enigma2", &e2.username, &e2.password),
        AuthMode::Inherit => {
            check_pair("openWebIF", &primary.username, &primary.password)?;
            check_pair("enigma2", &e2.username, &e2.password)
        }
    }
}

/// Derive the effective streaming credentials. Assumes [`validate_inputs`]
/// passed.
pub fn resolve(primary: &OpenWebIfSettings, e2: &mut Enigma2Settings) {
    match e2.auth_mode {
        AuthMode::None => {
            e2.username.clear();
            e2.password.clear();
        }
        AuthMode::Explicit => {}
        AuthMode::Inherit => {
            if !is_set(&e2.username) && !is_set(&e2.password) {
                e2.username = primary.username.clone();
                e2.password = primary.password.clone();
                if is_set(&e2.username) {
                    debug!("enigma2 credentials inherited from openWebIF");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> OpenWebIfSettings {
        OpenWebIfSettings {
            username: "root".into(),
            password: "dreambox".into(),
        }
    }

    fn e2(mode: AuthMode, user: &str, pass: &str) -> Enigma2Settings {
        Enigma2Settings {
            auth_mode: mode,
            username: user.into(),
            password: pass.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_inherit_copies_primary_when_empty() {
        let mut cfg = e2(AuthMode::Inherit, "", "");
        validate_inputs(&primary(), &cfg).unwrap();
        resolve(&primary(), &mut cfg);
        assert_eq!(cfg.username, "root");
        assert_eq!(cfg.password, "dreambox");
    }

    #[test]
    fn test_inherit_keeps_own_credentials() {
        let mut cfg = e2(AuthMode::Inherit, "stream", "pw");
        validate_inputs(&primary(), &cfg).unwrap();
        resolve(&primary(), &mut cfg);
        assert_eq!(cfg.username, "stream");
    }

    #[test]
    fn test_inherit_rejects_half_pairs() {
        let half = OpenWebIfSettings {
            username: "root".into(),
            password: String::new(),
        };
        assert!(validate_inputs(&half, &e2(AuthMode::Inherit, "", "")).is_err());
        assert!(validate_inputs(&primary(), &e2(AuthMode::Inherit, "", "pw")).is_err());
    }

    #[test]
    fn test_none_rejects_credentials_before_clearing() {
        let cfg = e2(AuthMode::None, "stream", "");
        let err = validate_inputs(&primary(), &cfg).unwrap_err();
        assert!(err.to_string().starts_with("e2 auth mode:"));

        let mut clean = e2(AuthMode::None, "", "");
        validate_inputs(&primary(), &clean).unwrap();
        resolve(&primary(), &mut clean);
        assert!(clean.username.is_empty() && clean.password.is_empty());
    }

    #[test]
    fn test_explicit_requires_full_pair() {
        assert!(validate_inputs(&primary(), &e2(AuthMode::Explicit, "u", "")).is_err());
        let mut cfg = e2(AuthMode::Explicit, "", "");
        validate_inputs(&primary(), &cfg).unwrap();
        resolve(&primary(), &mut cfg);
        // explicit never borrows the primary pair
        assert!(cfg.username.is_empty());
    }
}
