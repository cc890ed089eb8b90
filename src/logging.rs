//! Tracing setup for the binary.
//!
//! `RUST_LOG` wins when set. Otherwise the filter starts at the level passed
//! to [`init`] and follows the configured `logLevel` once it is known, via
//! [`LogLevelHandle`].

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogOutput {
    /// Parse the `--log` option: `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a
    /// file name.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "0" | "off" => LogOutput::Off,
            "1" | "stdout" => LogOutput::Stdout,
            "2" | "stderr" => LogOutput::Stderr,
            path => LogOutput::File(PathBuf::from(path)),
        }
    }
}

/// Map the config's level names onto tracing directives.
pub fn directive_for(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "fatal" | "panic" => "error",
        "disabled" => "off",
        _ => "info",
    }
}

fn rust_log_set() -> bool {
    std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
}

fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive_for(fallback)))
}

/// Changes the active level after [`init`]. Inert when logging is off.
#[derive(Clone, Default)]
pub struct LogLevelHandle {
    inner: Option<reload::Handle<EnvFilter, Registry>>,
}

impl std::fmt::Debug for LogLevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogLevelHandle")
            .field("active", &self.inner.is_some())
            .finish()
    }
}

impl LogLevelHandle {
    /// Switch to `level` (a `logLevel` value). No-op when `RUST_LOG` is set.
    pub fn set_level(&self, level: &str) -> anyhow::Result<()> {
        let Some(handle) = &self.inner else {
            return Ok(());
        };
        if rust_log_set() {
            return Ok(());
        }
        handle.reload(EnvFilter::new(directive_for(level)))?;
        Ok(())
    }
}

/// Install the global subscriber, starting at `fallback_level`.
pub fn init(output: &LogOutput, fallback_level: &str) -> anyhow::Result<LogLevelHandle> {
    let (filter_layer, handle) = reload::Layer::new(filter(fallback_level));
    let registry = tracing_subscriber::registry().with(filter_layer);
    match output {
        LogOutput::Off => return Ok(LogLevelHandle::default()),
        LogOutput::Stdout => registry.with(fmt::layer().with_writer(std::io::stdout)).try_init(),
        LogOutput::Stderr => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
                .try_init()
        }
    }?;
    Ok(LogLevelHandle {
        inner: Some(handle),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output() {
        assert_eq!(LogOutput::parse("0"), LogOutput::Off);
        assert_eq!(LogOutput::parse("stdout"), LogOutput::Stdout);
        assert_eq!(LogOutput::parse("2"), LogOutput::Stderr);
        assert_eq!(
            LogOutput::parse("/var/log/xg2g.log"),
            LogOutput::File(PathBuf::from("/var/log/xg2g.log"))
        );
    }

    #[test]
    fn test_level_directives() {
        assert_eq!(directive_for("DEBUG"), "debug");
        assert_eq!(directive_for("warning"), "warn");
        assert_eq!(directive_for("fatal"), "error");
        assert_eq!(directive_for(""), "info");
    }

    #[test]
    fn test_inactive_handle_is_noop() {
        assert!(LogLevelHandle::default().set_level("debug").is_ok());
    }

    #[test]
    fn test_set_level_follows_config() {
        if rust_log_set() {
            return;
        }
        let (layer, handle) = reload::Layer::new(EnvFilter::new("info"));
        let _subscriber = tracing_subscriber::registry().with(layer);
        let log = LogLevelHandle {
            inner: Some(handle.clone()),
        };

        log.set_level("DEBUG").unwrap();
        assert_eq!(handle.with_current(|f| f.to_string()).unwrap(), "debug");
        log.set_level("warning").unwrap();
        assert_eq!(handle.with_current(|f| f.to_string()).unwrap(), "warn");
    }
}
