//! Tuner slot auto-discovery.
//!
//! Only runs when the engine is enabled and no source set the slots. A
//! failed probe never fails the load; the fallback depends on engine mode.

use super::types::{Enigma2Settings, EngineSettings};
use crate::error::ConfigError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Probes the receiver for usable tuner slots.
#[async_trait]
pub trait SlotDiscovery: Send + Sync {
    async fn discover(&self, receiver: &Enigma2Settings) -> anyhow::Result<Vec<u32>>;
}

async fn probe(
    discovery: Option<&dyn SlotDiscovery>,
    receiver: &Enigma2Settings,
    timeout: Duration,
) -> Result<Vec<u32>, ConfigError> {
    let Some(discovery) = discovery else {
        return Err(ConfigError::Discovery("no slot discovery configured".into()));
    };
    match tokio::time::timeout(timeout, discovery.discover(receiver)).await {
        Err(_) => Err(ConfigError::Discovery(format!(
            "timed out after {}",
            humantime::format_duration(timeout)
        ))),
        Ok(Err(e)) => Err(ConfigError::Discovery(format!("{:#}", e))),
        Ok(Ok(slots)) if slots.is_empty() => {
            Err(ConfigError::Discovery("receiver reported no tuners".into()))
        }
        Ok(Ok(slots)) => Ok(slots),
    }
}

/// Fill `engine.tuner_slots` if it is still unset.
pub async fn apply_discovery(
    engine: &mut EngineSettings,
    receiver: &Enigma2Settings,
    discovery: Option<&dyn SlotDiscovery>,
    timeout: Duration,
) {
    if !engine.enabled || engine.tuner_slots.is_some() {
        return;
    }

    match probe(discovery, receiver, timeout).await {
        Ok(slots) => {
            info!(slots = ?slots, "tuner slots discovered");
            engine.tuner_slots = Some(slots);
        }
        Err(e) if engine.is_virtual() => {
            warn!(error = %e, "tuner discovery failed; virtual mode uses slot 0");
            engine.tuner_slots = Some(vec![0]);
        }
        Err(e) => {
            error!(
                event = "config.tuner_discovery_failed",
                error = %e,
                "CRITICAL: tuner discovery failed in standard mode; no tuner slots configured"
            );
        }
    }
}
