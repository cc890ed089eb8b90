//! Live configuration holder.
//!
//! Readers get the current [`Snapshot`] with a single atomic load. Reloads
//! are serialized by an async mutex, run the full loader pipeline and only
//! publish on success, so a failed reload leaves the previous snapshot in
//! place.

use super::auth_mode;
use super::file;
use super::loader::ConfigLoader;
use super::snapshot::Snapshot;
use super::types::ResolvedConfig;
use super::validation;
use super::watcher::{ConfigWatcherHandle, WatcherConfig, start_config_watcher};
use crate::error::{ConfigError, Result};
use arc_swap::ArcSwap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the published snapshot and everything needed to replace it.
pub struct ConfigHolder {
    loader: ConfigLoader,
    current: ArcSwap<Snapshot>,
    epoch: AtomicU64,
    reload_lock: tokio::sync::Mutex<()>,
    listeners: Mutex<Vec<mpsc::Sender<Arc<ResolvedConfig>>>>,
    snapshot_listeners: Mutex<Vec<mpsc::Sender<Arc<Snapshot>>>>,
    watcher: Mutex<Option<ConfigWatcherHandle>>,
}

impl ConfigHolder {
    /// Load the initial configuration and publish it as epoch 1.
    pub async fn new(loader: ConfigLoader) -> Result<Self> {
        let cfg = loader.load().await?;
        let snapshot = Snapshot::build(cfg, 1, loader.env(), loader.config_path())?;
        info!(epoch = 1, "initial configuration published");
        Ok(Self {
            loader,
            current: ArcSwap::from_pointee(snapshot),
            epoch: AtomicU64::new(1),
            reload_lock: tokio::sync::Mutex::new(()),
            listeners: Mutex::new(Vec::new()),
            snapshot_listeners: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
        })
    }

    /// The current resolved config.
    pub fn get(&self) -> Arc<ResolvedConfig> {
        Arc::clone(&self.current.load().config)
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Owned copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::clone(&self.current.load())
    }

    pub fn epoch(&self) -> u64 {
        self.current.load().epoch
    }

    pub fn loader(&self) -> &ConfigLoader {
        &self.loader
    }

    /// Re-run the loader and publish the result. On any error the current
    /// snapshot is kept and the error is returned.
    pub async fn reload(&self) -> Result<Arc<Snapshot>> {
        let _guard = self.reload_lock.lock().await;
        info!(event = "config.reload_start", "reloading configuration");

        let built = match self.loader.load().await {
            Ok(cfg) => self.build_next(cfg),
            Err(e) => Err(e),
        };
        let next = match built {
            Ok(next) => next,
            Err(e) => {
                error!(event = "config.reload_failed", error = %e, "configuration reload failed; keeping current");
                return Err(e);
            }
        };

        let previous = self.publish(next);
        let current = self.current();
        log_changes(&previous.config, &current.config);
        self.notify(&current);
        info!(event = "config.reload_success", epoch = current.epoch, "configuration reloaded");
        Ok(current)
    }

    /// Validate `cfg` and publish it as the next epoch without consulting
    /// the loader. Listeners are notified as for a reload.
    pub async fn swap(&self, cfg: ResolvedConfig) -> Result<Arc<Snapshot>> {
        let _guard = self.reload_lock.lock().await;
        admit(&cfg)?;
        let next = self.build_next(cfg)?;
        let previous = self.publish(next);
        let current = self.current();
        log_changes(&previous.config, &current.config);
        self.notify(&current);
        Ok(current)
    }

    /// Validate `cfg` and persist it to the backing file.
    pub fn save(&self, cfg: &ResolvedConfig) -> Result<()> {
        let Some(path) = self.loader.config_path() else {
            return Err(ConfigError::Save {
                path: Default::default(),
                reason: "no config file configured".into(),
            });
        };
        admit(cfg)?;
        file::save_file(path, cfg)
    }

    pub fn register_listener(&self, tx: mpsc::Sender<Arc<ResolvedConfig>>) {
        lock(&self.listeners).push(tx);
    }

    pub fn register_snapshot_listener(&self, tx: mpsc::Sender<Arc<Snapshot>>) {
        lock(&self.snapshot_listeners).push(tx);
    }

    /// Watch the backing file and reload after each burst of changes. Does
    /// nothing when the configuration comes from the environment only or a
    /// watcher is already running.
    pub fn start_watcher(self: &Arc<Self>) -> Result<()> {
        self.start_watcher_with(WatcherConfig::default())
    }

    pub fn start_watcher_with(self: &Arc<Self>, config: WatcherConfig) -> Result<()> {
        let Some(path) = self.loader.config_path() else {
            info!(event = "config.watcher_disabled", "no config file; watcher disabled");
            return Ok(());
        };
        let mut slot = lock(&self.watcher);
        if slot.is_some() {
            return Ok(());
        }

        let holder: Weak<Self> = Arc::downgrade(self);
        let handle = start_config_watcher(path, config, move || {
            let holder = holder.clone();
            async move {
                let Some(holder) = holder.upgrade() else { return };
                if let Err(e) = holder.reload().await {
                    warn!(event = "config.auto_reload_failed", error = %e, "automatic reload failed");
                }
            }
        })
        .map_err(|e| watch_error(path, e))?;
        *slot = Some(handle);
        Ok(())
    }

    /// Stop the watcher, if running, and release its OS handle.
    pub async fn stop(&self) {
        let handle = lock(&self.watcher).take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
    }

    pub fn is_watching(&self) -> bool {
        lock(&self.watcher).is_some()
    }

    fn build_next(&self, cfg: ResolvedConfig) -> Result<Snapshot> {
        let epoch = self.epoch.load(Ordering::Acquire).wrapping_add(1);
        Snapshot::build(cfg, epoch, self.loader.env(), self.loader.config_path())
    }

    /// Store `next`; callers hold the reload lock.
    fn publish(&self, next: Snapshot) -> Arc<Snapshot> {
        self.epoch.store(next.epoch, Ordering::Release);
        self.current.swap(Arc::new(next))
    }

    /// Deliver without blocking. Full channels skip this epoch; closed ones
    /// are unregistered.
    fn notify(&self, snapshot: &Arc<Snapshot>) {
        lock(&self.listeners).retain(|tx| match tx.try_send(Arc::clone(&snapshot.config)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(event = "config.listener_skip", epoch = snapshot.epoch, "listener channel full; notification dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        lock(&self.snapshot_listeners).retain(|tx| match tx.try_send(Arc::clone(snapshot)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(event = "config.snapshot_listener_skip", epoch = snapshot.epoch, "snapshot listener channel full; notification dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

/// Checks a config must pass before it is published or persisted when it
/// did not come through the loader.
fn admit(cfg: &ResolvedConfig) -> Result<()> {
    auth_mode::validate_inputs(&cfg.open_webif, &cfg.enigma2)?;
    validation::validate(cfg)?;
    Ok(())
}

fn watch_error(path: &Path, e: notify::Error) -> ConfigError {
    error!(event = "config.watcher_error", path = %path.display(), error = %e, "failed to start config watcher");
    ConfigError::Watch {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

macro_rules! log_change {
    ($old:expr, $new:expr, $name:literal) => {
        if $old != $new {
            info!(old = ?$old, new = ?$new, concat!("config changed: ", $name));
        }
    };
}

fn log_changes(old: &ResolvedConfig, new: &ResolvedConfig) {
    log_change!(old.bouquets, new.bouquets, "bouquets");
    log_change!(old.epg.enabled, new.epg.enabled, "epg.enabled");
    log_change!(old.epg.days, new.epg.days, "epg.days");
    log_change!(old.enigma2.stream_port, new.enigma2.stream_port, "enigma2.streamPort");
    log_change!(old.enigma2.use_webif_streams, new.enigma2.use_webif_streams, "enigma2.useWebIFStreams");
    log_change!(old.rate_limit.enabled, new.rate_limit.enabled, "rateLimit.enabled");
    log_change!(old.rate_limit.global, new.rate_limit.global, "rateLimit.global");
    log_change!(old.rate_limit.auth, new.rate_limit.auth, "rateLimit.auth");
}

impl fmt::Display for ConfigHolder {
    /// Redacted, like the snapshot it holds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.current.load())
    }
}

impl fmt::Debug for ConfigHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigHolder")
            .field("loader", &self.loader)
            .field("epoch", &self.epoch())
            .field("watching", &self.is_watching())
            .finish_non_exhaustive()
    }
}
