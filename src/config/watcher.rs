//! File watcher for the configuration file.
//!
//! Watches the file's parent directory so editor save patterns (write to a
//! temp file, then rename over the target) are still observed. Only content
//! changes, creations, renames and removals of the target name count; reads
//! of the file (including our own reloads) never do. Bursts of events are
//! coalesced with a trailing debounce window before the reload callback runs.

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::{OsStr, OsString};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Trailing window: a reload runs once no event arrived for this long.
    pub debounce: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Handle to a running watcher. Dropping it stops the watcher as well;
/// [`ConfigWatcherHandle::stop`] additionally waits for the loop to exit.
pub struct ConfigWatcherHandle {
    path: PathBuf,
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
    watcher: RecommendedWatcher,
}

impl std::fmt::Debug for ConfigWatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcherHandle")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ConfigWatcherHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn stop(self) {
        let Self {
            path,
            shutdown,
            task,
            watcher,
        } = self;
        let _ = shutdown.send(true);
        drop(watcher);
        let _ = task.await;
        info!(event = "config.watcher_stopped", path = %path.display(), "config watcher stopped");
    }
}

/// Start watching `path`. `on_settled` runs after each debounced burst of
/// changes; a reload triggered from it is serialized by the caller.
pub fn start_config_watcher<F, Fut>(
    path: &Path,
    config: WatcherConfig,
    on_settled: F,
) -> Result<ConfigWatcherHandle, notify::Error>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let target: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (hits_tx, hits_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_change_of(&event, &target) => {
            debug!(kind = ?event.kind, "config file change detected");
            let _ = hits_tx.send(());
        }
        Ok(_) => {}
        Err(e) => {
            error!(event = "config.watcher_error", error = %e, "config watcher error");
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    let task = tokio::spawn(debounce_loop(hits_rx, shutdown_rx, config.debounce, on_settled));

    info!(
        event = "config.watcher_started",
        path = %path.display(),
        dir = %dir.display(),
        "config watcher started"
    );
    Ok(ConfigWatcherHandle {
        path: path.to_path_buf(),
        shutdown: shutdown_tx,
        task,
        watcher,
    })
}

/// True if `event` creates, rewrites, renames or removes `target`.
/// Access events (open, read, close) and metadata-only changes are ignored.
pub(crate) fn is_change_of(event: &Event, target: &OsStr) -> bool {
    let kind_matches = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Any)
    );
    kind_matches && event.paths.iter().any(|p| p.file_name() == Some(target))
}

/// Coalesce hits: every hit pushes the deadline out by `window`; the
/// callback runs once the deadline passes. Ends on shutdown or when the
/// hit channel closes.
pub(crate) async fn debounce_loop<F, Fut>(
    mut hits: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
    window: Duration,
    mut on_settled: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut deadline: Option<Instant> = None;
    loop {
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            hit = hits.recv() => match hit {
                Some(()) => deadline = Some(Instant::now() + window),
                None => break,
            },
            _ = timer => {
                deadline = None;
                on_settled().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() -> std::future::Ready<()>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&fired);
        (fired, move || {
            hook.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        })
    }

    #[tokio::test]
    async fn test_burst_fires_once() {
        let (fired, hook) = counter();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(debounce_loop(rx, stop_rx, Duration::from_millis(100), hook));

        for _ in 0..3 {
            tx.send(()).unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_separate_bursts_fire_separately() {
        let (fired, hook) = counter();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(debounce_loop(rx, stop_rx, Duration::from_millis(50), hook));

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_drops_pending_fire() {
        let (fired, hook) = counter();
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = watch::channel(false);
        let task = tokio::spawn(debounce_loop(rx, stop_rx, Duration::from_millis(200), hook));

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_watcher_ignores_sibling_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "logLevel: info\n").unwrap();

        let (fired, hook) = counter();
        let config = WatcherConfig {
            debounce: Duration::from_millis(100),
        };
        let handle = start_config_watcher(&path, config, hook).unwrap();

        std::fs::write(dir.path().join("other.yaml"), "x: 1\n").unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_watcher_ignores_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "logLevel: info\n").unwrap();

        let (fired, hook) = counter();
        let config = WatcherConfig {
            debounce: Duration::from_millis(100),
        };
        let handle = start_config_watcher(&path, config, hook).unwrap();

        for _ in 0..3 {
            std::fs::read_to_string(&path).unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        handle.stop().await;
    }

    #[test]
    fn test_change_kinds() {
        use notify::event::{
            AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode,
        };
        let target = OsStr::new("config.yaml");
        let event = |kind: EventKind, name: &str| Event::new(kind).add_path(PathBuf::from("/etc/xg2g").join(name));

        let changes = [
            EventKind::Create(CreateKind::File),
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            EventKind::Modify(ModifyKind::Any),
            EventKind::Remove(RemoveKind::File),
        ];
        for kind in changes {
            assert!(is_change_of(&event(kind, "config.yaml"), target), "{kind:?}");
            assert!(!is_change_of(&event(kind, "other.yaml"), target), "{kind:?}");
        }

        let ignored = [
            EventKind::Access(AccessKind::Open(AccessMode::Read)),
            EventKind::Access(AccessKind::Close(AccessMode::Read)),
            EventKind::Access(AccessKind::Close(AccessMode::Write)),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
        ];
        for kind in ignored {
            assert!(!is_change_of(&event(kind, "config.yaml"), target), "{kind:?}");
        }
    }
}
