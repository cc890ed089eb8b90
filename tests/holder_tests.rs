//! Integration tests for the config holder: reloads, epochs, listeners,
//! persistence and the file watcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use xg2g_config::config::{ConfigHolder, ConfigLoader, MapEnv, WatcherConfig};
use xg2g_config::error::ConfigError;

fn write_config(yaml: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("config.yaml");
    fs::write(&path, yaml).expect("write config");
    (dir, path)
}

async fn holder_for(path: &Path) -> ConfigHolder {
    let loader = ConfigLoader::new(Some(path.to_path_buf()), "test").with_env(Arc::new(MapEnv::new()));
    ConfigHolder::new(loader).await.expect("initial load")
}

#[tokio::test]
async fn test_reload_picks_up_file_changes() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = holder_for(&path).await;
    assert_eq!(holder.epoch(), 1);
    assert_eq!(holder.get().epg.days, 7);

    fs::write(&path, "epg:\n  days: 3\n").unwrap();
    let snap = holder.reload().await.unwrap();
    assert_eq!(snap.epoch, 2);
    assert_eq!(holder.get().epg.days, 3);
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = holder_for(&path).await;

    fs::write(&path, "epg:\n  days: 99\n").unwrap();
    let err = holder.reload().await.unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
    assert_eq!(holder.epoch(), 1);
    assert_eq!(holder.get().epg.days, 7);

    fs::write(&path, "epg: [not, a, map]\n").unwrap();
    assert!(holder.reload().await.is_err());
    assert_eq!(holder.epoch(), 1);

    fs::write(&path, "epg:\n  days: 2\n").unwrap();
    assert_eq!(holder.reload().await.unwrap().epoch, 2);
}

#[tokio::test]
async fn test_listeners_receive_each_successful_reload() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = holder_for(&path).await;
    let (tx, mut rx) = mpsc::channel(4);
    let (stx, mut srx) = mpsc::channel(4);
    holder.register_listener(tx);
    holder.register_snapshot_listener(stx);

    fs::write(&path, "epg:\n  days: 4\n").unwrap();
    holder.reload().await.unwrap();
    fs::write(&path, "epg:\n  days: 99\n").unwrap();
    assert!(holder.reload().await.is_err());

    assert_eq!(rx.recv().await.unwrap().epg.days, 4);
    assert_eq!(srx.recv().await.unwrap().epoch, 2);
    assert!(rx.try_recv().is_err());
    assert!(srx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_never_see_invalid_config() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = Arc::new(holder_for(&path).await);
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let holder = Arc::clone(&holder);
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut last_epoch = 0;
            while !done.load(Ordering::SeqCst) {
                let snap = holder.current();
                assert!((1..=14).contains(&snap.config.epg.days));
                assert!(snap.epoch >= last_epoch);
                last_epoch = snap.epoch;
                tokio::task::yield_now().await;
            }
        })
    };

    for i in 0..20u32 {
        let days = if i % 2 == 0 { 99 } else { 1 + i % 14 };
        fs::write(&path, format!("epg:\n  days: {days}\n")).unwrap();
        let _ = holder.reload().await;
    }
    done.store(true, Ordering::SeqCst);
    reader.await.unwrap();
    assert_eq!(holder.epoch(), 11);
}

#[tokio::test]
async fn test_save_then_reload_round_trips() {
    let (_dir, path) = write_config("openWebIF:\n  username: root\n  password: dreambox\n");
    let holder = holder_for(&path).await;

    let mut cfg = (*holder.get()).clone();
    cfg.epg.days = 5;
    cfg.bouquets = vec!["Favourites".into()];
    holder.save(&cfg).unwrap();

    let snap = holder.reload().await.unwrap();
    assert_eq!(snap.config.epg.days, 5);
    assert_eq!(snap.config.bouquets, vec!["Favourites"]);
    assert_eq!(snap.config.open_webif.password, "dreambox");
    assert_eq!(snap.config.enigma2.username, "root");
}

#[tokio::test]
async fn test_save_rejects_invalid_config() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = holder_for(&path).await;
    let mut cfg = (*holder.get()).clone();
    cfg.epg.days = 0;
    assert!(matches!(holder.save(&cfg), Err(ConfigError::Validation(_))));
    assert_eq!(fs::read_to_string(&path).unwrap(), "epg:\n  days: 7\n");
}

#[tokio::test]
async fn test_watcher_coalesces_burst_into_one_reload() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = Arc::new(holder_for(&path).await);
    let config = WatcherConfig {
        debounce: Duration::from_millis(400),
    };
    holder.start_watcher_with(config).unwrap();
    assert!(holder.is_watching());

    for days in [3, 4, 5] {
        fs::write(&path, format!("epg:\n  days: {days}\n")).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(holder.epoch(), 2);
    assert_eq!(holder.get().epg.days, 5);

    holder.stop().await;
    assert!(!holder.is_watching());
}

#[tokio::test]
async fn test_watcher_single_write_reloads_once() {
    let (_dir, path) = write_config("epg:\n  days: 7\n");
    let holder = Arc::new(holder_for(&path).await);
    let config = WatcherConfig {
        debounce: Duration::from_millis(200),
    };
    holder.start_watcher_with(config).unwrap();

    fs::write(&path, "epg:\n  days: 6\n").unwrap();

    // Several debounce windows: the reload's own read of the file must not
    // trigger another one.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(holder.epoch(), 2);
    assert_eq!(holder.get().epg.days, 6);

    holder.stop().await;
}
