//! xg2g-config
//!
//! Operator tool for the xg2g configuration: validates a config file and
//! environment, prints the registry of defaults, or follows reloads.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use xg2g_config::cli::{Cli, Command};
use xg2g_config::config::{ConfigHolder, ConfigLoader, DefaultRegistry, FileConfig, mask_secrets};
use xg2g_config::logging::{self, LogLevelHandle, LogOutput};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "xg2g-config failed");
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let level = if cli.verbose { "debug" } else { "info" };
    let handle = logging::init(&LogOutput::parse(&cli.log), level)?;
    // --verbose pins debug; otherwise the configured logLevel takes over
    let log = if cli.verbose { LogLevelHandle::default() } else { handle };

    let loader = ConfigLoader::new(cli.config.clone(), VERSION);
    match cli.command {
        Command::Check { yaml } => check(loader, yaml, &log).await,
        Command::Watch => watch(loader, &log).await,
        Command::Defaults(args) => {
            print!("{}", args.render(&DefaultRegistry::standard()));
            Ok(())
        }
    }
}

async fn check(loader: ConfigLoader, yaml: bool, log: &LogLevelHandle) -> Result<()> {
    let cfg = loader.load().await.context("load configuration")?;
    log.set_level(&cfg.log_level)?;
    if yaml {
        let file = FileConfig::from_resolved(&cfg);
        let masked: serde_yaml::Value = serde_json::from_value(mask_secrets(&file))
            .context("render masked configuration")?;
        print!("{}", serde_yaml::to_string(&masked)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&mask_secrets(&cfg))?);
    }
    Ok(())
}

async fn watch(loader: ConfigLoader, log: &LogLevelHandle) -> Result<()> {
    let holder = Arc::new(ConfigHolder::new(loader).await.context("load configuration")?);
    log.set_level(&holder.get().log_level)?;
    info!(epoch = holder.epoch(), "configuration loaded; watching for changes");

    let (tx, mut rx) = mpsc::channel(8);
    holder.register_snapshot_listener(tx);
    holder.start_watcher().context("start config watcher")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(snapshot) = rx.recv() => {
                if let Err(e) = log.set_level(&snapshot.config.log_level) {
                    warn!(error = %e, "log level not updated");
                }
                info!(epoch = snapshot.epoch, "new configuration published");
            }
        }
    }

    holder.stop().await;
    Ok(())
}
