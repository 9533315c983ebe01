//! Daemon runtime: syncer instantiation, pid file, and signal handling.

use std::path::Path;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;

use anysyncd_core::DaemonConfig;

use crate::error::{io_err, DaemonError};
use crate::logging::ReopenableLog;
use crate::syncer;

/// Build a runtime and run the daemon until a shutdown signal arrives.
///
/// Called after daemonization: the fork must happen before any tokio
/// runtime exists.
pub fn start_blocking(
    config: DaemonConfig,
    log: Option<ReopenableLog>,
    foreground: bool,
) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config, log, foreground))
}

/// Run the daemon.
pub async fn run(
    config: DaemonConfig,
    log: Option<ReopenableLog>,
    foreground: bool,
) -> Result<(), DaemonError> {
    // Inability to create the state directory is fatal to the daemon.
    std::fs::create_dir_all(&config.statedir).map_err(|e| io_err(&config.statedir, e))?;
    write_pid_file(&config.pid_file())?;

    for rejected in &config.rejected {
        tracing::error!(
            section = %rejected.section,
            reason = %rejected.reason,
            "skipping invalid syncer section"
        );
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    let mut handles = Vec::new();
    for cfg in config.syncers.clone() {
        let name = cfg.name.clone();
        match syncer::spawn(cfg, &config, shutdown_tx.subscribe()) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                tracing::error!(syncer = %name, error = %err, "skipping syncer");
            }
        }
    }
    if handles.is_empty() {
        tracing::warn!("no valid syncers configured; daemon is idle");
    }

    let mut sigterm = signal(SignalKind::terminate()).map_err(DaemonError::Signal)?;
    let mut sigint = signal(SignalKind::interrupt()).map_err(DaemonError::Signal)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(DaemonError::Signal)?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            _ = sighup.recv() => {
                if foreground {
                    tracing::info!("received SIGHUP in foreground mode, shutting down");
                    break;
                }
                match &log {
                    Some(log) => match log.reopen() {
                        Ok(()) => tracing::info!(path = %log.path().display(), "log file reopened"),
                        Err(err) => tracing::warn!(error = %err, "log reopen failed"),
                    },
                    None => tracing::info!("received SIGHUP, no log file to reopen"),
                }
            }
        }
    }

    let _ = shutdown_tx.send(());
    for handle in handles {
        handle.join().await;
    }

    remove_pid_file(&config.pid_file());
    tracing::info!("anysyncd shutdown complete");
    Ok(())
}

fn write_pid_file(path: &Path) -> Result<(), DaemonError> {
    std::fs::write(path, format!("{}\n", std::process::id())).map_err(|e| io_err(path, e))
}

fn remove_pid_file(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %err, "pid file not removed");
        }
    }
}
