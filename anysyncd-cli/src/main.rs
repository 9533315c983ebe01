//! anysyncd — consistent-snapshot filesystem replication daemon.
//!
//! # Usage
//!
//! ```text
//! anysyncd [-c /etc/anysyncd/anysyncd.conf] start [--foreground]
//! anysyncd stop | status | restart | reload
//! ```
//!
//! Exit codes follow init-script conventions: 0 on success, 3 from `status`
//! when the daemon is not running.

mod control;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daemonize::Daemonize;

use anysyncd_core::config::DEFAULT_CONFIG_PATH;
use anysyncd_core::DaemonConfig;
use anysyncd_daemon::{logging, runtime};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "anysyncd",
    version,
    about = "Replicate consistent directory snapshots to peer hosts",
    long_about = None,
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the daemon (detaches unless --foreground).
    Start {
        /// Stay attached to the terminal and log to stdout.
        #[arg(long)]
        foreground: bool,
    },
    /// Send SIGTERM to the running daemon and wait for it to exit.
    Stop,
    /// Report whether the daemon is running.
    Status,
    /// Stop the daemon, then start it again detached.
    Restart,
    /// Send SIGHUP (log reopen in daemon mode).
    Reload,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Start { foreground } => run_start(&cli.config, foreground).map(|()| 0),
        Commands::Stop => run_stop(&cli.config).map(|()| 0),
        Commands::Status => run_status(&cli.config),
        Commands::Restart => run_restart(&cli.config).map(|()| 0),
        Commands::Reload => run_reload(&cli.config).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("anysyncd: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn run_start(config_path: &Path, foreground: bool) -> Result<()> {
    let config = DaemonConfig::load_at(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    std::fs::create_dir_all(&config.statedir)
        .with_context(|| format!("failed to create state directory {}", config.statedir.display()))?;

    if foreground {
        logging::init(&config.loglevel, None).context("logging setup failed")?;
        runtime::start_blocking(config, None, true).context("daemon exited with error")?;
        return Ok(());
    }

    let logfile = config
        .logfile
        .clone()
        .unwrap_or_else(|| config.statedir.join("anysyncd.log"));

    // Detach before any tokio runtime or logging thread exists.
    Daemonize::new()
        .working_directory("/")
        .start()
        .context("failed to daemonize")?;

    let log = logging::init(&config.loglevel, Some(&logfile)).context("logging setup failed")?;
    runtime::start_blocking(config, log, false).context("daemon exited with error")
}

fn run_stop(config_path: &Path) -> Result<()> {
    let config = DaemonConfig::load_at(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    match control::stop(&config.pid_file())? {
        control::StopOutcome::Stopped => println!("anysyncd stopped"),
        control::StopOutcome::NotRunning => println!("anysyncd is not running"),
    }
    Ok(())
}

fn run_status(config_path: &Path) -> Result<u8> {
    let config = DaemonConfig::load_at(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    match control::status(&config.pid_file()) {
        control::StatusOutcome::Running(pid) => {
            println!("anysyncd is running (pid {pid})");
            Ok(0)
        }
        control::StatusOutcome::DeadWithPidFile(pid) => {
            println!("anysyncd is dead but pid file exists (pid {pid})");
            Ok(1)
        }
        control::StatusOutcome::NotRunning => {
            println!("anysyncd is not running");
            Ok(3)
        }
    }
}

fn run_restart(config_path: &Path) -> Result<()> {
    let config = DaemonConfig::load_at(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    control::stop(&config.pid_file())?;
    run_start(config_path, false)
}

fn run_reload(config_path: &Path) -> Result<()> {
    let config = DaemonConfig::load_at(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    control::reload(&config.pid_file())?;
    println!("anysyncd reload requested");
    Ok(())
}
