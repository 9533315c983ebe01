//! anysyncd-helper — peer-side operations invoked over the remote shell.
//!
//! # Usage
//!
//! ```text
//! anysyncd-helper [-c /etc/anysyncd/anysyncd.conf] stamps <syncer>
//! anysyncd-helper [-c /etc/anysyncd/anysyncd.conf] commit <syncer>
//! ```
//!
//! `stamps` prints `"<success>:<lastchange>"` to stdout and exits 0;
//! missing stamp files yield empty fields. `commit` swaps the staged tree
//! into the live tree; errors go to stderr with a non-zero exit.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use anysyncd_core::config::DEFAULT_CONFIG_PATH;
use anysyncd_core::types::{Handler, SyncerName};
use anysyncd_core::DaemonConfig;
use anysyncd_sync::{commit, MirrorRunner};

#[derive(Parser, Debug)]
#[command(
    name = "anysyncd-helper",
    version,
    about = "Peer-side stamps and commit operations for anysyncd",
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
    /// Print the syncer's success and lastchange stamps.
    Stamps { syncer: String },
    /// Atomically swap the staged tree into the live tree.
    Commit { syncer: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("anysyncd-helper: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = DaemonConfig::load_at(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Stamps { syncer } => {
            let line = commit::stamps_line(&config.statedir, &SyncerName::from(syncer))?;
            println!("{line}");
            Ok(())
        }
        Commands::Commit { syncer } => {
            let Some(cfg) = config.syncer(&syncer) else {
                bail!("unknown syncer '{syncer}'");
            };
            let Handler::Csync2 {
                prod_dir,
                csync_dir,
                ..
            } = &cfg.handler
            else {
                bail!("syncer '{syncer}' has no commit phase");
            };
            let mirror = MirrorRunner::new(&config.rsync_command);
            commit::commit_swap(&mirror, prod_dir, csync_dir)
                .await
                .with_context(|| format!("commit failed for '{syncer}'"))
        }
    }
}
