//! # Source Mirror CLI (`smr`)
//!
//! The `smr` binary drives the synchronization engine. It reads a TOML
//! configuration describing sources (documents, vcs, web), mirrors them
//! into the local content store, and reconciles the store against each
//! source's manifest.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `smr sync <source\|kind\|all>` | Mirror sources and garbage-collect orphans |
//! | `smr fetch <source> <target>...` | Download named targets directly (debugging) |
//! | `smr sources` | List configured sources and their health |
//! | `smr status` | Show each source's manifest summary |
//!
//! ## Exit status
//!
//! `sync` exits 0 on full success, 1 on partial success (some sources or
//! nodes failed), and 2 when every source failed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use source_mirror::{config, orchestrate};

/// Source Mirror — mirrors documents, git repositories, and web pages
/// into a local content store with idempotent re-sync.
#[derive(Parser)]
#[command(
    name = "smr",
    about = "Mirror knowledge sources into a local content store",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/mirror.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync sources and reconcile the content store.
    ///
    /// Selector is `all`, a source kind (`documents`, `vcs`, `web`), or a
    /// source name. Orphaned files — present after the previous sync but
    /// absent upstream now — are deleted along with emptied directories.
    Sync {
        /// Source selector: `all`, a kind, or a name.
        #[arg(default_value = "all")]
        selector: String,
    },

    /// Download named targets from one source, without reconciliation.
    ///
    /// Useful for debugging a single document or page. Existing files are
    /// overwritten; the source's manifest is not touched.
    Fetch {
        /// Source name.
        source: String,

        /// Document identifiers or URLs to download.
        #[arg(required = true)]
        targets: Vec<String>,

        /// Link-following depth (0 = targets only).
        #[arg(long, default_value_t = 0)]
        depth: u32,

        /// Export format override (documents sources only).
        #[arg(long)]
        format: Option<String>,
    },

    /// List configured sources and their health.
    Sources,

    /// Show per-source manifest summaries.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync { selector } => {
            let report = orchestrate::run_sync(&cfg, &selector).await?;
            orchestrate::print_report(&report);
            std::process::exit(orchestrate::exit_code(&report));
        }
        Commands::Fetch {
            source,
            targets,
            depth,
            format,
        } => {
            orchestrate::run_fetch(&cfg, &source, &targets, depth, format.as_deref()).await?;
        }
        Commands::Sources => {
            orchestrate::list_sources(&cfg)?;
        }
        Commands::Status => {
            orchestrate::show_status(&cfg)?;
        }
    }

    Ok(())
}
