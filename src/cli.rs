//! CLI commands and argument parsing.
//!
//! Out of scope for the vault core itself (spec §1): this binary exists
//! only to exercise the library end-to-end, so unlike the rest of the
//! crate it returns `anyhow::Result` rather than `VaultError`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use sietch::config::VaultConfig;
use sietch::pipeline;
use sietch::txn;
use sietch::vault::Vault;

/// sietch - a local content-addressed vault.
#[derive(Parser)]
#[command(name = "sietch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chunk, compress, encrypt, and deduplicate files into a local vault.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new vault at the given root.
    Init {
        /// Vault root directory (created if missing).
        #[arg(short, long)]
        root: PathBuf,

        /// Passphrase protecting the vault's encryption key, if any.
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Ingest a file into an existing vault.
    Ingest {
        /// Vault root directory.
        #[arg(short, long)]
        root: PathBuf,

        /// File to ingest.
        #[arg(short, long)]
        input: PathBuf,

        /// Passphrase, required if the vault is passphrase-protected.
        #[arg(short, long)]
        passphrase: Option<String>,
    },

    /// Scan `<root>/.txn` and resolve any in-flight transactions.
    Recover {
        /// Vault root directory.
        #[arg(short, long)]
        root: PathBuf,

        /// Purge terminal journals older than this many seconds (0 disables purging).
        #[arg(long, default_value_t = 0)]
        retention_secs: u64,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { root, passphrase } => init_vault(&root, passphrase),
        Commands::Ingest { root, input, passphrase } => ingest_file(&root, &input, passphrase),
        Commands::Recover { root, retention_secs } => recover_vault(&root, retention_secs),
    }
}

fn init_vault(root: &std::path::Path, passphrase: Option<String>) -> Result<()> {
    let config = VaultConfig::default();
    Vault::init(root, config, passphrase.as_deref()).with_context(|| format!("failed to initialize vault at {}", root.display()))?;
    println!("initialized vault at {}", root.display());
    Ok(())
}

fn ingest_file(root: &std::path::Path, input: &std::path::Path, passphrase: Option<String>) -> Result<()> {
    let vault = Vault::open(root, passphrase.as_deref()).with_context(|| format!("failed to open vault at {}", root.display()))?;
    let (refs, stats) =
        pipeline::ingest(&vault, input, passphrase.as_deref()).with_context(|| format!("ingest failed for {}", input.display()))?;

    println!(
        "ingested {} ({} chunks, {} bytes)",
        input.display(),
        stats.total_chunks,
        stats.total_bytes
    );
    for chunk_ref in &refs {
        println!("  [{}] {} ({} bytes)", chunk_ref.index, chunk_ref.plaintext_hash, chunk_ref.size);
    }
    Ok(())
}

fn recover_vault(root: &std::path::Path, retention_secs: u64) -> Result<()> {
    let summary = txn::recover(root, retention_secs).with_context(|| format!("recovery failed at {}", root.display()))?;
    println!(
        "recovery complete: {} purged, {} resumed commits, {} rolled back, {} errors",
        summary.purged,
        summary.resumed_commits,
        summary.rolled_back,
        summary.errors.len()
    );
    for error in &summary.errors {
        eprintln!("  warning: {error}");
    }
    Ok(())
}
