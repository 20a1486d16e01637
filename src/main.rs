//! sietch - a local content-addressed vault.
//!
//! Thin CLI wrapper: argument parsing and the user-facing summary printing
//! belong here; every behavior they exercise lives in the `sietch` library.

mod allocator;
mod cli;

use std::process;

use clap::Parser;
use cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli::run(cli) {
        eprintln!("Error: {e:?}");
        process::exit(1);
    }
}
