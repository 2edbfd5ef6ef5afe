//! TvDrop CLI - share a directory with devices on the local network
//!
//! Starts an HTTP server that lets any browser on the LAN browse, download
//! and upload files inside one root directory.
//!
//! ## Quick Start
//!
//! ```bash
//! # Share the home directory on port 8080
//! tvdrop serve
//!
//! # Share a specific directory on another port
//! tvdrop serve --root ~/Movies --port 9000
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;
pub mod ui;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,tvdrop=info,tvdrop_core=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
