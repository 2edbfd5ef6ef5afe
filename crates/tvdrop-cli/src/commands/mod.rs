//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use tvdrop_core::config::parse_duration;

pub mod config;
pub mod serve;

/// Load configuration with graceful fallback to defaults.
///
/// A missing file yields the defaults. A file that exists but cannot be
/// parsed is reported and then ignored so the server still starts.
pub fn load_config() -> tvdrop_core::config::Config {
    tvdrop_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        tvdrop_core::config::Config::default()
    })
}

/// TvDrop - share a directory with devices on the local network
#[derive(Parser)]
#[command(name = "tvdrop")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Start the transfer server
    Serve(ServeArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory to share; nothing outside it is reachable
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Only accept connections from this machine
    #[arg(long)]
    pub localhost_only: bool,

    /// Quiet period after which an unconfirmed upload is treated as finished (0s disables)
    #[arg(long, value_parser = parse_duration)]
    pub grace_window: Option<Duration>,

    /// Quiet period after which an upload is abandoned
    #[arg(long, value_parser = parse_duration)]
    pub abandon_timeout: Option<Duration>,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output notifications as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config action
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config actions
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Write the default configuration
    Reset,
}
