//! Serve command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};

use tvdrop_core::config::Config;
use tvdrop_core::network;
use tvdrop_core::web::TransferServer;

use super::ServeArgs;
use crate::ui::{ConsoleReporter, OutputMode};

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config();
    apply_overrides(&mut config, &args);
    config.validate()?;

    let mode = if args.json {
        OutputMode::Json
    } else if args.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Text
    };

    let server = TransferServer::new(&config, Arc::new(ConsoleReporter::new(mode)))
        .with_context(|| format!("Cannot share {}", config.storage.root.display()))?;

    if mode == OutputMode::Text {
        println!();
        println!("TvDrop v{}", tvdrop_core::VERSION);
        println!("{}", "─".repeat(40));
        println!();
        println!("  Device:  {}", network::device_name());
        println!(
            "  Sharing: {}",
            server.navigator().sandbox().root().display()
        );
        println!();
    }

    let addr = server.start().await?;

    if mode == OutputMode::Text {
        if server.url().await.is_none() && !config.server.localhost_only {
            println!("  No LAN address found; listening on {}", addr);
            println!();
        }
        println!("Press Ctrl+C to stop the server.");
        println!();
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    if mode == OutputMode::Text {
        println!();
    }
    server.stop().await?;

    Ok(())
}

/// Apply command line flags on top of the loaded configuration.
fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root) = &args.root {
        config.storage.root.clone_from(root);
        // A start directory from the config file belongs to the old root.
        config.storage.start_dir = None;
    }
    if args.localhost_only {
        config.server.localhost_only = true;
    }
    if let Some(grace) = args.grace_window {
        config.upload.grace_window = grace;
    }
    if let Some(abandon) = args.abandon_timeout {
        config.upload.abandon_timeout = abandon;
    }
}
