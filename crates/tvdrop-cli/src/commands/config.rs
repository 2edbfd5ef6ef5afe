//! Config command implementation.

use anyhow::{Context, Result};

use tvdrop_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = Config::load()?;
            println!("# {}", Config::config_path().display());
            print!("{}", render(&config)?);
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            Config::default().save()?;
            println!(
                "Configuration reset to defaults ({}).",
                Config::config_path().display()
            );
        }
    }

    Ok(())
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}
