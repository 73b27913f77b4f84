//! Config command for managing CLI configuration

use clap::{Args, Subcommand};

use crate::config::{config_file_path, Config};
use crate::output::{format_json, OutputFormat};
use crate::Cli;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Get a config value
    Get {
        /// Config key name
        key: String,
    },
    /// Set a config value (`none` clears a limit)
    Set {
        /// Config key name
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
    /// Write the default config file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

pub fn run(args: &ConfigArgs, cli: &Cli) -> anyhow::Result<()> {
    match &args.command {
        ConfigCommands::Get { key } => {
            let config = Config::load();
            let Some(value) = config.get(key) else {
                anyhow::bail!(
                    "Unknown config key: {}. Available keys: {}",
                    key,
                    Config::keys().join(", ")
                );
            };
            println!("{}", value);
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, value)?;
            config.save()?;
            if !cli.quiet {
                println!("Set {} = {}", key, config.get(key).unwrap_or_default());
            }
        }
        ConfigCommands::List => list(cli)?,
        ConfigCommands::Path => println!("{}", config_file_path().display()),
        ConfigCommands::Init { force } => {
            let path = config_file_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Created config file at {}", path.display());
        }
    }
    Ok(())
}

fn list(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load();
    match cli.output_format(&config) {
        OutputFormat::Json => println!("{}", format_json(&config)),
        OutputFormat::Csv => {
            println!("key,value");
            for key in Config::keys() {
                println!("{},{}", key, config.get(key).unwrap_or_default());
            }
        }
        OutputFormat::Table => {
            println!("Config file: {}", config_file_path().display());
            println!();
            for key in Config::keys() {
                println!("{} = {}", key, config.get(key).unwrap_or_default());
            }
        }
    }
    Ok(())
}
