//! cfpq CLI - Command line interface for regular and context-free path queries

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{cfpq, completions, config as config_cmd, rpq};
use config::Config;
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "cfpq")]
#[command(author, version, about = "Regular and context-free path queries over labeled graphs")]
pub struct Cli {
    /// Output format: table, json, csv (default from config)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Output format from the flag, falling back to the config file
    pub fn output_format(&self, config: &Config) -> OutputFormat {
        OutputFormat::from(self.format.as_deref().unwrap_or(config.output_format.as_str()))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Regular path query
    Rpq(rpq::RpqArgs),
    /// Context-free path query
    Cfpq(cfpq::CfpqArgs),
    /// Manage CLI configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting cfpq CLI");

    match &cli.command {
        Commands::Rpq(args) => rpq::run(args, &cli)?,
        Commands::Cfpq(args) => cfpq::run(args, &cli)?,
        Commands::Config(args) => config_cmd::run(args, &cli)?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
