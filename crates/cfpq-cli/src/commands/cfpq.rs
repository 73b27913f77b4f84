//! Context-free path query command

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use cfpq_core::{Cfg, PathQuery, Rsm};

use super::{execute_and_print, load_graph, QueryArgs};
use crate::config::Config;
use crate::Cli;

#[derive(Args)]
pub struct CfpqArgs {
    /// Grammar file with `A -> body | body` rules (`$` is the empty word)
    #[arg(long, required_unless_present = "ecfg", conflicts_with = "ecfg")]
    pub grammar: Option<PathBuf>,

    /// Extended grammar file with regular rule bodies, evaluated as an RSM
    #[arg(long)]
    pub ecfg: Option<PathBuf>,

    /// Override the start symbol (default: head of the first rule)
    #[arg(short, long)]
    pub start_symbol: Option<String>,

    #[command(flatten)]
    pub query: QueryArgs,
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn run(args: &CfpqArgs, cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let graph = load_graph(&args.query.graph)?;

    let base = match (&args.grammar, &args.ecfg) {
        (Some(path), _) => {
            let mut cfg = Cfg::parse(&read(path)?)?;
            if let Some(start) = &args.start_symbol {
                cfg = cfg.with_start(start.as_str());
            }
            PathQuery::grammar(cfg)
        }
        (None, Some(path)) => {
            let mut rsm = Rsm::parse_ecfg(&read(path)?)?;
            if let Some(start) = &args.start_symbol {
                rsm = rsm.with_start(start.as_str());
            }
            PathQuery::rsm(rsm)
        }
        (None, None) => anyhow::bail!("one of --grammar or --ecfg is required"),
    };
    let query = args.query.configure(base, &config)?;

    execute_and_print(
        &query,
        &graph,
        args.query.per_source,
        cli.output_format(&config),
        cli.quiet,
    )
}
