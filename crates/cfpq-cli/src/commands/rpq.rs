//! Regular path query command

use clap::Args;
use cfpq_core::PathQuery;

use super::{execute_and_print, load_graph, QueryArgs};
use crate::config::Config;
use crate::Cli;

#[derive(Args)]
pub struct RpqArgs {
    /// Regular expression over edge labels, e.g. `a (b | c)* d`
    #[arg(short, long)]
    pub regex: String,

    #[command(flatten)]
    pub query: QueryArgs,
}

pub fn run(args: &RpqArgs, cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let graph = load_graph(&args.query.graph)?;
    let query = args.query.configure(PathQuery::regex(args.regex.as_str()), &config)?;

    execute_and_print(
        &query,
        &graph,
        args.query.per_source,
        cli.output_format(&config),
        cli.quiet,
    )
}
