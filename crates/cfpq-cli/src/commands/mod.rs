//! CLI command implementations

pub mod cfpq;
pub mod completions;
pub mod config;
pub mod rpq;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use cfpq_core::{Algorithm, Backend, LabeledGraph, PathQuery, QueryEngine, QueryLimits};
use clap::Args;

use crate::config::Config;
use crate::output::{format_pairs, format_per_source, summary, OutputFormat};

/// Arguments shared by the query commands
#[derive(Args)]
pub struct QueryArgs {
    /// Graph file: `.json` ({nodes, edges}) or an edge list of `src label dst` lines
    #[arg(short, long)]
    pub graph: PathBuf,

    /// Start node (repeatable; default: every node)
    #[arg(long = "from", value_name = "NODE")]
    pub from: Vec<String>,

    /// Final node (repeatable; default: every node)
    #[arg(long = "to", value_name = "NODE")]
    pub to: Vec<String>,

    /// Algorithm: tensor, bfs, hellings, matrix, gll (default from config)
    #[arg(short, long)]
    pub algorithm: Option<String>,

    /// Matrix backend: sparse, dense (default from config)
    #[arg(long)]
    pub backend: Option<String>,

    /// Iteration cap (default from config)
    #[arg(long)]
    pub max_iterations: Option<u64>,

    /// Time budget in milliseconds (default from config)
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Group reachable nodes by start node
    #[arg(long)]
    pub per_source: bool,
}

impl QueryArgs {
    pub fn algorithm(&self, config: &Config) -> anyhow::Result<Algorithm> {
        match &self.algorithm {
            Some(name) => Ok(name.parse()?),
            None => config.algorithm(),
        }
    }

    /// Apply node selection, algorithm, backend and limits to a query
    pub fn configure(&self, query: PathQuery<String>, config: &Config) -> anyhow::Result<PathQuery<String>> {
        let backend: Backend = self.backend.as_deref().unwrap_or(config.backend.as_str()).parse()?;

        let mut limits = QueryLimits::new();
        if let Some(max) = self.max_iterations.or(config.max_iterations) {
            limits = limits.with_max_iterations(max);
        }
        if let Some(ms) = self.timeout_ms.or(config.timeout_ms) {
            limits = limits.with_timeout(Duration::from_millis(ms));
        }

        let mut query = query
            .with_algorithm(self.algorithm(config)?)
            .with_backend(backend)
            .with_limits(limits);
        if !self.from.is_empty() {
            query = query.from_nodes(self.from.iter().cloned());
        }
        if !self.to.is_empty() {
            query = query.to_nodes(self.to.iter().cloned());
        }
        Ok(query)
    }
}

/// Load a graph, choosing the format by extension
pub fn load_graph(path: &Path) -> anyhow::Result<LabeledGraph<String>> {
    let graph = LabeledGraph::load(path).with_context(|| format!("failed to load graph {}", path.display()))?;
    tracing::info!(
        "Loaded graph {}: {} nodes, {} edges",
        path.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Run a configured query and print the answer
pub fn execute_and_print(
    query: &PathQuery<String>,
    graph: &LabeledGraph<String>,
    per_source: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    if per_source {
        let grouped = QueryEngine::execute_per_source(query, graph)?;
        print!("{}", format_per_source(&sorted_groups(grouped), format));
        return Ok(());
    }

    let result = QueryEngine::execute(query, graph)?;
    let pairs: BTreeSet<(String, String)> = result.pairs.into_iter().collect();
    print!("{}", format_pairs(&pairs, result.algorithm, &result.stats, format));
    if !quiet && format == OutputFormat::Table {
        eprintln!("{}", summary(pairs.len(), result.algorithm, &result.stats));
    }
    Ok(())
}

fn sorted_groups(grouped: HashMap<String, HashSet<String>>) -> BTreeMap<String, BTreeSet<String>> {
    grouped
        .into_iter()
        .map(|(src, targets)| (src, targets.into_iter().collect()))
        .collect()
}
