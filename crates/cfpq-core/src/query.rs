//! Path query builder and execution engine

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cfpq::{CfpqSolver, GllSolver, HellingsSolver, MatrixSolver, TensorSolver};
use crate::error::{Error, Result};
use crate::grammar::Cfg;
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::{CancellationToken, QueryContext, QueryLimits};
use crate::matrix::{BoolMatrix, DenseBoolMatrix, SparseBoolMatrix};
use crate::regex::{compile_regex, Regex};
use crate::rpq::{PairSet, RpqSolver};
use crate::rsm::Rsm;

/// Evaluation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Kronecker product and closure (RPQ) or RSM summaries (CFPQ)
    #[default]
    Tensor,
    /// Product-space breadth-first search, regular queries only
    Bfs,
    /// Worklist over reachability triples
    Hellings,
    /// Per-variable matrix products
    Matrix,
    /// Generalized LL over a graph-structured stack
    Gll,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Tensor,
        Algorithm::Bfs,
        Algorithm::Hellings,
        Algorithm::Matrix,
        Algorithm::Gll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Tensor => "tensor",
            Algorithm::Bfs => "bfs",
            Algorithm::Hellings => "hellings",
            Algorithm::Matrix => "matrix",
            Algorithm::Gll => "gll",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown algorithm: {}", s)))
    }
}

/// Boolean matrix backend used by the matrix-based algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sparse,
    Dense,
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sparse" => Ok(Backend::Sparse),
            "dense" => Ok(Backend::Dense),
            other => Err(Error::Validation(format!("unknown backend: {}", other))),
        }
    }
}

/// Language a path's label word must belong to
#[derive(Debug, Clone)]
pub enum QueryLanguage {
    /// Regular expression text
    Regex(String),
    Grammar(Cfg),
    Rsm(Rsm),
}

impl QueryLanguage {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryLanguage::Regex(_) => "regex",
            QueryLanguage::Grammar(_) => "grammar",
            QueryLanguage::Rsm(_) => "rsm",
        }
    }

    /// Grammar form. Regexes and RSMs become one variable per automaton state.
    pub fn to_cfg(&self) -> Result<Cfg> {
        match self {
            QueryLanguage::Regex(text) => Ok(Rsm::from_regex(&Regex::parse(text)?).to_cfg()),
            QueryLanguage::Grammar(cfg) => Ok(cfg.clone()),
            QueryLanguage::Rsm(rsm) => {
                rsm.validate()?;
                Ok(rsm.to_cfg())
            }
        }
    }

    /// Recursive state machine form
    pub fn to_rsm(&self) -> Result<Rsm> {
        match self {
            QueryLanguage::Regex(text) => Ok(Rsm::from_regex(&Regex::parse(text)?)),
            QueryLanguage::Grammar(cfg) => Ok(Rsm::from_cfg(cfg)),
            QueryLanguage::Rsm(rsm) => Ok(rsm.clone()),
        }
    }
}

/// Path query builder
#[derive(Debug, Clone)]
pub struct PathQuery<N> {
    pub language: QueryLanguage,

    /// Start nodes (None = all nodes)
    pub start_nodes: Option<HashSet<N>>,

    /// Final nodes (None = all nodes)
    pub final_nodes: Option<HashSet<N>>,

    pub algorithm: Algorithm,

    pub backend: Backend,

    pub limits: QueryLimits,

    pub cancellation: Option<CancellationToken>,
}

impl<N: NodeId> PathQuery<N> {
    pub fn new(language: QueryLanguage) -> Self {
        Self {
            language,
            start_nodes: None,
            final_nodes: None,
            algorithm: Algorithm::default(),
            backend: Backend::default(),
            limits: QueryLimits::default(),
            cancellation: None,
        }
    }

    /// Regular path query
    pub fn regex(regex: impl Into<String>) -> Self {
        Self::new(QueryLanguage::Regex(regex.into()))
    }

    /// Context-free path query
    pub fn grammar(cfg: Cfg) -> Self {
        Self::new(QueryLanguage::Grammar(cfg))
    }

    /// Context-free path query given as a recursive state machine
    pub fn rsm(rsm: Rsm) -> Self {
        Self::new(QueryLanguage::Rsm(rsm))
    }

    /// Restrict path sources
    pub fn from_nodes(mut self, nodes: impl IntoIterator<Item = N>) -> Self {
        self.start_nodes = Some(nodes.into_iter().collect());
        self
    }

    /// Restrict path targets
    pub fn to_nodes(mut self, nodes: impl IntoIterator<Item = N>) -> Self {
        self.final_nodes = Some(nodes.into_iter().collect());
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Result of a path query
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult<N: NodeId> {
    pub pairs: PairSet<N>,
    pub algorithm: Algorithm,
    pub stats: QueryStats,
}

/// Execution statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryStats {
    /// Budget units consumed (fixpoint rounds and worklist items)
    pub iterations: u64,
    pub pairs_found: usize,
    pub elapsed_ms: u64,
}

/// Path query engine
pub struct QueryEngine;

impl QueryEngine {
    /// Execute a path query against a graph
    pub fn execute<N: NodeId>(query: &PathQuery<N>, graph: &LabeledGraph<N>) -> Result<QueryResult<N>> {
        query.limits.validate()?;
        // Unknown nodes fail before any work
        graph.index().mask(query.start_nodes.as_ref())?;
        graph.index().mask(query.final_nodes.as_ref())?;

        tracing::debug!(
            "Executing path query: language={}, algorithm={}, backend={:?}, nodes={}, edges={}",
            query.language.kind(),
            query.algorithm,
            query.backend,
            graph.node_count(),
            graph.edge_count()
        );

        let mut ctx = QueryContext::new(query.limits.clone());
        if let Some(token) = &query.cancellation {
            ctx = ctx.with_cancellation(token.clone());
        }

        let pairs = match query.backend {
            Backend::Sparse => Self::run::<SparseBoolMatrix, N>(query, graph, &mut ctx)?,
            Backend::Dense => Self::run::<DenseBoolMatrix, N>(query, graph, &mut ctx)?,
        };

        let stats = QueryStats {
            iterations: ctx.iterations(),
            pairs_found: pairs.len(),
            elapsed_ms: ctx.elapsed().as_millis() as u64,
        };
        tracing::debug!(
            "Path query finished: {} pairs, {} iterations, {}ms",
            stats.pairs_found,
            stats.iterations,
            stats.elapsed_ms
        );

        Ok(QueryResult {
            pairs,
            algorithm: query.algorithm,
            stats,
        })
    }

    /// Execute a query and group the answer by start node.
    ///
    /// Every selected start node is a key, possibly with an empty set.
    pub fn execute_per_source<N: NodeId>(
        query: &PathQuery<N>,
        graph: &LabeledGraph<N>,
    ) -> Result<HashMap<N, HashSet<N>>> {
        let result = Self::execute(query, graph)?;
        let start_mask = graph.index().mask(query.start_nodes.as_ref())?;

        let mut grouped: HashMap<N, HashSet<N>> = graph
            .nodes()
            .iter()
            .zip(&start_mask)
            .filter_map(|(node, &selected)| selected.then(|| (node.clone(), HashSet::new())))
            .collect();
        for (src, dst) in result.pairs {
            grouped.entry(src).or_default().insert(dst);
        }
        Ok(grouped)
    }

    fn run<M: BoolMatrix, N: NodeId>(
        query: &PathQuery<N>,
        graph: &LabeledGraph<N>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let start = query.start_nodes.as_ref();
        let finals = query.final_nodes.as_ref();

        match (query.algorithm, &query.language) {
            (Algorithm::Bfs, QueryLanguage::Regex(text)) => {
                RpqSolver::new(graph).bfs(&compile_regex(text)?, start, finals, ctx)
            }
            (Algorithm::Bfs, language) => Err(Error::Unsupported(format!(
                "bfs evaluates regular queries only, got a {} query",
                language.kind()
            ))),
            (Algorithm::Tensor, QueryLanguage::Regex(text)) => {
                RpqSolver::new(graph).solve_with::<M>(&compile_regex(text)?, start, finals, ctx)
            }
            (Algorithm::Tensor, language) => {
                TensorSolver::<M>::new().solve_rsm(graph, &language.to_rsm()?, start, finals, ctx)
            }
            (Algorithm::Hellings, language) => {
                HellingsSolver::new().solve(graph, &language.to_cfg()?, start, finals, ctx)
            }
            (Algorithm::Matrix, language) => {
                MatrixSolver::<M>::new().solve(graph, &language.to_cfg()?, start, finals, ctx)
            }
            (Algorithm::Gll, language) => GllSolver::new().solve_rsm(graph, &language.to_rsm()?, start, finals, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::Nfa;

    fn pairs(p: &[(&str, &str)]) -> PairSet<String> {
        p.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
    }

    fn chain() -> LabeledGraph<String> {
        LabeledGraph::parse_edge_list("x a y\ny b z\nz a x").unwrap()
    }

    #[test]
    fn test_regex_with_every_algorithm() {
        let graph = chain();
        let expected = pairs(&[("x", "z")]);
        for algorithm in Algorithm::ALL {
            for backend in [Backend::Sparse, Backend::Dense] {
                let query = PathQuery::regex("a b")
                    .with_algorithm(algorithm)
                    .with_backend(backend);
                let result = QueryEngine::execute(&query, &graph).unwrap();
                assert_eq!(result.pairs, expected, "{} / {:?}", algorithm, backend);
                assert_eq!(result.algorithm, algorithm);
                assert_eq!(result.stats.pairs_found, 1);
            }
        }
    }

    #[test]
    fn test_grammar_and_rsm_agree() {
        let graph = LabeledGraph::parse_edge_list("0 a 1\n1 a 2\n2 b 3\n3 b 4").unwrap();
        let cfg = Cfg::parse("S -> a S b | a b").unwrap();
        let rsm = Rsm::parse_ecfg("S -> a S b | a b").unwrap();
        let expected = pairs(&[("1", "3"), ("0", "4")]);

        for algorithm in [Algorithm::Tensor, Algorithm::Hellings, Algorithm::Matrix, Algorithm::Gll] {
            let by_grammar = QueryEngine::execute(&PathQuery::grammar(cfg.clone()).with_algorithm(algorithm), &graph)
                .unwrap();
            let by_rsm = QueryEngine::execute(&PathQuery::rsm(rsm.clone()).with_algorithm(algorithm), &graph).unwrap();
            assert_eq!(by_grammar.pairs, expected, "{}", algorithm);
            assert_eq!(by_rsm.pairs, expected, "{}", algorithm);
        }
    }

    #[test]
    fn test_malformed_rsm_is_an_error_for_every_algorithm() {
        let graph = chain();
        let rsm = Rsm::new("S").with_box("S", Nfa::new(1).with_start(3).with_final(0));
        for algorithm in [Algorithm::Tensor, Algorithm::Hellings, Algorithm::Matrix, Algorithm::Gll] {
            let query = PathQuery::rsm(rsm.clone()).with_algorithm(algorithm);
            assert!(
                matches!(QueryEngine::execute(&query, &graph), Err(Error::Validation(_))),
                "{}",
                algorithm
            );
        }
    }

    #[test]
    fn test_bfs_rejects_grammar() {
        let graph = chain();
        let query = PathQuery::grammar(Cfg::parse("S -> a").unwrap()).with_algorithm(Algorithm::Bfs);
        assert!(matches!(
            QueryEngine::execute(&query, &graph),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_unknown_node_fails_fast() {
        let graph = chain();
        let query = PathQuery::regex("(").from_nodes(["nope".to_string()]);
        // node validation comes before parsing the query
        assert!(matches!(
            QueryEngine::execute(&query, &graph),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_per_source() {
        let graph = chain();
        let query = PathQuery::regex("a").from_nodes(["x".to_string(), "y".to_string()]);
        let grouped = QueryEngine::execute_per_source(&query, &graph).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["x"], HashSet::from(["y".to_string()]));
        assert!(grouped["y"].is_empty());
    }

    #[test]
    fn test_cancellation_and_limits() {
        let graph = chain();
        let token = CancellationToken::new();
        token.cancel();
        let query = PathQuery::regex("(a | b)*").with_cancellation(token);
        assert!(matches!(
            QueryEngine::execute(&query, &graph),
            Err(Error::Cancelled)
        ));

        let query = PathQuery::regex("a").with_limits(QueryLimits::new().with_max_iterations(0));
        assert!(matches!(
            QueryEngine::execute(&query, &graph),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_algorithm_names() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("GLL".parse::<Algorithm>().unwrap(), Algorithm::Gll);
        assert!("dijkstra".parse::<Algorithm>().is_err());
        assert_eq!(serde_json::to_string(&Algorithm::Hellings).unwrap(), "\"hellings\"");
    }
}
