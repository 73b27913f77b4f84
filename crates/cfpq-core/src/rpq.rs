//! Regular path queries
//!
//! Two evaluation strategies over the product of a graph and a query
//! automaton:
//!
//! - tensor: Kronecker intersection of the boolean automata followed by a
//!   transitive closure
//! - BFS: explicit search of the product state space from every start node
//!
//! Both return the same pair set.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::automaton::{BooleanAutomaton, Nfa};
use crate::error::Result;
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::matrix::{BoolMatrix, SparseBoolMatrix};
use crate::regex::compile_regex;

/// Node pairs answering a query
pub type PairSet<N> = HashSet<(N, N)>;

/// Evaluates regular path queries against one graph
pub struct RpqSolver<'g, N> {
    graph: &'g LabeledGraph<N>,
}

impl<'g, N: NodeId> RpqSolver<'g, N> {
    pub fn new(graph: &'g LabeledGraph<N>) -> Self {
        Self { graph }
    }

    /// Compile `regex` and evaluate it with the tensor strategy
    pub fn solve_regex(
        &self,
        regex: &str,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let query = compile_regex(regex)?;
        self.solve(&query, start, finals, ctx)
    }

    /// Tensor strategy on the sparse backend
    pub fn solve(
        &self,
        query: &Nfa,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        self.solve_with::<SparseBoolMatrix>(query, start, finals, ctx)
    }

    /// Tensor strategy: `closure(graph ∩ query)` restricted to start × final
    /// product states.
    ///
    /// `None` selects every node; unknown nodes are rejected before any work
    /// is done.
    pub fn solve_with<M: BoolMatrix>(
        &self,
        query: &Nfa,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let index = self.graph.index();
        let start_mask = index.mask(start)?;
        let final_mask = index.mask(finals)?;

        let query_states = query.num_states;
        if query_states == 0 || self.graph.node_count() == 0 {
            return Ok(PairSet::new());
        }

        let graph_automaton = BooleanAutomaton::<M>::from_graph(self.graph, start_mask.clone(), final_mask.clone());
        let query_automaton = BooleanAutomaton::<M>::from_nfa(query);
        let product = graph_automaton.intersect(&query_automaton);
        let closure = product.transitive_closure_with(ctx)?;

        let mut pairs: PairSet<N> = product
            .start_final_pairs(&closure)
            .map(|(p, q)| {
                (
                    index.node(p / query_states).clone(),
                    index.node(q / query_states).clone(),
                )
            })
            .collect();

        // The closure only covers paths of length >= 1
        if accepts_empty_word(query) {
            for (v, (&s, &f)) in start_mask.iter().zip(&final_mask).enumerate() {
                if s && f {
                    let node = index.node(v).clone();
                    pairs.insert((node.clone(), node));
                }
            }
        }

        tracing::debug!(
            "RPQ tensor: {} product states, closure nnz={}, {} pairs",
            product.num_states(),
            closure.nnz(),
            pairs.len()
        );
        Ok(pairs)
    }

    /// Breadth-first search of the product from every start node
    pub fn bfs(
        &self,
        query: &Nfa,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let per_source = self.bfs_per_source(query, start, finals, ctx)?;
        Ok(per_source
            .into_iter()
            .flat_map(|(src, reached)| reached.into_iter().map(move |dst| (src.clone(), dst)))
            .collect())
    }

    /// Reachable final nodes for each start node.
    ///
    /// Every selected start node is a key, possibly with an empty set.
    pub fn bfs_per_source(
        &self,
        query: &Nfa,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<HashMap<N, HashSet<N>>> {
        let index = self.graph.index();
        let start_mask = index.mask(start)?;
        let final_mask = index.mask(finals)?;

        let n = self.graph.node_count();
        let qn = query.num_states;
        let adjacency = self.graph.adjacency();
        let mut delta: Vec<HashMap<&str, Vec<usize>>> = vec![HashMap::new(); qn];
        for (src, label, dst) in &query.transitions {
            delta[*src].entry(label.as_str()).or_default().push(*dst);
        }

        let mut result: HashMap<N, HashSet<N>> = HashMap::new();
        let mut visited = vec![false; n * qn];
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

        for source in (0..n).filter(|&v| start_mask[v]) {
            visited.iter_mut().for_each(|seen| *seen = false);
            queue.clear();
            for &q0 in &query.start {
                visited[source * qn + q0] = true;
                queue.push_back((source, q0));
            }

            let mut reached = HashSet::new();
            while let Some((v, q)) = queue.pop_front() {
                ctx.tick()?;
                if final_mask[v] && query.finals.contains(&q) {
                    reached.insert(index.node(v).clone());
                }
                for (label, targets) in &delta[q] {
                    let Some(successors) = adjacency[v].get(label) else {
                        continue;
                    };
                    for &w in successors {
                        for &q2 in targets {
                            let state = w * qn + q2;
                            if !visited[state] {
                                visited[state] = true;
                                queue.push_back((w, q2));
                            }
                        }
                    }
                }
            }
            result.insert(index.node(source).clone(), reached);
        }

        tracing::debug!("RPQ bfs: {} sources searched", result.len());
        Ok(result)
    }
}

fn accepts_empty_word(nfa: &Nfa) -> bool {
    nfa.start.iter().any(|s| nfa.finals.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::limits::QueryLimits;
    use crate::matrix::DenseBoolMatrix;

    fn set(nodes: &[u32]) -> HashSet<u32> {
        nodes.iter().copied().collect()
    }

    fn pairs(p: &[(u32, u32)]) -> PairSet<u32> {
        p.iter().copied().collect()
    }

    fn cycle() -> LabeledGraph<u32> {
        LabeledGraph::from_edges([(0, "b", 1), (1, "b", 2), (2, "b", 0)])
    }

    #[test]
    fn test_single_edge() {
        let graph = LabeledGraph::from_edges([(0u32, "a", 1)]);
        let solver = RpqSolver::new(&graph);
        let mut ctx = QueryContext::unbounded();
        let result = solver.solve_regex("a", None, None, &mut ctx).unwrap();
        assert_eq!(result, pairs(&[(0, 1)]));
    }

    #[test]
    fn test_star_on_cycle_gives_all_pairs() {
        let graph = cycle();
        let solver = RpqSolver::new(&graph);
        let query = compile_regex("b*").unwrap();
        let mut ctx = QueryContext::unbounded();

        let tensor = solver.solve(&query, None, None, &mut ctx).unwrap();
        assert_eq!(tensor.len(), 9);
        for i in 0..3 {
            for j in 0..3 {
                assert!(tensor.contains(&(i, j)));
            }
        }
        assert_eq!(solver.bfs(&query, None, None, &mut ctx).unwrap(), tensor);
    }

    #[test]
    fn test_empty_graph() {
        let graph: LabeledGraph<u32> = LabeledGraph::new();
        let solver = RpqSolver::new(&graph);
        let mut ctx = QueryContext::unbounded();
        assert!(solver.solve_regex("a*", None, None, &mut ctx).unwrap().is_empty());
        let query = compile_regex("a*").unwrap();
        assert!(solver.bfs(&query, None, None, &mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_subsets_and_epsilon() {
        let graph = cycle();
        let solver = RpqSolver::new(&graph);
        let mut ctx = QueryContext::unbounded();

        let result = solver
            .solve_regex("b b*", Some(&set(&[0])), Some(&set(&[0, 2])), &mut ctx)
            .unwrap();
        assert_eq!(result, pairs(&[(0, 0), (0, 2)]));

        // ε pairs only where a node is both start and final
        let result = solver
            .solve_regex("$", Some(&set(&[0, 1])), Some(&set(&[1, 2])), &mut ctx)
            .unwrap();
        assert_eq!(result, pairs(&[(1, 1)]));

        let result = solver
            .solve_regex("b*", Some(&HashSet::new()), None, &mut ctx)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_unknown_node() {
        let graph = cycle();
        let solver = RpqSolver::new(&graph);
        let mut ctx = QueryContext::unbounded();
        let err = solver.solve_regex("b", Some(&set(&[7])), None, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
        let query = compile_regex("b").unwrap();
        let err = solver.bfs(&query, None, Some(&set(&[9])), &mut ctx).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(_)));
    }

    #[test]
    fn test_disjoint_alphabet_is_empty() {
        let graph = cycle();
        let solver = RpqSolver::new(&graph);
        let mut ctx = QueryContext::unbounded();
        assert!(solver.solve_regex("c+", None, None, &mut ctx).unwrap().is_empty());
    }

    #[test]
    fn test_dense_backend_matches_sparse() {
        let graph = LabeledGraph::from_edges([
            (0u32, "a", 1),
            (1, "b", 2),
            (2, "a", 3),
            (3, "b", 0),
            (1, "a", 1),
        ]);
        let solver = RpqSolver::new(&graph);
        let query = compile_regex("a+ b (a | b)*").unwrap();
        let mut ctx = QueryContext::unbounded();
        let sparse = solver.solve(&query, None, None, &mut ctx).unwrap();
        let dense = solver
            .solve_with::<DenseBoolMatrix>(&query, None, None, &mut ctx)
            .unwrap();
        assert_eq!(sparse, dense);
        assert_eq!(solver.bfs(&query, None, None, &mut ctx).unwrap(), sparse);
    }

    #[test]
    fn test_per_source_keys_every_start() {
        let graph = LabeledGraph::from_edges([(0u32, "a", 1), (2, "b", 3)]);
        let solver = RpqSolver::new(&graph);
        let query = compile_regex("a").unwrap();
        let mut ctx = QueryContext::unbounded();
        let per_source = solver
            .bfs_per_source(&query, Some(&set(&[0, 2])), None, &mut ctx)
            .unwrap();
        assert_eq!(per_source.len(), 2);
        assert_eq!(per_source[&0], set(&[1]));
        assert!(per_source[&2].is_empty());
    }

    #[test]
    fn test_iteration_limit() {
        let graph = cycle();
        let solver = RpqSolver::new(&graph);
        let query = compile_regex("b*").unwrap();
        let mut ctx = QueryContext::new(QueryLimits::new().with_max_iterations(2));
        let err = solver.bfs(&query, None, None, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { .. }));
    }
}
