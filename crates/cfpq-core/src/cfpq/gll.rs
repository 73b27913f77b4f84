//! GLL parsing over a graph with a graph-structured stack

use std::collections::HashSet;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{project, resolve_masks, CfpqSolver};
use crate::error::Result;
use crate::grammar::Cfg;
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::rpq::PairSet;
use crate::rsm::{FlatRsm, Rsm};

/// `(rsm state, graph node, gss node)`
type Configuration = (usize, usize, usize);

/// Call of a box at a graph node.
///
/// Identified by the callee's start state and `node`; created once per
/// identity and kept for the lifetime of the [`Gss`].
#[derive(Debug)]
struct GssNode {
    node: usize,
    /// Return state → calling GSS nodes
    references: FxHashMap<usize, FxHashSet<usize>>,
    /// Graph nodes at which this call has already completed
    pop_set: FxHashSet<usize>,
    is_root: bool,
}

/// Arena of GSS nodes indexed by `(state, node)`
#[derive(Debug, Default)]
struct Gss {
    nodes: Vec<GssNode>,
    ids: FxHashMap<(usize, usize), usize>,
}

impl Gss {
    /// Index of the node for `(state, node)`; true if it was just created
    fn get_or_create(&mut self, state: usize, node: usize) -> (usize, bool) {
        if let Some(&id) = self.ids.get(&(state, node)) {
            return (id, false);
        }
        let id = self.nodes.len();
        self.nodes.push(GssNode {
            node,
            references: FxHashMap::default(),
            pop_set: FxHashSet::default(),
            is_root: false,
        });
        self.ids.insert((state, node), id);
        (id, true)
    }

    /// Record that the call `id` completed at `current`, resuming every caller.
    /// A repeated completion resumes nothing.
    fn pop(&mut self, id: usize, current: usize) -> Vec<Configuration> {
        let gss = &mut self.nodes[id];
        if !gss.pop_set.insert(current) {
            return Vec::new();
        }
        gss.references
            .iter()
            .flat_map(|(&ret, callers)| callers.iter().map(move |&caller| (ret, current, caller)))
            .collect()
    }

    /// Register `caller` waiting on `id` to return into `ret`, replaying
    /// completions that happened before the registration.
    fn add_reference(&mut self, id: usize, ret: usize, caller: usize) -> Vec<Configuration> {
        let gss = &mut self.nodes[id];
        if !gss.references.entry(ret).or_default().insert(caller) {
            return Vec::new();
        }
        gss.pop_set.iter().map(|&current| (ret, current, caller)).collect()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Generalized LL solver.
///
/// Each configuration is processed at most once and calls of the same box at
/// the same node share one GSS node, so cyclic graphs and left-recursive
/// grammars terminate.
#[derive(Debug, Clone, Copy, Default)]
pub struct GllSolver;

impl GllSolver {
    pub fn new() -> Self {
        Self
    }

    /// Answer a query given directly as an RSM
    pub fn solve_rsm<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        rsm: &Rsm,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let (start_mask, final_mask) = resolve_masks(graph.index(), start, finals)?;
        let flat = rsm.flatten()?;
        let pairs = self.reachable(graph, &flat, &start_mask, ctx)?;
        Ok(project(graph.index(), pairs, &start_mask, &final_mask))
    }

    /// `(root node, node)` pairs derivable from the start box, rooted at every
    /// node selected by `start_mask`
    fn reachable<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        rsm: &FlatRsm,
        start_mask: &[bool],
        ctx: &mut QueryContext,
    ) -> Result<FxHashSet<(usize, usize)>> {
        let adjacency = graph.adjacency();
        let mut gss = Gss::default();
        let mut worklist: Vec<Configuration> = Vec::new();
        let mut processed: FxHashSet<Configuration> = FxHashSet::default();
        let mut result: FxHashSet<(usize, usize)> = FxHashSet::default();

        let root_state = rsm.box_start(rsm.start_box());
        for v in (0..graph.node_count()).filter(|&v| start_mask[v]) {
            let (root, _) = gss.get_or_create(root_state, v);
            gss.nodes[root].is_root = true;
            worklist.push((root_state, v, root));
        }

        while let Some(config) = worklist.pop() {
            if !processed.insert(config) {
                continue;
            }
            ctx.tick()?;
            let (state, v, g) = config;

            for (label, next) in rsm.terminal_moves(state) {
                if let Some(successors) = adjacency[v].get(label.as_str()) {
                    worklist.extend(successors.iter().map(|&w| (*next, w, g)));
                }
            }

            for &(callee, ret) in rsm.call_moves(state) {
                let callee_start = rsm.box_start(callee);
                let (target, created) = gss.get_or_create(callee_start, v);
                worklist.extend(gss.add_reference(target, ret, g));
                if created {
                    worklist.push((callee_start, v, target));
                }
            }

            if rsm.is_final(state) {
                let call = &gss.nodes[g];
                if call.is_root {
                    result.insert((call.node, v));
                }
                worklist.extend(gss.pop(g, v));
            }
        }

        tracing::debug!(
            "GLL: {} configurations, {} GSS nodes, {} pairs",
            processed.len(),
            gss.len(),
            result.len()
        );
        Ok(result)
    }
}

impl CfpqSolver for GllSolver {
    fn name(&self) -> &'static str {
        "gll"
    }

    fn solve<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        grammar: &Cfg,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        self.solve_rsm(graph, &Rsm::from_cfg(grammar), start, finals, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_scenarios() {
        check_scenarios(&GllSolver::new());
    }

    #[test]
    fn test_unknown_node() {
        check_unknown_node(&GllSolver::new());
    }

    #[test]
    fn test_left_recursion_on_cycle() {
        // S → S a | a on a two-node cycle: every pair
        let grammar = Cfg::parse("S -> S a | a").unwrap();
        let graph = LabeledGraph::from_edges([(0u32, "a", 1), (1, "a", 0)]);
        let mut ctx = QueryContext::unbounded();
        let result = GllSolver::new().solve(&graph, &grammar, None, None, &mut ctx).unwrap();
        assert_eq!(result, pairs(&[(0, 0), (0, 1), (1, 0), (1, 1)]));
    }

    #[test]
    fn test_late_reference_replays_pops() {
        let mut gss = Gss::default();
        let (callee, _) = gss.get_or_create(0, 7);
        let (caller_a, _) = gss.get_or_create(5, 1);
        let (caller_b, _) = gss.get_or_create(5, 2);

        assert!(gss.add_reference(callee, 3, caller_a).is_empty());
        assert_eq!(gss.pop(callee, 9), vec![(3, 9, caller_a)]);
        assert!(gss.pop(callee, 9).is_empty());

        // registered after the pop: replayed immediately
        assert_eq!(gss.add_reference(callee, 4, caller_b), vec![(4, 9, caller_b)]);
        assert!(gss.add_reference(callee, 4, caller_b).is_empty());
    }

    #[test]
    fn test_gss_nodes_are_shared() {
        let mut gss = Gss::default();
        let (a, created_a) = gss.get_or_create(2, 3);
        let (b, created_b) = gss.get_or_create(2, 3);
        assert_eq!(a, b);
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(gss.len(), 1);
    }
}
