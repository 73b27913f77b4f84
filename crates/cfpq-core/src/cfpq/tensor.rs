//! Tensor (Kronecker product) CFPQ over recursive state machines

use std::collections::HashSet;
use std::marker::PhantomData;

use super::{project, resolve_masks, CfpqSolver};
use crate::automaton::BooleanAutomaton;
use crate::error::Result;
use crate::grammar::Cfg;
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::matrix::{BoolMatrix, SparseBoolMatrix};
use crate::rpq::PairSet;
use crate::rsm::Rsm;

/// Repeatedly intersects the graph with the RSM and turns every closure path
/// from a box start to one of its finals into a summary edge labeled with the
/// box's nonterminal.
///
/// Summary labels are produced only by the solver: graph edges whose label
/// names a box never match a call, just as they match no terminal.
#[derive(Debug, Clone)]
pub struct TensorSolver<M = SparseBoolMatrix> {
    _backend: PhantomData<M>,
}

impl<M> Default for TensorSolver<M> {
    fn default() -> Self {
        Self {
            _backend: PhantomData,
        }
    }
}

impl<M: BoolMatrix> TensorSolver<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph automaton extended with every derivable summary edge
    pub fn summaries<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        rsm: &Rsm,
        ctx: &mut QueryContext,
    ) -> Result<BooleanAutomaton<M>> {
        let flat = rsm.flatten()?;
        let n = graph.node_count();
        let mut g = BooleanAutomaton::<M>::new(n);
        for (u, label, v) in graph.indexed_edges() {
            if !rsm.is_nonterminal(label) {
                g.add_transition(label, u, v);
            }
        }

        for x in (0..flat.num_boxes()).filter(|&x| flat.is_nullable(x)) {
            for v in 0..n {
                g.add_transition(flat.box_name(x), v, v);
            }
        }

        let r = flat.to_boolean_automaton::<M>();
        let rn = r.num_states();
        let mut rounds = 0u64;
        loop {
            ctx.tick()?;
            rounds += 1;

            let product = g.intersect(&r);
            let closure = product.transitive_closure_with(ctx)?;

            let mut added = 0usize;
            for x in 0..flat.num_boxes() {
                let box_start = flat.box_start(x);
                for g1 in 0..n {
                    for q in closure.row(g1 * rn + box_start) {
                        let (g2, r2) = (q / rn, q % rn);
                        if flat.is_final(r2)
                            && flat.box_of(r2) == x
                            && g.add_transition(flat.box_name(x), g1, g2)
                        {
                            added += 1;
                        }
                    }
                }
            }

            tracing::trace!("Tensor round {}: {} summary edges added", rounds, added);
            if added == 0 {
                break;
            }
        }

        tracing::debug!("Tensor CFPQ converged after {} rounds", rounds);
        Ok(g)
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
        let g = self.summaries(graph, rsm, ctx)?;
        let pairs = g
            .matrix(rsm.start_symbol())
            .map(M::nonzero)
            .unwrap_or_default();
        Ok(project(graph.index(), pairs, &start_mask, &final_mask))
    }
}

impl<M: BoolMatrix> CfpqSolver for TensorSolver<M> {
    fn name(&self) -> &'static str {
        "tensor"
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
    use crate::matrix::DenseBoolMatrix;

    #[test]
    fn test_scenarios() {
        check_scenarios(&TensorSolver::<SparseBoolMatrix>::new());
        check_scenarios(&TensorSolver::<DenseBoolMatrix>::new());
    }

    #[test]
    fn test_unknown_node() {
        check_unknown_node(&TensorSolver::<SparseBoolMatrix>::new());
    }

    #[test]
    fn test_ecfg_query() {
        // S → a S* b over a chain
        let rsm = Rsm::parse_ecfg("S -> a S* b").unwrap();
        let graph = LabeledGraph::from_edges([
            (0u32, "a", 1),
            (1, "a", 2),
            (2, "b", 3),
            (3, "a", 4),
            (4, "b", 5),
            (5, "b", 6),
        ]);
        let mut ctx = QueryContext::unbounded();
        let result = TensorSolver::<SparseBoolMatrix>::new()
            .solve_rsm(&graph, &rsm, None, None, &mut ctx)
            .unwrap();
        assert_eq!(result, pairs(&[(1, 3), (3, 5), (0, 6)]));
    }

    #[test]
    fn test_summaries_for_every_nonterminal() {
        let rsm = Rsm::parse_ecfg("S -> A b\nA -> a | a A").unwrap();
        let graph = LabeledGraph::from_edges([(0u32, "a", 1), (1, "a", 2), (2, "b", 3)]);
        let mut ctx = QueryContext::unbounded();
        let g = TensorSolver::<SparseBoolMatrix>::new()
            .summaries(&graph, &rsm, &mut ctx)
            .unwrap();
        let a = g.matrix("A").unwrap();
        assert_eq!(a.nonzero(), vec![(0, 1), (0, 2), (1, 2)]);
        let s = g.matrix("S").unwrap();
        assert_eq!(s.nonzero(), vec![(0, 3), (1, 3)]);
    }

    #[test]
    fn test_nonterminal_named_edges_are_not_summaries() {
        let hellings = super::super::HellingsSolver::new();
        let cases = [
            (LabeledGraph::from_edges([(0u32, "S", 1)]), "S -> a"),
            (LabeledGraph::from_edges([(0u32, "A", 1), (1, "b", 2)]), "S -> A b\nA -> a"),
            (
                LabeledGraph::from_edges([(0u32, "a", 1), (1, "S", 2), (2, "b", 3)]),
                "S -> a S b | $",
            ),
        ];
        for (graph, text) in cases {
            let grammar = Cfg::parse(text).unwrap();
            for backend in ["sparse", "dense"] {
                let mut ctx = QueryContext::unbounded();
                let result = if backend == "sparse" {
                    TensorSolver::<SparseBoolMatrix>::new().solve(&graph, &grammar, None, None, &mut ctx)
                } else {
                    TensorSolver::<DenseBoolMatrix>::new().solve(&graph, &grammar, None, None, &mut ctx)
                }
                .unwrap();
                let expected = hellings
                    .solve(&graph, &grammar, None, None, &mut QueryContext::unbounded())
                    .unwrap();
                assert_eq!(result, expected, "{} / {}", text, backend);
                assert!(result.iter().all(|&(u, v)| u == v), "{} / {}", text, backend);
            }
        }
    }
}
