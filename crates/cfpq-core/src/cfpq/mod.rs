//! Context-free path query solvers
//!
//! Four strategies compute the same answer:
//!
//! - [`HellingsSolver`]: semi-naive worklist over `(u, A, v)` triples
//! - [`MatrixSolver`]: one boolean matrix per variable, products to a fixpoint
//! - [`TensorSolver`]: repeated intersection of the graph with an RSM
//! - [`GllSolver`]: generalized LL parsing over the graph with a shared
//!   graph-structured stack
//!
//! Hellings and Matrix work on the weak CNF of the grammar; Tensor and GLL
//! work on its recursive state machine.

mod gll;
mod hellings;
mod matrix;
mod tensor;

use std::collections::HashSet;

pub use gll::GllSolver;
pub use hellings::HellingsSolver;
pub use matrix::MatrixSolver;
pub use tensor::TensorSolver;

use crate::error::Result;
use crate::grammar::Cfg;
use crate::graph::{GraphIndex, LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::rpq::PairSet;

/// `(source index, variable id, target index)` reachability facts
pub type Triples = HashSet<(usize, usize, usize)>;

/// Common entry point of the CFPQ strategies
pub trait CfpqSolver {
    /// Algorithm name used in logs
    fn name(&self) -> &'static str;

    /// Pairs `(u, v)` with `u` in `start`, `v` in `finals` and a path from
    /// `u` to `v` whose label word is derivable from the grammar's start
    /// symbol. `None` selects every node.
    fn solve<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        grammar: &Cfg,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>>;
}

/// Resolve both node selections, rejecting unknown nodes
pub(crate) fn resolve_masks<N: NodeId>(
    index: &GraphIndex<N>,
    start: Option<&HashSet<N>>,
    finals: Option<&HashSet<N>>,
) -> Result<(Vec<bool>, Vec<bool>)> {
    Ok((index.mask(start)?, index.mask(finals)?))
}

/// Map index pairs back to nodes, keeping those in start × final
pub(crate) fn project<N: NodeId>(
    index: &GraphIndex<N>,
    pairs: impl IntoIterator<Item = (usize, usize)>,
    start_mask: &[bool],
    final_mask: &[bool],
) -> PairSet<N> {
    pairs
        .into_iter()
        .filter(|&(u, v)| start_mask[u] && final_mask[v])
        .map(|(u, v)| (index.node(u).clone(), index.node(v).clone()))
        .collect()
}
