//! Matrix-multiplication CFPQ

use std::collections::{HashMap, HashSet, VecDeque};
use std::marker::PhantomData;

use rayon::prelude::*;

use super::{project, resolve_masks, CfpqSolver, Triples};
use crate::error::Result;
use crate::grammar::{Cfg, WeakCnf};
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::matrix::{BoolMatrix, SparseBoolMatrix};
use crate::rpq::PairSet;

/// One `n × n` reachability matrix per variable, grown by `M_A |= M_B · M_C`
/// until no matrix changes.
///
/// Only productions that mention a changed variable are recomputed.
#[derive(Debug, Clone)]
pub struct MatrixSolver<M = SparseBoolMatrix> {
    _backend: PhantomData<M>,
}

impl<M> Default for MatrixSolver<M> {
    fn default() -> Self {
        Self {
            _backend: PhantomData,
        }
    }
}

impl<M: BoolMatrix> MatrixSolver<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reachability matrices indexed by variable id
    pub fn matrices<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        cnf: &WeakCnf,
        ctx: &mut QueryContext,
    ) -> Result<Vec<M>> {
        let n = graph.node_count();
        let k = cnf.num_variables();
        let mut m: Vec<M> = vec![M::zeros(n, n); k];

        for &var in &cnf.epsilon {
            for v in 0..n {
                m[var].set(v, v);
            }
        }
        let mut by_label: HashMap<&str, Vec<usize>> = HashMap::new();
        for (head, t) in &cnf.terminal {
            by_label.entry(t.as_str()).or_default().push(*head);
        }
        for (u, label, v) in graph.indexed_edges() {
            for &var in by_label.get(label).into_iter().flatten() {
                m[var].set(u, v);
            }
        }

        // Productions whose body mentions each variable
        let mut uses: Vec<Vec<usize>> = vec![Vec::new(); k];
        for (i, &(_, b, c)) in cnf.binary.iter().enumerate() {
            uses[b].push(i);
            if c != b {
                uses[c].push(i);
            }
        }

        let mut dirty: VecDeque<usize> = (0..k).collect();
        let mut queued = vec![true; k];
        let mut rounds = 0u64;
        while let Some(x) = dirty.pop_front() {
            ctx.tick()?;
            queued[x] = false;
            rounds += 1;

            // Products only read the current matrices; merging is sequential
            let products: Vec<(usize, M)> = uses[x]
                .par_iter()
                .map(|&i| {
                    let (a, b, c) = cnf.binary[i];
                    (a, m[b].mul(&m[c]))
                })
                .collect();

            for (a, product) in products {
                if m[a].or_assign(&product) && !queued[a] {
                    queued[a] = true;
                    dirty.push_back(a);
                }
            }
        }

        tracing::debug!(
            "Matrix CFPQ: {} variables, {} rounds, nnz={}",
            k,
            rounds,
            m.iter().map(M::nnz).sum::<usize>()
        );
        Ok(m)
    }

    /// Same facts as [`Self::matrices`] as `(u, A, v)` triples
    pub fn triples<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        cnf: &WeakCnf,
        ctx: &mut QueryContext,
    ) -> Result<Triples> {
        let matrices = self.matrices(graph, cnf, ctx)?;
        Ok(matrices
            .iter()
            .enumerate()
            .flat_map(|(var, m)| m.nonzero().into_iter().map(move |(u, v)| (u, var, v)))
            .collect())
    }
}

impl<M: BoolMatrix> CfpqSolver for MatrixSolver<M> {
    fn name(&self) -> &'static str {
        "matrix"
    }

    fn solve<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        grammar: &Cfg,
        start: Option<&HashSet<N>>,
        finals: Option<&HashSet<N>>,
        ctx: &mut QueryContext,
    ) -> Result<PairSet<N>> {
        let (start_mask, final_mask) = resolve_masks(graph.index(), start, finals)?;
        let cnf = grammar.to_weak_cnf();
        let matrices = self.matrices(graph, &cnf, ctx)?;
        Ok(project(
            graph.index(),
            matrices[cnf.start()].nonzero(),
            &start_mask,
            &final_mask,
        ))
    }
}
