//! Hellings' worklist algorithm

use std::collections::{HashMap, HashSet, VecDeque};

use super::{project, resolve_masks, CfpqSolver, Triples};
use crate::error::Result;
use crate::grammar::{Cfg, WeakCnf};
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::rpq::PairSet;

/// Semi-naive evaluation of the reachability rules of a weak CNF grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct HellingsSolver;

impl HellingsSolver {
    pub fn new() -> Self {
        Self
    }

    /// All derivable `(u, A, v)` triples over graph node indices
    pub fn triples<N: NodeId>(
        &self,
        graph: &LabeledGraph<N>,
        cnf: &WeakCnf,
        ctx: &mut QueryContext,
    ) -> Result<Triples> {
        let n = graph.node_count();

        let mut by_label: HashMap<&str, Vec<usize>> = HashMap::new();
        for (head, t) in &cnf.terminal {
            by_label.entry(t.as_str()).or_default().push(*head);
        }
        // A → B C keyed by C (as_right) and by B (as_left)
        let mut as_right: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
        let mut as_left: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
        for &(a, b, c) in &cnf.binary {
            as_right.entry(c).or_default().push((a, b));
            as_left.entry(b).or_default().push((a, c));
        }

        let mut store = TripleStore::new(n);
        for v in 0..n {
            for &var in &cnf.epsilon {
                store.insert((v, var, v));
            }
        }
        for (u, label, v) in graph.indexed_edges() {
            for &var in by_label.get(label).into_iter().flatten() {
                store.insert((u, var, v));
            }
        }

        let mut new: Vec<(usize, usize, usize)> = Vec::new();
        while let Some((v1, b, v2)) = store.worklist.pop_front() {
            ctx.tick()?;

            // (v0, C, v1) + (v1, B, v2) with X → C B
            for &(x, c) in as_right.get(&b).into_iter().flatten() {
                for &(var, v0) in &store.by_end[v1] {
                    if var == c {
                        new.push((v0, x, v2));
                    }
                }
            }
            // (v1, B, v2) + (v2, D, v3) with X → B D
            for &(x, d) in as_left.get(&b).into_iter().flatten() {
                for &(var, v3) in &store.by_start[v2] {
                    if var == d {
                        new.push((v1, x, v3));
                    }
                }
            }

            for t in new.drain(..) {
                store.insert(t);
            }
        }

        let r = store.triples;
        tracing::debug!(
            "Hellings: {} triples over {} nodes, {} productions",
            r.len(),
            n,
            cnf.num_productions()
        );
        Ok(r)
    }
}

/// Triple set with per-node indexes and the pending worklist
struct TripleStore {
    triples: Triples,
    /// `(variable, target)` per source node
    by_start: Vec<Vec<(usize, usize)>>,
    /// `(variable, source)` per target node
    by_end: Vec<Vec<(usize, usize)>>,
    worklist: VecDeque<(usize, usize, usize)>,
}

impl TripleStore {
    fn new(n: usize) -> Self {
        Self {
            triples: Triples::new(),
            by_start: vec![Vec::new(); n],
            by_end: vec![Vec::new(); n],
            worklist: VecDeque::new(),
        }
    }

    fn insert(&mut self, t: (usize, usize, usize)) {
        if self.triples.insert(t) {
            let (u, var, v) = t;
            self.by_start[u].push((var, v));
            self.by_end[v].push((var, u));
            self.worklist.push_back(t);
        }
    }
}

impl CfpqSolver for HellingsSolver {
    fn name(&self) -> &'static str {
        "hellings"
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
        let s = cnf.start();
        let triples = self.triples(graph, &cnf, ctx)?;
        Ok(project(
            graph.index(),
            triples.into_iter().filter(|&(_, var, _)| var == s).map(|(u, _, v)| (u, v)),
            &start_mask,
            &final_mask,
        ))
    }
}
