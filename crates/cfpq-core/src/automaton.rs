//! Finite automata and their boolean-matrix representation

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{LabeledGraph, NodeId};
use crate::limits::QueryContext;
use crate::matrix::{BoolMatrix, SparseBoolMatrix};

/// Nondeterministic finite automaton over string labels.
///
/// States are the dense integers `0..num_states`. There are no epsilon
/// transitions at this level; the regex compiler removes them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nfa {
    pub num_states: usize,
    pub transitions: Vec<(usize, String, usize)>,
    pub start: BTreeSet<usize>,
    pub finals: BTreeSet<usize>,
}

impl Nfa {
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            ..Default::default()
        }
    }

    pub fn add_state(&mut self) -> usize {
        self.num_states += 1;
        self.num_states - 1
    }

    pub fn add_transition(&mut self, src: usize, label: impl Into<String>, dst: usize) {
        debug_assert!(src < self.num_states && dst < self.num_states);
        self.transitions.push((src, label.into(), dst));
    }

    pub fn with_transition(mut self, src: usize, label: impl Into<String>, dst: usize) -> Self {
        self.add_transition(src, label, dst);
        self
    }

    pub fn with_start(mut self, state: usize) -> Self {
        self.start.insert(state);
        self
    }

    pub fn with_final(mut self, state: usize) -> Self {
        self.finals.insert(state);
        self
    }

    pub fn labels(&self) -> BTreeSet<&str> {
        self.transitions.iter().map(|(_, l, _)| l.as_str()).collect()
    }

    /// Transitions leaving `state`
    pub fn outgoing(&self, state: usize) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.transitions
            .iter()
            .filter(move |(src, _, _)| *src == state)
            .map(|(_, label, dst)| (label.as_str(), *dst))
    }

    /// At most one start state and at most one target per `(state, label)`
    pub fn is_deterministic(&self) -> bool {
        if self.start.len() > 1 {
            return false;
        }
        let mut seen: BTreeMap<(usize, &str), usize> = BTreeMap::new();
        for (src, label, dst) in &self.transitions {
            if let Some(prev) = seen.insert((*src, label.as_str()), *dst) {
                if prev != *dst {
                    return false;
                }
            }
        }
        true
    }

    /// Simulate the automaton on a word
    pub fn accepts(&self, word: &[&str]) -> bool {
        let mut current: BTreeSet<usize> = self.start.clone();
        for symbol in word {
            current = self
                .transitions
                .iter()
                .filter(|(src, label, _)| current.contains(src) && label == symbol)
                .map(|(_, _, dst)| *dst)
                .collect();
            if current.is_empty() {
                return false;
            }
        }
        current.iter().any(|s| self.finals.contains(s))
    }
}

/// Automaton stored as one boolean adjacency matrix per label plus start and
/// final vectors.
///
/// Invariant: every matrix is `num_states × num_states` and both vectors have
/// length `num_states`.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanAutomaton<M: BoolMatrix = SparseBoolMatrix> {
    num_states: usize,
    matrices: BTreeMap<String, M>,
    start: Vec<bool>,
    finals: Vec<bool>,
}

impl<M: BoolMatrix> BooleanAutomaton<M> {
    /// Automaton with `num_states` states and no transitions
    pub fn new(num_states: usize) -> Self {
        Self {
            num_states,
            matrices: BTreeMap::new(),
            start: vec![false; num_states],
            finals: vec![false; num_states],
        }
    }

    /// State `i` of the NFA becomes index `i`
    pub fn from_nfa(nfa: &Nfa) -> Self {
        let mut automaton = Self::new(nfa.num_states);
        for (src, label, dst) in &nfa.transitions {
            automaton.add_transition(label, *src, *dst);
        }
        for &s in &nfa.start {
            automaton.start[s] = true;
        }
        for &s in &nfa.finals {
            automaton.finals[s] = true;
        }
        automaton
    }

    /// Graph as an automaton whose states are the graph's node indices.
    ///
    /// `start` and `finals` are membership masks over the graph index, as
    /// produced by [`crate::graph::GraphIndex::mask`].
    pub fn from_graph<N: NodeId>(graph: &LabeledGraph<N>, start: Vec<bool>, finals: Vec<bool>) -> Self {
        let n = graph.node_count();
        assert_eq!(start.len(), n, "start mask does not match graph size");
        assert_eq!(finals.len(), n, "final mask does not match graph size");

        let mut automaton = Self::new(n);
        for (src, label, dst) in graph.indexed_edges() {
            automaton.add_transition(label, src, dst);
        }
        automaton.start = start;
        automaton.finals = finals;
        automaton
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.matrices.keys().map(String::as_str)
    }

    pub fn matrix(&self, label: &str) -> Option<&M> {
        self.matrices.get(label)
    }

    pub fn matrices(&self) -> &BTreeMap<String, M> {
        &self.matrices
    }

    pub fn start(&self) -> &[bool] {
        &self.start
    }

    pub fn finals(&self) -> &[bool] {
        &self.finals
    }

    pub fn set_start(&mut self, state: usize, value: bool) {
        self.start[state] = value;
    }

    pub fn set_final(&mut self, state: usize, value: bool) {
        self.finals[state] = value;
    }

    /// Add `src --label--> dst`, creating the label matrix if needed.
    /// Returns true if the transition is new.
    pub fn add_transition(&mut self, label: &str, src: usize, dst: usize) -> bool {
        let n = self.num_states;
        self.matrices
            .entry(label.to_string())
            .or_insert_with(|| M::zeros(n, n))
            .set(src, dst)
    }

    pub fn has_transition(&self, label: &str, src: usize, dst: usize) -> bool {
        self.matrices.get(label).is_some_and(|m| m.get(src, dst))
    }

    /// Intersection by Kronecker product.
    ///
    /// State `(i, j)` of the result (`i` from `self`, `j` from `other`) has
    /// index `i * other.num_states() + j`. Labels present in only one operand
    /// are dropped.
    pub fn intersect(&self, other: &Self) -> Self {
        let shared: Vec<(&String, &M, &M)> = self
            .matrices
            .iter()
            .filter_map(|(label, a)| other.matrices.get(label).map(|b| (label, a, b)))
            .collect();

        let matrices: BTreeMap<String, M> = shared
            .into_par_iter()
            .map(|(label, a, b)| (label.clone(), a.kron(b)))
            .collect();

        tracing::debug!(
            "Intersected automata: {} x {} states, {} shared labels",
            self.num_states,
            other.num_states,
            matrices.len()
        );

        Self {
            num_states: self.num_states * other.num_states,
            matrices,
            start: kron_vec(&self.start, &other.start),
            finals: kron_vec(&self.finals, &other.finals),
        }
    }

    /// Union of all label matrices (zero matrix for an automaton without
    /// transitions)
    pub fn adjacency(&self) -> M {
        let mut r = M::zeros(self.num_states, self.num_states);
        for m in self.matrices.values() {
            r.or_assign(m);
        }
        r
    }

    /// Reachability in one or more steps
    pub fn transitive_closure(&self) -> M {
        let mut ctx = QueryContext::unbounded();
        // Unbounded contexts never fail.
        self.transitive_closure_with(&mut ctx)
            .unwrap_or_else(|_| unreachable!("unbounded context"))
    }

    /// Reachability in one or more steps, checking `ctx` between squarings
    pub fn transitive_closure_with(&self, ctx: &mut QueryContext) -> Result<M> {
        let mut r = self.adjacency();
        let mut rounds = 0usize;
        loop {
            ctx.tick()?;
            let before = r.nnz();
            let squared = r.mul(&r);
            r.or_assign(&squared);
            rounds += 1;
            if r.nnz() == before {
                break;
            }
        }
        tracing::trace!("Closure converged after {} squarings, nnz={}", rounds, r.nnz());
        Ok(r)
    }

    /// Reachability in zero or more steps
    pub fn transitive_closure_reflexive(&self) -> M {
        let mut r = self.transitive_closure();
        r.or_assign(&M::identity(self.num_states));
        r
    }

    /// Run the automaton on a word
    pub fn accepts(&self, word: &[&str]) -> bool {
        let mut frontier = self.start.clone();
        for symbol in word {
            frontier = match self.matrices.get(*symbol) {
                Some(m) => m.vec_mul(&frontier),
                None => return false,
            };
            if !frontier.iter().any(|&b| b) {
                return false;
            }
        }
        frontier.iter().zip(&self.finals).any(|(&f, &fin)| f && fin)
    }

    /// True iff no start state reaches a final state
    pub fn is_empty(&self) -> bool {
        let closure = self.transitive_closure_reflexive();
        let mut pairs = self.start_final_pairs(&closure);
        pairs.next().is_none()
    }

    /// Pairs `(p, q)` with `start[p] ∧ finals[q] ∧ closure[p, q]`
    pub fn start_final_pairs<'a>(&'a self, closure: &'a M) -> impl Iterator<Item = (usize, usize)> + 'a {
        self.start
            .iter()
            .enumerate()
            .filter_map(|(p, &s)| s.then_some(p))
            .flat_map(move |p| {
                closure
                    .row(p)
                    .into_iter()
                    .filter(|&q| self.finals[q])
                    .map(move |q| (p, q))
            })
    }

    /// Convert back to an explicit transition list
    pub fn to_nfa(&self) -> Nfa {
        let mut nfa = Nfa::new(self.num_states);
        for (label, m) in &self.matrices {
            for (i, j) in m.nonzero() {
                nfa.add_transition(i, label.clone(), j);
            }
        }
        nfa.start = indices(&self.start);
        nfa.finals = indices(&self.finals);
        nfa
    }
}

fn kron_vec(a: &[bool], b: &[bool]) -> Vec<bool> {
    let mut out = vec![false; a.len() * b.len()];
    for (i, &x) in a.iter().enumerate() {
        if !x {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i * b.len() + j] = y;
        }
    }
    out
}

fn indices(mask: &[bool]) -> BTreeSet<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &b)| b.then_some(i))
        .collect()
}
