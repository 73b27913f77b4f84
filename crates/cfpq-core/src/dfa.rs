//! Subset construction and DFA minimization

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use rustc_hash::FxHashMap;

use crate::automaton::Nfa;

/// NFA with epsilon transitions (`None` labels), as produced by Thompson's
/// construction
#[derive(Debug, Clone, Default)]
pub struct EpsilonNfa {
    pub num_states: usize,
    pub transitions: Vec<(usize, Option<String>, usize)>,
    pub start: usize,
    pub finals: BTreeSet<usize>,
}

impl EpsilonNfa {
    pub fn add_state(&mut self) -> usize {
        self.num_states += 1;
        self.num_states - 1
    }

    pub fn add_epsilon(&mut self, src: usize, dst: usize) {
        self.transitions.push((src, None, dst));
    }

    pub fn add_symbol(&mut self, src: usize, label: &str, dst: usize) {
        self.transitions.push((src, Some(label.to_string()), dst));
    }
}

/// Epsilon closure of a state set, returned sorted
fn epsilon_closure(states: &[usize], eps: &[Vec<usize>]) -> Vec<usize> {
    let mut visited = vec![false; eps.len()];
    let mut worklist: VecDeque<usize> = VecDeque::new();
    for &s in states {
        if !visited[s] {
            visited[s] = true;
            worklist.push_back(s);
        }
    }
    while let Some(s) = worklist.pop_front() {
        for &t in &eps[s] {
            if !visited[t] {
                visited[t] = true;
                worklist.push_back(t);
            }
        }
    }
    visited
        .iter()
        .enumerate()
        .filter_map(|(i, &v)| v.then_some(i))
        .collect()
}

/// Subset construction. Only subsets reachable from the start closure are
/// built; the result is deterministic and may be partial.
pub fn determinize(nfa: &EpsilonNfa) -> Nfa {
    let n = nfa.num_states;
    let mut eps: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut moves: Vec<BTreeMap<&str, Vec<usize>>> = vec![BTreeMap::new(); n];
    for (src, label, dst) in &nfa.transitions {
        match label {
            None => eps[*src].push(*dst),
            Some(l) => moves[*src].entry(l.as_str()).or_default().push(*dst),
        }
    }

    let mut dfa = Nfa::new(0);
    let mut interned: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
    let mut worklist: VecDeque<Vec<usize>> = VecDeque::new();

    let start = epsilon_closure(&[nfa.start], &eps);
    let start_id = dfa.add_state();
    interned.insert(start.clone(), start_id);
    dfa.start.insert(start_id);
    worklist.push_back(start);

    while let Some(set) = worklist.pop_front() {
        let id = interned[&set];
        if set.iter().any(|s| nfa.finals.contains(s)) {
            dfa.finals.insert(id);
        }

        let mut by_label: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for &s in &set {
            for (label, dsts) in &moves[s] {
                by_label.entry(*label).or_default().extend(dsts);
            }
        }

        for (label, dsts) in by_label {
            let target = epsilon_closure(&dsts, &eps);
            let target_id = match interned.get(&target) {
                Some(&t) => t,
                None => {
                    let t = dfa.add_state();
                    interned.insert(target.clone(), t);
                    worklist.push_back(target);
                    t
                }
            };
            dfa.add_transition(id, label, target_id);
        }
    }

    dfa
}

/// Remove states that are unreachable from the start or cannot reach a final
/// state, renumbering the survivors densely
fn trim(dfa: &Nfa) -> Nfa {
    let n = dfa.num_states;
    let mut fwd: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (src, _, dst) in &dfa.transitions {
        fwd[*src].push(*dst);
        rev[*dst].push(*src);
    }

    let reach = |seeds: &BTreeSet<usize>, adj: &[Vec<usize>]| -> Vec<bool> {
        let mut seen = vec![false; n];
        let mut queue: VecDeque<usize> = seeds.iter().copied().collect();
        for &s in seeds {
            seen[s] = true;
        }
        while let Some(s) = queue.pop_front() {
            for &t in &adj[s] {
                if !seen[t] {
                    seen[t] = true;
                    queue.push_back(t);
                }
            }
        }
        seen
    };
    let fwd_reach = reach(&dfa.start, &fwd);
    let bwd_reach = reach(&dfa.finals, &rev);

    let mut old_to_new: Vec<Option<usize>> = vec![None; n];
    let mut kept = 0;
    for i in 0..n {
        if fwd_reach[i] && bwd_reach[i] {
            old_to_new[i] = Some(kept);
            kept += 1;
        }
    }

    let mut out = Nfa::new(kept);
    for (src, label, dst) in &dfa.transitions {
        if let (Some(s), Some(d)) = (old_to_new[*src], old_to_new[*dst]) {
            out.add_transition(s, label.clone(), d);
        }
    }
    out.start = dfa.start.iter().filter_map(|&s| old_to_new[s]).collect();
    out.finals = dfa.finals.iter().filter_map(|&s| old_to_new[s]).collect();
    out
}

/// Minimize a deterministic automaton.
///
/// Trims useless states, then merges equivalent states by Moore partition
/// refinement. The result has the start state at index 0. An automaton with
/// an empty language becomes a single non-final start state.
pub fn minimize(dfa: &Nfa) -> Nfa {
    debug_assert!(dfa.is_deterministic(), "minimize expects a DFA");

    let trimmed = trim(dfa);
    let Some(&start) = trimmed.start.iter().next() else {
        return Nfa::new(1).with_start(0);
    };
    let n = trimmed.num_states;

    let mut delta: Vec<BTreeMap<&str, usize>> = vec![BTreeMap::new(); n];
    for (src, label, dst) in &trimmed.transitions {
        delta[*src].insert(label.as_str(), *dst);
    }

    let mut block: Vec<usize> = (0..n)
        .map(|s| usize::from(trimmed.finals.contains(&s)))
        .collect();
    let mut num_blocks = block.iter().collect::<BTreeSet<_>>().len();

    loop {
        let mut signatures: BTreeMap<(usize, Vec<(&str, usize)>), usize> = BTreeMap::new();
        let mut next = vec![0; n];
        for s in 0..n {
            let sig: Vec<(&str, usize)> = delta[s].iter().map(|(&l, &t)| (l, block[t])).collect();
            let fresh = signatures.len();
            next[s] = *signatures.entry((block[s], sig)).or_insert(fresh);
        }
        let refined = signatures.len();
        block = next;
        if refined == num_blocks {
            break;
        }
        num_blocks = refined;
    }

    // Renumber so that the start block is 0 and numbering follows BFS order
    let mut renumber: Vec<Option<usize>> = vec![None; num_blocks];
    let mut order = 0;
    let mut queue = VecDeque::from([start]);
    let mut visited = vec![false; n];
    visited[start] = true;
    while let Some(s) = queue.pop_front() {
        if renumber[block[s]].is_none() {
            renumber[block[s]] = Some(order);
            order += 1;
        }
        for &t in delta[s].values() {
            if !visited[t] {
                visited[t] = true;
                queue.push_back(t);
            }
        }
    }

    let class = |s: usize| renumber[block[s]].unwrap_or(0);
    let mut out = Nfa::new(order);
    let mut seen: BTreeSet<(usize, &str, usize)> = BTreeSet::new();
    for (src, label, dst) in &trimmed.transitions {
        let edge = (class(*src), label.as_str(), class(*dst));
        if seen.insert(edge) {
            out.add_transition(edge.0, label.clone(), edge.2);
        }
    }
    out.start.insert(class(start));
    out.finals = trimmed.finals.iter().map(|&s| class(s)).collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// (a|b)* a, written with redundant states
    fn ends_with_a() -> EpsilonNfa {
        let mut nfa = EpsilonNfa::default();
        let s0 = nfa.add_state();
        let s1 = nfa.add_state();
        let s2 = nfa.add_state();
        nfa.start = s0;
        nfa.add_symbol(s0, "a", s0);
        nfa.add_symbol(s0, "b", s0);
        nfa.add_epsilon(s0, s1);
        nfa.add_symbol(s1, "a", s2);
        nfa.finals.insert(s2);
        nfa
    }

    #[test]
    fn test_determinize() {
        let dfa = determinize(&ends_with_a());
        assert!(dfa.is_deterministic());
        assert!(dfa.accepts(&["a"]));
        assert!(dfa.accepts(&["b", "b", "a"]));
        assert!(!dfa.accepts(&["a", "b"]));
        assert!(!dfa.accepts(&[]));
    }

    #[test]
    fn test_minimize_merges_equivalent_states() {
        // two parallel branches accepting "x"
        let dfa = Nfa::new(4)
            .with_transition(0, "a", 1)
            .with_transition(0, "b", 2)
            .with_transition(1, "x", 3)
            .with_transition(2, "x", 3)
            .with_start(0)
            .with_final(3);
        let min = minimize(&dfa);
        assert_eq!(min.num_states, 3);
        assert_eq!(min.start, BTreeSet::from([0]));
        assert!(min.accepts(&["a", "x"]));
        assert!(min.accepts(&["b", "x"]));
        assert!(!min.accepts(&["x"]));
    }

    #[test]
    fn test_minimize_drops_dead_states() {
        let dfa = Nfa::new(3)
            .with_transition(0, "a", 1)
            .with_transition(0, "b", 2)
            .with_start(0)
            .with_final(1);
        let min = minimize(&dfa);
        assert_eq!(min.num_states, 2);
        assert!(!min.labels().contains("b"));
    }

    #[test]
    fn test_minimize_empty_language() {
        let dfa = Nfa::new(2).with_transition(0, "a", 1).with_start(0);
        let min = minimize(&dfa);
        assert_eq!(min.num_states, 1);
        assert!(min.finals.is_empty());
        assert!(min.transitions.is_empty());
    }

    #[test]
    fn test_minimize_cycle() {
        let dfa = determinize(&ends_with_a());
        let min = minimize(&dfa);
        assert_eq!(min.num_states, 2);
        for w in [vec!["a"], vec!["b", "a"], vec!["a", "b"], vec!["a", "a", "b", "a"]] {
            assert_eq!(min.accepts(&w), dfa.accepts(&w));
        }
    }
}
