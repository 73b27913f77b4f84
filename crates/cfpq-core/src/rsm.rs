//! Recursive state machines
//!
//! An RSM holds one automaton ("box") per nonterminal. Box transitions are
//! labeled with terminals or with nonterminal names; a label is a call iff it
//! names a box.

use std::collections::{BTreeMap, BTreeSet};

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::multispace0;
use nom::combinator::rest;
use nom::sequence::{delimited, tuple};
use nom::IResult;

use crate::automaton::{BooleanAutomaton, Nfa};
use crate::error::{Error, Result};
use crate::grammar::{Cfg, FreshNames, Symbol};
use crate::matrix::BoolMatrix;
use crate::regex::{is_symbol_char, Regex};

/// Recursive state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsm {
    start: String,
    boxes: BTreeMap<String, Nfa>,
}

impl Rsm {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            boxes: BTreeMap::new(),
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = start.into();
        self
    }

    /// Add (or replace) the box of a nonterminal
    pub fn with_box(mut self, nonterminal: impl Into<String>, automaton: Nfa) -> Self {
        self.boxes.insert(nonterminal.into(), automaton);
        self
    }

    /// One minimal-DFA box per variable, accepting the union of its bodies
    pub fn from_cfg(cfg: &Cfg) -> Self {
        let mut bodies: BTreeMap<&str, Vec<Regex>> = cfg
            .variables()
            .into_iter()
            .map(|v| (v, Vec::new()))
            .collect();
        for p in cfg.productions() {
            let body = Regex::Concat(p.body.iter().map(|s| Regex::symbol(s.name())).collect());
            bodies.entry(p.head.as_str()).or_default().push(body);
        }

        let mut rsm = Rsm::new(cfg.start_symbol());
        for (var, alternatives) in bodies {
            let regex = if alternatives.is_empty() {
                Regex::Empty
            } else {
                Regex::Union(alternatives)
            };
            rsm.boxes.insert(var.to_string(), regex.to_dfa());
        }
        rsm
    }

    /// Single-box RSM for a regular expression
    pub fn from_regex(regex: &Regex) -> Self {
        let mut names = FreshNames::from_taken(regex.symbols().into_iter().map(str::to_string));
        let start = names.fresh("S");
        Rsm::new(start.clone()).with_box(start, regex.to_dfa())
    }

    /// Parse extended CFG text: one `HEAD -> regex` rule per line.
    ///
    /// Repeated heads are unioned; the first head is the start symbol.
    pub fn parse_ecfg(text: &str) -> Result<Self> {
        let mut rules: Vec<(String, Regex)> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (_, (head, _, body)) = ecfg_rule(line).map_err(|e| {
                Error::MalformedQuery(format!("ecfg line {}: {:?}: {e:?}", lineno + 1, line))
            })?;
            let regex = if body.trim().is_empty() {
                Regex::Epsilon
            } else {
                Regex::parse(body)?
            };
            rules.push((head.to_string(), regex));
        }

        let Some((start, _)) = rules.first() else {
            return Err(Error::MalformedQuery("ecfg has no rules".to_string()));
        };

        let mut grouped: BTreeMap<String, Vec<Regex>> = BTreeMap::new();
        for (head, regex) in &rules {
            grouped.entry(head.clone()).or_default().push(regex.clone());
        }
        let mut rsm = Rsm::new(start.clone());
        for (head, alternatives) in grouped {
            rsm.boxes.insert(head, Regex::Union(alternatives).to_dfa());
        }
        Ok(rsm)
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    pub fn boxes(&self) -> &BTreeMap<String, Nfa> {
        &self.boxes
    }

    pub fn get_box(&self, nonterminal: &str) -> Option<&Nfa> {
        self.boxes.get(nonterminal)
    }

    pub fn is_nonterminal(&self, label: &str) -> bool {
        self.boxes.contains_key(label)
    }

    /// Labels used by the boxes that are not nonterminals
    pub fn terminals(&self) -> BTreeSet<&str> {
        self.boxes
            .values()
            .flat_map(|b| b.labels())
            .filter(|l| !self.is_nonterminal(l))
            .collect()
    }

    /// Every box needs exactly one start state and only in-range states, and
    /// the start symbol needs a box
    pub fn validate(&self) -> Result<()> {
        if !self.boxes.contains_key(&self.start) {
            return Err(Error::Validation(format!(
                "start nonterminal {} has no box",
                self.start
            )));
        }
        for (name, b) in &self.boxes {
            if b.start.len() != 1 {
                return Err(Error::Validation(format!(
                    "box {} must have exactly one start state (has {})",
                    name,
                    b.start.len()
                )));
            }
            let referenced = b
                .start
                .iter()
                .chain(&b.finals)
                .copied()
                .chain(b.transitions.iter().flat_map(|(src, _, dst)| [*src, *dst]));
            if let Some(state) = referenced.filter(|&q| q >= b.num_states).max() {
                return Err(Error::Validation(format!(
                    "box {} refers to state {} but has {} states",
                    name, state, b.num_states
                )));
            }
        }
        Ok(())
    }

    /// Equivalent grammar with one variable per box state.
    ///
    /// `X → X#q0` for the box start, `X#q → l X#q'` per transition (`l` a
    /// variable when it names a box) and `X#q → ε` for final states.
    pub fn to_cfg(&self) -> Cfg {
        let mut taken: BTreeSet<String> = self.boxes.keys().cloned().collect();
        for b in self.boxes.values() {
            taken.extend(b.labels().into_iter().map(str::to_string));
        }
        let mut names = FreshNames::from_taken(taken);

        let mut cfg = Cfg::new(self.start.clone());
        for (name, b) in &self.boxes {
            let state_vars: Vec<String> = (0..b.num_states)
                .map(|q| names.fresh(&format!("{}#{}", name, q)))
                .collect();
            for &s in &b.start {
                cfg = cfg.with_production(name.clone(), vec![Symbol::Variable(state_vars[s].clone())]);
            }
            for (src, label, dst) in &b.transitions {
                let sym = if self.is_nonterminal(label) {
                    Symbol::Variable(label.clone())
                } else {
                    Symbol::Terminal(label.clone())
                };
                cfg = cfg.with_production(
                    state_vars[*src].clone(),
                    vec![sym, Symbol::Variable(state_vars[*dst].clone())],
                );
            }
            for &f in &b.finals {
                cfg = cfg.with_production(state_vars[f].clone(), Vec::new());
            }
        }
        cfg
    }

    /// Index all box states into one dense state space
    pub fn flatten(&self) -> Result<FlatRsm> {
        self.validate()?;

        let names: Vec<String> = self.boxes.keys().cloned().collect();
        let box_ids: BTreeMap<&str, usize> = names.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();

        let mut offsets = Vec::with_capacity(names.len());
        let mut total = 0;
        for b in self.boxes.values() {
            offsets.push(total);
            total += b.num_states;
        }

        let mut flat = FlatRsm {
            names: names.clone(),
            start_box: box_ids[self.start.as_str()],
            box_start: Vec::with_capacity(names.len()),
            box_of: vec![0; total],
            is_final: vec![false; total],
            terminal_moves: vec![Vec::new(); total],
            call_moves: vec![Vec::new(); total],
            transitions: Vec::new(),
        };

        for (id, b) in self.boxes.values().enumerate() {
            let offset = offsets[id];
            for q in 0..b.num_states {
                flat.box_of[offset + q] = id;
            }
            // validate() guarantees exactly one start state
            let start = b.start.iter().next().copied().unwrap_or(0);
            flat.box_start.push(offset + start);
            for &f in &b.finals {
                flat.is_final[offset + f] = true;
            }
            for (src, label, dst) in &b.transitions {
                let (src, dst) = (offset + src, offset + dst);
                match box_ids.get(label.as_str()) {
                    Some(&callee) => flat.call_moves[src].push((callee, dst)),
                    None => flat.terminal_moves[src].push((label.clone(), dst)),
                }
                flat.transitions.push((src, label.clone(), dst));
            }
        }

        Ok(flat)
    }
}

/// RSM with all box states numbered `0..num_states()`
#[derive(Debug, Clone)]
pub struct FlatRsm {
    names: Vec<String>,
    start_box: usize,
    box_start: Vec<usize>,
    box_of: Vec<usize>,
    is_final: Vec<bool>,
    terminal_moves: Vec<Vec<(String, usize)>>,
    call_moves: Vec<Vec<(usize, usize)>>,
    transitions: Vec<(usize, String, usize)>,
}

impl FlatRsm {
    pub fn num_states(&self) -> usize {
        self.box_of.len()
    }

    pub fn num_boxes(&self) -> usize {
        self.names.len()
    }

    pub fn box_name(&self, id: usize) -> &str {
        &self.names[id]
    }

    pub fn start_box(&self) -> usize {
        self.start_box
    }

    /// Global index of the start state of a box
    pub fn box_start(&self, id: usize) -> usize {
        self.box_start[id]
    }

    pub fn box_of(&self, state: usize) -> usize {
        self.box_of[state]
    }

    pub fn is_final(&self, state: usize) -> bool {
        self.is_final[state]
    }

    /// True if the box accepts the empty word
    pub fn is_nullable(&self, id: usize) -> bool {
        self.is_final[self.box_start[id]]
    }

    /// `(terminal, target)` pairs leaving `state`
    pub fn terminal_moves(&self, state: usize) -> &[(String, usize)] {
        &self.terminal_moves[state]
    }

    /// `(callee box, return state)` pairs leaving `state`
    pub fn call_moves(&self, state: usize) -> &[(usize, usize)] {
        &self.call_moves[state]
    }

    /// All box transitions as one boolean automaton (nonterminal calls are
    /// ordinary labels)
    pub fn to_boolean_automaton<M: BoolMatrix>(&self) -> BooleanAutomaton<M> {
        let mut automaton = BooleanAutomaton::new(self.num_states());
        for (src, label, dst) in &self.transitions {
            automaton.add_transition(label, *src, *dst);
        }
        for (id, &s) in self.box_start.iter().enumerate() {
            automaton.set_start(s, id == self.start_box);
        }
        for (state, &f) in self.is_final.iter().enumerate() {
            automaton.set_final(state, f && self.box_of[state] == self.start_box);
        }
        automaton
    }
}

fn ecfg_rule(input: &str) -> IResult<&str, (&str, &str, &str)> {
    tuple((
        delimited(multispace0, take_while1(is_symbol_char), multispace0),
        alt((tag("->"), tag("::="))),
        rest,
    ))(input)
}
