//! Context-free grammars and weak Chomsky normal form
//!
//! Text format, one rule per line:
//!
//! ```text
//! # comment
//! S -> a S b | $
//! S -> S S
//! ```
//!
//! Symbols are separated by whitespace. `$`, `epsilon` or an empty
//! alternative denote the empty word. A symbol is a variable iff it appears as
//! the head of some rule. The first head is the start symbol.

use std::collections::{BTreeMap, BTreeSet};

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char as pchar, multispace0};
use nom::combinator::all_consuming;
use nom::multi::{many0, separated_list1};
use nom::sequence::{delimited, tuple};
use nom::IResult;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::MAX_PRODUCTIONS;

/// Grammar symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    Terminal(String),
    Variable(String),
}

impl Symbol {
    pub fn terminal(s: impl Into<String>) -> Self {
        Self::Terminal(s.into())
    }

    pub fn variable(s: impl Into<String>) -> Self {
        Self::Variable(s.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Terminal(s) | Self::Variable(s) => s,
        }
    }
}

/// `head → body`; an empty body is an epsilon production
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Production {
    pub head: String,
    pub body: Vec<Symbol>,
}

impl Production {
    pub fn new(head: impl Into<String>, body: Vec<Symbol>) -> Self {
        Self {
            head: head.into(),
            body,
        }
    }
}

/// Context-free grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfg {
    start: String,
    productions: Vec<Production>,
}

impl Cfg {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            productions: Vec::new(),
        }
    }

    pub fn add_production(&mut self, production: Production) {
        self.productions.push(production);
    }

    pub fn with_production(mut self, head: impl Into<String>, body: Vec<Symbol>) -> Self {
        self.add_production(Production::new(head, body));
        self
    }

    /// Replace the start symbol
    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = start.into();
        self
    }

    /// Parse grammar text (see module docs)
    pub fn parse(text: &str) -> Result<Self> {
        let mut rules: Vec<(String, Vec<Vec<String>>)> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (_, (head, _, alternatives)) = all_consuming(rule)(line).map_err(|e| {
                Error::MalformedQuery(format!("grammar line {}: {:?}: {e:?}", lineno + 1, line))
            })?;
            rules.push((
                head.to_string(),
                alternatives
                    .into_iter()
                    .map(|body| body.into_iter().map(str::to_string).collect())
                    .collect(),
            ));
        }

        let Some((start, _)) = rules.first() else {
            return Err(Error::MalformedQuery("grammar has no rules".to_string()));
        };
        let heads: BTreeSet<&str> = rules.iter().map(|(h, _)| h.as_str()).collect();

        let mut cfg = Cfg::new(start.clone());
        for (head, alternatives) in &rules {
            for symbols in alternatives {
                let body = symbols
                    .iter()
                    .filter(|s| !is_epsilon(s))
                    .map(|s| {
                        if heads.contains(s.as_str()) {
                            Symbol::Variable(s.clone())
                        } else {
                            Symbol::Terminal(s.clone())
                        }
                    })
                    .collect();
                cfg.add_production(Production::new(head.clone(), body));
            }
        }

        if cfg.productions.len() > MAX_PRODUCTIONS {
            return Err(Error::Validation(format!(
                "too many productions: {} (max {})",
                cfg.productions.len(),
                MAX_PRODUCTIONS
            )));
        }
        Ok(cfg)
    }

    pub fn start_symbol(&self) -> &str {
        &self.start
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Heads, body variables and the start symbol
    pub fn variables(&self) -> BTreeSet<&str> {
        let mut vars: BTreeSet<&str> = BTreeSet::from([self.start.as_str()]);
        for p in &self.productions {
            vars.insert(&p.head);
            for s in &p.body {
                if let Symbol::Variable(v) = s {
                    vars.insert(v);
                }
            }
        }
        vars
    }

    pub fn terminals(&self) -> BTreeSet<&str> {
        self.productions
            .iter()
            .flat_map(|p| p.body.iter())
            .filter_map(|s| match s {
                Symbol::Terminal(t) => Some(t.as_str()),
                Symbol::Variable(_) => None,
            })
            .collect()
    }

    /// Variables deriving the empty word
    pub fn nullable(&self) -> BTreeSet<String> {
        nullable_set(&self.productions)
    }

    /// Convert to weak Chomsky normal form.
    ///
    /// Every production of the result is `A → ε`, `A → t` or `A → B C`, and
    /// every variable of this grammar keeps its language, including the empty
    /// word: the nullable set is computed up front and an explicit `A → ε` is
    /// emitted for each nullable variable.
    pub fn to_weak_cnf(&self) -> WeakCnf {
        let nullable = self.nullable();
        let mut names = FreshNames::new(self);

        // TERM: terminals inside long bodies get their own variable
        let mut term_vars: BTreeMap<String, String> = BTreeMap::new();
        let mut productions: Vec<Production> = Vec::new();
        for p in &self.productions {
            if p.body.len() < 2 {
                productions.push(p.clone());
                continue;
            }
            let body = p
                .body
                .iter()
                .map(|s| match s {
                    Symbol::Terminal(t) => {
                        let var = term_vars
                            .entry(t.clone())
                            .or_insert_with(|| names.fresh(&format!("{}#T", t)))
                            .clone();
                        Symbol::Variable(var)
                    }
                    v => v.clone(),
                })
                .collect();
            productions.push(Production::new(p.head.clone(), body));
        }
        for (t, var) in &term_vars {
            productions.push(Production::new(var.clone(), vec![Symbol::terminal(t.clone())]));
        }

        // BIN: split long bodies into chains
        let mut binarized: Vec<Production> = Vec::new();
        for p in productions {
            if p.body.len() <= 2 {
                binarized.push(p);
                continue;
            }
            let mut head = p.head.clone();
            let last = p.body.len() - 2;
            for (i, sym) in p.body[..last].iter().enumerate() {
                let next = names.fresh(&format!("{}#{}", p.head, i + 1));
                binarized.push(Production::new(head, vec![sym.clone(), Symbol::Variable(next.clone())]));
                head = next;
            }
            binarized.push(Production::new(head, p.body[last..].to_vec()));
        }

        // UNIT: A →* B by unit productions, then copy B's non-unit bodies to A
        let is_unit = |p: &Production| matches!(p.body.as_slice(), [Symbol::Variable(_)]);
        let mut unit_pairs: BTreeSet<(String, String)> = BTreeSet::new();
        for p in &binarized {
            unit_pairs.insert((p.head.clone(), p.head.clone()));
        }
        unit_pairs.insert((self.start.clone(), self.start.clone()));
        loop {
            let mut added = Vec::new();
            for (a, b) in &unit_pairs {
                for p in binarized.iter().filter(|p| &p.head == b && is_unit(p)) {
                    let c = p.body[0].name().to_string();
                    if !unit_pairs.contains(&(a.clone(), c.clone())) {
                        added.push((a.clone(), c));
                    }
                }
            }
            if added.is_empty() {
                break;
            }
            unit_pairs.extend(added);
        }

        let mut result: BTreeSet<Production> = BTreeSet::new();
        for (a, b) in &unit_pairs {
            for p in binarized.iter().filter(|p| &p.head == b && !is_unit(p)) {
                result.insert(Production::new(a.clone(), p.body.clone()));
            }
        }

        for v in &nullable {
            result.insert(Production::new(v.clone(), Vec::new()));
        }

        WeakCnf::from_productions(&self.start, result)
    }
}

fn nullable_set(productions: &[Production]) -> BTreeSet<String> {
    let mut nullable: BTreeSet<String> = BTreeSet::new();
    loop {
        let before = nullable.len();
        for p in productions {
            if nullable.contains(&p.head) {
                continue;
            }
            let all_nullable = p.body.iter().all(|s| match s {
                Symbol::Variable(v) => nullable.contains(v),
                Symbol::Terminal(_) => false,
            });
            if all_nullable {
                nullable.insert(p.head.clone());
            }
        }
        if nullable.len() == before {
            return nullable;
        }
    }
}

fn is_epsilon(s: &str) -> bool {
    s == "$" || s == "epsilon"
}

/// Generator of variable names that do not clash with any grammar symbol
pub(crate) struct FreshNames {
    taken: BTreeSet<String>,
}

impl FreshNames {
    pub(crate) fn new(cfg: &Cfg) -> Self {
        let mut taken: BTreeSet<String> = cfg.variables().into_iter().map(str::to_string).collect();
        taken.extend(cfg.terminals().into_iter().map(str::to_string));
        Self { taken }
    }

    pub(crate) fn from_taken(taken: impl IntoIterator<Item = String>) -> Self {
        Self {
            taken: taken.into_iter().collect(),
        }
    }

    pub(crate) fn fresh(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        while self.taken.contains(&name) {
            name.push('\'');
        }
        self.taken.insert(name.clone());
        name
    }
}

/// Grammar in weak Chomsky normal form with variables interned as indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakCnf {
    variables: Vec<String>,
    start: usize,
    /// Variables with `A → ε`
    pub epsilon: BTreeSet<usize>,
    /// `A → t`
    pub terminal: Vec<(usize, String)>,
    /// `A → B C`
    pub binary: Vec<(usize, usize, usize)>,
}

impl WeakCnf {
    fn from_productions(start: &str, productions: BTreeSet<Production>) -> Self {
        let mut variables: Vec<String> = vec![start.to_string()];
        let mut ids: BTreeMap<String, usize> = BTreeMap::from([(start.to_string(), 0)]);
        let mut intern = |name: &str, variables: &mut Vec<String>| -> usize {
            if let Some(&id) = ids.get(name) {
                return id;
            }
            variables.push(name.to_string());
            ids.insert(name.to_string(), variables.len() - 1);
            variables.len() - 1
        };

        let mut cnf = Self {
            variables: Vec::new(),
            start: 0,
            epsilon: BTreeSet::new(),
            terminal: Vec::new(),
            binary: Vec::new(),
        };
        for p in &productions {
            let head = intern(&p.head, &mut variables);
            match p.body.as_slice() {
                [] => {
                    cnf.epsilon.insert(head);
                }
                [Symbol::Terminal(t)] => cnf.terminal.push((head, t.clone())),
                [Symbol::Variable(b), Symbol::Variable(c)] => {
                    let b = intern(b, &mut variables);
                    let c = intern(c, &mut variables);
                    cnf.binary.push((head, b, c));
                }
                other => unreachable!("production body not in weak CNF: {:?}", other),
            }
        }
        cnf.variables = variables;
        cnf
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn start_symbol(&self) -> &str {
        &self.variables[self.start]
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn variable_name(&self, id: usize) -> &str {
        &self.variables[id]
    }

    pub fn variable_id(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    pub fn num_productions(&self) -> usize {
        self.epsilon.len() + self.terminal.len() + self.binary.len()
    }
}

fn rule(input: &str) -> IResult<&str, (&str, &str, Vec<Vec<&str>>)> {
    tuple((
        ws(grammar_symbol),
        alt((tag("->"), tag("::="))),
        separated_list1(pchar('|'), many0(ws(grammar_symbol))),
    ))(input)
}

fn grammar_symbol(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != '|')(input)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}
