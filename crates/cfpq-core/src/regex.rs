//! Regular expressions over edge labels
//!
//! Syntax: symbols are runs of characters other than whitespace and
//! `| * + ? ( ) . $`. Concatenation is juxtaposition (whitespace) or `.`,
//! `|` is union, postfix `*`, `+` and `?` are repetition, and `$` or the word
//! `epsilon` denotes the empty word.

use std::collections::BTreeSet;

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char as pchar, multispace0, one_of};
use nom::combinator::{all_consuming, map, opt};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use crate::automaton::Nfa;
use crate::dfa::{determinize, minimize, EpsilonNfa};
use crate::error::{Error, Result};
use crate::limits::MAX_REGEX_LEN;

/// Regular expression AST
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Regex {
    /// The empty language
    Empty,
    /// The empty word
    Epsilon,
    Symbol(String),
    Concat(Vec<Regex>),
    Union(Vec<Regex>),
    Star(Box<Regex>),
    Plus(Box<Regex>),
    Optional(Box<Regex>),
}

impl Regex {
    pub fn symbol(s: impl Into<String>) -> Self {
        Self::Symbol(s.into())
    }

    /// Parse regex text
    pub fn parse(input: &str) -> Result<Self> {
        if input.len() > MAX_REGEX_LEN {
            return Err(Error::Validation(format!(
                "regex too long: {} chars (max {})",
                input.len(),
                MAX_REGEX_LEN
            )));
        }
        let (_, regex) = all_consuming(ws(alternation))(input)
            .map_err(|e| Error::MalformedQuery(format!("failed to parse regex {:?}: {e:?}", input)))?;
        Ok(regex)
    }

    /// All symbols mentioned in the expression
    pub fn symbols(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Empty | Self::Epsilon => {}
            Self::Symbol(s) => {
                out.insert(s.as_str());
            }
            Self::Concat(parts) | Self::Union(parts) => {
                for p in parts {
                    p.collect_symbols(out);
                }
            }
            Self::Star(inner) | Self::Plus(inner) | Self::Optional(inner) => inner.collect_symbols(out),
        }
    }

    /// Thompson construction
    pub fn to_epsilon_nfa(&self) -> EpsilonNfa {
        let mut nfa = EpsilonNfa::default();
        let (start, end) = self.build(&mut nfa);
        nfa.start = start;
        nfa.finals.insert(end);
        nfa
    }

    fn build(&self, nfa: &mut EpsilonNfa) -> (usize, usize) {
        let s = nfa.add_state();
        let e = nfa.add_state();
        match self {
            Self::Empty => {}
            Self::Epsilon => nfa.add_epsilon(s, e),
            Self::Symbol(label) => nfa.add_symbol(s, label, e),
            Self::Concat(parts) => {
                let mut last = s;
                for p in parts {
                    let (ps, pe) = p.build(nfa);
                    nfa.add_epsilon(last, ps);
                    last = pe;
                }
                nfa.add_epsilon(last, e);
            }
            Self::Union(parts) => {
                for p in parts {
                    let (ps, pe) = p.build(nfa);
                    nfa.add_epsilon(s, ps);
                    nfa.add_epsilon(pe, e);
                }
            }
            Self::Star(inner) => {
                let (is, ie) = inner.build(nfa);
                nfa.add_epsilon(s, is);
                nfa.add_epsilon(s, e);
                nfa.add_epsilon(ie, is);
                nfa.add_epsilon(ie, e);
            }
            Self::Plus(inner) => {
                let (is, ie) = inner.build(nfa);
                nfa.add_epsilon(s, is);
                nfa.add_epsilon(ie, is);
                nfa.add_epsilon(ie, e);
            }
            Self::Optional(inner) => {
                let (is, ie) = inner.build(nfa);
                nfa.add_epsilon(s, is);
                nfa.add_epsilon(s, e);
                nfa.add_epsilon(ie, e);
            }
        }
        (s, e)
    }

    /// Minimal DFA accepting the same language
    pub fn to_dfa(&self) -> Nfa {
        minimize(&determinize(&self.to_epsilon_nfa()))
    }
}

/// Parse regex text and compile it to a minimal DFA
pub fn compile_regex(input: &str) -> Result<Nfa> {
    let regex = Regex::parse(input)?;
    let dfa = regex.to_dfa();
    tracing::trace!("Compiled regex {:?} to DFA with {} states", input, dfa.num_states);
    Ok(dfa)
}

fn alternation(input: &str) -> IResult<&str, Regex> {
    map(separated_list1(ws(pchar('|')), concatenation), mk_union)(input)
}

fn concatenation(input: &str) -> IResult<&str, Regex> {
    map(many1(preceded(opt(ws(pchar('.'))), repetition)), mk_concat)(input)
}

fn repetition(input: &str) -> IResult<&str, Regex> {
    map(
        tuple((ws(atom), many0(ws(one_of("*+?"))))),
        |(atom, ops)| {
            ops.into_iter().fold(atom, |acc, op| match op {
                '*' => Regex::Star(Box::new(acc)),
                '+' => Regex::Plus(Box::new(acc)),
                _ => Regex::Optional(Box::new(acc)),
            })
        },
    )(input)
}

fn atom(input: &str) -> IResult<&str, Regex> {
    alt((
        map(tag("$"), |_| Regex::Epsilon),
        delimited(ws(pchar('(')), alternation, ws(pchar(')'))),
        map(symbol, |s: &str| {
            if s == "epsilon" {
                Regex::Epsilon
            } else {
                Regex::symbol(s)
            }
        }),
    ))(input)
}

fn symbol(input: &str) -> IResult<&str, &str> {
    take_while1(is_symbol_char)(input)
}

pub(crate) fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '|' | '*' | '+' | '?' | '(' | ')' | '.' | '$')
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn mk_concat(parts: Vec<Regex>) -> Regex {
    let mut out: Vec<Regex> = Vec::new();
    for p in parts {
        match p {
            Regex::Epsilon => {}
            Regex::Concat(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
    match out.len() {
        0 => Regex::Epsilon,
        1 => out.remove(0),
        _ => Regex::Concat(out),
    }
}

fn mk_union(parts: Vec<Regex>) -> Regex {
    let mut out: Vec<Regex> = Vec::new();
    for p in parts {
        match p {
            Regex::Union(inner) => out.extend(inner),
            other => out.push(other),
        }
    }
    match out.len() {
        1 => out.remove(0),
        _ => Regex::Union(out),
    }
}
