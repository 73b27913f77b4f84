//! cfpq Core - Regular and context-free path queries over labeled graphs
//!
//! This crate answers path queries: given a labeled directed graph and a
//! regular expression, context-free grammar or recursive state machine, it
//! computes the node pairs connected by a path whose label word belongs to
//! the query language.
//!
//! Automata are stored as per-label boolean matrices ([`BooleanAutomaton`])
//! over a pluggable [`BoolMatrix`] backend. Regular queries are answered by
//! Kronecker intersection and transitive closure; context-free queries by one
//! of four interchangeable solvers (Hellings, matrix, tensor, GLL).

pub mod automaton;
pub mod cfpq;
pub mod dfa;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod limits;
pub mod matrix;
pub mod query;
pub mod regex;
pub mod rpq;
pub mod rsm;

pub use automaton::{BooleanAutomaton, Nfa};
pub use cfpq::{CfpqSolver, GllSolver, HellingsSolver, MatrixSolver, TensorSolver, Triples};
pub use error::{Error, Result};
pub use grammar::{Cfg, Production, Symbol, WeakCnf};
pub use graph::{Edge, GraphData, GraphIndex, LabeledGraph, NodeId};
pub use limits::{CancellationToken, QueryContext, QueryLimits};
pub use matrix::{BoolMatrix, DenseBoolMatrix, SparseBoolMatrix};
pub use query::{Algorithm, Backend, PathQuery, QueryEngine, QueryLanguage, QueryResult, QueryStats};
pub use regex::{compile_regex, Regex};
pub use rpq::{PairSet, RpqSolver};
pub use rsm::{FlatRsm, Rsm};
