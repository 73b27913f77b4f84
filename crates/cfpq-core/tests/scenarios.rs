//! End-to-end path query scenarios through the query engine

use std::collections::HashSet;

use cfpq_core::{
    Algorithm, Backend, BooleanAutomaton, Cfg, Error, GraphData, LabeledGraph, Nfa, PairSet, PathQuery, QueryEngine,
    QueryLimits, Rsm,
};

const CFPQ_ALGORITHMS: [Algorithm; 4] = [Algorithm::Hellings, Algorithm::Matrix, Algorithm::Tensor, Algorithm::Gll];

fn pairs(p: &[(u32, u32)]) -> PairSet<u32> {
    p.iter().copied().collect()
}

#[test]
fn test_single_edge_regex() {
    let graph = LabeledGraph::from_edges([(0u32, "a", 1)]);
    for algorithm in Algorithm::ALL {
        let result = QueryEngine::execute(&PathQuery::regex("a").with_algorithm(algorithm), &graph).unwrap();
        assert_eq!(result.pairs, pairs(&[(0, 1)]), "{}", algorithm);
    }
}

#[test]
fn test_star_on_three_cycle() {
    let graph = LabeledGraph::from_edges([(0u32, "b", 1), (1, "b", 2), (2, "b", 0)]);
    let all: PairSet<u32> = (0..3).flat_map(|i| (0..3).map(move |j| (i, j))).collect();
    for algorithm in Algorithm::ALL {
        for backend in [Backend::Sparse, Backend::Dense] {
            let query = PathQuery::regex("b*").with_algorithm(algorithm).with_backend(backend);
            let result = QueryEngine::execute(&query, &graph).unwrap();
            assert_eq!(result.pairs, all, "{} / {:?}", algorithm, backend);
        }
    }
}

#[test]
fn test_anbn_from_zero_to_zero() {
    let graph = LabeledGraph::from_edges([(0u32, "a", 1), (1, "b", 0)]);
    let grammar = Cfg::parse("S -> a S b | $").unwrap();
    for algorithm in CFPQ_ALGORITHMS {
        let query = PathQuery::grammar(grammar.clone())
            .from_nodes([0])
            .to_nodes([0])
            .with_algorithm(algorithm);
        let result = QueryEngine::execute(&query, &graph).unwrap();
        assert_eq!(result.pairs, pairs(&[(0, 0)]), "{}", algorithm);
    }
}

#[test]
fn test_empty_graph() {
    let graph: LabeledGraph<u32> = LabeledGraph::new();
    let grammar = Cfg::parse("S -> a S b | $").unwrap();
    for algorithm in Algorithm::ALL {
        let result = QueryEngine::execute(&PathQuery::regex("a*").with_algorithm(algorithm), &graph).unwrap();
        assert!(result.pairs.is_empty(), "{}", algorithm);
    }
    for algorithm in CFPQ_ALGORITHMS {
        let result = QueryEngine::execute(&PathQuery::grammar(grammar.clone()).with_algorithm(algorithm), &graph).unwrap();
        assert!(result.pairs.is_empty(), "{}", algorithm);
    }
}

#[test]
fn test_epsilon_grammar_on_isolated_nodes() {
    let graph = (0..4u32).fold(LabeledGraph::new(), |g, n| g.with_node(n));
    let grammar = Cfg::parse("S -> $").unwrap();
    for algorithm in CFPQ_ALGORITHMS {
        let result = QueryEngine::execute(&PathQuery::grammar(grammar.clone()).with_algorithm(algorithm), &graph).unwrap();
        assert_eq!(result.pairs, pairs(&[(0, 0), (1, 1), (2, 2), (3, 3)]), "{}", algorithm);
    }
}

#[test]
fn test_same_generation_over_json_graph() {
    // Classic same-generation query over subClassOf / type and their inverses
    let json = r#"{
        "nodes": ["thing", "animal", "plant", "dog", "oak"],
        "edges": [
            {"src": "animal", "label": "subClassOf", "dst": "thing"},
            {"src": "thing", "label": "subClassOf_r", "dst": "animal"},
            {"src": "plant", "label": "subClassOf", "dst": "thing"},
            {"src": "thing", "label": "subClassOf_r", "dst": "plant"},
            {"src": "dog", "label": "subClassOf", "dst": "animal"},
            {"src": "animal", "label": "subClassOf_r", "dst": "dog"},
            {"src": "oak", "label": "subClassOf", "dst": "plant"},
            {"src": "plant", "label": "subClassOf_r", "dst": "oak"}
        ]
    }"#;
    let data: GraphData<String> = serde_json::from_str(json).unwrap();
    let graph = LabeledGraph::from(data);
    let grammar = Cfg::parse("S -> subClassOf S subClassOf_r | subClassOf subClassOf_r").unwrap();

    let mut answers = Vec::new();
    for algorithm in CFPQ_ALGORITHMS {
        let query = PathQuery::grammar(grammar.clone()).from_nodes(["dog".to_string()]).with_algorithm(algorithm);
        answers.push(QueryEngine::execute(&query, &graph).unwrap().pairs);
    }
    let expected: PairSet<String> = [("dog", "dog"), ("dog", "oak")]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    for answer in answers {
        assert_eq!(answer, expected);
    }
}

#[test]
fn test_rsm_query_with_every_algorithm() {
    let graph = LabeledGraph::from_edges([(0u32, "a", 1), (1, "a", 2), (2, "b", 3), (3, "b", 4), (2, "c", 2)]);
    let rsm = Rsm::parse_ecfg("S -> a S? c* b").unwrap();
    let expected = pairs(&[(1, 3), (0, 4)]);
    for algorithm in CFPQ_ALGORITHMS {
        let result = QueryEngine::execute(&PathQuery::rsm(rsm.clone()).with_algorithm(algorithm), &graph).unwrap();
        assert_eq!(result.pairs, expected, "{}", algorithm);
    }
}

#[test]
fn test_unknown_nodes_rejected_by_every_algorithm() {
    let graph = LabeledGraph::from_edges([(0u32, "a", 1)]);
    for algorithm in Algorithm::ALL {
        let query = PathQuery::regex("a").to_nodes([5]).with_algorithm(algorithm);
        assert!(matches!(
            QueryEngine::execute(&query, &graph),
            Err(Error::UnknownNode(_))
        ));
    }
}

#[test]
fn test_iteration_cap_stops_dense_cycle() {
    let mut graph = LabeledGraph::new();
    for i in 0..20u32 {
        graph.add_edge(i, "a", (i + 1) % 20);
        graph.add_edge(i, "b", (i + 7) % 20);
    }
    let grammar = Cfg::parse("S -> a S b | S S | $").unwrap();
    for algorithm in CFPQ_ALGORITHMS {
        let query = PathQuery::grammar(grammar.clone())
            .with_algorithm(algorithm)
            .with_limits(QueryLimits::new().with_max_iterations(3));
        assert!(
            matches!(QueryEngine::execute(&query, &graph), Err(Error::LimitExceeded { .. })),
            "{}",
            algorithm
        );
    }
}

#[test]
fn test_intersection_accepts_common_words() {
    // (a | b)* b  ∩  a* b*
    let left = Nfa::new(2)
        .with_transition(0, "a", 0)
        .with_transition(0, "b", 0)
        .with_transition(0, "b", 1)
        .with_start(0)
        .with_final(1);
    let right = Nfa::new(2)
        .with_transition(0, "a", 0)
        .with_transition(0, "b", 1)
        .with_transition(1, "b", 1)
        .with_start(0)
        .with_final(1);
    let product = BooleanAutomaton::<cfpq_core::SparseBoolMatrix>::from_nfa(&left)
        .intersect(&BooleanAutomaton::from_nfa(&right));

    assert!(product.accepts(&["b"]));
    assert!(product.accepts(&["a", "a", "b", "b"]));
    assert!(!product.accepts(&["b", "a", "b"]));
    assert!(!product.accepts(&["a"]));
    assert!(!product.is_empty());

    let words: HashSet<Vec<&str>> = [vec!["a", "b"], vec!["b", "b"], vec!["a", "b", "a"]].into_iter().collect();
    for w in &words {
        assert_eq!(product.accepts(w), left.accepts(w) && right.accepts(w), "{:?}", w);
    }
}
