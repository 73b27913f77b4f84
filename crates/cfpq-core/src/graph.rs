//! Labeled directed graphs and their node indexing

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Requirements on graph node identifiers
pub trait NodeId: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> NodeId for T {}

/// A labeled edge `src --label--> dst`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge<N> {
    pub src: N,
    pub label: String,
    pub dst: N,
}

impl<N> Edge<N> {
    pub fn new(src: N, label: impl Into<String>, dst: N) -> Self {
        Self {
            src,
            label: label.into(),
            dst,
        }
    }
}

/// Bijection between graph nodes and dense integer indices.
///
/// Indices follow insertion order.
#[derive(Debug, Clone)]
pub struct GraphIndex<N> {
    nodes: Vec<N>,
    positions: HashMap<N, usize>,
}

impl<N: NodeId> Default for GraphIndex<N> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

impl<N: NodeId> GraphIndex<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning its index (existing index if already present)
    pub fn insert(&mut self, node: N) -> usize {
        if let Some(&idx) = self.positions.get(&node) {
            return idx;
        }
        let idx = self.nodes.len();
        self.positions.insert(node.clone(), idx);
        self.nodes.push(node);
        idx
    }

    pub fn index_of(&self, node: &N) -> Option<usize> {
        self.positions.get(node).copied()
    }

    pub fn node(&self, idx: usize) -> &N {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolve an optional node subset into a membership mask.
    ///
    /// `None` selects every node. Any requested node that is not part of the
    /// graph is rejected with [`Error::UnknownNode`].
    pub fn mask(&self, selection: Option<&HashSet<N>>) -> Result<Vec<bool>> {
        let Some(selection) = selection else {
            return Ok(vec![true; self.len()]);
        };

        let mut mask = vec![false; self.len()];
        for node in selection {
            match self.index_of(node) {
                Some(idx) => mask[idx] = true,
                None => return Err(Error::UnknownNode(format!("{:?}", node))),
            }
        }
        Ok(mask)
    }
}

/// Directed multigraph with string edge labels
#[derive(Debug, Clone)]
pub struct LabeledGraph<N> {
    index: GraphIndex<N>,
    edges: Vec<Edge<N>>,
}

impl<N: NodeId> Default for LabeledGraph<N> {
    fn default() -> Self {
        Self {
            index: GraphIndex::new(),
            edges: Vec::new(),
        }
    }
}

impl<N: NodeId> LabeledGraph<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `(src, label, dst)` triples
    pub fn from_edges<L: Into<String>>(edges: impl IntoIterator<Item = (N, L, N)>) -> Self {
        let mut graph = Self::new();
        for (src, label, dst) in edges {
            graph.add_edge(src, label, dst);
        }
        graph
    }

    pub fn add_node(&mut self, node: N) -> usize {
        self.index.insert(node)
    }

    /// Add an edge; its endpoints become nodes of the graph
    pub fn add_edge(&mut self, src: N, label: impl Into<String>, dst: N) {
        self.index.insert(src.clone());
        self.index.insert(dst.clone());
        self.edges.push(Edge::new(src, label, dst));
    }

    pub fn with_node(mut self, node: N) -> Self {
        self.add_node(node);
        self
    }

    pub fn with_edge(mut self, src: N, label: impl Into<String>, dst: N) -> Self {
        self.add_edge(src, label, dst);
        self
    }

    pub fn index(&self) -> &GraphIndex<N> {
        &self.index
    }

    pub fn nodes(&self) -> &[N] {
        self.index.nodes()
    }

    pub fn edges(&self) -> &[Edge<N>] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, node: &N) -> bool {
        self.index.index_of(node).is_some()
    }

    /// Distinct edge labels
    pub fn labels(&self) -> BTreeSet<&str> {
        self.edges.iter().map(|e| e.label.as_str()).collect()
    }

    /// Edges with both endpoints replaced by their indices
    pub fn indexed_edges(&self) -> Vec<(usize, &str, usize)> {
        self.edges
            .iter()
            .filter_map(|e| {
                let src = self.index.index_of(&e.src)?;
                let dst = self.index.index_of(&e.dst)?;
                Some((src, e.label.as_str(), dst))
            })
            .collect()
    }

    /// Outgoing adjacency: `adjacency[u][label]` lists successor indices
    pub fn adjacency(&self) -> Vec<HashMap<&str, Vec<usize>>> {
        let mut adjacency: Vec<HashMap<&str, Vec<usize>>> = vec![HashMap::new(); self.node_count()];
        for (src, label, dst) in self.indexed_edges() {
            adjacency[src].entry(label).or_default().push(dst);
        }
        adjacency
    }

    pub fn to_data(&self) -> GraphData<N> {
        GraphData {
            nodes: self.nodes().to_vec(),
            edges: self.edges.clone(),
        }
    }
}

impl LabeledGraph<String> {
    /// Parse a whitespace separated edge list, one `src label dst` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn parse_edge_list(text: &str) -> Result<Self> {
        let mut graph = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts.as_slice() {
                [src] => {
                    graph.add_node(src.to_string());
                }
                [src, label, dst] => {
                    graph.add_edge(src.to_string(), *label, dst.to_string());
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "line {}: expected `src label dst`, got {:?}",
                        lineno + 1,
                        line
                    )))
                }
            }
        }
        Ok(graph)
    }
}

impl<N: NodeId + DeserializeOwned> LabeledGraph<N> {
    /// Parse the JSON form `{"nodes": [...], "edges": [{"src", "label", "dst"}]}`
    pub fn from_json(text: &str) -> Result<Self> {
        let data: GraphData<N> = serde_json::from_str(text)?;
        Ok(data.into())
    }
}

impl LabeledGraph<String> {
    /// Read a graph file: `.json` as JSON, anything else as an edge list
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json")) {
            Self::from_json(&text)
        } else {
            Self::parse_edge_list(&text)
        }
    }
}

/// Serializable form of a [`LabeledGraph`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData<N> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<N>,
    pub edges: Vec<Edge<N>>,
}

impl<N: NodeId> From<GraphData<N>> for LabeledGraph<N> {
    fn from(data: GraphData<N>) -> Self {
        let mut graph = LabeledGraph::new();
        for node in data.nodes {
            graph.add_node(node);
        }
        for edge in data.edges {
            graph.add_edge(edge.src, edge.label, edge.dst);
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_builder() {
        let graph = LabeledGraph::new()
            .with_edge(0, "a", 1)
            .with_edge(1, "b", 2)
            .with_node(7);

        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.nodes(), &[0, 1, 2, 7]);
        assert!(graph.contains_node(&7));
        assert_eq!(graph.labels().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_index_is_bijective() {
        let graph = LabeledGraph::from_edges([("x", "a", "y"), ("y", "a", "x"), ("x", "b", "z")]);
        let index = graph.index();
        for (i, node) in index.nodes().iter().enumerate() {
            assert_eq!(index.index_of(node), Some(i));
            assert_eq!(index.node(i), node);
        }
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_mask_defaults_to_all_nodes() {
        let graph = LabeledGraph::from_edges([(0, "a", 1), (1, "a", 2)]);
        assert_eq!(graph.index().mask(None).unwrap(), vec![true, true, true]);

        let subset: HashSet<i32> = [2].into_iter().collect();
        assert_eq!(graph.index().mask(Some(&subset)).unwrap(), vec![false, false, true]);

        let empty: HashSet<i32> = HashSet::new();
        assert_eq!(graph.index().mask(Some(&empty)).unwrap(), vec![false, false, false]);
    }

    #[test]
    fn test_mask_rejects_unknown_node() {
        let graph = LabeledGraph::from_edges([(0, "a", 1)]);
        let subset: HashSet<i32> = [5].into_iter().collect();
        assert!(matches!(
            graph.index().mask(Some(&subset)),
            Err(Error::UnknownNode(_))
        ));
    }

    #[test]
    fn test_parse_edge_list() {
        let text = "# comment\n0 a 1\n\n1 b 2\n3\n";
        let graph = LabeledGraph::parse_edge_list(text).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edges()[1], Edge::new("1".to_string(), "b", "2".to_string()));

        assert!(LabeledGraph::parse_edge_list("0 a").is_err());
    }

    #[test]
    fn test_graph_data_roundtrip() {
        let graph = LabeledGraph::from_edges([("u".to_string(), "knows", "v".to_string())])
            .with_node("w".to_string());
        let json = serde_json::to_string(&graph.to_data()).unwrap();
        let data: GraphData<String> = serde_json::from_str(&json).unwrap();
        let restored = LabeledGraph::from(data);
        assert_eq!(restored.nodes(), graph.nodes());
        assert_eq!(restored.edges(), graph.edges());
    }

    #[test]
    fn test_from_json() {
        let graph: LabeledGraph<u32> =
            LabeledGraph::from_json(r#"{"edges": [{"src": 0, "label": "a", "dst": 1}]}"#).unwrap();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edges()[0], Edge::new(0, "a", 1));

        assert!(matches!(
            LabeledGraph::<u32>::from_json("{\"nodes\": [0]"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json = dir.path().join("graph.json");
        std::fs::write(&json, r#"{"nodes": ["x"], "edges": [{"src": "x", "label": "a", "dst": "y"}]}"#).unwrap();
        let graph = LabeledGraph::load(&json).unwrap();
        assert_eq!(graph.nodes(), &["x".to_string(), "y".to_string()]);

        let edges = dir.path().join("graph.txt");
        std::fs::write(&edges, "x a y\ny b z\n").unwrap();
        assert_eq!(LabeledGraph::load(&edges).unwrap().edge_count(), 2);

        assert!(matches!(
            LabeledGraph::load(&dir.path().join("missing.txt")),
            Err(Error::Io(_))
        ));
    }
}
