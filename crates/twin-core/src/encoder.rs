//! Graph-to-tensor encoding: the dense state matrix, edge list, weights, and type codes.

use std::collections::BTreeMap;

use contracts::{Edge, Node, NodeFeatures, FEATURE_COUNT, FEATURE_KEYS};
use nalgebra::DMatrix;
use tracing::warn;

use crate::error::{SimResult, SimulationError};

/// Rows are nodes in id order, columns follow `FEATURE_KEYS`.
pub type StateMatrix = DMatrix<f64>;

/// Directed edges as row-index pairs, with each node's predecessors precomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeList {
    sources: Vec<usize>,
    targets: Vec<usize>,
    incoming: Vec<Vec<usize>>,
}

impl EdgeList {
    pub fn new(node_count: usize, pairs: &[(usize, usize)]) -> SimResult<Self> {
        let mut sources = Vec::with_capacity(pairs.len());
        let mut targets = Vec::with_capacity(pairs.len());
        let mut incoming = vec![Vec::new(); node_count];
        for &(source, target) in pairs {
            if source >= node_count || target >= node_count {
                return Err(SimulationError::Data(format!(
                    "edge {source}->{target} outside node range 0..{node_count}"
                )));
            }
            sources.push(source);
            targets.push(target);
            incoming[target].push(source);
        }
        Ok(Self {
            sources,
            targets,
            incoming,
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.incoming.len()
    }

    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.sources.iter().copied().zip(self.targets.iter().copied())
    }

    /// Source rows of every edge pointing at `node`; parallel edges repeat.
    pub fn predecessors(&self, node: usize) -> &[usize] {
        self.incoming.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedGraph {
    pub state: StateMatrix,
    pub edges: EdgeList,
    pub edge_weights: Vec<f64>,
    pub node_types: Vec<u8>,
    pub edge_types: Vec<u8>,
    /// Original node id of each row.
    pub row_ids: Vec<u64>,
    /// True when the input ids were not already `0..N` in insertion order.
    pub remapped: bool,
}

impl EncodedGraph {
    pub fn node_count(&self) -> usize {
        self.state.nrows()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GraphEncoder;

impl GraphEncoder {
    pub fn encode(&self, nodes: &[Node], edges: &[Edge]) -> SimResult<EncodedGraph> {
        if nodes.is_empty() {
            return Err(SimulationError::Data(
                "node set is empty; there is no state to simulate".to_string(),
            ));
        }

        let dense = nodes
            .iter()
            .enumerate()
            .all(|(row, node)| node.id == row as u64);
        let mut row_of = BTreeMap::new();
        for (row, node) in nodes.iter().enumerate() {
            if row_of.insert(node.id, row).is_some() {
                return Err(SimulationError::Data(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
        }
        if !dense {
            warn!(
                nodes = nodes.len(),
                "node ids are not a dense 0..N range; re-indexing in insertion order"
            );
        }

        let state = DMatrix::from_fn(nodes.len(), FEATURE_COUNT, |row, column| {
            nodes[row].feature(FEATURE_KEYS[column])
        });
        let node_types = nodes.iter().map(|node| node.node_type.code()).collect();
        let row_ids = nodes.iter().map(|node| node.id).collect();

        let mut pairs = Vec::with_capacity(edges.len());
        let mut edge_weights = Vec::with_capacity(edges.len());
        let mut edge_types = Vec::with_capacity(edges.len());
        for edge in edges {
            let lookup = |id: u64| {
                row_of.get(&id).copied().ok_or_else(|| {
                    SimulationError::Data(format!(
                        "{} edge {}->{} references unknown node {id}",
                        edge.edge_type, edge.source, edge.target
                    ))
                })
            };
            pairs.push((lookup(edge.source)?, lookup(edge.target)?));
            edge_weights.push(edge.weight());
            edge_types.push(edge.edge_type.code());
        }

        Ok(EncodedGraph {
            state,
            edges: EdgeList::new(nodes.len(), &pairs)?,
            edge_weights,
            node_types,
            edge_types,
            row_ids,
            remapped: !dense,
        })
    }
}

/// Named fields of one state row, or `None` past the last row.
pub fn extract_features(state: &StateMatrix, row: usize) -> Option<NodeFeatures> {
    if row >= state.nrows() || state.ncols() != FEATURE_COUNT {
        return None;
    }
    let mut values = [0.0; FEATURE_COUNT];
    for (column, value) in values.iter_mut().enumerate() {
        *value = state[(row, column)];
    }
    Some(NodeFeatures::from_row(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EdgeType, NodeType};

    fn node(id: u64, node_type: NodeType, water: f64) -> Node {
        Node::new(
            id,
            node_type,
            NodeFeatures {
                water_consumption: water,
                ..NodeFeatures::default()
            },
        )
    }

    #[test]
    fn empty_node_set_is_a_data_error() {
        let err = GraphEncoder.encode(&[], &[]).expect_err("must fail");
        assert!(matches!(err, SimulationError::Data(_)));
    }

    #[test]
    fn dense_ids_keep_rows_and_codes() {
        let nodes = vec![
            node(0, NodeType::Reservoir, 0.0),
            node(1, NodeType::Household, 10.0),
        ];
        let edges = vec![Edge::with_capacity(0, 1, EdgeType::WaterPipeline, 100.0)];
        let encoded = GraphEncoder.encode(&nodes, &edges).expect("encode");

        assert!(!encoded.remapped);
        assert_eq!(encoded.state.shape(), (2, FEATURE_COUNT));
        assert_eq!(encoded.state[(1, 0)], 10.0);
        assert_eq!(encoded.node_types, vec![2, 0]);
        assert_eq!(encoded.edge_types, vec![0]);
        assert_eq!(encoded.edge_weights, vec![100.0]);
        assert_eq!(encoded.edges.predecessors(1), &[0]);
        assert!(encoded.edges.predecessors(0).is_empty());
    }

    #[test]
    fn sparse_ids_are_reindexed_in_insertion_order() {
        let nodes = vec![
            node(40, NodeType::Hospital, 200.0),
            node(7, NodeType::Household, 9.0),
        ];
        let edges = vec![Edge::with_volume(7, 40, EdgeType::EconomicTransaction, 55.0)];
        let encoded = GraphEncoder.encode(&nodes, &edges).expect("encode");

        assert!(encoded.remapped);
        assert_eq!(encoded.row_ids, vec![40, 7]);
        assert_eq!(encoded.state[(0, 0)], 200.0);
        assert_eq!(encoded.edges.pairs().collect::<Vec<_>>(), vec![(1, 0)]);
        assert_eq!(encoded.edge_weights, vec![55.0]);
    }

    #[test]
    fn dangling_edge_and_duplicate_ids_are_data_errors() {
        let nodes = vec![node(0, NodeType::Reservoir, 0.0)];
        let dangling = vec![Edge::with_capacity(0, 3, EdgeType::Road, 1.0)];
        assert!(matches!(
            GraphEncoder.encode(&nodes, &dangling),
            Err(SimulationError::Data(_))
        ));

        let duplicated = vec![
            node(0, NodeType::Reservoir, 0.0),
            node(0, NodeType::Household, 1.0),
        ];
        assert!(matches!(
            GraphEncoder.encode(&duplicated, &[]),
            Err(SimulationError::Data(_))
        ));
    }

    #[test]
    fn extract_features_reads_named_columns() {
        let nodes = vec![node(0, NodeType::Household, 12.0)];
        let encoded = GraphEncoder.encode(&nodes, &[]).expect("encode");
        let features = extract_features(&encoded.state, 0).expect("row");
        assert_eq!(features.water_consumption, 12.0);
        assert!(extract_features(&encoded.state, 1).is_none());
    }
}
