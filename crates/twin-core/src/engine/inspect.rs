use contracts::{EngineStatus, NodeFeatures, NodeType, SCHEMA_VERSION_V1};

use super::*;
use crate::encoder::extract_features;
use crate::error::SimulationError;

impl SimulationEngine {
    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    pub fn current_timestep(&self) -> u64 {
        self.timestep
    }

    pub fn node_count(&self) -> usize {
        self.state.nrows()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn state(&self) -> &StateMatrix {
        &self.state
    }

    pub fn edges(&self) -> &EdgeList {
        &self.edges
    }

    pub fn edge_weights(&self) -> &[f64] {
        &self.edge_weights
    }

    pub fn node_types(&self) -> &[u8] {
        &self.node_types
    }

    pub fn edge_types(&self) -> &[u8] {
        &self.edge_types
    }

    pub fn node_groups(&self) -> &NodeGroups {
        &self.node_groups
    }

    pub fn node_group(&self, node_type: NodeType) -> &[u64] {
        self.node_groups
            .get(&node_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Index 0 is the state before any step.
    pub fn history(&self) -> &[MetricsSnapshot] {
        &self.history
    }

    /// Snapshots with `timestep >= from`.
    pub fn history_since(&self, from: u64) -> &[MetricsSnapshot] {
        let start = self
            .history
            .iter()
            .position(|snapshot| snapshot.timestep >= from)
            .unwrap_or(self.history.len());
        &self.history[start..]
    }

    pub fn latest_metrics(&self) -> Option<&MetricsSnapshot> {
        self.history.last()
    }

    pub(super) fn current_metrics(&self) -> MetricsSnapshot {
        self.history
            .last()
            .cloned()
            .unwrap_or_else(|| self.aggregator.aggregate(&self.state, self.timestep))
    }

    pub fn node_features(&self, node_id: u64) -> SimResult<NodeFeatures> {
        self.row_of(node_id)
            .and_then(|row| extract_features(&self.state, row))
            .ok_or(SimulationError::Range {
                node_id,
                node_count: self.node_count(),
            })
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            current_timestep: self.timestep,
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            history_len: self.history.len(),
        }
    }

    fn row_of(&self, node_id: u64) -> Option<usize> {
        let direct = usize::try_from(node_id).ok().filter(|row| {
            self.row_ids.get(*row).copied() == Some(node_id)
        });
        direct.or_else(|| self.row_ids.iter().position(|id| *id == node_id))
    }
}
