//! The simulation engine: sole owner of the canonical state matrix, timestep, and metric history.

mod checkpoint;
mod init;
mod inspect;
mod step;

use contracts::{MetricsSnapshot, TwinConfig};

use crate::encoder::{EdgeList, StateMatrix};
use crate::error::SimResult;
use crate::generator::NodeGroups;
use crate::metrics::MetricsAggregator;
use crate::model::TransitionModel;
use crate::policy::PolicyInjector;

pub use checkpoint::{CheckpointGuard, EngineCheckpoint};

/// Not internally synchronized; callers sharing one engine must serialize access.
#[derive(Debug)]
pub struct SimulationEngine {
    config: TwinConfig,
    node_groups: NodeGroups,
    edges: EdgeList,
    edge_weights: Vec<f64>,
    node_types: Vec<u8>,
    edge_types: Vec<u8>,
    row_ids: Vec<u64>,
    model: Box<dyn TransitionModel>,
    injector: PolicyInjector,
    aggregator: MetricsAggregator,
    state: StateMatrix,
    timestep: u64,
    history: Vec<MetricsSnapshot>,
}

/// Default world and parameter seeds with the given hidden width.
pub fn new_engine(hidden_size: usize) -> SimResult<SimulationEngine> {
    SimulationEngine::new(TwinConfig {
        hidden_size,
        ..TwinConfig::default()
    })
}
