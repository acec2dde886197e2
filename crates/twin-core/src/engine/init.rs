use contracts::FEATURE_COUNT;
use tracing::{debug, info};

use super::*;
use crate::encoder::{EncodedGraph, GraphEncoder};
use crate::generator::WorldGenerator;
use crate::model::SageTransition;

impl SimulationEngine {
    pub fn new(config: TwinConfig) -> SimResult<Self> {
        let model = SageTransition::new(FEATURE_COUNT, config.hidden_size, config.model_seed)?
            .with_worker_threads(usize::from(config.transition_worker_threads));
        debug!(
            hidden_size = model.hidden_size(),
            worker_threads = model.worker_threads(),
            "transition model initialised"
        );
        Self::with_model(config, Box::new(model))
    }

    /// Builds the world from `config` and drives it with any transition implementation.
    pub fn with_model(config: TwinConfig, model: Box<dyn TransitionModel>) -> SimResult<Self> {
        let world = WorldGenerator::from_config(&config).generate()?;
        let encoded = GraphEncoder.encode(&world.nodes, &world.edges)?;
        Ok(Self::assemble(config, world.node_groups, encoded, model))
    }

    fn assemble(
        config: TwinConfig,
        node_groups: NodeGroups,
        encoded: EncodedGraph,
        model: Box<dyn TransitionModel>,
    ) -> Self {
        let EncodedGraph {
            state,
            edges,
            edge_weights,
            node_types,
            edge_types,
            row_ids,
            remapped: _,
        } = encoded;

        let aggregator = MetricsAggregator;
        let initial = aggregator.aggregate(&state, 0);
        info!(
            seed = config.seed,
            nodes = state.nrows(),
            edges = edges.len(),
            hidden_size = config.hidden_size,
            composite_sdg_score = initial.composite_sdg_score,
            "engine ready"
        );

        Self {
            config,
            node_groups,
            edges,
            edge_weights,
            node_types,
            edge_types,
            row_ids,
            model,
            injector: PolicyInjector::new(),
            aggregator,
            state,
            timestep: 0,
            history: vec![initial],
        }
    }

    /// Redraws the transition parameters. Committed state and history are kept.
    pub fn reset_parameters(&mut self, seed: u64) {
        self.model.reset_parameters(seed);
        self.config.model_seed = seed;
        info!(model_seed = seed, "transition parameters re-initialised");
    }

    pub fn policy_injector(&self) -> &PolicyInjector {
        &self.injector
    }

    /// Caller-level policy levers are registered here.
    pub fn policy_injector_mut(&mut self) -> &mut PolicyInjector {
        &mut self.injector
    }
}
