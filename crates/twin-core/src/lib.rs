//! Typed city graph, neighbourhood-aggregation transition, and the simulation engine that owns
//! the canonical state timeline.

pub mod encoder;
pub mod engine;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod model;
pub mod policy;

pub use encoder::{EdgeList, EncodedGraph, GraphEncoder, StateMatrix};
pub use engine::{new_engine, CheckpointGuard, EngineCheckpoint, SimulationEngine};
pub use error::{SimResult, SimulationError};
pub use generator::{GeneratedWorld, NodeGroups, WorldGenerator};
pub use metrics::MetricsAggregator;
pub use model::{SageTransition, TransitionModel};
pub use policy::PolicyInjector;
