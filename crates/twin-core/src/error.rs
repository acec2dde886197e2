use contracts::ErrorCode;
use thiserror::Error;

/// Failure taxonomy of the simulation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Invalid generation or model parameters; fatal to engine construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Graph data that cannot be encoded.
    #[error("data error: {0}")]
    Data(String),
    /// A policy magnitude that would push non-finite values into the state.
    #[error("policy error: {key}={magnitude}: {reason}")]
    Policy {
        key: String,
        magnitude: f64,
        reason: String,
    },
    #[error("node id {node_id} out of range (node_count={node_count})")]
    Range { node_id: u64, node_count: usize },
    #[error("transition error: {0}")]
    Transition(String),
    #[error("transition produced non-finite state at timestep {timestep}")]
    NonFiniteState { timestep: u64 },
}

impl SimulationError {
    pub fn policy(key: &str, magnitude: f64, reason: impl Into<String>) -> Self {
        Self::Policy {
            key: key.to_string(),
            magnitude,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::ConfigurationError,
            Self::Data(_) => ErrorCode::DataError,
            Self::Policy { .. } => ErrorCode::PolicyError,
            Self::Range { .. } => ErrorCode::RangeError,
            Self::Transition(_) | Self::NonFiniteState { .. } => ErrorCode::TransitionError,
        }
    }
}

pub type SimResult<T> = Result<T, SimulationError>;
