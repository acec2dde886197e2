use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use super::*;

/// Value copy of the engine's mutable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineCheckpoint {
    state: StateMatrix,
    timestep: u64,
    history: Vec<MetricsSnapshot>,
}

/// Restores the captured checkpoint when dropped unless [`CheckpointGuard::commit`] ran first.
pub struct CheckpointGuard<'a> {
    engine: &'a mut SimulationEngine,
    checkpoint: Option<EngineCheckpoint>,
}

impl SimulationEngine {
    pub fn capture(&self) -> EngineCheckpoint {
        EngineCheckpoint {
            state: self.state.clone(),
            timestep: self.timestep,
            history: self.history.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: EngineCheckpoint) {
        self.state = checkpoint.state;
        self.timestep = checkpoint.timestep;
        self.history = checkpoint.history;
    }

    /// Begins a transaction over state, timestep, and history.
    pub fn checkpoint(&mut self) -> CheckpointGuard<'_> {
        let checkpoint = self.capture();
        CheckpointGuard {
            engine: self,
            checkpoint: Some(checkpoint),
        }
    }
}

impl CheckpointGuard<'_> {
    /// Keeps everything done since the checkpoint.
    pub fn commit(mut self) {
        self.checkpoint = None;
    }

    /// Discards everything done since the checkpoint. Planned discards log at debug; an
    /// abandoned guard logs at warn.
    pub fn rollback(mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            debug!(
                restored_timestep = checkpoint.timestep,
                "checkpoint rolled back"
            );
            self.engine.restore(checkpoint);
        }
    }
}

impl Deref for CheckpointGuard<'_> {
    type Target = SimulationEngine;

    fn deref(&self) -> &Self::Target {
        self.engine
    }
}

impl DerefMut for CheckpointGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.engine
    }
}

impl Drop for CheckpointGuard<'_> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            warn!(
                abandoned_timestep = self.engine.timestep,
                restored_timestep = checkpoint.timestep,
                "checkpoint abandoned; restoring engine state"
            );
            self.engine.restore(checkpoint);
        }
    }
}
