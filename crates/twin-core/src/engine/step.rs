use contracts::Policy;
use tracing::debug;

use super::*;
use crate::error::SimulationError;

impl SimulationEngine {
    /// Commits one step: inject policy, transition, aggregate, append to history.
    /// On error nothing is committed.
    pub fn step(&mut self, policy: Option<&Policy>) -> SimResult<MetricsSnapshot> {
        let timestep = self.timestep.saturating_add(1);
        let next = self.next_state(policy, timestep)?;
        let snapshot = self.aggregator.aggregate(&next, timestep);

        self.state = next;
        self.timestep = timestep;
        self.history.push(snapshot.clone());
        debug!(
            timestep,
            composite_sdg_score = snapshot.composite_sdg_score,
            total_emissions = snapshot.total_emissions,
            "committed step"
        );
        Ok(snapshot)
    }

    /// Commits `steps` steps under the same policy. A failure part-way rolls every one of them back.
    pub fn run_projection(
        &mut self,
        steps: u64,
        policy: Option<&Policy>,
    ) -> SimResult<Vec<MetricsSnapshot>> {
        if let Some(policy) = policy {
            self.injector.validate(policy)?;
        }
        let mut guard = self.checkpoint();
        let mut trajectory = Vec::new();
        for _ in 0..steps {
            trajectory.push(guard.step(policy)?);
        }
        guard.commit();
        Ok(trajectory)
    }

    /// Final metrics of a projection that is never committed. State, timestep, and history
    /// are restored on every exit path, including errors and panics inside the model.
    pub fn speculate(&mut self, steps: u64, policy: Option<&Policy>) -> SimResult<MetricsSnapshot> {
        let mut guard = self.checkpoint();
        let trajectory = guard.run_projection(steps, policy)?;
        let final_metrics = match trajectory.last() {
            Some(metrics) => metrics.clone(),
            None => guard.current_metrics(),
        };
        guard.rollback();
        Ok(final_metrics)
    }

    fn next_state(&self, policy: Option<&Policy>, timestep: u64) -> SimResult<StateMatrix> {
        let injected;
        let input = match policy.filter(|policy| !policy.is_empty()) {
            Some(policy) => {
                injected = self.injector.inject(&self.state, policy)?;
                &injected
            }
            None => &self.state,
        };

        let next = self.model.transition(input, &self.edges)?;
        if next.shape() != self.state.shape() {
            return Err(SimulationError::Transition(format!(
                "transition changed shape from {:?} to {:?}",
                self.state.shape(),
                next.shape()
            )));
        }
        if next.iter().any(|value| !value.is_finite()) {
            return Err(SimulationError::NonFiniteState { timestep });
        }
        Ok(next)
    }
}
