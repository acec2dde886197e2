//! In-process API facade: config loading, error envelopes, signal ingestion, and a lock-guarded
//! shared engine handle.

mod config;
mod governance;
mod shared;
mod signal;

use contracts::{
    ApiError, EngineStatus, FeatureKey, MetricsSnapshot, NodeFeatures, Policy, TwinConfig,
};
use tracing::{info, warn};
use twin_core::{SimulationEngine, SimulationError};

pub use config::{apply_overrides, load_config, ENV_HIDDEN_SIZE, ENV_MODEL_SEED, ENV_SEED};
pub use governance::{Alert, AlertSeverity, GovernanceState, ALERT_CAPACITY};
pub use shared::SharedEngine;
pub use signal::{
    SignalOutcome, SignalReading, ANOMALY_STRESS_FACTOR, ANOMALY_TEMPERATURE_CELSIUS,
    HEAT_EMISSIONS_FACTOR, HEAT_TEMPERATURE_CELSIUS,
};

/// Extension lever scaling infrastructure stress directly.
pub const INFRASTRUCTURE_STRESS_LEVER: &str = "infrastructure_stress";
/// Extension lever scaling emissions directly.
pub const EMISSIONS_LEVER: &str = "emissions";

#[derive(Debug)]
pub struct EngineApi {
    engine: SimulationEngine,
    governance: GovernanceState,
}

impl EngineApi {
    pub fn from_config(config: TwinConfig) -> Result<Self, ApiError> {
        let mut engine = SimulationEngine::new(config).map_err(|err| api_error(&err))?;
        let injector = engine.policy_injector_mut();
        for (key, column) in [
            (INFRASTRUCTURE_STRESS_LEVER, FeatureKey::InfrastructureStress),
            (EMISSIONS_LEVER, FeatureKey::Emissions),
        ] {
            injector
                .register_multiplier(key, column)
                .map_err(|err| api_error(&err))?;
        }
        let status = engine.status();
        info!(%status, "engine api ready");
        Ok(Self {
            engine,
            governance: GovernanceState::default(),
        })
    }

    pub fn engine(&self) -> &SimulationEngine {
        &self.engine
    }

    pub fn config(&self) -> &TwinConfig {
        self.engine.config()
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }

    pub fn step(&mut self, policy: Option<&Policy>) -> Result<MetricsSnapshot, ApiError> {
        self.engine.step(policy).map_err(|err| api_error(&err))
    }

    pub fn run_projection(
        &mut self,
        steps: u64,
        policy: Option<&Policy>,
    ) -> Result<Vec<MetricsSnapshot>, ApiError> {
        self.engine
            .run_projection(steps, policy)
            .map_err(|err| api_error(&err))
    }

    pub fn speculate(
        &mut self,
        steps: u64,
        policy: Option<&Policy>,
    ) -> Result<MetricsSnapshot, ApiError> {
        self.engine
            .speculate(steps, policy)
            .map_err(|err| api_error(&err))
    }

    pub fn governance(&self) -> &GovernanceState {
        &self.governance
    }

    /// At most `limit` alerts, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.governance.recent_alerts(limit)
    }

    pub fn history(&self) -> &[MetricsSnapshot] {
        self.engine.history()
    }

    pub fn history_since(&self, timestep: u64) -> &[MetricsSnapshot] {
        self.engine.history_since(timestep)
    }

    pub fn node_features(&self, node_id: u64) -> Result<NodeFeatures, ApiError> {
        self.engine
            .node_features(node_id)
            .map_err(|err| api_error(&err))
    }

    /// Commits the step(s) a sensor reading calls for, then folds the reading into the governance
    /// record. Both steps land or neither does; a rejected reading leaves the record untouched.
    pub fn ingest_signal(&mut self, reading: &SignalReading) -> Result<SignalOutcome, ApiError> {
        reading.validate()?;
        let anomaly = reading.is_anomalous();
        if anomaly {
            warn!(
                temperature = reading.temperature,
                flagged = reading.is_anomaly,
                "anomalous signal; stressing infrastructure"
            );
        }

        let mut guard = self.engine.checkpoint();
        let mut committed = Vec::with_capacity(2);
        if let Some(policy) = reading.anomaly_policy() {
            committed.push(guard.step(Some(&policy)).map_err(|err| api_error(&err))?);
        }
        let follow_up = reading.follow_up_policy();
        committed.push(
            guard
                .step(follow_up.as_ref())
                .map_err(|err| api_error(&err))?,
        );
        guard.commit();

        let cycle_id = self.governance.record(reading);
        Ok(SignalOutcome {
            anomaly,
            cycle_id,
            committed,
        })
    }
}

/// Envelope for a core error; `details` carries the structured fields of the variant.
pub fn api_error(err: &SimulationError) -> ApiError {
    let details = match err {
        SimulationError::Policy { key, magnitude, .. } => {
            Some(format!("policy_key={key} magnitude={magnitude}"))
        }
        SimulationError::Range {
            node_id,
            node_count,
        } => Some(format!("node_id={node_id} node_count={node_count}")),
        SimulationError::NonFiniteState { timestep } => Some(format!("timestep={timestep}")),
        SimulationError::Configuration(_)
        | SimulationError::Data(_)
        | SimulationError::Transition(_) => None,
    };
    ApiError::new(err.code(), err.to_string(), details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::policy::{policy_from, CARBON_TAX};
    use contracts::{ErrorCode, WorldCounts};

    pub(crate) fn test_config() -> TwinConfig {
        TwinConfig {
            counts: WorldCounts {
                households: 10,
                industries: 2,
                reservoirs: 1,
                transport_hubs: 1,
                socio_economic_clusters: 1,
                hospitals: 1,
            },
            hidden_size: 8,
            ..TwinConfig::default()
        }
    }

    #[test]
    fn from_config_registers_signal_levers() {
        let api = EngineApi::from_config(test_config()).expect("api");
        let injector = api.engine().policy_injector();
        assert!(injector.recognizes(INFRASTRUCTURE_STRESS_LEVER));
        assert!(injector.recognizes(EMISSIONS_LEVER));
        assert_eq!(api.status().current_timestep, 0);
    }

    #[test]
    fn invalid_config_maps_to_configuration_error() {
        let config = TwinConfig {
            hidden_size: 0,
            ..test_config()
        };
        let err = EngineApi::from_config(config).expect_err("zero hidden size");
        assert_eq!(err.error_code, ErrorCode::ConfigurationError);
    }

    #[test]
    fn calm_signal_commits_one_plain_step() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let outcome = api
            .ingest_signal(&SignalReading::new(21.0))
            .expect("signal");
        assert!(!outcome.anomaly);
        assert_eq!(outcome.committed.len(), 1);
        assert_eq!(api.status().current_timestep, 1);
    }

    #[test]
    fn heatwave_commits_stress_then_emissions_steps() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let outcome = api
            .ingest_signal(&SignalReading::new(40.0))
            .expect("signal");
        assert!(outcome.anomaly);
        let timesteps = outcome
            .committed
            .iter()
            .map(|m| m.timestep)
            .collect::<Vec<_>>();
        assert_eq!(timesteps, vec![1, 2]);
        assert_eq!(api.history().len(), 3);
    }

    #[test]
    fn flagged_anomaly_counts_even_when_mild() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let reading = SignalReading {
            is_anomaly: true,
            ..SignalReading::new(15.0)
        };
        let outcome = api.ingest_signal(&reading).expect("signal");
        assert!(outcome.anomaly);
        assert_eq!(outcome.committed.len(), 2);
    }

    #[test]
    fn signals_update_governance_record() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let reading = SignalReading {
            precipitation: 1.5,
            co2_delta: 0.4,
            ..SignalReading::new(39.0)
        };
        let first = api.ingest_signal(&reading).expect("first");
        let second = api.ingest_signal(&reading).expect("second");
        assert_eq!(second.cycle_id, first.cycle_id + 1);

        let governance = api.governance();
        assert!((governance.co2_ppm - 418.8).abs() < 1e-9);
        assert_eq!(governance.precipitation_current, 1.5);
        assert!(governance.anomaly_detected);
        assert_eq!(api.recent_alerts(10).len(), 2);
    }

    #[test]
    fn rejected_reading_leaves_governance_untouched() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let before = api.governance().clone();
        let reading = SignalReading {
            co2_delta: f64::INFINITY,
            ..SignalReading::new(20.0)
        };
        assert!(api.ingest_signal(&reading).is_err());
        assert_eq!(api.governance(), &before);
    }

    #[test]
    fn non_finite_reading_is_rejected_without_stepping() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let err = api
            .ingest_signal(&SignalReading::new(f64::NAN))
            .expect_err("nan temperature");
        assert_eq!(err.error_code, ErrorCode::DataError);
        assert_eq!(api.status().current_timestep, 0);
    }

    #[test]
    fn errors_carry_codes_and_details() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        let err = api
            .speculate(2, Some(&policy_from([(CARBON_TAX, -1.0)])))
            .expect_err("negative tax");
        assert_eq!(err.error_code, ErrorCode::PolicyError);
        assert!(err.details.as_deref().is_some_and(|d| d.contains("carbon_tax")));

        let err = api.node_features(9_999).expect_err("out of range");
        assert_eq!(err.error_code, ErrorCode::RangeError);
    }

    #[test]
    fn history_since_skips_earlier_snapshots() {
        let mut api = EngineApi::from_config(test_config()).expect("api");
        api.run_projection(3, None).expect("projection");
        assert_eq!(api.history_since(3).len(), 1);
        assert_eq!(api.history_since(1).first().map(|m| m.timestep), Some(1));
    }
}
