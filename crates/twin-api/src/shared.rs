use std::sync::{Arc, Mutex};

use contracts::{ApiError, EngineStatus, ErrorCode, MetricsSnapshot, Policy, TwinConfig};

use crate::{Alert, EngineApi, GovernanceState, SignalOutcome, SignalReading};

/// Cloneable handle that funnels every call through one lock, so concurrent callers never
/// observe a half-applied step or speculation.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<EngineApi>>,
}

impl SharedEngine {
    pub fn new(api: EngineApi) -> Self {
        Self {
            inner: Arc::new(Mutex::new(api)),
        }
    }

    pub fn from_config(config: TwinConfig) -> Result<Self, ApiError> {
        EngineApi::from_config(config).map(Self::new)
    }

    /// Runs `op` while holding the engine lock.
    pub fn with<T>(
        &self,
        op: impl FnOnce(&mut EngineApi) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let mut api = self.inner.lock().map_err(|_| {
            ApiError::new(
                ErrorCode::InternalError,
                "engine lock poisoned by an earlier panic",
                None,
            )
        })?;
        op(&mut api)
    }

    pub fn status(&self) -> Result<EngineStatus, ApiError> {
        self.with(|api| Ok(api.status()))
    }

    pub fn step(&self, policy: Option<&Policy>) -> Result<MetricsSnapshot, ApiError> {
        self.with(|api| api.step(policy))
    }

    pub fn speculate(
        &self,
        steps: u64,
        policy: Option<&Policy>,
    ) -> Result<MetricsSnapshot, ApiError> {
        self.with(|api| api.speculate(steps, policy))
    }

    pub fn ingest_signal(&self, reading: &SignalReading) -> Result<SignalOutcome, ApiError> {
        self.with(|api| api.ingest_signal(reading))
    }

    pub fn governance(&self) -> Result<GovernanceState, ApiError> {
        self.with(|api| Ok(api.governance().clone()))
    }

    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<Alert>, ApiError> {
        self.with(|api| Ok(api.recent_alerts(limit)))
    }

    pub fn history(&self) -> Result<Vec<MetricsSnapshot>, ApiError> {
        self.with(|api| Ok(api.history().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_config;
    use std::thread;

    #[test]
    fn concurrent_steps_serialize() {
        let shared = SharedEngine::from_config(test_config()).expect("shared");
        let workers = (0..4)
            .map(|_| {
                let handle = shared.clone();
                thread::spawn(move || {
                    for _ in 0..2 {
                        handle.step(None).expect("step");
                        handle.speculate(2, None).expect("speculate");
                    }
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().expect("worker");
        }

        let status = shared.status().expect("status");
        assert_eq!(status.current_timestep, 8);
        let timesteps = shared
            .history()
            .expect("history")
            .iter()
            .map(|m| m.timestep)
            .collect::<Vec<_>>();
        assert_eq!(timesteps, (0..=8).collect::<Vec<_>>());
    }

    #[test]
    fn signals_from_many_handles_share_one_record() {
        let shared = SharedEngine::from_config(test_config()).expect("shared");
        let workers = (0..3)
            .map(|_| {
                let handle = shared.clone();
                thread::spawn(move || {
                    let reading = SignalReading {
                        co2_delta: 1.0,
                        ..SignalReading::new(40.0)
                    };
                    handle.ingest_signal(&reading).expect("signal");
                })
            })
            .collect::<Vec<_>>();
        for worker in workers {
            worker.join().expect("worker");
        }

        let governance = shared.governance().expect("governance");
        assert!((governance.co2_ppm - 421.0).abs() < 1e-9);
        assert_eq!(shared.recent_alerts(usize::MAX).expect("alerts").len(), 3);
        assert_eq!(shared.status().expect("status").current_timestep, 6);
    }

    #[test]
    fn poisoned_lock_is_internal_error() {
        let shared = SharedEngine::from_config(test_config()).expect("shared");
        let poisoner = shared.clone();
        let joined = thread::spawn(move || {
            let _ = poisoner.with(|_| -> Result<(), ApiError> { panic!("boom") });
        })
        .join();
        assert!(joined.is_err());

        let err = shared.status().expect_err("poisoned");
        assert_eq!(err.error_code, ErrorCode::InternalError);
    }
}
