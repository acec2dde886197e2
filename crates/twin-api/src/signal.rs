//! External sensor readings and the policy steps they trigger.

use contracts::policy::policy_from;
use contracts::{ApiError, ErrorCode, MetricsSnapshot, Policy};
use serde::{Deserialize, Serialize};

use crate::{EMISSIONS_LEVER, INFRASTRUCTURE_STRESS_LEVER};

/// Readings above this are anomalies even when not flagged.
pub const ANOMALY_TEMPERATURE_CELSIUS: f64 = 38.0;
/// Readings above this add cooling-driven emissions to the follow-up step.
pub const HEAT_TEMPERATURE_CELSIUS: f64 = 32.0;
pub const ANOMALY_STRESS_FACTOR: f64 = 1.2;
pub const HEAT_EMISSIONS_FACTOR: f64 = 1.05;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SignalReading {
    pub temperature: f64,
    #[serde(default)]
    pub precipitation: f64,
    #[serde(default)]
    pub co2_delta: f64,
    #[serde(default)]
    pub is_anomaly: bool,
}

impl SignalReading {
    pub fn new(temperature: f64) -> Self {
        Self {
            temperature,
            precipitation: 0.0,
            co2_delta: 0.0,
            is_anomaly: false,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.is_anomaly || self.temperature > ANOMALY_TEMPERATURE_CELSIUS
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        let fields = [
            ("temperature", self.temperature),
            ("precipitation", self.precipitation),
            ("co2_delta", self.co2_delta),
        ];
        match fields.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(ApiError::new(
                ErrorCode::DataError,
                "signal reading must be finite",
                Some(format!("{name}={value}")),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn anomaly_policy(&self) -> Option<Policy> {
        self.is_anomalous()
            .then(|| policy_from([(INFRASTRUCTURE_STRESS_LEVER, ANOMALY_STRESS_FACTOR)]))
    }

    pub(crate) fn follow_up_policy(&self) -> Option<Policy> {
        (self.temperature > HEAT_TEMPERATURE_CELSIUS)
            .then(|| policy_from([(EMISSIONS_LEVER, HEAT_EMISSIONS_FACTOR)]))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalOutcome {
    pub anomaly: bool,
    /// Governance cycle the reading was recorded under.
    pub cycle_id: u64,
    pub committed: Vec<MetricsSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_pick_policies() {
        let mild = SignalReading::new(30.0);
        assert!(mild.anomaly_policy().is_none());
        assert!(mild.follow_up_policy().is_none());

        let hot = SignalReading::new(35.0);
        assert!(hot.anomaly_policy().is_none());
        assert_eq!(
            hot.follow_up_policy().and_then(|p| p.get(EMISSIONS_LEVER).copied()),
            Some(HEAT_EMISSIONS_FACTOR)
        );

        let extreme = SignalReading::new(39.5);
        assert_eq!(
            extreme
                .anomaly_policy()
                .and_then(|p| p.get(INFRASTRUCTURE_STRESS_LEVER).copied()),
            Some(ANOMALY_STRESS_FACTOR)
        );
    }

    #[test]
    fn reading_defaults_optional_fields() {
        let reading: SignalReading =
            serde_json::from_str(r#"{"temperature": 22.5}"#).expect("parse");
        assert_eq!(reading, SignalReading::new(22.5));
    }
}
