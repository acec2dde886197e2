//! Policy injection: named multiplicative adjustments to state columns ahead of a transition.

use std::collections::BTreeMap;

use contracts::policy::{
    is_canonical, Policy, CARBON_TAX, PUBLIC_TRANSPORT_SUBSIDY, WATER_PRICE_FACTOR,
};
use contracts::FeatureKey;
use tracing::debug;

use crate::encoder::StateMatrix;
use crate::error::{SimResult, SimulationError};

/// Applies the canonical levers plus any caller-registered column multipliers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyInjector {
    extensions: BTreeMap<String, FeatureKey>,
}

impl PolicyInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` as a direct multiplier on `column`. Canonical keys cannot be rebound.
    pub fn register_multiplier(&mut self, key: impl Into<String>, column: FeatureKey) -> SimResult<()> {
        let key = key.into();
        if is_canonical(&key) {
            return Err(SimulationError::Configuration(format!(
                "policy key {key} is canonical and cannot be rebound"
            )));
        }
        self.extensions.insert(key, column);
        Ok(())
    }

    pub fn with_multiplier(mut self, key: impl Into<String>, column: FeatureKey) -> SimResult<Self> {
        self.register_multiplier(key, column)?;
        Ok(self)
    }

    pub fn extensions(&self) -> impl Iterator<Item = (&str, FeatureKey)> + '_ {
        self.extensions
            .iter()
            .map(|(key, column)| (key.as_str(), *column))
    }

    pub fn recognizes(&self, key: &str) -> bool {
        is_canonical(key) || self.extensions.contains_key(key)
    }

    /// Rejects magnitudes that are invalid on their own: non-finite values, non-positive divisors,
    /// negative multipliers. Overflow against a concrete state is caught by [`Self::inject`].
    pub fn validate(&self, policy: &Policy) -> SimResult<()> {
        for (key, &magnitude) in policy {
            if !self.recognizes(key) {
                continue;
            }
            if !magnitude.is_finite() {
                return Err(SimulationError::policy(key, magnitude, "magnitude must be finite"));
            }
            match key.as_str() {
                CARBON_TAX | WATER_PRICE_FACTOR if magnitude <= 0.0 => {
                    return Err(SimulationError::policy(
                        key,
                        magnitude,
                        "divisor levers must be strictly positive",
                    ));
                }
                CARBON_TAX | WATER_PRICE_FACTOR | PUBLIC_TRANSPORT_SUBSIDY => {}
                _ if magnitude < 0.0 => {
                    return Err(SimulationError::policy(
                        key,
                        magnitude,
                        "column multipliers must be non-negative",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns an adjusted copy; `state` is never touched. A lever that drives any touched column
    /// out of the finite range is reported as a policy error naming that lever.
    pub fn inject(&self, state: &StateMatrix, policy: &Policy) -> SimResult<StateMatrix> {
        self.validate(policy)?;
        let mut adjusted = state.clone();
        if policy.is_empty() {
            return Ok(adjusted);
        }

        if let Some(&tax) = policy.get(CARBON_TAX) {
            let stress_factor = 1.0 + (tax - 1.0) * 0.1;
            let mut lever = Lever::new(&mut adjusted, CARBON_TAX, tax);
            lever.apply(FeatureKey::Emissions, |value| value / tax)?;
            lever.apply(FeatureKey::InfrastructureStress, |value| value * stress_factor)?;
        }

        if let Some(&subsidy) = policy.get(PUBLIC_TRANSPORT_SUBSIDY) {
            if !(0.0..=1.0).contains(&subsidy) {
                debug!(subsidy, "transport subsidy outside the expected 0..=1 range");
            }
            let mut lever = Lever::new(&mut adjusted, PUBLIC_TRANSPORT_SUBSIDY, subsidy);
            lever.apply(FeatureKey::EnergyConsumption, |value| {
                value * (1.0 - subsidy * 0.2)
            })?;
            lever.apply(FeatureKey::SocialVulnerabilityScore, |value| {
                value * (1.0 - subsidy * 0.1)
            })?;
        }

        if let Some(&price) = policy.get(WATER_PRICE_FACTOR) {
            Lever::new(&mut adjusted, WATER_PRICE_FACTOR, price)
                .apply(FeatureKey::WaterConsumption, |value| value / price)?;
        }

        for (key, column) in &self.extensions {
            if let Some(&factor) = policy.get(key) {
                Lever::new(&mut adjusted, key, factor).apply(*column, |value| value * factor)?;
            }
        }

        for key in policy.keys().filter(|key| !self.recognizes(key)) {
            debug!(policy_key = %key, "ignoring unrecognised policy key");
        }

        Ok(adjusted)
    }
}

/// One named lever writing into the adjusted state.
struct Lever<'a> {
    state: &'a mut StateMatrix,
    key: &'a str,
    magnitude: f64,
}

impl<'a> Lever<'a> {
    fn new(state: &'a mut StateMatrix, key: &'a str, magnitude: f64) -> Self {
        Self {
            state,
            key,
            magnitude,
        }
    }

    fn apply(&mut self, column: FeatureKey, op: impl Fn(f64) -> f64) -> SimResult<()> {
        let mut overflowed = false;
        for value in self.state.column_mut(column.index()).iter_mut() {
            let was_finite = value.is_finite();
            *value = op(*value);
            overflowed |= was_finite && !value.is_finite();
        }
        if overflowed {
            return Err(SimulationError::policy(
                self.key,
                self.magnitude,
                format!("drives {column} out of the finite range"),
            ));
        }
        Ok(())
    }
}
