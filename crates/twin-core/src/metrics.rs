//! City-wide reduction of the state matrix, including the composite SDG score.

use contracts::{FeatureKey, MetricsSnapshot};

use crate::encoder::StateMatrix;

/// `sdg_climate = max(0, 100 - total_emissions / CLIMATE_EMISSIONS_DIVISOR)`
pub const CLIMATE_EMISSIONS_DIVISOR: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn aggregate(&self, state: &StateMatrix, timestep: u64) -> MetricsSnapshot {
        let total_emissions = column_sum(state, FeatureKey::Emissions);
        let average_infrastructure_stress = column_mean(state, FeatureKey::InfrastructureStress);
        let average_social_vulnerability =
            column_mean(state, FeatureKey::SocialVulnerabilityScore);

        MetricsSnapshot {
            timestep,
            total_water_consumption: column_sum(state, FeatureKey::WaterConsumption),
            total_energy_consumption: column_sum(state, FeatureKey::EnergyConsumption),
            average_income: column_mean(state, FeatureKey::IncomeLevel),
            total_emissions,
            average_infrastructure_stress,
            average_social_vulnerability,
            composite_sdg_score: composite_sdg_score(
                total_emissions,
                average_social_vulnerability,
                average_infrastructure_stress,
            ),
        }
    }
}

/// Mean of the climate, inequality, and infrastructure sub-scores, each floored at zero.
pub fn composite_sdg_score(total_emissions: f64, avg_vulnerability: f64, avg_stress: f64) -> f64 {
    let sdg_climate = (100.0 - total_emissions / CLIMATE_EMISSIONS_DIVISOR).max(0.0);
    let sdg_inequality = (100.0 - avg_vulnerability * 100.0).max(0.0);
    let sdg_infrastructure = (100.0 - avg_stress * 100.0).max(0.0);
    (sdg_climate + sdg_inequality + sdg_infrastructure) / 3.0
}

fn column_sum(state: &StateMatrix, key: FeatureKey) -> f64 {
    state.column(key.index()).sum()
}

fn column_mean(state: &StateMatrix, key: FeatureKey) -> f64 {
    if state.nrows() == 0 {
        return 0.0;
    }
    column_sum(state, key) / state.nrows() as f64
}
