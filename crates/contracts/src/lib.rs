//! v1 cross-boundary contracts for the city twin kernel, API facade, and CLI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod policy;
pub mod serde_u64_string;

pub use policy::Policy;

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const FEATURE_COUNT: usize = 6;
pub const DEFAULT_WORLD_SEED: u64 = 42;
pub const DEFAULT_HIDDEN_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Household,
    Industry,
    Reservoir,
    TransportHub,
    SocioEconomicCluster,
    Hospital,
}

impl NodeType {
    pub const ALL: [NodeType; 6] = [
        NodeType::Household,
        NodeType::Industry,
        NodeType::Reservoir,
        NodeType::TransportHub,
        NodeType::SocioEconomicCluster,
        NodeType::Hospital,
    ];

    /// Tensor type index.
    pub fn code(self) -> u8 {
        match self {
            Self::Household => 0,
            Self::Industry => 1,
            Self::Reservoir => 2,
            Self::TransportHub => 3,
            Self::SocioEconomicCluster => 4,
            Self::Hospital => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Household => "household",
            Self::Industry => "industry",
            Self::Reservoir => "reservoir",
            Self::TransportHub => "transport_hub",
            Self::SocioEconomicCluster => "socio_economic_cluster",
            Self::Hospital => "hospital",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    WaterPipeline,
    Road,
    EnergyGrid,
    EconomicTransaction,
}

impl EdgeType {
    pub fn code(self) -> u8 {
        match self {
            Self::WaterPipeline => 0,
            Self::Road => 1,
            Self::EnergyGrid => 2,
            Self::EconomicTransaction => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaterPipeline => "water_pipeline",
            Self::Road => "road",
            Self::EnergyGrid => "energy_grid",
            Self::EconomicTransaction => "economic_transaction",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of the state matrix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    WaterConsumption,
    EnergyConsumption,
    IncomeLevel,
    Emissions,
    InfrastructureStress,
    SocialVulnerabilityScore,
}

/// Canonical column order. Callers index state rows by this order, so it must not change.
pub const FEATURE_KEYS: [FeatureKey; FEATURE_COUNT] = [
    FeatureKey::WaterConsumption,
    FeatureKey::EnergyConsumption,
    FeatureKey::IncomeLevel,
    FeatureKey::Emissions,
    FeatureKey::InfrastructureStress,
    FeatureKey::SocialVulnerabilityScore,
];

impl FeatureKey {
    pub fn index(self) -> usize {
        match self {
            Self::WaterConsumption => 0,
            Self::EnergyConsumption => 1,
            Self::IncomeLevel => 2,
            Self::Emissions => 3,
            Self::InfrastructureStress => 4,
            Self::SocialVulnerabilityScore => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WaterConsumption => "water_consumption",
            Self::EnergyConsumption => "energy_consumption",
            Self::IncomeLevel => "income_level",
            Self::Emissions => "emissions",
            Self::InfrastructureStress => "infrastructure_stress",
            Self::SocialVulnerabilityScore => "social_vulnerability_score",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        FEATURE_KEYS.into_iter().find(|key| key.as_str() == raw)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named view of one state row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct NodeFeatures {
    pub water_consumption: f64,
    pub energy_consumption: f64,
    pub income_level: f64,
    pub emissions: f64,
    pub infrastructure_stress: f64,
    pub social_vulnerability_score: f64,
}

impl NodeFeatures {
    pub fn from_row(row: [f64; FEATURE_COUNT]) -> Self {
        Self {
            water_consumption: row[0],
            energy_consumption: row[1],
            income_level: row[2],
            emissions: row[3],
            infrastructure_stress: row[4],
            social_vulnerability_score: row[5],
        }
    }

    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.water_consumption,
            self.energy_consumption,
            self.income_level,
            self.emissions,
            self.infrastructure_stress,
            self.social_vulnerability_score,
        ]
    }

    pub fn get(&self, key: FeatureKey) -> f64 {
        self.to_row()[key.index()]
    }
}

/// A generated entity. `attributes` may hold non-canonical keys; absent canonical keys read as 0.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: u64,
    pub node_type: NodeType,
    pub attributes: BTreeMap<String, f64>,
}

impl Node {
    pub fn new(id: u64, node_type: NodeType, features: NodeFeatures) -> Self {
        let attributes = FEATURE_KEYS
            .iter()
            .map(|key| (key.as_str().to_string(), features.get(*key)))
            .collect();
        Self {
            id,
            node_type,
            attributes,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn feature(&self, key: FeatureKey) -> f64 {
        self.attributes.get(key.as_str()).copied().unwrap_or(0.0)
    }

    pub fn features(&self) -> NodeFeatures {
        let mut row = [0.0; FEATURE_COUNT];
        for key in FEATURE_KEYS {
            row[key.index()] = self.feature(key);
        }
        NodeFeatures::from_row(row)
    }
}

/// Directed relation between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub source: u64,
    pub target: u64,
    pub edge_type: EdgeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Edge {
    pub fn with_capacity(source: u64, target: u64, edge_type: EdgeType, capacity: f64) -> Self {
        Self {
            source,
            target,
            edge_type,
            capacity: Some(capacity),
            volume: None,
        }
    }

    pub fn with_volume(source: u64, target: u64, edge_type: EdgeType, volume: f64) -> Self {
        Self {
            source,
            target,
            edge_type,
            capacity: None,
            volume: Some(volume),
        }
    }

    /// Capacity, else volume, else 1.0.
    pub fn weight(&self) -> f64 {
        self.capacity.or(self.volume).unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldCounts {
    pub households: usize,
    pub industries: usize,
    pub reservoirs: usize,
    pub transport_hubs: usize,
    pub socio_economic_clusters: usize,
    pub hospitals: usize,
}

impl WorldCounts {
    pub fn total(&self) -> usize {
        self.households
            + self.industries
            + self.reservoirs
            + self.transport_hubs
            + self.socio_economic_clusters
            + self.hospitals
    }
}

impl Default for WorldCounts {
    fn default() -> Self {
        Self {
            households: 250,
            industries: 15,
            reservoirs: 1,
            transport_hubs: 3,
            socio_economic_clusters: 2,
            hospitals: 1,
        }
    }
}

/// Every field may be omitted from a config file; missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TwinConfig {
    pub schema_version: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    #[serde(with = "serde_u64_string")]
    pub model_seed: u64,
    #[serde(default)]
    pub counts: WorldCounts,
    pub hidden_size: usize,
    #[serde(default = "default_worker_threads")]
    pub transition_worker_threads: u16,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_worker_threads() -> u16 {
    1
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            seed: DEFAULT_WORLD_SEED,
            model_seed: DEFAULT_WORLD_SEED,
            counts: WorldCounts::default(),
            hidden_size: DEFAULT_HIDDEN_SIZE,
            transition_worker_threads: default_worker_threads(),
            notes: None,
        }
    }
}

/// City-wide reduction of one committed state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub timestep: u64,
    pub total_water_consumption: f64,
    pub total_energy_consumption: f64,
    pub average_income: f64,
    pub total_emissions: f64,
    pub average_infrastructure_stress: f64,
    pub average_social_vulnerability: f64,
    pub composite_sdg_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineStatus {
    pub schema_version: String,
    pub current_timestep: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub history_len: usize,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "timestep={} nodes={} edges={} history={}",
            self.current_timestep, self.node_count, self.edge_count, self.history_len
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConfigurationError,
    DataError,
    PolicyError,
    RangeError,
    TransitionError,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}
