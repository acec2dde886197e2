//! Synthetic city generation: typed nodes with seeded initial features and the fixed edge rules
//! that wire them together.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use contracts::{Edge, EdgeType, Node, NodeFeatures, NodeType, TwinConfig, WorldCounts};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{SimResult, SimulationError};

/// Node ids per type, in creation order.
pub type NodeGroups = BTreeMap<NodeType, Vec<u64>>;

const RESERVOIR_CAPACITY: f64 = 10_000.0;
const PIPELINE_CAPACITY: f64 = 100.0;
const HUB_ROAD_CAPACITY: f64 = 500.0;
const HOUSEHOLD_ROAD_CAPACITY: f64 = 10.0;
const ENERGY_GRID_CAPACITY: f64 = 1_000.0;
const INDUSTRY_EMPLOYER_PROBABILITY: f64 = 0.7;
const HOUSEHOLD_INCOME_FLOOR: f64 = 10_000.0;
const VULNERABILITY_INCOME_SCALE: f64 = 150_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedWorld {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub node_groups: NodeGroups,
}

impl GeneratedWorld {
    pub fn group(&self, node_type: NodeType) -> &[u64] {
        self.node_groups
            .get(&node_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldGenerator {
    counts: WorldCounts,
    seed: u64,
}

impl WorldGenerator {
    pub fn new(counts: WorldCounts, seed: u64) -> Self {
        Self { counts, seed }
    }

    pub fn from_config(config: &TwinConfig) -> Self {
        Self::new(config.counts, config.seed)
    }

    pub fn counts(&self) -> WorldCounts {
        self.counts
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Same counts and seed always yield the same graph.
    pub fn generate(&self) -> SimResult<GeneratedWorld> {
        validate_counts(&self.counts)?;

        let mut builder = WorldBuilder::new(self.seed, self.counts.total());
        builder.add_reservoirs(self.counts.reservoirs);
        builder.add_hospitals(self.counts.hospitals);
        builder.add_transport_hubs(self.counts.transport_hubs);
        builder.add_clusters(self.counts.socio_economic_clusters);
        builder.add_industries(self.counts.industries);
        builder.add_households(self.counts.households);

        builder.connect_water_pipelines()?;
        builder.connect_cluster_roads()?;
        builder.connect_household_roads()?;
        builder.connect_industries()?;
        builder.connect_household_employers()?;

        let world = builder.finish();
        debug!(
            seed = self.seed,
            nodes = world.nodes.len(),
            edges = world.edges.len(),
            "generated synthetic city"
        );
        Ok(world)
    }
}

pub fn generate(counts: WorldCounts, seed: u64) -> SimResult<GeneratedWorld> {
    WorldGenerator::new(counts, seed).generate()
}

fn validate_counts(counts: &WorldCounts) -> SimResult<()> {
    let require = |ok: bool, message: &str| {
        if ok {
            Ok(())
        } else {
            Err(SimulationError::Configuration(message.to_string()))
        }
    };

    require(
        counts.reservoirs >= 1,
        "at least one reservoir is required to lay water pipelines",
    )?;
    if counts.socio_economic_clusters > 0 {
        require(
            counts.transport_hubs >= 1,
            "clusters need at least one transport hub to connect to",
        )?;
    }
    if counts.industries > 0 {
        require(
            counts.transport_hubs >= 1 && counts.socio_economic_clusters >= 1,
            "industries need at least one transport hub and one cluster",
        )?;
    }
    if counts.households > 0 {
        require(
            counts.socio_economic_clusters >= 1,
            "households need at least one cluster to live in",
        )?;
        require(
            counts.industries >= 1 && counts.hospitals + counts.transport_hubs >= 1,
            "households need at least one industry and one hospital or transport hub as employers",
        )?;
    }
    Ok(())
}

struct WorldBuilder {
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    groups: NodeGroups,
}

impl WorldBuilder {
    fn new(seed: u64, node_count: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            nodes: Vec::with_capacity(node_count),
            edges: Vec::new(),
            groups: NodeType::ALL
                .into_iter()
                .map(|node_type| (node_type, Vec::new()))
                .collect(),
        }
    }

    fn add_node(&mut self, node: Node) -> u64 {
        let id = node.id;
        self.groups.entry(node.node_type).or_default().push(id);
        self.nodes.push(node);
        id
    }

    fn next_id(&self) -> u64 {
        self.nodes.len() as u64
    }

    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        // Box-Muller; 1 - u keeps the log argument in (0, 1].
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..high)
    }

    fn pick(&mut self, node_type: NodeType) -> SimResult<u64> {
        let group = self.groups.get(&node_type).map(Vec::as_slice).unwrap_or(&[]);
        group.choose(&mut self.rng).copied().ok_or_else(|| {
            SimulationError::Configuration(format!("no {node_type} node available to connect to"))
        })
    }

    fn add_reservoirs(&mut self, count: usize) {
        for _ in 0..count {
            let node = Node::new(
                self.next_id(),
                NodeType::Reservoir,
                NodeFeatures {
                    water_consumption: 0.0,
                    energy_consumption: 50.0,
                    income_level: 0.0,
                    emissions: 10.0,
                    infrastructure_stress: 0.1,
                    social_vulnerability_score: 0.0,
                },
            )
            .with_attribute("capacity", RESERVOIR_CAPACITY);
            self.add_node(node);
        }
    }

    fn add_hospitals(&mut self, count: usize) {
        for _ in 0..count {
            let node = Node::new(
                self.next_id(),
                NodeType::Hospital,
                NodeFeatures {
                    water_consumption: 200.0,
                    energy_consumption: 500.0,
                    income_level: 0.0,
                    emissions: 50.0,
                    infrastructure_stress: 0.3,
                    social_vulnerability_score: 0.1,
                },
            );
            self.add_node(node);
        }
    }

    fn add_transport_hubs(&mut self, count: usize) {
        for _ in 0..count {
            let node = Node::new(
                self.next_id(),
                NodeType::TransportHub,
                NodeFeatures {
                    water_consumption: 50.0,
                    energy_consumption: 300.0,
                    income_level: 0.0,
                    emissions: 150.0,
                    infrastructure_stress: 0.4,
                    social_vulnerability_score: 0.2,
                },
            );
            self.add_node(node);
        }
    }

    fn add_clusters(&mut self, count: usize) {
        for _ in 0..count {
            let income_level = self.normal(50_000.0, 15_000.0);
            let social_vulnerability_score = self.uniform(0.1, 0.8);
            let node = Node::new(
                self.next_id(),
                NodeType::SocioEconomicCluster,
                NodeFeatures {
                    water_consumption: 100.0,
                    energy_consumption: 200.0,
                    income_level,
                    emissions: 80.0,
                    infrastructure_stress: 0.2,
                    social_vulnerability_score,
                },
            );
            self.add_node(node);
        }
    }

    fn add_industries(&mut self, count: usize) {
        for _ in 0..count {
            let features = NodeFeatures {
                water_consumption: self.normal(500.0, 100.0),
                energy_consumption: self.normal(1_000.0, 200.0),
                // revenue proxy
                income_level: self.normal(1_000_000.0, 200_000.0),
                emissions: self.normal(300.0, 50.0),
                infrastructure_stress: self.uniform(0.4, 0.9),
                social_vulnerability_score: 0.1,
            };
            let node = Node::new(self.next_id(), NodeType::Industry, features);
            self.add_node(node);
        }
    }

    fn add_households(&mut self, count: usize) {
        for _ in 0..count {
            let income_level = self.normal(60_000.0, 30_000.0).max(HOUSEHOLD_INCOME_FLOOR);
            let noise = self.normal(0.0, 0.1);
            let social_vulnerability_score =
                (1.0 - income_level / VULNERABILITY_INCOME_SCALE + noise).clamp(0.0, 1.0);
            let features = NodeFeatures {
                water_consumption: self.normal(10.0, 2.0),
                energy_consumption: self.normal(20.0, 5.0),
                income_level,
                emissions: self.normal(5.0, 1.0),
                infrastructure_stress: self.uniform(0.0, 0.3),
                social_vulnerability_score,
            };
            let node = Node::new(self.next_id(), NodeType::Household, features);
            self.add_node(node);
        }
    }

    fn connect_water_pipelines(&mut self) -> SimResult<()> {
        let reservoir = self
            .groups
            .get(&NodeType::Reservoir)
            .and_then(|ids| ids.first().copied())
            .ok_or_else(|| SimulationError::Configuration("no reservoir generated".to_string()))?;
        let pipelines = self
            .nodes
            .iter()
            .filter(|node| node.id != reservoir)
            .map(|node| {
                Edge::with_capacity(reservoir, node.id, EdgeType::WaterPipeline, PIPELINE_CAPACITY)
            })
            .collect::<Vec<_>>();
        self.edges.extend(pipelines);
        Ok(())
    }

    fn connect_cluster_roads(&mut self) -> SimResult<()> {
        let clusters = self.group_ids(NodeType::SocioEconomicCluster);
        for cluster in clusters {
            let hub = self.pick(NodeType::TransportHub)?;
            self.push_road_pair(cluster, hub, HUB_ROAD_CAPACITY);
        }
        Ok(())
    }

    fn connect_household_roads(&mut self) -> SimResult<()> {
        let households = self.group_ids(NodeType::Household);
        for household in households {
            let cluster = self.pick(NodeType::SocioEconomicCluster)?;
            self.push_road_pair(household, cluster, HOUSEHOLD_ROAD_CAPACITY);
        }
        Ok(())
    }

    fn connect_industries(&mut self) -> SimResult<()> {
        let industries = self.group_ids(NodeType::Industry);
        for industry in industries {
            let hub = self.pick(NodeType::TransportHub)?;
            self.edges.push(Edge::with_capacity(
                industry,
                hub,
                EdgeType::EnergyGrid,
                ENERGY_GRID_CAPACITY,
            ));

            let cluster = self.pick(NodeType::SocioEconomicCluster)?;
            let volume = self.uniform(1_000.0, 5_000.0);
            self.edges.push(Edge::with_volume(
                industry,
                cluster,
                EdgeType::EconomicTransaction,
                volume,
            ));
        }
        Ok(())
    }

    fn connect_household_employers(&mut self) -> SimResult<()> {
        let households = self.group_ids(NodeType::Household);
        let mut public_employers = self.group_ids(NodeType::Hospital);
        public_employers.extend(self.group_ids(NodeType::TransportHub));

        for household in households {
            let employer = if self.rng.gen::<f64>() < INDUSTRY_EMPLOYER_PROBABILITY {
                self.pick(NodeType::Industry)?
            } else {
                public_employers
                    .choose(&mut self.rng)
                    .copied()
                    .ok_or_else(|| {
                        SimulationError::Configuration(
                            "no hospital or transport hub available as employer".to_string(),
                        )
                    })?
            };
            let income = self.nodes[household as usize].features().income_level;
            self.edges.push(Edge::with_volume(
                household,
                employer,
                EdgeType::EconomicTransaction,
                income,
            ));
        }
        Ok(())
    }

    fn push_road_pair(&mut self, a: u64, b: u64, capacity: f64) {
        self.edges
            .push(Edge::with_capacity(a, b, EdgeType::Road, capacity));
        self.edges
            .push(Edge::with_capacity(b, a, EdgeType::Road, capacity));
    }

    fn group_ids(&self, node_type: NodeType) -> Vec<u64> {
        self.groups.get(&node_type).cloned().unwrap_or_default()
    }

    fn finish(self) -> GeneratedWorld {
        GeneratedWorld {
            nodes: self.nodes,
            edges: self.edges,
            node_groups: self.groups,
        }
    }
}
