//! Transition function: two mean-aggregation message-passing layers and a linear read-out that
//! produces a state delta.

use std::fmt;

use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::warn;

use crate::encoder::{EdgeList, StateMatrix};
use crate::error::{SimResult, SimulationError};

/// Maps a state matrix to the next one over a fixed topology.
pub trait TransitionModel: Send + Sync + fmt::Debug {
    /// Output has the same shape as `state`.
    fn transition(&self, state: &StateMatrix, edges: &EdgeList) -> SimResult<StateMatrix>;

    /// Redraw every learned parameter from `seed`.
    fn reset_parameters(&mut self, seed: u64);
}

#[derive(Debug, Clone, PartialEq)]
struct Linear {
    /// `out x in`
    weight: DMatrix<f64>,
    bias: Option<Vec<f64>>,
}

impl Linear {
    fn init(in_features: usize, out_features: usize, with_bias: bool, rng: &mut ChaCha8Rng) -> Self {
        let bound = 1.0 / (in_features as f64).sqrt();
        let weight = DMatrix::from_fn(out_features, in_features, |_, _| {
            rng.gen_range(-bound..=bound)
        });
        let bias = with_bias.then(|| {
            (0..out_features)
                .map(|_| rng.gen_range(-bound..=bound))
                .collect()
        });
        Self { weight, bias }
    }

    fn forward(&self, input: &DMatrix<f64>) -> DMatrix<f64> {
        let mut output = input * self.weight.transpose();
        if let Some(bias) = &self.bias {
            for row in 0..output.nrows() {
                for (column, offset) in bias.iter().enumerate() {
                    output[(row, column)] += offset;
                }
            }
        }
        output
    }
}

/// `relu(W_n * mean(predecessors) + b_n + W_r * self)`
#[derive(Debug, Clone, PartialEq)]
struct SageLayer {
    neighbor: Linear,
    root: Linear,
}

impl SageLayer {
    fn init(in_features: usize, out_features: usize, rng: &mut ChaCha8Rng) -> Self {
        Self {
            neighbor: Linear::init(in_features, out_features, true, rng),
            root: Linear::init(in_features, out_features, false, rng),
        }
    }

    fn forward(
        &self,
        hidden: &DMatrix<f64>,
        edges: &EdgeList,
        pool: Option<&rayon::ThreadPool>,
    ) -> DMatrix<f64> {
        let aggregated = mean_aggregate(hidden, edges, pool);
        (self.neighbor.forward(&aggregated) + self.root.forward(hidden)).map(relu)
    }
}

// NaN passes through so the engine's finiteness check still sees it.
fn relu(value: f64) -> f64 {
    if value < 0.0 {
        0.0
    } else {
        value
    }
}

/// Per-node mean of predecessor rows; nodes without predecessors aggregate to zero.
fn mean_aggregate(
    hidden: &DMatrix<f64>,
    edges: &EdgeList,
    pool: Option<&rayon::ThreadPool>,
) -> DMatrix<f64> {
    let width = hidden.ncols();
    let row_mean = |node: usize| -> Vec<f64> {
        let mut acc = vec![0.0; width];
        let predecessors = edges.predecessors(node);
        if predecessors.is_empty() {
            return acc;
        }
        for &source in predecessors {
            for (column, slot) in acc.iter_mut().enumerate() {
                *slot += hidden[(source, column)];
            }
        }
        let count = predecessors.len() as f64;
        for slot in &mut acc {
            *slot /= count;
        }
        acc
    };

    let rows = match pool {
        Some(pool) => pool.install(|| {
            (0..hidden.nrows())
                .into_par_iter()
                .map(&row_mean)
                .collect::<Vec<_>>()
        }),
        None => (0..hidden.nrows()).map(&row_mean).collect::<Vec<_>>(),
    };
    DMatrix::from_row_iterator(hidden.nrows(), width, rows.into_iter().flatten())
}

/// Inference-only two-layer GraphSAGE-style transition.
#[derive(Debug)]
pub struct SageTransition {
    in_features: usize,
    hidden_size: usize,
    conv1: SageLayer,
    conv2: SageLayer,
    out: Linear,
    pool: Option<rayon::ThreadPool>,
}

impl SageTransition {
    pub fn new(in_features: usize, hidden_size: usize, seed: u64) -> SimResult<Self> {
        if in_features == 0 || hidden_size == 0 {
            return Err(SimulationError::Configuration(format!(
                "transition model needs non-zero widths (in_features={in_features}, hidden_size={hidden_size})"
            )));
        }
        let (conv1, conv2, out) = init_layers(in_features, hidden_size, seed);
        Ok(Self {
            in_features,
            hidden_size,
            conv1,
            conv2,
            out,
            pool: None,
        })
    }

    /// Evaluate aggregation rows on a dedicated pool; `threads <= 1` stays sequential.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.pool = worker_pool(threads);
        self
    }

    /// Threads in the dedicated aggregation pool; 1 when sequential.
    pub fn worker_threads(&self) -> usize {
        self.pool
            .as_ref()
            .map_or(1, rayon::ThreadPool::current_num_threads)
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

fn worker_pool(threads: usize) -> Option<rayon::ThreadPool> {
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            warn!(
                threads,
                error = %err,
                "transition worker pool unavailable; aggregating sequentially"
            );
            None
        }
    }
}

fn init_layers(in_features: usize, hidden_size: usize, seed: u64) -> (SageLayer, SageLayer, Linear) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let conv1 = SageLayer::init(in_features, hidden_size, &mut rng);
    let conv2 = SageLayer::init(hidden_size, hidden_size, &mut rng);
    let out = Linear::init(hidden_size, in_features, true, &mut rng);
    (conv1, conv2, out)
}

impl TransitionModel for SageTransition {
    fn transition(&self, state: &StateMatrix, edges: &EdgeList) -> SimResult<StateMatrix> {
        if state.ncols() != self.in_features {
            return Err(SimulationError::Transition(format!(
                "state has {} columns, model expects {}",
                state.ncols(),
                self.in_features
            )));
        }
        if edges.node_count() != state.nrows() {
            return Err(SimulationError::Transition(format!(
                "edge list covers {} nodes, state has {} rows",
                edges.node_count(),
                state.nrows()
            )));
        }

        let pool = self.pool.as_ref();
        let hidden = self.conv1.forward(state, edges, pool);
        // no dropout outside training
        let hidden = self.conv2.forward(&hidden, edges, pool);
        let delta = self.out.forward(&hidden);

        Ok((state + delta).map(relu))
    }

    fn reset_parameters(&mut self, seed: u64) {
        let (conv1, conv2, out) = init_layers(self.in_features, self.hidden_size, seed);
        self.conv1 = conv1;
        self.conv2 = conv2;
        self.out = out;
    }
}
