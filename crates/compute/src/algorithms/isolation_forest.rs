//! One-dimensional isolation forest.
//!
//! Points that need fewer random splits to isolate are anomalous. With
//! average path length E[h(x)] over the ensemble and c(n) the expected
//! unsuccessful-search depth of a binary search tree,
//! score = 2^(-E[h(x)] / c(n)). Scores near 1 are anomalies, around 0.5
//! are ordinary.
//!
//! The ensemble is bounded: a fixed number of trees, a fixed subsample size,
//! and a depth limit of ceil(log2(subsample)). Randomness comes from a seeded
//! `StdRng`, so identical input and seed give identical scores.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use tabula_core::{Result, TabulaError};

use crate::execution::CancelToken;

#[derive(Debug, Clone)]
pub struct IsolationForestParams {
    pub trees: usize,
    pub subsample: usize,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            trees: 100,
            subsample: 256,
            seed: 42,
        }
    }
}

enum Node {
    Leaf { size: usize },
    Split { value: f64, left: Box<Node>, right: Box<Node> },
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn c_factor(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let nf = n as f64;
            2.0 * ((nf - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (nf - 1.0) / nf
        }
    }
}

fn build(data: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || data.len() <= 1 {
        return Node::Leaf { size: data.len() };
    }
    let (min, max) = data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max - min <= f64::EPSILON {
        return Node::Leaf { size: data.len() };
    }
    let value = rng.gen_range(min..max);
    let (left, right): (Vec<f64>, Vec<f64>) = data.iter().partition(|&&v| v < value);
    Node::Split {
        value,
        left: Box::new(build(&left, depth + 1, max_depth, rng)),
        right: Box::new(build(&right, depth + 1, max_depth, rng)),
    }
}

fn path_length(x: f64, node: &Node, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + c_factor(*size),
        Node::Split { value, left, right } => {
            if x < *value {
                path_length(x, left, depth + 1)
            } else {
                path_length(x, right, depth + 1)
            }
        }
    }
}

/// Anomaly score for every value, aligned with the input.
pub fn score(values: &[f64], params: &IsolationForestParams, cancel: &CancelToken) -> Result<Vec<f64>> {
    let n = values.len();
    if n < 2 {
        return Ok(vec![0.0; n]);
    }
    let psi = params.subsample.clamp(2, n);
    let max_depth = (psi as f64).log2().ceil() as usize;
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut totals = vec![0.0; n];
    for _ in 0..params.trees.max(1) {
        if cancel.is_cancelled() {
            return Err(TabulaError::Cancelled);
        }
        let idx = sample(&mut rng, n, psi);
        let subsample: Vec<f64> = idx.iter().map(|i| values[i]).collect();
        let tree = build(&subsample, 0, max_depth, &mut rng);
        for (total, &v) in totals.iter_mut().zip(values) {
            *total += path_length(v, &tree, 0);
        }
    }

    let c = c_factor(psi);
    let trees = params.trees.max(1) as f64;
    Ok(totals
        .into_iter()
        .map(|t| {
            if c <= 0.0 {
                0.5
            } else {
                2f64.powf(-(t / trees) / c)
            }
        })
        .collect())
}
