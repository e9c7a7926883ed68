//! Depth-limited CART regression tree.
//!
//! Greedy binary splits minimizing the summed squared error of the two
//! children. A split is only accepted when both children keep at least
//! `min_leaf` rows and the error strictly decreases.

use tabula_core::{Result, TabulaError};

use crate::execution::CancelToken;

#[derive(Debug, Clone)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_leaf: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
        samples: usize,
        std_dev: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        samples: usize,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// One root-to-leaf path: conditions `(feature, threshold, goes_left)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafPath {
    pub conditions: Vec<(usize, f64, bool)>,
    pub value: f64,
    pub samples: usize,
    pub std_dev: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    pub root: TreeNode,
    pub feature_count: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

fn sse_of(y: &[f64], rows: &[usize]) -> (f64, f64, f64) {
    let n = rows.len() as f64;
    let sum: f64 = rows.iter().map(|&i| y[i]).sum();
    let sum_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();
    let mean = if n > 0.0 { sum / n } else { 0.0 };
    let sse = (sum_sq - sum * sum / n.max(1.0)).max(0.0);
    (mean, sse, if n > 1.0 { (sse / (n - 1.0)).sqrt() } else { 0.0 })
}

fn best_split(features: &[Vec<f64>], y: &[f64], rows: &[usize], min_leaf: usize) -> Option<BestSplit> {
    if rows.len() < 2 {
        return None;
    }
    let mut best: Option<BestSplit> = None;
    for (f, column) in features.iter().enumerate() {
        let mut order = rows.to_vec();
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

        let total_sum: f64 = order.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
        let n = order.len();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for k in 0..n - 1 {
            let i = order[k];
            left_sum += y[i];
            left_sq += y[i] * y[i];
            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_leaf || right_n < min_leaf {
                continue;
            }
            let here = column[i];
            let next = column[order[k + 1]];
            if next <= here {
                continue;
            }
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);
            if best.as_ref().map_or(true, |b| sse < b.sse) {
                best = Some(BestSplit {
                    feature: f,
                    threshold: (here + next) / 2.0,
                    sse,
                });
            }
        }
    }
    best
}

fn grow(
    features: &[Vec<f64>],
    y: &[f64],
    rows: Vec<usize>,
    depth: usize,
    params: &TreeParams,
    cancel: &CancelToken,
) -> Result<TreeNode> {
    if cancel.is_cancelled() {
        return Err(TabulaError::Cancelled);
    }
    let (mean, sse, std_dev) = sse_of(y, &rows);
    let leaf = TreeNode::Leaf {
        value: mean,
        samples: rows.len(),
        std_dev,
    };
    if depth >= params.max_depth || rows.len() < 2 * params.min_leaf || sse <= f64::EPSILON {
        return Ok(leaf);
    }
    let Some(split) = best_split(features, y, &rows, params.min_leaf) else {
        return Ok(leaf);
    };
    if split.sse >= sse - 1e-12 {
        return Ok(leaf);
    }
    let column = &features[split.feature];
    let (left, right): (Vec<usize>, Vec<usize>) =
        rows.iter().partition(|&&i| column[i] <= split.threshold);
    let samples = rows.len();
    Ok(TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        samples,
        left: Box::new(grow(features, y, left, depth + 1, params, cancel)?),
        right: Box::new(grow(features, y, right, depth + 1, params, cancel)?),
    })
}

impl RegressionTree {
    /// Fit on column-major features; every column must match `y` in length.
    pub fn fit(features: &[Vec<f64>], y: &[f64], params: &TreeParams, cancel: &CancelToken) -> Result<Self> {
        if y.is_empty() {
            return Err(TabulaError::InvalidInput("cannot fit a tree on zero rows".into()));
        }
        if features.iter().any(|c| c.len() != y.len()) {
            return Err(TabulaError::InvalidInput("feature length does not match target".into()));
        }
        let rows: Vec<usize> = (0..y.len()).collect();
        let root = grow(features, y, rows, 0, params, cancel)?;
        Ok(Self {
            root,
            feature_count: features.len(),
        })
    }

    pub fn predict_row(&self, features: &[Vec<f64>], row: usize) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    node = if features[*feature][row] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn predict(&self, features: &[Vec<f64>], rows: usize) -> Vec<f64> {
        (0..rows).map(|r| self.predict_row(features, r)).collect()
    }

    pub fn leaves(&self) -> Vec<LeafPath> {
        fn walk(node: &TreeNode, path: &mut Vec<(usize, f64, bool)>, out: &mut Vec<LeafPath>) {
            match node {
                TreeNode::Leaf {
                    value,
                    samples,
                    std_dev,
                } => out.push(LeafPath {
                    conditions: path.clone(),
                    value: *value,
                    samples: *samples,
                    std_dev: *std_dev,
                }),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    path.push((*feature, *threshold, true));
                    walk(left, path, out);
                    path.pop();
                    path.push((*feature, *threshold, false));
                    walk(right, path, out);
                    path.pop();
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut Vec::new(), &mut out);
        out
    }

    /// Splits per feature weighted by 1 / (depth + 1), normalized to percentages.
    pub fn feature_importance(&self) -> Vec<f64> {
        fn walk(node: &TreeNode, depth: usize, acc: &mut [f64]) {
            if let TreeNode::Split {
                feature, left, right, ..
            } = node
            {
                acc[*feature] += 1.0 / (depth + 1) as f64;
                walk(left, depth + 1, acc);
                walk(right, depth + 1, acc);
            }
        }
        let mut acc = vec![0.0; self.feature_count];
        walk(&self.root, 0, &mut acc);
        let total: f64 = acc.iter().sum();
        if total > 0.0 {
            acc.iter_mut().for_each(|v| *v = *v / total * 100.0);
        }
        acc
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}
