use crate::config::BoostingConfig;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f32,
    },
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
    },
}

/// Depth-bounded regression tree with variance-reduction splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn fit(x: &Array2<f32>, targets: &[f32], max_depth: usize, min_leaf: usize) -> Self {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut nodes = Vec::new();
        Self::build(&mut nodes, x, targets, rows, 0, max_depth, min_leaf);
        Self { nodes }
    }

    fn build(
        nodes: &mut Vec<TreeNode>,
        x: &Array2<f32>,
        targets: &[f32],
        rows: Vec<usize>,
        depth: usize,
        max_depth: usize,
        min_leaf: usize,
    ) -> usize {
        let mean = rows.iter().map(|&r| targets[r]).sum::<f32>() / rows.len().max(1) as f32;

        if depth >= max_depth || rows.len() < 2 * min_leaf {
            nodes.push(TreeNode::Leaf { value: mean });
            return nodes.len() - 1;
        }

        let split = match Self::best_split(x, targets, &rows, min_leaf) {
            Some(split) => split,
            None => {
                nodes.push(TreeNode::Leaf { value: mean });
                return nodes.len() - 1;
            }
        };
        let (feature, threshold) = split;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, feature]] <= threshold);

        let index = nodes.len();
        nodes.push(TreeNode::Leaf { value: mean });
        let left = Self::build(nodes, x, targets, left_rows, depth + 1, max_depth, min_leaf);
        let right = Self::build(nodes, x, targets, right_rows, depth + 1, max_depth, min_leaf);
        nodes[index] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Lowest-SSE split over all features, scanning sorted feature values with
    /// running sums. Features are visited in order and only strict
    /// improvements replace the incumbent, so ties resolve deterministically.
    fn best_split(
        x: &Array2<f32>,
        targets: &[f32],
        rows: &[usize],
        min_leaf: usize,
    ) -> Option<(usize, f32)> {
        let n = rows.len() as f32;
        let total_sum: f32 = rows.iter().map(|&r| targets[r]).sum();
        let total_sq: f32 = rows.iter().map(|&r| targets[r] * targets[r]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;

        let mut best: Option<(f32, usize, f32)> = None;

        for feature in 0..x.ncols() {
            let mut ordered: Vec<(f32, f32)> = rows
                .iter()
                .map(|&r| (x[[r, feature]], targets[r]))
                .collect();
            ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0f32;
            let mut left_sq = 0.0f32;

            for i in 1..ordered.len() {
                left_sum += ordered[i - 1].1;
                left_sq += ordered[i - 1].1 * ordered[i - 1].1;

                if ordered[i - 1].0 >= ordered[i].0 {
                    continue;
                }
                if i < min_leaf || (rows.len() - i) < min_leaf {
                    continue;
                }
                let left_n = i as f32;
                let right_n = n - left_n;

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if sse + 1e-8 < best.map(|(s, _, _)| s).unwrap_or(parent_sse) {
                    let threshold = (ordered[i - 1].0 + ordered[i].0) / 2.0;
                    best = Some((sse, feature, threshold));
                }
            }
        }

        best.map(|(_, feature, threshold)| (feature, threshold))
    }

    pub fn predict_row(&self, row: &[f32]) -> f32 {
        let mut node = 0usize;
        loop {
            match &self.nodes[node] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Gradient-boosted regression: an additive ensemble of shallow trees, each
/// fit to the residuals of the prediction so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    pub version: u64,
    pub learning_rate: f32,
    pub base: f32,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedRegressor {
    pub fn fit(x: &Array2<f32>, y: &[f32], config: &BoostingConfig) -> Self {
        debug_assert_eq!(x.nrows(), y.len());

        let base = if y.is_empty() {
            0.0
        } else {
            y.iter().sum::<f32>() / y.len() as f32
        };

        let mut predictions = vec![base; y.len()];
        let mut trees = Vec::with_capacity(config.trees);

        for _ in 0..config.trees {
            let residuals: Vec<f32> = y
                .iter()
                .zip(predictions.iter())
                .map(|(&target, &current)| target - current)
                .collect();

            let tree = RegressionTree::fit(x, &residuals, config.max_depth, config.min_leaf);

            for (row, prediction) in predictions.iter_mut().enumerate() {
                let features: Vec<f32> = x.row(row).to_vec();
                *prediction += config.learning_rate * tree.predict_row(&features);
            }
            trees.push(tree);
        }

        Self {
            version: 0,
            learning_rate: config.learning_rate,
            base,
            trees,
        }
    }

    pub fn predict_row(&self, row: &[f32]) -> f32 {
        let boosted: f32 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        self.base + self.learning_rate * boosted
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}
