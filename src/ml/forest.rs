//! Random forest of CART classification trees for the binary late/on-time label.
//!
//! Each tree draws its bootstrap sample and candidate features from its own
//! RNG seeded with `seed + tree_index`, so the fitted ensemble is identical
//! whether trees are grown sequentially or in parallel.

use anyhow::{bail, ensure, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Estimator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub parallel: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            parallel: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Fraction of late samples that reached this leaf.
        p_late: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn leaf(p_late: f64) -> Self {
        Self { nodes: vec![Node::Leaf { p_late }] }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural check for trees that did not come out of `fit`. Every split
    /// must read an existing feature and point forward to existing nodes, so
    /// `predict_proba` always terminates at a leaf.
    pub fn validate(&self, n_features: usize) -> Result<()> {
        ensure!(!self.nodes.is_empty(), "tree has no nodes");
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                Node::Leaf { p_late } => {
                    ensure!((0.0..=1.0).contains(&p_late), "node {}: leaf probability {} outside [0, 1]", i, p_late);
                }
                Node::Split { feature, threshold, left, right } => {
                    ensure!(feature < n_features, "node {}: split on feature {} of {}", i, feature, n_features);
                    ensure!(!threshold.is_nan(), "node {}: NaN threshold", i);
                    for child in [left, right] {
                        ensure!(
                            child > i && child < self.nodes.len(),
                            "node {}: child index {} outside {}..{}",
                            i,
                            child,
                            i + 1,
                            self.nodes.len()
                        );
                    }
                }
            }
        }
        Ok(())
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        loop {
            match self.nodes[i] {
                Node::Leaf { p_late } => return p_late,
                Node::Split { feature, threshold, left, right } => {
                    i = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    params: &'a ForestParams,
    n_candidate_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn grow(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let pos = samples.iter().filter(|&&s| self.y[s]).count();
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { p_late: pos as f64 / n.max(1) as f64 });

        let pure = pos == 0 || pos == n;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if pure || depth_reached || n < self.params.min_samples_split.max(2) {
            return index;
        }

        let Some(split) = self.best_split(samples, pos) else {
            return index;
        };

        // Partition in place: left side holds values <= threshold.
        let mut mid = 0;
        for i in 0..n {
            if self.x[samples[i]][split.feature] <= split.threshold {
                samples.swap(i, mid);
                mid += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(mid);

        let left = self.grow(left_samples, depth + 1);
        let right = self.grow(right_samples, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    /// Best Gini split over a random subset of features. Like the classic
    /// CART forests, keeps drawing features past the subset size while no
    /// valid split has been found.
    fn best_split(&mut self, samples: &[usize], pos: usize) -> Option<BestSplit> {
        let n = samples.len();
        let n_features = self.x[0].len();
        let parent_impurity = gini(pos, n) * n as f64;
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        let mut ordered: Vec<(f64, bool)> = Vec::with_capacity(n);

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.n_candidate_features && best.is_some() {
                break;
            }

            ordered.clear();
            ordered.extend(samples.iter().map(|&s| (self.x[s][feature], self.y[s])));
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));
            if ordered[0].0 == ordered[n - 1].0 {
                continue;
            }

            let mut left_pos = 0;
            for i in 0..n - 1 {
                if ordered[i].1 {
                    left_pos += 1;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if ordered[i].0 == ordered[i + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let impurity = gini(left_pos, n_left) * n_left as f64
                    + gini(pos - left_pos, n_right) * n_right as f64;
                if best.map_or(true, |b| impurity < b.impurity) {
                    let mut threshold = (ordered[i].0 + ordered[i + 1].0) / 2.0;
                    if threshold >= ordered[i + 1].0 {
                        threshold = ordered[i].0;
                    }
                    best = Some(BestSplit { feature, threshold, impurity });
                }
            }
        }

        best.filter(|b| b.impurity < parent_impurity)
    }
}

fn fit_tree(x: &[Vec<f64>], y: &[bool], params: &ForestParams, tree_index: usize) -> DecisionTree {
    let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(tree_index as u64));
    let n = x.len();
    let mut samples: Vec<usize> = if params.bootstrap {
        (0..n).map(|_| rng.gen_range(0..n)).collect()
    } else {
        (0..n).collect()
    };

    let mut builder = TreeBuilder {
        x,
        y,
        params,
        n_candidate_features: params.max_features.resolve(x[0].len()),
        rng,
        nodes: Vec::new(),
    };
    builder.grow(&mut samples, 0);
    DecisionTree { nodes: builder.nodes }
}

impl Estimator<Vec<f64>> for ForestParams {
    type Fitted = RandomForest;

    fn fit(&self, x: &[Vec<f64>], y: &[bool]) -> Result<RandomForest> {
        if x.is_empty() {
            bail!("cannot fit a forest on zero rows");
        }
        if x.len() != y.len() {
            bail!("feature rows ({}) and labels ({}) differ in length", x.len(), y.len());
        }
        if self.n_trees == 0 {
            bail!("n_trees must be at least 1");
        }

        let trees: Vec<DecisionTree> = if self.parallel {
            (0..self.n_trees)
                .into_par_iter()
                .map(|i| fit_tree(x, y, self, i))
                .collect()
        } else {
            (0..self.n_trees).map(|i| fit_tree(x, y, self, i)).collect()
        };

        let nodes: usize = trees.iter().map(DecisionTree::node_count).sum();
        debug!("Grew {} trees with {} nodes in total", trees.len(), nodes);

        Ok(RandomForest { n_features: x[0].len(), trees })
    }
}

/// Frozen ensemble. The late probability is the mean of the trees' leaf fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn from_trees(n_features: usize, trees: Vec<DecisionTree>) -> Self {
        Self { n_features, trees }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.trees.is_empty(), "forest has no trees");
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features).with_context(|| format!("tree {}", i))?;
        }
        Ok(())
    }

    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_proba(x)).sum();
        total / self.trees.len() as f64
    }
}
