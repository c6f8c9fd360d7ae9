//! # Bagged Classification Trees
//!
//! A random forest for a binary 0/1 response:
//!
//! 1.  **Bagging:** every tree is grown on a bootstrap resample (with
//!     replacement, same size) of the training rows.
//! 2.  **CART growth:** nodes are split on the threshold that minimizes the
//!     weighted Gini impurity of the two children, considering a random
//!     subset of `max_features` features per node. If none of those features
//!     admits a valid split, further features are examined until one does.
//!     Trees are grown until nodes are pure, too small to split, or the depth
//!     limit is hit.
//! 3.  **Prediction:** the positive-class probability of a row is the mean
//!     over trees of the positive fraction of the leaf it falls into.
//!
//! Each tree owns an RNG seeded from a master RNG in tree order, and votes
//! are summed in tree order, so the output is bit-for-bit reproducible
//! regardless of how rayon schedules the work.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("Cannot grow a forest without training rows.")]
    EmptyTrainingSet,
    #[error("Feature matrix has {rows} rows but the response has {labels} entries.")]
    MismatchedRows { rows: usize, labels: usize },
    #[error("Prediction data has {found} feature columns, but the forest was trained on {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error("A forest needs at least one tree.")]
    NoTrees,
}

/// Growth parameters shared by every tree of a forest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        positive_fraction: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    /// Grows a tree over `rows` (indices into `x`; duplicates allowed).
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        rows: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, rows, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        mut rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        let total = rows.len();
        let positives = rows.iter().filter(|&&r| y[r] > 0.5).count();
        let positive_fraction = if total == 0 {
            0.0
        } else {
            positives as f64 / total as f64
        };
        self.nodes.push(Node::Leaf { positive_fraction });

        let depth_reached = params.max_depth.is_some_and(|limit| depth >= limit);
        if depth_reached || total < params.min_samples_split || positives == 0 || positives == total
        {
            return node_id;
        }

        let Some(best) = Self::find_split(x, y, &mut rows, positives, params, rng) else {
            return node_id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, best.feature]] <= best.threshold);

        let left = self.grow(x, y, left_rows, depth + 1, params, rng);
        let right = self.grow(x, y, right_rows, depth + 1, params, rng);
        self.nodes[node_id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_id
    }

    fn find_split(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        rows: &mut [usize],
        positives: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let total = rows.len();
        let mut features: Vec<usize> = (0..x.ncols()).collect();
        features.shuffle(rng);

        let mut best: Option<BestSplit> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= params.max_features && best.is_some() {
                break;
            }

            rows.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left_positives = 0usize;
            for k in 1..total {
                if y[rows[k - 1]] > 0.5 {
                    left_positives += 1;
                }
                let lower = x[[rows[k - 1], feature]];
                let upper = x[[rows[k], feature]];
                if lower >= upper {
                    continue;
                }

                let right_positives = positives - left_positives;
                let impurity = (k as f64 * gini(left_positives, k)
                    + (total - k) as f64 * gini(right_positives, total - k))
                    / total as f64;

                if best.as_ref().is_none_or(|b| impurity < b.impurity) {
                    let mut threshold = lower + (upper - lower) / 2.0;
                    if threshold >= upper {
                        threshold = lower;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        impurity,
                    });
                }
            }
        }
        best
    }

    /// Positive-class fraction of the leaf reached by `row`.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Grows `n_trees` bagged trees over every row of `x`.
    pub fn fit(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        n_trees: usize,
        params: &TreeParams,
        seed: u64,
    ) -> Result<Self, ForestError> {
        if n_trees == 0 {
            return Err(ForestError::NoTrees);
        }
        if x.nrows() != y.len() {
            return Err(ForestError::MismatchedRows {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        let n = x.nrows();
        if n == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..n_trees).map(|_| master.r#gen()).collect();

        let trees: Vec<DecisionTree> = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, bootstrap, params, &mut rng)
            })
            .collect();

        log::debug!(
            "Grew {} trees (mean {:.1} nodes, max depth {})",
            trees.len(),
            trees.iter().map(DecisionTree::node_count).sum::<usize>() as f64 / trees.len() as f64,
            trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
        );

        Ok(Self {
            trees,
            n_features: x.ncols(),
        })
    }

    /// Positive-class probability for every row of `x`.
    pub fn predict_positive(&self, x: ArrayView2<f64>) -> Result<Vec<f64>, ForestError> {
        if x.ncols() != self.n_features {
            return Err(ForestError::MismatchedFeatureCount {
                found: x.ncols(),
                expected: self.n_features,
            });
        }
        let n_trees = self.trees.len() as f64;
        Ok((0..x.nrows())
            .into_par_iter()
            .map(|r| {
                let row = x.row(r);
                let votes = self
                    .trees
                    .iter()
                    .fold(0.0, |acc, tree| acc + tree.predict_row(row));
                (votes / n_trees).clamp(0.0, 1.0)
            })
            .collect())
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Default per-node feature budget for classification: `floor(sqrt(p))`, at least one.
pub fn default_max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, array};

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            max_features: 1,
        }
    }

    #[test]
    fn single_tree_separates_a_threshold_pattern() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut rng = StdRng::seed_from_u64(7);
        let tree = DecisionTree::fit(x.view(), y.view(), (0..6).collect(), &params(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(array![2.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![6.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![6.6].view()), 1.0);
    }

    #[test]
    fn constant_features_yield_a_single_leaf() {
        let x = Array2::from_elem((4, 2), 3.0);
        let y = array![0.0, 1.0, 1.0, 0.0];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = DecisionTree::fit(x.view(), y.view(), (0..4).collect(), &params(), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(array![3.0, 3.0].view()), 0.5);
    }

    #[test]
    fn depth_limit_is_respected() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(32, |i| (i % 2) as f64);
        let limited = TreeParams {
            max_depth: Some(2),
            ..params()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let tree = DecisionTree::fit(x.view(), y.view(), (0..32).collect(), &limited, &mut rng);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn forest_is_reproducible_for_a_fixed_seed() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * (j + 3)) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| if (i * 7) % 5 < 2 { 1.0 } else { 0.0 });
        let p = TreeParams {
            max_features: default_max_features(3),
            ..params()
        };

        let a = RandomForest::fit(x.view(), y.view(), 25, &p, 42).unwrap();
        let b = RandomForest::fit(x.view(), y.view(), 25, &p, 42).unwrap();
        assert_eq!(a, b);

        let pa = a.predict_positive(x.view()).unwrap();
        let pb = b.predict_positive(x.view()).unwrap();
        assert_eq!(pa, pb);
        assert!(pa.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn thread_count_does_not_change_the_forest() {
        let x = Array2::from_shape_fn((60, 4), |(i, j)| ((i * (j + 5) + j) % 13) as f64);
        let y = Array1::from_shape_fn(60, |i| if (i * 3) % 7 < 3 { 1.0 } else { 0.0 });
        let p = TreeParams {
            max_features: default_max_features(4),
            ..params()
        };

        let pooled = RandomForest::fit(x.view(), y.view(), 30, &p, 42).unwrap();
        let single_thread = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .unwrap();
        let sequential =
            single_thread.install(|| RandomForest::fit(x.view(), y.view(), 30, &p, 42).unwrap());

        assert_eq!(pooled, sequential);
        assert_eq!(
            pooled.predict_positive(x.view()).unwrap(),
            single_thread.install(|| sequential.predict_positive(x.view()).unwrap())
        );
    }

    #[test]
    fn prediction_rejects_wrong_width() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let y = array![0.0, 1.0];
        let forest = RandomForest::fit(x.view(), y.view(), 3, &params(), 0).unwrap();
        let narrow = array![[0.0], [1.0]];
        assert_eq!(
            forest.predict_positive(narrow.view()),
            Err(ForestError::MismatchedFeatureCount {
                found: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn zero_trees_is_rejected() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 1.0];
        assert_eq!(
            RandomForest::fit(x.view(), y.view(), 0, &params(), 0),
            Err(ForestError::NoTrees)
        );
    }

    #[test]
    fn default_feature_budget_is_floor_sqrt() {
        assert_eq!(default_max_features(8), 2);
        assert_eq!(default_max_features(9), 3);
        assert_eq!(default_max_features(1), 1);
        assert_eq!(default_max_features(0), 1);
    }
}
