use crate::config::{ConfigError, RiskModelConfig};
use crate::data::RecordColumns;
use crate::encode::{EncodingError, FEATURE_NAMES, FeatureEncoder};
use crate::forest::{ForestError, RandomForest, TreeParams, default_max_features};
use ndarray::{Array1, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

// Below this many training rows the forest is fitted but the run is flagged.
const SMALL_TRAINING_SET: usize = 30;

/// Custom error type for model fitting and scoring.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Forest(#[from] ForestError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(
        "Every {scope} record has participation outcome {class}; a classifier cannot be fitted on a single class."
    )]
    DegenerateLabel { scope: &'static str, class: u8 },
    #[error("The {rows}-record table leaves no training rows after holding out {held_out}.")]
    EmptyTrainingSet { rows: usize, held_out: usize },
}

/// Row indices of a seeded shuffle split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n` with `seed` and holds out the first `ceil(test_fraction * n)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> TrainTestSplit {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let n_test = ((test_fraction * n as f64).ceil() as usize).min(n);
    let train = order.split_off(n_test);
    TrainTestSplit { train, test: order }
}

/// Quality of the fitted forest on the rows it never saw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldoutReport {
    pub rows: usize,
    /// Share of held-out rows whose participation is predicted correctly at 0.5.
    pub accuracy: f64,
    /// Mean squared error of the participation probability.
    pub brier_score: f64,
}

impl HoldoutReport {
    fn evaluate(participation: &[f64], outcome: &[f64]) -> Option<Self> {
        if participation.is_empty() {
            return None;
        }
        let rows = participation.len();
        let correct = participation
            .iter()
            .zip(outcome)
            .filter(|&(&p, &y)| (p >= 0.5) == (y > 0.5))
            .count();
        let brier = participation
            .iter()
            .zip(outcome)
            .map(|(p, y)| (p - y).powi(2))
            .sum::<f64>()
            / rows as f64;
        Some(Self {
            rows,
            accuracy: correct as f64 / rows as f64,
            brier_score: brier,
        })
    }
}

fn class_of(label: f64) -> u8 {
    u8::from(label > 0.5)
}

fn single_class(y: &Array1<f64>) -> Option<u8> {
    let first = class_of(*y.first()?);
    y.iter().all(|&v| class_of(v) == first).then_some(first)
}

/// A forest fitted for one run, together with the categorical codes it was
/// trained with. Scoring always reuses those codes.
#[derive(Debug, Clone)]
pub struct RiskModel {
    encoder: FeatureEncoder,
    forest: RandomForest,
    config: RiskModelConfig,
    split: TrainTestSplit,
    holdout: Option<HoldoutReport>,
}

impl RiskModel {
    /// Encodes `columns`, splits them, and grows the forest on the training part.
    pub fn fit(columns: &RecordColumns, config: &RiskModelConfig) -> Result<Self, ModelError> {
        config.validate()?;

        let encoder = FeatureEncoder::fit(columns);
        let encoded = encoder.transform(columns)?;
        if let Some(class) = single_class(&encoded.y) {
            return Err(ModelError::DegenerateLabel {
                scope: "input",
                class,
            });
        }

        let n = encoded.y.len();
        let split = train_test_split(n, config.test_fraction, config.seed);
        if split.train.is_empty() {
            return Err(ModelError::EmptyTrainingSet {
                rows: n,
                held_out: split.test.len(),
            });
        }
        log::info!(
            "Split {} records into {} training and {} held-out rows (seed {})",
            n,
            split.train.len(),
            split.test.len(),
            config.seed
        );

        let x_train = encoded.x.select(Axis(0), &split.train);
        let y_train = encoded.y.select(Axis(0), &split.train);
        if let Some(class) = single_class(&y_train) {
            return Err(ModelError::DegenerateLabel {
                scope: "training",
                class,
            });
        }
        if split.train.len() < SMALL_TRAINING_SET {
            log::warn!(
                "Only {} training rows; risk estimates will be coarse.",
                split.train.len()
            );
        }

        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            max_features: default_max_features(FEATURE_NAMES.len()),
        };
        let forest = RandomForest::fit(
            x_train.view(),
            y_train.view(),
            config.n_trees,
            &params,
            config.seed,
        )?;
        log::info!("Fitted random forest with {} trees", forest.tree_count());

        let holdout = if split.test.is_empty() {
            None
        } else {
            let x_test = encoded.x.select(Axis(0), &split.test);
            let y_test = encoded.y.select(Axis(0), &split.test);
            let predicted = forest.predict_positive(x_test.view())?;
            HoldoutReport::evaluate(&predicted, &y_test.to_vec())
        };
        if let Some(report) = &holdout {
            log::info!(
                "Held-out evaluation on {} rows: accuracy {:.3}, Brier score {:.4}",
                report.rows,
                report.accuracy,
                report.brier_score
            );
        }

        Ok(Self {
            encoder,
            forest,
            config: config.clone(),
            split,
            holdout,
        })
    }

    /// Probability of participation after outreach for every record.
    pub fn participation_probabilities(
        &self,
        columns: &RecordColumns,
    ) -> Result<Vec<f64>, ModelError> {
        let encoded = self.encoder.transform(columns)?;
        Ok(self.forest.predict_positive(encoded.x.view())?)
    }

    /// Probability of non-participation (`1 - P(participation)`) for every record.
    /// Higher means higher follow-up priority.
    pub fn risk_probabilities(&self, columns: &RecordColumns) -> Result<Vec<f64>, ModelError> {
        Ok(self
            .participation_probabilities(columns)?
            .into_iter()
            .map(|p| (1.0 - p).clamp(0.0, 1.0))
            .collect())
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    pub fn config(&self) -> &RiskModelConfig {
        &self.config
    }

    pub fn split(&self) -> &TrainTestSplit {
        &self.split
    }

    pub fn holdout(&self) -> Option<&HoldoutReport> {
        self.holdout.as_ref()
    }
}
