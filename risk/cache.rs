//! Memoization boundary between fitting and cohort selection.
//!
//! The risk vector of a fit is cached under a fingerprint of the validated
//! record columns and the model configuration, and is attached to the
//! caller's own table on every lookup. Threshold changes then only re-run
//! the selector; any change to the records or the configuration produces a
//! new fingerprint and therefore a fresh fit.

use crate::config::RiskModelConfig;
use crate::data::{RecordColumns, extract_columns};
use crate::pipeline::{FittedScores, RiskError, ScoredTable, attach_scores, fit_scores};
use crate::select::{Cohort, select_cohort};
use ahash::{AHashMap, RandomState};
use polars::prelude::DataFrame;
use std::collections::VecDeque;
use std::hash::{BuildHasher, Hash, Hasher};

const DEFAULT_CAPACITY: usize = 4;

// Fixed seeds keep fingerprints identical for identical content.
const FINGERPRINT_SEEDS: [u64; 4] = [
    0x243F_6A88_85A3_08D3,
    0x1319_8A2E_0370_7344,
    0xA409_3822_299F_31D0,
    0x082E_FA98_EC4E_6C89,
];

fn hash_floats<H: Hasher>(values: &[f64], state: &mut H) {
    values.len().hash(state);
    for v in values {
        v.to_bits().hash(state);
    }
}

/// Content fingerprint of a validated record table under a model configuration.
pub fn fingerprint(columns: &RecordColumns, config: &RiskModelConfig) -> u64 {
    let [k0, k1, k2, k3] = FINGERPRINT_SEEDS;
    let mut state = RandomState::with_seeds(k0, k1, k2, k3).build_hasher();

    columns.ids.hash(&mut state);
    columns.sex.hash(&mut state);
    columns.screening_status.hash(&mut state);
    for values in [
        &columns.age,
        &columns.priority_zone,
        &columns.rural_zone,
        &columns.income_level,
        &columns.isolation_score,
        &columns.contacted,
        &columns.prior_participation,
        &columns.outcome,
    ] {
        hash_floats(values, &mut state);
    }

    config.n_trees.hash(&mut state);
    config.seed.hash(&mut state);
    config.test_fraction.to_bits().hash(&mut state);
    config.max_depth.hash(&mut state);
    config.min_samples_split.hash(&mut state);
    state.finish()
}

/// Bounded cache of fitted risk vectors, evicting the oldest entry first.
pub struct ScoreCache {
    config: RiskModelConfig,
    entries: AHashMap<u64, FittedScores>,
    order: VecDeque<u64>,
    capacity: usize,
    fits: usize,
}

impl ScoreCache {
    pub fn new(config: RiskModelConfig) -> Self {
        Self::with_capacity(config, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(config: RiskModelConfig, capacity: usize) -> Self {
        Self {
            config,
            entries: AHashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            fits: 0,
        }
    }

    pub fn config(&self) -> &RiskModelConfig {
        &self.config
    }

    /// Returns the scored version of `table`, fitting only on a cache miss.
    ///
    /// Columns outside the required schema are not part of the fingerprint;
    /// they are always taken from `table` itself.
    pub fn scored(&mut self, table: &DataFrame) -> Result<ScoredTable, RiskError> {
        let columns = extract_columns(table)?;
        let key = fingerprint(&columns, &self.config);

        if self.entries.contains_key(&key) {
            log::debug!("Score cache hit for fingerprint {key:016x}");
        } else {
            let scores = fit_scores(&columns, &self.config)?;
            self.fits += 1;
            if self.order.len() == self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key);
            self.entries.insert(key, scores);
        }

        attach_scores(table, &self.entries[&key])
    }

    /// Selects the cohort at `threshold`, reusing the cached scores of `table`.
    pub fn select(&mut self, table: &DataFrame, threshold: f64) -> Result<Cohort, RiskError> {
        crate::select::validate_threshold(threshold)?;
        let scored = self.scored(table)?;
        Ok(select_cohort(&scored.frame, threshold)?)
    }

    /// Number of model fits performed so far.
    pub fn fits(&self) -> usize {
        self.fits
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
