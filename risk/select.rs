//! Threshold-based cohort selection over a scored table.
//!
//! Selection is a stable filter: members keep their original relative order.
//! It never touches the model, so it can be re-run for every threshold change.

use crate::data::{
    AGE_COLUMN, DataError, ID_COLUMN, RISK_COLUMN, SEX_COLUMN, numeric_column, require_columns,
    text_column,
};
use polars::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Priority threshold must lie in [0, 1], got {0}.")]
    ThresholdOutOfRange(f64),
    #[error("The table has no 'Score_risque' column; score it before selecting a cohort.")]
    NotScored,
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Rejects thresholds outside [0, 1], NaN included.
pub fn validate_threshold(threshold: f64) -> Result<f64, SelectionError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(SelectionError::ThresholdOutOfRange(threshold))
    }
}

/// Evenly spaced thresholds `0, 1/steps, ..., 1`, each computed by division
/// so grid points equal their decimal literals (`3.0 / 20.0 == 0.15`).
pub fn threshold_grid(steps: usize) -> Vec<f64> {
    let steps = steps.max(1);
    (0..=steps).map(|step| step as f64 / steps as f64).collect()
}

/// One selected individual, limited to the exported fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortMember {
    pub id: String,
    pub age: u32,
    pub sex: String,
    pub risk: f64,
}

/// Records whose risk is at least the threshold, in input order.
#[derive(Debug, Clone)]
pub struct Cohort {
    records: DataFrame,
    threshold: f64,
}

impl Cohort {
    pub fn records(&self) -> &DataFrame {
        &self.records
    }

    pub fn count(&self) -> usize {
        self.records.height()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn into_parts(self) -> (DataFrame, usize) {
        let count = self.count();
        (self.records, count)
    }

    /// Typed view of the exported fields of every member.
    pub fn members(&self) -> Result<Vec<CohortMember>, SelectionError> {
        require_columns(&self.records, &[ID_COLUMN, AGE_COLUMN, SEX_COLUMN, RISK_COLUMN])?;
        let ids = text_column(&self.records, ID_COLUMN)?;
        let ages = numeric_column(&self.records, AGE_COLUMN)?;
        let sexes = text_column(&self.records, SEX_COLUMN)?;
        let risks = numeric_column(&self.records, RISK_COLUMN)?;

        ids.into_iter()
            .zip(ages)
            .zip(sexes)
            .zip(risks)
            .map(|(((id, age), sex), risk)| {
                // The frame may come from any source, not only a validated table.
                if !(0.0..=f64::from(u32::MAX)).contains(&age) || age.fract() != 0.0 {
                    return Err(SelectionError::Data(DataError::InvalidAge { id, value: age }));
                }
                Ok(CohortMember {
                    id,
                    age: age as u32,
                    sex,
                    risk,
                })
            })
            .collect()
    }
}

/// Selects the cohort at `threshold` (inclusive).
pub fn select_cohort(scored: &DataFrame, threshold: f64) -> Result<Cohort, SelectionError> {
    let threshold = validate_threshold(threshold)?;
    if require_columns(scored, &[RISK_COLUMN]).is_err() {
        return Err(SelectionError::NotScored);
    }

    let risk = scored.column(RISK_COLUMN)?.cast(&DataType::Float64)?;
    let mask = risk.f64()?.gt_eq(threshold);
    let records = scored.filter(&mask)?;
    log::debug!(
        "Threshold {:.2} selects {} of {} records",
        threshold,
        records.height(),
        scored.height()
    );
    Ok(Cohort { records, threshold })
}

/// Selected records and their count.
pub fn select(scored: &DataFrame, threshold: f64) -> Result<(DataFrame, usize), SelectionError> {
    Ok(select_cohort(scored, threshold)?.into_parts())
}
