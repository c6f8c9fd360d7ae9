//! Feature encoding for the risk model.
//!
//! Categorical columns are mapped to integer codes derived from the values
//! present when the encoder is fitted. The fitted encoder is kept with the
//! model for the whole run, so training rows and the full population are
//! encoded with the same mapping.

use crate::data::{RecordColumns, SCREENING_COLUMN, SEX_COLUMN};
use itertools::Itertools;
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Canonical feature order of the model matrix.
pub const FEATURE_NAMES: [&str; 8] = [
    "age",
    "sex",
    "priority_zone",
    "rural_zone",
    "income_level",
    "isolation_score",
    "screening_status",
    "contacted",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error(
        "Value '{value}' in column '{column}' was not present when the encoder was fitted (known values: {known:?})."
    )]
    UnknownCategory {
        column: String,
        value: String,
        known: Vec<String>,
    },
}

/// Sorted code table for one categorical column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCodes {
    column: String,
    categories: Vec<String>,
}

impl CategoryCodes {
    /// Codes are assigned in sorted order of the distinct values.
    pub fn fit(column: &str, values: &[String]) -> Self {
        Self {
            column: column.to_string(),
            categories: values.iter().cloned().sorted().dedup().collect(),
        }
    }

    pub fn code(&self, value: &str) -> Result<f64, EncodingError> {
        self.categories
            .binary_search_by(|probe| probe.as_str().cmp(value))
            .map(|idx| idx as f64)
            .map_err(|_| EncodingError::UnknownCategory {
                column: self.column.clone(),
                value: value.to_string(),
                known: self.categories.clone(),
            })
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }
}

/// Model-ready view of a record table.
#[derive(Debug, Clone)]
pub struct EncodedFeatures {
    /// Shape: [n_records, FEATURE_NAMES.len()].
    pub x: Array2<f64>,
    /// Participation after outreach, 0.0 or 1.0.
    pub y: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureEncoder {
    sex: CategoryCodes,
    screening: CategoryCodes,
}

impl FeatureEncoder {
    pub fn fit(columns: &RecordColumns) -> Self {
        let encoder = Self {
            sex: CategoryCodes::fit(SEX_COLUMN, &columns.sex),
            screening: CategoryCodes::fit(SCREENING_COLUMN, &columns.screening_status),
        };
        log::debug!(
            "Fitted categorical codes: sex={:?}, screening={:?}",
            encoder.sex.categories(),
            encoder.screening.categories()
        );
        encoder
    }

    pub fn sex_codes(&self) -> &CategoryCodes {
        &self.sex
    }

    pub fn screening_codes(&self) -> &CategoryCodes {
        &self.screening
    }

    /// Encodes every row; the first unknown category aborts the whole table.
    pub fn transform(&self, columns: &RecordColumns) -> Result<EncodedFeatures, EncodingError> {
        let n = columns.len();
        let mut x = Array2::<f64>::zeros((n, FEATURE_NAMES.len()));

        for (i, mut row) in x.rows_mut().into_iter().enumerate() {
            row[0] = columns.age[i];
            row[1] = self.sex.code(&columns.sex[i])?;
            row[2] = columns.priority_zone[i];
            row[3] = columns.rural_zone[i];
            row[4] = columns.income_level[i];
            row[5] = columns.isolation_score[i];
            row[6] = self.screening.code(&columns.screening_status[i])?;
            row[7] = columns.contacted[i];
        }

        Ok(EncodedFeatures {
            x,
            y: Array1::from(columns.outcome.clone()),
        })
    }
}
