//! # Scoring Pipeline
//!
//! The single definition of the batch computation:
//!
//! 1.  **Validate:** the table's schema and values are checked before any
//!     encoding ([`extract_columns`]).
//! 2.  **Fit:** a fresh [`RiskModel`] is fitted on a seeded 80/20 split.
//! 3.  **Score:** every record, training rows included, gets
//!     `Score_risque = 1 - P(participation after outreach)`.
//!
//! The model is dropped once the column is attached; nothing persists
//! between runs. Cohort selection on the returned table lives in
//! [`crate::select`].

use crate::config::{ConfigError, RiskModelConfig};
use crate::data::{DataError, RISK_COLUMN, RecordColumns, extract_columns};
use crate::encode::EncodingError;
use crate::export::ExportError;
use crate::model::{HoldoutReport, ModelError, RiskModel};
use crate::select::SelectionError;
use polars::prelude::*;
use thiserror::Error;

/// Failure categories callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required field is missing or unusable.
    Schema,
    /// A categorical value lies outside the fitted domain.
    Domain,
    /// The outcome has a single class.
    DegenerateLabel,
    /// A caller-supplied parameter is out of range.
    Parameter,
    /// Filesystem or serialization failure outside the computation itself.
    Io,
}

#[derive(Error, Debug)]
pub enum RiskError {
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn data_kind(err: &DataError) -> ErrorKind {
    match err {
        DataError::IoError(_) => ErrorKind::Io,
        _ => ErrorKind::Schema,
    }
}

impl RiskError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RiskError::Data(e) => data_kind(e),
            RiskError::Model(ModelError::Encoding(EncodingError::UnknownCategory { .. })) => {
                ErrorKind::Domain
            }
            RiskError::Model(ModelError::DegenerateLabel { .. }) => ErrorKind::DegenerateLabel,
            RiskError::Model(ModelError::EmptyTrainingSet { .. }) => ErrorKind::Schema,
            RiskError::Model(ModelError::Forest(_)) => ErrorKind::Schema,
            RiskError::Model(ModelError::Config(_)) => ErrorKind::Parameter,
            RiskError::Selection(SelectionError::ThresholdOutOfRange(_)) => ErrorKind::Parameter,
            RiskError::Selection(SelectionError::Data(e)) => data_kind(e),
            RiskError::Selection(_) => ErrorKind::Schema,
            RiskError::Config(ConfigError::Invalid(_)) => ErrorKind::Parameter,
            RiskError::Config(_) => ErrorKind::Io,
            RiskError::Export(ExportError::Selection(SelectionError::ThresholdOutOfRange(_))) => {
                ErrorKind::Parameter
            }
            RiskError::Export(_) => ErrorKind::Io,
        }
    }
}

/// A record table with its risk column attached, plus the held-out report
/// of the fit that produced it.
#[derive(Debug, Clone)]
pub struct ScoredTable {
    pub frame: DataFrame,
    pub holdout: Option<HoldoutReport>,
}

/// Fits a fresh model on `table` and returns a copy with `Score_risque` attached.
///
/// An existing `Score_risque` column is replaced, never reused.
pub fn score_with_config(
    table: &DataFrame,
    config: &RiskModelConfig,
) -> Result<ScoredTable, RiskError> {
    let columns = extract_columns(table)?;
    attach_scores(table, &fit_scores(&columns, config)?)
}

/// Risk vector and held-out report of one fit, independent of any table layout.
#[derive(Debug, Clone)]
pub(crate) struct FittedScores {
    pub(crate) risk: Vec<f64>,
    pub(crate) holdout: Option<HoldoutReport>,
}

/// Fits a fresh model on already extracted columns and scores every record.
pub(crate) fn fit_scores(
    columns: &RecordColumns,
    config: &RiskModelConfig,
) -> Result<FittedScores, RiskError> {
    log::info!("Scoring {} records", columns.len());
    let model = RiskModel::fit(columns, config)?;
    Ok(FittedScores {
        risk: model.risk_probabilities(columns)?,
        holdout: model.holdout().copied(),
    })
}

/// Copies `table` and attaches `scores` as `Score_risque`, replacing any previous column.
pub(crate) fn attach_scores(
    table: &DataFrame,
    scores: &FittedScores,
) -> Result<ScoredTable, RiskError> {
    let mut frame = table.clone();
    if frame.column(RISK_COLUMN).is_ok() {
        log::debug!("Replacing existing '{RISK_COLUMN}' column");
    }
    frame
        .with_column(Column::new(RISK_COLUMN.into(), scores.risk.clone()))
        .map_err(DataError::from)?;

    Ok(ScoredTable {
        frame,
        holdout: scores.holdout,
    })
}

/// Scores `table` with the default 100-tree forest and seed 42.
pub fn score(table: &DataFrame) -> Result<DataFrame, RiskError> {
    Ok(score_with_config(table, &RiskModelConfig::default())?.frame)
}
