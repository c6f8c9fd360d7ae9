//! # Record Loading and Validation Module
//!
//! This module is the entry point for per-individual campaign records.
//! It reads tabular files (CSV), validates them against a strict,
//! predefined schema, and extracts the typed columns consumed by the
//! feature encoder and the indicator reports.
//!
//! - Strict Schema: Column names are not configurable. The module enforces
//!   `ID_Assuré`, `Âge`, `Sexe`, `Participation_post_relance`, etc. The schema
//!   is checked as a whole before any value is read, so a missing column is
//!   always reported before any type or range problem.
//! - User-Centric Errors: Failures are assumed to be user-input errors.
//!   The `DataError` enum is designed to provide clear, actionable feedback.

use ahash::AHashSet;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

pub const ID_COLUMN: &str = "ID_Assuré";
pub const AGE_COLUMN: &str = "Âge";
pub const SEX_COLUMN: &str = "Sexe";
pub const PRIORITY_ZONE_COLUMN: &str = "QPV";
pub const RURAL_ZONE_COLUMN: &str = "ZRR";
pub const INCOME_COLUMN: &str = "Revenu";
pub const ISOLATION_COLUMN: &str = "Score_isolement";
pub const SCREENING_COLUMN: &str = "Statut_dépistage";
pub const CONTACTED_COLUMN: &str = "Relance_effectuée";
pub const PRIOR_PARTICIPATION_COLUMN: &str = "Participation_avant";
pub const OUTCOME_COLUMN: &str = "Participation_post_relance";
/// Appended by the risk model; never read as an input feature.
pub const RISK_COLUMN: &str = "Score_risque";

/// Every column a record table must carry before it can be scored.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    ID_COLUMN,
    AGE_COLUMN,
    SEX_COLUMN,
    PRIORITY_ZONE_COLUMN,
    RURAL_ZONE_COLUMN,
    INCOME_COLUMN,
    ISOLATION_COLUMN,
    SCREENING_COLUMN,
    CONTACTED_COLUMN,
    PRIOR_PARTICIPATION_COLUMN,
    OUTCOME_COLUMN,
];

/// One insured individual, as produced by an in-memory record source.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub age: u32,
    pub sex: String,
    /// Residence in a priority urban zone (QPV).
    pub priority_zone: bool,
    /// Residence in a rural revitalization zone (ZRR).
    pub rural_zone: bool,
    pub income_level: f64,
    pub isolation_score: f64,
    pub screening_status: String,
    pub contacted: bool,
    /// Participation before the current outreach cycle. Reporting only.
    pub prior_participation: bool,
    /// Participation after outreach: the supervised target.
    pub participated: bool,
}

/// Validated, typed view of a record table. Flags are stored as 0.0/1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordColumns {
    pub ids: Vec<String>,
    pub age: Vec<f64>,
    pub sex: Vec<String>,
    pub priority_zone: Vec<f64>,
    pub rural_zone: Vec<f64>,
    pub income_level: Vec<f64>,
    pub isolation_score: Vec<f64>,
    pub screening_status: Vec<String>,
    pub contacted: Vec<f64>,
    pub prior_participation: Vec<f64>,
    pub outcome: Vec<f64>,
}

impl RecordColumns {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A comprehensive error type for all record loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input table. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. Every record must have all required fields populated."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. This tool requires all data to be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("Column '{column_name}' holds '{value}', which is not a yes/no flag.")]
    NonBinaryValue { column_name: String, value: String },
    #[error("Age must be a non-negative whole number, found {value} for record '{id}'.")]
    InvalidAge { id: String, value: f64 },
    #[error("The input table contains no records.")]
    EmptyTable,
    #[error("Identifier '{id}' appears on more than one record; 'ID_Assuré' must be unique.")]
    DuplicateId { id: String },
}

/// Reads a comma-separated record file and checks its schema.
///
/// The returned table is untouched apart from type inference; values are
/// only validated when the table is scored or summarized.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<DataFrame, DataError> {
    let path = path.as_ref();
    log::info!("Loading records from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b',')),
        )
        .finish()?;

    validate_schema(&df)?;
    log::info!("Loaded {} records with {} columns", df.height(), df.width());
    Ok(df)
}

/// Builds a record table from typed records, using the canonical column names.
pub fn records_to_frame(records: &[Record]) -> Result<DataFrame, DataError> {
    let columns = vec![
        Column::new(
            ID_COLUMN.into(),
            records.iter().map(|r| r.id.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            AGE_COLUMN.into(),
            records.iter().map(|r| i64::from(r.age)).collect::<Vec<i64>>(),
        ),
        Column::new(
            SEX_COLUMN.into(),
            records.iter().map(|r| r.sex.clone()).collect::<Vec<String>>(),
        ),
        Column::new(
            PRIORITY_ZONE_COLUMN.into(),
            records.iter().map(|r| r.priority_zone).collect::<Vec<bool>>(),
        ),
        Column::new(
            RURAL_ZONE_COLUMN.into(),
            records.iter().map(|r| r.rural_zone).collect::<Vec<bool>>(),
        ),
        Column::new(
            INCOME_COLUMN.into(),
            records.iter().map(|r| r.income_level).collect::<Vec<f64>>(),
        ),
        Column::new(
            ISOLATION_COLUMN.into(),
            records.iter().map(|r| r.isolation_score).collect::<Vec<f64>>(),
        ),
        Column::new(
            SCREENING_COLUMN.into(),
            records
                .iter()
                .map(|r| r.screening_status.clone())
                .collect::<Vec<String>>(),
        ),
        Column::new(
            CONTACTED_COLUMN.into(),
            records.iter().map(|r| r.contacted).collect::<Vec<bool>>(),
        ),
        Column::new(
            PRIOR_PARTICIPATION_COLUMN.into(),
            records
                .iter()
                .map(|r| r.prior_participation)
                .collect::<Vec<bool>>(),
        ),
        Column::new(
            OUTCOME_COLUMN.into(),
            records.iter().map(|r| r.participated).collect::<Vec<bool>>(),
        ),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Verifies that every required column is present, in any order.
pub fn validate_schema(df: &DataFrame) -> Result<(), DataError> {
    require_columns(df, &REQUIRED_COLUMNS)
}

pub(crate) fn require_columns(df: &DataFrame, names: &[&str]) -> Result<(), DataError> {
    let columns_set: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    for col_name in names {
        if !columns_set.contains(*col_name) {
            return Err(DataError::ColumnNotFound(col_name.to_string()));
        }
    }
    Ok(())
}

/// Validates a record table and extracts its typed columns.
///
/// The schema check runs first; no value is inspected until every required
/// column is known to exist.
pub fn extract_columns(df: &DataFrame) -> Result<RecordColumns, DataError> {
    validate_schema(df)?;
    if df.height() == 0 {
        return Err(DataError::EmptyTable);
    }

    let ids = text_column(df, ID_COLUMN)?;
    let mut seen_ids: AHashSet<&str> = AHashSet::with_capacity(ids.len());
    if let Some(duplicate) = ids.iter().find(|id| !seen_ids.insert(id.as_str())) {
        return Err(DataError::DuplicateId {
            id: duplicate.clone(),
        });
    }

    let age = numeric_column(df, AGE_COLUMN)?;
    for (id, &value) in ids.iter().zip(age.iter()) {
        if value < 0.0 || value.fract() != 0.0 {
            return Err(DataError::InvalidAge {
                id: id.clone(),
                value,
            });
        }
    }

    Ok(RecordColumns {
        age,
        sex: text_column(df, SEX_COLUMN)?,
        priority_zone: flag_column(df, PRIORITY_ZONE_COLUMN)?,
        rural_zone: flag_column(df, RURAL_ZONE_COLUMN)?,
        income_level: numeric_column(df, INCOME_COLUMN)?,
        isolation_score: numeric_column(df, ISOLATION_COLUMN)?,
        screening_status: text_column(df, SCREENING_COLUMN)?,
        contacted: flag_column(df, CONTACTED_COLUMN)?,
        prior_participation: flag_column(df, PRIOR_PARTICIPATION_COLUMN)?,
        outcome: flag_column(df, OUTCOME_COLUMN)?,
        ids,
    })
}

/// Reads a column as finite `f64` values.
pub(crate) fn numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };

    if matches!(series.dtype(), DataType::String) {
        return Err(wrong_type());
    }
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let values: Vec<f64> = casted.f64()?.into_iter().flatten().collect();
    if values.iter().any(|v| !v.is_finite()) {
        return Err(DataError::NonFiniteValuesFound(column_name.to_string()));
    }
    Ok(values)
}

/// Reads a column as text, whatever its inferred type.
pub(crate) fn text_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let casted = series
        .cast(&DataType::String)
        .map_err(|_| DataError::ColumnWrongType {
            column_name: column_name.to_string(),
            expected_type: "text",
            found_type: format!("{:?}", series.dtype()),
        })?;

    let values: Vec<String> = casted
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().trim().to_string())
        .collect();
    Ok(values)
}

/// Reads a yes/no column as 0.0/1.0.
///
/// Accepts native booleans, numeric 0/1, and the text forms
/// `true`/`false`, `oui`/`non`, `yes`/`no`, `1`/`0` in any case.
pub(crate) fn flag_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let non_binary = |value: String| DataError::NonBinaryValue {
        column_name: column_name.to_string(),
        value,
    };

    match series.dtype() {
        DataType::Boolean => Ok(series
            .bool()?
            .into_iter()
            .map(|v| if v.unwrap_or(false) { 1.0 } else { 0.0 })
            .collect()),
        DataType::String => series
            .str()?
            .into_iter()
            .map(|v| {
                let raw = v.unwrap_or_default();
                match raw.trim().to_lowercase().as_str() {
                    "1" | "true" | "oui" | "yes" => Ok(1.0),
                    "0" | "false" | "non" | "no" => Ok(0.0),
                    _ => Err(non_binary(raw.to_string())),
                }
            })
            .collect(),
        _ => {
            let values = numeric_column(df, column_name)?;
            match values.iter().find(|&&v| v != 0.0 && v != 1.0) {
                Some(&bad) => Err(non_binary(bad.to_string())),
                None => Ok(values),
            }
        }
    }
}
