//! Delimited-text outputs.
//!
//! The cohort extract is the artifact consumed by outreach teams, so its
//! header and column order are fixed: `ID_Assuré,Âge,Sexe,Score_risque`.

use crate::data::{AGE_COLUMN, ID_COLUMN, RISK_COLUMN, SEX_COLUMN};
use crate::select::{Cohort, SelectionError};
use polars::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

pub const EXPORT_COLUMNS: [&str; 4] = [ID_COLUMN, AGE_COLUMN, SEX_COLUMN, RISK_COLUMN];

/// File name offered for the cohort download.
pub const DEFAULT_COHORT_FILE: &str = "prioritaires_score.csv";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write delimited output: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}

/// Writes the cohort extract with a header row and returns the number of rows written.
pub fn write_cohort_csv<W: Write>(cohort: &Cohort, writer: W) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(EXPORT_COLUMNS)?;

    let members = cohort.members()?;
    let mut risk_buffer = ryu::Buffer::new();
    for member in &members {
        csv_writer.write_record([
            member.id.as_str(),
            member.age.to_string().as_str(),
            member.sex.as_str(),
            risk_buffer.format(member.risk),
        ])?;
    }
    csv_writer.flush()?;
    Ok(members.len())
}

pub fn save_cohort_csv<P: AsRef<Path>>(cohort: &Cohort, path: P) -> Result<usize, ExportError> {
    let rows = write_cohort_csv(cohort, File::create(path.as_ref())?)?;
    log::info!(
        "Wrote {} prioritized records to '{}'",
        rows,
        path.as_ref().display()
    );
    Ok(rows)
}

/// Writes a whole (typically scored) table, all columns, with a header row.
pub fn save_table_csv<P: AsRef<Path>>(table: &DataFrame, path: P) -> Result<(), ExportError> {
    let mut file = File::create(path.as_ref())?;
    let mut table = table.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(&mut table)?;
    log::info!(
        "Wrote {} scored records to '{}'",
        table.height(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::select_cohort;

    fn scored() -> DataFrame {
        DataFrame::new(vec![
            Column::new(ID_COLUMN.into(), vec!["A1".to_string(), "A2".to_string()]),
            Column::new(AGE_COLUMN.into(), vec![34i64, 71]),
            Column::new(SEX_COLUMN.into(), vec!["F".to_string(), "M".to_string()]),
            Column::new("Revenu".into(), vec![2.0, 4.0]),
            Column::new(RISK_COLUMN.into(), vec![0.75, 0.25]),
        ])
        .unwrap()
    }

    #[test]
    fn extract_has_fixed_header_and_only_exported_columns() {
        let cohort = select_cohort(&scored(), 0.5).unwrap();
        let mut out = Vec::new();
        let rows = write_cohort_csv(&cohort, &mut out).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID_Assuré,Âge,Sexe,Score_risque\nA1,34,F,0.75\n"
        );
    }

    #[test]
    fn empty_cohort_still_writes_the_header() {
        let cohort = select_cohort(&scored(), 0.9).unwrap();
        let mut out = Vec::new();
        assert_eq!(write_cohort_csv(&cohort, &mut out).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ID_Assuré,Âge,Sexe,Score_risque\n"
        );
    }
}
