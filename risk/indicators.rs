//! Campaign indicators computed from the same validated columns the model uses.

use crate::data::{RISK_COLUMN, RecordColumns, numeric_column, require_columns};
use crate::select::SelectionError;
use polars::prelude::DataFrame;
use std::collections::BTreeMap;
use std::fmt;

pub const RISK_HISTOGRAM_BINS: usize = 20;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[derive(Debug, Clone, PartialEq)]
pub struct CampaignIndicators {
    pub population: usize,
    /// Share of records that participated after outreach.
    pub participation_rate: f64,
    /// Share of records that participated before the current cycle.
    pub prior_participation_rate: f64,
    pub mean_isolation_score: f64,
    /// Mean isolation score per sex category, keyed in sorted order.
    pub isolation_by_sex: BTreeMap<String, f64>,
}

impl CampaignIndicators {
    pub fn compute(columns: &RecordColumns) -> Self {
        let mut by_sex: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        for (sex, &score) in columns.sex.iter().zip(&columns.isolation_score) {
            let entry = by_sex.entry(sex.clone()).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }

        Self {
            population: columns.len(),
            participation_rate: mean(&columns.outcome),
            prior_participation_rate: mean(&columns.prior_participation),
            mean_isolation_score: mean(&columns.isolation_score),
            isolation_by_sex: by_sex
                .into_iter()
                .map(|(sex, (sum, count))| (sex, sum / count as f64))
                .collect(),
        }
    }
}

impl fmt::Display for CampaignIndicators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records: {}", self.population)?;
        writeln!(
            f,
            "Participation after outreach: {:.2}%",
            100.0 * self.participation_rate
        )?;
        writeln!(
            f,
            "Participation before outreach: {:.2}%",
            100.0 * self.prior_participation_rate
        )?;
        write!(f, "Mean isolation score: {:.2}", self.mean_isolation_score)?;
        for (sex, score) in &self.isolation_by_sex {
            write!(f, "\n  {sex}: {score:.2}")?;
        }
        Ok(())
    }
}

/// Fixed-width histogram of risk probabilities over [0, 1].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskHistogram {
    pub counts: [usize; RISK_HISTOGRAM_BINS],
}

impl RiskHistogram {
    pub fn from_risks(risks: &[f64]) -> Self {
        let mut counts = [0usize; RISK_HISTOGRAM_BINS];
        for &r in risks {
            // 1.0 falls into the last bin.
            let bin = ((r.clamp(0.0, 1.0) * RISK_HISTOGRAM_BINS as f64) as usize)
                .min(RISK_HISTOGRAM_BINS - 1);
            counts[bin] += 1;
        }
        Self { counts }
    }

    pub fn from_scored(scored: &DataFrame) -> Result<Self, SelectionError> {
        if require_columns(scored, &[RISK_COLUMN]).is_err() {
            return Err(SelectionError::NotScored);
        }
        Ok(Self::from_risks(&numeric_column(scored, RISK_COLUMN)?))
    }

    /// Lower edge of each bin.
    pub fn edges() -> impl Iterator<Item = f64> {
        (0..RISK_HISTOGRAM_BINS).map(|i| i as f64 / RISK_HISTOGRAM_BINS as f64)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}
