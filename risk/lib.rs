#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

//! Risk scoring for preventive-health outreach campaigns.
//!
//! Records go through [`score`], which fits a fresh random forest and
//! attaches `Score_risque` (probability of non-participation after outreach)
//! to every row; [`select`] then filters the scored table at a threshold.

pub mod cache;
pub mod config;
pub mod data;
pub mod encode;
pub mod export;
pub mod forest;
pub mod indicators;
pub mod model;
pub mod pipeline;
pub mod select;
pub mod synthetic;

pub use cache::ScoreCache;
pub use config::{PipelineConfig, RiskModelConfig};
pub use data::{Record, load_records, records_to_frame};
pub use pipeline::{ErrorKind, RiskError, ScoredTable, score, score_with_config};
pub use select::{Cohort, CohortMember, select, select_cohort};
