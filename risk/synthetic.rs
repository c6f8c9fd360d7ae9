//! Seeded generator for demonstration campaign data.
//!
//! The population mimics the shape of a regional prevention campaign: mostly
//! adults of working and retirement age, a minority living in priority or
//! rural zones, and a participation outcome that drops with isolation and
//! rises with income, prior participation and outreach contact.

use crate::data::Record;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

pub const SCREENING_STATUSES: [&str; 3] = ["À jour", "En retard", "Jamais"];

fn logistic(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

/// Builder for a synthetic record population.
pub struct PopulationBuilder {
    n_records: usize,
    seed: u64,
    priority_zone_rate: f64,
    rural_zone_rate: f64,
    contact_rate: f64,
}

impl PopulationBuilder {
    pub fn new(n_records: usize) -> Self {
        Self {
            n_records,
            seed: 42,
            priority_zone_rate: 0.15,
            rural_zone_rate: 0.12,
            contact_rate: 0.7,
        }
    }

    /// Set the random seed for reproducibility.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_priority_zone_rate(mut self, rate: f64) -> Self {
        self.priority_zone_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_rural_zone_rate(mut self, rate: f64) -> Self {
        self.rural_zone_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_contact_rate(mut self, rate: f64) -> Self {
        self.contact_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> Vec<Record> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.n_records)
            .map(|i| self.draw_record(i, &mut rng))
            .collect()
    }

    fn draw_record(&self, index: usize, rng: &mut StdRng) -> Record {
        let age: u32 = rng.gen_range(18..=85);
        let sex = if rng.gen_bool(0.52) { "F" } else { "M" };
        let priority_zone = rng.gen_bool(self.priority_zone_rate);
        let rural_zone = !priority_zone && rng.gen_bool(self.rural_zone_rate);

        // Income bracket 1 (lowest) to 5, shifted down in priority zones.
        let income_shift = if priority_zone { 1.0 } else { 0.0 };
        let income_draw: f64 = rng.sample(StandardNormal);
        let income_level = (3.0 - income_shift + 1.1 * income_draw).round().clamp(1.0, 5.0);

        let isolation_draw: f64 = rng.sample(StandardNormal);
        let isolation_base = 0.35
            + if rural_zone { 0.15 } else { 0.0 }
            + if age >= 75 { 0.1 } else { 0.0 };
        let isolation_score = (isolation_base + 0.18 * isolation_draw).clamp(0.0, 1.0);

        let screening_status = SCREENING_STATUSES[match rng.gen_range(0..100) {
            0..=54 => 0,
            55..=79 => 1,
            _ => 2,
        }];
        let contacted = rng.gen_bool(self.contact_rate);

        let prior_logit = 0.4 - 1.2 * isolation_score + 0.2 * (income_level - 3.0)
            - if screening_status == "Jamais" { 1.0 } else { 0.0 };
        let prior_participation = rng.gen_bool(logistic(prior_logit));

        let outcome_logit = -0.3 + 1.4 * f64::from(u8::from(prior_participation))
            - 2.0 * isolation_score
            + 0.25 * (income_level - 3.0)
            - 0.5 * f64::from(u8::from(priority_zone))
            - 0.35 * f64::from(u8::from(rural_zone))
            + 0.6 * f64::from(u8::from(contacted))
            + 0.01 * (f64::from(age) - 50.0);
        let participated = rng.gen_bool(logistic(outcome_logit));

        Record {
            id: format!("A{:06}", index + 1),
            age,
            sex: sex.to_string(),
            priority_zone,
            rural_zone,
            income_level,
            isolation_score,
            screening_status: screening_status.to_string(),
            contacted,
            prior_participation,
            participated,
        }
    }
}
