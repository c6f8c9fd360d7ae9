use polars::prelude::*;
use relance::config::RiskModelConfig;
use relance::data::{ID_COLUMN, OUTCOME_COLUMN, RISK_COLUMN, Record, extract_columns};
use relance::model::RiskModel;
use relance::synthetic::PopulationBuilder;
use relance::{ErrorKind, RiskError, records_to_frame, score, score_with_config, select, select_cohort};

fn quick_config() -> RiskModelConfig {
    RiskModelConfig {
        n_trees: 20,
        ..RiskModelConfig::default()
    }
}

fn population(n: usize, seed: u64) -> DataFrame {
    records_to_frame(&PopulationBuilder::new(n).seed(seed).build()).expect("synthetic frame")
}

fn risks(scored: &DataFrame) -> Vec<f64> {
    scored
        .column(RISK_COLUMN)
        .expect("risk column")
        .f64()
        .expect("risk is f64")
        .into_no_null_iter()
        .collect()
}

fn ids(frame: &DataFrame) -> Vec<String> {
    frame
        .column(ID_COLUMN)
        .expect("id column")
        .str()
        .expect("ids are strings")
        .into_no_null_iter()
        .map(str::to_string)
        .collect()
}

/// Ten records: ages 20, 25, ..., 65, alternating sex, alternating outcome starting at 1.
fn ten_records() -> Vec<Record> {
    (0..10)
        .map(|i| Record {
            id: format!("R{i:02}"),
            age: 20 + 5 * i as u32,
            sex: if i % 2 == 0 { "F" } else { "M" }.to_string(),
            priority_zone: i % 3 == 0,
            rural_zone: i % 4 == 0,
            income_level: 1.0 + (i % 3) as f64,
            isolation_score: i as f64 / 10.0,
            screening_status: if i < 5 { "À jour" } else { "En retard" }.to_string(),
            contacted: i % 2 == 1,
            prior_participation: i % 3 != 1,
            participated: i % 2 == 0,
        })
        .collect()
}

#[test]
fn identical_inputs_give_identical_scores() {
    let table = population(120, 5);
    let first = score_with_config(&table, &quick_config()).unwrap().frame;
    let second = score_with_config(&table, &quick_config()).unwrap().frame;
    assert_eq!(risks(&first), risks(&second));
}

#[test]
fn scores_are_probabilities_attached_to_every_record() {
    let table = population(150, 9);
    let scored = score_with_config(&table, &quick_config()).unwrap().frame;
    assert_eq!(scored.height(), table.height());
    assert_eq!(ids(&scored), ids(&table));
    assert!(risks(&scored).iter().all(|r| (0.0..=1.0).contains(r)));
}

#[test]
fn higher_thresholds_select_nested_subsets() {
    let scored = score_with_config(&population(150, 11), &quick_config())
        .unwrap()
        .frame;
    let mut previous: Option<Vec<String>> = None;
    for step in 0..=20 {
        let threshold = step as f64 / 20.0;
        let (cohort, count) = select(&scored, threshold).unwrap();
        let selected = ids(&cohort);
        assert_eq!(selected.len(), count);
        if let Some(wider) = &previous {
            assert!(selected.len() <= wider.len());
            assert!(selected.iter().all(|id| wider.contains(id)));
        }
        previous = Some(selected);
    }
}

#[test]
fn selection_is_inclusive_and_keeps_input_order() {
    let scored = score_with_config(&population(100, 3), &quick_config())
        .unwrap()
        .frame;
    let all_risks = risks(&scored);
    let all_ids = ids(&scored);
    let threshold = all_risks[0];

    let cohort = select_cohort(&scored, threshold).unwrap();
    let expected: Vec<String> = all_ids
        .iter()
        .zip(&all_risks)
        .filter(|&(_, &r)| r >= threshold)
        .map(|(id, _)| id.clone())
        .collect();

    assert_eq!(ids(cohort.records()), expected);
    assert_eq!(cohort.count(), expected.len());
    assert!(expected.contains(&all_ids[0]));
}

#[test]
fn missing_field_is_a_schema_error() {
    let table = population(40, 2).drop("Score_isolement").unwrap();
    let err = score(&table).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.to_string().contains("Score_isolement"));
}

#[test]
fn repeated_identifiers_are_a_schema_error() {
    let mut records = PopulationBuilder::new(40).seed(4).build();
    records[1].id = records[0].id.clone();
    let table = records_to_frame(&records).unwrap();
    let err = score_with_config(&table, &quick_config()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.to_string().contains(&records[0].id));
}

#[test]
fn single_class_outcome_is_a_degenerate_label_error() {
    let mut records = PopulationBuilder::new(40).seed(4).build();
    for record in &mut records {
        record.participated = true;
    }
    let table = records_to_frame(&records).unwrap();
    assert_eq!(
        score_with_config(&table, &quick_config()).unwrap_err().kind(),
        ErrorKind::DegenerateLabel
    );
}

#[test]
fn unseen_category_at_scoring_time_is_a_domain_error() {
    let training = extract_columns(&population(60, 6)).unwrap();
    let model = RiskModel::fit(&training, &quick_config()).unwrap();

    let mut records = PopulationBuilder::new(5).seed(6).build();
    records[2].sex = "X".to_string();
    let unseen = extract_columns(&records_to_frame(&records).unwrap()).unwrap();

    let err = RiskError::from(model.risk_probabilities(&unseen).unwrap_err());
    assert_eq!(err.kind(), ErrorKind::Domain);
}

#[test]
fn ten_record_campaign_end_to_end() {
    let table = records_to_frame(&ten_records()).unwrap();
    let scored = score(&table).unwrap();
    assert_eq!(scored.height(), 10);
    assert_eq!(
        scored.column(OUTCOME_COLUMN).unwrap().len(),
        scored.column(RISK_COLUMN).unwrap().len()
    );

    let (everyone, count) = select(&scored, 0.0).unwrap();
    assert_eq!(count, 10);
    assert_eq!(ids(&everyone), ids(&table));

    let err = RiskError::from(select(&scored, 1.01).unwrap_err());
    assert_eq!(err.kind(), ErrorKind::Parameter);

    let expected = risks(&scored).iter().filter(|&&r| r >= 0.5).count();
    let cohort = select_cohort(&scored, 0.5).unwrap();
    assert_eq!(cohort.count(), expected);
    assert!(cohort.members().unwrap().iter().all(|m| m.risk >= 0.5));
}
