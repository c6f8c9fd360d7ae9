use std::fs;
use std::process::Command;

use tempfile::tempdir;

const EXE: &str = env!("CARGO_BIN_EXE_relance");

#[test]
fn simulate_then_select_writes_the_prioritized_cohort() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("campagne.csv");

    let status = Command::new(EXE)
        .current_dir(tmp.path())
        .args([
            "simulate",
            "--rows",
            "200",
            "--seed",
            "7",
            "--output",
            data_path.to_str().expect("path str"),
        ])
        .status()
        .expect("run relance simulate");
    assert!(status.success(), "simulate exited with status {status:?}");

    let output = Command::new(EXE)
        .current_dir(tmp.path())
        .args([
            "select",
            data_path.to_str().expect("path str"),
            "--threshold",
            "0.5",
            "--trees",
            "20",
        ])
        .output()
        .expect("run relance select");
    assert!(
        output.status.success(),
        "select failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("high-risk records identified"));

    let exported = fs::read_to_string(tmp.path().join("prioritaires_score.csv"))
        .expect("cohort file written");
    let mut lines = exported.lines();
    assert_eq!(lines.next(), Some("ID_Assuré,Âge,Sexe,Score_risque"));
    for line in lines {
        let risk: f64 = line
            .rsplit(',')
            .next()
            .and_then(|v| v.parse().ok())
            .expect("numeric risk");
        assert!((0.5..=1.0).contains(&risk), "risk {risk} below threshold");
    }
}

#[test]
fn out_of_range_threshold_fails_without_writing() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("campagne.csv");
    let status = Command::new(EXE)
        .args(["simulate", "--rows", "50", "--output"])
        .arg(&data_path)
        .status()
        .expect("run relance simulate");
    assert!(status.success());

    let output = Command::new(EXE)
        .current_dir(tmp.path())
        .arg("select")
        .arg(&data_path)
        .args(["--threshold", "1.5"])
        .output()
        .expect("run relance select");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
    assert!(!tmp.path().join("prioritaires_score.csv").exists());
}

#[test]
fn missing_column_is_reported_by_name() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("incomplet.csv");
    fs::write(&data_path, "ID_Assuré,Âge,Sexe\nA1,40,F\nA2,52,M\n").expect("write data");

    let output = Command::new(EXE)
        .current_dir(tmp.path())
        .arg("score")
        .arg(&data_path)
        .output()
        .expect("run relance score");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("QPV"));
}

#[test]
fn sweep_reports_every_grid_threshold_with_shrinking_cohorts() {
    let tmp = tempdir().expect("temporary directory");
    let data_path = tmp.path().join("campagne.csv");
    let status = Command::new(EXE)
        .args(["simulate", "--rows", "120", "--seed", "3", "--output"])
        .arg(&data_path)
        .status()
        .expect("run relance simulate");
    assert!(status.success());

    let output = Command::new(EXE)
        .arg("sweep")
        .arg(&data_path)
        .args(["--trees", "15"])
        .output()
        .expect("run relance sweep");
    assert!(
        output.status.success(),
        "sweep failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<(String, usize)> = stdout
        .lines()
        .skip_while(|line| !line.starts_with("threshold\t"))
        .skip(1)
        .map(|line| {
            let (threshold, count) = line.split_once('\t').expect("tab-separated row");
            (threshold.to_string(), count.parse().expect("count"))
        })
        .collect();

    assert_eq!(rows.len(), 21);
    assert_eq!(rows[0], ("0.00".to_string(), 120));
    assert_eq!(rows[3].0, "0.15");
    assert_eq!(rows[20].0, "1.00");
    assert!(rows.windows(2).all(|pair| pair[0].1 >= pair[1].1));
}
