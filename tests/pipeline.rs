use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use chrono::NaiveDate;

use mvp_consensus::artifacts::load_bundle;
use mvp_consensus::consensus::{ConsensusConfig, Tier};
use mvp_consensus::eligibility::EligibilityThresholds;
use mvp_consensus::export::read_csv;
use mvp_consensus::model::MODEL_ROSTER;
use mvp_consensus::pipeline::{RunSettings, latest_season, run, run_core};
use mvp_consensus::projector::FINAL_RANK_HEADERS;
use mvp_consensus::record::col;
use mvp_consensus::snapshot::load_snapshot;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

const EXPECTED_TOP: [&str; 10] = [
    "Nikola Jokic",
    "Shai Gilgeous-Alexander",
    "Luka Doncic",
    "Giannis Antetokounmpo",
    "Jalen Brunson",
    "Jayson Tatum",
    "Anthony Edwards",
    "Domantas Sabonis",
    "Kevin Durant",
    "Anthony Davis",
];

#[test]
fn core_run_skips_broken_model_and_agrees_on_order() {
    let records = load_snapshot(&fixture_path("snapshot_2023_24.json")).expect("fixture should load");
    assert_eq!(records.len(), 14);
    let bundle = load_bundle(&fixture_path("models"), &MODEL_ROSTER).expect("bundle should load");
    assert_eq!(bundle.roster.available_count(), 5);

    let outcome = run_core(
        &records,
        &bundle,
        &EligibilityThresholds::default(),
        &ConsensusConfig::default(),
    )
    .expect("pipeline should run");

    assert_eq!(outcome.candidates.len(), 12);
    assert!(outcome.candidates.iter().all(|r| r.player != "Bench Scorer" && r.player != "Lottery Star"));

    // The AdaBoost artifact has no trees and fails at prediction time.
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].0, "AdaBoost");
    let models: Vec<&str> = outcome.top_lists.iter().map(|l| l.model.as_str()).collect();
    assert_eq!(models, vec!["SVM", "Random Forest", "Gradient Boosting", "LGBM"]);

    assert_eq!(outcome.consensus.players(), EXPECTED_TOP.map(str::to_string).to_vec());
    for slot in &outcome.consensus.slots {
        assert_eq!(slot.tier, Tier::Plurality);
        assert_eq!(slot.votes, 4);
    }

    let top = &outcome.final_rows[0];
    assert_eq!(top.rank, 1);
    assert_eq!(top.player, "Nikola Jokic");
    assert_eq!(top.fg_pct, Some(51.2));
    // 60 of 62 team games played: 20 left, multiplier 4/3.
    assert_relative_eq!(top.vorp.unwrap(), 8.0, epsilon = 1e-9);
    let jokic = &outcome.candidates[0];
    assert_eq!(jokic.stat(col::GAMES_LEFT), Some(20.0));
    assert_eq!(jokic.stat("PTS_TOTAL"), Some(2800.0));
}

#[test]
fn full_run_writes_dated_rank_table_and_display_tables() {
    let out = tempfile::tempdir().unwrap();
    let snapshot = fixture_path("snapshot_2023_24.json");
    let models = fixture_path("models");
    let settings = RunSettings {
        snapshot: &snapshot,
        models_dir: &models,
        output_dir: out.path(),
        consensus: ConsensusConfig::default(),
        thresholds: EligibilityThresholds::default(),
    };
    let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    let report = run(&settings, date).expect("pipeline should run");

    assert_eq!(report.snapshot_rows, 14);
    assert_eq!(report.candidates, 12);
    assert_eq!(report.models_used.len(), 4);
    assert_eq!(report.consensus.len(), 10);
    assert_eq!(report.files.len(), 3);

    let wide = read_csv(&out.path().join("rank_07_03_24.csv")).unwrap();
    assert_eq!(wide.len(), 11);
    assert_eq!(wide[0].first().map(String::as_str), Some("RANK SVM"));
    assert_eq!(wide[0].last().map(String::as_str), Some("RANK FINAL"));
    assert_eq!(wide[0].len(), 9);
    assert_eq!(wide[1][8], "Nikola Jokic");

    let display = read_csv(&out.path().join("MVP_Rank_Stats.csv")).unwrap();
    assert_eq!(display.len(), 11);
    assert_eq!(display[0], FINAL_RANK_HEADERS.map(str::to_string).to_vec());
    assert_eq!(display[10][1], "Anthony Davis");
    assert!(out.path().join("MVP_Rank_Stats.xlsx").exists());
}

#[test]
fn multi_season_snapshot_ranks_only_the_latest_season() {
    let mut records = load_snapshot(&fixture_path("snapshot_2023_24.json")).unwrap();
    let previous: Vec<_> = records
        .iter()
        .take(3)
        .cloned()
        .map(|mut rec| {
            rec.season = "2022-23".to_string();
            rec
        })
        .collect();
    records.extend(previous);
    assert_eq!(latest_season(&records), Some("2023-24"));

    let bundle = load_bundle(&fixture_path("models"), &MODEL_ROSTER).unwrap();
    let outcome = run_core(
        &records,
        &bundle,
        &EligibilityThresholds::default(),
        &ConsensusConfig::default(),
    )
    .expect("older seasons should be ignored");
    assert_eq!(outcome.candidates.len(), 12);
    assert!(outcome.candidates.iter().all(|r| r.season == "2023-24"));
    assert_eq!(outcome.consensus.players(), EXPECTED_TOP.map(str::to_string).to_vec());
}

#[test]
fn run_fails_when_no_model_is_usable() {
    let dir = tempfile::tempdir().unwrap();
    fs::copy(
        fixture_path("models/features.json"),
        dir.path().join("features.json"),
    )
    .unwrap();
    let records = load_snapshot(&fixture_path("snapshot_2023_24.json")).unwrap();
    let bundle = load_bundle(dir.path(), &MODEL_ROSTER).unwrap();
    assert_eq!(bundle.roster.available_count(), 0);

    let err = run_core(
        &records,
        &bundle,
        &EligibilityThresholds::default(),
        &ConsensusConfig::default(),
    )
    .unwrap_err();
    assert!(format!("{err:#}").contains("no model produced a ranking"));
}
