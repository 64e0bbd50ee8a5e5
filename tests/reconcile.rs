use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};

use mvp_consensus::labels::SHARE_COLUMN;
use mvp_consensus::reconcile::{TradePolicy, build_snapshot};
use mvp_consensus::snapshot::{load_snapshot, save_json_snapshot};

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn season_tables(season: &str, players: &[(&str, &str, f64)]) -> Value {
    let per_game: Vec<Value> = players
        .iter()
        .map(|(player, team, pts)| {
            json!({
                "player": player,
                "team": team,
                "position": "C",
                "age": 28,
                "stats": { "G": 70.0, "PTS": pts }
            })
        })
        .collect();
    json!({
        "season": season,
        "per_game": per_game,
        "teams": [
            { "team": "DEN", "wins": 57, "losses": 25 },
            { "team": "MIL", "wins": 49, "losses": 33 }
        ]
    })
}

#[test]
fn award_shares_become_the_label_column() {
    let dir = tempfile::tempdir().unwrap();
    let seasons = vec![
        write_json(
            dir.path(),
            "2022_23.json",
            &season_tables("2022-23", &[("Nikola Jokic", "DEN", 24.5), ("Bench Guard", "MIL", 6.0)]),
        ),
        write_json(
            dir.path(),
            "2023_24.json",
            &season_tables(
                "2023-24",
                &[("Nikola Jokic", "DEN", 26.4), ("Giannis Antetokounmpo", "MIL", 30.4)],
            ),
        ),
    ];
    let awards = write_json(
        dir.path(),
        "awards.json",
        &json!([
            { "player": "Nikola Jokic", "season": "2022-23", "share": 0.674 },
            { "player": "Nikola Jokic", "season": "2023-24", "share": 0.935 },
            { "player": "Giannis Antetokounmpo", "season": "2023-24", "share": 0.192 }
        ]),
    );

    let fold = build_snapshot(&seasons, TradePolicy::DropAll, Some(&awards)).expect("snapshot should build");
    assert_eq!(fold.seasons_succeeded, 2);
    assert_eq!(fold.records.len(), 4);

    let share_of = |player: &str, season: &str| {
        fold.records
            .iter()
            .find(|r| r.player == player && r.season == season)
            .and_then(|r| r.stat(SHARE_COLUMN))
    };
    assert_eq!(share_of("Nikola Jokic", "2022-23"), Some(0.674));
    assert_eq!(share_of("Nikola Jokic", "2023-24"), Some(0.935));
    assert_eq!(share_of("Giannis Antetokounmpo", "2023-24"), Some(0.192));
    assert_eq!(share_of("Bench Guard", "2022-23"), Some(0.0));

    let out = dir.path().join("snapshot.json");
    save_json_snapshot(&out, &fold.records).unwrap();
    let reloaded = load_snapshot(&out).unwrap();
    assert!(reloaded.iter().all(|r| r.stat(SHARE_COLUMN).is_some()));
}

#[test]
fn award_row_without_stats_row_fails_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let seasons = vec![write_json(
        dir.path(),
        "2023_24.json",
        &season_tables("2023-24", &[("Nikola Jokic", "DEN", 26.4)]),
    )];
    let awards = write_json(
        dir.path(),
        "awards.json",
        &json!([
            { "player": "Nikola Jokic", "season": "2023-24", "share": 0.935 },
            { "player": "Luka Doncic", "season": "2023-24", "share": 0.566 }
        ]),
    );

    let err = build_snapshot(&seasons, TradePolicy::DropAll, Some(&awards)).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("1 award rows have no stats row"));
    assert!(message.contains("Luka Doncic (2023-24)"));
}

#[test]
fn snapshot_without_awards_has_no_label() {
    let dir = tempfile::tempdir().unwrap();
    let seasons = vec![
        write_json(
            dir.path(),
            "2023_24.json",
            &season_tables("2023-24", &[("Nikola Jokic", "DEN", 26.4)]),
        ),
        dir.path().join("missing.json"),
    ];

    let fold = build_snapshot(&seasons, TradePolicy::DropAll, None).unwrap();
    assert_eq!(fold.seasons_total, 2);
    assert_eq!(fold.seasons_succeeded, 1);
    assert_eq!(fold.errors.len(), 1);
    assert_eq!(fold.records.len(), 1);
    assert_eq!(fold.records[0].stat(SHARE_COLUMN), None);
    assert_eq!(fold.records[0].seed, 1);
}
