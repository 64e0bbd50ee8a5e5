use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::labels::{attach_award_shares, check_award_coverage, load_award_shares};
use crate::record::{PlayerSeasonRecord, col, round_dp};
use crate::snapshot::ensure_unique;

/// Team label the stats sources use for a traded player's combined line.
pub const COMBINED_TEAM: &str = "TOT";

const CM_PER_FOOT: f64 = 30.48;
const CM_PER_INCH: f64 = 2.54;
const KG_PER_LB: f64 = 0.453592;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStatRow {
    pub player: String,
    pub team: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    pub player: String,
    /// Feet-inches, e.g. `"6-11"`.
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub weight_lb: Option<f64>,
    #[serde(default)]
    pub nationality: Option<String>,
    /// Seasons of experience; `"R"` for rookies.
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub college: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRow {
    pub team: String,
    pub wins: u32,
    pub losses: u32,
}

/// Raw exports for one season, as produced by the upstream scrapers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonTables {
    pub season: String,
    #[serde(default)]
    pub per_game: Vec<RawStatRow>,
    #[serde(default)]
    pub advanced: Vec<RawStatRow>,
    #[serde(default)]
    pub roster: Vec<RosterRow>,
    #[serde(default)]
    pub teams: Vec<TeamRow>,
}

/// How to treat players listed more than once in a season's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradePolicy {
    /// Drop every row of the player.
    #[default]
    DropAll,
    /// Keep the combined `TOT` line when present, otherwise drop.
    KeepCombined,
}

pub fn load_season_tables(path: &Path) -> Result<SeasonTables> {
    let raw = fs::read_to_string(path).with_context(|| format!("read season tables {}", path.display()))?;
    serde_json::from_str::<SeasonTables>(&raw).with_context(|| format!("parse season tables {}", path.display()))
}

/// Keep only players listed exactly once (or their combined line, per policy).
pub fn dedup_players<T, F>(rows: Vec<T>, policy: TradePolicy, key: F) -> Vec<T>
where
    F: Fn(&T) -> (&str, Option<&str>),
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in &rows {
        *counts.entry(key(row).0.to_string()).or_insert(0) += 1;
    }
    rows.into_iter()
        .filter(|row| {
            let (player, team) = key(row);
            match counts.get(player).copied().unwrap_or(0) {
                1 => true,
                _ => policy == TradePolicy::KeepCombined && team == Some(COMBINED_TEAM),
            }
        })
        .collect()
}

fn is_shooting_pct(column: &str) -> bool {
    column.ends_with('%')
}

/// Build one season's records from its raw tables.
pub fn reconcile_season(tables: SeasonTables, policy: TradePolicy) -> Result<Vec<PlayerSeasonRecord>> {
    let season = tables.season.clone();
    // A kept combined line takes its standings from the player's latest team.
    let last_team: HashMap<String, String> = tables
        .per_game
        .iter()
        .filter(|r| r.team != COMBINED_TEAM)
        .map(|r| (r.player.clone(), r.team.clone()))
        .collect();
    let per_game = dedup_players(tables.per_game, policy, |r| (r.player.as_str(), Some(r.team.as_str())));
    let advanced = dedup_players(tables.advanced, policy, |r| (r.player.as_str(), Some(r.team.as_str())));
    // Roster rows carry no team label, so a repeated player is always dropped.
    let roster = dedup_players(tables.roster, TradePolicy::DropAll, |r| (r.player.as_str(), None));

    let advanced_by_player: HashMap<&str, &RawStatRow> =
        advanced.iter().map(|r| (r.player.as_str(), r)).collect();
    let roster_by_player: HashMap<&str, &RosterRow> = roster.iter().map(|r| (r.player.as_str(), r)).collect();
    let standings = team_standings(&tables.teams);

    let mut out = Vec::with_capacity(per_game.len());
    for row in &per_game {
        let mut rec = PlayerSeasonRecord::new(row.player.clone(), season.clone());
        rec.team = match last_team.get(&row.player) {
            Some(team) if row.team == COMBINED_TEAM => team.clone(),
            _ => row.team.clone(),
        };
        rec.position = row.position.clone();
        rec.age = row.age;

        let games = row
            .stats
            .get(col::GAMES)
            .copied()
            .ok_or_else(|| anyhow!("{} ({season}) per-game row has no {} column", row.player, col::GAMES))?;
        for (name, value) in &row.stats {
            if name == col::GAMES || name == col::GAMES_STARTED || is_shooting_pct(name) {
                rec.set_stat(name.clone(), *value);
            } else {
                rec.set_stat(format!("{name}{}", col::PERGAME_SUFFIX), *value);
                rec.set_stat(format!("{name}{}", col::TOTAL_SUFFIX), round_dp(value * games, 0));
            }
        }

        if let Some(adv) = advanced_by_player.get(row.player.as_str()) {
            for (name, value) in &adv.stats {
                if name == col::GAMES || name == "MP" {
                    continue;
                }
                rec.set_stat(format!("{name}{}", col::ADVANCED_SUFFIX), *value);
            }
        }

        if let Some(info) = roster_by_player.get(row.player.as_str()) {
            apply_roster(&mut rec, info)?;
        }

        if let Some(standing) = standings.get(rec.team.as_str()) {
            rec.games_team = Some(standing.games);
            rec.wins = Some(standing.wins);
            rec.pct = Some(standing.pct);
            rec.seed = standing.seed;
        }
        out.push(rec);
    }
    info!("season {season}: reconciled {} players", out.len());
    Ok(out)
}

fn apply_roster(rec: &mut PlayerSeasonRecord, info: &RosterRow) -> Result<()> {
    rec.college = info.college.as_deref().is_some_and(|c| !c.trim().is_empty());
    rec.nationality_us = info
        .nationality
        .as_deref()
        .is_some_and(|n| n.trim().eq_ignore_ascii_case("US"));
    rec.experience = match info.experience.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) if raw.eq_ignore_ascii_case("R") => Some(0),
        Some(raw) => Some(
            raw.parse::<u32>()
                .with_context(|| format!("{} experience {raw:?}", rec.player))?,
        ),
    };
    rec.height_cm = info.height.as_deref().map(parse_height_cm).transpose()?;
    rec.weight_kg = info.weight_lb.map(|lb| lb * KG_PER_LB);
    rec.bmi = match (rec.weight_kg, rec.height_cm) {
        (Some(kg), Some(cm)) if cm > 0.0 => Some(kg / (cm / 100.0).powi(2)),
        _ => None,
    };
    Ok(())
}

/// `"6-11"` -> 210.82 cm.
pub fn parse_height_cm(raw: &str) -> Result<f64> {
    let (feet, inches) = raw
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("height {raw:?} is not feet-inches"))?;
    let feet: f64 = feet.trim().parse().with_context(|| format!("height feet {raw:?}"))?;
    let inches: f64 = inches.trim().parse().with_context(|| format!("height inches {raw:?}"))?;
    Ok(feet * CM_PER_FOOT + inches * CM_PER_INCH)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub games: u32,
    pub wins: u32,
    pub pct: f64,
    pub seed: i32,
}

/// Win percentage per team and league-wide seed by descending percentage;
/// equal percentages keep table order.
pub fn team_standings(teams: &[TeamRow]) -> HashMap<&str, Standing> {
    let mut rows: Vec<(&str, Standing)> = teams
        .iter()
        .filter_map(|t| {
            let games = t.wins + t.losses;
            if games == 0 {
                warn!("team {} has no games; left unseeded", t.team);
                return None;
            }
            Some((
                t.team.as_str(),
                Standing {
                    games,
                    wins: t.wins,
                    pct: t.wins as f64 / games as f64,
                    seed: 0,
                },
            ))
        })
        .collect();
    rows.sort_by(|a, b| b.1.pct.total_cmp(&a.1.pct));
    rows.into_iter()
        .enumerate()
        .map(|(idx, (team, mut standing))| {
            standing.seed = idx as i32 + 1;
            (team, standing)
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct SeasonFold {
    pub records: Vec<PlayerSeasonRecord>,
    pub seasons_total: usize,
    pub seasons_succeeded: usize,
    pub errors: Vec<String>,
}

/// Combine per-season results. A failed season is recorded and skipped.
pub fn fold_seasons<I>(results: I) -> SeasonFold
where
    I: IntoIterator<Item = (String, Result<Vec<PlayerSeasonRecord>>)>,
{
    results
        .into_iter()
        .fold(SeasonFold::default(), |mut acc, (season, result)| {
            acc.seasons_total += 1;
            match result {
                Ok(records) => {
                    acc.seasons_succeeded += 1;
                    acc.records.extend(records);
                }
                Err(err) => {
                    warn!("season {season} failed: {err:#}");
                    acc.errors.push(format!("{season}: {err:#}"));
                }
            }
            acc
        })
}

/// Reconcile every season file into one snapshot. When an award table is
/// given, every award row must match a stats row before the shares are
/// attached as the `SHARE` label.
pub fn build_snapshot(season_files: &[PathBuf], policy: TradePolicy, awards: Option<&Path>) -> Result<SeasonFold> {
    let mut fold = fold_seasons(season_files.iter().map(|path| {
        let result = load_season_tables(path).and_then(|tables| reconcile_season(tables, policy));
        (path.display().to_string(), result)
    }));
    ensure_unique(&fold.records)?;

    if let Some(path) = awards {
        let shares = load_award_shares(path)?;
        check_award_coverage(&fold.records, &shares)?;
        attach_award_shares(&mut fold.records, &shares);
        info!("attached {} award shares", shares.len());
    }
    Ok(fold)
}
