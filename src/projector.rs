use std::collections::HashMap;

use crate::consensus::ConsensusList;
use crate::record::{PlayerSeasonRecord, col, round_dp};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("consensus player {0} has no stats row")]
    UnknownPlayer(String),
    #[error("consensus player {0} matches more than one stats row")]
    AmbiguousPlayer(String),
}

pub const FINAL_RANK_HEADERS: [&str; 21] = [
    "Predicted MVP Rank",
    "Player",
    "Position",
    "Team",
    "Age",
    "Height (cm)",
    "Games",
    "Minutes",
    "PTS",
    "REB",
    "AST",
    "STL",
    "BLK",
    "FG%",
    "3P%",
    "FT%",
    "PER",
    "WS/48",
    "VORP (Projected)",
    "PCT Team",
    "Seed",
];

/// Display row for one consensus slot. Shooting percentages are scaled to
/// 0-100.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalRankRow {
    pub rank: usize,
    pub player: String,
    pub position: String,
    pub team: String,
    pub age: Option<u32>,
    pub height_cm: Option<f64>,
    pub games: Option<f64>,
    pub minutes: Option<f64>,
    pub points: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    pub fg_pct: Option<f64>,
    pub fg3_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub per: Option<f64>,
    pub ws_per_48: Option<f64>,
    pub vorp: Option<f64>,
    pub team_pct: Option<f64>,
    pub seed: i32,
}

impl FinalRankRow {
    fn from_record(rank: usize, rec: &PlayerSeasonRecord) -> Self {
        let pct100 = |c: &str| rec.stat(c).map(|v| round_dp(v * 100.0, 2));
        Self {
            rank,
            player: rec.player.clone(),
            position: rec.position.clone(),
            team: rec.team.clone(),
            age: rec.age,
            height_cm: rec.height_cm.map(|h| round_dp(h, 1)),
            games: rec.stat(col::GAMES),
            minutes: rec.stat(col::MP_PERGAME),
            points: rec.stat(col::PTS_PERGAME),
            rebounds: rec.stat(col::TRB_PERGAME),
            assists: rec.stat(col::AST_PERGAME),
            steals: rec.stat(col::STL_PERGAME),
            blocks: rec.stat(col::BLK_PERGAME),
            fg_pct: pct100(col::FG_PCT),
            fg3_pct: pct100(col::FG3_PCT),
            ft_pct: pct100(col::FT_PCT),
            per: rec.stat(col::PER_ADVANCED),
            ws_per_48: rec.stat(col::WS48_ADVANCED).map(|v| round_dp(v, 3)),
            vorp: rec.stat(col::VORP_ADVANCED),
            team_pct: rec.pct.map(|v| round_dp(v, 3)),
            seed: rec.seed,
        }
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.player.clone(),
            self.position.clone(),
            self.team.clone(),
            opt_to_string(self.age),
            opt_to_string(self.height_cm),
            opt_to_string(self.games),
            opt_to_string(self.minutes),
            opt_to_string(self.points),
            opt_to_string(self.rebounds),
            opt_to_string(self.assists),
            opt_to_string(self.steals),
            opt_to_string(self.blocks),
            opt_to_string(self.fg_pct),
            opt_to_string(self.fg3_pct),
            opt_to_string(self.ft_pct),
            opt_to_string(self.per),
            opt_to_string(self.ws_per_48),
            opt_to_string(self.vorp),
            opt_to_string(self.team_pct),
            self.seed.to_string(),
        ]
    }
}

/// Join the consensus back onto the candidate table, one row per slot.
pub fn project(
    consensus: &ConsensusList,
    records: &[PlayerSeasonRecord],
) -> Result<Vec<FinalRankRow>, ProjectionError> {
    let mut by_player: HashMap<&str, Vec<&PlayerSeasonRecord>> = HashMap::new();
    for rec in records {
        by_player.entry(rec.player.as_str()).or_default().push(rec);
    }

    consensus
        .slots
        .iter()
        .map(|slot| match by_player.get(slot.player.as_str()).map(Vec::as_slice) {
            Some([rec]) => Ok(FinalRankRow::from_record(slot.slot, rec)),
            Some([]) | None => Err(ProjectionError::UnknownPlayer(slot.player.clone())),
            Some(_) => Err(ProjectionError::AmbiguousPlayer(slot.player.clone())),
        })
        .collect()
}

/// Header row followed by one row per projected player.
pub fn to_table(rows: &[FinalRankRow]) -> Vec<Vec<String>> {
    let mut out = vec![FINAL_RANK_HEADERS.iter().map(|h| h.to_string()).collect()];
    out.extend(rows.iter().map(FinalRankRow::to_cells));
    out
}

fn opt_to_string<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
