use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column names shared by the snapshot loader, the eligibility filter and the
/// presentation projector.
pub mod col {
    pub const PTS_PERGAME: &str = "PTS_PERGAME";
    pub const MP_PERGAME: &str = "MP_PERGAME";
    pub const AST_PERGAME: &str = "AST_PERGAME";
    pub const TRB_PERGAME: &str = "TRB_PERGAME";
    pub const STL_PERGAME: &str = "STL_PERGAME";
    pub const BLK_PERGAME: &str = "BLK_PERGAME";
    pub const FGA_PERGAME: &str = "FGA_PERGAME";
    pub const FG_PCT: &str = "FG%";
    pub const FG3_PCT: &str = "3P%";
    pub const FT_PCT: &str = "FT%";
    pub const PER_ADVANCED: &str = "PER_ADVANCED";
    pub const OWS_ADVANCED: &str = "OWS_ADVANCED";
    pub const DWS_ADVANCED: &str = "DWS_ADVANCED";
    pub const WS_ADVANCED: &str = "WS_ADVANCED";
    pub const WS48_ADVANCED: &str = "WS/48_ADVANCED";
    pub const VORP_ADVANCED: &str = "VORP_ADVANCED";
    pub const GAMES: &str = "G";
    pub const GAMES_STARTED: &str = "GS";
    pub const GAMES_TEAM: &str = "G_TEAM";
    pub const SEED: &str = "SEED";
    pub const GAMES_LEFT: &str = "G_LEFT";
    pub const GAMES_MULTIPLIER: &str = "MULT_G";

    pub const TOTAL_SUFFIX: &str = "_TOTAL";
    pub const PERGAME_SUFFIX: &str = "_PERGAME";
    pub const ADVANCED_SUFFIX: &str = "_ADVANCED";
}

pub const UNKNOWN_SEED: i32 = -1;

/// One row per (player, season) after reconciliation.
///
/// Identity and bio fields are typed; every statistical column (per-game,
/// totals, shooting percentages, advanced metrics, `G`, `GS`) lives in `stats`
/// under its upstream column name so that whole column families can be
/// addressed by suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSeasonRecord {
    pub player: String,
    #[serde(default)]
    pub team: String,
    pub season: String,
    #[serde(default = "unknown_seed")]
    pub seed: i32,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub experience: Option<u32>,
    #[serde(default)]
    pub college: bool,
    #[serde(default)]
    pub nationality_us: bool,
    #[serde(default)]
    pub games_team: Option<u32>,
    #[serde(default)]
    pub wins: Option<u32>,
    #[serde(default)]
    pub pct: Option<f64>,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

fn unknown_seed() -> i32 {
    UNKNOWN_SEED
}

impl PlayerSeasonRecord {
    pub fn new(player: impl Into<String>, season: impl Into<String>) -> Self {
        Self {
            player: player.into(),
            team: String::new(),
            season: season.into(),
            seed: UNKNOWN_SEED,
            position: String::new(),
            age: None,
            height_cm: None,
            weight_kg: None,
            bmi: None,
            experience: None,
            college: false,
            nationality_us: false,
            games_team: None,
            wins: None,
            pct: None,
            stats: BTreeMap::new(),
        }
    }

    pub fn stat(&self, column: &str) -> Option<f64> {
        self.stats.get(column).copied()
    }

    pub fn set_stat(&mut self, column: impl Into<String>, value: f64) {
        self.stats.insert(column.into(), value);
    }

    pub fn key(&self) -> (&str, &str) {
        (self.player.as_str(), self.season.as_str())
    }

    /// Resolve a column by name, including the typed identity columns that the
    /// model feature lists may reference.
    pub fn column(&self, column: &str) -> Option<f64> {
        match column {
            col::SEED => (self.seed != UNKNOWN_SEED).then_some(self.seed as f64),
            col::GAMES_TEAM => self.games_team.map(f64::from),
            "AGE" => self.age.map(f64::from),
            "HEIGHT" => self.height_cm,
            "WEIGHT" => self.weight_kg,
            "IMC" | "BMI" => self.bmi,
            "EXPERIENCE" => self.experience.map(f64::from),
            "COLLEGE" => Some(if self.college { 1.0 } else { 0.0 }),
            "NATIONALITY_US" => Some(if self.nationality_us { 1.0 } else { 0.0 }),
            "W" => self.wins.map(f64::from),
            "PCT" => self.pct,
            _ => self.stat(column),
        }
    }
}

/// Round to `decimals` places with ties going to the even neighbour, matching
/// the upstream dataframe rounding the models were trained against.
pub fn round_dp(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
