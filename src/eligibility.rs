use crate::record::{PlayerSeasonRecord, col, round_dp};

/// Regular-season length used to scale mid-season totals up to a full season.
pub const SEASON_GAMES: u32 = 82;

/// Advanced counting stats that are projected alongside the `_TOTAL` columns.
pub const PROJECTED_ADVANCED: [&str; 4] = [
    col::OWS_ADVANCED,
    col::DWS_ADVANCED,
    col::WS_ADVANCED,
    col::VORP_ADVANCED,
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EligibilityError {
    #[error("{player} ({season}) is missing required column {column}")]
    MissingColumn {
        player: String,
        season: String,
        column: String,
    },
    #[error("{player} ({season}) has no games played; cannot project totals")]
    NoGamesPlayed { player: String, season: String },
    #[error("no players passed the eligibility thresholds")]
    NoEligiblePlayers,
}

/// Every bound is strict except the seed, which is inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityThresholds {
    pub min_points: f64,
    pub min_minutes: f64,
    pub max_seed: i32,
    pub min_assists: f64,
    pub min_rebounds: f64,
    pub min_fg_pct: f64,
    pub min_fga: f64,
    pub min_per: f64,
}

impl Default for EligibilityThresholds {
    fn default() -> Self {
        Self {
            min_points: 13.5,
            min_minutes: 30.0,
            max_seed: 16,
            min_assists: 1.0,
            min_rebounds: 3.0,
            min_fg_pct: 0.37,
            min_fga: 10.0,
            min_per: 18.0,
        }
    }
}

const THRESHOLD_COLUMNS: [&str; 7] = [
    col::PTS_PERGAME,
    col::MP_PERGAME,
    col::AST_PERGAME,
    col::TRB_PERGAME,
    col::FG_PCT,
    col::FGA_PERGAME,
    col::PER_ADVANCED,
];

impl EligibilityThresholds {
    pub fn admits(&self, rec: &PlayerSeasonRecord) -> Result<bool, EligibilityError> {
        let pts = require(rec, col::PTS_PERGAME)?;
        let mp = require(rec, col::MP_PERGAME)?;
        let ast = require(rec, col::AST_PERGAME)?;
        let trb = require(rec, col::TRB_PERGAME)?;
        let fg_pct = require(rec, col::FG_PCT)?;
        let fga = require(rec, col::FGA_PERGAME)?;
        let per = require(rec, col::PER_ADVANCED)?;
        Ok(pts > self.min_points
            && mp > self.min_minutes
            && rec.seed <= self.max_seed
            && rec.seed > 0
            && ast > self.min_assists
            && trb > self.min_rebounds
            && fg_pct > self.min_fg_pct
            && fga > self.min_fga
            && per > self.min_per)
    }
}

/// Drop every record that fails a threshold. Column presence is checked for
/// the whole table before any row is judged so a malformed snapshot never
/// yields a partial candidate set.
pub fn filter_eligible(
    records: &[PlayerSeasonRecord],
    thresholds: &EligibilityThresholds,
) -> Result<Vec<PlayerSeasonRecord>, EligibilityError> {
    for rec in records {
        for column in THRESHOLD_COLUMNS {
            require(rec, column)?;
        }
    }

    let mut out = Vec::new();
    for rec in records {
        if thresholds.admits(rec)? {
            out.push(rec.clone());
        }
    }
    if out.is_empty() {
        return Err(EligibilityError::NoEligiblePlayers);
    }
    Ok(out)
}

/// Scale cumulative stats to a full-season equivalent.
///
/// `G_LEFT = 82 - G_TEAM` and `MULT_G = G_LEFT / G + 1`; `_TOTAL` columns are
/// rounded to whole numbers, the projected advanced stats to one decimal.
pub fn project_rest_of_season(
    mut records: Vec<PlayerSeasonRecord>,
) -> Result<Vec<PlayerSeasonRecord>, EligibilityError> {
    for rec in &mut records {
        let games = require(rec, col::GAMES)?;
        let games_team = rec
            .games_team
            .ok_or_else(|| missing(rec, col::GAMES_TEAM))?;
        if games <= 0.0 {
            return Err(EligibilityError::NoGamesPlayed {
                player: rec.player.clone(),
                season: rec.season.clone(),
            });
        }
        for column in PROJECTED_ADVANCED {
            require(rec, column)?;
        }

        let games_left = SEASON_GAMES as f64 - games_team as f64;
        let multiplier = games_left / games + 1.0;

        for (name, value) in rec.stats.iter_mut() {
            if name.ends_with(col::TOTAL_SUFFIX) {
                *value = round_dp(*value * multiplier, 0);
            }
        }
        for column in PROJECTED_ADVANCED {
            if let Some(value) = rec.stats.get_mut(column) {
                *value = round_dp(*value * multiplier, 1);
            }
        }
        rec.set_stat(col::GAMES_LEFT, games_left);
        rec.set_stat(col::GAMES_MULTIPLIER, multiplier);
    }
    Ok(records)
}

/// Filter then project; the candidate set handed to the models.
pub fn prepare_candidates(
    records: &[PlayerSeasonRecord],
    thresholds: &EligibilityThresholds,
) -> Result<Vec<PlayerSeasonRecord>, EligibilityError> {
    let eligible = filter_eligible(records, thresholds)?;
    project_rest_of_season(eligible)
}

fn require(rec: &PlayerSeasonRecord, column: &str) -> Result<f64, EligibilityError> {
    rec.stat(column).ok_or_else(|| missing(rec, column))
}

fn missing(rec: &PlayerSeasonRecord, column: &str) -> EligibilityError {
    EligibilityError::MissingColumn {
        player: rec.player.clone(),
        season: rec.season.clone(),
        column: column.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str) -> PlayerSeasonRecord {
        let mut rec = PlayerSeasonRecord::new(name, "2022-23");
        rec.seed = 3;
        rec.games_team = Some(41);
        rec.set_stat(col::PTS_PERGAME, 28.0);
        rec.set_stat(col::MP_PERGAME, 35.0);
        rec.set_stat(col::AST_PERGAME, 6.0);
        rec.set_stat(col::TRB_PERGAME, 8.0);
        rec.set_stat(col::FG_PCT, 0.52);
        rec.set_stat(col::FGA_PERGAME, 20.0);
        rec.set_stat(col::PER_ADVANCED, 27.0);
        rec.set_stat(col::GAMES, 41.0);
        rec.set_stat("PTS_TOTAL", 500.0);
        rec.set_stat(col::OWS_ADVANCED, 4.25);
        rec.set_stat(col::DWS_ADVANCED, 2.0);
        rec.set_stat(col::WS_ADVANCED, 6.25);
        rec.set_stat(col::VORP_ADVANCED, 3.0);
        rec
    }

    #[test]
    fn thresholds_are_strict() {
        let th = EligibilityThresholds::default();
        let mut rec = candidate("Edge");
        assert!(th.admits(&rec).unwrap());

        rec.set_stat(col::PTS_PERGAME, 13.5);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::PTS_PERGAME, 13.6);

        rec.set_stat(col::MP_PERGAME, 30.0);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::MP_PERGAME, 30.1);

        rec.set_stat(col::FG_PCT, 0.37);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::FG_PCT, 0.371);

        rec.set_stat(col::PER_ADVANCED, 18.0);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::PER_ADVANCED, 18.1);

        rec.set_stat(col::AST_PERGAME, 1.0);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::AST_PERGAME, 1.1);

        rec.set_stat(col::TRB_PERGAME, 3.0);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::TRB_PERGAME, 3.1);

        rec.set_stat(col::FGA_PERGAME, 10.0);
        assert!(!th.admits(&rec).unwrap());
        rec.set_stat(col::FGA_PERGAME, 10.1);

        assert!(th.admits(&rec).unwrap());
    }

    #[test]
    fn seed_bound_is_inclusive() {
        let th = EligibilityThresholds::default();
        let mut rec = candidate("Seed");
        rec.seed = 16;
        assert!(th.admits(&rec).unwrap());
        rec.seed = 17;
        assert!(!th.admits(&rec).unwrap());
        rec.seed = -1;
        assert!(!th.admits(&rec).unwrap());
    }

    #[test]
    fn missing_column_fails_fast_even_for_rejected_rows() {
        let good = candidate("Good");
        let mut broken = candidate("Broken");
        broken.set_stat(col::PTS_PERGAME, 2.0);
        broken.stats.remove(col::PER_ADVANCED);
        let err = filter_eligible(&[good, broken], &EligibilityThresholds::default()).unwrap_err();
        assert_eq!(
            err,
            EligibilityError::MissingColumn {
                player: "Broken".to_string(),
                season: "2022-23".to_string(),
                column: col::PER_ADVANCED.to_string(),
            }
        );
    }

    #[test]
    fn empty_candidate_set_is_fatal() {
        let mut rec = candidate("Bench");
        rec.set_stat(col::MP_PERGAME, 12.0);
        let err = filter_eligible(&[rec], &EligibilityThresholds::default()).unwrap_err();
        assert_eq!(err, EligibilityError::NoEligiblePlayers);
    }

    #[test]
    fn half_season_doubles_totals() {
        let projected = project_rest_of_season(vec![candidate("Half")]).unwrap();
        let rec = &projected[0];
        assert_eq!(rec.stat(col::GAMES_LEFT), Some(41.0));
        assert_eq!(rec.stat(col::GAMES_MULTIPLIER), Some(2.0));
        assert_eq!(rec.stat("PTS_TOTAL"), Some(1000.0));
        assert_eq!(rec.stat(col::OWS_ADVANCED), Some(8.5));
        assert_eq!(rec.stat(col::WS_ADVANCED), Some(12.5));
        // Per-game values are untouched.
        assert_eq!(rec.stat(col::PTS_PERGAME), Some(28.0));
    }

    #[test]
    fn projection_requires_team_games() {
        let mut rec = candidate("NoTeam");
        rec.games_team = None;
        let err = project_rest_of_season(vec![rec]).unwrap_err();
        assert!(matches!(err, EligibilityError::MissingColumn { column, .. } if column == col::GAMES_TEAM));
    }

    #[test]
    fn projection_rejects_zero_games() {
        let mut rec = candidate("Ghost");
        rec.set_stat(col::GAMES, 0.0);
        let err = project_rest_of_season(vec![rec]).unwrap_err();
        assert!(matches!(err, EligibilityError::NoGamesPlayed { .. }));
    }
}
