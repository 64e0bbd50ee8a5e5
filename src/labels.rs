use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::record::PlayerSeasonRecord;

/// Stats column holding the historical award share, the regression target.
pub const SHARE_COLUMN: &str = "SHARE";

/// One row of the historical award voting table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardShare {
    pub player: String,
    pub season: String,
    pub share: f64,
}

/// Historical voting results as a JSON array of `{player, season, share}`.
pub fn load_award_shares(path: &Path) -> Result<Vec<AwardShare>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read award shares {}", path.display()))?;
    serde_json::from_str::<Vec<AwardShare>>(&raw).with_context(|| format!("parse award shares {}", path.display()))
}

/// Left-join award shares onto the records; players without votes get 0.
pub fn attach_award_shares(records: &mut [PlayerSeasonRecord], shares: &[AwardShare]) {
    let by_key: HashMap<(&str, &str), f64> = shares
        .iter()
        .map(|s| ((s.player.as_str(), s.season.as_str()), s.share))
        .collect();
    for rec in records.iter_mut() {
        let share = by_key
            .get(&(rec.player.as_str(), rec.season.as_str()))
            .copied()
            .unwrap_or(0.0);
        rec.set_stat(SHARE_COLUMN, share);
    }
}

/// Award rows with no matching stats row, in award-table order.
pub fn missing_award_players<'a>(
    records: &[PlayerSeasonRecord],
    shares: &'a [AwardShare],
) -> Vec<&'a AwardShare> {
    let known: HashSet<(&str, &str)> = records.iter().map(|r| r.key()).collect();
    shares
        .iter()
        .filter(|s| !known.contains(&(s.player.as_str(), s.season.as_str())))
        .collect()
}

/// Every award-receiving player must have a stats row before labels can be
/// trusted.
pub fn check_award_coverage(records: &[PlayerSeasonRecord], shares: &[AwardShare]) -> Result<()> {
    let missing = missing_award_players(records, shares);
    if missing.is_empty() {
        return Ok(());
    }
    let names = missing
        .iter()
        .take(6)
        .map(|s| format!("{} ({})", s.player, s.season))
        .collect::<Vec<_>>()
        .join(", ");
    Err(anyhow!(
        "{} award rows have no stats row: {names}",
        missing.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(player: &str, season: &str, share: f64) -> AwardShare {
        AwardShare {
            player: player.to_string(),
            season: season.to_string(),
            share,
        }
    }

    #[test]
    fn shares_join_on_player_and_season() {
        let mut records = vec![
            PlayerSeasonRecord::new("Nikola Jokic", "2021-22"),
            PlayerSeasonRecord::new("Nikola Jokic", "2022-23"),
            PlayerSeasonRecord::new("Bench Guy", "2022-23"),
        ];
        let shares = vec![share("Nikola Jokic", "2021-22", 0.875), share("Nikola Jokic", "2022-23", 0.674)];
        attach_award_shares(&mut records, &shares);
        assert_eq!(records[0].stat(SHARE_COLUMN), Some(0.875));
        assert_eq!(records[1].stat(SHARE_COLUMN), Some(0.674));
        assert_eq!(records[2].stat(SHARE_COLUMN), Some(0.0));
        assert!(check_award_coverage(&records, &shares).is_ok());
    }

    #[test]
    fn unmatched_award_rows_are_reported() {
        let records = vec![PlayerSeasonRecord::new("Giannis Antetokounmpo", "2022-23")];
        let shares = vec![
            share("Giannis Antetokounmpo", "2022-23", 0.606),
            share("Giannis Antetokounmpo", "2021-22", 0.595),
        ];
        let missing = missing_award_players(&records, &shares);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].season, "2021-22");
        assert!(check_award_coverage(&records, &shares).is_err());
    }
}
