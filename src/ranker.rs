use anyhow::{Result, anyhow};
use log::{debug, warn};

use crate::artifacts::ModelRoster;
use crate::model::{FeatureScaler, ModelArtifact, Regressor, StandardScaler};
use crate::record::PlayerSeasonRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPlayer {
    pub rank: usize,
    pub player: String,
    pub score: f64,
}

/// One model's full ordering of the candidate set.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRanking {
    pub model: String,
    pub ranked: Vec<RankedPlayer>,
}

#[derive(Debug, Clone, Default)]
pub struct RankingOutcome {
    pub rankings: Vec<ModelRanking>,
    pub skipped: Vec<(String, String)>,
}

/// Build the feature matrix in `features` order. A missing column is fatal:
/// the matrix is shared by every model.
pub fn feature_matrix(records: &[PlayerSeasonRecord], features: &[String]) -> Result<Vec<Vec<f64>>> {
    records
        .iter()
        .map(|rec| {
            features
                .iter()
                .map(|name| {
                    rec.column(name).ok_or_else(|| {
                        anyhow!("{} ({}) is missing feature column {name}", rec.player, rec.season)
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect()
}

/// Order players by descending score; equal scores keep input order.
pub fn rank_by_score(players: &[String], scores: &[f64]) -> Vec<RankedPlayer> {
    let mut order: Vec<usize> = (0..players.len().min(scores.len())).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
    order
        .into_iter()
        .enumerate()
        .map(|(pos, idx)| RankedPlayer {
            rank: pos + 1,
            player: players[idx].clone(),
            score: scores[idx],
        })
        .collect()
}

/// Score the candidate set with every available model. A model that cannot
/// produce one finite score per player is skipped and reported.
pub fn rank_models(
    records: &[PlayerSeasonRecord],
    features: &[String],
    shared_scaler: Option<&StandardScaler>,
    roster: &ModelRoster,
) -> Result<RankingOutcome> {
    let raw = feature_matrix(records, features)?;
    let players: Vec<String> = records.iter().map(|r| r.player.clone()).collect();

    let mut outcome = RankingOutcome::default();
    for (name, reason) in roster.unavailable() {
        outcome.skipped.push((name.to_string(), reason.to_string()));
    }
    for (name, artifact) in roster.available() {
        match predict_one(artifact, shared_scaler, &raw) {
            Ok(scores) => {
                let ranked = rank_by_score(&players, &scores);
                if let Some(top) = ranked.first() {
                    debug!("{name}: top {} ({:.3})", top.player, top.score);
                }
                outcome.rankings.push(ModelRanking {
                    model: name.to_string(),
                    ranked,
                });
            }
            Err(err) => {
                warn!("model {name} skipped: {err:#}");
                outcome.skipped.push((name.to_string(), format!("{err:#}")));
            }
        }
    }
    Ok(outcome)
}

fn predict_one(
    artifact: &ModelArtifact,
    shared_scaler: Option<&StandardScaler>,
    raw: &[Vec<f64>],
) -> Result<Vec<f64>> {
    let scaler = artifact
        .scaler
        .as_ref()
        .or(shared_scaler)
        .ok_or_else(|| anyhow!("no scaler available"))?;
    let scaled = scaler.transform(raw)?;
    let scores = artifact.regressor.predict(&scaled)?;
    if scores.len() != raw.len() {
        return Err(anyhow!(
            "model returned {} scores for {} players",
            scores.len(),
            raw.len()
        ));
    }
    Ok(scores)
}
