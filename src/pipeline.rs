use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use log::{info, warn};

use crate::artifacts::{ArtifactBundle, load_bundle};
use crate::consensus::{ConsensusConfig, ConsensusList, resolve};
use crate::eligibility::{EligibilityThresholds, prepare_candidates};
use crate::export::{write_csv, write_xlsx};
use crate::model::MODEL_ROSTER;
use crate::projector::{FinalRankRow, project, to_table};
use crate::ranker::rank_models;
use crate::record::PlayerSeasonRecord;
use crate::snapshot::load_snapshot;
use crate::top_n::{TopList, WideRankTable, extract_all};

pub const FINAL_TABLE_STEM: &str = "MVP_Rank_Stats";

/// Everything one consensus run produced, before anything is written.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub candidates: Vec<PlayerSeasonRecord>,
    pub top_lists: Vec<TopList>,
    pub consensus: ConsensusList,
    pub final_rows: Vec<FinalRankRow>,
    pub skipped: Vec<(String, String)>,
}

impl RunOutcome {
    pub fn wide_table(&self) -> Vec<Vec<String>> {
        let picks = self.consensus.players();
        WideRankTable::from_top_lists(&self.top_lists).to_rows(Some(&picks))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub snapshot_rows: usize,
    pub candidates: usize,
    pub models_used: Vec<String>,
    pub skipped: Vec<(String, String)>,
    pub consensus: Vec<String>,
    pub files: Vec<PathBuf>,
}

pub struct RunSettings<'a> {
    pub snapshot: &'a Path,
    pub models_dir: &'a Path,
    pub output_dir: &'a Path,
    pub consensus: ConsensusConfig,
    pub thresholds: EligibilityThresholds,
}

/// Most recent season label in the snapshot. Labels like `2023-24` order
/// chronologically as strings.
pub fn latest_season(records: &[PlayerSeasonRecord]) -> Option<&str> {
    records.iter().map(|r| r.season.as_str()).max()
}

/// Filter, rank, merge and project the latest season. No file I/O.
pub fn run_core(
    records: &[PlayerSeasonRecord],
    bundle: &ArtifactBundle,
    thresholds: &EligibilityThresholds,
    consensus: &ConsensusConfig,
) -> Result<RunOutcome> {
    let Some(season) = latest_season(records) else {
        return Err(anyhow!("snapshot holds no records"));
    };
    let current: Vec<PlayerSeasonRecord> = records.iter().filter(|r| r.season == season).cloned().collect();
    if current.len() < records.len() {
        info!(
            "ranking season {season}: {} of {} snapshot rows",
            current.len(),
            records.len()
        );
    }

    let candidates = prepare_candidates(&current, thresholds)?;
    info!("{} of {} players pass eligibility", candidates.len(), current.len());

    let ranking = rank_models(&candidates, &bundle.features, bundle.scaler.as_ref(), &bundle.roster)?;
    if ranking.rankings.is_empty() {
        return Err(anyhow!(
            "no model produced a ranking ({} skipped)",
            ranking.skipped.len()
        ));
    }

    let top_lists = extract_all(&ranking.rankings, consensus.slots);
    let merged = resolve(&top_lists, consensus)?;
    if merged.len() < consensus.slots {
        warn!(
            "consensus holds {} players, fewer than the {} requested",
            merged.len(),
            consensus.slots
        );
    }
    let final_rows = project(&merged, &candidates)?;

    Ok(RunOutcome {
        candidates,
        top_lists,
        consensus: merged,
        final_rows,
        skipped: ranking.skipped,
    })
}

/// File name of the dated wide rank table, e.g. `rank_07_03_24.csv`.
pub fn rank_file_name(date: NaiveDate) -> String {
    format!("rank_{}.csv", date.format("%d_%m_%y"))
}

/// Write the wide rank table plus the display table as CSV and XLSX.
pub fn export_outcome(outcome: &RunOutcome, out_dir: &Path, date: NaiveDate) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;

    let wide = outcome.wide_table();
    let display = to_table(&outcome.final_rows);

    let rank_path = out_dir.join(rank_file_name(date));
    write_csv(&rank_path, &wide)?;
    let csv_path = out_dir.join(format!("{FINAL_TABLE_STEM}.csv"));
    write_csv(&csv_path, &display)?;
    let xlsx_path = out_dir.join(format!("{FINAL_TABLE_STEM}.xlsx"));
    write_xlsx(
        &xlsx_path,
        &[("MVP Rank", display.as_slice()), ("Model Ranks", wide.as_slice())],
    )?;

    Ok(vec![rank_path, csv_path, xlsx_path])
}

pub fn run(settings: &RunSettings<'_>, date: NaiveDate) -> Result<PipelineReport> {
    let records = load_snapshot(settings.snapshot)?;
    let bundle = load_bundle(settings.models_dir, &MODEL_ROSTER)
        .with_context(|| format!("load model artifacts from {}", settings.models_dir.display()))?;
    info!(
        "{} of {} models available",
        bundle.roster.available_count(),
        MODEL_ROSTER.len()
    );

    let outcome = run_core(&records, &bundle, &settings.thresholds, &settings.consensus)?;
    let files = export_outcome(&outcome, settings.output_dir, date)?;

    Ok(PipelineReport {
        snapshot_rows: records.len(),
        candidates: outcome.candidates.len(),
        models_used: outcome.top_lists.iter().map(|l| l.model.clone()).collect(),
        skipped: outcome.skipped,
        consensus: outcome.consensus.players(),
        files,
    })
}
