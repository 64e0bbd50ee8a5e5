use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};

use mvp_consensus::config::{Config, load_env_files};
use mvp_consensus::eligibility::EligibilityThresholds;
use mvp_consensus::pipeline::{RunSettings, run};
use mvp_consensus::reconcile::{TradePolicy, build_snapshot};
use mvp_consensus::remote::{destination_for, download_all};
use mvp_consensus::snapshot::save_json_snapshot;

#[derive(Parser, Debug)]
#[clap(
    name = "mvp_consensus",
    version,
    about = "Merge several award-share models into one consensus MVP ranking."
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank the current season and write the consensus tables.
    Run {
        /// Reconciled snapshot (.parquet or .json). Falls back to MVP_SNAPSHOT_PATH.
        #[clap(long)]
        snapshot: Option<PathBuf>,
        /// Directory holding the model artifacts.
        #[clap(long)]
        models: Option<PathBuf>,
        #[clap(long)]
        out: Option<PathBuf>,
        #[clap(long)]
        top_n: Option<usize>,
    },
    /// Build a snapshot from raw per-season table exports.
    Reconcile {
        /// One JSON file of raw tables per season.
        #[clap(long, required = true, num_args = 1..)]
        tables: Vec<PathBuf>,
        #[clap(long)]
        out: PathBuf,
        /// Keep a traded player's combined line instead of dropping the player.
        #[clap(long)]
        keep_combined: bool,
        /// Historical award shares to attach as the training label.
        #[clap(long)]
        awards: Option<PathBuf>,
    },
    /// Download artifacts or snapshots, one request at a time.
    Fetch {
        #[clap(long, required = true, num_args = 1..)]
        url: Vec<String>,
        #[clap(long)]
        out: PathBuf,
        /// Pause between requests. Falls back to MVP_FETCH_DELAY_MS.
        #[clap(long)]
        delay_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    load_env_files();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Run {
            snapshot,
            models,
            out,
            top_n,
        } => {
            let snapshot = snapshot
                .or_else(|| config.snapshot_path.clone())
                .ok_or_else(|| anyhow!("no snapshot given (use --snapshot or MVP_SNAPSHOT_PATH)"))?;
            let models = models.unwrap_or_else(|| config.models_dir.clone());
            let out = out.unwrap_or_else(|| config.output_dir.clone());
            let mut consensus = config.consensus();
            if let Some(n) = top_n {
                consensus.slots = n.max(1);
            }

            let settings = RunSettings {
                snapshot: &snapshot,
                models_dir: &models,
                output_dir: &out,
                consensus,
                thresholds: EligibilityThresholds::default(),
            };
            let report = run(&settings, chrono::Local::now().date_naive())?;

            println!("MVP consensus complete");
            println!("Snapshot rows: {}", report.snapshot_rows);
            println!("Eligible players: {}", report.candidates);
            println!("Models used: {}", report.models_used.join(", "));
            if !report.skipped.is_empty() {
                println!("Models skipped: {}", report.skipped.len());
                for (model, reason) in &report.skipped {
                    println!(" - {model}: {reason}");
                }
            }
            for (idx, player) in report.consensus.iter().enumerate() {
                println!("{:>2}. {player}", idx + 1);
            }
            for path in &report.files {
                println!("Wrote {}", path.display());
            }
        }
        Command::Reconcile {
            tables,
            out,
            keep_combined,
            awards,
        } => {
            let policy = if keep_combined {
                TradePolicy::KeepCombined
            } else {
                TradePolicy::DropAll
            };
            let fold = build_snapshot(&tables, policy, awards.as_deref())?;
            save_json_snapshot(&out, &fold.records)?;

            println!("Reconcile complete");
            println!(
                "Seasons: {}/{} succeeded",
                fold.seasons_succeeded, fold.seasons_total
            );
            println!("Records: {}", fold.records.len());
            println!("Snapshot: {}", out.display());
            if !fold.errors.is_empty() {
                println!("Errors: {}", fold.errors.len());
                for err in &fold.errors {
                    println!(" - {err}");
                }
            }
        }
        Command::Fetch { url, out, delay_ms } => {
            let delay = delay_ms
                .map(Duration::from_millis)
                .unwrap_or(config.fetch_delay);
            let items = url
                .iter()
                .map(|u| destination_for(u, &out).map(|dest| (u.clone(), dest)))
                .collect::<Result<Vec<_>>>()?;
            let summary = download_all(&items, delay);

            println!("Fetched {}/{}", summary.fetched.len(), summary.requested);
            for path in &summary.fetched {
                println!(" + {}", path.display());
            }
            if !summary.errors.is_empty() {
                println!("Errors: {}", summary.errors.len());
                for err in &summary.errors {
                    println!(" - {err}");
                }
            }
        }
    }
    Ok(())
}
