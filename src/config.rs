use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::consensus::ConsensusConfig;
use crate::top_n::TOP_N;

const DEFAULT_MODELS_DIR: &str = "models";
const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_FETCH_DELAY_MS: u64 = 3_000;

/// Runtime settings gathered from `.env` files and the environment. CLI flags
/// override individual fields afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub snapshot_path: Option<PathBuf>,
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
    pub top_n: usize,
    pub majority: Option<usize>,
    pub restricted_majority: Option<usize>,
    pub fetch_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            top_n: TOP_N,
            majority: None,
            restricted_majority: None,
            fetch_delay: Duration::from_millis(DEFAULT_FETCH_DELAY_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset and numbers
    /// that fail to parse fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());
        let defaults = Self::default();

        let top_n = get("MVP_TOP_N")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.top_n)
            .clamp(1, 50);
        let majority = get("MVP_MAJORITY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .map(|val| val.clamp(1, 16));
        let restricted_majority = get("MVP_RESTRICTED_MAJORITY")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .map(|val| val.clamp(1, 16));
        let fetch_delay = Duration::from_millis(
            get("MVP_FETCH_DELAY_MS")
                .and_then(|val| val.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_FETCH_DELAY_MS)
                .min(60_000),
        );

        Self {
            snapshot_path: get("MVP_SNAPSHOT_PATH").map(PathBuf::from),
            models_dir: get("MVP_MODELS_DIR").map(PathBuf::from).unwrap_or(defaults.models_dir),
            output_dir: get("MVP_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            top_n,
            majority,
            restricted_majority,
            fetch_delay,
        }
    }

    pub fn consensus(&self) -> ConsensusConfig {
        ConsensusConfig {
            slots: self.top_n,
            majority: self.majority,
            restricted_majority: self.restricted_majority,
            ..ConsensusConfig::default()
        }
    }
}

/// Load `.env.local` first so its values win over `.env`.
pub fn load_env_files() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let cfg = Config::from_lookup(lookup(&[
            ("MVP_SNAPSHOT_PATH", "data/2024.parquet"),
            ("MVP_MODELS_DIR", "  "),
            ("MVP_TOP_N", "500"),
            ("MVP_MAJORITY", "0"),
            ("MVP_RESTRICTED_MAJORITY", "two"),
            ("MVP_FETCH_DELAY_MS", "250"),
        ]));
        assert_eq!(cfg.snapshot_path, Some(PathBuf::from("data/2024.parquet")));
        assert_eq!(cfg.models_dir, PathBuf::from(DEFAULT_MODELS_DIR));
        assert_eq!(cfg.top_n, 50);
        assert_eq!(cfg.majority, Some(1));
        assert_eq!(cfg.restricted_majority, None);
        assert_eq!(cfg.fetch_delay, Duration::from_millis(250));
    }

    #[test]
    fn consensus_settings_follow_config() {
        let cfg = Config {
            top_n: 5,
            majority: Some(4),
            ..Config::default()
        };
        let consensus = cfg.consensus();
        assert_eq!(consensus.slots, 5);
        assert_eq!(consensus.majority, Some(4));
        assert_eq!(consensus.restricted_majority, None);
        assert_eq!(consensus.restricted_excluded, ConsensusConfig::default().restricted_excluded);
    }
}
