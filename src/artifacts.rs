use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{ModelArtifact, StandardScaler};

pub const FEATURES_FILE: &str = "features.json";
pub const SCALER_FILE: &str = "standard_scaler.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Optional integrity manifest: artifact file name -> lowercase hex SHA-256.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Manifest {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl Manifest {
    pub fn verify(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let Some(expected) = self.files.get(file_name) else {
            return Ok(());
        };
        let actual = sha256_hex(bytes);
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(anyhow!(
                "checksum mismatch for {file_name}: expected {expected}, got {actual}"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Availability {
    Available(Box<ModelArtifact>),
    Unavailable { reason: String },
}

/// Which roster models can take part in this run. Models are kept in roster
/// order; unavailable ones carry the reason they were dropped.
#[derive(Debug, Clone, Default)]
pub struct ModelRoster {
    entries: Vec<(String, Availability)>,
}

impl ModelRoster {
    pub fn from_models<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = (S, ModelArtifact)>,
        S: Into<String>,
    {
        Self {
            entries: models
                .into_iter()
                .map(|(name, artifact)| (name.into(), Availability::Available(Box::new(artifact))))
                .collect(),
        }
    }

    /// Load every named model from `dir`. A missing, unreadable, unparsable or
    /// tampered artifact marks that model unavailable instead of failing.
    pub fn load(dir: &Path, names: &[&str], manifest: Option<&Manifest>) -> Self {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let availability = match load_model(dir, name, manifest) {
                Ok(artifact) => {
                    info!("loaded model {name} ({})", artifact.regressor.kind());
                    Availability::Available(Box::new(artifact))
                }
                Err(err) => {
                    warn!("model {name} unavailable: {err:#}");
                    Availability::Unavailable {
                        reason: format!("{err:#}"),
                    }
                }
            };
            entries.push((name.to_string(), availability));
        }
        Self { entries }
    }

    pub fn available(&self) -> impl Iterator<Item = (&str, &ModelArtifact)> {
        self.entries.iter().filter_map(|(name, a)| match a {
            Availability::Available(artifact) => Some((name.as_str(), artifact.as_ref())),
            Availability::Unavailable { .. } => None,
        })
    }

    pub fn unavailable(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(name, a)| match a {
            Availability::Unavailable { reason } => Some((name.as_str(), reason.as_str())),
            Availability::Available(_) => None,
        })
    }

    pub fn available_count(&self) -> usize {
        self.available().count()
    }
}

/// `"Gradient Boosting"` -> `"gradient_boosting.json"`.
pub fn artifact_file_name(model: &str) -> String {
    let mut out = String::with_capacity(model.len() + 5);
    for ch in model.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out.push_str(".json");
    out
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn load_manifest(dir: &Path) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).with_context(|| format!("read manifest {}", path.display()))?;
    let manifest = serde_json::from_str::<Manifest>(&raw)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    Ok(Some(manifest))
}

pub fn load_feature_list(dir: &Path, manifest: Option<&Manifest>) -> Result<Vec<String>> {
    let bytes = read_verified(&dir.join(FEATURES_FILE), manifest)?;
    let features = serde_json::from_slice::<Vec<String>>(&bytes).context("parse feature list")?;
    if features.is_empty() {
        return Err(anyhow!("feature list is empty"));
    }
    Ok(features)
}

pub fn load_scaler(dir: &Path, manifest: Option<&Manifest>) -> Result<StandardScaler> {
    let bytes = read_verified(&dir.join(SCALER_FILE), manifest)?;
    serde_json::from_slice::<StandardScaler>(&bytes).context("parse standard scaler")
}

fn load_model(dir: &Path, name: &str, manifest: Option<&Manifest>) -> Result<ModelArtifact> {
    let path = dir.join(artifact_file_name(name));
    let bytes = read_verified(&path, manifest)?;
    serde_json::from_slice::<ModelArtifact>(&bytes)
        .with_context(|| format!("parse model artifact {}", path.display()))
}

fn read_verified(path: &Path, manifest: Option<&Manifest>) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if let Some(manifest) = manifest {
        manifest.verify(&file_name(path), &bytes)?;
    }
    Ok(bytes)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Everything the ranker needs from the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub features: Vec<String>,
    pub scaler: Option<StandardScaler>,
    pub roster: ModelRoster,
}

/// The feature list is shared by every model and is required. The shared
/// scaler is optional: models that carry their own keep working without it.
pub fn load_bundle(dir: &Path, names: &[&str]) -> Result<ArtifactBundle> {
    let manifest = load_manifest(dir)?;
    let features = load_feature_list(dir, manifest.as_ref())?;
    let scaler = match load_scaler(dir, manifest.as_ref()) {
        Ok(scaler) => Some(scaler),
        Err(err) => {
            warn!("shared scaler unavailable: {err:#}");
            None
        }
    };
    let roster = ModelRoster::load(dir, names, manifest.as_ref());
    Ok(ArtifactBundle {
        features,
        scaler,
        roster,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MODEL_ROSTER;

    #[test]
    fn artifact_names_are_snake_case() {
        assert_eq!(artifact_file_name("Gradient Boosting"), "gradient_boosting.json");
        assert_eq!(artifact_file_name("SVM"), "svm.json");
        assert_eq!(artifact_file_name(" Random  Forest "), "random_forest.json");
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn broken_artifacts_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let good = r#"{"regressor":{"kind":"linear","coefficients":[1.0]}}"#;
        fs::write(dir.path().join("svm.json"), good).unwrap();
        fs::write(dir.path().join("lgbm.json"), good).unwrap();
        fs::write(dir.path().join("adaboost.json"), "{not json").unwrap();
        fs::write(dir.path().join("random_forest.json"), good).unwrap();

        let mut files = BTreeMap::new();
        files.insert("random_forest.json".to_string(), "00".repeat(32));
        let manifest = Manifest {
            version: 1,
            generated_at: None,
            files,
        };

        let roster = ModelRoster::load(dir.path(), &MODEL_ROSTER, Some(&manifest));
        let available: Vec<&str> = roster.available().map(|(n, _)| n).collect();
        assert_eq!(available, vec!["SVM", "LGBM"]);
        let unavailable: Vec<&str> = roster.unavailable().map(|(n, _)| n).collect();
        assert_eq!(unavailable, vec!["Random Forest", "AdaBoost", "Gradient Boosting"]);
    }

    #[test]
    fn bundle_without_shared_scaler_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(FEATURES_FILE), r#"["PTS_PERGAME"]"#).unwrap();
        let bundle = load_bundle(dir.path(), &MODEL_ROSTER).unwrap();
        assert!(bundle.scaler.is_none());
        assert_eq!(bundle.features, vec!["PTS_PERGAME".to_string()]);
        assert_eq!(bundle.roster.available_count(), 0);
    }

    #[test]
    fn missing_feature_list_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_bundle(dir.path(), &MODEL_ROSTER).is_err());
    }
}
