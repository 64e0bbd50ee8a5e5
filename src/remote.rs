use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::http_client::http_client;

const MAX_ATTEMPTS: u32 = 4;
const RETRY_STEP_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct FetchSummary {
    pub requested: usize,
    pub fetched: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Download one file, retrying with a linear back-off.
pub fn download_file(url: &str, path: &Path) -> Result<PathBuf> {
    let client = http_client()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=MAX_ATTEMPTS {
        let fetched = client
            .get(url)
            .send()
            .with_context(|| format!("request {url}"))
            .and_then(|res| res.error_for_status().with_context(|| format!("status for {url}")))
            .and_then(|res| res.bytes().with_context(|| format!("read body {url}")));
        match fetched {
            Ok(bytes) => {
                let tmp = path.with_extension("part");
                fs::write(&tmp, &bytes).with_context(|| format!("write {}", tmp.display()))?;
                fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
                info!("fetched {url} ({} bytes)", bytes.len());
                return Ok(path.to_path_buf());
            }
            Err(err) => {
                warn!("attempt {attempt} for {url} failed: {err:#}");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    thread::sleep(Duration::from_millis(RETRY_STEP_MS.saturating_mul(attempt as u64)));
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("download failed for {url}")))
}

/// Fetch `(url, destination)` pairs one after another with a fixed pause
/// between requests. A failed item is recorded and the rest still run.
pub fn download_all(items: &[(String, PathBuf)], delay: Duration) -> FetchSummary {
    let mut summary = FetchSummary {
        requested: items.len(),
        fetched: Vec::new(),
        errors: Vec::new(),
    };
    for (idx, (url, dest)) in items.iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        match download_file(url, dest) {
            Ok(path) => summary.fetched.push(path),
            Err(err) => summary.errors.push(format!("{url}: {err:#}")),
        }
    }
    summary
}

/// Destination path for `url` inside `dir`, named after the last URL segment.
pub fn destination_for(url: &str, dir: &Path) -> Result<PathBuf> {
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|base| base.trim_end_matches('/').rsplit('/').next())
        .filter(|seg| !seg.is_empty() && !seg.contains(':'))
        .ok_or_else(|| anyhow!("cannot derive a file name from {url}"))?;
    Ok(dir.join(name))
}
