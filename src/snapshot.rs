use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::{debug, info};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::{Field, Row};

use crate::record::{PlayerSeasonRecord, UNKNOWN_SEED, col};

/// Load the reconciled season snapshot. `.parquet` files are decoded with the
/// record API; anything else is read as a JSON array of records.
pub fn load_snapshot(path: &Path) -> Result<Vec<PlayerSeasonRecord>> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    let records = if is_parquet {
        read_parquet_snapshot(path)?
    } else {
        read_json_snapshot(path)?
    };
    ensure_unique(&records)?;
    info!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

pub fn read_json_snapshot(path: &Path) -> Result<Vec<PlayerSeasonRecord>> {
    let raw = fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    serde_json::from_str::<Vec<PlayerSeasonRecord>>(&raw)
        .with_context(|| format!("parse snapshot {}", path.display()))
}

pub fn save_json_snapshot(path: &Path, records: &[PlayerSeasonRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(records).context("serialize snapshot")?;
    fs::write(&tmp, json).context("write snapshot")?;
    fs::rename(&tmp, path).context("swap snapshot")?;
    Ok(())
}

pub fn read_parquet_snapshot(path: &Path) -> Result<Vec<PlayerSeasonRecord>> {
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = SerializedFileReader::new(file).context("open parquet reader snapshot")?;
    let iter = reader.get_row_iter(None).context("iterate snapshot rows")?;

    let mut out = Vec::new();
    for (idx, row) in iter.enumerate() {
        let row = row.with_context(|| format!("decode snapshot row {idx}"))?;
        out.push(record_from_row(&row).with_context(|| format!("snapshot row {idx}"))?);
    }
    Ok(out)
}

fn record_from_row(row: &Row) -> Result<PlayerSeasonRecord> {
    let mut rec = PlayerSeasonRecord::new(String::new(), String::new());
    for (name, field) in row.get_column_iter() {
        match name.as_str() {
            "PLAYER" => rec.player = field_as_string(field).unwrap_or_default(),
            "SEASON" => rec.season = field_as_string(field).unwrap_or_default(),
            "TEAM" => rec.team = field_as_string(field).unwrap_or_default(),
            "POS" => rec.position = field_as_string(field).unwrap_or_default(),
            col::SEED => {
                rec.seed = field_as_f64(field).map(|v| v as i32).unwrap_or(UNKNOWN_SEED);
            }
            "AGE" => rec.age = field_as_count(field),
            "HEIGHT" => rec.height_cm = field_as_f64(field),
            "WEIGHT" => rec.weight_kg = field_as_f64(field),
            "IMC" | "BMI" => rec.bmi = field_as_f64(field),
            "EXPERIENCE" => rec.experience = field_as_count(field),
            "COLLEGE" => rec.college = field_as_f64(field).is_some_and(|v| v > 0.0),
            "NATIONALITY_US" => rec.nationality_us = field_as_f64(field).is_some_and(|v| v > 0.0),
            col::GAMES_TEAM => rec.games_team = field_as_count(field),
            "W" => rec.wins = field_as_count(field),
            "PCT" => rec.pct = field_as_f64(field),
            other => match field_as_f64(field) {
                Some(v) => rec.set_stat(other, v),
                None => debug!("ignoring non-numeric column {other}"),
            },
        }
    }
    if rec.player.trim().is_empty() {
        return Err(anyhow!("row has no PLAYER value"));
    }
    if rec.season.trim().is_empty() {
        return Err(anyhow!("row for {} has no SEASON value", rec.player));
    }
    Ok(rec)
}

fn field_as_f64(field: &Field) -> Option<f64> {
    let value = match field {
        Field::Double(v) => *v,
        Field::Float(v) => *v as f64,
        Field::Long(v) => *v as f64,
        Field::Int(v) => *v as f64,
        Field::Short(v) => *v as f64,
        Field::Byte(v) => *v as f64,
        Field::ULong(v) => *v as f64,
        Field::UInt(v) => *v as f64,
        Field::UShort(v) => *v as f64,
        Field::UByte(v) => *v as f64,
        Field::Bool(v) => {
            if *v {
                1.0
            } else {
                0.0
            }
        }
        Field::Str(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn field_as_count(field: &Field) -> Option<u32> {
    field_as_f64(field)
        .filter(|v| *v >= 0.0)
        .map(|v| v.round() as u32)
}

fn field_as_string(field: &Field) -> Option<String> {
    match field {
        Field::Str(s) => Some(s.trim().to_string()),
        Field::Null => None,
        other => Some(other.to_string()),
    }
}

/// A snapshot must hold at most one row per (player, season).
pub fn ensure_unique(records: &[PlayerSeasonRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for rec in records {
        if !seen.insert(rec.key()) {
            return Err(anyhow!(
                "duplicate snapshot row for {} in season {}",
                rec.player,
                rec.season
            ));
        }
    }
    Ok(())
}
