//! JSON persistence for a finished run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::AppError;
use crate::model::{BatchReport, NormalizedMessage, SkippedMessage};

/// Pretty JSON with a four-space indent; non-ASCII is written as-is.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

pub fn results_file_name(millis: u128) -> String {
    format!("results-{}.json", millis)
}

pub fn skipped_file_name(millis: u128) -> String {
    format!("skipped-{}.json", millis)
}

/// Message ids are opaque; keep only characters safe in a file name.
fn record_file_name(id: &str) -> String {
    let safe: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}.json", safe)
}

pub fn write_results(
    dir: &Path,
    messages: &[NormalizedMessage],
    millis: u128,
) -> Result<PathBuf, AppError> {
    let path = dir.join(results_file_name(millis));
    fs::write(&path, to_pretty_json(messages)?)?;
    Ok(path)
}

pub fn save_message(dir: &Path, message: &NormalizedMessage) -> Result<PathBuf, AppError> {
    let path = dir.join(record_file_name(&message.id));
    fs::write(&path, to_pretty_json(message)?)?;
    Ok(path)
}

pub fn write_skipped(
    dir: &Path,
    skipped: &[SkippedMessage],
    millis: u128,
) -> Result<PathBuf, AppError> {
    let path = dir.join(skipped_file_name(millis));
    fs::write(&path, to_pretty_json(skipped)?)?;
    Ok(path)
}

/// Write everything a run produced. Returns the paths written, results file first.
pub fn persist(dir: &Path, report: &BatchReport, save_each: bool) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir)?;
    let millis = unix_millis();

    let mut written = vec![write_results(dir, &report.messages, millis)?];
    if save_each {
        for message in &report.messages {
            written.push(save_message(dir, message)?);
        }
    }
    if !report.skipped.is_empty() {
        written.push(write_skipped(dir, &report.skipped, millis)?);
    }

    tracing::info!(
        dir = %dir.display(),
        files = written.len(),
        "Saved results"
    );
    Ok(written)
}
