use crate::signal::{Recording, Sample};
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Why a row was excluded from the cleaned sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SkipReason {
    #[error("wrong field count")]
    FieldCount,
    #[error("unparseable timestamp")]
    Timestamp,
    #[error("unparseable number")]
    Number,
    #[error("non-finite value")]
    NonFinite,
    #[error("duplicate timestamp")]
    Duplicate,
}

/// A dropped row, identified by its 1-based line number in the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub line: usize,
    pub reason: SkipReason,
}

/// Result of ingesting a row-per-sample history: the cleaned recording plus
/// a classified record of everything that was dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSamples {
    pub recording: Recording,
    pub skipped: Vec<SkippedRow>,
}

/// One measurement window of a row-per-window history: a timestamp, the
/// device's precomputed heart rate, and the window's raw PPG samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    pub timestamp: NaiveDateTime,
    pub bpm: f64,
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedWindows {
    pub windows: Vec<WindowRecord>,
    pub skipped: Vec<SkippedRow>,
}

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    let trimmed = field.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Parse a numeric field, accepting a locale decimal comma.
fn parse_number(field: &str) -> Option<f64> {
    field.trim().replace(',', ".").parse::<f64>().ok()
}

fn record_line(record: &StringRecord) -> usize {
    record.position().map(|p| p.line() as usize).unwrap_or(0)
}

fn history_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes())
}

fn is_blank(record: &StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty())
}

/// Parse a `timestamp;ppg_value` history. One header line is skipped;
/// malformed rows are dropped and classified, never fatal.
pub fn parse_sample_history(text: &str) -> ParsedSamples {
    let mut rows: Vec<(usize, Sample)> = Vec::new();
    let mut skipped = Vec::new();
    for result in history_reader(text).records() {
        let Ok(record) = result else {
            continue;
        };
        if is_blank(&record) {
            continue;
        }
        let line = record_line(&record);
        if record.len() != 2 {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::FieldCount,
            });
            continue;
        }
        let Some(timestamp) = record.get(0).and_then(parse_timestamp) else {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::Timestamp,
            });
            continue;
        };
        let Some(raw) = record.get(1).and_then(|f| f.trim().parse::<f64>().ok()) else {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::Number,
            });
            continue;
        };
        if !raw.is_finite() {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::NonFinite,
            });
            continue;
        }
        rows.push((line, Sample { timestamp, raw }));
    }

    // Strictly increasing, unique timestamps: stable sort, then collapse
    // duplicates keeping the first occurrence.
    rows.sort_by_key(|(_, s)| s.timestamp);
    let mut samples: Vec<Sample> = Vec::with_capacity(rows.len());
    for (line, sample) in rows {
        if samples
            .last()
            .is_some_and(|prev| prev.timestamp == sample.timestamp)
        {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::Duplicate,
            });
            continue;
        }
        samples.push(sample);
    }

    if !skipped.is_empty() {
        log::warn!("dropped {} malformed or duplicate rows", skipped.len());
    }
    ParsedSamples {
        recording: Recording::new(samples),
        skipped,
    }
}

/// Read a row-per-sample history from disk. A missing or unreadable file is
/// the only fatal condition.
pub fn read_sample_history(path: &Path) -> Result<ParsedSamples> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_sample_history(&text))
}

/// Parse a `timestamp;bpm;ppg1,ppg2,...` history. Numeric fields may carry a
/// locale decimal comma. Rows with fewer than three fields, or any
/// unparseable number, are dropped whole.
pub fn parse_window_history(text: &str) -> ParsedWindows {
    let mut windows: Vec<(usize, WindowRecord)> = Vec::new();
    let mut skipped = Vec::new();
    for result in history_reader(text).records() {
        let Ok(record) = result else {
            continue;
        };
        if is_blank(&record) {
            continue;
        }
        let line = record_line(&record);
        if record.len() < 3 {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::FieldCount,
            });
            continue;
        }
        let Some(timestamp) = record.get(0).and_then(parse_timestamp) else {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::Timestamp,
            });
            continue;
        };
        let Some(bpm) = record.get(1).and_then(parse_number) else {
            skipped.push(SkippedRow {
                line,
                reason: SkipReason::Number,
            });
            continue;
        };
        match parse_window_samples(record.get(2).unwrap_or_default()) {
            Ok(samples) if bpm.is_finite() => {
                windows.push((line, WindowRecord {
                    timestamp,
                    bpm,
                    samples,
                }));
            }
            Ok(_) => skipped.push(SkippedRow {
                line,
                reason: SkipReason::NonFinite,
            }),
            Err(reason) => skipped.push(SkippedRow { line, reason }),
        }
    }

    windows.sort_by_key(|(_, w)| w.timestamp);
    if !skipped.is_empty() {
        log::warn!("dropped {} malformed window rows", skipped.len());
    }
    ParsedWindows {
        windows: windows.into_iter().map(|(_, w)| w).collect(),
        skipped,
    }
}

fn parse_window_samples(field: &str) -> std::result::Result<Vec<f64>, SkipReason> {
    let mut samples = Vec::new();
    for value in field.split(',') {
        match parse_number(value) {
            Some(v) if v.is_finite() => samples.push(v),
            Some(_) => return Err(SkipReason::NonFinite),
            None => return Err(SkipReason::Number),
        }
    }
    Ok(samples)
}

/// Read a row-per-window history from disk.
pub fn read_window_history(path: &Path) -> Result<ParsedWindows> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_window_history(&text))
}
