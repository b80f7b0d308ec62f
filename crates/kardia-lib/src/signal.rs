use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One raw PPG reading. Immutable once ingested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub raw: f64,
}

/// Cleaned, strictly time-ordered PPG recording.
///
/// Construction happens in `io::history`; everything downstream reads this
/// sequence without mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub samples: Vec<Sample>,
}

impl Recording {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn raw_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.raw).collect()
    }

    /// Median interval between consecutive samples, in seconds.
    pub fn median_interval_s(&self) -> Option<f64> {
        let mut deltas: Vec<f64> = self
            .samples
            .windows(2)
            .map(|w| seconds_between(w[0].timestamp, w[1].timestamp))
            .filter(|dt| dt.is_finite() && *dt > 0.0)
            .collect();
        if deltas.is_empty() {
            return None;
        }
        deltas.sort_by(f64::total_cmp);
        let mid = deltas.len() / 2;
        if deltas.len() % 2 == 0 {
            Some((deltas[mid - 1] + deltas[mid]) / 2.0)
        } else {
            Some(deltas[mid])
        }
    }

    /// Effective sampling rate as the reciprocal of the median interval.
    pub fn sampling_rate(&self) -> Option<f64> {
        self.median_interval_s().map(|dt| 1.0 / dt)
    }

    pub fn stats(&self) -> Option<SummaryStats> {
        summary_stats(&self.raw_values())
    }
}

/// Smoothed counterpart of one `Sample`. `value` is `None` where the
/// centered filter window ran out of neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// A detected heartbeat on the filtered (or raw window) signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Time between two consecutive detected beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrInterval {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub seconds: f64,
}

/// Instantaneous heart rate, stamped at the later of the two beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmPoint {
    pub timestamp: NaiveDateTime,
    pub bpm: f64,
}

/// A window whose spectral power ratio cleared the coherence threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoherenceWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub ratio: f64,
}

/// A raw reading flagged as statistically anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub timestamp: NaiveDateTime,
    pub raw: f64,
    pub zscore: f64,
}

/// Basic statistics over the cleaned raw series. `std` uses the sample
/// (n-1) denominator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summary_stats(values: &[f64]) -> Option<SummaryStats> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() > 1 {
        (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(SummaryStats {
        mean,
        std,
        min,
        max,
    })
}

/// Signed elapsed seconds from `a` to `b`.
pub fn seconds_between(a: NaiveDateTime, b: NaiveDateTime) -> f64 {
    let delta = b.signed_duration_since(a);
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}
