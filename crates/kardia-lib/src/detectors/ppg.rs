use crate::signal::{Peak, Recording};

/// Configurable constraints for heartbeat peak detection.
///
/// The distance constraint is expressed physiologically: the shortest
/// plausible inter-beat time, converted to samples against the recording's
/// median inter-sample interval. The prominence constraint is for signals
/// without reliable timestamp-derived spacing (raw device windows).
#[derive(Debug, Clone, Copy)]
pub struct PeakDetectionConfig {
    /// Minimum inter-beat time in seconds.
    pub min_rr_s: f64,
    /// Minimum rise above the higher flanking valley, if required.
    pub min_prominence: Option<f64>,
}

impl Default for PeakDetectionConfig {
    fn default() -> Self {
        Self {
            min_rr_s: 0.5,
            min_prominence: None,
        }
    }
}

/// Default prominence for raw window detection, where inter-sample timing
/// is unknown.
pub const DEFAULT_MIN_PROMINENCE: f64 = 0.1;

/// Convert a minimum inter-beat time to a sample count.
pub fn min_distance_samples(min_rr_s: f64, median_interval_s: f64) -> usize {
    if median_interval_s <= 0.0 {
        return 1;
    }
    ((min_rr_s / median_interval_s) as usize).max(1)
}

/// Find heartbeat peaks in `values`.
///
/// A candidate is a sample exceeding both immediate neighbors; the first and
/// last samples qualify when they exceed their sole neighbor, so a recording
/// that ends on an up-slope still registers the final beat. Candidates below
/// `min_prominence` are discarded, then the minimum distance is enforced by
/// keeping the more prominent of any conflicting pair. Returned indices are
/// strictly increasing.
pub fn find_peaks(
    values: &[f64],
    min_distance: usize,
    min_prominence: Option<f64>,
) -> Vec<usize> {
    let n = values.len();
    if n < 2 {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    if values[0] > values[1] {
        candidates.push(0);
    }
    for i in 1..n - 1 {
        if values[i] > values[i - 1] && values[i] > values[i + 1] {
            candidates.push(i);
        }
    }
    if values[n - 1] > values[n - 2] {
        candidates.push(n - 1);
    }

    let mut scored: Vec<(usize, f64)> = candidates
        .into_iter()
        .map(|i| (i, prominence(values, i)))
        .collect();
    if let Some(min_prom) = min_prominence {
        scored.retain(|&(_, prom)| prom >= min_prom);
    }

    if min_distance > 1 {
        // Most prominent first; ties broken toward the earlier sample.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let mut kept: Vec<usize> = Vec::new();
        for (idx, _) in &scored {
            if kept
                .iter()
                .all(|&k| idx.abs_diff(k) >= min_distance)
            {
                kept.push(*idx);
            }
        }
        kept.sort_unstable();
        kept
    } else {
        let mut kept: Vec<usize> = scored.into_iter().map(|(i, _)| i).collect();
        kept.sort_unstable();
        kept
    }
}

/// Height of `values[peak]` above the higher of its flanking valleys.
///
/// Each side is walked outward until a strictly higher sample or the series
/// edge, tracking the minimum seen; a side with no samples contributes
/// nothing.
fn prominence(values: &[f64], peak: usize) -> f64 {
    let height = values[peak];

    let mut left_min = f64::NEG_INFINITY;
    if peak > 0 {
        left_min = f64::INFINITY;
        let mut i = peak;
        while i > 0 {
            i -= 1;
            if values[i] > height {
                break;
            }
            left_min = left_min.min(values[i]);
        }
    }

    let mut right_min = f64::NEG_INFINITY;
    if peak + 1 < values.len() {
        right_min = f64::INFINITY;
        for &v in &values[peak + 1..] {
            if v > height {
                break;
            }
            right_min = right_min.min(v);
        }
    }

    height - left_min.max(right_min)
}

/// Detect beats on a complete (mean-imputed) signal aligned with a
/// recording, attaching timestamps to the resulting indices.
pub fn detect_beats(
    recording: &Recording,
    values: &[f64],
    cfg: &PeakDetectionConfig,
) -> Vec<Peak> {
    let min_distance = recording
        .median_interval_s()
        .map(|dt| min_distance_samples(cfg.min_rr_s, dt))
        .unwrap_or(1);
    log::debug!(
        "peak detection over {} samples, min distance {} samples",
        values.len(),
        min_distance
    );
    find_peaks(values, min_distance, cfg.min_prominence)
        .into_iter()
        .filter(|&i| i < recording.len())
        .map(|i| Peak {
            index: i,
            timestamp: recording.samples[i].timestamp,
            value: values[i],
        })
        .collect()
}
