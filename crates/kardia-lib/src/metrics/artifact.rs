use crate::signal::{Artifact, Recording, SummaryStats};

/// Standardized deviation of one reading from the recording's mean.
pub fn zscore(value: f64, stats: &SummaryStats) -> f64 {
    (value - stats.mean) / stats.std
}

/// Flag raw readings whose |z-score| strictly exceeds `threshold`.
///
/// Runs on the unfiltered values: the artifacts worth flagging are exactly
/// the sensor glitches the moving average would smooth away. A recording
/// with zero spread produces no artifacts.
pub fn detect_artifacts(recording: &Recording, threshold: f64) -> Vec<Artifact> {
    let Some(stats) = recording.stats() else {
        return Vec::new();
    };
    if stats.std <= 0.0 || !stats.std.is_finite() {
        return Vec::new();
    }
    recording
        .samples
        .iter()
        .filter_map(|sample| {
            let z = zscore(sample.raw, &stats);
            (z.abs() > threshold).then_some(Artifact {
                timestamp: sample.timestamp,
                raw: sample.raw,
                zscore: z,
            })
        })
        .collect()
}
