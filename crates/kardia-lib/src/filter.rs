use crate::signal::{FilteredSample, Recording};

/// Smooth a recording with a centered moving average of `window` samples.
///
/// Position `i` carries the mean of the `window` samples centered on `i`
/// when the whole window fits inside the series; edge positions without a
/// full set of neighbors stay `None`. The average looks ahead within the
/// window; inputs are complete recordings, not streams.
pub fn moving_average(recording: &Recording, window: usize) -> Vec<FilteredSample> {
    let n = recording.len();
    let mut out: Vec<FilteredSample> = recording
        .samples
        .iter()
        .map(|s| FilteredSample {
            timestamp: s.timestamp,
            value: None,
        })
        .collect();
    if window == 0 || window > n {
        return out;
    }

    let half = window / 2;
    let mut acc: f64 = recording.samples[..window].iter().map(|s| s.raw).sum();
    // First center index with a full window on both sides.
    let mut center = window - 1 - half;
    out[center].value = Some(acc / window as f64);
    for end in window..n {
        acc += recording.samples[end].raw - recording.samples[end - window].raw;
        center += 1;
        out[center].value = Some(acc / window as f64);
    }
    out
}

/// Mean of the non-missing filtered values.
pub fn present_mean(filtered: &[FilteredSample]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for sample in filtered {
        if let Some(v) = sample.value {
            sum += v;
            count += 1;
        }
    }
    (count > 0).then(|| sum / count as f64)
}

/// Replace missing positions with the mean of the present values, yielding a
/// complete scalar series for downstream consumers that need one.
pub fn fill_missing(filtered: &[FilteredSample]) -> Vec<f64> {
    let fill = present_mean(filtered).unwrap_or(0.0);
    filtered
        .iter()
        .map(|s| s.value.unwrap_or(fill))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Sample;
    use chrono::NaiveDate;

    fn recording(values: &[f64]) -> Recording {
        let base = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Recording::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &raw)| Sample {
                    timestamp: base + chrono::Duration::milliseconds(100 * i as i64),
                    raw,
                })
                .collect(),
        )
    }

    #[test]
    fn window_of_three_leaves_edges_missing() {
        let filtered = moving_average(&recording(&[10.0, 12.0, 9.0, 11.0, 10.0]), 3);
        assert_eq!(filtered.len(), 5);
        assert_eq!(filtered[0].value, None);
        assert!((filtered[1].value.unwrap() - 31.0 / 3.0).abs() < 1e-9);
        assert!((filtered[2].value.unwrap() - 32.0 / 3.0).abs() < 1e-9);
        assert!((filtered[3].value.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(filtered[4].value, None);
    }

    #[test]
    fn window_longer_than_series_is_all_missing() {
        let filtered = moving_average(&recording(&[1.0, 2.0]), 15);
        assert!(filtered.iter().all(|s| s.value.is_none()));
    }

    #[test]
    fn filtered_series_stays_aligned() {
        let rec = recording(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let filtered = moving_average(&rec, 5);
        assert_eq!(filtered.len(), rec.len());
        for (sample, out) in rec.samples.iter().zip(&filtered) {
            assert_eq!(sample.timestamp, out.timestamp);
        }
    }

    #[test]
    fn fill_missing_imputes_the_present_mean() {
        let filtered = moving_average(&recording(&[10.0, 12.0, 9.0, 11.0, 10.0]), 3);
        let mean = present_mean(&filtered).unwrap();
        let filled = fill_missing(&filtered);
        assert!((filled[0] - mean).abs() < 1e-9);
        assert!((filled[4] - mean).abs() < 1e-9);
        assert!((filled[3] - 10.0).abs() < 1e-9);
    }
}
