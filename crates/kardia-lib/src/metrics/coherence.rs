use crate::signal::{CoherenceWindow, FilteredSample, Recording};
use realfft::RealFftPlanner;
use std::f64::consts::PI;

/// Parameters for windowed spectral coherence scoring.
#[derive(Debug, Clone, Copy)]
pub struct CoherenceConfig {
    /// Length of each scoring window, seconds.
    pub window_s: f64,
    /// Band whose power counts toward the ratio, Hz (inclusive).
    pub band_hz: (f64, f64),
    /// A window is retained only when its ratio strictly exceeds this.
    pub threshold: f64,
    /// Windows need more than this many non-missing values to be scored.
    pub min_valid: usize,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            window_s: 60.0,
            band_hz: (0.04, 0.26),
            threshold: 0.7,
            min_valid: 10,
        }
    }
}

/// Score consecutive non-overlapping windows of the filtered signal and
/// keep those whose in-band power fraction clears the threshold.
///
/// The final partial window is always discarded: a truncated window would
/// bias the spectral estimate. Windows share no state, so the output is
/// chronological by construction.
pub fn coherence_windows(
    recording: &Recording,
    filtered: &[FilteredSample],
    cfg: &CoherenceConfig,
) -> Vec<CoherenceWindow> {
    let Some(fs) = recording.sampling_rate() else {
        return Vec::new();
    };
    let window = (cfg.window_s * fs) as usize;
    if window == 0 || filtered.len() < window {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut start = 0;
    while start + window <= filtered.len() {
        let segment: Vec<f64> = filtered[start..start + window]
            .iter()
            .filter_map(|s| s.value)
            .collect();
        if segment.len() > cfg.min_valid {
            let ratio = coherence_ratio(&segment, fs, cfg.band_hz);
            if ratio > cfg.threshold {
                out.push(CoherenceWindow {
                    start: filtered[start].timestamp,
                    end: filtered[start + window - 1].timestamp,
                    ratio,
                });
            }
        }
        start += window;
    }
    log::debug!(
        "coherence scoring kept {} of {} windows",
        out.len(),
        filtered.len() / window
    );
    out
}

/// Fraction of Welch spectral power inside `band_hz`. Zero total power is
/// defined as ratio 0 rather than a division fault.
pub fn coherence_ratio(segment: &[f64], fs: f64, band_hz: (f64, f64)) -> f64 {
    let (freqs, powers) = welch_psd(segment, fs);
    let total: f64 = powers.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let band: f64 = freqs
        .iter()
        .zip(&powers)
        .filter(|(f, _)| **f >= band_hz.0 && **f <= band_hz.1)
        .map(|(_, p)| *p)
        .sum();
    band / total
}

/// Welch's averaged periodogram: Hann-windowed segments of length
/// min(256, n) with 50% overlap, each demeaned before transforming.
fn welch_psd(signal: &[f64], fs: f64) -> (Vec<f64>, Vec<f64>) {
    let n = signal.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let window = n.min(256);
    let step = (window / 2).max(1);
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(window);
    let taper = hann(window);

    let mut freqs = Vec::new();
    let mut powers = Vec::new();
    let mut segments = 0usize;
    let mut pos = 0;
    while pos + window <= n {
        let slice = &signal[pos..pos + window];
        let mean = slice.iter().sum::<f64>() / window as f64;
        let mut frame: Vec<f64> = slice
            .iter()
            .zip(&taper)
            .map(|(x, w)| (x - mean) * w)
            .collect();
        let mut spectrum = r2c.make_output_vec();
        if r2c.process(&mut frame, &mut spectrum).is_err() {
            return (Vec::new(), Vec::new());
        }
        let scale = 1.0 / window as f64;
        for (k, val) in spectrum.iter().enumerate() {
            if segments == 0 {
                freqs.push(k as f64 * fs / window as f64);
                powers.push(0.0);
            }
            let power = if k == 0 || (window % 2 == 0 && k == window / 2) {
                val.norm_sqr()
            } else {
                2.0 * val.norm_sqr()
            } * scale;
            powers[k] += power;
        }
        segments += 1;
        pos += step;
    }
    if segments > 0 {
        for p in powers.iter_mut() {
            *p /= segments as f64;
        }
    }
    (freqs, powers)
}

fn hann(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (size as f64)).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter;
    use crate::signal::Sample;
    use chrono::NaiveDate;

    fn recording_at_1hz(values: &[f64]) -> Recording {
        let base = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Recording::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &raw)| Sample {
                    timestamp: base + chrono::Duration::seconds(i as i64),
                    raw,
                })
                .collect(),
        )
    }

    fn sine(freq_hz: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / fs).sin())
            .collect()
    }

    #[test]
    fn in_band_tone_scores_near_one() {
        // 0.1 Hz lands on an exact bin of a 60-sample segment at 1 Hz.
        let segment = sine(0.1, 1.0, 60);
        let ratio = coherence_ratio(&segment, 1.0, (0.04, 0.26));
        assert!(ratio > 0.9, "ratio {ratio}");
        assert!(ratio <= 1.0);
    }

    #[test]
    fn out_of_band_tone_scores_near_zero() {
        let segment = sine(0.4, 1.0, 60);
        let ratio = coherence_ratio(&segment, 1.0, (0.04, 0.26));
        assert!(ratio < 0.2, "ratio {ratio}");
    }

    #[test]
    fn constant_segment_has_zero_ratio() {
        let ratio = coherence_ratio(&vec![5.0; 64], 1.0, (0.04, 0.26));
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn coherent_windows_are_retained_and_ordered() {
        // Two full 60 s windows of an in-band tone, sampled at 1 Hz.
        let recording = recording_at_1hz(&sine(0.1, 1.0, 130));
        let filtered: Vec<FilteredSample> = recording
            .samples
            .iter()
            .map(|s| FilteredSample {
                timestamp: s.timestamp,
                value: Some(s.raw),
            })
            .collect();
        let windows = coherence_windows(&recording, &filtered, &CoherenceConfig::default());
        assert_eq!(windows.len(), 2);
        assert!(windows[0].end < windows[1].start);
        for w in &windows {
            assert!(w.ratio > 0.7 && w.ratio <= 1.0);
        }
        assert_eq!(windows[0].start, recording.samples[0].timestamp);
        assert_eq!(windows[0].end, recording.samples[59].timestamp);
    }

    #[test]
    fn incoherent_windows_are_discarded() {
        let recording = recording_at_1hz(&sine(0.4, 1.0, 130));
        let filtered: Vec<FilteredSample> = recording
            .samples
            .iter()
            .map(|s| FilteredSample {
                timestamp: s.timestamp,
                value: Some(s.raw),
            })
            .collect();
        let windows = coherence_windows(&recording, &filtered, &CoherenceConfig::default());
        assert!(windows.is_empty());
    }

    #[test]
    fn sparse_windows_are_skipped() {
        let recording = recording_at_1hz(&sine(0.1, 1.0, 130));
        // Smoothing with a huge window leaves everything missing, so no
        // window reaches the validity floor.
        let filtered = filter::moving_average(&recording, 200);
        let windows = coherence_windows(&recording, &filtered, &CoherenceConfig::default());
        assert!(windows.is_empty());
    }
}
