use crate::detectors::ppg::{detect_beats, PeakDetectionConfig};
use crate::filter;
use crate::metrics::artifact::detect_artifacts;
use crate::metrics::coherence::{coherence_windows, CoherenceConfig};
use crate::metrics::rate::{bpm_series, rr_intervals};
use crate::signal::{
    Artifact, BpmPoint, CoherenceWindow, FilteredSample, Peak, Recording, RrInterval,
    SummaryStats,
};
use serde::{Deserialize, Serialize};

/// Knobs for the whole batch pipeline. Defaults match each stage's own.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    /// Centered moving-average width, samples.
    pub filter_window: usize,
    pub peaks: PeakDetectionConfig,
    pub coherence: CoherenceConfig,
    /// |z| above which a raw reading is an artifact.
    pub artifact_z: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            filter_window: 15,
            peaks: PeakDetectionConfig::default(),
            coherence: CoherenceConfig::default(),
            artifact_z: 3.0,
        }
    }
}

/// Everything the pipeline derives from one recording. Computed in a single
/// forward pass; plain data for external reporting or visualization tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub sample_count: usize,
    pub stats: Option<SummaryStats>,
    pub filtered: Vec<FilteredSample>,
    pub peaks: Vec<Peak>,
    pub rr: Vec<RrInterval>,
    pub bpm: Vec<BpmPoint>,
    pub coherence: Vec<CoherenceWindow>,
    pub artifacts: Vec<Artifact>,
}

/// Run filtering, beat detection, rate estimation, coherence scoring, and
/// artifact flagging over a cleaned recording.
///
/// Each stage degrades to an empty section on degenerate input (no beats,
/// short recording) rather than failing the run.
pub fn analyze(recording: &Recording, cfg: &AnalysisConfig) -> Analysis {
    let stats = recording.stats();
    let filtered = filter::moving_average(recording, cfg.filter_window);
    let filled = filter::fill_missing(&filtered);
    let peaks = detect_beats(recording, &filled, &cfg.peaks);
    let rr = rr_intervals(&peaks);
    let bpm = bpm_series(&rr);
    let coherence = coherence_windows(recording, &filtered, &cfg.coherence);
    let artifacts = detect_artifacts(recording, cfg.artifact_z);
    log::info!(
        "analyzed {} samples: {} beats, {} coherent windows, {} artifacts",
        recording.len(),
        peaks.len(),
        coherence.len(),
        artifacts.len()
    );
    Analysis {
        sample_count: recording.len(),
        stats,
        filtered,
        peaks,
        rr,
        bpm,
        coherence,
        artifacts,
    }
}
