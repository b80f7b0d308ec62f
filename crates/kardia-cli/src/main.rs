use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use kardia_lib::{
    detectors::ppg::{detect_beats, find_peaks, PeakDetectionConfig, DEFAULT_MIN_PROMINENCE},
    filter,
    io::history::{self, ParsedSamples, WindowRecord},
    metrics::{
        artifact::detect_artifacts,
        coherence::{coherence_windows, CoherenceConfig},
        rate::{bpm_series, rr_intervals},
    },
    pipeline::{analyze, Analysis, AnalysisConfig},
    signal::BpmPoint,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "kardia",
    version,
    about = "Kardia: batch cardiac metrics from PPG recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a timestamp;ppg history
    Analyze {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 15)]
        filter_window: usize,
        #[arg(long, default_value_t = 0.5)]
        min_rr_s: f64,
        #[arg(long)]
        min_prominence: Option<f64>,
        #[arg(long, default_value_t = 60.0)]
        coherence_window_s: f64,
        #[arg(long, default_value_t = 0.04)]
        band_low_hz: f64,
        #[arg(long, default_value_t = 0.26)]
        band_high_hz: f64,
        #[arg(long, default_value_t = 0.7)]
        coherence_threshold: f64,
        #[arg(long, default_value_t = 3.0)]
        artifact_z: f64,
    },
    /// Summary statistics of the cleaned raw series
    Stats {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Detect heartbeat peaks on the smoothed signal
    FindPeaks {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 15)]
        filter_window: usize,
        #[arg(long, default_value_t = 0.5)]
        min_rr_s: f64,
        #[arg(long)]
        min_prominence: Option<f64>,
    },
    /// RR intervals and the BPM series from detected peaks
    Bpm {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 15)]
        filter_window: usize,
        #[arg(long, default_value_t = 0.5)]
        min_rr_s: f64,
        #[arg(long)]
        min_prominence: Option<f64>,
    },
    /// Spectrally coherent windows of the smoothed signal
    Coherence {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 15)]
        filter_window: usize,
        #[arg(long, default_value_t = 60.0)]
        window_s: f64,
        #[arg(long, default_value_t = 0.04)]
        band_low_hz: f64,
        #[arg(long, default_value_t = 0.26)]
        band_high_hz: f64,
        #[arg(long, default_value_t = 0.7)]
        threshold: f64,
    },
    /// Statistically anomalous raw readings
    Artifacts {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 3.0)]
        artifact_z: f64,
    },
    /// Peak detection inside one window of a timestamp;bpm;ppg,... history
    WindowPeaks {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = 0)]
        index: usize,
        #[arg(long, default_value_t = 10)]
        min_distance: usize,
        #[arg(long, default_value_t = DEFAULT_MIN_PROMINENCE)]
        min_prominence: f64,
    },
    /// The device's precomputed per-window heart-rate series
    WindowBpm {
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Analyze {
            input,
            filter_window,
            min_rr_s,
            min_prominence,
            coherence_window_s,
            band_low_hz,
            band_high_hz,
            coherence_threshold,
            artifact_z,
        } => {
            let cfg = AnalysisConfig {
                filter_window,
                peaks: PeakDetectionConfig {
                    min_rr_s,
                    min_prominence,
                },
                coherence: CoherenceConfig {
                    window_s: coherence_window_s,
                    band_hz: (band_low_hz, band_high_hz),
                    threshold: coherence_threshold,
                    ..CoherenceConfig::default()
                },
                artifact_z,
            };
            cmd_analyze(input.as_deref(), &cfg)?
        }
        Commands::Stats { input } => cmd_stats(input.as_deref())?,
        Commands::FindPeaks {
            input,
            filter_window,
            min_rr_s,
            min_prominence,
        } => cmd_find_peaks(input.as_deref(), filter_window, min_rr_s, min_prominence)?,
        Commands::Bpm {
            input,
            filter_window,
            min_rr_s,
            min_prominence,
        } => cmd_bpm(input.as_deref(), filter_window, min_rr_s, min_prominence)?,
        Commands::Coherence {
            input,
            filter_window,
            window_s,
            band_low_hz,
            band_high_hz,
            threshold,
        } => {
            let cfg = CoherenceConfig {
                window_s,
                band_hz: (band_low_hz, band_high_hz),
                threshold,
                ..CoherenceConfig::default()
            };
            cmd_coherence(input.as_deref(), filter_window, &cfg)?
        }
        Commands::Artifacts { input, artifact_z } => {
            cmd_artifacts(input.as_deref(), artifact_z)?
        }
        Commands::WindowPeaks {
            input,
            index,
            min_distance,
            min_prominence,
        } => cmd_window_peaks(input.as_deref(), index, min_distance, min_prominence)?,
        Commands::WindowBpm { input } => cmd_window_bpm(input.as_deref())?,
    }
    Ok(())
}

fn read_sample_history(input: Option<&Path>) -> Result<ParsedSamples> {
    match input {
        Some(path) => history::read_sample_history(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            Ok(history::parse_sample_history(&buf))
        }
    }
}

fn read_window_history(input: Option<&Path>) -> Result<Vec<WindowRecord>> {
    let parsed = match input {
        Some(path) => history::read_window_history(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            history::parse_window_history(&buf)
        }
    };
    Ok(parsed.windows)
}

#[derive(Serialize)]
struct AnalyzeReport {
    skipped_rows: usize,
    #[serde(flatten)]
    analysis: Analysis,
}

fn cmd_analyze(input: Option<&Path>, cfg: &AnalysisConfig) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let report = AnalyzeReport {
        skipped_rows: parsed.skipped.len(),
        analysis: analyze(&parsed.recording, cfg),
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_stats(input: Option<&Path>) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let stats = parsed
        .recording
        .stats()
        .ok_or_else(|| anyhow!("recording is empty after cleaning"))?;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

fn smoothed_beats(
    parsed: &ParsedSamples,
    filter_window: usize,
    min_rr_s: f64,
    min_prominence: Option<f64>,
) -> Vec<kardia_lib::Peak> {
    let filtered = filter::moving_average(&parsed.recording, filter_window);
    let filled = filter::fill_missing(&filtered);
    let cfg = PeakDetectionConfig {
        min_rr_s,
        min_prominence,
    };
    detect_beats(&parsed.recording, &filled, &cfg)
}

fn cmd_find_peaks(
    input: Option<&Path>,
    filter_window: usize,
    min_rr_s: f64,
    min_prominence: Option<f64>,
) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let peaks = smoothed_beats(&parsed, filter_window, min_rr_s, min_prominence);
    println!("{}", serde_json::to_string(&peaks)?);
    Ok(())
}

#[derive(Serialize)]
struct BpmReport {
    rr: Vec<kardia_lib::RrInterval>,
    bpm: Vec<BpmPoint>,
}

fn cmd_bpm(
    input: Option<&Path>,
    filter_window: usize,
    min_rr_s: f64,
    min_prominence: Option<f64>,
) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let peaks = smoothed_beats(&parsed, filter_window, min_rr_s, min_prominence);
    let rr = rr_intervals(&peaks);
    let bpm = bpm_series(&rr);
    println!("{}", serde_json::to_string(&BpmReport { rr, bpm })?);
    Ok(())
}

fn cmd_coherence(input: Option<&Path>, filter_window: usize, cfg: &CoherenceConfig) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let filtered = filter::moving_average(&parsed.recording, filter_window);
    let windows = coherence_windows(&parsed.recording, &filtered, cfg);
    println!("{}", serde_json::to_string(&windows)?);
    Ok(())
}

fn cmd_artifacts(input: Option<&Path>, artifact_z: f64) -> Result<()> {
    let parsed = read_sample_history(input)?;
    let artifacts = detect_artifacts(&parsed.recording, artifact_z);
    println!("{}", serde_json::to_string(&artifacts)?);
    Ok(())
}

#[derive(Serialize)]
struct WindowPeaksReport {
    timestamp: chrono::NaiveDateTime,
    bpm: f64,
    indices: Vec<usize>,
    values: Vec<f64>,
}

fn cmd_window_peaks(
    input: Option<&Path>,
    index: usize,
    min_distance: usize,
    min_prominence: f64,
) -> Result<()> {
    let windows = read_window_history(input)?;
    let window = windows
        .get(index)
        .ok_or_else(|| anyhow!("window {} out of range ({} windows)", index, windows.len()))?;
    let indices = find_peaks(&window.samples, min_distance, Some(min_prominence));
    let values = indices.iter().map(|&i| window.samples[i]).collect();
    let report = WindowPeaksReport {
        timestamp: window.timestamp,
        bpm: window.bpm,
        indices,
        values,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn cmd_window_bpm(input: Option<&Path>) -> Result<()> {
    let windows = read_window_history(input)?;
    let series: Vec<BpmPoint> = windows
        .iter()
        .map(|w| BpmPoint {
            timestamp: w.timestamp,
            bpm: w.bpm,
        })
        .collect();
    println!("{}", serde_json::to_string(&series)?);
    Ok(())
}
