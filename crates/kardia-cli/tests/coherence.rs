use assert_cmd::cargo::cargo_bin_cmd;
use chrono::NaiveDate;
use kardia_lib::CoherenceWindow;
use std::error::Error;
use std::f64::consts::PI;
use std::io::Write;

/// 130 s of a pure tone sampled at 1 Hz, as a timestamp;ppg history.
fn tone_history(freq_hz: f64) -> String {
    let base = NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let mut out = String::from("timestamp;ppg\n");
    for i in 0..130i64 {
        let t = base + chrono::Duration::seconds(i);
        let v = 512.0 + 80.0 * (2.0 * PI * freq_hz * i as f64).sin();
        out.push_str(&format!("{};{:.4}\n", t.format("%Y-%m-%d %H:%M:%S"), v));
    }
    out
}

fn run_coherence(history: &str) -> Result<Vec<CoherenceWindow>, Box<dyn Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    file.write_all(history.as_bytes())?;
    let mut cmd = cargo_bin_cmd!("kardia");
    cmd.args([
        "coherence",
        "--input",
        file.path().to_str().expect("utf8 path"),
        "--filter-window",
        "1",
    ]);
    let out = cmd.assert().success().get_output().stdout.clone();
    Ok(serde_json::from_slice(&out)?)
}

#[test]
fn breathing_band_tone_marks_both_windows() -> Result<(), Box<dyn Error>> {
    let windows = run_coherence(&tone_history(0.1))?;
    assert_eq!(windows.len(), 2);
    for w in &windows {
        assert!(w.ratio > 0.7 && w.ratio <= 1.0, "ratio {}", w.ratio);
        assert!(w.start < w.end);
    }
    assert!(windows[0].end < windows[1].start);
    Ok(())
}

#[test]
fn wideband_tone_marks_nothing() -> Result<(), Box<dyn Error>> {
    let windows = run_coherence(&tone_history(0.4))?;
    assert!(windows.is_empty());
    Ok(())
}
