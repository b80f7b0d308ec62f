use crate::signal::{seconds_between, BpmPoint, Peak, RrInterval};

/// Inter-beat intervals from consecutive peak pairs.
///
/// Fewer than two peaks is a valid, uninformative recording and yields an
/// empty series.
pub fn rr_intervals(peaks: &[Peak]) -> Vec<RrInterval> {
    peaks
        .windows(2)
        .filter_map(|pair| {
            let seconds = seconds_between(pair[0].timestamp, pair[1].timestamp);
            (seconds > 0.0).then_some(RrInterval {
                from: pair[0].timestamp,
                to: pair[1].timestamp,
                seconds,
            })
        })
        .collect()
}

/// Instantaneous heart rate per RR interval, stamped at the later beat.
pub fn bpm_series(intervals: &[RrInterval]) -> Vec<BpmPoint> {
    intervals
        .iter()
        .map(|rr| BpmPoint {
            timestamp: rr.to,
            bpm: 60.0 / rr.seconds,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn peak_at(secs: i64) -> Peak {
        Peak {
            index: secs as usize,
            timestamp: ts(secs),
            value: 1.0,
        }
    }

    fn ts(secs: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    #[test]
    fn one_second_beats_give_sixty_bpm() {
        let peaks = [peak_at(0), peak_at(1), peak_at(2)];
        let rr = rr_intervals(&peaks);
        assert_eq!(rr.len(), 2);
        assert!((rr[0].seconds - 1.0).abs() < 1e-12);
        assert!((rr[1].seconds - 1.0).abs() < 1e-12);
        let bpm = bpm_series(&rr);
        assert_eq!(bpm.len(), 2);
        assert!((bpm[0].bpm - 60.0).abs() < 1e-12);
        assert!((bpm[1].bpm - 60.0).abs() < 1e-12);
        assert_eq!(bpm[0].timestamp, ts(1));
        assert_eq!(bpm[1].timestamp, ts(2));
    }

    #[test]
    fn bpm_is_exactly_sixty_over_seconds() {
        let peaks = [peak_at(0), peak_at(2)];
        let rr = rr_intervals(&peaks);
        let bpm = bpm_series(&rr);
        assert_eq!(bpm[0].bpm, 60.0 / rr[0].seconds);
    }

    #[test]
    fn fewer_than_two_peaks_is_empty_not_an_error() {
        assert!(rr_intervals(&[]).is_empty());
        assert!(rr_intervals(&[peak_at(0)]).is_empty());
    }
}
