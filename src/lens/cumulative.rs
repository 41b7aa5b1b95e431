use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lens::ingest::Entry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub timestamp: DateTime<Utc>,
    pub timestamp_epoch_secs: i64,
    pub cumulative_hours: f64,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    // Ends sort before begins at the same instant, so back-to-back entries step cleanly.
    End,
    Begin,
}

/// Step series of worked hours with one point per entry boundary.
///
/// All boundaries are visited in timestamp order. A `begin` point carries the
/// running total so far and an `end` point adds that entry's `end - begin`
/// span, so overlapping entries interleave and neither timestamps nor totals
/// ever decrease.
pub fn build_series(entries: &[Entry], missing_topic: &str) -> Vec<CumulativePoint> {
    let mut boundaries = Vec::with_capacity(entries.len() * 2);
    for (idx, entry) in entries.iter().enumerate() {
        boundaries.push((entry.begin, Boundary::Begin, idx));
        boundaries.push((entry.end, Boundary::End, idx));
    }
    boundaries.sort();

    let mut running = 0.0_f64;
    let mut points = Vec::with_capacity(boundaries.len());
    for (timestamp, boundary, idx) in boundaries {
        let entry = &entries[idx];
        if boundary == Boundary::End {
            running += entry.span_hours().max(0.0);
        }
        points.push(CumulativePoint {
            timestamp,
            timestamp_epoch_secs: timestamp.timestamp(),
            cumulative_hours: running,
            topic: entry.label_or(missing_topic).to_string(),
        });
    }
    points
}

pub fn total_hours(points: &[CumulativePoint]) -> f64 {
    points.last().map(|p| p.cumulative_hours).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::{build_series, total_hours};
    use crate::lens::ingest::Entry;
    use chrono::{TimeZone, Utc};

    fn entry(begin_hour: u32, end_hour: u32, label: Option<&str>) -> Entry {
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, begin_hour, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, end_hour, 0, 0).unwrap();
        Entry {
            begin,
            end,
            label: label.map(str::to_string),
            duration_hours: 99.0,
            date: "2024-03-01".to_string(),
        }
    }

    #[test]
    fn two_one_hour_entries_end_at_two_hours() {
        let points = build_series(&[entry(9, 10, Some("a")), entry(11, 12, Some("b"))], "—");
        assert_eq!(points.len(), 4);
        assert!((total_hours(&points) - 2.0).abs() < 1e-9);
        assert_eq!(points[0].cumulative_hours, 0.0);
        assert_eq!(points[2].cumulative_hours, 1.0);
    }

    #[test]
    fn series_is_sorted_and_non_decreasing_for_unordered_input() {
        let points = build_series(
            &[entry(14, 16, Some("late")), entry(8, 9, Some("early")), entry(10, 13, None)],
            "—",
        );
        for pair in points.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            assert!(pair[0].cumulative_hours <= pair[1].cumulative_hours);
        }
        assert_eq!(points[0].topic, "early");
        assert!((total_hours(&points) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_entries_interleave_in_time_order() {
        let points = build_series(&[entry(9, 12, Some("long")), entry(10, 11, Some("short"))], "—");
        let seen = points
            .iter()
            .map(|p| (p.timestamp.format("%H").to_string(), p.cumulative_hours, p.topic.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            seen,
            vec![
                ("09".to_string(), 0.0, "long"),
                ("10".to_string(), 0.0, "short"),
                ("11".to_string(), 1.0, "short"),
                ("12".to_string(), 4.0, "long"),
            ]
        );
        for pair in points.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
            assert!(pair[0].cumulative_hours <= pair[1].cumulative_hours);
        }
    }

    #[test]
    fn back_to_back_entries_close_before_the_next_opens() {
        let points = build_series(&[entry(10, 11, Some("b")), entry(9, 10, Some("a"))], "—");
        assert_eq!(points[1].topic, "a");
        assert_eq!(points[1].cumulative_hours, 1.0);
        assert_eq!(points[2].topic, "b");
        assert_eq!(points[2].cumulative_hours, 1.0);
        assert!((total_hours(&points) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_labels_use_visible_sentinel() {
        let points = build_series(&[entry(9, 10, None)], "—");
        assert!(points.iter().all(|p| p.topic == "—"));
    }

    #[test]
    fn empty_input_has_zero_total() {
        let points = build_series(&[], "—");
        assert!(points.is_empty());
        assert_eq!(total_hours(&points), 0.0);
    }
}
