use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::lens::ingest::Entry;

/// Inclusive calendar-day window in the configured timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn lower_bound(&self, tz: Tz) -> DateTime<Utc> {
        day_start(self.start, tz)
    }

    /// First instant after the end day.
    pub fn upper_bound(&self, tz: Tz) -> DateTime<Utc> {
        match self.end.checked_add_days(Days::new(1)) {
            Some(next) => day_start(next, tz),
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, entry: &Entry, tz: Tz) -> bool {
        entry.begin >= self.lower_bound(tz) && entry.end <= self.upper_bound(tz)
    }
}

fn day_start(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST jump; fall back to the UTC reading.
        None => Utc.from_utc_datetime(&midnight),
    }
}

/// Bounds of the date pickers: first `begin` day through last `end` day.
pub fn default_range(entries: &[Entry], tz: Tz) -> Option<DateRange> {
    let first = entries.iter().map(|e| e.begin).min()?;
    let last = entries.iter().map(|e| e.end).max()?;
    Some(DateRange::new(
        first.with_timezone(&tz).date_naive(),
        last.with_timezone(&tz).date_naive(),
    ))
}

/// Keep entries lying fully inside the range; partial overlaps are dropped, not clipped.
pub fn filter_entries(entries: &[Entry], range: &DateRange, tz: Tz) -> Vec<Entry> {
    let kept = entries
        .iter()
        .filter(|e| range.contains(e, tz))
        .cloned()
        .collect::<Vec<_>>();
    log::debug!(
        "range {}..={} kept {} of {} entries",
        range.start,
        range.end,
        kept.len(),
        entries.len()
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::{DateRange, default_range, filter_entries};
    use crate::lens::ingest::Entry;
    use chrono::{NaiveDate, TimeZone, Utc};
    use chrono_tz::Tz;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("date")
    }

    fn entry(begin_day: u32, end_day: u32, label: &str) -> Entry {
        let begin = Utc.with_ymd_and_hms(2024, 1, begin_day, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, end_day, 10, 0, 0).unwrap();
        Entry {
            begin,
            end,
            label: Some(label.to_string()),
            duration_hours: (end - begin).num_seconds() as f64 / 3600.0,
            date: begin.format("%Y-%m-%d").to_string(),
        }
    }

    #[test]
    fn partially_overlapping_entries_are_excluded() {
        let entries = vec![entry(1, 3, "first"), entry(2, 5, "second")];
        let kept = filter_entries(&entries, &DateRange::new(day(1), day(4)), Tz::UTC);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label.as_deref(), Some("first"));
    }

    #[test]
    fn end_day_is_inclusive() {
        let entries = vec![entry(4, 4, "same day")];
        let kept = filter_entries(&entries, &DateRange::new(day(4), day(4)), Tz::UTC);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn inverted_range_keeps_nothing() {
        let entries = vec![entry(2, 2, "x")];
        let kept = filter_entries(&entries, &DateRange::new(day(5), day(1)), Tz::UTC);
        assert!(kept.is_empty());
    }

    #[test]
    fn default_range_spans_all_entries_and_keeps_them() {
        let entries = vec![entry(3, 3, "a"), entry(1, 2, "b"), entry(6, 7, "c")];
        let range = default_range(&entries, Tz::UTC).expect("range");
        assert_eq!(range, DateRange::new(day(1), day(7)));
        assert_eq!(filter_entries(&entries, &range, Tz::UTC).len(), 3);
        assert!(entries.iter().all(|e| range.contains(e, Tz::UTC)));
        assert!(default_range(&[], Tz::UTC).is_none());
    }
}
