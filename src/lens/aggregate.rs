use serde::Serialize;
use std::collections::BTreeMap;

use crate::lens::classify::CategoryAssignment;
use crate::lens::ingest::Entry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Total {
    pub name: String,
    pub hours: f64,
}

/// Hours per (category, label, date), the bar chart's unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownRow {
    pub category: String,
    pub label: String,
    pub date: String,
    pub hours: f64,
}

fn sorted_desc(sums: BTreeMap<String, f64>) -> Vec<Total> {
    let mut totals = sums
        .into_iter()
        .map(|(name, hours)| Total { name, hours })
        .collect::<Vec<_>>();
    // Stable sort keeps ties in name order.
    totals.sort_by(|a, b| b.hours.total_cmp(&a.hours));
    totals
}

pub fn total_duration(entries: &[Entry]) -> f64 {
    entries.iter().map(|e| e.duration_hours).sum()
}

pub fn label_totals(entries: &[Entry], other_label: &str) -> Vec<Total> {
    let mut sums = BTreeMap::<String, f64>::new();
    for entry in entries {
        *sums.entry(entry.label_or(other_label).to_string()).or_insert(0.0) += entry.duration_hours;
    }
    sorted_desc(sums)
}

pub fn breakdown(
    entries: &[Entry],
    assignment: &CategoryAssignment,
    other_label: &str,
    fallback: &str,
) -> Vec<BreakdownRow> {
    let mut sums = BTreeMap::<(String, String, String), f64>::new();
    for entry in entries {
        let label = entry.label_or(other_label);
        let category = assignment.category_of(label, fallback);
        *sums
            .entry((category.to_string(), label.to_string(), entry.date.clone()))
            .or_insert(0.0) += entry.duration_hours;
    }
    sums.into_iter()
        .map(|((category, label, date), hours)| BreakdownRow {
            category,
            label,
            date,
            hours,
        })
        .collect()
}

pub fn category_totals(rows: &[BreakdownRow]) -> Vec<Total> {
    let mut sums = BTreeMap::<String, f64>::new();
    for row in rows {
        *sums.entry(row.category.clone()).or_insert(0.0) += row.hours;
    }
    sorted_desc(sums)
}

pub fn sum_totals(totals: &[Total]) -> f64 {
    totals.iter().map(|t| t.hours).sum()
}

#[cfg(test)]
mod tests {
    use super::{breakdown, category_totals, label_totals, sum_totals, total_duration};
    use crate::lens::classify::CategoryAssignment;
    use crate::lens::ingest::Entry;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn entry(label: Option<&str>, hours: f64, date: &str) -> Entry {
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
        Entry {
            begin: at,
            end: at,
            label: label.map(str::to_string),
            duration_hours: hours,
            date: date.to_string(),
        }
    }

    fn assignment(pairs: &[(&str, &str)]) -> CategoryAssignment {
        CategoryAssignment {
            mapping: pairs
                .iter()
                .map(|(l, c)| (l.to_string(), c.to_string()))
                .collect::<BTreeMap<_, _>>(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn totals_conserve_duration() {
        let entries = vec![entry(Some("A"), 2.0, "2024-02-01"), entry(Some("B"), 3.0, "2024-02-01")];
        let rows = breakdown(&entries, &assignment(&[("A", "X"), ("B", "Y")]), "other", "none");
        let by_category = category_totals(&rows);
        let by_label = label_totals(&entries, "other");
        assert!((sum_totals(&by_category) - 5.0).abs() < 1e-9);
        assert!((sum_totals(&by_label) - total_duration(&entries)).abs() < 1e-9);
        assert_eq!(by_category[0].name, "Y");
    }

    #[test]
    fn breakdown_groups_by_category_label_and_date() {
        let entries = vec![
            entry(Some("A"), 1.0, "2024-02-01"),
            entry(Some("A"), 0.5, "2024-02-01"),
            entry(Some("A"), 2.0, "2024-02-02"),
            entry(None, 1.25, "2024-02-02"),
        ];
        let rows = breakdown(&entries, &assignment(&[("A", "X")]), "other", "unclassified");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].category, "X");
        assert!((rows[0].hours - 1.5).abs() < 1e-9);
        assert_eq!(rows[2].category, "unclassified");
        assert_eq!(rows[2].label, "other");
    }

    #[test]
    fn label_totals_sort_descending_with_name_ties() {
        let entries = vec![
            entry(Some("b"), 1.0, "d"),
            entry(Some("a"), 1.0, "d"),
            entry(Some("c"), 4.0, "d"),
        ];
        let names = label_totals(&entries, "other")
            .into_iter()
            .map(|t| t.name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
