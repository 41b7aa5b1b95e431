use std::collections::BTreeMap;
use std::fmt::Write;

use crate::lens::aggregate::Total;
use crate::lens::cumulative::{self, CumulativePoint};
use crate::lens::session::{LensReport, TopicView};
use crate::lens::util::truncate_with_ellipsis;
use chrono_tz::Tz;

const BAR_WIDTH: usize = 32;
const NAME_WIDTH: usize = 28;

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let cells = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(cells.clamp(1, BAR_WIDTH))
}

fn push_totals(out: &mut String, title: &str, totals: &[Total]) {
    let _ = writeln!(out, "\n#### {title}");
    if totals.is_empty() {
        out.push_str("(none)\n");
        return;
    }
    let max = totals.iter().map(|t| t.hours).fold(0.0, f64::max);
    for total in totals {
        let _ = writeln!(
            out,
            "{:<width$} {:>8.2}h {}",
            truncate_with_ellipsis(&total.name, NAME_WIDTH),
            total.hours,
            bar(total.hours, max),
            width = NAME_WIDTH
        );
    }
}

/// Cumulative total at the close of each local day that has a boundary point.
pub fn daily_cumulative(points: &[CumulativePoint], tz: Tz) -> Vec<(String, f64)> {
    let mut per_day = BTreeMap::<String, f64>::new();
    for point in points {
        let day = point.timestamp.with_timezone(&tz).format("%Y-%m-%d").to_string();
        let slot = per_day.entry(day).or_insert(0.0);
        *slot = slot.max(point.cumulative_hours);
    }
    per_day.into_iter().collect()
}

fn push_cumulative(out: &mut String, report: &LensReport, tz: Tz) {
    out.push_str("\n#### Cumulative Hours\n");
    let days = daily_cumulative(&report.cumulative, tz);
    if days.is_empty() {
        out.push_str("(no entries)\n");
        return;
    }
    let max = cumulative::total_hours(&report.cumulative);
    for (day, hours) in &days {
        let _ = writeln!(out, "{day} {hours:>8.2}h {}", bar(*hours, max));
    }
}

fn push_topics(out: &mut String, topics: &TopicView) {
    out.push_str("\n#### Topic Breakdown\n");
    match topics {
        TopicView::Disabled { reason } => {
            let _ = writeln!(out, "topics disabled: {reason}");
        }
        TopicView::Unavailable { reason, proposed } => {
            let _ = writeln!(out, "topics unavailable: {reason}");
            if !proposed.is_empty() {
                let _ = writeln!(out, "proposed categories: {}", proposed.join(" | "));
            }
        }
        TopicView::Ready(breakdown) => {
            let _ = writeln!(out, "categories: {}", breakdown.categories.join(" | "));
            if breakdown.categories != breakdown.proposed {
                let _ = writeln!(out, "proposed:   {}", breakdown.proposed.join(" | "));
            }
            for warning in &breakdown.fallback {
                let _ = writeln!(
                    out,
                    "fallback: `{}` (oracle answered {})",
                    warning.label,
                    warning.returned.as_deref().unwrap_or("nothing")
                );
            }

            let mut by_category = BTreeMap::<&str, BTreeMap<&str, f64>>::new();
            for row in &breakdown.rows {
                *by_category
                    .entry(row.category.as_str())
                    .or_default()
                    .entry(row.label.as_str())
                    .or_insert(0.0) += row.hours;
            }
            for total in &breakdown.category_totals {
                let _ = writeln!(out, "\n{} ({:.2}h)", total.name, total.hours);
                let Some(labels) = by_category.get(total.name.as_str()) else {
                    continue;
                };
                let mut labels = labels.iter().collect::<Vec<_>>();
                labels.sort_by(|a, b| b.1.total_cmp(a.1));
                for (label, hours) in labels {
                    let _ = writeln!(
                        out,
                        "  {:<width$} {:>8.2}h {}",
                        truncate_with_ellipsis(label, NAME_WIDTH),
                        hours,
                        bar(*hours, total.hours),
                        width = NAME_WIDTH
                    );
                }
            }
            push_totals(out, "Hours by Category", &breakdown.category_totals);
        }
    }
}

pub fn render_text(report: &LensReport, tz: Tz) -> String {
    let mut out = String::new();
    match &report.range {
        Some(range) => {
            let _ = writeln!(out, "Range: {} .. {}", range.start, range.end);
        }
        None => out.push_str("Range: (empty export)\n"),
    }
    let _ = writeln!(out, "Number of Entries: {}", report.entry_count);
    if report.skipped_rows > 0 {
        let _ = writeln!(
            out,
            "Skipped Rows: {} (no begin or end time)",
            report.skipped_rows
        );
    }
    let _ = writeln!(out, "Total Hours: {:.2}", report.total_hours);

    push_cumulative(&mut out, report, tz);
    push_totals(&mut out, "Hours by Label", &report.label_totals);
    push_topics(&mut out, &report.topics);

    if let Some(cache) = report.cache {
        let _ = writeln!(
            out,
            "\noracle cache: {} hit(s), {} call(s)",
            cache.hits, cache.misses
        );
    }
    out
}
