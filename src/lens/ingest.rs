use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{LensError, WarnCode};
use crate::lens::warn;

pub const COL_BEGIN: &str = "unix_begin";
pub const COL_END: &str = "unix_end";
pub const COL_NOTES: &str = "notes";
pub const COL_DURATION: &str = "duration_decimal";
pub const COL_DATE: &str = "date";

const REQUIRED_COLUMNS: [&str; 3] = [COL_BEGIN, COL_END, COL_NOTES];

/// One tracked interval from the export.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: Option<String>,
    pub duration_hours: f64,
    pub date: String,
}

impl Entry {
    /// Hours between `begin` and `end`, independent of any supplied duration.
    pub fn span_hours(&self) -> f64 {
        (self.end - self.begin).num_milliseconds() as f64 / 3_600_000.0
    }

    pub fn label_or<'a>(&'a self, sentinel: &'a str) -> &'a str {
        self.label.as_deref().unwrap_or(sentinel)
    }
}

/// Parsed export. Rows without a begin or end time (a timer still running when
/// the export was taken) are left out and their line numbers kept.
#[derive(Debug, Clone, Default)]
pub struct Export {
    pub entries: Vec<Entry>,
    pub skipped_lines: Vec<u64>,
}

impl From<Vec<Entry>> for Export {
    fn from(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            skipped_lines: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnIndex {
    begin: usize,
    end: usize,
    notes: usize,
    duration: Option<usize>,
    date: Option<usize>,
}

fn locate_columns(headers: &StringRecord) -> Result<ColumnIndex, LensError> {
    let find = |name: &str| headers.iter().position(|h| h.trim() == name);

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|name| find(name).is_none())
        .map(|name| (*name).to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(LensError::Schema { missing });
    }

    Ok(ColumnIndex {
        begin: find(COL_BEGIN).unwrap_or_default(),
        end: find(COL_END).unwrap_or_default(),
        notes: find(COL_NOTES).unwrap_or_default(),
        duration: find(COL_DURATION),
        date: find(COL_DATE),
    })
}

fn cell<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_decimal(raw: &str, delimiter: u8) -> Option<f64> {
    let normalized = if delimiter != b',' {
        raw.replace(',', ".")
    } else {
        raw.to_string()
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_epoch(raw: &str, column: &str, line: u64) -> Result<DateTime<Utc>, LensError> {
    let invalid = |reason: String| LensError::InvalidRecord { line, reason };
    let secs = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(format!("`{column}` is not epoch seconds: `{raw}`")))?;
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
        .ok_or_else(|| invalid(format!("`{column}` out of range: `{raw}`")))
}

fn parse_record(
    record: &StringRecord,
    cols: ColumnIndex,
    delimiter: u8,
    tz: Tz,
) -> Result<Entry, LensError> {
    let line = record.position().map(|p| p.line()).unwrap_or(0);
    let begin = parse_epoch(cell(record, cols.begin), COL_BEGIN, line)?;
    let end = parse_epoch(cell(record, cols.end), COL_END, line)?;
    if end < begin {
        return Err(LensError::InvalidRecord {
            line,
            reason: format!("`{COL_END}` is before `{COL_BEGIN}`"),
        });
    }

    let notes = cell(record, cols.notes);
    let label = (!notes.is_empty()).then(|| notes.to_string());

    let derived = (end - begin).num_milliseconds() as f64 / 3_600_000.0;
    let duration_hours = match cols.duration.map(|idx| cell(record, idx)) {
        Some(raw) if !raw.is_empty() => {
            let value = parse_decimal(raw, delimiter).ok_or_else(|| LensError::InvalidRecord {
                line,
                reason: format!("`{COL_DURATION}` is not a number: `{raw}`"),
            })?;
            if value < 0.0 {
                return Err(LensError::InvalidRecord {
                    line,
                    reason: format!("`{COL_DURATION}` is negative: `{raw}`"),
                });
            }
            value
        }
        _ => derived,
    };

    let date = match cols.date.map(|idx| cell(record, idx)) {
        Some(raw) if !raw.is_empty() => raw.to_string(),
        _ => begin.with_timezone(&tz).format("%Y-%m-%d").to_string(),
    };

    Ok(Entry {
        begin,
        end,
        label,
        duration_hours,
        date,
    })
}

/// Parse a delimited export. A missing required column fails before any row is read;
/// an empty `unix_begin`/`unix_end` cell skips the row, any other bad cell fails.
pub fn parse_export<R: Read>(reader: R, delimiter: u8, tz: Tz) -> Result<Export> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers().context("failed to read export header")?.clone();
    let cols = locate_columns(&headers)?;

    let mut export = Export::default();
    for record in rdr.records() {
        let record = record.context("failed to read export row")?;
        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let open = [(cols.begin, COL_BEGIN), (cols.end, COL_END)]
            .into_iter()
            .find(|(idx, _)| cell(&record, *idx).is_empty());
        if let Some((_, column)) = open {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            warn::emit(
                WarnCode::RowSkipped,
                "ingest",
                "skip_row",
                &format!("line {line} has no {column}"),
                "",
            );
            export.skipped_lines.push(line);
            continue;
        }
        export.entries.push(parse_record(&record, cols, delimiter, tz)?);
    }
    log::debug!(
        "ingested {} entries, skipped {}",
        export.entries.len(),
        export.skipped_lines.len()
    );
    Ok(export)
}

pub fn load_export(path: &Path, delimiter: u8, tz: Tz) -> Result<Export> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_export(raw.as_slice(), delimiter, tz)
}
