use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_session, read_category_file, resolve_range};
use crate::lens::render::render_text;
use crate::lens::session::{TopicView, ViewRequest};

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub file: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub topics: Option<usize>,
    pub categories_file: Option<PathBuf>,
    pub no_classify: bool,
    pub json: bool,
    pub out: Option<PathBuf>,
}

pub fn run(opts: &ReportOptions) -> Result<CommandReport> {
    let mut session = open_session(&opts.file, !opts.no_classify)?;
    let mut report = CommandReport::new("report");

    let category_text = match &opts.categories_file {
        Some(path) => Some(read_category_file(path)?),
        None => None,
    };
    let request = ViewRequest {
        range: resolve_range(opts.start, opts.end, session.bounds()),
        topic_count: opts.topics,
        category_text,
    };
    let lens = session.run(&request)?;

    if let Some(out) = &opts.out {
        let data = serde_json::to_string_pretty(&lens)?;
        fs::write(out, format!("{data}\n"))
            .with_context(|| format!("failed to write {}", out.display()))?;
        report.detail(format!("chart_data_path={}", out.display()));
    }

    if let TopicView::Ready(topics) = &lens.topics
        && !topics.fallback.is_empty()
    {
        report.detail(format!(
            "mapping.fallback_labels={}",
            topics.fallback.len()
        ));
    }

    if opts.json {
        report.payload = Some(serde_json::to_value(&lens)?);
    } else {
        let tz = session.config().timezone()?;
        for line in render_text(&lens, tz).lines() {
            report.detail(line);
        }
    }
    Ok(report)
}
