use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::commands::{CommandReport, open_session, resolve_range};
use crate::lens::session::ViewRequest;

#[derive(Debug, Clone)]
pub struct ProposeOptions {
    pub file: PathBuf,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub topics: Option<usize>,
}

/// Print proposed categories one per line, ready to edit and pass back with
/// `report --categories-file`.
pub fn run(opts: &ProposeOptions) -> Result<CommandReport> {
    let mut session = open_session(&opts.file, true)?;
    let mut report = CommandReport::new("propose");

    let request = ViewRequest {
        range: resolve_range(opts.start, opts.end, session.bounds()),
        topic_count: opts.topics,
        category_text: None,
    };
    match session.propose(&request) {
        Ok(categories) => {
            for category in categories {
                report.detail(category);
            }
        }
        Err(err) => report.issue(format!("{err:#}")),
    }
    Ok(report)
}
