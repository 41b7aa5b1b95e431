pub mod explore;
pub mod propose;
pub mod report;
pub mod status;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{LensError, WarnCode};
use crate::lens::classify::TopicClassifier;
use crate::lens::config::{LensConfig, load_config};
use crate::lens::filter::DateRange;
use crate::lens::ingest::load_export;
use crate::lens::paths::resolve_paths;
use crate::lens::session::Session;
use crate::lens::warn;
use crate::oracle::{ClassificationOracle, build_oracle};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            payload: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn merge(&mut self, mut other: CommandReport) {
        self.ok &= other.ok;
        self.details.append(&mut other.details);
        self.issues.append(&mut other.issues);
    }
}

pub type LiveSession = Session<Box<dyn ClassificationOracle>>;

/// Load config and the export, and wire the oracle in unless `classify` is off
/// or no credential is configured.
pub fn open_session(file: &Path, classify: bool) -> Result<LiveSession> {
    let paths = resolve_paths()?;
    let config = load_config(&paths)?;
    let export = load_export(file, config.delimiter_byte(), config.timezone()?)?;

    let classifier = if classify {
        build_oracle(&config.oracle).map(|oracle| {
            TopicClassifier::new(oracle, config.topics.fallback_category.clone())
                .with_audit(paths.clone())
        })
    } else {
        Err(LensError::ClassifyOptOut)
    };

    let session = Session::new(config, export, classifier)?;
    if classify && !session.classification_enabled() {
        warn::emit(
            WarnCode::ClassifyDisabled,
            "open",
            "skip_topics",
            "no oracle credential",
            "",
        );
    }
    Ok(session)
}

/// Combine optional picker values with the export's own bounds.
pub fn resolve_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    bounds: Option<DateRange>,
) -> Option<DateRange> {
    match (start, end, bounds) {
        (None, None, _) => None,
        (Some(s), Some(e), _) => Some(DateRange::new(s, e)),
        (Some(s), None, Some(b)) => Some(DateRange::new(s, b.end)),
        (None, Some(e), Some(b)) => Some(DateRange::new(b.start, e)),
        (Some(s), None, None) => Some(DateRange::new(s, s)),
        (None, Some(e), None) => Some(DateRange::new(e, e)),
    }
}

pub fn read_category_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read categories from {}", path.display()))
}

pub fn config_summary(report: &mut CommandReport, config: &LensConfig) {
    report.detail(format!("delimiter={}", config.ingest.delimiter));
    report.detail(format!("timezone={}", config.ingest.timezone));
    report.detail(format!(
        "topics.count={} (min={}, max={})",
        config.topics.default_count, config.topics.min_count, config.topics.max_count
    ));
}
