use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{LensError, WarnCode};
use crate::lens::aggregate::{self, BreakdownRow, Total};
use crate::lens::classify::{
    CacheStats, MappingWarning, TopicClassifier, distinct_labels, parse_category_text,
};
use crate::lens::config::LensConfig;
use crate::lens::cumulative::{self, CumulativePoint};
use crate::lens::filter::{DateRange, default_range, filter_entries};
use crate::lens::ingest::{Entry, Export};
use crate::lens::warn;
use crate::oracle::ClassificationOracle;

const TOLERANCE_HOURS: f64 = 1e-6;

#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    pub range: Option<DateRange>,
    pub topic_count: Option<usize>,
    /// User-edited category list, one name per line. Replaces the proposal.
    pub category_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicBreakdown {
    pub proposed: Vec<String>,
    pub categories: Vec<String>,
    pub mapping: BTreeMap<String, String>,
    pub fallback: Vec<MappingWarning>,
    pub rows: Vec<BreakdownRow>,
    pub category_totals: Vec<Total>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TopicView {
    /// Classification is switched off for the whole session.
    Disabled { reason: String },
    /// Classification failed or had nothing to work on for this request.
    Unavailable {
        reason: String,
        proposed: Vec<String>,
    },
    Ready(TopicBreakdown),
}

#[derive(Debug, Clone, Serialize)]
pub struct LensReport {
    pub bounds: Option<DateRange>,
    pub range: Option<DateRange>,
    pub entry_count: usize,
    /// Rows left out at ingest for lacking a begin or end time.
    pub skipped_rows: usize,
    pub total_hours: f64,
    pub cumulative: Vec<CumulativePoint>,
    pub label_totals: Vec<Total>,
    pub topics: TopicView,
    pub cache: Option<CacheStats>,
}

/// One user's view over one export. Ingested entries stay fixed; every request
/// re-derives the filtered set and both downstream views from them.
pub struct Session<O: ClassificationOracle> {
    config: LensConfig,
    tz: Tz,
    entries: Vec<Entry>,
    skipped_rows: usize,
    bounds: Option<DateRange>,
    classifier: Result<TopicClassifier<O>, String>,
}

impl<O: ClassificationOracle> Session<O> {
    pub fn new(
        config: LensConfig,
        export: impl Into<Export>,
        classifier: Result<TopicClassifier<O>, LensError>,
    ) -> Result<Self> {
        let Export {
            entries,
            skipped_lines,
        } = export.into();
        let tz = config.timezone()?;
        let bounds = default_range(&entries, tz);
        let classifier = classifier
            .inspect(|c| log::info!("topics classified via {}", c.oracle().describe()))
            .map_err(|err| {
                log::info!("{err}");
                match err {
                    LensError::CredentialMissing(reason) => reason,
                    other => other.to_string(),
                }
            });
        Ok(Self {
            config,
            tz,
            entries,
            skipped_rows: skipped_lines.len(),
            bounds,
            classifier,
        })
    }

    pub fn bounds(&self) -> Option<DateRange> {
        self.bounds
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    pub fn classification_enabled(&self) -> bool {
        self.classifier.is_ok()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.classifier.as_ref().ok().map(TopicClassifier::stats)
    }

    fn filtered(&self, request: &ViewRequest) -> (Option<DateRange>, Vec<Entry>) {
        let range = request.range.or(self.bounds);
        let filtered = match &range {
            Some(range) => filter_entries(&self.entries, range, self.tz),
            None => Vec::new(),
        };
        (range, filtered)
    }

    /// Only the proposal step, for printing an editable category list.
    pub fn propose(&mut self, request: &ViewRequest) -> Result<Vec<String>> {
        let count = self.config.check_topic_count(
            request
                .topic_count
                .unwrap_or(self.config.topics.default_count),
        )?;
        let (_, filtered) = self.filtered(request);
        let labels = distinct_labels(&filtered, &self.config.topics.other_label);
        let classifier = match &mut self.classifier {
            Ok(classifier) => classifier,
            Err(reason) => return Err(anyhow!("topic classification disabled: {reason}")),
        };
        if labels.is_empty() {
            return Err(anyhow!("no entries in the selected range"));
        }
        classifier.propose_categories(&labels, count)
    }

    pub fn run(&mut self, request: &ViewRequest) -> Result<LensReport> {
        let count = self.config.check_topic_count(
            request
                .topic_count
                .unwrap_or(self.config.topics.default_count),
        )?;

        let (range, filtered) = self.filtered(request);

        let topics_cfg = &self.config.topics;
        let series = cumulative::build_series(&filtered, &topics_cfg.missing_topic);
        let label_totals = aggregate::label_totals(&filtered, &topics_cfg.other_label);
        let total_hours = aggregate::total_duration(&filtered);
        debug_assert!((aggregate::sum_totals(&label_totals) - total_hours).abs() < TOLERANCE_HOURS);

        let topics = self.topic_view(&filtered, count, request.category_text.as_deref());
        if let TopicView::Ready(breakdown) = &topics {
            debug_assert!(
                (aggregate::sum_totals(&breakdown.category_totals) - total_hours).abs()
                    < TOLERANCE_HOURS
            );
        }

        Ok(LensReport {
            bounds: self.bounds,
            range,
            entry_count: filtered.len(),
            skipped_rows: self.skipped_rows,
            total_hours,
            cumulative: series,
            label_totals,
            topics,
            cache: self.cache_stats(),
        })
    }

    fn topic_view(
        &mut self,
        filtered: &[Entry],
        count: usize,
        category_text: Option<&str>,
    ) -> TopicView {
        let other_label = self.config.topics.other_label.clone();
        let classifier = match &mut self.classifier {
            Ok(classifier) => classifier,
            Err(reason) => {
                return TopicView::Disabled {
                    reason: reason.clone(),
                };
            }
        };

        if filtered.is_empty() {
            return TopicView::Unavailable {
                reason: "no entries in the selected range".to_string(),
                proposed: Vec::new(),
            };
        }

        let labels = distinct_labels(filtered, &other_label);
        let proposed = match classifier.propose_categories(&labels, count) {
            Ok(proposed) => proposed,
            Err(err) => return oracle_unavailable("propose", &err, Vec::new()),
        };

        let categories = match category_text {
            Some(text) => parse_category_text(text),
            None => proposed.clone(),
        };
        if categories.is_empty() {
            return TopicView::Unavailable {
                reason: "category list is empty; enter one category per line".to_string(),
                proposed,
            };
        }

        let assignment = match classifier.map_labels_to_categories(&categories, &labels) {
            Ok(assignment) => assignment,
            Err(err) => return oracle_unavailable("map", &err, proposed),
        };

        let rows = aggregate::breakdown(
            filtered,
            &assignment,
            &other_label,
            classifier.fallback_category(),
        );
        let category_totals = aggregate::category_totals(&rows);
        TopicView::Ready(TopicBreakdown {
            proposed,
            categories,
            mapping: assignment.mapping,
            fallback: assignment.warnings,
            rows,
            category_totals,
        })
    }
}

fn oracle_unavailable(stage: &str, err: &anyhow::Error, proposed: Vec<String>) -> TopicView {
    let reason = format!("{err:#}");
    warn::emit(WarnCode::OracleFailed, stage, "disable_topics", "oracle call failed", &reason);
    TopicView::Unavailable { reason, proposed }
}

#[cfg(test)]
mod tests {
    use super::{Session, TopicView, ViewRequest};
    use crate::error::LensError;
    use crate::lens::classify::TopicClassifier;
    use crate::lens::config::LensConfig;
    use crate::lens::filter::DateRange;
    use crate::lens::ingest::{Entry, Export};
    use crate::oracle::ClassificationOracle;
    use anyhow::Result;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::cell::Cell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeOracle {
        calls: Cell<usize>,
        fail_mapping: bool,
    }

    impl ClassificationOracle for FakeOracle {
        fn propose(&self, _labels: &[String], count: usize) -> Result<Vec<String>> {
            self.calls.set(self.calls.get() + 1);
            Ok(["Build", "Talk", "Admin"]
                .iter()
                .take(count)
                .map(|s| s.to_string())
                .collect())
        }

        fn map_labels(
            &self,
            categories: &[String],
            labels: &[String],
        ) -> Result<BTreeMap<String, String>> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_mapping {
                return Err(LensError::oracle("status 503").into());
            }
            Ok(labels
                .iter()
                .map(|l| {
                    let category = if l.starts_with("code") {
                        categories[0].clone()
                    } else {
                        categories[categories.len() - 1].clone()
                    };
                    (l.clone(), category)
                })
                .collect())
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    fn entry(day: u32, hours: u32, label: Option<&str>) -> Entry {
        let begin = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, day, 9 + hours, 0, 0).unwrap();
        Entry {
            begin,
            end,
            label: label.map(str::to_string),
            duration_hours: hours as f64,
            date: format!("2024-05-{day:02}"),
        }
    }

    fn sample() -> Vec<Entry> {
        vec![
            entry(1, 2, Some("code review")),
            entry(2, 3, Some("standup")),
            entry(3, 1, None),
            entry(6, 4, Some("code parser")),
        ]
    }

    fn session(oracle: FakeOracle) -> Session<FakeOracle> {
        Session::new(
            LensConfig::default(),
            sample(),
            Ok(TopicClassifier::new(oracle, "unclassified")),
        )
        .expect("session")
    }

    #[test]
    fn default_request_covers_all_entries_and_conserves_hours() {
        let mut session = session(FakeOracle::default());
        let report = session.run(&ViewRequest::default()).expect("run");
        assert_eq!(report.entry_count, 4);
        assert!((report.total_hours - 10.0).abs() < 1e-9);
        let TopicView::Ready(topics) = &report.topics else {
            panic!("topics should be ready: {:?}", report.topics);
        };
        let category_sum: f64 = topics.category_totals.iter().map(|t| t.hours).sum();
        assert!((category_sum - 10.0).abs() < 1e-9);
        assert_eq!(topics.mapping.len(), 4);
        assert_eq!(topics.mapping["other"], "Admin");
    }

    #[test]
    fn repeated_requests_reuse_cached_oracle_answers() {
        let mut session = session(FakeOracle::default());
        session.run(&ViewRequest::default()).expect("run");
        session.run(&ViewRequest::default()).expect("run");
        let stats = session.cache_stats().expect("enabled");
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 2);
    }

    #[test]
    fn user_category_text_replaces_proposal() {
        let mut session = session(FakeOracle::default());
        let report = session
            .run(&ViewRequest {
                category_text: Some("Engineering\nEverything else\n".to_string()),
                ..ViewRequest::default()
            })
            .expect("run");
        let TopicView::Ready(topics) = report.topics else {
            panic!("topics should be ready");
        };
        assert_eq!(topics.proposed.len(), 3);
        assert_eq!(topics.categories, vec!["Engineering", "Everything else"]);
        assert_eq!(topics.mapping["code parser"], "Engineering");
    }

    #[test]
    fn missing_credential_disables_topics_but_keeps_cumulative_view() {
        let mut session: Session<FakeOracle> = Session::new(
            LensConfig::default(),
            sample(),
            Err(LensError::CredentialMissing("set GROQ_API_KEY".to_string())),
        )
        .expect("session");
        let report = session.run(&ViewRequest::default()).expect("run");
        assert_eq!(report.cumulative.len(), 8);
        assert!((report.cumulative[7].cumulative_hours - 10.0).abs() < 1e-9);
        match report.topics {
            TopicView::Disabled { reason } => assert!(reason.contains("GROQ_API_KEY")),
            other => panic!("unexpected topics view: {other:?}"),
        }
        assert!(report.cache.is_none());
    }

    #[test]
    fn opting_out_is_not_reported_as_a_credential_problem() {
        let mut session: Session<FakeOracle> =
            Session::new(LensConfig::default(), sample(), Err(LensError::ClassifyOptOut))
                .expect("session");
        let report = session.run(&ViewRequest::default()).expect("run");
        match report.topics {
            TopicView::Disabled { reason } => {
                assert_eq!(reason, "switched off with --no-classify");
                assert!(!reason.contains("API_KEY"));
            }
            other => panic!("unexpected topics view: {other:?}"),
        }
    }

    #[test]
    fn skipped_rows_are_carried_into_every_report() {
        let export = Export {
            entries: sample(),
            skipped_lines: vec![7, 9],
        };
        let mut session = Session::new(
            LensConfig::default(),
            export,
            Ok(TopicClassifier::new(FakeOracle::default(), "unclassified")),
        )
        .expect("session");
        let report = session.run(&ViewRequest::default()).expect("run");
        assert_eq!(report.skipped_rows, 2);
        assert_eq!(report.entry_count, 4);
    }

    #[test]
    fn oracle_failure_only_disables_topics() {
        let mut session = session(FakeOracle {
            fail_mapping: true,
            ..FakeOracle::default()
        });
        let report = session.run(&ViewRequest::default()).expect("run");
        assert_eq!(report.entry_count, 4);
        match report.topics {
            TopicView::Unavailable { reason, proposed } => {
                assert!(reason.contains("503"));
                assert_eq!(proposed.len(), 3);
            }
            other => panic!("unexpected topics view: {other:?}"),
        }
    }

    #[test]
    fn propose_alone_skips_the_mapping_call() {
        let mut session = session(FakeOracle::default());
        let proposed = session
            .propose(&ViewRequest {
                topic_count: Some(2),
                ..ViewRequest::default()
            })
            .expect("propose");
        assert_eq!(proposed, vec!["Build", "Talk"]);
        let stats = session.cache_stats().expect("enabled");
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn range_filter_and_topic_bounds_apply() {
        let mut session = session(FakeOracle::default());
        let day = |d| NaiveDate::from_ymd_opt(2024, 5, d).expect("date");
        let report = session
            .run(&ViewRequest {
                range: Some(DateRange::new(day(1), day(2))),
                ..ViewRequest::default()
            })
            .expect("run");
        assert_eq!(report.entry_count, 2);
        assert_eq!(report.label_totals[0].name, "standup");

        let err = session.run(&ViewRequest {
            topic_count: Some(12),
            ..ViewRequest::default()
        });
        assert!(err.is_err());
    }
}
