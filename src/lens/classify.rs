//! Two-step topic classification with memoization.
//!
//! Step one asks the oracle for a category vocabulary over the distinct labels;
//! step two asks it to place every label into one of the (possibly user-edited)
//! categories. Both results are cached under a digest of the serialized input,
//! so identical label sets, counts and category text never reach the oracle twice.
//! The mapping is reconciled locally: labels the oracle omits, or assigns to an
//! unknown category, land in the fallback category and are reported as warnings.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{LensError, WarnCode};
use crate::lens::audit;
use crate::lens::ingest::Entry;
use crate::lens::paths::LensPaths;
use crate::lens::warn;
use crate::oracle::ClassificationOracle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingWarning {
    pub label: String,
    /// Category the oracle answered with, `None` when the label was omitted.
    pub returned: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAssignment {
    pub mapping: BTreeMap<String, String>,
    pub warnings: Vec<MappingWarning>,
}

impl CategoryAssignment {
    pub fn category_of<'a>(&'a self, label: &str, fallback: &'a str) -> &'a str {
        self.mapping.get(label).map(String::as_str).unwrap_or(fallback)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// Distinct labels of `entries`, absent notes folded into `other_label`, sorted.
pub fn distinct_labels(entries: &[Entry], other_label: &str) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.label_or(other_label).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One category per line; blank lines and repeats are dropped.
pub fn parse_category_text(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

fn normalized_labels(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn cache_key<T: Serialize>(input: &T) -> Result<String> {
    let serialized = serde_json::to_vec(input)?;
    let digest = Sha256::digest(&serialized);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

fn resolve_category<'a>(returned: &str, categories: &'a [String]) -> Option<&'a String> {
    let wanted = returned.trim();
    categories
        .iter()
        .find(|c| c.as_str() == wanted)
        .or_else(|| categories.iter().find(|c| c.eq_ignore_ascii_case(wanted)))
}

fn lookup_label<'a>(raw: &'a BTreeMap<String, String>, label: &str) -> Option<&'a String> {
    raw.get(label).or_else(|| {
        let wanted = label.trim();
        raw.iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, v)| v)
    })
}

/// Make the oracle's answer total over `labels` and closed over `categories`.
pub fn reconcile_mapping(
    raw: &BTreeMap<String, String>,
    categories: &[String],
    labels: &[String],
    fallback: &str,
) -> CategoryAssignment {
    let mut mapping = BTreeMap::new();
    let mut warnings = Vec::new();

    for label in labels {
        let returned = lookup_label(raw, label);
        let category = match returned.and_then(|r| resolve_category(r, categories)) {
            Some(category) => category.clone(),
            None => {
                warnings.push(MappingWarning {
                    label: label.clone(),
                    returned: returned.cloned(),
                });
                fallback.to_string()
            }
        };
        mapping.insert(label.clone(), category);
    }

    CategoryAssignment {
        mapping,
        warnings,
    }
}

pub struct TopicClassifier<O: ClassificationOracle> {
    oracle: O,
    fallback_category: String,
    audit_paths: Option<LensPaths>,
    proposals: BTreeMap<String, Vec<String>>,
    assignments: BTreeMap<String, CategoryAssignment>,
    stats: CacheStats,
}

impl<O: ClassificationOracle> TopicClassifier<O> {
    pub fn new(oracle: O, fallback_category: impl Into<String>) -> Self {
        Self {
            oracle,
            fallback_category: fallback_category.into(),
            audit_paths: None,
            proposals: BTreeMap::new(),
            assignments: BTreeMap::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn with_audit(mut self, paths: LensPaths) -> Self {
        self.audit_paths = Some(paths);
        self
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn fallback_category(&self) -> &str {
        &self.fallback_category
    }

    fn audit(&self, phase: &str, status: &str, message: &str) {
        let Some(paths) = &self.audit_paths else {
            return;
        };
        if let Err(err) = audit::append_event(paths, phase, status, message) {
            warn::emit(
                WarnCode::AuditWriteFailed,
                phase,
                "skip",
                "audit log unwritable",
                &format!("{err:#}"),
            );
        }
    }

    /// Ask for `count` category names covering `labels`.
    pub fn propose_categories(&mut self, labels: &[String], count: usize) -> Result<Vec<String>> {
        let labels = normalized_labels(labels);
        let key = cache_key(&("propose", &labels, count))?;
        if let Some(cached) = self.proposals.get(&key) {
            self.stats.hits += 1;
            log::debug!("proposal cache hit for {} labels", labels.len());
            return Ok(cached.clone());
        }

        self.stats.misses += 1;
        log::debug!(
            "requesting {count} categories for {} labels from {}",
            labels.len(),
            self.oracle.describe()
        );
        let proposed = match self.oracle.propose(&labels, count) {
            Ok(proposed) if !proposed.is_empty() => proposed,
            Ok(_) => {
                let err = LensError::oracle("category proposal is empty");
                self.audit("propose", "error", &err.to_string());
                return Err(err.into());
            }
            Err(err) => {
                self.audit("propose", "error", &format!("{err:#}"));
                return Err(err);
            }
        };
        self.audit(
            "propose",
            "ok",
            &format!(
                "{} labels -> {} categories via {}",
                labels.len(),
                proposed.len(),
                self.oracle.describe()
            ),
        );
        self.proposals.insert(key, proposed.clone());
        Ok(proposed)
    }

    /// Place every label into exactly one of `categories` or the fallback category.
    pub fn map_labels_to_categories(
        &mut self,
        categories: &[String],
        labels: &[String],
    ) -> Result<CategoryAssignment> {
        let labels = normalized_labels(labels);
        let key = cache_key(&("map", categories, &labels))?;
        if let Some(cached) = self.assignments.get(&key) {
            self.stats.hits += 1;
            log::debug!("mapping cache hit for {} labels", labels.len());
            return Ok(cached.clone());
        }

        self.stats.misses += 1;
        let raw = if categories.is_empty() || labels.is_empty() {
            BTreeMap::new()
        } else {
            match self.oracle.map_labels(categories, &labels) {
                Ok(raw) => raw,
                Err(err) => {
                    self.audit("map", "error", &format!("{err:#}"));
                    return Err(err);
                }
            }
        };

        let assignment = reconcile_mapping(&raw, categories, &labels, &self.fallback_category);
        for warning in &assignment.warnings {
            let reason = match &warning.returned {
                Some(returned) => format!("unknown category `{returned}` for `{}`", warning.label),
                None => format!("label `{}` omitted", warning.label),
            };
            warn::emit(
                WarnCode::MappingIncomplete,
                "map",
                &format!("fallback_to_{}", self.fallback_category),
                &reason,
                "",
            );
        }
        self.audit(
            "map",
            "ok",
            &format!(
                "{} labels onto {} categories, {} fallback",
                labels.len(),
                categories.len(),
                assignment.warnings.len()
            ),
        );
        self.assignments.insert(key, assignment.clone());
        Ok(assignment)
    }
}
