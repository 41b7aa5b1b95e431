use anyhow::{Result, anyhow};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::lens::paths::LensPaths;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub delimiter: String,
    pub timezone: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    pub default_count: usize,
    pub min_count: usize,
    pub max_count: usize,
    #[serde(default = "default_other_label")]
    pub other_label: String,
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
    #[serde(default = "default_missing_topic")]
    pub missing_topic: String,
}

fn default_other_label() -> String {
    "other".to_string()
}

fn default_fallback_category() -> String {
    "unclassified".to_string()
}

fn default_missing_topic() -> String {
    "—".to_string()
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            default_count: 3,
            min_count: 2,
            max_count: 8,
            other_label: default_other_label(),
            fallback_category: default_fallback_category(),
            missing_topic: default_missing_topic(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LensConfig {
    pub ingest: IngestConfig,
    pub topics: TopicsConfig,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLensConfig {
    ingest: Option<IngestConfig>,
    topics: Option<TopicsConfig>,
    oracle: Option<OracleConfig>,
}

impl LensConfig {
    pub fn delimiter_byte(&self) -> u8 {
        self.ingest.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.ingest
            .timezone
            .trim()
            .parse::<Tz>()
            .map_err(|err| anyhow!("invalid timezone `{}`: {err}", self.ingest.timezone))
    }

    /// Reject a category count outside the configured bounds.
    pub fn check_topic_count(&self, count: usize) -> Result<usize> {
        let topics = &self.topics;
        if count < topics.min_count || count > topics.max_count {
            return Err(anyhow!(
                "number of topics must be between {} and {} (got {count})",
                topics.min_count,
                topics.max_count
            ));
        }
        Ok(count)
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_option(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &LensConfig) -> Result<()> {
    let delimiter = &cfg.ingest.delimiter;
    if delimiter.len() != 1 || !delimiter.is_ascii() {
        return Err(anyhow!(
            "invalid delimiter `{delimiter}`: must be a single ASCII character"
        ));
    }
    cfg.timezone()?;

    let t = &cfg.topics;
    if t.min_count < 2 {
        return Err(anyhow!("invalid topics.min_count: must be >= 2"));
    }
    if !(t.min_count <= t.default_count && t.default_count <= t.max_count) {
        return Err(anyhow!(
            "invalid topic counts: require min_count <= default_count <= max_count"
        ));
    }
    if t.fallback_category.trim().is_empty() {
        return Err(anyhow!("invalid topics.fallback_category: cannot be empty"));
    }
    if t.other_label.trim().is_empty() {
        return Err(anyhow!("invalid topics.other_label: cannot be empty"));
    }
    if cfg.oracle.timeout_secs == 0 {
        return Err(anyhow!("invalid oracle timeout: must be >= 1 second"));
    }
    Ok(())
}

fn merge_config_text(base: &mut LensConfig, raw: &str, origin: &Path) -> Result<()> {
    let parsed: PartialLensConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", origin.display()))?;
    if let Some(ingest) = parsed.ingest {
        base.ingest = ingest;
    }
    if let Some(topics) = parsed.topics {
        base.topics = topics;
    }
    if let Some(oracle) = parsed.oracle {
        base.oracle = oracle;
    }
    Ok(())
}

fn merge_file_config(base: &mut LensConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let raw = fs::read_to_string(path)?;
    merge_config_text(base, &raw, path)
}

fn apply_env_overrides(cfg: &mut LensConfig) {
    cfg.ingest.delimiter = env_or_string("WORKLOG_DELIMITER", &cfg.ingest.delimiter);
    cfg.ingest.timezone = env_or_string("WORKLOG_TIMEZONE", &cfg.ingest.timezone);
    cfg.topics.default_count = env_or_usize("WORKLOG_TOPICS_DEFAULT", cfg.topics.default_count);
    cfg.topics.min_count = env_or_usize("WORKLOG_TOPICS_MIN", cfg.topics.min_count);
    cfg.topics.max_count = env_or_usize("WORKLOG_TOPICS_MAX", cfg.topics.max_count);
    cfg.topics.fallback_category =
        env_or_string("WORKLOG_FALLBACK_CATEGORY", &cfg.topics.fallback_category);
    cfg.oracle.provider = env_or_option("WORKLOG_ORACLE_PROVIDER", cfg.oracle.provider.take());
    cfg.oracle.model = env_or_option("WORKLOG_ORACLE_MODEL", cfg.oracle.model.take());
    cfg.oracle.base_url = env_or_option("WORKLOG_ORACLE_BASE_URL", cfg.oracle.base_url.take());
    cfg.oracle.timeout_secs = env_or_u64("WORKLOG_ORACLE_TIMEOUT_SECS", cfg.oracle.timeout_secs);
}

pub fn load_config(paths: &LensPaths) -> Result<LensConfig> {
    let mut cfg = LensConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::{LensConfig, merge_config_text, validate};
    use std::path::Path;

    #[test]
    fn defaults_are_valid() {
        let cfg = LensConfig::default();
        assert!(validate(&cfg).is_ok());
        assert_eq!(cfg.delimiter_byte(), b';');
        assert_eq!(cfg.topics.default_count, 3);
    }

    #[test]
    fn file_sections_replace_defaults() {
        let mut cfg = LensConfig::default();
        let raw = r#"
[ingest]
delimiter = ","
timezone = "Europe/Berlin"

[topics]
default_count = 4
min_count = 2
max_count = 6
"#;
        merge_config_text(&mut cfg, raw, Path::new("config.toml")).expect("merge");
        assert_eq!(cfg.delimiter_byte(), b',');
        assert_eq!(cfg.topics.default_count, 4);
        assert_eq!(cfg.topics.fallback_category, "unclassified");
        assert_eq!(cfg.oracle.timeout_secs, 60);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn validate_rejects_default_outside_bounds() {
        let mut cfg = LensConfig::default();
        cfg.topics.default_count = 9;
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn validate_rejects_multi_char_delimiter_and_bad_timezone() {
        let mut cfg = LensConfig::default();
        cfg.ingest.delimiter = ";;".to_string();
        assert!(validate(&cfg).is_err());

        let mut cfg = LensConfig::default();
        cfg.ingest.timezone = "Mars/Olympus".to_string();
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn topic_count_is_bounded() {
        let cfg = LensConfig::default();
        assert!(cfg.check_topic_count(1).is_err());
        assert!(cfg.check_topic_count(9).is_err());
        assert_eq!(cfg.check_topic_count(8).expect("in range"), 8);
    }
}
