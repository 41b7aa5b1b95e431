use anyhow::Result;
use std::env;

use crate::commands::{CommandReport, config_summary};
use crate::lens::audit::audit_log_path;
use crate::lens::config::load_config;
use crate::lens::paths::{LensPaths, resolve_paths};
use crate::oracle::provider::resolve_from_env;

include!(concat!(env!("OUT_DIR"), "/worklog_env_allowlist.rs"));

/// `WORKLOG_*` variables that this build never reads, usually typos.
pub fn unknown_env_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown = keys
        .into_iter()
        .filter(|key| key.starts_with("WORKLOG_"))
        .filter(|key| !GENERATED_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect::<Vec<_>>();
    unknown.sort();
    unknown
}

fn paths_report(paths: &LensPaths) -> CommandReport {
    let mut report = CommandReport::new("paths");
    report.detail(format!("lens_home={}", paths.lens_home.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("audit_log={}", audit_log_path(paths).display()));
    if !paths.config_file.exists() {
        report.detail("config_file.present=false (defaults in use)");
    }
    report
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");
    report.detail(format!("build_id={}", env!("WORKLOG_BUILD_ID")));
    report.merge(paths_report(&paths));

    let config = match load_config(&paths) {
        Ok(config) => config,
        Err(err) => {
            report.issue(format!("config invalid: {err:#}"));
            return Ok(report);
        }
    };
    config_summary(&mut report, &config);

    match resolve_from_env(&config.oracle) {
        Ok(remote) => {
            report.detail("classification=enabled");
            report.detail(format!("oracle.provider={}", remote.provider.label()));
            report.detail(format!("oracle.model={}", remote.model));
            if let Some(base_url) = &remote.base_url {
                report.detail(format!("oracle.base_url={base_url}"));
            }
        }
        // Not an issue: every view except topics works without a key.
        Err(err) => report.detail(format!("classification=disabled ({err})")),
    }

    for key in unknown_env_keys(env::vars().map(|(key, _)| key)) {
        report.issue(format!("unknown environment variable {key}"));
    }

    Ok(report)
}
