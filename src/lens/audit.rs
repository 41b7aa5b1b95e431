use crate::lens::paths::LensPaths;
use crate::lens::util::now_epoch_secs;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub at_epoch_secs: u64,
    pub phase: String,
    pub status: String,
    pub message: String,
}

pub fn audit_log_path(paths: &LensPaths) -> PathBuf {
    paths.logs_dir.join("audit.log")
}

pub fn append_event(paths: &LensPaths, phase: &str, status: &str, message: &str) -> Result<()> {
    fs::create_dir_all(&paths.logs_dir)
        .with_context(|| format!("failed to create {}", paths.logs_dir.display()))?;
    let event = AuditEvent {
        at_epoch_secs: now_epoch_secs()?,
        phase: phase.to_string(),
        status: status.to_string(),
        message: message.to_string(),
    };

    let line = format!("{}\n", serde_json::to_string(&event)?);
    let path = audit_log_path(paths);
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{append_event, audit_log_path};
    use crate::lens::paths::LensPaths;

    #[test]
    fn events_append_as_json_lines() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let paths = LensPaths {
            lens_home: tmp.path().to_path_buf(),
            logs_dir: tmp.path().join("logs"),
            config_file: tmp.path().join("config.toml"),
        };
        append_event(&paths, "propose", "ok", "3 categories").expect("append");
        append_event(&paths, "map", "error", "timeout").expect("append");

        let raw = std::fs::read_to_string(audit_log_path(&paths)).expect("read");
        let lines = raw.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first["phase"], "propose");
        assert_eq!(first["status"], "ok");
    }
}
