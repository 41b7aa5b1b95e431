use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LensPaths {
    pub lens_home: PathBuf,
    pub logs_dir: PathBuf,
    pub config_file: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<LensPaths> {
    let lens_home = match env::var("WORKLOG_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".worklog-lens"),
    };

    let logs_dir = env_or_default_path("WORKLOG_LOGS_DIR", lens_home.join("logs"));
    let config_file = env_or_default_path("WORKLOG_CONFIG_PATH", lens_home.join("config.toml"));

    Ok(LensPaths {
        lens_home,
        logs_dir,
        config_file,
    })
}
