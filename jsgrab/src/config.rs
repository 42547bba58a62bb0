use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "jsgrab.yaml";

#[derive(Debug, Default, Deserialize, Clone)]
pub struct MergeConfig {
    pub output: Option<PathBuf>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct FetchConfig {
    pub dir: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct LogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    pub merge: Option<MergeConfig>,
    pub fetch: Option<FetchConfig>,
    pub log: Option<LogConfig>,
}

impl Config {
    pub fn merge(&self) -> MergeConfig {
        self.merge.clone().unwrap_or_default()
    }

    pub fn fetch(&self) -> FetchConfig {
        self.fetch.clone().unwrap_or_default()
    }

    pub fn log(&self) -> LogConfig {
        self.log.clone().unwrap_or_default()
    }
}

pub fn parse_config(s: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(s)?)
}

/// Load an explicit config file, or `./jsgrab.yaml` when present. An explicit path that
/// cannot be read is an error; a missing default file is not.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg = parse_config(&s).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(Some(cfg))
}
