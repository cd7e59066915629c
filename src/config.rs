use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    /// `zfs` binary to run; looked up on PATH unless absolute
    pub zfs_path: PathBuf,
    /// Pass `-d` to `zfs destroy`
    pub defer_destroy: bool,
    /// Exit non-zero when any destroy fails
    pub strict: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            zfs_path: PathBuf::from("zfs"),
            defer_destroy: false,
            strict: false,
        }
    }
}

pub fn load(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => read_toml(&path),
        None => Ok(Config::default()),
    }
}

fn read_toml(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
}
