use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "setupmingw.toml";

/// Contents of `setupmingw.toml`.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Extra descriptor lines (`name=location`), merged over the built-in catalog
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub defaults: Defaults,
}

/// Fallback values for CLI flags that were not given.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub arch: Option<String>,
    pub jobs: Option<usize>,
    pub src: Option<PathBuf>,
    pub build: Option<PathBuf>,
    pub sysroot: Option<PathBuf>,
    pub colors: Option<String>,
}

/// Load settings from `explicit`, or from `setupmingw.toml` in the current
/// directory when it exists. An explicitly named file must exist.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
            }
            p.to_path_buf()
        }
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !p.exists() {
                return Ok(Settings::default());
            }
            p
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_settings(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_settings(content: &str) -> Result<Settings> {
    Ok(toml::from_str(content)?)
}
