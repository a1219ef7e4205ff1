use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Runtime settings, read from a small TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub paths: Paths,
    #[serde(default)]
    pub survey: SurveySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Paths {
    pub database: PathBuf,
    pub staging_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveySettings {
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold_px: f64,
}

impl Default for SurveySettings {
    fn default() -> SurveySettings {
        SurveySettings { distance_threshold_px: default_distance_threshold() }
    }
}

fn default_distance_threshold() -> f64 {
    30.0
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config in {}", path.display()))
    }
}
