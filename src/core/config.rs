use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{validate_cutoff, Result};

/// Runtime settings, read from `~/.doris/config.json` when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Confidence threshold gating fuzzy keyword acceptance and the
    /// frequency-heuristic fast path. Must lie in [0, 1].
    pub probability_cutoff: f64,
    /// How many classifier candidates to surface during disambiguation.
    pub top_k: usize,
    /// Classifier probability above which the best candidate is taken
    /// without asking the user.
    pub auto_select_probability: f64,
    /// Upper bound on retained history entries.
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probability_cutoff: 0.75,
            top_k: 5,
            auto_select_probability: 0.85,
            history_limit: 1000,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_cutoff(self.probability_cutoff)?;
        validate_cutoff(self.auto_select_probability)?;
        Ok(())
    }
}

/// `~/.doris`, created on demand by the caller. Falls back to the current
/// directory when no home directory is available.
pub fn data_dir() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".doris")
}
