//! Configuration handling for the linalign CLI
//!
//! Supports loading configuration from linalign.toml files with CLI argument
//! overrides.

use anyhow::{Context, Result};
use linalign_core::{AlignerConfig, GapPenalty, Score};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub aligner: AlignerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of threads to use
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Output format ("text" or "json")
    #[serde(default = "default_format")]
    pub format: String,

    /// Alignment columns per line in text output
    #[serde(default = "default_line_width")]
    pub line_width: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Substitution scores: "nucleotide" (case-insensitive ACGTN) or
    /// "identity" (exact byte comparison)
    #[serde(default = "default_matrix")]
    pub matrix: String,

    #[serde(default = "default_match")]
    pub match_score: Score,

    #[serde(default = "default_mismatch")]
    pub mismatch: Score,

    /// Cost of the first symbol of a gap run
    #[serde(default = "default_gap_open")]
    pub gap_open: Score,

    /// Cost of every further symbol of a gap run
    #[serde(default = "default_gap_extend")]
    pub gap_extend: Score,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_format() -> String { "text".to_string() }
fn default_line_width() -> usize { 60 }
fn default_matrix() -> String { "nucleotide".to_string() }
fn default_match() -> Score { linalign_core::scoring::DNA_MATCH }
fn default_mismatch() -> Score { linalign_core::scoring::DNA_MISMATCH }
fn default_gap_open() -> Score { linalign_core::scoring::DNA_GAP_OPEN }
fn default_gap_extend() -> Score { linalign_core::scoring::DNA_GAP_EXTEND }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            format: default_format(),
            line_width: default_line_width(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            matrix: default_matrix(),
            match_score: default_match(),
            mismatch: default_mismatch(),
            gap_open: default_gap_open(),
            gap_extend: default_gap_extend(),
        }
    }
}

impl ScoringConfig {
    pub fn gaps(&self) -> GapPenalty {
        GapPenalty::affine(self.gap_open, self.gap_extend)
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from("linalign.toml");
                if default_path.exists() {
                    log::info!("Loading configuration from: linalign.toml");
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = Self::to_toml(self)?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        Self::to_toml(&Self::default())
    }

    fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Reject values the aligner cannot work with. Out-of-range refinement
    /// settings are clamped by the aligner instead.
    pub fn validate(&self) -> Result<()> {
        match self.general.format.as_str() {
            "text" | "json" => {}
            other => return Err(CliError::config(format!("unknown output format '{}'", other)).into()),
        }
        match self.scoring.matrix.as_str() {
            "nucleotide" | "identity" => {}
            other => return Err(CliError::config(format!("unknown substitution matrix '{}'", other)).into()),
        }
        if self.scoring.gap_open < 0 || self.scoring.gap_extend < 0 {
            return Err(CliError::config("gap costs must be non-negative").into());
        }
        Ok(())
    }
}
