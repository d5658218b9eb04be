//! Tunable constants of the recognition core, persisted as TOML.
//!
//! Every field carries a serde default so that a partial file (or no file at
//! all) yields a usable configuration.

use std::path::Path;
use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::paths::OmrPaths;

/// Errors from configuration loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(omr::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(omr::config::parse),
        help("Check the TOML syntax. Unknown sections are rejected, missing keys take defaults.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(omr::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(omr::config::invalid), help("{message}"))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Section building parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LagConfig {
    /// Maximum length difference between a run and the last run of the
    /// section it extends.
    pub max_delta_length: usize,
    /// Runs shorter than this are ignored when reading a raster.
    pub min_run_length: usize,
}

impl Default for LagConfig {
    fn default() -> Self {
        Self {
            max_delta_length: 4,
            min_run_length: 1,
        }
    }
}

/// Glyph construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphConfig {
    /// Distance between two staff lines, in pixels. All geometric features are
    /// normalized by this value.
    pub interline: u32,
}

impl Default for GlyphConfig {
    fn default() -> Self {
        Self { interline: 16 }
    }
}

/// Classifier and training parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Normalized weight below which a glyph is reported as noise without
    /// consulting the network.
    pub min_weight: f64,
    /// Minimum number of samples per represented shape after oversampling.
    pub quorum: usize,
    /// Hidden layer width. `None` uses the trainable shape count.
    pub hidden_count: Option<usize>,
    pub learning_rate: f64,
    pub momentum: f64,
    /// Half-width of the uniform interval used to draw initial weights.
    pub amplitude: f64,
    /// Training stops once the mean squared error falls below this.
    pub max_error: f64,
    /// Upper bound on training epochs.
    pub epochs: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            min_weight: 0.19,
            quorum: 10,
            hidden_count: None,
            learning_rate: 0.2,
            momentum: 0.2,
            amplitude: 0.5,
            max_error: 1e-4,
            epochs: 1000,
        }
    }
}

/// Batch processing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads. 0 means one per available core.
    pub threads: usize,
    /// Global deadline for a whole batch, in seconds.
    pub timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            timeout_secs: 300,
        }
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Complete configuration of the recognition core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OmrConfig {
    pub lag: LagConfig,
    pub glyph: GlyphConfig,
    pub evaluator: EvaluatorConfig,
    pub batch: BatchConfig,
}

impl OmrConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the user config file if it exists, defaults otherwise.
    pub fn load_or_default(paths: &OmrPaths) -> ConfigResult<Self> {
        let file = paths.config_file();
        if file.is_file() {
            tracing::debug!(path = %file.display(), "loading config");
            Self::load(&file)
        } else {
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.glyph.interline == 0 {
            return Err(ConfigError::Invalid {
                message: "glyph.interline must be > 0".into(),
            });
        }
        if self.evaluator.quorum == 0 {
            return Err(ConfigError::Invalid {
                message: "evaluator.quorum must be > 0".into(),
            });
        }
        if self.evaluator.hidden_count == Some(0) {
            return Err(ConfigError::Invalid {
                message: "evaluator.hidden_count must be > 0 when set".into(),
            });
        }
        if self.evaluator.learning_rate.is_nan() || self.evaluator.learning_rate <= 0.0 {
            return Err(ConfigError::Invalid {
                message: "evaluator.learning_rate must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_takes_defaults() {
        let config: OmrConfig = toml::from_str("[lag]\nmax_delta_length = 2\n").unwrap();
        assert_eq!(config.lag.max_delta_length, 2);
        assert_eq!(config.lag.min_run_length, 1);
        assert_eq!(config.evaluator, EvaluatorConfig::default());
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(toml::from_str::<OmrConfig>("[staff]\nlines = 5\n").is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = OmrConfig::default();
        config.evaluator.quorum = 25;
        config.batch.timeout_secs = 5;
        config.save(&path).unwrap();

        let loaded = OmrConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.batch.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_interline_is_invalid() {
        let mut config = OmrConfig::default();
        config.glyph.interline = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = OmrPaths::rooted(dir.path());
        assert_eq!(OmrConfig::load_or_default(&paths).unwrap(), OmrConfig::default());
    }
}
