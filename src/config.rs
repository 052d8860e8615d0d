//! Pipeline configuration, persisted as TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the stock pipeline. Command-line flags override individual values.

use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from configuration loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read pipeline config: {path}")]
    #[diagnostic(
        code(graphseq::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pipeline config: {path}")]
    #[diagnostic(
        code(graphseq::config::parse),
        help("Check the TOML syntax. Known tables are [preprocess], [vocab] and [compress].")
    )]
    Parse { path: String, message: String },

    #[error("failed to write pipeline config: {path}")]
    #[diagnostic(
        code(graphseq::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for the batch preprocessing driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Write blank lines for failed sentences instead of skipping them.
    #[serde(default)]
    pub output_blank_for_failure: bool,
    /// Process sentences on the rayon pool. Output order is unchanged.
    #[serde(default)]
    pub parallel: bool,
    /// Log progress every this many sentences.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

fn default_progress_interval() -> usize {
    50_000
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            output_blank_for_failure: false,
            parallel: false,
            progress_interval: default_progress_interval(),
        }
    }
}

/// Settings for vocabulary files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabConfig {
    /// Cap on the number of entries written.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Entries below this frequency are ignored when loading.
    #[serde(default = "default_min_freq")]
    pub min_freq: u64,
}

fn default_max_tokens() -> usize {
    1_000_000
}
fn default_min_freq() -> u64 {
    2
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            min_freq: default_min_freq(),
        }
    }
}

/// Settings for rare-placeholder compression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressConfig {
    /// Only out-of-vocabulary tokens with this prefix are compressed.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Prefix of the generic placeholders that replace them.
    #[serde(default = "default_replacement")]
    pub replacement: String,
}

fn default_prefix() -> String {
    "UNK".into()
}
fn default_replacement() -> String {
    "_UNK".into()
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            replacement: default_replacement(),
        }
    }
}

/// Whole-pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub vocab: VocabConfig,
    #[serde(default)]
    pub compress: CompressConfig,
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Save as pretty TOML, creating parent directories as needed.
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.preprocess.progress_interval, 50_000);
        assert_eq!(cfg.vocab.max_tokens, 1_000_000);
        assert_eq!(cfg.vocab.min_freq, 2);
        assert_eq!(cfg.compress.replacement, "_UNK");
    }

    #[test]
    fn partial_tables_fill_in() {
        let cfg: PipelineConfig = toml::from_str(
            "[preprocess]\noutput_blank_for_failure = true\n\n[vocab]\nmin_freq = 5\n",
        )
        .unwrap();
        assert!(cfg.preprocess.output_blank_for_failure);
        assert!(!cfg.preprocess.parallel);
        assert_eq!(cfg.vocab.min_freq, 5);
        assert_eq!(cfg.vocab.max_tokens, 1_000_000);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("conf").join("graphseq.toml");
        let mut cfg = PipelineConfig::default();
        cfg.preprocess.parallel = true;
        cfg.vocab.min_freq = 7;
        cfg.save(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("[vocab]"));
        assert_eq!(PipelineConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn save_into_file_path_is_a_write_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        assert!(matches!(
            PipelineConfig::default().save(&blocker.join("graphseq.toml")),
            Err(ConfigError::Write { .. })
        ));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[preprocess\n").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            PipelineConfig::load(Path::new("/nonexistent/graphseq.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
