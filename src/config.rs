//! Runtime configuration: defaults, optional TOML file, environment
//! overrides.
//!
//! Precedence, lowest to highest: built-in defaults, `textmill.toml` (or the
//! file named by `--config`), `TEXTMILL_*` environment variables, CLI flags.
//! CLI flags are applied by the binary after `load` returns.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE: &str = "textmill.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Section transformation workers consuming the task queue.
    pub workers: usize,
    /// Dispatch loops consuming the section-result queue. Per-job locking
    /// keeps any value here safe; more loops only add cross-job parallelism.
    pub dispatch_workers: usize,
    /// Entries kept in ranked word lists, per section and globally.
    pub top_words: usize,
    /// Directory final reports are written to.
    pub output_dir: PathBuf,
    /// Sentiment lexicon JSON file; the built-in lexicon when unset.
    pub lexicon_file: Option<PathBuf>,
    /// Name replacement JSON file; no replacements when unset.
    pub replacements_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 4,
            dispatch_workers: 2,
            top_words: 10,
            output_dir: PathBuf::from("results"),
            lexicon_file: None,
            replacements_file: None,
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or from `textmill.toml` in
    /// the working directory when present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("no configuration file found; using defaults");
                    Self::default()
                }
            }
        };
        config.merge_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply `TEXTMILL_*` environment variables on top of the current values.
    pub fn merge_env(&mut self) {
        self.merge_env_with(|name| env::var(name).ok());
    }

    fn merge_env_with(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(value) = get("TEXTMILL_WORKERS") {
            match value.parse() {
                Ok(parsed) => self.workers = parsed,
                Err(_) => warn!("ignoring unparseable TEXTMILL_WORKERS value '{value}'"),
            }
        }
        if let Some(value) = get("TEXTMILL_DISPATCH_WORKERS") {
            match value.parse() {
                Ok(parsed) => self.dispatch_workers = parsed,
                Err(_) => warn!("ignoring unparseable TEXTMILL_DISPATCH_WORKERS value '{value}'"),
            }
        }
        if let Some(value) = get("TEXTMILL_TOP_WORDS") {
            match value.parse() {
                Ok(parsed) => self.top_words = parsed,
                Err(_) => warn!("ignoring unparseable TEXTMILL_TOP_WORDS value '{value}'"),
            }
        }
        if let Some(value) = get("TEXTMILL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(value);
        }
        if let Some(value) = get("TEXTMILL_LEXICON_FILE") {
            self.lexicon_file = Some(PathBuf::from(value));
        }
        if let Some(value) = get("TEXTMILL_REPLACEMENTS_FILE") {
            self.replacements_file = Some(PathBuf::from(value));
        }
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.workers > 0, "workers must be at least 1");
        ensure!(
            self.dispatch_workers > 0,
            "dispatch_workers must be at least 1"
        );
        ensure!(self.top_words > 0, "top_words must be at least 1");
        Ok(())
    }
}
