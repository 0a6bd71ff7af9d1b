//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vetrun_checks::{Stage, DEFAULT_COMPILE_CACHE_CAPACITY};
use vetrun_provenance::OverrideContext;
use vetrun_sandbox::{ConfigError, SandboxConfig};

/// Settings of one [`crate::Pipeline`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Execution policy
    pub sandbox: SandboxConfig,
    /// Override contexts entered for every run
    pub contexts: Vec<OverrideContext>,
    /// Stage whose checker chains validate the display items
    pub stage: Stage,
    /// Working directory of every run
    pub run_folder: PathBuf,
    /// File read back as the run output
    pub output_file: Option<String>,
    /// Compile results kept across runs
    pub compile_cache_capacity: u64,
    /// Feedback lists only the issues of the most fundamental problem level
    pub most_severe_only: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            contexts: vec![OverrideContext::statistics()],
            stage: Stage::Analysis,
            run_folder: PathBuf::from("."),
            output_file: None,
            compile_cache_capacity: DEFAULT_COMPILE_CACHE_CAPACITY,
            most_severe_only: true,
        }
    }
}

impl PipelineConfig {
    /// Default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With execution policy
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// With the override contexts entered for every run
    #[must_use]
    pub fn with_contexts(mut self, contexts: Vec<OverrideContext>) -> Self {
        self.contexts = contexts;
        self
    }

    /// With stage
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = stage;
        self
    }

    /// With run folder
    #[must_use]
    pub fn with_run_folder(mut self, run_folder: impl Into<PathBuf>) -> Self {
        self.run_folder = run_folder.into();
        self
    }

    /// With output file
    #[must_use]
    pub fn with_output_file(mut self, filename: impl Into<String>) -> Self {
        self.output_file = Some(filename.into());
        self
    }
}
