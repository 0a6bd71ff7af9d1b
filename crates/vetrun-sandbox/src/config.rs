//! Sandbox configuration
//!
//! Loaded from TOML; every field has a default so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vetrun_outputs::OutputFileRequirements;

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Execution policy for one [`crate::SandboxExecutor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter binary
    pub python: PathBuf,
    /// Wall-clock budget in seconds
    pub timeout_secs: f64,
    /// Top-level packages that may be imported; `None` allows everything
    pub allowed_imports: Option<Vec<String>>,
    /// Built-ins whose use aborts the run
    pub forbidden_builtins: Vec<String>,
    /// Built-ins whose use is reported without aborting
    pub discouraged_builtins: Vec<String>,
    /// Globs of files that may be opened for writing; `None` allows all
    pub allowed_write_files: Option<Vec<String>>,
    /// Expected outputs; `None` disables the created-files check
    pub output_requirements: Option<OutputFileRequirements>,
    /// Warning categories promoted to failures
    pub warnings_to_raise: Vec<String>,
    /// Warning categories reported as issues
    pub warnings_to_issue: Vec<String>,
    /// How long to wait for a stack dump after a timeout
    pub stack_dump_grace_ms: u64,
    /// Environment variables passed through to the interpreter
    pub pass_env: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python: PathBuf::from("python3"),
            timeout_secs: 60.0,
            allowed_imports: Some(strings(&[
                "pandas",
                "numpy",
                "scipy",
                "sklearn",
                "statsmodels",
                "lifelines",
                "math",
                "random",
                "statistics",
                "time",
                "warnings",
                "pickle",
                "json",
                "collections",
                "itertools",
                "functools",
                "typing",
                "dataclasses",
                "datetime",
                "re",
                "string",
                "decimal",
                "fractions",
                "copy",
                "operator",
                "enum",
            ])),
            forbidden_builtins: strings(&[
                "input",
                "exit",
                "quit",
                "eval",
                "exec",
                "compile",
                "breakpoint",
                "help",
                "__import__",
            ]),
            discouraged_builtins: strings(&["print"]),
            allowed_write_files: Some(Vec::new()),
            output_requirements: Some(OutputFileRequirements::new()),
            warnings_to_raise: strings(&["RuntimeWarning", "SyntaxWarning"]),
            warnings_to_issue: strings(&[
                "UserWarning",
                "FutureWarning",
                "DeprecationWarning",
                "ConvergenceWarning",
            ]),
            stack_dump_grace_ms: 500,
            pass_env: strings(&["PATH", "HOME", "LANG"]),
        }
    }
}

impl SandboxConfig {
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

    /// Timeout as a duration; invalid values fall back to the default
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(Duration::from_secs(60))
    }

    /// Set the interpreter
    #[must_use]
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    /// Set the timeout in seconds
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the import allow-list
    #[must_use]
    pub fn with_allowed_imports(mut self, imports: Option<Vec<String>>) -> Self {
        self.allowed_imports = imports;
        self
    }

    /// Set the forbidden built-ins
    #[must_use]
    pub fn with_forbidden_builtins(mut self, builtins: Vec<String>) -> Self {
        self.forbidden_builtins = builtins;
        self
    }

    /// Set the write allow-list
    #[must_use]
    pub fn with_allowed_write_files(mut self, files: Option<Vec<String>>) -> Self {
        self.allowed_write_files = files;
        self
    }

    /// Set the output requirements
    #[must_use]
    pub fn with_output_requirements(mut self, requirements: Option<OutputFileRequirements>) -> Self {
        self.output_requirements = requirements;
        self
    }

    /// Set the warning categories promoted to failures
    #[must_use]
    pub fn with_warnings_to_raise(mut self, categories: Vec<String>) -> Self {
        self.warnings_to_raise = categories;
        self
    }

    /// Set the warning categories reported as issues
    #[must_use]
    pub fn with_warnings_to_issue(mut self, categories: Vec<String>) -> Self {
        self.warnings_to_issue = categories;
        self
    }

    /// Write allow-list widened with the filenames the requirements name
    #[must_use]
    pub fn effective_write_files(&self) -> Option<Vec<String>> {
        let mut files = self.allowed_write_files.clone()?;
        if let Some(requirements) = &self.output_requirements {
            for pattern in requirements.allowed_filenames() {
                if !files.contains(&pattern) {
                    files.push(pattern);
                }
            }
        }
        Some(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetrun_outputs::OutputFileRequirement;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SandboxConfig::from_toml_str("timeout_secs = 2.5\nwarnings_to_raise = []\n").unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert!(config.warnings_to_raise.is_empty());
        assert_eq!(config.discouraged_builtins, vec!["print"]);
        assert_eq!(config.allowed_write_files, Some(vec![]));
    }

    #[test]
    fn negative_timeout_falls_back() {
        let config = SandboxConfig::default().with_timeout_secs(-1.0);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn requirements_widen_write_list() {
        let config = SandboxConfig::default().with_output_requirements(Some(
            OutputFileRequirements::new().with(OutputFileRequirement::text("results.txt")),
        ));
        assert_eq!(config.effective_write_files(), Some(vec!["results.txt".to_string()]));
        let open = config.with_allowed_write_files(None);
        assert_eq!(open.effective_write_files(), None);
    }
}
