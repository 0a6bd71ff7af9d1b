//! Code runner: response in, code and output out

use crate::executor::SandboxExecutor;
use crate::extract::extract_code;
use crate::failure::RunFailure;
use crate::guest::Namespace;
use std::path::Path;
use vetrun_artifact::RunIssues;
use vetrun_provenance::RunContexts;

/// Result of a successful run
#[derive(Debug)]
pub struct CodeAndOutput {
    /// Extracted code
    pub code: String,
    /// Text of the designated output file, if one was designated
    pub output: Option<String>,
    /// Files created by the run, relative and sorted
    pub created_files: Vec<String>,
    /// Non-fatal issues
    pub issues: RunIssues,
    /// Contexts active during the run
    pub contexts: RunContexts,
    /// Top-level bindings left by the code
    pub namespace: Namespace,
}

/// Extracts the code block of a response and runs it
#[derive(Debug, Clone)]
pub struct CodeRunner {
    response: String,
    output_file: Option<String>,
    executor: SandboxExecutor,
}

impl CodeRunner {
    /// Runner for `response`
    #[must_use]
    pub fn new(response: impl Into<String>, executor: SandboxExecutor) -> Self {
        Self {
            response: response.into(),
            output_file: None,
            executor,
        }
    }

    /// Read back `filename` from the run folder after the run
    #[must_use]
    pub fn with_output_file(mut self, filename: impl Into<String>) -> Self {
        self.output_file = Some(filename.into());
        self
    }

    /// The response
    #[inline]
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// The single code block of the response, trimmed
    pub fn extract_code(&self) -> Result<String, RunFailure> {
        Ok(extract_code(&self.response)?)
    }

    /// Extract, execute and read back the output file
    ///
    /// # Errors
    ///
    /// Any [`RunFailure`] of extraction or execution;
    /// [`RunFailure::OutputLoading`] when the output file is missing.
    pub async fn run(&self, run_folder: &Path) -> Result<CodeAndOutput, RunFailure> {
        let code = self.extract_code()?;

        if let Some(name) = &self.output_file {
            let stale = run_folder.join(name);
            match std::fs::remove_file(&stale) {
                Ok(()) => tracing::debug!(file = %name, "removed stale output file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(RunFailure::io_error(stale, e)),
            }
        }

        let outcome = self.executor.execute(&code, run_folder).await;
        if let Some(failure) = outcome.failure {
            return Err(failure);
        }

        let output = match &self.output_file {
            Some(name) => Some(std::fs::read_to_string(run_folder.join(name)).map_err(|_| {
                RunFailure::OutputLoading {
                    filename: name.clone(),
                }
            })?),
            None => None,
        };

        Ok(CodeAndOutput {
            code,
            output,
            created_files: outcome.created_files,
            issues: outcome.issues,
            contexts: outcome.contexts,
            namespace: outcome.namespace.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetrun_artifact::CodeProblem;

    #[test]
    fn extraction_failure_is_a_run_failure() {
        let runner = CodeRunner::new("no fences at all", SandboxExecutor::default());
        let failure = runner.extract_code().unwrap_err();
        assert_eq!(failure.code_problem(), CodeProblem::NoCode);
    }

    #[tokio::test]
    async fn static_failure_skips_output_loading() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("output.txt"), "stale").unwrap();
        let runner = CodeRunner::new("```python\nimport os\n```", SandboxExecutor::default())
            .with_output_file("output.txt");
        let failure = runner.run(dir.path()).await.unwrap_err();
        assert!(matches!(failure, RunFailure::ForbiddenImport { .. }));
        assert!(!dir.path().join("output.txt").exists());
    }
}
