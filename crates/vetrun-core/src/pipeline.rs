//! Response-to-issues pipeline
//!
//! One [`Pipeline::run_response`] call takes a model response through every
//! layer: code extraction, sandboxed execution, output collection, output
//! requirement checks, display-item checker chains and finally issue
//! forgiveness against the caller's [`IssueHistory`].
//!
//! The configured override contexts are active on the executor's registry
//! for the duration of the execution only.
//!
//! Output problems short-circuit the display-item checks: the issues of a
//! run whose files are missing or malformed are reported alone.

use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use parking_lot::Mutex;
use vetrun_artifact::{IssueHistory, RunIssues};
use vetrun_checks::{check_display_items, CheckServices};
use vetrun_outputs::{OutputFileRequirements, OutputFileRequirementsWithContent};
use vetrun_provenance::{ProvenanceSeal, RunContexts};
use vetrun_sandbox::{CodeRunner, SandboxExecutor};

/// Everything one successful run produced
#[derive(Debug)]
pub struct PipelineReport {
    /// Extracted code
    pub code: String,
    /// Text of the configured output file
    pub output: Option<String>,
    /// Created files with their decoded content
    pub outputs: OutputFileRequirementsWithContent,
    /// Issues left after forgiveness
    pub issues: RunIssues,
    /// Contexts active during the run
    pub contexts: RunContexts,
}

impl PipelineReport {
    /// Whether nothing needs fixing
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Feedback message for the model
    #[must_use]
    pub fn feedback(&self, most_severe_only: bool) -> String {
        self.issues.message(most_severe_only)
    }
}

/// Runs responses and validates what they create
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    executor: SandboxExecutor,
    services: CheckServices,
    seals: Mutex<Vec<ProvenanceSeal>>,
}

impl Pipeline {
    /// Pipeline with `config`, using the process-wide registry and channel
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let executor = SandboxExecutor::new(config.sandbox.clone());
        let services = CheckServices::with_capacity(config.compile_cache_capacity);
        Self::with_parts(config, executor, services)
    }

    /// Pipeline from explicit parts
    #[must_use]
    pub fn with_parts(config: PipelineConfig, executor: SandboxExecutor, services: CheckServices) -> Self {
        Self {
            config,
            executor,
            services,
            seals: Mutex::new(Vec::new()),
        }
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Checker services
    #[inline]
    #[must_use]
    pub fn services(&self) -> &CheckServices {
        &self.services
    }

    /// Seals of earlier runs; tags they sealed stay valid in later runs
    #[must_use]
    pub fn trusted_seals(&self) -> Vec<ProvenanceSeal> {
        self.seals.lock().clone()
    }

    /// Extract, execute, collect, validate and forgive
    ///
    /// # Errors
    ///
    /// [`crate::PipelineError::Run`] when extraction or execution fails,
    /// [`crate::PipelineError::Output`] when created files cannot be read,
    /// [`crate::PipelineError::Checker`] when a checker breaks its contract.
    pub async fn run_response(&self, response: &str, history: &mut IssueHistory) -> PipelineResult<PipelineReport> {
        let run_folder = self.config.run_folder.as_path();
        tracing::info!(run_folder = %run_folder.display(), stage = ?self.config.stage, "pipeline run started");

        let executor = self.executor.clone().with_trusted_seals(self.trusted_seals());
        let mut runner = CodeRunner::new(response, executor);
        if let Some(output_file) = &self.config.output_file {
            runner = runner.with_output_file(output_file.clone());
        }
        let registry = self.executor.registry();
        let active: Vec<_> = self.config.contexts.iter().map(|ctx| registry.enter(ctx.clone())).collect();
        let result = runner.run(run_folder).await;
        drop(active);
        let run = match result {
            Ok(run) => run,
            Err(failure) => {
                tracing::warn!(failure = %failure, problem = ?failure.code_problem(), "run failed");
                return Err(failure.into());
            }
        };
        self.seals.lock().push(run.contexts.seal().clone());

        let empty = OutputFileRequirements::new();
        let requirements = self.config.sandbox.output_requirements.as_ref().unwrap_or(&empty);
        let outputs = requirements.convert_to_with_content(&run.created_files, run_folder, &run.contexts)?;

        let mut issues = run.issues;
        let mut output_issues = requirements.missing_output_issues(&run.created_files);
        output_issues.extend(outputs.content_issues());
        if output_issues.is_empty() {
            issues.extend(check_display_items(&outputs, self.config.stage, &self.services)?);
        } else {
            tracing::debug!(issues = output_issues.len(), "output issues, display items not checked");
            issues.extend(output_issues);
        }

        let raised = issues.len();
        issues.apply_forgiveness(history);
        tracing::info!(raised, reported = issues.len(), "pipeline run finished");

        Ok(PipelineReport {
            code: run.code,
            output: run.output,
            outputs,
            issues,
            contexts: run.contexts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::Arc;
    use vetrun_artifact::CodeProblem;
    use vetrun_provenance::OverrideRegistry;

    fn pipeline(dir: &std::path::Path) -> Pipeline {
        let config = PipelineConfig::new().with_run_folder(dir);
        let executor = SandboxExecutor::new(config.sandbox.clone()).with_registry(Arc::new(OverrideRegistry::new()));
        Pipeline::with_parts(config, executor, CheckServices::new())
    }

    #[tokio::test]
    async fn extraction_failure_is_fed_back() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let mut history = IssueHistory::new();
        let err = pipeline
            .run_response("```python\na = 1\n```\n```python\nb = 2\n```", &mut history)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Run(_)));
        let issue = err.to_run_issue().unwrap();
        assert_eq!(issue.code_problem, CodeProblem::NotSingleBlock);
        assert!(pipeline.trusted_seals().is_empty());
    }

    #[tokio::test]
    async fn contexts_are_released_after_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());
        let mut history = IssueHistory::new();
        let _ = pipeline.run_response("no code", &mut history).await;
        assert_eq!(pipeline.executor.registry().depth(), 0);
    }

    #[test]
    fn new_pipeline_sizes_the_compile_cache() {
        let pipeline = Pipeline::new(PipelineConfig::new());
        assert_eq!(pipeline.services().cached_compilations(), 0);
        assert!(pipeline.config().most_severe_only);
    }
}
