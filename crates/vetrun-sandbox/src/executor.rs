//! Sandboxed execution of generated code
//!
//! One execution:
//! 1. static policy check (no process is spawned on violation)
//! 2. lease on the run folder
//! 3. interpreter child with the guest bootstrap, `cwd = run_folder`,
//!    cleared environment, under a wall-clock timeout
//! 4. report decoding, created-file reconciliation
//!
//! Every step that fails ends the execution with a single [`RunFailure`].

use crate::config::SandboxConfig;
use crate::failure::{RunFailure, SourceFrame};
use crate::guest::{GuestConfig, GuestException, GuestReport, IssuedWarning, Namespace, ViolationKind, BOOTSTRAP_SOURCE};
use crate::policy::StaticPolicy;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use vetrun_artifact::{CodeProblem, RunIssue, RunIssues};
use vetrun_provenance::{OverrideRegistry, ProvenanceSeal, RunContexts};

/// Issue category for warnings recorded during a run
pub const WARNING_CATEGORY: &str = "Warnings";

const SCRIPT_FILE: &str = "script.py";
const BOOTSTRAP_FILE: &str = "bootstrap.py";
const CONFIG_FILE: &str = "config.json";
const REPORT_FILE: &str = "report.json";
const STACK_DUMP_FILE: &str = "stack.txt";
const STDOUT_FILE: &str = "stdout.txt";
const STDERR_FILE: &str = "stderr.txt";
const STDERR_TAIL_LINES: usize = 20;
const DUMP_POLL_INTERVAL: Duration = Duration::from_millis(25);

static ACTIVE_RUN_FOLDERS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

static DUMP_FRAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*File "(?P<file>.+)", line (?P<line>\d+) in"#).ok());

/// Everything an execution produced
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Top-level bindings; `None` when the script did not run to a report
    pub namespace: Option<Namespace>,
    /// Files created in the run folder, relative and sorted
    pub created_files: Vec<String>,
    /// Non-fatal issues
    pub issues: RunIssues,
    /// Contexts active during the run, with call counts
    pub contexts: RunContexts,
    /// Why the run was aborted, if it was
    pub failure: Option<RunFailure>,
}

impl ExecutionOutcome {
    fn new(contexts: RunContexts) -> Self {
        Self {
            namespace: None,
            created_files: Vec::new(),
            issues: RunIssues::new(),
            contexts,
            failure: None,
        }
    }

    /// Whether the run completed without a failure
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Exclusive claim on a run folder, released on drop
#[derive(Debug)]
struct RunFolderLease {
    path: PathBuf,
}

impl RunFolderLease {
    fn acquire(run_folder: &Path) -> Result<Self, RunFailure> {
        let path = run_folder
            .canonicalize()
            .map_err(|e| RunFailure::io_error(run_folder, e))?;
        if !ACTIVE_RUN_FOLDERS.lock().insert(path.clone()) {
            return Err(RunFailure::RunFolderBusy { path });
        }
        Ok(Self { path })
    }
}

impl Drop for RunFolderLease {
    fn drop(&mut self) {
        ACTIVE_RUN_FOLDERS.lock().remove(&self.path);
    }
}

enum ChildEnd {
    Exited(ExitStatus),
    TimedOut(Vec<SourceFrame>),
}

/// Runs generated code in a child interpreter
#[derive(Debug, Clone, Default)]
pub struct SandboxExecutor {
    config: SandboxConfig,
    registry: Option<Arc<OverrideRegistry>>,
    trusted_seals: Vec<ProvenanceSeal>,
}

impl SandboxExecutor {
    /// Executor with `config`, reading contexts from the global registry
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config,
            registry: None,
            trusted_seals: Vec::new(),
        }
    }

    /// Read active contexts from `registry` instead of the global one
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<OverrideRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Seals of earlier runs whose tags `load_df` keeps
    #[must_use]
    pub fn with_trusted_seals(mut self, seals: Vec<ProvenanceSeal>) -> Self {
        self.trusted_seals = seals;
        self
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Registry whose active contexts each execution snapshots
    #[must_use]
    pub fn registry(&self) -> &OverrideRegistry {
        self.registry
            .as_deref()
            .unwrap_or_else(|| OverrideRegistry::global())
    }

    /// Run `source` with `run_folder` as working directory
    pub async fn execute(&self, source: &str, run_folder: &Path) -> ExecutionOutcome {
        let started = Instant::now();
        let mut outcome = ExecutionOutcome::new(self.registry().snapshot());
        if let Err(failure) = self.run(source, run_folder, &mut outcome).await {
            outcome.failure = Some(failure);
        }
        match &outcome.failure {
            None => tracing::info!(
                run_folder = %run_folder.display(),
                created = outcome.created_files.len(),
                issues = outcome.issues.len(),
                elapsed_ms = started.elapsed().as_millis(),
                "code run finished"
            ),
            Some(failure) => tracing::info!(
                run_folder = %run_folder.display(),
                problem = ?failure.code_problem(),
                failure = %failure,
                elapsed_ms = started.elapsed().as_millis(),
                "code run failed"
            ),
        }
        outcome
    }

    async fn run(&self, source: &str, run_folder: &Path, outcome: &mut ExecutionOutcome) -> Result<(), RunFailure> {
        let write_files = self.config.effective_write_files();
        let report = StaticPolicy::new(&self.config, write_files.as_deref()).check(source)?;
        outcome.issues.extend(report.issues);

        let _lease = RunFolderLease::acquire(run_folder)?;
        let before = list_files(run_folder)?;

        let scratch = tempfile::Builder::new()
            .prefix("vetrun-")
            .tempdir()
            .map_err(|e| RunFailure::io_error(std::env::temp_dir(), e))?;
        let guest = GuestConfig {
            run_folder: run_folder.canonicalize().map_err(|e| RunFailure::io_error(run_folder, e))?,
            script_path: scratch.path().join(SCRIPT_FILE),
            report_path: scratch.path().join(REPORT_FILE),
            stack_dump_path: scratch.path().join(STACK_DUMP_FILE),
            allowed_imports: self.config.allowed_imports.clone(),
            forbidden_builtins: self.config.forbidden_builtins.clone(),
            allowed_write_files: write_files,
            warnings_to_raise: self.config.warnings_to_raise.clone(),
            warnings_to_issue: self.config.warnings_to_issue.clone(),
            intercept_targets: outcome.contexts.targets(),
            provenance_seal: outcome.contexts.seal().as_str().to_string(),
            trusted_seals: self.trusted_seals.iter().map(|s| s.as_str().to_string()).collect(),
        };
        let bootstrap_path = scratch.path().join(BOOTSTRAP_FILE);
        let config_path = scratch.path().join(CONFIG_FILE);
        write_file(&guest.script_path, source)?;
        write_file(&bootstrap_path, BOOTSTRAP_SOURCE)?;
        let config_json = serde_json::to_string(&guest)
            .map_err(|e| RunFailure::Interpreter(format!("failed to encode guest config: {e}")))?;
        write_file(&config_path, &config_json)?;

        let end = self
            .spawn_and_wait(&bootstrap_path, &config_path, run_folder, scratch.path(), &guest, source)
            .await?;

        let after = list_files(run_folder)?;
        outcome.created_files = after.into_iter().filter(|f| !before.contains(f)).collect();
        outcome.created_files.sort();

        let status = match end {
            ChildEnd::TimedOut(frames) => {
                return Err(RunFailure::Timeout {
                    timeout: self.config.timeout(),
                    frames,
                })
            }
            ChildEnd::Exited(status) => status,
        };

        let report = read_report(&guest.report_path, scratch.path(), status)?;
        outcome.contexts.record_calls(report.intercepted_calls);
        outcome
            .issues
            .extend(report.issued_warnings.iter().map(|w| warning_issue(w, source)));
        outcome.namespace = Some(report.namespace);

        if let Some(exception) = report.exception {
            return Err(failure_from_exception(exception, source));
        }

        if let Some(requirements) = &self.config.output_requirements {
            let unmatched = requirements.unmatched_files(&outcome.created_files);
            if !unmatched.is_empty() {
                return Err(RunFailure::UnallowedFilesCreated { files: unmatched });
            }
        }
        Ok(())
    }

    async fn spawn_and_wait(
        &self,
        bootstrap_path: &Path,
        config_path: &Path,
        run_folder: &Path,
        scratch: &Path,
        guest: &GuestConfig,
        source: &str,
    ) -> Result<ChildEnd, RunFailure> {
        let stdout_path = scratch.join(STDOUT_FILE);
        let stderr_path = scratch.join(STDERR_FILE);
        let stdout = std::fs::File::create(&stdout_path).map_err(|e| RunFailure::io_error(&stdout_path, e))?;
        let stderr = std::fs::File::create(&stderr_path).map_err(|e| RunFailure::io_error(&stderr_path, e))?;

        let mut command = tokio::process::Command::new(&self.config.python);
        command
            .arg("-B")
            .arg(bootstrap_path)
            .arg(config_path)
            .current_dir(run_folder)
            .env_clear()
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PYTHONIOENCODING", "utf-8")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        for key in &self.config.pass_env {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }

        let mut child = command.spawn().map_err(|e| {
            RunFailure::Interpreter(format!("failed to start {}: {e}", self.config.python.display()))
        })?;
        tracing::debug!(pid = ?child.id(), run_folder = %run_folder.display(), "interpreter started");

        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => Ok(ChildEnd::Exited(status.map_err(|e| RunFailure::io_error(run_folder, e))?)),
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs_f64(), "code run timed out");
                let frames = self.stack_at_timeout(&child, guest, source).await;
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed-out interpreter");
                }
                Ok(ChildEnd::TimedOut(frames))
            }
        }
    }

    /// Ask the interpreter for its stack and keep the innermost script frame
    async fn stack_at_timeout(&self, child: &tokio::process::Child, guest: &GuestConfig, source: &str) -> Vec<SourceFrame> {
        if !request_stack_dump(child) {
            return Vec::new();
        }
        let script = guest.script_path.to_string_lossy();
        let deadline = Instant::now() + Duration::from_millis(self.config.stack_dump_grace_ms);
        loop {
            if let Ok(dump) = tokio::fs::read_to_string(&guest.stack_dump_path).await {
                if let Some(lineno) = innermost_script_line(&dump, &script) {
                    return vec![SourceFrame::from_source(source, lineno)];
                }
            }
            if Instant::now() >= deadline {
                tracing::debug!("no stack dump before the grace period ended");
                return Vec::new();
            }
            tokio::time::sleep(DUMP_POLL_INTERVAL).await;
        }
    }
}

#[cfg(unix)]
fn request_stack_dump(child: &tokio::process::Child) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    match signal::kill(Pid::from_raw(pid), Signal::SIGUSR1) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(pid, error = %e, "stack dump request failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_stack_dump(_child: &tokio::process::Child) -> bool {
    false
}

/// First script frame of a faulthandler dump (most recent call first)
fn innermost_script_line(dump: &str, script: &str) -> Option<usize> {
    let pattern = DUMP_FRAME.as_ref()?;
    pattern
        .captures_iter(dump)
        .find(|c| &c["file"] == script)
        .and_then(|c| c["line"].parse().ok())
}

fn write_file(path: &Path, content: &str) -> Result<(), RunFailure> {
    std::fs::write(path, content).map_err(|e| RunFailure::io_error(path, e))
}

/// Files below `root`, relative, `/`-separated
fn list_files(root: &Path) -> Result<HashSet<String>, RunFailure> {
    let mut files = HashSet::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|e| RunFailure::io_error(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| RunFailure::io_error(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| RunFailure::io_error(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.insert(name);
            }
        }
    }
    Ok(files)
}

fn read_report(report_path: &Path, scratch: &Path, status: ExitStatus) -> Result<GuestReport, RunFailure> {
    let text = match std::fs::read_to_string(report_path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let stderr = std::fs::read_to_string(scratch.join(STDERR_FILE)).unwrap_or_default();
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(RunFailure::Interpreter(format!(
                "interpreter exited with {status} without a report\n{tail}"
            )));
        }
        Err(e) => return Err(RunFailure::io_error(report_path, e)),
    };
    serde_json::from_str(&text).map_err(|e| RunFailure::Interpreter(format!("malformed guest report: {e}")))
}

fn failure_from_exception(exception: GuestException, source: &str) -> RunFailure {
    let frames: Vec<SourceFrame> = exception
        .linenos
        .iter()
        .map(|&lineno| SourceFrame::from_source(source, lineno))
        .collect();
    match (exception.violation, exception.subject) {
        (Some(ViolationKind::Import), Some(module)) => RunFailure::ForbiddenImport { module, frames },
        (Some(ViolationKind::Builtin), Some(function)) => RunFailure::ForbiddenFunction { function, frames },
        (Some(ViolationKind::FileWrite), Some(filename)) => RunFailure::ForbiddenFileWrite { filename, frames },
        _ if exception.is_warning => RunFailure::Warning {
            category: exception.type_name,
            message: exception.message,
            frames,
        },
        _ => RunFailure::Exception {
            exception_type: exception.type_name,
            message: exception.message,
            frames,
        },
    }
}

fn warning_issue(warning: &IssuedWarning, source: &str) -> RunIssue {
    let lines = warning
        .lineno
        .map(|lineno| {
            let frame = SourceFrame::from_source(source, lineno);
            vec![(frame.lineno, frame.line)]
        })
        .unwrap_or_default();
    RunIssue::new(
        WARNING_CATEGORY,
        format!("Code produced an undesired warning:\n```\n{}\n```", warning.message),
        CodeProblem::NonBreakingRuntimeIssue,
    )
    .with_item(warning.category.clone())
    .with_instructions("Please see if you understand the cause of this warning and fix the code.")
    .with_comment("A warning was issued")
    .with_lines(lines)
}
