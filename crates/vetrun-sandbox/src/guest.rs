//! Host side of the guest protocol
//!
//! The interpreter runs `guest/bootstrap.py` with a JSON [`GuestConfig`] and
//! answers with a JSON [`GuestReport`]. Both files live in the scratch
//! directory of one execution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use vetrun_provenance::InterceptTarget;

/// Bootstrap script run by the interpreter
pub const BOOTSTRAP_SOURCE: &str = include_str!("guest/bootstrap.py");

/// Settings handed to the bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestConfig {
    /// Folder the script runs in; write globs match paths relative to it
    pub run_folder: PathBuf,
    /// Generated script
    pub script_path: PathBuf,
    /// Where the report is written
    pub report_path: PathBuf,
    /// Where a stack dump is written on SIGUSR1
    pub stack_dump_path: PathBuf,
    /// Top-level packages the script may import
    pub allowed_imports: Option<Vec<String>>,
    /// Built-ins the script may not call
    pub forbidden_builtins: Vec<String>,
    /// Globs of files that may be opened for writing
    pub allowed_write_files: Option<Vec<String>>,
    /// Warning categories raised as exceptions
    pub warnings_to_raise: Vec<String>,
    /// Warning categories recorded as issues
    pub warnings_to_issue: Vec<String>,
    /// Functions whose results are tagged
    pub intercept_targets: Vec<InterceptTarget>,
    /// Seal stamped on tags written by this run
    pub provenance_seal: String,
    /// Seals of earlier runs whose tags `load_df` honours
    pub trusted_seals: Vec<String>,
}

/// Which guard stopped the script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Import hook
    Import,
    /// Forbidden built-in
    Builtin,
    /// `open` for writing
    FileWrite,
}

/// Uncaught exception of the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestException {
    /// Exception class name
    pub type_name: String,
    /// Exception message
    pub message: String,
    /// Whether the exception is a promoted warning
    #[serde(default)]
    pub is_warning: bool,
    /// Guard that raised it, if any
    #[serde(default)]
    pub violation: Option<ViolationKind>,
    /// Module, function or file the guard refused
    #[serde(default)]
    pub subject: Option<String>,
    /// Script line numbers of the traceback, outermost first
    #[serde(default)]
    pub linenos: Vec<usize>,
}

/// Warning recorded as an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedWarning {
    /// Warning class name
    pub category: String,
    /// Warning message
    pub message: String,
    /// Innermost script line that led to the warning
    #[serde(default)]
    pub lineno: Option<usize>,
}

/// Top-level binding left by the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NamespaceEntry {
    /// Function or class
    Callable {
        /// `__name__` of the callable
        name: String,
    },
    /// JSON-representable value
    Value {
        /// The value
        value: serde_json::Value,
    },
    /// Anything else
    Object {
        /// Class name
        type_name: String,
    },
}

/// Top-level bindings by name, in definition order
pub type Namespace = IndexMap<String, NamespaceEntry>;

/// Whether the script ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    /// Completed
    Ok,
    /// Stopped by an exception
    Error,
}

/// Report written by the bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestReport {
    /// Outcome
    pub status: GuestStatus,
    /// Exception, when `status` is `error`
    #[serde(default)]
    pub exception: Option<GuestException>,
    /// Namespace snapshot
    #[serde(default)]
    pub namespace: Namespace,
    /// Warnings recorded as issues
    #[serde(default)]
    pub issued_warnings: Vec<IssuedWarning>,
    /// Calls per intercepted function
    #[serde(default)]
    pub intercepted_calls: BTreeMap<String, u64>,
}
