//! Testing utilities for vetrun workspace
//!
//! Shared test helpers, fixtures, and interpreter capability checks.

#![allow(missing_docs)]

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::process::{Command, Stdio};
use tracing_subscriber::EnvFilter;
use vetrun_artifact::{Cell, DisplayArgs, DisplayFunction, DisplayItem, Label, ProvenanceValue, Table};
use vetrun_provenance::{OverrideContext, RunContexts};

pub const PYTHON: &str = "python3";

static TRACING: OnceCell<()> = OnceCell::new();
static PYTHON_MODULES: Lazy<Mutex<HashMap<String, bool>>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Install a test-writer subscriber filtered by `RUST_LOG`; later calls are no-ops
pub fn init_test_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

fn interpreter_runs(code: &str) -> bool {
    Command::new(PYTHON)
        .args(["-c", code])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Whether `python3` can be started
pub fn python_available() -> bool {
    python_has_module("sys")
}

/// Whether `python3` can import `module`
pub fn python_has_module(module: &str) -> bool {
    let mut known = PYTHON_MODULES.lock();
    *known
        .entry(module.to_string())
        .or_insert_with(|| interpreter_runs(&format!("import {module}")))
}

/// Contexts with the default statistics targets and a fresh seal
pub fn statistics_contexts() -> RunContexts {
    RunContexts::new(vec![OverrideContext::statistics()])
}

pub fn tagged(value: f64, created_by: &str) -> Cell {
    Cell::Provenance(ProvenanceValue::new(value, created_by, Some("pvalue".to_string())))
}

/// 3 x 3 table with a trivial `0..3` index and the same non-integer value
/// in every cell of column `b`
#[allow(clippy::approx_constant)]
pub fn repeated_value_table() -> Table {
    Table::from_rows(
        &["a", "b", "c"],
        vec![
            vec![Cell::Int(1), Cell::Float(3.14), Cell::Str("x".into())],
            vec![Cell::Int(2), Cell::Float(3.14), Cell::Str("y".into())],
            vec![Cell::Int(3), Cell::Float(3.14), Cell::Str("z".into())],
        ],
    )
}

/// Well-formed table: labelled rows, distinct values, a tagged p-value column
pub fn clean_table() -> Table {
    Table::from_rows(
        &["Mean", "SD", "P-value"],
        vec![
            vec![Cell::Float(1.25), Cell::Float(0.5), tagged(0.003, "ttest_ind")],
            vec![Cell::Float(2.75), Cell::Float(0.25), tagged(0.04, "ttest_ind")],
        ],
    )
    .with_index(vetrun_artifact::Axis::new(vec![Label::from("Control"), Label::from("Treated")]))
}

pub fn latex_item(filename: &str, table: Table) -> DisplayItem {
    DisplayItem::new(DisplayFunction::Latex, filename, table)
}

/// Display-stage table derived from `df_<name>` with caption and note
pub fn formatted_latex_item(name: &str, table: Table) -> DisplayItem {
    DisplayItem::new(DisplayFunction::Latex, format!("df_{name}_formatted"), table)
        .with_lineage(vec![format!("df_{name}")])
        .with_args(
            DisplayArgs::default()
                .with_caption("Group means of the primary outcome")
                .with_note("Values are means over all participants."),
        )
}

pub fn figure_item(filename: &str, table: Table, args: DisplayArgs) -> DisplayItem {
    DisplayItem::new(DisplayFunction::Figure, filename, table).with_args(args)
}
