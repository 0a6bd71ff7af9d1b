//! End-to-End Tests
//!
//! Model responses through execution, output collection and checker chains.
//! Tests needing an interpreter are skipped when no `python3` is installed.

use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use vetrun_checks::CheckServices;
use vetrun_core::prelude::*;
use vetrun_outputs::{OutputFileRequirement, OutputFileRequirements, MISSING_OUTPUT_CATEGORY};
use vetrun_provenance::OverrideRegistry;
use vetrun_sandbox::{SandboxConfig, SandboxExecutor};
use vetrun_test_utils::{init_test_tracing, python_available, python_has_module};

macro_rules! require_python {
    () => {
        init_test_tracing();
        if !python_available() {
            eprintln!("python3 not available, skipping");
            return;
        }
    };
}

fn display_item_pipeline(dir: &Path) -> Pipeline {
    let sandbox = SandboxConfig::default().with_output_requirements(Some(
        OutputFileRequirements::new().with(OutputFileRequirement::display_items("*.df.json")),
    ));
    let config = PipelineConfig::new().with_sandbox(sandbox).with_run_folder(dir);
    let executor = SandboxExecutor::new(config.sandbox.clone()).with_registry(Arc::new(OverrideRegistry::new()));
    Pipeline::with_parts(config, executor, CheckServices::new())
}

fn categories(report: &PipelineReport) -> Vec<&str> {
    report.issues.iter().map(|i| i.category.as_str()).collect()
}

const REPEATED_VALUES: &str = "\
The table:
```python
df = {'a': [1, 2, 3], 'b': [3.14, 3.14, 3.14], 'c': ['x', 'y', 'z']}
df_to_latex(df, 'df_x')
```
";

#[tokio::test]
async fn test_repeated_values_are_forgiven_on_the_next_run() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let pipeline = display_item_pipeline(dir.path());
    let mut history = IssueHistory::new();

    let first = pipeline.run_response(REPEATED_VALUES, &mut history).await.unwrap();
    assert_eq!(
        categories(&first),
        vec!["Overlapping values", "Problem with df index/columns"]
    );
    assert_eq!(first.outputs.display_items().len(), 1);
    assert!(first.feedback(false).contains("is just a range from 0 to 2"));
    // display items are kept; only files new to the run folder count as created
    first.outputs.delete_all_created_files().unwrap();

    let second = pipeline.run_response(REPEATED_VALUES, &mut history).await.unwrap();
    assert_eq!(categories(&second), vec!["Problem with df index/columns"]);
    assert_eq!(pipeline.trusted_seals().len(), 2);
}

fn p_value_figure(p_values: &str) -> String {
    format!(
        "\
```python
import pandas as pd
from scipy.stats import ttest_ind
treated = ttest_ind([1.1, 2.3, 2.9, 4.2], [5.0, 6.1, 7.3, 8.8])
control = ttest_ind([1.1, 2.3, 2.9, 4.2], [1.0, 2.5, 3.1, 4.4])
df = pd.DataFrame({{'Mean': [6.8, 2.75], 'P': {p_values}}}, index=['Trt', 'Ctrl'])
df_to_figure(df, 'df_effects', kind='bar', y='Mean', y_p_value='P')
```
"
    )
}

#[tokio::test]
async fn test_p_values_from_statistics_calls_are_tagged() {
    require_python!();
    if !python_has_module("scipy") || !python_has_module("pandas") {
        eprintln!("scipy/pandas not available, skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let pipeline = display_item_pipeline(dir.path());
    let mut history = IssueHistory::new();

    let tagged = pipeline
        .run_response(&p_value_figure("[treated.pvalue, control.pvalue]"), &mut history)
        .await
        .unwrap();
    assert!(tagged.is_clean(), "{}", tagged.feedback(false));
    assert_eq!(tagged.contexts.call_counts().get("ttest_ind"), Some(&2));
    tagged.outputs.delete_all_created_files().unwrap();

    let literal = pipeline
        .run_response(&p_value_figure("[0.001, 0.04]"), &mut history)
        .await
        .unwrap();
    assert_eq!(categories(&literal), vec!["Plotting P-values"]);
    assert!(literal.feedback(false).contains("y_p_value=['P'] are not p-values"));
}

#[tokio::test]
async fn test_missing_display_items_skip_the_chains() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let pipeline = display_item_pipeline(dir.path());
    let mut history = IssueHistory::new();

    let report = pipeline
        .run_response("```python\nx = 1\n```", &mut history)
        .await
        .unwrap();
    assert_eq!(categories(&report), vec![MISSING_OUTPUT_CATEGORY]);
    assert!(!report.is_clean());
    assert_eq!(report.issues.iter().next().unwrap().item.as_deref(), Some("*.df.json"));
}

#[tokio::test]
async fn test_runtime_failure_is_an_error() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let pipeline = display_item_pipeline(dir.path());
    let mut history = IssueHistory::new();

    let err = pipeline
        .run_response("```python\nraise ValueError('bad input')\n```", &mut history)
        .await
        .unwrap_err();
    let issue = err.to_run_issue().unwrap();
    assert!(issue.issue.contains("bad input"));
}

#[tokio::test]
async fn test_pipeline_from_config_file() {
    init_test_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vetrun.toml");
    std::fs::write(
        &path,
        format!(
            "stage = \"display_items\"\nrun_folder = \"{}\"\nmost_severe_only = false\n",
            dir.path().display()
        ),
    )
    .unwrap();
    let config = PipelineConfig::from_toml_file(&path).unwrap();
    assert_eq!(config.stage, Stage::DisplayItems);
    assert_eq!(config.run_folder, dir.path());

    let pipeline = Pipeline::new(config);
    let mut history = IssueHistory::new();
    let err = pipeline.run_response("no code here", &mut history).await.unwrap_err();
    assert!(matches!(err, PipelineError::Run(_)));
}
