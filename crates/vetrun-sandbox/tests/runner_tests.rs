//! Code Runner Tests

use std::sync::Arc;
use vetrun_artifact::CodeProblem;
use vetrun_outputs::{OutputFileRequirement, OutputFileRequirements};
use vetrun_provenance::OverrideRegistry;
use vetrun_sandbox::prelude::*;
use vetrun_test_utils::{init_test_tracing, python_available};

fn executor() -> SandboxExecutor {
    let config = SandboxConfig::default().with_output_requirements(Some(
        OutputFileRequirements::new().with(OutputFileRequirement::text("output.txt")),
    ));
    SandboxExecutor::new(config).with_registry(Arc::new(OverrideRegistry::new()))
}

#[tokio::test]
async fn test_run_reads_back_output_file() {
    init_test_tracing();
    if !python_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let response = "Here is the code:\n```python\nwith open('output.txt', 'w') as f:\n    f.write('hello')\n```\n";
    let result = CodeRunner::new(response, executor())
        .with_output_file("output.txt")
        .run(dir.path())
        .await
        .unwrap();
    assert_eq!(result.code, "with open('output.txt', 'w') as f:\n    f.write('hello')");
    assert_eq!(result.output.as_deref(), Some("hello"));
    assert_eq!(result.created_files, vec!["output.txt"]);
}

#[tokio::test]
async fn test_missing_output_file() {
    init_test_tracing();
    if !python_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let failure = CodeRunner::new("```python\nx = 1\n```", executor())
        .with_output_file("output.txt")
        .run(dir.path())
        .await
        .unwrap_err();
    assert!(matches!(failure, RunFailure::OutputLoading { ref filename } if filename == "output.txt"));
    assert_eq!(failure.code_problem(), CodeProblem::MissingOutputFiles);
}

#[tokio::test]
async fn test_two_code_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let failure = CodeRunner::new("```python\na = 1\n```\n```python\nb = 2\n```", executor())
        .run(dir.path())
        .await
        .unwrap_err();
    assert_eq!(failure.code_problem(), CodeProblem::NotSingleBlock);
}

#[tokio::test]
async fn test_forbidden_import_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let failure = CodeRunner::new("```python\nimport pandas as pd\nimport os\n```", executor())
        .run(dir.path())
        .await
        .unwrap_err();
    match &failure {
        RunFailure::ForbiddenImport { module, frames } => {
            assert_eq!(module, "os");
            assert_eq!(frames[0].lineno, 2);
        }
        other => panic!("expected forbidden import, got {other:?}"),
    }
    assert_eq!(failure.code_problem(), CodeProblem::StaticCheck);
}
