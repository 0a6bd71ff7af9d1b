//! With-Content Tests
//!
//! Files written into a run folder are matched, decoded, deleted or kept.

use std::fs;
use vetrun_artifact::{Cell, DisplayFunction, DisplayItem, ProvenanceValue, RenderMode, Table};
use vetrun_outputs::prelude::*;
use vetrun_provenance::{OverrideContext, RunContexts};

fn requirements() -> OutputFileRequirements {
    OutputFileRequirements::new()
        .with(OutputFileRequirement::numeric_text("results.txt"))
        .with(OutputFileRequirement::display_items("*.df.json"))
        .with(OutputFileRequirement::data("*.csv"))
}

fn write_display_item(dir: &std::path::Path, contexts: &RunContexts) {
    let table = Table::from_rows(
        &["p"],
        vec![vec![Cell::Provenance(ProvenanceValue::new(0.02, "ttest_ind", Some("pvalue".into())))]],
    );
    let item = DisplayItem::new(DisplayFunction::Latex, "df_tests", table);
    fs::write(dir.join("df_tests.df.json"), item.to_json(contexts.seal().as_str()).unwrap()).unwrap();
}

#[test]
fn test_convert_decodes_and_deletes() {
    let dir = tempfile::tempdir().unwrap();
    let contexts = RunContexts::new(vec![OverrideContext::statistics()]);
    fs::write(dir.path().join("results.txt"), "accuracy: 0.912345678901234\n").unwrap();
    fs::write(dir.path().join("raw.csv"), "a,b\n1,2\n").unwrap();
    write_display_item(dir.path(), &contexts);

    let created = vec![
        "results.txt".to_string(),
        "raw.csv".to_string(),
        "df_tests.df.json".to_string(),
    ];
    let with_content = requirements()
        .convert_to_with_content(&created, dir.path(), &contexts)
        .unwrap();

    assert!(!dir.path().join("results.txt").exists());
    assert!(dir.path().join("raw.csv").exists());
    assert!(dir.path().join("df_tests.df.json").exists());

    assert_eq!(with_content.created_files(), vec!["results.txt", "df_tests.df.json", "raw.csv"]);
    assert_eq!(with_content.created_content_files(None), vec!["results.txt", "df_tests.df.json"]);
    assert_eq!(with_content.created_data_files(), vec!["df_tests.df.json", "raw.csv"]);

    let items = with_content.display_items();
    assert_eq!(items.len(), 1);
    assert!(items[0].table.cell(0, 0).unwrap().provenance().is_some());

    let pretty = with_content.pretty_contents(RenderMode::Raw, false, Some("*.txt"), true);
    assert_eq!(pretty, "\"results.txt\":\n```output\naccuracy: 0.9123\n```\n");
    assert_eq!(with_content.description(RenderMode::Raw, Some("*.txt")), pretty);
    assert!(with_content.content_issues().is_empty());
}

#[test]
fn test_empty_output_is_an_issue() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("results.txt"), "").unwrap();
    let with_content = requirements()
        .convert_to_with_content(&["results.txt".to_string()], dir.path(), &RunContexts::new(vec![]))
        .unwrap();
    let issues = with_content.content_issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(with_content.single_output(RenderMode::Raw).as_deref(), Some(""));
}

#[test]
fn test_hypertargets_use_requirement_prefix() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("results.txt"), "n = 42").unwrap();
    let reqs = OutputFileRequirements::new()
        .with(OutputFileRequirement::text("results.txt").with_hypertarget_prefixes(vec!["R".into()]));
    let with_content = reqs
        .convert_to_with_content(&["results.txt".to_string()], dir.path(), &RunContexts::new(vec![]))
        .unwrap();
    assert_eq!(
        with_content.pretty_contents(RenderMode::Raw, true, None, false),
        r"n = \hypertarget{R0}{42}"
    );
}

#[test]
fn test_delete_all_created_files() {
    let dir = tempfile::tempdir().unwrap();
    let contexts = RunContexts::new(vec![]);
    write_display_item(dir.path(), &contexts);
    let with_content = requirements()
        .convert_to_with_content(&["df_tests.df.json".to_string()], dir.path(), &contexts)
        .unwrap();
    with_content.delete_all_created_files().unwrap();
    assert!(!dir.path().join("df_tests.df.json").exists());
}
