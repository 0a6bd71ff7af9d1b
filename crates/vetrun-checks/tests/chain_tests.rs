//! Chain Tests
//!
//! Display items run through the analysis and display-stage chains.

use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use vetrun_artifact::{DisplayArgs, DisplayItem, IssueHistory, OneOrMany, RunIssues, Table};
use vetrun_checks::prelude::*;
use vetrun_outputs::{OutputFileRequirement, OutputFileRequirements};
use vetrun_provenance::{CompileOutcome, SharedDataChannel};
use vetrun_test_utils::{
    clean_table, figure_item, formatted_latex_item, init_test_tracing, latex_item, repeated_value_table,
    statistics_contexts,
};

/// Services whose compiler reports `width` for every target
fn services_with_width(width: f64) -> CheckServices {
    let channel = Arc::new(SharedDataChannel::new());
    channel.provide_compiler(move |_, _| CompileOutcome::Width(width));
    CheckServices::new().with_channel(channel)
}

fn categories(issues: &RunIssues) -> Vec<&str> {
    issues.iter().map(|i| i.category.as_str()).collect()
}

fn check(item: &DisplayItem, stage: Stage, services: &CheckServices) -> RunIssues {
    check_display_item(item, &[], stage, services).unwrap()
}

#[test]
fn test_repeated_value_and_trivial_index() {
    init_test_tracing();
    let services = services_with_width(0.5);
    let issues = check(&latex_item("df_x", repeated_value_table()), Stage::Analysis, &services);
    assert_eq!(
        categories(&issues),
        vec!["Overlapping values", "Problem with df index/columns"]
    );
    let texts: Vec<&str> = issues.iter().map(|i| i.issue.as_str()).collect();
    assert!(texts[0].contains("(0, 1), (1, 1), (2, 1)"));
    assert!(texts[1].contains("is just a range from 0 to 2"));
}

#[test]
fn test_forgiveness_silences_repeated_values() {
    let services = services_with_width(0.5);
    let item = latex_item("df_x", repeated_value_table());
    let mut history = IssueHistory::new();

    let mut first = check(&item, Stage::Analysis, &services);
    first.apply_forgiveness(&mut history);
    assert_eq!(first.len(), 2);

    let mut second = check(&item, Stage::Analysis, &services);
    second.apply_forgiveness(&mut history);
    assert_eq!(categories(&second), vec!["Problem with df index/columns"]);
}

#[test]
fn test_syntax_issues_stop_the_chain() {
    let services = services_with_width(0.5);
    let mut item = latex_item("df x", repeated_value_table());
    item.args.index = Some(false);
    let issues = check(&item, Stage::Analysis, &services);
    assert_eq!(issues.len(), 2);
    assert!(categories(&issues)
        .iter()
        .all(|c| *c == "Checking df_to_figure/df_to_latex for call syntax"));
}

#[test]
fn test_well_formed_display_table_passes() {
    let services = services_with_width(0.7);
    let item = formatted_latex_item("groups", clean_table());
    assert!(check(&item, Stage::DisplayItems, &services).is_empty());
    assert_eq!(services.cached_compilations(), 1);
}

#[test]
fn test_caption_issues_reach_annotation() {
    let services = services_with_width(0.7);
    let mut item = formatted_latex_item("groups", clean_table());
    item.args.caption = Some("Table of group means...".into());
    let issues = check(&item, Stage::DisplayItems, &services);
    let texts: Vec<&str> = issues.iter().map(|i| i.issue.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "The caption of the table should not start with \"Table\".",
            "The caption of the table should not contain \"...\"",
        ]
    );
}

#[test]
fn test_too_wide_table_stops_before_annotation() {
    let services = services_with_width(1.6);
    let mut item = formatted_latex_item("groups", clean_table());
    item.args.caption = None;
    let issues = check(&item, Stage::DisplayItems, &services);
    assert_eq!(categories(&issues), vec!["Table too wide"]);
}

#[test]
fn test_narrow_width_reaches_glossary_hint() {
    let services = services_with_width(0.5);
    let table = Table::from_rows(&["BMI"], vec![vec![vetrun_artifact::Cell::Float(22.5)]])
        .with_index(vetrun_artifact::Axis::new(vec!["Control".into()]));
    let item = formatted_latex_item("groups", table);
    let issues = check(&item, Stage::DisplayItems, &services);
    let issue = issues.iter().next().unwrap();
    assert_eq!(issue.category, "Displayitem glossary");
    assert!(issue.instructions.contains("is not too wide"));
}

#[test]
fn test_display_stage_requires_loaded_df() {
    let services = services_with_width(0.5);
    let item = latex_item("df_groups_formatted", clean_table());
    let issues = check(&item, Stage::DisplayItems, &services);
    assert_eq!(categories(&issues), vec!["File continuity"]);
    // analysis items carry no lineage
    assert!(check(&item, Stage::Analysis, &services).is_empty());
}

#[test]
fn test_figure_compilation_failure() {
    let channel = Arc::new(SharedDataChannel::new());
    channel.provide_compiler(|_, _| CompileOutcome::Failed("! Missing $ inserted.".into()));
    let services = CheckServices::new().with_channel(channel);
    let table = clean_table();
    let mut args = DisplayArgs::default()
        .with_kind("bar")
        .with_y(OneOrMany::One("Mean".into()))
        .with_caption("Group means")
        .with_note("Error bars are omitted.");
    args.y_p_value = Some(OneOrMany::One("P-value".into()));
    let item = figure_item("df_groups_formatted", table, args).with_lineage(vec!["df_groups".into()]);
    let issues = check(&item, Stage::DisplayItems, &services);
    let issue = issues.iter().next().unwrap();
    assert_eq!(issue.category, "Figure pdflatex compilation failure");
    assert!(issue.issue.contains("! Missing $ inserted."));
}

#[test]
fn test_items_of_one_run_are_checked_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let contexts = statistics_contexts();
    let seal = contexts.seal().as_str().to_string();
    for name in ["df_a", "df_b"] {
        let item = latex_item(name, clean_table());
        fs::write(dir.path().join(format!("{name}.df.json")), item.to_json(&seal).unwrap()).unwrap();
    }
    let requirements =
        OutputFileRequirements::new().with(OutputFileRequirement::display_items("*.df.json"));
    let created = vec!["df_b.df.json".to_string(), "df_a.df.json".to_string()];
    let with_content = requirements
        .convert_to_with_content(&created, dir.path(), &contexts)
        .unwrap();

    let services = services_with_width(0.5);
    let issues = check_display_items(&with_content, Stage::Analysis, &services).unwrap();
    assert_eq!(issues.len(), 1);
    let issue = issues.iter().next().unwrap();
    assert_eq!(issue.item.as_deref(), Some("df_b"));
    assert!(issue.issue.contains("overlap with values in table \"df_a\""));
}
