//! Checker chains per workflow stage

use crate::checker::{DfChecker, DfCheckerKind};
use crate::error::CheckerResult;
use crate::framework::{ChainChecker, Checker};
use crate::services::CheckServices;
use vetrun_artifact::{DisplayFunction, DisplayItem, RunIssues};
use vetrun_outputs::OutputFileRequirementsWithContent;

/// Workflow stage producing the display items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Analysis code creating the raw dataframes
    Analysis,
    /// Formatting code turning loaded dataframes into paper-ready items
    DisplayItems,
}

const ANALYSIS_TABLE: &[DfCheckerKind] = &[DfCheckerKind::TableSyntax, DfCheckerKind::TableContent];
const ANALYSIS_FIGURE: &[DfCheckerKind] = &[DfCheckerKind::FigureSyntax, DfCheckerKind::FigureContent];
const DISPLAY_TABLE: &[DfCheckerKind] = &[
    DfCheckerKind::TableSyntax,
    DfCheckerKind::TableContent,
    DfCheckerKind::Continuity,
    DfCheckerKind::SecondTableContent,
    DfCheckerKind::TableCompilation,
    DfCheckerKind::Annotation,
];
const DISPLAY_FIGURE: &[DfCheckerKind] = &[
    DfCheckerKind::FigureSyntax,
    DfCheckerKind::FigureContent,
    DfCheckerKind::Continuity,
    DfCheckerKind::SecondFigureContent,
    DfCheckerKind::FigureCompilation,
    DfCheckerKind::Annotation,
];

/// Checker kinds run, in order, for a `function` call at `stage`
#[must_use]
pub fn chain_kinds(stage: Stage, function: DisplayFunction) -> &'static [DfCheckerKind] {
    match (stage, function) {
        (Stage::Analysis, DisplayFunction::Latex) => ANALYSIS_TABLE,
        (Stage::Analysis, DisplayFunction::Figure) => ANALYSIS_FIGURE,
        (Stage::DisplayItems, DisplayFunction::Latex) => DISPLAY_TABLE,
        (Stage::DisplayItems, DisplayFunction::Figure) => DISPLAY_FIGURE,
    }
}

/// Run the chain of `item`; `prior` are the items created before it in the same run
///
/// # Errors
///
/// Propagates checker contract violations.
pub fn check_display_item<'a>(
    item: &'a DisplayItem,
    prior: &'a [&'a DisplayItem],
    stage: Stage,
    services: &'a CheckServices,
) -> CheckerResult<RunIssues> {
    let checkers: Vec<Box<dyn Checker + 'a>> = chain_kinds(stage, item.function)
        .iter()
        .map(|kind| Box::new(DfChecker::new(*kind, item, prior, services)) as Box<dyn Checker + 'a>)
        .collect();
    let (issues, results) = ChainChecker::new(checkers).run()?;
    tracing::debug!(
        filename = %item.filename,
        ?stage,
        issues = issues.len(),
        width = ?results.get(crate::checker::WIDTH_KEY),
        "display item checked"
    );
    Ok(issues)
}

/// Run the chain of every display item of `with_content`, in creation order
///
/// # Errors
///
/// Propagates checker contract violations.
pub fn check_display_items(
    with_content: &OutputFileRequirementsWithContent,
    stage: Stage,
    services: &CheckServices,
) -> CheckerResult<RunIssues> {
    let items = with_content.display_items();
    let mut issues = RunIssues::new();
    for (i, item) in items.iter().enumerate() {
        issues.extend(check_display_item(item, &items[..i], stage, services)?);
    }
    Ok(issues)
}
