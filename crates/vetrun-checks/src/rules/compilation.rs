//! Compilation rules: typeset the item and measure its width

use crate::checker::DfChecker;
use crate::framework::{Rule, RuleOutcome};
use crate::limits::{MAX_TABLE_WIDTH, MAX_TRANSPOSED_WIDTH};
use vetrun_artifact::{render_latex, DisplayItem, RenderMode, Table};
use vetrun_provenance::CompileOutcome;

/// Labels up to this many characters are never reported as long
const SHORT_LABEL_CHARS: usize = 6;
const LONG_LABELS_SHOWN: usize = 3;

pub(crate) fn table_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_compilation_and_get_width]
}

pub(crate) fn figure_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_figure_compilation]
}

/// Render `item` with p-values shown as thresholds
fn render(item: &DisplayItem) -> String {
    render_latex(item, RenderMode::SmallerThan)
}

/// The call applied to `df.T`: row and column headers trade places
fn transposed_call(item: &DisplayItem) -> DisplayItem {
    let mut transposed = item.transposed();
    std::mem::swap(&mut transposed.args.index, &mut transposed.args.header);
    transposed
}

fn char_len(label: &str) -> usize {
    label.chars().count()
}

/// Longest row labels, longest first
fn longest_index_labels(table: &Table) -> Vec<String> {
    let mut labels = table.row_labels(false, false);
    labels.sort_by_key(|l| std::cmp::Reverse(char_len(l)));
    labels.dedup();
    labels.truncate(LONG_LABELS_SHOWN);
    labels
}

/// Column labels wider than every value rendered below them, longest first
fn longest_column_labels_relative_to_content(table: &Table) -> Vec<String> {
    let mut labels: Vec<String> = table
        .column_labels(false, false)
        .into_iter()
        .enumerate()
        .filter(|(col, label)| {
            let content = table
                .column(*col)
                .map(|cell| char_len(&cell.render(RenderMode::SmallerThan)))
                .max()
                .unwrap_or(0);
            char_len(label) > content
        })
        .map(|(_, label)| label)
        .collect();
    labels.sort_by_key(|l| std::cmp::Reverse(char_len(l)));
    labels.truncate(LONG_LABELS_SHOWN);
    labels
}

fn long_only(labels: Vec<String>) -> Vec<String> {
    labels.into_iter().filter(|l| char_len(l) > SHORT_LABEL_CHARS).collect()
}

fn check_compilation_and_get_width(c: &mut DfChecker<'_>) -> RuleOutcome {
    let latex = render(c.item());
    let outcome = c
        .services()
        .compile(&latex, c.filename())
        .unwrap_or(CompileOutcome::Width(0.0));
    let width = match outcome {
        CompileOutcome::Failed(error) => {
            c.set_width(None);
            let issue = c.issue_in(
                "Table pdflatex compilation failure",
                format!(
                    "Here is the created table:\n\n```latex\n{latex}\n```\n\n\
                     When trying to compile it using pdflatex, I got the following error:\n\n{error}\n"
                ),
            );
            c.push(issue);
            return RuleOutcome::Continue;
        }
        CompileOutcome::Width(width) => width,
    };
    c.set_width(Some(width));
    if width <= MAX_TABLE_WIDTH {
        return RuleOutcome::Continue;
    }
    tracing::debug!(filename = c.filename(), width, "table too wide");

    let transposed = render(&transposed_call(c.item()));
    let transpose_target = format!("{}_transpose", c.filename());
    let transpose_message = match c.services().compile(&transposed, &transpose_target) {
        Some(CompileOutcome::Width(w)) if w < MAX_TRANSPOSED_WIDTH => {
            "- Alternatively, consider completely transposing the table. Use `df = df.T`."
        }
        _ => "",
    };

    let mut index_note = String::new();
    let mut column_note = String::new();
    if c.item().shows_index() {
        let index_labels = long_only(longest_index_labels(c.table()));
        let column_labels = long_only(longest_column_labels_relative_to_content(c.table()));
        if !index_labels.is_empty() {
            index_note = format!(
                "\n- Rename any long index labels to shorter names (for instance, some long label(s) in \
                 the index are: {}). Use `df.rename(index=...)`\n",
                crate::checker::py_list(&index_labels)
            );
        }
        if !column_labels.is_empty() {
            column_note = format!(
                "\n- Rename any long column labels to shorter names (for instance, some long label(s) in \
                 the columns are: {}). Use `df.rename(columns=...)`\n",
                crate::checker::py_list(&column_labels)
            );
        }
    }
    let drop_column_message = if index_note.is_empty() && column_note.is_empty() && transpose_message.is_empty() {
        "\n- Drop unnecessary columns. If the labels cannot be shortened much, consider whether there might be \
         any unnecessary columns that we can drop. Use `df_to_latex(df, filename, columns=...)`.\n"
    } else {
        ""
    };

    let issue = c
        .issue_in(
            "Table too wide",
            format!(
                "Here is the created table:\n\n```latex\n{latex}\n```\n\
                 I tried to compile it, but the table is too wide."
            ),
        )
        .with_instructions(format!(
            "Please change the code to make the table narrower. Consider any of the following options:\n\
             {index_note}{column_note}{drop_column_message}{transpose_message}"
        ));
    c.push(issue);
    RuleOutcome::Continue
}

fn check_figure_compilation(c: &mut DfChecker<'_>) -> RuleOutcome {
    c.set_width(None);
    let latex = render(c.item());
    if let Some(CompileOutcome::Failed(error)) = c.services().compile(&latex, c.filename()) {
        let issue = c.issue_in(
            "Figure pdflatex compilation failure",
            format!(
                "Here is the created figure:\n\n```latex\n{latex}\n```\n\n\
                 When trying to compile it using pdflatex, I got the following error:\n\n{error}\n"
            ),
        );
        c.push(issue);
    }
    RuleOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::DfCheckerKind;
    use crate::framework::Checker;
    use crate::services::CheckServices;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use vetrun_artifact::{Axis, Cell, Label};
    use vetrun_provenance::SharedDataChannel;
    use vetrun_test_utils::{clean_table, latex_item};

    fn services(compile: impl Fn(&str, &str) -> CompileOutcome + Send + Sync + 'static) -> CheckServices {
        let channel = Arc::new(SharedDataChannel::new());
        channel.provide_compiler(compile);
        CheckServices::new().with_channel(channel)
    }

    #[test]
    fn width_is_recorded() {
        let services = services(|_, _| CompileOutcome::Width(0.6));
        let item = latex_item("df_groups", clean_table());
        let (issues, results) = DfChecker::new(DfCheckerKind::TableCompilation, &item, &[], &services)
            .run()
            .unwrap();
        assert!(issues.is_empty());
        assert_eq!(results.get(crate::checker::WIDTH_KEY), Some(&serde_json::json!(0.6)));
    }

    #[test]
    fn missing_compiler_counts_as_zero_width() {
        let services = CheckServices::new().with_channel(Arc::new(SharedDataChannel::new()));
        let item = latex_item("df_groups", clean_table());
        let (issues, results) = DfChecker::new(DfCheckerKind::TableCompilation, &item, &[], &services)
            .run()
            .unwrap();
        assert!(issues.is_empty());
        assert_eq!(results.get(crate::checker::WIDTH_KEY), Some(&serde_json::json!(0.0)));
    }

    #[test]
    fn compilation_failure_is_reported() {
        let services = services(|_, _| CompileOutcome::Failed("Undefined control sequence".into()));
        let item = latex_item("df_groups", clean_table());
        let (issues, _) = DfChecker::new(DfCheckerKind::TableCompilation, &item, &[], &services)
            .run()
            .unwrap();
        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.category, "Table pdflatex compilation failure");
        assert!(issue.issue.contains("Undefined control sequence"));
    }

    #[test]
    fn wide_table_suggests_transposing() {
        let services = services(|_, target| {
            CompileOutcome::Width(if target.ends_with("_transpose") { 0.9 } else { 1.6 })
        });
        let item = latex_item("df_groups", clean_table());
        let (issues, _) = DfChecker::new(DfCheckerKind::TableCompilation, &item, &[], &services)
            .run()
            .unwrap();
        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.category, "Table too wide");
        assert!(issue.instructions.contains("`df = df.T`"));
        assert!(!issue.instructions.contains("Drop unnecessary columns"));
    }

    #[test]
    fn wide_table_without_other_hints_suggests_dropping_columns() {
        let services = services(|_, _| CompileOutcome::Width(1.6));
        let table = Table::from_rows(
            &["Mean", "SD"],
            vec![vec![Cell::Float(1.25), Cell::Float(0.5)], vec![Cell::Float(2.75), Cell::Float(0.25)]],
        )
        .with_index(Axis::new(vec![Label::from("Ctrl"), Label::from("Trt")]));
        let item = latex_item("df_groups", table);
        let (issues, _) = DfChecker::new(DfCheckerKind::TableCompilation, &item, &[], &services)
            .run()
            .unwrap();
        let instructions = &issues.iter().next().unwrap().instructions;
        assert!(instructions.contains("Drop unnecessary columns"));
        assert!(!instructions.contains("Rename any long"));
    }

    #[test]
    fn long_labels_are_named() {
        let table = Table::from_rows(
            &["Baseline measurement", "SD"],
            vec![vec![Cell::Float(1.5), Cell::Float(0.5)], vec![Cell::Float(2.5), Cell::Float(0.25)]],
        )
        .with_index(Axis::new(vec![Label::from("Participants in control"), Label::from("Treated")]));
        assert_eq!(
            long_only(longest_index_labels(&table)),
            vec!["Participants in control".to_string(), "Treated".to_string()]
        );
        assert_eq!(
            long_only(longest_column_labels_relative_to_content(&table)),
            vec!["Baseline measurement".to_string()]
        );
    }

    #[test]
    fn transposed_call_swaps_headers() {
        let mut item = latex_item("df_groups", clean_table());
        item.args.header = Some(false);
        let transposed = transposed_call(&item);
        assert_eq!(transposed.args.index, Some(false));
        assert_eq!(transposed.args.header, None);
        assert_eq!(transposed.table.shape(), (3, 2));
    }
}
