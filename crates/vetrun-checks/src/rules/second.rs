//! Display-stage rules applied once the item is otherwise well-formed

use crate::checker::{column_has_p_values, DfChecker};
use crate::framework::{Rule, RuleOutcome};
use vetrun_artifact::Cell;

/// Columns need more rows than this to be reported as constant
const MIN_CONSTANT_COLUMN_ROWS: usize = 5;

/// Case-sensitivity of each odds-ratio term
const ODDS_RATIO_TERMS: [(&str, bool); 2] = [("odds ratio", false), ("OR", true)];

pub(crate) fn table_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_for_repetitive_value_in_column]
}

pub(crate) fn figure_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_log_scale_for_odds_ratios]
}

/// Whether a constant column holding `value` is worth reporting
fn is_reportable_constant(value: &Cell) -> bool {
    match value {
        Cell::Int(v) => *v >= 10,
        Cell::Float(v) => v.round() != *v || *v >= 10.0,
        _ => false,
    }
}

fn check_for_repetitive_value_in_column(c: &mut DfChecker<'_>) -> RuleOutcome {
    let table = c.table();
    for (col, label) in table.column_labels(false, false).into_iter().enumerate() {
        if column_has_p_values(table, col) {
            continue;
        }
        let mut values = table.column(col);
        let Some(first) = values.next() else { continue };
        let rows = table.shape().0;
        if rows <= MIN_CONSTANT_COLUMN_ROWS || !values.all(|v| v == first) || !is_reportable_constant(first) {
            continue;
        }
        let func = c.func_name();
        let noun = c.noun();
        let issue = c
            .issue_in(
                "Same value throughout a column",
                format!("The column \"{label}\" has the same unique value for all rows."),
            )
            .with_instructions(format!(
                "Please revise the code so that it:\n\
                 * Finds the unique values (use `{label}_unique = df[\"{label}\"].unique()`)\n\
                 * Asserts that there is only one value. (use `assert len({label}_unique) == 1`)\n\
                 * Drops the column from the df (use `df.drop(columns=[\"{label}\"])`)\n\
                 * Adds the unique value, {label}_unique[0], in the {noun} note \
                 (e.g., `{func}(..., note=f'For all rows, the {label} is {{{label}_unique[0]}}')`)\n\n\
                 There is no need to add corresponding comments to the code."
            ));
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_log_scale_for_odds_ratios(c: &mut DfChecker<'_>) -> RuleOutcome {
    let args = c.args();
    for (axis, label, is_log) in [('x', &args.xlabel, args.logx), ('y', &args.ylabel, args.logy)] {
        let Some(label) = label else { continue };
        if is_log == Some(true) {
            continue;
        }
        let term = ODDS_RATIO_TERMS.iter().find_map(|(term, case_sensitive)| {
            let haystack = if *case_sensitive { label.clone() } else { label.to_lowercase() };
            haystack.contains(term).then_some(*term)
        });
        if let Some(term) = term {
            let issue = c
                .issue_in(
                    "Plotting odds ratios",
                    format!(
                        "The {axis}-axis label contains the term \"{term}\". Are you plotting odds ratios?\n\
                         If so, odds ratios are typically shown on a log scale; \
                         consider using a log scale for the {axis}-axis."
                    ),
                )
                .with_instructions(format!(
                    "Consider using a log scale for the {axis}-axis (setting `log{axis}=True`)."
                ))
                .with_forgive_after(1);
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}
