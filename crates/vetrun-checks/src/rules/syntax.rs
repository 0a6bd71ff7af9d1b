//! Call-syntax rules: checks that do not look at the table values

use crate::checker::{py_list, DfChecker};
use crate::framework::{Rule, RuleOutcome};
use crate::limits::ALLOWED_PLOT_KINDS;
use once_cell::sync::Lazy;
use regex::Regex;

static FILENAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^df_\w+$").expect("valid filename regex"));

pub(crate) fn table_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_filename, check_no_label, check_index_is_true, check_columns_arg_is_not_used]
}

pub(crate) fn figure_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![
        check_filename,
        check_no_label,
        check_kind_arg,
        check_y_arg,
        check_yerr_arg,
        check_err_and_ci_are_exclusive,
        check_specified_columns_exist,
    ]
}

fn check_filename(c: &mut DfChecker<'_>) -> RuleOutcome {
    if !FILENAME.is_match(c.filename()) {
        let issue = c.issue(format!(
            "The filename of the {} should be in the format `df_<alphanumeric>`, but got \"{}\".",
            c.noun(),
            c.filename()
        ));
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_no_label(c: &mut DfChecker<'_>) -> RuleOutcome {
    if c.args().label.as_deref().is_some_and(|l| !l.is_empty()) {
        let issue = c
            .issue(
                "The `label` argument should not be used in `df_to_figure` or `df_to_latex`; \
                 It is automatically generated from the filename.",
            )
            .with_instructions("Please remove the `label` argument.");
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_index_is_true(c: &mut DfChecker<'_>) -> RuleOutcome {
    if !c.item().shows_index() {
        let issue = c.issue("Do not call `df_to_latex` with `index=False`.").with_instructions(
            "Please revise the code making sure all tables are created with `index=True`, \
             and that the index is meaningful.",
        );
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_columns_arg_is_not_used(c: &mut DfChecker<'_>) -> RuleOutcome {
    if c.args().columns.is_some() {
        let issue = c
            .issue("Do not use the `columns` argument in `df_to_latex`.")
            .with_instructions("If you want to drop columns, do it before calling `df_to_latex`.");
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_kind_arg(c: &mut DfChecker<'_>) -> RuleOutcome {
    let issue = match c.kind_arg() {
        None => c.issue("Plot `kind` is not specified.").with_instructions(format!(
            "Please explicitly specify the `kind` argument. available options are:\n{}.",
            py_list(ALLOWED_PLOT_KINDS)
        )),
        Some(kind) if !ALLOWED_PLOT_KINDS.contains(&kind) => c
            .issue(format!("Plot kind \"{kind}\" is not supported."))
            .with_instructions(format!("Only use these kinds: {}.", py_list(ALLOWED_PLOT_KINDS))),
        Some(_) => return RuleOutcome::Continue,
    };
    c.push(issue);
    RuleOutcome::Continue
}

fn check_y_arg(c: &mut DfChecker<'_>) -> RuleOutcome {
    if c.args().y.is_none() {
        let issue = c
            .issue("No y values are specified.")
            .with_instructions("Please use the `y` argument to specify the columns to be plotted.");
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_yerr_arg(c: &mut DfChecker<'_>) -> RuleOutcome {
    if c.args().yerr.is_some() {
        let issue = c
            .issue("Do not use the `yerr` argument in `df_to_figure`.")
            .with_instructions("Instead, directly indicate the confidence intervals using the `y_ci` argument.");
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_err_and_ci_are_exclusive(c: &mut DfChecker<'_>) -> RuleOutcome {
    for axis in ['x', 'y'] {
        let args = c.axis_args(axis);
        if args.err.is_some() && args.ci.is_some() {
            let issue = c
                .issue(format!("Both `{axis}err` and `{axis}_ci` are set."))
                .with_instructions(format!("Please use only `{axis}_ci` to indicate the confidence intervals."));
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

fn check_specified_columns_exist(c: &mut DfChecker<'_>) -> RuleOutcome {
    for axis in ['x', 'y'] {
        let args = c.axis_args(axis);
        let named = [
            (axis.to_string(), args.values),
            (format!("{axis}err"), args.err),
            (format!("{axis}_ci"), args.ci),
            (format!("{axis}_p_value"), args.p_value),
        ];
        for (arg_name, columns) in named {
            let Some(columns) = columns else { continue };
            let missing: Vec<String> = columns
                .into_iter()
                .filter(|col| c.column_position(col).is_none())
                .collect();
            if !missing.is_empty() {
                let available = c.table().column_labels(false, false);
                let issue = c
                    .issue(format!(
                        "The columns {} specified in the `{arg_name}` argument do not exist in the df.",
                        py_list(&missing)
                    ))
                    .with_instructions(format!("Available columns are: {}.", py_list(&available)));
                c.push(issue);
            }
        }
    }
    RuleOutcome::Continue
}

#[cfg(test)]
mod tests {
    use crate::checker::{DfChecker, DfCheckerKind};
    use crate::framework::Checker;
    use crate::services::CheckServices;
    use vetrun_artifact::{Cell, DisplayArgs, DisplayItem, OneOrMany, Table};
    use vetrun_test_utils::{clean_table, figure_item, latex_item};

    fn issues(kind: DfCheckerKind, item: &DisplayItem) -> Vec<String> {
        let services = CheckServices::new();
        let (issues, _) = DfChecker::new(kind, item, &[], &services).run().unwrap();
        issues.iter().map(|i| i.issue.clone()).collect()
    }

    #[test]
    fn clean_table_call_passes() {
        assert!(issues(DfCheckerKind::TableSyntax, &latex_item("df_groups", clean_table())).is_empty());
    }

    #[test]
    fn filename_label_and_columns_are_checked_together() {
        let mut item = latex_item("groups table", clean_table());
        item.args.label = Some("table:x".into());
        item.args.index = Some(false);
        item.args.columns = Some(vec!["Mean".into()]);
        let found = issues(DfCheckerKind::TableSyntax, &item);
        assert_eq!(found.len(), 4);
        assert!(found[0].contains("`df_<alphanumeric>`"));
        assert!(found[1].contains("`label`"));
        assert!(found[2].contains("index=False"));
        assert!(found[3].contains("`columns`"));
    }

    #[test]
    fn figure_arguments() {
        let table = Table::from_rows(&["a"], vec![vec![Cell::Float(1.5)]]);
        let args = DisplayArgs::default()
            .with_kind("pie")
            .with_y(OneOrMany::Many(vec!["a".into(), "b".into()]));
        let found = issues(DfCheckerKind::FigureSyntax, &figure_item("df_fig", table, args));
        assert_eq!(found.len(), 2);
        assert!(found[0].contains("\"pie\" is not supported"));
        assert!(found[1].contains("['b']"));
        assert!(found[1].contains("`y` argument"));
    }

    #[test]
    fn missing_kind_and_y() {
        let table = Table::from_rows(&["a"], vec![vec![Cell::Float(1.5)]]);
        let found = issues(
            DfCheckerKind::FigureSyntax,
            &figure_item("df_fig", table, DisplayArgs::default()),
        );
        assert_eq!(found, vec!["Plot `kind` is not specified.", "No y values are specified."]);
    }

    #[test]
    fn yerr_with_ci() {
        let table = Table::from_rows(&["a", "e", "ci"], vec![vec![Cell::Float(1.5), Cell::Float(0.1), Cell::Null]]);
        let mut args = DisplayArgs::default()
            .with_kind("bar")
            .with_y(OneOrMany::One("a".into()));
        args.yerr = Some(OneOrMany::One("e".into()));
        args.y_ci = Some(OneOrMany::One("ci".into()));
        let found = issues(DfCheckerKind::FigureSyntax, &figure_item("df_fig", table, args));
        assert_eq!(found.len(), 2);
        assert!(found[0].contains("`yerr`"));
        assert!(found[1].contains("Both `yerr` and `y_ci`"));
    }
}
