//! Content rules: values, labels and size of the table behind an item

use crate::checker::{column_has_p_values, column_only_p_values, py_list, DfChecker};
use crate::framework::{Rule, RuleOutcome};
use crate::limits::{limit_text, max_rows_and_columns, within, MAX_BARS};
use vetrun_artifact::{format_float, Axis, Cell, Label, RenderMode, Table};

const VALUES_CATEGORY: &str = "Problem with df values";
const INDEX_COLUMN_CATEGORY: &str = "Problem with df index/columns";
const SIZE_CATEGORY: &str = "Too large df";
const OVERLAPPING_VALUES_CATEGORY: &str = "Overlapping values";
const DESCRIBE_CATEGORY: &str = "The df looks like a df.describe() table, not a scientific table";
const P_VALUE_CATEGORY: &str = "Plotting P-values";

const DESCRIBE_LABELS: [&str; 7] = ["mean", "std", "min", "25%", "50%", "75%", "max"];

/// Tables below this many rows get a full null mask
const FULL_NULL_MASK_ROWS: usize = 20;
const NULL_EXAMPLE_ROWS: usize = 10;

pub(crate) fn table_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![
        check_is_describe_table,
        check_repeated_values,
        check_values_shared_with_prior_items,
        check_nan_values,
        check_value_types,
        check_header_types,
        check_index_is_not_a_range,
        check_size,
    ]
}

pub(crate) fn figure_rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![
        check_nan_values,
        check_value_types,
        check_header_types,
        check_index_is_not_a_range,
        check_size,
        check_y_values_are_numeric,
        check_p_value_columns,
        check_max_bars,
        check_y_values_are_diverse,
        check_x_is_numeric_for_line_and_scatter,
    ]
}

fn check_nan_values(c: &mut DfChecker<'_>) -> RuleOutcome {
    let table = c.table();
    let nulls = table.null_count();
    if nulls == 0 {
        return RuleOutcome::Continue;
    }
    let mut text = format!("Note that the df has {nulls} NaN value(s).");
    let shown = if table.shape().0 < FULL_NULL_MASK_ROWS {
        text.push_str("\nHere is the `isnull` of the df:");
        table.null_mask()
    } else {
        text.push_str("\nHere are some example lines with NaN values:");
        let rows: Vec<usize> = table.rows_with_nulls().into_iter().take(NULL_EXAMPLE_ROWS).collect();
        table.select_rows(&rows)
    };
    text.push_str(&format!("\n```\n{}\n```\n", shown.to_readable_csv(RenderMode::SmallerThan)));

    let mut instructions = format!("Please revise the code to avoid NaN values in the created {}.", c.noun());
    if !c.is_figure() {
        instructions.push_str(
            "\nIf the NaNs are legit and stand for missing values: replace them with the string '-'.\n\
             Otherwise, if they are computational errors, please revise the code to fix it.",
        );
    }
    let issue = c.issue_in(VALUES_CATEGORY, text).with_instructions(instructions);
    c.push(issue);
    RuleOutcome::Continue
}

fn check_value_types(c: &mut DfChecker<'_>) -> RuleOutcome {
    let mut unsupported: Vec<String> = c
        .table()
        .cells()
        .filter_map(|(_, _, cell)| match cell {
            Cell::Unsupported(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    unsupported.sort();
    unsupported.dedup();
    if !unsupported.is_empty() {
        let issue = c
            .issue_in(
                VALUES_CATEGORY,
                format!(
                    "Your dataframe contains values of types {} which are not allowed.",
                    py_list(&unsupported)
                ),
            )
            .with_instructions("Please make sure the saved dataframes have only numeric, str, bool, or tuple values.");
        c.push(issue);
    }
    RuleOutcome::Continue
}

/// Label types accepted on `columns` and on `index`, and whether multi-level axes are
fn allowed_header_types(is_figure: bool) -> ([&'static [&'static str]; 2], bool) {
    if is_figure {
        ([&["str"], &["int", "str", "bool", "float"]], false)
    } else {
        ([&["int", "str", "bool"], &["int", "str", "bool"]], true)
    }
}

fn check_header_types(c: &mut DfChecker<'_>) -> RuleOutcome {
    let (allowed, allow_multi) = allowed_header_types(c.is_figure());
    let table = c.table();
    let axes: [(&str, &Axis); 2] = [("columns", &table.columns), ("index", &table.index)];
    for ((name, axis), allowed) in axes.into_iter().zip(allowed) {
        if !allow_multi && axis.is_multi() {
            let issue = c
                .issue_in(INDEX_COLUMN_CATEGORY, format!("Your dataframe has a multi-index for the {name}."))
                .with_instructions(format!("Please make sure the df has a single-level {name}."));
            c.push(issue);
            continue;
        }
        let mut unsupported: Vec<&str> = Vec::new();
        for leaf in axis.labels.iter().flat_map(Label::leaves) {
            let type_name = leaf.type_name();
            if !allowed.contains(&type_name) && !unsupported.contains(&type_name) {
                unsupported.push(type_name);
            }
        }
        if !unsupported.is_empty() {
            let issue = c
                .issue_in(
                    INDEX_COLUMN_CATEGORY,
                    format!("Your df has {name} headers of unsupported types: {}.", py_list(&unsupported)),
                )
                .with_instructions(format!("The df {name} headers should be of types {}.", py_list(allowed)));
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

fn check_index_is_not_a_range(c: &mut DfChecker<'_>) -> RuleOutcome {
    if !c.item().shows_index() || !c.table().is_trivial_range_index() {
        return RuleOutcome::Continue;
    }
    let last = c.table().shape().0 - 1;
    let filename = c.filename();
    let (text, instructions) = if c.is_figure() {
        (
            format!(
                "We are using the index of the df as the x-values of the plot.\n\
                 But, the index of df \"{filename}\" is just a range from 0 to {last}."
            ),
            "Please revise the code making sure the figure is built with an index that represents meaningful \
             numeric data. Or, for categorical data, the index should be a list of strings."
                .to_string(),
        )
    } else {
        (
            format!(
                "The index of the df is used by `df_to_latex` as the row labels.\n\
                 But, the index of df \"{filename}\" is just a range from 0 to {last}."
            ),
            "Please revise the code making sure the df is built with an index that has meaningful row labels.\n\
             Labeling row with sequential numbers is not common in scientific tables.\n\
             Though, if you are sure that starting each row with a sequential number is really what you want, \
             then convert it from int to strings, so that it is clear that it is not a mistake."
                .to_string(),
        )
    };
    let issue = c.issue_in(INDEX_COLUMN_CATEGORY, text).with_instructions(instructions);
    c.push(issue);
    RuleOutcome::Continue
}

fn check_size(c: &mut DfChecker<'_>) -> RuleOutcome {
    let (rows, columns) = c.table().shape();
    let limit = max_rows_and_columns(c.is_figure(), c.kind_arg());
    if limit.fits(rows, columns) {
        return RuleOutcome::Continue;
    }
    let transpose_note = if limit.fits_transposed(rows, columns) {
        "You might also consider transposing the df.\n"
    } else {
        ""
    };
    let mut trimming_note = "Note that simply trimming the data is not always a good solution. \
                             You might instead consider a different representation/organization \
                             of the presented data.\n"
        .to_string();
    if !c.is_figure() {
        trimming_note.push_str("Or, consider representing the data as a figure.\n");
    }
    let noun = c.noun();
    for (count, max, what) in [(rows, limit.rows, "rows"), (columns, limit.columns, "columns")] {
        if within(count, max) {
            continue;
        }
        let issue = c
            .issue_in(
                SIZE_CATEGORY,
                format!(
                    "The {noun} df has {count} {what}, which is too many for our {noun} (max allowed: {}).",
                    limit_text(max)
                ),
            )
            .with_instructions(format!(
                "Please revise the code so that df of created {noun} have a maximum of {} rows and {} columns.\n\
                 {trimming_note}{transpose_note}",
                limit_text(limit.rows),
                limit_text(limit.columns)
            ));
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_is_describe_table(c: &mut DfChecker<'_>) -> RuleOutcome {
    let table = c.table();
    let contains_all = |labels: Vec<String>| DESCRIBE_LABELS.iter().all(|d| labels.iter().any(|l| l == d));
    if contains_all(table.column_labels(false, false)) || contains_all(table.row_labels(false, false)) {
        let issue = c
            .issue_in(
                DESCRIBE_CATEGORY,
                "The df includes mean, std, as well as quantiles and min/max values.",
            )
            .with_instructions(
                "Note that in scientific tables, it is not customary to include quantiles, or min/max values, \
                 especially if the mean and std are also included.\n\
                 Please revise the code so that the tables only include scientifically relevant statistics.",
            )
            .with_forgive_after(3);
        c.push(issue);
    }
    RuleOutcome::Continue
}

/// Non-integer numbers of `table`, row-major
fn non_integer_values(table: &Table) -> Vec<f64> {
    table
        .cells()
        .filter(|(_, _, cell)| cell.is_non_integer_number())
        .filter_map(|(_, _, cell)| cell.as_f64())
        .collect()
}

/// First non-integer value occurring in more than one cell, with every cell holding it
pub(crate) fn first_repeated_value(table: &Table) -> Option<(f64, Vec<(usize, usize)>)> {
    let values = non_integer_values(table);
    let repeated = values
        .iter()
        .copied()
        .find(|v| values.iter().filter(|w| *w == v).count() > 1)?;
    let positions = table
        .cells()
        .filter(|(_, _, cell)| cell.as_f64() == Some(repeated))
        .map(|(r, col, _)| (r, col))
        .collect();
    Some((repeated, positions))
}

fn check_repeated_values(c: &mut DfChecker<'_>) -> RuleOutcome {
    let Some((value, positions)) = first_repeated_value(c.table()) else {
        return RuleOutcome::Continue;
    };
    let cells: Vec<String> = positions.iter().map(|(r, col)| format!("({r}, {col})")).collect();
    let issue = c
        .issue_in(
            OVERLAPPING_VALUES_CATEGORY,
            format!(
                "Note that the df \"{}\" includes the same values in multiple cells.\n\
                 For example, the value {} appears in the following cells:\n{}.",
                c.filename(),
                format_float(value),
                cells.join(", ")
            ),
        )
        .with_instructions(
            "This is likely a mistake and is surely confusing to the reader.\n\
             Please revise the code so that the df does not repeat the same values in multiple cells.",
        )
        .with_forgive_after(1);
    c.push(issue);
    RuleOutcome::Continue
}

fn check_values_shared_with_prior_items(c: &mut DfChecker<'_>) -> RuleOutcome {
    let values = non_integer_values(c.table());
    if values.is_empty() {
        return RuleOutcome::Continue;
    }
    for prior in c.prior() {
        if prior.filename == c.filename() {
            continue;
        }
        let prior_values = non_integer_values(&prior.table);
        if values.iter().any(|v| prior_values.contains(v)) {
            let issue = c
                .issue_in(
                    OVERLAPPING_VALUES_CATEGORY,
                    format!(
                        "Table \"{}\" includes values that overlap with values in table \"{}\".",
                        c.filename(),
                        prior.filename
                    ),
                )
                .with_instructions(
                    "In scientific tables, it is not customary to include the same values in multiple tables.\n\
                     Please revise the code so that each table include its own unique data.",
                )
                .with_forgive_after(1);
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

/// Positions of the `y` columns that exist
fn y_columns(c: &DfChecker<'_>) -> Vec<(String, usize)> {
    c.axis_args('y')
        .values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|name| c.column_position(&name).map(|pos| (name, pos)))
        .collect()
}

fn check_y_values_are_numeric(c: &mut DfChecker<'_>) -> RuleOutcome {
    for (name, position) in y_columns(c) {
        let numeric = c.table().column(position).filter(|v| !v.is_null()).all(Cell::is_numeric);
        if !numeric {
            let issue = c
                .issue(format!("Column `{name}` is not numeric, so it is not suitable for a plot."))
                .with_instructions("All columns specified by the `y` argument must have numeric values.");
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

fn check_p_value_columns(c: &mut DfChecker<'_>) -> RuleOutcome {
    let x_p_value = c.axis_args('x').p_value;
    let y_p_value = c.axis_args('y').p_value;
    if x_p_value.is_some() && y_p_value.is_some() {
        let issue = c
            .issue_in(P_VALUE_CATEGORY, "Both `x_p_value` and `y_p_value` are set.")
            .with_instructions("Please use only one of them.");
        c.push(issue);
        return RuleOutcome::Continue;
    }
    if x_p_value.is_some() {
        let issue = c
            .issue_in(P_VALUE_CATEGORY, "The `x_p_value` argument is not supported.")
            .with_instructions("Please use the `y_p_value` argument instead.");
        c.push(issue);
        return RuleOutcome::Continue;
    }

    let table = c.table();
    let labels = table.column_labels(false, false);
    let p_value_columns: Vec<String> = (0..table.shape().1)
        .filter(|col| column_has_p_values(table, *col))
        .filter_map(|col| table.columns.labels.get(col).map(ToString::to_string))
        .collect();

    let mixed: Vec<String> = p_value_columns
        .iter()
        .filter(|name| {
            table
                .columns
                .position(name)
                .is_some_and(|col| !column_only_p_values(table, col))
        })
        .cloned()
        .collect();
    if !mixed.is_empty() {
        let issue = c
            .issue_in(
                P_VALUE_CATEGORY,
                format!("The df has columns {}, which contain p-values and non-p-values.", py_list(&mixed)),
            )
            .with_instructions("Please make sure that the columns with p-values only contain p-values.");
        c.push(issue);
        return RuleOutcome::Continue;
    }

    let declared = y_p_value.unwrap_or_default();
    let not_p_values: Vec<&String> = declared
        .iter()
        .filter(|name| labels.contains(*name) && !p_value_columns.contains(*name))
        .collect();
    if !not_p_values.is_empty() {
        let issue = c
            .issue_in(
                P_VALUE_CATEGORY,
                format!("The columns y_p_value={} are not p-values.", py_list(&not_p_values)),
            )
            .with_instructions("Please make sure that the columns with p-values only contain p-values.");
        c.push(issue);
    }

    let undeclared: Vec<&String> = p_value_columns.iter().filter(|name| !declared.contains(*name)).collect();
    if !undeclared.is_empty() {
        let issue = c
            .issue_in(
                P_VALUE_CATEGORY,
                format!(
                    "The columns {} contain p-values but are not in y_p_value.",
                    py_list(&undeclared)
                ),
            )
            .with_instructions(
                "Please include all the columns with p-values in y_p_value argument, or remove them from the df.",
            )
            .with_forgive_after(1);
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_max_bars(c: &mut DfChecker<'_>) -> RuleOutcome {
    if !matches!(c.kind_arg(), Some("bar" | "barh")) {
        return RuleOutcome::Continue;
    }
    let series = c.axis_args('y').values.map_or(0, |y| y.len());
    let bars = c.table().shape().0 * series;
    if bars > MAX_BARS {
        let issue = c
            .issue(format!("The plot has {bars} bars, which is a large number."))
            .with_instructions("Consider reducing the number of bars to make the plot more readable.")
            .with_forgive_after(2);
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn check_y_values_are_diverse(c: &mut DfChecker<'_>) -> RuleOutcome {
    let Some(kind) = c.kind_arg().filter(|k| matches!(*k, "box" | "violin" | "hist")) else {
        return RuleOutcome::Continue;
    };
    for (name, position) in y_columns(c) {
        let mut unique: Vec<&Cell> = Vec::new();
        for cell in c.table().column(position).filter(|v| !v.is_null()) {
            if !unique.contains(&cell) {
                unique.push(cell);
            }
        }
        if unique.len() <= 2 {
            let issue = c
                .issue(format!(
                    "Column `{name}` has only {} unique values, so it is not suitable for a \"{kind}\" plot.",
                    unique.len()
                ))
                .with_instructions("Choose another kind of plot, like calculating the mean and plotting a bar plot.");
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

fn check_x_is_numeric_for_line_and_scatter(c: &mut DfChecker<'_>) -> RuleOutcome {
    let Some(kind) = c.kind_arg().filter(|k| matches!(*k, "line" | "scatter")) else {
        return RuleOutcome::Continue;
    };
    let table = c.table();
    let numeric = match c.args().x.as_deref() {
        Some(x) => match c.column_position(x) {
            Some(col) => table.column(col).filter(|v| !v.is_null()).all(Cell::is_numeric),
            None => return RuleOutcome::Continue,
        },
        None => table
            .index
            .labels
            .iter()
            .all(|l| matches!(l, Label::Int(_) | Label::Float(_))),
    };
    if !numeric {
        let issue = c
            .issue(format!(
                "The x values are not numeric, so they are not suitable for a \"{kind}\" plot."
            ))
            .with_instructions("Consider another kind of plot, like a bar plot (kind=\"bar\").");
        c.push(issue);
    }
    RuleOutcome::Continue
}
