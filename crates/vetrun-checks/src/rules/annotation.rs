//! Annotation rules: label characters, glossary, caption and note

use crate::abbreviations::is_unknown_abbreviation;
use crate::checker::{py_list, DfChecker};
use crate::framework::{Rule, RuleOutcome};
use crate::limits::NARROW_TABLE_WIDTH;
use once_cell::sync::Lazy;
use regex::Regex;

const CAPTION_CATEGORY: &str = "Problem with displayitem caption";
const GLOSSARY_CATEGORY: &str = "Displayitem glossary";

const UNALLOWED_CHARS: [(char, &str); 4] = [
    ('_', "underscore"),
    ('^', "caret"),
    ('{', "curly brace"),
    ('}', "curly brace"),
];

/// Glossary keys allowed without a matching label
const FREE_GLOSSARY_KEYS: &[&str] = &["Significance"];

const FORBIDDEN_STARTS: [&str; 2] = ["Figure", "Table"];

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*>").expect("valid placeholder regex"));

pub(crate) fn rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![
        check_for_unallowed_characters_in_labels,
        check_for_abbreviations_not_in_glossary,
        check_for_glossary_labels_not_in_df,
        check_note,
        check_caption,
        check_note_is_different_than_caption,
    ]
}

fn check_for_unallowed_characters_in_labels(c: &mut DfChecker<'_>) -> RuleOutcome {
    for (ch, char_name) in UNALLOWED_CHARS {
        for axis in ["index", "columns"] {
            let labels = if axis == "index" {
                c.table().row_labels(true, true)
            } else {
                c.table().column_labels(true, true)
            };
            let mut unallowed: Vec<String> = labels.into_iter().filter(|l| l.contains(ch)).collect();
            if unallowed.is_empty() {
                continue;
            }
            unallowed.sort();
            let issue = c
                .issue_in(
                    "The df row/column labels contain un-allowed characters",
                    format!(
                        "The \"{}\" has {axis} labels containing the character \"{ch}\" ({char_name}), \
                         which is not allowed.\nHere are the problematic {axis} labels:\n{}",
                        c.filename(),
                        py_list(&unallowed)
                    ),
                )
                .with_instructions(format!(
                    "Please revise the code to map these {axis} labels to new names that do not contain \
                     the \"{ch}\" characters. Spaces are allowed.\n\n\
                     Doublecheck to make sure your code uses `df.rename({axis}=...)` with the `{axis}` argument \
                     set to a dictionary mapping the old {axis} names to the new ones."
                ));
            c.push(issue);
        }
    }
    RuleOutcome::Continue
}

fn check_for_abbreviations_not_in_glossary(c: &mut DfChecker<'_>) -> RuleOutcome {
    let glossary = c.args().glossary.as_ref();
    let mut missing: Vec<String> = c
        .table()
        .axes_labels(false, true)
        .into_iter()
        .filter(|label| is_unknown_abbreviation(label))
        .filter(|label| !glossary.is_some_and(|g| g.contains_key(label)))
        .collect();
    if missing.is_empty() {
        return RuleOutcome::Continue;
    }
    missing.sort();

    let noun = c.noun();
    let mut instructions = String::from(
        "Please revise the code making sure all abbreviated labels (of both column and rows!) are explained \
         in the glossary.\n\
         Add the missing abbreviations and their explanations as keys and values in the `glossary` \
         argument of `df_to_latex` or `df_to_figure`.\n"
    );
    if c.width().is_some_and(|w| w < NARROW_TABLE_WIDTH) {
        instructions.push_str(&format!(
            "Alternatively, since the {noun} is not too wide, you can also replace the abbreviated labels \
             with their full names in the dataframe itself.\n"
        ));
    }
    let text = match glossary.filter(|g| !g.is_empty()) {
        Some(g) => {
            let keys: Vec<&String> = g.keys().collect();
            format!(
                "The `glossary` argument of `{}` includes only the following keys:\n{}\n\
                 We need to add also the following abbreviated row/column labels:\n{}",
                c.func_name(),
                py_list(&keys),
                py_list(&missing)
            )
        }
        None => format!(
            "The {noun} needs a glossary explaining the following abbreviated labels:\n{}",
            py_list(&missing)
        ),
    };
    let issue = c.issue_in(GLOSSARY_CATEGORY, text).with_instructions(instructions);
    c.push(issue);
    RuleOutcome::Continue
}

fn check_for_glossary_labels_not_in_df(c: &mut DfChecker<'_>) -> RuleOutcome {
    let Some(glossary) = c.args().glossary.as_ref().filter(|g| !g.is_empty()) else {
        return RuleOutcome::Continue;
    };
    let labels = c.table().axes_labels(true, true);
    let unmentioned: Vec<&String> = glossary
        .keys()
        .filter(|key| !labels.contains(*key) && !FREE_GLOSSARY_KEYS.contains(&key.as_str()))
        .collect();
    if !unmentioned.is_empty() {
        let issue = c
            .issue_in(
                GLOSSARY_CATEGORY,
                format!(
                    "The glossary of the {} includes the following labels that are not in the df:\n{}\n\
                     Here are the available df row and column labels:\n{}",
                    c.func_name(),
                    py_list(&unmentioned),
                    py_list(&labels)
                ),
            )
            .with_instructions(
                "The glossary keys should be a subset of the df labels.\n\n\
                 Please revise the code changing either the glossary keys, or the df labels, accordingly.\n\n\
                 As a reminder: you can also use the `note` argument to add information that is related to the \
                 displayitem as a whole, rather than to a specific label.",
            );
        c.push(issue);
    }
    RuleOutcome::Continue
}

fn push_caption_issue(c: &mut DfChecker<'_>, text: String) {
    let issue = c.issue_in(CAPTION_CATEGORY, text).with_instructions(
        "Please revise the code making sure all displayitems are created with a caption.\n\
         Use the arguments `caption` of `df_to_latex` or `df_to_figure`.\n\
         Captions should be suitable for tables/figures of a scientific paper.\n\
         In addition, you can add:\n\
         - an optional note for further explanations (use the argument `note`)\n\
         - a glossary mapping any abbreviated row/column labels to their definitions \
         (use the argument `glossary` argument).",
    );
    c.push(issue);
}

fn check_caption_or_note(c: &mut DfChecker<'_>, text: Option<&str>, name: &str, required: bool) {
    let noun = c.noun();
    let Some(text) = text else {
        if required {
            push_caption_issue(c, format!("The {noun} does not have a {name}."));
        }
        return;
    };
    for start in FORBIDDEN_STARTS {
        if text.starts_with(start) {
            push_caption_issue(c, format!("The {name} of the {noun} should not start with \"{start}\"."));
        }
    }
    if text.contains("...") {
        push_caption_issue(c, format!("The {name} of the {noun} should not contain \"...\""));
    }
    if PLACEHOLDER.is_match(text) {
        push_caption_issue(c, format!("The {name} of the {noun} should not contain \"<...>\""));
    }
}

fn check_note(c: &mut DfChecker<'_>) -> RuleOutcome {
    let note = c.args().note.as_deref();
    check_caption_or_note(c, note, "note", false);
    RuleOutcome::Continue
}

fn check_caption(c: &mut DfChecker<'_>) -> RuleOutcome {
    let caption = c.args().caption.as_deref();
    check_caption_or_note(c, caption, "caption", true);
    RuleOutcome::Continue
}

fn check_note_is_different_than_caption(c: &mut DfChecker<'_>) -> RuleOutcome {
    let (Some(note), Some(caption)) = (c.args().note.as_deref(), c.args().caption.as_deref()) else {
        return RuleOutcome::Continue;
    };
    let (note, caption) = (note.to_lowercase(), caption.to_lowercase());
    if note.contains(&caption) || caption.contains(&note) {
        let noun = c.noun();
        push_caption_issue(
            c,
            format!(
                "The note of the {noun} should not be the same as the caption.\n\
                 Notes are meant to provide additional information, not to repeat the caption."
            ),
        );
    }
    RuleOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::DfCheckerKind;
    use crate::framework::Checker;
    use crate::services::CheckServices;
    use vetrun_artifact::{Axis, Cell, DisplayArgs, DisplayItem, Label, Table};
    use vetrun_test_utils::{clean_table, formatted_latex_item};

    fn issues(item: &DisplayItem, width: Option<f64>) -> Vec<(String, String)> {
        let services = CheckServices::new();
        let mut results = crate::framework::IntermediateResults::new();
        if let Some(w) = width {
            results.insert(crate::checker::WIDTH_KEY.to_string(), serde_json::json!(w));
        }
        let mut checker = DfChecker::new(DfCheckerKind::Annotation, item, &[], &services);
        checker.state_mut().intermediate_results = results;
        let (issues, _) = checker.run().unwrap();
        issues.iter().map(|i| (i.issue.clone(), i.instructions.clone())).collect()
    }

    #[test]
    fn annotated_table_passes() {
        let item = formatted_latex_item("groups", clean_table());
        assert!(issues(&item, None).is_empty());
    }

    #[test]
    fn underscores_in_both_axes() {
        let table = Table::from_rows(&["mean_age", "Count"], vec![vec![Cell::Float(1.5), Cell::Int(3)]])
            .with_index(Axis::new(vec![Label::from("group_a")]));
        let found = issues(&formatted_latex_item("groups", table), None);
        // the abbreviation rule also fires on both labels
        assert_eq!(found.len(), 3);
        assert!(found[0].0.contains("index labels containing the character \"_\""));
        assert!(found[0].0.contains("['group_a']"));
        assert!(found[1].0.contains("columns labels"));
        assert!(found[2].0.contains("needs a glossary"));
        assert!(found[2].0.contains("['group_a', 'mean_age']"));
    }

    #[test]
    fn glossary_covers_abbreviations_and_matches_labels() {
        let table = Table::from_rows(&["BMI"], vec![vec![Cell::Float(22.5)]])
            .with_index(Axis::new(vec![Label::from("Control")]));
        let mut item = formatted_latex_item("groups", table);
        item.args = item
            .args
            .clone()
            .with_glossary([("BMI", "Body Mass Index"), ("HR", "Hazard ratio"), ("Significance", "p < 0.05")]);
        let found = issues(&item, None);
        assert_eq!(found.len(), 1);
        assert!(found[0].0.contains("not in the df:\n['HR']"));
    }

    #[test]
    fn narrow_table_may_spell_out_abbreviations() {
        let table = Table::from_rows(&["BMI"], vec![vec![Cell::Float(22.5)]])
            .with_index(Axis::new(vec![Label::from("Control")]));
        let item = formatted_latex_item("groups", table);
        let found = issues(&item, Some(0.5));
        assert!(found[0].1.contains("not too wide"));
        let found = issues(&item, Some(0.95));
        assert!(!found[0].1.contains("not too wide"));
    }

    #[test]
    fn caption_problems() {
        let mut item = formatted_latex_item("groups", clean_table());
        item.args = DisplayArgs::default().with_caption("Table 1: means of <outcome>...");
        let found: Vec<String> = issues(&item, None).into_iter().map(|(i, _)| i).collect();
        assert_eq!(
            found,
            vec![
                "The caption of the table should not start with \"Table\".",
                "The caption of the table should not contain \"...\"",
                "The caption of the table should not contain \"<...>\"",
            ]
        );
    }

    #[test]
    fn missing_caption_and_repeated_note() {
        let mut item = formatted_latex_item("groups", clean_table());
        item.args.caption = None;
        assert_eq!(issues(&item, None)[0].0, "The table does not have a caption.");

        item.args = DisplayArgs::default()
            .with_caption("Group means")
            .with_note("group means");
        assert!(issues(&item, None)[0].0.starts_with("The note of the table should not be the same"));
    }
}
