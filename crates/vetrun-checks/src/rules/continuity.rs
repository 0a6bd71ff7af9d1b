//! File continuity: display-stage items must derive from a loaded artifact

use crate::checker::DfChecker;
use crate::framework::{Rule, RuleOutcome};

pub(crate) fn rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
    crate::rules![check_for_file_continuity]
}

fn check_for_file_continuity(c: &mut DfChecker<'_>) -> RuleOutcome {
    let Some(previous) = c.item().previous_filename() else {
        let issue = c.issue(
            "You can only use the loaded `df` object (you can change the loaded df, but not replace it)",
        );
        c.push(issue);
        return RuleOutcome::Continue;
    };
    let expected = format!("{previous}_formatted");
    if c.filename() != expected {
        let issue = c.issue(format!(
            "The file name of the loaded df was \"{previous}\".\n\
             The current file name should be \"{expected}\" (instead of \"{}\").",
            c.filename()
        ));
        c.push(issue);
    }
    RuleOutcome::Continue
}

#[cfg(test)]
mod tests {
    use crate::checker::{DfChecker, DfCheckerKind};
    use crate::framework::Checker;
    use crate::services::CheckServices;
    use vetrun_artifact::{DisplayItem, RunIssues};
    use vetrun_test_utils::{clean_table, formatted_latex_item, latex_item};

    fn run(item: &DisplayItem) -> RunIssues {
        let services = CheckServices::new();
        DfChecker::new(DfCheckerKind::Continuity, item, &[], &services).run().unwrap().0
    }

    #[test]
    fn formatted_name_of_loaded_df() {
        assert!(run(&formatted_latex_item("groups", clean_table())).is_empty());
    }

    #[test]
    fn replaced_df() {
        let issues = run(&latex_item("df_groups_formatted", clean_table()));
        let issue = issues.iter().next().unwrap();
        assert_eq!(issue.category, "File continuity");
        assert!(issue.issue.starts_with("You can only use the loaded `df` object"));
    }

    #[test]
    fn renamed_df() {
        let item = latex_item("df_other", clean_table()).with_lineage(vec!["df_groups".into()]);
        let issues = run(&item);
        assert!(issues
            .iter()
            .next()
            .unwrap()
            .issue
            .contains("should be \"df_groups_formatted\" (instead of \"df_other\")"));
    }
}
