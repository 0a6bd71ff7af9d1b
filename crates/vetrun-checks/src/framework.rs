//! Checker framework
//!
//! A checker owns a [`CheckerState`] and an ordered table of [`Rule`]s.
//! [`run_rules`] walks the table: every rule may append issues, a rule that
//! returns [`RuleOutcome::Stop`] must have appended at least one, and the
//! walk halts when the rule asked to stop, or when the checker stops after
//! the first issue and a blocking issue exists.
//!
//! Issues carrying a `forgive_after` counter are advisory: they are
//! reported but never halt a checker or a chain.
//!
//! [`ChainChecker`] runs checkers in sequence, forwarding intermediate
//! results from each member to the next.

use crate::error::{CheckerError, CheckerResult};
use indexmap::IndexMap;
use vetrun_artifact::{RunIssue, RunIssues};

/// Values computed by one checker and read by later ones
pub type IntermediateResults = IndexMap<String, serde_json::Value>;

/// What a rule asks the checker to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOutcome {
    /// Run the remaining rules
    #[default]
    Continue,
    /// Stop this checker; the rule must have appended an issue
    Stop,
}

/// One named validation rule over checker `C`
pub struct Rule<C> {
    /// Stable identifier
    pub id: &'static str,
    /// Rule body
    pub check: fn(&mut C) -> RuleOutcome,
}

impl<C> Rule<C> {
    /// Rule `id` running `check`
    #[inline]
    #[must_use]
    pub const fn new(id: &'static str, check: fn(&mut C) -> RuleOutcome) -> Self {
        Self { id, check }
    }
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Rule<C> {}

impl<C> std::fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("id", &self.id).finish()
    }
}

/// Ordered rule table, each rule identified by its function name
///
/// ```rust,ignore
/// fn rules<'a>() -> Vec<Rule<DfChecker<'a>>> {
///     rules![check_filename, check_no_label]
/// }
/// ```
#[macro_export]
macro_rules! rules {
    ($($check:ident),* $(,)?) => {
        vec![$($crate::Rule::new(stringify!($check), $check)),*]
    };
}

/// Mutable state shared by every checker
#[derive(Debug, Clone, Default)]
pub struct CheckerState {
    /// Issues appended so far
    pub issues: RunIssues,
    /// Values forwarded to later checkers of a chain
    pub intermediate_results: IntermediateResults,
    /// Halt on the first rule that leaves any issue
    pub stop_after_first_issue: bool,
    /// Rules declared but switched off
    pub skipped_rules: Vec<&'static str>,
}

impl CheckerState {
    /// Empty state
    #[must_use]
    pub fn new(stop_after_first_issue: bool) -> Self {
        Self {
            stop_after_first_issue,
            ..Self::default()
        }
    }

    /// Append an issue
    #[inline]
    pub fn push(&mut self, issue: RunIssue) {
        self.issues.push(issue);
    }

    /// Whether any appended issue is not advisory
    #[must_use]
    pub fn has_blocking_issues(&self) -> bool {
        is_blocking(&self.issues)
    }
}

fn is_blocking(issues: &RunIssues) -> bool {
    issues.iter().any(|i| i.forgive_after.is_none())
}

/// A set of validation rules with its state
pub trait Checker {
    /// Name used in logs and errors
    fn name(&self) -> String;

    /// Shared state
    fn state(&self) -> &CheckerState;

    /// Shared state, mutably
    fn state_mut(&mut self) -> &mut CheckerState;

    /// Run the rules, appending issues to the state
    ///
    /// # Errors
    ///
    /// [`CheckerError::StopWithoutIssue`] when a rule breaks the stop contract.
    fn run_checks(&mut self) -> CheckerResult<()>;

    /// Run and hand back the issues and intermediate results
    ///
    /// # Errors
    ///
    /// See [`Checker::run_checks`].
    fn run(mut self) -> CheckerResult<(RunIssues, IntermediateResults)>
    where
        Self: Sized,
    {
        self.run_checks()?;
        let state = std::mem::take(self.state_mut());
        Ok((state.issues, state.intermediate_results))
    }
}

/// Walk `rules` in order over `checker`
///
/// # Errors
///
/// [`CheckerError::StopWithoutIssue`] when a rule returns
/// [`RuleOutcome::Stop`] without appending an issue.
pub fn run_rules<C: Checker>(checker: &mut C, rules: &[Rule<C>]) -> CheckerResult<()> {
    for rule in rules {
        if checker.state().skipped_rules.contains(&rule.id) {
            tracing::trace!(checker = %checker.name(), rule = rule.id, "rule skipped");
            continue;
        }
        let before = checker.state().issues.len();
        let outcome = (rule.check)(checker);
        let created = checker.state().issues.len() - before;
        tracing::trace!(checker = %checker.name(), rule = rule.id, created, ?outcome, "rule ran");

        if outcome == RuleOutcome::Stop && created == 0 {
            return Err(CheckerError::StopWithoutIssue {
                checker: checker.name(),
                rule: rule.id,
            });
        }
        let state = checker.state();
        if outcome == RuleOutcome::Stop || (state.stop_after_first_issue && state.has_blocking_issues()) {
            tracing::debug!(checker = %checker.name(), rule = rule.id, "checker halted");
            break;
        }
    }
    Ok(())
}

/// Checkers run in sequence
pub struct ChainChecker<'a> {
    checkers: Vec<Box<dyn Checker + 'a>>,
    state: CheckerState,
}

impl<'a> ChainChecker<'a> {
    /// Chain that halts on the first member reporting a blocking issue
    #[must_use]
    pub fn new(checkers: Vec<Box<dyn Checker + 'a>>) -> Self {
        Self {
            checkers,
            state: CheckerState::new(true),
        }
    }

    /// Whether to halt on the first member reporting any issue
    #[must_use]
    pub fn with_stop_after_first_issue(mut self, stop: bool) -> Self {
        self.state.stop_after_first_issue = stop;
        self
    }

    /// Seed the results forwarded to the first member
    #[must_use]
    pub fn with_intermediate_results(mut self, results: IntermediateResults) -> Self {
        self.state.intermediate_results = results;
        self
    }

    /// Number of members
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// Whether the chain has no members
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl std::fmt::Debug for ChainChecker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.checkers.iter().map(|c| c.name()).collect();
        f.debug_struct("ChainChecker")
            .field("checkers", &names)
            .field("state", &self.state)
            .finish()
    }
}

impl Checker for ChainChecker<'_> {
    fn name(&self) -> String {
        "chain".to_string()
    }

    fn state(&self) -> &CheckerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CheckerState {
        &mut self.state
    }

    fn run_checks(&mut self) -> CheckerResult<()> {
        for checker in &mut self.checkers {
            for (key, value) in &self.state.intermediate_results {
                checker
                    .state_mut()
                    .intermediate_results
                    .insert(key.clone(), value.clone());
            }
            checker.run_checks()?;

            let member = checker.state_mut();
            let issues = std::mem::take(&mut member.issues);
            for (key, value) in &member.intermediate_results {
                self.state.intermediate_results.insert(key.clone(), value.clone());
            }
            let blocking = is_blocking(&issues);
            self.state.issues.extend(issues);
            if blocking && self.state.stop_after_first_issue {
                tracing::debug!(checker = %checker.name(), "chain halted");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetrun_artifact::CodeProblem;

    #[derive(Debug)]
    struct Counter {
        state: CheckerState,
        calls: Vec<&'static str>,
        rules: Vec<Rule<Counter>>,
    }

    impl Counter {
        fn new(rules: Vec<Rule<Counter>>, stop_after_first_issue: bool) -> Self {
            Self {
                state: CheckerState::new(stop_after_first_issue),
                calls: Vec::new(),
                rules,
            }
        }
    }

    impl Checker for Counter {
        fn name(&self) -> String {
            "counter".to_string()
        }
        fn state(&self) -> &CheckerState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut CheckerState {
            &mut self.state
        }
        fn run_checks(&mut self) -> CheckerResult<()> {
            let rules = self.rules.clone();
            run_rules(self, &rules)
        }
    }

    fn issue() -> RunIssue {
        RunIssue::new("test", "found", CodeProblem::OutputFileContentLevelA)
    }

    fn quiet(c: &mut Counter) -> RuleOutcome {
        c.calls.push("quiet");
        RuleOutcome::Continue
    }

    fn noisy(c: &mut Counter) -> RuleOutcome {
        c.calls.push("noisy");
        c.state.push(issue());
        RuleOutcome::Continue
    }

    fn stopping(c: &mut Counter) -> RuleOutcome {
        c.calls.push("stopping");
        c.state.push(issue());
        RuleOutcome::Stop
    }

    fn bad_stop(c: &mut Counter) -> RuleOutcome {
        c.calls.push("bad_stop");
        RuleOutcome::Stop
    }

    fn advisory(c: &mut Counter) -> RuleOutcome {
        c.calls.push("advisory");
        c.state.push(issue().with_forgive_after(1));
        RuleOutcome::Continue
    }

    fn width(c: &mut Counter) -> RuleOutcome {
        c.state.intermediate_results.insert("width".into(), serde_json::json!(0.5));
        RuleOutcome::Continue
    }

    #[test]
    fn rules_run_in_order_without_stop() {
        let mut c = Counter::new(rules![quiet, noisy, quiet, noisy], false);
        c.run_checks().unwrap();
        assert_eq!(c.calls, vec!["quiet", "noisy", "quiet", "noisy"]);
        assert_eq!(c.state.issues.len(), 2);
    }

    #[test]
    fn stop_after_first_issue_halts() {
        let mut c = Counter::new(rules![quiet, noisy, noisy], true);
        c.run_checks().unwrap();
        assert_eq!(c.calls, vec!["quiet", "noisy"]);
    }

    #[test]
    fn advisory_issues_do_not_halt() {
        let mut c = Counter::new(rules![advisory, quiet, noisy, quiet], true);
        c.run_checks().unwrap();
        assert_eq!(c.calls, vec!["advisory", "quiet", "noisy"]);
        assert!(c.state.has_blocking_issues());
    }

    #[test]
    fn stop_outcome_halts() {
        let mut c = Counter::new(rules![stopping, noisy], false);
        c.run_checks().unwrap();
        assert_eq!(c.calls, vec!["stopping"]);
    }

    #[test]
    fn stop_without_issue_is_an_error() {
        let mut c = Counter::new(rules![quiet, bad_stop], false);
        let err = c.run_checks().unwrap_err();
        assert_eq!(
            err,
            CheckerError::StopWithoutIssue {
                checker: "counter".into(),
                rule: "bad_stop"
            }
        );
    }

    #[test]
    fn skipped_rules_do_not_run() {
        let mut c = Counter::new(rules![noisy, quiet], false);
        c.state.skipped_rules.push("noisy");
        c.run_checks().unwrap();
        assert_eq!(c.calls, vec!["quiet"]);
    }

    #[test]
    fn chain_halts_on_first_reporting_member() {
        let chain = ChainChecker::new(vec![
            Box::new(Counter::new(rules![width], false)),
            Box::new(Counter::new(rules![noisy], false)),
            Box::new(Counter::new(rules![noisy], false)),
        ]);
        let (issues, results) = chain.run().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(results["width"], serde_json::json!(0.5));
    }

    #[test]
    fn chain_passes_advisory_members() {
        let chain = ChainChecker::new(vec![
            Box::new(Counter::new(rules![advisory], true)),
            Box::new(Counter::new(rules![noisy], true)),
            Box::new(Counter::new(rules![noisy], true)),
        ]);
        let (issues, _) = chain.run().unwrap();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn chain_can_collect_everything() {
        let chain = ChainChecker::new(vec![
            Box::new(Counter::new(rules![noisy], false)),
            Box::new(Counter::new(rules![noisy], false)),
        ])
        .with_stop_after_first_issue(false);
        let (issues, _) = chain.run().unwrap();
        assert_eq!(issues.len(), 2);
    }
}
