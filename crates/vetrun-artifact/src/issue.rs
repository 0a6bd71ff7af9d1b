//! Run issues
//!
//! Structured, non-fatal findings returned to the code author together with
//! correction instructions and a severity ranking.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Problem ranking, most fundamental first.
///
/// Ordering follows declaration order: a syntax-level problem sorts before
/// a content-level one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CodeProblem {
    /// Response has no code block
    NoCode,
    /// Code block is not closed
    IncompleteBlock,
    /// Response has more than one code block
    NotSingleBlock,
    /// Code violates the static policy
    StaticCheck,
    /// Code raised while running
    RuntimeError,
    /// Code ran past its time budget
    TimeoutError,
    /// Required output files were not created
    MissingOutputFiles,
    /// Code ran but triggered a warning or a discouraged call
    NonBreakingRuntimeIssue,
    /// Artifact function called with wrong arguments
    OutputFileCallingSyntax,
    /// Output content is unusable
    OutputFileContentLevelA,
    /// Output content needs restructuring
    OutputFileContentLevelB,
    /// Output content needs polishing
    OutputFileContentLevelC,
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIssue {
    /// Free-text grouping
    pub category: String,
    /// Subject, usually a filename
    pub item: Option<String>,
    /// What is wrong
    pub issue: String,
    /// How to fix it
    pub instructions: String,
    /// Extra context appended to feedback
    pub comment: Option<String>,
    /// Severity
    pub code_problem: CodeProblem,
    /// Suppress once raised this many times before
    pub forgive_after: Option<u32>,
    /// Offending source locations
    pub linenos_and_lines: Vec<(usize, String)>,
}

impl RunIssue {
    /// New issue with empty instructions
    #[must_use]
    pub fn new(category: impl Into<String>, issue: impl Into<String>, code_problem: CodeProblem) -> Self {
        Self {
            category: category.into(),
            item: None,
            issue: issue.into(),
            instructions: String::new(),
            comment: None,
            code_problem,
            forgive_after: None,
            linenos_and_lines: Vec::new(),
        }
    }

    /// Set the subject
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    /// Set correction instructions
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Set a comment
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Set the forgive-after threshold
    #[must_use]
    pub fn with_forgive_after(mut self, forgive_after: u32) -> Self {
        self.forgive_after = Some(forgive_after);
        self
    }

    /// Set source locations
    #[must_use]
    pub fn with_lines(mut self, linenos_and_lines: Vec<(usize, String)>) -> Self {
        self.linenos_and_lines = linenos_and_lines;
        self
    }

    fn history_key(&self) -> (String, Option<String>, String) {
        (self.category.clone(), self.item.clone(), self.issue.clone())
    }
}

/// Ordered, append-only collection of issues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunIssues(Vec<RunIssue>);

impl RunIssues {
    /// Empty collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append one issue
    #[inline]
    pub fn push(&mut self, issue: RunIssue) {
        self.0.push(issue);
    }

    /// Append every issue of `other`
    pub fn extend(&mut self, other: impl IntoIterator<Item = RunIssue>) {
        self.0.extend(other);
    }

    /// Number of issues
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no issues
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Issues in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, RunIssue> {
        self.0.iter()
    }

    /// Most fundamental problem among the issues
    #[must_use]
    pub fn most_severe(&self) -> Option<CodeProblem> {
        self.0.iter().map(|i| i.code_problem).min()
    }

    /// Drop issues that were raised `forgive_after` times before, recording
    /// every issue that remains or is dropped in `history`.
    ///
    /// Identical issues within one pass count as one occurrence.
    pub fn apply_forgiveness(&mut self, history: &mut IssueHistory) {
        let mut seen = std::collections::HashSet::new();
        let mut kept = Vec::with_capacity(self.0.len());
        for issue in self.0.drain(..) {
            let key = issue.history_key();
            let previous = history.occurrences_of(&key);
            if seen.insert(key.clone()) {
                history.record(key);
            }
            match issue.forgive_after {
                Some(limit) if previous >= limit => {
                    tracing::debug!(category = %issue.category, previous, limit, "issue forgiven");
                }
                _ => kept.push(issue),
            }
        }
        self.0 = kept;
    }

    /// Feedback message grouped by category.
    ///
    /// With `most_severe_only`, only issues of the most fundamental problem
    /// level are included.
    #[must_use]
    pub fn message(&self, most_severe_only: bool) -> String {
        let Some(top) = self.most_severe() else {
            return String::new();
        };
        let mut sorted: Vec<&RunIssue> = self.0.iter().collect();
        sorted.sort_by_key(|i| i.code_problem);
        if most_severe_only {
            sorted.retain(|i| i.code_problem == top);
        }

        let mut by_category: IndexMap<&str, Vec<&RunIssue>> = IndexMap::new();
        for issue in sorted {
            by_category.entry(issue.category.as_str()).or_default().push(issue);
        }

        let mut out = String::new();
        for (category, issues) in by_category {
            out.push_str(&format!("# {category}\n"));
            let mut instructions: Vec<&str> = Vec::new();
            for issue in &issues {
                match &issue.item {
                    Some(item) => out.push_str(&format!("* {item}:\n{}\n", issue.issue)),
                    None => out.push_str(&format!("{}\n", issue.issue)),
                }
                for (lineno, line) in &issue.linenos_and_lines {
                    out.push_str(&format!("On line {lineno}: {line}\n"));
                }
                if !issue.instructions.is_empty() && !instructions.contains(&issue.instructions.as_str()) {
                    instructions.push(&issue.instructions);
                }
                if let Some(comment) = &issue.comment {
                    out.push_str(&format!("{comment}\n"));
                }
            }
            for text in instructions {
                out.push_str(&format!("\n{text}\n"));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

impl IntoIterator for RunIssues {
    type Item = RunIssue;
    type IntoIter = std::vec::IntoIter<RunIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RunIssues {
    type Item = &'a RunIssue;
    type IntoIter = std::slice::Iter<'a, RunIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<RunIssue> for RunIssues {
    fn from_iter<T: IntoIterator<Item = RunIssue>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<RunIssue>> for RunIssues {
    fn from(issues: Vec<RunIssue>) -> Self {
        Self(issues)
    }
}

/// Occurrence counts of issues across the retries of one artifact lineage
#[derive(Debug, Clone, Default)]
pub struct IssueHistory {
    counts: HashMap<(String, Option<String>, String), u32>,
}

impl IssueHistory {
    /// Empty history
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many earlier passes raised `issue`
    #[must_use]
    pub fn occurrences(&self, issue: &RunIssue) -> u32 {
        self.occurrences_of(&issue.history_key())
    }

    fn occurrences_of(&self, key: &(String, Option<String>, String)) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    fn record(&mut self, key: (String, Option<String>, String)) {
        *self.counts.entry(key).or_insert(0) += 1;
    }
}
