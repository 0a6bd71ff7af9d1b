//! Ordered requirement collections

use crate::error::OutputResult;
use crate::requirement::OutputFileRequirement;
use crate::with_content::{OutputFileRequirementsWithContent, RequirementFiles};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vetrun_artifact::{CodeProblem, RunIssue, RunIssues, SealVerifier};

/// Category of missing-output issues
pub const MISSING_OUTPUT_CATEGORY: &str = "Missing output files";

/// Created files split by requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<'a> {
    /// Files per requirement, in declaration order
    pub assigned: Vec<(&'a OutputFileRequirement, Vec<String>)>,
    /// Files no requirement matched
    pub unmatched: Vec<String>,
}

/// Requirements in declaration order; the first match wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputFileRequirements(Vec<OutputFileRequirement>);

impl OutputFileRequirements {
    /// No requirements
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a requirement
    #[must_use]
    pub fn with(mut self, requirement: OutputFileRequirement) -> Self {
        self.0.push(requirement);
        self
    }

    /// Requirements in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, OutputFileRequirement> {
        self.0.iter()
    }

    /// Whether no requirement is declared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First requirement matching `filename`
    #[must_use]
    pub fn requirement_for(&self, filename: &str) -> Option<&OutputFileRequirement> {
        self.0.iter().find(|r| r.matches(filename))
    }

    /// Assign every created file to the first requirement matching it
    #[must_use]
    pub fn reconcile(&self, created_files: &[String]) -> Reconciliation<'_> {
        let mut assigned: IndexMap<usize, Vec<String>> = (0..self.0.len()).map(|i| (i, Vec::new())).collect();
        let mut unmatched = Vec::new();
        for file in created_files {
            match self.0.iter().position(|r| r.matches(file)) {
                Some(i) => assigned.entry(i).or_default().push(file.clone()),
                None => unmatched.push(file.clone()),
            }
        }
        Reconciliation {
            assigned: assigned
                .into_iter()
                .filter_map(|(i, files)| self.0.get(i).map(|r| (r, files)))
                .collect(),
            unmatched,
        }
    }

    /// Created files no requirement matches
    #[must_use]
    pub fn unmatched_files(&self, created_files: &[String]) -> Vec<String> {
        self.reconcile(created_files).unmatched
    }

    /// Every declared pattern, usable as a write allow-list
    #[must_use]
    pub fn allowed_filenames(&self) -> Vec<String> {
        self.0.iter().map(|r| r.pattern.clone()).collect()
    }

    /// The one exact, required, decoded file, if exactly one is declared
    #[must_use]
    pub fn single_content_file(&self) -> Option<&str> {
        let mut candidates = self
            .0
            .iter()
            .filter(|r| r.has_content() && !r.is_wildcard() && r.minimal_count == 1);
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only.pattern.as_str()),
            _ => None,
        }
    }

    /// Requirements matched by fewer files than their minimal count
    #[must_use]
    pub fn missing_output_issues(&self, created_files: &[String]) -> RunIssues {
        self.reconcile(created_files)
            .assigned
            .into_iter()
            .filter(|(req, files)| files.len() < req.minimal_count)
            .map(|(req, files)| {
                let issue = if req.is_wildcard() {
                    format!(
                        "The code should create at least {} files matching \"{}\", but it created {}.",
                        req.minimal_count,
                        req.pattern,
                        files.len()
                    )
                } else {
                    format!("The code didn't generate the desired output file, \"{}\".", req.pattern)
                };
                RunIssue::new(MISSING_OUTPUT_CATEGORY, issue, CodeProblem::MissingOutputFiles)
                    .with_item(req.pattern.clone())
                    .with_instructions("Please revise the code to make sure it creates the required output file(s).")
            })
            .collect()
    }

    /// Decode every matched file, deleting it unless kept
    pub fn convert_to_with_content(
        &self,
        created_files: &[String],
        run_folder: &Path,
        verifier: &dyn SealVerifier,
    ) -> OutputResult<OutputFileRequirementsWithContent> {
        let mut sorted = created_files.to_vec();
        sorted.sort();
        let reconciliation = self.reconcile(&sorted);
        if !reconciliation.unmatched.is_empty() {
            tracing::warn!(unmatched = ?reconciliation.unmatched, "files outside every requirement are ignored");
        }

        let mut entries = Vec::with_capacity(reconciliation.assigned.len());
        for (requirement, files) in reconciliation.assigned {
            let mut contents = IndexMap::new();
            for file in files {
                let path = run_folder.join(&file);
                let content = requirement.get_content(&path, verifier)?;
                requirement.delete_if_needed(&path)?;
                tracing::debug!(file = %file, decoded = content.is_some(), "output file collected");
                contents.insert(file, content);
            }
            entries.push(RequirementFiles {
                requirement: requirement.clone(),
                files: contents,
            });
        }
        Ok(OutputFileRequirementsWithContent::new(entries, run_folder.to_path_buf()))
    }
}

impl From<Vec<OutputFileRequirement>> for OutputFileRequirements {
    fn from(requirements: Vec<OutputFileRequirement>) -> Self {
        Self(requirements)
    }
}

impl<'a> IntoIterator for &'a OutputFileRequirements {
    type Item = &'a OutputFileRequirement;
    type IntoIter = std::slice::Iter<'a, OutputFileRequirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
