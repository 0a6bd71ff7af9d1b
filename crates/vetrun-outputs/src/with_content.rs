//! Decoded outputs of one run

use crate::error::{OutputError, OutputResult};
use crate::requirement::{glob_matches, OutputContent, OutputFileRequirement};
use indexmap::IndexMap;
use std::path::PathBuf;
use vetrun_artifact::{DisplayItem, RenderMode, RunIssues};

/// Files matched by one requirement with their decoded content
#[derive(Debug, Clone, PartialEq)]
pub struct RequirementFiles {
    /// The requirement
    pub requirement: OutputFileRequirement,
    /// Filename to content; `None` for opaque data files
    pub files: IndexMap<String, Option<OutputContent>>,
}

/// Requirement → (filename → content), built once per run and read-only after
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFileRequirementsWithContent {
    entries: Vec<RequirementFiles>,
    run_folder: PathBuf,
}

impl OutputFileRequirementsWithContent {
    pub(crate) fn new(entries: Vec<RequirementFiles>, run_folder: PathBuf) -> Self {
        Self { entries, run_folder }
    }

    /// Entries in requirement declaration order
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[RequirementFiles] {
        &self.entries
    }

    /// Every created file
    #[must_use]
    pub fn created_files(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|e| e.files.keys().map(String::as_str))
            .collect()
    }

    /// Decoded files, optionally restricted to a glob
    #[must_use]
    pub fn created_content_files(&self, glob: Option<&str>) -> Vec<&str> {
        self.contents(glob).into_keys().collect()
    }

    /// Decoded content by filename, optionally restricted to a glob
    #[must_use]
    pub fn contents(&self, glob: Option<&str>) -> IndexMap<&str, &OutputContent> {
        self.iter_contents()
            .filter(|(_, name, _)| glob.map_or(true, |g| glob_matches(g, name)))
            .map(|(_, name, content)| (name, content))
            .collect()
    }

    /// Files kept on disk after decoding
    #[must_use]
    pub fn created_data_files(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.requirement.should_keep_file)
            .flat_map(|e| e.files.keys().map(String::as_str))
            .collect()
    }

    /// Recorded display calls, in filename order
    #[must_use]
    pub fn display_items(&self) -> Vec<&DisplayItem> {
        self.iter_contents()
            .filter_map(|(_, _, content)| match content {
                OutputContent::DisplayItem(item) => Some(item.as_ref()),
                _ => None,
            })
            .collect()
    }

    /// Each decoded file as a fenced block headed by its name
    #[must_use]
    pub fn pretty_contents(
        &self,
        mode: RenderMode,
        should_hypertarget: bool,
        glob: Option<&str>,
        is_block: bool,
    ) -> String {
        self.pretty_blocks(mode, should_hypertarget, glob, is_block).join("\n")
    }

    /// Fenced blocks of the decoded files matching `glob`, separated by blank lines
    #[must_use]
    pub fn description(&self, mode: RenderMode, glob: Option<&str>) -> String {
        self.pretty_blocks(mode, false, glob, true).join("\n\n")
    }

    fn pretty_blocks(
        &self,
        mode: RenderMode,
        should_hypertarget: bool,
        glob: Option<&str>,
        is_block: bool,
    ) -> Vec<String> {
        let mut blocks = Vec::new();
        for entry in &self.entries {
            let decoded = entry
                .files
                .iter()
                .filter_map(|(name, content)| content.as_ref().map(|c| (name, c)))
                .enumerate();
            for (number, (name, content)) in decoded {
                if glob.is_some_and(|g| !glob_matches(g, name)) {
                    continue;
                }
                let body = entry
                    .requirement
                    .pretty_content(content, name, mode, should_hypertarget.then_some(number));
                if is_block {
                    blocks.push(format!(
                        "\"{name}\":\n```{}\n{body}\n```\n",
                        entry.requirement.fence_label(name)
                    ));
                } else {
                    blocks.push(body);
                }
            }
        }
        blocks
    }

    /// Content of the only decoded file, if there is exactly one
    #[must_use]
    pub fn single_output(&self, mode: RenderMode) -> Option<String> {
        let mut decoded = self
            .entries
            .iter()
            .flat_map(|e| e.files.iter().map(move |(name, c)| (e, name, c)))
            .filter_map(|(e, name, c)| c.as_ref().map(|c| (e, name, c)));
        match (decoded.next(), decoded.next()) {
            (Some((entry, name, content)), None) => {
                Some(entry.requirement.pretty_content(content, name, mode, None))
            }
            _ => None,
        }
    }

    /// Empty and oversized text outputs
    #[must_use]
    pub fn content_issues(&self) -> RunIssues {
        self.iter_contents()
            .flat_map(|(requirement, name, content)| requirement.content_issues(name, content))
            .collect()
    }

    /// Remove every created file that is still on disk
    pub fn delete_all_created_files(&self) -> OutputResult<()> {
        for name in self.created_files() {
            let path = self.run_folder.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(OutputError::io_error(path, e)),
            }
        }
        Ok(())
    }

    fn iter_contents(&self) -> impl Iterator<Item = (&OutputFileRequirement, &str, &OutputContent)> + '_ {
        self.entries.iter().flat_map(|e| {
            e.files
                .iter()
                .filter_map(move |(name, c)| c.as_ref().map(|c| (&e.requirement, name.as_str(), c)))
        })
    }
}
