//! Single output file requirement

use crate::error::{OutputError, OutputResult};
use crate::text::{count_tokens, create_hypertargets_to_numeric_values, extract_to_nearest_newline, round_floats};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vetrun_artifact::{
    decode_display_item, render_latex, CodeProblem, DisplayItem, RenderMode, RunIssue, SealVerifier,
};

/// Token budget for text outputs
pub const DEFAULT_MAX_TOKENS: usize = 2500;

/// An over-long output is previewed within its token budget divided by this;
/// the cut then falls back to the last line break inside that many tokens
pub const TOO_LONG_PREVIEW_DIVISOR: usize = 2;

/// Significant digits kept when rendering numeric text
pub const NUM_DIGITS_FOR_FLOATS: usize = 4;

/// Significant digits from which a printed float counts as unformatted
pub const SOURCE_PRECISION: usize = 10;

/// Category of content issues
pub const OUTPUT_CONTENT_CATEGORY: &str = "Output file content";

/// What a matched file holds and how it is decoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequirementKind {
    /// Opaque file, not decoded
    Data,
    /// Free text
    Text {
        /// Token budget
        max_tokens: Option<usize>,
    },
    /// Text whose floats are rounded when rendered
    NumericText {
        /// Token budget
        max_tokens: Option<usize>,
        /// Digits kept when rendering
        target_precision: usize,
        /// Digits from which a float is rounded
        source_precision: usize,
    },
    /// Serialized object
    Json,
    /// Recorded display call document
    DisplayItems,
}

/// Decoded content of one output file
#[derive(Debug, Clone, PartialEq)]
pub enum OutputContent {
    /// Text file
    Text(String),
    /// Serialized object
    Json(serde_json::Value),
    /// Recorded display call
    DisplayItem(Box<DisplayItem>),
}

/// Declared expectation about files a run should produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFileRequirement {
    /// Exact filename or glob
    pub pattern: String,
    /// Fewest files that must match
    pub minimal_count: usize,
    /// Keep matched files after decoding
    pub should_keep_file: bool,
    /// Decoder
    pub kind: RequirementKind,
    /// Prefixes for numeric hypertargets, one per matched file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hypertarget_prefixes: Option<Vec<String>>,
}

impl OutputFileRequirement {
    fn new(pattern: impl Into<String>, minimal_count: usize, should_keep_file: bool, kind: RequirementKind) -> Self {
        Self {
            pattern: pattern.into(),
            minimal_count,
            should_keep_file,
            kind,
            hypertarget_prefixes: None,
        }
    }

    /// Opaque data files, optional and kept
    #[must_use]
    pub fn data(pattern: impl Into<String>) -> Self {
        Self::new(pattern, 0, true, RequirementKind::Data)
    }

    /// Required text file, deleted after reading
    #[must_use]
    pub fn text(pattern: impl Into<String>) -> Self {
        Self::new(
            pattern,
            1,
            false,
            RequirementKind::Text {
                max_tokens: Some(DEFAULT_MAX_TOKENS),
            },
        )
    }

    /// Required text file with rounded floats, deleted after reading
    #[must_use]
    pub fn numeric_text(pattern: impl Into<String>) -> Self {
        Self::new(
            pattern,
            1,
            false,
            RequirementKind::NumericText {
                max_tokens: Some(DEFAULT_MAX_TOKENS),
                target_precision: NUM_DIGITS_FOR_FLOATS,
                source_precision: SOURCE_PRECISION,
            },
        )
    }

    /// Required serialized object, kept
    #[must_use]
    pub fn json(pattern: impl Into<String>) -> Self {
        Self::new(pattern, 1, true, RequirementKind::Json)
    }

    /// Display item documents, at least one, kept
    #[must_use]
    pub fn display_items(pattern: impl Into<String>) -> Self {
        Self::new(pattern, 1, true, RequirementKind::DisplayItems)
    }

    /// Set the fewest matching files
    #[must_use]
    pub fn with_minimal_count(mut self, minimal_count: usize) -> Self {
        self.minimal_count = minimal_count;
        self
    }

    /// Set whether matched files are kept
    #[must_use]
    pub fn with_should_keep_file(mut self, keep: bool) -> Self {
        self.should_keep_file = keep;
        self
    }

    /// Set hypertarget prefixes
    #[must_use]
    pub fn with_hypertarget_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.hypertarget_prefixes = Some(prefixes);
        self
    }

    /// Set the token budget of a text requirement
    #[must_use]
    pub fn with_max_tokens(mut self, budget: Option<usize>) -> Self {
        match &mut self.kind {
            RequirementKind::Text { max_tokens } | RequirementKind::NumericText { max_tokens, .. } => {
                *max_tokens = budget;
            }
            RequirementKind::Data | RequirementKind::Json | RequirementKind::DisplayItems => {}
        }
        self
    }

    /// Whether the pattern is a glob
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.pattern.contains(['*', '?'])
    }

    /// Whether the matched files are decoded
    #[must_use]
    pub fn has_content(&self) -> bool {
        !matches!(self.kind, RequirementKind::Data)
    }

    /// Whether `filename` satisfies the pattern
    #[must_use]
    pub fn matches(&self, filename: &str) -> bool {
        glob_matches(&self.pattern, filename)
    }

    /// Decode the file at `path`; `None` for opaque data files
    pub fn get_content(&self, path: &Path, verifier: &dyn SealVerifier) -> OutputResult<Option<OutputContent>> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let read = || std::fs::read_to_string(path).map_err(|e| OutputError::io_error(path, e));
        Ok(match &self.kind {
            RequirementKind::Data => None,
            RequirementKind::Text { .. } | RequirementKind::NumericText { .. } => Some(OutputContent::Text(read()?)),
            RequirementKind::Json => Some(OutputContent::Json(
                serde_json::from_str(&read()?).map_err(|source| OutputError::Json { filename, source })?,
            )),
            RequirementKind::DisplayItems => Some(OutputContent::DisplayItem(Box::new(
                decode_display_item(&read()?, verifier)
                    .map_err(|source| OutputError::DisplayItem { filename, source })?,
            ))),
        })
    }

    /// Remove the file at `path` unless it is kept
    pub fn delete_if_needed(&self, path: &Path) -> OutputResult<()> {
        if self.should_keep_file {
            return Ok(());
        }
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OutputError::io_error(path, e)),
        }
    }

    /// Empty or oversized text content
    #[must_use]
    pub fn content_issues(&self, filename: &str, content: &OutputContent) -> Vec<RunIssue> {
        let (RequirementKind::Text { max_tokens } | RequirementKind::NumericText { max_tokens, .. }) = &self.kind
        else {
            return Vec::new();
        };
        let OutputContent::Text(text) = content else {
            return Vec::new();
        };
        if text.trim().is_empty() {
            return vec![RunIssue::new(
                OUTPUT_CONTENT_CATEGORY,
                format!("The code created the output file \"{filename}\", but the file is just empty!"),
                CodeProblem::OutputFileContentLevelA,
            )
            .with_item(filename)
            .with_instructions("Please revise the code to make sure it correctly writes to the output file.")];
        }
        if let Some(limit) = max_tokens {
            if count_tokens(text) > *limit {
                let preview = extract_to_nearest_newline(text, *limit / TOO_LONG_PREVIEW_DIVISOR);
                return vec![RunIssue::new(
                    OUTPUT_CONTENT_CATEGORY,
                    format!(
                        "The code created the output file \"{filename}\", but the file is too long!\n\n\
                         Here, for context, is the beginning of the output:\n```output\n{preview}\n```"
                    ),
                    CodeProblem::OutputFileContentLevelC,
                )
                .with_item(filename)
                .with_instructions("Only sensible-length output should be written to the file.")];
            }
        }
        Vec::new()
    }

    /// Content as shown in feedback; `file_number` selects the hypertarget prefix
    #[must_use]
    pub fn pretty_content(
        &self,
        content: &OutputContent,
        filename: &str,
        mode: RenderMode,
        hypertarget_file_number: Option<usize>,
    ) -> String {
        let mut body = match (content, &self.kind) {
            (
                OutputContent::Text(text),
                RequirementKind::NumericText {
                    target_precision,
                    source_precision,
                    ..
                },
            ) => round_floats(text, *target_precision, *source_precision),
            (OutputContent::Text(text), _) => text.clone(),
            (OutputContent::Json(value), _) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            (OutputContent::DisplayItem(item), _) => render_latex(item, mode),
        };
        if let (Some(number), Some(prefixes)) = (hypertarget_file_number, &self.hypertarget_prefixes) {
            if let Some(prefix) = prefixes.get(number).or_else(|| prefixes.last()) {
                body = create_hypertargets_to_numeric_values(&body, prefix).0;
            }
        }
        body.trim_end().to_string()
    }

    /// Fence label for a file of this requirement
    #[must_use]
    pub fn fence_label(&self, filename: &str) -> &'static str {
        if matches!(self.kind, RequirementKind::DisplayItems) {
            return "latex";
        }
        label_for_extension(filename)
    }
}

/// Fence label by file extension
#[must_use]
pub fn label_for_extension(filename: &str) -> &'static str {
    match Path::new(filename).extension().and_then(|e| e.to_str()) {
        Some("tex") => "latex",
        Some("csv") => "csv",
        Some("json") => "json",
        _ => "output",
    }
}

/// fnmatch-style matching: `*`, `?` and `[...]` classes, anchored
#[must_use]
pub fn glob_matches(pattern: &str, filename: &str) -> bool {
    Regex::new(&glob_to_regex(pattern)).is_ok_and(|re| re.is_match(filename))
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut j = i + 1;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(r"\[");
                } else {
                    let mut class: String = chars[i + 1..j].iter().collect();
                    if let Some(rest) = class.strip_prefix('!') {
                        class = format!("^{rest}");
                    }
                    out.push('[');
                    out.push_str(&class.replace('\\', r"\\"));
                    out.push(']');
                    i = j;
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    out.push('$');
    out
}
