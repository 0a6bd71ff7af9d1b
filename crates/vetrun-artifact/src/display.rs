//! Display items
//!
//! Every call the generated code makes to `df_to_latex` or `df_to_figure`
//! produces one [`DisplayItem`]: the function called, the target filename,
//! the keyword arguments and the table it was called with.

use crate::table::Table;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Artifact-producing function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayFunction {
    /// `df_to_latex`
    #[serde(rename = "df_to_latex")]
    Latex,
    /// `df_to_figure`
    #[serde(rename = "df_to_figure")]
    Figure,
}

impl DisplayFunction {
    /// Name as called from generated code
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Latex => "df_to_latex",
            Self::Figure => "df_to_figure",
        }
    }

    /// `table` or `figure`
    #[must_use]
    pub fn noun(self) -> &'static str {
        match self {
            Self::Latex => "table",
            Self::Figure => "figure",
        }
    }
}

/// Axis argument given either as one column name or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    /// Single column
    One(String),
    /// Several columns
    Many(Vec<String>),
}

impl OneOrMany {
    /// Column names as a list
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

/// Keyword arguments of a display call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct DisplayArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xerr: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yerr: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_ci: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_ci: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_p_value: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_p_value: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xlabel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ylabel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logx: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_index: Option<bool>,
    /// Any other keyword argument, kept verbatim
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl DisplayArgs {
    /// Set the caption
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Set the note
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Set the glossary
    #[must_use]
    pub fn with_glossary<K: Into<String>, V: Into<String>>(
        mut self,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.glossary = Some(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set the plot kind
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Set the value axis columns
    #[must_use]
    pub fn with_y(mut self, y: OneOrMany) -> Self {
        self.y = Some(y);
        self
    }
}

/// One recorded display call
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    /// Function called
    pub function: DisplayFunction,
    /// Target name, without extension
    pub filename: String,
    /// Keyword arguments
    pub args: DisplayArgs,
    /// Data the function was called with
    pub table: Table,
    /// Filenames of the loaded artifacts this table was derived from, oldest first
    pub lineage: Option<Vec<String>>,
}

impl DisplayItem {
    /// New item without lineage
    #[must_use]
    pub fn new(function: DisplayFunction, filename: impl Into<String>, table: Table) -> Self {
        Self {
            function,
            filename: filename.into(),
            args: DisplayArgs::default(),
            table,
            lineage: None,
        }
    }

    /// Set keyword arguments
    #[must_use]
    pub fn with_args(mut self, args: DisplayArgs) -> Self {
        self.args = args;
        self
    }

    /// Set lineage
    #[must_use]
    pub fn with_lineage(mut self, lineage: Vec<String>) -> Self {
        self.lineage = Some(lineage);
        self
    }

    /// Whether this is a `df_to_figure` call
    #[inline]
    #[must_use]
    pub fn is_figure(&self) -> bool {
        self.function == DisplayFunction::Figure
    }

    /// Filename of the artifact this one was loaded from
    #[must_use]
    pub fn previous_filename(&self) -> Option<&str> {
        self.lineage
            .as_ref()
            .and_then(|l| l.last())
            .map(String::as_str)
    }

    /// Whether the row labels are shown: `index` for tables,
    /// `use_index` without `x` for figures
    #[must_use]
    pub fn shows_index(&self) -> bool {
        if self.is_figure() {
            self.args.use_index.unwrap_or(true) && self.args.x.is_none()
        } else {
            self.args.index.unwrap_or(true)
        }
    }

    /// Same call on the transposed table
    #[must_use]
    pub fn transposed(&self) -> Self {
        Self {
            table: self.table.transpose(),
            ..self.clone()
        }
    }
}
