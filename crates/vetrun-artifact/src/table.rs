//! Tabular artifact content
//!
//! A [`Table`] is the decoded form of a data frame handed to `df_to_latex`
//! or `df_to_figure`: row labels, column labels and a rectangular grid of
//! [`Cell`]s. Provenance is tracked per cell.

use crate::error::DecodeError;
use crate::provenance::{format_float, ProvenanceValue, RenderMode, Scalar};
use std::fmt;

/// Row or column label
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    /// Integer label
    Int(i64),
    /// Floating label
    Float(f64),
    /// Text label
    Str(String),
    /// Boolean label
    Bool(bool),
    /// Missing label
    Null,
    /// One label per level of a multi-level axis
    Multi(Vec<Label>),
    /// Label of a type the codec does not model, by type name
    Other(String),
}

impl Label {
    /// Text label, if this is one
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Python-style type name used in feedback messages
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bool(_) => "bool",
            Self::Null => "NoneType",
            Self::Multi(_) => "tuple",
            Self::Other(name) => name,
        }
    }

    /// Leaf labels, expanding multi-level labels
    #[must_use]
    pub fn leaves(&self) -> Vec<&Label> {
        match self {
            Self::Multi(parts) => parts.iter().flat_map(Label::leaves).collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_float(*v)),
            Self::Str(s) => f.write_str(s),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Null => f.write_str("None"),
            Self::Multi(parts) => {
                let parts: Vec<String> = parts.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
            Self::Other(name) => write!(f, "<{name}>"),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Labels along one axis of a table
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// Level names; more than one entry means a multi-level axis
    pub names: Vec<Option<String>>,
    /// One label per row (or column)
    pub labels: Vec<Label>,
}

impl Axis {
    /// Single-level unnamed axis
    #[must_use]
    pub fn new(labels: Vec<Label>) -> Self {
        Self {
            names: vec![None],
            labels,
        }
    }

    /// Default `0..n` integer axis
    #[must_use]
    pub fn range(n: usize) -> Self {
        Self::new((0..n).map(|i| Label::Int(i64::try_from(i).unwrap_or(i64::MAX))).collect())
    }

    /// Set the level names
    #[must_use]
    pub fn with_names(mut self, names: Vec<Option<String>>) -> Self {
        self.names = names;
        self
    }

    /// Number of labels
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the axis has no labels
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether the axis has more than one level
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.names.len() > 1 || self.labels.iter().any(|l| matches!(l, Label::Multi(_)))
    }

    /// Joined level names, if any level is named
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let named: Vec<&str> = self.names.iter().flatten().map(String::as_str).collect();
        if named.is_empty() {
            None
        } else {
            Some(named.join(", "))
        }
    }

    /// Position of the label whose text equals `name`
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.to_string() == name)
    }

    fn strings(&self, with_title: bool, string_only: bool) -> Vec<String> {
        let mut out = Vec::new();
        if with_title {
            out.extend(self.names.iter().flatten().cloned());
        }
        for label in &self.labels {
            for leaf in label.leaves() {
                match leaf {
                    Label::Str(s) => out.push(s.clone()),
                    other if !string_only => out.push(other.to_string()),
                    _ => {}
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        out.retain(|s| seen.insert(s.clone()));
        out
    }
}

/// One value in a table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Integer value
    Int(i64),
    /// Floating value
    Float(f64),
    /// Text value
    Str(String),
    /// Boolean value
    Bool(bool),
    /// Fixed-arity tuple, e.g. a confidence interval
    Tuple(Vec<Cell>),
    /// Number produced by an intercepted statistics call
    Provenance(ProvenanceValue),
    /// Missing value
    Null,
    /// Value of a type outside the supported set, by type name
    Unsupported(String),
}

impl Cell {
    /// Numeric payload; booleans are not numbers here
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Provenance(p) => Some(p.value()),
            _ => None,
        }
    }

    /// Whether the cell holds a number
    #[inline]
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Whether the cell holds a number with a fractional part
    #[must_use]
    pub fn is_non_integer_number(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite() && v.fract() != 0.0,
            Self::Provenance(p) => p.value().is_finite() && !p.is_integer(),
            _ => false,
        }
    }

    /// Whether the cell is missing
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Provenance, if tagged
    #[inline]
    #[must_use]
    pub fn provenance(&self) -> Option<&ProvenanceValue> {
        match self {
            Self::Provenance(p) => Some(p),
            _ => None,
        }
    }

    /// Python-style type name used in feedback messages
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Bool(_) => "bool",
            Self::Tuple(_) => "tuple",
            Self::Provenance(_) => "PValue",
            Self::Null => "NoneType",
            Self::Unsupported(name) => name,
        }
    }

    /// Stringify, rendering tagged values according to `mode`
    #[must_use]
    pub fn render(&self, mode: RenderMode) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => format_float(*v),
            Self::Str(s) => s.clone(),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
            Self::Tuple(items) => {
                let items: Vec<String> = items.iter().map(|c| c.render(mode)).collect();
                format!("({})", items.join(", "))
            }
            Self::Provenance(p) => p.render(mode),
            Self::Null => "NaN".to_string(),
            Self::Unsupported(name) => format!("<{name}>"),
        }
    }
}

impl From<Scalar> for Cell {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Plain(v) if v.is_nan() => Self::Null,
            Scalar::Plain(v) => Self::Float(v),
            Scalar::Tagged(p) => Self::Provenance(p),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        if value.is_nan() {
            Self::Null
        } else {
            Self::Float(value)
        }
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<ProvenanceValue> for Cell {
    fn from(value: ProvenanceValue) -> Self {
        Self::Provenance(value)
    }
}

/// Decoded data frame
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Row labels
    pub index: Axis,
    /// Column labels
    pub columns: Axis,
    /// Row-major cells, `index.len()` rows of `columns.len()` cells
    pub data: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table from its parts
    #[must_use]
    pub fn new(index: Axis, columns: Axis, data: Vec<Vec<Cell>>) -> Self {
        Self {
            index,
            columns,
            data,
        }
    }

    /// Table with a default `0..n` index and the given column names
    #[must_use]
    pub fn from_rows(columns: &[&str], data: Vec<Vec<Cell>>) -> Self {
        let index = Axis::range(data.len());
        let columns = Axis::new(columns.iter().map(|c| Label::from(*c)).collect());
        Self::new(index, columns, data)
    }

    /// Replace the row labels
    #[must_use]
    pub fn with_index(mut self, index: Axis) -> Self {
        self.index = index;
        self
    }

    /// Reject ragged or mislabelled grids
    pub fn validate_shape(&self) -> Result<(), DecodeError> {
        if self.data.len() != self.index.len() {
            return Err(DecodeError::Shape {
                expected: format!("{} rows", self.index.len()),
                actual: format!("{} rows", self.data.len()),
            });
        }
        if let Some((row, cells)) = self
            .data
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != self.columns.len())
        {
            return Err(DecodeError::Shape {
                expected: format!("{} columns", self.columns.len()),
                actual: format!("{} cells in row {row}", cells.len()),
            });
        }
        Ok(())
    }

    /// `(rows, columns)`
    #[inline]
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.columns.len())
    }

    /// Cell at `(row, column)`
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.data.get(row).and_then(|r| r.get(column))
    }

    /// Every cell with its coordinates, row-major
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &Cell)> + '_ {
        self.data
            .iter()
            .enumerate()
            .flat_map(|(r, row)| row.iter().enumerate().map(move |(c, cell)| (r, c, cell)))
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.data.iter().filter_map(move |row| row.get(column))
    }

    /// Swap rows and columns
    #[must_use]
    pub fn transpose(&self) -> Self {
        let (rows, cols) = self.shape();
        let data = (0..cols)
            .map(|c| {
                (0..rows)
                    .map(|r| self.cell(r, c).cloned().unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();
        Self::new(self.columns.clone(), self.index.clone(), data)
    }

    /// Whether the row labels are exactly the integers `0..n`
    #[must_use]
    pub fn is_trivial_range_index(&self) -> bool {
        !self.index.is_empty()
            && !self.index.is_multi()
            && self
                .index
                .labels
                .iter()
                .enumerate()
                .all(|(i, label)| matches!(label, Label::Int(v) if usize::try_from(*v).ok() == Some(i)))
    }

    /// Row label strings, optionally with the axis title and only text labels
    #[must_use]
    pub fn row_labels(&self, with_title: bool, string_only: bool) -> Vec<String> {
        self.index.strings(with_title, string_only)
    }

    /// Column label strings, optionally with the axis title and only text labels
    #[must_use]
    pub fn column_labels(&self, with_title: bool, string_only: bool) -> Vec<String> {
        self.columns.strings(with_title, string_only)
    }

    /// Union of row and column label strings
    #[must_use]
    pub fn axes_labels(&self, with_title: bool, string_only: bool) -> Vec<String> {
        let mut labels = self.row_labels(with_title, string_only);
        for label in self.column_labels(with_title, string_only) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Number of missing cells
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.cells().filter(|(_, _, cell)| cell.is_null()).count()
    }

    /// Indices of rows holding at least one missing cell
    #[must_use]
    pub fn rows_with_nulls(&self) -> Vec<usize> {
        self.data
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().any(Cell::is_null))
            .map(|(i, _)| i)
            .collect()
    }

    /// Same table with every cell replaced by whether it is missing
    #[must_use]
    pub fn null_mask(&self) -> Self {
        let data = self
            .data
            .iter()
            .map(|row| row.iter().map(|cell| Cell::Bool(cell.is_null())).collect())
            .collect();
        Self::new(self.index.clone(), self.columns.clone(), data)
    }

    /// Subset of rows, in the given order
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let labels = rows
            .iter()
            .filter_map(|r| self.index.labels.get(*r).cloned())
            .collect();
        let data = rows.iter().filter_map(|r| self.data.get(*r).cloned()).collect();
        Self::new(
            Axis {
                names: self.index.names.clone(),
                labels,
            },
            self.columns.clone(),
            data,
        )
    }

    /// Comma-separated rendering with a header line, as shown in feedback
    #[must_use]
    pub fn to_readable_csv(&self, mode: RenderMode) -> String {
        let mut lines = Vec::with_capacity(self.data.len() + 1);
        let mut header = vec![csv_field(&self.index.title().unwrap_or_default())];
        header.extend(self.columns.labels.iter().map(|l| csv_field(&l.to_string())));
        lines.push(header.join(","));
        for (label, row) in self.index.labels.iter().zip(&self.data) {
            let mut fields = vec![csv_field(&label.to_string())];
            fields.extend(row.iter().map(|cell| csv_field(&cell.render(mode))));
            lines.push(fields.join(","));
        }
        lines.join("\n")
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}
