//! Size limits of display items

/// Plot kinds `df_to_figure` accepts
pub const ALLOWED_PLOT_KINDS: &[&str] = &["bar", "barh", "line", "scatter", "hist", "box", "violin"];

/// Maximum number of bars in a bar plot
pub const MAX_BARS: usize = 30;

/// Width ratio above which a compiled table is too wide
pub const MAX_TABLE_WIDTH: f64 = 1.3;

/// Width ratio the transposed table must stay under to suggest transposing
pub const MAX_TRANSPOSED_WIDTH: f64 = 1.1;

/// Width ratio under which a table counts as narrow
pub const NARROW_TABLE_WIDTH: f64 = 0.8;

/// Maximal `(rows, columns)` of an item; `None` means unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimit {
    /// Row limit
    pub rows: Option<usize>,
    /// Column limit
    pub columns: Option<usize>,
}

impl SizeLimit {
    const fn new(rows: Option<usize>, columns: Option<usize>) -> Self {
        Self { rows, columns }
    }

    /// Whether `(rows, columns)` fits
    #[must_use]
    pub fn fits(&self, rows: usize, columns: usize) -> bool {
        within(rows, self.rows) && within(columns, self.columns)
    }

    /// Whether `(rows, columns)` fits once transposed
    #[must_use]
    pub fn fits_transposed(&self, rows: usize, columns: usize) -> bool {
        self.fits(columns, rows)
    }
}

/// Whether `value` is within the optional `limit`
#[inline]
#[must_use]
pub(crate) fn within(value: usize, limit: Option<usize>) -> bool {
    limit.map_or(true, |max| value <= max)
}

/// Render an optional limit for feedback text
#[must_use]
pub(crate) fn limit_text(limit: Option<usize>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |max| max.to_string())
}

/// Limits of a table, or of a figure of `kind`
#[must_use]
pub fn max_rows_and_columns(is_figure: bool, kind: Option<&str>) -> SizeLimit {
    if !is_figure {
        return SizeLimit::new(Some(20), Some(10));
    }
    match kind {
        Some("bar" | "barh") => SizeLimit::new(Some(20), Some(5)),
        Some("line" | "scatter") => SizeLimit::new(None, Some(5)),
        _ => SizeLimit::new(Some(30), Some(5)),
    }
}
