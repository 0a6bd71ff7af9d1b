//! Rendering of display items
//!
//! Tables render to a LaTeX `table` environment for compilation and to a
//! fixed-width text block for feedback. Figures render to a `figure`
//! environment referencing the image the plotting step would produce.

use crate::display::DisplayItem;
use crate::provenance::RenderMode;
use crate::table::Table;

/// Escape LaTeX special characters
#[must_use]
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(ch);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            other => out.push(other),
        }
    }
    out
}

/// Typeset source for `item`
#[must_use]
pub fn render_latex(item: &DisplayItem, mode: RenderMode) -> String {
    if item.is_figure() {
        render_figure(item)
    } else {
        render_table(item, mode)
    }
}

fn render_table(item: &DisplayItem, mode: RenderMode) -> String {
    let table = &item.table;
    let show_index = item.shows_index();
    let show_header = item.args.header.unwrap_or(true);
    let n_cols = table.columns.len() + usize::from(show_index);

    let mut out = String::new();
    out.push_str("\\begin{table}[h]\n");
    if let Some(caption) = &item.args.caption {
        out.push_str(&format!("\\caption{{{}}}\n", escape_latex(caption)));
    }
    out.push_str(&format!("\\label{{table:{}}}\n", item.filename));
    out.push_str("\\begin{threeparttable}\n");
    out.push_str(&format!("\\begin{{tabular}}{{{}}}\n\\toprule\n", "l".repeat(n_cols.max(1))));
    if show_header {
        let mut header: Vec<String> = Vec::with_capacity(n_cols);
        if show_index {
            header.push(escape_latex(&table.index.title().unwrap_or_default()));
        }
        header.extend(table.columns.labels.iter().map(|l| bold(&escape_latex(&l.to_string()))));
        out.push_str(&header.join(" & "));
        out.push_str(" \\\\\n\\midrule\n");
    }
    for (label, row) in table.index.labels.iter().zip(&table.data) {
        let mut fields: Vec<String> = Vec::with_capacity(n_cols);
        if show_index {
            fields.push(bold(&escape_latex(&label.to_string())));
        }
        fields.extend(row.iter().map(|cell| escape_latex(&cell.render(mode))));
        out.push_str(&fields.join(" & "));
        out.push_str(" \\\\\n");
    }
    out.push_str("\\bottomrule\n\\end{tabular}\n");
    let notes = notes_block(item);
    if !notes.is_empty() {
        out.push_str("\\begin{tablenotes}\n\\footnotesize\n");
        out.push_str(&notes);
        out.push_str("\\end{tablenotes}\n");
    }
    out.push_str("\\end{threeparttable}\n\\end{table}\n");
    out
}

fn render_figure(item: &DisplayItem) -> String {
    let mut out = String::new();
    out.push_str("\\begin{figure}[h]\n\\centering\n");
    out.push_str(&format!(
        "\\includegraphics[width=\\textwidth]{{{}.png}}\n",
        item.filename
    ));
    let mut caption = item.args.caption.clone().map(|c| escape_latex(&c)).unwrap_or_default();
    let notes = notes_block(item);
    if !notes.is_empty() {
        caption.push('\n');
        caption.push_str(&notes);
    }
    out.push_str(&format!("\\caption{{{caption}}}\n"));
    out.push_str(&format!("\\label{{figure:{}}}\n", item.filename));
    out.push_str("\\end{figure}\n");
    out
}

fn notes_block(item: &DisplayItem) -> String {
    let mut notes = String::new();
    if let Some(note) = &item.args.note {
        notes.push_str(&format!("\\item {}\n", escape_latex(note)));
    }
    if let Some(glossary) = &item.args.glossary {
        for (term, definition) in glossary {
            notes.push_str(&format!(
                "\\item \\textbf{{{}}}: {}\n",
                escape_latex(term),
                escape_latex(definition)
            ));
        }
    }
    notes
}

fn bold(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("\\textbf{{{text}}}")
    }
}

/// Fixed-width text block of a table
#[must_use]
pub fn render_text(table: &Table, mode: RenderMode) -> String {
    let mut grid: Vec<Vec<String>> = Vec::with_capacity(table.data.len() + 1);
    let mut header = vec![table.index.title().unwrap_or_default()];
    header.extend(table.columns.labels.iter().map(ToString::to_string));
    grid.push(header);
    for (label, row) in table.index.labels.iter().zip(&table.data) {
        let mut line = vec![label.to_string()];
        line.extend(row.iter().map(|c| c.render(mode)));
        grid.push(line);
    }

    let n_cols = grid.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..n_cols)
        .map(|c| {
            grid.iter()
                .filter_map(|row| row.get(c))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    grid.iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (text, width))| {
                    if i == 0 {
                        format!("{text:<width$}")
                    } else {
                        format!("{text:>width$}")
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
