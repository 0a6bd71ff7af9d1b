//! Display-item checker
//!
//! One [`DfChecker`] validates one [`DisplayItem`] with the rule table of
//! its [`DfCheckerKind`].

use crate::error::CheckerResult;
use crate::framework::{run_rules, Checker, CheckerState, Rule};
use crate::rules;
use crate::services::CheckServices;
use vetrun_artifact::{Cell, CodeProblem, DisplayArgs, DisplayItem, RunIssue, Table};

/// Intermediate result holding the compiled width ratio
pub const WIDTH_KEY: &str = "width";

/// Rule set applied by a [`DfChecker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DfCheckerKind {
    /// `df_to_latex` call arguments
    TableSyntax,
    /// `df_to_figure` call arguments
    FigureSyntax,
    /// Table values, labels and size
    TableContent,
    /// Figure values, labels, size and p-value declarations
    FigureContent,
    /// Table compilation and width
    TableCompilation,
    /// Figure compilation
    FigureCompilation,
    /// Display-stage table polish
    SecondTableContent,
    /// Display-stage figure polish
    SecondFigureContent,
    /// Labels, glossary, caption and note
    Annotation,
    /// Derivation from a loaded artifact
    Continuity,
}

impl DfCheckerKind {
    /// Every kind
    pub const ALL: [Self; 10] = [
        Self::TableSyntax,
        Self::FigureSyntax,
        Self::TableContent,
        Self::FigureContent,
        Self::TableCompilation,
        Self::FigureCompilation,
        Self::SecondTableContent,
        Self::SecondFigureContent,
        Self::Annotation,
        Self::Continuity,
    ];

    /// Name used in logs
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TableSyntax => "table_syntax",
            Self::FigureSyntax => "figure_syntax",
            Self::TableContent => "table_content",
            Self::FigureContent => "figure_content",
            Self::TableCompilation => "table_compilation",
            Self::FigureCompilation => "figure_compilation",
            Self::SecondTableContent => "second_table_content",
            Self::SecondFigureContent => "second_figure_content",
            Self::Annotation => "annotation",
            Self::Continuity => "continuity",
        }
    }

    /// Category of issues that do not name their own
    #[must_use]
    pub fn default_category(self) -> &'static str {
        match self {
            Self::TableSyntax | Self::FigureSyntax => "Checking df_to_figure/df_to_latex for call syntax",
            Self::FigureContent => "Checking figure",
            Self::Continuity => "File continuity",
            Self::TableContent
            | Self::TableCompilation
            | Self::FigureCompilation
            | Self::SecondTableContent
            | Self::SecondFigureContent
            | Self::Annotation => "Checking content of created dfs",
        }
    }

    /// Problem level of every issue of this kind
    #[must_use]
    pub fn code_problem(self) -> CodeProblem {
        match self {
            Self::TableSyntax | Self::FigureSyntax => CodeProblem::OutputFileCallingSyntax,
            Self::TableContent | Self::FigureContent | Self::Continuity => CodeProblem::OutputFileContentLevelA,
            Self::TableCompilation
            | Self::FigureCompilation
            | Self::SecondTableContent
            | Self::SecondFigureContent => CodeProblem::OutputFileContentLevelB,
            Self::Annotation => CodeProblem::OutputFileContentLevelC,
        }
    }

    /// Whether the checker halts on the first rule leaving an issue
    #[must_use]
    pub fn stops_after_first_issue(self) -> bool {
        !matches!(self, Self::TableSyntax | Self::FigureSyntax | Self::Annotation)
    }

    /// Ordered rule table
    #[must_use]
    pub fn rules<'a>(self) -> Vec<Rule<DfChecker<'a>>> {
        match self {
            Self::TableSyntax => rules::syntax::table_rules(),
            Self::FigureSyntax => rules::syntax::figure_rules(),
            Self::TableContent => rules::content::table_rules(),
            Self::FigureContent => rules::content::figure_rules(),
            Self::TableCompilation => rules::compilation::table_rules(),
            Self::FigureCompilation => rules::compilation::figure_rules(),
            Self::SecondTableContent => rules::second::table_rules(),
            Self::SecondFigureContent => rules::second::figure_rules(),
            Self::Annotation => rules::annotation::rules(),
            Self::Continuity => rules::continuity::rules(),
        }
    }
}

/// Axis arguments of a figure: values, errors, confidence intervals, p-values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AxisArgs {
    pub(crate) values: Option<Vec<String>>,
    pub(crate) err: Option<Vec<String>>,
    pub(crate) ci: Option<Vec<String>>,
    pub(crate) p_value: Option<Vec<String>>,
}

/// Checker of one display item
#[derive(Debug)]
pub struct DfChecker<'a> {
    kind: DfCheckerKind,
    item: &'a DisplayItem,
    prior: &'a [&'a DisplayItem],
    services: &'a CheckServices,
    state: CheckerState,
}

impl<'a> DfChecker<'a> {
    /// Checker of `kind` over `item`; `prior` are items created earlier in the run
    #[must_use]
    pub fn new(
        kind: DfCheckerKind,
        item: &'a DisplayItem,
        prior: &'a [&'a DisplayItem],
        services: &'a CheckServices,
    ) -> Self {
        Self {
            kind,
            item,
            prior,
            services,
            state: CheckerState::new(kind.stops_after_first_issue()),
        }
    }

    /// Rule set applied
    #[inline]
    #[must_use]
    pub fn kind(&self) -> DfCheckerKind {
        self.kind
    }

    pub(crate) fn item(&self) -> &'a DisplayItem {
        self.item
    }

    pub(crate) fn table(&self) -> &'a Table {
        &self.item.table
    }

    pub(crate) fn args(&self) -> &'a DisplayArgs {
        &self.item.args
    }

    pub(crate) fn prior(&self) -> &'a [&'a DisplayItem] {
        self.prior
    }

    pub(crate) fn services(&self) -> &'a CheckServices {
        self.services
    }

    pub(crate) fn filename(&self) -> &'a str {
        &self.item.filename
    }

    pub(crate) fn is_figure(&self) -> bool {
        self.item.is_figure()
    }

    /// `table` or `figure`
    pub(crate) fn noun(&self) -> &'static str {
        self.item.function.noun()
    }

    pub(crate) fn func_name(&self) -> &'static str {
        self.item.function.name()
    }

    pub(crate) fn kind_arg(&self) -> Option<&'a str> {
        self.item.args.kind.as_deref()
    }

    /// Issue in the default category of this checker, about this item
    pub(crate) fn issue(&self, text: impl Into<String>) -> RunIssue {
        self.issue_in(self.kind.default_category(), text)
    }

    pub(crate) fn issue_in(&self, category: &str, text: impl Into<String>) -> RunIssue {
        RunIssue::new(category, text, self.kind.code_problem()).with_item(self.filename())
    }

    pub(crate) fn push(&mut self, issue: RunIssue) {
        self.state.push(issue);
    }

    pub(crate) fn width(&self) -> Option<f64> {
        self.state
            .intermediate_results
            .get(WIDTH_KEY)
            .and_then(serde_json::Value::as_f64)
    }

    pub(crate) fn set_width(&mut self, width: Option<f64>) {
        let value = width.map_or(serde_json::Value::Null, |w| serde_json::json!(w));
        self.state.intermediate_results.insert(WIDTH_KEY.to_string(), value);
    }

    /// `x`/`y` with their `err`, `_ci` and `_p_value` arguments, as lists
    pub(crate) fn axis_args(&self, axis: char) -> AxisArgs {
        let args = self.args();
        let list = |v: &Option<vetrun_artifact::OneOrMany>| v.as_ref().map(vetrun_artifact::OneOrMany::to_vec);
        if axis == 'x' {
            AxisArgs {
                values: args.x.clone().map(|x| vec![x]),
                err: list(&args.xerr),
                ci: list(&args.x_ci),
                p_value: list(&args.x_p_value),
            }
        } else {
            AxisArgs {
                values: list(&args.y),
                err: list(&args.yerr),
                ci: list(&args.y_ci),
                p_value: list(&args.y_p_value),
            }
        }
    }

    /// Position of the column labelled `name`
    pub(crate) fn column_position(&self, name: &str) -> Option<usize> {
        self.table().columns.position(name)
    }
}

impl Checker for DfChecker<'_> {
    fn name(&self) -> String {
        format!("{}[{}]", self.kind.name(), self.item.filename)
    }

    fn state(&self) -> &CheckerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CheckerState {
        &mut self.state
    }

    fn run_checks(&mut self) -> CheckerResult<()> {
        let rules = self.kind.rules();
        run_rules(self, &rules)
    }
}

/// Python-style list rendering used in feedback, e.g. `['a', 'b']`
pub(crate) fn py_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}

/// Whether `cell` is a tagged p-value
pub(crate) fn is_p_value(cell: &Cell) -> bool {
    cell.provenance().is_some_and(|p| p.label() == Some("pvalue"))
}

/// Whether column `column` holds any tagged p-value
pub(crate) fn column_has_p_values(table: &Table, column: usize) -> bool {
    table.column(column).any(is_p_value)
}

/// Whether every present value of column `column` is a tagged p-value
pub(crate) fn column_only_p_values(table: &Table, column: usize) -> bool {
    table.column(column).filter(|c| !c.is_null()).all(is_p_value)
}
