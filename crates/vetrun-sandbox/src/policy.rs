//! Static execution policy
//!
//! The generated source is parsed with tree-sitter before any interpreter is
//! spawned. Imports, forbidden built-ins and literal `open(..., "w")` calls
//! are checked here; the guest bootstrap repeats the same checks at runtime
//! for whatever cannot be decided statically.

use crate::config::SandboxConfig;
use crate::failure::{RunFailure, SourceFrame};
use vetrun_artifact::{CodeProblem, RunIssue, RunIssues};
use vetrun_outputs::glob_matches;

/// Issue category for discouraged built-ins
pub const DISCOURAGED_CATEGORY: &str = "Use of discouraged functions";

/// Result of a passing static check
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticReport {
    /// Imported modules, canonical dotted names in source order
    pub imports: Vec<String>,
    /// Non-fatal findings
    pub issues: RunIssues,
}

/// Policy derived from a [`SandboxConfig`]
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicy<'c> {
    allowed_imports: Option<&'c [String]>,
    forbidden_builtins: &'c [String],
    discouraged_builtins: &'c [String],
    allowed_write_files: Option<&'c [String]>,
}

struct Violation {
    offset: usize,
    failure: RunFailure,
}

struct Walk<'p, 's> {
    policy: &'p StaticPolicy<'p>,
    source: &'s str,
    imports: Vec<String>,
    discouraged: Vec<(String, SourceFrame)>,
    violations: Vec<Violation>,
}

impl<'c> StaticPolicy<'c> {
    /// Policy from the import, built-in and write lists of `config`
    #[must_use]
    pub fn new(config: &'c SandboxConfig, write_files: Option<&'c [String]>) -> Self {
        Self {
            allowed_imports: config.allowed_imports.as_deref(),
            forbidden_builtins: &config.forbidden_builtins,
            discouraged_builtins: &config.discouraged_builtins,
            allowed_write_files: write_files,
        }
    }

    /// Parse and check `source`
    ///
    /// # Errors
    ///
    /// The earliest violation in source order: a parse error, a forbidden
    /// import, a forbidden built-in or a forbidden literal file write.
    pub fn check(&self, source: &str) -> Result<StaticReport, RunFailure> {
        let mut parser = tree_sitter::Parser::new();
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| RunFailure::Interpreter(format!("python grammar unavailable: {e}")))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| RunFailure::Interpreter("python parser returned no tree".to_string()))?;
        let root = tree.root_node();

        if root.has_error() {
            if let Some(bad) = first_error(root) {
                let lineno = bad.start_position().row + 1;
                let message = if bad.is_missing() {
                    format!("invalid syntax: missing `{}`", bad.kind())
                } else {
                    "invalid syntax".to_string()
                };
                tracing::debug!(lineno, "generated code does not parse");
                return Err(RunFailure::CodeParsing {
                    frame: SourceFrame::from_source(source, lineno),
                    message,
                    unresolved_fences: source.contains(crate::extract::FENCE),
                });
            }
        }

        let mut walk = Walk {
            policy: self,
            source,
            imports: Vec::new(),
            discouraged: Vec::new(),
            violations: Vec::new(),
        };
        walk.visit(root);

        if let Some(earliest) = walk.violations.into_iter().min_by_key(|v| v.offset) {
            tracing::info!(failure = %earliest.failure, "static policy violation");
            return Err(earliest.failure);
        }

        let mut issues = RunIssues::new();
        for function in self.discouraged_builtins {
            let lines: Vec<(usize, String)> = walk
                .discouraged
                .iter()
                .filter(|(name, _)| name == function)
                .map(|(_, f)| (f.lineno, f.line.clone()))
                .collect();
            if lines.is_empty() {
                continue;
            }
            issues.push(
                RunIssue::new(
                    DISCOURAGED_CATEGORY,
                    format!("Your code uses the `{function}` function."),
                    CodeProblem::NonBreakingRuntimeIssue,
                )
                .with_instructions(format!(
                    "Your code should only write to the output files, not use `{function}`."
                ))
                .with_lines(lines),
            );
        }

        Ok(StaticReport {
            imports: walk.imports,
            issues,
        })
    }

    fn import_allowed(&self, module: &str) -> bool {
        let top = module.split('.').next().unwrap_or(module);
        self.allowed_imports
            .map_or(true, |allowed| allowed.iter().any(|a| a == top))
    }

    fn write_allowed(&self, filename: &str) -> bool {
        let Some(allowed) = self.allowed_write_files else {
            return true;
        };
        run_relative(filename).is_some_and(|parts| allowed.iter().any(|g| path_matches(g, &parts)))
    }
}

/// Segments of `filename` relative to the run folder, `None` when it leaves it
fn run_relative(filename: &str) -> Option<Vec<&str>> {
    if filename.starts_with(['/', '\\']) || filename.get(1..2) == Some(":") {
        return None;
    }
    let mut parts = Vec::new();
    for segment in filename.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            _ => parts.push(segment),
        }
    }
    Some(parts)
}

/// Segment-wise glob match; `*` never crosses a folder boundary
fn path_matches(pattern: &str, parts: &[&str]) -> bool {
    let globs: Vec<&str> = pattern.split('/').collect();
    globs.len() == parts.len() && globs.iter().zip(parts).all(|(g, p)| glob_matches(g, p))
}

fn first_error(node: tree_sitter::Node<'_>) -> Option<tree_sitter::Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.has_error() || child.is_missing() {
                if let Some(found) = first_error(child) {
                    return Some(found);
                }
            }
        }
    }
    None
}

impl<'s> Walk<'_, 's> {
    fn text(&self, node: tree_sitter::Node<'_>) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn frame(&self, node: tree_sitter::Node<'_>) -> SourceFrame {
        SourceFrame::from_source(self.source, node.start_position().row + 1)
    }

    fn visit(&mut self, node: tree_sitter::Node<'_>) {
        match node.kind() {
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_import_from(node),
            "future_import_statement" => return,
            "identifier" => self.visit_identifier(node),
            "call" => self.visit_call(node),
            _ => {}
        }
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.visit(child);
            }
        }
    }

    fn visit_import(&mut self, node: tree_sitter::Node<'_>) {
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let dotted = if name.kind() == "aliased_import" {
                name.child_by_field_name("name").map_or("", |n| self.text(n))
            } else {
                self.text(name)
            };
            self.record_import(node, dotted.to_string(), false);
        }
    }

    fn visit_import_from(&mut self, node: tree_sitter::Node<'_>) {
        if let Some(module) = node.child_by_field_name("module_name") {
            let relative = module.kind() == "relative_import";
            self.record_import(node, self.text(module).to_string(), relative);
        }
    }

    fn record_import(&mut self, statement: tree_sitter::Node<'_>, module: String, relative: bool) {
        if module.is_empty() {
            return;
        }
        if relative || !self.policy.import_allowed(&module) {
            self.violations.push(Violation {
                offset: statement.start_byte(),
                failure: RunFailure::ForbiddenImport {
                    module: module.clone(),
                    frames: vec![self.frame(statement)],
                },
            });
        }
        self.imports.push(module);
    }

    fn visit_identifier(&mut self, node: tree_sitter::Node<'_>) {
        let name = self.text(node);
        if !self.policy.forbidden_builtins.iter().any(|f| f == name) || !is_reference(node) {
            return;
        }
        self.violations.push(Violation {
            offset: node.start_byte(),
            failure: RunFailure::ForbiddenFunction {
                function: name.to_string(),
                frames: vec![self.frame(node)],
            },
        });
    }

    fn visit_call(&mut self, node: tree_sitter::Node<'_>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if function.kind() != "identifier" {
            return;
        }
        let name = self.text(function);
        if self.policy.discouraged_builtins.iter().any(|d| d == name) {
            self.discouraged.push((name.to_string(), self.frame(node)));
        }
        if name == "open" {
            self.visit_open(node);
        }
    }

    fn visit_open(&mut self, call: tree_sitter::Node<'_>) {
        let Some(arguments) = call.child_by_field_name("arguments") else {
            return;
        };
        let mut positional = Vec::new();
        let mut mode = None;
        for i in 0..arguments.named_child_count() {
            let Some(arg) = arguments.named_child(i) else {
                continue;
            };
            if arg.kind() == "keyword_argument" {
                let key = arg.child_by_field_name("name").map(|n| self.text(n));
                if key == Some("mode") {
                    mode = arg.child_by_field_name("value");
                }
            } else if arg.kind() != "comment" {
                positional.push(arg);
            }
        }
        let mode = mode.or_else(|| positional.get(1).copied());
        let (Some(file), Some(mode)) = (positional.first(), mode) else {
            return;
        };
        let (Some(filename), Some(mode)) = (self.string_literal(*file), self.string_literal(mode)) else {
            return;
        };
        if !mode.contains(['w', 'a', 'x', '+']) || self.policy.write_allowed(&filename) {
            return;
        }
        self.violations.push(Violation {
            offset: call.start_byte(),
            failure: RunFailure::ForbiddenFileWrite {
                filename,
                frames: vec![self.frame(call)],
            },
        });
    }

    /// Text of a plain (non-interpolated) string literal
    fn string_literal(&self, node: tree_sitter::Node<'_>) -> Option<String> {
        if node.kind() != "string" {
            return None;
        }
        let mut content = String::new();
        for i in 0..node.named_child_count() {
            let child = node.named_child(i)?;
            match child.kind() {
                "string_content" => content.push_str(self.text(child)),
                "string_start" => {
                    if self.text(child).to_ascii_lowercase().contains('f') {
                        return None;
                    }
                }
                "string_end" => {}
                _ => return None,
            }
        }
        Some(content)
    }
}

/// Whether an identifier reads a binding (call or bare use)
fn is_reference(node: tree_sitter::Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    let is_field = |field: &str| parent.child_by_field_name(field) == Some(node);
    match parent.kind() {
        "attribute" => !is_field("attribute"),
        "keyword_argument" => !is_field("name"),
        "function_definition" | "class_definition" => !is_field("name"),
        "default_parameter" | "typed_default_parameter" => !is_field("name"),
        "parameters" | "lambda_parameters" | "typed_parameter" => false,
        "assignment" | "augmented_assignment" => !is_field("left"),
        "dotted_name" | "aliased_import" | "import_statement" | "import_from_statement" => false,
        _ => true,
    }
}
