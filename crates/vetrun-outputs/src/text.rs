//! Text helpers for output content
//!
//! Float rounding for display, numeric hypertargets and an approximate token
//! count used for output size budgets.

use once_cell::sync::Lazy;
use regex::Regex;
use vetrun_artifact::format_significant;

static FLOAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+\.\d+(?:[eE][-+]?\d+)?").expect("valid float regex"));

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?").expect("valid number regex"));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("valid token regex"));

/// Characters per token assumed by [`count_tokens`]
pub const CHARS_PER_TOKEN: usize = 4;

/// Round floats printed with at least `source_precision` significant digits
/// to `target_precision` significant digits.
///
/// Numbers written with fewer digits were formatted deliberately and are
/// left untouched.
#[must_use]
pub fn round_floats(text: &str, target_precision: usize, source_precision: usize) -> String {
    replace_numbers(&FLOAT_RE, text, |token| {
        if significant_digits(token) < source_precision {
            return None;
        }
        let value: f64 = token.parse().ok()?;
        Some(format_significant(value, target_precision))
    })
}

/// Wrap every number in `text` in a `\hypertarget{<prefix><n>}{...}`.
///
/// Returns the new text and the numbers in order of appearance.
#[must_use]
pub fn create_hypertargets_to_numeric_values(text: &str, prefix: &str) -> (String, Vec<String>) {
    let mut values = Vec::new();
    let out = replace_numbers(&NUMBER_RE, text, |token| {
        values.push(token.to_string());
        Some(format!("\\hypertarget{{{prefix}{}}}{{{token}}}", values.len() - 1))
    });
    (out, values)
}

/// Approximate token count: every word costs one token per four characters,
/// every punctuation character costs one
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().chars().count().div_ceil(CHARS_PER_TOKEN).max(1))
        .sum()
}

/// Leading part of `text` within roughly `max_tokens`, cut at a line break
/// when one is available
#[must_use]
pub fn extract_to_nearest_newline(text: &str, max_tokens: usize) -> &str {
    let budget = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let end = text
        .char_indices()
        .nth(budget)
        .map_or(text.len(), |(i, _)| i);
    let head = &text[..end];
    if end == text.len() {
        return head;
    }
    match head.rfind('\n') {
        Some(i) if i > 0 => &head[..i],
        _ => head,
    }
}

fn significant_digits(token: &str) -> usize {
    let mantissa = token
        .split(['e', 'E'])
        .next()
        .unwrap_or(token)
        .trim_start_matches(['-', '+']);
    mantissa
        .chars()
        .filter(char::is_ascii_digit)
        .skip_while(|c| *c == '0')
        .count()
}

/// Replace numeric tokens that stand on their own, i.e. not glued to a word
/// or part of a dotted version string
fn replace_numbers(re: &Regex, text: &str, mut replace: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in re.find_iter(text) {
        let before = text[..m.start()].chars().next_back();
        let after = text[m.end()..].chars().next();
        let glued = before.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
            || after.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.');
        let replacement = if glued { None } else { replace(m.as_str()) };
        out.push_str(&text[last..m.start()]);
        out.push_str(replacement.as_deref().unwrap_or(m.as_str()));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_only_long_floats() {
        let text = "mean 3.14159265358979, sd 0.5, p=1.234567890123e-05";
        assert_eq!(round_floats(text, 4, 10), "mean 3.142, sd 0.5, p=1.235e-05");
    }

    #[test]
    fn leaves_version_strings_alone() {
        assert_eq!(round_floats("v1.23456789012.3", 3, 10), "v1.23456789012.3");
    }

    #[test]
    fn hypertargets_number_each_value() {
        let (text, values) = create_hypertargets_to_numeric_values("n = 12, r = -0.31", "R");
        assert_eq!(text, r"n = \hypertarget{R0}{12}, r = \hypertarget{R1}{-0.31}");
        assert_eq!(values, vec!["12", "-0.31"]);
    }

    #[test]
    fn token_estimate() {
        assert_eq!(count_tokens("hello, world"), 5);
        assert_eq!(count_tokens(""), 0);
    }

    #[test]
    fn preview_cuts_at_newline() {
        let text = "line one\nline two\nline three";
        assert_eq!(extract_to_nearest_newline(text, 3), "line one");
        assert_eq!(extract_to_nearest_newline(text, 100), text);
    }
}
