//! Code block extraction from a model response

use crate::failure::CodeExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Triple-backtick delimiter
pub const FENCE: &str = "```";

static CODE_BLOCKS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?s)```python\n(.*?)\n```",
        r"(?s)``` python\n(.*?)\n```",
        r"(?s)```\n(.*?)\n```",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Extract the single fenced code block of `response`, trimmed
///
/// # Errors
///
/// [`CodeExtractionError`] carrying the number of ``` delimiters when the
/// response does not hold exactly one accepted block.
pub fn extract_code(response: &str) -> Result<String, CodeExtractionError> {
    let num_fences = response.matches(FENCE).count();
    if num_fences != 2 {
        return Err(CodeExtractionError { num_fences });
    }
    for block in CODE_BLOCKS.iter() {
        let mut matches = block.captures_iter(response);
        if let (Some(only), None) = (matches.next(), matches.next()) {
            if let Some(code) = only.get(1) {
                return Ok(code.as_str().trim().to_string());
            }
        }
    }
    Err(CodeExtractionError { num_fences })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepted_fence_forms() {
        assert_eq!(extract_code("text\n```python\nx = 1\n```\nmore").unwrap(), "x = 1");
        assert_eq!(extract_code("``` python\n  x = 1  \n```").unwrap(), "x = 1");
        assert_eq!(extract_code("```\nx = 1\n```").unwrap(), "x = 1");
    }

    #[test]
    fn counts_delimiters_on_failure() {
        assert_eq!(extract_code("no code here").unwrap_err().num_fences, 0);
        assert_eq!(extract_code("```python\nx = 1\n").unwrap_err().num_fences, 1);
        let two_blocks = "```python\na = 1\n```\n```python\nb = 2\n```";
        assert_eq!(extract_code(two_blocks).unwrap_err().num_fences, 4);
    }

    #[test]
    fn unknown_language_tag_is_rejected() {
        assert_eq!(extract_code("```rust\nfn main() {}\n```").unwrap_err().num_fences, 2);
    }

    proptest! {
        #[test]
        fn single_block_roundtrips(code in "[a-z][a-z0-9 =+*()]{0,40}") {
            let response = format!("Here you go:\n```python\n{code}\n```\nDone.");
            prop_assert_eq!(extract_code(&response).unwrap(), code.trim());
        }

        #[test]
        fn odd_fence_counts_always_fail(n in 0usize..3) {
            let response = "```\n".repeat(2 * n + 1);
            prop_assert!(extract_code(&response).is_err());
        }
    }
}
