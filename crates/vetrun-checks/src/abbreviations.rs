//! Abbreviation detection for row and column labels

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Abbreviations readers are expected to know without a glossary
pub const COMMON_ABBREVIATIONS: &[&str] = &[
    "SD", "SE", "SEM", "CI", "N", "No", "P", "ID", "US", "UK", "USA", "EU", "AUC", "ROC", "Max", "Min", "vs",
];

static COMMON: Lazy<HashSet<&'static str>> = Lazy::new(|| COMMON_ABBREVIATIONS.iter().copied().collect());

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_.]+").expect("static pattern"));

/// Whether `word` reads like an abbreviation
fn is_abbreviated_word(word: &str) -> bool {
    let word = word.trim_start_matches('.');
    if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return false;
    }
    if word.contains('_') {
        return true;
    }
    let letters: Vec<char> = word.chars().filter(char::is_ascii_alphabetic).collect();
    if word.len() > 1 && word.ends_with('.') && letters.len() > 1 {
        return true;
    }
    let uppercase = letters.iter().filter(|c| c.is_ascii_uppercase()).count();
    if uppercase >= 2 && uppercase * 2 > letters.len() {
        return true;
    }
    // inner capitals such as `mRNA` or `logFC`
    letters.len() > 1 && letters.iter().skip(1).any(char::is_ascii_uppercase) && letters[0].is_ascii_lowercase()
}

/// Whether `label` contains an abbreviation outside [`COMMON_ABBREVIATIONS`]
#[must_use]
pub fn is_unknown_abbreviation(label: &str) -> bool {
    if COMMON.contains(label.trim()) {
        return false;
    }
    WORD.find_iter(label).any(|m| {
        let word = m.as_str();
        !COMMON.contains(word.trim_end_matches('.')) && is_abbreviated_word(word)
    })
}
