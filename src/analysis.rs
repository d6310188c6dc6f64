//! Pure text-analysis algorithms shared by the workers and the engine.
//!
//! These functions carry the deterministic parts of the pipeline: token
//! extraction, ranked frequency selection, and sentence extraction/ordering.
//! None of them touch I/O or shared state, which keeps them trivially
//! testable and reusable on both sides of the result queue.

use crate::messages::WordFrequency;
use regex::Regex;
use std::collections::HashMap;

/// Splits text into lowercase word tokens.
///
/// A token is a maximal run of Unicode letters and decimal digits; everything
/// else separates tokens. Holds its compiled boundary pattern so repeated
/// calls do not pay the regex compilation cost.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    boundary: Regex,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r"[^\p{L}\p{Nd}]+").unwrap(),
        }
    }

    /// Tokenize `text` into lowercase words.
    ///
    /// # Examples
    ///
    /// ```
    /// use textmill::analysis::Tokenizer;
    ///
    /// let tokenizer = Tokenizer::new();
    /// let tokens = tokenizer.tokenize("Café life, déjà-vu in '42!");
    /// assert_eq!(tokens, vec!["café", "life", "déjà", "vu", "in", "42"]);
    /// ```
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.boundary
            .split(&text.to_lowercase())
            .filter(|token| !token.is_empty())
            .map(|token| token.to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Select the N highest-count entries from a frequency map.
///
/// Ordering is deterministic: count descending, ties broken by word ascending
/// lexicographically, truncated to `n` entries after sorting. Repeated runs
/// over the same input always produce the same list.
///
/// # Arguments
///
/// * `frequencies` - Map from word to cumulative count
/// * `n` - Maximum number of entries to keep
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use textmill::analysis::top_n_words;
///
/// let frequencies: HashMap<String, u64> =
///     [("a".to_string(), 3), ("b".to_string(), 3), ("c".to_string(), 1)].into();
/// let ranked = top_n_words(&frequencies, 2);
/// let words: Vec<&str> = ranked.iter().map(|w| w.word.as_str()).collect();
/// assert_eq!(words, vec!["a", "b"]);
/// ```
pub fn top_n_words(frequencies: &HashMap<String, u64>, n: usize) -> Vec<WordFrequency> {
    let mut ranked: Vec<WordFrequency> = frequencies
        .iter()
        .map(|(word, count)| WordFrequency::new(word.clone(), *count))
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    ranked.truncate(n);
    ranked
}

/// Split text into trimmed sentences.
///
/// Line breaks are first normalized to single spaces, then the text is split
/// after any of `.` `!` `?` followed by whitespace; the whitespace run is the
/// separator and is consumed. Empty candidates are dropped. A trailing
/// fragment without terminal punctuation still counts as a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = normalize_line_breaks(text);

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut after_terminal = false;

    for c in normalized.chars() {
        if after_terminal && c.is_whitespace() {
            push_sentence(&mut sentences, &mut current);
            after_terminal = false;
            continue;
        }
        current.push(c);
        after_terminal = matches!(c, '.' | '!' | '?');
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

/// Sort sentences by character length ascending, ties broken lexicographically.
pub fn sort_sentences(sentences: &mut [String]) {
    sentences.sort_by(|a, b| {
        a.chars()
            .count()
            .cmp(&b.chars().count())
            .then_with(|| a.cmp(b))
    });
}

/// Replace every line break (`\r\n`, `\r`, or `\n`) with a single space.
pub fn normalize_line_breaks(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}
