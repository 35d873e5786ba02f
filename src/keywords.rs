//! Title-derived keyword extraction (spec §4.4), used as a facet fallback
//! when a provider doesn't return keyword facets of its own.
//!
//! Kept as a toy counter per design note §9: lowercase, strip non-alphanumeric,
//! split on whitespace, drop stop words, count occurrences. The tokenizer is
//! made Unicode-aware via `char::is_alphanumeric` rather than an ASCII-only
//! check, per that same note's invitation to generalize.

use crate::model::KeywordCount;
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me",
    "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
    "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same", "she", "should",
    "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "using", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "with", "would", "you", "your", "yours", "yourself", "yourselves",
];

/// Extracts keyword counts from a list of titles, skipping stop words and
/// single-character tokens.
pub fn from_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<KeywordCount> {
    let stop: std::collections::HashSet<&str> = STOP_WORDS.iter().copied().collect();
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();

    for title in titles {
        for token in tokenize(title) {
            if token.chars().count() <= 1 || stop.contains(token.as_str()) {
                continue;
            }
            *counts.entry(token).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .map(|(text, value)| KeywordCount { text, value })
        .collect()
}

/// lowercases and splits on runs of non-alphanumeric characters
fn tokenize(title: &str) -> Vec<String> {
    let lower = title.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_and_counts_occurrences() {
        let titles = ["The Rise of Machine Learning", "Machine Learning in Practice"];
        let counts = from_titles(titles.iter().copied());
        let machine = counts.iter().find(|k| k.text == "machine").unwrap();
        assert_eq!(machine.value, 2);
        assert!(counts.iter().all(|k| k.text != "the" && k.text != "of" && k.text != "in"));
    }

    #[test]
    fn handles_unicode_titles() {
        let titles = ["Über Künstliche Intelligenz", "Künstliche Systeme"];
        let counts = from_titles(titles.iter().copied());
        let kuenstliche = counts.iter().find(|k| k.text == "künstliche").unwrap();
        assert_eq!(kuenstliche.value, 2);
    }
}
