// Rust guideline compliant 2026-02-13

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use regex::{Captures, Regex};

use crate::error::TokenOptimizationError;

/// Phrases replaced by a shorter form in every semantic rewrite.
const SEED_ABBREVIATIONS: &[(&str, &str)] = &[
    ("artificial intelligence", "AI"),
    ("machine learning", "ML"),
    ("as soon as possible", "ASAP"),
    ("for example", "e.g."),
    ("application", "app"),
    ("configuration", "config"),
    ("documentation", "docs"),
    ("implementation", "impl"),
    ("information", "info"),
    ("repository", "repo"),
    ("人工智能", "AI"),
    ("机器学习", "ML"),
];

/// Filler words dropped from Balanced and Aggressive rewrites.
const SEED_STOP_WORDS: &[&str] = &[
    "a", "an", "the", "very", "really", "just", "basically", "actually", "simply", "quite",
    "please", "kindly", "的", "了", "着", "来", "去", "把",
];

/// Abbreviation and stop-word tables of an engine.
///
/// Keys are stored lowercased and matched case-insensitively.
#[derive(Debug, Clone)]
pub struct Dictionary {
    abbreviations: HashMap<String, String>,
    stop_words: HashSet<String>,
    matcher: Option<Regex>,
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Dictionary {
    /// Empty dictionary without seed entries.
    pub fn empty() -> Self {
        Self {
            abbreviations: HashMap::new(),
            stop_words: HashSet::new(),
            matcher: None,
        }
    }

    /// Dictionary seeded with the built-in abbreviations and stop words.
    pub fn with_defaults() -> Self {
        let mut dict = Self::empty();
        for (full, abbr) in SEED_ABBREVIATIONS {
            dict.abbreviations
                .insert(full.to_lowercase(), (*abbr).to_string());
        }
        for word in SEED_STOP_WORDS {
            dict.stop_words.insert(word.to_lowercase());
        }
        // Seed phrases are plain literals; a failure here would be a bug in the table.
        dict.matcher = build_matcher(&dict.abbreviations).ok().flatten();
        dict
    }

    pub fn abbreviation_count(&self) -> usize {
        self.abbreviations.len()
    }

    pub fn stop_word_count(&self) -> usize {
        self.stop_words.len()
    }

    /// Register `full -> abbr`. Returns `true` when the mapping changed.
    ///
    /// The abbreviation may not be longer than the phrase so rewrites never grow text.
    pub fn add_abbreviation(
        &mut self,
        full: &str,
        abbr: &str,
    ) -> Result<bool, TokenOptimizationError> {
        let full = full.trim();
        let abbr = abbr.trim();
        if full.is_empty() {
            return Err(invalid("abbreviation", "the full phrase must not be empty"));
        }
        if abbr.is_empty() {
            return Err(invalid("abbreviation", "the abbreviation must not be empty"));
        }
        if abbr.chars().count() > full.chars().count() {
            return Err(invalid(
                "abbreviation",
                &format!("'{abbr}' is longer than the phrase '{full}' it replaces"),
            ));
        }

        let key = full.to_lowercase();
        if self.abbreviations.get(&key).map(String::as_str) == Some(abbr) {
            return Ok(false);
        }

        let mut next = self.abbreviations.clone();
        next.insert(key, abbr.to_string());
        let matcher = build_matcher(&next)?;
        self.abbreviations = next;
        self.matcher = matcher;
        Ok(true)
    }

    /// Register a stop word. Returns `true` when it was not present yet.
    pub fn add_stop_word(&mut self, word: &str) -> Result<bool, TokenOptimizationError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(invalid("stop word", "the word must not be empty"));
        }
        if word.chars().any(char::is_whitespace) {
            return Err(invalid(
                "stop word",
                &format!("'{word}' must be a single word"),
            ));
        }
        Ok(self.stop_words.insert(word.to_lowercase()))
    }

    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(&word.to_lowercase())
    }

    /// Replace every known phrase in `text` with its abbreviation.
    pub fn abbreviate<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.matcher {
            Some(matcher) => matcher.replace_all(text, |caps: &Captures| {
                let found = &caps[0];
                self.abbreviations
                    .get(&found.to_lowercase())
                    .cloned()
                    .unwrap_or_else(|| found.to_string())
            }),
            None => Cow::Borrowed(text),
        }
    }
}

fn invalid(kind: &'static str, reason: &str) -> TokenOptimizationError {
    TokenOptimizationError::InvalidTerm {
        kind,
        reason: reason.to_string(),
    }
}

/// Compile one alternation over all phrases, longest first.
///
/// Word boundaries are only asserted next to ASCII alphanumerics so that CJK
/// phrases still match inside runs of ideographs.
fn build_matcher(
    abbreviations: &HashMap<String, String>,
) -> Result<Option<Regex>, TokenOptimizationError> {
    if abbreviations.is_empty() {
        return Ok(None);
    }
    let mut phrases: Vec<&str> = abbreviations.keys().map(String::as_str).collect();
    phrases.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });

    let alternatives: Vec<String> = phrases
        .into_iter()
        .map(|phrase| {
            let mut pattern = String::new();
            if phrase.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
                pattern.push_str(r"\b");
            }
            pattern.push_str(&regex::escape(phrase));
            if phrase
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric())
            {
                pattern.push_str(r"\b");
            }
            pattern
        })
        .collect();

    let source = format!("(?i)(?:{})", alternatives.join("|"));
    Regex::new(&source)
        .map(Some)
        .map_err(|err| invalid("abbreviation", &format!("cannot compile phrase table: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_phrases_are_abbreviated_case_insensitively() {
        let dict = Dictionary::with_defaults();
        assert_eq!(
            dict.abbreviate("Machine Learning and artificial intelligence"),
            "ML and AI"
        );
        assert_eq!(dict.abbreviate("这是人工智能"), "这是AI");
    }

    #[test]
    fn word_boundaries_protect_partial_matches() {
        let dict = Dictionary::with_defaults();
        assert_eq!(dict.abbreviate("misinformationally"), "misinformationally");
    }

    #[test]
    fn longest_phrase_wins() {
        let mut dict = Dictionary::empty();
        dict.add_abbreviation("token", "tok").unwrap();
        dict.add_abbreviation("token optimization", "TO").unwrap();
        assert_eq!(dict.abbreviate("token optimization of a token"), "TO of a tok");
    }

    #[test]
    fn abbreviation_may_not_grow_text() {
        let mut dict = Dictionary::empty();
        let err = dict.add_abbreviation("db", "database").unwrap_err();
        assert!(matches!(err, TokenOptimizationError::InvalidTerm { .. }));
        assert!(dict.add_abbreviation("", "x").is_err());
        assert!(dict.add_abbreviation("x", " ").is_err());
    }

    #[test]
    fn re_adding_the_same_mapping_reports_no_change() {
        let mut dict = Dictionary::empty();
        assert!(dict.add_abbreviation("kubernetes", "k8s").unwrap());
        assert!(!dict.add_abbreviation("Kubernetes", "k8s").unwrap());
        assert_eq!(dict.abbreviation_count(), 1);
    }

    #[test]
    fn stop_words_are_single_case_insensitive_words() {
        let mut dict = Dictionary::empty();
        assert!(dict.add_stop_word("Um").unwrap());
        assert!(!dict.add_stop_word("um").unwrap());
        assert!(dict.is_stop_word("UM"));
        assert!(dict.add_stop_word("two words").is_err());
        assert!(dict.add_stop_word("  ").is_err());
    }
}
