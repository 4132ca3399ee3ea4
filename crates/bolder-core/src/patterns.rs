//! Casing-pattern classification of word values.
//!
//! Four anchored patterns decide whether a word looks like a keyword:
//! acronyms (`NASA`), capitalized words (`Python`), mixed case (`FastAPI`,
//! `iOS`) and hyphenated words with an uppercase letter (`ML-based`).

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Minimum length of an all-caps word.
pub const MIN_UPPERCASE_LEN: usize = 2;

/// Minimum length of a capitalized word.
pub const MIN_CAPITALIZED_LEN: usize = 3;

static ALL_CAPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,}$").expect("valid regex"));

static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]{2,}$").expect("valid regex"));

static MIXED_CASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z][a-z]*[A-Z][A-Za-z]*|[a-z]+[A-Z][A-Za-z]*)$").expect("valid regex")
});

static HYPHENATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]+-[A-Za-z]+$").expect("valid regex"));

/// `NASA`, `API`: every character uppercase, at least two.
pub fn is_all_caps(word: &str) -> bool {
    ALL_CAPS.is_match(word)
}

/// `Python`: uppercase initial followed by at least two lowercase letters.
pub fn is_capitalized(word: &str) -> bool {
    CAPITALIZED.is_match(word)
}

/// `FastAPI`, `PocketBase`, `iOS`: at least one internal case transition.
pub fn is_mixed_case(word: &str) -> bool {
    MIXED_CASE.is_match(word)
}

/// `ML-based`: two letter runs joined by one hyphen, with an uppercase letter.
pub fn is_hyphenated(word: &str) -> bool {
    HYPHENATED.is_match(word) && word.bytes().any(|b| b.is_ascii_uppercase())
}

/// Result of running every pattern against one word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    /// Matched the all-caps pattern.
    pub all_caps: bool,
    /// Matched the capitalized pattern.
    pub capitalized: bool,
    /// Matched the mixed-case pattern.
    pub mixed_case: bool,
    /// Matched the hyphenated pattern.
    pub hyphenated: bool,
}

impl Classification {
    /// Classify a normalized word value.
    pub fn of(word: &str) -> Self {
        Self {
            all_caps: is_all_caps(word),
            capitalized: is_capitalized(word),
            mixed_case: is_mixed_case(word),
            hyphenated: is_hyphenated(word),
        }
    }

    /// Any pattern matched.
    pub const fn is_auto_detect_candidate(&self) -> bool {
        self.all_caps || self.capitalized || self.mixed_case || self.hyphenated
    }

    /// Patterns strong enough to override sentence/block-start suppression
    /// once the word has been learned. Plain capitalized words are left out:
    /// at the start of a sentence they are usually just sentence case.
    pub const fn is_registry_start_candidate(&self) -> bool {
        self.all_caps || self.mixed_case || self.hyphenated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_caps_threshold() {
        assert!(is_all_caps("NASA"));
        assert!(is_all_caps("AI"));
        assert!(!is_all_caps("A"));
        assert!(!is_all_caps("NASa"));
    }

    #[test]
    fn capitalized_threshold() {
        assert!(is_capitalized("Python"));
        assert!(is_capitalized("Rig"));
        assert!(!is_capitalized("Go"));
        assert!(!is_capitalized("python"));
        assert!(!is_capitalized("PyThon"));
    }

    #[test]
    fn mixed_case_shapes() {
        assert!(is_mixed_case("FastAPI"));
        assert!(is_mixed_case("PocketBase"));
        assert!(is_mixed_case("iOS"));
        assert!(is_mixed_case("eBay"));
        assert!(is_mixed_case("NASA"));
        assert!(!is_mixed_case("Python"));
        assert!(!is_mixed_case("python"));
    }

    #[test]
    fn hyphenated_requires_uppercase() {
        assert!(is_hyphenated("ML-based"));
        assert!(is_hyphenated("well-Known"));
        assert!(!is_hyphenated("well-known"));
        assert!(!is_hyphenated("A-B-C"));
        assert!(!is_hyphenated("-Foo"));
    }

    #[test]
    fn registry_start_candidates_exclude_plain_capitalized() {
        let python = Classification::of("Python");
        assert!(python.is_auto_detect_candidate());
        assert!(!python.is_registry_start_candidate());

        let fast_api = Classification::of("FastAPI");
        assert!(fast_api.is_registry_start_candidate());
    }

    #[test]
    fn lowercase_words_match_nothing() {
        assert_eq!(Classification::of("fox"), Classification::default());
    }
}
