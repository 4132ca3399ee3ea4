//! Always-highlight keyword rules.
//!
//! Each configured line `color: keyword, keyword` becomes one rule with its
//! own bucket. Keywords match case-insensitively on whole words, whether or
//! not they look like keywords to the casing patterns.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::highlight::Bucket;

/// One configured rule.
#[derive(Debug, Clone)]
pub struct CustomRule {
    /// Bucket the rule's matches go to.
    pub bucket: Bucket,
    /// CSS color of the bucket.
    pub color: String,
    /// Keywords in configured order.
    pub keywords: Vec<String>,
    automaton: AhoCorasick,
}

/// A whole-word match of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomMatch {
    /// Bucket of the rule that matched.
    pub bucket: Bucket,
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn at_word_boundary(bytes: &[u8], at: usize) -> bool {
    let before = at.checked_sub(1).and_then(|i| bytes.get(i)).copied().is_some_and(is_word_byte);
    let after = bytes.get(at).copied().is_some_and(is_word_byte);
    before != after
}

impl CustomRule {
    /// Whole-word matches in `text`, non-overlapping, left to right.
    ///
    /// At a given position the keyword listed first wins.
    pub fn find(&self, text: &str) -> Vec<CustomMatch> {
        let bytes = text.as_bytes();
        let mut candidates: Vec<(usize, usize, usize)> = self
            .automaton
            .find_overlapping_iter(text)
            .filter(|m| at_word_boundary(bytes, m.start()) && at_word_boundary(bytes, m.end()))
            .map(|m| (m.start(), m.pattern().as_usize(), m.end()))
            .collect();
        candidates.sort_unstable();

        let mut matches = Vec::new();
        let mut cursor = 0;
        for (start, _, end) in candidates {
            if start < cursor {
                continue;
            }
            matches.push(CustomMatch {
                bucket: self.bucket,
                start,
                end,
            });
            cursor = end;
        }
        matches
    }
}

/// Every valid rule, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct CustomRules {
    rules: Vec<CustomRule>,
}

impl CustomRules {
    /// Parse the `color: keyword, keyword` table.
    ///
    /// Lines without a colon or without any keyword are skipped. Rules are
    /// numbered in order among the valid lines only.
    #[tracing::instrument(skip(config))]
    pub fn parse(config: &str) -> Self {
        let mut rules = Vec::new();
        for (line_no, line) in config.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((color, keywords)) = line.split_once(':') else {
                tracing::warn!(line = line_no + 1, "custom keyword line has no ':', skipped");
                continue;
            };
            // A colon inside the keyword list ends it.
            let keywords = keywords.split(':').next().unwrap_or_default();
            let keywords: Vec<String> = keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
            if keywords.is_empty() {
                tracing::warn!(line = line_no + 1, "custom keyword line lists no keywords, skipped");
                continue;
            }
            let automaton = match AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .ascii_case_insensitive(true)
                .build(&keywords)
            {
                Ok(automaton) => automaton,
                Err(e) => {
                    tracing::warn!(line = line_no + 1, error = %e, "custom keyword automaton failed, skipped");
                    continue;
                }
            };
            rules.push(CustomRule {
                bucket: Bucket::Custom(rules.len()),
                color: color.trim().to_string(),
                keywords,
                automaton,
            });
        }
        tracing::debug!(rules = rules.len(), "parsed custom keyword rules");
        Self { rules }
    }

    /// Configured rules.
    pub fn rules(&self) -> &[CustomRule] {
        &self.rules
    }

    /// True if no valid rule is configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Matches of every rule in `text`, rule by rule.
    pub fn find_all(&self, text: &str) -> Vec<CustomMatch> {
        self.rules.iter().flat_map(|rule| rule.find(text)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(rules: &CustomRules, text: &str) -> Vec<(usize, &'static str)> {
        rules
            .find_all(text)
            .into_iter()
            .map(|m| {
                let name = match m.bucket {
                    Bucket::Custom(0) => "first",
                    Bucket::Custom(1) => "second",
                    _ => "other",
                };
                (m.start, name)
            })
            .collect()
    }

    #[test]
    fn parses_valid_lines_only() {
        let rules = CustomRules::parse("#ff0: Rust, Cargo\nnot a rule\nred:  ,  \nblue: tokio");
        assert_eq!(rules.rules().len(), 2);
        assert_eq!(rules.rules()[0].color, "#ff0");
        assert_eq!(rules.rules()[0].keywords, vec!["Rust", "Cargo"]);
        assert_eq!(rules.rules()[1].bucket, Bucket::Custom(1));
    }

    #[test]
    fn matches_are_case_insensitive_whole_words() {
        let rules = CustomRules::parse("red: rust");
        let text = "RUST and Rust, but not rusty or trust";
        let found = rules.find_all(text);
        let words: Vec<&str> = found.iter().map(|m| &text[m.start..m.end]).collect();
        assert_eq!(words, vec!["RUST", "Rust"]);
    }

    #[test]
    fn first_listed_keyword_wins_at_a_position() {
        let rules = CustomRules::parse("red: web, web app");
        let text = "a web app";
        let found = rules.find_all(text);
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].start..found[0].end], "web");
    }

    #[test]
    fn later_keyword_used_when_earlier_fails_boundary() {
        let rules = CustomRules::parse("red: web, webapp");
        let text = "a webapp";
        let found = rules.find_all(text);
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].start..found[0].end], "webapp");
    }

    #[test]
    fn each_rule_matches_independently() {
        let rules = CustomRules::parse("red: Rust\nblue: Cargo, Rust");
        assert_eq!(
            spans(&rules, "Rust Cargo"),
            vec![(0, "first"), (0, "second"), (5, "second")]
        );
    }

    #[test]
    fn empty_config_has_no_rules() {
        assert!(CustomRules::parse("").is_empty());
    }
}
