//! Lossless tokenization of text runs.
//!
//! A run is split into word candidates, terminators, whitespace and other
//! character runs. Concatenating the token texts always reproduces the input,
//! and token offsets are byte offsets into the run so marks can address the
//! original text directly.

use std::sync::LazyLock;

use regex::Regex;

/// Single-character sentence terminators and list bullet glyphs.
pub const TERMINATORS: &[char] = &[
    '.', '!', '?', '…', ':', ';', '-', '–', '—', '•', '●', '*', '■',
];

/// Characters removed from word values before classification.
const INVISIBLE: &[char] = &['\u{00A0}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{FEFF}'];

/// A word candidate is made of ASCII letters and hyphens only.
static WORD_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z-]+$").expect("valid regex"));

/// What a token is, as far as the scanner cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Letters and hyphens, possibly a keyword.
    Word,
    /// A terminator or bullet glyph.
    Terminator,
    /// Whitespace, digits, punctuation and everything else.
    Other,
}

/// A slice of a text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token text.
    pub text: &'a str,
    /// Byte offset of the token in the run.
    pub start: usize,
    /// Classification.
    pub kind: TokenKind,
}

impl Token<'_> {
    /// Byte length of the token.
    pub const fn len(&self) -> usize {
        self.text.len()
    }

    /// Tokens are never empty; provided for API symmetry.
    pub const fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Byte offset one past the end of the token.
    pub const fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// True if `c` ends a sentence or starts a list item.
pub fn is_terminator_char(c: char) -> bool {
    TERMINATORS.contains(&c)
}

/// True if `token` is exactly one terminator glyph.
pub fn is_terminator(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if is_terminator_char(c))
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '-'
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Class {
    Word,
    Space,
    Terminator,
    Other,
}

fn class_of(c: char) -> Class {
    if is_word_char(c) {
        Class::Word
    } else if is_terminator_char(c) {
        Class::Terminator
    } else if is_space(c) {
        Class::Space
    } else {
        Class::Other
    }
}

/// Split a text run into tokens.
///
/// Runs of letters and hyphens form one token, so `ML-based` stays whole.
/// A lone `-` surrounded by non-letters is a bullet and becomes a
/// terminator. Every other terminator glyph is its own token. Whitespace runs
/// and runs of any remaining characters each become one token.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut iter = text.char_indices().peekable();

    while let Some((start, c)) = iter.next() {
        let class = class_of(c);
        let mut end = start + c.len_utf8();
        if class != Class::Terminator {
            while let Some(&(i, next)) = iter.peek() {
                if class_of(next) != class {
                    break;
                }
                end = i + next.len_utf8();
                iter.next();
            }
        }
        let slice = &text[start..end];
        let kind = match class {
            Class::Terminator => TokenKind::Terminator,
            Class::Word if slice == "-" => TokenKind::Terminator,
            Class::Word => TokenKind::Word,
            Class::Space | Class::Other => TokenKind::Other,
        };
        tokens.push(Token {
            text: slice,
            start,
            kind,
        });
    }

    tokens
}

/// A token reduced to its letter content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedToken<'a> {
    /// Token without leading/trailing non-letters; addresses the run.
    pub trimmed: &'a str,
    /// `trimmed` with invisible characters removed; used for classification.
    pub normalized: String,
    /// Bytes removed from the front of the token.
    pub offset_delta: usize,
}

impl NormalizedToken<'_> {
    /// True if the normalized value is a plain letters-and-hyphens word.
    pub fn is_word(&self) -> bool {
        WORD_SHAPE.is_match(&self.normalized)
    }
}

/// Strip non-letters from both ends of `token` and invisible characters from
/// what remains.
///
/// Returns `None` when no letter survives.
pub fn normalize_token(token: &str) -> Option<NormalizedToken<'_>> {
    let first = token.find(|c: char| c.is_ascii_alphabetic())?;
    let last = token.rfind(|c: char| c.is_ascii_alphabetic())?;
    let trimmed = &token[first..=last];
    let normalized: String = trimmed.chars().filter(|c| !INVISIBLE.contains(c)).collect();
    if normalized.is_empty() {
        return None;
    }
    Some(NormalizedToken {
        trimmed,
        normalized,
        offset_delta: first,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts<'a>(tokens: &'a [Token<'a>]) -> Vec<&'a str> {
        tokens.iter().map(|t| t.text).collect()
    }

    #[test]
    fn splits_words_terminators_and_spaces() {
        let tokens = tokenize("Hello, NASA. Go!");
        assert_eq!(
            texts(&tokens),
            vec!["Hello", ",", " ", "NASA", ".", " ", "Go", "!"]
        );
        assert_eq!(tokens[3].kind, TokenKind::Word);
        assert_eq!(tokens[4].kind, TokenKind::Terminator);
        assert_eq!(tokens[1].kind, TokenKind::Other);
    }

    #[test]
    fn hyphenated_words_stay_whole() {
        let tokens = tokenize("an ML-based tool");
        assert_eq!(texts(&tokens), vec!["an", " ", "ML-based", " ", "tool"]);
    }

    #[test]
    fn lone_hyphen_is_a_bullet() {
        let tokens = tokenize("- item");
        assert_eq!(tokens[0].text, "-");
        assert_eq!(tokens[0].kind, TokenKind::Terminator);
    }

    #[test]
    fn ellipsis_and_bullets_are_single_tokens() {
        let tokens = tokenize("wait…•now");
        assert_eq!(texts(&tokens), vec!["wait", "…", "•", "now"]);
        assert!(tokens[1..3].iter().all(|t| t.kind == TokenKind::Terminator));
        assert_eq!(tokens[3].start, "wait…•".len());
    }

    #[test]
    fn digits_and_symbols_group() {
        let tokens = tokenize("v2 (beta)");
        assert_eq!(texts(&tokens), vec!["v", "2", " ", "(", "beta", ")"]);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn terminator_detection() {
        assert!(is_terminator("."));
        assert!(is_terminator("■"));
        assert!(!is_terminator(".."));
        assert!(!is_terminator("a"));
    }

    #[test]
    fn normalize_trims_leading_hyphens() {
        let n = normalize_token("-bar").unwrap();
        assert_eq!(n.trimmed, "bar");
        assert_eq!(n.offset_delta, 1);
        assert!(n.is_word());
    }

    #[test]
    fn normalize_rejects_letterless_tokens() {
        assert!(normalize_token("--").is_none());
        assert!(normalize_token("123").is_none());
        assert!(normalize_token(" ").is_none());
    }

    #[test]
    fn normalize_strips_invisible_characters() {
        let n = normalize_token("Fo\u{200B}o").unwrap();
        assert_eq!(n.trimmed, "Fo\u{200B}o");
        assert_eq!(n.normalized, "Foo");
    }

    proptest! {
        #[test]
        fn concatenation_reproduces_input(s in "\\PC*") {
            let tokens = tokenize(&s);
            let joined: String = tokens.iter().map(|t| t.text).collect();
            prop_assert_eq!(joined, s.clone());
            prop_assert!(tokens.iter().all(|t| !t.text.is_empty()));
        }

        #[test]
        fn offsets_address_the_run(s in "[A-Za-z .,;:!?\\-•…0-9]{0,64}") {
            for token in tokenize(&s) {
                prop_assert_eq!(&s[token.start..token.end()], token.text);
            }
        }
    }
}
