//! Sentence and block position tracking.
//!
//! Keyword detection is suppressed for the first word of a sentence and the
//! first word of a block, so the scanner carries two pieces of state across
//! fragments: whether the next word starts a sentence, and which block the
//! previous fragment belonged to.

use std::collections::BTreeSet;

use crate::tokenize::{Token, is_terminator, normalize_token, tokenize};
use crate::tree::{Document, NodeId, NodeKind};

/// Containers that start a new block of text.
pub const BLOCK_TAGS: &[&str] = &[
    "DIV",
    "P",
    "LI",
    "TD",
    "TH",
    "H1",
    "H2",
    "H3",
    "H4",
    "H5",
    "H6",
    "HEADER",
    "FOOTER",
    "SECTION",
    "ARTICLE",
    "ASIDE",
    "BLOCKQUOTE",
    "FIGCAPTION",
    "STRONG",
    "B",
];

/// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &["etc", "vs", "ex", "approx"];

/// Two-letter dotted abbreviations (`e.g.`, `i.e.`) as `(first, second)`.
const DOTTED_ABBREVIATIONS: &[(&str, &str)] = &[("e", "g"), ("i", "e")];

/// Carry-over state threaded through every processed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    /// The next word starts a sentence.
    pub at_sentence_start: bool,
    /// Block container of the previously processed fragment.
    pub last_block: Option<NodeId>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanState {
    /// Fresh state: at a sentence start, no block seen yet.
    pub const fn new() -> Self {
        Self {
            at_sentence_start: true,
            last_block: None,
        }
    }

    /// Return to the fresh state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Record that processing moved into `block`.
    ///
    /// A different block always opens a new sentence. Returns `true` when the
    /// block changed.
    pub fn enter_block(&mut self, block: NodeId) -> bool {
        if self.last_block == Some(block) {
            return false;
        }
        self.at_sentence_start = true;
        self.last_block = Some(block);
        true
    }

    /// Advance sentence state over text that is scanned but never emphasized.
    pub fn advance_over(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let tokens = tokenize(text);
        for index in 0..tokens.len() {
            if is_sentence_terminator(&tokens, index) {
                self.at_sentence_start = true;
            } else if normalize_token(tokens[index].text).is_some_and(|n| n.is_word()) {
                self.at_sentence_start = false;
            }
        }
    }
}

/// Per-fragment view of the position flags.
///
/// Both flags are consult-then-clear: reading one reports the current value
/// and clears it for the next word.
#[derive(Debug)]
pub struct PositionTracker<'s> {
    state: &'s mut ScanState,
    block_start: bool,
}

impl<'s> PositionTracker<'s> {
    /// Start tracking a fragment; `block_start` says whether the fragment's
    /// first word opens its block.
    pub const fn new(state: &'s mut ScanState, block_start: bool) -> Self {
        Self { state, block_start }
    }

    /// A terminator was seen: the next word starts a sentence and no later
    /// word in this fragment can be the block start.
    pub const fn on_terminator(&mut self) {
        self.state.at_sentence_start = true;
        self.block_start = false;
    }

    /// Consult and clear the block-start flag.
    pub const fn take_block_start(&mut self) -> bool {
        std::mem::replace(&mut self.block_start, false)
    }

    /// Consult and clear the sentence-start flag.
    pub const fn take_sentence_start(&mut self) -> bool {
        std::mem::replace(&mut self.state.at_sentence_start, false)
    }
}

/// True if `tokens[index]` ends a sentence.
///
/// A `.` directly after `etc`, `vs`, `ex` or `approx`, or closing `e.g.` /
/// `i.e.`, is an abbreviation and does not.
pub fn is_sentence_terminator(tokens: &[Token<'_>], index: usize) -> bool {
    let token = tokens[index].text;
    if !is_terminator(token) {
        return false;
    }
    if token != "." {
        return true;
    }

    if index >= 3 {
        let (first, dot, second) = (
            tokens[index - 3].text,
            tokens[index - 2].text,
            tokens[index - 1].text,
        );
        if dot == "."
            && DOTTED_ABBREVIATIONS
                .iter()
                .any(|&(a, b)| first == a && second == b)
        {
            return false;
        }
    }

    if index >= 1 {
        let previous = tokens[index - 1].text;
        if ABBREVIATIONS
            .iter()
            .any(|abbr| previous.eq_ignore_ascii_case(abbr))
        {
            return false;
        }
    }

    true
}

/// True if `tag` names a block-level container.
pub fn is_block_tag(tag: &str) -> bool {
    BLOCK_TAGS.contains(&tag)
}

/// Nearest block-level ancestor of `node`, falling back to the root.
pub fn block_ancestor(doc: &Document, node: NodeId) -> NodeId {
    doc.ancestors(node)
        .find(|&a| a == doc.root() || doc.tag(a).is_some_and(is_block_tag))
        .unwrap_or_else(|| doc.root())
}

/// Why a node's text is not eligible for emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Inside a container excluded by configuration. Still advances
    /// sentence state.
    ExcludedTag,
    /// Inside a user-editable container.
    ContentEditable,
    /// Inside an `aria-hidden` container.
    AriaHidden,
    /// Inside a container hidden by style.
    HiddenStyle,
}

fn container_skip_reason(
    doc: &Document,
    id: NodeId,
    excluded: &BTreeSet<String>,
) -> Option<SkipReason> {
    let NodeKind::Container { tag, style } = doc.kind(id) else {
        return None;
    };
    if excluded.contains(tag) {
        Some(SkipReason::ExcludedTag)
    } else if style.content_editable {
        Some(SkipReason::ContentEditable)
    } else if style.aria_hidden {
        Some(SkipReason::AriaHidden)
    } else if style.is_invisible() {
        Some(SkipReason::HiddenStyle)
    } else {
        None
    }
}

/// First reason, walking up from the parent of `node`, that its text should
/// not be emphasized.
pub fn skip_reason(
    doc: &Document,
    node: NodeId,
    excluded: &BTreeSet<String>,
) -> Option<SkipReason> {
    doc.ancestors(node)
        .find_map(|a| container_skip_reason(doc, a, excluded))
}

/// True if `node` renders any ASCII letter.
///
/// Hidden or excluded containers (the node itself or an ancestor) render
/// nothing.
pub fn has_visible_text(doc: &Document, node: NodeId, excluded: &BTreeSet<String>) -> bool {
    match doc.kind(node) {
        NodeKind::Text(text) => text.bytes().any(|b| b.is_ascii_alphabetic()),
        NodeKind::Container { .. } => {
            if container_skip_reason(doc, node, excluded).is_some()
                || skip_reason(doc, node, excluded).is_some()
            {
                return false;
            }
            visible_letters(doc, node, excluded)
        }
    }
}

fn visible_letters(doc: &Document, node: NodeId, excluded: &BTreeSet<String>) -> bool {
    doc.children(node).iter().any(|&child| match doc.kind(child) {
        NodeKind::Text(text) => text.bytes().any(|b| b.is_ascii_alphabetic()),
        NodeKind::Container { .. } => {
            container_skip_reason(doc, child, excluded).is_none()
                && visible_letters(doc, child, excluded)
        }
    })
}

/// True if no visible text precedes `node` inside `block`.
///
/// Walks previous siblings, then climbs to the parent and repeats, until the
/// block is reached. A `BR` always starts a new block line.
pub fn is_first_word_in_block(
    doc: &Document,
    node: NodeId,
    block: NodeId,
    excluded: &BTreeSet<String>,
) -> bool {
    let mut current = node;
    loop {
        if current == block {
            return true;
        }

        let mut sibling = doc.previous_sibling(current);
        while let Some(s) = sibling {
            if doc.tag(s) == Some("BR") {
                return true;
            }
            if has_visible_text(doc, s, excluded) {
                return false;
            }
            sibling = doc.previous_sibling(s);
        }

        match doc.parent(current) {
            Some(parent) if parent != block => current = parent,
            _ => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Style;

    fn excluded(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| (*t).to_string()).collect()
    }

    fn state_after(text: &str, start: bool) -> bool {
        let mut state = ScanState {
            at_sentence_start: start,
            last_block: None,
        };
        state.advance_over(text);
        state.at_sentence_start
    }

    #[test]
    fn period_ends_sentence() {
        let tokens = tokenize("done. Next");
        assert!(is_sentence_terminator(&tokens, 1));
        assert!(!is_sentence_terminator(&tokens, 0));
    }

    #[test]
    fn eg_does_not_end_sentence() {
        let tokens = tokenize("e.g.");
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["e", ".", "g", "."]);
        assert!(!is_sentence_terminator(&tokens, 3));
        assert!(!state_after("e.g.", false));

        let tokens = tokenize("i.e.");
        assert!(!is_sentence_terminator(&tokens, 3));
    }

    #[test]
    fn short_abbreviations_are_case_insensitive() {
        for text in ["etc.", "vs.", "Ex.", "APPROX."] {
            let tokens = tokenize(text);
            assert!(!is_sentence_terminator(&tokens, 1), "{text}");
        }
    }

    #[test]
    fn other_terminators_always_end_sentences() {
        for text in ["etc!", "wait:", "list;", "x?"] {
            let tokens = tokenize(text);
            assert!(is_sentence_terminator(&tokens, tokens.len() - 1), "{text}");
        }
    }

    #[test]
    fn advance_over_tracks_last_boundary() {
        assert!(state_after("see the docs.", false));
        assert!(!state_after("Read this", true));
        assert!(state_after("   ", true));
    }

    #[test]
    fn tracker_flags_are_consult_then_clear() {
        let mut state = ScanState::new();
        let mut tracker = PositionTracker::new(&mut state, true);
        assert!(tracker.take_block_start());
        assert!(!tracker.take_block_start());
        assert!(tracker.take_sentence_start());
        assert!(!tracker.take_sentence_start());
        tracker.on_terminator();
        assert!(tracker.take_sentence_start());
    }

    #[test]
    fn entering_a_new_block_resets_sentence_start() {
        let mut doc = Document::new();
        let p = doc.append_container(doc.root(), "p");
        let mut state = ScanState::new();
        state.at_sentence_start = false;
        assert!(state.enter_block(p));
        assert!(state.at_sentence_start);
        state.at_sentence_start = false;
        assert!(!state.enter_block(p));
        assert!(!state.at_sentence_start);
    }

    #[test]
    fn block_ancestor_prefers_nearest_block() {
        let mut doc = Document::new();
        let div = doc.append_container(doc.root(), "div");
        let span = doc.append_container(div, "span");
        let text = doc.append_text(span, "hi");
        assert_eq!(block_ancestor(&doc, text), div);

        let span2 = doc.append_container(doc.root(), "span");
        let text2 = doc.append_text(span2, "hi");
        assert_eq!(block_ancestor(&doc, text2), doc.root());
    }

    #[test]
    fn first_text_in_block_is_block_start() {
        let mut doc = Document::new();
        let p = doc.append_container(doc.root(), "p");
        let first = doc.append_text(p, "Hello ");
        let em = doc.append_container(p, "em");
        let second = doc.append_text(em, "World");
        let ex = BTreeSet::new();
        assert!(is_first_word_in_block(&doc, first, p, &ex));
        assert!(!is_first_word_in_block(&doc, second, p, &ex));
    }

    #[test]
    fn line_break_starts_block_line() {
        let mut doc = Document::new();
        let p = doc.append_container(doc.root(), "p");
        doc.append_text(p, "Line one");
        doc.append_container(p, "br");
        let after = doc.append_text(p, "Line two");
        assert!(is_first_word_in_block(&doc, after, p, &BTreeSet::new()));
    }

    #[test]
    fn hidden_and_excluded_siblings_do_not_count() {
        let mut doc = Document::new();
        let p = doc.append_container(doc.root(), "p");
        let hidden = doc.append_styled(p, "span", Style::hidden());
        doc.append_text(hidden, "invisible");
        let code = doc.append_container(p, "code");
        doc.append_text(code, "snippet");
        doc.append_text(p, "  123 ");
        let text = doc.append_text(p, "Start");
        assert!(is_first_word_in_block(&doc, text, p, &excluded(&["CODE"])));
        assert!(!is_first_word_in_block(&doc, text, p, &BTreeSet::new()));
    }

    #[test]
    fn skip_reasons_walk_ancestors() {
        let mut doc = Document::new();
        let pre = doc.append_container(doc.root(), "pre");
        let inner = doc.append_container(pre, "span");
        let text = doc.append_text(inner, "code");
        assert_eq!(
            skip_reason(&doc, text, &excluded(&["PRE"])),
            Some(SkipReason::ExcludedTag)
        );
        assert_eq!(skip_reason(&doc, text, &BTreeSet::new()), None);

        let editable = doc.append_styled(
            doc.root(),
            "div",
            Style {
                content_editable: true,
                ..Style::default()
            },
        );
        let typed = doc.append_text(editable, "draft");
        assert_eq!(
            skip_reason(&doc, typed, &BTreeSet::new()),
            Some(SkipReason::ContentEditable)
        );

        let aria = doc.append_styled(
            doc.root(),
            "div",
            Style {
                aria_hidden: true,
                ..Style::default()
            },
        );
        let muted = doc.append_text(aria, "muted");
        assert_eq!(
            skip_reason(&doc, muted, &BTreeSet::new()),
            Some(SkipReason::AriaHidden)
        );
    }
}
