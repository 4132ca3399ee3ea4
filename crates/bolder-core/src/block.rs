//! Block-level gates applied before a fragment is scanned.
//!
//! Short blocks (navigation labels, buttons, captions) are mostly names and
//! would light up entirely, so fragments are skipped unless either their
//! block or the fragment itself carries enough words. Short title-case
//! metadata lines can optionally opt out of auto-detection too.

use std::collections::HashMap;

use crate::tree::{Document, NodeId};

/// Minimum word count for list items, table cells and bulleted blocks.
pub const LIST_MIN_WORDS: usize = 3;

/// Glyphs that mark a block as a bullet item.
const BULLETS: &[char] = &['-', '–', '—', '•', '●', '*', '■'];

/// Longest block, in words, that can be a metadata line.
pub const METADATA_MAX_WORDS: usize = 8;

/// Share of title-case or all-caps tokens that makes a metadata line.
const METADATA_TITLE_RATIO: f64 = 0.6;

/// Whitespace-separated word count of `text`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_title_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    let title = bytes.len() >= 2 && bytes[0].is_ascii_uppercase() && bytes[1].is_ascii_lowercase();
    let caps = bytes.len() >= 2 && bytes.iter().all(u8::is_ascii_uppercase);
    title || caps
}

/// True if `text` reads like a short metadata line: a handful of title-case
/// words separated by commas or parentheses, with no sentence punctuation.
pub fn looks_like_metadata(text: &str, words: usize) -> bool {
    let text = text.trim();
    if text.is_empty() || words > METADATA_MAX_WORDS {
        return false;
    }
    if text.contains(['.', '!', '?']) || !text.contains([',', '(', ')']) {
        return false;
    }
    let tokens: Vec<&str> = text
        .split(|c: char| !(c.is_ascii_alphabetic() || c == '-'))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 2 {
        return false;
    }
    let titled = tokens.iter().filter(|t| is_title_token(t)).count();
    let ratio = titled as f64 / tokens.len() as f64;
    ratio >= METADATA_TITLE_RATIO
}

/// What the gates need to know about one block, measured from its
/// rendered text once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockInfo {
    words: usize,
    bulleted: bool,
    metadata: bool,
}

impl BlockInfo {
    fn measure(text: &str) -> Self {
        let words = word_count(text);
        Self {
            words,
            bulleted: text
                .trim_start()
                .chars()
                .next()
                .is_some_and(|c| BULLETS.contains(&c)),
            metadata: looks_like_metadata(text, words),
        }
    }
}

/// Cached per-block statistics.
#[derive(Debug, Default)]
pub struct BlockStats {
    blocks: HashMap<NodeId, BlockInfo>,
}

impl BlockStats {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn info(&mut self, doc: &Document, block: NodeId) -> BlockInfo {
        *self
            .blocks
            .entry(block)
            .or_insert_with(|| BlockInfo::measure(&doc.inner_text(block)))
    }

    /// Word count of a block's rendered text.
    pub fn word_count(&mut self, doc: &Document, block: NodeId) -> usize {
        self.info(doc, block).words
    }

    /// Minimum words a block needs for its fragments to be scanned.
    pub fn min_words_for(&mut self, doc: &Document, block: NodeId, configured: usize) -> usize {
        let list_like = matches!(doc.tag(block), Some("LI" | "TD"));
        if list_like || self.info(doc, block).bulleted {
            LIST_MIN_WORDS
        } else {
            configured
        }
    }

    /// False when both the block and the fragment are below the minimum.
    pub fn passes_min_words(
        &mut self,
        doc: &Document,
        block: NodeId,
        fragment_text: &str,
        configured: usize,
    ) -> bool {
        let min = self.min_words_for(doc, block, configured);
        self.word_count(doc, block) >= min || word_count(fragment_text) >= min
    }

    /// True if the block reads as a short metadata line.
    pub fn is_metadata_line(&mut self, doc: &Document, block: NodeId) -> bool {
        self.info(doc, block).metadata
    }

    /// Drop cached stats for `node` and every ancestor.
    pub fn invalidate_ancestors(&mut self, doc: &Document, node: NodeId) {
        if self.blocks.is_empty() {
            return;
        }
        self.blocks.remove(&node);
        for ancestor in doc.ancestors(node) {
            self.blocks.remove(&ancestor);
        }
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    /// Blocks with cached stats.
    pub fn cached(&self) -> usize {
        self.blocks.len()
    }
}
