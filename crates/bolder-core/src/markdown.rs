//! Building documents from Markdown and plain text.
//!
//! Uses pulldown-cmark so nested lists, code blocks and inline markup map
//! onto the same container tags a browser would produce.

use pulldown_cmark::{Event, Options, Parser, Tag};

use crate::tree::{Document, NodeId, Style};

/// How an input file is turned into a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum InputFormat {
    /// CommonMark with tables, strikethrough and footnotes.
    #[default]
    Markdown,
    /// Paragraphs separated by blank lines.
    Text,
}

impl InputFormat {
    /// Guess from a file extension; anything but `.txt` is Markdown.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => Self::Text,
            _ => Self::Markdown,
        }
    }

    /// Build a document from `text` in this format.
    pub fn document(self, text: &str, root_style: Style) -> Document {
        match self {
            Self::Markdown => markdown_document(text, root_style),
            Self::Text => plain_text_document(text, root_style),
        }
    }
}

fn tag_name(tag: &Tag<'_>) -> String {
    match tag {
        Tag::Paragraph => "P".to_string(),
        Tag::Heading { level, .. } => format!("H{}", *level as u8),
        Tag::BlockQuote(_) => "BLOCKQUOTE".to_string(),
        Tag::List(Some(_)) => "OL".to_string(),
        Tag::List(None) => "UL".to_string(),
        Tag::Item => "LI".to_string(),
        Tag::Emphasis => "EM".to_string(),
        Tag::Strong => "STRONG".to_string(),
        Tag::Strikethrough => "DEL".to_string(),
        Tag::Link { .. } => "A".to_string(),
        Tag::Image { .. } => "IMG".to_string(),
        Tag::Table(_) => "TABLE".to_string(),
        Tag::TableHead => "THEAD".to_string(),
        Tag::TableRow => "TR".to_string(),
        Tag::TableCell => "TD".to_string(),
        Tag::CodeBlock(_) => "PRE".to_string(),
        Tag::FootnoteDefinition(_) | Tag::HtmlBlock => "DIV".to_string(),
        _ => "SPAN".to_string(),
    }
}

/// Append `text` to `parent`, merging into a trailing text leaf.
fn push_text(doc: &mut Document, parent: NodeId, text: &str) {
    if let Some(&last) = doc.children(parent).last()
        && let Some(existing) = doc.text(last)
    {
        let merged = format!("{existing}{text}");
        doc.set_text(last, merged);
        return;
    }
    doc.append_text(parent, text);
}

/// Parse Markdown into a document whose root carries `root_style`.
///
/// Frontmatter and raw HTML are dropped. Image alt text lands in a hidden
/// `IMG` container; code blocks become `PRE > CODE`. The returned document
/// has an empty change feed.
#[tracing::instrument(skip_all, fields(input_len = text.len()))]
pub fn markdown_document(text: &str, root_style: Style) -> Document {
    let text = strip_frontmatter(text);
    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;

    let mut doc = Document::with_root_style(root_style);
    let mut stack = vec![doc.root()];

    for event in Parser::new_ext(text, options) {
        let parent = stack.last().copied().unwrap_or_else(|| doc.root());
        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                let pre = doc.append_container(parent, "PRE");
                stack.push(doc.append_container(pre, "CODE"));
            }
            Event::Start(tag @ Tag::Image { .. }) => {
                stack.push(doc.append_styled(parent, &tag_name(&tag), Style::hidden()));
            }
            Event::Start(tag) => stack.push(doc.append_container(parent, &tag_name(&tag))),
            Event::End(_) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Event::Text(t) => push_text(&mut doc, parent, &t),
            Event::Code(t) => {
                let code = doc.append_container(parent, "CODE");
                doc.append_text(code, t.into_string());
            }
            Event::SoftBreak => push_text(&mut doc, parent, "\n"),
            Event::HardBreak => {
                doc.append_container(parent, "BR");
            }
            Event::Rule => {
                doc.append_container(parent, "HR");
            }
            _ => {}
        }
    }

    doc.take_changes();
    tracing::debug!(nodes = doc.len(), "built document from markdown");
    doc
}

/// One `P` per blank-line-separated paragraph.
pub fn plain_text_document(text: &str, root_style: Style) -> Document {
    let mut doc = Document::with_root_style(root_style);
    let root = doc.root();
    for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let p = doc.append_container(root, "P");
        doc.append_text(p, para);
    }
    doc.take_changes();
    doc
}

/// Strip YAML frontmatter delimited by `---` lines.
pub fn strip_frontmatter(text: &str) -> &str {
    let trimmed = text.trim_start();
    let Some(after_opening) = trimmed.strip_prefix("---") else {
        return text;
    };
    let Some(close_pos) = after_opening.find("\n---") else {
        return text;
    };
    let remainder = &after_opening[close_pos + 4..];
    remainder.strip_prefix('\n').unwrap_or(remainder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(doc: &Document, node: NodeId) -> Vec<String> {
        doc.children(node)
            .iter()
            .filter_map(|&c| doc.tag(c).map(str::to_string))
            .collect()
    }

    #[test]
    fn paragraphs_and_headings_become_blocks() {
        let doc = markdown_document("# Title\n\nSome text.\n\nMore text.", Style::default());
        assert_eq!(tags(&doc, doc.root()), vec!["H1", "P", "P"]);
        assert_eq!(doc.inner_text(doc.children(doc.root())[1]), "Some text.");
    }

    #[test]
    fn code_blocks_nest_code_in_pre() {
        let doc = markdown_document("```rust\nlet x = 1;\n```", Style::default());
        let pre = doc.children(doc.root())[0];
        assert_eq!(doc.tag(pre), Some("PRE"));
        assert_eq!(tags(&doc, pre), vec!["CODE"]);
    }

    #[test]
    fn inline_markup_keeps_its_text() {
        let doc = markdown_document("We use *Tokio* and `serde` here.", Style::default());
        let p = doc.children(doc.root())[0];
        assert_eq!(tags(&doc, p), vec!["EM", "CODE"]);
        assert_eq!(doc.inner_text(p), "We use Tokio and serde here.");
    }

    #[test]
    fn lists_and_images() {
        let doc = markdown_document("- one\n- two ![Logo](x.png)", Style::default());
        let list = doc.children(doc.root())[0];
        assert_eq!(doc.tag(list), Some("UL"));
        assert_eq!(tags(&doc, list), vec!["LI", "LI"]);
        let img = doc
            .text_leaves(doc.root())
            .into_iter()
            .find(|&leaf| doc.text(leaf) == Some("Logo"))
            .and_then(|leaf| doc.parent(leaf))
            .unwrap();
        assert_eq!(doc.tag(img), Some("IMG"));
        assert!(doc.style(img).unwrap().is_invisible());
    }

    #[test]
    fn soft_breaks_merge_into_one_leaf() {
        let doc = markdown_document("first line\nsecond line", Style::default());
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.inner_text(p), "first line\nsecond line");
    }

    #[test]
    fn frontmatter_is_dropped() {
        let input = "---\nstatus: accepted\n---\n\nSome text.";
        assert_eq!(strip_frontmatter(input), "\nSome text.");
        let doc = markdown_document(input, Style::default());
        assert!(!doc.inner_text(doc.root()).contains("status"));
        assert_eq!(strip_frontmatter("no frontmatter"), "no frontmatter");
    }

    #[test]
    fn change_feed_starts_empty() {
        let mut doc = markdown_document("Hello there.", Style::default());
        assert!(doc.take_changes().is_empty());
        let mut plain = plain_text_document("one\n\n\ntwo", Style::default());
        assert!(plain.take_changes().is_empty());
        assert_eq!(tags(&plain, plain.root()), vec!["P", "P"]);
    }

    #[test]
    fn format_follows_the_extension() {
        assert_eq!(InputFormat::from_extension(Some("TXT")), InputFormat::Text);
        assert_eq!(InputFormat::from_extension(Some("md")), InputFormat::Markdown);
        assert_eq!(InputFormat::from_extension(None), InputFormat::Markdown);
        let doc = InputFormat::Text.document("# not a heading", Style::default());
        assert_eq!(tags(&doc, doc.root()), vec!["P"]);
    }

    #[test]
    fn root_style_is_applied() {
        let doc = markdown_document("x", Style::with_background("rgb(0, 0, 0)"));
        assert_eq!(
            doc.style(doc.root()).and_then(|s| s.background.as_deref()),
            Some("rgb(0, 0, 0)")
        );
    }
}
