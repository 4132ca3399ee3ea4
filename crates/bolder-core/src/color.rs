//! Background-aware bucket routing.
//!
//! Emphasis on a light background is drawn with a darkening tint and on a
//! dark background with a lightening tint. The effective background is the
//! first non-transparent one found walking up from the fragment's parent.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::highlight::Bucket;
use crate::tree::{Document, NodeId};

static RGB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rgba?\((\d+),\s*(\d+),\s*(\d+)").expect("valid regex")
});

/// Background assumed when no container sets one.
pub const DEFAULT_BACKGROUND: &str = "rgb(255, 255, 255)";

/// Luminance above which a background counts as light.
pub const LIGHT_THRESHOLD: f64 = 0.5;

/// Extract the red, green and blue channels of an `rgb()`/`rgba()` color.
pub fn parse_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let caps = RGB.captures(color)?;
    let channel = |i: usize| -> Option<u8> {
        let value: u32 = caps.get(i)?.as_str().parse().ok()?;
        Some(u8::try_from(value.min(255)).unwrap_or(u8::MAX))
    };
    Some((channel(1)?, channel(2)?, channel(3)?))
}

/// Relative luminance of an sRGB color, in `0.0..=1.0`.
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    let linear = |c: u8| {
        let v = f64::from(c) / 255.0;
        if v <= 0.039_28 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b)
}

/// True if `color` is light. Unparsable colors count as light.
pub fn is_light(color: &str) -> bool {
    parse_rgb(color).is_none_or(|(r, g, b)| relative_luminance(r, g, b) > LIGHT_THRESHOLD)
}

fn is_transparent(color: &str) -> bool {
    let color = color.trim();
    color.is_empty() || color == "transparent" || color == "rgba(0, 0, 0, 0)"
}

/// Effective background color behind `container`.
pub fn effective_background(doc: &Document, container: NodeId) -> &str {
    std::iter::once(container)
        .chain(doc.ancestors(container))
        .filter_map(|id| doc.style(id)?.background.as_deref())
        .find(|bg| !is_transparent(bg))
        .unwrap_or(DEFAULT_BACKGROUND)
}

/// Picks the tint bucket for a fragment, caching lightness per container.
#[derive(Debug, Default)]
pub struct BackgroundRouter {
    cache: HashMap<NodeId, bool>,
}

impl BackgroundRouter {
    /// Router with an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket for emphasis inside text leaf `node`.
    ///
    /// Detached leaves fall back to [`Bucket::Darken`].
    pub fn bucket_for(&mut self, doc: &Document, node: NodeId) -> Bucket {
        let Some(parent) = doc.parent(node) else {
            return Bucket::Darken;
        };
        let light = *self
            .cache
            .entry(parent)
            .or_insert_with(|| is_light(effective_background(doc, parent)));
        if light { Bucket::Darken } else { Bucket::Lighten }
    }

    /// Forget cached lightness.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Style;

    #[test]
    fn parses_rgb_and_rgba() {
        assert_eq!(parse_rgb("rgb(1, 2, 3)"), Some((1, 2, 3)));
        assert_eq!(parse_rgb("rgba(10,20,30,0.5)"), Some((10, 20, 30)));
        assert_eq!(parse_rgb("#fff"), None);
    }

    #[test]
    fn luminance_extremes() {
        assert!(relative_luminance(0, 0, 0).abs() < 1e-9);
        assert!((relative_luminance(255, 255, 255) - 1.0).abs() < 1e-9);
        assert!(is_light("rgb(255, 255, 255)"));
        assert!(!is_light("rgb(20, 20, 20)"));
        assert!(is_light("hsl(0, 0%, 0%)"));
    }

    #[test]
    fn dark_ancestor_routes_to_lighten() {
        let mut doc = Document::new();
        let dark = doc.append_styled(doc.root(), "div", Style::with_background("rgb(17, 17, 17)"));
        let span = doc.append_styled(dark, "span", Style::with_background("transparent"));
        let text = doc.append_text(span, "NASA");
        let plain = doc.append_text(doc.root(), "NASA");

        let mut router = BackgroundRouter::new();
        assert_eq!(router.bucket_for(&doc, text), Bucket::Lighten);
        assert_eq!(router.bucket_for(&doc, plain), Bucket::Darken);
    }

    #[test]
    fn cache_holds_until_cleared() {
        let mut doc = Document::new();
        let div = doc.append_container(doc.root(), "div");
        let text = doc.append_text(div, "NASA");
        let mut router = BackgroundRouter::new();
        assert_eq!(router.bucket_for(&doc, text), Bucket::Darken);

        doc.set_style(div, Style::with_background("rgb(0, 0, 0)"));
        assert_eq!(router.bucket_for(&doc, text), Bucket::Darken);
        router.clear();
        assert_eq!(router.bucket_for(&doc, text), Bucket::Lighten);
    }
}
