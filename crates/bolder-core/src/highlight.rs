//! Named highlight buckets and the marks placed in them.
//!
//! The renderer only knows about buckets of ranges. [`Marks`] sits in front
//! of it and keeps the range-to-bucket association, so a fragment's marks can
//! be dropped before it is reprocessed and detached fragments can be swept.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tree::{Document, NodeId};

/// A byte range inside one text leaf.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct MarkRange {
    /// Text leaf the range addresses.
    #[schemars(with = "usize")]
    pub node: NodeId,
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl MarkRange {
    /// Range over `start..end` of `node`.
    pub const fn new(node: NodeId, start: usize, end: usize) -> Self {
        Self { node, start, end }
    }

    /// The addressed slice of `text`, if the range fits.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// A named set of ranges sharing one presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    /// Tint for light backgrounds.
    Darken,
    /// Tint for dark backgrounds.
    Lighten,
    /// User keyword rule by position in the rule list.
    Custom(usize),
}

impl Bucket {
    /// Renderer-facing name.
    pub fn name(&self) -> String {
        match self {
            Self::Darken => "bolder-darken".to_string(),
            Self::Lighten => "bolder-lighten".to_string(),
            Self::Custom(n) => format!("bolder-custom-{n}"),
        }
    }

    /// True for user keyword buckets.
    pub const fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Where emphasis is drawn.
///
/// Implementations must make `remove` idempotent.
pub trait HighlightRenderer {
    /// False if the host cannot display named highlight buckets.
    fn supports_highlights(&self) -> bool;

    /// Add `range` to `bucket`.
    fn add(&mut self, bucket: Bucket, range: MarkRange);

    /// Remove `range` from `bucket`; absent ranges are ignored.
    fn remove(&mut self, bucket: Bucket, range: MarkRange);

    /// Empty every bucket.
    fn clear(&mut self);

    /// Ranges currently in `bucket`, in no particular order.
    fn ranges(&self, bucket: Bucket) -> Vec<MarkRange>;
}

/// In-memory renderer: a sorted set of ranges per bucket.
#[derive(Debug, Clone)]
pub struct Highlights {
    supported: bool,
    buckets: BTreeMap<Bucket, BTreeSet<MarkRange>>,
}

impl Default for Highlights {
    fn default() -> Self {
        Self::new()
    }
}

impl Highlights {
    /// A renderer that supports highlights.
    pub fn new() -> Self {
        Self {
            supported: true,
            buckets: BTreeMap::new(),
        }
    }

    /// A renderer for hosts without highlight support.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            buckets: BTreeMap::new(),
        }
    }

    /// Total ranges over all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(BTreeSet::len).sum()
    }

    /// True if no bucket holds a range.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every `(bucket, range)` pair, ordered by bucket then range.
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, MarkRange)> + '_ {
        self.buckets
            .iter()
            .flat_map(|(&bucket, ranges)| ranges.iter().map(move |&r| (bucket, r)))
    }
}

impl HighlightRenderer for Highlights {
    fn supports_highlights(&self) -> bool {
        self.supported
    }

    fn add(&mut self, bucket: Bucket, range: MarkRange) {
        self.buckets.entry(bucket).or_default().insert(range);
    }

    fn remove(&mut self, bucket: Bucket, range: MarkRange) {
        if let Some(ranges) = self.buckets.get_mut(&bucket) {
            ranges.remove(&range);
        }
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn ranges(&self, bucket: Bucket) -> Vec<MarkRange> {
        self.buckets
            .get(&bucket)
            .map(|r| r.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Active marks, mirrored into a renderer.
///
/// A range appears at most once per bucket. The same range may sit in a
/// custom bucket and a tint bucket at the same time.
#[derive(Debug)]
pub struct Marks<R> {
    renderer: R,
    active: HashSet<(MarkRange, Bucket)>,
}

impl<R: HighlightRenderer> Marks<R> {
    /// Wrap a renderer with no marks recorded.
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            active: HashSet::new(),
        }
    }

    /// The wrapped renderer.
    pub const fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Place `range` in `bucket`. Returns `false` if it was already there.
    pub fn apply(&mut self, bucket: Bucket, range: MarkRange) -> bool {
        if !self.active.insert((range, bucket)) {
            return false;
        }
        self.renderer.add(bucket, range);
        true
    }

    /// True if `range` is marked in `bucket`.
    pub fn contains(&self, bucket: Bucket, range: &MarkRange) -> bool {
        self.active.contains(&(*range, bucket))
    }

    /// Drop every mark on `node`. Returns how many were removed.
    pub fn remove_fragment(&mut self, node: NodeId) -> usize {
        self.remove_where(|range| range.node == node)
    }

    /// Drop marks whose text leaf is no longer attached to the document.
    pub fn sweep_detached(&mut self, doc: &Document) -> usize {
        self.remove_where(|range| {
            range.node.index() >= doc.len()
                || !doc.is_text(range.node)
                || !doc.is_connected(range.node)
        })
    }

    fn remove_where(&mut self, mut doomed: impl FnMut(&MarkRange) -> bool) -> usize {
        let stale: Vec<(MarkRange, Bucket)> = self
            .active
            .iter()
            .filter(|(range, _)| doomed(range))
            .copied()
            .collect();
        for entry in &stale {
            self.active.remove(entry);
            self.renderer.remove(entry.1, entry.0);
        }
        stale.len()
    }

    /// Remove everything from the renderer and forget every mark.
    pub fn clear_all(&mut self) {
        self.renderer.clear();
        self.active.clear();
    }

    /// Number of active marks.
    pub fn count(&self) -> usize {
        self.active.len()
    }

    /// Active marks sorted by node, offset and bucket.
    pub fn sorted(&self) -> Vec<(MarkRange, Bucket)> {
        let mut marks: Vec<_> = self.active.iter().copied().collect();
        marks.sort();
        marks
    }
}
