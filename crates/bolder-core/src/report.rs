//! Serializable summaries of a finished scan.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::highlight::{Bucket, HighlightRenderer};
use crate::scheduler::{Clock, DrainReport};
use crate::session::Session;
use crate::store::RegistryStore;
use crate::tree::Document;

/// Everything a scan produced.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanReport {
    /// Hostname the document was resolved against.
    pub origin: String,
    /// Whether emphasis is enabled for the origin.
    pub enabled: bool,
    /// Persistence key of the learned registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_key: Option<String>,
    /// Emphasized words in document order.
    pub marks: Vec<MarkReport>,
    /// Learned words, oldest first.
    pub learned: Vec<String>,
    /// Work totals.
    pub totals: ScanTotals,
}

/// One emphasized range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MarkReport {
    /// The emphasized text.
    pub word: String,
    /// Highlight bucket name.
    pub bucket: String,
    /// Text leaf index.
    pub node: usize,
    /// Start byte offset within the leaf.
    pub start: usize,
    /// End byte offset within the leaf.
    pub end: usize,
}

/// Counters summed over every slice of the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScanTotals {
    /// Fragments processed.
    pub fragments: usize,
    /// Fragments that failed.
    pub failed: usize,
    /// Auto-detected emphasis.
    pub emphasized: usize,
    /// Custom keyword matches.
    pub custom: usize,
    /// Retroactive promotions.
    pub promoted: usize,
    /// Words learned during the scan.
    pub learned: usize,
}

impl From<&DrainReport> for ScanTotals {
    fn from(report: &DrainReport) -> Self {
        Self {
            fragments: report.fragments,
            failed: report.failed,
            emphasized: report.emphasized,
            custom: report.custom,
            promoted: report.promoted,
            learned: report.learned,
        }
    }
}

impl ScanReport {
    /// Summarize the session's current marks over `doc`.
    pub fn collect<R, S, C>(session: &Session<R, S, C>, doc: &Document, drained: &DrainReport) -> Self
    where
        R: HighlightRenderer,
        S: RegistryStore,
        C: Clock,
    {
        let marks = session
            .engine()
            .marks()
            .sorted()
            .into_iter()
            .filter_map(|(range, bucket)| {
                let word = range.slice(doc.text(range.node)?)?.to_string();
                Some(MarkReport {
                    word,
                    bucket: bucket.name(),
                    node: range.node.index(),
                    start: range.start,
                    end: range.end,
                })
            })
            .collect();
        let registry = session.registry();
        Self {
            origin: session.engine().hostname().to_string(),
            enabled: session.is_enabled(),
            registry_key: registry.key().map(str::to_string),
            marks,
            learned: registry.words().map(str::to_string).collect(),
            totals: ScanTotals::from(drained),
        }
    }

    /// Marks that came from custom keyword rules.
    pub fn custom_marks(&self) -> impl Iterator<Item = &MarkReport> {
        self.marks.iter().filter(|m| m.is_custom())
    }
}

impl MarkReport {
    /// True if the mark came from a custom keyword rule.
    pub fn is_custom(&self) -> bool {
        self.bucket != Bucket::Darken.name() && self.bucket != Bucket::Lighten.name()
    }
}
