//! The decision engine.
//!
//! Processes one text fragment at a time: drops the fragment's previous
//! marks, applies the block gates and custom rules, then walks the tokens
//! deciding word by word whether to emphasize, learn, promote or queue.

use std::fmt::Write as _;
use std::time::Duration;

use crate::block::BlockStats;
use crate::color::BackgroundRouter;
use crate::config::Settings;
use crate::custom::CustomRules;
use crate::error::{EngineError, EngineResult};
use crate::highlight::{Bucket, HighlightRenderer, MarkRange, Marks};
use crate::patterns::Classification;
use crate::position::{
    PositionTracker, ScanState, SkipReason, block_ancestor, is_first_word_in_block,
    is_sentence_terminator, skip_reason,
};
use crate::registry::{REGISTRY_MIN_LEN, Registry};
use crate::scope::ScopeConfig;
use crate::tokenize::{normalize_token, tokenize};
use crate::tree::{Document, NodeId};

/// Why a fragment produced no verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSkip {
    /// The node is no longer attached to the document.
    Detached,
    /// The node is a container, not a text leaf.
    NotText,
    /// An ancestor excludes or hides the text.
    Hidden(SkipReason),
    /// Only whitespace.
    Blank,
    /// Both the block and the fragment are below the word minimum.
    TooShort,
}

/// What processing one fragment did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentReport {
    /// Set when the fragment was not scanned.
    pub skipped: Option<FragmentSkip>,
    /// Marks removed before rescanning.
    pub cleared: usize,
    /// Words emphasized by auto-detection or the registry.
    pub emphasized: usize,
    /// Custom keyword matches.
    pub custom: usize,
    /// Earlier occurrences promoted retroactively.
    pub promoted: usize,
    /// Words newly added to the registry.
    pub learned: usize,
    /// Suppressed occurrences queued for promotion.
    pub queued: usize,
}

impl FragmentReport {
    fn skipped(reason: FragmentSkip, cleared: usize) -> Self {
        Self {
            skipped: Some(reason),
            cleared,
            ..Self::default()
        }
    }
}

/// Check that `range` still addresses whole characters of its text leaf.
pub fn validate_range(doc: &Document, range: MarkRange) -> EngineResult<()> {
    let len = doc.text(range.node).map_or(0, str::len);
    let fits = doc
        .text(range.node)
        .is_some_and(|text| range.start < range.end && range.slice(text).is_some());
    if fits {
        Ok(())
    } else {
        Err(EngineError::RangeOutOfBounds {
            node: range.node,
            start: range.start,
            end: range.end,
            len,
        })
    }
}

/// Emphasize every queued occurrence of `word` that is still valid.
fn promote<R: HighlightRenderer>(
    doc: &Document,
    word: &str,
    registry: &mut Registry,
    router: &mut BackgroundRouter,
    marks: &mut Marks<R>,
) -> usize {
    let mut promoted = 0;
    for range in registry.take_skipped(word) {
        if !doc.is_connected(range.node) {
            continue;
        }
        if let Err(e) = validate_range(doc, range) {
            tracing::debug!(error = %e, word, "dropping stale skipped candidate");
            continue;
        }
        let same_word = doc
            .text(range.node)
            .and_then(|text| range.slice(text))
            .and_then(normalize_token)
            .is_some_and(|found| found.normalized.eq_ignore_ascii_case(word));
        if !same_word {
            tracing::debug!(node = %range.node, word, "skipped candidate text changed");
            continue;
        }
        let bucket = router.bucket_for(doc, range.node);
        if marks.apply(bucket, range) {
            promoted += 1;
        }
    }
    promoted
}

/// Scans fragments and keeps marks, registry and position state in step.
#[derive(Debug)]
pub struct Engine<R> {
    hostname: String,
    settings: Settings,
    scope: ScopeConfig,
    custom: CustomRules,
    router: BackgroundRouter,
    blocks: BlockStats,
    registry: Registry,
    marks: Marks<R>,
    state: ScanState,
    persist_debounce: Duration,
}

impl<R: HighlightRenderer> Engine<R> {
    /// Build an engine for a document served from `hostname`.
    pub fn new(
        hostname: &str,
        settings: Settings,
        renderer: R,
        persist_debounce: Duration,
    ) -> Self {
        let scope = ScopeConfig::resolve(hostname, &settings);
        let custom = CustomRules::parse(&settings.custom_highlights);
        let registry = Registry::new(
            scope.registry_capacity,
            scope.registry_key.clone(),
            persist_debounce,
        );
        Self {
            hostname: hostname.to_string(),
            settings,
            scope,
            custom,
            router: BackgroundRouter::new(),
            blocks: BlockStats::new(),
            registry,
            marks: Marks::new(renderer),
            state: ScanState::new(),
            persist_debounce,
        }
    }

    /// Hostname the engine was resolved for.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Current settings.
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Resolved per-site scope.
    pub const fn scope(&self) -> &ScopeConfig {
        &self.scope
    }

    /// Parsed custom keyword rules.
    pub const fn custom_rules(&self) -> &CustomRules {
        &self.custom
    }

    /// The learned registry.
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the learned registry.
    pub const fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Active marks.
    pub const fn marks(&self) -> &Marks<R> {
        &self.marks
    }

    /// Carry-over position state.
    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    /// Forget cached block word counts under `node`'s ancestors.
    pub fn invalidate_blocks(&mut self, doc: &Document, node: NodeId) {
        self.blocks.invalidate_ancestors(doc, node);
    }

    /// Forget every cached block word count.
    pub fn clear_block_cache(&mut self) {
        self.blocks.clear();
    }

    /// Return position state to a fresh sentence start.
    pub fn reset_state(&mut self) {
        self.state.reset();
    }

    /// Remove every mark and forget every cache and queued candidate.
    ///
    /// Learned words survive.
    #[tracing::instrument(skip(self))]
    pub fn teardown(&mut self) {
        self.marks.clear_all();
        self.router.clear();
        self.blocks.clear();
        self.registry.clear_skipped();
        self.state.reset();
    }

    /// Drop marks on detached fragments.
    pub fn sweep(&mut self, doc: &Document) -> usize {
        let removed = self.marks.sweep_detached(doc);
        if removed > 0 {
            tracing::debug!(removed, "swept marks on detached fragments");
        }
        removed
    }

    /// Replace the settings. Everything is torn down; the registry is
    /// replaced only when its key or capacity changed.
    ///
    /// Returns `true` if the registry was replaced and needs hydrating.
    #[tracing::instrument(skip(self, settings))]
    pub fn reconfigure(&mut self, settings: Settings) -> bool {
        self.teardown();
        let scope = ScopeConfig::resolve(&self.hostname, &settings);
        self.custom = CustomRules::parse(&settings.custom_highlights);
        let replace = scope.registry_key != self.scope.registry_key
            || scope.registry_capacity != self.scope.registry_capacity;
        if replace {
            self.registry = Registry::new(
                scope.registry_capacity,
                scope.registry_key.clone(),
                self.persist_debounce,
            );
        }
        self.scope = scope;
        self.settings = settings;
        replace
    }

    /// Merge persisted words into the registry and promote any occurrence
    /// that was skipped while they were loading.
    pub fn hydrate_registry<I, S>(&mut self, doc: &Document, words: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let merged = self.registry.hydrate(words);
        merged
            .iter()
            .map(|word| {
                promote(
                    doc,
                    word,
                    &mut self.registry,
                    &mut self.router,
                    &mut self.marks,
                )
            })
            .sum()
    }

    /// CSS rules for every bucket.
    pub fn stylesheet(&self) -> String {
        let mut css = String::new();
        let _ = writeln!(
            css,
            "::highlight({}) {{ background-color: {}; color: inherit; text-decoration: none; }}",
            Bucket::Darken,
            self.settings.darken_bg
        );
        let _ = writeln!(
            css,
            "::highlight({}) {{ background-color: {}; color: inherit; text-decoration: none; }}",
            Bucket::Lighten,
            self.settings.lighten_bg
        );
        for rule in self.custom.rules() {
            let _ = writeln!(
                css,
                "::highlight({}) {{ background-color: {}; color: inherit; }}",
                rule.bucket, rule.color
            );
        }
        css
    }

    /// Process one text fragment.
    ///
    /// Existing marks and queued candidates on the fragment are dropped
    /// first, so calling this again after the text changed is safe.
    #[tracing::instrument(level = "trace", skip(self, doc))]
    pub fn process_fragment(
        &mut self,
        doc: &Document,
        node: NodeId,
        now: Duration,
    ) -> EngineResult<FragmentReport> {
        let cleared = self.marks.remove_fragment(node);
        self.registry.forget_fragment(node);

        if !doc.is_connected(node) {
            return Ok(FragmentReport::skipped(FragmentSkip::Detached, cleared));
        }
        let Some(text) = doc.text(node) else {
            return Ok(FragmentReport::skipped(FragmentSkip::NotText, cleared));
        };

        if let Some(reason) = skip_reason(doc, node, &self.scope.excluded_tags) {
            if reason == SkipReason::ExcludedTag {
                self.state.advance_over(text);
            }
            return Ok(FragmentReport::skipped(
                FragmentSkip::Hidden(reason),
                cleared,
            ));
        }
        if text.trim().is_empty() {
            return Ok(FragmentReport::skipped(FragmentSkip::Blank, cleared));
        }

        let block = block_ancestor(doc, node);
        self.state.enter_block(block);

        if !self
            .blocks
            .passes_min_words(doc, block, text, self.settings.min_words_in_block)
        {
            return Ok(FragmentReport::skipped(FragmentSkip::TooShort, cleared));
        }
        let metadata_line =
            self.settings.skip_short_metadata_lines && self.blocks.is_metadata_line(doc, block);

        let mut report = FragmentReport {
            cleared,
            ..FragmentReport::default()
        };

        for found in self.custom.find_all(text) {
            let range = MarkRange::new(node, found.start, found.end);
            validate_range(doc, range)?;
            if self.marks.apply(found.bucket, range) {
                report.custom += 1;
            }
        }

        if self.settings.disable_auto_detect || metadata_line {
            return Ok(report);
        }

        let bucket = self.router.bucket_for(doc, node);
        let block_start = is_first_word_in_block(doc, node, block, &self.scope.excluded_tags);
        let tokens = tokenize(text);
        let mut tracker = PositionTracker::new(&mut self.state, block_start);

        for (index, token) in tokens.iter().enumerate() {
            if is_sentence_terminator(&tokens, index) {
                tracker.on_terminator();
                continue;
            }
            let Some(normalized) = normalize_token(token.text) else {
                continue;
            };
            if !normalized.is_word() {
                continue;
            }

            let word = normalized.normalized.as_str();
            let start = token.start + normalized.offset_delta;
            let range = MarkRange::new(node, start, start + normalized.trimmed.len());
            let at_block_start = tracker.take_block_start();
            let at_sentence_start = tracker.take_sentence_start();
            let class = Classification::of(word);

            let emphasize = (!at_block_start && !at_sentence_start && class.is_auto_detect_candidate())
                || class.all_caps;

            if emphasize {
                self.marks.apply(bucket, range);
                report.emphasized += 1;
                if self.registry.learn(word, now) {
                    report.learned += 1;
                }
                report.promoted += promote(
                    doc,
                    word,
                    &mut self.registry,
                    &mut self.router,
                    &mut self.marks,
                );
            } else if at_block_start || at_sentence_start {
                let long_enough = word.len() >= REGISTRY_MIN_LEN;
                if long_enough
                    && class.is_registry_start_candidate()
                    && self.registry.contains(word)
                {
                    self.marks.apply(bucket, range);
                    report.emphasized += 1;
                } else if long_enough && class.is_auto_detect_candidate() {
                    self.registry.queue_skipped(word, range);
                    report.queued += 1;
                }
            }
        }

        Ok(report)
    }
}
