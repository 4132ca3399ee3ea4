//! Learned keyword registry.
//!
//! Words confirmed as keywords mid-sentence are remembered (lowercase, in
//! insertion order, up to a capacity) so they can be emphasized later even
//! at the start of a sentence. Occurrences that were suppressed before the
//! word was learned are queued as skipped candidates and promoted the moment
//! it is.

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexSet;

use crate::highlight::MarkRange;
use crate::tree::NodeId;

/// Shortest word that is learned or queued for promotion.
pub const REGISTRY_MIN_LEN: usize = 5;

/// Default delay before a changed registry is written out.
pub const DEFAULT_PERSIST_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Debounced write coalescing.
///
/// Every change pushes the deadline out by the window; the registry is
/// written once the deadline passes without further changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistBuffer {
    window: Duration,
    deadline: Option<Duration>,
}

impl PersistBuffer {
    /// A clean buffer with the given debounce window.
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record a change at `now`.
    pub fn mark(&mut self, now: Duration) {
        self.deadline = Some(now + self.window);
    }

    /// True if a change is waiting to be written.
    pub const fn is_dirty(&self) -> bool {
        self.deadline.is_some()
    }

    /// Clear the dirty flag if the deadline has passed. Returns whether it had.
    pub fn take_due(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Clear the dirty flag regardless of the deadline. Returns whether it was set.
    pub fn take(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

/// A persisted snapshot waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    /// Store key.
    pub key: String,
    /// Words, oldest first.
    pub words: Vec<String>,
}

/// Bounded FIFO set of learned keywords plus skipped candidates.
#[derive(Debug, Clone)]
pub struct Registry {
    words: IndexSet<String>,
    capacity: usize,
    key: Option<String>,
    skipped: HashMap<String, Vec<MarkRange>>,
    persist: PersistBuffer,
}

impl Registry {
    /// An empty registry. Without a `key` nothing is learned or persisted.
    pub fn new(capacity: usize, key: Option<String>, debounce: Duration) -> Self {
        Self {
            words: IndexSet::new(),
            capacity: capacity.max(1),
            key,
            skipped: HashMap::new(),
            persist: PersistBuffer::new(debounce),
        }
    }

    /// Persistence key, if learning is enabled.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Maximum number of words.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of learned words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if nothing has been learned.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Learned words, oldest first.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    /// True if `word` has been learned, ignoring case.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word.to_lowercase().as_str())
    }

    /// Learn `word`, evicting the oldest entry beyond capacity.
    ///
    /// Returns `true` if the word was new. Short words and unkeyed registries
    /// learn nothing.
    pub fn learn(&mut self, word: &str, now: Duration) -> bool {
        if self.key.is_none() || word.len() < REGISTRY_MIN_LEN {
            return false;
        }
        if !self.words.insert(word.to_lowercase()) {
            return false;
        }
        if self.words.len() > self.capacity
            && let Some(evicted) = self.words.shift_remove_index(0)
        {
            tracing::trace!(word = %evicted, "evicted oldest keyword");
        }
        self.persist.mark(now);
        true
    }

    /// Merge a persisted list into the registry.
    ///
    /// Words already present keep their position. After merging, the oldest
    /// entries are dropped down to capacity. Returns the lowercase words
    /// that were merged so their skipped candidates can be promoted.
    pub fn hydrate<I, S>(&mut self, list: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let merged: Vec<String> = list
            .into_iter()
            .map(|w| w.as_ref().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        for word in &merged {
            self.words.insert(word.clone());
        }
        if self.words.len() > self.capacity {
            let excess = self.words.len() - self.capacity;
            self.words.drain(..excess);
        }
        tracing::debug!(merged = merged.len(), size = self.words.len(), "hydrated registry");
        merged
    }

    /// Queue a suppressed occurrence of `word` for later promotion.
    pub fn queue_skipped(&mut self, word: &str, range: MarkRange) {
        self.skipped
            .entry(word.to_lowercase())
            .or_default()
            .push(range);
    }

    /// Remove and return the queued occurrences of `word`.
    pub fn take_skipped(&mut self, word: &str) -> Vec<MarkRange> {
        self.skipped
            .remove(word.to_lowercase().as_str())
            .unwrap_or_default()
    }

    /// Number of queued occurrences over all words.
    pub fn skipped_len(&self) -> usize {
        self.skipped.values().map(Vec::len).sum()
    }

    /// Drop queued occurrences inside `node`; its text is being rescanned.
    pub fn forget_fragment(&mut self, node: NodeId) {
        self.skipped.retain(|_, ranges| {
            ranges.retain(|r| r.node != node);
            !ranges.is_empty()
        });
    }

    /// Drop every queued occurrence.
    pub fn clear_skipped(&mut self) {
        self.skipped.clear();
    }

    /// Snapshot to write if the debounce deadline has passed.
    pub fn take_due(&mut self, now: Duration) -> Option<RegistrySnapshot> {
        if !self.persist.take_due(now) {
            return None;
        }
        self.snapshot()
    }

    /// Snapshot to write if anything changed, ignoring the deadline.
    pub fn flush(&mut self) -> Option<RegistrySnapshot> {
        if !self.persist.take() {
            return None;
        }
        self.snapshot()
    }

    /// True if a change has not been written yet.
    pub const fn is_dirty(&self) -> bool {
        self.persist.is_dirty()
    }

    fn snapshot(&self) -> Option<RegistrySnapshot> {
        let key = self.key.clone()?;
        Some(RegistrySnapshot {
            key,
            words: self.words.iter().cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Document;

    const MS: Duration = Duration::from_millis(1);

    fn keyed(capacity: usize) -> Registry {
        Registry::new(
            capacity,
            Some("bolder_registry_global".to_string()),
            DEFAULT_PERSIST_DEBOUNCE,
        )
    }

    #[test]
    fn learns_lowercase_and_ignores_short_words() {
        let mut reg = keyed(10);
        assert!(reg.learn("Python", Duration::ZERO));
        assert!(!reg.learn("PYTHON", Duration::ZERO));
        assert!(!reg.learn("NASA", Duration::ZERO));
        assert!(reg.contains("python"));
        assert!(reg.contains("PyThOn"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn unkeyed_registry_learns_nothing() {
        let mut reg = Registry::new(10, None, DEFAULT_PERSIST_DEBOUNCE);
        assert!(!reg.learn("Python", Duration::ZERO));
        assert!(reg.is_empty());
        assert!(reg.flush().is_none());
    }

    #[test]
    fn evicts_first_inserted_beyond_capacity() {
        let mut reg = keyed(2);
        reg.learn("Alpha", Duration::ZERO);
        reg.learn("Bravo", Duration::ZERO);
        reg.learn("Charlie", Duration::ZERO);
        assert_eq!(reg.words().collect::<Vec<_>>(), vec!["bravo", "charlie"]);
        assert!(!reg.contains("alpha"));
    }

    #[test]
    fn hydration_merges_then_trims_oldest() {
        let mut reg = keyed(3);
        reg.learn("Delta", Duration::ZERO);
        let merged = reg.hydrate(["Alpha", "bravo", "delta", "Echoes"]);
        assert_eq!(merged, vec!["alpha", "bravo", "delta", "echoes"]);
        assert_eq!(
            reg.words().collect::<Vec<_>>(),
            vec!["alpha", "bravo", "echoes"]
        );
    }

    #[test]
    fn skipped_candidates_are_keyed_case_insensitively() {
        let mut doc = Document::new();
        let a = doc.append_text(doc.root(), "Python rocks");
        let b = doc.append_text(doc.root(), "PYTHON");
        let mut reg = keyed(10);
        reg.queue_skipped("Python", MarkRange::new(a, 0, 6));
        reg.queue_skipped("PYTHON", MarkRange::new(b, 0, 6));
        assert_eq!(reg.skipped_len(), 2);

        reg.forget_fragment(b);
        assert_eq!(reg.take_skipped("python"), vec![MarkRange::new(a, 0, 6)]);
        assert!(reg.take_skipped("python").is_empty());
    }

    #[test]
    fn writes_are_debounced() {
        let mut reg = keyed(10);
        reg.learn("Python", Duration::ZERO);
        reg.learn("Kotlin", 600 * MS);
        assert!(reg.take_due(1000 * MS).is_none());
        let snapshot = reg.take_due(1600 * MS).unwrap();
        assert_eq!(snapshot.key, "bolder_registry_global");
        assert_eq!(snapshot.words, vec!["python", "kotlin"]);
        assert!(reg.take_due(5000 * MS).is_none());
    }

    #[test]
    fn flush_ignores_the_deadline() {
        let mut reg = keyed(10);
        reg.learn("Python", Duration::ZERO);
        assert!(reg.is_dirty());
        assert!(reg.flush().is_some());
        assert!(!reg.is_dirty());
    }
}
