//! A running emphasis session over one document.
//!
//! [`Session`] owns the engine, the scheduler, the registry store and a
//! clock. The host feeds it change notifications and calls
//! [`Session::run_slice`] whenever it has idle time.

use crate::config::Settings;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, StoreResult};
use crate::highlight::HighlightRenderer;
use crate::registry::Registry;
use crate::scheduler::{Clock, DrainReport, Scheduler, SchedulerConfig};
use crate::scope::is_site_enabled;
use crate::store::RegistryStore;
use crate::tree::{Document, Mutation, NodeKind};

/// Engine, scheduler and persistence for one document.
#[derive(Debug)]
pub struct Session<R, S, C> {
    engine: Engine<R>,
    scheduler: Scheduler,
    store: S,
    clock: C,
    enabled: bool,
    sweep_pending: bool,
}

impl<R, S, C> Session<R, S, C>
where
    R: HighlightRenderer,
    S: RegistryStore,
    C: Clock,
{
    /// A stopped session for a document served from `hostname`.
    pub fn new(
        hostname: &str,
        settings: Settings,
        scheduler: SchedulerConfig,
        renderer: R,
        store: S,
        clock: C,
    ) -> Self {
        let enabled = is_site_enabled(hostname, &settings);
        Self {
            engine: Engine::new(hostname, settings, renderer, scheduler.persist_debounce()),
            scheduler: Scheduler::new(scheduler),
            store,
            clock,
            enabled,
            sweep_pending: false,
        }
    }

    /// Load the persisted registry and queue the initial scan.
    ///
    /// Fails if the renderer cannot display highlights. A disabled site
    /// starts idle.
    #[tracing::instrument(skip_all, fields(hostname = self.engine.hostname()))]
    pub fn start(&mut self, doc: &Document) -> EngineResult<()> {
        if !self.engine.marks().renderer().supports_highlights() {
            return Err(EngineError::HighlightsUnsupported);
        }
        self.hydrate(doc);
        self.scheduler.restart();
        self.engine.reset_state();
        if self.enabled {
            self.scheduler.enqueue_walk(doc.root());
            tracing::info!("session started");
        } else {
            tracing::info!("session started disabled for this site");
        }
        Ok(())
    }

    fn hydrate(&mut self, doc: &Document) -> usize {
        let Some(key) = self.engine.registry().key().map(str::to_string) else {
            return 0;
        };
        match self.store.load(&key) {
            Ok(Some(words)) => {
                let promoted = self.engine.hydrate_registry(doc, &words);
                tracing::debug!(%key, words = words.len(), promoted, "registry loaded");
                promoted
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(%key, error = %e, "could not load registry");
                0
            }
        }
    }

    /// Queue work for a batch of document changes.
    pub fn on_mutations(&mut self, doc: &Document, mutations: &[Mutation]) {
        if !self.enabled {
            return;
        }
        for mutation in mutations {
            self.scheduler.record_notification(self.clock.now());
            match *mutation {
                Mutation::Added(node) => {
                    self.engine.invalidate_blocks(doc, node);
                    match doc.kind(node) {
                        NodeKind::Text(_) => self.scheduler.enqueue_fragment(doc, node),
                        NodeKind::Container { .. } => self.scheduler.enqueue_walk(node),
                    };
                }
                Mutation::TextChanged(node) => {
                    self.engine.invalidate_blocks(doc, node);
                    self.scheduler.enqueue_fragment(doc, node);
                }
                Mutation::Removed(_) => {
                    // Ancestors are unknown once detached.
                    self.engine.clear_block_cache();
                    self.sweep_pending = true;
                }
            }
        }
    }

    /// Fire due timers, then process queued work for one slice.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn run_slice(&mut self, doc: &Document) -> DrainReport {
        let now = self.clock.now();
        let root = doc.root();
        let tick = self.scheduler.tick(now, self.enabled, root);
        if tick.resumed_rescan || tick.startup_retry {
            self.engine.reset_state();
            self.engine.clear_block_cache();
        }
        if tick.sweep_due {
            self.sweep_pending = true;
        }
        // Marks stay untouched until the storm cooldown ends.
        if self.sweep_pending && !self.scheduler.is_paused() {
            self.sweep_pending = false;
            self.engine.sweep(doc);
        }
        if !self.enabled {
            return DrainReport::default();
        }

        let engine = &mut self.engine;
        let clock = &self.clock;
        let report = self.scheduler.drain(doc, clock, |node| {
            engine.process_fragment(doc, node, clock.now())
        });

        if self.scheduler.needs_verification() {
            let marks_present = self.engine.marks().count() > 0;
            self.scheduler
                .verify_startup(self.clock.now(), marks_present, doc.letter_count(root));
        }
        if let Some(snapshot) = self.engine.registry_mut().take_due(self.clock.now())
            && let Err(e) = self.store.save(&snapshot.key, &snapshot.words)
        {
            tracing::warn!(key = %snapshot.key, error = %e, "could not save registry");
        }
        report
    }

    /// Run slices until the queue is empty or the storm breaker holds.
    ///
    /// Timers that have not come due are not waited for.
    pub fn run_until_idle(&mut self, doc: &Document) -> DrainReport {
        let mut total = self.run_slice(doc);
        while self.scheduler.pending() > 0 && !self.scheduler.is_paused() {
            let slice = self.run_slice(doc);
            total.merge(&slice);
        }
        total
    }

    /// Turn emphasis on or off. Returns `false` if nothing changed.
    ///
    /// Disabling removes every mark and drops queued work; enabling rescans
    /// the whole document.
    pub fn set_enabled(&mut self, doc: &Document, enabled: bool) -> bool {
        if self.enabled == enabled {
            return false;
        }
        self.enabled = enabled;
        if enabled {
            self.scheduler.restart();
            self.engine.reset_state();
            self.scheduler.enqueue_walk(doc.root());
        } else {
            self.scheduler.clear();
            self.engine.teardown();
        }
        tracing::info!(enabled, "emphasis toggled");
        true
    }

    /// Apply new settings: tear everything down and rescan.
    ///
    /// Pending registry changes are written before a registry switch.
    #[tracing::instrument(skip_all)]
    pub fn apply_settings(&mut self, doc: &Document, settings: Settings) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "could not save registry before reconfiguring");
        }
        self.enabled = is_site_enabled(self.engine.hostname(), &settings);
        let replaced = self.engine.reconfigure(settings);
        self.scheduler.restart();
        if replaced {
            self.hydrate(doc);
        }
        if self.enabled {
            self.scheduler.enqueue_walk(doc.root());
        }
    }

    /// Write the registry now if it has unsaved changes.
    ///
    /// Returns `true` if anything was written.
    pub fn flush(&mut self) -> StoreResult<bool> {
        match self.engine.registry_mut().flush() {
            Some(snapshot) => {
                self.store.save(&snapshot.key, &snapshot.words)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True if emphasis is on.
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The renderer holding the marks.
    pub const fn renderer(&self) -> &R {
        self.engine.marks().renderer()
    }

    /// The learned registry.
    pub const fn registry(&self) -> &Registry {
        self.engine.registry()
    }

    /// CSS for the highlight buckets.
    pub fn stylesheet(&self) -> String {
        self.engine.stylesheet()
    }

    /// The underlying engine.
    pub const fn engine(&self) -> &Engine<R> {
        &self.engine
    }

    /// The work scheduler.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The registry store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The session clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}
