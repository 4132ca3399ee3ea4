//! Cooperative scheduling of fragment work.
//!
//! Goals:
//! - FIFO queue of single fragments and subtree walks, deduplicated
//! - bounded slices (time budget and node cap) so the host stays responsive
//! - storm breaker: a burst of change notifications pauses all work, then a
//!   single full rescan runs after a cooldown
//! - startup verification: retry the initial scan with backoff when a
//!   text-heavy document ends up with no marks at all
//!
//! Time is read through [`Clock`] so tests can drive it by hand.

use std::cell::Cell;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::engine::FragmentReport;
use crate::error::EngineResult;
use crate::tree::{Document, NodeId, NodeKind};

/// Source of monotonic time, as an offset from an arbitrary origin.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// A clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock for deterministic runs.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    /// A clock stopped at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Jump to an absolute time.
    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Time budget per slice.
    pub slice_budget_ms: u64,
    /// Nodes visited per slice at most.
    pub slice_node_cap: usize,
    /// Sliding window for counting change notifications.
    pub storm_window_ms: u64,
    /// Notifications within the window that trigger a pause.
    pub storm_threshold: usize,
    /// Length of a storm pause.
    pub cooldown_ms: u64,
    /// Letters a document needs before an empty scan is retried.
    pub startup_min_letters: usize,
    /// First startup retry delay; doubles each attempt.
    pub startup_base_delay_ms: u64,
    /// Startup retries at most.
    pub startup_max_attempts: u32,
    /// Interval between sweeps of marks on detached fragments.
    pub sweep_interval_ms: u64,
    /// Quiet period before a changed registry is persisted.
    pub persist_debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slice_budget_ms: 8,
            slice_node_cap: 200,
            storm_window_ms: 1000,
            storm_threshold: 200,
            cooldown_ms: 2000,
            startup_min_letters: 200,
            startup_base_delay_ms: 500,
            startup_max_attempts: 4,
            sweep_interval_ms: 5000,
            persist_debounce_ms: 1000,
        }
    }
}

impl SchedulerConfig {
    /// Slice time budget.
    pub const fn slice_budget(&self) -> Duration {
        Duration::from_millis(self.slice_budget_ms)
    }

    /// Storm counting window.
    pub const fn storm_window(&self) -> Duration {
        Duration::from_millis(self.storm_window_ms)
    }

    /// Storm pause length.
    pub const fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Sweep interval.
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Registry persistence debounce.
    pub const fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// Delay before startup retry number `attempt` (zero-based).
    pub fn startup_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.startup_base_delay_ms.saturating_mul(factor))
    }
}

/// Where the scheduler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing queued.
    Idle,
    /// Work is queued or being processed.
    Draining,
    /// Storm breaker tripped; all work is dropped until `until`.
    Paused {
        /// End of the cooldown.
        until: Duration,
    },
    /// Cooldown over; the owed rescan is queued.
    Resuming,
}

/// Depth-first cursor over a subtree, one node per step.
#[derive(Debug, Clone)]
pub struct WalkCursor {
    root: NodeId,
    stack: Vec<NodeId>,
}

/// Result of one cursor step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A text leaf to process.
    Fragment(NodeId),
    /// A container was expanded.
    Container,
    /// The walk is finished.
    Done,
}

impl WalkCursor {
    /// Walk the subtree rooted at `root` in document order.
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            stack: vec![root],
        }
    }

    /// Root of the walk.
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// True if a node in `lineage` (a node followed by its ancestors) is
    /// still waiting on the cursor's stack.
    fn reaches(&self, lineage: &[NodeId]) -> bool {
        self.stack.iter().any(|pending| lineage.contains(pending))
    }

    /// Visit the next node.
    pub fn step(&mut self, doc: &Document) -> Step {
        let Some(id) = self.stack.pop() else {
            return Step::Done;
        };
        if id.index() >= doc.len() {
            return Step::Container;
        }
        match doc.kind(id) {
            NodeKind::Text(_) => Step::Fragment(id),
            NodeKind::Container { .. } => {
                self.stack.extend(doc.children(id).iter().rev().copied());
                Step::Container
            }
        }
    }
}

/// A queued unit of work.
#[derive(Debug, Clone)]
pub enum Task {
    /// One text leaf.
    Fragment(NodeId),
    /// A subtree walk in progress.
    Walk(WalkCursor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TaskKey {
    Fragment(NodeId),
    Walk(NodeId),
}

impl Task {
    fn key(&self) -> TaskKey {
        match self {
            Self::Fragment(id) => TaskKey::Fragment(*id),
            Self::Walk(cursor) => TaskKey::Walk(cursor.root()),
        }
    }
}

/// Totals for one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Fragments handed to the engine.
    pub fragments: usize,
    /// Nodes visited, containers included.
    pub visited: usize,
    /// Fragments whose processing failed.
    pub failed: usize,
    /// Words emphasized.
    pub emphasized: usize,
    /// Custom keyword matches.
    pub custom: usize,
    /// Retroactive promotions.
    pub promoted: usize,
    /// Newly learned words.
    pub learned: usize,
    /// True if the queue is empty after the slice.
    pub finished: bool,
}

impl DrainReport {
    fn absorb(&mut self, fragment: &FragmentReport) {
        self.emphasized += fragment.emphasized;
        self.custom += fragment.custom;
        self.promoted += fragment.promoted;
        self.learned += fragment.learned;
    }

    /// Add another slice's totals; `finished` follows the later slice.
    pub fn merge(&mut self, later: &Self) {
        self.fragments += later.fragments;
        self.visited += later.visited;
        self.failed += later.failed;
        self.emphasized += later.emphasized;
        self.custom += later.custom;
        self.promoted += later.promoted;
        self.learned += later.learned;
        self.finished = later.finished;
    }
}

/// Timers that fired during a [`Scheduler::tick`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A storm pause ended and the owed rescan was queued.
    pub resumed_rescan: bool,
    /// A startup retry scan was queued.
    pub startup_retry: bool,
    /// The detached-mark sweep is due.
    pub sweep_due: bool,
}

#[derive(Debug, Clone, Default)]
struct StartupCheck {
    attempts: u32,
    retry_at: Option<Duration>,
    settled: bool,
}

/// FIFO work queue with slicing, storm protection and startup retries.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    state: SchedulerState,
    queue: VecDeque<Task>,
    in_flight: HashSet<TaskKey>,
    notifications: VecDeque<Duration>,
    rescan_owed: bool,
    initial_scan_complete: bool,
    startup: StartupCheck,
    next_sweep: Option<Duration>,
}

impl Scheduler {
    /// An idle scheduler.
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: SchedulerState::Idle,
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            notifications: VecDeque::new(),
            rescan_owed: false,
            initial_scan_complete: false,
            startup: StartupCheck::default(),
            next_sweep: None,
        }
    }

    /// Tuning in effect.
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// True while the storm breaker holds.
    pub const fn is_paused(&self) -> bool {
        matches!(self.state, SchedulerState::Paused { .. })
    }

    /// Queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True if a full rescan is owed from a storm pause.
    pub const fn rescan_owed(&self) -> bool {
        self.rescan_owed
    }

    /// True once the first full drain has emptied the queue.
    pub const fn initial_scan_complete(&self) -> bool {
        self.initial_scan_complete
    }

    fn enqueue(&mut self, task: Task) -> bool {
        if self.is_paused() {
            self.rescan_owed = true;
            return false;
        }
        if !self.in_flight.insert(task.key()) {
            return false;
        }
        self.queue.push_back(task);
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Draining;
        }
        true
    }

    /// Queue one text leaf. Returns `false` if it is already queued, a
    /// queued walk has yet to reach it, or the scheduler is paused.
    pub fn enqueue_fragment(&mut self, doc: &Document, node: NodeId) -> bool {
        if self.walk_reaches(doc, node) {
            return false;
        }
        self.enqueue(Task::Fragment(node))
    }

    fn walk_reaches(&self, doc: &Document, node: NodeId) -> bool {
        if !self.queue.iter().any(|task| matches!(task, Task::Walk(_))) {
            return false;
        }
        let lineage: Vec<NodeId> = std::iter::once(node).chain(doc.ancestors(node)).collect();
        self.queue
            .iter()
            .any(|task| matches!(task, Task::Walk(cursor) if cursor.reaches(&lineage)))
    }

    /// Queue a walk of the subtree under `root`.
    pub fn enqueue_walk(&mut self, root: NodeId) -> bool {
        self.enqueue(Task::Walk(WalkCursor::new(root)))
    }

    /// Count one change notification at `now`.
    ///
    /// Returns `true` if this notification tripped the storm breaker.
    pub fn record_notification(&mut self, now: Duration) -> bool {
        if self.is_paused() {
            self.rescan_owed = true;
            return false;
        }
        let window = self.config.storm_window();
        self.notifications.push_back(now);
        while self
            .notifications
            .front()
            .is_some_and(|&t| now.saturating_sub(t) >= window)
        {
            self.notifications.pop_front();
        }
        if self.notifications.len() < self.config.storm_threshold.max(1) {
            return false;
        }

        let until = now + self.config.cooldown();
        tracing::warn!(
            notifications = self.notifications.len(),
            dropped = self.queue.len(),
            cooldown_ms = self.config.cooldown_ms,
            "mutation storm, pausing"
        );
        self.queue.clear();
        self.in_flight.clear();
        self.notifications.clear();
        self.rescan_owed = true;
        self.state = SchedulerState::Paused { until };
        true
    }

    /// Drop all queued work and return to idle.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.in_flight.clear();
        self.notifications.clear();
        self.rescan_owed = false;
        self.state = SchedulerState::Idle;
    }

    /// Clear everything, including startup verification progress.
    pub fn restart(&mut self) {
        self.clear();
        self.initial_scan_complete = false;
        self.startup = StartupCheck::default();
        self.next_sweep = None;
    }

    /// Process queued work until the queue empties, the slice budget runs
    /// out, or the node cap is reached.
    ///
    /// An unfinished walk goes back to the front of the queue. A failing
    /// fragment is logged and does not stop the slice.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn drain<C, F>(&mut self, doc: &Document, clock: &C, mut process: F) -> DrainReport
    where
        C: Clock + ?Sized,
        F: FnMut(NodeId) -> EngineResult<FragmentReport>,
    {
        let mut report = DrainReport::default();
        if self.is_paused() {
            return report;
        }

        let started = clock.now();
        let budget = self.config.slice_budget();
        let cap = self.config.slice_node_cap.max(1);
        let exhausted = |visited: usize| visited >= cap || clock.now().saturating_sub(started) >= budget;

        let mut run = |node: NodeId, report: &mut DrainReport| {
            report.fragments += 1;
            match process(node) {
                Ok(fragment) => report.absorb(&fragment),
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(%node, error = %e, "fragment processing failed");
                }
            }
        };

        'slice: while let Some(task) = self.queue.pop_front() {
            match task {
                Task::Fragment(node) => {
                    self.in_flight.remove(&TaskKey::Fragment(node));
                    report.visited += 1;
                    run(node, &mut report);
                }
                Task::Walk(mut cursor) => loop {
                    match cursor.step(doc) {
                        Step::Done => {
                            self.in_flight.remove(&TaskKey::Walk(cursor.root()));
                            break;
                        }
                        Step::Container => report.visited += 1,
                        Step::Fragment(node) => {
                            report.visited += 1;
                            run(node, &mut report);
                        }
                    }
                    if exhausted(report.visited) {
                        self.queue.push_front(Task::Walk(cursor));
                        break 'slice;
                    }
                },
            }
            if exhausted(report.visited) {
                break;
            }
        }

        report.finished = self.queue.is_empty();
        if report.finished {
            self.state = SchedulerState::Idle;
            if !self.initial_scan_complete {
                self.initial_scan_complete = true;
                tracing::debug!("initial scan complete");
            }
        } else {
            self.state = SchedulerState::Draining;
        }
        report
    }

    /// True when the initial scan is done and its result has not yet been
    /// checked.
    pub fn needs_verification(&self) -> bool {
        self.initial_scan_complete
            && !self.startup.settled
            && self.startup.retry_at.is_none()
            && self.queue.is_empty()
    }

    /// Check the outcome of a completed full scan.
    ///
    /// When no marks exist but the document has enough text, a retry is
    /// scheduled with exponential backoff and its time is returned.
    pub fn verify_startup(
        &mut self,
        now: Duration,
        marks_present: bool,
        letters: usize,
    ) -> Option<Duration> {
        if marks_present || letters < self.config.startup_min_letters {
            self.startup.settled = true;
            return None;
        }
        if self.startup.attempts >= self.config.startup_max_attempts {
            tracing::warn!(
                attempts = self.startup.attempts,
                letters,
                "document still has no marks after startup retries"
            );
            self.startup.settled = true;
            return None;
        }
        let at = now + self.config.startup_delay(self.startup.attempts);
        self.startup.attempts += 1;
        self.startup.retry_at = Some(at);
        tracing::debug!(attempt = self.startup.attempts, ?at, "scheduling startup rescan");
        Some(at)
    }

    /// Startup retries scheduled so far.
    pub const fn startup_attempts(&self) -> u32 {
        self.startup.attempts
    }

    /// Fire due timers. Walks of `root` are queued for a finished storm
    /// pause (when a rescan is owed) and for a due startup retry.
    pub fn tick(&mut self, now: Duration, enabled: bool, root: NodeId) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        if let SchedulerState::Paused { until } = self.state {
            if now < until {
                return outcome;
            }
            self.state = SchedulerState::Resuming;
            if enabled && self.rescan_owed {
                self.rescan_owed = false;
                self.in_flight.insert(TaskKey::Walk(root));
                self.queue.push_back(Task::Walk(WalkCursor::new(root)));
                outcome.resumed_rescan = true;
                tracing::info!("storm cooldown over, rescanning");
            } else {
                self.state = SchedulerState::Idle;
            }
        }

        if enabled
            && let Some(at) = self.startup.retry_at
            && now >= at
        {
            self.startup.retry_at = None;
            outcome.startup_retry = self.enqueue_walk(root);
        }

        if enabled {
            let interval = self.config.sweep_interval();
            match self.next_sweep {
                Some(at) if now >= at => {
                    outcome.sweep_due = true;
                    self.next_sweep = Some(now + interval);
                }
                None => self.next_sweep = Some(now + interval),
                Some(_) => {}
            }
        }

        outcome
    }
}
