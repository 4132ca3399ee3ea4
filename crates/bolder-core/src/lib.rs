//! Core library for bolder.
//!
//! Bolder emphasizes likely keywords (acronyms, proper nouns, mixed-case
//! identifiers) in a live document tree. A word that starts a sentence or a
//! block is only emphasized once it has been seen mid-sentence, so ordinary
//! capitalized sentence openers stay plain.
//!
//! # Modules
//!
//! - [`tree`] - Document tree and change feed
//! - [`tokenize`], [`patterns`], [`position`] - Word splitting, classification and sentence position
//! - [`scope`] - Per-site excluded tags, registry sizing and enablement
//! - [`registry`], [`store`] - Learned keywords and their persistence
//! - [`engine`] - Per-fragment decisions
//! - [`scheduler`], [`session`] - Sliced processing with a mutation-storm breaker
//! - [`config`] - Configuration loading and management
//! - [`error`] - Error types and result aliases
//!
//! # Quick Start
//!
//! ```no_run
//! use bolder_core::markdown::markdown_document;
//! use bolder_core::tree::Style;
//! use bolder_core::{Highlights, ManualClock, MemoryStore, SchedulerConfig, Session, Settings};
//!
//! let doc = markdown_document("We met NASA engineers today.", Style::default());
//! let mut session = Session::new(
//!     "example.com",
//!     Settings::default(),
//!     SchedulerConfig::default(),
//!     Highlights::new(),
//!     MemoryStore::new(),
//!     ManualClock::new(),
//! );
//! session.start(&doc).expect("highlights supported");
//! session.run_until_idle(&doc);
//! println!("{} marks", session.engine().marks().count());
//! ```
#![deny(unsafe_code)]

pub mod block;
pub mod color;
pub mod config;
pub mod custom;
pub mod engine;
pub mod error;
pub mod highlight;
pub mod markdown;
pub mod patterns;
pub mod position;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod scope;
pub mod session;
pub mod store;
pub mod tokenize;
pub mod tree;

/// Default upper bound on the size of a scanned input file (5 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 5 * 1024 * 1024;

pub use config::{Config, ConfigLoader, ConfigSources, LogLevel, Settings};
pub use engine::{Engine, FragmentReport, FragmentSkip};
pub use error::{ConfigError, ConfigResult, EngineError, EngineResult, StoreError, StoreResult};
pub use highlight::{Bucket, HighlightRenderer, Highlights, MarkRange};
pub use registry::Registry;
pub use report::ScanReport;
pub use scheduler::{Clock, DrainReport, ManualClock, Scheduler, SchedulerConfig, SystemClock};
pub use session::Session;
pub use store::{FileStore, MemoryStore, RegistryStore};
pub use tree::{Document, Mutation, NodeId};
