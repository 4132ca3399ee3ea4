//! Error types for bolder-core.

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::tree::NodeId;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised by a [`crate::store::RegistryStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("registry store I/O failed at {path}: {source}")]
    Io {
        /// File or directory involved.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored registry is not a JSON list of strings.
    #[error("malformed registry at {path}: {source}")]
    Json {
        /// File that failed to parse.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias using [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised while scanning a document.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The renderer cannot display named highlight buckets.
    #[error("renderer does not support highlight buckets")]
    HighlightsUnsupported,

    /// A mark would address bytes outside its text leaf.
    #[error("range {start}..{end} is outside text node {node} (length {len})")]
    RangeOutOfBounds {
        /// Target text leaf.
        node: NodeId,
        /// Range start.
        start: usize,
        /// Range end.
        end: usize,
        /// Current text length.
        len: usize,
    },
}

/// Result type alias using [`EngineError`].
pub type EngineResult<T> = Result<T, EngineError>;
