//! Command implementations.

use anyhow::Context;
use bolder_core::config::Config;
use bolder_core::store::{FileStore, default_store_dir};
use camino::Utf8Path;

pub mod classify;
pub mod info;
pub mod registry;
pub mod scan;

/// Read a file and validate its size against the configured limit.
pub fn read_input_file(path: &Utf8Path, max_bytes: usize) -> anyhow::Result<String> {
    // Preflight: check file size via metadata before reading into memory.
    let metadata =
        std::fs::metadata(path.as_std_path()).with_context(|| format!("failed to read {path}"))?;
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > max_bytes {
        anyhow::bail!("input too large: {path} is {size} bytes (limit: {max_bytes} bytes)");
    }

    let content = std::fs::read_to_string(path.as_std_path())
        .with_context(|| format!("failed to read {path}"))?;
    Ok(content)
}

/// The registry file store named by the configuration, or the platform default.
pub fn file_store(config: &Config) -> anyhow::Result<FileStore> {
    let dir = config
        .store_dir
        .clone()
        .or_else(default_store_dir)
        .context("no registry directory configured and no user data directory available")?;
    Ok(FileStore::new(dir))
}
